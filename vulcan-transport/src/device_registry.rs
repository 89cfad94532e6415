//! Device registry - supported Vulcan boards and their interface layout
//!
//! The Vulcan enumerates as a composite device. The USB interface number is
//! the only stable way to tell the channels apart through hidapi, which does
//! not expose report descriptors or maximum feature lengths on every platform.

use serde::{Deserialize, Serialize};

/// ROCCAT vendor ID
pub const VENDOR_ID: u16 = 0x1E7D;

/// Known keyboard PIDs
pub const PRODUCT_IDS: &[u16] = &[
    0x307A, // Vulcan 100/120 AIMO
    0x3098, // Vulcan 120 AIMO (revision)
];

/// Default interface carrying vendor control/feature reports
pub const CONTROL_INTERFACE: i32 = 1;
/// Default interface carrying vendor input reports (key and knob frames)
pub const INPUT_INTERFACE: i32 = 2;
/// Default interface carrying the LED output report
pub const LED_INTERFACE: i32 = 3;

/// Default feature report buffer length for the control interface
pub const FEATURE_REPORT_LEN: usize = 64;

/// Check if a VID/PID pair is a supported keyboard
#[inline]
pub fn is_supported(vid: u16, pid: u16) -> bool {
    vid == VENDOR_ID && PRODUCT_IDS.contains(&pid)
}

/// Which USB interface serves which logical channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceLayout {
    /// Interface used for the initialization handshake
    pub control: i32,
    /// Interface used for color writes
    pub led: i32,
    /// Interfaces read for input frames (one reader each)
    pub inputs: Vec<i32>,
    /// Feature report buffer length on the control interface
    pub feature_report_len: usize,
}

impl Default for InterfaceLayout {
    fn default() -> Self {
        Self {
            control: CONTROL_INTERFACE,
            led: LED_INTERFACE,
            inputs: vec![INPUT_INTERFACE],
            feature_report_len: FEATURE_REPORT_LEN,
        }
    }
}
