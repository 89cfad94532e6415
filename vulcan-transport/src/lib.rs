//! Transport abstraction layer for ROCCAT Vulcan keyboard communication
//!
//! The keyboard is a composite HID device. This crate exposes the three
//! logical channels the protocol engine needs as narrow traits:
//!
//! - control: feature reports (initialization handshake)
//! - LED: output reports (color frames)
//! - input: input reports (key and knob frames)
//!
//! `HidDiscovery` implements them on top of hidapi. Anything else that can
//! produce a `DeviceChannels` (tests, replay tools) plugs into the same
//! `DeviceDiscovery` seam.

pub mod device_registry;
pub mod error;
pub mod types;

mod discovery;
mod hid;

pub use device_registry::{is_supported, InterfaceLayout, PRODUCT_IDS, VENDOR_ID};
pub use discovery::HidDiscovery;
pub use error::TransportError;
pub use hid::HidChannel;
pub use types::{DiscoveredDevice, TransportDeviceInfo};

use async_trait::async_trait;

/// Feature-report channel (control interface)
pub trait FeatureChannel: Send + Sync {
    /// Send a feature report. `data[0]` is the report ID.
    fn send_feature_report(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Read a feature report. `buf[0]` must hold the requested report ID.
    ///
    /// Returns the number of bytes read.
    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Buffer length to use for feature reports on this channel
    fn feature_report_len(&self) -> usize;
}

/// Output-report channel (LED interface)
pub trait OutputChannel: Send + Sync {
    /// Write one output report (`data[0]` is the report ID).
    ///
    /// Returns the number of bytes written.
    fn write_report(&self, data: &[u8]) -> Result<usize, TransportError>;
}

/// Input-report channel (key/knob interface)
pub trait InputChannel: Send + Sync {
    /// Read one input report, waiting at most `timeout_ms`.
    ///
    /// Returns `Ok(0)` on timeout.
    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError>;
}

/// The opened channels of one keyboard
pub struct DeviceChannels {
    /// Device information
    pub info: TransportDeviceInfo,
    /// Control interface (feature reports)
    pub control: Box<dyn FeatureChannel>,
    /// LED interface (output reports)
    pub led: Box<dyn OutputChannel>,
    /// Input interfaces, one reader each
    pub inputs: Vec<Box<dyn InputChannel>>,
}

impl std::fmt::Debug for DeviceChannels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceChannels")
            .field("info", &self.info)
            .field("inputs", &self.inputs.len())
            .finish_non_exhaustive()
    }
}

/// Device discovery abstraction
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// List currently attached supported keyboards
    async fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError>;

    /// Open the control, LED and input channels of a keyboard
    async fn open_device(&self, device: &DiscoveredDevice)
        -> Result<DeviceChannels, TransportError>;
}
