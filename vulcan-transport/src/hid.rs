//! hidapi-backed channel implementation

use hidapi::HidDevice;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::TransportError;
use crate::{FeatureChannel, InputChannel, OutputChannel};

/// One opened HID interface.
///
/// The same type serves as control, LED or input channel depending on which
/// interface it was opened on; the session only ever uses it through the
/// matching trait.
pub struct HidChannel {
    device: Mutex<HidDevice>,
    interface: i32,
    feature_report_len: usize,
}

impl HidChannel {
    /// Wrap an opened device
    ///
    /// # Arguments
    /// * `device` - opened hidapi device
    /// * `interface` - USB interface number (for logging)
    /// * `feature_report_len` - buffer length used for feature reports
    pub fn new(device: HidDevice, interface: i32, feature_report_len: usize) -> Self {
        Self {
            device: Mutex::new(device),
            interface,
            feature_report_len,
        }
    }

    /// USB interface number this channel was opened on
    pub fn interface(&self) -> i32 {
        self.interface
    }
}

impl FeatureChannel for HidChannel {
    fn send_feature_report(&self, data: &[u8]) -> Result<(), TransportError> {
        debug!(
            "if{} set feature 0x{:02X}: {:02X?}",
            self.interface,
            data.first().copied().unwrap_or(0),
            &data[..data.len().min(16)]
        );
        self.device.lock().send_feature_report(data)?;
        Ok(())
    }

    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let len = self.device.lock().get_feature_report(buf)?;
        Ok(len)
    }

    fn feature_report_len(&self) -> usize {
        self.feature_report_len
    }
}

impl OutputChannel for HidChannel {
    fn write_report(&self, data: &[u8]) -> Result<usize, TransportError> {
        let written = self.device.lock().write(data)?;
        Ok(written)
    }
}

impl InputChannel for HidChannel {
    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        let len = self.device.lock().read_timeout(buf, timeout_ms)?;
        Ok(len)
    }
}
