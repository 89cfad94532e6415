//! Device discovery for Vulcan keyboards

use async_trait::async_trait;
use hidapi::{DeviceInfo, HidApi};
use tracing::{debug, info, warn};

use crate::device_registry::{self, InterfaceLayout};
use crate::error::TransportError;
use crate::hid::HidChannel;
use crate::types::{DiscoveredDevice, TransportDeviceInfo};
use crate::{DeviceChannels, DeviceDiscovery, FeatureChannel, InputChannel, OutputChannel};

/// HID device discovery for wired Vulcan keyboards
pub struct HidDiscovery {
    /// Known VID/PID pairs to look for
    known_devices: Vec<(u16, u16)>,
    /// Which interface serves which channel
    layout: InterfaceLayout,
}

impl Default for HidDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl HidDiscovery {
    /// Create a discovery instance for all supported boards
    pub fn new() -> Self {
        Self::with_layout(InterfaceLayout::default())
    }

    /// Create a discovery instance with a custom interface layout
    pub fn with_layout(layout: InterfaceLayout) -> Self {
        Self {
            known_devices: device_registry::PRODUCT_IDS
                .iter()
                .map(|&pid| (device_registry::VENDOR_ID, pid))
                .collect(),
            layout,
        }
    }

    /// Add a VID/PID pair to discover
    pub fn add_device(&mut self, vid: u16, pid: u16) {
        if !self.known_devices.contains(&(vid, pid)) {
            self.known_devices.push((vid, pid));
        }
    }

    /// Interface layout used when opening devices
    pub fn layout(&self) -> &InterfaceLayout {
        &self.layout
    }

    /// Check if a device matches our known devices
    fn is_known_device(&self, vid: u16, pid: u16) -> bool {
        self.known_devices.contains(&(vid, pid))
    }

    /// Check if `candidate` is an interface of the same physical keyboard
    fn same_device(candidate: &DeviceInfo, info: &TransportDeviceInfo) -> bool {
        candidate.vendor_id() == info.vid
            && candidate.product_id() == info.pid
            && (info.serial.is_none() || candidate.serial_number() == info.serial.as_deref())
    }

    /// Find and open one interface of a keyboard
    fn open_interface(
        &self,
        api: &HidApi,
        info: &TransportDeviceInfo,
        interface: i32,
    ) -> Result<HidChannel, TransportError> {
        let device_info = api
            .device_list()
            .find(|d| Self::same_device(d, info) && d.interface_number() == interface)
            .ok_or(TransportError::InterfaceMissing {
                vid: info.vid,
                pid: info.pid,
                interface,
            })?;

        let device = device_info.open_device(api)?;
        debug!(
            "Opened interface {} of {:04X}:{:04X}",
            interface, info.vid, info.pid
        );
        Ok(HidChannel::new(
            device,
            interface,
            self.layout.feature_report_len,
        ))
    }
}

#[async_trait]
impl DeviceDiscovery for HidDiscovery {
    async fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        let api = HidApi::new()?;
        let mut devices = Vec::new();

        for device_info in api.device_list() {
            let vid = device_info.vendor_id();
            let pid = device_info.product_id();

            if !self.is_known_device(vid, pid) {
                continue;
            }

            // One entry per keyboard: report the control interface only
            if device_info.interface_number() != self.layout.control {
                continue;
            }

            let path = device_info.path().to_string_lossy().to_string();
            let serial = device_info
                .serial_number()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());
            let product_name = device_info.product_string().map(|s| s.to_string());

            debug!("Found device: VID={:04X} PID={:04X} path={}", vid, pid, path);

            devices.push(DiscoveredDevice {
                info: TransportDeviceInfo {
                    vid,
                    pid,
                    device_path: path,
                    serial,
                    product_name,
                },
            });
        }

        info!("Found {} devices", devices.len());
        Ok(devices)
    }

    async fn open_device(
        &self,
        device: &DiscoveredDevice,
    ) -> Result<DeviceChannels, TransportError> {
        let api = HidApi::new()?;
        let info = &device.info;

        let control: Box<dyn FeatureChannel> =
            Box::new(self.open_interface(&api, info, self.layout.control)?);
        let led: Box<dyn OutputChannel> =
            Box::new(self.open_interface(&api, info, self.layout.led)?);

        let mut inputs: Vec<Box<dyn InputChannel>> = Vec::new();
        for &interface in &self.layout.inputs {
            match self.open_interface(&api, info, interface) {
                Ok(channel) => inputs.push(Box::new(channel)),
                Err(e) => warn!("Input interface {} unavailable: {}", interface, e),
            }
        }

        info!(
            "Opened {:04X}:{:04X} with {} input channel(s)",
            info.vid,
            info.pid,
            inputs.len()
        );

        Ok(DeviceChannels {
            info: info.clone(),
            control,
            led,
            inputs,
        })
    }
}
