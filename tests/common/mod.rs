//! In-memory keyboard for session tests.
//!
//! `MockKeyboard` hands out channels that share state with the test, so the
//! test can inspect LED writes and feature reports and feed input reports.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use vulcan_driver::color::{decode_led_report, LedReport};
use vulcan_driver::{ColorFrame, SessionConfig, TransportDeviceInfo, TransportError};
use vulcan_transport::{
    DeviceChannels, DeviceDiscovery, DiscoveredDevice, FeatureChannel, InputChannel,
    OutputChannel,
};

/// Fast timings for tests
pub fn test_config() -> SessionConfig {
    SessionConfig {
        update_interval_ms: 1,
        ack_poll_interval_ms: 0,
        input_read_timeout_ms: 5,
        ..Default::default()
    }
}

/// Shared queue behind one mock input channel
#[derive(Default)]
pub struct InputQueue {
    reports: Mutex<VecDeque<Vec<u8>>>,
    fail: AtomicBool,
}

impl InputQueue {
    pub fn push(&self, report: &[u8]) {
        self.reports.lock().push_back(report.to_vec());
    }

    /// Make the next read fail
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct MockKeyboard {
    pub vid: u16,
    pub pid: u16,
    /// Whether the discovery reports the board at all
    pub attached: bool,
    pub acks: bool,
    pub feature_reports: Arc<Mutex<Vec<Vec<u8>>>>,
    pub led_writes: Arc<Mutex<Vec<Vec<u8>>>>,
    pub fail_led: Arc<AtomicBool>,
    pub inputs: Vec<Arc<InputQueue>>,
}

impl MockKeyboard {
    pub fn new() -> Self {
        Self::with_inputs(1)
    }

    pub fn with_inputs(count: usize) -> Self {
        Self {
            vid: vulcan_transport::VENDOR_ID,
            pid: 0x307A,
            attached: true,
            acks: true,
            feature_reports: Arc::default(),
            led_writes: Arc::default(),
            fail_led: Arc::default(),
            inputs: (0..count).map(|_| Arc::new(InputQueue::default())).collect(),
        }
    }

    /// Feature report ids sent so far
    pub fn sent_report_ids(&self) -> Vec<u8> {
        self.feature_reports.lock().iter().map(|r| r[0]).collect()
    }

    pub fn led_write_count(&self) -> usize {
        self.led_writes.lock().len()
    }

    /// Color frame carried by the n-th LED write
    pub fn written_frame(&self, n: usize) -> ColorFrame {
        let writes = self.led_writes.lock();
        let report: LedReport = writes[n]
            .as_slice()
            .try_into()
            .expect("LED write has report length");
        decode_led_report(&report)
    }

    fn info(&self) -> TransportDeviceInfo {
        TransportDeviceInfo {
            vid: self.vid,
            pid: self.pid,
            device_path: "mock".into(),
            serial: None,
            product_name: Some("Mock Vulcan".into()),
        }
    }
}

struct MockControl {
    acks: bool,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FeatureChannel for MockControl {
    fn send_feature_report(&self, data: &[u8]) -> Result<(), TransportError> {
        self.sent.lock().push(data.to_vec());
        Ok(())
    }

    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        buf[1] = if self.acks { 0x01 } else { 0x00 };
        Ok(buf.len())
    }

    fn feature_report_len(&self) -> usize {
        64
    }
}

struct MockLed {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    fail: Arc<AtomicBool>,
}

impl OutputChannel for MockLed {
    fn write_report(&self, data: &[u8]) -> Result<usize, TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        self.writes.lock().push(data.to_vec());
        Ok(data.len())
    }
}

struct MockInput {
    queue: Arc<InputQueue>,
}

impl InputChannel for MockInput {
    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        if self.queue.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        match self.queue.reports.lock().pop_front() {
            Some(report) => {
                let len = report.len().min(buf.len());
                buf[..len].copy_from_slice(&report[..len]);
                Ok(len)
            }
            None => {
                std::thread::sleep(Duration::from_millis(timeout_ms.max(1) as u64));
                Ok(0)
            }
        }
    }
}

#[async_trait]
impl DeviceDiscovery for MockKeyboard {
    async fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        if !self.attached {
            return Ok(Vec::new());
        }
        Ok(vec![DiscoveredDevice { info: self.info() }])
    }

    async fn open_device(&self, device: &DiscoveredDevice) -> Result<DeviceChannels, TransportError> {
        assert_eq!(device.info, self.info());
        Ok(DeviceChannels {
            info: self.info(),
            control: Box::new(MockControl {
                acks: self.acks,
                sent: Arc::clone(&self.feature_reports),
            }),
            led: Box::new(MockLed {
                writes: Arc::clone(&self.led_writes),
                fail: Arc::clone(&self.fail_led),
            }),
            inputs: self
                .inputs
                .iter()
                .map(|queue| {
                    Box::new(MockInput {
                        queue: Arc::clone(queue),
                    }) as Box<dyn InputChannel>
                })
                .collect(),
        })
    }
}
