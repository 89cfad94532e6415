//! Control-interface initialization sequence
//!
//! Before the LED interface accepts frames the keyboard must receive three
//! feature reports (0x15, 0x0D, 0x13). After each one the host polls feature
//! report 0x04 until byte 1 reads `0x01`.

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};
use vulcan_transport::FeatureChannel;

use crate::error::VulcanError;

/// Acknowledgement feature report id
pub const ACK_REPORT_ID: u8 = 0x04;

/// Byte 1 of the acknowledgement report once the device is ready
pub const ACK_READY: u8 = 0x01;

/// Report 0x15: enter host control
pub const REPORT_15: [u8; 3] = [0x15, 0x00, 0x01];

/// Report 0x0D: LED mode setup
pub const REPORT_0D: [u8; 11] = [
    0x0D, 0x0B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Report 0x13: enable per-key LED stream
pub const REPORT_13: [u8; 8] = [0x13, 0x08, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Handshake timing defaults
pub mod timing {
    /// Polls per report before giving up
    pub const ACK_MAX_ATTEMPTS: u32 = 100;
    /// Delay between polls (ms)
    pub const ACK_POLL_INTERVAL_MS: u64 = 5;
}

/// The fixed report sequence plus its polling policy.
///
/// Runs synchronously; callers on an async runtime wrap it in
/// `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct InitHandshake {
    reports: Vec<Vec<u8>>,
    max_attempts: u32,
    poll_interval: Duration,
}

impl Default for InitHandshake {
    fn default() -> Self {
        Self::new(
            timing::ACK_MAX_ATTEMPTS,
            Duration::from_millis(timing::ACK_POLL_INTERVAL_MS),
        )
    }
}

impl InitHandshake {
    /// Standard sequence with the given polling policy
    pub fn new(max_attempts: u32, poll_interval: Duration) -> Self {
        Self {
            reports: vec![REPORT_15.to_vec(), REPORT_0D.to_vec(), REPORT_13.to_vec()],
            max_attempts: max_attempts.max(1),
            poll_interval,
        }
    }

    /// Report payloads in send order
    pub fn reports(&self) -> &[Vec<u8>] {
        &self.reports
    }

    /// Send every report, waiting for the acknowledgement after each.
    ///
    /// Stops at the first failure; nothing is retried at this level.
    pub fn run(&self, control: &dyn FeatureChannel) -> Result<(), VulcanError> {
        for report in &self.reports {
            let report_id = report[0];
            debug!("Handshake: sending report 0x{:02X}", report_id);

            control
                .send_feature_report(report)
                .map_err(|e| VulcanError::HandshakeFailed {
                    report_id,
                    reason: e.to_string(),
                })?;

            self.wait_for_ack(control, report_id)?;
        }

        debug!("Handshake complete");
        Ok(())
    }

    fn wait_for_ack(&self, control: &dyn FeatureChannel, report_id: u8) -> Result<(), VulcanError> {
        let mut buf = vec![0u8; control.feature_report_len().max(2)];

        for attempt in 1..=self.max_attempts {
            buf.fill(0);
            buf[0] = ACK_REPORT_ID;
            let len = control
                .get_feature_report(&mut buf)
                .map_err(|e| VulcanError::HandshakeFailed {
                    report_id,
                    reason: e.to_string(),
                })?;

            if len > 1 && buf[1] == ACK_READY {
                debug!(
                    "Report 0x{:02X} acknowledged after {} poll(s)",
                    report_id, attempt
                );
                return Ok(());
            }

            if attempt < self.max_attempts {
                thread::sleep(self.poll_interval);
            }
        }

        warn!(
            "Report 0x{:02X} not acknowledged after {} polls",
            report_id, self.max_attempts
        );
        Err(VulcanError::HandshakeFailed {
            report_id,
            reason: format!("no acknowledgement after {} polls", self.max_attempts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use vulcan_transport::TransportError;

    /// Acks after `acks_after` polls; `fail_send` rejects the given report id
    struct MockControl {
        sent: Mutex<Vec<Vec<u8>>>,
        polls: AtomicU32,
        acks_after: Option<u32>,
        fail_send: Option<u8>,
    }

    impl MockControl {
        fn new(acks_after: Option<u32>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                polls: AtomicU32::new(0),
                acks_after,
                fail_send: None,
            }
        }
    }

    impl FeatureChannel for MockControl {
        fn send_feature_report(&self, data: &[u8]) -> Result<(), TransportError> {
            if self.fail_send == Some(data[0]) {
                return Err(TransportError::Disconnected);
            }
            self.polls.store(0, Ordering::SeqCst);
            self.sent.lock().push(data.to_vec());
            Ok(())
        }

        fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
            assert_eq!(buf[0], ACK_REPORT_ID);
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            buf[1] = match self.acks_after {
                Some(n) if polls >= n => ACK_READY,
                _ => 0x03,
            };
            Ok(buf.len())
        }

        fn feature_report_len(&self) -> usize {
            64
        }
    }

    fn fast(max_attempts: u32) -> InitHandshake {
        InitHandshake::new(max_attempts, Duration::ZERO)
    }

    #[test]
    fn sends_reports_in_order() {
        let control = MockControl::new(Some(3));
        fast(100).run(&control).unwrap();

        let sent = control.sent.lock();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], REPORT_15.to_vec());
        assert_eq!(sent[1], REPORT_0D.to_vec());
        assert_eq!(sent[2], REPORT_13.to_vec());
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let control = MockControl::new(None);
        let err = fast(100).run(&control).unwrap_err();

        assert!(matches!(
            err,
            VulcanError::HandshakeFailed {
                report_id: 0x15,
                ..
            }
        ));
        assert_eq!(control.polls.load(Ordering::SeqCst), 100);
        assert_eq!(control.sent.lock().len(), 1);
    }

    #[test]
    fn ack_on_last_attempt_succeeds() {
        let control = MockControl::new(Some(100));
        assert!(fast(100).run(&control).is_ok());
    }

    #[test]
    fn send_failure_stops_sequence() {
        let mut control = MockControl::new(Some(1));
        control.fail_send = Some(0x0D);
        let err = fast(100).run(&control).unwrap_err();

        assert!(matches!(
            err,
            VulcanError::HandshakeFailed {
                report_id: 0x0D,
                ..
            }
        ));
        assert_eq!(control.sent.lock().len(), 1);
    }

    #[test]
    fn immediate_ack_does_not_wait() {
        let control = MockControl::new(Some(1));
        let handshake = InitHandshake::new(100, Duration::from_millis(200));

        let started = std::time::Instant::now();
        handshake.run(&control).unwrap();

        assert_eq!(control.sent.lock().len(), 3);
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn payload_shapes() {
        let handshake = InitHandshake::default();
        let ids: Vec<u8> = handshake.reports().iter().map(|r| r[0]).collect();
        assert_eq!(ids, vec![0x15, 0x0D, 0x13]);
        assert_eq!(REPORT_0D.len(), 11);
        assert_eq!(REPORT_13[1] as usize, REPORT_13.len());
    }
}
