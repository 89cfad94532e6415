//! Input event delivery
//!
//! One reader thread per input channel decodes reports and hands each event
//! to the session's `EventHub`, which fans it out to:
//!
//! - listeners: callbacks run synchronously on the reader thread, in
//!   registration order
//! - subscribers: `tokio::sync::broadcast` receivers carrying timestamped
//!   copies

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};
use vulcan_transport::InputChannel;

use crate::error::VulcanError;
use crate::frame::{self, DecodedEvent};
use crate::keymap::KeyMap;

/// Decoded event with capture time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestampedEvent {
    /// Seconds since the session opened
    pub timestamp: f64,
    /// Index of the input channel the event arrived on
    pub channel: usize,
    /// The event
    pub event: DecodedEvent,
}

/// Handle returned by `add_listener`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&DecodedEvent) + Send + Sync>;

/// Listener registry plus broadcast channel
pub struct EventHub {
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
    tx: broadcast::Sender<TimestampedEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            tx,
        }
    }

    /// Register a callback; it runs on the reader thread
    pub fn add_listener<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&DecodedEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(f)));
        id
    }

    /// Unregister a callback. Returns false if the id was unknown.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// New broadcast receiver; sees events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TimestampedEvent> {
        self.tx.subscribe()
    }

    /// Deliver one event to listeners, then subscribers
    pub fn dispatch(&self, event: TimestampedEvent) {
        // Snapshot so listeners may (un)register from inside a callback
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect();

        for listener in &listeners {
            listener(&event.event);
        }

        // No receivers is fine
        let _ = self.tx.send(event);
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listeners.read().len())
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

/// Per-reader settings
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Channel index, also used in the thread name
    pub channel: usize,
    /// Read timeout; bounds shutdown latency
    pub read_timeout_ms: i32,
    /// Report buffer length
    pub report_len: usize,
}

/// Blocking read loop for one input channel.
///
/// Runs until `shutdown` is set or the channel fails. A failure ends only
/// this reader and is returned as `TransportReadFailed`.
pub fn run_input_reader(
    input: Box<dyn InputChannel>,
    keymap: Arc<KeyMap>,
    hub: Arc<EventHub>,
    shutdown: Arc<AtomicBool>,
    start_time: Instant,
    config: ReaderConfig,
) -> Result<(), VulcanError> {
    debug!("Input reader {} started", config.channel);
    let mut buf = vec![0u8; config.report_len];

    while !shutdown.load(Ordering::Acquire) {
        match input.read_report(&mut buf, config.read_timeout_ms) {
            Ok(len) if len > 0 => {
                let timestamp = start_time.elapsed().as_secs_f64();
                trace!(
                    "Input reader {} got {} bytes at {:.3}s: {:02X?}",
                    config.channel,
                    len,
                    timestamp,
                    &buf[..len.min(16)]
                );

                for event in frame::decode(&buf[..len], &keymap) {
                    // Late reports after disconnect are dropped
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    hub.dispatch(TimestampedEvent {
                        timestamp,
                        channel: config.channel,
                        event,
                    });
                }
            }
            Ok(_) => {
                // Timeout; loop to re-check shutdown
            }
            Err(e) => {
                warn!("Input reader {} failed: {}", config.channel, e);
                return Err(VulcanError::TransportReadFailed(e));
            }
        }
    }

    debug!("Input reader {} exiting", config.channel);
    Ok(())
}
