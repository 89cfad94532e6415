//! Keyboard session
//!
//! `DeviceSession` owns one opened keyboard: it runs the initialization
//! handshake, starts the LED writer and the input readers, and exposes the
//! color/brightness surface.
//!
//! ```text
//! Closed ──open()──► Handshaking ──ack──► Ready ──write error / disconnect()──► Disconnected
//! ```
//!
//! Input readers and the LED writer run on their own threads. A failed LED
//! write takes the whole session to `Disconnected`; a failed input read only
//! stops that reader.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use vulcan_transport::{
    DeviceChannels, DeviceDiscovery, FeatureChannel, InputChannel, TransportDeviceInfo,
    TransportError,
};

use crate::color::{ColorBuffer, ColorFrame, RgbColor, BRIGHTNESS_MAX};
use crate::config::SessionConfig;
use crate::error::VulcanError;
use crate::events::{run_input_reader, EventHub, ListenerId, ReaderConfig, TimestampedEvent};
use crate::frame::DecodedEvent;
use crate::handshake::InitHandshake;
use crate::keymap::{KeyMap, LogicalKey};
use crate::scheduler::{Submission, UpdateScheduler};

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Not opened yet
    Closed = 0,
    /// Handshake in progress
    Handshaking = 1,
    /// Accepting updates
    Ready = 2,
    /// Terminal
    Disconnected = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Closed,
            1 => Self::Handshaking,
            2 => Self::Ready,
            _ => Self::Disconnected,
        }
    }
}

/// State shared with the writer's failure handler
struct Shared {
    state: AtomicU8,
    shutdown: Arc<AtomicBool>,
    control: Mutex<Option<Box<dyn FeatureChannel>>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Closed as u8),
            shutdown: Arc::new(AtomicBool::new(false)),
            control: Mutex::new(None),
        }
    }

    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Move to `Disconnected`, stop readers and release the control handle.
    ///
    /// Returns true on the first call.
    fn disconnect(&self) -> bool {
        let previous = self
            .state
            .swap(SessionState::Disconnected as u8, Ordering::AcqRel);
        self.shutdown.store(true, Ordering::Release);
        self.control.lock().take();
        previous != SessionState::Disconnected as u8
    }
}

fn internal(msg: String) -> VulcanError {
    VulcanError::Transport(TransportError::Internal(msg))
}

/// An opened, initialized keyboard
pub struct DeviceSession {
    info: TransportDeviceInfo,
    config: SessionConfig,
    keymap: Arc<KeyMap>,
    colors: ColorBuffer,
    brightness: u8,
    last_sent: Option<Box<ColorFrame>>,
    scheduler: UpdateScheduler,
    hub: Arc<EventHub>,
    shared: Arc<Shared>,
    readers: Vec<JoinHandle<Result<(), VulcanError>>>,
}

impl DeviceSession {
    /// Find the first supported keyboard, open it and run the handshake.
    ///
    /// No session exists unless the handshake succeeds; on failure nothing
    /// has been written to the LED channel.
    pub async fn open<D>(discovery: &D, config: SessionConfig) -> Result<Self, VulcanError>
    where
        D: DeviceDiscovery + ?Sized,
    {
        // The discovery decides which boards are supported
        let device = discovery
            .list_devices()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| VulcanError::DeviceNotFound("no supported keyboard attached".into()))?;

        info!(
            "Opening {:04X}:{:04X} ({})",
            device.info.vid,
            device.info.pid,
            device.info.product_name.as_deref().unwrap_or("unknown")
        );

        let DeviceChannels {
            info,
            control,
            led,
            inputs,
        } = discovery.open_device(&device).await?;

        let shared = Arc::new(Shared::new());
        shared.set_state(SessionState::Handshaking);

        let handshake = InitHandshake::new(config.ack_max_attempts, config.ack_poll_interval());
        let control = tokio::task::spawn_blocking(move || -> Result<_, VulcanError> {
            handshake.run(control.as_ref())?;
            Ok(control)
        })
        .await
        .map_err(|e| internal(format!("handshake task failed: {e}")))??;

        *shared.control.lock() = Some(control);

        let failure_shared = Arc::clone(&shared);
        let scheduler = UpdateScheduler::spawn(
            led,
            config.update_interval(),
            Box::new(move |e| {
                warn!("LED channel lost, disconnecting: {}", e);
                failure_shared.disconnect();
            }),
        )?;

        let mut session = Self {
            info,
            keymap: Arc::new(KeyMap::new(config.layout)),
            colors: ColorBuffer::new(),
            brightness: BRIGHTNESS_MAX,
            last_sent: None,
            scheduler,
            hub: Arc::new(EventHub::new(config.event_channel_capacity)),
            shared,
            readers: Vec::new(),
            config,
        };

        // Dropping a partly started session disconnects it
        session.start_readers(inputs)?;
        session.shared.set_state(SessionState::Ready);
        info!("Session ready ({} input channel(s))", session.readers.len());

        Ok(session)
    }

    fn start_readers(
        &mut self,
        inputs: Vec<Box<dyn InputChannel>>,
    ) -> Result<(), VulcanError> {
        let start_time = Instant::now();

        for (channel, input) in inputs.into_iter().enumerate() {
            let keymap = Arc::clone(&self.keymap);
            let hub = Arc::clone(&self.hub);
            let shutdown = Arc::clone(&self.shared.shutdown);
            let config = ReaderConfig {
                channel,
                read_timeout_ms: self.config.input_read_timeout_ms,
                report_len: self.config.input_report_len,
            };

            let handle = thread::Builder::new()
                .name(format!("vulcan-input-{channel}"))
                .spawn(move || run_input_reader(input, keymap, hub, shutdown, start_time, config))
                .map_err(|e| internal(format!("failed to spawn input reader: {e}")))?;
            self.readers.push(handle);
        }

        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Scancode tables used by the input readers
    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    pub fn colors(&self) -> &ColorBuffer {
        &self.colors
    }

    /// Direct access to the stored colors; call `update()` to send them
    pub fn colors_mut(&mut self) -> &mut ColorBuffer {
        &mut self.colors
    }

    pub fn set_key(&mut self, key: LogicalKey, rgb: RgbColor) {
        self.colors.set_key(key, rgb);
    }

    pub fn set_all(&mut self, rgb: RgbColor) {
        self.colors.set_all(rgb);
    }

    pub fn set_many(&mut self, colors: &HashMap<LogicalKey, RgbColor>) {
        self.colors.set_many(colors);
    }

    pub fn set_index(&mut self, index: u8, rgb: RgbColor) -> Result<(), VulcanError> {
        self.colors.set_index(index, rgb)
    }

    pub fn set_raw(&mut self, bytes: &[u8]) -> Result<(), VulcanError> {
        self.colors.set_raw(bytes)
    }

    /// Brightness level, 0..=69
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Clamp and store the level, then send the colors at the new level.
    ///
    /// Setting the current level again sends nothing.
    pub async fn set_brightness(&mut self, level: u8) -> Result<(), VulcanError> {
        let level = level.min(BRIGHTNESS_MAX);
        if level == self.brightness {
            return Ok(());
        }
        debug!("Brightness {} -> {}", self.brightness, level);
        self.brightness = level;
        self.update()?.await.map(|_| ())
    }

    /// Queue the current colors at the current brightness.
    ///
    /// The returned handle resolves once this frame is written or replaced by
    /// a newer one. It does not borrow the session, so several updates may be
    /// in flight; only the latest pending frame reaches the device.
    pub fn update(&mut self) -> Result<Submission, VulcanError> {
        let state = self.state();
        if state != SessionState::Ready {
            return Err(VulcanError::NotReady(state));
        }

        let frame = self.colors.brightness_adjusted(self.brightness);
        let submission = self.scheduler.submit(&frame);
        self.last_sent = Some(Box::new(frame));
        Ok(submission)
    }

    /// Copy of the brightness-adjusted frame most recently submitted
    pub fn last_sent_snapshot(&self) -> Option<ColorFrame> {
        self.last_sent.as_deref().copied()
    }

    /// Receive timestamped events from all input channels
    pub fn subscribe(&self) -> broadcast::Receiver<TimestampedEvent> {
        self.hub.subscribe()
    }

    /// Register a callback run on the reader thread for every event
    pub fn add_listener<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&DecodedEvent) + Send + Sync + 'static,
    {
        self.hub.add_listener(f)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.hub.remove_listener(id)
    }

    /// Number of input readers still running
    pub fn active_readers(&self) -> usize {
        self.readers.iter().filter(|h| !h.is_finished()).count()
    }

    /// Collect the errors of readers that have stopped.
    ///
    /// Finished readers are joined and forgotten; running ones are untouched.
    pub fn take_reader_errors(&mut self) -> Vec<VulcanError> {
        let (finished, running): (Vec<_>, Vec<_>) =
            self.readers.drain(..).partition(|h| h.is_finished());
        self.readers = running;

        finished
            .into_iter()
            .filter_map(|handle| match handle.join() {
                Ok(result) => result.err(),
                Err(_) => Some(internal("input reader panicked".into())),
            })
            .collect()
    }

    /// Stop the writer and readers and release the device. Idempotent.
    ///
    /// An in-flight write completes; readers exit after their current read.
    pub fn disconnect(&self) {
        if self.shared.disconnect() {
            info!("Disconnected {:04X}:{:04X}", self.info.vid, self.info.pid);
        }
        self.scheduler.shutdown();
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("info", &self.info)
            .field("state", &self.state())
            .field("brightness", &self.brightness)
            .field("readers", &self.readers.len())
            .finish_non_exhaustive()
    }
}
