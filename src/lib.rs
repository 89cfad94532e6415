//! ROCCAT Vulcan keyboard driver - protocol engine
//!
//! Per-key color framing, input frame decoding, the control handshake and a
//! coalescing LED writer, on top of the `vulcan-transport` HID channels.
//!
//! ```no_run
//! use vulcan_driver::{DeviceSession, HidDiscovery, LogicalKey, RgbColor, SessionConfig};
//!
//! # async fn run() -> Result<(), vulcan_driver::VulcanError> {
//! let session_config = SessionConfig::default();
//! let discovery = HidDiscovery::with_layout(session_config.interfaces.clone());
//! let mut session = DeviceSession::open(&discovery, session_config).await?;
//!
//! session.set_all(RgbColor::BLUE);
//! session.set_key(LogicalKey::Esc, RgbColor::RED);
//! session.update()?.await?;
//! # Ok(())
//! # }
//! ```

pub mod color;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod handshake;
pub mod keymap;
pub mod scheduler;
pub mod session;

pub use color::{ColorBuffer, ColorFrame, RgbColor, BRIGHTNESS_MAX, COLOR_BUFFER_LEN};
pub use config::SessionConfig;
pub use error::{FrameError, VulcanError};
pub use events::{EventHub, ListenerId, TimestampedEvent};
pub use frame::{DecodedEvent, TurnDirection};
pub use handshake::InitHandshake;
pub use keymap::{KeyMap, KeyboardLayout, LogicalKey};
pub use scheduler::{Submission, UpdateOutcome, UpdateScheduler};
pub use session::{DeviceSession, SessionState};

pub use vulcan_transport::{
    DeviceDiscovery, DiscoveredDevice, HidDiscovery, InterfaceLayout, TransportDeviceInfo,
    TransportError,
};
