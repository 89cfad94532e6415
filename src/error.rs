//! Driver error types

use thiserror::Error;
use vulcan_transport::TransportError;

use crate::session::SessionState;

/// Per-frame decode failures. Never fatal: the frame is consumed and the
/// decoder moves on to the next one.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Key frame carried a scancode with no key assigned
    #[error("Unknown scancode 0x{0:02X}")]
    UnknownScancode(u8),

    /// Frame header matched no known frame kind
    #[error("Unknown frame header {0:02X?}")]
    UnknownFrameHeader([u8; 3]),
}

/// Errors from driver operations
#[derive(Error, Debug)]
pub enum VulcanError {
    /// No supported keyboard attached
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Control sequence rejected or never acknowledged
    #[error("Handshake failed at report 0x{report_id:02X}: {reason}")]
    HandshakeFailed { report_id: u8, reason: String },

    /// LED channel write failed; the session is gone
    #[error("LED write failed: {0}")]
    TransportWriteFailed(#[source] TransportError),

    /// Input channel read failed; only that reader stops
    #[error("Input read failed: {0}")]
    TransportReadFailed(#[source] TransportError),

    /// Transport layer error while opening
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame decode error
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Operation needs a ready session
    #[error("Session not ready (state: {0:?})")]
    NotReady(SessionState),

    /// Session was disconnected before the operation completed
    #[error("Session disconnected")]
    Disconnected,

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),
}
