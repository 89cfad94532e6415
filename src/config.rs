//! Session configuration
//!
//! Every field has a default matching the stock keyboard, so an empty TOML
//! document (or no file at all) yields a working configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vulcan_transport::InterfaceLayout;

use crate::error::VulcanError;
use crate::handshake;
use crate::keymap::KeyboardLayout;
use crate::scheduler;

/// Tunables for one keyboard session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Minimum spacing between LED writes (ms)
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u64,
    /// Acknowledgement polls per handshake report
    #[serde(default = "default_ack_attempts")]
    pub ack_max_attempts: u32,
    /// Delay between acknowledgement polls (ms)
    #[serde(default = "default_ack_interval")]
    pub ack_poll_interval_ms: u64,
    /// Input read timeout; bounds how long a reader takes to notice shutdown
    #[serde(default = "default_read_timeout")]
    pub input_read_timeout_ms: i32,
    /// Input report buffer length
    #[serde(default = "default_report_len")]
    pub input_report_len: usize,
    /// Broadcast buffer for event subscribers
    #[serde(default = "default_channel_capacity")]
    pub event_channel_capacity: usize,
    /// Physical layout, selects the scancode table
    #[serde(default)]
    pub layout: KeyboardLayout,
    /// USB interface assignment
    #[serde(default)]
    pub interfaces: InterfaceLayout,
}

fn default_update_interval() -> u64 {
    scheduler::timing::UPDATE_INTERVAL_MS
}

fn default_ack_attempts() -> u32 {
    handshake::timing::ACK_MAX_ATTEMPTS
}

fn default_ack_interval() -> u64 {
    handshake::timing::ACK_POLL_INTERVAL_MS
}

fn default_read_timeout() -> i32 {
    50
}

fn default_report_len() -> usize {
    64
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval(),
            ack_max_attempts: default_ack_attempts(),
            ack_poll_interval_ms: default_ack_interval(),
            input_read_timeout_ms: default_read_timeout(),
            input_report_len: default_report_len(),
            event_channel_capacity: default_channel_capacity(),
            layout: KeyboardLayout::default(),
            interfaces: InterfaceLayout::default(),
        }
    }
}

impl SessionConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, VulcanError> {
        let config: SessionConfig =
            toml::from_str(content).map_err(|e| VulcanError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, or return the defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, VulcanError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| VulcanError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), VulcanError> {
        if self.ack_max_attempts == 0 {
            return Err(VulcanError::Config(
                "ack_max_attempts must be at least 1".into(),
            ));
        }
        if self.input_report_len == 0 {
            return Err(VulcanError::Config(
                "input_report_len must be non-zero".into(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(VulcanError::Config(
                "event_channel_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn ack_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ack_poll_interval_ms)
    }
}
