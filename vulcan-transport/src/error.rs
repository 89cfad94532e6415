//! Transport error types

use thiserror::Error;

/// Errors that can occur during transport operations
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Communication timeout")]
    Timeout,

    #[error("Interface {interface} missing on {vid:04X}:{pid:04X}")]
    InterfaceMissing { vid: u16, pid: u16, interface: i32 },

    // HID-specific errors
    #[error("HID error: {0}")]
    HidError(String),

    #[error("HID permission denied: {0}")]
    HidPermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            TransportError::HidPermissionDenied(msg)
        } else {
            TransportError::HidError(msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_errors_are_classified() {
        let err: TransportError = hidapi::HidError::HidApiError {
            message: "open failed: Permission denied".into(),
        }
        .into();
        assert!(matches!(err, TransportError::HidPermissionDenied(_)));

        let err: TransportError = hidapi::HidError::HidApiError {
            message: "read error".into(),
        }
        .into();
        assert!(matches!(err, TransportError::HidError(_)));
    }

    #[test]
    fn interface_missing_message() {
        let err = TransportError::InterfaceMissing {
            vid: 0x1E7D,
            pid: 0x307A,
            interface: 3,
        };
        assert_eq!(err.to_string(), "Interface 3 missing on 1E7D:307A");
    }
}
