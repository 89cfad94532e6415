//! Input frame decoding
//!
//! The vendor input interface delivers reports made of concatenated 5-byte
//! frames:
//!
//! ```text
//! [03, 00, kind, id/scancode, value]
//! ```
//!
//! A report ends at its first all-zero frame (padding) or when fewer than 5
//! bytes remain. Decoding is a pure function of the bytes and the key map.

use tracing::trace;

use crate::error::FrameError;
use crate::keymap::{KeyMap, LogicalKey};

/// Length of one input frame
pub const FRAME_LEN: usize = 5;

/// Frame header constants (first three bytes)
pub mod header {
    /// Regular key press/release
    pub const KEY: [u8; 3] = [0x03, 0x00, 0xFB];
    /// Caps Lock while it acts as the easy-shift modifier
    pub const EASY_SHIFT: [u8; 3] = [0x03, 0x00, 0x0A];
    /// Alternate easy-shift header sent by later firmware
    pub const EASY_SHIFT_ALT: [u8; 3] = [0x03, 0x00, 0xFD];
    /// Volume knob pressed/released
    pub const KNOB_PRESS: [u8; 3] = [0x03, 0x00, 0x0B];
    /// Volume knob turned
    pub const KNOB_TURN: [u8; 3] = [0x03, 0x00, 0xCC];
    /// Volume knob secondary function
    pub const KNOB_FX: [u8; 3] = [0x03, 0x00, 0x0C];
    /// DPI knob turned
    pub const DPI_TURN: [u8; 3] = [0x03, 0x00, 0xCA];
}

/// Knob rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnDirection {
    /// Clockwise
    Right,
    /// Counter-clockwise
    Left,
}

impl TurnDirection {
    /// Values below 0x80 turn right, the rest (negative deltas) turn left
    fn from_wire(value: u8) -> Self {
        if value < 0x80 {
            Self::Right
        } else {
            Self::Left
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            Self::Right => 0x01,
            Self::Left => 0xFF,
        }
    }
}

/// One decoded input frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodedEvent {
    /// Key pressed (`down`) or released
    Key { key: LogicalKey, down: bool },
    /// Volume knob pressed or released
    VolumeKnobPress { id: u8, down: bool },
    /// Volume knob turned
    VolumeKnobTurn { id: u8, direction: TurnDirection },
    /// Volume knob secondary function
    VolumeKnobFx { id: u8, data: u8 },
    /// DPI knob turned
    DpiTurn { id: u8, direction: TurnDirection },
}

/// Keep-alive frames carry `0xFF` as id and add up to 6 across bytes 1 and 4
#[inline]
fn is_keep_alive(frame: &[u8; FRAME_LEN]) -> bool {
    frame[1] as u16 + frame[4] as u16 == 6 && frame[3] == 0xFF
}

#[inline]
fn is_padding(frame: &[u8; FRAME_LEN]) -> bool {
    frame.iter().all(|&b| b == 0)
}

/// Iterate the frames of one report, stopping at padding or a short tail
pub fn frames(bytes: &[u8]) -> impl Iterator<Item = [u8; FRAME_LEN]> + '_ {
    bytes
        .chunks_exact(FRAME_LEN)
        .map(|chunk| {
            let mut frame = [0u8; FRAME_LEN];
            frame.copy_from_slice(chunk);
            frame
        })
        .take_while(|frame| !is_padding(frame))
}

/// Classify a single frame.
///
/// `Ok(None)` means the frame is a keep-alive and carries no event.
pub fn decode_frame(
    frame: &[u8; FRAME_LEN],
    keymap: &KeyMap,
) -> Result<Option<DecodedEvent>, FrameError> {
    if is_keep_alive(frame) {
        return Ok(None);
    }

    let head = [frame[0], frame[1], frame[2]];
    let id = frame[3];
    let value = frame[4];

    let event = match head {
        header::KEY => {
            let key = keymap
                .scancode_to_key(id)
                .ok_or(FrameError::UnknownScancode(id))?;
            DecodedEvent::Key {
                key,
                down: value != 0,
            }
        }
        // Easy-shift reports release as non-zero
        header::EASY_SHIFT | header::EASY_SHIFT_ALT => DecodedEvent::Key {
            key: LogicalKey::CapsLock,
            down: value == 0,
        },
        header::KNOB_PRESS => DecodedEvent::VolumeKnobPress {
            id,
            down: value != 0,
        },
        header::KNOB_TURN => DecodedEvent::VolumeKnobTurn {
            id,
            direction: TurnDirection::from_wire(value),
        },
        header::KNOB_FX => DecodedEvent::VolumeKnobFx { id, data: value },
        header::DPI_TURN => DecodedEvent::DpiTurn {
            id,
            direction: TurnDirection::from_wire(value),
        },
        _ => return Err(FrameError::UnknownFrameHeader(head)),
    };

    Ok(Some(event))
}

/// Decode every event in one input report.
///
/// Unknown scancodes and headers are dropped; the frame is still consumed so
/// the stride stays aligned.
pub fn decode(bytes: &[u8], keymap: &KeyMap) -> Vec<DecodedEvent> {
    frames(bytes)
        .filter_map(|frame| match decode_frame(&frame, keymap) {
            Ok(event) => event,
            Err(e) => {
                trace!("Dropping frame {:02X?}: {}", frame, e);
                None
            }
        })
        .collect()
}

/// Build the frame the keyboard would send for `event`.
///
/// Returns `None` for events the wire format cannot express: keys without a
/// scancode, or knob frames that would read back as keep-alives.
pub fn encode_frame(event: &DecodedEvent, keymap: &KeyMap) -> Option<[u8; FRAME_LEN]> {
    let (head, id, value) = match *event {
        DecodedEvent::Key {
            key: LogicalKey::CapsLock,
            down,
        } => (header::EASY_SHIFT, 0x00, u8::from(!down)),
        DecodedEvent::Key { key, down } => (header::KEY, keymap.key_to_scancode(key)?, u8::from(down)),
        DecodedEvent::VolumeKnobPress { id, down } => (header::KNOB_PRESS, id, u8::from(down)),
        DecodedEvent::VolumeKnobTurn { id, direction } => {
            (header::KNOB_TURN, id, direction.to_wire())
        }
        DecodedEvent::VolumeKnobFx { id, data } => (header::KNOB_FX, id, data),
        DecodedEvent::DpiTurn { id, direction } => (header::DPI_TURN, id, direction.to_wire()),
    };

    let frame = [head[0], head[1], head[2], id, value];
    if is_keep_alive(&frame) {
        return None;
    }
    Some(frame)
}
