//! Per-key color storage and LED report framing

use std::collections::HashMap;

use crate::error::VulcanError;
use crate::keymap::{grid_offset, LogicalKey, BLUE_PLANE, GREEN_PLANE};

/// Color buffer length: a 60-byte lead-in plus six 64-byte continuations
pub const COLOR_BUFFER_LEN: usize = 444;

/// Brightness level that leaves the buffer untouched
pub const BRIGHTNESS_MAX: u8 = 69;

/// Size of one physical LED packet
pub const LED_PACKET_LEN: usize = 65;

/// Packets per LED report
pub const LED_PACKET_COUNT: usize = 7;

/// Full LED report length
pub const LED_REPORT_LEN: usize = LED_PACKET_LEN * LED_PACKET_COUNT;

/// Header of the first LED packet
pub const LED_REPORT_HEADER: [u8; 5] = [0x00, 0xA1, 0x01, 0x01, 0xB4];

/// Color bytes carried by the first packet
const LEAD_IN_LEN: usize = LED_PACKET_LEN - LED_REPORT_HEADER.len();

/// Color bytes carried by each continuation packet
const CONTINUATION_LEN: usize = LED_PACKET_LEN - 1;

/// Raw color buffer contents
pub type ColorFrame = [u8; COLOR_BUFFER_LEN];

/// Serialized LED report
pub type LedReport = [u8; LED_REPORT_LEN];

/// RGB color value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    /// Create a new RGB color
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create color from HSV values
    pub fn from_hsv(h: f32, s: f32, v: f32) -> Self {
        let h = h.rem_euclid(360.0);
        let s = s.clamp(0.0, 1.0);
        let v = v.clamp(0.0, 1.0);

        let c = v * s;
        let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
        let m = v - c;

        let (r, g, b) = match (h / 60.0) as i32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        Self {
            r: ((r + m) * 255.0) as u8,
            g: ((g + m) * 255.0) as u8,
            b: ((b + m) * 255.0) as u8,
        }
    }

    /// Black (all LEDs off)
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// White (all LEDs full)
    pub const WHITE: Self = Self::new(255, 255, 255);
    /// Red
    pub const RED: Self = Self::new(255, 0, 0);
    /// Green
    pub const GREEN: Self = Self::new(0, 255, 0);
    /// Blue
    pub const BLUE: Self = Self::new(0, 0, 255);
}

impl From<(u8, u8, u8)> for RgbColor {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

/// Per-key RGB store in device layout.
///
/// Keys live in three planes: `buf[o]` red, `buf[o + 12]` green,
/// `buf[o + 24]` blue, where `o` is the key's grid offset.
#[derive(Clone)]
pub struct ColorBuffer {
    bytes: ColorFrame,
}

impl Default for ColorBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ColorBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.bytes.iter().filter(|&&b| b != 0).count();
        f.debug_struct("ColorBuffer")
            .field("nonzero_bytes", &lit)
            .finish()
    }
}

impl ColorBuffer {
    /// All keys off
    pub fn new() -> Self {
        Self {
            bytes: [0; COLOR_BUFFER_LEN],
        }
    }

    fn write_at(&mut self, offset: usize, rgb: RgbColor) {
        self.bytes[offset] = rgb.r;
        self.bytes[offset + GREEN_PLANE as usize] = rgb.g;
        self.bytes[offset + BLUE_PLANE as usize] = rgb.b;
    }

    /// Set one key
    pub fn set_key(&mut self, key: LogicalKey, rgb: RgbColor) {
        self.write_at(key.offset() as usize, rgb);
    }

    /// Set every key
    pub fn set_all(&mut self, rgb: RgbColor) {
        for &key in LogicalKey::ALL {
            self.set_key(key, rgb);
        }
    }

    /// Set several keys
    pub fn set_many(&mut self, colors: &HashMap<LogicalKey, RgbColor>) {
        for (&key, &rgb) in colors {
            self.set_key(key, rgb);
        }
    }

    /// Set a raw grid index, including positions without a named key
    pub fn set_index(&mut self, index: u8, rgb: RgbColor) -> Result<(), VulcanError> {
        let offset = grid_offset(index) as usize;
        if offset + BLUE_PLANE as usize >= COLOR_BUFFER_LEN {
            return Err(VulcanError::InvalidParameter(format!(
                "grid index {index} is outside the color buffer"
            )));
        }
        self.write_at(offset, rgb);
        Ok(())
    }

    /// Replace the whole buffer with device-layout bytes
    pub fn set_raw(&mut self, bytes: &[u8]) -> Result<(), VulcanError> {
        if bytes.len() != COLOR_BUFFER_LEN {
            return Err(VulcanError::InvalidParameter(format!(
                "color buffer must be {COLOR_BUFFER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        self.bytes.copy_from_slice(bytes);
        Ok(())
    }

    /// Read back one key
    pub fn get_key(&self, key: LogicalKey) -> RgbColor {
        let offset = key.offset() as usize;
        RgbColor::new(
            self.bytes[offset],
            self.bytes[offset + GREEN_PLANE as usize],
            self.bytes[offset + BLUE_PLANE as usize],
        )
    }

    /// Turn every LED off
    pub fn clear(&mut self) {
        self.bytes = [0; COLOR_BUFFER_LEN];
    }

    /// Copy of the stored bytes
    pub fn raw_snapshot(&self) -> ColorFrame {
        self.bytes
    }

    /// Copy of the stored bytes scaled to a brightness level
    ///
    /// Levels above `BRIGHTNESS_MAX` are treated as `BRIGHTNESS_MAX`.
    pub fn brightness_adjusted(&self, level: u8) -> ColorFrame {
        let level = level.min(BRIGHTNESS_MAX);
        if level == BRIGHTNESS_MAX {
            return self.bytes;
        }

        let mut out = [0u8; COLOR_BUFFER_LEN];
        for (dst, &src) in out.iter_mut().zip(self.bytes.iter()) {
            *dst = scale_channel(src, level);
        }
        out
    }
}

/// `value * level / 69`, truncated
#[inline]
fn scale_channel(value: u8, level: u8) -> u8 {
    (value as u16 * level as u16 / BRIGHTNESS_MAX as u16) as u8
}

/// Serialize a color frame into the 7-packet LED report.
///
/// ```text
/// packet 0: 00 A1 01 01 B4 | frame[0..60]
/// packet i: 00             | frame[i*64-4 .. i*64+60]   (i = 1..=6)
/// ```
pub fn encode_led_report(frame: &ColorFrame) -> LedReport {
    let mut report = [0u8; LED_REPORT_LEN];

    report[..LED_REPORT_HEADER.len()].copy_from_slice(&LED_REPORT_HEADER);
    report[LED_REPORT_HEADER.len()..LED_PACKET_LEN].copy_from_slice(&frame[..LEAD_IN_LEN]);

    for packet in 1..LED_PACKET_COUNT {
        let src = packet * CONTINUATION_LEN - (CONTINUATION_LEN - LEAD_IN_LEN);
        let dst = packet * LED_PACKET_LEN + 1;
        report[dst..dst + CONTINUATION_LEN].copy_from_slice(&frame[src..src + CONTINUATION_LEN]);
    }

    report
}

/// Strip packet framing from an LED report, recovering the color frame
pub fn decode_led_report(report: &LedReport) -> ColorFrame {
    let mut frame = [0u8; COLOR_BUFFER_LEN];
    frame[..LEAD_IN_LEN].copy_from_slice(&report[LED_REPORT_HEADER.len()..LED_PACKET_LEN]);

    for packet in 1..LED_PACKET_COUNT {
        let src = packet * LED_PACKET_LEN + 1;
        let dst = packet * CONTINUATION_LEN - (CONTINUATION_LEN - LEAD_IN_LEN);
        frame[dst..dst + CONTINUATION_LEN].copy_from_slice(&report[src..src + CONTINUATION_LEN]);
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterned() -> ColorBuffer {
        let mut bytes = [0u8; COLOR_BUFFER_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let mut buf = ColorBuffer::new();
        buf.set_raw(&bytes).unwrap();
        buf
    }

    #[test]
    fn set_key_writes_three_planes() {
        let mut buf = ColorBuffer::new();
        buf.set_key(LogicalKey::D2, RgbColor::new(1, 2, 3));
        let raw = buf.raw_snapshot();
        assert_eq!(raw[36], 1);
        assert_eq!(raw[48], 2);
        assert_eq!(raw[60], 3);
        assert_eq!(buf.get_key(LogicalKey::D2), RgbColor::new(1, 2, 3));
        assert_eq!(raw.iter().filter(|&&b| b != 0).count(), 3);
    }

    #[test]
    fn set_all_and_set_many() {
        let mut buf = ColorBuffer::new();
        buf.set_all(RgbColor::BLUE);
        for &key in LogicalKey::ALL {
            assert_eq!(buf.get_key(key), RgbColor::BLUE);
        }

        let colors = HashMap::from([
            (LogicalKey::Esc, RgbColor::RED),
            (LogicalKey::Space, RgbColor::GREEN),
        ]);
        buf.set_many(&colors);
        assert_eq!(buf.get_key(LogicalKey::Esc), RgbColor::RED);
        assert_eq!(buf.get_key(LogicalKey::Space), RgbColor::GREEN);
        assert_eq!(buf.get_key(LogicalKey::Tab), RgbColor::BLUE);

        buf.clear();
        assert!(buf.raw_snapshot().iter().all(|&b| b == 0));
    }

    #[test]
    fn set_index_bounds() {
        let mut buf = ColorBuffer::new();
        assert!(buf.set_index(22, RgbColor::WHITE).is_ok());
        assert_eq!(buf.raw_snapshot()[grid_offset(22) as usize], 255);
        assert!(buf.set_index(143, RgbColor::WHITE).is_ok());
        assert!(buf.set_index(144, RgbColor::WHITE).is_err());
    }

    #[test]
    fn set_raw_rejects_wrong_length() {
        let mut buf = ColorBuffer::new();
        assert!(matches!(
            buf.set_raw(&[0u8; 443]),
            Err(VulcanError::InvalidParameter(_))
        ));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut buf = ColorBuffer::new();
        let before = buf.raw_snapshot();
        buf.set_key(LogicalKey::Esc, RgbColor::WHITE);
        assert_eq!(before[0], 0);
        assert_eq!(buf.raw_snapshot()[0], 255);
    }

    #[test]
    fn brightness_identity_and_zero() {
        let buf = patterned();
        assert_eq!(buf.brightness_adjusted(BRIGHTNESS_MAX), buf.raw_snapshot());
        assert_eq!(buf.brightness_adjusted(200), buf.raw_snapshot());
        assert!(buf.brightness_adjusted(0).iter().all(|&b| b == 0));
    }

    #[test]
    fn brightness_truncates() {
        let mut buf = ColorBuffer::new();
        buf.set_key(LogicalKey::Esc, RgbColor::new(255, 100, 1));
        let half = buf.brightness_adjusted(34);
        // 255*34/69 = 125.65, 100*34/69 = 49.27, 1*34/69 = 0.49
        assert_eq!(half[0], 125);
        assert_eq!(half[12], 49);
        assert_eq!(half[24], 0);
    }

    #[test]
    fn brightness_is_monotonic() {
        for value in [1u8, 7, 68, 69, 128, 200, 255] {
            let mut prev = 0;
            for level in 0..=BRIGHTNESS_MAX {
                let scaled = scale_channel(value, level);
                assert!(scaled >= prev, "value {value} level {level}");
                prev = scaled;
            }
            assert_eq!(prev, value);
        }
    }

    #[test]
    fn brightness_leaves_buffer_untouched() {
        let buf = patterned();
        let before = buf.raw_snapshot();
        let _ = buf.brightness_adjusted(10);
        assert_eq!(buf.raw_snapshot(), before);
    }

    #[test]
    fn led_report_framing() {
        let frame = patterned().raw_snapshot();
        let report = encode_led_report(&frame);

        assert_eq!(report[..5], LED_REPORT_HEADER);
        assert_eq!(report[5..65], frame[..60]);
        for packet in 1..LED_PACKET_COUNT {
            let start = packet * LED_PACKET_LEN;
            assert_eq!(report[start], 0x00, "packet {packet} prefix");
            let src = packet * 64 - 4;
            assert_eq!(report[start + 1..start + 65], frame[src..src + 64]);
        }
    }

    #[test]
    fn led_report_reconstructs_frame() {
        let frame = patterned().raw_snapshot();
        let report = encode_led_report(&frame);

        let mut payload = Vec::with_capacity(COLOR_BUFFER_LEN);
        payload.extend_from_slice(&report[5..65]);
        for packet in 1..LED_PACKET_COUNT {
            let start = packet * LED_PACKET_LEN + 1;
            payload.extend_from_slice(&report[start..start + 64]);
        }
        assert_eq!(payload.as_slice(), frame.as_slice());
        assert_eq!(decode_led_report(&report), frame);
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(RgbColor::from_hsv(0.0, 1.0, 1.0), RgbColor::RED);
        assert_eq!(RgbColor::from_hsv(120.0, 1.0, 1.0), RgbColor::GREEN);
        assert_eq!(RgbColor::from_hsv(240.0, 1.0, 1.0), RgbColor::BLUE);
        assert_eq!(RgbColor::from_hsv(0.0, 0.0, 0.0), RgbColor::BLACK);
    }
}
