//! Logical keys, scancode lookup and color-buffer addressing.
//!
//! Every physical key has a grid index: the LED matrix is walked in groups of
//! 12, and each group occupies 36 bytes of the color buffer (12 red, 12 green,
//! 12 blue). Indices are sparse; positions that exist only on the other
//! layout (or on no board at all) are simply never assigned.

use std::fmt;

/// LEDs per row group in the color buffer
pub const GROUP_LEN: u16 = 12;

/// Bytes occupied by one row group (three color planes)
pub const GROUP_STRIDE: u16 = GROUP_LEN * 3;

/// Distance from a key's red byte to its green byte
pub const GREEN_PLANE: u16 = GROUP_LEN;

/// Distance from a key's red byte to its blue byte
pub const BLUE_PLANE: u16 = GROUP_LEN * 2;

/// Red-byte offset of a raw grid index
#[inline]
pub const fn grid_offset(index: u8) -> u16 {
    let index = index as u16;
    (index / GROUP_LEN) * GROUP_STRIDE + (index % GROUP_LEN)
}

macro_rules! logical_keys {
    ($( $name:ident = $index:literal => $label:literal, )*) => {
        /// A physical key position, valued by its grid index
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum LogicalKey {
            $( $name = $index, )*
        }

        impl LogicalKey {
            /// Every key, in grid order
            pub const ALL: &'static [LogicalKey] = &[ $( LogicalKey::$name, )* ];

            /// Look up a key by grid index
            pub fn from_index(index: u8) -> Option<Self> {
                match index {
                    $( $index => Some(Self::$name), )*
                    _ => None,
                }
            }

            /// Display name
            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$name => $label, )*
                }
            }
        }
    };
}

logical_keys! {
    // Column 1
    Esc = 0 => "Esc",
    Tilde = 1 => "`",
    Tab = 2 => "Tab",
    CapsLock = 3 => "Caps",
    LeftShift = 4 => "LShift",
    LeftControl = 5 => "LCtrl",
    // Column 2
    D1 = 6 => "1",
    Q = 7 => "Q",
    A = 8 => "A",
    IsoBackslash = 9 => "ISO \\",
    LeftWindows = 10 => "LWin",
    // Column 3
    F1 = 11 => "F1",
    D2 = 12 => "2",
    W = 13 => "W",
    S = 14 => "S",
    Z = 15 => "Z",
    LeftAlt = 16 => "LAlt",
    // Column 4
    F2 = 17 => "F2",
    D3 = 18 => "3",
    E = 19 => "E",
    D = 20 => "D",
    X = 21 => "X",
    // Column 5
    F3 = 23 => "F3",
    D4 = 24 => "4",
    R = 25 => "R",
    F = 26 => "F",
    C = 27 => "C",
    // Column 6
    F4 = 28 => "F4",
    D5 = 29 => "5",
    T = 30 => "T",
    G = 31 => "G",
    V = 32 => "V",
    // Column 7
    D6 = 33 => "6",
    Y = 34 => "Y",
    H = 35 => "H",
    B = 36 => "B",
    Space = 37 => "Space",
    // Column 8
    F5 = 48 => "F5",
    D7 = 49 => "7",
    U = 50 => "U",
    J = 51 => "J",
    N = 52 => "N",
    // Column 9
    F6 = 53 => "F6",
    D8 = 54 => "8",
    I = 55 => "I",
    K = 56 => "K",
    M = 57 => "M",
    // Column 10
    F7 = 59 => "F7",
    D9 = 60 => "9",
    O = 61 => "O",
    L = 62 => "L",
    Comma = 63 => ",",
    // Column 11
    F8 = 65 => "F8",
    D0 = 66 => "0",
    P = 67 => "P",
    Semicolon = 68 => ";",
    Period = 69 => ".",
    RightAlt = 70 => "RAlt",
    // Column 12
    Minus = 72 => "-",
    OpenBracket = 73 => "[",
    Apostrophe = 74 => "'",
    Slash = 75 => "/",
    Fn = 76 => "Fn",
    // Column 13
    F9 = 78 => "F9",
    Equals = 79 => "=",
    CloseBracket = 80 => "]",
    Backslash = 81 => "\\",
    RightShift = 82 => "RShift",
    Application = 83 => "Menu",
    // Column 14
    F10 = 84 => "F10",
    F11 = 85 => "F11",
    F12 = 86 => "F12",
    Backspace = 87 => "Bksp",
    Enter = 88 => "Enter",
    RightControl = 89 => "RCtrl",
    IsoHash = 96 => "ISO #",
    // Column 15
    PrintScreen = 99 => "PrtSc",
    Insert = 100 => "Ins",
    Delete = 101 => "Del",
    ArrowLeft = 102 => "Left",
    // Column 16
    ScrollLock = 103 => "ScrLk",
    Home = 104 => "Home",
    End = 105 => "End",
    ArrowUp = 106 => "Up",
    ArrowDown = 107 => "Down",
    // Column 17
    Pause = 108 => "Pause",
    PageUp = 109 => "PgUp",
    PageDown = 110 => "PgDn",
    ArrowRight = 111 => "Right",
    // Column 18
    NumLock = 113 => "NumLk",
    Numpad7 = 114 => "Num7",
    Numpad4 = 115 => "Num4",
    Numpad1 = 116 => "Num1",
    Numpad0 = 117 => "Num0",
    // Column 19
    NumpadDivide = 119 => "Num/",
    Numpad8 = 120 => "Num8",
    Numpad5 = 121 => "Num5",
    Numpad2 = 122 => "Num2",
    // Column 20
    NumpadMultiply = 124 => "Num*",
    Numpad9 = 125 => "Num9",
    Numpad6 = 126 => "Num6",
    Numpad3 = 127 => "Num3",
    NumpadDecimal = 128 => "Num.",
    // Column 21
    NumpadSubtract = 129 => "Num-",
    NumpadAdd = 130 => "Num+",
    NumpadEnter = 131 => "NumEnter",
}

impl LogicalKey {
    /// Grid index of this key
    #[inline]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Red-byte offset of this key in the color buffer
    #[inline]
    pub const fn offset(self) -> u16 {
        grid_offset(self as u8)
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Physical layout variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyboardLayout {
    #[default]
    Iso,
    Ansi,
}

/// Scancode shared by the ISO `#` key and the ANSI `\` key
const SCANCODE_HASH_OR_BACKSLASH: u8 = 100;

/// Scancodes common to both layouts
const SCANCODES: &[(u8, LogicalKey)] = &[
    (0x11, LogicalKey::Esc),
    (0x12, LogicalKey::Tilde),
    (0x14, LogicalKey::Tab),
    (0x16, LogicalKey::LeftShift),
    (0x17, LogicalKey::LeftControl),
    (0x13, LogicalKey::D1),
    (0x1A, LogicalKey::Q),
    (0x1C, LogicalKey::A),
    (29, LogicalKey::IsoBackslash),
    (31, LogicalKey::LeftWindows),
    (16, LogicalKey::F1),
    (25, LogicalKey::D2),
    (27, LogicalKey::W),
    (37, LogicalKey::S),
    (38, LogicalKey::Z),
    (39, LogicalKey::LeftAlt),
    (24, LogicalKey::F2),
    (34, LogicalKey::D3),
    (36, LogicalKey::E),
    (44, LogicalKey::D),
    (45, LogicalKey::X),
    (33, LogicalKey::F3),
    (35, LogicalKey::D4),
    (43, LogicalKey::R),
    (53, LogicalKey::F),
    (46, LogicalKey::C),
    (32, LogicalKey::F4),
    (42, LogicalKey::D5),
    (51, LogicalKey::T),
    (52, LogicalKey::G),
    (54, LogicalKey::V),
    (41, LogicalKey::D6),
    (59, LogicalKey::Y),
    (61, LogicalKey::H),
    (62, LogicalKey::B),
    (63, LogicalKey::Space),
    (40, LogicalKey::F5),
    (49, LogicalKey::D7),
    (60, LogicalKey::U),
    (68, LogicalKey::J),
    (71, LogicalKey::N),
    (48, LogicalKey::F6),
    (66, LogicalKey::D8),
    (67, LogicalKey::I),
    (69, LogicalKey::K),
    (70, LogicalKey::M),
    (56, LogicalKey::F7),
    (65, LogicalKey::D9),
    (76, LogicalKey::O),
    (77, LogicalKey::L),
    (78, LogicalKey::Comma),
    (57, LogicalKey::F8),
    (74, LogicalKey::D0),
    (84, LogicalKey::P),
    (85, LogicalKey::Semicolon),
    (86, LogicalKey::Period),
    (103, LogicalKey::RightAlt),
    (75, LogicalKey::Minus),
    (91, LogicalKey::OpenBracket),
    (93, LogicalKey::Apostrophe),
    (94, LogicalKey::Slash),
    (119, LogicalKey::Fn),
    (64, LogicalKey::F9),
    (83, LogicalKey::Equals),
    (92, LogicalKey::CloseBracket),
    (110, LogicalKey::RightShift),
    (127, LogicalKey::Application),
    (72, LogicalKey::F10),
    (80, LogicalKey::F11),
    (81, LogicalKey::F12),
    (73, LogicalKey::Backspace),
    (107, LogicalKey::Enter),
    (135, LogicalKey::RightControl),
    (88, LogicalKey::PrintScreen),
    (89, LogicalKey::Insert),
    (90, LogicalKey::Delete),
    (109, LogicalKey::ArrowLeft),
    (96, LogicalKey::ScrollLock),
    (97, LogicalKey::Home),
    (98, LogicalKey::End),
    (108, LogicalKey::ArrowUp),
    (117, LogicalKey::ArrowDown),
    (104, LogicalKey::Pause),
    (105, LogicalKey::PageUp),
    (106, LogicalKey::PageDown),
    (125, LogicalKey::ArrowRight),
    (113, LogicalKey::NumLock),
    (114, LogicalKey::Numpad7),
    (115, LogicalKey::Numpad4),
    (116, LogicalKey::Numpad1),
    (133, LogicalKey::Numpad0),
    (121, LogicalKey::NumpadDivide),
    (122, LogicalKey::Numpad8),
    (123, LogicalKey::Numpad5),
    (124, LogicalKey::Numpad2),
    (129, LogicalKey::NumpadMultiply),
    (130, LogicalKey::Numpad9),
    (131, LogicalKey::Numpad6),
    (132, LogicalKey::Numpad3),
    (141, LogicalKey::NumpadDecimal),
    (137, LogicalKey::NumpadSubtract),
    (138, LogicalKey::NumpadAdd),
    (140, LogicalKey::NumpadEnter),
];

/// Immutable scancode <-> key tables for one layout.
///
/// Built once and shared (`Arc<KeyMap>`) between the session and its
/// input readers.
#[derive(Clone)]
pub struct KeyMap {
    layout: KeyboardLayout,
    by_scancode: [Option<LogicalKey>; 256],
    by_key: [Option<u8>; 256],
}

impl KeyMap {
    /// Build the tables for a layout
    pub fn new(layout: KeyboardLayout) -> Self {
        let mut by_scancode = [None; 256];
        let mut by_key = [None; 256];

        let layout_specific = match layout {
            KeyboardLayout::Iso => LogicalKey::IsoHash,
            KeyboardLayout::Ansi => LogicalKey::Backslash,
        };
        let entries = SCANCODES
            .iter()
            .copied()
            .chain(std::iter::once((SCANCODE_HASH_OR_BACKSLASH, layout_specific)));

        for (code, key) in entries {
            by_scancode[code as usize] = Some(key);
            by_key[key.index() as usize] = Some(code);
        }

        Self {
            layout,
            by_scancode,
            by_key,
        }
    }

    /// Layout these tables were built for
    pub fn layout(&self) -> KeyboardLayout {
        self.layout
    }

    /// Map a raw scancode to its key
    #[inline]
    pub fn scancode_to_key(&self, code: u8) -> Option<LogicalKey> {
        self.by_scancode[code as usize]
    }

    /// Map a key back to the scancode the board emits for it
    ///
    /// Caps Lock has no scancode: it is reported through its own frame header.
    #[inline]
    pub fn key_to_scancode(&self, key: LogicalKey) -> Option<u8> {
        self.by_key[key.index() as usize]
    }

    /// Red-byte offset of a key in the color buffer
    #[inline]
    pub fn key_offset(&self, key: LogicalKey) -> u16 {
        key.offset()
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new(KeyboardLayout::default())
    }
}

impl fmt::Debug for KeyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMap")
            .field("layout", &self.layout)
            .field(
                "scancodes",
                &self.by_scancode.iter().filter(|k| k.is_some()).count(),
            )
            .finish()
    }
}
