//! Key, modifier and chord definitions
//!
//! Provides the small key vocabulary the daemon binds to, macOS virtual
//! key codes for it, and a `Chord` type parsed from exact chord strings
//! such as `"ctrl+shift+c"`.

use std::str::FromStr;

/// Modifier key flag masks from macOS CGEventFlags
#[cfg(target_os = "macos")]
pub mod flags {
    use core_graphics::event::CGEventFlags;

    /// Control key modifier flag
    pub const CONTROL: CGEventFlags = CGEventFlags::CGEventFlagControl;
    /// Shift key modifier flag
    pub const SHIFT: CGEventFlags = CGEventFlags::CGEventFlagShift;
    /// Option/Alt key modifier flag
    pub const OPTION: CGEventFlags = CGEventFlags::CGEventFlagAlternate;
    /// Command key modifier flag
    pub const COMMAND: CGEventFlags = CGEventFlags::CGEventFlagCommand;
}

/// macOS virtual key codes (ANSI layout)
pub mod keycode {
    pub const C: u16 = 0x08;
    pub const V: u16 = 0x09;
    pub const DIGIT_1: u16 = 0x12;
    pub const DIGIT_2: u16 = 0x13;
    pub const DIGIT_3: u16 = 0x14;
    pub const DIGIT_4: u16 = 0x15;
    pub const DIGIT_6: u16 = 0x16;
    pub const DIGIT_5: u16 = 0x17;
    pub const DIGIT_9: u16 = 0x19;
    pub const DIGIT_7: u16 = 0x1A;
    pub const DIGIT_8: u16 = 0x1C;
    pub const DIGIT_0: u16 = 0x1D;
    pub const ESCAPE: u16 = 0x35;
    pub const COMMAND: u16 = 0x37;
    pub const SHIFT: u16 = 0x38;
    pub const OPTION: u16 = 0x3A;
    pub const CONTROL: u16 = 0x3B;
    pub const RIGHT_COMMAND: u16 = 0x36;
    pub const RIGHT_SHIFT: u16 = 0x3C;
    pub const RIGHT_OPTION: u16 = 0x3D;
    pub const RIGHT_CONTROL: u16 = 0x3E;
}

/// A non-modifier key the daemon cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    C,
    V,
    /// Top-row digit key, `0..=9`
    Digit(u8),
    Escape,
}

const DIGIT_CODES: [u16; 10] = [
    keycode::DIGIT_0,
    keycode::DIGIT_1,
    keycode::DIGIT_2,
    keycode::DIGIT_3,
    keycode::DIGIT_4,
    keycode::DIGIT_5,
    keycode::DIGIT_6,
    keycode::DIGIT_7,
    keycode::DIGIT_8,
    keycode::DIGIT_9,
];

impl Key {
    /// Look up a key from a macOS virtual key code
    pub fn from_keycode(code: u16) -> Option<Self> {
        match code {
            keycode::C => Some(Key::C),
            keycode::V => Some(Key::V),
            keycode::ESCAPE => Some(Key::Escape),
            _ => DIGIT_CODES
                .iter()
                .position(|&c| c == code)
                .map(|d| Key::Digit(d as u8)),
        }
    }

    /// macOS virtual key code for this key
    pub fn keycode(self) -> u16 {
        match self {
            Key::C => keycode::C,
            Key::V => keycode::V,
            Key::Escape => keycode::ESCAPE,
            Key::Digit(d) => DIGIT_CODES[(d % 10) as usize],
        }
    }
}

impl FromStr for Key {
    type Err = ChordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c" => Ok(Key::C),
            "v" => Ok(Key::V),
            "esc" | "escape" => Ok(Key::Escape),
            _ => match s.as_bytes() {
                [d @ b'0'..=b'9'] => Ok(Key::Digit(d - b'0')),
                _ => Err(ChordParseError::UnknownKey(s.to_string())),
            },
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::C => write!(f, "c"),
            Key::V => write!(f, "v"),
            Key::Digit(d) => write!(f, "{}", d),
            Key::Escape => write!(f, "esc"),
        }
    }
}

/// Tracks which modifier keys are currently pressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModifierState {
    /// Control key is held
    pub control: bool,
    /// Shift key is held
    pub shift: bool,
    /// Option/Alt key is held
    pub option: bool,
    /// Command key is held
    pub command: bool,
}

impl ModifierState {
    /// Create a new ModifierState from CGEventFlags
    #[cfg(target_os = "macos")]
    pub fn from_flags(event_flags: core_graphics::event::CGEventFlags) -> Self {
        Self {
            control: event_flags.contains(flags::CONTROL),
            shift: event_flags.contains(flags::SHIFT),
            option: event_flags.contains(flags::OPTION),
            command: event_flags.contains(flags::COMMAND),
        }
    }

    /// CGEventFlags carrying exactly these modifiers
    #[cfg(target_os = "macos")]
    pub fn to_flags(&self) -> core_graphics::event::CGEventFlags {
        let mut event_flags = core_graphics::event::CGEventFlags::empty();
        for (held, flag) in [
            (self.control, flags::CONTROL),
            (self.shift, flags::SHIFT),
            (self.option, flags::OPTION),
            (self.command, flags::COMMAND),
        ] {
            if held {
                event_flags.insert(flag);
            }
        }
        event_flags
    }

    #[cfg(test)]
    /// Check if all modifiers are released
    pub fn is_empty(&self) -> bool {
        !self.control && !self.shift && !self.option && !self.command
    }

    /// Left and right key codes of every modifier that is set
    pub fn keycodes(&self) -> Vec<u16> {
        let mut codes = Vec::new();
        if self.control {
            codes.extend([keycode::CONTROL, keycode::RIGHT_CONTROL]);
        }
        if self.shift {
            codes.extend([keycode::SHIFT, keycode::RIGHT_SHIFT]);
        }
        if self.option {
            codes.extend([keycode::OPTION, keycode::RIGHT_OPTION]);
        }
        if self.command {
            codes.extend([keycode::COMMAND, keycode::RIGHT_COMMAND]);
        }
        codes
    }
}

/// A key pressed together with an exact set of modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    pub modifiers: ModifierState,
    pub key: Key,
}

impl Chord {
    pub const fn new(modifiers: ModifierState, key: Key) -> Self {
        Self { modifiers, key }
    }

    /// A key with no modifiers held
    pub const fn bare(key: Key) -> Self {
        Self {
            modifiers: ModifierState {
                control: false,
                shift: false,
                option: false,
                command: false,
            },
            key,
        }
    }

    /// Every physical key code that must be up before the chord counts as released
    pub fn keycodes(&self) -> Vec<u16> {
        let mut codes = self.modifiers.keycodes();
        codes.push(self.key.keycode());
        codes
    }
}

impl FromStr for Chord {
    type Err = ChordParseError;

    /// Parse an exact chord string like `"ctrl+shift+c"`.
    ///
    /// Exactly one non-modifier key is required and must come last.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let mut parts: Vec<&str> = lowered.split('+').map(str::trim).collect();
        let key_part = parts.pop().filter(|p| !p.is_empty()).ok_or(ChordParseError::Empty)?;

        let mut modifiers = ModifierState::default();
        for part in parts {
            let slot = match part {
                "ctrl" | "control" => &mut modifiers.control,
                "shift" => &mut modifiers.shift,
                "alt" | "option" => &mut modifiers.option,
                "cmd" | "command" | "meta" => &mut modifiers.command,
                other => return Err(ChordParseError::UnknownModifier(other.to_string())),
            };
            if std::mem::replace(slot, true) {
                return Err(ChordParseError::DuplicateModifier(part.to_string()));
            }
        }

        Ok(Chord::new(modifiers, key_part.parse()?))
    }
}

impl std::fmt::Display for Chord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = &self.modifiers;
        for (held, name) in [
            (m.control, "ctrl"),
            (m.shift, "shift"),
            (m.option, "alt"),
            (m.command, "cmd"),
        ] {
            if held {
                write!(f, "{}+", name)?;
            }
        }
        write!(f, "{}", self.key)
    }
}

/// Errors from parsing a chord string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChordParseError {
    #[error("chord string is empty")]
    Empty,

    #[error("unknown key: {0}")]
    UnknownKey(String),

    #[error("unknown modifier: {0}")]
    UnknownModifier(String),

    #[error("modifier listed twice: {0}")]
    DuplicateModifier(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state() {
        let state = ModifierState::default();
        assert!(state.is_empty());
        assert!(state.keycodes().is_empty());
    }

    #[test]
    fn test_parse_trigger_chord() {
        let chord: Chord = "ctrl+shift+c".parse().unwrap();
        assert!(chord.modifiers.control);
        assert!(chord.modifiers.shift);
        assert!(!chord.modifiers.option);
        assert!(!chord.modifiers.command);
        assert_eq!(chord.key, Key::C);
        assert_eq!(chord.to_string(), "ctrl+shift+c");
    }

    #[test]
    fn test_parse_bare_keys() {
        assert_eq!("7".parse::<Chord>().unwrap(), Chord::bare(Key::Digit(7)));
        assert_eq!("Esc".parse::<Chord>().unwrap(), Chord::bare(Key::Escape));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Chord>(), Err(ChordParseError::Empty));
        assert_eq!("ctrl+".parse::<Chord>(), Err(ChordParseError::Empty));
        assert!(matches!(
            "hyper+c".parse::<Chord>(),
            Err(ChordParseError::UnknownModifier(_))
        ));
        assert!(matches!(
            "ctrl+ctrl+c".parse::<Chord>(),
            Err(ChordParseError::DuplicateModifier(_))
        ));
        assert!(matches!(
            "ctrl+shift+f13".parse::<Chord>(),
            Err(ChordParseError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_keycode_round_trip_for_digits() {
        for d in 0..10 {
            let key = Key::Digit(d);
            assert_eq!(Key::from_keycode(key.keycode()), Some(key));
        }
        assert_eq!(Key::from_keycode(keycode::ESCAPE), Some(Key::Escape));
        assert_eq!(Key::from_keycode(0x7F), None);
    }

    #[test]
    fn test_chord_release_keys() {
        let chord: Chord = "ctrl+shift+v".parse().unwrap();
        let codes = chord.keycodes();
        assert!(codes.contains(&keycode::CONTROL));
        assert!(codes.contains(&keycode::RIGHT_SHIFT));
        assert!(codes.contains(&keycode::V));
        assert!(!codes.contains(&keycode::COMMAND));
    }
}
