//! Synthetic keystroke injection
//!
//! Posts a key chord to the session as if it had been typed, so the
//! focused application performs its own copy or paste.

use crate::hotkey::{Chord, Key, ModifierState};

/// Errors from posting a synthetic key event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectError {
    #[error("failed to create event source")]
    EventSource,

    #[error("failed to create keyboard event")]
    EventCreation,

    #[error("key injection is not supported on this platform")]
    Unsupported,
}

/// Sends key chords to the focused application
pub trait KeyInjector {
    /// Press and release `chord`. There is no confirmation that anything
    /// received it.
    fn inject(&self, chord: Chord) -> Result<(), InjectError>;
}

/// The platform's copy shortcut (Cmd+C on macOS)
pub fn copy_shortcut() -> Chord {
    Chord::new(platform_modifier(), Key::C)
}

/// The platform's paste shortcut (Cmd+V on macOS)
pub fn paste_shortcut() -> Chord {
    Chord::new(platform_modifier(), Key::V)
}

fn platform_modifier() -> ModifierState {
    if cfg!(target_os = "macos") {
        ModifierState {
            command: true,
            ..Default::default()
        }
    } else {
        ModifierState {
            control: true,
            ..Default::default()
        }
    }
}

/// Injects through the HID event stream using Core Graphics
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInjector;

impl SystemInjector {
    pub fn new() -> Self {
        Self
    }
}

impl KeyInjector for SystemInjector {
    #[cfg(target_os = "macos")]
    fn inject(&self, chord: Chord) -> Result<(), InjectError> {
        use core_graphics::event::{CGEvent, CGEventTapLocation};
        use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

        let flags = chord.modifiers.to_flags();
        let keycode = chord.key.keycode();

        for key_down in [true, false] {
            let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
                .map_err(|_| InjectError::EventSource)?;
            let event = CGEvent::new_keyboard_event(source, keycode, key_down)
                .map_err(|_| InjectError::EventCreation)?;
            event.set_flags(flags);
            event.post(CGEventTapLocation::HID);
        }

        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    fn inject(&self, _chord: Chord) -> Result<(), InjectError> {
        Err(InjectError::Unsupported)
    }
}
