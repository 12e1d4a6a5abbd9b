//! Hotkey module for global keyboard event handling
//!
//! Uses a macOS CGEventTap to watch key-down events, and an arbiter that
//! turns trigger chords, digit keys and Escape into controller intents.

mod arbiter;
mod bindings;
mod keys;
mod keystate;
mod listener;

pub use arbiter::{ArbiterSignal, ArbiterState, ArbiterWorker, HotkeyArbiter, ReleaseWait};
pub use bindings::Bindings;
pub use keys::{Chord, Key, ModifierState};
pub use keystate::SessionKeyState;
pub use listener::{HotkeyError, KeyboardHook};
