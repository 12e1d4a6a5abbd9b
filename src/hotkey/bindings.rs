//! Declarative hotkey binding tables
//!
//! The daemon never registers or removes individual listeners. Instead it
//! keeps one table per arbiter state and looks keys up in the table that
//! belongs to the current state, so the set of live bindings is always
//! derived from that state and changes as a unit.

use super::arbiter::ArbiterState;
use super::keys::{Chord, ChordParseError, Key};
use crate::events::Mode;
use crate::slots::SlotIndex;

/// Chord that starts a copy sequence
pub const TRIGGER_COPY: &str = "ctrl+shift+c";
/// Chord that starts a paste sequence
pub const TRIGGER_PASTE: &str = "ctrl+shift+v";
/// Key that cancels an open selection window
pub const CANCEL_KEY: &str = "esc";

/// What a bound chord does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start a sequence in the given mode
    Trigger(Mode),
    /// Pick a slot
    Select(SlotIndex),
    /// Close the selection window without acting
    Cancel,
}

/// A chord mapped to an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub chord: Chord,
    pub action: Action,
    /// Whether the key event is withheld from other applications
    pub suppress: bool,
}

/// A set of bindings that are installed and removed together
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: Vec<Binding>,
}

impl BindingTable {
    /// Find the binding for an exact chord
    pub fn lookup(&self, chord: &Chord) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.chord == *chord)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }
}

/// Binding tables for every arbiter state
#[derive(Debug, Clone)]
pub struct Bindings {
    triggers: BindingTable,
    selection: BindingTable,
    none: BindingTable,
}

impl Bindings {
    /// The fixed bindings: two trigger chords, digits `0`-`9` and Escape
    pub fn standard() -> Result<Self, ChordParseError> {
        let triggers = BindingTable {
            bindings: vec![
                Binding {
                    chord: TRIGGER_COPY.parse()?,
                    action: Action::Trigger(Mode::Copy),
                    suppress: false,
                },
                Binding {
                    chord: TRIGGER_PASTE.parse()?,
                    action: Action::Trigger(Mode::Paste),
                    suppress: false,
                },
            ],
        };

        let mut selection = Vec::with_capacity(11);
        for digit in 0..10u8 {
            if let Some(slot) = SlotIndex::from_digit_key(digit) {
                selection.push(Binding {
                    chord: Chord::bare(Key::Digit(digit)),
                    action: Action::Select(slot),
                    suppress: true,
                });
            }
        }
        selection.push(Binding {
            chord: CANCEL_KEY.parse()?,
            action: Action::Cancel,
            suppress: true,
        });

        Ok(Self {
            triggers,
            selection: BindingTable {
                bindings: selection,
            },
            none: BindingTable::default(),
        })
    }

    /// Bindings that are live in the given state
    pub fn for_state(&self, state: ArbiterState) -> &BindingTable {
        match state {
            ArbiterState::Idle => &self.triggers,
            ArbiterState::ArmedForTrigger => &self.none,
            ArbiterState::AwaitingSelection => &self.selection,
        }
    }

    /// The chord that triggers a mode
    pub fn trigger_chord(&self, mode: Mode) -> Option<Chord> {
        self.triggers
            .iter()
            .find(|b| b.action == Action::Trigger(mode))
            .map(|b| b.chord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::keys::ModifierState;

    #[test]
    fn test_idle_binds_only_triggers() {
        let bindings = Bindings::standard().unwrap();
        let table = bindings.for_state(ArbiterState::Idle);
        assert_eq!(table.len(), 2);
        assert!(table.lookup(&Chord::bare(Key::Digit(1))).is_none());

        let copy: Chord = "ctrl+shift+c".parse().unwrap();
        assert_eq!(
            table.lookup(&copy).map(|b| b.action),
            Some(Action::Trigger(Mode::Copy))
        );
    }

    #[test]
    fn test_armed_binds_nothing() {
        let bindings = Bindings::standard().unwrap();
        assert!(bindings.for_state(ArbiterState::ArmedForTrigger).is_empty());
    }

    #[test]
    fn test_selection_binds_digits_and_escape() {
        let bindings = Bindings::standard().unwrap();
        let table = bindings.for_state(ArbiterState::AwaitingSelection);
        assert_eq!(table.len(), 11);
        assert!(table.iter().all(|b| b.suppress));

        let one = table.lookup(&Chord::bare(Key::Digit(1))).unwrap();
        assert_eq!(one.action, Action::Select(SlotIndex::new(0).unwrap()));

        let zero = table.lookup(&Chord::bare(Key::Digit(0))).unwrap();
        assert_eq!(zero.action, Action::Select(SlotIndex::new(9).unwrap()));

        let esc = table.lookup(&Chord::bare(Key::Escape)).unwrap();
        assert_eq!(esc.action, Action::Cancel);

        let triggers: Chord = "ctrl+shift+v".parse().unwrap();
        assert!(table.lookup(&triggers).is_none());
    }

    #[test]
    fn test_selection_ignores_modified_digits() {
        let bindings = Bindings::standard().unwrap();
        let table = bindings.for_state(ArbiterState::AwaitingSelection);
        let shifted = Chord::new(
            ModifierState {
                shift: true,
                ..Default::default()
            },
            Key::Digit(3),
        );
        assert!(table.lookup(&shifted).is_none());
    }

    #[test]
    fn test_trigger_chord_lookup() {
        let bindings = Bindings::standard().unwrap();
        let paste = bindings.trigger_chord(Mode::Paste).unwrap();
        assert_eq!(paste.to_string(), "ctrl+shift+v");
    }
}
