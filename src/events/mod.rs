//! Events module for the modal copy/paste sequence
//!
//! Provides the intents that flow from the hotkey arbiter (and the
//! presentation surface) into the mode controller, and the presentation
//! commands the controller emits in return.

use serde::{Deserialize, Serialize};

use crate::slots::{Content, SlotIndex, SLOT_COUNT};

/// Which way a sequence moves content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Capture the current selection into a slot
    Copy,
    /// Paste a slot into the focused application
    Paste,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Copy => write!(f, "copy"),
            Mode::Paste => write!(f, "paste"),
        }
    }
}

/// High-level intents consumed by the mode controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Trigger chord for copy fired and was released
    BeginCopy,
    /// Trigger chord for paste fired and was released
    BeginPaste,
    /// A slot was picked by digit key or pointer
    SelectSlot(SlotIndex),
    /// Escape pressed or the popup was dismissed
    Cancel,
}

impl Intent {
    /// The begin intent for a mode
    pub fn begin(mode: Mode) -> Self {
        match mode {
            Mode::Copy => Intent::BeginCopy,
            Mode::Paste => Intent::BeginPaste,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::BeginCopy => write!(f, "BEGIN_COPY"),
            Intent::BeginPaste => write!(f, "BEGIN_PASTE"),
            Intent::SelectSlot(slot) => write!(f, "SELECT_SLOT ({})", slot),
            Intent::Cancel => write!(f, "CANCEL"),
        }
    }
}

/// Commands issued to the presentation surface
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationCommand {
    /// Show the popup in the given mode
    Show(Mode),
    /// Hide the popup
    Hide,
    /// Redraw all ten slots
    Refresh(Box<[Content; SLOT_COUNT]>),
}

impl std::fmt::Display for PresentationCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresentationCommand::Show(mode) => write!(f, "SHOW ({})", mode),
            PresentationCommand::Hide => write!(f, "HIDE"),
            PresentationCommand::Refresh(slots) => {
                let filled = slots.iter().filter(|c| !c.is_empty()).count();
                write!(f, "REFRESH ({} filled)", filled)
            }
        }
    }
}
