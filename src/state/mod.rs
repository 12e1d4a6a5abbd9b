//! Mode controller module
//!
//! Runs the user-visible modal sequence:
//! - BeginCopy: inject a copy, capture the clipboard, show the popup
//! - BeginPaste: show the popup
//! - SelectSlot: store into or paste from a slot, then hide
//! - Cancel: hide without side effects

mod machine;

pub use machine::ModeController;
