//! Clipboard module: OS clipboard access and keystroke injection
//!
//! `ClipboardBridge` is what the mode controller talks to. It wraps a
//! `ClipboardBackend` (arboard in production) with bounded retries and a
//! `KeyInjector` that sends the platform copy/paste shortcut to the
//! focused application.

mod bridge;
mod inject;
mod system;

pub use bridge::{ClipboardBridge, RetryPolicy};
pub use inject::{InjectError, KeyInjector, SystemInjector};
pub use system::{ClipboardBackend, ClipboardError, SystemClipboard};
