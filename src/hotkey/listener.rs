//! Global keyboard hook using macOS CGEventTap
//!
//! Intercepts system-wide key-down events and lets the arbiter decide
//! whether each one is consumed. Runs on a dedicated thread with its own
//! CFRunLoop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;

use tracing::{error, info};

use super::arbiter::HotkeyArbiter;

/// Global keyboard hook feeding key-down events to the arbiter
pub struct KeyboardHook {
    arbiter: Arc<HotkeyArbiter>,
    running: Arc<AtomicBool>,
}

impl KeyboardHook {
    /// Create a new keyboard hook
    pub fn new(arbiter: Arc<HotkeyArbiter>) -> Self {
        Self {
            arbiter,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the keyboard hook
    ///
    /// This spawns a dedicated thread that runs a CFRunLoop to receive
    /// CGEventTap callbacks, and waits until the tap is installed. An error
    /// here means no hotkey will ever fire.
    pub fn start(&self) -> Result<(), HotkeyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let arbiter = Arc::clone(&self.arbiter);
        let running = Arc::clone(&self.running);
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), HotkeyError>>();

        let spawned = thread::Builder::new()
            .name("keyboard-hook".to_string())
            .spawn(move || {
                info!("keyboard hook thread started");

                if let Err(e) = run_event_loop(arbiter, running.clone(), &ready_tx) {
                    error!(?e, "keyboard hook error");
                    let _ = ready_tx.send(Err(e));
                }

                running.store(false, Ordering::SeqCst);
                info!("keyboard hook thread stopped");
            });

        if let Err(e) = spawned {
            self.running.store(false, Ordering::SeqCst);
            return Err(HotkeyError::ThreadSpawn(e.to_string()));
        }

        match ready_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(HotkeyError::EventTapCreation),
        }
    }

    /// Stop the keyboard hook
    pub fn stop(&self) {
        // The run loop notices on its next iteration
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the hook is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the hotkey subsystem
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("keyboard hook is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to spawn hotkey thread: {0}")]
    ThreadSpawn(String),

    #[error("global keyboard hooks are not supported on this platform")]
    Unsupported,
}

/// Run the CFRunLoop with the event tap
#[cfg(target_os = "macos")]
fn run_event_loop(
    arbiter: Arc<HotkeyArbiter>,
    running: Arc<AtomicBool>,
    ready_tx: &std_mpsc::Sender<Result<(), HotkeyError>>,
) -> Result<(), HotkeyError> {
    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
        CGEventType, EventField,
    };
    use tracing::warn;

    use super::arbiter::KeyDisposition;
    use super::keys::{Chord, Key, ModifierState};

    let tap_disabled = Arc::new(AtomicBool::new(false));
    let tap_disabled_cb = Arc::clone(&tap_disabled);

    // CGEventTap callback - must be fast and non-blocking
    let callback = move |_proxy: core_graphics::event::CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
          -> Option<CGEvent> {
        match event_type {
            CGEventType::KeyDown => {
                let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
                let Some(key) = u16::try_from(code).ok().and_then(Key::from_keycode) else {
                    return Some(event.clone());
                };

                let chord = Chord::new(ModifierState::from_flags(event.get_flags()), key);
                match arbiter.handle_key(chord) {
                    KeyDisposition::Suppress => None,
                    KeyDisposition::PassThrough => Some(event.clone()),
                }
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                warn!("event tap disabled, will re-enable");
                tap_disabled_cb.store(true, Ordering::SeqCst);
                Some(event.clone())
            }
            _ => Some(event.clone()),
        }
    };

    // Create the event tap; the default option lets the callback drop events
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default,
        vec![CGEventType::KeyDown],
        callback,
    )
    .map_err(|_| {
        error!("failed to create event tap - is Accessibility permission granted?");
        HotkeyError::EventTapCreation
    })?;

    // Enable the tap
    tap.enable();

    // Create a run loop source and add it to the current run loop
    let run_loop_source = tap
        .mach_port
        .create_runloop_source(0)
        .map_err(|_| HotkeyError::EventTapCreation)?;
    let run_loop = CFRunLoop::get_current();

    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    info!("event tap created and enabled");
    let _ = ready_tx.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        // Run the loop for a short interval, then check for shutdown
        unsafe {
            CFRunLoop::run_in_mode(
                kCFRunLoopDefaultMode,
                std::time::Duration::from_millis(100),
                true,
            );
        }

        if tap_disabled.swap(false, Ordering::SeqCst) {
            tap.enable();
            info!("event tap re-enabled");
        }
    }

    // Tap will be automatically cleaned up when it goes out of scope

    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn run_event_loop(
    _arbiter: Arc<HotkeyArbiter>,
    _running: Arc<AtomicBool>,
    _ready_tx: &std_mpsc::Sender<Result<(), HotkeyError>>,
) -> Result<(), HotkeyError> {
    Err(HotkeyError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::Bindings;

    fn create_hook() -> KeyboardHook {
        let (tx, _rx) = std_mpsc::channel();
        let arbiter = Arc::new(HotkeyArbiter::new(Bindings::standard().unwrap(), tx));
        KeyboardHook::new(arbiter)
    }

    #[test]
    fn test_hook_creation() {
        let hook = create_hook();
        assert!(!hook.is_running());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_start_fails_without_platform_support() {
        let hook = create_hook();
        assert!(matches!(hook.start(), Err(HotkeyError::Unsupported)));
        hook.stop();
        assert!(!hook.is_running());
    }
}
