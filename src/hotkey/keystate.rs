//! Physical key-state queries
//!
//! Used by the arbiter to wait until a trigger chord has been let go
//! before the selection keys go live.

/// Reports whether a key is physically held down
pub trait KeyStateQuery: Send {
    /// `true` while the key with the given macOS virtual key code is down
    fn is_pressed(&self, keycode: u16) -> bool;
}

#[cfg(target_os = "macos")]
mod ffi {
    /// kCGEventSourceStateCombinedSessionState
    pub const COMBINED_SESSION_STATE: i32 = 0;

    #[link(name = "CoreGraphics", kind = "framework")]
    extern "C" {
        pub fn CGEventSourceKeyState(state_id: i32, key: u16) -> bool;
    }
}

/// Key state as seen by the current login session
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionKeyState;

impl KeyStateQuery for SessionKeyState {
    #[cfg(target_os = "macos")]
    fn is_pressed(&self, keycode: u16) -> bool {
        // SAFETY: CGEventSourceKeyState only reads global input state.
        unsafe { ffi::CGEventSourceKeyState(ffi::COMBINED_SESSION_STATE, keycode) }
    }

    #[cfg(not(target_os = "macos"))]
    fn is_pressed(&self, _keycode: u16) -> bool {
        false
    }
}
