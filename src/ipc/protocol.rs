//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::{Mode, PresentationCommand};
use crate::slots::Content;

/// What the popup is currently showing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Popup {
    /// Popup is hidden
    #[default]
    Hidden,
    /// Popup is up for a copy
    Copy,
    /// Popup is up for a paste
    Paste,
}

impl From<Mode> for Popup {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Copy => Popup::Copy,
            Mode::Paste => Popup::Paste,
        }
    }
}

/// Display summary of one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotPreview {
    Empty,
    Text { preview: String },
    Image { width: usize, height: usize },
}

impl From<&Content> for SlotPreview {
    fn from(content: &Content) -> Self {
        match content {
            Content::Empty => SlotPreview::Empty,
            Content::Text(_) => SlotPreview::Text {
                preview: content.text_preview().unwrap_or_default(),
            },
            Content::Image(image) => SlotPreview::Image {
                width: image.width,
                height: image.height,
            },
        }
    }
}

/// Requests from the presentation surface to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Request previews of all slots
    GetSlots,

    /// The user clicked a slot (zero-based index)
    SelectSlot { slot: usize },

    /// The user dismissed the popup
    Cancel,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to presentation notifications
    Subscribe,
}

/// Responses from daemon to the presentation surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Slot previews, in slot order
    Slots { slots: Vec<SlotPreview> },

    /// Selection or cancel was accepted
    Accepted,

    /// Selection or cancel arrived with no selection window open
    Ignored { reason: String },

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification from daemon to the presentation surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Show the popup
    Show { mode: Mode },
    /// Hide the popup
    Hide,
    /// Redraw all slots
    Refresh { slots: Vec<SlotPreview> },
}

impl From<&PresentationCommand> for Notification {
    fn from(command: &PresentationCommand) -> Self {
        match command {
            PresentationCommand::Show(mode) => Notification::Show { mode: *mode },
            PresentationCommand::Hide => Notification::Hide,
            PresentationCommand::Refresh(slots) => Notification::Refresh {
                slots: previews(slots.iter()),
            },
        }
    }
}

/// Previews for a sequence of slot contents
pub fn previews<'a>(contents: impl Iterator<Item = &'a Content>) -> Vec<SlotPreview> {
    contents.map(SlotPreview::from).collect()
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// What the popup is showing
    pub popup: Popup,

    /// Whether the keyboard hook is installed
    pub hotkey_registered: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            popup: Popup::default(),
            hotkey_registered: false,
            uptime_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::{RasterImage, SLOT_COUNT};

    #[test]
    fn test_request_serialization() {
        let req = Request::SelectSlot { slot: 3 };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("select_slot"));
        assert!(json.contains("3"));
    }

    #[test]
    fn test_request_deserialization() {
        let req: Request = serde_json::from_str(r#"{"type":"cancel"}"#).unwrap();
        assert!(matches!(req, Request::Cancel));
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains("hidden"));
    }

    #[test]
    fn test_refresh_notification() {
        let mut slots: [Content; SLOT_COUNT] = Default::default();
        slots[0] = Content::text("a".repeat(600));
        slots[1] = Content::Image(RasterImage::new(3, 2, vec![0u8; 24]));
        let note = Notification::from(&PresentationCommand::Refresh(Box::new(slots)));

        let Notification::Refresh { slots } = note else {
            panic!("expected refresh");
        };
        assert_eq!(slots.len(), SLOT_COUNT);
        match &slots[0] {
            SlotPreview::Text { preview } => assert_eq!(preview.len(), 503),
            other => panic!("expected text preview, got {:?}", other),
        }
        assert_eq!(slots[1], SlotPreview::Image { width: 3, height: 2 });
        assert_eq!(slots[2], SlotPreview::Empty);
    }

    #[test]
    fn test_show_notification_json() {
        let note = Notification::from(&PresentationCommand::Show(Mode::Copy));
        let json = serde_json::to_string(&note).unwrap();
        assert_eq!(json, r#"{"type":"show","mode":"copy"}"#);
    }
}
