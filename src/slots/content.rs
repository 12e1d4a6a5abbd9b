//! Slot content values

use std::sync::Arc;

/// Maximum number of characters shown in a text preview
const PREVIEW_CHARS: usize = 500;

/// An RGBA8 raster image as exchanged with the OS clipboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Row-major RGBA bytes, `width * height * 4` long
    pub pixels: Arc<[u8]>,
}

impl RasterImage {
    pub fn new(width: usize, height: usize, pixels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }
}

/// Content held by a slot or read from the clipboard
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Content {
    /// No payload
    #[default]
    Empty,
    /// Plain text
    Text(String),
    /// Raster image
    Image(RasterImage),
}

impl Content {
    #[cfg(test)]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Content::Empty)
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Content::Empty => "empty",
            Content::Text(_) => "text",
            Content::Image(_) => "image",
        }
    }

    /// Text preview for display, truncated to a fixed number of characters
    pub fn text_preview(&self) -> Option<String> {
        let Content::Text(text) = self else {
            return None;
        };

        let mut chars = text.char_indices();
        match chars.nth(PREVIEW_CHARS) {
            Some((cut, _)) => Some(format!("{}...", &text[..cut])),
            None => Some(text.clone()),
        }
    }
}

impl std::fmt::Display for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Content::Empty => write!(f, "empty"),
            Content::Text(text) => write!(f, "text ({} chars)", text.chars().count()),
            Content::Image(image) => write!(f, "image ({}x{})", image.width, image.height),
        }
    }
}
