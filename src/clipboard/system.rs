//! OS clipboard access using arboard

use std::borrow::Cow;

use tracing::debug;

use crate::slots::{Content, RasterImage};

/// Errors from a single clipboard access
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard is held by another process")]
    Busy,

    #[error("clipboard is not available")]
    Unavailable,

    #[error("clipboard backend error: {0}")]
    Backend(String),
}

/// Raw clipboard access. Implementations classify whatever the OS holds
/// into a `Content`; formats they do not understand read as `Empty`.
pub trait ClipboardBackend {
    fn read(&mut self) -> Result<Content, ClipboardError>;

    /// Replace the clipboard contents; `Empty` clears it
    fn write(&mut self, content: &Content) -> Result<(), ClipboardError>;
}

/// The system clipboard, opened lazily and reopened after errors
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn clipboard(&mut self) -> Result<&mut arboard::Clipboard, ClipboardError> {
        if self.inner.is_none() {
            let clipboard = arboard::Clipboard::new().map_err(map_error)?;
            self.inner = Some(clipboard);
        }
        self.inner.as_mut().ok_or(ClipboardError::Unavailable)
    }

    /// Drop the handle so the next access opens a fresh one
    fn reset_on_error<T>(&mut self, result: Result<T, ClipboardError>) -> Result<T, ClipboardError> {
        if result.is_err() {
            self.inner = None;
        }
        result
    }

    fn read_inner(&mut self) -> Result<Content, ClipboardError> {
        let clipboard = self.clipboard()?;
        let text = clipboard.get_text();
        classify(text, || clipboard.get_image())
    }

    fn write_inner(&mut self, content: &Content) -> Result<(), ClipboardError> {
        let clipboard = self.clipboard()?;
        let result = match content {
            Content::Empty => clipboard.clear(),
            Content::Text(text) => clipboard.set_text(text.as_str()),
            Content::Image(image) => clipboard.set_image(arboard::ImageData {
                width: image.width,
                height: image.height,
                bytes: Cow::Borrowed(&image.pixels[..]),
            }),
        };
        result.map_err(map_error)
    }
}

impl ClipboardBackend for SystemClipboard {
    fn read(&mut self) -> Result<Content, ClipboardError> {
        let result = self.read_inner();
        self.reset_on_error(result)
    }

    fn write(&mut self, content: &Content) -> Result<(), ClipboardError> {
        let result = self.write_inner(content);
        self.reset_on_error(result)
    }
}

/// Turn the text read, and if needed the image read, into a `Content`.
/// Text wins when both representations are offered.
fn classify(
    text: Result<String, arboard::Error>,
    image: impl FnOnce() -> Result<arboard::ImageData<'static>, arboard::Error>,
) -> Result<Content, ClipboardError> {
    match text {
        Ok(text) => return Ok(Content::Text(text)),
        // Non-text or undecodable text; the image may still be there
        Err(arboard::Error::ContentNotAvailable | arboard::Error::ConversionFailure) => {}
        Err(e) => return Err(map_error(e)),
    }

    match image() {
        Ok(image) => Ok(Content::Image(RasterImage::new(
            image.width,
            image.height,
            image.bytes.into_owned(),
        ))),
        Err(arboard::Error::ContentNotAvailable | arboard::Error::ConversionFailure) => {
            debug!("clipboard holds no text or image");
            Ok(Content::Empty)
        }
        Err(e) => Err(map_error(e)),
    }
}

fn map_error(e: arboard::Error) -> ClipboardError {
    match e {
        arboard::Error::ClipboardOccupied => ClipboardError::Busy,
        arboard::Error::ClipboardNotSupported => ClipboardError::Unavailable,
        other => ClipboardError::Backend(other.to_string()),
    }
}
