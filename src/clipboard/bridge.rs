//! Clipboard bridge with bounded retries
//!
//! Clipboard access can fail transiently while another process holds the
//! pasteboard. Reads and writes are retried a fixed number of times with a
//! growing pause; once retries run out a read degrades to `Empty` and a
//! write is dropped. Neither surfaces an error to the caller.

use std::time::Duration;

use tracing::{debug, warn};

use super::inject::{copy_shortcut, paste_shortcut, KeyInjector};
use super::system::{ClipboardBackend, ClipboardError};
use crate::config::Timings;
use crate::hotkey::Chord;
use crate::slots::Content;

/// How often and how patiently clipboard access is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Pause after the first failure; grows linearly with each attempt
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Pause after the given failed attempt, saturating for absurd settings
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl From<&Timings> for RetryPolicy {
    fn from(timings: &Timings) -> Self {
        Self {
            attempts: timings.clipboard_retries.max(1),
            backoff: timings.clipboard_backoff,
        }
    }
}

pub struct ClipboardBridge {
    backend: Box<dyn ClipboardBackend>,
    injector: Box<dyn KeyInjector>,
    retry: RetryPolicy,
}

impl ClipboardBridge {
    pub fn new(
        backend: Box<dyn ClipboardBackend>,
        injector: Box<dyn KeyInjector>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            injector,
            retry,
        }
    }

    /// Current clipboard contents, or `Empty` if it cannot be read
    pub async fn read(&mut self) -> Content {
        match self.with_retry(|backend| backend.read()).await {
            Ok(content) => content,
            Err(e) => {
                warn!(?e, attempts = self.retry.attempts, "clipboard read failed, using empty content");
                Content::Empty
            }
        }
    }

    /// Set the clipboard; `Empty` clears it. Returns whether it stuck.
    pub async fn write(&mut self, content: &Content) -> bool {
        match self.with_retry(|backend| backend.write(content)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(?e, kind = content.kind(), "clipboard write failed");
                false
            }
        }
    }

    /// Ask the focused application to copy its selection
    pub fn inject_copy(&self) {
        self.inject(copy_shortcut());
    }

    /// Ask the focused application to paste
    pub fn inject_paste(&self) {
        self.inject(paste_shortcut());
    }

    fn inject(&self, chord: Chord) {
        match self.injector.inject(chord) {
            Ok(()) => debug!(%chord, "injected shortcut"),
            Err(e) => warn!(?e, %chord, "failed to inject shortcut"),
        }
    }

    async fn with_retry<T>(
        &mut self,
        mut op: impl FnMut(&mut Box<dyn ClipboardBackend>) -> Result<T, ClipboardError>,
    ) -> Result<T, ClipboardError> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(&mut self.backend) {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    debug!(?e, attempt, "clipboard access failed, retrying");
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
