//! Mode controller implementation
//!
//! Drives one copy or paste sequence at a time: a begin intent opens the
//! popup, and the following select or cancel intent completes it. The
//! arbiter guarantees that exactly one terminating intent follows each
//! begin, so the controller keeps no guard of its own.

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::clipboard::ClipboardBridge;
use crate::config::Timings;
use crate::events::{Intent, Mode, PresentationCommand};
use crate::slots::{Content, SlotIndex, SlotStore};

/// Owns the slots, the clipboard and the sequence in flight
pub struct ModeController {
    /// Mode of the sequence in flight, if any
    mode: Option<Mode>,
    /// Clipboard captured by the current copy sequence
    pending: Option<Content>,
    slots: SlotStore,
    bridge: ClipboardBridge,
    timings: Timings,
    /// Channel for presentation commands
    presentation_tx: broadcast::Sender<PresentationCommand>,
}

impl ModeController {
    pub fn new(
        bridge: ClipboardBridge,
        timings: Timings,
        presentation_tx: broadcast::Sender<PresentationCommand>,
    ) -> Self {
        Self {
            mode: None,
            pending: None,
            slots: SlotStore::new(),
            bridge,
            timings,
            presentation_tx,
        }
    }

    #[cfg(test)]
    /// Mode of the sequence in flight
    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    #[cfg(test)]
    pub fn slots(&self) -> &SlotStore {
        &self.slots
    }

    /// Run the controller, processing intents in arrival order
    pub async fn run(&mut self, mut intent_rx: mpsc::Receiver<Intent>) {
        info!("mode controller started");
        self.emit_refresh();

        while let Some(intent) = intent_rx.recv().await {
            self.handle(intent).await;
        }

        info!("mode controller stopped");
    }

    /// Handle a single intent
    pub async fn handle(&mut self, intent: Intent) {
        debug!(%intent, mode = ?self.mode, "handling intent");
        match intent {
            Intent::BeginCopy => self.begin_copy().await,
            Intent::BeginPaste => self.begin_paste(),
            Intent::SelectSlot(slot) => self.select_slot(slot).await,
            Intent::Cancel => self.cancel(),
        }
    }

    /// Copy the focused selection and show the popup in copy mode.
    ///
    /// The injected copy has no completion signal, so the clipboard is
    /// polled until it differs from what it held before the injection.
    /// If it never changes the unchanged contents are used.
    async fn begin_copy(&mut self) {
        self.warn_if_in_flight(Mode::Copy);

        let before = self.bridge.read().await;
        self.bridge.inject_copy();

        let attempts = self.timings.copy_poll_attempts.max(1);
        let mut captured = before.clone();
        for attempt in 1..=attempts {
            tokio::time::sleep(self.timings.copy_poll_interval).await;
            captured = self.bridge.read().await;
            if captured != before {
                debug!(attempt, kind = captured.kind(), "clipboard updated by injected copy");
                break;
            }
        }
        if captured == before {
            debug!(attempts, "clipboard unchanged after injected copy, keeping current contents");
        }

        info!(content = %captured, "copy sequence started");
        self.pending = Some(captured);
        self.mode = Some(Mode::Copy);
        self.emit(PresentationCommand::Show(Mode::Copy));
    }

    /// Show the popup in paste mode
    fn begin_paste(&mut self) {
        self.warn_if_in_flight(Mode::Paste);

        info!("paste sequence started");
        self.pending = None;
        self.mode = Some(Mode::Paste);
        self.emit(PresentationCommand::Show(Mode::Paste));
    }

    /// Complete the sequence in flight against a slot
    async fn select_slot(&mut self, slot: SlotIndex) {
        let Some(mode) = self.mode.take() else {
            warn!(%slot, "slot selected with no sequence in flight, ignoring");
            return;
        };

        match mode {
            Mode::Copy => {
                let content = self.pending.take().unwrap_or_default();
                info!(%slot, %content, "storing clipboard in slot");
                self.slots.set(slot, content);
                self.emit_refresh();

                // Leave the updated slot on screen briefly
                tokio::time::sleep(self.timings.copy_hold).await;
            }
            Mode::Paste => {
                let content = self.slots.get(slot).clone();
                info!(%slot, %content, "pasting slot");
                if self.bridge.write(&content).await {
                    self.bridge.inject_paste();
                } else {
                    warn!(%slot, "clipboard not updated, skipping paste");
                }
            }
        }

        self.emit(PresentationCommand::Hide);
    }

    /// Close the popup without touching slots or the clipboard
    fn cancel(&mut self) {
        if self.mode.is_none() {
            debug!("cancel with no sequence in flight");
        }
        info!(mode = ?self.mode, "sequence cancelled");
        self.mode = None;
        self.pending = None;
        self.emit(PresentationCommand::Hide);
    }

    fn warn_if_in_flight(&self, next: Mode) {
        if let Some(current) = self.mode {
            warn!(%current, %next, "begin received mid-sequence, restarting");
        }
    }

    fn emit_refresh(&self) {
        self.emit(PresentationCommand::Refresh(Box::new(self.slots.snapshot())));
    }

    /// Emit a presentation command; having no listener is fine
    fn emit(&self, command: PresentationCommand) {
        debug!(%command, "emitting presentation command");
        let _ = self.presentation_tx.send(command);
    }
}
