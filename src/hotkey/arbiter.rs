//! Hotkey arbitration for the modal slot sequence
//!
//! The arbiter owns the sequence guard, an atomic `ArbiterState`:
//!
//! ```text
//! Idle --trigger chord--> ArmedForTrigger --chord released--> AwaitingSelection
//!   ^                                                                |
//!   +------------------------- digit / escape / pointer -------------+
//! ```
//!
//! Key events are classified on the hook thread against the binding table
//! of the current state, and every guard transition is a single
//! compare-and-swap, so a held or repeated chord arms at most one sequence
//! and a selection is delivered at most once. Each transition and the
//! signal it produces are made under one lock, so the worker sees signals
//! in transition order even when the hook and IPC threads race. Anything slow (waiting for
//! the chord to be released) and every intent dispatch happens on the
//! worker thread, which handles signals strictly in order.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::bindings::{Action, BindingTable, Bindings};
use super::keys::Chord;
use super::keystate::KeyStateQuery;
use super::listener::HotkeyError;
use crate::config::Timings;
use crate::events::{Intent, Mode};
use crate::slots::SlotIndex;

/// Where the arbiter is within a sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ArbiterState {
    /// Waiting for a trigger chord
    #[default]
    Idle = 0,
    /// A trigger fired; waiting for its keys to be released
    ArmedForTrigger = 1,
    /// Digit and Escape keys are live
    AwaitingSelection = 2,
}

impl ArbiterState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ArbiterState::ArmedForTrigger,
            2 => ArbiterState::AwaitingSelection,
            _ => ArbiterState::Idle,
        }
    }
}

impl std::fmt::Display for ArbiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArbiterState::Idle => write!(f, "Idle"),
            ArbiterState::ArmedForTrigger => write!(f, "ArmedForTrigger"),
            ArbiterState::AwaitingSelection => write!(f, "AwaitingSelection"),
        }
    }
}

/// Atomic holder for `ArbiterState`; only moves by compare-and-swap
#[derive(Debug, Default)]
struct SequenceGuard {
    state: AtomicU8,
}

impl SequenceGuard {
    fn load(&self) -> ArbiterState {
        ArbiterState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Move `from -> to`; fails if another thread got there first
    fn transition(&self, from: ArbiterState, to: ArbiterState) -> bool {
        let moved = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if moved {
            debug!(%from, %to, "arbiter transition");
        }
        moved
    }
}

/// Work handed from the hook side to the arbiter worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterSignal {
    /// A trigger was accepted; wait for release, then open the selection window
    Arm { mode: Mode, chord: Chord },
    /// Forward an intent to the mode controller
    Dispatch(Intent),
}

/// What the hook should do with the key event it reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Deliver the event to the focused application
    PassThrough,
    /// Swallow the event
    Suppress,
}

/// Hook-side half of the arbiter. Shared between the keyboard hook and the
/// presentation surface, both of which feed selections through it.
pub struct HotkeyArbiter {
    guard: SequenceGuard,
    bindings: Bindings,
    signal_tx: Mutex<std_mpsc::Sender<ArbiterSignal>>,
}

impl HotkeyArbiter {
    pub fn new(bindings: Bindings, signal_tx: std_mpsc::Sender<ArbiterSignal>) -> Self {
        Self {
            guard: SequenceGuard::default(),
            bindings,
            signal_tx: Mutex::new(signal_tx),
        }
    }

    /// Current state
    pub fn state(&self) -> ArbiterState {
        self.guard.load()
    }

    /// Bindings live in the current state
    pub fn active_bindings(&self) -> &BindingTable {
        self.bindings.for_state(self.state())
    }

    /// Classify a key-down event reported by the hook.
    ///
    /// Must stay fast: it runs inside the OS event tap callback.
    pub fn handle_key(&self, chord: Chord) -> KeyDisposition {
        let table = self.active_bindings();
        if table.is_empty() {
            return KeyDisposition::PassThrough;
        }
        let Some(binding) = table.lookup(&chord).copied() else {
            return KeyDisposition::PassThrough;
        };

        match binding.action {
            Action::Trigger(mode) => {
                self.arm(mode, chord);
            }
            Action::Select(slot) => {
                self.close_selection(Intent::SelectSlot(slot));
            }
            Action::Cancel => {
                self.close_selection(Intent::Cancel);
            }
        }

        if binding.suppress {
            KeyDisposition::Suppress
        } else {
            KeyDisposition::PassThrough
        }
    }

    /// Pick a slot on behalf of the presentation surface.
    ///
    /// Returns `false` if no selection window is open.
    pub fn select_slot(&self, slot: SlotIndex) -> bool {
        self.close_selection(Intent::SelectSlot(slot))
    }

    /// Dismiss the selection window on behalf of the presentation surface
    pub fn cancel(&self) -> bool {
        self.close_selection(Intent::Cancel)
    }

    fn arm(&self, mode: Mode, chord: Chord) -> bool {
        // Held across the transition and the send so signals queue in
        // the order their transitions happened
        let signal_tx = self.lock_signal_tx();

        if !self
            .guard
            .transition(ArbiterState::Idle, ArbiterState::ArmedForTrigger)
        {
            debug!(%mode, state = %self.state(), "trigger ignored, sequence in progress");
            return false;
        }

        if signal_tx.send(ArbiterSignal::Arm { mode, chord }).is_err() {
            warn!(%mode, "arbiter worker is gone, disarming");
            self.guard
                .transition(ArbiterState::ArmedForTrigger, ArbiterState::Idle);
            return false;
        }

        true
    }

    fn close_selection(&self, intent: Intent) -> bool {
        let signal_tx = self.lock_signal_tx();

        if !self
            .guard
            .transition(ArbiterState::AwaitingSelection, ArbiterState::Idle)
        {
            debug!(%intent, state = %self.state(), "selection ignored, no window open");
            return false;
        }

        if signal_tx.send(ArbiterSignal::Dispatch(intent)).is_err() {
            warn!(%intent, "arbiter worker is gone, intent dropped");
            return false;
        }

        true
    }

    fn lock_signal_tx(&self) -> MutexGuard<'_, std_mpsc::Sender<ArbiterSignal>> {
        // The sender has no invariant a panicking holder could break
        self.signal_tx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the selection keys live once the trigger chord is released
    pub(crate) fn open_selection(&self) -> bool {
        self.guard
            .transition(ArbiterState::ArmedForTrigger, ArbiterState::AwaitingSelection)
    }
}

/// Bounds for the chord-release wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseWait {
    pub poll: Duration,
    pub timeout: Duration,
}

impl From<&Timings> for ReleaseWait {
    fn from(timings: &Timings) -> Self {
        Self {
            poll: timings.release_poll,
            timeout: timings.release_timeout,
        }
    }
}

/// Block until none of `keycodes` is held, or until `timeout` passes.
///
/// Returns `false` on timeout. Callers proceed either way.
pub fn wait_for_release(
    key_state: &dyn KeyStateQuery,
    keycodes: &[u16],
    poll: Duration,
    timeout: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !keycodes.iter().any(|&code| key_state.is_pressed(code)) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(poll);
    }
}

/// Worker-side half of the arbiter
pub struct ArbiterWorker<K> {
    arbiter: Arc<HotkeyArbiter>,
    key_state: K,
    intent_tx: mpsc::Sender<Intent>,
    release: ReleaseWait,
}

impl<K: KeyStateQuery + 'static> ArbiterWorker<K> {
    pub fn new(
        arbiter: Arc<HotkeyArbiter>,
        key_state: K,
        intent_tx: mpsc::Sender<Intent>,
        release: ReleaseWait,
    ) -> Self {
        Self {
            arbiter,
            key_state,
            intent_tx,
            release,
        }
    }

    /// Run the worker on a dedicated thread until either channel closes
    pub fn spawn(
        self,
        signal_rx: std_mpsc::Receiver<ArbiterSignal>,
    ) -> Result<thread::JoinHandle<()>, HotkeyError> {
        thread::Builder::new()
            .name("hotkey-arbiter".to_string())
            .spawn(move || self.run(signal_rx))
            .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))
    }

    fn run(&self, signal_rx: std_mpsc::Receiver<ArbiterSignal>) {
        info!("arbiter worker started");

        while let Ok(signal) = signal_rx.recv() {
            if !self.process(signal) {
                break;
            }
        }

        info!("arbiter worker stopped");
    }

    /// Handle one signal; `false` once the controller has gone away
    fn process(&self, signal: ArbiterSignal) -> bool {
        match signal {
            ArbiterSignal::Arm { mode, chord } => {
                let released = wait_for_release(
                    &self.key_state,
                    &chord.keycodes(),
                    self.release.poll,
                    self.release.timeout,
                );
                if !released {
                    warn!(%chord, "chord still reported down after timeout, continuing");
                }

                // Dispatched before the window opens, so no selection can
                // overtake its begin intent.
                if !self.dispatch(Intent::begin(mode)) {
                    return false;
                }
                if self.arbiter.open_selection() {
                    debug!(%mode, keys = self.arbiter.active_bindings().len(), "selection window open");
                }
                true
            }
            ArbiterSignal::Dispatch(intent) => self.dispatch(intent),
        }
    }

    fn dispatch(&self, intent: Intent) -> bool {
        debug!(%intent, "dispatching intent");
        if self.intent_tx.blocking_send(intent).is_err() {
            warn!(%intent, "intent channel closed");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::keys::Key;
    use std::sync::atomic::AtomicUsize;

    /// Reports keys as held for a fixed number of polls
    #[derive(Clone, Default)]
    struct FakeKeys {
        held_polls: Arc<AtomicUsize>,
    }

    impl FakeKeys {
        fn held_for(polls: usize) -> Self {
            Self {
                held_polls: Arc::new(AtomicUsize::new(polls)),
            }
        }
    }

    impl KeyStateQuery for FakeKeys {
        fn is_pressed(&self, _keycode: u16) -> bool {
            self.held_polls
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    /// Reports every key as held forever
    struct StuckKeys;

    impl KeyStateQuery for StuckKeys {
        fn is_pressed(&self, _keycode: u16) -> bool {
            true
        }
    }

    const NO_WAIT: ReleaseWait = ReleaseWait {
        poll: Duration::ZERO,
        timeout: Duration::ZERO,
    };

    struct Harness<K> {
        arbiter: Arc<HotkeyArbiter>,
        worker: ArbiterWorker<K>,
        signal_rx: std_mpsc::Receiver<ArbiterSignal>,
        intent_rx: mpsc::Receiver<Intent>,
    }

    impl<K: KeyStateQuery + 'static> Harness<K> {
        fn new(key_state: K) -> Self {
            let (signal_tx, signal_rx) = std_mpsc::channel();
            let (intent_tx, intent_rx) = mpsc::channel(64);
            let arbiter = Arc::new(HotkeyArbiter::new(
                Bindings::standard().unwrap(),
                signal_tx,
            ));
            let worker = ArbiterWorker::new(Arc::clone(&arbiter), key_state, intent_tx, NO_WAIT);
            Self {
                arbiter,
                worker,
                signal_rx,
                intent_rx,
            }
        }

        /// Process one pending signal, if any
        fn step(&self) -> bool {
            match self.signal_rx.try_recv() {
                Ok(signal) => {
                    self.worker.process(signal);
                    true
                }
                Err(_) => false,
            }
        }

        fn pump(&self) {
            while self.step() {}
        }

        fn intents(&mut self) -> Vec<Intent> {
            let mut out = Vec::new();
            while let Ok(intent) = self.intent_rx.try_recv() {
                out.push(intent);
            }
            out
        }

        fn key(&self, chord: &str) -> KeyDisposition {
            self.arbiter.handle_key(chord.parse().unwrap())
        }
    }

    fn slot(n: usize) -> SlotIndex {
        SlotIndex::new(n).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let h = Harness::new(FakeKeys::default());
        assert_eq!(h.arbiter.state(), ArbiterState::Idle);
        assert_eq!(h.arbiter.active_bindings().len(), 2);
    }

    #[test]
    fn test_trigger_arms_and_opens_window() {
        let mut h = Harness::new(FakeKeys::default());

        assert_eq!(h.key("ctrl+shift+c"), KeyDisposition::PassThrough);
        assert_eq!(h.arbiter.state(), ArbiterState::ArmedForTrigger);
        assert!(h.arbiter.active_bindings().is_empty());

        h.pump();
        assert_eq!(h.arbiter.state(), ArbiterState::AwaitingSelection);
        assert_eq!(h.arbiter.active_bindings().len(), 11);
        assert_eq!(h.intents(), vec![Intent::BeginCopy]);
    }

    #[test]
    fn test_repeated_trigger_arms_once() {
        let mut h = Harness::new(FakeKeys::default());

        h.key("ctrl+shift+c");
        h.key("ctrl+shift+c");
        h.key("ctrl+shift+v");
        h.pump();
        h.key("ctrl+shift+c");
        h.pump();

        assert_eq!(h.intents(), vec![Intent::BeginCopy]);
        assert_eq!(h.arbiter.state(), ArbiterState::AwaitingSelection);
    }

    #[test]
    fn test_digit_while_idle_is_ignored() {
        let mut h = Harness::new(FakeKeys::default());

        assert_eq!(h.key("3"), KeyDisposition::PassThrough);
        assert_eq!(h.key("esc"), KeyDisposition::PassThrough);
        h.pump();

        assert_eq!(h.arbiter.state(), ArbiterState::Idle);
        assert!(h.intents().is_empty());
    }

    #[test]
    fn test_digit_before_release_is_not_bound() {
        let mut h = Harness::new(FakeKeys::default());

        h.key("ctrl+shift+v");
        assert_eq!(h.key("5"), KeyDisposition::PassThrough);
        h.pump();

        assert_eq!(h.intents(), vec![Intent::BeginPaste]);
        assert_eq!(h.arbiter.state(), ArbiterState::AwaitingSelection);
    }

    #[test]
    fn test_digit_selects_slot_and_returns_to_idle() {
        let mut h = Harness::new(FakeKeys::default());

        h.key("ctrl+shift+v");
        h.pump();
        assert_eq!(h.key("3"), KeyDisposition::Suppress);
        assert_eq!(h.arbiter.state(), ArbiterState::Idle);
        h.pump();

        assert_eq!(
            h.intents(),
            vec![Intent::BeginPaste, Intent::SelectSlot(slot(2))]
        );
    }

    #[test]
    fn test_trigger_accepted_right_after_selection() {
        let mut h = Harness::new(FakeKeys::default());

        h.key("ctrl+shift+c");
        h.pump();
        h.key("0");
        h.key("ctrl+shift+v");
        h.pump();

        assert_eq!(
            h.intents(),
            vec![
                Intent::BeginCopy,
                Intent::SelectSlot(slot(9)),
                Intent::BeginPaste
            ]
        );
        assert_eq!(h.arbiter.state(), ArbiterState::AwaitingSelection);
    }

    #[test]
    fn test_escape_cancels() {
        let mut h = Harness::new(FakeKeys::default());

        h.key("ctrl+shift+c");
        h.pump();
        assert_eq!(h.key("esc"), KeyDisposition::Suppress);
        h.pump();

        assert_eq!(h.intents(), vec![Intent::BeginCopy, Intent::Cancel]);
        assert_eq!(h.arbiter.state(), ArbiterState::Idle);
    }

    #[test]
    fn test_modified_digit_passes_through() {
        let mut h = Harness::new(FakeKeys::default());

        h.key("ctrl+shift+c");
        h.pump();
        assert_eq!(h.key("cmd+1"), KeyDisposition::PassThrough);
        h.pump();

        assert_eq!(h.intents(), vec![Intent::BeginCopy]);
        assert_eq!(h.arbiter.state(), ArbiterState::AwaitingSelection);
    }

    #[test]
    fn test_pointer_selection_uses_same_path() {
        let mut h = Harness::new(FakeKeys::default());

        assert!(!h.arbiter.select_slot(slot(4)));
        assert!(!h.arbiter.cancel());

        h.key("ctrl+shift+v");
        h.pump();
        assert!(h.arbiter.select_slot(slot(4)));
        assert!(!h.arbiter.select_slot(slot(5)));
        assert_eq!(h.key("6"), KeyDisposition::PassThrough);
        h.pump();

        assert_eq!(
            h.intents(),
            vec![Intent::BeginPaste, Intent::SelectSlot(slot(4))]
        );
    }

    #[test]
    fn test_wait_for_release_polls_until_up() {
        let keys = FakeKeys::held_for(3);
        let released = wait_for_release(
            &keys,
            &[0x3B],
            Duration::ZERO,
            Duration::from_secs(5),
        );
        assert!(released);
        assert_eq!(keys.held_polls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_wait_for_release_gives_up() {
        let released = wait_for_release(
            &StuckKeys,
            &[0x3B],
            Duration::from_millis(1),
            Duration::from_millis(5),
        );
        assert!(!released);
    }

    #[test]
    fn test_stuck_keys_fail_open() {
        let mut h = Harness::new(StuckKeys);

        h.key("ctrl+shift+c");
        h.pump();

        assert_eq!(h.intents(), vec![Intent::BeginCopy]);
        assert_eq!(h.arbiter.state(), ArbiterState::AwaitingSelection);
    }

    #[test]
    fn test_trigger_disarms_when_worker_is_gone() {
        let h = Harness::new(FakeKeys::default());
        let Harness {
            arbiter, signal_rx, ..
        } = h;
        drop(signal_rx);

        arbiter.handle_key("ctrl+shift+c".parse().unwrap());
        assert_eq!(arbiter.state(), ArbiterState::Idle);
    }

    #[test]
    fn test_concurrent_selections_deliver_once() {
        let mut h = Harness::new(FakeKeys::default());
        h.key("ctrl+shift+v");
        h.pump();

        let arbiter = &h.arbiter;
        let winners = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| scope.spawn(move || arbiter.select_slot(slot(i))))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|won| *won)
                .count()
        });
        h.pump();

        assert_eq!(winners, 1);
        let intents = h.intents();
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0], Intent::BeginPaste);
        assert!(matches!(intents[1], Intent::SelectSlot(_)));
        assert_eq!(h.arbiter.state(), ArbiterState::Idle);
    }

    #[test]
    fn test_pointer_selection_stays_ahead_of_racing_trigger() {
        for _ in 0..2000 {
            let mut h = Harness::new(FakeKeys::default());
            h.key("ctrl+shift+c");
            h.pump();
            assert_eq!(h.intents(), vec![Intent::BeginCopy]);

            let arbiter = &h.arbiter;
            thread::scope(|scope| {
                scope.spawn(move || assert!(arbiter.select_slot(slot(1))));
                scope.spawn(move || {
                    while arbiter.state() != ArbiterState::Idle {
                        std::hint::spin_loop();
                    }
                    arbiter.handle_key("ctrl+shift+v".parse().unwrap());
                });
            });
            h.pump();

            assert_eq!(
                h.intents(),
                vec![Intent::SelectSlot(slot(1)), Intent::BeginPaste]
            );
            assert_eq!(h.arbiter.state(), ArbiterState::AwaitingSelection);
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum Event {
        TriggerCopy,
        TriggerPaste,
        WorkerStep,
        Digit,
        Escape,
        Pointer,
    }

    const EVENTS: [Event; 6] = [
        Event::TriggerCopy,
        Event::TriggerPaste,
        Event::WorkerStep,
        Event::Digit,
        Event::Escape,
        Event::Pointer,
    ];

    fn run_trace(trace: &[Event]) {
        let mut h = Harness::new(FakeKeys::default());

        for event in trace {
            match event {
                Event::TriggerCopy => {
                    h.key("ctrl+shift+c");
                }
                Event::TriggerPaste => {
                    h.key("ctrl+shift+v");
                }
                Event::WorkerStep => {
                    h.step();
                }
                Event::Digit => {
                    h.key("7");
                }
                Event::Escape => {
                    h.key("esc");
                }
                Event::Pointer => {
                    h.arbiter.select_slot(slot(1));
                }
            }

            let live_selection = h
                .arbiter
                .active_bindings()
                .lookup(&Chord::bare(Key::Escape))
                .is_some();
            assert_eq!(
                live_selection,
                h.arbiter.state() == ArbiterState::AwaitingSelection,
                "trace {:?}",
                trace
            );
        }
        h.pump();

        let mut open = false;
        for intent in h.intents() {
            match intent {
                Intent::BeginCopy | Intent::BeginPaste => {
                    assert!(!open, "overlapping windows in trace {:?}", trace);
                    open = true;
                }
                Intent::SelectSlot(_) | Intent::Cancel => {
                    assert!(open, "selection outside a window in trace {:?}", trace);
                    open = false;
                }
            }
        }
        assert_eq!(
            open,
            h.arbiter.state() == ArbiterState::AwaitingSelection,
            "trace {:?}",
            trace
        );
    }

    #[test]
    fn test_all_interleavings_keep_one_window() {
        for len in 1..=6u32 {
            for code in 0..EVENTS.len().pow(len) {
                let mut n = code;
                let trace: Vec<Event> = (0..len)
                    .map(|_| {
                        let event = EVENTS[n % EVENTS.len()];
                        n /= EVENTS.len();
                        event
                    })
                    .collect();
                run_trace(&trace);
            }
        }
    }
}
