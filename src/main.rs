//! clipslots: Background daemon providing ten hotkey-addressed clipboard slots
//!
//! This daemon provides:
//! - Global trigger chords (Ctrl+Shift+C / Ctrl+Shift+V) via CGEventTap
//! - A selection window where a digit picks a slot and Escape cancels
//! - Slot storage for text and images, read and written through the clipboard
//! - IPC server for the popup renderer

mod clipboard;
mod config;
mod events;
mod hotkey;
mod ipc;
mod lifecycle;
mod slots;
mod state;

use std::sync::mpsc as std_mpsc;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::clipboard::{ClipboardBridge, RetryPolicy, SystemClipboard, SystemInjector};
use crate::config::Config;
use crate::events::{Intent, Mode, PresentationCommand};
use crate::hotkey::{
    ArbiterWorker, Bindings, HotkeyArbiter, KeyboardHook, ReleaseWait, SessionKeyState,
};
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::state::ModeController;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "clipslots starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, timings = ?config.timings, "configuration loaded");

    let shutdown = ShutdownSignal::new();

    // Keyboard hook -> arbiter worker
    let (signal_tx, signal_rx) = std_mpsc::channel();
    // Arbiter worker -> mode controller
    let (intent_tx, intent_rx) = mpsc::channel::<Intent>(32);
    // Mode controller -> presentation surface
    let (presentation_tx, _presentation_rx) = broadcast::channel::<PresentationCommand>(64);

    let bindings = Bindings::standard()?;
    for mode in [Mode::Copy, Mode::Paste] {
        if let Some(chord) = bindings.trigger_chord(mode) {
            info!(%mode, %chord, "trigger bound");
        }
    }
    let arbiter = Arc::new(HotkeyArbiter::new(bindings, signal_tx));

    // The worker owns the release wait so the hook callback never blocks
    let worker = ArbiterWorker::new(
        Arc::clone(&arbiter),
        SessionKeyState,
        intent_tx,
        ReleaseWait::from(&config.timings),
    );
    let _worker_handle = worker.spawn(signal_rx)?;

    let hook = KeyboardHook::new(Arc::clone(&arbiter));
    if let Err(e) = hook.start() {
        error!(?e, "failed to install keyboard hook, check Accessibility permissions");
        return Err(e.into());
    }
    info!("keyboard hook started");

    let bridge = ClipboardBridge::new(
        Box::new(SystemClipboard::new()),
        Box::new(SystemInjector::new()),
        RetryPolicy::from(&config.timings),
    );
    let mut controller = ModeController::new(bridge, config.timings, presentation_tx.clone());

    let server = Server::new(&config.socket_path, Arc::clone(&arbiter), presentation_tx.clone())?;
    server.set_hotkey_registered(hook.is_running()).await;

    // Subscribe before the controller publishes its first refresh
    let mut tracker_rx = presentation_tx.subscribe();
    let server_for_tracking = &server;

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Run the mode controller (processes intents in order)
        _ = controller.run(intent_rx) => {
            info!("mode controller exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Keep the server's popup and slot view in step with the controller
        _ = async {
            loop {
                match tracker_rx.recv().await {
                    Ok(command) => {
                        debug!(%command, "presentation command");
                        server_for_tracking.track(&command).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "presentation tracker lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("presentation tracker exited");
        }

        // Wait for shutdown signal
        result = shutdown.wait() => {
            match result {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(?e, "failed to install signal handlers"),
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    hook.stop();
    server.shutdown().await;

    info!("clipslots stopped");

    Ok(())
}
