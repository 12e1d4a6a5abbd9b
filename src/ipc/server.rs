//! Unix domain socket server for IPC
//!
//! Provides request-response communication for the popup renderer and
//! pushes presentation notifications to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::PresentationCommand;
use crate::hotkey::HotkeyArbiter;
use crate::slots::{SlotIndex, SLOT_COUNT};

use super::protocol::{
    previews, DaemonStatus, Notification, Popup, Request, Response, SlotPreview,
};

/// Largest accepted message body
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

/// State shared with every client handler
struct Shared {
    state: RwLock<ServerState>,
    /// Selections from the popup enter the core here, like digit keys do
    arbiter: Arc<HotkeyArbiter>,
    presentation_tx: broadcast::Sender<PresentationCommand>,
}

/// Last known presentation state
struct ServerState {
    status: DaemonStatus,
    start_time: std::time::Instant,
    slots: Vec<SlotPreview>,
}

impl Shared {
    fn new(
        arbiter: Arc<HotkeyArbiter>,
        presentation_tx: broadcast::Sender<PresentationCommand>,
    ) -> Self {
        Self {
            state: RwLock::new(ServerState {
                status: DaemonStatus::default(),
                start_time: std::time::Instant::now(),
                slots: vec![SlotPreview::Empty; SLOT_COUNT],
            }),
            arbiter,
            presentation_tx,
        }
    }
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        arbiter: Arc<HotkeyArbiter>,
        presentation_tx: broadcast::Sender<PresentationCommand>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            shared: Arc::new(Shared::new(arbiter, presentation_tx)),
            shutdown_tx,
        })
    }

    /// Record whether the keyboard hook is installed
    pub async fn set_hotkey_registered(&self, registered: bool) {
        self.shared.state.write().await.status.hotkey_registered = registered;
    }

    /// Update the server's view of the popup from a presentation command
    pub async fn track(&self, command: &PresentationCommand) {
        let mut state = self.shared.state.write().await;
        let old_popup = state.status.popup;
        match command {
            PresentationCommand::Show(mode) => state.status.popup = (*mode).into(),
            PresentationCommand::Hide => state.status.popup = Popup::Hidden,
            PresentationCommand::Refresh(slots) => state.slots = previews(slots.iter()),
        }

        if old_popup != state.status.popup {
            info!(
                from = ?old_popup,
                to = ?state.status.popup,
                "IPC server: popup updated"
            );
        }
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let shared = Arc::clone(&self.shared);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, shared) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, shared: Arc<Shared>) -> Result<()> {
        let (mut reader, writer) = stream.into_split();
        let writer = Arc::new(Mutex::new(writer));
        let mut forwarder: Option<tokio::task::JoinHandle<()>> = None;
        let mut len_buf = [0u8; 4];

        let result = loop {
            // Read message length (4-byte little-endian)
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    break Ok(());
                }
                Err(e) => break Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_MESSAGE_LEN {
                warn!(len, "message too large, disconnecting");
                break Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            if let Err(e) = reader.read_exact(&mut msg_buf).await {
                break Err(e.into());
            }

            let response = match serde_json::from_slice::<Request>(&msg_buf) {
                Ok(request) => {
                    debug!(?request, "received request");
                    let (response, subscribe) = Self::process_request(request, &shared).await;
                    if subscribe && forwarder.is_none() {
                        debug!("client subscribed to notifications");
                        let rx = shared.presentation_tx.subscribe();
                        forwarder = Some(tokio::spawn(Self::forward_notifications(
                            rx,
                            Arc::clone(&writer),
                        )));
                    }
                    response
                }
                Err(e) => Response::Error {
                    code: "bad_request".to_string(),
                    message: e.to_string(),
                },
            };

            // Send response
            if let Err(e) = Self::send_message(&writer, &response).await {
                break Err(e);
            }
        };

        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        result
    }

    /// Push presentation commands to a subscribed client until it goes away
    async fn forward_notifications(
        mut rx: broadcast::Receiver<PresentationCommand>,
        writer: Arc<Mutex<OwnedWriteHalf>>,
    ) {
        loop {
            match rx.recv().await {
                Ok(command) => {
                    let notification = Notification::from(&command);
                    if let Err(e) = Self::send_message(&writer, &notification).await {
                        debug!(?e, "notification send failed, dropping subscriber");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "notification subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(
        writer: &Mutex<OwnedWriteHalf>,
        msg: &T,
    ) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        let mut writer = writer.lock().await;
        writer.write_all(&msg_len).await?;
        writer.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, shared: &Shared) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let mut state = shared.state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                (Response::Status(state.status.clone()), false)
            }

            Request::GetSlots => {
                let state = shared.state.read().await;
                (
                    Response::Slots {
                        slots: state.slots.clone(),
                    },
                    false,
                )
            }

            Request::SelectSlot { slot } => {
                let Some(index) = SlotIndex::new(slot) else {
                    return (
                        Response::Error {
                            code: "invalid_slot".to_string(),
                            message: format!("slot must be below {}", SLOT_COUNT),
                        },
                        false,
                    );
                };
                info!(slot = %index, "slot selected via IPC");
                (Self::selection_response(shared.arbiter.select_slot(index)), false)
            }

            Request::Cancel => {
                info!("cancel via IPC");
                (Self::selection_response(shared.arbiter.cancel()), false)
            }

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    fn selection_response(accepted: bool) -> Response {
        if accepted {
            Response::Accepted
        } else {
            Response::Ignored {
                reason: "no selection window open".to_string(),
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}
