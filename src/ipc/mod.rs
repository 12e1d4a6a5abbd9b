//! IPC module for daemon-popup communication
//!
//! The popup renderer is a separate process. It subscribes to
//! presentation notifications and reports pointer selections back.

mod protocol;
mod server;

pub use server::Server;
