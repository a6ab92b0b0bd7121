//! Remote-command collaborator for the game server.
//!
//! Exposes the [`RemoteCommand`] seam used by allowlist handlers and chat
//! relays, plus a Source RCON client that opens one authenticated TCP
//! connection per command.

use async_trait::async_trait;
use thiserror::Error;

mod rcon_client;
mod rcon_packet;

pub use rcon_client::{RconClient, RconClientConfig, MAX_RESPONSE_BODY_BYTES};
pub use rcon_packet::{RconPacket, RconPacketKind, MAX_INBOUND_PACKET_BYTES};

#[derive(Debug, Error)]
/// Enumerates supported `RconError` values.
pub enum RconError {
    #[error("rcon io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("rcon request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("rcon authentication rejected")]
    AuthRejected,
    #[error("rcon protocol error: {0}")]
    Protocol(String),
}

#[async_trait]
/// Executes one command on the game server and returns its textual response.
pub trait RemoteCommand: Send + Sync {
    async fn execute(&self, command: &str) -> Result<String, RconError>;
}
