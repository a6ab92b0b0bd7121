//! Connection-per-command Source RCON client.

use std::{
    sync::atomic::{AtomicI32, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::{rcon_packet::RawFrame, RconError, RconPacket, RconPacketKind, RemoteCommand};

const AUTH_FAILED_ID: i32 = -1;
/// Upper bound on a reassembled multi-packet response body.
pub const MAX_RESPONSE_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
/// Public struct `RconClientConfig` used across mcbridge components.
pub struct RconClientConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub timeout_ms: u64,
}

/// Opens a fresh TCP connection, authenticates, and runs one command per call.
///
/// Calls never share a socket, so concurrent callers need no extra serialization.
pub struct RconClient {
    config: RconClientConfig,
    next_request_id: AtomicI32,
}

impl RconClient {
    pub fn new(config: RconClientConfig) -> Self {
        Self {
            config,
            next_request_id: AtomicI32::new(1),
        }
    }

    fn allocate_request_id(&self) -> i32 {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        if id <= 0 {
            self.next_request_id.store(2, Ordering::Relaxed);
            return 1;
        }
        id
    }

    async fn execute_unbounded(&self, command: &str) -> Result<String, RconError> {
        let mut stream =
            TcpStream::connect((self.config.host.as_str(), self.config.port)).await?;

        let auth_id = self.allocate_request_id();
        RconPacket::new(auth_id, RconPacketKind::Auth, self.config.password.clone())
            .write_to(&mut stream)
            .await?;
        loop {
            let packet = RconPacket::read_from(&mut stream).await?;
            match packet.kind {
                // Some servers emit an empty response value before the auth verdict.
                RconPacketKind::ResponseValue => continue,
                _ if packet.id == AUTH_FAILED_ID => return Err(RconError::AuthRejected),
                _ if packet.id == auth_id => break,
                _ => {
                    return Err(RconError::Protocol(format!(
                        "auth response id {} does not match request id {auth_id}",
                        packet.id
                    )))
                }
            }
        }

        let command_id = self.allocate_request_id();
        RconPacket::new(command_id, RconPacketKind::ExecCommand, command)
            .write_to(&mut stream)
            .await?;
        // Long responses arrive as several packets under the command id. The
        // server answers this marker only after the last of them.
        let marker_id = self.allocate_request_id();
        RconPacket::new(marker_id, RconPacketKind::ResponseValue, "")
            .write_to(&mut stream)
            .await?;
        read_fragmented_response(&mut stream, command_id, marker_id).await
    }
}

async fn read_fragmented_response(
    stream: &mut TcpStream,
    command_id: i32,
    marker_id: i32,
) -> Result<String, RconError> {
    let mut body = Vec::new();
    let mut fragments = 0_usize;
    loop {
        let frame = RawFrame::read_from(stream).await?;
        if frame.kind != RconPacketKind::ResponseValue {
            return Err(RconError::Protocol(format!(
                "unexpected {:?} packet while reading command response",
                frame.kind
            )));
        }
        if frame.id == marker_id {
            break;
        }
        if frame.id != command_id {
            return Err(RconError::Protocol(format!(
                "response id {} does not match request id {command_id}",
                frame.id
            )));
        }
        if body.len() + frame.body.len() > MAX_RESPONSE_BODY_BYTES {
            return Err(RconError::Protocol(format!(
                "command response exceeds {MAX_RESPONSE_BODY_BYTES} bytes"
            )));
        }
        body.extend_from_slice(&frame.body);
        fragments += 1;
    }
    if fragments == 0 {
        return Err(RconError::Protocol(
            "server sent no response before the end marker".to_string(),
        ));
    }
    if fragments > 1 {
        tracing::debug!(fragments, bytes = body.len(), "reassembled fragmented rcon response");
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

#[async_trait]
impl RemoteCommand for RconClient {
    async fn execute(&self, command: &str) -> Result<String, RconError> {
        let timeout_ms = self.config.timeout_ms.max(1);
        tracing::debug!(host = %self.config.host, port = self.config.port, command, "rcon command");
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.execute_unbounded(command),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RconError::Timeout { timeout_ms }),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::{RconClient, RconClientConfig};
    use crate::{RconError, RconPacket, RconPacketKind, RemoteCommand};

    /// Minecraft splits responses into bodies of at most this many bytes.
    const SERVER_FRAGMENT_BYTES: usize = 4096;

    async fn spawn_fake_server(
        password: &'static str,
        reply: String,
    ) -> (u16, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut seen = Vec::new();
            let auth = read_client_packet(&mut socket).await;
            let accepted = auth.2 == password;
            let verdict_id = if accepted { auth.0 } else { -1 };
            RconPacket::new(verdict_id, RconPacketKind::AuthResponse, "")
                .write_to(&mut socket)
                .await
                .expect("auth reply");
            if !accepted {
                return seen;
            }
            let command = read_client_packet(&mut socket).await;
            seen.push(command.2.clone());
            let marker = read_client_packet(&mut socket).await;
            assert_eq!(marker.1, 0, "end marker uses the response value type");
            for chunk in reply.as_bytes().chunks(SERVER_FRAGMENT_BYTES) {
                write_response_frame(&mut socket, command.0, chunk).await;
            }
            write_response_frame(&mut socket, marker.0, b"Unknown request 0").await;
            seen
        });
        (port, handle)
    }

    async fn write_response_frame(socket: &mut tokio::net::TcpStream, id: i32, body: &[u8]) {
        use tokio::io::AsyncWriteExt;
        let mut frame = Vec::with_capacity(body.len() + 14);
        frame.extend_from_slice(&(body.len() as i32 + 10).to_le_bytes());
        frame.extend_from_slice(&id.to_le_bytes());
        frame.extend_from_slice(&0_i32.to_le_bytes());
        frame.extend_from_slice(body);
        frame.extend_from_slice(&[0, 0]);
        socket.write_all(&frame).await.expect("write frame");
    }

    async fn read_client_packet(socket: &mut tokio::net::TcpStream) -> (i32, i32, String) {
        use tokio::io::AsyncReadExt;
        let len = socket.read_i32_le().await.expect("len") as usize;
        let mut payload = vec![0_u8; len];
        socket.read_exact(&mut payload).await.expect("payload");
        let id = i32::from_le_bytes(payload[0..4].try_into().expect("id"));
        let kind = i32::from_le_bytes(payload[4..8].try_into().expect("kind"));
        let body = String::from_utf8_lossy(&payload[8..len - 2]).into_owned();
        (id, kind, body)
    }

    fn client(port: u16, password: &str) -> RconClient {
        RconClient::new(RconClientConfig {
            host: "127.0.0.1".to_string(),
            port,
            password: password.to_string(),
            timeout_ms: 2_000,
        })
    }

    #[tokio::test]
    async fn integration_rcon_client_authenticates_and_returns_response_body() {
        let (port, server) =
            spawn_fake_server("secret", "There are 1 whitelisted player(s): Steve".to_string()).await;
        let response = client(port, "secret")
            .execute("whitelist list")
            .await
            .expect("execute");
        assert_eq!(response, "There are 1 whitelisted player(s): Steve");
        assert_eq!(server.await.expect("server"), vec!["whitelist list"]);
    }

    #[tokio::test]
    async fn regression_rcon_client_reassembles_response_split_across_packets() {
        let names = (0..300)
            .map(|index| format!("player_{index:05}"))
            .collect::<Vec<_>>();
        let listing = format!(
            "There are 300 whitelisted player(s): {}",
            names.join(", ")
        );
        assert!(listing.len() > SERVER_FRAGMENT_BYTES);
        let (port, server) = spawn_fake_server("secret", listing.clone()).await;

        let response = client(port, "secret")
            .execute("whitelist list")
            .await
            .expect("execute");

        assert_eq!(response.len(), listing.len());
        assert!(response.ends_with("player_00299"));
        assert_eq!(response, listing);
        assert_eq!(server.await.expect("server"), vec!["whitelist list"]);
    }

    #[tokio::test]
    async fn regression_rcon_client_joins_multibyte_text_split_at_fragment_boundary() {
        let mut reply = "a".repeat(SERVER_FRAGMENT_BYTES - 1);
        reply.push_str("あいう");
        let (port, _server) = spawn_fake_server("secret", reply.clone()).await;

        let response = client(port, "secret").execute("say").await.expect("execute");

        assert_eq!(response, reply);
        assert!(!response.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn regression_rcon_client_reports_rejected_password() {
        let (port, server) = spawn_fake_server("secret", "unused".to_string()).await;
        let error = client(port, "wrong")
            .execute("list")
            .await
            .expect_err("auth rejected");
        assert!(matches!(error, RconError::AuthRejected));
        assert!(server.await.expect("server").is_empty());
    }

    #[tokio::test]
    async fn regression_rcon_client_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        });
        let client = RconClient::new(RconClientConfig {
            host: "127.0.0.1".to_string(),
            port,
            password: "secret".to_string(),
            timeout_ms: 100,
        });
        let error = client.execute("list").await.expect_err("timeout");
        assert!(matches!(error, RconError::Timeout { timeout_ms: 100 }));
    }

    #[tokio::test]
    async fn regression_rcon_client_surfaces_connection_refused_as_io() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        let error = client(port, "secret")
            .execute("list")
            .await
            .expect_err("refused");
        assert!(matches!(error, RconError::Io(_)));
    }
}
