//! Source RCON framing: `<len:i32le><id:i32le><kind:i32le><body>\0\0`.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::RconError;

/// Upper bound accepted for the length prefix of an inbound packet.
pub const MAX_INBOUND_PACKET_BYTES: usize = 64 * 1024;
const HEADER_BYTES: usize = 8;
const TRAILER_BYTES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// `ResponseValue` also goes outbound as the empty end-of-response marker.
pub enum RconPacketKind {
    Auth,
    AuthResponse,
    ExecCommand,
    ResponseValue,
}

impl RconPacketKind {
    /// `ExecCommand` and `AuthResponse` share wire value 2; direction decides which one applies.
    fn wire_value(self) -> i32 {
        match self {
            Self::Auth => 3,
            Self::AuthResponse | Self::ExecCommand => 2,
            Self::ResponseValue => 0,
        }
    }

    fn from_inbound(value: i32) -> Result<Self, RconError> {
        match value {
            2 => Ok(Self::AuthResponse),
            0 => Ok(Self::ResponseValue),
            other => Err(RconError::Protocol(format!(
                "unexpected inbound packet type {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconPacket {
    pub id: i32,
    pub kind: RconPacketKind,
    pub body: String,
}

impl RconPacket {
    pub fn new(id: i32, kind: RconPacketKind, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let payload_len = HEADER_BYTES + self.body.len() + TRAILER_BYTES;
        let mut frame = Vec::with_capacity(4 + payload_len);
        frame.extend_from_slice(&(payload_len as i32).to_le_bytes());
        frame.extend_from_slice(&self.id.to_le_bytes());
        frame.extend_from_slice(&self.kind.wire_value().to_le_bytes());
        frame.extend_from_slice(self.body.as_bytes());
        frame.extend_from_slice(&[0, 0]);
        frame
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), RconError>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.encode()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Reads one server-to-client packet.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, RconError>
    where
        R: AsyncRead + Unpin,
    {
        let frame = RawFrame::read_from(reader).await?;
        Ok(Self {
            id: frame.id,
            kind: frame.kind,
            body: String::from_utf8_lossy(&frame.body).into_owned(),
        })
    }
}

/// Inbound packet with its body left undecoded.
///
/// Servers split long responses at a byte boundary that may fall inside a
/// UTF-8 sequence, so fragments are joined before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawFrame {
    pub(crate) id: i32,
    pub(crate) kind: RconPacketKind,
    pub(crate) body: Vec<u8>,
}

impl RawFrame {
    pub(crate) async fn read_from<R>(reader: &mut R) -> Result<Self, RconError>
    where
        R: AsyncRead + Unpin,
    {
        let declared = reader.read_i32_le().await?;
        let payload_len = usize::try_from(declared)
            .map_err(|_| RconError::Protocol(format!("negative packet length {declared}")))?;
        if !(HEADER_BYTES + TRAILER_BYTES..=MAX_INBOUND_PACKET_BYTES).contains(&payload_len) {
            return Err(RconError::Protocol(format!(
                "packet length {payload_len} out of range"
            )));
        }

        let mut payload = vec![0_u8; payload_len];
        reader.read_exact(&mut payload).await?;
        let id = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let kind = RconPacketKind::from_inbound(i32::from_le_bytes([
            payload[4], payload[5], payload[6], payload[7],
        ]))?;
        let body_bytes = &payload[HEADER_BYTES..payload_len - TRAILER_BYTES];
        let body_end = body_bytes
            .iter()
            .position(|byte| *byte == 0)
            .unwrap_or(body_bytes.len());
        Ok(Self {
            id,
            kind,
            body: body_bytes[..body_end].to_vec(),
        })
    }
}
