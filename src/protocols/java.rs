//! Minecraft Java edition server list ping (handshake + status request over TCP).

use super::common::{connect_tcp, deadline, ByteCursor};
use super::{Codec, ProbeTarget};
use crate::error::{ProbeStage, QueryError};
use crate::protocol::ProtocolKind;
use crate::status::ServerStatus;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const PROTOCOL_VERSION: i32 = 4;
pub const MAX_JSON_LENGTH: i32 = 32768;
const MAX_PACKET_LENGTH: usize = MAX_JSON_LENGTH as usize + 16;
const DEFAULT_MAX_PLAYERS: u32 = 20;

static FORMAT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)§[0-9a-fk-or]").expect("valid regex"));

// VarInt encoding/decoding for the Minecraft protocol
pub fn write_varint(value: i32) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut val = value as u32;

    loop {
        if (val & !0x7F) == 0 {
            bytes.push(val as u8);
            break;
        }
        bytes.push((val & 0x7F | 0x80) as u8);
        val >>= 7;
    }

    bytes
}

pub fn read_varint(cursor: &mut ByteCursor<'_>, what: &str) -> Result<i32, QueryError> {
    let mut value: i32 = 0;
    let mut position = 0;

    loop {
        let byte = cursor.u8(what)?;
        value |= ((byte & 0x7F) as i32) << position;

        if (byte & 0x80) == 0 {
            return Ok(value);
        }

        position += 7;
        if position >= 32 {
            return Err(QueryError::malformed("VarInt is too big"));
        }
    }
}

pub fn write_string(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut result = write_varint(bytes.len() as i32);
    result.extend_from_slice(bytes);
    result
}

fn frame(packet: &[u8]) -> Vec<u8> {
    let mut framed = write_varint(packet.len() as i32);
    framed.extend_from_slice(packet);
    framed
}

/// Length-prefixed handshake announcing the status state, followed by the
/// status request, ready to write in one go.
pub fn handshake_request(host: &str, port: u16) -> Vec<u8> {
    let mut handshake = vec![0x00];
    handshake.extend(write_varint(PROTOCOL_VERSION));
    handshake.extend(write_string(host));
    handshake.extend_from_slice(&port.to_be_bytes());
    handshake.push(0x01);

    let mut request = frame(&handshake);
    request.extend_from_slice(&[0x01, 0x00]);
    request
}

/// Removes `§x` formatting codes until none are left, then trims.
pub fn strip_formatting(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let stripped = FORMAT_CODE.replace_all(&current, "").into_owned();
        if stripped == current {
            return stripped.trim().to_string();
        }
        current = stripped;
    }
}

/// Flattens a chat component: plain string, `{text}`, `{text, extra: [...]}`
/// or a bare array of components.
pub fn description_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts.iter().map(description_text).collect(),
        Value::Object(map) => {
            let mut text = map
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if let Some(Value::Array(extra)) = map.get("extra") {
                for part in extra {
                    text.push_str(&description_text(part));
                }
            }
            text
        }
        _ => String::new(),
    }
}

/// Parses the status response packet body (packet id onwards).
pub fn parse_status_packet(packet: &[u8]) -> Result<ServerStatus, QueryError> {
    let mut cursor = ByteCursor::new(packet);

    let packet_id = cursor.u8("packet")?;
    if packet_id != 0x00 {
        return Err(QueryError::malformed(format!(
            "Unexpected packet ID: 0x{:02x}",
            packet_id
        )));
    }

    let json_length = read_varint(&mut cursor, "JSON length")?;
    if json_length < 1 || json_length > MAX_JSON_LENGTH {
        return Err(QueryError::malformed("Invalid JSON length"));
    }
    let json = cursor.take(json_length as usize, "JSON")?;

    let status: Value = serde_json::from_slice(json)
        .map_err(|_| QueryError::malformed("Failed to parse server response"))?;
    if !status.is_object() {
        return Err(QueryError::malformed("Failed to parse server response"));
    }

    let description = status
        .get("description")
        .map(description_text)
        .map(|d| strip_formatting(&d));
    let players = status.pointer("/players/online").and_then(Value::as_u64).unwrap_or(0);
    let max_players = status
        .pointer("/players/max")
        .and_then(Value::as_u64)
        .map(|m| m.min(u32::MAX as u64) as u32)
        .unwrap_or(DEFAULT_MAX_PLAYERS);

    Ok(ServerStatus {
        hostname: description,
        game_type: Some("Minecraft".to_string()),
        players: players.min(u32::MAX as u64) as u32,
        max_players,
        map: Some("world".to_string()),
        version: status
            .pointer("/version/name")
            .and_then(Value::as_str)
            .map(str::to_string),
        icon: status.get("favicon").and_then(Value::as_str).map(str::to_string),
        ..ServerStatus::new("java_slp")
    })
}

async fn read_packet(stream: &mut TcpStream, timeout: Duration) -> Result<Vec<u8>, QueryError> {
    // Read packet length, one VarInt byte at a time
    let mut length_bytes = Vec::with_capacity(5);
    loop {
        let byte = deadline(ProbeStage::AwaitingResponse, timeout, stream.read_u8()).await?;
        length_bytes.push(byte);
        if byte & 0x80 == 0 {
            break;
        }
        if length_bytes.len() == 5 {
            return Err(QueryError::malformed("VarInt is too big"));
        }
    }

    let length = read_varint(&mut ByteCursor::new(&length_bytes), "length")?;
    if length < 1 {
        return Err(QueryError::malformed("Invalid response from server"));
    }
    let length = length as usize;
    if length > MAX_PACKET_LENGTH {
        return Err(QueryError::malformed(format!("Packet too large: {}", length)));
    }

    let mut data = vec![0u8; length];
    deadline(ProbeStage::AwaitingResponse, timeout, stream.read_exact(&mut data)).await?;
    Ok(data)
}

pub struct JavaCodec {
    timeout: Duration,
}

impl JavaCodec {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Codec for JavaCodec {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::MinecraftJava
    }

    async fn probe(&self, target: &ProbeTarget) -> Result<ServerStatus, QueryError> {
        let mut stream = connect_tcp(&target.address, target.port, self.timeout).await?;

        let request = handshake_request(&target.host, target.port);
        deadline(ProbeStage::Sending, self.timeout, stream.write_all(&request)).await?;
        deadline(ProbeStage::Sending, self.timeout, stream.flush()).await?;

        let packet = read_packet(&mut stream, self.timeout).await?;
        parse_status_packet(&packet)
    }
}
