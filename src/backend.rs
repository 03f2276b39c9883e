//! Optional enhanced query backends.
//!
//! A backend answers with loosely-typed fields in whatever naming its protocol
//! uses; [`crate::status::normalize_fields`] turns them into a `QueryResult`.
//! The engine asks the backend first and falls back to its built-in codecs
//! whenever the backend is unavailable, fails, or reports the server offline.

use crate::error::{ProbeStage, QueryError};
use crate::protocols::common::{connect_udp, deadline};
use crate::status::BackendFields;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;

/// Where the backend should look. `port` is the connect port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    pub protocol_key: String,
    pub host: String,
    pub port: u16,
    pub query_port: Option<u16>,
}

#[async_trait]
pub trait EnhancedBackend: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means this backend has nothing to say about the protocol.
    async fn query(&self, target: &BackendTarget) -> Result<Option<BackendFields>, QueryError>;
}

const QUERY_MAGIC: [u8; 2] = [0xFE, 0xFD];
const HANDSHAKE_TYPE: u8 = 0x09;
const STAT_TYPE: u8 = 0x00;
/// "splitnum\0\x80\0" after the type and session id
const FULL_STAT_HEADER_LEN: usize = 16;
const PLAYER_SECTION_PADDING: usize = 10;

/// GameSpy 4 (UT3) query, which Minecraft Java servers answer when
/// `enable-query=true`. Gives the map and player names the server list ping
/// does not.
pub struct Gs4Backend {
    timeout: Duration,
}

impl Gs4Backend {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl EnhancedBackend for Gs4Backend {
    fn name(&self) -> &str {
        "gs4"
    }

    async fn query(&self, target: &BackendTarget) -> Result<Option<BackendFields>, QueryError> {
        if target.protocol_key != "minecraft" {
            return Ok(None);
        }

        let port = target.query_port.unwrap_or(target.port);
        let socket = connect_udp(&target.host, port, self.timeout).await?;

        let session_id = generate_session_id();
        let challenge_token = handshake(&socket, session_id, self.timeout).await?;
        let stats = full_stats(&socket, session_id, challenge_token, self.timeout).await?;

        Ok(Some(stats))
    }
}

fn generate_session_id() -> i32 {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default() as i32;
    timestamp & 0x0F0F0F0F
}

async fn exchange(socket: &UdpSocket, packet: &[u8], timeout: Duration) -> Result<Vec<u8>, QueryError> {
    deadline(ProbeStage::Sending, timeout, socket.send(packet)).await?;
    let mut buffer = vec![0u8; 8192];
    let size = deadline(ProbeStage::AwaitingResponse, timeout, socket.recv(&mut buffer)).await?;
    buffer.truncate(size);
    Ok(buffer)
}

async fn handshake(socket: &UdpSocket, session_id: i32, timeout: Duration) -> Result<i32, QueryError> {
    let mut packet = Vec::with_capacity(7);
    packet.extend_from_slice(&QUERY_MAGIC);
    packet.push(HANDSHAKE_TYPE);
    packet.extend_from_slice(&session_id.to_be_bytes());

    let response = exchange(socket, &packet, timeout).await?;
    parse_challenge(&response)
}

pub fn parse_challenge(response: &[u8]) -> Result<i32, QueryError> {
    if response.len() < 5 || response[0] != HANDSHAKE_TYPE {
        return Err(QueryError::malformed("Invalid handshake response"));
    }

    // challenge token is a NUL-terminated decimal string starting at byte 5
    let token = extract_null_terminated_string(response, 5)?;
    token
        .parse::<i32>()
        .map_err(|_| QueryError::malformed("Invalid challenge token"))
}

async fn full_stats(
    socket: &UdpSocket,
    session_id: i32,
    challenge_token: i32,
    timeout: Duration,
) -> Result<BackendFields, QueryError> {
    let mut packet = Vec::with_capacity(15);
    packet.extend_from_slice(&QUERY_MAGIC);
    packet.push(STAT_TYPE);
    packet.extend_from_slice(&session_id.to_be_bytes());
    packet.extend_from_slice(&challenge_token.to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // padding asks for full stats

    let response = exchange(socket, &packet, timeout).await?;
    parse_full_stats(&response)
}

/// Turns a full stat reply into backend fields (`hostname`, `numplayers`,
/// `maxplayers`, `map`, `version`, `players`, ...).
pub fn parse_full_stats(response: &[u8]) -> Result<BackendFields, QueryError> {
    if response.len() < FULL_STAT_HEADER_LEN || response[0] != STAT_TYPE {
        return Err(QueryError::malformed("Invalid stats response"));
    }

    let mut offset = FULL_STAT_HEADER_LEN;
    let mut properties = HashMap::new();

    loop {
        let key = match extract_null_terminated_string(response, offset) {
            Ok(k) if !k.is_empty() => k,
            _ => break,
        };
        offset += key.len() + 1;

        let value = extract_null_terminated_string(response, offset)?;
        offset += value.len() + 1;

        properties.insert(key, value);
    }

    // empty key terminator, then "\x01player_\0\0"
    offset += 1 + PLAYER_SECTION_PADDING;

    let mut players = Vec::new();
    while offset < response.len() {
        let player = match extract_null_terminated_string(response, offset) {
            Ok(p) if !p.is_empty() => p,
            _ => break,
        };
        offset += player.len() + 1;
        players.push(Value::String(player));
    }

    let mut fields: BackendFields = properties
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    fields.insert("online".to_string(), Value::Bool(true));
    fields.insert("game".to_string(), Value::from("Minecraft"));
    fields.insert("player_list".to_string(), Value::Array(players));
    Ok(fields)
}

fn extract_null_terminated_string(data: &[u8], start: usize) -> Result<String, QueryError> {
    if start >= data.len() {
        return Err(QueryError::malformed("Start position out of bounds"));
    }

    let end = data[start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| QueryError::malformed("String not null-terminated"))?
        + start;

    Ok(String::from_utf8_lossy(&data[start..end]).into_owned())
}
