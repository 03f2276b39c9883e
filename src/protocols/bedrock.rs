//! Minecraft Bedrock edition unconnected ping over UDP.

use super::common::{connect_udp, udp_exchange};
use super::{Codec, ProbeTarget};
use crate::error::QueryError;
use crate::protocol::ProtocolKind;
use crate::status::ServerStatus;
use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const MAGIC: [u8; 16] = [
    0x00, 0xFF, 0xFF, 0x00, 0xFE, 0xFE, 0xFE, 0xFE, 0xFD, 0xFD, 0xFD, 0xFD, 0x12, 0x34, 0x56, 0x78,
];
const UNCONNECTED_PING: u8 = 0x01;
const UNCONNECTED_PONG: u8 = 0x1C;
/// id + time + server guid + magic + string length
const PONG_HEADER_LEN: usize = 35;
const DEFAULT_MAX_PLAYERS: u32 = 20;

pub fn ping_request(timestamp: u64) -> Vec<u8> {
    let mut packet = Vec::with_capacity(33);
    packet.push(UNCONNECTED_PING);
    packet.extend_from_slice(&timestamp.to_be_bytes());
    packet.extend_from_slice(&MAGIC);
    packet.extend_from_slice(&0u64.to_be_bytes());
    packet
}

/// Parses an unconnected pong. The payload after the header is a `;` separated
/// MOTD: edition;motd;protocol;version;players;max;guid;world;gamemode;...
pub fn parse_pong(response: &[u8]) -> Result<ServerStatus, QueryError> {
    if response.len() <= PONG_HEADER_LEN {
        return Err(QueryError::malformed("No response from server"));
    }
    if response[0] != UNCONNECTED_PONG {
        return Err(QueryError::malformed(format!(
            "Unexpected packet ID: 0x{:02x}",
            response[0]
        )));
    }

    let info = String::from_utf8_lossy(&response[PONG_HEADER_LEN..]);
    let fields: Vec<&str> = info.split(';').collect();
    if fields.len() < 6 {
        return Err(QueryError::malformed("Invalid Bedrock status data"));
    }

    Ok(ServerStatus {
        hostname: Some(fields[1].to_string()),
        game_type: Some("Minecraft Bedrock".to_string()),
        players: fields[4].trim().parse().unwrap_or(0),
        max_players: fields[5].trim().parse().unwrap_or(DEFAULT_MAX_PLAYERS),
        map: Some(
            fields
                .get(7)
                .filter(|world| !world.is_empty())
                .unwrap_or(&"world")
                .to_string(),
        ),
        version: Some(fields[3].to_string()),
        ..ServerStatus::new("bedrock_ping")
    })
}

pub struct BedrockCodec {
    timeout: Duration,
}

impl BedrockCodec {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Codec for BedrockCodec {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::MinecraftBedrock
    }

    async fn probe(&self, target: &ProbeTarget) -> Result<ServerStatus, QueryError> {
        let socket = connect_udp(&target.address, target.port, self.timeout).await?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let response = udp_exchange(&socket, &ping_request(timestamp), self.timeout).await?;
        parse_pong(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pong(motd: &str) -> Vec<u8> {
        let mut packet = vec![UNCONNECTED_PONG];
        packet.extend_from_slice(&1u64.to_be_bytes());
        packet.extend_from_slice(&42u64.to_be_bytes());
        packet.extend_from_slice(&MAGIC);
        packet.extend_from_slice(&(motd.len() as u16).to_be_bytes());
        packet.extend_from_slice(motd.as_bytes());
        packet
    }

    #[test]
    fn request_layout() {
        let request = ping_request(7);
        assert_eq!(request.len(), 33);
        assert_eq!(request[0], 0x01);
        assert_eq!(&request[1..9], &7u64.to_be_bytes());
        assert_eq!(&request[9..25], &MAGIC);
        assert_eq!(&request[25..], &[0u8; 8]);
    }

    #[test]
    fn parses_motd_fields() {
        let status = parse_pong(&pong(
            "MCPE;Dedicated Server;594;1.20.10;2;10;13253860892328930865;Bedrock level;Survival;1;19132;19133;",
        ))
        .unwrap();
        assert_eq!(status.hostname.as_deref(), Some("Dedicated Server"));
        assert_eq!(status.version.as_deref(), Some("1.20.10"));
        assert_eq!(status.players, 2);
        assert_eq!(status.max_players, 10);
        assert_eq!(status.map.as_deref(), Some("Bedrock level"));
    }

    #[test]
    fn short_motd_defaults_world() {
        let status = parse_pong(&pong("MCPE;Name;594;1.20;0;5")).unwrap();
        assert_eq!(status.map.as_deref(), Some("world"));
    }

    #[test]
    fn too_few_fields_is_malformed() {
        assert_eq!(
            parse_pong(&pong("MCPE;Name;594;1.20;0")),
            Err(QueryError::malformed("Invalid Bedrock status data"))
        );
        assert!(parse_pong(&[UNCONNECTED_PONG; 35]).is_err());

        let mut wrong_id = pong("MCPE;Name;594;1.20;0;5");
        wrong_id[0] = 0x00;
        assert!(parse_pong(&wrong_id).is_err());
    }
}
