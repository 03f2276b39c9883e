//! Source engine A2S_INFO over UDP.

use super::common::{connect_udp, udp_exchange, ByteCursor};
use super::{Codec, ProbeTarget};
use crate::error::QueryError;
use crate::protocol::ProtocolKind;
use crate::status::ServerStatus;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const HEADER: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
const SPLIT_HEADER: [u8; 4] = [0xFE, 0xFF, 0xFF, 0xFF];
const A2S_INFO: u8 = 0x54;
const S2A_INFO: u8 = 0x49;
const S2C_CHALLENGE: u8 = 0x41;
const PAYLOAD: &[u8] = b"Source Engine Query\0";

/// The 25-byte A2S_INFO request, optionally followed by a challenge.
pub fn info_request(challenge: Option<[u8; 4]>) -> Vec<u8> {
    let mut packet = Vec::with_capacity(29);
    packet.extend_from_slice(&HEADER);
    packet.push(A2S_INFO);
    packet.extend_from_slice(PAYLOAD);
    if let Some(challenge) = challenge {
        packet.extend_from_slice(&challenge);
    }
    packet
}

enum Reply {
    Info(ServerStatus),
    Challenge([u8; 4]),
}

fn parse_reply(response: &[u8]) -> Result<Reply, QueryError> {
    if response.len() < 5 {
        return Err(QueryError::malformed("No response from server"));
    }
    if response[..4] == SPLIT_HEADER {
        return Err(QueryError::malformed("Split packet responses are not supported"));
    }

    let mut cursor = ByteCursor::new(response);
    cursor.expect(&HEADER, "response header")?;
    match cursor.u8("response type")? {
        S2A_INFO => parse_info_body(&mut cursor).map(Reply::Info),
        S2C_CHALLENGE => {
            let bytes = cursor.take(4, "challenge")?;
            Ok(Reply::Challenge([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        other => Err(QueryError::malformed(format!(
            "Unsupported response type 0x{:02x}",
            other
        ))),
    }
}

/// Parses an S2A_INFO reply, header included.
pub fn parse_info(response: &[u8]) -> Result<ServerStatus, QueryError> {
    match parse_reply(response)? {
        Reply::Info(status) => Ok(status),
        Reply::Challenge(_) => Err(QueryError::malformed("Unexpected challenge response")),
    }
}

fn parse_info_body(cursor: &mut ByteCursor<'_>) -> Result<ServerStatus, QueryError> {
    let _protocol = cursor.u8("protocol")?;
    let hostname = cursor.cstring("server")?;
    let map = cursor.cstring("map")?;
    let _folder = cursor.cstring("folder")?;
    let game = cursor.cstring("game")?;
    let _app_id = cursor.u16_le("player")?;
    let players = cursor.u8("player")?;
    let max_players = cursor.u8("player")?;

    // bots, server type, environment, visibility, VAC, then the version string;
    // older servers stop early, which is fine
    let version = cursor.skip(5, "trailer").and_then(|_| cursor.cstring("version")).ok();

    Ok(ServerStatus {
        hostname: Some(hostname),
        game_type: Some(game),
        players: players.into(),
        max_players: max_players.into(),
        map: Some(map),
        version,
        ..ServerStatus::new("a2s_info")
    })
}

pub struct SourceCodec {
    timeout: Duration,
}

impl SourceCodec {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Codec for SourceCodec {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::SourceEngine
    }

    async fn probe(&self, target: &ProbeTarget) -> Result<ServerStatus, QueryError> {
        let socket = connect_udp(&target.address, target.port, self.timeout).await?;

        let response = udp_exchange(&socket, &info_request(None), self.timeout).await?;
        match parse_reply(&response)? {
            Reply::Info(status) => Ok(status),
            Reply::Challenge(challenge) => {
                debug!("{}:{} answered with a challenge", target.address, target.port);
                let response =
                    udp_exchange(&socket, &info_request(Some(challenge)), self.timeout).await?;
                parse_info(&response)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_reply(name: &str, map: &str, game: &str, players: u8, max: u8) -> Vec<u8> {
        let mut packet = HEADER.to_vec();
        packet.push(S2A_INFO);
        packet.push(17);
        for s in [name, map, "cstrike", game] {
            packet.extend_from_slice(s.as_bytes());
            packet.push(0);
        }
        packet.extend_from_slice(&730u16.to_le_bytes());
        packet.push(players);
        packet.push(max);
        packet
    }

    #[test]
    fn request_is_25_bytes() {
        let request = info_request(None);
        assert_eq!(request.len(), 25);
        assert_eq!(&request[..5], b"\xFF\xFF\xFF\xFFT");
        assert_eq!(&request[5..], b"Source Engine Query\0");
        assert_eq!(info_request(Some([1, 2, 3, 4])).len(), 29);
    }

    #[test]
    fn decodes_what_was_encoded() {
        let reply = info_reply("My Server", "de_dust2", "Counter-Strike 2", 12, 24);
        let status = parse_info(&reply).unwrap();
        assert_eq!(status.hostname.as_deref(), Some("My Server"));
        assert_eq!(status.map.as_deref(), Some("de_dust2"));
        assert_eq!(status.game_type.as_deref(), Some("Counter-Strike 2"));
        assert_eq!(status.players, 12);
        assert_eq!(status.max_players, 24);
        assert_eq!(status.version, None);
    }

    #[test]
    fn player_counts_cover_the_byte_range() {
        for (players, max) in [(0u8, 0u8), (0, 255), (255, 255), (1, 2), (128, 64)] {
            let status = parse_info(&info_reply("s", "m", "g", players, max)).unwrap();
            assert_eq!(status.players, u32::from(players));
            assert_eq!(status.max_players, u32::from(max));
        }
    }

    #[test]
    fn trailing_version_is_picked_up() {
        let mut reply = info_reply("s", "m", "g", 1, 2);
        reply.extend_from_slice(&[0, b'd', b'l', 0, 1]);
        reply.extend_from_slice(b"1.38.8.1\0");
        let status = parse_info(&reply).unwrap();
        assert_eq!(status.version.as_deref(), Some("1.38.8.1"));
    }

    #[test]
    fn every_truncation_is_an_error() {
        let reply = info_reply("My Server", "de_dust2", "Counter-Strike 2", 12, 24);
        for len in 0..reply.len() {
            assert!(
                matches!(parse_info(&reply[..len]), Err(QueryError::MalformedResponse(_))),
                "length {} parsed",
                len
            );
        }
    }

    #[test]
    fn wrong_header_and_type_are_named() {
        let mut reply = info_reply("s", "m", "g", 1, 2);
        reply[0] = 0x00;
        assert_eq!(
            parse_info(&reply),
            Err(QueryError::malformed("Invalid response header"))
        );

        let mut reply = info_reply("s", "m", "g", 1, 2);
        reply[4] = 0x6D;
        assert_eq!(
            parse_info(&reply),
            Err(QueryError::malformed("Unsupported response type 0x6d"))
        );

        let split = [0xFE, 0xFF, 0xFF, 0xFF, 0x01, 0x00];
        assert!(parse_info(&split).is_err());
    }

    #[test]
    fn challenge_reply_is_recognised() {
        let reply = [0xFF, 0xFF, 0xFF, 0xFF, 0x41, 9, 8, 7, 6];
        assert!(matches!(parse_reply(&reply), Ok(Reply::Challenge([9, 8, 7, 6]))));
    }
}
