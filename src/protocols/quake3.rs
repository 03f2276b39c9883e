//! Quake 3 `getstatus` (also spoken by Call of Duty 1-4 and Quake Live).

use super::common::{connect_udp, udp_exchange};
use super::{Codec, ProbeTarget};
use crate::error::QueryError;
use crate::protocol::ProtocolKind;
use crate::status::ServerStatus;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

const REQUEST: &[u8] = b"\xFF\xFF\xFF\xFFgetstatus\n";
const RESPONSE_PREFIX: &[u8] = b"\xFF\xFF\xFF\xFFstatusResponse";

static COLOR_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\^[0-9A-Za-z]").expect("valid regex"));

pub fn strip_colors(text: &str) -> String {
    COLOR_CODE.replace_all(text, "").trim().to_string()
}

/// Splits a `\key\value\key\value` info string.
pub fn parse_info_string(info: &str) -> HashMap<String, String> {
    let mut parts = info.trim_start_matches('\\').split('\\');
    let mut vars = HashMap::new();
    while let (Some(key), Some(value)) = (parts.next(), parts.next()) {
        vars.insert(key.to_lowercase(), value.to_string());
    }
    vars
}

pub fn parse_status(response: &[u8]) -> Result<ServerStatus, QueryError> {
    if !response.starts_with(RESPONSE_PREFIX) {
        return Err(QueryError::malformed("Invalid response header"));
    }

    let body = String::from_utf8_lossy(&response[RESPONSE_PREFIX.len()..]);
    let mut lines = body.trim_start_matches(['\r', '\n']).lines();
    let info = lines
        .next()
        .filter(|line| line.starts_with('\\'))
        .ok_or_else(|| QueryError::malformed("Invalid server info data"))?;
    let vars = parse_info_string(info);

    // one line per connected player: `<score> <ping> "<name>"`
    let players = lines.filter(|line| !line.trim().is_empty()).count() as u32;

    let get = |key: &str| vars.get(key).map(|v| strip_colors(v));
    Ok(ServerStatus {
        hostname: get("sv_hostname").or_else(|| get("hostname")),
        game_type: get("gamename"),
        players,
        max_players: get("sv_maxclients").and_then(|n| n.parse().ok()).unwrap_or(0),
        map: get("mapname"),
        version: get("version").or_else(|| get("shortversion")),
        ..ServerStatus::new("q3_getstatus")
    })
}

pub struct Quake3Codec {
    timeout: Duration,
}

impl Quake3Codec {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Codec for Quake3Codec {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Quake3
    }

    async fn probe(&self, target: &ProbeTarget) -> Result<ServerStatus, QueryError> {
        let socket = connect_udp(&target.address, target.port, self.timeout).await?;
        let response = udp_exchange(&socket, REQUEST, self.timeout).await?;
        parse_status(&response)
    }
}
