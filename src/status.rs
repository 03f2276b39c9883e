//! Canonical query result and the normalizer that builds it.

use crate::descriptor::ServerDescriptor;
use crate::error::QueryError;
use crate::protocol::title_case;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// What a codec managed to read off the wire. Anything left `None` is filled
/// in by [`normalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerStatus {
    pub hostname: Option<String>,
    pub game_type: Option<String>,
    pub players: u32,
    pub max_players: u32,
    pub map: Option<String>,
    pub version: Option<String>,
    pub note: Option<String>,
    pub icon: Option<String>,
    pub invite_url: Option<String>,
    pub protocol_used: &'static str,
}

impl ServerStatus {
    pub fn new(protocol_used: &'static str) -> Self {
        Self {
            protocol_used,
            ..Default::default()
        }
    }
}

/// Loosely-typed fields as produced by an enhanced backend.
pub type BackendFields = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub online: bool,
    pub server_type: String,
    pub hostname: String,
    pub game_type: String,
    pub current_players: u32,
    pub max_players: u32,
    pub map_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub protocol_used: String,
    pub checked_at: DateTime<Utc>,
}

impl QueryResult {
    /// Offline result carrying the best-known display name. Player counts and
    /// map are always zeroed.
    pub fn offline(server: &ServerDescriptor, error: &QueryError) -> Self {
        Self {
            online: false,
            server_type: server.type_key(),
            hostname: server.display_name().unwrap_or_default().to_string(),
            game_type: title_case(&server.type_key()),
            current_players: 0,
            max_players: 0,
            map_name: String::new(),
            version: None,
            error_message: Some(error.to_string()),
            note: None,
            icon: None,
            invite_url: None,
            latency_ms: None,
            protocol_used: "none".to_string(),
            checked_at: Utc::now(),
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        if self.online {
            self.latency_ms = Some(latency_ms);
        }
        self
    }
}

fn default_hostname(server: &ServerDescriptor) -> String {
    server.display_name().unwrap_or("Server").to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Builds the canonical online result from a codec's status.
pub fn normalize(status: ServerStatus, server: &ServerDescriptor) -> QueryResult {
    QueryResult {
        online: true,
        server_type: server.type_key(),
        hostname: non_empty(status.hostname).unwrap_or_else(|| default_hostname(server)),
        game_type: non_empty(status.game_type).unwrap_or_else(|| title_case(&server.type_key())),
        current_players: status.players,
        max_players: status.max_players,
        map_name: status.map.unwrap_or_default(),
        version: non_empty(status.version),
        error_message: None,
        note: status.note,
        icon: status.icon,
        invite_url: status.invite_url,
        latency_ms: None,
        protocol_used: status.protocol_used.to_string(),
        checked_at: Utc::now(),
    }
}

fn first_str(fields: &BackendFields, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match fields.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn as_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n.min(u32::MAX as u64) as u32),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) => Some(items.len() as u32),
        _ => None,
    }
}

fn first_count(fields: &BackendFields, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|k| fields.get(*k).and_then(as_count))
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        Some(Value::String(s)) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Reconciles backend field names (`gq_hostname` vs `hostname` vs `name`, ...)
/// into the canonical result. Returns `None` unless the backend reports online.
pub fn normalize_fields(
    fields: &BackendFields,
    server: &ServerDescriptor,
    protocol_used: &str,
) -> Option<QueryResult> {
    if !is_truthy(fields.get("gq_online")) && !is_truthy(fields.get("online")) {
        return None;
    }

    let status = ServerStatus {
        hostname: first_str(fields, &["gq_hostname", "hostname", "name"]),
        game_type: first_str(fields, &["gq_gametype", "game", "gametype"]),
        players: first_count(fields, &["gq_numplayers", "num_players", "numplayers", "players"])
            .unwrap_or(0),
        max_players: first_count(fields, &["gq_maxplayers", "max_players", "maxplayers"])
            .unwrap_or(0),
        map: first_str(fields, &["gq_mapname", "map", "mapname"]),
        version: first_str(fields, &["version"]),
        ..ServerStatus::default()
    };

    let mut result = normalize(status, server);
    result.protocol_used = protocol_used.to_string();
    Some(result)
}
