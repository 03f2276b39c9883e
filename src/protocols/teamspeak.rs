//! TeamSpeak 3 ServerQuery (line-based text protocol over TCP).

use super::common::{connect_tcp, deadline, read_until_marker};
use super::{Codec, ProbeTarget};
use crate::error::{ProbeStage, QueryError};
use crate::protocol::ProtocolKind;
use crate::status::ServerStatus;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const MAX_RESPONSE: usize = 64 * 1024;
const DEFAULT_MAX_CLIENTS: u32 = 32;

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"virtualserver_name=(\S+)").expect("valid regex"));
static CLIENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"virtualserver_clientsonline=(\d+)").expect("valid regex"));
static MAX_CLIENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"virtualserver_maxclients=(\d+)").expect("valid regex"));
static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"virtualserver_version=(\S+)").expect("valid regex"));
static ERROR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"error id=(\d+)(?: msg=(\S+))?").expect("valid regex"));

/// Reverses ServerQuery escaping (`\s` for space, `\p` for pipe, ...).
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('p') => out.push('|'),
            Some('/') => out.push('/'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\u{0B}'),
            Some('f') => out.push('\u{0C}'),
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Interprets the reply to `serverinfo`. Only `error id=0` counts as success.
pub fn parse_serverinfo(response: &str) -> Result<ServerStatus, QueryError> {
    if !response.contains("error id=0") {
        let reason = ERROR_LINE
            .captures(response)
            .map(|c| match c.get(2) {
                Some(msg) => format!("error {} {}", &c[1], unescape(msg.as_str())),
                None => format!("error {}", &c[1]),
            })
            .unwrap_or_else(|| "no reply to serverinfo".to_string());
        return Err(QueryError::QueryRejected(reason));
    }

    Ok(ServerStatus {
        hostname: capture(&NAME, response).map(unescape),
        game_type: Some("TeamSpeak 3".to_string()),
        players: capture(&CLIENTS, response)
            .and_then(|n| n.parse().ok())
            .unwrap_or(0),
        max_players: capture(&MAX_CLIENTS, response)
            .and_then(|n| n.parse().ok())
            .unwrap_or(DEFAULT_MAX_CLIENTS),
        map: Some(String::new()),
        version: capture(&VERSION, response).map(unescape),
        ..ServerStatus::new("ts3_serverquery")
    })
}

pub struct TeamSpeakCodec {
    timeout: Duration,
}

impl TeamSpeakCodec {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn command(&self, stream: &mut TcpStream, command: &str) -> Result<String, QueryError> {
        deadline(ProbeStage::Sending, self.timeout, stream.write_all(command.as_bytes())).await?;
        read_until_marker(stream, "error id=", MAX_RESPONSE, self.timeout).await
    }
}

#[async_trait]
impl Codec for TeamSpeakCodec {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::TeamSpeak3
    }

    async fn probe(&self, target: &ProbeTarget) -> Result<ServerStatus, QueryError> {
        let mut stream = connect_tcp(&target.address, target.port, self.timeout).await?;

        // welcome banner, read and dropped
        let mut banner = [0u8; 4096];
        deadline(ProbeStage::AwaitingResponse, self.timeout, stream.read(&mut banner)).await?;

        self.command(&mut stream, "use sid=1\r\n").await?;
        let response = self.command(&mut stream, "serverinfo\r\n").await?;
        parse_serverinfo(&response)
    }
}
