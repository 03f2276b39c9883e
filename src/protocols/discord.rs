//! Discord invite lookup over HTTPS. Not a game server probe: member and
//! presence counts stand in for player counts.

use super::{Codec, ProbeTarget, Timeouts};
use crate::error::{ProbeStage, QueryError};
use crate::protocol::ProtocolKind;
use crate::status::ServerStatus;
use async_trait::async_trait;
use regex::Regex;
use reqwest::{redirect, Client, StatusCode};
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
const MAX_REDIRECTS: usize = 5;

static INVITE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:discord\.gg/|discord\.com/invite/)([a-zA-Z0-9\-_]+)").expect("valid regex")
});
static BARE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9\-_]+$").expect("valid regex"));

/// Pulls the invite code out of a full invite URL or accepts a bare code.
/// Anything else is rejected before any request is made.
pub fn extract_invite_code(input: &str) -> Result<String, QueryError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(QueryError::MissingInvite);
    }
    if let Some(code) = INVITE_URL.captures(input).and_then(|c| c.get(1)) {
        return Ok(code.as_str().to_string());
    }
    if BARE_CODE.is_match(input) {
        return Ok(input.to_string());
    }
    Err(QueryError::InvalidInviteFormat)
}

#[derive(Debug, Deserialize)]
struct Invite {
    code: Option<String>,
    guild: Option<Guild>,
    approximate_presence_count: Option<u64>,
    approximate_member_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Guild {
    id: String,
    name: String,
    icon: Option<String>,
}

fn count(value: Option<u64>) -> u32 {
    value.unwrap_or(0).min(u32::MAX as u64) as u32
}

/// Maps an invite lookup body onto a status.
pub fn parse_invite(body: &[u8], requested_code: &str) -> Result<ServerStatus, QueryError> {
    let invite: Invite = serde_json::from_slice(body).map_err(|_| QueryError::InviteExpired)?;
    let guild = invite.guild.ok_or(QueryError::InviteExpired)?;
    let code = invite.code.unwrap_or_else(|| requested_code.to_string());

    Ok(ServerStatus {
        hostname: Some(guild.name),
        game_type: Some("Discord".to_string()),
        players: count(invite.approximate_presence_count),
        max_players: count(invite.approximate_member_count),
        map: Some(String::new()),
        icon: guild
            .icon
            .map(|icon| format!("https://cdn.discordapp.com/icons/{}/{}.png", guild.id, icon)),
        invite_url: Some(format!("https://discord.gg/{}", code)),
        ..ServerStatus::new("discord_invite")
    })
}

fn transport_failure(e: reqwest::Error) -> QueryError {
    if e.is_timeout() {
        QueryError::Timeout(ProbeStage::AwaitingResponse)
    } else {
        QueryError::ConnectionFailed(e.to_string())
    }
}

pub struct DiscordCodec {
    client: Client,
    api_base: String,
}

impl DiscordCodec {
    pub fn new(timeouts: Timeouts, user_agent: &str) -> Result<Self, QueryError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeouts.http)
            .timeout(timeouts.http_total)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| QueryError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn lookup(&self, invite: &str) -> Result<ServerStatus, QueryError> {
        let code = extract_invite_code(invite)?;
        let url = format!("{}/invites/{}", self.api_base, code);
        debug!("looking up Discord invite {}", code);

        let response = self
            .client
            .get(&url)
            .query(&[("with_counts", "true"), ("with_expiration", "true")])
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(QueryError::ApiError(status.as_u16()));
        }

        let body = response.bytes().await.map_err(transport_failure)?;
        parse_invite(&body, &code)
    }
}

#[async_trait]
impl Codec for DiscordCodec {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Discord
    }

    async fn probe(&self, target: &ProbeTarget) -> Result<ServerStatus, QueryError> {
        let invite = target.discord_invite.as_deref().unwrap_or_default();
        self.lookup(invite).await
    }
}
