//! Wire protocol codecs.
//!
//! Each codec runs one probe as a strict sequence: connect, send, await the
//! reply, parse. Every socket operation carries its own deadline and every
//! socket is owned by the probe future, so dropping the future (caller gave
//! up) closes it.

pub mod bedrock;
pub mod common;
pub mod discord;
pub mod java;
pub mod quake3;
pub mod source;
pub mod tcp;
pub mod teamspeak;

use crate::error::QueryError;
use crate::protocol::ProtocolKind;
use crate::status::ServerStatus;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Everything a codec needs to know about where to send its request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeTarget {
    /// Resolved (or deferred) address to open sockets against.
    pub address: String,
    pub port: u16,
    /// Host as configured, for protocols that echo it back to the server.
    pub host: String,
    pub server_type: String,
    pub discord_invite: Option<String>,
}

impl ProbeTarget {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        let address = address.into();
        Self {
            host: address.clone(),
            address,
            port,
            server_type: String::new(),
            discord_invite: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Bound on every individual connect, write and read.
    pub socket: Duration,
    /// Connect bound for HTTPS lookups.
    pub http: Duration,
    /// Whole HTTPS exchange, redirects included.
    pub http_total: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            socket: Duration::from_secs(3),
            http: Duration::from_secs(5),
            http_total: Duration::from_secs(10),
        }
    }
}

#[async_trait]
pub trait Codec: Send + Sync {
    fn kind(&self) -> ProtocolKind;

    async fn probe(&self, target: &ProbeTarget) -> Result<ServerStatus, QueryError>;
}

/// One codec per protocol family, built once and shared by all queries.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<ProtocolKind, Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn builtin(timeouts: Timeouts, discord: discord::DiscordCodec) -> Self {
        let mut registry = Self {
            codecs: HashMap::new(),
        };
        registry.register(Arc::new(source::SourceCodec::new(timeouts.socket)));
        registry.register(Arc::new(java::JavaCodec::new(timeouts.socket)));
        registry.register(Arc::new(bedrock::BedrockCodec::new(timeouts.socket)));
        registry.register(Arc::new(teamspeak::TeamSpeakCodec::new(timeouts.socket)));
        registry.register(Arc::new(quake3::Quake3Codec::new(timeouts.socket)));
        registry.register(Arc::new(tcp::TcpCodec::new(timeouts.socket)));
        registry.register(Arc::new(discord));
        registry
    }

    /// Replaces the codec for its protocol kind.
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.insert(codec.kind(), codec);
    }

    /// Codec for `kind`, or the generic TCP probe if none is registered.
    pub fn get(&self, kind: ProtocolKind) -> Result<Arc<dyn Codec>, QueryError> {
        self.codecs
            .get(&kind)
            .or_else(|| self.codecs.get(&ProtocolKind::Generic))
            .cloned()
            .ok_or_else(|| QueryError::UnsupportedProtocol(kind.to_string()))
    }

    pub fn generic(&self) -> Result<Arc<dyn Codec>, QueryError> {
        self.get(ProtocolKind::Generic)
    }
}
