use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// A server record as supplied by the registry. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub id: String,
    pub server_type: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub query_port: Option<u16>,
    /// Display name configured by the operator.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub discord_invite: Option<String>,
    /// Overrides the generated connect link when set.
    #[serde(default)]
    pub connect_link: Option<String>,
}

impl ServerDescriptor {
    pub fn new(id: impl Into<String>, server_type: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            server_type: server_type.into(),
            host: host.into(),
            port,
            query_port: None,
            name: None,
            discord_invite: None,
            connect_link: None,
        }
    }

    pub fn discord(id: impl Into<String>, invite: impl Into<String>) -> Self {
        Self {
            discord_invite: Some(invite.into()),
            ..Self::new(id, "discord", "discord", 0)
        }
    }

    pub fn with_query_port(mut self, port: u16) -> Self {
        self.query_port = Some(port);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Lowercased, trimmed type key used for protocol selection.
    pub fn type_key(&self) -> String {
        self.server_type.trim().to_lowercase()
    }

    pub fn is_discord(&self) -> bool {
        self.type_key() == "discord"
    }

    /// Configured display name, if it is not blank.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }

    /// Rejects records that can never be queried. A missing Discord invite is
    /// not checked here; it is reported as an offline result instead.
    pub fn validate(&self) -> EngineResult<()> {
        if self.server_type.trim().is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "server {} has no server type",
                self.id
            )));
        }
        if !self.is_discord() && self.host.trim().is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "server {} has no host",
                self.id
            )));
        }
        Ok(())
    }
}
