use crate::descriptor::ServerDescriptor;

#[derive(Debug, Clone, Default)]
pub struct ServerFilter {
    /// Matches the lowercased server type exactly.
    pub server_type: Option<String>,
}

impl ServerFilter {
    pub fn by_type(server_type: impl Into<String>) -> Self {
        Self {
            server_type: Some(server_type.into().trim().to_lowercase()),
        }
    }

    fn matches(&self, server: &ServerDescriptor) -> bool {
        self.server_type
            .as_deref()
            .map_or(true, |t| server.type_key() == t)
    }
}

/// Source of server records. The engine only ever reads from it.
pub trait ServerRegistry: Send + Sync {
    fn get_server(&self, id: &str) -> Option<ServerDescriptor>;

    fn list_servers(&self, filter: &ServerFilter) -> Vec<ServerDescriptor>;
}

/// Registry over a fixed list, e.g. the `[[servers]]` of the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    servers: Vec<ServerDescriptor>,
}

impl StaticRegistry {
    pub fn new(servers: Vec<ServerDescriptor>) -> Self {
        Self { servers }
    }
}

impl ServerRegistry for StaticRegistry {
    fn get_server(&self, id: &str) -> Option<ServerDescriptor> {
        self.servers.iter().find(|s| s.id == id).cloned()
    }

    fn list_servers(&self, filter: &ServerFilter) -> Vec<ServerDescriptor> {
        self.servers
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect()
    }
}
