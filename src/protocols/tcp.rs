//! Plain TCP reachability check for games without a dedicated codec.

use super::common::connect_tcp;
use super::{Codec, ProbeTarget};
use crate::error::QueryError;
use crate::protocol::{display_name, ProtocolKind};
use crate::status::ServerStatus;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub const OPEN_PORT_NOTE: &str = "Port is open (basic check), detailed data unavailable";

pub struct TcpCodec {
    timeout: Duration,
}

impl TcpCodec {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Codec for TcpCodec {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Generic
    }

    async fn probe(&self, target: &ProbeTarget) -> Result<ServerStatus, QueryError> {
        match connect_tcp(&target.address, target.port, self.timeout).await {
            Ok(stream) => drop(stream),
            Err(QueryError::ConnectionFailed(reason)) => {
                debug!("{}:{} refused: {}", target.address, target.port, reason);
                return Err(QueryError::PortClosed(target.port));
            }
            Err(e) => return Err(e),
        }

        let game_type = (!target.server_type.is_empty()).then(|| display_name(&target.server_type));
        Ok(ServerStatus {
            game_type,
            map: Some(String::new()),
            note: Some(OPEN_PORT_NOTE.to_string()),
            ..ServerStatus::new("tcp_connect")
        })
    }
}
