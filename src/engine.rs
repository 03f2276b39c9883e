use crate::backend::{BackendTarget, EnhancedBackend, Gs4Backend};
use crate::config::Config;
use crate::descriptor::ServerDescriptor;
use crate::error::{EngineResult, ProbeStage, QueryError};
use crate::protocol::{select_protocol, ProtocolKind, ProtocolSpec};
use crate::protocols::discord::DiscordCodec;
use crate::protocols::{CodecRegistry, ProbeTarget};
use crate::resolver::{AddressResolver, ResolvedHost};
use crate::status::{normalize, normalize_fields, QueryResult, ServerStatus};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Turns a server descriptor into a `QueryResult`.
///
/// Stateless between calls: every query resolves its own address, opens its
/// own sockets and releases them before returning, so one engine can serve any
/// number of concurrent queries. Network and parse failures never escape as
/// errors; they come back as offline results with `error_message` set.
pub struct QueryEngine {
    codecs: CodecRegistry,
    resolver: AddressResolver,
    backend: Option<Arc<dyn EnhancedBackend>>,
    query_deadline: Duration,
}

impl QueryEngine {
    pub fn new(codecs: CodecRegistry, resolver: AddressResolver, query_deadline: Duration) -> Self {
        Self {
            codecs,
            resolver,
            backend: None,
            query_deadline,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, QueryError> {
        let timeouts = config.engine.timeouts();
        let discord = DiscordCodec::new(timeouts, &config.engine.user_agent)?
            .with_api_base(config.engine.discord_api_base.as_str());

        let mut engine = Self::new(
            CodecRegistry::builtin(timeouts, discord),
            AddressResolver::new(timeouts.socket),
            config.engine.query_deadline(),
        );
        if config.backend.gs4 {
            engine = engine.with_backend(Arc::new(Gs4Backend::new(timeouts.socket)));
        }
        Ok(engine)
    }

    /// Consults `backend` before the built-in codecs.
    pub fn with_backend(mut self, backend: Arc<dyn EnhancedBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Queries one server. Only an invalid descriptor is an `Err`.
    pub async fn query(&self, server: &ServerDescriptor) -> EngineResult<QueryResult> {
        server.validate()?;

        match timeout(self.query_deadline, self.run(server)).await {
            Ok(result) => Ok(result),
            Err(_) => {
                debug!("{} exceeded the query deadline", server.id);
                Ok(QueryResult::offline(
                    server,
                    &QueryError::Timeout(ProbeStage::AwaitingResponse),
                ))
            }
        }
    }

    async fn run(&self, server: &ServerDescriptor) -> QueryResult {
        let spec = select_protocol(&server.server_type);
        debug!("querying {} as {} ({})", server.id, spec.kind, spec.key);

        if spec.kind == ProtocolKind::Discord {
            let target = ProbeTarget {
                discord_invite: server.discord_invite.clone(),
                server_type: server.type_key(),
                ..ProbeTarget::new(String::new(), 0)
            };
            return self.finish(server, self.probe(spec.kind, &target).await);
        }

        let query_port = spec.query_port(server);
        let resolved = self.resolver.resolve(&server.host).await;

        if let Some(result) = self.query_backend(&spec, server, &resolved, query_port).await {
            return result;
        }

        let target = ProbeTarget {
            address: resolved.address,
            port: query_port,
            host: server.host.trim().to_string(),
            server_type: server.type_key(),
            discord_invite: None,
        };

        match self.probe(spec.kind, &target).await {
            Err(e) if e.is_unexpected() && spec.kind != ProtocolKind::Generic => {
                info!("{} codec failed for {} ({}), trying a TCP check", spec.kind, server.id, e);
                let fallback = ProbeTarget {
                    port: server.port,
                    ..target
                };
                let outcome = self.probe(ProtocolKind::Generic, &fallback).await;
                self.finish(server, outcome)
            }
            outcome => self.finish(server, outcome),
        }
    }

    async fn query_backend(
        &self,
        spec: &ProtocolSpec,
        server: &ServerDescriptor,
        resolved: &ResolvedHost,
        query_port: u16,
    ) -> Option<QueryResult> {
        let backend = self.backend.as_ref()?;
        let target = BackendTarget {
            protocol_key: spec.key.to_string(),
            host: resolved.address.clone(),
            port: server.port,
            query_port: (query_port != server.port).then_some(query_port),
        };

        let started = Instant::now();
        let outcome = AssertUnwindSafe(backend.query(&target))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(QueryError::Internal("backend panicked".to_string())));

        match outcome {
            Ok(Some(fields)) => match normalize_fields(&fields, server, backend.name()) {
                Some(result) => Some(result.with_latency(elapsed_ms(started))),
                None => {
                    debug!("{} reports {} offline, using built-in codec", backend.name(), server.id);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("{} backend failed for {}: {}", backend.name(), server.id, e);
                None
            }
        }
    }

    async fn probe(
        &self,
        kind: ProtocolKind,
        target: &ProbeTarget,
    ) -> Result<(ServerStatus, u64), QueryError> {
        let codec = self.codecs.get(kind)?;
        let started = Instant::now();

        AssertUnwindSafe(codec.probe(target))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(QueryError::Internal(format!("{} codec panicked", kind))))
            .map(|status| (status, elapsed_ms(started)))
    }

    fn finish(
        &self,
        server: &ServerDescriptor,
        outcome: Result<(ServerStatus, u64), QueryError>,
    ) -> QueryResult {
        match outcome {
            Ok((status, latency)) => normalize(status, server).with_latency(latency),
            Err(e) => {
                debug!("{} offline: {}", server.id, e);
                QueryResult::offline(server, &e)
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
