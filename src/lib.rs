//! Status queries for game servers and community endpoints.
//!
//! Given a [`ServerDescriptor`], [`QueryEngine::query`] picks the wire protocol
//! from the server type (Source A2S_INFO, Minecraft Java server list ping,
//! Minecraft Bedrock unconnected ping, TeamSpeak 3 ServerQuery, Quake 3
//! `getstatus`, Discord invite lookup, or a plain TCP check), runs a single
//! time-bounded probe and returns a normalized [`QueryResult`]. Unreachable or
//! misbehaving servers come back as offline results, never as errors.

pub mod backend;
pub mod cache;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod link;
pub mod protocol;
pub mod protocols;
pub mod registry;
pub mod resolver;
pub mod service;
pub mod status;

pub use descriptor::ServerDescriptor;
pub use engine::QueryEngine;
pub use error::{EngineError, ProbeStage, QueryError};
pub use protocol::{select_protocol, ProtocolKind};
pub use status::QueryResult;
