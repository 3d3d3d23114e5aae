//! Pure Rust async game server status queries over UDP.
//!
//! Speaks the [Source A2S_INFO](https://developer.valvesoftware.com/wiki/Server_queries#A2S_INFO)
//! and UT3/GameSpy4 protocols and normalizes both into one [ServerInfo].
pub mod a2s;
pub mod error;
pub mod games;
pub mod info;
pub mod packet;
pub mod parse;
pub mod query;
pub mod transport;
pub mod ut3;

pub use error::QueryError;
pub use info::ServerInfo;
pub use query::{FieldMap, Protocol, QueryFuture, QueryHandler, Registry, RetryPolicy};
pub use transport::QueryEndpoint;
