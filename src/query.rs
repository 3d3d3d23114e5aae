use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::error::QueryError;
use crate::games::GAMES;
use crate::info::ServerInfo;
use crate::transport::QueryEndpoint;
use crate::{a2s, ut3};

/// Raw field name to value, as a handler read it off the wire.
pub type FieldMap = HashMap<String, String>;

/// Boxed future returned by [QueryHandler::query].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One query attempt in flight.
pub type QueryFuture<'a> = BoxFuture<'a, Result<FieldMap, QueryError>>;

/// Something that can ask a game server for its status.
///
/// A handler performs exactly one attempt; retrying is up to [Registry::query_server].
pub trait QueryHandler: Send + Sync {
    fn query<'a>(&'a self, endpoint: &'a QueryEndpoint) -> QueryFuture<'a>;
}

/// The wire protocols this crate speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Source A2S_INFO, single request.
    A2s,
    /// UT3 / GameSpy4, handshake then info.
    Ut3,
}

impl QueryHandler for Protocol {
    fn query<'a>(&'a self, endpoint: &'a QueryEndpoint) -> QueryFuture<'a> {
        match self {
            Protocol::A2s => Box::pin(a2s::query(endpoint)),
            Protocol::Ut3 => Box::pin(ut3::query(endpoint)),
        }
    }
}

/// How hard to try before giving up on a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn once() -> Self {
        RetryPolicy {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Maps game identifiers to the handler that knows how to query them.
///
/// Build one at startup and share it; it holds no per-query state.
#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, Arc<dyn QueryHandler>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every game from [GAMES] that has a known query protocol.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for game in GAMES {
            if let Some(protocol) = game.protocol {
                registry.register(game.id, protocol);
            }
        }
        registry
    }

    /// Register `handler` for `game_id`, replacing any previous one.
    pub fn register(&mut self, game_id: impl Into<String>, handler: impl QueryHandler + 'static) {
        self.handlers.insert(game_id.into(), Arc::new(handler));
    }

    pub fn contains(&self, game_id: &str) -> bool {
        self.handlers.contains_key(game_id)
    }

    /// Query `endpoint` as `game_id`, retrying transient failures per `policy`.
    ///
    /// Example usage:
    /// ```no_run
    /// # use rgamequery::{QueryEndpoint, Registry, RetryPolicy};
    /// # async fn run() -> Result<(), rgamequery::QueryError> {
    /// let registry = Registry::builtin();
    /// let endpoint = QueryEndpoint::new("127.0.0.1", 25565);
    /// let info = registry.query_server("mc", &endpoint, RetryPolicy::default()).await?;
    /// println!("{} ({})", info.name, info.players_string());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn query_server(
        &self,
        game_id: &str,
        endpoint: &QueryEndpoint,
        policy: RetryPolicy,
    ) -> Result<ServerInfo, QueryError> {
        let handler = self
            .handlers
            .get(game_id)
            .ok_or_else(|| QueryError::UnsupportedGame(game_id.to_owned()))?;

        let attempts = policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            debug!(
                "querying {game_id} at {}:{} (attempt {attempt}/{attempts})",
                endpoint.host, endpoint.port
            );
            match handler.query(endpoint).await {
                Ok(fields) => return ServerInfo::from_fields(fields, endpoint.port),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!("{}:{} attempt {attempt} failed: {e}", endpoint.host, endpoint.port);
                    tokio::time::sleep(policy.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
