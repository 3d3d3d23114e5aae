use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, trace};
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::{timeout_at, Instant};

use crate::error::QueryError;

/// Default time budget for a single query attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest UDP payload. Anything smaller lets the kernel silently cut
/// the tail off an oversized reply.
pub const MAX_PACKET_SIZE: usize = 65535;

/// Where to send a query, and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEndpoint {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl QueryEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        QueryEndpoint {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A UDP socket connected to one endpoint for the duration of one attempt.
///
/// Every exchange on it shares a single deadline, so a two-round handshake
/// gets the endpoint's timeout in total rather than per round. Dropping the
/// transport (including dropping the future that owns it) closes the socket.
#[derive(Debug)]
pub struct Transport {
    sock: UdpSocket,
    deadline: Instant,
}

impl Transport {
    /// Resolve `endpoint`, bind an ephemeral local port and connect to it.
    pub async fn connect(endpoint: &QueryEndpoint) -> Result<Self, QueryError> {
        let deadline = Instant::now() + endpoint.timeout;

        let host = &endpoint.host;
        let addr: SocketAddr = timeout_at(deadline, lookup_host((host.as_str(), endpoint.port)))
            .await?
            .map_err(|e| QueryError::Network(format!("failed to resolve {host}: {e}")))?
            .next()
            .ok_or_else(|| QueryError::Network(format!("no address found for {host}")))?;

        // just arbitrarily bind any port of the matching family
        let local = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let sock: UdpSocket = UdpSocket::bind(local)
            .await
            .map_err(|e| QueryError::Network(format!("failed to bind local socket: {e}")))?;

        sock.connect(addr)
            .await
            .map_err(|e| QueryError::Network(format!("failed to connect to {addr}: {e}")))?;

        Ok(Transport { sock, deadline })
    }

    /// Send `request` and wait for the next datagram from the peer.
    pub async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, QueryError> {
        self.exchange_filtered(request, |_| false).await
    }

    /// Like [Transport::exchange], but datagrams for which `is_stale` returns
    /// true are dropped and receiving continues until the deadline.
    ///
    /// UDP may deliver a reply twice, so a duplicate of an earlier round's
    /// reply can turn up where the next round's is expected.
    pub async fn exchange_filtered<F>(
        &self,
        request: &[u8],
        is_stale: F,
    ) -> Result<Vec<u8>, QueryError>
    where
        F: Fn(&[u8]) -> bool,
    {
        trace!("-> {:02X?}", request);

        // sending
        timeout_at(self.deadline, self.sock.send(request))
            .await?
            .map_err(|e| QueryError::Network(format!("failed to send: {e}")))?;

        // receiving
        let mut resp_buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            let len = timeout_at(self.deadline, self.sock.recv(&mut resp_buf))
                .await?
                .map_err(|e| QueryError::Network(format!("failed to receive: {e}")))?;
            let response = &resp_buf[..len];
            trace!("<- {:02X?}", response);

            if is_stale(response) {
                debug!("dropping stale reply of {len} bytes");
                continue;
            }
            return Ok(response.to_vec());
        }
    }

    /// Time left before this attempt's deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}
