//! End-to-end queries against fixture servers on the loopback interface.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rgamequery::{Protocol, QueryEndpoint, QueryError, Registry, RetryPolicy};
use tokio::net::UdpSocket;

const UT3_HANDSHAKE: &[u8] = &[0xFE, 0xFD, 0x09, 0x10, 0x20, 0x30, 0x40];
const UT3_INFO_REQUEST: &[u8] = &[0xFE, 0xFD, 0x00, 0x10, 0x20, 0x30, 0x40, 0x00, 0x91, 0x29, 0x5B];

fn ut3_info_response(motd: &str, players: u8, port: u16) -> Vec<u8> {
    let mut response = vec![0x00, 0x10, 0x20, 0x30, 0x40];
    for field in [motd, "SMP", "world", players.to_string().as_str(), "20"] {
        response.extend_from_slice(field.as_bytes());
        response.push(0);
    }
    response.extend_from_slice(&port.to_le_bytes());
    response.extend_from_slice(b"127.0.0.1\0");
    response
}

/// Answers UT3 queries with `info`, ignoring the first `drop_first` datagrams.
/// Returns the port and a counter of datagrams received.
async fn ut3_server(info: Vec<u8>, drop_first: u32) -> (u16, Arc<AtomicU32>) {
    ut3_server_sending(info, drop_first, 1).await
}

/// Like [ut3_server], but every reply goes out `copies` times.
async fn ut3_server_sending(
    info: Vec<u8>,
    drop_first: u32,
    copies: usize,
) -> (u16, Arc<AtomicU32>) {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = sock.local_addr().unwrap().port();
    let received = Arc::new(AtomicU32::new(0));
    let counter = received.clone();

    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        loop {
            let (len, from) = sock.recv_from(&mut buf).await.unwrap();
            if counter.fetch_add(1, Ordering::SeqCst) < drop_first {
                continue;
            }
            let request = &buf[..len];
            let reply: Vec<u8> = if request == UT3_HANDSHAKE {
                b"\x09\x10\x20\x30\x409513307\0".to_vec()
            } else if request == UT3_INFO_REQUEST {
                info.clone()
            } else {
                continue;
            };
            for _ in 0..copies {
                sock.send_to(&reply, from).await.unwrap();
            }
        }
    });

    (port, received)
}

/// Source server that insists on a challenge before answering.
/// Every reply goes out `copies` times.
async fn a2s_server(copies: usize) -> u16 {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = sock.local_addr().unwrap().port();
    let challenge: [u8; 4] = [0x0A, 0x08, 0x5E, 0xEA];

    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        loop {
            let (len, from) = sock.recv_from(&mut buf).await.unwrap();
            let request = &buf[..len];
            let mut reply: Vec<u8> = vec![0xFF, 0xFF, 0xFF, 0xFF];
            if request.ends_with(&challenge) {
                reply.push(0x49);
                reply.push(0x11);
                reply.extend_from_slice(b"Conan Exiles PvE\0ConanSandbox\0");
                reply.extend_from_slice(b"ConanSandbox\0Conan Exiles\0");
                reply.extend_from_slice(&[0x00, 0x00, 12, 40, 0, b'd', b'w', 0, 1]);
                reply.extend_from_slice(b"1.0.0.0\0");
                reply.push(0x80);
                reply.extend_from_slice(&7777u16.to_le_bytes());
            } else {
                reply.push(0x41);
                reply.extend_from_slice(&challenge);
            }
            for _ in 0..copies {
                sock.send_to(&reply, from).await.unwrap();
            }
        }
    });

    port
}

fn quick_retries(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        delay: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn queries_ut3_server() {
    let (port, _) = ut3_server(ut3_info_response("A Minecraft Server", 2, 25565), 0).await;
    let endpoint = QueryEndpoint::new("127.0.0.1", port).with_timeout(Duration::from_secs(2));

    let info = Registry::builtin()
        .query_server("mc", &endpoint, RetryPolicy::once())
        .await
        .unwrap();

    assert_eq!(info.name, "A Minecraft Server");
    assert_eq!(info.map, "world");
    assert_eq!(info.players_string(), "2/20");
    assert_eq!(info.port, 25565);
    assert_eq!(info.extra["GameType"], "SMP");
    assert_eq!(info.extra["IP"], "127.0.0.1");
}

#[tokio::test]
async fn queries_a2s_server_through_challenge() {
    let port = a2s_server(1).await;
    let endpoint = QueryEndpoint::new("127.0.0.1", port).with_timeout(Duration::from_secs(2));

    let info = Registry::builtin()
        .query_server("ce", &endpoint, RetryPolicy::once())
        .await
        .unwrap();

    assert_eq!(info.name, "Conan Exiles PvE");
    assert_eq!(info.map, "ConanSandbox");
    assert_eq!(info.players_string(), "12/40");
    assert_eq!(info.port, 7777);
    assert_eq!(info.extra["Folder"], "ConanSandbox");
    assert_eq!(info.extra["VAC"], "true");
}

#[tokio::test]
async fn duplicated_handshake_reply_is_skipped() {
    let info = ut3_info_response("Echoes", 5, 25565);
    let (port, received) = ut3_server_sending(info, 0, 2).await;
    let endpoint = QueryEndpoint::new("127.0.0.1", port).with_timeout(Duration::from_secs(2));

    let info = Registry::builtin()
        .query_server("mc", &endpoint, RetryPolicy::once())
        .await
        .unwrap();

    assert_eq!(info.name, "Echoes");
    assert_eq!(info.players_string(), "5/20");
    // handshake and info, no retry needed
    assert_eq!(received.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn duplicated_challenge_is_skipped() {
    let port = a2s_server(2).await;
    let endpoint = QueryEndpoint::new("127.0.0.1", port).with_timeout(Duration::from_secs(2));

    let info = Registry::builtin()
        .query_server("ce", &endpoint, RetryPolicy::once())
        .await
        .unwrap();

    assert_eq!(info.name, "Conan Exiles PvE");
    assert_eq!(info.players_string(), "12/40");
}

#[tokio::test]
async fn silent_server_times_out_on_time() {
    // bound so the kernel doesn't answer with port unreachable
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = silent.local_addr().unwrap().port();
    let timeout = Duration::from_millis(300);
    let endpoint = QueryEndpoint::new("127.0.0.1", port).with_timeout(timeout);

    let started = Instant::now();
    let err = Registry::builtin()
        .query_server("mc", &endpoint, RetryPolicy::once())
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, QueryError::Timeout(_)));
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + Duration::from_millis(100), "took {elapsed:?}");
    drop(silent);
}

#[tokio::test]
async fn lost_packets_are_retried() {
    let (port, received) = ut3_server(ut3_info_response("Retry", 1, 25565), 1).await;
    let endpoint = QueryEndpoint::new("127.0.0.1", port).with_timeout(Duration::from_millis(200));

    let info = Registry::builtin()
        .query_server("mc", &endpoint, quick_retries(3))
        .await
        .unwrap();

    assert_eq!(info.name, "Retry");
    // dropped handshake, handshake, info
    assert_eq!(received.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn malformed_response_is_not_retried() {
    // ends right after the MOTD
    let mut truncated = ut3_info_response("Broken", 1, 25565);
    truncated.truncate(12);
    let (port, received) = ut3_server(truncated, 0).await;
    let endpoint = QueryEndpoint::new("127.0.0.1", port).with_timeout(Duration::from_secs(2));

    let err = Registry::builtin()
        .query_server("mc", &endpoint, quick_retries(5))
        .await
        .unwrap_err();

    assert!(matches!(err, QueryError::Protocol(_)));
    assert_eq!(received.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_queries_stay_independent() {
    let (port_a, _) = ut3_server(ut3_info_response("Alpha", 3, 25565), 0).await;
    let (port_b, _) = ut3_server(ut3_info_response("Bravo", 7, 25566), 0).await;
    let registry = Registry::builtin();
    let endpoint_a = QueryEndpoint::new("127.0.0.1", port_a).with_timeout(Duration::from_secs(2));
    let endpoint_b = QueryEndpoint::new("127.0.0.1", port_b).with_timeout(Duration::from_secs(2));

    let (a, b) = tokio::join!(
        registry.query_server("mc", &endpoint_a, RetryPolicy::once()),
        registry.query_server("mc", &endpoint_b, RetryPolicy::once()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!((a.name.as_str(), a.players, a.port), ("Alpha", 3, 25565));
    assert_eq!((b.name.as_str(), b.players, b.port), ("Bravo", 7, 25566));
}

#[tokio::test]
async fn concurrent_queries_across_tasks() {
    let registry = Arc::new(Registry::builtin());
    let mut tasks = Vec::new();
    for i in 0..8u8 {
        let info = ut3_info_response(&format!("server-{i}"), i, 30000 + i as u16);
        let (port, _) = ut3_server(info, 0).await;
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            let endpoint =
                QueryEndpoint::new("127.0.0.1", port).with_timeout(Duration::from_secs(2));
            registry.query_server("mc", &endpoint, RetryPolicy::once()).await
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let info = task.await.unwrap().unwrap();
        assert_eq!(info.name, format!("server-{i}"));
        assert_eq!(info.players, i as i32);
    }
}

#[tokio::test]
async fn cancelled_query_returns_promptly() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = silent.local_addr().unwrap().port();
    let endpoint = QueryEndpoint::new("127.0.0.1", port).with_timeout(Duration::from_secs(30));
    let registry = Registry::builtin();

    let started = Instant::now();
    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        registry.query_server("mc", &endpoint, RetryPolicy::default()),
    )
    .await;

    assert!(abandoned.is_err());
    assert!(started.elapsed() < Duration::from_secs(1));
    drop(silent);
}

#[tokio::test]
async fn unsupported_game_sends_nothing() {
    let (port, received) = ut3_server(ut3_info_response("Nope", 0, 27000), 0).await;
    let endpoint = QueryEndpoint::new("127.0.0.1", port);

    for game in ["avorion", "not-a-game", ""] {
        let err = Registry::builtin()
            .query_server(game, &endpoint, RetryPolicy::default())
            .await
            .unwrap_err();
        assert_eq!(err, QueryError::UnsupportedGame(game.to_owned()));
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(received.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn custom_registration_overrides_builtin() {
    let (port, _) = ut3_server(ut3_info_response("Custom", 4, 25565), 0).await;
    let endpoint = QueryEndpoint::new("127.0.0.1", port).with_timeout(Duration::from_secs(2));

    let mut registry = Registry::new();
    registry.register("my-ut3-game", Protocol::Ut3);

    let info = registry
        .query_server("my-ut3-game", &endpoint, RetryPolicy::once())
        .await
        .unwrap();
    assert_eq!(info.players_string(), "4/20");
}
