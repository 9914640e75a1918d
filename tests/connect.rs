//! Connect orchestration: candidates, deadlines and Unix paths

mod common;

use std::net::TcpListener;
use std::path::Path;
use std::time::{Duration, Instant};
use xtransport::connection::{Connection, Endpoint, PlainConnection, Stream};
use xtransport::net::{self, PollMode};
use xtransport::{Error, ErrorKind};

#[test]
fn test_connect_tcp_loopback() {
    common::init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let socket = net::connect_tcp("127.0.0.1", port, 2_000_000).unwrap();
    let (accepted, peer) = listener.accept().unwrap();
    assert_eq!(socket.local_addr().unwrap().as_socket(), Some(peer));
    assert!(net::socket::poll_one(&socket, PollMode::Write, false, 0).unwrap());

    drop(accepted);
    net::socket::close(Some(socket)).unwrap();
}

#[test]
fn test_connect_by_name() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    // "localhost" may resolve to ::1 first; the IPv4 candidate must still win.
    let socket = net::connect_tcp("localhost", port, 0).unwrap();
    assert!(socket.peer_addr().unwrap().as_socket().is_some());
}

#[test]
fn test_refused_is_reported_not_timed_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = net::connect_tcp("127.0.0.1", port, 1_000_000).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
    assert!(!err.is_connect_timeout());
}

#[test]
fn test_unresolvable_host() {
    let err = net::connect_tcp("no-such-host.invalid", 80, 0).unwrap_err();
    assert!(!err.is_connect_timeout());
    assert!(matches!(
        err.kind(),
        ErrorKind::AddressUnreachable | ErrorKind::ResolverTransient | ErrorKind::Unknown
    ));
}

#[test]
fn test_unix_missing_path() {
    let dir = tempfile::tempdir().unwrap();
    let err = net::connect_unix(&dir.path().join("absent.sock"), 0).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
}

#[test]
fn test_unix_path_too_long() {
    let long = "x".repeat(200);
    let err = net::connect_unix(Path::new(&long), 0).unwrap_err();
    assert!(!err.is_connect_timeout());
}

#[test]
fn test_largest_timeout_waits_without_limit() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let socket = net::connect_tcp("127.0.0.1", port, u64::MAX).unwrap();
    assert!(socket.peer_addr().is_ok());

    let mut conn = PlainConnection::new(Endpoint::tcp("127.0.0.1", port))
        .with_connect_timeout(Duration::MAX);
    conn.connect().unwrap();
    assert!(conn.is_open());
}

/// Once a Unix listener's backlog is full, further non-blocking connects
/// must fail rather than hand back an unconnected socket.
#[cfg(target_os = "linux")]
#[test]
fn test_unix_full_backlog_is_an_error() {
    use socket2::{Domain, SockAddr, Socket, Type};

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backlog.sock");

    let listener = Socket::new(Domain::UNIX, Type::STREAM, None).unwrap();
    listener.bind(&SockAddr::unix(&path).unwrap()).unwrap();
    listener.listen(0).unwrap();

    let mut connected = Vec::new();
    let mut failures = Vec::new();
    for _ in 0..4 {
        match net::connect_unix(&path, 500_000) {
            Ok(socket) => connected.push(socket),
            Err(e) => failures.push(e),
        }
    }

    for socket in &connected {
        assert!(socket.peer_addr().is_ok(), "connect reported success without a peer");
    }
    assert!(!failures.is_empty());
    for err in &failures {
        assert_eq!(err.raw_os_error(), Some(libc::EAGAIN), "{}", err);
    }

    let mut conn = PlainConnection::new(Endpoint::unix(&path));
    assert!(conn.connect().is_err());
    assert!(conn.is_closed());
}

/// A listener with a full accept queue leaves further connects pending,
/// which lets the deadline expire on loopback.
#[cfg(target_os = "linux")]
#[test]
fn test_deadline_expires_on_full_backlog() {
    use socket2::{Domain, Socket, Type};

    let listener = Socket::new(Domain::IPV4, Type::STREAM, None).unwrap();
    listener
        .bind(&"127.0.0.1:0".parse::<std::net::SocketAddr>().unwrap().into())
        .unwrap();
    listener.listen(0).unwrap();
    let port = listener.local_addr().unwrap().as_socket().unwrap().port();

    let mut fillers = Vec::new();
    for _ in 0..8 {
        if let Ok(s) = net::connect_tcp("127.0.0.1", port, 100_000) {
            fillers.push(s);
        }
    }

    let started = Instant::now();
    let err = net::connect_tcp("127.0.0.1", port, 300_000).unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, Error::ConnectTimeout { millis: 300 }));
    assert_eq!(err.kind(), ErrorKind::TimedOut);
    assert!(elapsed >= Duration::from_millis(250), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "{:?}", elapsed);
    assert!(err.to_string().contains("300 milliseconds"));
}

#[test]
#[ignore = "needs a network path that drops SYNs"]
fn test_deadline_on_blackhole_address() {
    let started = Instant::now();
    let err = net::connect_tcp("10.255.255.1", 9, 200_000).unwrap_err();
    assert!(err.is_connect_timeout());
    assert!(started.elapsed() < Duration::from_secs(2));
}
