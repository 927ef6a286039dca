/*!
 * Network Tests
 * Timed transfers, outbound connects and server accept/echo over loopback
 */

use osa_kernel::monitoring::LogLevel;
use osa_kernel::net::{recv_all, send_all};
use osa_kernel::{
    ComMode, ComProtocol, Connection, Endpoint, NetConfig, OsaError, Outcome, RecordingSink,
    Server, ServerAttributes, SharedSink, Timeout,
};
use nix::sys::socket::{setsockopt, sockopt};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

fn pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (server, _) = listener.accept().unwrap();
    client.set_nonblocking(true).unwrap();
    server.set_nonblocking(true).unwrap();
    (client, server)
}

fn loopback_server(sink: Option<SharedSink>) -> Server {
    Server::create(
        ComMode::Network,
        ComProtocol::TcpIp4,
        ServerAttributes::new(0, 0).with_address(Ipv4Addr::LOCALHOST),
        NetConfig::default(),
        sink,
    )
    .unwrap()
}

fn connect(port: u16) -> Connection {
    let mut conn = Connection::create(
        ComMode::Network,
        ComProtocol::TcpIp4,
        NetConfig::default(),
        None,
    )
    .unwrap();
    let mut endpoint = Endpoint::localhost(port);
    for _ in 0..20 {
        if conn.do_work(&mut endpoint, Timeout::Millis(100)).unwrap().is_ready() {
            assert!(endpoint.connected);
            return conn;
        }
    }
    panic!("connect to port {} did not complete", port);
}

fn accept(server: &Server) -> osa_kernel::PeerId {
    for _ in 0..20 {
        if let Outcome::Ready(peer) = server.probe(Timeout::Millis(100)).unwrap() {
            return peer;
        }
    }
    panic!("no connection accepted");
}

#[test]
fn test_send_all_recv_all_sizes() {
    for size in [0usize, 1, 4096, 1_000_000] {
        let (client, server) = pair();
        let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();

        let writer = {
            let payload = payload.clone();
            thread::spawn(move || send_all(&mut &client, &payload).unwrap())
        };
        let mut received = vec![0u8; size];
        assert_eq!(recv_all(&mut &server, &mut received).unwrap(), size);
        assert_eq!(writer.join().unwrap(), size);
        assert!(received == payload, "payload mismatch at size {}", size);
    }
}

#[test]
fn test_send_all_survives_short_writes() {
    let (client, server) = pair();
    // Tiny kernel buffers force partial writes and EAGAIN on both ends
    setsockopt(&client, sockopt::SndBuf, &4096).unwrap();
    setsockopt(&server, sockopt::RcvBuf, &4096).unwrap();

    let size = 1_000_000;
    let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    let writer = {
        let payload = payload.clone();
        thread::spawn(move || send_all(&mut &client, &payload).unwrap())
    };

    // Let the writer fill the buffers before anyone drains them
    thread::sleep(std::time::Duration::from_millis(50));
    let mut received = vec![0u8; size];
    assert_eq!(recv_all(&mut &server, &mut received).unwrap(), size);
    assert_eq!(writer.join().unwrap(), size);
    assert!(received == payload, "payload corrupted across short writes");
}

#[test]
#[serial]
fn test_connect_and_echo_through_server() {
    let server = loopback_server(None);
    let port = server.local_addr().unwrap().port();

    let conn = connect(port);
    let peer = accept(&server);
    assert_eq!(server.peer_count(), 1);
    assert_eq!(
        server.peer_addr(peer).unwrap(),
        conn.local_addr().unwrap()
    );

    assert_eq!(conn.send(b"ping", Timeout::Millis(1_000)).unwrap(), Outcome::Ready(4));
    let mut buf = [0u8; 4];
    assert_eq!(
        server.recv(peer, &mut buf, Timeout::Millis(1_000)).unwrap(),
        Outcome::Ready(4)
    );
    assert_eq!(&buf, b"ping");

    assert_eq!(
        server.send(peer, b"pong", Timeout::Millis(1_000)).unwrap(),
        Outcome::Ready(4)
    );
    assert_eq!(conn.recv(&mut buf, Timeout::Millis(1_000)).unwrap(), Outcome::Ready(4));
    assert_eq!(&buf, b"pong");

    server.close_peer(peer).unwrap();
    assert!(matches!(
        server.send(peer, b"x", Timeout::NoWait),
        Err(OsaError::InvalidHandle { .. })
    ));
    conn.delete().unwrap();
    server.delete().unwrap();
}

#[test]
#[serial]
fn test_connect_to_closed_port_fails_and_stays_usable() {
    let port = {
        let spare = TcpListener::bind("127.0.0.1:0").unwrap();
        spare.local_addr().unwrap().port()
    };

    let mut conn = Connection::create(
        ComMode::Network,
        ComProtocol::TcpIp4,
        NetConfig::default(),
        None,
    )
    .unwrap();
    let mut endpoint = Endpoint::localhost(port);

    let mut result = conn.do_work(&mut endpoint, Timeout::Millis(1_000));
    for _ in 0..5 {
        if !matches!(result, Ok(Outcome::Pending)) {
            break;
        }
        result = conn.do_work(&mut endpoint, Timeout::Millis(1_000));
    }
    assert!(result.is_err(), "expected refusal, got {:?}", result);
    assert!(!conn.is_connected());
    assert!(!endpoint.connected);

    // the socket was re-created; a real server now accepts the retry
    let server = loopback_server(None);
    let mut endpoint = Endpoint::localhost(server.local_addr().unwrap().port());
    let mut connected = false;
    for _ in 0..20 {
        if conn.do_work(&mut endpoint, Timeout::Millis(100)).unwrap().is_ready() {
            connected = true;
            break;
        }
    }
    assert!(connected);
    accept(&server);
}

#[test]
#[serial]
fn test_unconnected_send_is_not_initialized() {
    let conn = Connection::create(
        ComMode::Network,
        ComProtocol::TcpIp4,
        NetConfig::default(),
        None,
    )
    .unwrap();
    assert!(matches!(
        conn.send(b"x", Timeout::NoWait),
        Err(OsaError::NotInitialized { .. })
    ));
}

#[test]
fn test_unsupported_protocol_not_implemented() {
    let err = Connection::create(ComMode::Usb, ComProtocol::Usb, NetConfig::default(), None)
        .unwrap_err();
    assert!(matches!(err, OsaError::NotImplemented { .. }));
}

#[test]
#[serial]
fn test_recv_timeout_is_reported_to_sink() {
    let sink = Arc::new(RecordingSink::new());
    let server = loopback_server(Some(sink.clone()));
    let _conn = connect(server.local_addr().unwrap().port());
    let peer = accept(&server);

    let mut buf = [0u8; 8];
    assert_eq!(
        server.recv(peer, &mut buf, Timeout::Millis(20)).unwrap(),
        Outcome::Pending
    );
    assert_eq!(sink.at_least(LogLevel::Warning).len(), 1);
}

#[test]
#[serial]
fn test_peer_ids_are_recycled() {
    let server = loopback_server(None);
    let port = server.local_addr().unwrap().port();

    let _a = connect(port);
    let first = accept(&server);
    server.close_peer(first).unwrap();

    let _b = connect(port);
    let second = accept(&server);
    assert_eq!(second, first);
    assert_eq!(server.peers(), vec![second]);
}
