use std::time::Duration;

use bytes::Bytes;
use mllpgate_frame::{frame_payload, FrameAssembler};
use mllpgate_hl7::Message;
use mllpgate_server::{
    AckOutcome, EventStream, IncomingMessage, MllpServer, Resolution, SendConfig, ServerConfig,
    ServerError, ServerEvent,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const WAIT: Duration = Duration::from_secs(5);

fn fixture(raw: &str) -> String {
    raw.trim_end().replace('\n', "\r")
}

fn oru() -> String {
    fixture(include_str!("fixtures/oru_r01.hl7"))
}

fn adt_large() -> String {
    fixture(include_str!("fixtures/adt_a08_large.hl7"))
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

async fn start(config: ServerConfig) -> (MllpServer, EventStream) {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: free_port(),
        ..config
    };
    let (server, mut events) = MllpServer::bind(config).await.expect("server should bind");
    match next_event(&mut events).await {
        ServerEvent::Ready(state) => {
            assert_eq!(state.port, server.port());
            assert!(!state.connected);
        }
        other => panic!("expected ready, got {other:?}"),
    }
    (server, events)
}

async fn next_event(events: &mut EventStream) -> ServerEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("event should arrive")
        .expect("event stream should stay open")
}

async fn next_message(events: &mut EventStream) -> IncomingMessage {
    loop {
        if let ServerEvent::Message(message) = next_event(events).await {
            return message;
        }
    }
}

async fn connect(server: &MllpServer) -> TcpStream {
    TcpStream::connect(server.local_addr())
        .await
        .expect("client should connect")
}

async fn read_frame(stream: &mut TcpStream) -> Bytes {
    let mut assembler = FrameAssembler::new();
    let mut buf = [0u8; 4096];
    tokio::time::timeout(WAIT, async {
        loop {
            let n = stream.read(&mut buf).await.expect("read should succeed");
            assert!(n > 0, "connection closed before a frame arrived");
            if let Some(frame) = assembler.feed(&buf[..n]).expect("frame").pop() {
                return frame;
            }
        }
    })
    .await
    .expect("frame should arrive")
}

fn msa_line(frame: &[u8]) -> String {
    String::from_utf8_lossy(frame)
        .split('\r')
        .find(|segment| segment.starts_with("MSA"))
        .map(str::to_string)
        .unwrap_or_default()
}

#[tokio::test]
async fn explicit_ack_reaches_sender() {
    let config = ServerConfig::default()
        .with_ack_timeout(Duration::from_secs(10))
        .with_timeout_ack("AE");
    let (server, mut events) = start(config).await;

    let mut client = connect(&server).await;
    client.write_all(&frame_payload(oru().as_bytes())).await.unwrap();

    let incoming = next_message(&mut events).await;
    assert_eq!(incoming.id, "MSGID001");
    assert_eq!(incoming.ack, "AE");
    assert_eq!(incoming.text, oru());
    assert_eq!(incoming.message.message_type(), "ORU^R01");
    assert_eq!(server.pending_count(), 1);

    assert_eq!(server.send_response(&incoming.id, "AA"), Resolution::Sent);

    let ack = read_frame(&mut client).await;
    assert_eq!(msa_line(&ack), "MSA|AA|MSGID001");

    let parsed = Message::parse(&String::from_utf8_lossy(&ack));
    assert_eq!(parsed.get("MSH-3").unwrap(), "EHR");
    assert_eq!(parsed.get("MSH-5").unwrap(), "LABSYS");
    assert_eq!(parsed.get("MSH-9").unwrap(), "ACK^R01");
    assert_eq!(server.pending_count(), 0);

    server.close().await;
}

#[tokio::test]
async fn timeout_sends_exactly_one_default_ack() {
    let config = ServerConfig::default().with_ack_timeout(Duration::from_millis(200));
    let (server, mut events) = start(config).await;

    let mut client = connect(&server).await;
    client.write_all(&frame_payload(oru().as_bytes())).await.unwrap();
    let incoming = next_message(&mut events).await;

    let ack = read_frame(&mut client).await;
    assert_eq!(msa_line(&ack), "MSA|AA|MSGID001");

    // Late replies are ignored and never reach the socket.
    assert_eq!(server.respond(&incoming.id, AckOutcome::Default), Resolution::Unknown);
    assert_eq!(server.send_response(&incoming.id, "AE"), Resolution::Unknown);

    let mut buf = [0u8; 64];
    let extra = tokio::time::timeout(Duration::from_millis(400), client.read(&mut buf)).await;
    assert!(extra.is_err(), "no second acknowledgment expected");

    server.close().await;
}

#[tokio::test]
async fn large_message_in_small_writes_is_reassembled() {
    let config = ServerConfig::default().with_ack_timeout(Duration::from_secs(10));
    let (server, mut events) = start(config).await;
    let payload = adt_large();
    assert!(payload.len() > 8000);

    let mut client = connect(&server).await;
    client.set_nodelay(true).unwrap();
    for chunk in frame_payload(payload.as_bytes()).chunks(61) {
        client.write_all(chunk).await.unwrap();
        client.flush().await.unwrap();
        tokio::task::yield_now().await;
    }

    let incoming = next_message(&mut events).await;
    assert_eq!(incoming.id, "ADT20240311-0042");
    assert_eq!(&incoming.raw[..], payload.as_bytes());
    assert_eq!(incoming.text, payload);
    assert_eq!(incoming.message.segments().len(), 65);

    assert!(server.respond(&incoming.id, AckOutcome::StatusCode("AA".into())).is_sent());
    assert_eq!(msa_line(&read_frame(&mut client).await), "MSA|AA|ADT20240311-0042");

    server.close().await;
}

#[tokio::test]
async fn duplicate_in_flight_is_rejected_without_disturbing_original() {
    let config = ServerConfig::default().with_ack_timeout(Duration::from_secs(10));
    let (server, mut events) = start(config).await;

    let mut first = connect(&server).await;
    first.write_all(&frame_payload(oru().as_bytes())).await.unwrap();
    let incoming = next_message(&mut events).await;

    let mut second = connect(&server).await;
    second.write_all(&frame_payload(oru().as_bytes())).await.unwrap();
    let rejection = read_frame(&mut second).await;
    assert_eq!(
        msa_line(&rejection),
        "MSA|AR|MSGID001|Message already in progress"
    );
    assert_eq!(server.pending_count(), 1);

    assert!(server.send_response(&incoming.id, "AA").is_sent());
    assert_eq!(msa_line(&read_frame(&mut first).await), "MSA|AA|MSGID001");

    server.close().await;
}

#[tokio::test]
async fn message_without_control_id_gets_generated_id() {
    let config = ServerConfig::default().with_ack_timeout(Duration::from_secs(10));
    let (server, mut events) = start(config).await;

    let mut client = connect(&server).await;
    let payload = "MSH|^~\\&|A|B|C|D|20240311||ADT^A01||P|2.5\rPID|1";
    client.write_all(&frame_payload(payload.as_bytes())).await.unwrap();

    let incoming = next_message(&mut events).await;
    assert_eq!(incoming.id.len(), 32);
    assert!(server.send_response(&incoming.id, "AA").is_sent());
    assert!(msa_line(&read_frame(&mut client).await).starts_with("MSA|AA|"));

    server.close().await;
}

#[tokio::test]
async fn declared_charset_decodes_text_and_keeps_raw_bytes() {
    let config = ServerConfig::default().with_ack_timeout(Duration::from_secs(10));
    let (server, mut events) = start(config).await;

    let payload: &[u8] =
        b"MSH|^~\\&|A|B|C|D|20240311||ADT^A08|LAT1|P|2.5||||||8859/1\rPID|1||||M\xfcller";
    let mut client = connect(&server).await;
    client.write_all(&frame_payload(payload)).await.unwrap();

    let incoming = next_message(&mut events).await;
    assert_eq!(incoming.id, "LAT1");
    assert!(incoming.text.ends_with("Müller"));
    assert_eq!(&incoming.raw[..], payload);

    server.close().await;
}

#[tokio::test]
async fn connection_state_follows_clients() {
    let (server, mut events) = start(ServerConfig::default()).await;
    assert!(!server.is_connected());
    assert_eq!(server.current_remote(), None);

    let client = connect(&server).await;
    let local = client.local_addr().unwrap().to_string();
    match next_event(&mut events).await {
        ServerEvent::Connected(state) => {
            assert!(state.connected);
            assert_eq!(state.remote, vec![local.clone()]);
        }
        other => panic!("expected connected, got {other:?}"),
    }
    assert!(server.is_connected());
    assert_eq!(server.current_remote(), Some(local));

    drop(client);
    match next_event(&mut events).await {
        ServerEvent::PeerEnded(state) => assert!(!state.connected),
        other => panic!("expected peer end, got {other:?}"),
    }
    match next_event(&mut events).await {
        ServerEvent::StateChanged(state) => assert!(!state.connected),
        other => panic!("expected state change, got {other:?}"),
    }
    match next_event(&mut events).await {
        ServerEvent::Disconnected(state) => assert!(state.remote.is_empty()),
        other => panic!("expected disconnected, got {other:?}"),
    }
    assert!(!server.is_connected());

    server.close().await;
}

#[tokio::test]
async fn close_ends_connections_and_stops_accepting() {
    let config = ServerConfig::default().with_shutdown_grace(Duration::from_millis(300));
    let (server, mut events) = start(config).await;
    let addr = server.local_addr();

    let mut client = connect(&server).await;
    assert!(matches!(next_event(&mut events).await, ServerEvent::Connected(_)));

    server.close().await;
    assert!(server.is_closed());

    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(WAIT, client.read(&mut buf))
        .await
        .expect("server should end the connection")
        .unwrap_or(0);
    assert_eq!(n, 0);
    assert!(TcpStream::connect(addr).await.is_err());

    let mut saw_closed = false;
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(1), events.recv()).await {
        if matches!(event, ServerEvent::Closed(_)) {
            saw_closed = true;
        }
    }
    assert!(saw_closed);

    // Second close is a no-op.
    server.close().await;
}

#[tokio::test]
async fn lingering_peer_is_dropped_after_grace() {
    let grace = Duration::from_millis(300);
    let (server, mut events) = start(ServerConfig::default().with_shutdown_grace(grace)).await;

    let mut client = connect(&server).await;
    assert!(matches!(next_event(&mut events).await, ServerEvent::Connected(_)));

    let started = tokio::time::Instant::now();
    server.close().await;

    // Our end arrives right away; the client keeps its own side open.
    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(WAIT, client.read(&mut buf))
        .await
        .expect("server should end its side")
        .unwrap_or(0);
    assert_eq!(n, 0);

    loop {
        match next_event(&mut events).await {
            ServerEvent::Disconnected(state) => {
                assert!(state.remote.is_empty());
                break;
            }
            ServerEvent::PeerEnded(_) => panic!("client never ended its side"),
            _ => {}
        }
    }
    assert!(started.elapsed() >= grace - Duration::from_millis(50));
    assert!(!server.is_connected());
    assert_eq!(server.current_remote(), None);

    drop(client);
}

#[tokio::test]
async fn invalid_port_is_rejected() {
    let err = MllpServer::bind(ServerConfig::new("127.0.0.1", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::Config(_)));
}

#[tokio::test]
async fn bind_conflict_is_transport_error() {
    let (server, _events) = start(ServerConfig::default()).await;
    let err = MllpServer::bind(ServerConfig::new("127.0.0.1", server.port()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::Transport(_)));
    server.close().await;
}

#[tokio::test]
async fn send_between_servers() {
    let (receiver, mut receiver_events) = start(
        ServerConfig::default().with_ack_timeout(Duration::from_secs(10)),
    )
    .await;
    let (sender, _sender_events) = start(ServerConfig::default()).await;

    let port = receiver.port();
    let exchange = tokio::spawn({
        let sender = sender.clone();
        async move {
            let config = SendConfig {
                timeout: Some(WAIT),
            };
            sender
                .send_with_config("127.0.0.1", port, oru(), &config)
                .await
        }
    });

    let incoming = next_message(&mut receiver_events).await;
    assert!(receiver
        .respond(&incoming.id, AckOutcome::Literal("MSH|^~\\&|X\rMSA|AE|MSGID001|bad dose".into()))
        .is_sent());

    let ack = exchange.await.unwrap().expect("acknowledgment");
    assert_eq!(ack, "MSA|AE|MSGID001|bad dose");

    receiver.close().await;
    sender.close().await;
}

#[tokio::test]
async fn send_to_closed_port_reports_error() {
    let port = free_port();
    let err = mllpgate_server::send("127.0.0.1", port, oru())
        .await
        .unwrap_err();
    assert!(matches!(err, mllpgate_server::SendError::Transport(_)));
}
