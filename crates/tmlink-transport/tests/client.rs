use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use tmlink_frame::{encode_frame, Frame, FrameKind, Payload, Script};
use tmlink_transport::{
    ClientConfig, Drained, SendStatus, TransportClient, TransportError, MAX_FRAMES_PER_DRAIN,
};

const TIMEOUT: Duration = Duration::from_millis(1000);

fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn connected_pair() -> (TransportClient, TcpStream) {
    let (listener, port) = listener();
    let mut client = TransportClient::new("127.0.0.1", port);
    client.connect(TIMEOUT).unwrap();
    let (peer, _) = listener.accept().unwrap();
    assert!(client.prepare_receiver());
    (client, peer)
}

fn wire(kind: FrameKind, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(&kind, payload, &mut buf);
    buf.to_vec()
}

fn drain_frames(client: &mut TransportClient) -> Vec<Frame> {
    match client.drain_once(TIMEOUT).unwrap() {
        Drained::Frames(frames) => frames,
        other => panic!("expected frames, got {other:?}"),
    }
}

#[test]
fn connect_and_close() {
    let (listener, port) = listener();
    let mut client = TransportClient::new("127.0.0.1", port);
    assert!(!client.is_connected());
    assert_eq!(client.endpoint(), format!("127.0.0.1:{port}"));

    client.connect(TIMEOUT).unwrap();
    assert!(client.is_connected());
    assert!(client.sender().is_connected());
    let _peer = listener.accept().unwrap();

    // Connecting again is a no-op.
    client.connect(TIMEOUT).unwrap();

    client.close();
    assert!(!client.is_connected());
    assert!(!client.sender().is_connected());
    client.close();
}

#[test]
fn connect_refused() {
    let (listener, port) = listener();
    drop(listener);

    let mut client = TransportClient::new("127.0.0.1", port);
    let err = client.connect(TIMEOUT).unwrap_err();
    assert!(
        matches!(err, TransportError::Connect { .. }),
        "unexpected error: {err:?}"
    );
    assert!(!client.is_connected());
}

#[test]
fn connect_unresolvable_host() {
    let mut client = TransportClient::new("host.invalid", 5891);
    assert!(client.connect(TIMEOUT).is_err());
    assert!(!client.is_connected());
}

#[test]
fn send_without_connection() {
    let client = TransportClient::new("127.0.0.1", 1);
    assert!(matches!(
        client.send(b"x"),
        Err(TransportError::NotConnected)
    ));
    assert!(matches!(
        client.send_all(b"x"),
        Err(TransportError::NotConnected)
    ));
}

#[test]
fn prepare_receiver_requires_connection() {
    let mut client = TransportClient::new("127.0.0.1", 1);
    assert!(!client.prepare_receiver());
    assert!(matches!(
        client.drain_once(Duration::from_millis(10)).unwrap(),
        Drained::NotReady
    ));
}

#[test]
fn frames_reach_the_peer() {
    let (client, mut peer) = connected_pair();

    let mut expected = wire(FrameKind::Script, b"1,ScriptExit()");
    expected.extend(wire(FrameKind::StateReport, &vec![b'a'; 64 * 1024]));
    let reader = thread::spawn(move || {
        let mut received = vec![0; expected.len()];
        peer.read_exact(&mut received).unwrap();
        assert_eq!(received, expected);
    });

    let mut frame = Script::new("1", "ScriptExit()").to_frame();
    assert_eq!(client.send_frame(&mut frame).unwrap(), SendStatus::Complete);

    let mut large = Frame::new(FrameKind::StateReport, vec![b'a'; 64 * 1024]);
    assert_eq!(
        client.send_frame_adaptive(&mut large).unwrap(),
        SendStatus::Complete
    );

    reader.join().unwrap();
}

#[test]
fn sender_clone_writes_to_current_connection() {
    let (client, mut peer) = connected_pair();
    let sender = client.sender();

    thread::spawn(move || sender.send_all(b"hello").unwrap())
        .join()
        .unwrap();

    let mut buf = [0u8; 5];
    peer.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"hello");
}

#[test]
fn drain_times_out_quietly() {
    let (mut client, _peer) = connected_pair();
    assert!(matches!(
        client.drain_once(Duration::from_millis(20)).unwrap(),
        Drained::Timeout
    ));
}

#[test]
fn drain_decodes_split_frames() {
    let (mut client, mut peer) = connected_pair();
    let first = wire(FrameKind::StateReport, b"1,2,abc");
    let second = wire(FrameKind::StateReport, b"2,2,def");

    let mut chunk = first.clone();
    chunk.extend_from_slice(&second[..4]);
    peer.write_all(&chunk).unwrap();

    let frames = drain_frames(&mut client);
    assert_eq!(frames.len(), 1);
    assert_eq!(&frames[0].payload[..], b"1,2,abc");
    assert_eq!(client.buffered(), 4);

    peer.write_all(&second[4..]).unwrap();
    let frames = drain_frames(&mut client);
    assert_eq!(&frames[0].payload[..], b"2,2,def");
    assert_eq!(client.buffered(), 0);
}

#[test]
fn drain_reports_garbage() {
    let (mut client, mut peer) = connected_pair();
    peer.write_all(b"no frames here").unwrap();
    assert!(matches!(
        client.drain_once(TIMEOUT).unwrap(),
        Drained::NoValidFrame
    ));
}

#[test]
fn drain_reports_peer_close() {
    let (mut client, peer) = connected_pair();
    drop(peer);
    assert!(matches!(
        client.drain_once(TIMEOUT).unwrap(),
        Drained::PeerClosed
    ));
}

#[test]
fn reset_ends_the_read_side() {
    let (mut client, _peer) = connected_pair();
    client.sender().reset();
    assert!(client.drain_once(TIMEOUT).unwrap().is_fatal());
}

#[test]
fn flooding_peer_is_drained_in_bounded_batches() {
    let config = ClientConfig::with_recv_buffer(64 * 1024);
    let (listener, port) = listener();
    let mut client = TransportClient::with_config("127.0.0.1", port, config);
    client.connect(TIMEOUT).unwrap();
    let (mut peer, _) = listener.accept().unwrap();
    assert!(client.prepare_receiver());

    let mut burst = Vec::new();
    for i in 0..25 {
        burst.extend(wire(FrameKind::StateReport, format!("{i},2,x").as_bytes()));
    }
    peer.write_all(&burst).unwrap();
    thread::sleep(Duration::from_millis(50));

    let frames = drain_frames(&mut client);
    assert!(frames.len() <= MAX_FRAMES_PER_DRAIN);
    assert!(client.buffered() > 0);
}

#[test]
fn send_all_to_stalled_peer_is_bounded() {
    let (listener, port) = listener();
    let mut client = TransportClient::new("127.0.0.1", port);
    client.connect(Duration::from_millis(200)).unwrap();
    // Accepted but never read.
    let (_peer, _) = listener.accept().unwrap();

    let sender = client.sender();
    let writer = thread::spawn(move || sender.send_all(&vec![0u8; 64 * 1024 * 1024]));

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while !writer.is_finished() {
        assert!(std::time::Instant::now() < deadline, "send_all never timed out");
        thread::sleep(Duration::from_millis(20));
    }
    let err = writer.join().unwrap().unwrap_err();
    assert!(matches!(err, TransportError::Io(_)), "unexpected error: {err:?}");

    // The sender lock is free again, so close does not hang.
    client.close();
    assert!(!client.is_connected());
}
