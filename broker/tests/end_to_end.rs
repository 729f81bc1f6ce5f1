// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Drives the dispatcher end-to-end over real TCP sockets, exercising the same
//! codepath a live broker uses: `Connection` tasks talking to one `Dispatcher` task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codec::{ConnectPacket, PublishPacket, QoS, SubscribePacket, SubscribeTopic, VariablePacket};
use mqttd::auth::AllowAll;
use mqttd::connection::Connection;
use mqttd::dispatcher::{Dispatcher, DispatcherConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

fn test_dispatcher_config() -> DispatcherConfig {
    DispatcherConfig {
        max_inflight_messages: 8,
        pub_ack_timeout: Duration::from_secs(5),
        pub_max_retries: 3,
        maximum_qos: QoS::ExactlyOnce,
    }
}

/// Spawns a broker (one dispatcher task + one accept loop) bound to an ephemeral port
/// and returns its address.
async fn spawn_broker() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (to_dispatcher, from_sessions) = mpsc::channel(1024);
    let dispatcher = Dispatcher::new(test_dispatcher_config());
    tokio::spawn(dispatcher.run(from_sessions));

    let next_session_id = Arc::new(AtomicU64::new(1));
    tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            let session_id = next_session_id.fetch_add(1, Ordering::Relaxed);
            let connection = Connection::new(
                session_id,
                socket,
                4096,
                Duration::from_secs(5),
                to_dispatcher.clone(),
                Arc::new(AllowAll),
            );
            tokio::spawn(connection.run());
        }
    });

    addr
}

async fn send(stream: &mut TcpStream, packet: VariablePacket) {
    let mut buf = Vec::new();
    packet.encode(&mut buf).unwrap();
    stream.write_all(&buf).await.unwrap();
}

async fn recv(stream: &mut TcpStream) -> VariablePacket {
    let mut reader = codec::FrameReader::new();
    let mut buf = [0_u8; 1024];
    loop {
        if let Some(frame) = reader.parse_frame().unwrap() {
            return VariablePacket::decode(&frame).unwrap();
        }
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .expect("timed out waiting for a packet")
            .unwrap();
        assert!(n > 0, "connection closed unexpectedly");
        reader.extend(&buf[..n]);
    }
}

async fn connect(addr: std::net::SocketAddr, client_id: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    send(&mut stream, ConnectPacket::new(client_id).unwrap().into()).await;
    let ack = recv(&mut stream).await;
    assert!(matches!(ack, VariablePacket::ConnectAck(_)), "got {ack:?}");
    stream
}

#[tokio::test]
async fn connect_subscribe_publish_delivers_to_subscriber() {
    let addr = spawn_broker().await;

    let mut subscriber = connect(addr, "subscriber").await;
    send(
        &mut subscriber,
        SubscribePacket::new(1, vec![SubscribeTopic { topic_filter: "a/b".to_string(), qos: QoS::AtMostOnce }])
            .unwrap()
            .into(),
    )
    .await;
    let suback = recv(&mut subscriber).await;
    assert!(matches!(suback, VariablePacket::SubscribeAck(_)), "got {suback:?}");

    let mut publisher = connect(addr, "publisher").await;
    send(
        &mut publisher,
        PublishPacket::new("a/b", QoS::AtMostOnce, None, b"hello".to_vec())
            .unwrap()
            .into(),
    )
    .await;

    let delivered = recv(&mut subscriber).await;
    match delivered {
        VariablePacket::Publish(p) => {
            assert_eq!(p.topic, "a/b");
            assert_eq!(p.payload, b"hello");
        }
        other => panic!("expected a PUBLISH, got {other:?}"),
    }
}

#[tokio::test]
async fn qos1_publish_is_acknowledged_and_routed() {
    let addr = spawn_broker().await;

    let mut subscriber = connect(addr, "qos1-subscriber").await;
    send(
        &mut subscriber,
        SubscribePacket::new(1, vec![SubscribeTopic { topic_filter: "x/y".to_string(), qos: QoS::AtLeastOnce }])
            .unwrap()
            .into(),
    )
    .await;
    recv(&mut subscriber).await;

    let mut publisher = connect(addr, "qos1-publisher").await;
    send(
        &mut publisher,
        PublishPacket::new("x/y", QoS::AtLeastOnce, Some(42), b"world".to_vec())
            .unwrap()
            .into(),
    )
    .await;

    let puback = recv(&mut publisher).await;
    assert!(matches!(puback, VariablePacket::PublishAck(ref p) if p.packet_id == 42), "got {puback:?}");

    let delivered = recv(&mut subscriber).await;
    match delivered {
        VariablePacket::Publish(p) => {
            assert_eq!(p.topic, "x/y");
            assert_eq!(p.qos, QoS::AtLeastOnce);
        }
        other => panic!("expected a PUBLISH, got {other:?}"),
    }
}

#[tokio::test]
async fn retained_message_is_delivered_on_subscribe() {
    let addr = spawn_broker().await;

    let mut publisher = connect(addr, "retain-publisher").await;
    send(
        &mut publisher,
        PublishPacket::new("r/t", QoS::AtMostOnce, None, b"sticky".to_vec())
            .unwrap()
            .with_flags(false, true)
            .into(),
    )
    .await;

    let mut subscriber = connect(addr, "retain-subscriber").await;
    send(
        &mut subscriber,
        SubscribePacket::new(1, vec![SubscribeTopic { topic_filter: "r/t".to_string(), qos: QoS::AtMostOnce }])
            .unwrap()
            .into(),
    )
    .await;
    recv(&mut subscriber).await;

    let delivered = recv(&mut subscriber).await;
    match delivered {
        VariablePacket::Publish(p) => assert_eq!(p.payload, b"sticky"),
        other => panic!("expected the retained PUBLISH, got {other:?}"),
    }
}

#[tokio::test]
async fn live_publish_with_retain_set_is_not_delivered_as_retained() {
    let addr = spawn_broker().await;

    let mut subscriber = connect(addr, "live-retain-subscriber").await;
    send(
        &mut subscriber,
        SubscribePacket::new(1, vec![SubscribeTopic { topic_filter: "r/live".to_string(), qos: QoS::AtMostOnce }])
            .unwrap()
            .into(),
    )
    .await;
    recv(&mut subscriber).await;

    let mut publisher = connect(addr, "live-retain-publisher").await;
    send(
        &mut publisher,
        PublishPacket::new("r/live", QoS::AtMostOnce, None, b"now".to_vec())
            .unwrap()
            .with_flags(false, true)
            .into(),
    )
    .await;

    let delivered = recv(&mut subscriber).await;
    match delivered {
        VariablePacket::Publish(p) => {
            assert_eq!(p.payload, b"now");
            assert!(!p.retain, "a live delivery to an already-subscribed client must not carry retain=1");
        }
        other => panic!("expected a PUBLISH, got {other:?}"),
    }
}

#[tokio::test]
async fn reconnecting_with_the_same_client_id_closes_the_stale_connection() {
    let addr = spawn_broker().await;

    let mut first = connect(addr, "duplicate-client").await;
    let mut second_stream = TcpStream::connect(addr).await.unwrap();
    send(
        &mut second_stream,
        ConnectPacket::new("duplicate-client").unwrap().into(),
    )
    .await;
    let ack = recv(&mut second_stream).await;
    assert!(matches!(ack, VariablePacket::ConnectAck(_)), "got {ack:?}");

    let mut buf = [0_u8; 16];
    let closed = tokio::time::timeout(Duration::from_secs(5), first.read(&mut buf))
        .await
        .expect("timed out waiting for the stale connection to close");
    assert_eq!(closed.unwrap(), 0, "stale connection should be closed by the server, not left open");
}
