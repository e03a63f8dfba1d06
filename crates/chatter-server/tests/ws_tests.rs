//! End-to-end tests over a real `WebSocket`.
//!
//! Each test runs the universe task and the server on a port-0 listener,
//! then drives blocking `tungstenite` clients from `spawn_blocking`.

#![allow(clippy::unwrap_used)]

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chatter_core::{Universe, UniverseHandle, run_universe};
use chatter_protocol::{BinaryPacket, PacketRegistry, ServerMessage};
use chatter_server::{AppState, build_router, spawn_server};
use chatter_types::WorldId;
use chatter_world::{MarkovSource, World, WorldSettings};
use tower::ServiceExt;
use tungstenite::protocol::WebSocket;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::Message;

type Client = WebSocket<MaybeTlsStream<TcpStream>>;

fn universe() -> Universe {
    let mut universe = Universe::new(WorldId::new("default"));
    let settings = WorldSettings {
        seed: Some(7),
        ..WorldSettings::default()
    };
    let markov = MarkovSource::from_default_corpus().unwrap();
    universe
        .add_world(World::new(WorldId::new("default"), settings, markov).unwrap())
        .unwrap();
    universe
}

fn app_state() -> Arc<AppState> {
    let (handle, commands) = UniverseHandle::channel();
    tokio::spawn(run_universe(universe(), commands, Duration::from_millis(20)));
    Arc::new(AppState::new(handle, PacketRegistry::standard().unwrap()))
}

async fn start() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    spawn_server(listener, app_state());
    addr
}

fn open(addr: SocketAddr, query: &str, identifier: &str) -> Client {
    let url = format!("ws://{addr}/connect{query}");
    let (mut socket, _) = tungstenite::connect(url.as_str()).unwrap();
    if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    }
    socket.send(Message::Text(identifier.to_owned())).unwrap();
    socket
}

fn next_message(socket: &mut Client) -> ServerMessage {
    loop {
        match socket.read().unwrap() {
            Message::Text(text) => return ServerMessage::decode(&text).unwrap(),
            Message::Close(frame) => panic!("socket closed: {frame:?}"),
            _ => {}
        }
    }
}

fn next_update(socket: &mut Client) -> ServerMessage {
    loop {
        let message = next_message(socket);
        if matches!(message, ServerMessage::UpdateWorld { .. }) {
            return message;
        }
    }
}

fn next_packet(socket: &mut Client, registry: &PacketRegistry) -> BinaryPacket {
    loop {
        match socket.read().unwrap() {
            Message::Binary(bytes) => return registry.decode(&bytes).unwrap(),
            Message::Close(frame) => panic!("socket closed: {frame:?}"),
            _ => {}
        }
    }
}

fn close_reason(socket: &mut Client) -> String {
    loop {
        match socket.read() {
            Ok(Message::Close(Some(frame))) => return frame.reason.into_owned(),
            Ok(Message::Close(None)) => panic!("closed without a reason"),
            Ok(_) => {}
            Err(e) => panic!("no close frame: {e}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn handshake_opens_default_world() {
    let addr = start().await;
    tokio::task::spawn_blocking(move || {
        let mut alice = open(addr, "", "  alice ");
        let ServerMessage::OpenWorld { you, entities } = next_message(&mut alice) else {
            panic!("first message must be open-world");
        };
        assert!(entities.contains_key(&you));
        assert_eq!(entities[&you]["face"], "alice");

        let ServerMessage::UpdateWorld { entities, .. } = next_update(&mut alice) else {
            panic!("expected update-world");
        };
        // The first tick after joining repeats full data, own ant included.
        assert!(entities[&you].contains_key("type"));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_identifier_is_closed_with_reason() {
    let addr = start().await;
    tokio::task::spawn_blocking(move || {
        let mut first = open(addr, "", "bob");
        assert!(matches!(next_message(&mut first), ServerMessage::OpenWorld { .. }));

        let mut second = open(addr, "", "bob");
        assert_eq!(close_reason(&mut second), "Face already in use");

        // The original holder keeps receiving ticks.
        next_update(&mut first);
        next_update(&mut first);
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_world_and_blank_identifier_are_rejected() {
    let addr = start().await;
    tokio::task::spawn_blocking(move || {
        let mut lost = open(addr, "?world=atlantis", "carol");
        assert_eq!(close_reason(&mut lost), "Unknown world");

        let mut blank = open(addr, "", "   ");
        assert_eq!(close_reason(&mut blank), "Invalid identifier");
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn legacy_move_is_broadcast_as_binary() {
    let addr = start().await;
    tokio::task::spawn_blocking(move || {
        let registry = PacketRegistry::standard().unwrap();
        let mut dana = open(addr, "", "dana");
        assert!(matches!(next_message(&mut dana), ServerMessage::OpenWorld { .. }));

        let frame = registry
            .encode(&BinaryPacket::MoveToPos { x: 20.0, y: 30.0 })
            .unwrap();
        dana.send(Message::Binary(frame)).unwrap();

        let BinaryPacket::MovePlayer { x, y, face } = next_packet(&mut dana, &registry) else {
            panic!("expected move-player");
        };
        assert!((x - 20.0).abs() < f32::EPSILON);
        assert!((y - 30.0).abs() < f32::EPSILON);
        assert_eq!(face, "dana");
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_frame_ends_session_and_frees_identifier() {
    let addr = start().await;
    tokio::task::spawn_blocking(move || {
        let mut erin = open(addr, "", "erin");
        assert!(matches!(next_message(&mut erin), ServerMessage::OpenWorld { .. }));
        erin.send(Message::Text("{not json".to_owned())).unwrap();

        // The server drops the socket; the identifier becomes free again.
        let mut rejoined = None;
        for _ in 0..50 {
            std::thread::sleep(Duration::from_millis(20));
            let mut again = open(addr, "", "erin");
            if let Ok(Message::Text(text)) = again.read() {
                if matches!(ServerMessage::decode(&text), Ok(ServerMessage::OpenWorld { .. })) {
                    rejoined = Some(again);
                    break;
                }
            }
        }
        assert!(rejoined.is_some(), "identifier was never released");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn health_check_is_ok() {
    let (handle, _commands) = UniverseHandle::channel();
    let state = Arc::new(AppState::new(handle, PacketRegistry::standard().unwrap()));
    let response = build_router(state)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
