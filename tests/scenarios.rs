//! End-to-end client/server sessions

use mocksocket::{
    close_code, listener, ConnectionRegistry, Delivery, EmitOptions, Event, Listener, ReadyState,
    Server, ServerOptions, SocketError, SocketIoClient, WebSocket, WebSocketBinding,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn recorder() -> (Arc<Mutex<Vec<Delivery>>>, Listener) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    (seen, listener(move |d| s.lock().unwrap().push(d.clone())))
}

#[tokio::test]
async fn test_client_opens_and_server_sees_connection() {
    let registry = ConnectionRegistry::new();
    let server = Server::new(&registry, "ws://x").unwrap();
    let (connections, on_connection) = recorder();
    server.on("connection", on_connection);

    let client = WebSocket::new(&registry, "ws://x").unwrap();
    assert_eq!(client.ready_state(), ReadyState::Connecting);

    registry.settle().await;

    assert_eq!(client.ready_state(), ReadyState::Open);
    let connections = connections.lock().unwrap();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].connection(), Some(client.handle()));

    server.stop();
}

#[tokio::test]
async fn test_rejected_handshake() {
    let registry = ConnectionRegistry::new();
    let server = Server::with_options(
        &registry,
        "ws://x",
        ServerOptions::default().verify_client(|| false),
    )
    .unwrap();

    let client = WebSocket::new(&registry, "ws://x").unwrap();
    let (errors, on_error) = recorder();
    let (closes, on_close) = recorder();
    client.on_error(on_error);
    client.on_close(on_close);

    registry.settle().await;

    assert_eq!(client.ready_state(), ReadyState::Closed);
    assert_eq!(errors.lock().unwrap().len(), 1);
    let closes = closes.lock().unwrap();
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].event().and_then(Event::code), Some(close_code::NORMAL));
    assert!(server.clients().is_empty());

    server.stop();
}

#[tokio::test]
async fn test_emit_to_listed_sockets_only() {
    let registry = ConnectionRegistry::new();
    let server = Server::new(&registry, "ws://x").unwrap();
    let a = WebSocket::new(&registry, "ws://x").unwrap();
    let b = WebSocket::new(&registry, "ws://x").unwrap();
    let c = WebSocket::new(&registry, "ws://x").unwrap();

    let logs: Vec<_> = [&a, &b, &c]
        .iter()
        .map(|socket| {
            let (seen, on_greeting) = recorder();
            socket.on("greeting", on_greeting);
            seen
        })
        .collect();
    registry.settle().await;

    server.emit(
        "greeting",
        "hi",
        EmitOptions::websockets(vec![a.handle().clone(), c.handle().clone()]),
    );

    for index in [0, 2] {
        let seen = logs[index].lock().unwrap();
        assert_eq!(seen.len(), 1);
        let event = seen[0].event().unwrap();
        assert_eq!(event.event_type, "greeting");
        assert_eq!(event.data(), Some(&json!("hi")));
    }
    assert!(logs[1].lock().unwrap().is_empty());

    server.stop();
}

#[tokio::test]
async fn test_room_membership_controls_delivery() {
    let registry = ConnectionRegistry::new();
    let server = Server::new(&registry, "ws://x").unwrap();
    let member = SocketIoClient::new(&registry, "ws://x").unwrap();
    let leaver = SocketIoClient::new(&registry, "ws://x").unwrap();
    let outsider = SocketIoClient::new(&registry, "ws://x").unwrap();
    registry.settle().await;

    member.join("lobby");
    leaver.join("lobby");

    let (member_seen, on_member) = recorder();
    let (leaver_seen, on_leaver) = recorder();
    let (outsider_seen, on_outsider) = recorder();
    member.on("x", on_member);
    leaver.on("x", on_leaver);
    outsider.on("x", on_outsider);

    server.to("lobby").emit("x", 1);
    leaver.leave("lobby");
    server.to("lobby").emit("x", 2);

    let payloads = |log: &Arc<Mutex<Vec<Delivery>>>| -> Vec<_> {
        log.lock().unwrap().iter().map(|d| d.args().to_vec()).collect()
    };
    assert_eq!(payloads(&member_seen), vec![vec![json!(1)], vec![json!(2)]]);
    assert_eq!(payloads(&leaver_seen), vec![vec![json!(1)]]);
    assert!(payloads(&outsider_seen).is_empty());

    server.stop();
}

#[tokio::test]
async fn test_client_close_fires_once_on_each_side() {
    let registry = ConnectionRegistry::new();
    let server = Server::new(&registry, "ws://x").unwrap();
    let (server_closes, on_server_close) = recorder();
    server.on("close", on_server_close);

    let client = WebSocket::new(&registry, "ws://x").unwrap();
    let (client_closes, on_client_close) = recorder();
    client.on_close(on_client_close);
    registry.settle().await;

    client.close();
    client.close();

    assert_eq!(client.ready_state(), ReadyState::Closed);
    assert_eq!(client_closes.lock().unwrap().len(), 1);
    assert_eq!(server_closes.lock().unwrap().len(), 1);
    assert!(server.clients().is_empty());

    server.stop();
}

#[tokio::test]
async fn test_send_after_close_never_reaches_server() {
    let registry = ConnectionRegistry::new();
    let server = Server::new(&registry, "ws://x").unwrap();
    let (messages, on_message) = recorder();
    server.on("message", on_message);

    let client = WebSocket::new(&registry, "ws://x").unwrap();
    registry.settle().await;
    client.close();

    assert!(matches!(client.send("late"), Err(SocketError::InvalidState(_))));
    registry.settle().await;
    assert!(messages.lock().unwrap().is_empty());

    server.stop();
}

#[tokio::test]
async fn test_client_messages_arrive_in_order() {
    let registry = ConnectionRegistry::new();
    let server = Server::new(&registry, "ws://x").unwrap();
    let (messages, on_message) = recorder();
    server.on("message", on_message);

    let client = WebSocket::new(&registry, "ws://x").unwrap();
    registry.settle().await;

    for n in 0..5 {
        client.send(n).unwrap();
    }
    // Nothing is delivered synchronously
    assert!(messages.lock().unwrap().is_empty());
    registry.settle().await;

    let received: Vec<_> = messages
        .lock()
        .unwrap()
        .iter()
        .filter_map(|d| d.payload().cloned())
        .collect();
    assert_eq!(received, (0..5).map(|n| json!(n)).collect::<Vec<_>>());

    server.stop();
}

#[tokio::test]
async fn test_client_without_server_errors_out() {
    let registry = ConnectionRegistry::new();
    let client = WebSocket::new(&registry, "ws://nobody").unwrap();
    let (errors, on_error) = recorder();
    client.on_error(on_error);

    registry.settle().await;

    assert_eq!(client.ready_state(), ReadyState::Closed);
    assert_eq!(errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_registries_are_isolated() {
    let first = ConnectionRegistry::new();
    let second = ConnectionRegistry::new();
    let a = Server::new(&first, "ws://x").unwrap();
    // Same URL, different registry: no collision
    let b = Server::new(&second, "ws://x").unwrap();

    let client = WebSocket::new(&first, "ws://x").unwrap();
    first.settle().await;

    assert_eq!(a.clients(), vec![client.handle().clone()]);
    assert!(b.clients().is_empty());

    a.stop();
    b.stop();
}

#[tokio::test]
async fn test_stop_restores_custom_binding() {
    let registry = ConnectionRegistry::new();
    let harness = registry.install_binding(WebSocketBinding::Custom {
        name: "harness".to_string(),
        connect: Arc::new(|_: &ConnectionRegistry, url: &str| Err(SocketError::NoServer(url.to_string()))),
    });

    let server = Server::new(&registry, "ws://x").unwrap();
    let socket = registry.connect_ambient("ws://x").unwrap();
    registry.settle().await;
    assert_eq!(socket.ready_state(), ReadyState::Open);

    server.stop();
    server.stop();
    assert!(matches!(
        registry.connect_ambient("ws://x"),
        Err(SocketError::NoServer(_))
    ));

    registry.uninstall_binding(harness);
    assert!(registry.binding().is_none());
}

#[tokio::test]
async fn test_socket_io_round_trip() {
    let registry = ConnectionRegistry::new();
    let server = Server::new(&registry, "http://localhost:3000").unwrap();

    let echo = server.clone();
    server.on(
        "chat",
        listener(move |d| {
            echo.emit("chat", json!(d.args()), EmitOptions::default());
        }),
    );

    let client = SocketIoClient::new(&registry, "http://localhost:3000").unwrap();
    let (replies, on_reply) = recorder();
    client.on("chat", on_reply);
    registry.settle().await;
    assert!(client.connected());

    client.emit("chat", vec![json!("hi"), json!(2)]).unwrap();

    assert_eq!(replies.lock().unwrap()[0].args(), &[json!("hi"), json!(2)]);

    client.disconnect();
    assert!(client.disconnected());
    server.stop();
}
