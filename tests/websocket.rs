//! Event socket lifecycle against an in-process server

use futures_util::{SinkExt, StreamExt};
use lavapool::{Event, EventReceiver, LavaError, Node, NodeConfig, NodePool, SocketState};
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

const PASSWORD: &str = "youshallnotpass";
const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy)]
enum Handshake {
    Accept,
    Reject,
}

struct Server {
    addr: SocketAddr,
    attempts: Arc<AtomicUsize>,
    headers: Arc<Mutex<Vec<(String, String, String)>>>,
    sockets: mpsc::UnboundedReceiver<WebSocketStream<TcpStream>>,
}

impl Server {
    async fn start(handshake: Handshake) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let attempts = Arc::new(AtomicUsize::new(0));
        let headers = Arc::new(Mutex::new(Vec::new()));
        let (tx, sockets) = mpsc::unbounded_channel();

        let counter = Arc::clone(&attempts);
        let seen = Arc::clone(&headers);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let seen = Arc::clone(&seen);
                let callback = move |request: &Request, response: Response| {
                    let get = |name: &str| {
                        request
                            .headers()
                            .get(name)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string()
                    };
                    seen.lock()
                        .unwrap()
                        .push((get("Authorization"), get("User-Id"), get("Client-Name")));

                    match handshake {
                        Handshake::Accept => Ok(response),
                        Handshake::Reject => {
                            let mut error = ErrorResponse::new(Some("bad password".to_string()));
                            *error.status_mut() = StatusCode::UNAUTHORIZED;
                            Err(error)
                        }
                    }
                };
                if let Ok(socket) = accept_hdr_async(stream, callback).await {
                    let _ = tx.send(socket);
                }
            }
        });

        Self {
            addr,
            attempts,
            headers,
            sockets,
        }
    }

    fn config(&self, identifier: &str) -> NodeConfig {
        NodeConfig::new(self.addr.ip().to_string(), self.addr.port(), PASSWORD)
            .identifier(identifier)
            .user_id(1234)
            .backoff(10, 1)
    }

    async fn next_socket(&mut self) -> WebSocketStream<TcpStream> {
        timeout(WAIT, self.sockets.recv())
            .await
            .expect("no connection within timeout")
            .unwrap()
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

async fn next_event(events: &mut EventReceiver) -> Event {
    timeout(WAIT, events.recv()).await.unwrap().unwrap()
}

async fn wait_for_state(node: &Node, state: SocketState) {
    timeout(WAIT, async {
        while node.socket_state() != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

async fn next_text(socket: &mut WebSocketStream<TcpStream>) -> serde_json::Value {
    loop {
        let message = timeout(WAIT, socket.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn handshake_carries_identity_headers() {
    let mut server = Server::start(Handshake::Accept).await;
    let (pool, mut events) = NodePool::new();
    let node = pool.create_node(server.config("main")).await.unwrap();

    let _socket = server.next_socket().await;
    node.wait_until_connected(WAIT).await.unwrap();

    let headers = server.headers.lock().unwrap().clone();
    assert_eq!(
        headers,
        vec![(PASSWORD.to_string(), "1234".to_string(), "lavapool".to_string())]
    );

    match next_event(&mut events).await {
        Event::WebsocketOpen { node } => assert_eq!(node, "main"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn reconnects_after_server_close() {
    let mut server = Server::start(Handshake::Accept).await;
    let (pool, mut events) = NodePool::new();
    let node = pool.create_node(server.config("flaky")).await.unwrap();

    let mut first = server.next_socket().await;
    assert_eq!(next_event(&mut events).await.name(), "websocket_open");
    first.close(None).await.unwrap();

    let _second = server.next_socket().await;
    node.wait_until_connected(WAIT).await.unwrap();
    assert_eq!(next_event(&mut events).await.name(), "websocket_open");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.attempts(), 2);
    assert_eq!(node.reconnect_attempts(), 1);
    assert_eq!(node.socket_state(), SocketState::Open);
}

#[tokio::test]
async fn rejected_password_is_terminal() {
    let server = Server::start(Handshake::Reject).await;
    let (pool, _events) = NodePool::new();
    let node = pool.create_node(server.config("locked")).await.unwrap();

    let err = node.wait_until_connected(WAIT).await.unwrap_err();
    assert!(matches!(err, LavaError::Unauthorized(ref id) if id == "locked"));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.attempts(), 1);
    assert_eq!(node.socket_state(), SocketState::Disconnected);
    assert_eq!(node.reconnect_attempts(), 0);
}

#[tokio::test]
async fn internal_error_close_stops_the_listener() {
    let mut server = Server::start(Handshake::Accept).await;
    let (pool, _events) = NodePool::new();
    let node = pool.create_node(server.config("fatal")).await.unwrap();

    let mut socket = server.next_socket().await;
    node.wait_until_connected(WAIT).await.unwrap();
    socket
        .close(Some(CloseFrame {
            code: CloseCode::Error,
            reason: Cow::Borrowed("internal error"),
        }))
        .await
        .unwrap();

    wait_for_state(&node, SocketState::Disconnected).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.attempts(), 1);
}

#[tokio::test]
async fn stats_frames_update_the_node() {
    let mut server = Server::start(Handshake::Accept).await;
    let (pool, _events) = NodePool::new();
    let node = pool.create_node(server.config("stats")).await.unwrap();

    let mut socket = server.next_socket().await;
    let stats = serde_json::json!({
        "op": "stats",
        "uptime": 60000,
        "players": 4,
        "playingPlayers": 3,
        "memory": { "free": 10, "used": 20, "allocated": 30, "reservable": 40 },
        "cpu": { "cores": 4, "systemLoad": 0.0, "lavalinkLoad": 0.1 }
    });
    socket.send(Message::Text(stats.to_string())).await.unwrap();

    timeout(WAIT, async {
        while node.stats().is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(node.stats().unwrap().players, 4);
    assert_eq!(node.penalty(), 3.0);
}

#[tokio::test]
async fn session_commands_reach_the_server() {
    let mut server = Server::start(Handshake::Accept).await;
    let (pool, _events) = NodePool::new();
    let node = pool.create_node(server.config("commands")).await.unwrap();

    let mut socket = server.next_socket().await;
    node.wait_until_connected(WAIT).await.unwrap();

    let player = pool.min_players().unwrap().create_player(99);
    player.set_volume(80).await.unwrap();
    let volume = next_text(&mut socket).await;
    assert_eq!(volume["op"], "volume");
    assert_eq!(volume["guildId"], "99");
    assert_eq!(volume["volume"], 80);

    player.destroy().await.unwrap();
    let destroy = next_text(&mut socket).await;
    assert_eq!(destroy["op"], "destroy");
    assert_eq!(node.player_count(), 0);
}

#[tokio::test]
async fn removing_node_closes_socket() {
    let mut server = Server::start(Handshake::Accept).await;
    let (pool, _events) = NodePool::new();
    let node = pool.create_node(server.config("leaving")).await.unwrap();

    let mut socket = server.next_socket().await;
    node.wait_until_connected(WAIT).await.unwrap();
    let player = node.create_player(5);

    pool.remove_node("leaving").await.unwrap();
    assert!(pool.is_empty());
    assert_eq!(node.socket_state(), SocketState::Disconnected);
    assert!(!player.is_connected());

    let closed = timeout(WAIT, async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());

    let err = player.set_volume(10).await.unwrap_err();
    assert!(matches!(err, LavaError::ConnectionClosed));
}

#[tokio::test]
async fn dropping_the_pool_closes_socket_for_good() {
    let mut server = Server::start(Handshake::Accept).await;
    let mut socket = {
        let (pool, _events) = NodePool::new();
        let node = pool.create_node(server.config("dropped")).await.unwrap();
        let socket = server.next_socket().await;
        node.wait_until_connected(WAIT).await.unwrap();
        let _player = node.create_player(1);
        socket
    };

    let closed = timeout(WAIT, async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.attempts(), 1);
}
