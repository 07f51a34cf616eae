use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use crate::backoff::ExponentialBackoff;
use crate::config::NodeConfig;
use crate::error::{LavaError, Result};
use crate::event::{Event, EventSink};
use crate::node::{Node, WeakNode};
use crate::protocol::{Incoming, RawEvent, TrackException};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of a node's event socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Disconnected,
    Connecting,
    Open,
    /// The socket dropped while the node is still registered
    Reconnecting,
}

/// Outbound half and observable state of a node's socket.
///
/// Outlives individual connections: each reconnect attaches a fresh writer.
pub(crate) struct SocketLink {
    tx: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    state: watch::Sender<SocketState>,
    unauthorized: AtomicBool,
    reconnects: AtomicU64,
}

impl SocketLink {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(SocketState::Disconnected);
        Self {
            tx: Mutex::new(None),
            state,
            unauthorized: AtomicBool::new(false),
            reconnects: AtomicU64::new(0),
        }
    }

    /// Queue a frame for the current connection's writer
    pub(crate) fn send(&self, message: Message) -> Result<()> {
        let guard = self.tx.lock().unwrap();
        let tx = guard.as_ref().ok_or(LavaError::ConnectionClosed)?;
        tx.send(message).map_err(|_| LavaError::ConnectionClosed)
    }

    pub(crate) fn attach(&self, tx: mpsc::UnboundedSender<Message>) {
        *self.tx.lock().unwrap() = Some(tx);
    }

    pub(crate) fn detach(&self) -> Option<mpsc::UnboundedSender<Message>> {
        self.tx.lock().unwrap().take()
    }

    pub(crate) fn state(&self) -> SocketState {
        *self.state.borrow()
    }

    pub(crate) fn set_state(&self, state: SocketState) {
        self.state.send_replace(state);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SocketState> {
        self.state.subscribe()
    }

    pub(crate) fn is_unauthorized(&self) -> bool {
        self.unauthorized.load(Ordering::SeqCst)
    }

    pub(crate) fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Forget what a previous listener recorded
    fn reset(&self) {
        self.unauthorized.store(false, Ordering::SeqCst);
        self.reconnects.store(0, Ordering::SeqCst);
    }
}

/// Handle on a node's listener task
pub(crate) struct Websocket {
    listener: JoinHandle<()>,
}

impl Websocket {
    /// Spawn the decode workers and the listener, which performs the first
    /// connection attempt itself
    pub(crate) fn start(node: &Node) -> Self {
        let config = node.config().clone();
        let (frame_tx, frame_rx) = mpsc::channel(config.decode_queue.max(1));
        spawn_decode_workers(node.downgrade(), config.decode_workers.max(1), frame_rx);

        let link = node.link();
        link.reset();
        link.set_state(SocketState::Connecting);

        let listener = Listener {
            identifier: node.identifier().to_string(),
            config,
            link,
            sink: node.sink(),
            frames: frame_tx,
        };
        Self {
            listener: tokio::spawn(listener.run()),
        }
    }

    /// Cancel the listener and close the socket
    pub(crate) async fn disconnect(mut self, link: &SocketLink) {
        self.listener.abort();
        let _ = (&mut self.listener).await;

        if let Some(tx) = link.detach() {
            let _ = tx.send(Message::Close(None));
        }
        link.set_state(SocketState::Disconnected);
    }
}

impl Drop for Websocket {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// What the listener does with one inbound read
#[derive(Debug, PartialEq)]
enum Frame {
    Text(String),
    /// Peer closed or the transport dropped; reconnect
    Closed,
    /// The remote process reported an unrecoverable error
    Fatal(String),
    Ignore,
}

fn classify(read: std::result::Result<Message, WsError>) -> Frame {
    match read {
        Ok(Message::Text(text)) => Frame::Text(text),
        Ok(Message::Close(Some(frame))) if frame.code == CloseCode::Error => {
            Frame::Fatal(frame.reason.into_owned())
        }
        Ok(Message::Close(_)) => Frame::Closed,
        Ok(Message::Binary(data)) => {
            trace!(len = data.len(), "RX: Unexpected binary frame");
            Frame::Ignore
        }
        Ok(_) => Frame::Ignore,
        Err(WsError::ConnectionClosed)
        | Err(WsError::AlreadyClosed)
        | Err(WsError::Io(_))
        | Err(WsError::Protocol(_)) => Frame::Closed,
        Err(e) => Frame::Fatal(e.to_string()),
    }
}

enum ReadOutcome {
    Closed,
    Fatal(String),
}

struct Listener {
    identifier: String,
    config: NodeConfig,
    link: Arc<SocketLink>,
    sink: Arc<dyn EventSink>,
    frames: mpsc::Sender<String>,
}

impl Listener {
    async fn run(self) {
        loop {
            match open(&self.config, &self.identifier).await {
                Ok(stream) => {
                    info!(node = %self.identifier, "Connection established");
                    let (write, read) = stream.split();
                    let (tx, rx) = mpsc::unbounded_channel();
                    let writer = tokio::spawn(write_loop(write, rx, self.config.heartbeat_interval()));

                    self.link.attach(tx);
                    self.link.set_state(SocketState::Open);
                    self.sink.dispatch(Event::WebsocketOpen {
                        node: self.identifier.clone(),
                    });

                    let outcome = self.read_loop(read).await;
                    self.link.detach();
                    writer.abort();

                    match outcome {
                        ReadOutcome::Closed => {
                            warn!(node = %self.identifier, "Connection closed by peer");
                        }
                        ReadOutcome::Fatal(reason) => {
                            error!(
                                node = %self.identifier,
                                reason = %reason,
                                "Server reported a fatal error, not reconnecting"
                            );
                            self.link.set_state(SocketState::Disconnected);
                            return;
                        }
                    }
                }
                Err(LavaError::Unauthorized(_)) => {
                    error!(node = %self.identifier, "Authentication failed, check the node password");
                    self.link.unauthorized.store(true, Ordering::SeqCst);
                    self.link.set_state(SocketState::Disconnected);
                    return;
                }
                Err(e) => {
                    warn!(node = %self.identifier, error = %e, "Failed to connect");
                }
            }

            self.link.set_state(SocketState::Reconnecting);
            self.link.reconnects.fetch_add(1, Ordering::SeqCst);
            let delay = ExponentialBackoff::new(
                self.config.backoff_base(),
                self.config.backoff_max_retries,
            )
            .delay();
            debug!(node = %self.identifier, ?delay, "Reconnecting after backoff");
            tokio::time::sleep(delay).await;
        }
    }

    async fn read_loop(&self, mut read: SplitStream<WsStream>) -> ReadOutcome {
        while let Some(read) = read.next().await {
            match classify(read) {
                Frame::Text(text) => {
                    trace!(node = %self.identifier, text = %text, "RX");
                    if self.frames.send(text).await.is_err() {
                        return ReadOutcome::Fatal("decode workers stopped".to_string());
                    }
                }
                Frame::Closed => return ReadOutcome::Closed,
                Frame::Fatal(reason) => return ReadOutcome::Fatal(reason),
                Frame::Ignore => {}
            }
        }
        ReadOutcome::Closed
    }
}

/// Open the socket with the node's auth headers
async fn open(config: &NodeConfig, identifier: &str) -> Result<WsStream> {
    let mut request = config.ws_uri().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert("Authorization", header_value(&config.password)?);
    headers.insert("User-Id", header_value(&config.user_id.to_string())?);
    headers.insert("Client-Name", header_value(&config.client_name)?);

    debug!(node = identifier, uri = %config.ws_uri(), "Attempting connection");
    match connect_async(request).await {
        Ok((stream, response)) => {
            debug!(node = identifier, status = ?response.status(), "WebSocket connected");
            Ok(stream)
        }
        Err(WsError::Http(response)) if response.status() == StatusCode::UNAUTHORIZED => {
            Err(LavaError::Unauthorized(identifier.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| LavaError::InvalidConfig(format!("invalid header value: {e}")))
}

/// Forward queued frames to the socket and keep it alive with pings
async fn write_loop(
    mut write: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    heartbeat: Duration,
) {
    let mut ticker = tokio::time::interval(heartbeat);
    ticker.tick().await;

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(message) => {
                    let closing = matches!(message, Message::Close(_));
                    if let Err(e) = write.send(message).await {
                        error!("Failed to send message: {}", e);
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                None => {
                    let _ = write.close().await;
                    break;
                }
            },
            _ = ticker.tick() => {
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    warn!("Heartbeat failed: {}", e);
                    break;
                }
            }
        }
    }
}

/// Fixed pool of workers draining the frame queue
fn spawn_decode_workers(node: WeakNode, workers: usize, rx: mpsc::Receiver<String>) {
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    for worker in 0..workers {
        let rx = Arc::clone(&rx);
        let node = node.clone();
        tokio::spawn(async move {
            loop {
                let frame = rx.lock().await.recv().await;
                let Some(frame) = frame else { break };
                let Some(node) = node.upgrade() else { break };
                if let Err(e) = process_frame(&node, &frame).await {
                    warn!(node = %node.identifier(), worker, error = %e, "Failed to process frame");
                }
            }
            trace!(worker, "Decode worker stopped");
        });
    }
}

/// Decode one inbound text frame and apply or dispatch it
pub(crate) async fn process_frame(node: &Node, text: &str) -> Result<()> {
    match serde_json::from_str::<Incoming>(text)? {
        Incoming::PlayerUpdate { guild_id, state } => {
            let guild_id = parse_guild(&guild_id)?;
            match node.player(guild_id) {
                Some(player) => player.update_state(state),
                None => trace!(guild_id, "Dropping update for unknown session"),
            }
        }
        Incoming::Event(raw) => {
            let event = decode_event(node, raw).await?;
            node.dispatch(event);
        }
        Incoming::Stats(stats) => node.set_stats(stats),
        Incoming::Unknown => debug!(node = %node.identifier(), "Ignoring unknown op"),
    }
    Ok(())
}

async fn decode_event(node: &Node, raw: RawEvent) -> Result<Event> {
    let identifier = node.identifier().to_string();
    let event = match raw {
        RawEvent::WebSocketClosedEvent {
            guild_id,
            code,
            reason,
            by_remote,
        } => Event::WebsocketClosed {
            node: identifier,
            guild_id: parse_guild(&guild_id)?,
            code,
            reason,
            by_remote,
        },
        RawEvent::TrackStartEvent { guild_id, track } => Event::TrackStart {
            node: identifier,
            guild_id: parse_guild(&guild_id)?,
            track: node.decode_track(&track).await?,
        },
        RawEvent::TrackEndEvent {
            guild_id,
            track,
            reason,
        } => {
            let guild_id = parse_guild(&guild_id)?;
            if let Some(player) = node.player(guild_id) {
                player.handle_track_end(reason, &track).await;
            }
            Event::TrackEnd {
                node: identifier,
                guild_id,
                track: node.decode_track(&track).await?,
                reason,
            }
        }
        RawEvent::TrackExceptionEvent {
            guild_id,
            track,
            exception,
            error,
        } => Event::TrackException {
            node: identifier,
            guild_id: parse_guild(&guild_id)?,
            track: node.decode_track(&track).await?,
            exception: TrackException::resolve(exception, error),
        },
        RawEvent::TrackStuckEvent {
            guild_id,
            track,
            threshold_ms,
        } => Event::TrackStuck {
            node: identifier,
            guild_id: parse_guild(&guild_id)?,
            track: node.decode_track(&track).await?,
            threshold_ms,
        },
    };
    Ok(event)
}

fn parse_guild(guild_id: &str) -> Result<u64> {
    guild_id
        .parse()
        .map_err(|_| LavaError::InvalidResponse(format!("invalid guildId {guild_id}")))
}
