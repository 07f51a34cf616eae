use reqwest::header::AUTHORIZATION;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use crate::config::NodeConfig;
use crate::error::{LavaError, Result};
use crate::event::{Event, EventSink};
use crate::player::Player;
use crate::protocol::{Command, DecodeTrackResponse, LoadTracksResponse, LoadType};
use crate::spotify::SpotifyClient;
use crate::stats::Stats;
use crate::track::{LoadResult, MultiTrack, Track};
use crate::websocket::{SocketLink, SocketState, Websocket};

/// Optional capability a node may be configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Spotify,
}

/// One playback server: its REST client, event socket and sessions.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    identifier: String,
    config: NodeConfig,
    http: reqwest::Client,
    players: Mutex<Vec<Arc<Player>>>,
    stats: Mutex<Option<Stats>>,
    link: Arc<SocketLink>,
    websocket: tokio::sync::Mutex<Option<Websocket>>,
    spotify: Option<SpotifyClient>,
    sink: Arc<dyn EventSink>,
}

/// Non-owning handle held by background tasks
#[derive(Clone)]
pub(crate) struct WeakNode {
    inner: Weak<NodeInner>,
}

impl WeakNode {
    pub(crate) fn upgrade(&self) -> Option<Node> {
        self.inner.upgrade().map(|inner| Node { inner })
    }
}

impl Node {
    pub(crate) fn new(config: NodeConfig, identifier: String, sink: Arc<dyn EventSink>) -> Self {
        let http = reqwest::Client::new();
        let spotify = config
            .spotify
            .clone()
            .map(|credentials| SpotifyClient::new(credentials, http.clone()));

        Self {
            inner: Arc::new(NodeInner {
                identifier,
                config,
                http,
                players: Mutex::new(Vec::new()),
                stats: Mutex::new(None),
                link: Arc::new(SocketLink::new()),
                websocket: tokio::sync::Mutex::new(None),
                spotify,
                sink,
            }),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn region(&self) -> Option<&str> {
        self.inner.config.region.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    pub fn port(&self) -> u16 {
        self.inner.config.port
    }

    pub fn rest_uri(&self) -> String {
        self.inner.config.rest_uri()
    }

    pub fn ws_uri(&self) -> String {
        self.inner.config.ws_uri()
    }

    pub fn spotify(&self) -> Option<&SpotifyClient> {
        self.inner.spotify.as_ref()
    }

    pub fn supports(&self, extension: Extension) -> bool {
        match extension {
            Extension::Spotify => self.inner.spotify.is_some(),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakNode {
        WeakNode {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn link(&self) -> Arc<SocketLink> {
        Arc::clone(&self.inner.link)
    }

    pub(crate) fn sink(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.inner.sink)
    }

    pub(crate) fn dispatch(&self, event: Event) {
        debug!(node = %self.identifier(), event = event.name(), "Dispatching event");
        self.inner.sink.dispatch(event);
    }

    // ========== Socket ==========

    /// Open the event socket. The first attempt and every reconnect run in
    /// the background; use [`Node::wait_until_connected`] to block on it.
    pub async fn connect(&self) -> Result<()> {
        let mut websocket = self.inner.websocket.lock().await;
        if websocket.is_some() {
            return Err(LavaError::WebsocketAlreadyExists(self.identifier().to_string()));
        }
        info!(node = %self.identifier(), uri = %self.ws_uri(), "Starting event socket");
        *websocket = Some(Websocket::start(self));
        Ok(())
    }

    pub fn socket_state(&self) -> SocketState {
        self.inner.link.state()
    }

    pub fn is_connected(&self) -> bool {
        self.socket_state() == SocketState::Open
    }

    /// Reconnect attempts made since the socket was started
    pub fn reconnect_attempts(&self) -> u64 {
        self.inner.link.reconnects()
    }

    /// Wait for the socket to reach `Open`
    ///
    /// Fails with `Unauthorized` if the handshake was rejected and with
    /// `Timeout` if the socket did not open in time.
    pub async fn wait_until_connected(&self, wait: Duration) -> Result<()> {
        tokio::time::timeout(wait, self.opened())
            .await
            .unwrap_or(Err(LavaError::Timeout))
    }

    async fn opened(&self) -> Result<()> {
        let mut rx = self.inner.link.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                SocketState::Open => return Ok(()),
                SocketState::Disconnected if self.inner.link.is_unauthorized() => {
                    return Err(LavaError::Unauthorized(self.identifier().to_string()));
                }
                SocketState::Disconnected => return Err(LavaError::ConnectionClosed),
                SocketState::Connecting | SocketState::Reconnecting => {}
            }
            rx.changed().await.map_err(|_| LavaError::ConnectionClosed)?;
        }
    }

    /// Send a typed command on the event socket
    pub fn send(&self, command: &Command) -> Result<()> {
        self.send_json(&serde_json::to_value(command)?)
    }

    /// Forward an opaque JSON payload on the event socket
    pub fn send_json(&self, payload: &serde_json::Value) -> Result<()> {
        let text = serde_json::to_string(payload)?;
        debug!(node = %self.identifier(), payload = %text, "TX");
        self.inner.link.send(Message::Text(text))
    }

    /// Force-disconnect every session and close the socket
    pub async fn disconnect(&self) {
        let players = std::mem::take(&mut *self.inner.players.lock().unwrap());
        for player in &players {
            player.mark_disconnected();
        }

        if let Some(websocket) = self.inner.websocket.lock().await.take() {
            websocket.disconnect(&self.inner.link).await;
        }
        info!(node = %self.identifier(), sessions = players.len(), "Node disconnected");
    }

    // ========== Sessions ==========

    /// Get the session for a guild, creating and attaching one if needed
    pub fn create_player(&self, guild_id: u64) -> Arc<Player> {
        let mut players = self.inner.players.lock().unwrap();
        if let Some(player) = players.iter().find(|p| p.guild_id() == guild_id) {
            return Arc::clone(player);
        }
        let player = Arc::new(Player::new(self.downgrade(), guild_id));
        players.push(Arc::clone(&player));
        debug!(node = %self.identifier(), guild_id, "Session attached");
        player
    }

    pub fn player(&self, guild_id: u64) -> Option<Arc<Player>> {
        self.inner
            .players
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.guild_id() == guild_id)
            .cloned()
    }

    /// Sessions in attach order
    pub fn players(&self) -> Vec<Arc<Player>> {
        self.inner.players.lock().unwrap().clone()
    }

    pub fn player_count(&self) -> usize {
        self.inner.players.lock().unwrap().len()
    }

    pub(crate) fn detach_player(&self, guild_id: u64) -> Option<Arc<Player>> {
        let mut players = self.inner.players.lock().unwrap();
        let index = players.iter().position(|p| p.guild_id() == guild_id)?;
        Some(players.remove(index))
    }

    // ========== Stats ==========

    /// Latest stats snapshot
    pub fn stats(&self) -> Option<Stats> {
        self.inner.stats.lock().unwrap().clone()
    }

    pub(crate) fn set_stats(&self, stats: Stats) {
        *self.inner.stats.lock().unwrap() = Some(stats);
    }

    /// Load score, lower is better. Zero until the first stats frame.
    pub fn penalty(&self) -> f64 {
        self.inner
            .stats
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0.0, |stats| stats.penalty().total)
    }

    // ========== REST ==========

    async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.rest_uri(), endpoint);
        debug!(node = %self.identifier(), url = %url, ?query, "GET");
        let response = self
            .inner
            .http
            .get(url)
            .header(AUTHORIZATION, &self.inner.config.password)
            .query(query)
            .send()
            .await?;
        Ok(response)
    }

    /// Resolve an identifier, URL or prefixed search query.
    ///
    /// `Ok(None)` means the server found nothing.
    pub async fn load_tracks(&self, query: &str) -> Result<Option<LoadResult>> {
        let response = self.get("loadtracks", &[("identifier", query)]).await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(LavaError::InvalidResponse(format!(
                "loadtracks returned {status}"
            )));
        }

        let body: LoadTracksResponse = response.json().await?;
        let tracks = || body.tracks.iter().cloned().map(Track::from).collect::<Vec<_>>();
        let result = match body.load_type {
            LoadType::LoadFailed => {
                let message = body
                    .exception
                    .as_ref()
                    .and_then(|e| e.message.clone())
                    .unwrap_or_else(|| "unknown error".to_string());
                return Err(LavaError::LoadTrack(message));
            }
            LoadType::NoMatches => None,
            LoadType::TrackLoaded => tracks().into_iter().next().map(LoadResult::Track),
            LoadType::SearchResult => {
                let tracks = tracks();
                (!tracks.is_empty()).then_some(LoadResult::Search(tracks))
            }
            LoadType::PlaylistLoaded => {
                let info = body.playlist_info.clone();
                let name = info.as_ref().map(|i| i.name.clone()).unwrap_or_default();
                let selected = info.and_then(|i| i.selected_track);
                Some(LoadResult::Playlist(
                    MultiTrack::new(name, tracks()).with_selected(selected),
                ))
            }
        };
        Ok(result)
    }

    /// Rebuild a track from its opaque handle
    pub async fn decode_track(&self, id: &str) -> Result<Track> {
        let response = self.get("decodetrack", &[("track", id)]).await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(LavaError::BuildTrack(format!("{status}: {body}")));
        }

        let decoded: DecodeTrackResponse = response.json().await?;
        Ok(Track::new(id, decoded.into_info()))
    }

    // ========== Extensions ==========

    /// Run one-off setup for configured extensions
    pub(crate) async fn initialise_extensions(&self) -> Result<()> {
        if let Some(spotify) = &self.inner.spotify {
            spotify.refresh_token().await?;
            info!(node = %self.identifier(), "Spotify extension ready");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("identifier", &self.inner.identifier)
            .field("uri", &self.ws_uri())
            .field("state", &self.socket_state())
            .finish()
    }
}
