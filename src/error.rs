use std::time::Duration;
use thiserror::Error;

/// Result type for lavapool operations
pub type Result<T> = std::result::Result<T, LavaError>;

/// Errors that can occur when talking to playback nodes
#[derive(Error, Debug)]
pub enum LavaError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The pool has no registered nodes
    #[error("There are currently no nodes connected")]
    NoNodesConnected,

    /// A node with this identifier is already registered
    #[error("A node with the identifier <{0}> already exists")]
    NodeOccupied(String),

    /// The node already owns an event socket
    #[error("Websocket already initialised for node <{0}>")]
    WebsocketAlreadyExists(String),

    /// The server rejected the socket handshake credentials
    #[error("Node <{0}> rejected the connection password")]
    Unauthorized(String),

    /// A configuration value cannot be used as given
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The event socket is not open
    #[error("Connection closed")]
    ConnectionClosed,

    /// Timed out waiting on the node
    #[error("Timeout")]
    Timeout,

    /// No node satisfied a selection query
    #[error("Invalid node search: {0}")]
    InvalidNodeSearch(String),

    /// The server reported LOAD_FAILED
    #[error("Track failed to load: {0}")]
    LoadTrack(String),

    /// The server could not decode an opaque track handle
    #[error("An error occurred while building the track: {0}")]
    BuildTrack(String),

    /// Unexpected response status or shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The filter is already applied to the session
    #[error("Filter {0} is already applied")]
    FilterAlreadyExists(String),

    /// The filter is not applied to the session
    #[error("Filter {0} is not applied")]
    FilterNotApplied(String),

    /// Repeat was enabled on a session that already repeats
    #[error("Repeat is already enabled")]
    RepeatAlreadyEnabled,

    /// Repeat was disabled on a session that does not repeat
    #[error("Repeat is already disabled")]
    RepeatAlreadyDisabled,

    /// Queue advancement was attempted while repeating
    #[error("Cannot advance the queue while repeat is enabled")]
    Repeating,

    /// Seek target lies beyond the end of the current track
    #[error("Seek position {position:?} is past the track length {length:?}")]
    SeekOutOfRange { position: Duration, length: Duration },

    /// The operation needs a current track
    #[error("Nothing is playing")]
    NothingPlaying,

    /// The queue has no track in the requested direction
    #[error("Queue is empty")]
    QueueEmpty,

    /// No playback session is attached for this guild
    #[error("No playback session for guild {0}")]
    SessionNotFound(u64),

    /// Spotify client-credentials exchange failed
    #[error("An error occurred while authenticating with Spotify: {0}")]
    SpotifyAuth(String),
}
