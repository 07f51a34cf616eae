//! Client runtime for Lavalink-style audio playback servers
//!
//! This library keeps a pool of playback nodes connected and hands out
//! per-guild playback sessions on them. It supports:
//!
//! - Node pooling with least-sessions, load-penalty, region and extension selection
//! - Self-healing event sockets with randomized exponential backoff
//! - Typed track events delivered on a channel or a custom sink
//! - Track search and loading over the node's REST API
//! - Playback sessions with queue, filters, repeat and position tracking
//!
//! # Quick Start
//!
//! ```no_run
//! use lavapool::{NodeConfig, NodePool, PlayOptions, SearchOptions, SearchResult, Searchable, Youtube};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (pool, mut events) = NodePool::new();
//!     let config = NodeConfig::new("127.0.0.1", 2333, "youshallnotpass").user_id(1234);
//!     let node = pool.create_node(config).await?;
//!     node.wait_until_connected(Duration::from_secs(5)).await?;
//!
//!     let player = pool.min_players()?.create_player(5678);
//!     // Feed the gateway's voice events into the session
//!     player.on_voice_state_update("session-id", Some(42)).await?;
//!     player
//!         .on_voice_server_update(serde_json::json!({ "token": "t", "endpoint": "e" }))
//!         .await?;
//!
//!     if let Some(SearchResult::Track(track)) =
//!         Youtube.search(&node, "lofi", SearchOptions::default()).await?
//!     {
//!         player.play(track, PlayOptions::default()).await?;
//!     }
//!
//!     while let Ok(event) = events.recv().await {
//!         println!("{}: {:?}", event.name(), event.guild_id());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Pool**: Node registry and selection strategies
//! - **Node**: REST client, event socket and session registry for one server
//! - **Websocket**: Connection loop, reconnect backoff and frame decoding
//! - **Player**: Per-guild playback control
//! - **Protocol**: JSON message structures

mod backoff;
mod config;
mod error;
mod event;
mod node;
mod player;
mod pool;
mod protocol;
mod queue;
mod search;
mod spotify;
mod stats;
mod track;
mod websocket;

// Public exports
pub use backoff::ExponentialBackoff;
pub use config::{NodeConfig, SpotifyCredentials};
pub use error::{LavaError, Result};
pub use event::{Event, EventReceiver, EventSink};
pub use node::{Extension, Node};
pub use player::{Filter, PlayOptions, Player, PlayerState, DEFAULT_VOLUME, MAX_VOLUME};
pub use pool::NodePool;
pub use protocol::{Command, EqualizerBand, TrackEndReason, TrackException, TrackInfo};
pub use queue::Queue;
pub use search::{
    Http, Identifiable, Local, SearchOptions, SearchResult, Searchable, SoundCloud, Youtube,
    YoutubeMusic,
};
pub use spotify::SpotifyClient;
pub use stats::{CpuStats, FrameStats, MemoryStats, Penalty, Stats};
pub use track::{LoadResult, MultiTrack, PartialResource, Playable, ResolverKind, Resolved, Track};
pub use websocket::SocketState;
