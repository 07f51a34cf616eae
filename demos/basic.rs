//! Connect to a node, play a search result and print events.
//!
//! ```text
//! LAVA_HOST=127.0.0.1 LAVA_PORT=2333 LAVA_PASSWORD=youshallnotpass \
//!     cargo run --example basic -- "never gonna give you up"
//! ```

use lavapool::{
    Event, NodeConfig, NodePool, PlayOptions, SearchOptions, SearchResult, Searchable, Youtube,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const GUILD_ID: u64 = 1;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lavapool=debug,basic=info")))
        .init();

    let host = std::env::var("LAVA_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("LAVA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(2333);
    let password = std::env::var("LAVA_PASSWORD").unwrap_or_else(|_| "youshallnotpass".to_string());
    let query = std::env::args().nth(1).unwrap_or_else(|| "lofi hip hop".to_string());

    let (pool, mut events) = NodePool::new();
    let node = pool
        .create_node(NodeConfig::new(host, port, password).identifier("demo"))
        .await?;
    node.wait_until_connected(Duration::from_secs(10)).await?;
    tracing::info!("Connected to {}", node.ws_uri());

    let player = pool.balanced()?.create_player(GUILD_ID);
    match Youtube.search(&node, &query, SearchOptions::default()).await? {
        Some(SearchResult::Track(track)) => {
            tracing::info!("Playing {} by {}", track.title(), track.author());
            player.play(track, PlayOptions::default()).await?;
        }
        _ => {
            tracing::warn!("No results for {query}");
            return Ok(());
        }
    }

    // Without a voice connection the server will not advance the track, but
    // events and stats still flow.
    loop {
        tokio::select! {
            event = events.recv() => match event? {
                Event::TrackEnd { track, reason, .. } => {
                    tracing::info!("{} ended: {:?}", track.title(), reason);
                    if reason.may_start_next() && player.play_next().await.is_err() {
                        break;
                    }
                }
                other => tracing::info!("{}: {:?}", other.name(), other.guild_id()),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Position at exit: {:?}", player.position());
    pool.remove_node("demo").await?;
    Ok(())
}
