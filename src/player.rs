use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::error::{LavaError, Result};
use crate::node::{Node, WeakNode};
use crate::protocol::{Command, EqualizerBand, PlayerUpdateState, TrackEndReason};
use crate::queue::Queue;
use crate::track::{Playable, Track};

/// Highest volume the server accepts
pub const MAX_VOLUME: u16 = 1000;

/// Default playback volume
pub const DEFAULT_VOLUME: u16 = 100;

/// Options for [`Player::play`]
#[derive(Debug, Clone, Copy)]
pub struct PlayOptions {
    pub start_time: Duration,
    pub end_time: Option<Duration>,
    pub volume: u16,
    /// Replace whatever is playing; when false, a busy session ignores the call
    pub replace: bool,
    pub start_paused: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            start_time: Duration::ZERO,
            end_time: None,
            volume: DEFAULT_VOLUME,
            replace: true,
            start_paused: false,
        }
    }
}

/// A named audio filter and its server payload
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub name: String,
    pub payload: Value,
}

impl Filter {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Voice credentials collected from the host's gateway events
#[derive(Debug, Clone, Default)]
struct VoiceState {
    session_id: Option<String>,
    channel_id: Option<u64>,
    event: Option<Value>,
}

/// Session state snapshot
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub track: Option<Track>,
    pub queue: Queue,
    pub volume: u16,
    pub filters: BTreeMap<String, Value>,
    pub connected: bool,
    pub paused: bool,
    pub repeat: bool,
    /// Server clock of the last position report
    pub last_update: Option<SystemTime>,
    pub last_position: Duration,
    voice: VoiceState,
}

impl PlayerState {
    fn new() -> Self {
        Self {
            track: None,
            queue: Queue::new(),
            volume: DEFAULT_VOLUME,
            filters: BTreeMap::new(),
            connected: true,
            paused: false,
            repeat: false,
            last_update: None,
            last_position: Duration::ZERO,
            voice: VoiceState::default(),
        }
    }

    fn position_at(&self, now: SystemTime) -> Duration {
        let Some(track) = &self.track else {
            return Duration::ZERO;
        };
        if !self.connected {
            return Duration::ZERO;
        }

        let length = track.length();
        match self.last_update {
            Some(last_update) if !self.paused => {
                let elapsed = now.duration_since(last_update).unwrap_or_default();
                (self.last_position + elapsed).min(length)
            }
            _ => self.last_position.min(length),
        }
    }
}

/// Playback session for one guild on one node
///
/// Obtained from [`Node::create_player`]. Commands are forwarded on the node's
/// event socket; local state is updated once the command was queued. The
/// session does not keep its node alive: once the node is dropped every
/// command fails with [`LavaError::ConnectionClosed`].
pub struct Player {
    guild_id: u64,
    node: WeakNode,
    state: Mutex<PlayerState>,
}

impl Player {
    pub(crate) fn new(node: WeakNode, guild_id: u64) -> Self {
        Self {
            guild_id,
            node,
            state: Mutex::new(PlayerState::new()),
        }
    }

    pub fn guild_id(&self) -> u64 {
        self.guild_id
    }

    /// The node hosting this session, if it still exists
    pub fn node(&self) -> Option<Node> {
        self.node.upgrade()
    }

    fn attached_node(&self) -> Result<Node> {
        self.node.upgrade().ok_or(LavaError::ConnectionClosed)
    }

    /// Get a snapshot of the complete session state
    pub fn state_snapshot(&self) -> PlayerState {
        self.state.lock().unwrap().clone()
    }

    pub fn current(&self) -> Option<Track> {
        self.state.lock().unwrap().track.clone()
    }

    pub fn volume(&self) -> u16 {
        self.state.lock().unwrap().volume
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    pub fn is_repeating(&self) -> bool {
        self.state.lock().unwrap().repeat
    }

    /// True while attached with a current track
    pub fn is_playing(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.connected && state.track.is_some()
    }

    pub fn queue(&self) -> Queue {
        self.state.lock().unwrap().queue.clone()
    }

    /// Applied filters in name order
    pub fn filters(&self) -> Vec<Filter> {
        self.state
            .lock()
            .unwrap()
            .filters
            .iter()
            .map(|(name, payload)| Filter::new(name.clone(), payload.clone()))
            .collect()
    }

    pub fn channel_id(&self) -> Option<u64> {
        self.state.lock().unwrap().voice.channel_id
    }

    /// Playback position extrapolated from the last server report
    pub fn position(&self) -> Duration {
        self.position_at(SystemTime::now())
    }

    /// Position as it would be at `now`, never past the track's length
    pub fn position_at(&self, now: SystemTime) -> Duration {
        self.state.lock().unwrap().position_at(now)
    }

    pub(crate) fn update_state(&self, update: PlayerUpdateState) {
        let mut state = self.state.lock().unwrap();
        state.last_update = Some(UNIX_EPOCH + Duration::from_millis(update.time));
        state.last_position = Duration::from_millis(update.position);
        if let Some(connected) = update.connected {
            state.connected = connected;
        }
    }

    pub(crate) fn mark_disconnected(&self) {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.voice = VoiceState::default();
    }

    // ========== Voice ==========

    /// Feed the host's voice-server-update payload
    pub async fn on_voice_server_update(&self, event: Value) -> Result<()> {
        self.state.lock().unwrap().voice.event = Some(event);
        self.send_voice_update()
    }

    /// Feed the host's voice-state-update for the bot user. A `None` channel
    /// means the bot left voice and clears the collected credentials.
    pub async fn on_voice_state_update(
        &self,
        session_id: impl Into<String>,
        channel_id: Option<u64>,
    ) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            match channel_id {
                None => {
                    state.voice = VoiceState::default();
                    debug!(guild_id = self.guild_id, "Left voice channel");
                    return Ok(());
                }
                Some(channel_id) => {
                    state.voice.session_id = Some(session_id.into());
                    state.voice.channel_id = Some(channel_id);
                }
            }
        }
        self.send_voice_update()
    }

    fn send_voice_update(&self) -> Result<()> {
        let command = {
            let state = self.state.lock().unwrap();
            match (&state.voice.session_id, &state.voice.event) {
                (Some(session_id), Some(event)) => Command::VoiceUpdate {
                    guild_id: self.guild_id.to_string(),
                    session_id: session_id.clone(),
                    event: event.clone(),
                },
                _ => return Ok(()),
            }
        };
        self.attached_node()?.send(&command)
    }

    // ========== Playback ==========

    /// Play a track, the first track of a multi-track, or a deferred resource
    ///
    /// The remaining tracks of a multi-track are appended to the queue.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use lavapool::{NodeConfig, NodePool, PartialResource, PlayOptions, ResolverKind};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let (pool, _events) = NodePool::new();
    /// let node = pool.create_node(NodeConfig::new("127.0.0.1", 2333, "pw")).await?;
    /// let player = node.create_player(1234);
    /// let song = PartialResource::new(ResolverKind::Youtube, "never gonna give you up");
    /// player.play(song, PlayOptions::default()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn play(&self, playable: impl Into<Playable>, options: PlayOptions) -> Result<()> {
        if self.is_playing() && !options.replace {
            debug!(guild_id = self.guild_id, "Already playing, not replacing");
            return Ok(());
        }

        let mut playable = playable.into();
        let (track, rest) = loop {
            match playable {
                Playable::Track(track) => break (track, Vec::new()),
                Playable::MultiTrack(multi) => {
                    let name = multi.name().to_string();
                    break multi
                        .split_first()
                        .ok_or_else(|| LavaError::LoadTrack(format!("{name} has no tracks")))?;
                }
                Playable::Partial(partial) => {
                    playable = partial
                        .resolve(&self.attached_node()?)
                        .await?
                        .ok_or_else(|| LavaError::LoadTrack(format!("no matches for {}", partial.query())))?
                        .into();
                }
            }
        };

        let volume = options.volume.min(MAX_VOLUME);
        self.attached_node()?.send(&Command::Play {
            guild_id: self.guild_id.to_string(),
            track: track.id().to_string(),
            start_time: options.start_time.as_millis().to_string(),
            end_time: options.end_time.map(|end| end.as_millis().to_string()),
            volume: volume.to_string(),
            no_replace: !options.replace,
            pause: options.start_paused,
        })?;

        info!(guild_id = self.guild_id, title = %track.title(), "Playing");
        let mut state = self.state.lock().unwrap();
        if state.queue.current_index() < 0 {
            state.queue.seed(track.clone());
        }
        state.queue.add_iterable(rest);
        state.track = Some(track);
        state.volume = volume;
        state.paused = options.start_paused;
        state.last_position = options.start_time;
        state.last_update = Some(SystemTime::now());
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        self.attached_node()?.send(&Command::Stop {
            guild_id: self.guild_id.to_string(),
        })?;
        let mut state = self.state.lock().unwrap();
        if let Some(track) = state.track.take() {
            debug!(guild_id = self.guild_id, title = %track.title(), "Stopped");
        }
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.set_paused(true)
    }

    pub async fn resume(&self) -> Result<()> {
        self.set_paused(false)
    }

    fn set_paused(&self, pause: bool) -> Result<()> {
        self.attached_node()?.send(&Command::Pause {
            guild_id: self.guild_id.to_string(),
            pause,
        })?;

        let mut state = self.state.lock().unwrap();
        let now = SystemTime::now();
        state.last_position = state.position_at(now);
        state.last_update = Some(now);
        state.paused = pause;
        Ok(())
    }

    /// Seek within the current track
    pub async fn seek(&self, position: Duration) -> Result<()> {
        {
            let state = self.state.lock().unwrap();
            let track = state.track.as_ref().ok_or(LavaError::NothingPlaying)?;
            if position > track.length() {
                return Err(LavaError::SeekOutOfRange {
                    position,
                    length: track.length(),
                });
            }
        }

        self.attached_node()?.send(&Command::Seek {
            guild_id: self.guild_id.to_string(),
            position: position.as_millis() as u64,
        })?;

        let mut state = self.state.lock().unwrap();
        state.last_position = position;
        state.last_update = Some(SystemTime::now());
        Ok(())
    }

    /// Set the volume, clamped to `0..=1000`
    pub async fn set_volume(&self, volume: u16) -> Result<()> {
        let volume = volume.min(MAX_VOLUME);
        self.attached_node()?.send(&Command::Volume {
            guild_id: self.guild_id.to_string(),
            volume,
        })?;
        self.state.lock().unwrap().volume = volume;
        Ok(())
    }

    // ========== Filters ==========

    fn filters_command(&self, filters: &BTreeMap<String, Value>, volume: u16) -> Command {
        Command::Filters {
            guild_id: self.guild_id.to_string(),
            volume: f32::from(volume) / 100.0,
            filters: filters
                .iter()
                .map(|(name, payload)| (name.clone(), payload.clone()))
                .collect::<Map<String, Value>>(),
        }
    }

    /// Apply a filter and send the full filter set
    pub async fn add_filter(&self, filter: Filter) -> Result<()> {
        let (filters, command) = {
            let state = self.state.lock().unwrap();
            if state.filters.contains_key(&filter.name) {
                return Err(LavaError::FilterAlreadyExists(filter.name));
            }
            let mut filters = state.filters.clone();
            filters.insert(filter.name.clone(), filter.payload);
            let command = self.filters_command(&filters, state.volume);
            (filters, command)
        };

        self.attached_node()?.send(&command)?;
        self.state.lock().unwrap().filters = filters;
        debug!(guild_id = self.guild_id, filter = %filter.name, "Filter applied");
        Ok(())
    }

    /// Remove a filter by name and send the remaining set
    pub async fn remove_filter(&self, name: &str) -> Result<()> {
        let (filters, command) = {
            let state = self.state.lock().unwrap();
            if !state.filters.contains_key(name) {
                return Err(LavaError::FilterNotApplied(name.to_string()));
            }
            let mut filters = state.filters.clone();
            filters.remove(name);
            let command = self.filters_command(&filters, state.volume);
            (filters, command)
        };

        self.attached_node()?.send(&command)?;
        self.state.lock().unwrap().filters = filters;
        Ok(())
    }

    pub async fn clear_filters(&self) -> Result<()> {
        let command = self.filters_command(&BTreeMap::new(), self.volume());
        self.attached_node()?.send(&command)?;
        self.state.lock().unwrap().filters.clear();
        Ok(())
    }

    /// Legacy per-band equalizer
    pub async fn set_equalizer(&self, bands: Vec<EqualizerBand>) -> Result<()> {
        self.attached_node()?.send(&Command::Equalizer {
            guild_id: self.guild_id.to_string(),
            bands,
        })
    }

    // ========== Repeat / Queue ==========

    pub async fn set_repeat(&self, enabled: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match (state.repeat, enabled) {
            (true, true) => Err(LavaError::RepeatAlreadyEnabled),
            (false, false) => Err(LavaError::RepeatAlreadyDisabled),
            _ => {
                state.repeat = enabled;
                Ok(())
            }
        }
    }

    /// Advance the queue cursor without playing
    pub fn next_track(&self) -> Result<Track> {
        let mut state = self.state.lock().unwrap();
        if state.repeat {
            return Err(LavaError::Repeating);
        }
        state.queue.next()
    }

    pub fn previous_track(&self) -> Result<Track> {
        let mut state = self.state.lock().unwrap();
        if state.repeat {
            return Err(LavaError::Repeating);
        }
        state.queue.previous()
    }

    /// Advance the queue and play what is under the cursor
    pub async fn play_next(&self) -> Result<()> {
        let track = self.next_track()?;
        self.play_from_queue(track).await
    }

    pub async fn play_previous(&self) -> Result<()> {
        let track = self.previous_track()?;
        self.play_from_queue(track).await
    }

    async fn play_from_queue(&self, track: Track) -> Result<()> {
        let options = PlayOptions {
            volume: self.volume(),
            ..PlayOptions::default()
        };
        self.play(track, options).await
    }

    pub fn enqueue(&self, track: Track) {
        self.state.lock().unwrap().queue.add(track);
    }

    pub fn enqueue_all(&self, tracks: impl IntoIterator<Item = Track>) {
        self.state.lock().unwrap().queue.add_iterable(tracks);
    }

    pub fn shuffle_queue(&self) {
        self.state.lock().unwrap().queue.shuffle();
    }

    pub fn reset_queue(&self) {
        self.state.lock().unwrap().queue.reset();
    }

    /// React to a track ending on the server
    ///
    /// `handle` is the encoded track the server reported. Only the current
    /// track is affected, so late events for a replaced track are ignored.
    pub(crate) async fn handle_track_end(&self, reason: TrackEndReason, handle: &str) {
        if reason != TrackEndReason::Finished {
            return;
        }

        let (replay, volume) = {
            let mut state = self.state.lock().unwrap();
            if state.track.as_ref().map(Track::id) != Some(handle) {
                return;
            }
            let replay = if state.repeat {
                state.track.clone()
            } else {
                state.track = None;
                None
            };
            (replay, state.volume)
        };

        if let Some(track) = replay {
            let options = PlayOptions {
                volume,
                ..PlayOptions::default()
            };
            if let Err(e) = self.play(track, options).await {
                warn!(guild_id = self.guild_id, error = %e, "Failed to repeat track");
            }
        }
    }

    // ========== Lifecycle ==========

    /// Detach the session from its node
    pub fn disconnect(&self) -> Result<()> {
        let node = self.attached_node()?;
        node.detach_player(self.guild_id)
            .ok_or(LavaError::SessionNotFound(self.guild_id))?;
        self.mark_disconnected();
        info!(guild_id = self.guild_id, node = %node.identifier(), "Session disconnected");
        Ok(())
    }

    /// Disconnect and tell the server to drop its player
    pub async fn destroy(&self) -> Result<()> {
        self.disconnect()?;
        self.attached_node()?.send(&Command::Destroy {
            guild_id: self.guild_id.to_string(),
        })
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("guild_id", &self.guild_id)
            .field("node", &self.node().map(|node| node.identifier().to_string()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::tests::offline_node;
    use crate::track::tests::track;
    use crate::track::MultiTrack;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio_tungstenite::tungstenite::Message;

    fn sent(outbound: &mut UnboundedReceiver<Message>) -> Value {
        match outbound.try_recv().unwrap() {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn position_extrapolates_and_clamps() {
        let (node, _outbound, _events) = offline_node("http://127.0.0.1:1");
        let player = node.create_player(1);
        player.state.lock().unwrap().track = Some(track("a", 60_000));

        player.update_state(PlayerUpdateState {
            time: 1_000_000,
            position: 10_000,
            connected: None,
        });
        let reported = UNIX_EPOCH + Duration::from_millis(1_000_000);

        assert_eq!(
            player.position_at(reported + Duration::from_secs(5)),
            Duration::from_secs(15)
        );
        assert_eq!(
            player.position_at(reported + Duration::from_secs(100)),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn paused_position_does_not_advance() {
        let (node, _outbound, _events) = offline_node("http://127.0.0.1:1");
        let player = node.create_player(1);
        {
            let mut state = player.state.lock().unwrap();
            state.track = Some(track("a", 60_000));
            state.paused = true;
        }
        player.update_state(PlayerUpdateState {
            time: 0,
            position: 20_000,
            connected: None,
        });
        assert_eq!(player.position(), Duration::from_secs(20));
    }

    #[test]
    fn position_without_track_is_zero() {
        let (node, _outbound, _events) = offline_node("http://127.0.0.1:1");
        let player = node.create_player(1);
        assert_eq!(player.position(), Duration::ZERO);
    }

    #[tokio::test]
    async fn play_sends_command_and_seeds_queue() {
        let (node, mut outbound, _events) = offline_node("http://127.0.0.1:1");
        let player = node.create_player(42);
        let album = MultiTrack::new("album", vec![track("a", 1000), track("b", 1000), track("c", 1000)]);

        let options = PlayOptions {
            start_time: Duration::from_secs(2),
            volume: 1500,
            ..PlayOptions::default()
        };
        player.play(album, options).await.unwrap();

        let play = sent(&mut outbound);
        assert_eq!(play["op"], "play");
        assert_eq!(play["guildId"], "42");
        assert_eq!(play["track"], "encoded-a");
        assert_eq!(play["startTime"], "2000");
        assert_eq!(play["volume"], "1000");
        assert_eq!(play["noReplace"], false);
        assert!(play.get("endTime").is_none());

        assert_eq!(player.current().unwrap().identifier(), "a");
        assert_eq!(player.volume(), 1000);
        let queue = player.queue();
        assert_eq!(queue.current_index(), 0);
        assert_eq!(queue.len(), 3);

        player.play_next().await.unwrap();
        assert_eq!(player.current().unwrap().identifier(), "b");
        assert_eq!(sent(&mut outbound)["track"], "encoded-b");
    }

    #[tokio::test]
    async fn busy_session_ignores_non_replacing_play() {
        let (node, mut outbound, _events) = offline_node("http://127.0.0.1:1");
        let player = node.create_player(1);
        player.play(track("a", 1000), PlayOptions::default()).await.unwrap();
        let _ = sent(&mut outbound);

        let options = PlayOptions {
            replace: false,
            ..PlayOptions::default()
        };
        player.play(track("b", 1000), options).await.unwrap();
        assert!(outbound.try_recv().is_err());
        assert_eq!(player.current().unwrap().identifier(), "a");
    }

    #[tokio::test]
    async fn empty_multi_track_fails() {
        let (node, _outbound, _events) = offline_node("http://127.0.0.1:1");
        let player = node.create_player(1);
        let err = player
            .play(MultiTrack::new("nothing", vec![]), PlayOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LavaError::LoadTrack(_)));
    }

    #[tokio::test]
    async fn seek_validates_before_sending() {
        let (node, mut outbound, _events) = offline_node("http://127.0.0.1:1");
        let player = node.create_player(1);

        let err = player.seek(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, LavaError::NothingPlaying));

        player.play(track("a", 60_000), PlayOptions::default()).await.unwrap();
        let _ = sent(&mut outbound);

        let err = player.seek(Duration::from_secs(61)).await.unwrap_err();
        assert!(matches!(err, LavaError::SeekOutOfRange { .. }));
        assert!(outbound.try_recv().is_err());

        player.seek(Duration::from_secs(30)).await.unwrap();
        let seek = sent(&mut outbound);
        assert_eq!(seek["op"], "seek");
        assert_eq!(seek["position"], 30_000);
    }

    #[tokio::test]
    async fn filters_send_whole_set() {
        let (node, mut outbound, _events) = offline_node("http://127.0.0.1:1");
        let player = node.create_player(1);
        player.set_volume(50).await.unwrap();
        let _ = sent(&mut outbound);

        player
            .add_filter(Filter::new("timescale", json!({ "speed": 1.2 })))
            .await
            .unwrap();
        player
            .add_filter(Filter::new("karaoke", json!({ "level": 1.0 })))
            .await
            .unwrap();

        let first = sent(&mut outbound);
        assert_eq!(first["op"], "filters");
        assert_eq!(first["volume"], 0.5);
        assert_eq!(first["timescale"]["speed"], 1.2);

        let second = sent(&mut outbound);
        assert_eq!(second["timescale"]["speed"], 1.2);
        assert_eq!(second["karaoke"]["level"], 1.0);

        let err = player
            .add_filter(Filter::new("karaoke", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, LavaError::FilterAlreadyExists(ref name) if name == "karaoke"));

        player.remove_filter("timescale").await.unwrap();
        let third = sent(&mut outbound);
        assert!(third.get("timescale").is_none());
        assert_eq!(third["karaoke"]["level"], 1.0);

        let err = player.remove_filter("timescale").await.unwrap_err();
        assert!(matches!(err, LavaError::FilterNotApplied(_)));
        assert_eq!(player.filters().len(), 1);

        player.clear_filters().await.unwrap();
        assert!(player.filters().is_empty());
    }

    #[tokio::test]
    async fn repeat_toggles_and_blocks_queue_moves() {
        let (node, _outbound, _events) = offline_node("http://127.0.0.1:1");
        let player = node.create_player(1);

        assert!(matches!(
            player.set_repeat(false).await,
            Err(LavaError::RepeatAlreadyDisabled)
        ));
        player.set_repeat(true).await.unwrap();
        assert!(matches!(
            player.set_repeat(true).await,
            Err(LavaError::RepeatAlreadyEnabled)
        ));

        player.enqueue(track("a", 1000));
        assert!(matches!(player.next_track(), Err(LavaError::Repeating)));
        assert!(matches!(player.previous_track(), Err(LavaError::Repeating)));

        player.set_repeat(false).await.unwrap();
        assert_eq!(player.next_track().unwrap().identifier(), "a");
    }

    #[tokio::test]
    async fn voice_update_waits_for_both_halves() {
        let (node, mut outbound, _events) = offline_node("http://127.0.0.1:1");
        let player = node.create_player(9);

        player
            .on_voice_server_update(json!({ "token": "t", "endpoint": "e" }))
            .await
            .unwrap();
        assert!(outbound.try_recv().is_err());

        player.on_voice_state_update("session", Some(77)).await.unwrap();
        let update = sent(&mut outbound);
        assert_eq!(update["op"], "voiceUpdate");
        assert_eq!(update["sessionId"], "session");
        assert_eq!(update["event"]["token"], "t");
        assert_eq!(player.channel_id(), Some(77));

        player.on_voice_state_update("session", None).await.unwrap();
        assert_eq!(player.channel_id(), None);
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn destroy_twice_fails() {
        let (node, mut outbound, _events) = offline_node("http://127.0.0.1:1");
        let player = node.create_player(3);

        player.destroy().await.unwrap();
        assert_eq!(sent(&mut outbound)["op"], "destroy");
        assert!(node.player(3).is_none());
        assert!(!player.is_connected());

        let err = player.destroy().await.unwrap_err();
        assert!(matches!(err, LavaError::SessionNotFound(3)));
    }
}
