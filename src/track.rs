use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;
use crate::node::Node;
use crate::protocol::{TrackData, TrackInfo};

/// A resolved, playable track.
///
/// `id` is the server's opaque encoded handle; it is what gets sent on the
/// `play` op and what `/decodetrack` turns back into metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    id: String,
    info: TrackInfo,
}

impl Track {
    pub fn new(id: impl Into<String>, info: TrackInfo) -> Self {
        Self {
            id: id.into(),
            info,
        }
    }

    /// Opaque encoded handle
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    pub fn identifier(&self) -> &str {
        &self.info.identifier
    }

    pub fn author(&self) -> &str {
        &self.info.author
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn uri(&self) -> Option<&str> {
        self.info.uri.as_deref()
    }

    /// Source tag reported by the server (`youtube`, `soundcloud`, ...)
    pub fn source(&self) -> Option<&str> {
        self.info.source_name.as_deref()
    }

    pub fn length(&self) -> Duration {
        Duration::from_millis(self.info.length)
    }

    pub fn is_seekable(&self) -> bool {
        self.info.is_seekable
    }

    pub fn is_stream(&self) -> bool {
        self.info.is_stream
    }
}

impl From<TrackData> for Track {
    fn from(data: TrackData) -> Self {
        Self::new(data.track, data.info)
    }
}

/// A named, ordered collection of tracks such as a playlist or album
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTrack {
    name: String,
    selected: Option<usize>,
    tracks: Vec<Track>,
}

impl MultiTrack {
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            name: name.into(),
            selected: None,
            tracks,
        }
    }

    pub(crate) fn with_selected(mut self, selected: Option<i64>) -> Self {
        self.selected = selected
            .and_then(|index| usize::try_from(index).ok())
            .filter(|index| *index < self.tracks.len());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the track the playlist URL pointed at, if any
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Move the tracks out, first one separated from the rest
    pub fn split_first(self) -> Option<(Track, Vec<Track>)> {
        let mut tracks = self.tracks.into_iter();
        let first = tracks.next()?;
        Some((first, tracks.collect()))
    }
}

impl IntoIterator for MultiTrack {
    type Item = Track;
    type IntoIter = std::vec::IntoIter<Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.into_iter()
    }
}

/// How a [`PartialResource`] will be looked up when it is finally needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolverKind {
    Youtube,
    YoutubeMusic,
    SoundCloud,
    /// Raw identifier or URL, loaded as-is
    Identifier,
}

impl ResolverKind {
    /// Search prefix understood by the server
    pub fn search_prefix(&self) -> Option<&'static str> {
        match self {
            ResolverKind::Youtube => Some("ytsearch:"),
            ResolverKind::YoutubeMusic => Some("ytmsearch:"),
            ResolverKind::SoundCloud => Some("scsearch:"),
            ResolverKind::Identifier => None,
        }
    }
}

/// A deferred track reference, resolved through a node at play time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialResource {
    kind: ResolverKind,
    query: String,
}

impl PartialResource {
    pub fn new(kind: ResolverKind, query: impl Into<String>) -> Self {
        Self {
            kind,
            query: query.into(),
        }
    }

    pub fn kind(&self) -> ResolverKind {
        self.kind
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Resolve through `node`. Searches yield their first match; `None`
    /// means the server had nothing for the query.
    pub async fn resolve(&self, node: &Node) -> Result<Option<Resolved>> {
        let identifier = match self.kind.search_prefix() {
            Some(prefix) => format!("{prefix}{}", self.query),
            None => self.query.clone(),
        };

        let resolved = node.load_tracks(&identifier).await?.and_then(|loaded| match loaded {
            LoadResult::Track(track) => Some(Resolved::Track(track)),
            LoadResult::Search(tracks) => tracks.into_iter().next().map(Resolved::Track),
            LoadResult::Playlist(playlist) => Some(Resolved::MultiTrack(playlist)),
        });
        Ok(resolved)
    }
}

/// Successful outcome of a `/loadtracks` call
#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult {
    Track(Track),
    /// Matches in server order
    Search(Vec<Track>),
    Playlist(MultiTrack),
}

/// Exactly one resolved instance
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Track(Track),
    MultiTrack(MultiTrack),
}

/// Anything a session can be asked to play
#[derive(Debug, Clone, PartialEq)]
pub enum Playable {
    Track(Track),
    MultiTrack(MultiTrack),
    Partial(PartialResource),
}

impl From<Track> for Playable {
    fn from(track: Track) -> Self {
        Playable::Track(track)
    }
}

impl From<MultiTrack> for Playable {
    fn from(multi: MultiTrack) -> Self {
        Playable::MultiTrack(multi)
    }
}

impl From<PartialResource> for Playable {
    fn from(partial: PartialResource) -> Self {
        Playable::Partial(partial)
    }
}

impl From<Resolved> for Playable {
    fn from(resolved: Resolved) -> Self {
        match resolved {
            Resolved::Track(track) => Playable::Track(track),
            Resolved::MultiTrack(multi) => Playable::MultiTrack(multi),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn track(identifier: &str, length_ms: u64) -> Track {
        Track::new(
            format!("encoded-{identifier}"),
            TrackInfo {
                identifier: identifier.to_string(),
                is_seekable: true,
                author: format!("{identifier} author"),
                length: length_ms,
                is_stream: false,
                title: format!("{identifier} title"),
                uri: Some(format!("https://example.com/{identifier}")),
                source_name: Some("http".to_string()),
            },
        )
    }

    #[test]
    fn split_first_keeps_server_order() {
        let multi = MultiTrack::new("album", vec![track("a", 1), track("b", 1), track("c", 1)]);
        let (first, rest) = multi.split_first().unwrap();
        assert_eq!(first.identifier(), "a");
        let rest: Vec<_> = rest.iter().map(|t| t.identifier().to_string()).collect();
        assert_eq!(rest, vec!["b", "c"]);
    }

    #[test]
    fn split_first_of_empty_is_none() {
        assert!(MultiTrack::new("empty", vec![]).split_first().is_none());
    }

    #[test]
    fn selected_track_out_of_range_is_dropped() {
        let multi = MultiTrack::new("list", vec![track("a", 1)]).with_selected(Some(3));
        assert_eq!(multi.selected(), None);
        let multi = MultiTrack::new("list", vec![track("a", 1)]).with_selected(Some(-1));
        assert_eq!(multi.selected(), None);
        let multi = MultiTrack::new("list", vec![track("a", 1)]).with_selected(Some(0));
        assert_eq!(multi.selected(), Some(0));
    }

    #[test]
    fn length_is_milliseconds() {
        assert_eq!(track("a", 60_000).length(), Duration::from_secs(60));
    }
}
