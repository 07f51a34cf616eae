//! Track lookup capabilities.
//!
//! Sources are unit types. Each implements only the capabilities its backend
//! supports: a local file path can be loaded by identifier but never searched.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::node::Node;
use crate::track::{LoadResult, PartialResource, Resolved, ResolverKind, Track};

/// Options for [`Searchable::search`]
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Return only the first server-ordered match
    pub return_first: bool,
    /// Skip the lookup and hand back a [`PartialResource`]
    pub partial: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            return_first: true,
            partial: false,
        }
    }
}

/// Outcome of a free-text search
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    Track(Track),
    Tracks(Vec<Track>),
    Partial(PartialResource),
}

/// Search-by-query capability
#[async_trait]
pub trait Searchable: Send + Sync {
    fn resolver(&self) -> ResolverKind;

    /// Search for `query`. `Ok(None)` means no matches, which is not a fault.
    async fn search(
        &self,
        node: &Node,
        query: &str,
        options: SearchOptions,
    ) -> Result<Option<SearchResult>> {
        let kind = self.resolver();
        if options.partial {
            return Ok(Some(SearchResult::Partial(PartialResource::new(kind, query))));
        }

        let prefix = kind.search_prefix().unwrap_or_default();
        info!(node = %node.identifier(), ?kind, query, "Searching");

        let tracks = match node.load_tracks(&format!("{prefix}{query}")).await? {
            None => return Ok(None),
            Some(LoadResult::Track(track)) => vec![track],
            Some(LoadResult::Search(tracks)) => tracks,
            Some(LoadResult::Playlist(playlist)) => playlist.into_iter().collect(),
        };

        if options.return_first || tracks.len() == 1 {
            Ok(tracks.into_iter().next().map(SearchResult::Track))
        } else if tracks.is_empty() {
            Ok(None)
        } else {
            Ok(Some(SearchResult::Tracks(tracks)))
        }
    }
}

/// Get-by-identifier capability
#[async_trait]
pub trait Identifiable: Send + Sync {
    /// Look up an external identifier or URL with a single REST call
    async fn get(&self, node: &Node, identifier: &str) -> Result<Option<Resolved>> {
        info!(node = %node.identifier(), identifier, "Loading by identifier");

        let resolved = match node.load_tracks(identifier).await? {
            None => None,
            Some(LoadResult::Track(track)) => Some(Resolved::Track(track)),
            Some(LoadResult::Search(tracks)) => tracks.into_iter().next().map(Resolved::Track),
            Some(LoadResult::Playlist(playlist)) => Some(Resolved::MultiTrack(playlist)),
        };
        Ok(resolved)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Youtube;

#[derive(Debug, Clone, Copy, Default)]
pub struct YoutubeMusic;

#[derive(Debug, Clone, Copy, Default)]
pub struct SoundCloud;

/// Files on the node's own filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct Local;

/// Direct HTTP streams
#[derive(Debug, Clone, Copy, Default)]
pub struct Http;

impl Searchable for Youtube {
    fn resolver(&self) -> ResolverKind {
        ResolverKind::Youtube
    }
}

impl Searchable for YoutubeMusic {
    fn resolver(&self) -> ResolverKind {
        ResolverKind::YoutubeMusic
    }
}

impl Searchable for SoundCloud {
    fn resolver(&self) -> ResolverKind {
        ResolverKind::SoundCloud
    }
}

impl Identifiable for Youtube {}
impl Identifiable for YoutubeMusic {}
impl Identifiable for SoundCloud {}
impl Identifiable for Local {}
impl Identifiable for Http {}
