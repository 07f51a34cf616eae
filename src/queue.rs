use rand::seq::SliceRandom;

use crate::error::{LavaError, Result};
use crate::track::{MultiTrack, Track};

/// Cursor-based track list owned by a playback session.
///
/// The cursor starts at `-1` ("nothing yet") and always satisfies
/// `-1 <= cursor <= len - 1`. The queue counts as empty when the cursor sits
/// on the last index, i.e. there is nothing left to advance to.
#[derive(Debug, Clone)]
pub struct Queue {
    tracks: Vec<Track>,
    current: isize,
}

impl Queue {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            current: -1,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Cursor position, `-1` before anything was taken
    pub fn current_index(&self) -> isize {
        self.current
    }

    /// Track under the cursor
    pub fn current(&self) -> Option<&Track> {
        usize::try_from(self.current)
            .ok()
            .and_then(|index| self.tracks.get(index))
    }

    /// True when there is no further track to advance to
    pub fn is_empty(&self) -> bool {
        self.current == self.tracks.len() as isize - 1
    }

    /// Advance the cursor and return the track now under it
    pub fn next(&mut self) -> Result<Track> {
        if self.is_empty() {
            return Err(LavaError::QueueEmpty);
        }
        self.current += 1;
        Ok(self.tracks[self.current as usize].clone())
    }

    /// Step the cursor back and return the track now under it
    pub fn previous(&mut self) -> Result<Track> {
        if self.current <= 0 {
            return Err(LavaError::QueueEmpty);
        }
        self.current -= 1;
        Ok(self.tracks[self.current as usize].clone())
    }

    pub fn add(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Append a multi-track or any track sequence; the cursor is untouched
    pub fn add_iterable<I>(&mut self, tracks: I)
    where
        I: IntoIterator<Item = Track>,
    {
        self.tracks.extend(tracks);
    }

    pub fn add_multi(&mut self, multi: MultiTrack) {
        self.add_iterable(multi);
    }

    /// Shuffle everything except the track under the cursor, which keeps
    /// its index
    pub fn shuffle(&mut self) {
        let mut rng = rand::rng();
        match usize::try_from(self.current) {
            Ok(index) if index < self.tracks.len() => {
                let pinned = self.tracks.remove(index);
                self.tracks.shuffle(&mut rng);
                self.tracks.insert(index, pinned);
            }
            _ => self.tracks.shuffle(&mut rng),
        }
    }

    /// Drop every track and return the cursor to `-1`
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.current = -1;
    }

    /// Put the first track of a session in place under the cursor
    pub(crate) fn seed(&mut self, track: Track) {
        self.tracks.insert(0, track);
        self.current = 0;
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}
