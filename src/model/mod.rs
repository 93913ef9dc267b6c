// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Domain models and core data structures.
//!
//! This module defines the central entities of the application, media entries
//! and channels, together with the raw library records that entries are built
//! from.

pub(crate) mod channel;

pub(crate) use channel::{Channel, ChannelKind, ChannelMode, ModeFlag};

use serde::{Deserialize, Serialize};

/// Value used for season and episode numbers that are not known.
pub(crate) const UNKNOWN: i32 = -1;

/// A single playable item in a channel list.
///
/// Entries are value objects, they are regenerated wholesale whenever a
/// channel is rebuilt and never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MediaEntry {
    /// Duration in seconds. Non-positive values mark an unknown duration.
    pub(crate) duration: i64,
    pub(crate) title: String,
    pub(crate) subtitle: String,
    pub(crate) description: String,
    pub(crate) source_path: String,
    pub(crate) season: i32,
    pub(crate) episode: i32,
}

impl MediaEntry {
    pub(crate) fn new(duration: i64, title: &str, source_path: &str) -> Self {
        Self {
            duration,
            title: title.to_string(),
            subtitle: String::new(),
            description: String::new(),
            source_path: source_path.to_string(),
            season: UNKNOWN,
            episode: UNKNOWN,
        }
    }

    pub(crate) fn with_subtitle(mut self, subtitle: &str) -> Self {
        self.subtitle = subtitle.to_string();
        self
    }

    #[cfg(test)]
    pub(crate) fn with_episode(mut self, season: i32, episode: i32) -> Self {
        self.season = season;
        self.episode = episode;
        self
    }

    /// Duration used for schedule arithmetic, unknown durations count as zero.
    pub(crate) fn play_duration(&self) -> i64 {
        self.duration.max(0)
    }
}

/// What sort of media a library record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum MediaKind {
    Episode,
    Movie,
    Song,
    #[default]
    Unknown,
}

/// A raw record returned by the media library.
///
/// Every field other than the path is optional in practice, the defaults
/// stand for "missing".
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct LibraryItem {
    pub(crate) path: String,
    pub(crate) duration: i64,
    pub(crate) title: String,
    pub(crate) show_title: String,
    pub(crate) season: i32,
    pub(crate) episode: i32,
    pub(crate) play_count: i64,
    pub(crate) plot: String,
    pub(crate) album: String,
    pub(crate) artist: String,
    pub(crate) track: i32,
    pub(crate) genre: String,
    pub(crate) kind: MediaKind,
}

impl LibraryItem {
    pub(crate) fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            season: UNKNOWN,
            episode: UNKNOWN,
            track: UNKNOWN,
            ..Self::default()
        }
    }

    pub(crate) fn is_watched(&self) -> bool {
        self.play_count > 0
    }

    /// Classifies the record, trusting the library hint when there is one and
    /// otherwise falling back to which fields are populated.
    pub(crate) fn classify(&self) -> MediaKind {
        match self.kind {
            MediaKind::Unknown => {
                if !self.show_title.is_empty() {
                    MediaKind::Episode
                } else if !self.artist.is_empty() || !self.album.is_empty() {
                    MediaKind::Song
                } else {
                    MediaKind::Movie
                }
            }
            kind => kind,
        }
    }

    /// The name used when a title is missing.
    pub(crate) fn fallback_title(&self) -> String {
        std::path::Path::new(&self.path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_falls_back_to_populated_fields() {
        let mut item = LibraryItem::new("/tv/show/ep.mkv");
        item.show_title = "Show".into();
        assert_eq!(item.classify(), MediaKind::Episode);

        let mut song = LibraryItem::new("/music/a.mp3");
        song.artist = "Artist".into();
        assert_eq!(song.classify(), MediaKind::Song);

        assert_eq!(LibraryItem::new("/movies/m.mkv").classify(), MediaKind::Movie);
    }

    #[test]
    fn classify_trusts_hint() {
        let mut item = LibraryItem::new("/music/a.mp3");
        item.artist = "Artist".into();
        item.kind = MediaKind::Movie;
        assert_eq!(item.classify(), MediaKind::Movie);
    }

    #[test]
    fn fallback_title_uses_file_stem() {
        assert_eq!(
            LibraryItem::new("/movies/The Film (1999).mkv").fallback_title(),
            "The Film (1999)"
        );
    }
}
