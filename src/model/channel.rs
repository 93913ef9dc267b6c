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

//! Virtual channel state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{model::MediaEntry, rules::Rule};

/// The build strategy of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ChannelKind {
    Playlist,
    TvGenre,
    MovieGenre,
    MusicGenre,
}

impl ChannelKind {
    #[cfg(test)]
    pub(crate) const ALL: [ChannelKind; 4] = [
        ChannelKind::Playlist,
        ChannelKind::TvGenre,
        ChannelKind::MovieGenre,
        ChannelKind::MusicGenre,
    ];

    pub(crate) const fn bit(self) -> u8 {
        match self {
            ChannelKind::Playlist => 1,
            ChannelKind::TvGenre => 1 << 1,
            ChannelKind::MovieGenre => 1 << 2,
            ChannelKind::MusicGenre => 1 << 3,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::Playlist => "Playlist",
            ChannelKind::TvGenre => "TV",
            ChannelKind::MovieGenre => "Movies",
            ChannelKind::MusicGenre => "Music",
        };
        f.write_str(name)
    }
}

/// A single channel mode, as written in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ModeFlag {
    Resume,
    Realtime,
    Random,
    AlwaysPause,
    OrderAirDate,
}

impl ModeFlag {
    pub(crate) fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "resume" => Some(ModeFlag::Resume),
            "realtime" => Some(ModeFlag::Realtime),
            "random" => Some(ModeFlag::Random),
            "always_pause" | "alwayspause" | "pause" => Some(ModeFlag::AlwaysPause),
            "order_air_date" | "orderairdate" => Some(ModeFlag::OrderAirDate),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            ModeFlag::Resume => "resume",
            ModeFlag::Realtime => "realtime",
            ModeFlag::Random => "random",
            ModeFlag::AlwaysPause => "always_pause",
            ModeFlag::OrderAirDate => "order_air_date",
        }
    }
}

/// Bitset of [`ModeFlag`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ChannelMode(u8);

impl ChannelMode {
    pub(crate) const RESUME: ChannelMode = ChannelMode(1);
    pub(crate) const REALTIME: ChannelMode = ChannelMode(1 << 1);
    pub(crate) const RANDOM: ChannelMode = ChannelMode(1 << 2);
    pub(crate) const ALWAYS_PAUSE: ChannelMode = ChannelMode(1 << 3);
    pub(crate) const ORDER_AIR_DATE: ChannelMode = ChannelMode(1 << 4);

    pub(crate) fn from_flags(flags: &[ModeFlag]) -> Self {
        flags
            .iter()
            .fold(ChannelMode::default(), |mode, flag| {
                mode.with(ChannelMode::from(*flag))
            })
    }

    pub(crate) fn contains(self, other: ChannelMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn with(self, other: ChannelMode) -> Self {
        ChannelMode(self.0 | other.0)
    }

    pub(crate) fn without(self, other: ChannelMode) -> Self {
        ChannelMode(self.0 & !other.0)
    }
}

impl From<ModeFlag> for ChannelMode {
    fn from(flag: ModeFlag) -> Self {
        match flag {
            ModeFlag::Resume => ChannelMode::RESUME,
            ModeFlag::Realtime => ChannelMode::REALTIME,
            ModeFlag::Random => ChannelMode::RANDOM,
            ModeFlag::AlwaysPause => ChannelMode::ALWAYS_PAUSE,
            ModeFlag::OrderAirDate => ChannelMode::ORDER_AIR_DATE,
        }
    }
}

/// A virtual broadcast channel: an ordered, looping list of entries plus the
/// playback state needed to work out what is on air.
#[derive(Debug, Clone)]
pub(crate) struct Channel {
    pub(crate) id: u32,
    pub(crate) name: String,
    pub(crate) kind: ChannelKind,
    pub(crate) entries: Vec<MediaEntry>,
    pub(crate) position: usize,
    pub(crate) show_time_offset: i64,
    pub(crate) total_time_played: i64,
    pub(crate) last_access_time: i64,
    pub(crate) last_reset_time: i64,
    pub(crate) mode: ChannelMode,
    pub(crate) is_paused: bool,
    pub(crate) is_valid: bool,
    pub(crate) rules: Vec<Rule>,
}

impl Channel {
    /// Creates an empty, not yet built, channel slot.
    pub(crate) fn new(id: u32, name: &str, kind: ChannelKind) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            entries: Vec::new(),
            position: 0,
            show_time_offset: 0,
            total_time_played: 0,
            last_access_time: 0,
            last_reset_time: 0,
            mode: ChannelMode::default(),
            is_paused: false,
            is_valid: false,
            rules: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn current(&self) -> Option<&MediaEntry> {
        self.entries.get(self.position)
    }

    /// Wall-clock start of the current item.
    pub(crate) fn current_start(&self) -> i64 {
        self.last_access_time - self.show_time_offset
    }

    /// Replaces the list with a freshly built one and restarts playback state.
    pub(crate) fn install(&mut self, entries: Vec<MediaEntry>, now: i64) {
        self.is_valid = !entries.is_empty();
        self.entries = entries;
        self.position = 0;
        self.show_time_offset = 0;
        self.total_time_played = 0;
        self.last_access_time = now;
        self.last_reset_time = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_bits_combine() {
        let mode = ChannelMode::from_flags(&[ModeFlag::Resume, ModeFlag::AlwaysPause]);
        assert!(mode.contains(ChannelMode::RESUME));
        assert!(mode.contains(ChannelMode::ALWAYS_PAUSE));
        assert!(!mode.contains(ChannelMode::RANDOM));

        let mode = mode.without(ChannelMode::RESUME);
        assert!(!mode.contains(ChannelMode::RESUME));
        assert!(mode.contains(ChannelMode::ALWAYS_PAUSE));
    }

    #[test]
    fn mode_names_parse() {
        assert_eq!(ModeFlag::parse("Always_Pause"), Some(ModeFlag::AlwaysPause));
        assert_eq!(ModeFlag::parse(" random "), Some(ModeFlag::Random));
        assert_eq!(ModeFlag::parse("shuffle"), None);
        assert_eq!(ModeFlag::parse(ModeFlag::OrderAirDate.name()), Some(ModeFlag::OrderAirDate));
    }

    #[test]
    fn install_resets_state() {
        let mut channel = Channel::new(1, "One", ChannelKind::TvGenre);
        channel.position = 3;
        channel.total_time_played = 500;
        channel.install(vec![MediaEntry::new(60, "A", "/a")], 1_000);

        assert!(channel.is_valid);
        assert_eq!(channel.position, 0);
        assert_eq!(channel.total_time_played, 0);
        assert_eq!(channel.current_start(), 1_000);

        channel.install(vec![], 2_000);
        assert!(!channel.is_valid);
    }
}
