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

//! Channel rebuilds.
//!
//! A [`Rebuilder`] builds a channel's list without holding its lock, then
//! installs the result under one short write. It also serves as the
//! [`SiblingLists`] of the builds it runs, so that interleave rules can
//! reach channels that have not been built yet.

use std::{cell::RefCell, collections::HashSet};

use tracing::{debug, info, warn};

use crate::{
    builder::{BuildMode, PlaylistBuilder},
    config::{ChannelConfig, EngineConfig},
    controller::run_lifecycle_stage,
    error::{EngineError, EngineResult},
    library::MediaLibrary,
    model::MediaEntry,
    registry::ChannelRegistry,
    resolver::{self, SeedContext},
    rules::{SiblingLists, Stage},
    token::WorkToken,
};

pub(crate) struct Rebuilder<'a> {
    registry: &'a ChannelRegistry,
    channels: &'a [ChannelConfig],
    config: &'a EngineConfig,
    library: &'a dyn MediaLibrary,
    token: &'a WorkToken,
    now: i64,
    /// Channels with a build in progress on this stack.
    visiting: RefCell<HashSet<u32>>,
    /// Channels successfully built by this rebuilder.
    built: RefCell<HashSet<u32>>,
}

impl<'a> Rebuilder<'a> {
    pub(crate) fn new(
        registry: &'a ChannelRegistry,
        channels: &'a [ChannelConfig],
        config: &'a EngineConfig,
        library: &'a dyn MediaLibrary,
        token: &'a WorkToken,
        now: i64,
    ) -> Self {
        Self {
            registry,
            channels,
            config,
            library,
            token,
            now,
            visiting: RefCell::new(HashSet::new()),
            built: RefCell::new(HashSet::new()),
        }
    }

    pub(crate) fn was_built(&self, id: u32) -> bool {
        self.built.borrow().contains(&id)
    }

    /// Rebuilds one channel and installs the result.
    ///
    /// A `Replace` build restarts the channel from a fresh list. An `Append`
    /// build extends the list and keeps the playback state.
    ///
    /// Whole-channel failures mark the channel invalid before they are
    /// returned; a cancelled build leaves the channel as it was.
    pub(crate) fn rebuild(&self, id: u32, mode: BuildMode) -> EngineResult<usize> {
        let Some(channel_config) = self.channels.iter().find(|c| c.id == id) else {
            return Err(EngineError::SourceUnavailable {
                channel: id,
                source_name: String::from("(not configured)"),
            });
        };

        self.visiting.borrow_mut().insert(id);
        let result = self.build_and_install(channel_config, mode);
        self.visiting.borrow_mut().remove(&id);

        match &result {
            Ok(len) => {
                self.built.borrow_mut().insert(id);
                info!("Channel {} now has {} entries", id, len);
            }
            Err(e) if e.is_channel_failure() => {
                warn!("Channel {} is unavailable: {}", id, e);
                self.registry.write(id, |c| c.is_valid = false);
            }
            Err(e) => debug!("Channel {}: rebuild stopped: {}", id, e),
        }

        result
    }

    fn build_and_install(&self, channel_config: &ChannelConfig, mode: BuildMode) -> EngineResult<usize> {
        let id = channel_config.id;
        let Some(mut channel) = self.registry.snapshot(id) else {
            return Err(EngineError::SourceUnavailable {
                channel: id,
                source_name: channel_config.sources.join(", "),
            });
        };

        // Rules from the configuration take effect from this build on.
        channel.name = channel_config.display_name();
        channel.kind = channel_config.kind;
        channel.rules = channel_config.load_rules();

        channel = run_lifecycle_stage(self.config, Stage::Start, channel);
        if mode == BuildMode::Replace {
            channel = run_lifecycle_stage(self.config, Stage::BeforeClearHistory, channel);
        }

        let builder = PlaylistBuilder::new(self.config, self.library, self.token);
        let outcome = builder.build(channel_config, self, mode)?;
        if outcome.skipped > 0 {
            info!("Channel {}: skipped {} unusable items", id, outcome.skipped);
        }

        match mode {
            BuildMode::Replace => {
                channel.install(outcome.entries, self.now);
                channel.mode = channel_config.mode();
                channel.is_paused = false;
                channel = run_lifecycle_stage(self.config, Stage::FinalBuilt, channel);
                channel = run_lifecycle_stage(self.config, Stage::BeforeTimeAdjust, channel);

                let ctx = SeedContext {
                    now: self.now,
                    process_start: self.now,
                    last_exit: None,
                };
                resolver::seed(&mut channel, &ctx, &mut rand::rng());
            }
            BuildMode::Append => {
                // The live state may have moved on while building.
                let Some(live) = self.registry.snapshot(id) else {
                    return Err(EngineError::EmptyChannel { channel: id });
                };
                let name = channel.name;
                channel = live;
                channel.name = name;
                channel.entries = outcome.entries;
                channel.is_valid = !channel.entries.is_empty();
            }
        }

        let len = channel.len();
        self.registry.replace(channel);
        Ok(len)
    }
}

impl SiblingLists for Rebuilder<'_> {
    fn channel_count(&self) -> usize {
        self.registry.len()
    }

    fn built_entries(&self, channel_id: u32) -> Option<Vec<MediaEntry>> {
        if self.registry.is_valid(channel_id) {
            return self.registry.read(channel_id, |c| c.entries.clone());
        }
        if self.visiting.borrow().contains(&channel_id) {
            warn!("Channel {} is already being built, not recursing", channel_id);
            return None;
        }

        debug!("Building channel {} on demand", channel_id);
        self.rebuild(channel_id, BuildMode::Replace).ok()?;
        self.registry.read(channel_id, |c| c.entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        controller::tests::{StubLibrary, engine_config, playlist_channel},
        model::{Channel, ChannelKind},
        rules::RuleConfig,
    };

    fn registry(configs: &[ChannelConfig]) -> ChannelRegistry {
        ChannelRegistry::new(
            configs
                .iter()
                .map(|c| Channel::new(c.id, &c.display_name(), c.kind))
                .collect(),
        )
    }

    #[test]
    fn replace_installs_and_seeds_a_fresh_list() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let library = StubLibrary::with_playlist("/one.m3u", &[("A", 600), ("B", 600)]);
        let configs = vec![playlist_channel(1, "/one.m3u")];
        let registry = registry(&configs);
        let token = WorkToken::new();

        let rebuilder = Rebuilder::new(&registry, &configs, &config, &library, &token, 5_000);
        assert_eq!(rebuilder.rebuild(1, BuildMode::Replace).unwrap(), 2);
        assert!(rebuilder.was_built(1));

        let channel = registry.snapshot(1).unwrap();
        assert!(channel.is_valid);
        assert_eq!(channel.position, 0);
        assert_eq!(channel.last_reset_time, 5_000);
        assert_eq!(channel.last_access_time, 5_000);
        assert_eq!(channel.entries[1].title, "B");
    }

    #[test]
    fn failures_mark_the_channel_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let library = StubLibrary::default();
        let configs = vec![playlist_channel(1, "/missing.m3u")];
        let registry = registry(&configs);
        registry.write(1, |c| c.install(vec![MediaEntry::new(60, "Old", "/old")], 0));
        let token = WorkToken::new();

        let rebuilder = Rebuilder::new(&registry, &configs, &config, &library, &token, 10);
        let result = rebuilder.rebuild(1, BuildMode::Replace);
        assert!(matches!(result, Err(EngineError::SourceUnavailable { channel: 1, .. })));
        assert!(!registry.is_valid(1));
        assert!(!rebuilder.was_built(1));
    }

    #[test]
    fn append_keeps_playback_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let library = StubLibrary::with_playlist("/one.m3u", &[("A", 600)]);
        let configs = vec![playlist_channel(1, "/one.m3u")];
        let registry = registry(&configs);
        let token = WorkToken::new();

        let rebuilder = Rebuilder::new(&registry, &configs, &config, &library, &token, 100);
        rebuilder.rebuild(1, BuildMode::Replace).unwrap();
        registry.write(1, |c| c.show_time_offset = 250);

        assert_eq!(rebuilder.rebuild(1, BuildMode::Append).unwrap(), 2);
        let channel = registry.snapshot(1).unwrap();
        assert_eq!(channel.show_time_offset, 250);
        assert_eq!(channel.len(), 2);
    }

    #[test]
    fn interleave_builds_its_target_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let library = StubLibrary::with_playlist("/shows.m3u", &[("S1", 600), ("S2", 600), ("S3", 600)])
            .and_playlist("/ads.m3u", &[("Ad", 30)]);

        let mut shows = playlist_channel(1, "/shows.m3u");
        shows.rules.push(RuleConfig::new("interleave", &["2", "1", "1", "1"]));
        let configs = vec![shows, playlist_channel(2, "/ads.m3u")];
        let registry = registry(&configs);
        let token = WorkToken::new();

        let rebuilder = Rebuilder::new(&registry, &configs, &config, &library, &token, 0);
        rebuilder.rebuild(1, BuildMode::Replace).unwrap();

        assert!(rebuilder.was_built(2));
        let titles: Vec<String> = registry.read(1, |c| c.entries.iter().map(|e| e.title.clone()).collect()).unwrap();
        assert_eq!(titles, vec!["S1", "Ad", "S2", "Ad", "S3", "Ad"]);
    }

    #[test]
    fn interleave_cycles_are_broken() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let library = StubLibrary::with_playlist("/a.m3u", &[("A", 600)]).and_playlist("/b.m3u", &[("B", 600)]);

        let mut first = playlist_channel(1, "/a.m3u");
        first.rules.push(RuleConfig::new("interleave", &["2", "1", "1", "1"]));
        let mut second = playlist_channel(2, "/b.m3u");
        second.rules.push(RuleConfig::new("interleave", &["1", "1", "1", "1"]));
        let configs = vec![first, second];
        let registry = registry(&configs);
        let token = WorkToken::new();

        let rebuilder = Rebuilder::new(&registry, &configs, &config, &library, &token, 0);
        rebuilder.rebuild(1, BuildMode::Replace).unwrap();

        // Channel 2 could not see channel 1, so it kept its own list only.
        assert_eq!(registry.read(2, |c| c.len()), Some(1));
        assert_eq!(registry.read(1, |c| c.len()), Some(2));
        assert_eq!(ChannelKind::Playlist, registry.read(1, |c| c.kind).unwrap());
    }
}
