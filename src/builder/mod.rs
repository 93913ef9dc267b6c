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

//! Playlist builder.
//!
//! Turns a channel's configured source into an ordered, persisted list of
//! [`MediaEntry`] values.
//!
//! # Organization
//!
//! A build runs in these steps:
//!
//! 1. The channel source is resolved into one or more [`LibraryQuery`]s.
//! 2. Every hit is visited, directories are recursed, missing durations are
//!    read from disk and the `PerItem` rule stage runs on each item before it
//!    is converted to an entry.
//! 3. TV channels with distribution enabled go through Smart Distribution,
//!    other channels are ordered by air date or shuffled as configured.
//! 4. The `ListPost` rule stage runs on the whole list.
//! 5. The list is truncated to the size cap and written to the channel's list
//!    file, replacing or extending what was there.
//!
//! The builder never touches a live [`crate::model::Channel`], installing the
//! result is up to the caller.

pub(crate) mod distribution;

use std::path::{Path, PathBuf};

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::{debug, info, warn};

use crate::{
    config::{ChannelConfig, EngineConfig},
    error::{EngineError, EngineResult},
    library::{LibraryHit, LibraryQuery, MediaLibrary},
    listfile,
    model::{ChannelKind, ChannelMode, LibraryItem, MediaEntry, MediaKind},
    rules::{Payload, RuleContext, RulePipeline, SiblingLists, Stage, builtin::sort_by_air_date},
    token::WorkToken,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuildMode {
    /// Discard the existing list.
    Replace,
    /// Add to the existing list, up to the size cap.
    Append,
}

#[derive(Debug)]
pub(crate) struct BuildOutcome {
    /// The complete list as persisted, including any entries it was appended to.
    pub(crate) entries: Vec<MediaEntry>,
    /// Number of records that were skipped as malformed.
    pub(crate) skipped: usize,
}

/// Running state of one build.
struct Collected {
    entries: Vec<MediaEntry>,
    skipped: usize,
    hits: usize,
}

pub(crate) struct PlaylistBuilder<'a> {
    config: &'a EngineConfig,
    library: &'a dyn MediaLibrary,
    token: &'a WorkToken,
    seed: Option<u64>,
}

impl<'a> PlaylistBuilder<'a> {
    pub(crate) fn new(config: &'a EngineConfig, library: &'a dyn MediaLibrary, token: &'a WorkToken) -> Self {
        Self {
            config,
            library,
            token,
            seed: None,
        }
    }

    /// Makes shuffling and distribution repeatable.
    #[cfg(test)]
    pub(crate) fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds and persists the list of a channel.
    ///
    /// # Arguments
    ///
    /// * `channel` - The channel's configuration, including its rules.
    /// * `siblings` - Access to other channels for rules that need them.
    /// * `mode` - Whether to replace or extend the existing list.
    ///
    /// # Errors
    ///
    /// * [`EngineError::SourceUnavailable`] if the source is missing or empty.
    /// * [`EngineError::EmptyChannel`] if nothing survived filtering.
    /// * [`EngineError::Cancelled`] if the token was cancelled.
    /// * I/O errors writing the list file.
    pub(crate) fn build(
        &self,
        channel: &ChannelConfig,
        siblings: &dyn SiblingLists,
        mode: BuildMode,
    ) -> EngineResult<BuildOutcome> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let rules = channel.load_rules();
        let pipeline = RulePipeline::new(&rules);

        info!("Building channel {} ({:?})", channel.id, mode);

        let (entries, skipped) = {
            let mut ctx = RuleContext {
                channel_id: channel.id,
                kind: channel.kind,
                config: self.config,
                siblings,
                rng: &mut rng,
            };
            self.collect_entries(channel, &pipeline, &mut ctx)?
        };

        let mut entries = self.order(channel, entries, &mut rng)?;

        let mut ctx = RuleContext {
            channel_id: channel.id,
            kind: channel.kind,
            config: self.config,
            siblings,
            rng: &mut rng,
        };
        entries = pipeline.run(Stage::ListPost, &mut ctx, Payload::List(entries)).into_list();

        if entries.is_empty() {
            return Err(EngineError::EmptyChannel {
                channel: channel.id,
            });
        }

        let entries = self.persist(channel.id, entries, mode)?;

        info!(
            "Channel {} built with {} entries ({} skipped)",
            channel.id,
            entries.len(),
            skipped
        );

        Ok(BuildOutcome { entries, skipped })
    }

    /// Gathers the converted entries of every source, mixing several playlist
    /// sources round-robin.
    fn collect_entries(
        &self,
        channel: &ChannelConfig,
        pipeline: &RulePipeline,
        ctx: &mut RuleContext,
    ) -> EngineResult<(Vec<MediaEntry>, usize)> {
        let queries = source_queries(channel)?;

        let mut lists = Vec::with_capacity(queries.len());
        let mut skipped = 0;
        for query in &queries {
            let mut collected = Collected {
                entries: Vec::new(),
                skipped: 0,
                hits: 0,
            };
            self.visit(query, 0, pipeline, ctx, &mut collected)
                .map_err(|e| self.source_failure(channel, query, e))?;

            if collected.hits == 0 {
                warn!("Channel {}: source {:?} is empty", channel.id, query);
                return Err(unavailable(channel, query));
            }
            skipped += collected.skipped;
            lists.push(collected.entries);
        }

        let entries = match lists.len() {
            1 => lists.pop().unwrap_or_default(),
            _ => round_robin(lists),
        };

        if entries.is_empty() {
            return Err(EngineError::EmptyChannel {
                channel: channel.id,
            });
        }

        Ok((entries, skipped))
    }

    fn source_failure(&self, channel: &ChannelConfig, query: &LibraryQuery, error: EngineError) -> EngineError {
        match error {
            EngineError::Cancelled => EngineError::Cancelled,
            e => {
                warn!("Channel {}: cannot read {:?}: {}", channel.id, query, e);
                unavailable(channel, query)
            }
        }
    }

    /// Visits the hits of one query, recursing into directories.
    fn visit(
        &self,
        query: &LibraryQuery,
        depth: usize,
        pipeline: &RulePipeline,
        ctx: &mut RuleContext,
        collected: &mut Collected,
    ) -> EngineResult<()> {
        let hits = self
            .library
            .query(query)
            .map_err(|e| EngineError::Io(std::io::Error::other(e.to_string())))?;

        for hit in hits {
            self.token.checkpoint()?;
            collected.hits += 1;

            match hit {
                LibraryHit::Directory(path) if depth < self.config.max_directory_depth => {
                    let nested = LibraryQuery::Directory(path);
                    if let Err(e) = self.visit(&nested, depth + 1, pipeline, ctx, collected) {
                        if matches!(e, EngineError::Cancelled) {
                            return Err(e);
                        }
                        warn!("Channel {}: skipping {:?}: {}", ctx.channel_id, nested, e);
                    }
                }
                LibraryHit::Directory(path) => {
                    warn!("Channel {}: {} is nested too deeply", ctx.channel_id, path.display());
                }
                LibraryHit::Item(item) => match self.entry_for(item, collected.hits, pipeline, ctx) {
                    Ok(Some(entry)) => collected.entries.push(entry),
                    Ok(None) => {}
                    Err(e @ EngineError::MalformedRecord { .. }) => {
                        debug!("Channel {}: {}", ctx.channel_id, e);
                        collected.skipped += 1;
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        Ok(())
    }

    /// Runs one item through duration checks and the per-item rules. Returns
    /// `None` if a rule dropped it.
    fn entry_for(
        &self,
        mut item: LibraryItem,
        line: usize,
        pipeline: &RulePipeline,
        ctx: &mut RuleContext,
    ) -> EngineResult<Option<MediaEntry>> {
        if item.duration <= 0 {
            item.duration = self.library.read_duration(Path::new(&item.path)).unwrap_or(0);
        }
        if item.duration <= 0 {
            return Err(EngineError::MalformedRecord {
                line,
                reason: format!("{} has no duration", item.path),
            });
        }

        let item = pipeline.run(Stage::PerItem, ctx, Payload::Item(Some(item))).into_item();
        Ok(item.map(|item| to_entry(&item)))
    }

    fn order(
        &self,
        channel: &ChannelConfig,
        mut entries: Vec<MediaEntry>,
        rng: &mut StdRng,
    ) -> EngineResult<Vec<MediaEntry>> {
        let verbatim = channel.kind == ChannelKind::Playlist && channel.sources.len() == 1;

        if channel.kind == ChannelKind::TvGenre && self.config.smart_distribution {
            entries = distribution::distribute(entries, self.config.max_playlist_size, rng, self.token)?;
        } else if channel.mode().contains(ChannelMode::ORDER_AIR_DATE) {
            sort_by_air_date(&mut entries);
        } else if channel.shuffle && !verbatim {
            entries.shuffle(rng);
        }

        Ok(entries)
    }

    fn persist(&self, channel_id: u32, mut entries: Vec<MediaEntry>, mode: BuildMode) -> EngineResult<Vec<MediaEntry>> {
        let path = listfile::list_path(&self.config.data_dir, channel_id);
        let cap = self.config.max_playlist_size;

        match mode {
            BuildMode::Replace => {
                entries.truncate(cap);
                listfile::write_list(&path, &entries)?;
                Ok(entries)
            }
            BuildMode::Append => {
                let mut existing = if path.exists() {
                    listfile::read_list(&path).unwrap_or_else(|e| {
                        warn!("Channel {}: existing list unreadable, replacing it: {}", channel_id, e);
                        Vec::new()
                    })
                } else {
                    Vec::new()
                };

                entries.truncate(cap.saturating_sub(existing.len()));
                if existing.is_empty() {
                    listfile::write_list(&path, &entries)?;
                } else {
                    listfile::append_list(&path, &entries)?;
                }
                existing.extend(entries);
                Ok(existing)
            }
        }
    }
}

fn unavailable(channel: &ChannelConfig, query: &LibraryQuery) -> EngineError {
    let source_name = match query {
        LibraryQuery::Genre { genre, .. } => genre.clone(),
        LibraryQuery::Playlist(path) | LibraryQuery::Directory(path) => path.display().to_string(),
    };
    EngineError::SourceUnavailable {
        channel: channel.id,
        source_name,
    }
}

/// The library queries a channel's sources resolve to.
fn source_queries(channel: &ChannelConfig) -> EngineResult<Vec<LibraryQuery>> {
    let sources: Vec<&str> = channel
        .sources
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if sources.is_empty() {
        return Err(EngineError::SourceUnavailable {
            channel: channel.id,
            source_name: String::new(),
        });
    }

    let genre = |kind: MediaKind| -> Vec<LibraryQuery> {
        sources
            .iter()
            .map(|g| LibraryQuery::Genre {
                kind,
                genre: g.to_string(),
            })
            .collect()
    };

    let queries = match channel.kind {
        ChannelKind::Playlist => sources
            .iter()
            .map(|s| {
                let path = PathBuf::from(s);
                if path.is_dir() {
                    LibraryQuery::Directory(path)
                } else {
                    LibraryQuery::Playlist(path)
                }
            })
            .collect(),
        ChannelKind::TvGenre => genre(MediaKind::Episode),
        ChannelKind::MovieGenre => genre(MediaKind::Movie),
        ChannelKind::MusicGenre => genre(MediaKind::Song),
    };

    Ok(queries)
}

/// Converts a library record into a list entry, according to what it is.
fn to_entry(item: &LibraryItem) -> MediaEntry {
    let or_fallback = |text: &str| {
        if text.trim().is_empty() {
            item.fallback_title()
        } else {
            text.to_string()
        }
    };

    let (title, subtitle, description) = match item.classify() {
        MediaKind::Episode => (or_fallback(&item.show_title), item.title.clone(), item.plot.clone()),
        MediaKind::Song => (or_fallback(&item.artist), or_fallback(&item.title), item.album.clone()),
        MediaKind::Movie | MediaKind::Unknown => (or_fallback(&item.title), String::new(), item.plot.clone()),
    };

    MediaEntry {
        duration: item.duration,
        title: listfile::normalize_field(&title),
        subtitle: listfile::normalize_field(&subtitle),
        description: listfile::normalize_field(&description),
        source_path: item.path.clone(),
        season: item.season,
        episode: item.episode,
    }
}

/// Interleaves several lists one entry at a time until all are used up.
fn round_robin(lists: Vec<Vec<MediaEntry>>) -> Vec<MediaEntry> {
    let total = lists.iter().map(Vec::len).sum();
    let mut iters: Vec<_> = lists.into_iter().map(Vec::into_iter).collect();
    let mut mixed = Vec::with_capacity(total);

    while mixed.len() < total {
        for iter in &mut iters {
            if let Some(entry) = iter.next() {
                mixed.push(entry);
            }
        }
    }

    mixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::UNKNOWN,
        rules::{NoSiblings, RuleConfig},
    };
    use anyhow::{Result, bail};
    use std::collections::HashMap;

    #[derive(Default)]
    struct StubLibrary {
        answers: Vec<(LibraryQuery, Vec<LibraryHit>)>,
        durations: HashMap<String, i64>,
    }

    impl StubLibrary {
        fn answer(mut self, query: LibraryQuery, hits: Vec<LibraryHit>) -> Self {
            self.answers.push((query, hits));
            self
        }
    }

    impl MediaLibrary for StubLibrary {
        fn query(&self, query: &LibraryQuery) -> Result<Vec<LibraryHit>> {
            match self.answers.iter().find(|(q, _)| q == query) {
                Some((_, hits)) => Ok(hits.clone()),
                None => bail!("no such source"),
            }
        }

        fn read_duration(&self, path: &Path) -> Option<i64> {
            self.durations.get(path.to_str()?).copied()
        }
    }

    fn song(path: &str, duration: i64) -> LibraryHit {
        let mut item = LibraryItem::new(path);
        item.kind = MediaKind::Song;
        item.artist = "Artist".into();
        item.title = format!("Track {}", path);
        item.album = "Album".into();
        item.duration = duration;
        LibraryHit::Item(item)
    }

    fn episode(show: &str, season: i32, episode: i32) -> LibraryHit {
        let mut item = LibraryItem::new(&format!("/tv/{}/{}x{}.mkv", show, season, episode));
        item.kind = MediaKind::Episode;
        item.show_title = show.into();
        item.title = format!("Episode {}", episode);
        item.season = season;
        item.episode = episode;
        item.duration = 1_500;
        item.genre = "Comedy".into();
        LibraryHit::Item(item)
    }

    fn config(dir: &Path) -> EngineConfig {
        EngineConfig {
            data_dir: dir.to_path_buf(),
            ..EngineConfig::default()
        }
    }

    fn paths(entries: &[MediaEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.source_path.as_str()).collect()
    }

    #[test]
    fn single_playlist_is_kept_verbatim_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut library = StubLibrary::default()
            .answer(
                LibraryQuery::Playlist("/lists/mix.m3u".into()),
                vec![song("/m/3.mp3", 30), LibraryHit::Directory("/m/more".into()), song("/m/bad.mp3", 0)],
            )
            .answer(
                LibraryQuery::Directory("/m/more".into()),
                vec![song("/m/1.mp3", 0), song("/m/2.mp3", 20)],
            );
        library.durations.insert("/m/1.mp3".into(), 45);

        let mut channel = ChannelConfig::new(1, ChannelKind::Playlist, "/lists/mix.m3u");
        channel.shuffle = true;
        let token = WorkToken::new();
        let outcome = PlaylistBuilder::new(&config, &library, &token)
            .with_seed(1)
            .build(&channel, &NoSiblings, BuildMode::Replace)
            .unwrap();

        assert_eq!(paths(&outcome.entries), vec!["/m/3.mp3", "/m/1.mp3", "/m/2.mp3"]);
        assert_eq!(outcome.entries[1].duration, 45);
        assert_eq!(outcome.skipped, 1);

        let persisted = listfile::read_list(&listfile::list_path(dir.path(), 1)).unwrap();
        assert_eq!(persisted, outcome.entries);
    }

    #[test]
    fn several_playlists_are_mixed_round_robin() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let library = StubLibrary::default()
            .answer(
                LibraryQuery::Playlist("/a.m3u".into()),
                vec![song("/a1", 10), song("/a2", 10), song("/a3", 10)],
            )
            .answer(LibraryQuery::Playlist("/b.m3u".into()), vec![song("/b1", 10)]);

        let mut channel = ChannelConfig::new(2, ChannelKind::Playlist, "/a.m3u");
        channel.sources.push("/b.m3u".into());
        let token = WorkToken::new();
        let outcome = PlaylistBuilder::new(&config, &library, &token)
            .build(&channel, &NoSiblings, BuildMode::Replace)
            .unwrap();

        assert_eq!(paths(&outcome.entries), vec!["/a1", "/b1", "/a2", "/a3"]);
    }

    #[test]
    fn records_are_converted_by_kind() {
        let mut movie = LibraryItem::new("/movies/Heat.mkv");
        movie.kind = MediaKind::Movie;
        movie.plot = "A heist\nin LA".into();
        movie.duration = 10_200;

        let entry = to_entry(&movie);
        assert_eq!(entry.title, "Heat");
        assert_eq!(entry.subtitle, "");
        assert_eq!(entry.description, "A heist in LA");

        let LibraryHit::Item(track) = song("/m/x.mp3", 200) else {
            unreachable!()
        };
        let entry = to_entry(&track);
        assert_eq!(
            (entry.title.as_str(), entry.subtitle.as_str(), entry.description.as_str()),
            ("Artist", "Track /m/x.mp3", "Album")
        );

        let LibraryHit::Item(ep) = episode("Show", 2, 5) else {
            unreachable!()
        };
        let entry = to_entry(&ep);
        assert_eq!((entry.title.as_str(), entry.subtitle.as_str()), ("Show", "Episode 5"));
        assert_eq!((entry.season, entry.episode), (2, 5));
    }

    #[test]
    fn tv_genre_is_distributed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut hits: Vec<LibraryHit> = (1..=20).map(|e| episode("Big", 1, e)).collect();
        hits.push(episode("Small", 1, 1));
        let library = StubLibrary::default().answer(
            LibraryQuery::Genre {
                kind: MediaKind::Episode,
                genre: "Comedy".into(),
            },
            hits,
        );

        let channel = ChannelConfig::new(3, ChannelKind::TvGenre, "Comedy");
        let token = WorkToken::new();
        let outcome = PlaylistBuilder::new(&config, &library, &token)
            .with_seed(9)
            .build(&channel, &NoSiblings, BuildMode::Replace)
            .unwrap();

        assert_eq!(outcome.entries.len(), 21);
        assert_eq!(outcome.entries.iter().filter(|e| e.title == "Small").count(), 1);
    }

    #[test]
    fn air_date_mode_orders_episodes() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.smart_distribution = false;
        let library = StubLibrary::default().answer(
            LibraryQuery::Genre {
                kind: MediaKind::Episode,
                genre: "Comedy".into(),
            },
            vec![episode("S", 2, 1), episode("S", 1, 2), episode("S", 1, 1)],
        );

        let mut channel = ChannelConfig::new(4, ChannelKind::TvGenre, "Comedy");
        channel.modes = vec![crate::model::ModeFlag::OrderAirDate];
        let token = WorkToken::new();
        let outcome = PlaylistBuilder::new(&config, &library, &token)
            .build(&channel, &NoSiblings, BuildMode::Replace)
            .unwrap();

        let order: Vec<(i32, i32)> = outcome.entries.iter().map(|e| (e.season, e.episode)).collect();
        assert_eq!(order, vec![(1, 1), (1, 2), (2, 1)]);
    }

    #[test]
    fn missing_or_empty_sources_are_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let library = StubLibrary::default().answer(LibraryQuery::Playlist("/empty.m3u".into()), vec![]);
        let token = WorkToken::new();
        let builder = PlaylistBuilder::new(&config, &library, &token);

        for source in ["/missing.m3u", "/empty.m3u", " "] {
            let channel = ChannelConfig::new(5, ChannelKind::Playlist, source);
            let result = builder.build(&channel, &NoSiblings, BuildMode::Replace);
            assert!(
                matches!(result, Err(EngineError::SourceUnavailable { channel: 5, .. })),
                "{:?}",
                source
            );
        }
    }

    #[test]
    fn fully_filtered_channel_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let library = StubLibrary::default().answer(
            LibraryQuery::Genre {
                kind: MediaKind::Song,
                genre: "Jazz".into(),
            },
            vec![song("/j1.mp3", 100), song("/j2.mp3", 100)],
        );

        let mut channel = ChannelConfig::new(6, ChannelKind::MusicGenre, "Jazz");
        channel.rules.push(RuleConfig::new("exclude_name", &["artist"]));
        let token = WorkToken::new();
        let result = PlaylistBuilder::new(&config, &library, &token).build(&channel, &NoSiblings, BuildMode::Replace);
        assert!(matches!(result, Err(EngineError::EmptyChannel { channel: 6 })));
    }

    #[test]
    fn lists_are_capped_and_appended_up_to_the_cap() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.max_playlist_size = 3;
        let library = StubLibrary::default().answer(
            LibraryQuery::Playlist("/l.m3u".into()),
            vec![song("/1", 10), song("/2", 10)],
        );
        let channel = ChannelConfig::new(7, ChannelKind::Playlist, "/l.m3u");
        let token = WorkToken::new();
        let builder = PlaylistBuilder::new(&config, &library, &token);

        let first = builder.build(&channel, &NoSiblings, BuildMode::Append).unwrap();
        assert_eq!(paths(&first.entries), vec!["/1", "/2"]);

        let second = builder.build(&channel, &NoSiblings, BuildMode::Append).unwrap();
        assert_eq!(paths(&second.entries), vec!["/1", "/2", "/1"]);

        let persisted = listfile::read_list(&listfile::list_path(dir.path(), 7)).unwrap();
        assert_eq!(persisted.len(), 3);

        let replaced = builder.build(&channel, &NoSiblings, BuildMode::Replace).unwrap();
        assert_eq!(replaced.entries.len(), 2);
    }

    #[test]
    fn cancelled_build_stops() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let library =
            StubLibrary::default().answer(LibraryQuery::Playlist("/l.m3u".into()), vec![song("/1", 10)]);
        let channel = ChannelConfig::new(8, ChannelKind::Playlist, "/l.m3u");
        let token = WorkToken::new();
        token.cancel();

        let result = PlaylistBuilder::new(&config, &library, &token).build(&channel, &NoSiblings, BuildMode::Replace);
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert!(!listfile::list_path(dir.path(), 8).exists());
    }

    #[test]
    fn unknown_numbers_survive_conversion() {
        let mut item = LibraryItem::new("/movies/x.mkv");
        item.duration = 60;
        let entry = to_entry(&item);
        assert_eq!((entry.season, entry.episode), (UNKNOWN, UNKNOWN));
    }
}
