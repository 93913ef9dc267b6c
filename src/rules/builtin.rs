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

//! Built-in rules.

use rand::Rng;
use tracing::{debug, warn};

use crate::{
    model::{ChannelKind, ChannelMode, LibraryItem, MediaEntry, ModeFlag},
    rules::{ChannelRule, KindSet, Payload, RuleContext, RuleError, Stage, StageSet},
};

/// Sets the channel display name.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RenameRule {
    pub(crate) name: String,
}

impl ChannelRule for RenameRule {
    fn id(&self) -> &'static str {
        "rename"
    }

    fn stages(&self) -> StageSet {
        StageSet::of(&[Stage::FinalBuilt, Stage::FinalLoaded])
    }

    fn apply(&self, stage: Stage, _: &mut RuleContext, payload: Payload) -> Result<Payload, RuleError> {
        match payload {
            Payload::Channel(mut channel) => {
                channel.name = self.name.clone();
                Ok(Payload::Channel(channel))
            }
            _ => Err(RuleError::UnexpectedPayload(stage)),
        }
    }

    fn options(&self) -> Vec<String> {
        vec![self.name.clone()]
    }
}

/// Drops items whose title contains a pattern, ignoring case.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExcludeNameRule {
    pattern: String,
}

impl ExcludeNameRule {
    pub(crate) fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_lowercase(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        !self.pattern.is_empty() && text.to_lowercase().contains(&self.pattern)
    }

    fn matches_item(&self, item: &LibraryItem) -> bool {
        self.matches(&item.title) || self.matches(&item.show_title)
    }

    fn matches_entry(&self, entry: &MediaEntry) -> bool {
        self.matches(&entry.title) || self.matches(&entry.subtitle)
    }
}

impl ChannelRule for ExcludeNameRule {
    fn id(&self) -> &'static str {
        "exclude_name"
    }

    fn stages(&self) -> StageSet {
        StageSet::of(&[Stage::PerItem, Stage::ListPost])
    }

    fn apply(&self, stage: Stage, _: &mut RuleContext, payload: Payload) -> Result<Payload, RuleError> {
        match payload {
            Payload::Item(item) => Ok(Payload::Item(item.filter(|i| !self.matches_item(i)))),
            Payload::List(mut entries) => {
                entries.retain(|e| !self.matches_entry(e));
                Ok(Payload::List(entries))
            }
            Payload::Channel(_) => Err(RuleError::UnexpectedPayload(stage)),
        }
    }

    fn options(&self) -> Vec<String> {
        vec![self.pattern.clone()]
    }
}

/// Keeps only watched, or only unwatched, items.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WatchedRule {
    pub(crate) keep_watched: bool,
}

impl ChannelRule for WatchedRule {
    fn id(&self) -> &'static str {
        if self.keep_watched {
            "only_watched"
        } else {
            "only_unwatched"
        }
    }

    fn stages(&self) -> StageSet {
        StageSet::of(&[Stage::PerItem])
    }

    fn apply(&self, stage: Stage, _: &mut RuleContext, payload: Payload) -> Result<Payload, RuleError> {
        match payload {
            Payload::Item(item) => Ok(Payload::Item(
                item.filter(|i| i.is_watched() == self.keep_watched),
            )),
            _ => Err(RuleError::UnexpectedPayload(stage)),
        }
    }

    fn options(&self) -> Vec<String> {
        vec![]
    }
}

/// Marks the channel invalid, removing it from rotation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DisableChannelRule;

impl ChannelRule for DisableChannelRule {
    fn id(&self) -> &'static str {
        "disable"
    }

    fn stages(&self) -> StageSet {
        StageSet::of(&[Stage::FinalBuilt, Stage::FinalLoaded])
    }

    fn apply(&self, stage: Stage, _: &mut RuleContext, payload: Payload) -> Result<Payload, RuleError> {
        match payload {
            Payload::Channel(mut channel) => {
                channel.is_valid = false;
                Ok(Payload::Channel(channel))
            }
            _ => Err(RuleError::UnexpectedPayload(stage)),
        }
    }

    fn options(&self) -> Vec<String> {
        vec![]
    }
}

/// Splices the entries of another channel into this one.
///
/// After every `k` source entries one entry of the target channel is inserted,
/// where `k` is drawn from `min..=max` after each insertion. Target entries are
/// used in order, starting at `start_episode` and wrapping around.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InterleaveRule {
    pub(crate) channel: u32,
    pub(crate) min: usize,
    pub(crate) max: usize,
    pub(crate) start_episode: usize,
}

impl InterleaveRule {
    fn splice(
        &self,
        source: Vec<MediaEntry>,
        target: &[MediaEntry],
        limit: usize,
        rng: &mut dyn rand::RngCore,
    ) -> Vec<MediaEntry> {
        let mut spliced = Vec::with_capacity(source.len() + source.len() / self.min.max(1) + 1);
        let mut next_target = self.start_episode.saturating_sub(1) % target.len();
        let mut since_insert = 0;
        let mut interval = rng.random_range(self.min..=self.max);

        for entry in source {
            if spliced.len() >= limit {
                break;
            }
            spliced.push(entry);
            since_insert += 1;

            if since_insert >= interval && spliced.len() < limit {
                spliced.push(target[next_target].clone());
                next_target = (next_target + 1) % target.len();
                since_insert = 0;
                interval = rng.random_range(self.min..=self.max);
            }
        }

        spliced
    }
}

impl ChannelRule for InterleaveRule {
    fn id(&self) -> &'static str {
        "interleave"
    }

    fn stages(&self) -> StageSet {
        StageSet::of(&[Stage::ListPost])
    }

    fn apply(&self, stage: Stage, ctx: &mut RuleContext, payload: Payload) -> Result<Payload, RuleError> {
        let Payload::List(source) = payload else {
            return Err(RuleError::UnexpectedPayload(stage));
        };

        if self.channel == ctx.channel_id || self.channel as usize > ctx.siblings.channel_count() {
            warn!(
                "Channel {}: cannot interleave channel {}",
                ctx.channel_id, self.channel
            );
            return Ok(Payload::List(source));
        }

        let target = match ctx.siblings.built_entries(self.channel) {
            Some(target) if !target.is_empty() => target,
            _ => {
                warn!(
                    "Channel {}: interleave target {} has no entries",
                    ctx.channel_id, self.channel
                );
                return Ok(Payload::List(source));
            }
        };

        debug!(
            "Channel {}: interleaving {} entries from channel {}",
            ctx.channel_id,
            target.len(),
            self.channel
        );

        // Inserted items count against the list size cap.
        let limit = ctx.config.max_playlist_size;
        Ok(Payload::List(self.splice(source, &target, limit, ctx.rng)))
    }

    fn options(&self) -> Vec<String> {
        vec![
            self.channel.to_string(),
            self.min.to_string(),
            self.max.to_string(),
            self.start_episode.to_string(),
        ]
    }
}

/// Orders TV entries by season, then episode.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OrderAirDateRule;

impl ChannelRule for OrderAirDateRule {
    fn id(&self) -> &'static str {
        "order_air_date"
    }

    fn stages(&self) -> StageSet {
        StageSet::of(&[Stage::ListPost])
    }

    fn kinds(&self) -> KindSet {
        KindSet::only(ChannelKind::TvGenre)
    }

    fn apply(&self, stage: Stage, _: &mut RuleContext, payload: Payload) -> Result<Payload, RuleError> {
        match payload {
            Payload::List(mut entries) => {
                sort_by_air_date(&mut entries);
                Ok(Payload::List(entries))
            }
            _ => Err(RuleError::UnexpectedPayload(stage)),
        }
    }

    fn options(&self) -> Vec<String> {
        vec![]
    }
}

/// Stable sort by season then episode.
pub(crate) fn sort_by_air_date(entries: &mut [MediaEntry]) {
    entries.sort_by_key(|e| (e.season, e.episode));
}

/// Drops entries whose duration falls outside a range of minutes. Entries
/// with an unknown duration pass through.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LimitDurationRule {
    pub(crate) min_minutes: i64,
    pub(crate) max_minutes: i64,
}

impl ChannelRule for LimitDurationRule {
    fn id(&self) -> &'static str {
        "limit_duration"
    }

    fn stages(&self) -> StageSet {
        StageSet::of(&[Stage::ListPost])
    }

    fn apply(&self, stage: Stage, _: &mut RuleContext, payload: Payload) -> Result<Payload, RuleError> {
        let Payload::List(mut entries) = payload else {
            return Err(RuleError::UnexpectedPayload(stage));
        };

        let range = self.min_minutes * 60..=self.max_minutes * 60;
        entries.retain(|e| e.duration <= 0 || range.contains(&e.duration));

        Ok(Payload::List(entries))
    }

    fn options(&self) -> Vec<String> {
        vec![self.min_minutes.to_string(), self.max_minutes.to_string()]
    }
}

/// Drops items whose plot contains any of a set of keywords as a whole word.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlotKeywordRule {
    keywords: Vec<String>,
}

impl PlotKeywordRule {
    pub(crate) fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    fn matches(&self, plot: &str) -> bool {
        plot.split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|word| !word.is_empty())
            .any(|word| {
                let word = word.to_lowercase();
                self.keywords.iter().any(|k| *k == word)
            })
    }
}

impl ChannelRule for PlotKeywordRule {
    fn id(&self) -> &'static str {
        "plot_exclude"
    }

    fn stages(&self) -> StageSet {
        StageSet::of(&[Stage::PerItem])
    }

    fn apply(&self, stage: Stage, _: &mut RuleContext, payload: Payload) -> Result<Payload, RuleError> {
        match payload {
            Payload::Item(item) => Ok(Payload::Item(item.filter(|i| !self.matches(&i.plot)))),
            _ => Err(RuleError::UnexpectedPayload(stage)),
        }
    }

    fn options(&self) -> Vec<String> {
        vec![self.keywords.join(",")]
    }
}

/// Sets or clears a channel mode before the channel's time is seeded.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ForceModeRule {
    pub(crate) flag: ModeFlag,
    pub(crate) enabled: bool,
}

impl ChannelRule for ForceModeRule {
    fn id(&self) -> &'static str {
        "force_mode"
    }

    fn stages(&self) -> StageSet {
        StageSet::of(&[Stage::BeforeTimeAdjust])
    }

    fn apply(&self, stage: Stage, _: &mut RuleContext, payload: Payload) -> Result<Payload, RuleError> {
        let Payload::Channel(mut channel) = payload else {
            return Err(RuleError::UnexpectedPayload(stage));
        };

        let mode = ChannelMode::from(self.flag);
        channel.mode = if self.enabled {
            channel.mode.with(mode)
        } else {
            channel.mode.without(mode)
        };

        Ok(Payload::Channel(channel))
    }

    fn options(&self) -> Vec<String> {
        let state = if self.enabled { "on" } else { "off" };
        vec![self.flag.name().to_string(), state.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::EngineConfig,
        model::Channel,
        rules::{NoSiblings, SiblingLists},
    };
    use rand::{SeedableRng, rngs::StdRng};

    struct FixedSiblings(Vec<Vec<MediaEntry>>);

    impl SiblingLists for FixedSiblings {
        fn channel_count(&self) -> usize {
            self.0.len()
        }

        fn built_entries(&self, channel_id: u32) -> Option<Vec<MediaEntry>> {
            self.0.get(channel_id as usize - 1).cloned()
        }
    }

    fn entries(prefix: &str, count: usize) -> Vec<MediaEntry> {
        (0..count)
            .map(|i| MediaEntry::new(600, &format!("{} {}", prefix, i), &format!("/{}/{}", prefix, i)))
            .collect()
    }

    fn run(rule: &dyn ChannelRule, siblings: &dyn SiblingLists, stage: Stage, payload: Payload) -> Payload {
        run_with(&EngineConfig::default(), rule, siblings, stage, payload)
    }

    fn run_with(
        config: &EngineConfig,
        rule: &dyn ChannelRule,
        siblings: &dyn SiblingLists,
        stage: Stage,
        payload: Payload,
    ) -> Payload {
        let mut rng = StdRng::seed_from_u64(7);
        let mut ctx = RuleContext {
            channel_id: 1,
            kind: ChannelKind::TvGenre,
            config,
            siblings,
            rng: &mut rng,
        };
        rule.apply(stage, &mut ctx, payload).unwrap()
    }

    #[test]
    fn rename_sets_channel_name() {
        let rule = RenameRule { name: "Cartoons".into() };
        let channel = Channel::new(1, "One", ChannelKind::TvGenre);
        let out = run(&rule, &NoSiblings, Stage::FinalBuilt, Payload::Channel(Box::new(channel)));
        assert_eq!(out.into_channel().unwrap().name, "Cartoons");
    }

    #[test]
    fn rename_rejects_list_payload() {
        let rule = RenameRule { name: "X".into() };
        let config = EngineConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = RuleContext {
            channel_id: 1,
            kind: ChannelKind::TvGenre,
            config: &config,
            siblings: &NoSiblings,
            rng: &mut rng,
        };
        assert!(rule.apply(Stage::ListPost, &mut ctx, Payload::List(vec![])).is_err());
    }

    #[test]
    fn exclude_name_is_case_insensitive_substring() {
        let rule = ExcludeNameRule::new("NEWS");
        let mut item = LibraryItem::new("/a.mkv");
        item.show_title = "Evening News Hour".into();
        let out = run(&rule, &NoSiblings, Stage::PerItem, Payload::Item(Some(item)));
        assert!(out.into_item().is_none());

        let list = vec![
            MediaEntry::new(60, "The news", "/a"),
            MediaEntry::new(60, "Cartoons", "/b"),
        ];
        let out = run(&rule, &NoSiblings, Stage::ListPost, Payload::List(list)).into_list();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Cartoons");
    }

    #[test]
    fn watched_rules_filter_by_play_count() {
        let mut watched = LibraryItem::new("/w.mkv");
        watched.play_count = 2;
        let unwatched = LibraryItem::new("/u.mkv");

        let only_unwatched = WatchedRule { keep_watched: false };
        assert!(run(&only_unwatched, &NoSiblings, Stage::PerItem, Payload::Item(Some(watched.clone()))).into_item().is_none());
        assert!(run(&only_unwatched, &NoSiblings, Stage::PerItem, Payload::Item(Some(unwatched.clone()))).into_item().is_some());

        let only_watched = WatchedRule { keep_watched: true };
        assert!(run(&only_watched, &NoSiblings, Stage::PerItem, Payload::Item(Some(watched))).into_item().is_some());
        assert!(run(&only_watched, &NoSiblings, Stage::PerItem, Payload::Item(Some(unwatched))).into_item().is_none());
    }

    #[test]
    fn disable_marks_channel_invalid() {
        let mut channel = Channel::new(1, "One", ChannelKind::MovieGenre);
        channel.is_valid = true;
        let out = run(&DisableChannelRule, &NoSiblings, Stage::FinalLoaded, Payload::Channel(Box::new(channel)));
        assert!(!out.into_channel().unwrap().is_valid);
    }

    #[test]
    fn interleave_inserts_after_every_interval() {
        let siblings = FixedSiblings(vec![vec![], entries("ad", 10)]);
        let rule = InterleaveRule { channel: 2, min: 2, max: 2, start_episode: 1 };

        let out = run(&rule, &siblings, Stage::ListPost, Payload::List(entries("show", 20))).into_list();

        assert_eq!(out.len(), 30);
        for (i, entry) in out.iter().enumerate() {
            let is_target = i % 3 == 2;
            assert_eq!(entry.title.starts_with("ad"), is_target, "index {}", i);
        }
        assert_eq!(out[2].title, "ad 0");
        assert_eq!(out[29].title, "ad 9");
    }

    #[test]
    fn interleave_stops_at_the_size_cap() {
        let siblings = FixedSiblings(vec![vec![], entries("ad", 10)]);
        let rule = InterleaveRule { channel: 2, min: 2, max: 2, start_episode: 1 };
        let config = EngineConfig {
            max_playlist_size: 7,
            ..EngineConfig::default()
        };

        let out = run_with(&config, &rule, &siblings, Stage::ListPost, Payload::List(entries("show", 20))).into_list();
        let titles: Vec<_> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["show 0", "show 1", "ad 0", "show 2", "show 3", "ad 1", "show 4"]);
    }

    #[test]
    fn interleave_wraps_target_and_honours_start_episode() {
        let siblings = FixedSiblings(vec![vec![], entries("ad", 2)]);
        let rule = InterleaveRule { channel: 2, min: 1, max: 1, start_episode: 2 };

        let out = run(&rule, &siblings, Stage::ListPost, Payload::List(entries("show", 3))).into_list();
        let titles: Vec<_> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["show 0", "ad 1", "show 1", "ad 0", "show 2", "ad 1"]);
    }

    #[test]
    fn interleave_fails_closed() {
        let source = entries("show", 5);

        let empty_target = FixedSiblings(vec![vec![], vec![]]);
        let rule = InterleaveRule { channel: 2, min: 1, max: 3, start_episode: 1 };
        let out = run(&rule, &empty_target, Stage::ListPost, Payload::List(source.clone())).into_list();
        assert_eq!(out, source);

        let out_of_range = InterleaveRule { channel: 9, ..rule.clone() };
        let out = run(&out_of_range, &empty_target, Stage::ListPost, Payload::List(source.clone())).into_list();
        assert_eq!(out, source);

        let itself = InterleaveRule { channel: 1, ..rule };
        let siblings = FixedSiblings(vec![entries("self", 3)]);
        let out = run(&itself, &siblings, Stage::ListPost, Payload::List(source.clone())).into_list();
        assert_eq!(out, source);
    }

    #[test]
    fn order_air_date_is_stable() {
        let list = vec![
            MediaEntry::new(60, "b", "/b").with_episode(2, 1),
            MediaEntry::new(60, "a1", "/a1").with_episode(1, 2),
            MediaEntry::new(60, "a0", "/a0").with_episode(1, 1),
            MediaEntry::new(60, "x", "/x").with_episode(1, 2),
        ];
        let out = run(&OrderAirDateRule, &NoSiblings, Stage::ListPost, Payload::List(list)).into_list();
        let titles: Vec<_> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["a0", "a1", "x", "b"]);
    }

    #[test]
    fn limit_duration_passes_unknown_durations() {
        let rule = LimitDurationRule { min_minutes: 20, max_minutes: 30 };
        let list = vec![
            MediaEntry::new(10 * 60, "short", "/s"),
            MediaEntry::new(25 * 60, "fits", "/f"),
            MediaEntry::new(30 * 60, "edge", "/e"),
            MediaEntry::new(90 * 60, "long", "/l"),
            MediaEntry::new(-1, "unknown", "/u"),
        ];
        let out = run(&rule, &NoSiblings, Stage::ListPost, Payload::List(list)).into_list();
        let titles: Vec<_> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["fits", "edge", "unknown"]);
    }

    #[test]
    fn plot_keywords_match_whole_words() {
        let rule = PlotKeywordRule::new(&["war", " Horror "]);
        let mut item = LibraryItem::new("/a.mkv");

        item.plot = "A story about the WAR at sea.".into();
        assert!(run(&rule, &NoSiblings, Stage::PerItem, Payload::Item(Some(item.clone()))).into_item().is_none());

        item.plot = "A warm family drama.".into();
        assert!(run(&rule, &NoSiblings, Stage::PerItem, Payload::Item(Some(item.clone()))).into_item().is_some());

        item.plot = "Pure horror.".into();
        assert!(run(&rule, &NoSiblings, Stage::PerItem, Payload::Item(Some(item))).into_item().is_none());
    }

    #[test]
    fn force_mode_sets_and_clears() {
        let mut channel = Channel::new(1, "One", ChannelKind::TvGenre);
        channel.mode = ChannelMode::RESUME;

        let on = ForceModeRule { flag: ModeFlag::AlwaysPause, enabled: true };
        let out = run(&on, &NoSiblings, Stage::BeforeTimeAdjust, Payload::Channel(Box::new(channel)));
        let channel = out.into_channel().unwrap();
        assert!(channel.mode.contains(ChannelMode::ALWAYS_PAUSE));

        let off = ForceModeRule { flag: ModeFlag::Resume, enabled: false };
        let out = run(&off, &NoSiblings, Stage::BeforeTimeAdjust, Payload::Channel(Box::new(channel)));
        assert!(!out.into_channel().unwrap().mode.contains(ChannelMode::RESUME));
    }
}
