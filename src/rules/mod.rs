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

//! Channel rules.
//!
//! Rules shape what goes into a channel and how it is ordered. Each rule
//! declares the pipeline [`Stage`]s it takes part in and the channel kinds it
//! is compatible with. The [`pipeline`] invokes matching rules in order, each
//! one seeing the output of the rules before it.
//!
//! # Organization
//!
//! * [`builtin`]: The concrete rule implementations.
//! * [`persist`]: Loading rules from, and writing them back to, the
//!   configuration file.
//! * [`pipeline`]: Ordered rule invocation with failure isolation.

pub(crate) mod builtin;
pub(crate) mod persist;
pub(crate) mod pipeline;

pub(crate) use persist::RuleConfig;
pub(crate) use pipeline::RulePipeline;

use rand::RngCore;
use thiserror::Error;

use crate::{
    config::EngineConfig,
    model::{Channel, ChannelKind, LibraryItem, MediaEntry},
};

use builtin::{
    DisableChannelRule, ExcludeNameRule, ForceModeRule, InterleaveRule, LimitDurationRule,
    OrderAirDateRule, PlotKeywordRule, RenameRule, WatchedRule,
};

/// Named points in channel construction and lifecycle where rules may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub(crate) enum Stage {
    Start = 1,
    PerItem = 1 << 1,
    ListPost = 1 << 2,
    BeforeClearHistory = 1 << 3,
    BeforeTimeAdjust = 1 << 4,
    FinalBuilt = 1 << 5,
    FinalLoaded = 1 << 6,
    OnTune = 1 << 7,
    OnTuneEnd = 1 << 8,
}

/// Bitmask of [`Stage`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StageSet(u16);

impl StageSet {
    pub(crate) const fn of(stages: &[Stage]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < stages.len() {
            bits |= stages[i] as u16;
            i += 1;
        }
        StageSet(bits)
    }

    pub(crate) fn contains(self, stage: Stage) -> bool {
        self.0 & stage as u16 != 0
    }
}

/// Bitmask of [`ChannelKind`]s a rule is compatible with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KindSet(u8);

impl KindSet {
    pub(crate) const ALL: KindSet = KindSet(0b1111);

    pub(crate) const fn only(kind: ChannelKind) -> Self {
        KindSet(kind.bit())
    }

    pub(crate) fn contains(self, kind: ChannelKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

/// The data handed to a rule, its shape depends on the stage.
#[derive(Debug, Clone)]
pub(crate) enum Payload {
    /// A single library record, `None` once a rule has dropped it.
    Item(Option<LibraryItem>),
    /// The whole candidate list.
    List(Vec<MediaEntry>),
    /// The channel itself, for lifecycle stages.
    Channel(Box<Channel>),
}

impl Payload {
    pub(crate) fn into_item(self) -> Option<LibraryItem> {
        match self {
            Payload::Item(item) => item,
            _ => None,
        }
    }

    pub(crate) fn into_list(self) -> Vec<MediaEntry> {
        match self {
            Payload::List(list) => list,
            _ => Vec::new(),
        }
    }

    pub(crate) fn into_channel(self) -> Option<Channel> {
        match self {
            Payload::Channel(channel) => Some(*channel),
            _ => None,
        }
    }

    fn is_dropped(&self) -> bool {
        matches!(self, Payload::Item(None))
    }
}

/// Narrow view onto the other channels of the registry.
pub(crate) trait SiblingLists {
    /// Number of configured channel slots.
    fn channel_count(&self) -> usize;

    /// The built entries of a channel, building it first if needed. Returns
    /// `None` when the channel does not exist or cannot be built.
    fn built_entries(&self, channel_id: u32) -> Option<Vec<MediaEntry>>;
}

/// A [`SiblingLists`] with no other channels.
pub(crate) struct NoSiblings;

impl SiblingLists for NoSiblings {
    fn channel_count(&self) -> usize {
        0
    }

    fn built_entries(&self, _channel_id: u32) -> Option<Vec<MediaEntry>> {
        None
    }
}

/// Everything a rule may consult while it runs.
pub(crate) struct RuleContext<'a> {
    pub(crate) channel_id: u32,
    pub(crate) kind: ChannelKind,
    pub(crate) config: &'a EngineConfig,
    pub(crate) siblings: &'a dyn SiblingLists,
    pub(crate) rng: &'a mut dyn RngCore,
}

#[derive(Error, Debug)]
pub(crate) enum RuleError {
    #[error("unexpected payload for stage {0:?}")]
    UnexpectedPayload(Stage),
}

/// The capability shared by all rules.
pub(crate) trait ChannelRule {
    /// Stable identifier used in the configuration file.
    fn id(&self) -> &'static str;

    fn stages(&self) -> StageSet;

    fn kinds(&self) -> KindSet {
        KindSet::ALL
    }

    fn apply(
        &self,
        stage: Stage,
        ctx: &mut RuleContext,
        payload: Payload,
    ) -> Result<Payload, RuleError>;

    /// Option values in the positional order used by the configuration file.
    fn options(&self) -> Vec<String>;
}

/// The closed set of rules a channel may carry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Rule {
    Rename(RenameRule),
    ExcludeName(ExcludeNameRule),
    Watched(WatchedRule),
    DisableChannel(DisableChannelRule),
    Interleave(InterleaveRule),
    OrderAirDate(OrderAirDateRule),
    LimitDuration(LimitDurationRule),
    PlotKeyword(PlotKeywordRule),
    ForceMode(ForceModeRule),
}

impl Rule {
    fn as_rule(&self) -> &dyn ChannelRule {
        match self {
            Rule::Rename(rule) => rule,
            Rule::ExcludeName(rule) => rule,
            Rule::Watched(rule) => rule,
            Rule::DisableChannel(rule) => rule,
            Rule::Interleave(rule) => rule,
            Rule::OrderAirDate(rule) => rule,
            Rule::LimitDuration(rule) => rule,
            Rule::PlotKeyword(rule) => rule,
            Rule::ForceMode(rule) => rule,
        }
    }

    pub(crate) fn id(&self) -> &'static str {
        self.as_rule().id()
    }

    /// Whether the rule runs at `stage` on a channel of the given kind.
    pub(crate) fn participates(&self, stage: Stage, kind: ChannelKind) -> bool {
        let rule = self.as_rule();
        rule.stages().contains(stage) && rule.kinds().contains(kind)
    }

    pub(crate) fn apply(
        &self,
        stage: Stage,
        ctx: &mut RuleContext,
        payload: Payload,
    ) -> Result<Payload, RuleError> {
        self.as_rule().apply(stage, ctx, payload)
    }

    pub(crate) fn options(&self) -> Vec<String> {
        self.as_rule().options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_sets_match_members_only() {
        let set = StageSet::of(&[Stage::PerItem, Stage::ListPost]);
        assert!(set.contains(Stage::PerItem));
        assert!(set.contains(Stage::ListPost));
        assert!(!set.contains(Stage::FinalBuilt));
        assert!(!StageSet::of(&[]).contains(Stage::Start));
    }

    #[test]
    fn kind_sets() {
        let tv = KindSet::only(ChannelKind::TvGenre);
        assert!(tv.contains(ChannelKind::TvGenre));
        assert!(!tv.contains(ChannelKind::MovieGenre));
        assert!(ChannelKind::ALL.iter().all(|k| KindSet::ALL.contains(*k)));
    }

    #[test]
    fn order_by_air_date_only_participates_on_tv() {
        let rule = Rule::OrderAirDate(OrderAirDateRule);
        assert!(rule.participates(Stage::ListPost, ChannelKind::TvGenre));
        assert!(!rule.participates(Stage::ListPost, ChannelKind::MovieGenre));
        assert!(!rule.participates(Stage::PerItem, ChannelKind::TvGenre));
    }
}
