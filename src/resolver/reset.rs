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

//! Reset policies.
//!
//! Decides, before a channel is loaded, whether its existing list should be
//! thrown away and rebuilt.

use std::fmt;

use chrono::{DateTime, Months};

const DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ResetPolicy {
    #[default]
    Never,
    Daily,
    Weekly,
    Monthly,
    /// Rebuild only once the whole loop has been watched.
    OnlyIfWatched,
}

impl ResetPolicy {
    /// Maps the numeric selector used in the configuration file. Unknown
    /// values mean [`ResetPolicy::Never`].
    pub(crate) fn from_selector(selector: u8) -> Self {
        match selector {
            1 => ResetPolicy::Daily,
            2 => ResetPolicy::Weekly,
            3 => ResetPolicy::Monthly,
            4 => ResetPolicy::OnlyIfWatched,
            _ => ResetPolicy::Never,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RebuildReason {
    FirstRun,
    Forced,
    Changed,
    Expired,
    Watched,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RebuildReason::FirstRun => "no existing list",
            RebuildReason::Forced => "reset forced",
            RebuildReason::Changed => "channel changed",
            RebuildReason::Expired => "reset interval expired",
            RebuildReason::Watched => "list fully watched",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ResetInputs {
    pub(crate) policy: ResetPolicy,
    pub(crate) force_reset: bool,
    pub(crate) changed: bool,
    pub(crate) has_list: bool,
    pub(crate) last_reset_time: i64,
    pub(crate) now: i64,
    pub(crate) total_time_played: i64,
    /// Loop period of the existing list. It may be stale if the library
    /// changed since the list was built.
    pub(crate) loop_period: i64,
}

/// Returns why the channel should be rebuilt, or `None` to keep its list.
pub(crate) fn should_rebuild(inputs: &ResetInputs) -> Option<RebuildReason> {
    if !inputs.has_list {
        return Some(RebuildReason::FirstRun);
    }
    if inputs.force_reset {
        return Some(RebuildReason::Forced);
    }
    if inputs.changed {
        return Some(RebuildReason::Changed);
    }

    let since_reset = inputs.now - inputs.last_reset_time;
    match inputs.policy {
        ResetPolicy::Never => None,
        ResetPolicy::Daily => (since_reset >= DAY).then_some(RebuildReason::Expired),
        ResetPolicy::Weekly => (since_reset >= 7 * DAY).then_some(RebuildReason::Expired),
        ResetPolicy::Monthly => {
            let due = DateTime::from_timestamp(inputs.last_reset_time, 0)
                .and_then(|last| last.checked_add_months(Months::new(1)))
                .map(|due| due.timestamp());
            match due {
                Some(due) if inputs.now >= due => Some(RebuildReason::Expired),
                Some(_) => None,
                None => Some(RebuildReason::Expired),
            }
        }
        ResetPolicy::OnlyIfWatched => {
            (inputs.total_time_played >= inputs.loop_period).then_some(RebuildReason::Watched)
        }
    }
}
