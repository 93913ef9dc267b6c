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

//! Ordered rule invocation.
//!
//! The pipeline runs a channel's rules in order at a given [`Stage`]. A rule
//! that fails is logged and its effect discarded: the payload reverts to what
//! it was before that rule ran and the next rule carries on from there. The
//! failing rule stays in place and runs again at the next stage or build.

use tracing::{trace, warn};

use crate::{
    error::EngineError,
    model::Channel,
    rules::{Payload, Rule, RuleContext, Stage},
};

pub(crate) struct RulePipeline<'r> {
    rules: &'r [Rule],
}

impl<'r> RulePipeline<'r> {
    pub(crate) fn new(rules: &'r [Rule]) -> Self {
        Self { rules }
    }

    /// Runs every participating rule at `stage`, threading the payload from
    /// one rule to the next.
    pub(crate) fn run(&self, stage: Stage, ctx: &mut RuleContext, payload: Payload) -> Payload {
        let mut payload = payload;

        for rule in self.rules {
            if payload.is_dropped() {
                break;
            }
            if !rule.participates(stage, ctx.kind) {
                continue;
            }

            let snapshot = payload.clone();
            payload = match rule.apply(stage, ctx, payload) {
                Ok(next) => next,
                Err(e) => {
                    let failure = EngineError::RuleFailure {
                        rule: rule.id().to_string(),
                        reason: e.to_string(),
                    };
                    warn!("Channel {}: {} at {:?}", ctx.channel_id, failure, stage);
                    snapshot
                }
            };

            trace!("Channel {}: rule '{}' ran at {:?}", ctx.channel_id, rule.id(), stage);
        }

        payload
    }

    /// Runs a lifecycle stage over a channel.
    pub(crate) fn run_channel(&self, stage: Stage, ctx: &mut RuleContext, channel: Channel) -> Channel {
        let fallback = channel.clone();
        self.run(stage, ctx, Payload::Channel(Box::new(channel)))
            .into_channel()
            .unwrap_or(fallback)
    }
}
