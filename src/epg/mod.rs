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

//! Program guide generation.
//!
//! Works backwards from channel state to a schedule: for a window of time and
//! a handful of channels it produces the blocks that aired, are airing or will
//! air, each with its wall-clock extent and its extent in render columns.
//!
//! Nothing here mutates a channel. Rows are computed from snapshots taken out
//! of the registry, projected to the current time on the copy.
//!
//! # Organization
//!
//! * [`EpgGenerator::grid`] builds the rows around the tuned channel.
//! * [`EpgGenerator::locate`] answers "what is on at this moment", using the
//!   same arithmetic the rows are built with.
//! * [`EpgGenerator::jump_target`] turns a selected block into a position to
//!   tune to.

use tracing::warn;

use crate::{
    model::{Channel, MediaEntry},
    registry::ChannelRegistry,
    resolver::{self, fix_index, loop_period},
};

/// Guide geometry and limits.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EpgConfig {
    /// Number of channel rows.
    pub(crate) rows: usize,
    /// Width of the window, in seconds.
    pub(crate) span: i64,
    /// Window starts are aligned down to a multiple of this, in seconds.
    pub(crate) align: i64,
    pub(crate) min_block_width: u16,
    /// Items shorter than this are folded into the block before them, zero
    /// disables folding.
    pub(crate) coalesce_threshold: i64,
    /// Maximum number of items walked per row or lookup.
    pub(crate) iteration_bound: usize,
}

impl Default for EpgConfig {
    fn default() -> Self {
        Self {
            rows: 5,
            span: 90 * 60,
            align: 30 * 60,
            min_block_width: 1,
            coalesce_threshold: 0,
            iteration_bound: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockStatus {
    Scheduled,
    /// The channel is paused, the block covers the whole window.
    Paused,
    /// The schedule could not be worked out.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScheduleBlock {
    pub(crate) channel: u32,
    pub(crate) position: usize,
    pub(crate) entry: MediaEntry,
    /// Absolute start and end, epoch seconds.
    pub(crate) start: i64,
    pub(crate) end: i64,
    /// Column extent within the row.
    pub(crate) x: u16,
    pub(crate) width: u16,
    pub(crate) status: BlockStatus,
    /// Number of short items folded into this block.
    pub(crate) folded: usize,
}

impl ScheduleBlock {
    pub(crate) fn contains(&self, at: i64) -> bool {
        self.start <= at && at < self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EpgRow {
    pub(crate) channel: u32,
    pub(crate) name: String,
    pub(crate) blocks: Vec<ScheduleBlock>,
}

/// The item on a channel at a given moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Located {
    pub(crate) position: usize,
    /// Absolute start of the item.
    pub(crate) start: i64,
    pub(crate) offset: i64,
}

/// Where to put a channel when the user picks a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JumpTarget {
    pub(crate) channel: u32,
    pub(crate) position: usize,
    pub(crate) offset: i64,
}

/// Aligns a time down to the guide alignment.
pub(crate) fn window_start(now: i64, align: i64) -> i64 {
    if align <= 0 {
        return now;
    }
    now - now.rem_euclid(align)
}

pub(crate) struct EpgGenerator {
    config: EpgConfig,
}

impl EpgGenerator {
    pub(crate) fn new(config: EpgConfig) -> Self {
        Self { config }
    }

    pub(crate) fn config(&self) -> &EpgConfig {
        &self.config
    }

    /// Builds the guide rows centred on `center`, wrapping around the valid
    /// channels.
    ///
    /// # Arguments
    ///
    /// * `registry` - Source of channel snapshots.
    /// * `center` - The tuned channel.
    /// * `window_start` - Left edge of the window, epoch seconds.
    /// * `now` - The current time, used to project each channel.
    /// * `width` - Row width in columns.
    pub(crate) fn grid(
        &self,
        registry: &ChannelRegistry,
        center: u32,
        window_start: i64,
        now: i64,
        width: u16,
    ) -> Vec<EpgRow> {
        let valid = registry.valid_ids();
        if valid.is_empty() {
            return Vec::new();
        }

        let rows = self.config.rows.clamp(1, valid.len());
        let center_index = valid.iter().position(|id| *id == center).unwrap_or(0) as i64;
        let first = center_index - (rows as i64 - 1) / 2;

        (0..rows as i64)
            .map(|i| valid[fix_index(first + i, valid.len())])
            .filter_map(|id| registry.snapshot(id))
            .map(|channel| self.row(&channel, window_start, now, width))
            .collect()
    }

    /// Builds the guide row of one channel.
    pub(crate) fn row(&self, channel: &Channel, window_start: i64, now: i64, width: u16) -> EpgRow {
        let window_end = window_start + self.config.span;

        let blocks = if channel.is_paused {
            self.spanning_block(channel, window_start, width, BlockStatus::Paused)
        } else {
            match self.schedule(channel, window_start, window_end, now) {
                Some(spans) => {
                    let spans = self.fold(spans);
                    spans
                        .into_iter()
                        .map(|(position, start, end, folded)| {
                            let (x, w) = self.extent(start, end, window_start, width);
                            ScheduleBlock {
                                channel: channel.id,
                                position,
                                entry: channel.entries[position].clone(),
                                start,
                                end,
                                x,
                                width: w,
                                status: BlockStatus::Scheduled,
                                folded,
                            }
                        })
                        .collect()
                }
                None => self.spanning_block(channel, window_start, width, BlockStatus::Unavailable),
            }
        };

        EpgRow {
            channel: channel.id,
            name: channel.name.clone(),
            blocks,
        }
    }

    /// Item spans `(position, start, end, folded)` covering the window, or
    /// `None` when the walk is impossible or exceeds the iteration bound.
    fn schedule(&self, channel: &Channel, window_start: i64, window_end: i64, now: i64) -> Option<Vec<(usize, i64, i64, usize)>> {
        let entries = &channel.entries;
        if entries.is_empty() || loop_period(entries) == 0 {
            return None;
        }

        let projected = project(channel, now)?;
        let first = self.locate(&projected, window_start)?;

        let mut spans = Vec::new();
        let mut position = first.position;
        let mut start = first.start;
        let mut steps = 0;
        while start < window_end {
            steps += 1;
            if steps > self.config.iteration_bound {
                warn!(
                    "Channel {}: guide walk exceeded {} items",
                    channel.id, self.config.iteration_bound
                );
                return None;
            }

            let end = start + entries[position].play_duration();
            if end > start && end > window_start {
                spans.push((position, start, end, 0));
            }
            start = end;
            position = fix_index(position as i64 + 1, entries.len());
        }

        Some(spans)
    }

    /// Folds spans shorter than the threshold into the span before them.
    fn fold(&self, spans: Vec<(usize, i64, i64, usize)>) -> Vec<(usize, i64, i64, usize)> {
        let threshold = self.config.coalesce_threshold;
        if threshold <= 0 {
            return spans;
        }

        let mut folded: Vec<(usize, i64, i64, usize)> = Vec::with_capacity(spans.len());
        for span in spans {
            match folded.last_mut() {
                Some(previous) if span.2 - span.1 < threshold => {
                    previous.2 = span.2;
                    previous.3 += 1;
                }
                _ => folded.push(span),
            }
        }
        folded
    }

    fn spanning_block(&self, channel: &Channel, window_start: i64, width: u16, status: BlockStatus) -> Vec<ScheduleBlock> {
        let entry = channel
            .current()
            .cloned()
            .unwrap_or_else(|| MediaEntry::new(0, &channel.name, ""));
        vec![ScheduleBlock {
            channel: channel.id,
            position: channel.position,
            entry,
            start: window_start,
            end: window_start + self.config.span,
            x: 0,
            width,
            status,
            folded: 0,
        }]
    }

    /// Column extent of a span, clipped to the window and floored at the
    /// minimum block width.
    fn extent(&self, start: i64, end: i64, window_start: i64, width: u16) -> (u16, u16) {
        let span = self.config.span.max(1);
        let columns = i64::from(width);
        let to_column = |t: i64| ((t - window_start).clamp(0, span) * columns / span) as u16;

        let x = to_column(start);
        let x_end = to_column(end);
        let w = (x_end - x).max(self.config.min_block_width).min(width.saturating_sub(x));
        (x, w)
    }

    /// The item airing on `channel` at `at`, derived from its stored state.
    ///
    /// Paused channels stay on their current item. Returns `None` for an empty
    /// or zero-length loop, or when the walk exceeds the iteration bound.
    pub(crate) fn locate(&self, channel: &Channel, at: i64) -> Option<Located> {
        let entries = &channel.entries;
        let period = loop_period(entries);
        if entries.is_empty() || period == 0 {
            return None;
        }

        let position = fix_index(channel.position as i64, entries.len());
        if channel.is_paused {
            return Some(Located {
                position,
                start: at - channel.show_time_offset,
                offset: channel.show_time_offset,
            });
        }

        let mut position = position;
        let mut start = channel.current_start();

        if at < start {
            // Skip whole loops, then walk back item by item.
            start -= (start - at) / period * period;
            let mut steps = 0;
            while start > at {
                steps += 1;
                if steps > self.config.iteration_bound {
                    warn!(
                        "Channel {}: guide lookup exceeded {} items",
                        channel.id, self.config.iteration_bound
                    );
                    return None;
                }
                position = fix_index(position as i64 - 1, entries.len());
                start -= entries[position].play_duration();
            }
        }

        let resolution = resolver::advance(entries, position, 0, at - start).ok()?;
        Some(Located {
            position: resolution.position,
            start: at - resolution.offset,
            offset: resolution.offset,
        })
    }

    /// Turns a selected block into a tune target: the live offset if the block
    /// is airing at `now`, otherwise the start of the item. Blocks that stand
    /// for an unavailable schedule have no target.
    pub(crate) fn jump_target(&self, channel: &Channel, block: &ScheduleBlock, now: i64) -> Option<JumpTarget> {
        match block.status {
            BlockStatus::Unavailable => None,
            BlockStatus::Paused => Some(JumpTarget {
                channel: channel.id,
                position: channel.position,
                offset: channel.show_time_offset,
            }),
            BlockStatus::Scheduled => {
                let offset = if block.contains(now) { now - block.start } else { 0 };
                let entry = channel.entries.get(block.position)?;
                Some(JumpTarget {
                    channel: channel.id,
                    position: block.position,
                    offset: offset.min(entry.play_duration().saturating_sub(1).max(0)),
                })
            }
        }
    }
}

/// A copy of the channel with its state advanced to `now`.
fn project(channel: &Channel, now: i64) -> Option<Channel> {
    let resolution = match resolver::resolve(channel, now) {
        Ok(resolution) => resolution,
        Err(e) => {
            warn!("Channel {}: {}", channel.id, e);
            return None;
        }
    };

    let mut projected = channel.clone();
    if now >= channel.last_access_time {
        projected.position = resolution.position;
        projected.show_time_offset = resolution.offset;
        projected.last_access_time = now;
    }
    Some(projected)
}
