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

//! Guide view state.
//!
//! Tracks which channel the guide is centred on, the time window it shows and
//! a time cursor that selects a block in the centre row. While the guide
//! follows the clock, the window and cursor move with time.

use crate::{
    epg::{self, EpgGenerator, EpgRow, JumpTarget, ScheduleBlock},
    registry::ChannelRegistry,
};

pub(crate) struct GuideView {
    pub(crate) center: u32,
    pub(crate) window_start: i64,
    pub(crate) rows: Vec<EpgRow>,
    cursor: i64,
    follow: bool,
}

impl GuideView {
    pub(crate) fn new(center: u32, now: i64) -> Self {
        Self {
            center,
            window_start: now,
            rows: Vec::new(),
            cursor: now,
            follow: true,
        }
    }

    /// Rebuilds the rows for the current window.
    pub(crate) fn refresh(&mut self, generator: &EpgGenerator, registry: &ChannelRegistry, now: i64, width: u16) {
        if self.follow {
            self.cursor = now;
            self.window_start = epg::window_start(now, generator.config().align);
        }
        self.rows = generator.grid(registry, self.center, self.window_start, now, width);
    }

    /// Returns to the live window, centred on `tuned`.
    pub(crate) fn reset(&mut self, tuned: u32) {
        self.center = tuned;
        self.follow = true;
    }

    pub(crate) fn center_row(&self) -> Option<&EpgRow> {
        self.rows
            .iter()
            .find(|row| row.channel == self.center)
            .or_else(|| self.rows.get(self.rows.len().saturating_sub(1) / 2))
    }

    /// The block under the cursor in the centre row.
    pub(crate) fn selected_block(&self) -> Option<&ScheduleBlock> {
        let blocks = &self.center_row()?.blocks;
        blocks
            .iter()
            .find(|b| b.contains(self.cursor))
            .or_else(|| blocks.iter().rev().find(|b| b.start <= self.cursor))
            .or_else(|| blocks.first())
    }

    pub(crate) fn next_channel(&mut self, registry: &ChannelRegistry) {
        if let Some(id) = registry.step_valid(self.center, 1) {
            self.center = id;
        }
    }

    pub(crate) fn previous_channel(&mut self, registry: &ChannelRegistry) {
        if let Some(id) = registry.step_valid(self.center, -1) {
            self.center = id;
        }
    }

    /// Moves the cursor to the following block, paging when it leaves the
    /// window.
    pub(crate) fn next_block(&mut self, generator: &EpgGenerator) {
        let Some(block) = self.selected_block() else {
            return;
        };
        self.move_cursor(block.end.max(self.cursor + 1), generator);
    }

    pub(crate) fn previous_block(&mut self, generator: &EpgGenerator) {
        let Some(block) = self.selected_block() else {
            return;
        };
        self.move_cursor(block.start.min(self.cursor) - 1, generator);
    }

    /// Moves the window by whole spans, forwards when `pages` is positive.
    pub(crate) fn page(&mut self, pages: i64, generator: &EpgGenerator) {
        let shift = generator.config().span * pages;
        self.follow = false;
        self.window_start += shift;
        self.cursor += shift;
    }

    fn move_cursor(&mut self, cursor: i64, generator: &EpgGenerator) {
        let config = generator.config();
        self.follow = false;
        self.cursor = cursor;
        if cursor < self.window_start || cursor >= self.window_start + config.span {
            self.window_start = epg::window_start(cursor, config.align);
        }
    }

    /// The tune target for the selected block.
    pub(crate) fn jump_target(&self, generator: &EpgGenerator, registry: &ChannelRegistry, now: i64) -> Option<JumpTarget> {
        let block = self.selected_block()?;
        let channel = registry.snapshot(block.channel)?;
        generator.jump_target(&channel, block, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        epg::EpgConfig,
        model::{Channel, ChannelKind, MediaEntry},
    };

    // 2026-01-31 00:00:00 UTC
    const BASE: i64 = 1_769_817_600;

    fn registry() -> ChannelRegistry {
        let channels = (1..=3)
            .map(|id| {
                let mut channel = Channel::new(id, &format!("C{}", id), ChannelKind::MovieGenre);
                let entries = (0..4)
                    .map(|i| MediaEntry::new(1_800, &format!("Film {}", i), &format!("/{}", i)))
                    .collect();
                channel.install(entries, BASE);
                channel
            })
            .collect();
        ChannelRegistry::new(channels)
    }

    #[test]
    fn live_guide_selects_what_is_on_now() {
        let registry = registry();
        let generator = EpgGenerator::new(EpgConfig::default());
        let mut guide = GuideView::new(2, BASE);

        guide.refresh(&generator, &registry, BASE + 2_000, 90);
        assert_eq!(guide.window_start, BASE + 1_800);
        assert_eq!(guide.center_row().unwrap().channel, 2);
        let block = guide.selected_block().unwrap();
        assert_eq!(block.position, 1);

        let target = guide.jump_target(&generator, &registry, BASE + 2_000).unwrap();
        assert_eq!(target.channel, 2);
        assert_eq!(target.offset, 200);
    }

    #[test]
    fn cursor_walks_blocks_and_pages_the_window() {
        let registry = registry();
        let generator = EpgGenerator::new(EpgConfig::default());
        let mut guide = GuideView::new(1, BASE);
        guide.refresh(&generator, &registry, BASE, 90);

        for _ in 0..3 {
            guide.next_block(&generator);
            guide.refresh(&generator, &registry, BASE, 90);
        }
        // Past the 90 minute window, so it moved on.
        assert_eq!(guide.window_start, BASE + 5_400);
        assert_eq!(guide.selected_block().unwrap().position, 3);

        guide.previous_block(&generator);
        guide.refresh(&generator, &registry, BASE, 90);
        assert_eq!(guide.window_start, BASE + 3_600);
        assert_eq!(guide.selected_block().unwrap().position, 2);

        guide.page(-1, &generator);
        assert_eq!(guide.window_start, BASE - 1_800);

        guide.reset(3);
        guide.refresh(&generator, &registry, BASE + 60, 90);
        assert_eq!(guide.window_start, BASE);
        assert_eq!(guide.center_row().unwrap().channel, 3);
    }

    #[test]
    fn channel_moves_wrap() {
        let registry = registry();
        let mut guide = GuideView::new(3, BASE);
        guide.next_channel(&registry);
        assert_eq!(guide.center, 1);
        guide.previous_channel(&registry);
        assert_eq!(guide.center, 3);
    }
}
