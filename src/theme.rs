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

//! Visual styling and colour configuration for the TUI.

use ratatui::style::Color;

#[derive(Clone, Copy)]
pub(crate) struct Theme {
    pub(crate) background_colour: Color,
    pub(crate) accent_colour: Color,
    pub(crate) border_colour: Color,
    pub(crate) gauge_track_colour: Color,
    pub(crate) commander_colour: Color,
    pub(crate) error_colour: Color,

    pub(crate) guide_time_fg: Color,
    pub(crate) guide_channel_fg: Color,
    pub(crate) guide_block_fg: Color,
    pub(crate) guide_block_bg: Color,
    pub(crate) guide_airing_bg: Color,
    pub(crate) guide_selected_bg: Color,
    pub(crate) guide_paused_fg: Color,
    pub(crate) guide_unavailable_fg: Color,
}

impl Default for Theme {
    // Returns the standard application theme.
    fn default() -> Self {
        Self::default_theme()
    }
}

impl Theme {
    pub(crate) const fn default_theme() -> Self {
        Self {
            background_colour: Color::Rgb(40, 20, 50),
            accent_colour: Color::Rgb(250, 189, 47),
            border_colour: Color::Rgb(102, 102, 102),
            gauge_track_colour: Color::Rgb(50, 30, 60),
            commander_colour: Color::Rgb(255, 255, 255),
            error_colour: Color::Rgb(239, 83, 80),

            guide_time_fg: Color::Rgb(162, 161, 166),
            guide_channel_fg: Color::Rgb(255, 215, 0),
            guide_block_fg: Color::Rgb(255, 255, 255),
            guide_block_bg: Color::Rgb(60, 40, 75),
            guide_airing_bg: Color::Rgb(85, 55, 105),
            guide_selected_bg: Color::Rgb(179, 157, 219),
            guide_paused_fg: Color::Rgb(162, 161, 166),
            guide_unavailable_fg: Color::Rgb(120, 120, 120),
        }
    }
}
