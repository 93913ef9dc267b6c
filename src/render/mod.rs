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

//! User interface rendering logic.
//!
//! This module handles the translation of the [`App`] state into visual
//! widgets using the `ratatui` framework.
//!
//! # Rendering Pipeline
//!
//! The primary entry point is the [`draw`] function, which is called after
//! every event to provide a reactive user interface.

mod commander;
mod guide;
mod icons;
mod player;

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
};

use crate::{
    App,
    render::{commander::draw_command_line, guide::draw_guide, player::draw_now_playing},
    util::time::{clock_label, now},
};

/// Renders the user interface to the terminal frame.
///
/// Top to bottom: a header with the clock, the guide, the now-playing panel
/// and the command line.
pub(crate) fn draw(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let now = now();

    f.render_widget(
        Block::default().style(Style::default().bg(app.theme.background_colour)),
        area,
    );

    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(6),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(f, outer[0], app, now);
    draw_guide(f, outer[1], app, now);
    draw_now_playing(f, outer[2], app);
    draw_command_line(f, outer[3], app);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App, now: i64) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(7)])
        .horizontal_margin(1)
        .split(area);

    let title = Line::from(vec![
        Span::styled("chootv", Style::default().add_modifier(Modifier::BOLD).fg(app.theme.accent_colour)),
        Span::styled(
            format!("  {} channels", app.controller.registry().valid_ids().len()),
            Style::default().fg(app.theme.guide_time_fg),
        ),
    ]);
    f.render_widget(Paragraph::new(title), chunks[0]);

    f.render_widget(
        Paragraph::new(clock_label(now))
            .alignment(Alignment::Right)
            .style(Style::default().fg(app.theme.accent_colour)),
        chunks[1],
    );
}
