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

//! Render the now playing panel.
//!
//! Shows what the tuned channel is airing, how far into it the schedule is,
//! and whatever the catalog knows about the item.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Padding, Paragraph},
};

use crate::{
    App,
    model::{LibraryItem, MediaEntry},
    player::PlayerState,
    render::icons::{ICON_PAUSE, ICON_PLAY, ICON_STOP},
    util::format::{fit, format_duration},
};

/// Renders the now playing widget for the tuned channel.
pub(crate) fn draw_now_playing(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::TOP | Borders::BOTTOM)
        .border_style(Style::default().fg(app.theme.border_colour))
        .padding(Padding::horizontal(1));

    let inner_area = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner_area);

    let info_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(30)])
        .split(chunks[0]);

    let Some(now_playing) = &app.now_playing else {
        f.render_widget(
            Paragraph::new("No channel tuned").fg(app.theme.guide_time_fg),
            info_chunks[0],
        );
        return;
    };

    let icon = if now_playing.is_paused {
        ICON_PAUSE
    } else {
        match app.player_state {
            PlayerState::Playing => ICON_PLAY,
            PlayerState::Stopped => ICON_STOP,
        }
    };

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let entry = &now_playing.entry;
    let mut title_line = vec![
        Span::styled(format!(" {} ", icon), bold).fg(Color::White),
        Span::styled(format!("{} {}", now_playing.channel, now_playing.name), bold).fg(app.theme.guide_channel_fg),
        Span::raw("  "),
        Span::styled(entry.title.as_str(), bold).fg(app.theme.accent_colour),
    ];
    if !entry.subtitle.is_empty() {
        title_line.push(Span::raw(" - "));
        title_line.push(Span::styled(entry.subtitle.as_str(), bold).fg(Color::White));
    }
    f.render_widget(Paragraph::new(Line::from(title_line)), info_chunks[0]);

    let remaining = (entry.duration - now_playing.offset).max(0);
    let time_line = Line::from(vec![
        Span::styled(format_duration(now_playing.offset), bold).fg(app.theme.accent_colour),
        Span::styled(" / ", bold).fg(Color::White),
        Span::styled(format_duration(entry.duration), bold).fg(app.theme.accent_colour),
        Span::styled(" (-", bold).fg(Color::White),
        Span::styled(format_duration(remaining), bold).fg(app.theme.accent_colour),
        Span::styled(")", bold).fg(Color::White),
    ]);
    f.render_widget(Paragraph::new(time_line).alignment(Alignment::Right), info_chunks[1]);

    let about = describe(entry, app.details.as_ref());
    f.render_widget(
        Paragraph::new(fit(&about, chunks[1].width as usize)).fg(app.theme.guide_time_fg),
        chunks[1],
    );

    let position_gauge = Gauge::default()
        .gauge_style(
            Style::default()
                .fg(app.theme.accent_colour)
                .bg(app.theme.gauge_track_colour),
        )
        .ratio(progress(now_playing.offset, entry.duration))
        .label("")
        .use_unicode(true);
    f.render_widget(position_gauge, chunks[3]);
}

/// The description line: the entry's own text, else what the catalog has.
fn describe(entry: &MediaEntry, details: Option<&LibraryItem>) -> String {
    if !entry.description.is_empty() {
        return entry.description.replace('\n', " ");
    }

    let Some(item) = details.filter(|item| item.path == entry.source_path) else {
        return String::new();
    };
    let mut parts = Vec::new();
    if !item.plot.is_empty() {
        parts.push(item.plot.replace('\n', " "));
    }
    if !item.artist.is_empty() {
        parts.push(item.artist.clone());
    }
    if !item.genre.is_empty() {
        parts.push(format!("[{}]", item.genre));
    }
    parts.join("  ")
}

fn progress(offset: i64, duration: i64) -> f64 {
    if duration <= 0 {
        return 0.0;
    }
    (offset as f64 / duration as f64).clamp(0.0, 1.0)
}
