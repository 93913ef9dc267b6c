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

//! Render the programme guide.
//!
//! One line per channel: the channel label, then the row's blocks laid out at
//! the columns the guide generator computed. A time ruler runs along the top.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph},
};

use crate::{
    App,
    epg::{BlockStatus, EpgRow, ScheduleBlock},
    render::icons::{ICON_BLOCK_EDGE, ICON_UNAVAILABLE},
    theme::Theme,
    util::{format::fit, time::clock_label},
};

const LABEL_WIDTH: u16 = 18;

pub(crate) fn draw_guide(f: &mut Frame, area: Rect, app: &mut App, now: i64) {
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(app.theme.border_colour))
        .padding(Padding::horizontal(1));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(LABEL_WIDTH), Constraint::Min(0)])
        .split(inner);

    // The generator lays rows out for a width, so a resize means a rebuild.
    let width = columns[1].width;
    if width != app.guide_width {
        app.guide_width = width;
        app.guide
            .refresh(&app.epg, app.controller.registry(), now, width);
    }

    let mut lines = vec![(
        Line::raw(""),
        Line::styled(
            ruler(app.guide.window_start, app.epg.config().span, app.epg.config().align, width),
            Style::default().fg(app.theme.guide_time_fg),
        ),
    )];

    let selected = app.guide.selected_block().map(|b| (b.channel, b.start));
    for row in &app.guide.rows {
        let label_style = if row.channel == app.controller.tuned() {
            Style::default().fg(app.theme.accent_colour).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(app.theme.guide_channel_fg)
        };
        let label = fit(&format!("{:>3} {}", row.channel, row.name), LABEL_WIDTH as usize - 1);
        lines.push((Line::styled(label, label_style), row_line(row, selected, now, width, &app.theme)));
    }

    let (labels, rows): (Vec<_>, Vec<_>) = lines.into_iter().unzip();
    f.render_widget(Paragraph::new(labels), columns[0]);
    f.render_widget(Paragraph::new(rows), columns[1]);
}

/// Time labels at every alignment step of the window.
fn ruler(window_start: i64, span: i64, align: i64, width: u16) -> String {
    let width = width as usize;
    let mut ruler = vec![' '; width];
    if span <= 0 || align <= 0 {
        return String::new();
    }

    let mut at = window_start;
    while at < window_start + span {
        let x = ((at - window_start) * width as i64 / span) as usize;
        for (i, c) in clock_label(at).chars().enumerate() {
            if let Some(slot) = ruler.get_mut(x + i) {
                *slot = c;
            }
        }
        at += align;
    }

    ruler.into_iter().collect()
}

fn row_line(
    row: &EpgRow,
    selected: Option<(u32, i64)>,
    now: i64,
    width: u16,
    theme: &Theme,
) -> Line<'static> {
    let mut spans = Vec::with_capacity(row.blocks.len() * 2);
    let mut column: u16 = 0;

    for block in &row.blocks {
        if block.x > column {
            spans.push(Span::raw(" ".repeat((block.x - column) as usize)));
        }
        if block.width == 0 {
            continue;
        }

        let is_selected = selected == Some((block.channel, block.start));
        spans.push(Span::styled(
            fit_to(&block_text(block), block.width as usize),
            block_style(block, is_selected, now, theme),
        ));
        column = block.x + block.width;
    }

    if column < width {
        spans.push(Span::raw(" ".repeat((width - column) as usize)));
    }
    Line::from(spans)
}

fn block_text(block: &ScheduleBlock) -> String {
    match block.status {
        BlockStatus::Unavailable => format!("{}{} Unavailable", ICON_BLOCK_EDGE, ICON_UNAVAILABLE),
        BlockStatus::Paused => format!("{}Paused: {}", ICON_BLOCK_EDGE, block.entry.title),
        BlockStatus::Scheduled if block.folded > 0 => {
            format!("{}{} +{}", ICON_BLOCK_EDGE, block.entry.title, block.folded)
        }
        BlockStatus::Scheduled => format!("{}{}", ICON_BLOCK_EDGE, block.entry.title),
    }
}

/// Fits text to exactly `width` characters, padding with spaces.
fn fit_to(text: &str, width: usize) -> String {
    let fitted = fit(text, width);
    let len = fitted.chars().count();
    format!("{}{}", fitted, " ".repeat(width.saturating_sub(len)))
}

fn block_style(block: &ScheduleBlock, is_selected: bool, now: i64, theme: &Theme) -> Style {
    let style = Style::default().fg(theme.guide_block_fg).bg(theme.guide_block_bg);
    let style = match block.status {
        BlockStatus::Unavailable => style.fg(theme.guide_unavailable_fg),
        BlockStatus::Paused => style.fg(theme.guide_paused_fg),
        BlockStatus::Scheduled if block.contains(now) => style.bg(theme.guide_airing_bg),
        BlockStatus::Scheduled => style,
    };

    if is_selected {
        style.bg(theme.guide_selected_bg).add_modifier(Modifier::BOLD)
    } else {
        style
    }
}
