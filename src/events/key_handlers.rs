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

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent};

use crate::{App, events::AppEvent};

/// Maps keyboard input to guide navigation and channel actions.
///
/// The command line gets the first look at every key. Otherwise:
///
/// * **Guide**: up/down move between channels, left/right between programmes,
///   `[`/`]` page through time and `g` returns to the live window.
/// * **Channels**: `Enter` tunes to the selected programme, `+`/`-` change
///   channel and space pauses the tuned channel.
/// * **Player**: `w` watches the tuned channel, `s` stops the player.
///
/// # Errors
///
/// Returns an error if an event or task cannot be sent.
pub(super) fn process_key_event(app: &mut App, key: KeyEvent) -> Result<()> {
    let event = Event::Key(key);
    if app.commander.handle_event(&event, &app.task_tx, &app.event_tx)? {
        return Ok(());
    }

    match key.code {
        KeyCode::Char('q') => app.event_tx.send(AppEvent::ExitApplication)?,

        KeyCode::Char('k') | KeyCode::Up => app.guide.previous_channel(app.controller.registry()),
        KeyCode::Char('j') | KeyCode::Down => app.guide.next_channel(app.controller.registry()),
        KeyCode::Char('h') | KeyCode::Left => app.guide.previous_block(&app.epg),
        KeyCode::Char('l') | KeyCode::Right => app.guide.next_block(&app.epg),
        KeyCode::Char('[') | KeyCode::PageUp => app.guide.page(-1, &app.epg),
        KeyCode::Char(']') | KeyCode::PageDown => app.guide.page(1, &app.epg),
        KeyCode::Char('g') => app.guide.reset(app.controller.tuned()),

        KeyCode::Enter => app.event_tx.send(AppEvent::JumpToSelection)?,
        KeyCode::Char('+') | KeyCode::Char('=') => app.event_tx.send(AppEvent::ChannelUp)?,
        KeyCode::Char('-') => app.event_tx.send(AppEvent::ChannelDown)?,
        KeyCode::Char(' ') => app.event_tx.send(AppEvent::TogglePause)?,

        KeyCode::Char('w') => app.event_tx.send(AppEvent::Watch)?,
        KeyCode::Char('s') => {
            app.player.stop();
            app.watching = None;
        }

        _ => {}
    }

    Ok(())
}
