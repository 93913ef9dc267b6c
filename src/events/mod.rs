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

//! Application events and the main event loop.
//!
//! # Organization
//!
//! * [`AppEvent`]: keyboard input, clock ticks, requests from the command line
//!   and reports from the maintenance worker.
//! * `handlers`: one function per event.
//! * `key_handlers`: maps keys to guide navigation and channel actions.

mod handlers;
mod key_handlers;

use handlers::*;
use key_handlers::process_key_event;

use std::io::Stdout;

use anyhow::Result;
use crossterm::event::KeyEvent;
use ratatui::{Terminal, prelude::CrosstermBackend};

use crate::{App, controller::NowPlaying, render::draw, util::time::now};

#[derive(Debug)]
pub(crate) enum AppEvent {
    Key(KeyEvent),
    Tick,

    TuneTo(u32),
    ChannelUp,
    ChannelDown,
    JumpToSelection,
    TogglePause,
    Watch,

    ChannelReady(u32),
    ChannelFailed(String),
    ScanStarted,
    ScanFinished(i64),

    ExitApplication,
    Error(String),
}

/// One airing of an item. The same item on the next loop is a new airing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Airing {
    channel: u32,
    position: usize,
    start: i64,
}

impl Airing {
    pub(crate) fn of(playing: &NowPlaying, now: i64) -> Self {
        Self {
            channel: playing.channel,
            position: playing.position,
            start: now - playing.offset,
        }
    }
}

/// Set while the user watches the tuned channel in the external player.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Watching {
    pub(crate) airing: Airing,
    /// The player already stopped early once during this airing.
    pub(crate) restarted: bool,
}

/// Runs the main application loop, handling events and rendering the UI in the
/// terminal.
///
/// This function loops until a 'quit' event is received or the event channel
/// is closed.
pub(crate) fn process_events(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
) -> Result<()> {
    refresh_view(app, now());
    terminal.draw(|f| draw(f, app))?;

    while let Ok(event) = app.event_rx.recv() {
        if matches!(event, AppEvent::ExitApplication) {
            break;
        }

        match event {
            AppEvent::Key(key) => process_key_event(app, key)?,
            AppEvent::Tick => handle_tick(app),
            AppEvent::TuneTo(id) => handle_tune(app, id)?,
            AppEvent::ChannelUp => handle_channel_step(app, 1)?,
            AppEvent::ChannelDown => handle_channel_step(app, -1)?,
            AppEvent::JumpToSelection => handle_jump(app)?,
            AppEvent::TogglePause => handle_toggle_pause(app),
            AppEvent::Watch => handle_watch(app)?,
            AppEvent::ChannelReady(id) => handle_channel_ready(app, id)?,
            AppEvent::ChannelFailed(message) => handle_error(app, message),
            AppEvent::ScanStarted => handle_scan_started(app),
            AppEvent::ScanFinished(count) => handle_scan_finished(app, count),
            AppEvent::Error(message) => handle_error(app, message),
            AppEvent::ExitApplication => {}
        }

        refresh_view(app, now());
        terminal.draw(|f| draw(f, app))?;
    }
    Ok(())
}
