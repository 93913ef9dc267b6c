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
use tracing::{debug, warn};

use crate::{
    App, Status,
    controller::NowPlaying,
    db,
    events::{Airing, Watching},
    player::PlayerState,
    tasks::MaintenanceTask,
    util::time::now,
};

/// Brings the now-playing panel and the guide up to date.
pub(super) fn refresh_view(app: &mut App, now: i64) {
    app.now_playing = app.controller.now_playing(now);
    app.player_state = app.player.state();
    app.guide
        .refresh(&app.epg, app.controller.registry(), now, app.guide_width);
}

#[derive(Debug, PartialEq, Eq)]
enum Relaunch {
    No,
    NextAiring,
    Restart,
}

/// Whether the player has to be started again to follow the schedule.
///
/// A new airing always relaunches. A player that stopped on its own during
/// the current airing is restarted once.
fn relaunch(watching: &Watching, airing: Airing, state: PlayerState) -> Relaunch {
    if airing != watching.airing {
        Relaunch::NextAiring
    } else if state == PlayerState::Stopped && !watching.restarted {
        Relaunch::Restart
    } else {
        Relaunch::No
    }
}

/// Keeps the player on the channel's schedule while the user is watching.
pub(super) fn handle_tick(app: &mut App) {
    let Some(watching) = app.watching else {
        return;
    };
    let now = now();
    let Some(playing) = app.controller.now_playing(now) else {
        return;
    };
    if playing.is_paused {
        return;
    }

    let restarted = match relaunch(&watching, Airing::of(&playing, now), app.player.state()) {
        Relaunch::No => return,
        Relaunch::NextAiring => {
            debug!("Channel {} moved on to {}", playing.channel, playing.entry.source_path);
            false
        }
        Relaunch::Restart => {
            debug!("Player stopped early, restarting {}", playing.entry.source_path);
            true
        }
    };

    match start_player(app, &playing, now) {
        Ok(()) => {
            if let Some(watching) = &mut app.watching {
                watching.restarted = restarted;
            }
        }
        Err(e) => {
            app.watching = None;
            handle_error(app, e.to_string());
        }
    }
}

pub(super) fn handle_tune(app: &mut App, id: u32) -> Result<()> {
    match app.controller.tune(id, now()) {
        Some(playing) => on_tuned(app, playing)?,
        None => app.status = Some(Status::error(format!("Channel {} is not available", id))),
    }
    Ok(())
}

pub(super) fn handle_channel_step(app: &mut App, steps: i64) -> Result<()> {
    if let Some(playing) = app.controller.step(steps, now()) {
        on_tuned(app, playing)?;
    }
    Ok(())
}

pub(super) fn handle_jump(app: &mut App) -> Result<()> {
    let now = now();
    let Some(target) = app
        .guide
        .jump_target(&app.epg, app.controller.registry(), now)
    else {
        app.status = Some(Status::error("Nothing to tune to there".into()));
        return Ok(());
    };

    if let Some(playing) = app.controller.jump(target, now) {
        on_tuned(app, playing)?;
    }
    Ok(())
}

fn on_tuned(app: &mut App, playing: NowPlaying) -> Result<()> {
    app.guide.reset(playing.channel);
    app.status = Some(Status::info(format!("{} {}", playing.channel, playing.name)));

    // Foreground catalog lookup, background work holds off meanwhile.
    app.details = {
        let _paused = app.token.pause_guard();
        db::fetch_item(&app.conn, &playing.entry.source_path).unwrap_or_else(|e| {
            warn!("Cannot look up {}: {}", playing.entry.source_path, e);
            None
        })
    };

    if app.watching.is_some() {
        if playing.is_paused {
            app.player.stop();
        } else {
            start_player(app, &playing, now())?;
        }
    }
    Ok(())
}

pub(super) fn handle_toggle_pause(app: &mut App) {
    match app.controller.toggle_pause(now()) {
        Some(true) => {
            // Still watching, the tick restarts the player on resume.
            app.player.stop();
            if let Some(watching) = &mut app.watching {
                watching.restarted = false;
            }
            app.status = Some(Status::info("Paused".into()));
        }
        Some(false) => app.status = Some(Status::info("Resumed".into())),
        None => {}
    }
}

pub(super) fn handle_watch(app: &mut App) -> Result<()> {
    let now = now();
    let Some(playing) = app.controller.now_playing(now) else {
        return Ok(());
    };
    if playing.is_paused {
        app.status = Some(Status::error("The channel is paused".into()));
        return Ok(());
    }
    start_player(app, &playing, now)
}

/// Plays the current item. A play is recorded once per airing.
fn start_player(app: &mut App, playing: &NowPlaying, now: i64) -> Result<()> {
    let airing = Airing::of(playing, now);
    let is_new = app.watching.is_none_or(|w| w.airing != airing);

    app.player.play(&playing.entry, playing.offset)?;
    app.player_state = PlayerState::Playing;
    app.watching = Some(Watching {
        airing,
        restarted: false,
    });
    if is_new {
        app.task_tx
            .send(MaintenanceTask::RecordPlay(playing.entry.source_path.clone()))?;
    }
    Ok(())
}

pub(super) fn handle_channel_ready(app: &mut App, id: u32) -> Result<()> {
    app.status = Some(Status::info(format!("Channel {} is ready", id)));
    if id == app.controller.tuned() {
        // Rebuilt under us, pick up the new schedule.
        handle_tune(app, id)?;
    }
    Ok(())
}

pub(super) fn handle_scan_started(app: &mut App) {
    app.status = Some(Status::info("Scanning the library...".into()));
}

pub(super) fn handle_scan_finished(app: &mut App, count: i64) {
    app.status = Some(Status::info(format!("Library scan indexed {} files", count)));
}

pub(super) fn handle_error(app: &mut App, message: String) {
    app.status = Some(Status::error(message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaEntry;

    fn playing(channel: u32, position: usize, offset: i64) -> NowPlaying {
        NowPlaying {
            channel,
            name: format!("Channel {}", channel),
            position,
            entry: MediaEntry::new(600, "Only", "/only.mkv"),
            offset,
            is_paused: false,
        }
    }

    #[test]
    fn the_same_item_on_the_next_loop_relaunches() {
        // One 600s item, first watched at 1_000 with 100s in.
        let watching = Watching {
            airing: Airing::of(&playing(1, 0, 100), 1_000),
            restarted: false,
        };

        let later = Airing::of(&playing(1, 0, 300), 1_200);
        assert_eq!(relaunch(&watching, later, PlayerState::Playing), Relaunch::No);

        let next_loop = Airing::of(&playing(1, 0, 0), 1_500);
        assert_eq!(relaunch(&watching, next_loop, PlayerState::Playing), Relaunch::NextAiring);

        let other_channel = Airing::of(&playing(2, 0, 300), 1_200);
        assert_eq!(relaunch(&watching, other_channel, PlayerState::Stopped), Relaunch::NextAiring);
    }

    #[test]
    fn a_player_that_stops_early_is_restarted_once() {
        let airing = Airing::of(&playing(1, 0, 100), 1_000);
        let mut watching = Watching { airing, restarted: false };

        let same = Airing::of(&playing(1, 0, 150), 1_050);
        assert_eq!(relaunch(&watching, same, PlayerState::Stopped), Relaunch::Restart);

        watching.restarted = true;
        assert_eq!(relaunch(&watching, same, PlayerState::Stopped), Relaunch::No);
    }
}
