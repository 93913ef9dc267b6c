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
use tracing::{debug, info, warn};

use crate::{
    builder::BuildMode,
    controller::Rebuilder,
    db::{self, scan},
    error::EngineError,
    events::AppEvent,
    library::CatalogLibrary,
    resolver,
    tasks::TaskContext,
    util::time::now,
};

/// Upper bound on append passes for one short channel.
const MAX_EXTEND_PASSES: usize = 8;

pub(super) fn build_pending(ctx: &mut TaskContext, ids: &[u32]) -> Result<()> {
    for id in ids.iter().copied() {
        if ctx.shared.token.is_cancelled() {
            break;
        }
        if id == ctx.shared.tuned() {
            debug!("Channel {} is tuned, not rebuilding it in the background", id);
            continue;
        }
        if ctx.shared.registry.is_valid(id) {
            continue;
        }
        rebuild_channel(ctx, id, BuildMode::Replace)?;
    }

    Ok(())
}

pub(super) fn rebuild(ctx: &mut TaskContext, id: u32) -> Result<()> {
    rebuild_channel(ctx, id, BuildMode::Replace)?;
    Ok(())
}

pub(super) fn rebuild_all(ctx: &mut TaskContext) -> Result<()> {
    let ids: Vec<u32> = ctx.shared.channels.iter().map(|c| c.id).collect();
    for id in ids {
        if ctx.shared.token.is_cancelled() {
            break;
        }
        rebuild_channel(ctx, id, BuildMode::Replace)?;
    }

    Ok(())
}

pub(super) fn extend_short(ctx: &mut TaskContext) -> Result<()> {
    let min_period = ctx.shared.config.min_loop_period;
    if min_period <= 0 {
        return Ok(());
    }

    for id in ctx.shared.registry.valid_ids() {
        if id == ctx.shared.tuned() {
            continue;
        }

        for _ in 0..MAX_EXTEND_PASSES {
            let Some((period, len)) = ctx
                .shared
                .registry
                .read(id, |c| (resolver::loop_period(&c.entries), c.len()))
            else {
                break;
            };
            if period >= min_period || ctx.shared.token.is_cancelled() {
                break;
            }

            debug!("Channel {} loops every {}s, extending it", id, period);
            if !rebuild_channel(ctx, id, BuildMode::Append)? {
                break;
            }
            if ctx.shared.registry.read(id, |c| c.len()).unwrap_or(0) <= len {
                break;
            }
        }
    }

    Ok(())
}

/// Returns whether the channel was built.
fn rebuild_channel(ctx: &mut TaskContext, id: u32, mode: BuildMode) -> Result<bool> {
    let shared = ctx.shared;
    let library = CatalogLibrary::new(ctx.conn);
    let rebuilder = Rebuilder::new(
        &shared.registry,
        &shared.channels,
        &shared.config,
        &library,
        &shared.token,
        now(),
    );

    match rebuilder.rebuild(id, mode) {
        Ok(_) => {
            ctx.event_tx.send(AppEvent::ChannelReady(id))?;
            Ok(true)
        }
        Err(EngineError::Cancelled) => {
            debug!("Channel {}: build cancelled", id);
            Ok(false)
        }
        Err(e) if e.is_channel_failure() => {
            ctx.event_tx.send(AppEvent::ChannelFailed(e.user_message(id)))?;
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub(super) fn scan_library(ctx: &mut TaskContext) -> Result<()> {
    ctx.event_tx.send(AppEvent::ScanStarted)?;

    match scan::process_media_library(ctx.conn, &ctx.shared.media_dirs, &ctx.shared.token) {
        Ok(count) => {
            info!("Library scan indexed {} files", count);
            ctx.event_tx.send(AppEvent::ScanFinished(count))?;
        }
        Err(e) if ctx.shared.token.is_cancelled() => debug!("Library scan stopped: {}", e),
        Err(e) => {
            warn!("Library scan failed: {:#}", e);
            ctx.event_tx.send(AppEvent::Error(format!("Scan failed: {}", e)))?;
        }
    }

    Ok(())
}

pub(super) fn record_play(ctx: &mut TaskContext, path: &str) -> Result<()> {
    db::increment_play_count(ctx.conn, path)?;
    Ok(())
}
