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

//! Background maintenance.
//!
//! Channel builds and library scans can take a long time, so they run on a
//! dedicated worker thread with its own database connection. The foreground
//! posts [`MaintenanceTask`]s and hears back through [`AppEvent`]s.
//!
//! Work stops at the next checkpoint when the shared [`WorkToken`] is paused
//! or cancelled.

mod handlers;
use handlers::*;

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
        mpsc::{Receiver, Sender},
    },
    thread::{self, JoinHandle},
};

use anyhow::Result;
use rusqlite::Connection;
use tracing::{debug, error, info};

use crate::{
    config::{ChannelConfig, EngineConfig},
    db,
    events::AppEvent,
    registry::ChannelRegistry,
    token::WorkToken,
};

#[derive(Debug)]
pub(crate) enum MaintenanceTask {
    /// Builds channels that were not brought up at start.
    BuildPending(Vec<u32>),
    /// Rebuilds one channel from scratch.
    Rebuild(u32),
    RebuildAll,
    /// Extends channels whose loop is shorter than the configured minimum.
    ExtendShort,
    ScanLibrary,
    RecordPlay(String),
    Exit,
}

/// Everything the worker shares with the foreground.
pub(crate) struct WorkerShared {
    pub(crate) registry: Arc<ChannelRegistry>,
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) channels: Arc<Vec<ChannelConfig>>,
    pub(crate) tuned: Arc<AtomicU32>,
    pub(crate) media_dirs: Vec<PathBuf>,
    pub(crate) token: WorkToken,
}

impl WorkerShared {
    fn tuned(&self) -> u32 {
        self.tuned.load(Ordering::Acquire)
    }
}

/// Spawns the maintenance worker.
///
/// # Arguments
///
/// * `shared` - State shared with the foreground.
/// * `database` - The catalog database file, opened by the worker itself.
/// * `task_rx` - The receiving end of the task channel.
/// * `event_tx` - The sending end of the channel for reporting back.
pub(crate) fn spawn_maintenance_worker(
    shared: WorkerShared,
    database: PathBuf,
    task_rx: Receiver<MaintenanceTask>,
    event_tx: Sender<AppEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut conn = match db::init_db(&database) {
            Ok(conn) => conn,
            Err(e) => {
                error!("Maintenance worker has no database: {:#}", e);
                let _ = event_tx.send(AppEvent::Error(format!("Database unavailable: {}", e)));
                return;
            }
        };

        while let Ok(task) = task_rx.recv() {
            if matches!(task, MaintenanceTask::Exit) || shared.token.is_cancelled() {
                break;
            }

            debug!("Maintenance task {:?}", task);
            let mut ctx = TaskContext {
                shared: &shared,
                event_tx: &event_tx,
                conn: &mut conn,
            };

            if let Err(e) = handle_task(task, &mut ctx) {
                error!("Maintenance task failed: {:#}", e);
                let _ = event_tx.send(AppEvent::Error(e.to_string()));
            }
        }

        info!("Maintenance worker stopped");
    })
}

/// Bundles shared resources required by task handlers.
struct TaskContext<'a> {
    shared: &'a WorkerShared,
    event_tx: &'a Sender<AppEvent>,
    conn: &'a mut Connection,
}

fn handle_task(task: MaintenanceTask, ctx: &mut TaskContext) -> Result<()> {
    match task {
        MaintenanceTask::BuildPending(ids) => build_pending(ctx, &ids),
        MaintenanceTask::Rebuild(id) => rebuild(ctx, id),
        MaintenanceTask::RebuildAll => rebuild_all(ctx),
        MaintenanceTask::ExtendShort => extend_short(ctx),
        MaintenanceTask::ScanLibrary => scan_library(ctx),
        MaintenanceTask::RecordPlay(path) => record_play(ctx, &path),
        MaintenanceTask::Exit => Ok(()),
    }
}
