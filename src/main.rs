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

//! # Virtual Broadcast TUI.
//!
//! Turns a media library into a set of always-on television channels, with a
//! programme guide and an external player to watch them.
//!
//! This application coordinates a TUI frontend built with `ratatui` and a
//! background maintenance layer.
//!
//! It uses an event-driven architecture where:
//!
//! * The **Main Thread** manages the terminal lifecycle, tuning and UI
//!   rendering.
//! * The **Maintenance Worker** builds channels and scans the library with
//!   its own database connection.
//! * **Event Loops** capture user input and system ticks to drive the UI
//!   state.
//!
//! ## Architecture
//!
//! Channels that saved their state come up straight away, everything else is
//! built in the background while the first usable channel is already on air.
//! Communication between the UI and the worker is handled via
//! `std::sync::mpsc` channels.

mod builder;
mod commander;
mod config;
mod controller;
mod db;
mod epg;
mod error;
mod events;
mod guide;
mod library;
mod listfile;
mod model;
mod player;
mod registry;
mod render;
mod resolver;
mod rules;
mod tasks;
mod theme;
mod token;
mod util;

use anyhow::{Context, Result};
use crossterm::{
    event::{self},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use rusqlite::Connection;
use std::{
    fs::{self, File},
    io::{self},
    path::Path,
    sync::{
        Arc, Mutex,
        mpsc::{self, Receiver, Sender},
    },
    thread,
    time::Duration,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    commander::Commander,
    config::AppConfig,
    controller::{Controller, NowPlaying},
    epg::EpgGenerator,
    events::{AppEvent, Watching, process_events},
    guide::GuideView,
    library::CatalogLibrary,
    model::LibraryItem,
    player::{ExternalPlayer, PlayerState},
    tasks::{MaintenanceTask, WorkerShared},
    theme::Theme,
    token::WorkToken,
    util::time::now,
};

/// A line for the status bar.
struct Status {
    text: String,
    is_error: bool,
}

impl Status {
    fn info(text: String) -> Self {
        Self { text, is_error: false }
    }

    fn error(text: String) -> Self {
        Self { text, is_error: true }
    }
}

/// Application state.
struct App {
    pub config: AppConfig,

    pub theme: Theme,

    pub event_tx: Sender<AppEvent>,
    pub event_rx: Receiver<AppEvent>,

    pub task_tx: Sender<MaintenanceTask>,

    /// Foreground catalog connection, the worker has its own.
    pub conn: Connection,
    pub token: WorkToken,

    pub controller: Controller,
    pub epg: EpgGenerator,
    pub guide: GuideView,
    pub guide_width: u16,

    pub commander: Commander,

    pub player: ExternalPlayer,
    pub player_state: PlayerState,
    pub watching: Option<Watching>,

    pub now_playing: Option<NowPlaying>,
    pub details: Option<LibraryItem>,
    pub status: Option<Status>,
}

/// The entry point of the application.
///
/// Brings up the channels, starts the maintenance worker, runs the UI until
/// the user quits and then saves every channel's state.
fn main() -> Result<()> {
    let mut config = config::load_config();

    let data_dir = config.data_path();
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    init_logging(&data_dir)?;

    let database = config.database_path();
    let conn = db::init_db(&database).context("Failed to initialise the catalog")?;
    let catalogued = db::media_count(&conn).unwrap_or_else(|e| {
        warn!("Cannot count catalog entries: {}", e);
        0
    });
    info!("Catalog holds {} items", catalogued);
    let token = WorkToken::new();

    let startup = {
        let library = CatalogLibrary::new(&conn);
        Controller::start(&mut config, &conn, &library, &token, now())
            .context("No channel could be started")?
    };
    if startup.flags_cleared {
        if let Err(e) = config::save_config(&config) {
            warn!("Failed to save configuration: {}", e);
        }
    }

    let (event_tx, event_rx) = mpsc::channel();
    let (task_tx, task_rx) = mpsc::channel();

    let controller = startup.controller;
    let shared = WorkerShared {
        registry: Arc::clone(controller.registry()),
        config: Arc::clone(controller.config()),
        channels: Arc::clone(controller.channels()),
        tuned: controller.tuned_handle(),
        media_dirs: config.media_paths(),
        token: token.clone(),
    };
    let worker = tasks::spawn_maintenance_worker(shared, database, task_rx, event_tx.clone());

    // An empty catalog is scanned before anything else is built from it.
    if catalogued == 0 && !config.media_dirs.is_empty() {
        task_tx.send(MaintenanceTask::ScanLibrary)?;
    }
    if !startup.pending.is_empty() {
        task_tx.send(MaintenanceTask::BuildPending(startup.pending))?;
    }
    task_tx.send(MaintenanceTask::ExtendShort)?;

    let status = (!startup.notices.is_empty()).then(|| Status::error(startup.notices.join(", ")));
    let epg = EpgGenerator::new(controller.config().epg.clone());
    let mut app = App {
        guide: GuideView::new(controller.tuned(), now()),
        player: ExternalPlayer::new(config.player_command.clone()),
        config,
        theme: Theme::default(),
        event_tx,
        event_rx,
        task_tx,
        conn,
        token,
        controller,
        epg,
        guide_width: 0,
        commander: Commander::new(),
        player_state: PlayerState::Stopped,
        watching: None,
        now_playing: None,
        details: None,
        status,
    };
    info!(
        "{} channels configured, tuned to {}",
        app.config.channels.len(),
        app.controller.tuned()
    );

    let mut terminal = setup_terminal()?;
    let res = run(&mut terminal, &mut app);
    restore_terminal(&mut terminal);

    app.token.cancel();
    app.task_tx.send(MaintenanceTask::Exit).ok();
    if worker.join().is_err() {
        warn!("Maintenance worker panicked");
    }
    app.player.stop();
    app.controller
        .shutdown(&app.conn, now())
        .context("Failed to save channel state")?;

    res.context("Application error occurred")
}

/// Sends log output to a file in the data directory, the terminal belongs to
/// the UI. `RUST_LOG` overrides the default filter.
fn init_logging(data_dir: &Path) -> Result<()> {
    let log_file = File::create(data_dir.join("chootv.log")).context("Failed to create log file")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chootv=info")))
        .with(fmt::layer().with_writer(Mutex::new(log_file)).with_ansi(false))
        .init();

    Ok(())
}

/// Prepares the terminal for the TUI application.
///
/// This function performs the following side effects:
/// * Enables raw mode to capture all keyboard input.
/// * Switches the terminal to the alternate screen buffer.
///
/// # Errors
///
/// Returns an error if raw mode cannot be enabled or if the alternate screen
/// cannot be entered.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;

    Ok(terminal)
}

/// Restores the terminal to its original state.
///
/// Best-effort, so it can run on the error path too.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
}

/// Starts the input and tick threads and enters the main event loop.
///
/// # Errors
///
/// Returns an error if the event processing loop encounters an unrecoverable
/// application error.
fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    // Spawn a thread to translate raw key events to application events.
    let tx_keys = app.event_tx.clone();
    thread::spawn(move || {
        loop {
            if let Ok(event::Event::Key(key)) = event::read() {
                if tx_keys.send(AppEvent::Key(key)).is_err() {
                    break;
                }
            }
        }
    });

    // The tick drives the clock: guide, progress and player hand-over.
    let tx_tick = app.event_tx.clone();
    thread::spawn(move || {
        while tx_tick.send(AppEvent::Tick).is_ok() {
            thread::sleep(Duration::from_millis(500));
        }
    });

    process_events(terminal, app)
}
