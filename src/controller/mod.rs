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

//! Channel lifecycle.
//!
//! The [`Controller`] owns the channel registry. It brings channels up at
//! start, serves the foreground's tune, jump and pause requests, and saves
//! channel state on the way out.
//!
//! # Startup
//!
//! Channels whose saved list can be kept are loaded straight away. The others
//! are left pending for the maintenance worker, unless no channel at all is
//! usable, in which case pending channels are built in order until one comes
//! up. Only when that fails too is startup aborted.

mod rebuild;

pub(crate) use rebuild::Rebuilder;

use std::sync::{
    Arc, Mutex, TryLockError,
    atomic::{AtomicU32, Ordering},
};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::{
    builder::BuildMode,
    config::{AppConfig, ChannelConfig, EngineConfig},
    db::state::{self, StoredState},
    epg::JumpTarget,
    error::EngineError,
    library::MediaLibrary,
    listfile,
    model::{Channel, ChannelMode, MediaEntry},
    registry::ChannelRegistry,
    resolver::{self, ResetInputs, SeedContext},
    rules::{NoSiblings, Rule, RuleContext, RulePipeline, Stage},
    token::WorkToken,
};

/// Runs one lifecycle stage of a channel's own rules.
pub(crate) fn run_lifecycle_stage(config: &EngineConfig, stage: Stage, channel: Channel) -> Channel {
    if channel.rules.is_empty() {
        return channel;
    }

    let rules = channel.rules.clone();
    let mut rng = rand::rng();
    let mut ctx = RuleContext {
        channel_id: channel.id,
        kind: channel.kind,
        config,
        siblings: &NoSiblings,
        rng: &mut rng,
    };
    RulePipeline::new(&rules).run_channel(stage, &mut ctx, channel)
}

/// What is on the tuned channel right now.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NowPlaying {
    pub(crate) channel: u32,
    pub(crate) name: String,
    pub(crate) position: usize,
    pub(crate) entry: MediaEntry,
    pub(crate) offset: i64,
    pub(crate) is_paused: bool,
}

/// The result of [`Controller::start`].
pub(crate) struct Startup {
    pub(crate) controller: Controller,
    /// Channels still to be built by the maintenance worker.
    pub(crate) pending: Vec<u32>,
    /// One message per channel that failed to come up.
    pub(crate) notices: Vec<String>,
    /// The reset flags were honored and cleared, the configuration needs
    /// saving.
    pub(crate) flags_cleared: bool,
}

pub(crate) struct Controller {
    config: Arc<EngineConfig>,
    channels: Arc<Vec<ChannelConfig>>,
    registry: Arc<ChannelRegistry>,
    tuned: Arc<AtomicU32>,
    tune_gate: Mutex<()>,
}

impl Controller {
    /// Brings up every configured channel and tunes the first usable one.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::AllChannelsInvalid`] when not a single
    /// channel can be loaded or built.
    pub(crate) fn start(
        app: &mut AppConfig,
        conn: &Connection,
        library: &dyn MediaLibrary,
        token: &WorkToken,
        now: i64,
    ) -> Result<Startup> {
        let config = EngineConfig::from_app(app);
        let channels: Vec<ChannelConfig> = app.channels.iter().filter(|c| c.id > 0).cloned().collect();

        let registry = ChannelRegistry::new(
            channels
                .iter()
                .map(|c| Channel::new(c.id, &c.display_name(), c.kind))
                .collect(),
        );

        let last_exit = state::load_last_exit(conn).unwrap_or_else(|e| {
            warn!("Cannot read the last exit time: {}", e);
            None
        });
        let seed_ctx = SeedContext {
            now,
            process_start: now,
            last_exit,
        };

        let mut pending = Vec::new();
        for channel_config in &channels {
            if let Some(channel) = load_existing(&config, conn, channel_config, &seed_ctx) {
                registry.replace(channel);
            } else {
                pending.push(channel_config.id);
            }
        }

        let mut notices = Vec::new();
        if registry.valid_ids().is_empty() {
            info!("No saved channel is usable, building one now");
            let rebuilder = Rebuilder::new(&registry, &channels, &config, library, token, now);
            let mut failed = Vec::new();
            for id in pending.iter().copied() {
                if rebuilder.was_built(id) {
                    continue;
                }
                match rebuilder.rebuild(id, BuildMode::Replace) {
                    Ok(_) => break,
                    Err(e) if e.is_channel_failure() => {
                        notices.push(e.user_message(id));
                        failed.push(id);
                    }
                    Err(e) => return Err(e).context("Failed to build a channel"),
                }
            }
            pending.retain(|id| !rebuilder.was_built(*id) && !failed.contains(id));
        }

        if registry.valid_ids().is_empty() {
            return Err(EngineError::AllChannelsInvalid.into());
        }

        let mut flags_cleared = false;
        if app.engine.force_reset {
            app.engine.force_reset = false;
            flags_cleared = true;
        }
        // Edited channels get their rules written back in full, unusable
        // ones dropped.
        for channel_config in app.channels.iter_mut().filter(|c| c.changed) {
            channel_config.changed = false;
            channel_config.rules = channel_config.load_rules().iter().map(Rule::to_config).collect();
            flags_cleared = true;
        }

        let controller = Controller {
            config: Arc::new(config),
            channels: Arc::new(channels),
            registry: Arc::new(registry),
            tuned: Arc::new(AtomicU32::new(0)),
            tune_gate: Mutex::new(()),
        };

        if let Some(first) = controller.registry.valid_ids().first() {
            controller.tune(*first, now);
        }

        info!(
            "Started with {} channels ready, {} pending",
            controller.registry.valid_ids().len(),
            pending.len()
        );

        Ok(Startup {
            controller,
            pending,
            notices,
            flags_cleared,
        })
    }

    pub(crate) fn config(&self) -> &Arc<EngineConfig> {
        &self.config
    }

    pub(crate) fn channels(&self) -> &Arc<Vec<ChannelConfig>> {
        &self.channels
    }

    pub(crate) fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Shared handle on the tuned channel id, zero before the first tune.
    pub(crate) fn tuned_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.tuned)
    }

    pub(crate) fn tuned(&self) -> u32 {
        self.tuned.load(Ordering::Acquire)
    }

    /// Tunes to a channel.
    ///
    /// Returns `None` if the channel cannot be tuned, or if another tune is in
    /// flight, in which case the request is dropped.
    pub(crate) fn tune(&self, id: u32, now: i64) -> Option<NowPlaying> {
        self.tune_with(id, None, now)
    }

    /// Tunes `steps` valid channels up (or down, when negative).
    pub(crate) fn step(&self, steps: i64, now: i64) -> Option<NowPlaying> {
        let id = self.registry.step_valid(self.tuned(), steps)?;
        self.tune(id, now)
    }

    /// Tunes to a guide block, placing its channel at the block's item.
    pub(crate) fn jump(&self, target: JumpTarget, now: i64) -> Option<NowPlaying> {
        self.tune_with(target.channel, Some(target), now)
    }

    fn tune_with(&self, id: u32, target: Option<JumpTarget>, now: i64) -> Option<NowPlaying> {
        let _gate = match self.tune_gate.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("Tune to channel {} dropped, another tune is in flight", id);
                return None;
            }
        };

        if !self.registry.is_valid(id) {
            warn!("Channel {} cannot be tuned", id);
            return None;
        }

        let previous = self.tuned();
        if previous != 0 && previous != id {
            self.registry.write(previous, |c| {
                resolver::tune_in(c, now);
                if c.mode.contains(ChannelMode::ALWAYS_PAUSE) {
                    c.is_paused = true;
                }
            });
            self.apply_stage(previous, Stage::OnTuneEnd);
        }

        self.registry.write(id, |c| {
            resolver::tune_in(c, now);
            if let Some(target) = target {
                resolver::place(c, target.position, target.offset, now);
            }
            if c.mode.contains(ChannelMode::ALWAYS_PAUSE) && previous != id {
                c.is_paused = false;
            }
        });
        self.apply_stage(id, Stage::OnTune);
        self.tuned.store(id, Ordering::Release);

        info!("Tuned to channel {}", id);
        self.now_playing(now)
    }

    /// Pauses or resumes the tuned channel, returning whether it is now
    /// paused.
    pub(crate) fn toggle_pause(&self, now: i64) -> Option<bool> {
        self.registry.write(self.tuned(), |c| {
            resolver::tune_in(c, now);
            c.is_paused = !c.is_paused;
            c.is_paused
        })
    }

    /// The item live on the tuned channel at `now`, without touching its
    /// state.
    pub(crate) fn now_playing(&self, now: i64) -> Option<NowPlaying> {
        self.registry
            .read(self.tuned(), |c| {
                let resolution = resolver::resolve(c, now).ok()?;
                let entry = c.entries.get(resolution.position)?.clone();
                Some(NowPlaying {
                    channel: c.id,
                    name: c.name.clone(),
                    position: resolution.position,
                    entry,
                    offset: resolution.offset,
                    is_paused: c.is_paused,
                })
            })
            .flatten()
    }

    fn apply_stage(&self, id: u32, stage: Stage) {
        self.registry.write(id, |c| {
            let updated = run_lifecycle_stage(&self.config, stage, c.clone());
            *c = updated;
        });
    }

    /// Saves the state of every usable channel and the exit time.
    pub(crate) fn shutdown(&self, conn: &Connection, now: i64) -> Result<()> {
        let tuned = self.tuned();
        if tuned != 0 {
            self.apply_stage(tuned, Stage::OnTuneEnd);
        }

        for id in 1..=self.registry.len() as u32 {
            let saved = self
                .registry
                .write(id, |c| {
                    if !c.is_valid {
                        return None;
                    }
                    resolver::prepare_for_exit(c, now);
                    Some(StoredState::of(c))
                })
                .flatten();

            if let Some(saved) = saved {
                state::save_channel_state(conn, id, &saved)
                    .with_context(|| format!("Failed to save channel {}", id))?;
            }
        }

        state::save_last_exit(conn, now).context("Failed to save the exit time")?;
        info!("Channel state saved");
        Ok(())
    }
}

/// Loads a channel from its saved list and state, or returns `None` if it
/// needs a rebuild.
fn load_existing(
    config: &EngineConfig,
    conn: &Connection,
    channel_config: &ChannelConfig,
    seed_ctx: &SeedContext,
) -> Option<Channel> {
    let id = channel_config.id;
    let path = listfile::list_path(&config.data_dir, id);
    let entries = if path.exists() {
        listfile::read_list(&path).unwrap_or_else(|e| {
            warn!("Channel {}: saved list unreadable: {}", id, e);
            Vec::new()
        })
    } else {
        Vec::new()
    };

    let stored = state::load_channel_state(conn, id).unwrap_or_else(|e| {
        warn!("Channel {}: saved state unreadable: {}", id, e);
        None
    });

    let inputs = ResetInputs {
        policy: config.reset_policy,
        force_reset: config.force_reset,
        changed: channel_config.changed,
        has_list: !entries.is_empty(),
        last_reset_time: stored.as_ref().map_or(seed_ctx.now, |s| s.last_reset_time),
        now: seed_ctx.now,
        total_time_played: stored.as_ref().map_or(0, |s| s.total_time_played),
        loop_period: resolver::loop_period(&entries),
    };
    if let Some(reason) = resolver::should_rebuild(&inputs) {
        info!("Channel {} needs a rebuild: {}", id, reason);
        return None;
    }

    let mut channel = Channel::new(id, &channel_config.display_name(), channel_config.kind);
    channel.entries = entries;
    channel.mode = channel_config.mode();
    channel.rules = channel_config.load_rules();
    channel.is_valid = true;
    channel.last_reset_time = seed_ctx.now;
    if let Some(stored) = &stored {
        stored.apply_to(&mut channel);
    }

    channel = run_lifecycle_stage(config, Stage::Start, channel);
    channel = run_lifecycle_stage(config, Stage::FinalLoaded, channel);
    channel = run_lifecycle_stage(config, Stage::BeforeTimeAdjust, channel);
    resolver::seed(&mut channel, seed_ctx, &mut rand::rng());

    debug!("Channel {} loaded with {} entries", id, channel.len());
    Some(channel)
}
