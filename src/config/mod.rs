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

//! Application configuration.
//!
//! This module manages the application configuration file, and derives the
//! [`EngineConfig`] context that is handed to the playlist builder, the rule
//! pipeline and the resolver.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    epg::EpgConfig,
    model::{ChannelKind, ChannelMode, ModeFlag},
    resolver::ResetPolicy,
    rules::{Rule, RuleConfig},
};

const CONFIG_NAME: &str = "chootv";

pub(crate) const DEFAULT_MAX_PLAYLIST_SIZE: usize = 16384;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) version: u32,
    pub(crate) media_dirs: Vec<String>,
    pub(crate) data_dir: String,
    pub(crate) database_file: String,
    /// Player command line, `{file}` and `{offset}` are substituted.
    pub(crate) player_command: Vec<String>,
    pub(crate) engine: EngineSettings,
    pub(crate) guide: GuideSettings,
    pub(crate) channels: Vec<ChannelConfig>,
}

impl AppConfig {
    /// Where channel lists, saved state and the log live.
    pub(crate) fn data_path(&self) -> PathBuf {
        resolve(&self.data_dir)
    }

    pub(crate) fn database_path(&self) -> PathBuf {
        self.data_path().join(&self.database_file)
    }

    pub(crate) fn media_paths(&self) -> Vec<PathBuf> {
        self.media_dirs.iter().map(PathBuf::from).collect()
    }
}

/// Relative paths are taken from the directory holding the configuration
/// file.
fn resolve(dir: &str) -> PathBuf {
    let path = PathBuf::from(dir);
    if path.is_absolute() {
        return path;
    }

    match confy::get_configuration_file_path(CONFIG_NAME, None) {
        Ok(file) => file.parent().map(|parent| parent.join(&path)).unwrap_or(path),
        Err(e) => {
            warn!("Cannot locate the configuration directory: {}", e);
            path
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            media_dirs: vec![],
            data_dir: "chootv".into(),
            database_file: "chootv.db".into(),
            player_command: vec![
                "mpv".into(),
                "--start={offset}".into(),
                "{file}".into(),
            ],
            engine: EngineSettings::default(),
            guide: GuideSettings::default(),
            channels: vec![],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub(crate) struct EngineSettings {
    pub(crate) max_playlist_size: usize,
    pub(crate) smart_distribution: bool,
    /// 0 never, 1 daily, 2 weekly, 3 monthly, 4 only once fully watched.
    pub(crate) reset_policy: u8,
    pub(crate) force_reset: bool,
    /// Channels shorter than this (seconds) are extended in the background.
    pub(crate) min_loop_period: i64,
    pub(crate) max_directory_depth: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_playlist_size: DEFAULT_MAX_PLAYLIST_SIZE,
            smart_distribution: true,
            reset_policy: 0,
            force_reset: false,
            min_loop_period: 0,
            max_directory_depth: 16,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub(crate) struct GuideSettings {
    pub(crate) rows: usize,
    pub(crate) span_minutes: i64,
    pub(crate) min_block_width: u16,
    pub(crate) coalesce_seconds: i64,
}

impl Default for GuideSettings {
    fn default() -> Self {
        Self {
            rows: 5,
            span_minutes: 90,
            min_block_width: 1,
            coalesce_seconds: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct ChannelConfig {
    pub(crate) id: u32,
    #[serde(default)]
    pub(crate) name: String,
    pub(crate) kind: ChannelKind,
    /// Genre names for genre channels, playlist files for playlist channels.
    pub(crate) sources: Vec<String>,
    #[serde(default)]
    pub(crate) modes: Vec<ModeFlag>,
    #[serde(default)]
    pub(crate) shuffle: bool,
    /// Set externally to request a rebuild at the next start.
    #[serde(default)]
    pub(crate) changed: bool,
    #[serde(default)]
    pub(crate) rules: Vec<RuleConfig>,
}

impl ChannelConfig {
    #[cfg(test)]
    pub(crate) fn new(id: u32, kind: ChannelKind, source: &str) -> Self {
        Self {
            id,
            name: String::new(),
            kind,
            sources: vec![source.to_string()],
            modes: vec![],
            shuffle: false,
            changed: false,
            rules: vec![],
        }
    }

    pub(crate) fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("{} {}", self.kind, self.sources.join(" + "))
        } else {
            self.name.clone()
        }
    }

    pub(crate) fn mode(&self) -> ChannelMode {
        ChannelMode::from_flags(&self.modes)
    }

    /// Validates the configured rules, skipping (and logging) any that cannot
    /// be loaded.
    pub(crate) fn load_rules(&self) -> Vec<Rule> {
        self.rules
            .iter()
            .filter_map(|config| match Rule::from_config(config) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!("Channel {}: ignoring rule '{}': {}", self.id, config.id, e);
                    None
                }
            })
            .collect()
    }
}

/// Immutable engine settings, passed explicitly to the components that need
/// them.
#[derive(Debug, Clone)]
pub(crate) struct EngineConfig {
    pub(crate) data_dir: PathBuf,
    pub(crate) max_playlist_size: usize,
    pub(crate) smart_distribution: bool,
    pub(crate) reset_policy: ResetPolicy,
    pub(crate) force_reset: bool,
    pub(crate) min_loop_period: i64,
    pub(crate) max_directory_depth: usize,
    pub(crate) epg: EpgConfig,
}

impl EngineConfig {
    pub(crate) fn from_app(config: &AppConfig) -> Self {
        let guide = &config.guide;
        Self {
            data_dir: config.data_path(),
            max_playlist_size: config.engine.max_playlist_size.max(1),
            smart_distribution: config.engine.smart_distribution,
            reset_policy: ResetPolicy::from_selector(config.engine.reset_policy),
            force_reset: config.engine.force_reset,
            min_loop_period: config.engine.min_loop_period.max(0),
            max_directory_depth: config.engine.max_directory_depth,
            epg: EpgConfig {
                rows: guide.rows.max(1),
                span: guide.span_minutes.max(1) * 60,
                min_block_width: guide.min_block_width,
                coalesce_threshold: guide.coalesce_seconds.max(0),
                ..EpgConfig::default()
            },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}

pub(crate) fn load_config() -> AppConfig {
    confy::load(CONFIG_NAME, None).unwrap_or_default()
}

pub(crate) fn save_config(cfg: &AppConfig) -> Result<(), confy::ConfyError> {
    confy::store(CONFIG_NAME, None, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_paths_are_kept() {
        let mut app = AppConfig::default();
        app.data_dir = "/srv/chootv".into();
        app.media_dirs = vec!["/media/tv".into()];

        assert_eq!(app.data_path(), PathBuf::from("/srv/chootv"));
        assert_eq!(app.database_path(), PathBuf::from("/srv/chootv/chootv.db"));
        assert_eq!(app.media_paths(), vec![PathBuf::from("/media/tv")]);
    }

    #[test]
    fn engine_config_clamps_settings() {
        let mut app = AppConfig::default();
        app.engine.max_playlist_size = 0;
        app.engine.reset_policy = 4;
        app.guide.span_minutes = 0;

        let engine = EngineConfig::from_app(&app);
        assert_eq!(engine.max_playlist_size, 1);
        assert_eq!(engine.reset_policy, ResetPolicy::OnlyIfWatched);
        assert_eq!(engine.epg.span, 60);
    }

    #[test]
    fn display_name_falls_back_to_sources() {
        let mut channel = ChannelConfig::new(2, ChannelKind::TvGenre, "Comedy");
        assert_eq!(channel.display_name(), "TV Comedy");
        channel.name = "Laughs".into();
        assert_eq!(channel.display_name(), "Laughs");
    }

    #[test]
    fn invalid_rules_are_skipped() {
        let mut channel = ChannelConfig::new(1, ChannelKind::TvGenre, "Drama");
        channel.rules = vec![
            RuleConfig::new("rename", &["Drama Plus"]),
            RuleConfig::new("no_such_rule", &[]),
            RuleConfig::new("limit_duration", &["ten", "20"]),
        ];
        let rules = channel.load_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id(), "rename");
    }
}
