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

//! Playback through an external player.
//!
//! The engine only decides what is on and how far into it the channel is; the
//! picture comes from a separate player process, started with the file and
//! the offset substituted into the configured command line.

use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::model::MediaEntry;

const FILE_PLACEHOLDER: &str = "{file}";
const OFFSET_PLACEHOLDER: &str = "{offset}";

/// Represents the current playback status of the external player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum PlayerState {
    Playing,
    Stopped,
}

pub(crate) struct ExternalPlayer {
    command: Vec<String>,
    child: Option<Child>,
}

impl ExternalPlayer {
    pub(crate) fn new(command: Vec<String>) -> Self {
        Self {
            command,
            child: None,
        }
    }

    /// Substitutes the placeholders, returning the program and its arguments.
    fn command_line(&self, file: &str, offset: i64) -> Result<(String, Vec<String>)> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("No player command configured");
        };

        let offset = offset.max(0).to_string();
        let args = args
            .iter()
            .map(|arg| arg.replace(FILE_PLACEHOLDER, file).replace(OFFSET_PLACEHOLDER, &offset))
            .collect();
        Ok((program.clone(), args))
    }

    /// Starts playing `entry` from `offset` seconds in, replacing whatever is
    /// playing.
    pub(crate) fn play(&mut self, entry: &MediaEntry, offset: i64) -> Result<()> {
        self.stop();

        let (program, args) = self.command_line(&entry.source_path, offset)?;
        debug!("Launching {} {:?}", program, args);
        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start player '{}'", program))?;

        info!("Playing {} from {}s", entry.source_path, offset);
        self.child = Some(child);
        Ok(())
    }

    pub(crate) fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!("Player already gone: {}", e);
            }
            if let Err(e) = child.wait() {
                warn!("Failed to reap player: {}", e);
            }
        }
    }

    pub(crate) fn state(&mut self) -> PlayerState {
        let running = match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_))) | Some(Err(_)) => {
                self.child = None;
                false
            }
            None => false,
        };

        if running {
            PlayerState::Playing
        } else {
            PlayerState::Stopped
        }
    }
}

impl Drop for ExternalPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(command: &[&str]) -> ExternalPlayer {
        ExternalPlayer::new(command.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn placeholders_are_substituted() {
        let player = player(&["mpv", "--start={offset}", "--title=chootv", "{file}"]);
        let (program, args) = player.command_line("/tv/Show/S01E02.mkv", 754).unwrap();
        assert_eq!(program, "mpv");
        assert_eq!(args, vec!["--start=754", "--title=chootv", "/tv/Show/S01E02.mkv"]);

        let (_, args) = player.command_line("/a.mp3", -5).unwrap();
        assert_eq!(args[0], "--start=0");
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(player(&[]).command_line("/a.mp3", 0).is_err());
    }

    #[test]
    fn missing_program_fails_to_start() {
        let mut player = player(&["/nonexistent/chootv-player", "{file}"]);
        let entry = MediaEntry::new(60, "Film", "/film.mkv");
        assert!(player.play(&entry, 0).is_err());
        assert_eq!(player.state(), PlayerState::Stopped);
    }
}
