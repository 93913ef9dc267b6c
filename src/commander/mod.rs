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

//! Command-line input logic and state management.
//!
//! Typing `:` opens the command line. Submitting it parses the text into a
//! [`Command`] and dispatches it, either as an application event or as a
//! maintenance task.

use std::sync::mpsc::Sender;

use anyhow::Result;
use crossterm::event::{Event, KeyCode};
use tui_input::{Input, backend::crossterm::EventHandler};

use crate::{events::AppEvent, tasks::MaintenanceTask};

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Quit,
    Scan,
    Tune(u32),
    Reset(u32),
    ResetAll,
    Pause,
    Unknown(String),
}

/// Parses one command line. Returns `None` for a blank line.
pub(crate) fn parse_command(buffer: &str) -> Option<Command> {
    let parts: Vec<&str> = buffer.split_whitespace().collect();

    let command = match parts.as_slice() {
        [] => return None,
        ["q"] | ["quit"] => Command::Quit,
        ["scan"] => Command::Scan,
        ["pause"] => Command::Pause,
        ["reset", "all"] => Command::ResetAll,
        ["tune", id] => match id.parse() {
            Ok(id) => Command::Tune(id),
            Err(_) => Command::Unknown(buffer.trim().to_string()),
        },
        ["reset", id] => match id.parse() {
            Ok(id) => Command::Reset(id),
            Err(_) => Command::Unknown(buffer.trim().to_string()),
        },
        _ => Command::Unknown(buffer.trim().to_string()),
    };

    Some(command)
}

pub(crate) struct Commander {
    active: bool,
    pub(crate) input: Input,
}

impl Commander {
    pub(crate) fn new() -> Self {
        Self {
            active: false,
            input: Input::default(),
        }
    }

    pub(crate) fn active(&self) -> bool {
        self.active
    }

    /// Handles a terminal event, returning whether it was consumed.
    pub(crate) fn handle_event(
        &mut self,
        event: &Event,
        task_tx: &Sender<MaintenanceTask>,
        event_tx: &Sender<AppEvent>,
    ) -> Result<bool> {
        let Event::Key(key_event) = event else {
            return Ok(false);
        };

        if !self.active {
            if key_event.code == KeyCode::Char(':') {
                self.active = true;
                return Ok(true);
            }
            return Ok(false);
        }

        match key_event.code {
            KeyCode::Esc => {
                self.active = false;
                self.input.reset();
            }

            KeyCode::Enter => {
                if let Some(command) = parse_command(self.input.value()) {
                    dispatch(command, task_tx, event_tx)?;
                }
                self.input.reset();
                self.active = false;
            }

            _ => {
                // Delegate all other keys to the managed input component.
                self.input.handle_event(event);
            }
        }

        Ok(true)
    }
}

fn dispatch(command: Command, task_tx: &Sender<MaintenanceTask>, event_tx: &Sender<AppEvent>) -> Result<()> {
    match command {
        Command::Quit => event_tx.send(AppEvent::ExitApplication)?,
        Command::Scan => task_tx.send(MaintenanceTask::ScanLibrary)?,
        Command::Tune(id) => event_tx.send(AppEvent::TuneTo(id))?,
        Command::Reset(id) => task_tx.send(MaintenanceTask::Rebuild(id))?,
        Command::ResetAll => task_tx.send(MaintenanceTask::RebuildAll)?,
        Command::Pause => event_tx.send(AppEvent::TogglePause)?,
        Command::Unknown(text) => event_tx.send(AppEvent::Error(format!("Unknown command: {}", text)))?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyModifiers};
    use std::sync::mpsc;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn commands_parse() {
        assert_eq!(parse_command("  "), None);
        assert_eq!(parse_command("q"), Some(Command::Quit));
        assert_eq!(parse_command("tune 12"), Some(Command::Tune(12)));
        assert_eq!(parse_command("reset  3"), Some(Command::Reset(3)));
        assert_eq!(parse_command("reset all"), Some(Command::ResetAll));
        assert_eq!(parse_command("tune x"), Some(Command::Unknown("tune x".into())));
        assert_eq!(parse_command("rewind"), Some(Command::Unknown("rewind".into())));
    }

    #[test]
    fn typed_commands_are_dispatched() {
        let (task_tx, task_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let mut commander = Commander::new();

        assert!(!commander.handle_event(&key(KeyCode::Char('x')), &task_tx, &event_tx).unwrap());
        assert!(commander.handle_event(&key(KeyCode::Char(':')), &task_tx, &event_tx).unwrap());
        for c in "reset 2".chars() {
            commander.handle_event(&key(KeyCode::Char(c)), &task_tx, &event_tx).unwrap();
        }
        assert_eq!(commander.input.value(), "reset 2");
        commander.handle_event(&key(KeyCode::Enter), &task_tx, &event_tx).unwrap();

        assert!(!commander.active());
        assert!(matches!(task_rx.try_recv(), Ok(MaintenanceTask::Rebuild(2))));
        assert!(event_rx.try_recv().is_err());

        commander.handle_event(&key(KeyCode::Char(':')), &task_tx, &event_tx).unwrap();
        commander.handle_event(&key(KeyCode::Char('q')), &task_tx, &event_tx).unwrap();
        commander.handle_event(&key(KeyCode::Enter), &task_tx, &event_tx).unwrap();
        assert!(matches!(event_rx.try_recv(), Ok(AppEvent::ExitApplication)));
    }
}
