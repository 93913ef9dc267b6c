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

//! Channel state persistence.
//!
//! The list itself lives in the channel's list file, the table here only
//! holds where playback had got to.

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::model::Channel;

const LAST_EXIT_KEY: &str = "last_exit";

/// Playback state of a channel as it was saved at the end of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct StoredState {
    pub(crate) position: usize,
    pub(crate) show_time_offset: i64,
    pub(crate) total_time_played: i64,
    pub(crate) last_reset_time: i64,
    pub(crate) is_paused: bool,
}

impl StoredState {
    pub(crate) fn of(channel: &Channel) -> Self {
        Self {
            position: channel.position,
            show_time_offset: channel.show_time_offset,
            total_time_played: channel.total_time_played,
            last_reset_time: channel.last_reset_time,
            is_paused: channel.is_paused,
        }
    }

    pub(crate) fn apply_to(&self, channel: &mut Channel) {
        channel.position = self.position;
        channel.show_time_offset = self.show_time_offset;
        channel.total_time_played = self.total_time_played;
        channel.last_reset_time = self.last_reset_time;
        channel.is_paused = self.is_paused;
    }
}

pub(crate) fn load_channel_state(conn: &Connection, channel_id: u32) -> Result<Option<StoredState>> {
    let sql = "
        SELECT position, show_time_offset, total_time_played, last_reset_time, is_paused
        FROM channel_state
        WHERE channel_id = ?";

    let mut stmt = conn.prepare_cached(sql)?;
    let state = stmt
        .query_row([channel_id], |row| {
            let position: i64 = row.get(0)?;
            Ok(StoredState {
                position: usize::try_from(position).unwrap_or(0),
                show_time_offset: row.get(1)?,
                total_time_played: row.get(2)?,
                last_reset_time: row.get(3)?,
                is_paused: row.get(4)?,
            })
        })
        .optional()?;

    Ok(state)
}

pub(crate) fn save_channel_state(conn: &Connection, channel_id: u32, state: &StoredState) -> Result<()> {
    let sql = "
        INSERT INTO channel_state
            (channel_id, position, show_time_offset, total_time_played, last_reset_time, is_paused)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT (channel_id)
        DO UPDATE SET
            position = ?2,
            show_time_offset = ?3,
            total_time_played = ?4,
            last_reset_time = ?5,
            is_paused = ?6";

    let position = i64::try_from(state.position).unwrap_or(0);
    let mut stmt = conn.prepare_cached(sql)?;
    stmt.execute(params![
        channel_id,
        position,
        state.show_time_offset,
        state.total_time_played,
        state.last_reset_time,
        state.is_paused
    ])?;

    Ok(())
}

pub(crate) fn load_last_exit(conn: &Connection) -> Result<Option<i64>> {
    let value = conn
        .query_row(
            "SELECT value FROM app_state WHERE key = ?",
            [LAST_EXIT_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub(crate) fn save_last_exit(conn: &Connection, at: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO app_state (key, value) VALUES (?1, ?2)
         ON CONFLICT (key) DO UPDATE SET value = ?2",
        params![LAST_EXIT_KEY, at],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::init_memory_db, model::ChannelKind};

    #[test]
    fn channel_state_is_upserted() {
        let conn = init_memory_db();
        assert_eq!(load_channel_state(&conn, 3).unwrap(), None);

        let mut channel = Channel::new(3, "Three", ChannelKind::TvGenre);
        channel.position = 7;
        channel.show_time_offset = 125;
        channel.total_time_played = 4_000;
        channel.is_paused = true;
        save_channel_state(&conn, 3, &StoredState::of(&channel)).unwrap();

        channel.position = 8;
        save_channel_state(&conn, 3, &StoredState::of(&channel)).unwrap();

        let stored = load_channel_state(&conn, 3).unwrap().unwrap();
        assert_eq!(stored.position, 8);
        assert_eq!(stored.show_time_offset, 125);
        assert!(stored.is_paused);

        let mut restored = Channel::new(3, "Three", ChannelKind::TvGenre);
        stored.apply_to(&mut restored);
        assert_eq!(restored.total_time_played, 4_000);
    }

    #[test]
    fn last_exit_round_trips() {
        let conn = init_memory_db();
        assert_eq!(load_last_exit(&conn).unwrap(), None);
        save_last_exit(&conn, 100).unwrap();
        save_last_exit(&conn, 200).unwrap();
        assert_eq!(load_last_exit(&conn).unwrap(), Some(200));
    }
}
