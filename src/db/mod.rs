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

//! Data access layer.
//!
//! This module handles all interactions with the SQLite database, including
//! schema creation and fetching media metadata. It uses cached statements
//! to optimize frequently executed queries.
//!
//! # Tables
//!
//! * `media` - Indexed media files with their metadata.
//! * `media_stats` - Play counts, keyed by durable id so they survive rescans.
//! * `channel_state` - Playback state of each channel between sessions.
//! * `app_state` - Process-wide values such as the last exit time.
//!
//! # Performance
//!
//! Most functions in this module use [`rusqlite::Connection::prepare_cached`]
//! to reduce SQL parsing overhead.

mod model;
pub(crate) mod scan;
pub(crate) mod state;

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::model::{LibraryItem, MediaKind};

const ITEM_COLUMNS: &str = "
    m.filename, m.duration, m.title, m.show_title, m.season, m.episode,
    COALESCE(s.play_count, 0), m.plot, m.album, m.artist, m.track, m.genre, m.kind
";

/// Opens a connection to the SQLite database and configures performance settings.
///
/// This function performs the following setup:
/// * **WAL Mode**: Enables Write-Ahead Logging so the maintenance worker and
///   the front-end can each hold a connection.
/// * **Performance Tuning**: Sets synchronous mode to `NORMAL` and increases the cache size.
/// * **Schema**: Executes [`create_schema`] to ensure all tables and indices exist.
///
/// # Arguments
///
/// * `path` - The file system path to the SQLite database file.
///
/// # Errors
///
/// Returns an error if:
/// * The database file cannot be opened.
/// * The initial PRAGMA configurations fail.
/// * The schema initialization fails.
pub(crate) fn init_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;

    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
    if journal_mode != "wal" {
        anyhow::bail!(
            "Failed to switch to WAL mode. Current mode: {}",
            journal_mode
        );
    }

    conn.execute_batch(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -64000; -- Use 64MB of RAM for cache
        PRAGMA busy_timeout = 5000;
    ",
    )?;

    conn.set_prepared_statement_cache_capacity(100);

    create_schema(&conn)?;

    Ok(conn)
}

/// Create the database schema.
///
/// This operation is wrapped in a single SQL transaction to ensure the schema
/// is updated atomically.
///
/// # Errors
///
/// Returns an error if the transaction fails, if there are permission issues
/// with the database file, or if the SQL syntax is invalid.
fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;

        CREATE TABLE IF NOT EXISTS media (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            durable_id INTEGER NOT NULL UNIQUE,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            show_title TEXT NOT NULL DEFAULT '',
            season INTEGER NOT NULL DEFAULT -1,
            episode INTEGER NOT NULL DEFAULT -1,
            artist TEXT NOT NULL DEFAULT '',
            album TEXT NOT NULL DEFAULT '',
            track INTEGER NOT NULL DEFAULT -1,
            genre TEXT NOT NULL DEFAULT '',
            plot TEXT NOT NULL DEFAULT '',
            duration INTEGER NOT NULL,
            filename TEXT NOT NULL UNIQUE
        );

        CREATE INDEX IF NOT EXISTS idx_media_kind ON media (kind);

        CREATE TABLE IF NOT EXISTS media_stats (
            durable_id INTEGER PRIMARY KEY,
            play_count INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS channel_state (
            channel_id INTEGER PRIMARY KEY,
            position INTEGER NOT NULL DEFAULT 0,
            show_time_offset INTEGER NOT NULL DEFAULT 0,
            total_time_played INTEGER NOT NULL DEFAULT 0,
            last_reset_time INTEGER NOT NULL DEFAULT 0,
            is_paused INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS app_state (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );

        COMMIT;",
    )
    .context("Failed to create schema")
}

/// Opens a private in-memory database with the full schema.
#[cfg(test)]
pub(crate) fn init_memory_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    create_schema(&conn).unwrap();
    conn
}

/// Fetches every item of a kind whose genre tag contains `genre`.
///
/// Genre tags frequently hold several genres ("Comedy; Drama"), so the match
/// is a case-insensitive substring match.
///
/// # Errors
///
/// Returns an error if the SQL query fails or a row cannot be mapped to a
/// [`LibraryItem`].
pub(crate) fn fetch_genre_items(
    conn: &Connection,
    kind: MediaKind,
    genre: &str,
) -> Result<Vec<LibraryItem>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS}
         FROM media m
         LEFT JOIN media_stats s ON s.durable_id = m.durable_id
         WHERE m.kind = ?1 AND m.genre LIKE ?2
         ORDER BY m.show_title, m.season, m.episode, m.title"
    );

    let mut stmt = conn.prepare_cached(&sql)?;
    let results = stmt
        .query_map(params![kind, format!("%{}%", genre.trim())], LibraryItem::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

/// Fetches the catalog record for a file, if it has been indexed.
pub(crate) fn fetch_item(conn: &Connection, filename: &str) -> Result<Option<LibraryItem>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS}
         FROM media m
         LEFT JOIN media_stats s ON s.durable_id = m.durable_id
         WHERE m.filename = ?"
    );

    let mut stmt = conn.prepare_cached(&sql)?;
    let result = stmt.query_row([filename], LibraryItem::from_row).optional()?;

    Ok(result)
}

pub(crate) fn media_count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;
    Ok(count)
}

/// Records one play of a file. Files that are not in the catalog are ignored.
pub(crate) fn increment_play_count(conn: &Connection, filename: &str) -> Result<()> {
    let sql = "
        INSERT INTO media_stats (durable_id, play_count)
        SELECT durable_id, 1 FROM media WHERE filename = ?1
        ON CONFLICT (durable_id)
        DO UPDATE SET play_count = play_count + 1";

    let mut stmt = conn.prepare_cached(sql)?;
    stmt.execute(params![filename])?;

    Ok(())
}
