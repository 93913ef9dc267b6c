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

//! Database row mapping for domain models.
//!
//! This module provides the conversion logic between raw SQLite result rows
//! and library records.

use rusqlite::{
    Result, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};

use crate::model::{LibraryItem, MediaKind};

impl LibraryItem {
    /// Maps an SQLite row to a [`LibraryItem`] instance.
    ///
    /// This is a helper function designed to be used with [`rusqlite::Statement::query_map`],
    /// the column order is the one selected by the catalog queries.
    ///
    /// # Errors
    ///
    /// Returns a [`rusqlite::Error`] if:
    /// * The row does not contain enough columns.
    /// * The data in a column cannot be converted to the required Rust type.
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            path: row.get(0)?,
            duration: row.get(1)?,
            title: row.get(2)?,
            show_title: row.get(3)?,
            season: row.get(4)?,
            episode: row.get(5)?,
            play_count: row.get(6)?,
            plot: row.get(7)?,
            album: row.get(8)?,
            artist: row.get(9)?,
            track: row.get(10)?,
            genre: row.get(11)?,
            kind: row.get(12)?,
        })
    }
}

impl ToSql for MediaKind {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        let val = match self {
            MediaKind::Episode => "episode",
            MediaKind::Movie => "movie",
            MediaKind::Song => "song",
            MediaKind::Unknown => "unknown",
        };
        Ok(ToSqlOutput::from(val))
    }
}

impl FromSql for MediaKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "episode" => Ok(MediaKind::Episode),
            "movie" => Ok(MediaKind::Movie),
            "song" => Ok(MediaKind::Song),
            "unknown" => Ok(MediaKind::Unknown),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}
