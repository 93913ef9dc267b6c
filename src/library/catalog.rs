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

//! A [`MediaLibrary`] backed by the SQLite catalog.
//!
//! Genre queries are answered from the catalog. Playlists and directories are
//! read from disk, each file being matched against the catalog for its
//! metadata; files that were never indexed come back as bare records and the
//! builder reads their duration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::debug;
use walkdir::WalkDir;

use crate::{
    db::{self, scan::kind_for_extension},
    library::{LibraryHit, LibraryQuery, MediaLibrary},
    model::LibraryItem,
};

pub(crate) struct CatalogLibrary<'c> {
    conn: &'c Connection,
}

impl<'c> CatalogLibrary<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn file_hit(&self, path: &Path) -> Result<Option<LibraryHit>> {
        if path.is_dir() {
            return Ok(Some(LibraryHit::Directory(path.to_path_buf())));
        }
        let Some(kind) = kind_for_extension(path) else {
            return Ok(None);
        };
        let Some(filename) = path.to_str() else {
            return Ok(None);
        };

        let item = match db::fetch_item(self.conn, filename)? {
            Some(item) => item,
            None => {
                debug!("{} is not in the catalog", filename);
                let mut item = LibraryItem::new(filename);
                item.kind = kind;
                item
            }
        };
        Ok(Some(LibraryHit::Item(item)))
    }

    fn playlist(&self, path: &Path) -> Result<Vec<LibraryHit>> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read playlist {}", path.display()))?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut hits = Vec::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry = PathBuf::from(line);
            let entry = if entry.is_absolute() { entry } else { base.join(entry) };
            if let Some(hit) = self.file_hit(&entry)? {
                hits.push(hit);
            }
        }
        Ok(hits)
    }

    /// The direct children of a directory, in name order. Subdirectories
    /// come back as directory hits for the builder to expand.
    fn directory(&self, path: &Path) -> Result<Vec<LibraryHit>> {
        let mut hits = Vec::new();
        for entry in WalkDir::new(path).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(e).with_context(|| format!("Failed to read directory {}", path.display()));
                }
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if let Some(hit) = self.file_hit(entry.path())? {
                hits.push(hit);
            }
        }
        Ok(hits)
    }
}

impl MediaLibrary for CatalogLibrary<'_> {
    fn query(&self, query: &LibraryQuery) -> Result<Vec<LibraryHit>> {
        match query {
            LibraryQuery::Genre { kind, genre } => Ok(db::fetch_genre_items(self.conn, *kind, genre)?
                .into_iter()
                .map(LibraryHit::Item)
                .collect()),
            LibraryQuery::Playlist(path) => self.playlist(path),
            LibraryQuery::Directory(path) => self.directory(path),
        }
    }
}
