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

//! Media library access.
//!
//! The playlist builder only talks to the library through the
//! [`MediaLibrary`] trait. [`CatalogLibrary`] implements it on top of the
//! SQLite catalog populated by [`crate::db::scan`].

mod catalog;

pub(crate) use catalog::CatalogLibrary;

use std::path::{Path, PathBuf};

use anyhow::Result;
use lofty::prelude::*;
use lofty::probe::Probe;

use crate::model::{LibraryItem, MediaKind};

/// A request for library content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LibraryQuery {
    /// Items of a kind tagged with a genre.
    Genre { kind: MediaKind, genre: String },
    /// The contents of a playlist file, in order.
    Playlist(PathBuf),
    /// The immediate contents of a directory.
    Directory(PathBuf),
}

/// One result of a library query.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LibraryHit {
    Item(LibraryItem),
    Directory(PathBuf),
}

pub(crate) trait MediaLibrary {
    fn query(&self, query: &LibraryQuery) -> Result<Vec<LibraryHit>>;

    /// Reads the duration of a file from disk, for items the library has no
    /// duration for.
    fn read_duration(&self, path: &Path) -> Option<i64> {
        read_duration(path)
    }
}

/// Reads the duration in whole seconds from a media file's properties.
pub(crate) fn read_duration(path: &Path) -> Option<i64> {
    let tagged_file = Probe::open(path).and_then(|p| p.read()).ok()?;
    let secs = tagged_file.properties().duration().as_secs();
    i64::try_from(secs).ok().filter(|d| *d > 0)
}
