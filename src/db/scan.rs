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

//! Media library indexing and database persistence.
//!
//! This module handles the discovery of media files on the local filesystem
//! and the management of the associated catalog records.
//!
//! It utilizes `WalkDir` for efficient directory traversal and `Lofty` for
//! metadata extraction. Files whose container Lofty cannot read are still
//! indexed, with whatever can be learned from the path and an unknown
//! duration.
//!
//! # Organization
//!
//! Media directories are expected to look roughly like
//! `<root>/<genre>/<show>/Season 1/Show.Name.S01E02.Title.mkv`. The genre
//! folder is used when a file carries no genre tag, and episode numbers come
//! from the `SxxEyy` marker in the file name.
//!
//! # Performance
//!
//! Large library scans are performed within an atomic SQLite transaction to
//! maximize write throughput and ensure database integrity.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use lofty::prelude::*;
use lofty::probe::Probe;
use regex::Regex;
use rusqlite::{Connection, params};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use xxhash_rust::xxh3::xxh3_64;

use crate::{
    model::{LibraryItem, MediaKind, UNKNOWN},
    token::WorkToken,
};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "opus", "m4a", "wav"];
const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "m4v", "avi", "webm", "mov"];

static EPISODE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<show>.*?)[\s._-]*s(?P<season>\d{1,3})[\s._-]*e(?P<episode>\d{1,4})(?P<rest>.*)$")
        .expect("episode marker pattern is valid")
});

static SEASON_FOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(season|series)\s*\d+$").expect("season folder pattern is valid"));

/// Episode numbering recovered from a file name.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct EpisodeName {
    pub(crate) show: String,
    pub(crate) season: i32,
    pub(crate) episode: i32,
    pub(crate) title: String,
}

/// Parses `Show.Name.S01E02.Episode.Title` style file stems.
pub(crate) fn parse_episode_name(stem: &str) -> Option<EpisodeName> {
    let caps = EPISODE_MARKER.captures(stem)?;
    Some(EpisodeName {
        show: tidy_name(&caps["show"]),
        season: caps["season"].parse().ok()?,
        episode: caps["episode"].parse().ok()?,
        title: tidy_name(&caps["rest"]),
    })
}

fn tidy_name(raw: &str) -> String {
    raw.replace(['.', '_'], " ")
        .trim_matches(|c: char| c.is_whitespace() || c == '-')
        .to_string()
}

pub(crate) fn kind_for_extension(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Song)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Movie)
    } else {
        None
    }
}

/// Recursively scans the media directories and synchronizes the catalog.
///
/// This performs a full catalog rebuild by clearing all existing records and
/// re-indexing every root. Play counts are keyed by a durable id derived from
/// the file name and so survive the rebuild.
///
/// # Arguments
///
/// * `conn` - A mutable reference to the SQLite database connection.
/// * `roots` - The media directories to index.
/// * `token` - Checked between files so a scan can be paused or cancelled.
///
/// # Returns
///
/// Returns the total number of media files in the catalog.
///
/// # Errors
///
/// Returns an error if the transaction fails or if database constraints are
/// violated during insertion. A cancelled scan rolls back and leaves the
/// previous catalog in place.
pub(crate) fn process_media_library(
    conn: &mut Connection,
    roots: &[PathBuf],
    token: &WorkToken,
) -> Result<i64> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM media", [])?;
    tx.execute("DELETE FROM sqlite_sequence WHERE name = 'media'", [])?;

    for root in roots {
        info!("Scanning {}", root.display());

        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            token.checkpoint()?;

            let path = entry.path();
            let Some(kind) = kind_for_extension(path) else {
                continue;
            };
            let Some(filename) = path.to_str() else {
                warn!("Skipping {:?}: path contains invalid UTF-8", path);
                continue;
            };

            let item = describe(root, path, filename, kind);
            let durable_id = xxh3_64(filename.as_bytes()) as i64;

            tx.execute(
                "INSERT OR IGNORE INTO media (durable_id, kind, title, show_title, season, episode,
                    artist, album, track, genre, plot, duration, filename)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    durable_id,
                    item.kind,
                    item.title,
                    item.show_title,
                    item.season,
                    item.episode,
                    item.artist,
                    item.album,
                    item.track,
                    item.genre,
                    item.plot,
                    item.duration,
                    item.path
                ],
            )?;
        }
    }

    tx.commit().context("Failed to commit transaction")?;

    let count: i64 = conn.query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;

    Ok(count)
}

/// Builds the catalog record for one file from its tags and its location.
fn describe(root: &Path, path: &Path, filename: &str, kind: MediaKind) -> LibraryItem {
    let mut item = LibraryItem::new(filename);
    item.kind = kind;
    item.duration = UNKNOWN.into();

    match Probe::open(path).and_then(|p| p.read()) {
        Ok(tagged_file) => {
            item.duration = i64::try_from(tagged_file.properties().duration().as_secs())
                .ok()
                .filter(|d| *d > 0)
                .unwrap_or(UNKNOWN.into());

            if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
                item.title = tag.title().map(|s| s.to_string()).unwrap_or_default();
                item.artist = tag.artist().map(|s| s.to_string()).unwrap_or_default();
                item.album = tag.album().map(|s| s.to_string()).unwrap_or_default();
                item.genre = tag.genre().map(|s| s.to_string()).unwrap_or_default();
                item.plot = tag.comment().map(|s| s.to_string()).unwrap_or_default();
                item.track = tag.track().and_then(|t| i32::try_from(t).ok()).unwrap_or(UNKNOWN);
            }
        }
        Err(e) => debug!("No metadata for {:?}: {}", path, e),
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    if kind == MediaKind::Movie
        && let Some(name) = parse_episode_name(&stem)
    {
        item.kind = MediaKind::Episode;
        item.season = name.season;
        item.episode = name.episode;
        item.show_title = if name.show.is_empty() {
            show_folder(root, path).unwrap_or_else(|| stem.clone())
        } else {
            name.show
        };
        if item.title.is_empty() {
            item.title = name.title;
        }
    }

    if item.title.is_empty() {
        item.title = item.fallback_title();
    }
    if item.genre.is_empty() {
        item.genre = genre_folder(root, path).unwrap_or_default();
    }

    item
}

/// The first directory below the root, if the file is not directly in it.
fn genre_folder(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let first = components.next()?;
    components.next()?;
    Some(first.as_os_str().to_string_lossy().to_string())
}

/// The nearest enclosing folder that is not a season folder.
fn show_folder(root: &Path, path: &Path) -> Option<String> {
    path.ancestors()
        .skip(1)
        .take_while(|dir| *dir != root)
        .filter_map(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .find(|name| !SEASON_FOLDER.is_match(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fetch_genre_items, init_memory_db, media_count};
    use std::fs;

    #[test]
    fn episode_names_are_parsed() {
        assert_eq!(
            parse_episode_name("The.Good.Show.S02E11.A_Bad_Day"),
            Some(EpisodeName {
                show: "The Good Show".into(),
                season: 2,
                episode: 11,
                title: "A Bad Day".into(),
            })
        );
        assert_eq!(
            parse_episode_name("s1e3").map(|n| (n.show, n.season, n.episode)),
            Some((String::new(), 1, 3))
        );
        assert_eq!(parse_episode_name("Just A Movie (1999)"), None);
    }

    #[test]
    fn scan_indexes_by_layout_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let season = dir.path().join("Comedy").join("Show Name").join("Season 1");
        fs::create_dir_all(&season).unwrap();
        fs::write(season.join("S01E02.mkv"), b"not a real video").unwrap();
        fs::write(dir.path().join("Comedy").join("Film.mkv"), b"nor this").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut conn = init_memory_db();
        let count =
            process_media_library(&mut conn, &[dir.path().to_path_buf()], &WorkToken::new())
                .unwrap();
        assert_eq!(count, 2);
        assert_eq!(media_count(&conn).unwrap(), 2);

        let episodes = fetch_genre_items(&conn, MediaKind::Episode, "Comedy").unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].show_title, "Show Name");
        assert_eq!((episodes[0].season, episodes[0].episode), (1, 2));
        assert_eq!(episodes[0].duration, -1);

        let movies = fetch_genre_items(&conn, MediaKind::Movie, "comedy").unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].title, "Film");
    }

    #[test]
    fn cancelled_scan_keeps_previous_catalog() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), b"x").unwrap();

        let mut conn = init_memory_db();
        let roots = [dir.path().to_path_buf()];
        process_media_library(&mut conn, &roots, &WorkToken::new()).unwrap();

        let token = WorkToken::new();
        token.cancel();
        assert!(process_media_library(&mut conn, &roots, &token).is_err());
        assert_eq!(media_count(&conn).unwrap(), 1);
    }
}
