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

//! Persisted channel lists.
//!
//! A channel list is a line-oriented text file with a single header line
//! followed by two-line records:
//!
//! ```text
//! #EXTM3U
//! 1320,Show Name//Episode Title//Plot text
//! /media/tv/Show Name/S01E01.mkv
//! ```
//!
//! A full rebuild overwrites the file, an incremental build appends records to
//! it. Records that cannot be parsed are skipped on read.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    error::{EngineError, EngineResult},
    model::MediaEntry,
};

pub(crate) const HEADER: &str = "#EXTM3U";

/// Maximum number of characters kept for any text field of a record.
pub(crate) const MAX_FIELD_LEN: usize = 512;

const FIELD_SEPARATOR: &str = "//";

/// Location of the list file for a channel.
pub(crate) fn list_path(data_dir: &Path, channel_id: u32) -> PathBuf {
    data_dir.join(format!("channel_{}.m3u", channel_id))
}

/// Replaces control characters with spaces and truncates the text to
/// [`MAX_FIELD_LEN`] characters.
pub(crate) fn normalize_field(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(MAX_FIELD_LEN)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Formats an entry as its two record lines, without a trailing newline.
pub(crate) fn format_record(entry: &MediaEntry) -> String {
    format!(
        "{},{}{sep}{}{sep}{}\n{}",
        entry.duration,
        normalize_field(&entry.title),
        normalize_field(&entry.subtitle),
        normalize_field(&entry.description),
        entry.source_path.replace(['\n', '\r'], " "),
        sep = FIELD_SEPARATOR,
    )
}

/// Parses a record from its info line and path line.
pub(crate) fn parse_record(line_no: usize, info: &str, path: &str) -> EngineResult<MediaEntry> {
    let malformed = |reason: &str| EngineError::MalformedRecord {
        line: line_no,
        reason: reason.to_string(),
    };

    let (duration, text) = info.split_once(',').ok_or_else(|| malformed("missing ','"))?;
    let duration: i64 = duration
        .trim()
        .parse()
        .map_err(|_| malformed("duration is not a number"))?;

    let mut fields = text.splitn(3, FIELD_SEPARATOR);
    let title = fields.next().unwrap_or_default();
    let subtitle = fields.next().unwrap_or_default();
    let description = fields.next().unwrap_or_default();

    let path = path.trim();
    if path.is_empty() || path.starts_with('#') {
        return Err(malformed("missing file path"));
    }

    let mut entry = MediaEntry::new(duration, title, path).with_subtitle(subtitle);
    entry.description = description.to_string();
    Ok(entry)
}

/// Parses all records from a reader, skipping malformed ones.
///
/// Returns the entries and the number of records that were skipped.
pub(crate) fn parse_list<R: BufRead>(reader: R) -> EngineResult<(Vec<MediaEntry>, usize)> {
    let mut entries = Vec::new();
    let mut skipped = 0;

    let mut lines = reader
        .lines()
        .enumerate()
        .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()));

    let Some((header_no, header)) = lines.next() else {
        return Ok((entries, skipped));
    };
    if header?.trim() != HEADER {
        return Err(EngineError::MalformedRecord {
            line: header_no + 1,
            reason: "missing list header".into(),
        });
    }

    while let Some((line_no, info)) = lines.next() {
        let info = info?;
        let Some((_, path)) = lines.next() else {
            warn!("Truncated record at line {}", line_no + 1);
            skipped += 1;
            break;
        };
        let path = path?;

        match parse_record(line_no + 1, &info, &path) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                debug!("Skipping record: {}", e);
                skipped += 1;
            }
        }
    }

    Ok((entries, skipped))
}

/// Reads a channel list file.
pub(crate) fn read_list(path: &Path) -> EngineResult<Vec<MediaEntry>> {
    let file = File::open(path)?;
    let (entries, skipped) = parse_list(BufReader::new(file))?;
    if skipped > 0 {
        warn!("Skipped {} malformed records in {}", skipped, path.display());
    }
    Ok(entries)
}

/// Overwrites a channel list file with the given entries.
pub(crate) fn write_list(path: &Path, entries: &[MediaEntry]) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{}", HEADER)?;
    for entry in entries {
        writeln!(writer, "{}", format_record(entry))?;
    }
    writer.flush()?;

    Ok(())
}

/// Appends entries to a channel list file, creating it when it does not
/// exist yet.
pub(crate) fn append_list(path: &Path, entries: &[MediaEntry]) -> EngineResult<()> {
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    if is_new {
        return write_list(path, entries);
    }

    let mut writer = BufWriter::new(OpenOptions::new().append(true).open(path)?);
    for entry in entries {
        writeln!(writer, "{}", format_record(entry))?;
    }
    writer.flush()?;

    Ok(())
}
