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

//! Engine error types.
//!
//! Failures are split by how far they are allowed to travel:
//!
//! * Per-item and per-rule failures ([`EngineError::MalformedRecord`],
//!   [`EngineError::RuleFailure`]) are recovered where they happen and only
//!   ever logged.
//! * Whole-channel failures ([`EngineError::SourceUnavailable`],
//!   [`EngineError::EmptyChannel`]) invalidate one channel and produce a
//!   single generic notice naming that channel.
//! * [`EngineError::AllChannelsInvalid`] is the only fatal condition.

use thiserror::Error;

/// Convenience alias for engine results.
pub(crate) type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub(crate) enum EngineError {
    #[error("channel {channel}: source '{source_name}' is unavailable")]
    SourceUnavailable { channel: u32, source_name: String },

    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("rule '{rule}' failed: {reason}")]
    RuleFailure { rule: String, reason: String },

    #[error("channel {channel} has no entries")]
    EmptyChannel { channel: u32 },

    #[error("no valid channels are available")]
    AllChannelsInvalid,

    #[error("{what} exceeded its iteration bound of {bound}")]
    BoundedLoopAbort { what: &'static str, bound: usize },

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl EngineError {
    /// Whether this failure invalidates a whole channel, as opposed to being
    /// recoverable locally or aborting the whole application.
    pub(crate) fn is_channel_failure(&self) -> bool {
        matches!(
            self,
            EngineError::SourceUnavailable { .. } | EngineError::EmptyChannel { .. }
        )
    }

    /// The message shown to the user for a failed channel. Low-level detail
    /// stays in the log.
    pub(crate) fn user_message(&self, channel: u32) -> String {
        match self {
            EngineError::AllChannelsInvalid => {
                "No channels could be built, check the configuration".to_string()
            }
            _ => format!("Channel {} could not be loaded", channel),
        }
    }
}
