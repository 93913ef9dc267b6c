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

//! Pause and cancellation for background work.
//!
//! A [`WorkToken`] is shared between the foreground and the maintenance
//! worker. Long-running operations call [`WorkToken::checkpoint`] at every
//! yield point, which blocks while the token is paused and fails with
//! [`EngineError::Cancelled`] once it has been cancelled.

use std::sync::{Arc, Condvar, Mutex};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Default)]
struct TokenState {
    paused: bool,
    cancelled: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct WorkToken {
    inner: Arc<(Mutex<TokenState>, Condvar)>,
}

impl WorkToken {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn pause(&self) {
        self.update(|state| state.paused = true);
    }

    pub(crate) fn resume(&self) {
        self.update(|state| state.paused = false);
    }

    pub(crate) fn cancel(&self) {
        self.update(|state| state.cancelled = true);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.inner.0.lock().map(|s| s.cancelled).unwrap_or(true)
    }

    #[cfg(test)]
    pub(crate) fn is_paused(&self) -> bool {
        self.inner.0.lock().map(|s| s.paused).unwrap_or(false)
    }

    /// Yield point: waits while paused, fails once cancelled.
    pub(crate) fn checkpoint(&self) -> EngineResult<()> {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().map_err(|_| EngineError::Cancelled)?;
        while state.paused && !state.cancelled {
            state = cvar.wait(state).map_err(|_| EngineError::Cancelled)?;
        }

        if state.cancelled {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Pauses the token for the lifetime of the returned guard.
    pub(crate) fn pause_guard(&self) -> PauseGuard {
        self.pause();
        PauseGuard {
            token: self.clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut TokenState)) {
        let (lock, cvar) = &*self.inner;
        if let Ok(mut state) = lock.lock() {
            f(&mut state);
        }
        cvar.notify_all();
    }
}

/// Resumes the token when dropped.
pub(crate) struct PauseGuard {
    token: WorkToken,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.token.resume();
    }
}
