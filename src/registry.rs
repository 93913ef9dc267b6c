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

//! The channel registry.
//!
//! One slot per channel id, each behind its own lock so that the front-end and
//! the maintenance worker only contend when they touch the same channel.
//! Access goes through short closures; callers never keep a guard.

use std::sync::{PoisonError, RwLock};

use crate::model::{Channel, ChannelKind};

pub(crate) struct ChannelRegistry {
    slots: Vec<RwLock<Channel>>,
}

impl ChannelRegistry {
    /// Creates the registry. Gaps in the id sequence get an empty, invalid
    /// placeholder slot so that a slot's index is always its id minus one.
    pub(crate) fn new(channels: Vec<Channel>) -> Self {
        let max_id = channels.iter().map(|c| c.id).max().unwrap_or(0);
        let mut slots: Vec<Option<Channel>> = (0..max_id).map(|_| None).collect();
        for channel in channels.into_iter().filter(|c| c.id > 0) {
            let index = channel.id as usize - 1;
            slots[index] = Some(channel);
        }

        let slots = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                let channel = slot.unwrap_or_else(|| {
                    let id = index as u32 + 1;
                    Channel::new(id, &format!("Channel {}", id), ChannelKind::Playlist)
                });
                RwLock::new(channel)
            })
            .collect();

        Self { slots }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, id: u32) -> Option<&RwLock<Channel>> {
        let index = (id as usize).checked_sub(1)?;
        self.slots.get(index)
    }

    pub(crate) fn read<T>(&self, id: u32, f: impl FnOnce(&Channel) -> T) -> Option<T> {
        let slot = self.slot(id)?;
        let channel = slot.read().unwrap_or_else(PoisonError::into_inner);
        Some(f(&channel))
    }

    pub(crate) fn write<T>(&self, id: u32, f: impl FnOnce(&mut Channel) -> T) -> Option<T> {
        let slot = self.slot(id)?;
        let mut channel = slot.write().unwrap_or_else(PoisonError::into_inner);
        Some(f(&mut channel))
    }

    /// A copy of the channel, for work that must not hold the lock.
    pub(crate) fn snapshot(&self, id: u32) -> Option<Channel> {
        self.read(id, Channel::clone)
    }

    /// Replaces a channel wholesale.
    pub(crate) fn replace(&self, channel: Channel) -> bool {
        let id = channel.id;
        self.write(id, move |slot| *slot = channel).is_some()
    }

    pub(crate) fn is_valid(&self, id: u32) -> bool {
        self.read(id, |c| c.is_valid && !c.is_empty()).unwrap_or(false)
    }

    /// Ids of channels that can be tuned, in ascending order.
    pub(crate) fn valid_ids(&self) -> Vec<u32> {
        (1..=self.slots.len() as u32)
            .filter(|id| self.is_valid(*id))
            .collect()
    }

    /// The valid channel `steps` away from `from`, wrapping around. Negative
    /// steps move down.
    pub(crate) fn step_valid(&self, from: u32, steps: i64) -> Option<u32> {
        let valid = self.valid_ids();
        if valid.is_empty() {
            return None;
        }

        let base = match valid.binary_search(&from) {
            Ok(index) => index as i64,
            // Between two valid channels: stepping up lands on the next one.
            Err(index) if steps > 0 => index as i64 - 1,
            Err(index) => index as i64,
        };
        let index = crate::resolver::fix_index(base + steps, valid.len());
        Some(valid[index])
    }
}
