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

//! Time-position resolution.
//!
//! Maps a channel's stored state and the current time onto the item that is
//! live now and the offset into it. Resolution itself is pure, see
//! [`resolve`]; [`tune_in`] applies the result to the channel.
//!
//! Mode-specific seeding ([`seed`]) happens once, when a channel is built,
//! reset or loaded for a new session, never on an ordinary tune-in.

mod reset;

pub(crate) use reset::{ResetInputs, ResetPolicy, should_rebuild};

use rand::Rng;
use tracing::{debug, warn};

use crate::{
    error::{EngineError, EngineResult},
    model::{Channel, ChannelMode, MediaEntry},
};

/// Wraps an index into `0..len`. Returns 0 for an empty list.
pub(crate) fn fix_index(index: i64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    index.rem_euclid(len as i64) as usize
}

/// One full cycle of a channel: the sum of all known durations.
pub(crate) fn loop_period(entries: &[MediaEntry]) -> i64 {
    entries.iter().map(MediaEntry::play_duration).sum()
}

/// The live position of a channel at some moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Resolution {
    pub(crate) position: usize,
    pub(crate) offset: i64,
    /// Time from the start of the starting item to the start of the resolved
    /// one, including whole skipped loops.
    pub(crate) consumed: i64,
}

/// Advances `position`/`offset` by `elapsed` seconds.
///
/// Whole loop periods are skipped arithmetically, so the remaining walk
/// visits each item at most once. A zero loop period never advances.
pub(crate) fn advance(
    entries: &[MediaEntry],
    position: usize,
    offset: i64,
    elapsed: i64,
) -> EngineResult<Resolution> {
    let len = entries.len();
    let period = loop_period(entries);
    let mut position = fix_index(position as i64, len);

    if len == 0 || period == 0 {
        return Ok(Resolution {
            position,
            offset: 0,
            consumed: 0,
        });
    }

    // Time since the start of the current item.
    let mut cursor = offset.max(0) + elapsed.max(0);

    // A whole loop lands back on the same position.
    let loops = cursor / period;
    cursor -= loops * period;
    let mut consumed = loops * period;

    let bound = len + 1;
    let mut steps = 0;
    loop {
        let duration = entries[position].play_duration();
        if cursor < duration {
            break;
        }

        steps += 1;
        if steps > bound {
            return Err(EngineError::BoundedLoopAbort {
                what: "time resolution",
                bound,
            });
        }

        cursor -= duration;
        consumed += duration;
        position = fix_index(position as i64 + 1, len);
    }

    Ok(Resolution {
        position,
        offset: cursor,
        consumed,
    })
}

/// Works out what is live on `channel` at `now` without changing it.
///
/// Paused channels and negative elapsed time (clock skew) resolve to the
/// stored state.
pub(crate) fn resolve(channel: &Channel, now: i64) -> EngineResult<Resolution> {
    let elapsed = now - channel.last_access_time;
    let elapsed = if channel.is_paused || elapsed < 0 {
        0
    } else {
        elapsed
    };

    advance(
        &channel.entries,
        channel.position,
        channel.show_time_offset,
        elapsed,
    )
}

/// Brings a channel's state up to `now`, as done when it is tuned in.
///
/// On a bounded-loop abort the state is left as it was apart from the access
/// time.
pub(crate) fn tune_in(channel: &mut Channel, now: i64) -> Resolution {
    let elapsed = now - channel.last_access_time;
    if elapsed < 0 {
        warn!(
            "Channel {}: clock moved back by {}s, keeping position",
            channel.id, -elapsed
        );
    }

    match resolve(channel, now) {
        Ok(resolution) => {
            if !channel.is_paused && elapsed > 0 {
                channel.total_time_played += elapsed;
            }
            channel.position = resolution.position;
            channel.show_time_offset = resolution.offset;
            channel.last_access_time = now;
            resolution
        }
        Err(e) => {
            warn!("Channel {}: {}", channel.id, e);
            channel.last_access_time = now;
            Resolution {
                position: channel.position,
                offset: channel.show_time_offset,
                consumed: 0,
            }
        }
    }
}

/// Moves a channel to an explicit item and offset, as a guide jump does.
///
/// `total_time_played` is realigned to the new point within the current loop,
/// so that seeding in a later session lands on the same item.
pub(crate) fn place(channel: &mut Channel, position: usize, offset: i64, now: i64) {
    let position = fix_index(position as i64, channel.entries.len());
    let offset = offset.max(0);
    let period = loop_period(&channel.entries);

    if period > 0 {
        let into_loop: i64 = channel.entries[..position]
            .iter()
            .map(MediaEntry::play_duration)
            .sum::<i64>()
            + offset;
        let loops = channel.total_time_played.max(0) / period;
        channel.total_time_played = loops * period + into_loop;
    }

    channel.position = position;
    channel.show_time_offset = offset;
    channel.last_access_time = now;
}

/// Inputs for session-level seeding.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SeedContext {
    pub(crate) now: i64,
    pub(crate) process_start: i64,
    /// Exit time of the previous session, if there was one.
    pub(crate) last_exit: Option<i64>,
}

/// Seeds a channel's position according to its mode.
///
/// * `REALTIME` adds the time the application was not running to
///   `total_time_played`.
/// * `RANDOM` starts at a uniformly random point of the loop.
/// * `RESUME` continues the stored item from the offset saved in
///   `total_time_played`, which is then reset.
/// * Otherwise the channel is placed `total_time_played` seconds into its
///   list.
/// * `ALWAYSPAUSE` pauses the channel afterwards.
pub(crate) fn seed<R: Rng + ?Sized>(channel: &mut Channel, ctx: &SeedContext, rng: &mut R) {
    let period = loop_period(&channel.entries);

    if channel.mode.contains(ChannelMode::REALTIME) {
        if let Some(last_exit) = ctx.last_exit {
            channel.total_time_played += (ctx.process_start - last_exit).max(0);
        }
    }

    let (position, offset) = if channel.mode.contains(ChannelMode::RANDOM) {
        let offset = if period > 0 {
            rng.random_range(0..period)
        } else {
            0
        };
        (0, offset)
    } else if channel.mode.contains(ChannelMode::RESUME) {
        let offset = channel.total_time_played;
        channel.total_time_played = 0;
        (channel.position, offset)
    } else {
        (0, channel.total_time_played)
    };

    let resolution = advance(&channel.entries, position, 0, offset).unwrap_or_else(|e| {
        warn!("Channel {}: {}", channel.id, e);
        Resolution {
            position: 0,
            offset: 0,
            consumed: 0,
        }
    });

    channel.position = resolution.position;
    channel.show_time_offset = resolution.offset;
    channel.last_access_time = ctx.now;

    if channel.mode.contains(ChannelMode::ALWAYS_PAUSE) {
        channel.is_paused = true;
    }

    debug!(
        "Channel {}: seeded at position {} offset {}s",
        channel.id, channel.position, channel.show_time_offset
    );
}

/// Prepares channel state for saving at shutdown. `RESUME` channels keep the
/// offset into their current item in `total_time_played`.
pub(crate) fn prepare_for_exit(channel: &mut Channel, now: i64) {
    tune_in(channel, now);
    if channel.mode.contains(ChannelMode::RESUME) {
        channel.total_time_played = channel.show_time_offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelKind;
    use rand::{SeedableRng, rngs::StdRng};

    fn channel(durations: &[i64]) -> Channel {
        let mut channel = Channel::new(1, "One", ChannelKind::TvGenre);
        channel.entries = durations
            .iter()
            .enumerate()
            .map(|(i, d)| MediaEntry::new(*d, &format!("Item {}", i), &format!("/{}", i)))
            .collect();
        channel.is_valid = true;
        channel
    }

    #[test]
    fn fix_index_is_in_range_and_idempotent() {
        for len in 1..7usize {
            for k in -50i64..50 {
                let fixed = fix_index(k, len);
                assert!(fixed < len);
                assert_eq!(fix_index(fixed as i64, len), fixed);
            }
        }
        assert_eq!(fix_index(-1, 3), 2);
        assert_eq!(fix_index(5, 0), 0);
    }

    #[test]
    fn tune_in_after_fifteen_minutes() {
        let now = 1_000_000;
        let mut ch = channel(&[600, 600, 600]);
        ch.last_access_time = now - 900;

        let resolution = tune_in(&mut ch, now);

        assert_eq!((resolution.position, resolution.offset), (1, 300));
        assert_eq!((ch.position, ch.show_time_offset), (1, 300));
        assert_eq!(ch.last_access_time, now);
        assert_eq!(ch.total_time_played, 900);
        assert_eq!(ch.current_start(), now - 300);
    }

    #[test]
    fn resolution_is_deterministic() {
        let mut ch = channel(&[300, 1200, 45, 600]);
        ch.position = 2;
        ch.show_time_offset = 10;
        ch.last_access_time = 5_000;

        let first = resolve(&ch, 9_999).unwrap();
        for _ in 0..5 {
            assert_eq!(resolve(&ch, 9_999).unwrap(), first);
        }
    }

    #[test]
    fn consumed_plus_offset_equals_elapsed() {
        let ch = channel(&[300, 1200, 45, 600, 0, 90]);
        for elapsed in [0, 1, 299, 300, 301, 2234, 2235, 2236, 10_000, 1_000_000] {
            let r = advance(&ch.entries, 0, 0, elapsed).unwrap();
            assert_eq!(r.consumed + r.offset, elapsed, "elapsed {}", elapsed);
            assert!(r.offset < ch.entries[r.position].duration);
        }
    }

    #[test]
    fn wraps_past_end_of_list() {
        let mut ch = channel(&[100, 100]);
        ch.position = 1;
        ch.show_time_offset = 50;
        ch.last_access_time = 0;

        let r = resolve(&ch, 60).unwrap();
        assert_eq!((r.position, r.offset), (0, 10));
    }

    #[test]
    fn paused_channel_does_not_advance() {
        let mut ch = channel(&[100, 100]);
        ch.is_paused = true;
        ch.show_time_offset = 20;
        ch.last_access_time = 0;

        tune_in(&mut ch, 10_000);
        assert_eq!((ch.position, ch.show_time_offset), (0, 20));
        assert_eq!(ch.total_time_played, 0);
        assert_eq!(ch.last_access_time, 10_000);
    }

    #[test]
    fn negative_elapsed_keeps_state() {
        let mut ch = channel(&[100, 100]);
        ch.position = 1;
        ch.show_time_offset = 30;
        ch.last_access_time = 5_000;

        tune_in(&mut ch, 4_000);
        assert_eq!((ch.position, ch.show_time_offset), (1, 30));
        assert_eq!(ch.total_time_played, 0);
    }

    #[test]
    fn zero_durations_do_not_loop_forever() {
        let mut ch = channel(&[0, 0, 0]);
        ch.last_access_time = 0;
        let r = tune_in(&mut ch, 1_000_000);
        assert_eq!((r.position, r.offset), (0, 0));
    }

    #[test]
    fn zero_duration_items_are_skipped() {
        let ch = channel(&[100, 0, 0, 100]);
        let r = advance(&ch.entries, 0, 0, 150).unwrap();
        assert_eq!((r.position, r.offset), (3, 50));
    }

    #[test]
    fn offset_is_normalized() {
        let ch = channel(&[100, 100, 100]);
        let r = advance(&ch.entries, 0, 250, 0).unwrap();
        assert_eq!((r.position, r.offset), (2, 50));
    }

    #[test]
    fn seed_places_channel_by_total_time_played() {
        let mut ch = channel(&[600, 600, 600]);
        ch.total_time_played = 1800 + 700;
        let ctx = SeedContext { now: 50_000, process_start: 50_000, last_exit: Some(40_000) };

        seed(&mut ch, &ctx, &mut StdRng::seed_from_u64(1));
        assert_eq!((ch.position, ch.show_time_offset), (1, 100));
        assert_eq!(ch.last_access_time, 50_000);
        assert_eq!(ch.total_time_played, 2500);
    }

    #[test]
    fn seed_realtime_adds_downtime() {
        let mut ch = channel(&[600, 600, 600]);
        ch.mode = ChannelMode::REALTIME;
        ch.total_time_played = 100;
        let ctx = SeedContext { now: 10_700, process_start: 10_700, last_exit: Some(10_000) };

        seed(&mut ch, &ctx, &mut StdRng::seed_from_u64(1));
        assert_eq!(ch.total_time_played, 800);
        assert_eq!((ch.position, ch.show_time_offset), (1, 200));
    }

    #[test]
    fn seed_resume_continues_stored_item() {
        let mut ch = channel(&[600, 600, 600]);
        ch.mode = ChannelMode::RESUME;
        ch.position = 2;
        ch.total_time_played = 250;
        let ctx = SeedContext { now: 1, process_start: 1, last_exit: None };

        seed(&mut ch, &ctx, &mut StdRng::seed_from_u64(1));
        assert_eq!((ch.position, ch.show_time_offset), (2, 250));
        assert_eq!(ch.total_time_played, 0);
    }

    #[test]
    fn placing_keeps_whole_loops_and_reseeds_to_the_same_item() {
        let mut ch = channel(&[600, 600, 600]);
        ch.total_time_played = 2 * 1800 + 100;
        ch.last_access_time = 0;

        place(&mut ch, 2, 30, 500);
        assert_eq!((ch.position, ch.show_time_offset), (2, 30));
        assert_eq!(ch.last_access_time, 500);
        assert_eq!(ch.total_time_played, 2 * 1800 + 1230);

        let ctx = SeedContext { now: 900, process_start: 900, last_exit: Some(500) };
        seed(&mut ch, &ctx, &mut StdRng::seed_from_u64(1));
        assert_eq!((ch.position, ch.show_time_offset), (2, 30));
    }

    #[test]
    fn resume_round_trips_through_exit() {
        let mut ch = channel(&[600, 600, 600]);
        ch.mode = ChannelMode::RESUME;
        ch.position = 1;
        ch.show_time_offset = 100;
        ch.last_access_time = 1_000;

        prepare_for_exit(&mut ch, 1_050);
        assert_eq!(ch.total_time_played, 150);

        let ctx = SeedContext { now: 9_000, process_start: 9_000, last_exit: Some(1_050) };
        seed(&mut ch, &ctx, &mut StdRng::seed_from_u64(1));
        assert_eq!((ch.position, ch.show_time_offset), (1, 150));
    }

    #[test]
    fn seed_random_stays_within_loop() {
        let ctx = SeedContext { now: 0, process_start: 0, last_exit: None };
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let mut ch = channel(&[600, 300, 900]);
            ch.mode = ChannelMode::RANDOM;
            seed(&mut ch, &ctx, &mut rng);
            assert!(ch.position < 3);
            assert!(ch.show_time_offset < ch.entries[ch.position].duration);
        }
    }

    #[test]
    fn seed_always_pause_pauses() {
        let mut ch = channel(&[600]);
        ch.mode = ChannelMode::ALWAYS_PAUSE;
        let ctx = SeedContext { now: 0, process_start: 0, last_exit: None };
        seed(&mut ch, &ctx, &mut StdRng::seed_from_u64(1));
        assert!(ch.is_paused);
    }
}
