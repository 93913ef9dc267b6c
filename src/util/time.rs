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

//! Wall-clock helpers.

use chrono::{DateTime, Local, TimeZone};

/// Current time as seconds since the Unix epoch.
pub(crate) fn now() -> i64 {
    Local::now().timestamp()
}

/// Local `HH:MM` label for a guide time slot.
pub(crate) fn clock_label(timestamp: i64) -> String {
    clock_label_in(&Local, timestamp)
}

fn clock_label_in<Tz: TimeZone>(tz: &Tz, timestamp: i64) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match DateTime::from_timestamp(timestamp, 0) {
        Some(utc) => utc.with_timezone(tz).format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn labels_use_the_given_zone() {
        // 2026-03-01 18:30:00 UTC
        assert_eq!(clock_label_in(&Utc, 1_772_389_800), "18:30");
        assert_eq!(clock_label_in(&Utc, i64::MAX), "--:--");
    }
}
