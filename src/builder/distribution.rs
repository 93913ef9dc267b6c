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

//! Smart Distribution.
//!
//! Picks episodes for a TV channel so that shows with huge back catalogues do
//! not crowd out the rest, then orders the picks so that episodes of the same
//! show are spread apart.
//!
//! # Organization
//!
//! * Episodes are grouped by show and each group is shuffled.
//! * Every show gets one episode (the guaranteed pass).
//! * The remaining slots are filled by weighted choice, favouring small shows
//!   and shows that have had few picks so far. With ten or more shows a
//!   per-show cap of 5% of the target applies.
//! * A greedy spacing pass orders the result.

use std::collections::HashMap;

use rand::{Rng, seq::SliceRandom};

use crate::{error::EngineResult, model::MediaEntry, token::WorkToken};

/// Minimum number of shows before the per-show cap applies.
const CAP_MIN_GROUPS: usize = 10;

/// Per-show cap as a percentage of the target size.
const CAP_PERCENT: usize = 5;

struct Group {
    episodes: Vec<MediaEntry>,
    /// Number of episodes picked so far, always the first `taken` episodes.
    taken: usize,
}

impl Group {
    fn has_remaining(&self) -> bool {
        self.taken < self.episodes.len()
    }

    fn weight(&self) -> i64 {
        let size = self.episodes.len().max(1) as i64;
        (100 / size - 10 * self.taken as i64).max(1)
    }
}

/// Selects and orders at most `target_limit` episodes.
///
/// Returns fewer than `target_limit` episodes when the shows run out or the
/// cap stops every show, which is accepted as a partial fill.
///
/// # Errors
///
/// Returns [`crate::error::EngineError::Cancelled`] if the token is cancelled
/// part way through.
pub(crate) fn distribute<R: Rng + ?Sized>(
    entries: Vec<MediaEntry>,
    target_limit: usize,
    rng: &mut R,
    token: &WorkToken,
) -> EngineResult<Vec<MediaEntry>> {
    let mut groups = group_by_show(entries);
    if groups.is_empty() || target_limit == 0 {
        return Ok(Vec::new());
    }

    let cap = (groups.len() >= CAP_MIN_GROUPS)
        .then(|| (target_limit * CAP_PERCENT / 100).max(1));

    for group in &mut groups {
        token.checkpoint()?;
        group.episodes.shuffle(rng);
    }

    let mut picked = 0;

    let mut order: Vec<usize> = (0..groups.len()).collect();
    order.shuffle(rng);
    for index in order {
        if picked >= target_limit {
            break;
        }
        groups[index].taken = 1;
        picked += 1;
    }

    let total: usize = groups.iter().map(|g| g.episodes.len()).sum();
    let mut eligible = Vec::with_capacity(groups.len());
    for _ in 0..total {
        if picked >= target_limit {
            break;
        }
        token.checkpoint()?;

        eligible.clear();
        eligible.extend(
            groups
                .iter()
                .enumerate()
                .filter(|(_, g)| g.has_remaining() && cap.is_none_or(|c| g.taken < c))
                .map(|(i, g)| (i, g.weight())),
        );
        let Some(index) = weighted_choice(&eligible, rng) else {
            break;
        };

        groups[index].taken += 1;
        picked += 1;
    }

    space_out(groups, token)
}

fn group_by_show(entries: Vec<MediaEntry>) -> Vec<Group> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for entry in entries {
        let slot = *index.entry(entry.title.clone()).or_insert_with(|| {
            groups.push(Group {
                episodes: Vec::new(),
                taken: 0,
            });
            groups.len() - 1
        });
        groups[slot].episodes.push(entry);
    }

    groups
}

/// Cumulative-weight choice over `(group, weight)` pairs, uniform when the
/// weights sum to zero.
fn weighted_choice<R: Rng + ?Sized>(eligible: &[(usize, i64)], rng: &mut R) -> Option<usize> {
    if eligible.is_empty() {
        return None;
    }

    let total: i64 = eligible.iter().map(|(_, w)| (*w).max(0)).sum();
    if total <= 0 {
        return Some(eligible[rng.random_range(0..eligible.len())].0);
    }

    let mut roll = rng.random_range(0..total);
    for (index, weight) in eligible {
        let weight = (*weight).max(0);
        if roll < weight {
            return Some(*index);
        }
        roll -= weight;
    }

    eligible.last().map(|(i, _)| *i)
}

/// Orders the picked episodes, at each step placing the show that has gone
/// longest without being placed.
///
/// The distance of a show is the number of items placed since it was last
/// placed, or the current output length if it has not been placed yet. Ties
/// go to the show with more episodes left, then to the earlier group.
fn space_out(groups: Vec<Group>, token: &WorkToken) -> EngineResult<Vec<MediaEntry>> {
    let mut queues: Vec<std::vec::IntoIter<MediaEntry>> = Vec::with_capacity(groups.len());
    let mut remaining: Vec<usize> = Vec::with_capacity(groups.len());
    for group in groups {
        remaining.push(group.taken);
        let mut episodes = group.episodes;
        episodes.truncate(group.taken);
        queues.push(episodes.into_iter());
    }

    let total: usize = remaining.iter().sum();
    let mut last_placed: Vec<Option<usize>> = vec![None; queues.len()];
    let mut output = Vec::with_capacity(total);

    while output.len() < total {
        token.checkpoint()?;

        let mut best: Option<(usize, usize)> = None;
        for (index, left) in remaining.iter().enumerate() {
            if *left == 0 {
                continue;
            }
            let distance = match last_placed[index] {
                Some(at) => output.len() - at - 1,
                None => output.len(),
            };
            let better = match best {
                None => true,
                Some((best_index, best_distance)) => {
                    distance > best_distance
                        || (distance == best_distance && *left > remaining[best_index])
                }
            };
            if better {
                best = Some((index, distance));
            }
        }

        let Some((index, _)) = best else {
            break;
        };
        let Some(entry) = queues[index].next() else {
            remaining[index] = 0;
            continue;
        };
        remaining[index] -= 1;
        last_placed[index] = Some(output.len());
        output.push(entry);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use rand::{SeedableRng, rngs::StdRng};

    fn library(shows: &[(&str, usize)]) -> Vec<MediaEntry> {
        shows
            .iter()
            .flat_map(|(show, count)| {
                (1..=*count).map(move |ep| {
                    MediaEntry::new(1_200, show, &format!("/tv/{}/{}.mkv", show, ep))
                        .with_episode(1, ep as i32)
                })
            })
            .collect()
    }

    fn count_of(entries: &[MediaEntry], show: &str) -> usize {
        entries.iter().filter(|e| e.title == show).count()
    }

    #[test]
    fn every_show_appears_once_when_there_is_room() {
        let names: Vec<String> = (0..12).map(|i| format!("Show {}", i)).collect();
        let shows: Vec<(&str, usize)> = names.iter().map(|n| (n.as_str(), 1)).collect();

        let out = distribute(
            library(&shows),
            20,
            &mut StdRng::seed_from_u64(1),
            &WorkToken::new(),
        )
        .unwrap();

        assert_eq!(out.len(), 12);
        for name in &names {
            assert_eq!(count_of(&out, name), 1);
        }
    }

    #[test]
    fn minority_shows_are_guaranteed_a_slot() {
        let mut shows = vec![("Giant", 400)];
        shows.extend([("Tiny A", 1), ("Tiny B", 2), ("Tiny C", 1)]);

        for seed in 0..20 {
            let out = distribute(
                library(&shows),
                4,
                &mut StdRng::seed_from_u64(seed),
                &WorkToken::new(),
            )
            .unwrap();
            assert_eq!(out.len(), 4);
            for (show, _) in &shows {
                assert_eq!(count_of(&out, show), 1, "seed {}", seed);
            }
        }
    }

    #[test]
    fn shows_are_capped_with_many_groups() {
        let mut shows = vec![("Long Runner", 300), ("Short", 3)];
        let names: Vec<String> = (0..10).map(|i| format!("Show {}", i)).collect();
        shows.extend(names.iter().map(|n| (n.as_str(), 40)));

        let out = distribute(
            library(&shows),
            100,
            &mut StdRng::seed_from_u64(7),
            &WorkToken::new(),
        )
        .unwrap();

        for (show, available) in &shows {
            let count = count_of(&out, show);
            assert!(count <= 5, "{} contributed {}", show, count);
            assert!(count >= 1);
            if *available <= 5 {
                assert_eq!(count, *available);
            }
        }
        // Every show hits the cap, so the fill is partial.
        assert_eq!(out.len(), 11 * 5 + 3);
    }

    #[test]
    fn small_libraries_are_not_capped() {
        let out = distribute(
            library(&[("Only", 30), ("Other", 2)]),
            100,
            &mut StdRng::seed_from_u64(3),
            &WorkToken::new(),
        )
        .unwrap();
        assert_eq!(out.len(), 32);
    }

    #[test]
    fn episodes_of_a_show_are_spread_apart() {
        let out = distribute(
            library(&[("A", 4), ("B", 4), ("C", 4)]),
            12,
            &mut StdRng::seed_from_u64(11),
            &WorkToken::new(),
        )
        .unwrap();

        assert_eq!(out.len(), 12);
        for pair in out.windows(2) {
            assert_ne!(pair[0].title, pair[1].title);
        }
    }

    #[test]
    fn uneven_shows_only_repeat_once_the_others_run_out() {
        for shows in [[("A", 6), ("B", 1), ("C", 1)], [("A", 5), ("B", 3), ("C", 1)]] {
            let total: usize = shows.iter().map(|(_, n)| n).sum();
            for seed in 0..10 {
                let out = distribute(
                    library(&shows),
                    total,
                    &mut StdRng::seed_from_u64(seed),
                    &WorkToken::new(),
                )
                .unwrap();
                assert_eq!(out.len(), total);

                for (i, pair) in out.windows(2).enumerate() {
                    if pair[0].title != pair[1].title {
                        continue;
                    }
                    for (other, count) in shows.iter().filter(|(s, _)| *s != pair[0].title) {
                        assert_eq!(
                            count_of(&out[..=i], other),
                            *count,
                            "{} repeats at {} while {} has episodes left (seed {})",
                            pair[0].title,
                            i,
                            other,
                            seed
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn spacing_places_unplaced_shows_first() {
        let groups = vec![
            Group {
                episodes: library(&[("A", 3)]),
                taken: 3,
            },
            Group {
                episodes: library(&[("B", 1)]),
                taken: 1,
            },
        ];
        let out = space_out(groups, &WorkToken::new()).unwrap();
        let titles: Vec<&str> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "A", "A"]);
    }

    #[test]
    fn weighted_choice_falls_back_to_uniform() {
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(weighted_choice(&[], &mut rng), None);
        let choice = weighted_choice(&[(3, 0), (8, 0)], &mut rng).unwrap();
        assert!(choice == 3 || choice == 8);
        assert_eq!(weighted_choice(&[(3, 0), (8, 5)], &mut rng), Some(8));
    }

    #[test]
    fn cancelled_distribution_stops() {
        let token = WorkToken::new();
        token.cancel();
        let result = distribute(
            library(&[("A", 3)]),
            10,
            &mut StdRng::seed_from_u64(1),
            &token,
        );
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }
}
