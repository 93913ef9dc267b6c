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

//! Rule persistence.
//!
//! In the configuration file a rule is an id and a list of positional option
//! strings. Options are parsed into the typed rule when the configuration is
//! loaded, so a malformed rule is reported once, at load time, instead of
//! failing every time it runs.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    model::ModeFlag,
    rules::{
        ChannelRule, Rule,
        builtin::{
            DisableChannelRule, ExcludeNameRule, ForceModeRule, InterleaveRule,
            LimitDurationRule, OrderAirDateRule, PlotKeywordRule, RenameRule, WatchedRule,
        },
    },
};

/// A rule as written in the configuration file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub(crate) struct RuleConfig {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) options: Vec<String>,
}

#[cfg(test)]
impl RuleConfig {
    pub(crate) fn new(id: &str, options: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub(crate) enum RuleConfigError {
    #[error("unknown rule id")]
    UnknownRule,

    #[error("missing option {0}")]
    MissingOption(usize),

    #[error("option {index} ('{value}') is invalid: {reason}")]
    InvalidOption {
        index: usize,
        value: String,
        reason: &'static str,
    },
}

/// Positional access to option strings.
struct Options<'a>(&'a [String]);

impl Options<'_> {
    fn text(&self, index: usize) -> Result<&str, RuleConfigError> {
        self.0
            .get(index)
            .map(|s| s.as_str())
            .ok_or(RuleConfigError::MissingOption(index))
    }

    fn parse<T: FromStr>(&self, index: usize) -> Result<T, RuleConfigError> {
        let value = self.text(index)?;
        value.trim().parse().map_err(|_| RuleConfigError::InvalidOption {
            index,
            value: value.to_string(),
            reason: "not a number",
        })
    }

    fn parse_or<T: FromStr>(&self, index: usize, default: T) -> Result<T, RuleConfigError> {
        if index < self.0.len() {
            self.parse(index)
        } else {
            Ok(default)
        }
    }

    fn invalid(&self, index: usize, reason: &'static str) -> RuleConfigError {
        RuleConfigError::InvalidOption {
            index,
            value: self.0.get(index).cloned().unwrap_or_default(),
            reason,
        }
    }
}

impl Rule {
    /// Validates a configured rule and builds its typed form.
    pub(crate) fn from_config(config: &RuleConfig) -> Result<Rule, RuleConfigError> {
        let opts = Options(&config.options);

        let rule = match config.id.as_str() {
            "rename" => Rule::Rename(RenameRule {
                name: opts.text(0)?.to_string(),
            }),
            "exclude_name" => {
                let pattern = opts.text(0)?;
                if pattern.trim().is_empty() {
                    return Err(opts.invalid(0, "empty pattern"));
                }
                Rule::ExcludeName(ExcludeNameRule::new(pattern))
            }
            "only_watched" => Rule::Watched(WatchedRule { keep_watched: true }),
            "only_unwatched" => Rule::Watched(WatchedRule { keep_watched: false }),
            "disable" => Rule::DisableChannel(DisableChannelRule),
            "interleave" => {
                let channel: u32 = opts.parse(0)?;
                let min: usize = opts.parse(1)?;
                let max: usize = opts.parse_or(2, min)?;
                let start_episode: usize = opts.parse_or(3, 1)?;
                if channel == 0 {
                    return Err(opts.invalid(0, "channels start at 1"));
                }
                if min == 0 {
                    return Err(opts.invalid(1, "interval must be at least 1"));
                }
                if max < min {
                    return Err(opts.invalid(2, "maximum is below minimum"));
                }
                Rule::Interleave(InterleaveRule {
                    channel,
                    min,
                    max,
                    start_episode: start_episode.max(1),
                })
            }
            "order_air_date" => Rule::OrderAirDate(OrderAirDateRule),
            "limit_duration" => {
                let min_minutes: i64 = opts.parse(0)?;
                let max_minutes: i64 = opts.parse(1)?;
                if min_minutes < 0 {
                    return Err(opts.invalid(0, "negative duration"));
                }
                if max_minutes < min_minutes {
                    return Err(opts.invalid(1, "maximum is below minimum"));
                }
                Rule::LimitDuration(LimitDurationRule {
                    min_minutes,
                    max_minutes,
                })
            }
            "plot_exclude" => {
                let keywords: Vec<&str> = opts.text(0)?.split(',').collect();
                let rule = PlotKeywordRule::new(&keywords);
                if rule.options()[0].is_empty() {
                    return Err(opts.invalid(0, "no keywords"));
                }
                Rule::PlotKeyword(rule)
            }
            "force_mode" => {
                let flag = ModeFlag::parse(opts.text(0)?)
                    .ok_or_else(|| opts.invalid(0, "unknown mode"))?;
                let enabled = match opts.text(1).unwrap_or("on").trim() {
                    "on" | "true" | "1" => true,
                    "off" | "false" | "0" => false,
                    _ => return Err(opts.invalid(1, "expected on or off")),
                };
                Rule::ForceMode(ForceModeRule { flag, enabled })
            }
            _ => return Err(RuleConfigError::UnknownRule),
        };

        Ok(rule)
    }

    /// Writes the rule back in its configuration form.
    pub(crate) fn to_config(&self) -> RuleConfig {
        RuleConfig {
            id: self.id().to_string(),
            options: self.options(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ChannelRule;

    #[test]
    fn known_rules_load_with_typed_options() {
        let rule = Rule::from_config(&RuleConfig::new("interleave", &["3", "2", "4"])).unwrap();
        assert_eq!(
            rule,
            Rule::Interleave(InterleaveRule {
                channel: 3,
                min: 2,
                max: 4,
                start_episode: 1
            })
        );

        let rule = Rule::from_config(&RuleConfig::new("force_mode", &["random"])).unwrap();
        assert_eq!(
            rule,
            Rule::ForceMode(ForceModeRule {
                flag: ModeFlag::Random,
                enabled: true
            })
        );
    }

    #[test]
    fn invalid_options_are_rejected_at_load() {
        assert_eq!(
            Rule::from_config(&RuleConfig::new("rename", &[])),
            Err(RuleConfigError::MissingOption(0))
        );
        assert!(matches!(
            Rule::from_config(&RuleConfig::new("limit_duration", &["30", "10"])),
            Err(RuleConfigError::InvalidOption { index: 1, .. })
        ));
        assert!(matches!(
            Rule::from_config(&RuleConfig::new("interleave", &["two", "1"])),
            Err(RuleConfigError::InvalidOption { index: 0, .. })
        ));
        assert!(matches!(
            Rule::from_config(&RuleConfig::new("interleave", &["2", "0"])),
            Err(RuleConfigError::InvalidOption { index: 1, .. })
        ));
        assert!(matches!(
            Rule::from_config(&RuleConfig::new("plot_exclude", &[" , "])),
            Err(RuleConfigError::InvalidOption { index: 0, .. })
        ));
        assert_eq!(
            Rule::from_config(&RuleConfig::new("shuffle_everything", &[])),
            Err(RuleConfigError::UnknownRule)
        );
    }

    #[test]
    fn defaulted_options_are_written_explicitly() {
        let rule = Rule::from_config(&RuleConfig::new("interleave", &["2", "3"])).unwrap();
        assert_eq!(
            rule.to_config(),
            RuleConfig::new("interleave", &["2", "3", "3", "1"])
        );
    }

    #[test]
    fn plot_keywords_are_normalised() {
        let Rule::PlotKeyword(rule) =
            Rule::from_config(&RuleConfig::new("plot_exclude", &["War, HORROR,"])).unwrap()
        else {
            panic!("expected plot rule");
        };
        assert_eq!(rule.options(), vec!["war,horror".to_string()]);
    }
}
