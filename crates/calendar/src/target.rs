//! Lead-time target specifications.
//!
//! A target selects which days after initialisation are verified:
//!
//! - `i:1,3,5`: explicit 1-based lead indices (offsets `0, 2, 4`);
//! - `r:0,10`: half-open range of 0-based offsets; `r:10` is `r:0,10`.
//!
//! `i:0` resolves to offset `-1`, the day before initialisation, and is the
//! target used for persistence forecasts.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};

use crate::error::CalendarError;

/// Which syntax a target was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// `i:` explicit index list.
    Indices,
    /// `r:` half-open range.
    Range,
}

/// A parsed lead-time target with strictly increasing day offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadTimeSpec {
    raw: String,
    kind: TargetKind,
    offsets: Vec<i64>,
}

impl LeadTimeSpec {
    /// Parse a target specification.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::InvalidTarget`] for unknown kinds, empty or
    /// non-numeric values, and [`CalendarError::UnsortedTarget`] when the
    /// offsets are not strictly increasing.
    pub fn parse(value: &str) -> Result<Self, CalendarError> {
        let raw = value.trim().to_string();
        let invalid = |reason: String| CalendarError::InvalidTarget {
            value: raw.clone(),
            reason,
        };

        let (kind, body) = raw
            .split_once(':')
            .ok_or_else(|| invalid("expected '<kind>:<values>'".to_string()))?;

        let numbers = body
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| invalid(format!("'{s}' is not an integer")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if numbers.is_empty() {
            return Err(invalid("no values given".to_string()));
        }

        let (kind, offsets) = match kind {
            "i" => (
                TargetKind::Indices,
                numbers.iter().map(|n| n - 1).collect::<Vec<_>>(),
            ),
            "r" => {
                let (start, end) = match numbers.as_slice() {
                    [end] => (0, *end),
                    [start, end] => (*start, *end),
                    _ => {
                        return Err(invalid(
                            "range takes one or two values".to_string(),
                        ));
                    }
                };
                if end <= start {
                    return Err(invalid(format!("range {start}..{end} is empty")));
                }
                (TargetKind::Range, (start..end).collect())
            }
            other => return Err(invalid(format!("unknown target kind '{other}'"))),
        };

        if offsets.windows(2).any(|w| w[1] <= w[0]) {
            return Err(CalendarError::UnsortedTarget { value: raw });
        }

        Ok(Self { raw, kind, offsets })
    }

    /// The persistence target `i:0`: the observation one day before
    /// initialisation.
    pub fn persistence() -> Self {
        Self {
            raw: "i:0".to_string(),
            kind: TargetKind::Indices,
            offsets: vec![-1],
        }
    }

    /// True if this is the persistence target.
    pub fn is_persistence(&self) -> bool {
        self.offsets == [-1]
    }

    /// Target syntax.
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// True for `r:` targets.
    pub fn is_range(&self) -> bool {
        self.kind == TargetKind::Range
    }

    /// Day offsets relative to the initialisation date.
    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    /// Number of selected lead times.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// True if no lead times are selected (never the case for a parsed target).
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Calendar dates verified for a forecast initialised on `init`.
    pub fn dates_from(&self, init: NaiveDate) -> Result<Vec<NaiveDate>, CalendarError> {
        self.offsets
            .iter()
            .map(|&off| {
                let shifted = if off >= 0 {
                    init.checked_add_days(Days::new(off as u64))
                } else {
                    init.checked_sub_days(Days::new(off.unsigned_abs()))
                };
                shifted.ok_or_else(|| CalendarError::InvalidTarget {
                    value: self.raw.clone(),
                    reason: format!("offset {off} from {init} is out of range"),
                })
            })
            .collect()
    }

    /// The target as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for LeadTimeSpec {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LeadTimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_targets_are_one_based() {
        let t = LeadTimeSpec::parse("i:1,3,5").unwrap();
        assert_eq!(t.offsets(), &[0, 2, 4]);
        assert_eq!(t.kind(), TargetKind::Indices);
    }

    #[test]
    fn range_targets_are_half_open() {
        let t = LeadTimeSpec::parse("r:2,6").unwrap();
        assert_eq!(t.offsets(), &[2, 3, 4, 5]);
        assert!(t.is_range());
    }

    #[test]
    fn single_value_range_starts_at_zero() {
        let t = LeadTimeSpec::parse("r:4").unwrap();
        assert_eq!(t.offsets(), &[0, 1, 2, 3]);
    }

    #[test]
    fn unsorted_indices_rejected() {
        let err = LeadTimeSpec::parse("i:3,1").unwrap_err();
        assert!(matches!(err, CalendarError::UnsortedTarget { .. }));
    }

    #[test]
    fn duplicate_indices_rejected() {
        let err = LeadTimeSpec::parse("i:2,2").unwrap_err();
        assert!(matches!(err, CalendarError::UnsortedTarget { .. }));
    }

    #[test]
    fn empty_range_rejected() {
        assert!(LeadTimeSpec::parse("r:5,5").is_err());
    }

    #[test]
    fn unknown_kind_rejected() {
        let err = LeadTimeSpec::parse("s:1").unwrap_err();
        assert!(err.to_string().contains("unknown target kind"));
    }

    #[test]
    fn persistence_is_day_before_init() {
        let t = LeadTimeSpec::persistence();
        let init = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let dates = t.dates_from(init).unwrap();
        assert_eq!(dates, vec![NaiveDate::from_ymd_opt(2020, 2, 29).unwrap()]);
        assert!(t.is_persistence());
        assert_eq!(LeadTimeSpec::parse("i:0").unwrap(), t);
    }

    #[test]
    fn dates_from_init() {
        let t: LeadTimeSpec = "r:0,3".parse().unwrap();
        let init = NaiveDate::from_ymd_opt(2020, 12, 30).unwrap();
        let dates = t.dates_from(init).unwrap();
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(t.to_string(), "r:0,3");
    }
}
