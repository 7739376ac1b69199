//! Temporal averaging over lead-time blocks or calendar months.
//!
//! Configured as `kind:timescale:value`:
//!
//! | Spec | Effect |
//! |------|--------|
//! | `data:days:N` | loader averages complete `N`-day lead blocks per file |
//! | `score:days:N` | scores are averaged over the same blocks afterwards |
//! | `data:months:a-b` | loader averages each selected month per file |
//! | `score:months:a-b` | loader keeps daily steps labelled by month; scores averaged per month |

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use icecap_calendar::{LeadTimeSpec, days_in_month, is_leap_day};
use icecap_io::{Dim, Field};
use icecap_stats::nanmean;

use crate::error::LoadError;

/// Where the averaging is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AverageStage {
    /// Averaged while loading, before scoring.
    Data,
    /// Scores are averaged after computation.
    Score,
}

/// Averaging period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timescale {
    /// Blocks of `N` leads aligned to multiples of `N`.
    Days(usize),
    /// 0-based month indices relative to the first month in the data.
    Months(Vec<usize>),
}

/// Parsed temporal-average specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalAverage {
    raw: String,
    stage: AverageStage,
    timescale: Timescale,
}

impl TemporalAverage {
    /// Parse `data|score : days|months : value`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidTemporalAverage`] for malformed input.
    pub fn parse(value: &str) -> Result<Self, LoadError> {
        let invalid = |reason: String| LoadError::InvalidTemporalAverage {
            value: value.to_string(),
            reason,
        };
        let parts: Vec<&str> = value.split(':').collect();
        let [stage, scale, amount] = parts.as_slice() else {
            return Err(invalid("expected kind:timescale:value".to_string()));
        };
        let stage = match *stage {
            "data" => AverageStage::Data,
            "score" => AverageStage::Score,
            other => return Err(invalid(format!("unknown kind '{other}'"))),
        };
        let numbers = amount
            .split('-')
            .map(|s| s.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid(format!("bad value '{amount}': {e}")))?;

        let timescale = match *scale {
            "days" => match numbers.as_slice() {
                [n] if *n > 0 => Timescale::Days(*n),
                _ => return Err(invalid("days needs one positive block length".to_string())),
            },
            "months" => match numbers.as_slice() {
                [a] if *a > 0 => Timescale::Months(vec![a - 1]),
                [a, b] if *a > 0 && a <= b => Timescale::Months((a - 1..*b).collect()),
                _ => return Err(invalid("months needs a or a-b with 1 <= a <= b".to_string())),
            },
            other => return Err(invalid(format!("unknown timescale '{other}'"))),
        };
        Ok(Self {
            raw: value.to_string(),
            stage,
            timescale,
        })
    }

    /// Stage at which averaging happens.
    pub fn stage(&self) -> AverageStage {
        self.stage
    }

    /// Averaging period.
    pub fn timescale(&self) -> &Timescale {
        &self.timescale
    }

    /// Temporal averaging only works on contiguous range targets.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidTemporalAverage`] for index targets.
    pub fn check_target(&self, target: &LeadTimeSpec) -> Result<(), LoadError> {
        if target.is_range() {
            Ok(())
        } else {
            Err(LoadError::InvalidTemporalAverage {
                value: self.raw.clone(),
                reason: format!("requires a range target (r:...), got '{target}'"),
            })
        }
    }

    /// Average computed scores when configured for the score stage.
    /// Data-stage averages return the field unchanged.
    pub fn apply_to_scores(&self, scores: &Field) -> Result<Field, LoadError> {
        match (self.stage, &self.timescale) {
            (AverageStage::Data, _) => Ok(scores.clone()),
            (AverageStage::Score, Timescale::Days(n)) => average_lead_blocks(scores, *n),
            (AverageStage::Score, Timescale::Months(_)) => average_by_label(scores),
        }
    }
}

impl fmt::Display for TemporalAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Mean over complete lead blocks `[kN, (k+1)N - 1]`, labelled by each
/// block's last lead. Incomplete blocks are dropped.
///
/// # Errors
///
/// Returns [`LoadError::InvalidTemporalAverage`] if no block is complete.
pub fn average_lead_blocks(field: &Field, n: usize) -> Result<Field, LoadError> {
    let mut blocks: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &lead) in field.time().iter().enumerate() {
        if lead >= 0 {
            blocks.entry(lead / n as i64).or_default().push(i);
        }
    }
    let complete: Vec<(i64, Vec<usize>)> = blocks.into_iter().filter(|(_, idx)| idx.len() == n).collect();
    if complete.is_empty() {
        return Err(LoadError::InvalidTemporalAverage {
            value: format!("days:{n}"),
            reason: format!("no complete block of {n} leads in {:?}", field.time()),
        });
    }

    let mut means = Vec::with_capacity(complete.len());
    let mut labels = Vec::with_capacity(complete.len());
    for (k, idx) in &complete {
        let block = field.select(Dim::Time, idx)?;
        means.push(block.reduce(Dim::Time, |v| v.iter().sum::<f64>() / v.len() as f64));
        labels.push((k + 1) * n as i64 - 1);
    }
    Ok(Field::stack(&means, Dim::Time)?.with_time(labels)?)
}

/// NaN-skipping mean over time steps sharing a label, in label order.
pub fn average_by_label(field: &Field) -> Result<Field, LoadError> {
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in field.time().iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }
    if groups.is_empty() {
        return Ok(field.clone());
    }
    let mut means = Vec::with_capacity(groups.len());
    for idx in groups.values() {
        means.push(field.select(Dim::Time, idx)?.reduce(Dim::Time, nanmean));
    }
    let labels = groups.into_keys().collect();
    Ok(Field::stack(&means, Dim::Time)?.with_time(labels)?)
}

/// Indices of `dates` falling in the selected months, with each one's
/// month label. 29 February is dropped after the completeness check.
///
/// # Errors
///
/// Returns [`LoadError::IncompleteMonth`] if a selected month is not in the
/// data or not every day of it is present.
pub fn select_months(dates: &[NaiveDate], months: &[usize]) -> Result<(Vec<usize>, Vec<i64>), LoadError> {
    let mut unique: Vec<(i32, u32)> = Vec::new();
    let mut counts: Vec<u32> = Vec::new();
    for d in dates {
        let ym = (d.year(), d.month());
        match unique.iter().position(|u| *u == ym) {
            Some(i) => counts[i] += 1,
            None => {
                unique.push(ym);
                counts.push(1);
            }
        }
    }

    for &m in months {
        let Some(&(year, month)) = unique.get(m) else {
            return Err(LoadError::IncompleteMonth {
                month: m + 1,
                reason: format!("only {} month(s) in data", unique.len()),
            });
        };
        let expected = days_in_month(year, month);
        if counts[m] != expected {
            return Err(LoadError::IncompleteMonth {
                month: m + 1,
                reason: format!("{} of {expected} days in {year}-{month:02}", counts[m]),
            });
        }
    }

    let mut indices = Vec::new();
    let mut labels = Vec::new();
    for (i, d) in dates.iter().enumerate() {
        if is_leap_day(*d) {
            continue;
        }
        let ym = (d.year(), d.month());
        if let Some(&m) = months.iter().find(|&&m| unique[m] == ym) {
            indices.push(i);
            labels.push(m as i64);
        }
    }
    Ok((indices, labels))
}
