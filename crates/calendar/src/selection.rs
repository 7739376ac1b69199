//! Start-date selection: explicit date lists, recurring month/day dates
//! expanded over a year range, and the `A/to/B/by/N{d|m|y}` range syntax.

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::date::{format_date, parse_date, parse_month_day};
use crate::error::CalendarError;

/// Label of the single pooled set built from explicit `YYYYMMDD` dates.
pub const POOLED_LABEL: &str = "all";

/// A month/day that recurs once per year over an inclusive year range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurringDate {
    month: u32,
    day: u32,
    from_year: i32,
    to_year: i32,
}

impl RecurringDate {
    /// Create a recurring date, validating the month/day and year order.
    pub fn new(month: u32, day: u32, from_year: i32, to_year: i32) -> Result<Self, CalendarError> {
        if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            return Err(CalendarError::InvalidDate {
                value: format!("{month:02}{day:02}"),
            });
        }
        if from_year > to_year {
            return Err(CalendarError::InvalidYearRange {
                reason: format!("fromyear {from_year} after toyear {to_year}"),
            });
        }
        Ok(Self {
            month,
            day,
            from_year,
            to_year,
        })
    }

    /// The `MMDD` label used as the forecast-set key.
    pub fn label(&self) -> String {
        format!("{:02}{:02}", self.month, self.day)
    }

    /// First year of the range.
    pub fn from_year(&self) -> i32 {
        self.from_year
    }

    /// Last year of the range (inclusive).
    pub fn to_year(&self) -> i32 {
        self.to_year
    }

    /// All existing dates in the year range. Non-existent dates such as
    /// 29 February in common years are skipped.
    pub fn dates(&self) -> Vec<NaiveDate> {
        (self.from_year..=self.to_year)
            .filter_map(|y| NaiveDate::from_ymd_opt(y, self.month, self.day))
            .collect()
    }
}

/// How the start dates of a forecast evaluation are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSelection {
    /// Explicit `YYYYMMDD` dates pooled into one set labelled [`POOLED_LABEL`].
    Explicit(Vec<NaiveDate>),
    /// One set per recurring `MMDD`, each over its own year range.
    Recurring(Vec<RecurringDate>),
}

impl DateSelection {
    /// Build a selection from a configured date string and optional year lists.
    ///
    /// `from_years`/`to_years` are ignored for `YYYYMMDD` dates and must have
    /// length 1 or the number of dates for `MMDD` dates.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError`] for malformed dates, mixed date formats, or
    /// missing or mis-sized year lists.
    pub fn parse(spec: &str, from_years: &[i32], to_years: &[i32]) -> Result<Self, CalendarError> {
        let items = expand_date_list(spec)?;
        let width = items[0].len();
        if let Some(bad) = items.iter().find(|s| s.len() != width) {
            return Err(CalendarError::InvalidDate { value: bad.clone() });
        }

        match width {
            8 => {
                let dates = items
                    .iter()
                    .map(|s| parse_date(s))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DateSelection::Explicit(dates))
            }
            4 => {
                let froms = broadcast_years(from_years, items.len(), "fromyear")?;
                let tos = broadcast_years(to_years, items.len(), "toyear")?;
                let recurring = items
                    .iter()
                    .zip(froms.iter().zip(tos.iter()))
                    .map(|(s, (&from, &to))| {
                        let (month, day) = parse_month_day(s)?;
                        RecurringDate::new(month, day, from, to)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DateSelection::Recurring(recurring))
            }
            _ => Err(CalendarError::InvalidDate {
                value: items[0].clone(),
            }),
        }
    }

    /// Forecast sets as `(label, start dates)` pairs in configuration order.
    pub fn sets(&self) -> Vec<(String, Vec<NaiveDate>)> {
        match self {
            DateSelection::Explicit(dates) => vec![(POOLED_LABEL.to_string(), dates.clone())],
            DateSelection::Recurring(items) => {
                items.iter().map(|r| (r.label(), r.dates())).collect()
            }
        }
    }

    /// Number of configured date entries.
    pub fn len(&self) -> usize {
        match self {
            DateSelection::Explicit(d) => d.len(),
            DateSelection::Recurring(r) => r.len(),
        }
    }

    /// True if no dates are configured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compact label joining all configured entries with `-`, as used in
    /// calibration archive file names.
    pub fn label(&self) -> String {
        match self {
            DateSelection::Explicit(d) => d
                .iter()
                .map(|d| format_date(*d))
                .collect::<Vec<_>>()
                .join("-"),
            DateSelection::Recurring(r) => {
                r.iter().map(|r| r.label()).collect::<Vec<_>>().join("-")
            }
        }
    }

    /// Year span `(first, last)` of a recurring selection; `None` for
    /// explicit dates.
    pub fn year_span(&self) -> Option<(i32, i32)> {
        match self {
            DateSelection::Explicit(_) => None,
            DateSelection::Recurring(r) => {
                let from = r.iter().map(|r| r.from_year).min()?;
                let to = r.iter().map(|r| r.to_year).max()?;
                Some((from, to))
            }
        }
    }

    /// Year of each start date of the first set, in date-axis order.
    pub fn date_years(&self) -> Vec<i32> {
        self.sets()
            .first()
            .map(|(_, dates)| dates.iter().map(|d| d.year()).collect())
            .unwrap_or_default()
    }
}

fn broadcast_years(years: &[i32], n: usize, what: &str) -> Result<Vec<i32>, CalendarError> {
    match years.len() {
        0 => Err(CalendarError::InvalidYearRange {
            reason: format!("{what} is required for MMDD dates"),
        }),
        1 => Ok(vec![years[0]; n]),
        len if len == n => Ok(years.to_vec()),
        len => Err(CalendarError::InvalidYearRange {
            reason: format!("length of {what} must be 1 or {n}, got {len}"),
        }),
    }
}

/// Expand a configured date entry into a list of date strings.
///
/// Accepts a comma-separated list (`"20200101,20200108"`, `"0101,0201"`) or
/// a range `A/to/B/by/N{d|m|y}` where `A` and `B` are both `YYYYMMDD` or
/// both `MMDD`. `MMDD` ranges are stepped through a leap year so 29 February
/// is reachable.
pub fn expand_date_list(spec: &str) -> Result<Vec<String>, CalendarError> {
    let range_err = |reason: &str| CalendarError::InvalidDateRange {
        value: spec.to_string(),
        reason: reason.to_string(),
    };

    if !spec.contains("/to/") {
        let items: Vec<String> = spec
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if items.is_empty() {
            return Err(range_err("no dates given"));
        }
        return Ok(items);
    }

    let (range, step) = spec
        .split_once("/by/")
        .ok_or_else(|| range_err("missing '/by/' step"))?;
    let step = step.trim();
    let unit = step.chars().last().ok_or_else(|| range_err("empty step"))?;
    let count: u32 = step[..step.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| range_err("step must be a positive integer followed by d, m or y"))?;
    if count == 0 {
        return Err(range_err("step must be positive"));
    }

    let (start, end) = range
        .split_once("/to/")
        .ok_or_else(|| range_err("missing '/to/'"))?;
    let (start, end) = (start.trim(), end.trim());
    if start.len() != end.len() {
        return Err(range_err("start and end must use the same format"));
    }

    let month_day = start.len() == 4;
    let (first, last) = match start.len() {
        4 => (
            parse_date(&format!("2000{start}"))?,
            parse_date(&format!("2000{end}"))?,
        ),
        8 => (parse_date(start)?, parse_date(end)?),
        _ => return Err(range_err("dates must be YYYYMMDD or MMDD")),
    };

    let mut out = Vec::new();
    let mut current = first;
    while current <= last {
        let s = format_date(current);
        out.push(if month_day { s[4..].to_string() } else { s });
        let next = match unit {
            'd' => current.checked_add_days(Days::new(u64::from(count))),
            'm' => current.checked_add_months(Months::new(count)),
            'y' => current.checked_add_months(Months::new(count * 12)),
            _ => return Err(range_err("step unit must be d, m or y")),
        };
        current = next.ok_or_else(|| range_err("date overflow"))?;
    }

    if out.is_empty() {
        return Err(range_err("range contains no dates"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_list_is_trimmed() {
        let items = expand_date_list("20200101, 20200108 ,").unwrap();
        assert_eq!(items, vec!["20200101", "20200108"]);
    }

    #[test]
    fn daily_range_of_full_dates() {
        let items = expand_date_list("20200101/to/20200115/by/7d").unwrap();
        assert_eq!(items, vec!["20200101", "20200108", "20200115"]);
    }

    #[test]
    fn monthly_range_of_month_days() {
        let items = expand_date_list("0101/to/0401/by/1m").unwrap();
        assert_eq!(items, vec!["0101", "0201", "0301", "0401"]);
    }

    #[test]
    fn range_requires_by() {
        let err = expand_date_list("0101/to/0401").unwrap_err();
        assert!(matches!(err, CalendarError::InvalidDateRange { .. }));
    }

    #[test]
    fn range_rejects_unknown_unit() {
        assert!(expand_date_list("0101/to/0401/by/1w").is_err());
    }

    #[test]
    fn explicit_selection_pools_into_one_set() {
        let sel = DateSelection::parse("20200101,20210101", &[], &[]).unwrap();
        let sets = sel.sets();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].0, POOLED_LABEL);
        assert_eq!(sets[0].1.len(), 2);
        assert_eq!(sel.date_years(), vec![2020, 2021]);
        assert!(sel.year_span().is_none());
    }

    #[test]
    fn recurring_selection_one_set_per_month_day() {
        let sel = DateSelection::parse("0101,0201", &[2000], &[2002]).unwrap();
        let sets = sel.sets();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].0, "0101");
        assert_eq!(sets[1].0, "0201");
        assert_eq!(sets[1].1.len(), 3);
        assert_eq!(sel.year_span(), Some((2000, 2002)));
        assert_eq!(sel.label(), "0101-0201");
    }

    #[test]
    fn recurring_leap_day_skips_common_years() {
        let sel = DateSelection::parse("0229", &[2019], &[2021]).unwrap();
        let sets = sel.sets();
        assert_eq!(sets[0].1, vec![NaiveDate::from_ymd_opt(2020, 2, 29).unwrap()]);
    }

    #[test]
    fn recurring_requires_years() {
        let err = DateSelection::parse("0101", &[], &[]).unwrap_err();
        assert!(matches!(err, CalendarError::InvalidYearRange { .. }));
    }

    #[test]
    fn recurring_year_lists_must_match_length() {
        let err = DateSelection::parse("0101,0201,0301", &[2000, 2001], &[2005]).unwrap_err();
        assert!(err.to_string().contains("length of fromyear"));
    }

    #[test]
    fn mixed_formats_rejected() {
        assert!(DateSelection::parse("0101,20200101", &[2000], &[2001]).is_err());
    }
}
