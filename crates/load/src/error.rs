//! Error types for the icecap-load crate.

use icecap_calendar::CalendarError;
use icecap_io::IoError;

/// Error type for all fallible operations in the icecap-load crate.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Returned when one or more validation checks fail.
    #[error("{count} validation error(s): {details}")]
    Validation {
        /// Number of accumulated validation failures.
        count: usize,
        /// Human-readable summary of the failures.
        details: String,
    },

    /// Returned when the dates of one forecast set map to several model cycles.
    #[error("forecast dates of set '{label}' are pooled from different model cycles: {}", cycles.join(", "))]
    MixedCycles {
        /// Forecast-set label.
        label: String,
        /// Distinct cycles found.
        cycles: Vec<String>,
    },

    /// Returned when a temporal-average specification cannot be parsed.
    #[error("invalid temporal average '{value}': {reason}")]
    InvalidTemporalAverage {
        /// The specification as configured.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Returned when a selected month is absent or incomplete in the data.
    #[error("month {month} not usable for temporal averaging: {reason}")]
    IncompleteMonth {
        /// 1-based month index relative to the first month of the data.
        month: usize,
        /// Description of the problem.
        reason: String,
    },

    /// Calendar error.
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] IoError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_validation() {
        let e = LoadError::Validation {
            count: 1,
            details: "enssize must be positive".to_string(),
        };
        assert_eq!(e.to_string(), "1 validation error(s): enssize must be positive");
    }

    #[test]
    fn display_mixed_cycles() {
        let e = LoadError::MixedCycles {
            label: "all".to_string(),
            cycles: vec!["47r1".to_string(), "47r2".to_string()],
        };
        assert_eq!(
            e.to_string(),
            "forecast dates of set 'all' are pooled from different model cycles: 47r1, 47r2"
        );
    }

    #[test]
    fn display_invalid_temporal_average() {
        let e = LoadError::InvalidTemporalAverage {
            value: "data:weeks:2".to_string(),
            reason: "unknown timescale 'weeks'".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "invalid temporal average 'data:weeks:2': unknown timescale 'weeks'"
        );
    }

    #[test]
    fn display_incomplete_month() {
        let e = LoadError::IncompleteMonth {
            month: 2,
            reason: "20 of 29 days".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "month 2 not usable for temporal averaging: 20 of 29 days"
        );
    }

    #[test]
    fn from_io_error() {
        let e: LoadError = IoError::FileNotFound {
            path: "/c/a.nc".into(),
        }
        .into();
        assert_eq!(e.to_string(), "file not found: /c/a.nc");
    }

    #[test]
    fn error_is_send_sync_and_std_error() {
        fn assert_bounds<T: Send + Sync + std::error::Error>() {}
        assert_bounds::<LoadError>();
    }
}
