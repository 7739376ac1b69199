//! Error types for the icecap-calendar crate.

/// Error type for all fallible operations in the icecap-calendar crate.
///
/// This enum covers malformed date strings, date-range expressions that
/// cannot be expanded, and lead-time target specifications that do not
/// resolve to a strictly increasing set of day offsets.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalendarError {
    /// Returned when a date string is neither `YYYYMMDD` nor `MMDD`.
    #[error("invalid date: '{value}' (expected YYYYMMDD or MMDD)")]
    InvalidDate {
        /// The string that failed to parse.
        value: String,
    },

    /// Returned when a `A/to/B/by/N{d|m|y}` expression cannot be expanded.
    #[error("invalid date range '{value}': {reason}")]
    InvalidDateRange {
        /// The range expression as configured.
        value: String,
        /// Why the expression was rejected.
        reason: String,
    },

    /// Returned when a year range is empty or has the wrong length.
    #[error("invalid year range: {reason}")]
    InvalidYearRange {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a lead-time target cannot be parsed.
    #[error("invalid target '{value}': {reason}")]
    InvalidTarget {
        /// The target specification as configured.
        value: String,
        /// Why the target was rejected.
        reason: String,
    },

    /// Returned when a target resolves to offsets that are not strictly increasing.
    #[error("target '{value}' needs to be sorted (offsets must be strictly increasing)")]
    UnsortedTarget {
        /// The target specification as configured.
        value: String,
    },
}
