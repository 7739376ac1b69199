//! Error types for the icecap-area crate.

use icecap_io::IoError;

/// Error type for all fallible operations in the icecap-area crate.
#[derive(Debug, thiserror::Error)]
pub enum AreaError {
    /// Returned when one or more validation checks fail.
    #[error("{count} validation error(s): {details}")]
    Validation {
        /// Number of accumulated validation failures.
        count: usize,
        /// Human-readable summary of the failures.
        details: String,
    },

    /// Returned when masking leaves forecast and observation with different
    /// numbers of valid cells.
    #[error("masking produces observations and forecasts with different numbers of valid cells: {first} vs {second}")]
    MaskMismatch {
        /// Valid cells of the first field.
        first: usize,
        /// Valid cells of the second field.
        second: usize,
    },

    /// Returned when an area-statistic specification cannot be parsed.
    #[error("invalid area statistic '{value}': {reason}")]
    InvalidStatistic {
        /// The specification as configured.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Returned when a region extent cannot be parsed.
    #[error("invalid region extent '{value}': {reason}")]
    InvalidRegion {
        /// The extent as configured.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Returned when an operation needs grid metadata the field lacks.
    #[error("field '{field}' has no {what}")]
    MissingCoordinates {
        /// Field name.
        field: String,
        /// What is missing, e.g. "longitude/latitude".
        what: String,
    },

    /// I/O error.
    #[error(transparent)]
    Io(#[from] IoError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mask_mismatch() {
        let e = AreaError::MaskMismatch { first: 10, second: 9 };
        assert_eq!(
            e.to_string(),
            "masking produces observations and forecasts with different numbers of valid cells: 10 vs 9"
        );
    }

    #[test]
    fn display_invalid_statistic() {
        let e = AreaError::InvalidStatistic {
            value: "data:max".to_string(),
            reason: "unknown function 'max'".to_string(),
        };
        assert_eq!(e.to_string(), "invalid area statistic 'data:max': unknown function 'max'");
    }

    #[test]
    fn display_missing_coordinates() {
        let e = AreaError::MissingCoordinates {
            field: "sic".to_string(),
            what: "longitude/latitude".to_string(),
        };
        assert_eq!(e.to_string(), "field 'sic' has no longitude/latitude");
    }

    #[test]
    fn from_io_error() {
        let e: AreaError = IoError::NonUniformGrid { axis: "xc".to_string() }.into();
        assert!(matches!(e, AreaError::Io(IoError::NonUniformGrid { .. })));
    }

    #[test]
    fn error_is_send_sync_and_std_error() {
        fn assert_bounds<T: Send + Sync + std::error::Error>() {}
        assert_bounds::<AreaError>();
    }
}
