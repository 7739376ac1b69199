//! Error types for the icecap-calibrate crate.

use std::path::PathBuf;

use icecap_io::IoError;

/// Error type for all fallible operations in the icecap-calibrate crate.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    /// Returned when one or more validation checks fail.
    #[error("{count} validation error(s): {details}")]
    Validation {
        /// Number of accumulated validation failures.
        count: usize,
        /// Human-readable summary of the failures.
        details: String,
    },

    /// Returned for an unknown calibration method name.
    #[error("unknown calibration method '{value}', expected one of mean, mean+trend, anom, score")]
    UnknownMethod {
        /// The method as configured.
        value: String,
    },

    /// Returned when a verification year lies outside the calibration
    /// year axis used for trend extrapolation.
    #[error("verification year {year} is outside the calibration year axis {first}-{last}")]
    YearOutsideAxis {
        /// The offending year.
        year: i32,
        /// First year of the axis.
        first: i32,
        /// Last year of the axis.
        last: i32,
    },

    /// Returned when a precomputed calibration file is required but absent.
    #[error("calibration file {} not found", path.display())]
    MissingArchive {
        /// Expected location.
        path: PathBuf,
    },

    /// I/O error.
    #[error(transparent)]
    Io(#[from] IoError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_method() {
        let e = CalibrationError::UnknownMethod {
            value: "quantile".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "unknown calibration method 'quantile', expected one of mean, mean+trend, anom, score"
        );
    }

    #[test]
    fn display_year_outside_axis() {
        let e = CalibrationError::YearOutsideAxis {
            year: 1990,
            first: 2000,
            last: 2119,
        };
        assert_eq!(
            e.to_string(),
            "verification year 1990 is outside the calibration year axis 2000-2119"
        );
    }

    #[test]
    fn display_missing_archive() {
        let e = CalibrationError::MissingArchive {
            path: PathBuf::from("/calib/a.nc"),
        };
        assert_eq!(e.to_string(), "calibration file /calib/a.nc not found");
    }

    #[test]
    fn error_is_send_sync_and_std_error() {
        fn assert_bounds<T: Send + Sync + std::error::Error>() {}
        assert_bounds::<CalibrationError>();
    }
}
