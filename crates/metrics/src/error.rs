//! Error types for the icecap-metrics crate.

use icecap_area::AreaError;
use icecap_calendar::CalendarError;
use icecap_calibrate::CalibrationError;
use icecap_edge::EdgeError;
use icecap_io::IoError;
use icecap_load::LoadError;

/// Error type for all fallible operations in the icecap-metrics crate.
#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    /// Returned when one or more validation checks fail.
    #[error("{count} validation error(s): {details}")]
    Validation {
        /// Number of accumulated validation failures.
        count: usize,
        /// Human-readable summary of the failures.
        details: String,
    },

    /// Returned for an unknown metric name.
    #[error("unknown metric '{value}'")]
    UnknownMetric {
        /// The name as configured.
        value: String,
    },

    /// Returned when a metric is configured with an option it cannot honour.
    #[error("metric {metric} does not support {reason}")]
    Unsupported {
        /// Metric name.
        metric: String,
        /// The unsupported option.
        reason: String,
    },

    /// Returned when a metric needs verification data that could not be found.
    #[error("metric {metric} needs observations, none found for the verification dates")]
    MissingObservations {
        /// Metric name.
        metric: String,
    },

    /// Returned when a precomputed calibration file lacks a variable.
    #[error("calibration dataset has no variable '{name}'")]
    MissingVariable {
        /// Variable name.
        name: String,
    },

    /// Area or mask error.
    #[error(transparent)]
    Area(#[from] AreaError),

    /// Calendar error.
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    /// Calibration error.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// Ice-edge error.
    #[error(transparent)]
    Edge(#[from] EdgeError),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Loading error.
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl MetricError {
    /// A validation error from a list of problems.
    pub(crate) fn validation(problems: Vec<String>) -> Self {
        MetricError::Validation {
            count: problems.len(),
            details: problems.join("; "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unsupported() {
        let e = MetricError::Unsupported {
            metric: "crps".to_string(),
            reason: "calibration".to_string(),
        };
        assert_eq!(e.to_string(), "metric crps does not support calibration");
    }

    #[test]
    fn display_missing_observations() {
        let e = MetricError::MissingObservations {
            metric: "brier".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "metric brier needs observations, none found for the verification dates"
        );
    }

    #[test]
    fn display_validation() {
        let e = MetricError::validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(e.to_string(), "2 validation error(s): a; b");
    }

    #[test]
    fn error_is_send_sync_and_std_error() {
        fn assert_bounds<T: Send + Sync + std::error::Error>() {}
        assert_bounds::<MetricError>();
    }
}
