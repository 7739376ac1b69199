//! Error types for the icecap-edge crate.

use icecap_io::IoError;

/// Error type for all fallible operations in the icecap-edge crate.
#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    /// Returned when one or more validation checks fail.
    #[error("{count} validation error(s): {details}")]
    Validation {
        /// Number of accumulated validation failures.
        count: usize,
        /// Human-readable summary of the failures.
        details: String,
    },

    /// Returned for a projection name without forward equations.
    #[error("unsupported projection '{name}'")]
    UnsupportedProjection {
        /// Projection name from the grid metadata.
        name: String,
    },

    /// Returned when the grid lacks metadata an operation needs.
    #[error("grid has no {what}")]
    MissingGridMetadata {
        /// What is missing, e.g. "projection".
        what: String,
    },

    /// Returned when the number of target points fits neither one point for
    /// all steps nor one point per step.
    #[error("distance needs 1 point or one per time step, got {points} points for {steps} steps")]
    PointCount {
        /// Configured points.
        points: usize,
        /// Time steps in the data.
        steps: usize,
    },

    /// I/O error.
    #[error(transparent)]
    Io(#[from] IoError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_point_count() {
        let e = EdgeError::PointCount { points: 3, steps: 5 };
        assert_eq!(
            e.to_string(),
            "distance needs 1 point or one per time step, got 3 points for 5 steps"
        );
    }

    #[test]
    fn display_unsupported_projection() {
        let e = EdgeError::UnsupportedProjection {
            name: "Mollweide".to_string(),
        };
        assert_eq!(e.to_string(), "unsupported projection 'Mollweide'");
    }

    #[test]
    fn error_is_send_sync_and_std_error() {
        fn assert_bounds<T: Send + Sync + std::error::Error>() {}
        assert_bounds::<EdgeError>();
    }
}
