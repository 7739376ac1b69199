//! Error types for icecap-io.

use std::path::PathBuf;

/// Error type for all fallible operations in the icecap-io crate.
///
/// This enum covers file-system and NetCDF failures, CF time decoding,
/// missing variables or timesteps in cache files, and shape mismatches
/// between gridded fields.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when a required file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path that could not be found.
        path: PathBuf,
    },

    /// Wraps an error originating from the NetCDF library.
    #[error("netcdf error: {reason}")]
    Netcdf {
        /// Description of the underlying NetCDF failure.
        reason: String,
    },

    /// Wraps a file-system error while preparing output.
    #[error("i/o error at {}: {reason}", path.display())]
    FileSystem {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Description of the underlying failure.
        reason: String,
    },

    /// Returned when one or more validation checks fail.
    #[error("{count} validation error(s): {details}")]
    Validation {
        /// Number of accumulated validation failures.
        count: usize,
        /// Human-readable summary of the failures.
        details: String,
    },

    /// Returned when a required variable is not present in a file.
    #[error("variable '{name}' not found in {}", path.display())]
    MissingVariable {
        /// Name of the missing variable.
        name: String,
        /// Path to the file that was inspected.
        path: PathBuf,
    },

    /// Returned when requested dates are absent from a cache file.
    #[error("{} is missing {} requested timestep(s): {}", path.display(), missing.len(), missing.join(", "))]
    MissingTimesteps {
        /// Path to the cache file.
        path: PathBuf,
        /// Requested dates (`YYYYMMDD`) not present in the file.
        missing: Vec<String>,
    },

    /// Returned when a dimension has an unexpected size.
    #[error("dimension '{name}' mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Name of the dimension.
        name: String,
        /// Expected size.
        expected: usize,
        /// Actual size.
        got: usize,
    },

    /// Returned when a field operation names an axis the field does not have,
    /// or axes are out of canonical order.
    #[error("invalid axes for '{field}': {reason}")]
    InvalidAxes {
        /// Name of the field.
        field: String,
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a time value cannot be parsed or is out of range.
    #[error("invalid time: {reason}")]
    InvalidTime {
        /// Description of the time parsing issue.
        reason: String,
    },

    /// Returned when grid coordinates are not evenly spaced.
    #[error("{axis} coordinates are not evenly spaced")]
    NonUniformGrid {
        /// `xc` or `yc`.
        axis: String,
    },

    /// Returned when a region name is not listed in a region raster.
    #[error("region '{name}' not found in {}", path.display())]
    UnknownRegion {
        /// Requested region name.
        name: String,
        /// Region raster inspected.
        path: PathBuf,
    },
}

impl From<netcdf::Error> for IoError {
    fn from(e: netcdf::Error) -> Self {
        IoError::Netcdf {
            reason: e.to_string(),
        }
    }
}
