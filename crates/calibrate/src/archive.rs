//! Saving and reusing calibration results.
//!
//! Calibration statistics (e.g. tercile boundaries) are expensive to derive.
//! They are written next to the metric output and copied into a shared
//! calibration directory from which later runs can read them back.

use std::path::{Path, PathBuf};

use icecap_io::{Dataset, IoError, read_dataset, write_dataset};
use tracing::info;

use crate::error::CalibrationError;
use crate::method::CalibrationMethod;

/// Everything that identifies a calibration result.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveKey {
    pub plottype: String,
    pub source: String,
    pub modelname: Option<String>,
    pub expname: String,
    pub fcsystem: String,
    pub enssize: usize,
    pub mode: String,
    pub method: CalibrationMethod,
    pub target: String,
    /// Calibration dates as configured (`YYYYMMDD` or `MMDD`).
    pub dates: Vec<String>,
    /// Calibration years, when dates are `MMDD`.
    pub years: Option<(i32, i32)>,
}

impl ArchiveKey {
    /// `{plottype}_{source}_[{modelname}_]{expname}_{fcsystem}_{enssize}_{mode}_{method}_{target}_{dates}_[{from}-{to}].nc`
    pub fn file_name(&self) -> String {
        let mut name = format!("{}_{}_", self.plottype, self.source);
        if let Some(model) = &self.modelname {
            name.push_str(model);
            name.push('_');
        }
        name.push_str(&format!(
            "{}_{}_{}_{}_{}_{}_{}_",
            self.expname,
            self.fcsystem,
            self.enssize,
            self.mode,
            self.method,
            self.target,
            self.dates.join("-")
        ));
        if let Some((from, to)) = self.years {
            name.push_str(&format!("{from}-{to}"));
        }
        name.push_str(".nc");
        name
    }
}

/// Where calibration files are written and read.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationArchive {
    metric_dir: PathBuf,
    calibration_dir: Option<PathBuf>,
}

impl CalibrationArchive {
    /// Archive writing into `metric_dir`.
    pub fn new(metric_dir: impl Into<PathBuf>) -> Self {
        Self {
            metric_dir: metric_dir.into(),
            calibration_dir: None,
        }
    }

    /// Shared directory for precomputed calibration files.
    pub fn with_calibration_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.calibration_dir = dir;
        self
    }

    /// Shared calibration directory, if configured.
    pub fn calibration_dir(&self) -> Option<&Path> {
        self.calibration_dir.as_deref()
    }

    /// Write `dataset` to the metric directory and copy it to the
    /// calibration directory when one is configured. Returns the path in
    /// the metric directory.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::Io`] if writing or copying fails.
    pub fn save(&self, key: &ArchiveKey, dataset: &Dataset) -> Result<PathBuf, CalibrationError> {
        let name = key.file_name();
        let path = self.metric_dir.join(&name);
        write_dataset(&path, dataset)?;
        info!(path = %path.display(), "saved calibration file");

        if let Some(dir) = &self.calibration_dir {
            let copy = dir.join(&name);
            std::fs::create_dir_all(dir)
                .and_then(|()| std::fs::copy(&path, &copy))
                .map_err(|e| IoError::FileSystem {
                    path: copy.clone(),
                    reason: e.to_string(),
                })?;
            info!(path = %copy.display(), "copied calibration file");
        }
        Ok(path)
    }

    /// Read a precomputed calibration file from the calibration directory.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::Validation`] without a calibration
    /// directory, [`CalibrationError::MissingArchive`] if the file does not
    /// exist, and [`CalibrationError::Io`] if it cannot be read.
    pub fn load(&self, key: &ArchiveKey) -> Result<Dataset, CalibrationError> {
        let dir = self.calibration_dir.as_ref().ok_or_else(|| CalibrationError::Validation {
            count: 1,
            details: "calibration_dir must be set to use precomputed calibration files".to_string(),
        })?;
        let path = dir.join(key.file_name());
        if !path.exists() {
            return Err(CalibrationError::MissingArchive { path });
        }
        info!(path = %path.display(), "reading calibration file");
        Ok(read_dataset(&path)?)
    }
}
