//! Per-date cache files and the store abstraction the loader reads through.
//!
//! Forecast files hold one member of one start date; observation files hold
//! one calendar date. Both carry a single `(time, yc, xc)` data variable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use icecap_calendar::format_date;
use tracing::debug;

use crate::error::IoError;
use crate::field::{Dim, Field};
use crate::netcdf_read;

/// Dates and values read from one cache file.
///
/// `field` has axes `[Time, Y, X]` with one time step per entry in `dates`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Calendar date of each time step.
    pub dates: Vec<NaiveDate>,
    /// Values with attached grid metadata.
    pub field: Field,
}

impl CacheEntry {
    /// Keep only the requested dates, in request order.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingTimesteps`] if any date is absent.
    pub fn select_dates(&self, requested: &[NaiveDate], path: &Path) -> Result<CacheEntry, IoError> {
        let mut indices = Vec::with_capacity(requested.len());
        let mut missing = Vec::new();
        for date in requested {
            match self.dates.iter().position(|d| d == date) {
                Some(i) => indices.push(i),
                None => missing.push(format_date(*date)),
            }
        }
        if !missing.is_empty() {
            return Err(IoError::MissingTimesteps {
                path: path.to_path_buf(),
                missing,
            });
        }
        Ok(CacheEntry {
            dates: requested.to_vec(),
            field: self.field.select(Dim::Time, &indices)?,
        })
    }
}

/// Read access to cached gridded files.
pub trait CacheStore: Send + Sync {
    /// True if a file exists at `path`.
    fn contains(&self, path: &Path) -> bool;

    /// Read the file at `path`, optionally restricted to `dates`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::FileNotFound`] for an absent file and
    /// [`IoError::MissingTimesteps`] if requested dates are absent.
    fn read(&self, path: &Path, dates: Option<&[NaiveDate]>) -> Result<CacheEntry, IoError>;
}

// ---------------------------------------------------------------------------
// NetcdfCache
// ---------------------------------------------------------------------------

/// Cache store backed by NetCDF files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfCache;

impl CacheStore for NetcdfCache {
    fn contains(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path, dates: Option<&[NaiveDate]>) -> Result<CacheEntry, IoError> {
        let file = netcdf_read::read_gridded(path)?;
        debug!(
            path = %path.display(),
            steps = file.dates.len(),
            "read cache file"
        );
        let field = Field::new("sic", vec![Dim::Time, Dim::Y, Dim::X], file.values.into_dyn())?
            .with_grid(Arc::new(file.grid))?;
        let entry = CacheEntry {
            dates: file.dates,
            field,
        };
        match dates {
            Some(requested) => entry.select_dates(requested, path),
            None => Ok(entry),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryCache
// ---------------------------------------------------------------------------

/// In-memory cache store keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: HashMap<PathBuf, CacheEntry>,
}

impl MemoryCache {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry under `path`, replacing any previous one.
    pub fn insert(&mut self, path: impl Into<PathBuf>, entry: CacheEntry) {
        self.entries.insert(path.into(), entry);
    }

    /// Number of registered files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryCache {
    fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    fn read(&self, path: &Path, dates: Option<&[NaiveDate]>) -> Result<CacheEntry, IoError> {
        let entry = self.entries.get(path).ok_or_else(|| IoError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        match dates {
            Some(requested) => entry.select_dates(requested, path),
            None => Ok(entry.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// File names
// ---------------------------------------------------------------------------

/// `{YYYYMMDD}_mem-{member:03}_{param}_{grid}.nc`
pub fn forecast_file_name(date: NaiveDate, member: usize, param: &str, grid: &str) -> String {
    format!("{}_mem-{member:03}_{param}_{grid}.nc", format_date(date))
}

/// `{YYYYMMDD}_{param}.nc`
pub fn observation_file_name(date: NaiveDate, param: &str) -> String {
    format!("{}_{param}.nc", format_date(date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(start: NaiveDate, nt: usize) -> CacheEntry {
        let data = ArrayD::from_shape_fn(IxDyn(&[nt, 1, 1]), |ix| ix[0] as f64);
        CacheEntry {
            dates: (0..nt as u64).map(|i| start + chrono::Days::new(i)).collect(),
            field: Field::new("sic", vec![Dim::Time, Dim::Y, Dim::X], data).unwrap(),
        }
    }

    #[test]
    fn file_names() {
        assert_eq!(
            forecast_file_name(date(2020, 1, 2), 7, "ci", "osi-cdr"),
            "20200102_mem-007_ci_osi-cdr.nc"
        );
        assert_eq!(observation_file_name(date(2020, 1, 2), "ci"), "20200102_ci.nc");
    }

    #[test]
    fn memory_cache_selects_requested_dates() {
        let mut cache = MemoryCache::new();
        cache.insert("/c/a.nc", entry(date(2020, 1, 1), 5));
        let got = cache
            .read(Path::new("/c/a.nc"), Some(&[date(2020, 1, 4), date(2020, 1, 2)]))
            .unwrap();
        assert_eq!(got.dates, vec![date(2020, 1, 4), date(2020, 1, 2)]);
        assert_eq!(got.field.data().as_slice().unwrap(), &[3.0, 1.0]);
    }

    #[test]
    fn memory_cache_reports_missing_timesteps() {
        let mut cache = MemoryCache::new();
        cache.insert("/c/a.nc", entry(date(2020, 1, 1), 2));
        let err = cache
            .read(Path::new("/c/a.nc"), Some(&[date(2020, 1, 2), date(2020, 1, 9)]))
            .unwrap_err();
        match err {
            IoError::MissingTimesteps { missing, .. } => assert_eq!(missing, vec!["20200109"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn memory_cache_missing_file() {
        let cache = MemoryCache::new();
        assert!(!cache.contains(Path::new("/c/none.nc")));
        assert!(matches!(
            cache.read(Path::new("/c/none.nc"), None),
            Err(IoError::FileNotFound { .. })
        ));
    }
}
