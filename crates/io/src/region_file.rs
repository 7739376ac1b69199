//! Named-region rasters (NSIDC sea-ice regions) and additional mask rasters.

use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::debug;

use crate::error::IoError;
use crate::grid::Grid;
use crate::netcdf_read::{self, attr_as_f64s, attr_as_strings};

/// Integer-coded region raster with its code table.
#[derive(Debug, Clone)]
pub struct RegionRaster {
    path: PathBuf,
    codes: Array2<f64>,
    values: Vec<f64>,
    names: Vec<String>,
    short_names: Vec<String>,
    grid: Grid,
}

/// Read a region raster with `flag_values`, `flag_meanings` and
/// `flag_meanings_short` attributes.
///
/// # Errors
///
/// Returns [`IoError::Validation`] if an attribute is missing or the three
/// lists differ in length, and the usual NetCDF errors.
pub fn read_region_raster(path: &Path) -> Result<RegionRaster, IoError> {
    let raster = netcdf_read::read_raster(path, None)?;

    let mut problems = Vec::new();
    let values = raster
        .attr("flag_values")
        .cloned()
        .and_then(attr_as_f64s)
        .unwrap_or_else(|| {
            problems.push("missing numeric 'flag_values'".to_string());
            Vec::new()
        });
    let mut strings = |key: &str| {
        raster
            .attr(key)
            .cloned()
            .and_then(attr_as_strings)
            .unwrap_or_else(|| {
                problems.push(format!("missing '{key}'"));
                Vec::new()
            })
    };
    let names = strings("flag_meanings");
    let short_names = strings("flag_meanings_short");

    if problems.is_empty() && (names.len() != values.len() || short_names.len() != values.len()) {
        problems.push(format!(
            "{} flag_values, {} flag_meanings, {} flag_meanings_short",
            values.len(),
            names.len(),
            short_names.len()
        ));
    }
    if !problems.is_empty() {
        return Err(IoError::Validation {
            count: problems.len(),
            details: format!("{}: {}", path.display(), problems.join("; ")),
        });
    }

    debug!(path = %path.display(), regions = values.len(), "read region raster");
    Ok(RegionRaster {
        path: path.to_path_buf(),
        codes: raster.values,
        values,
        names,
        short_names,
        grid: raster.grid,
    })
}

impl RegionRaster {
    /// Code of region `name`, matched by full name, then by upper-cased
    /// short name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::UnknownRegion`] if neither matches.
    pub fn code_of(&self, name: &str) -> Result<f64, IoError> {
        let upper = name.to_uppercase();
        self.names
            .iter()
            .position(|n| n == name)
            .or_else(|| self.short_names.iter().position(|n| *n == upper))
            .map(|i| self.values[i])
            .ok_or_else(|| IoError::UnknownRegion {
                name: name.to_string(),
                path: self.path.clone(),
            })
    }

    /// Cells belonging to region `name`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::UnknownRegion`] for an unknown name.
    pub fn cells(&self, name: &str) -> Result<Array2<bool>, IoError> {
        let code = self.code_of(name)?;
        Ok(self.codes.mapv(|c| c == code))
    }

    /// Full region names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Short region names.
    pub fn short_names(&self) -> &[String] {
        &self.short_names
    }

    /// Grid of the raster.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }
}

/// Read an additional mask raster; cells with finite values are valid.
///
/// # Errors
///
/// Returns [`IoError`] if the file is missing or has no 2-D variable.
pub fn read_mask_raster(path: &Path) -> Result<Array2<bool>, IoError> {
    let raster = netcdf_read::read_raster(path, None)?;
    Ok(raster.values.mapv(f64::is_finite))
}
