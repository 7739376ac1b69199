//! Region selection: longitude/latitude boxes and named NSIDC regions.

use std::path::{Path, PathBuf};

use icecap_io::{Grid, RegionRaster};
use ndarray::{Array2, Zip};
use tracing::info;

use crate::error::AreaError;
use crate::mask::Mask;

// ---------------------------------------------------------------------------
// BoundingBox
// ---------------------------------------------------------------------------

/// Longitude/latitude box `lon1,lon2,lat1,lat2` in degrees.
///
/// With `lon1 > lon2` the box crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lon1: f64,
    pub lon2: f64,
    pub lat1: f64,
    pub lat2: f64,
}

impl BoundingBox {
    /// Parse a comma-separated extent `lon1,lon2,lat1,lat2`.
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::InvalidRegion`] unless there are exactly four
    /// numbers with `lat1 <= lat2`.
    pub fn parse(extent: &str) -> Result<Self, AreaError> {
        let invalid = |reason: String| AreaError::InvalidRegion {
            value: extent.to_string(),
            reason,
        };
        let values = extent
            .split(',')
            .map(|s| s.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid(e.to_string()))?;
        let [lon1, lon2, lat1, lat2] = values[..] else {
            return Err(invalid(format!("expected 4 values, got {}", values.len())));
        };
        if lat1 > lat2 {
            return Err(invalid(format!("lat1 {lat1} is north of lat2 {lat2}")));
        }
        Ok(Self { lon1, lon2, lat1, lat2 })
    }

    /// True if the box wraps across 180°.
    pub fn crosses_antimeridian(&self) -> bool {
        self.lon1 > self.lon2
    }

    /// Whether `(lon, lat)` lies in the box.
    ///
    /// Ordinary boxes are closed on all sides. Antimeridian boxes select
    /// `lat1 < lat <= lat2` and `lon` in `(lon1, 180] ∪ [-180, lon2)`.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if self.crosses_antimeridian() {
            let lat_ok = lat > self.lat1 && lat <= self.lat2;
            let east = lon > self.lon1 && lon <= 180.0;
            let west = (-180.0..self.lon2).contains(&lon);
            lat_ok && (east || west)
        } else {
            (self.lat1..=self.lat2).contains(&lat) && (self.lon1..=self.lon2).contains(&lon)
        }
    }

    /// Cells of `grid` whose centre lies in the box.
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::MissingCoordinates`] if the grid has no
    /// longitude/latitude.
    pub fn cells(&self, grid: &Grid) -> Result<Array2<bool>, AreaError> {
        let (Some(lon), Some(lat)) = (grid.lon(), grid.lat()) else {
            return Err(AreaError::MissingCoordinates {
                field: "grid".to_string(),
                what: "longitude/latitude".to_string(),
            });
        };
        Ok(Zip::from(lon).and(lat).map_collect(|&lo, &la| self.contains(lo, la)))
    }
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// Spatial restriction applied before area statistics.
#[derive(Debug, Clone)]
pub enum Region {
    /// The whole mask.
    Everywhere,
    /// A longitude/latitude box.
    Extent(BoundingBox),
    /// A named region of an NSIDC region raster.
    Nsidc {
        /// The region raster.
        raster: RegionRaster,
        /// Full or short region name.
        name: String,
    },
}

impl Region {
    /// Restrict `mask` to the region.
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::MissingCoordinates`] when a box is used on a
    /// grid without longitude/latitude, [`AreaError::Io`] for an unknown
    /// region name, and [`AreaError::Validation`] when the raster grid does
    /// not match.
    pub fn restrict(&self, mask: &Mask) -> Result<Mask, AreaError> {
        match self {
            Region::Everywhere => Ok(mask.clone()),
            Region::Extent(bbox) => {
                let grid = mask.grid().ok_or_else(|| AreaError::MissingCoordinates {
                    field: "mask".to_string(),
                    what: "grid".to_string(),
                })?;
                info!(?bbox, "selecting region");
                mask.intersect(&bbox.cells(grid)?)
            }
            Region::Nsidc { raster, name } => {
                info!(region = %name, "selecting NSIDC region");
                mask.intersect(&raster.cells(name)?)
            }
        }
    }
}

/// Location of the NSIDC region raster for a verification dataset:
/// `{etc_dir}/nsidc_{verif_name without "-grid"}.nc`.
pub fn nsidc_raster_path(etc_dir: &Path, verif_name: &str) -> PathBuf {
    etc_dir.join(format!("nsidc_{}.nc", verif_name.replace("-grid", "")))
}
