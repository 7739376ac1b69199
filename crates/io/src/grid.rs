//! Grid coordinates and map projection metadata shared by gridded fields.

use ndarray::Array2;

use crate::error::IoError;

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Native map projection of a grid, as recorded in cache file attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Projection name, e.g. `LambertAzimuthalEqualArea`.
    pub name: String,
    /// Longitude of the projection centre in degrees.
    pub central_longitude: Option<f64>,
    /// Latitude of the projection centre in degrees.
    pub central_latitude: Option<f64>,
    /// Latitude of true scale (stereographic projections).
    pub true_scale_latitude: Option<f64>,
}

impl Projection {
    /// Projection with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            central_longitude: None,
            central_latitude: None,
            true_scale_latitude: None,
        }
    }

    /// Numeric parameters as `(attribute name, value)` pairs, skipping unset ones.
    pub fn parameters(&self) -> Vec<(&'static str, f64)> {
        [
            ("central_longitude", self.central_longitude),
            ("central_latitude", self.central_latitude),
            ("true_scale_latitude", self.true_scale_latitude),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Regular grid with projected coordinates in metres.
///
/// `lon`/`lat`, when present, have shape `(yc.len(), xc.len())`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    xc: Vec<f64>,
    yc: Vec<f64>,
    lon: Option<Array2<f64>>,
    lat: Option<Array2<f64>>,
    projection: Option<Projection>,
}

impl Grid {
    /// Create a grid from projected coordinates.
    pub fn new(xc: Vec<f64>, yc: Vec<f64>) -> Self {
        Self {
            xc,
            yc,
            lon: None,
            lat: None,
            projection: None,
        }
    }

    /// Attach geographic coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::DimensionMismatch`] if either array is not
    /// `(ny, nx)`.
    pub fn with_lonlat(mut self, lon: Array2<f64>, lat: Array2<f64>) -> Result<Self, IoError> {
        for (name, arr) in [("lon", &lon), ("lat", &lat)] {
            if arr.dim() != (self.yc.len(), self.xc.len()) {
                return Err(IoError::DimensionMismatch {
                    name: name.to_string(),
                    expected: self.yc.len() * self.xc.len(),
                    got: arr.len(),
                });
            }
        }
        self.lon = Some(lon);
        self.lat = Some(lat);
        Ok(self)
    }

    /// Attach projection metadata.
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Projected x coordinates in metres.
    pub fn xc(&self) -> &[f64] {
        &self.xc
    }

    /// Projected y coordinates in metres.
    pub fn yc(&self) -> &[f64] {
        &self.yc
    }

    /// `(ny, nx)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.yc.len(), self.xc.len())
    }

    /// 2-D longitudes, if known.
    pub fn lon(&self) -> Option<&Array2<f64>> {
        self.lon.as_ref()
    }

    /// 2-D latitudes, if known.
    pub fn lat(&self) -> Option<&Array2<f64>> {
        self.lat.as_ref()
    }

    /// Projection metadata, if known.
    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    /// Grid spacing along x in metres.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::NonUniformGrid`] if spacing varies.
    pub fn dx(&self) -> Result<f64, IoError> {
        uniform_spacing(&self.xc, "xc")
    }

    /// Grid spacing along y in metres.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::NonUniformGrid`] if spacing varies.
    pub fn dy(&self) -> Result<f64, IoError> {
        uniform_spacing(&self.yc, "yc")
    }

    /// Area of one grid cell in km²: `|dx/1000| · |dy/1000|`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::NonUniformGrid`] if either axis is unevenly spaced.
    pub fn cell_area_km2(&self) -> Result<f64, IoError> {
        Ok((self.dx()? / 1000.0).abs() * (self.dy()? / 1000.0).abs())
    }

    /// Index of the grid cell nearest to projected point `(x, y)`.
    pub fn nearest_cell(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        Some((nearest_index(&self.yc, y)?, nearest_index(&self.xc, x)?))
    }
}

fn nearest_index(coords: &[f64], value: f64) -> Option<usize> {
    coords
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - value).abs().total_cmp(&(b.1 - value).abs()))
        .map(|(i, _)| i)
}

fn uniform_spacing(coords: &[f64], axis: &str) -> Result<f64, IoError> {
    let non_uniform = || IoError::NonUniformGrid {
        axis: axis.to_string(),
    };
    let first = match coords {
        [a, b, ..] => b - a,
        _ => return Err(non_uniform()),
    };
    let tol = 1e-6 * first.abs().max(1.0);
    if coords.windows(2).any(|w| ((w[1] - w[0]) - first).abs() > tol) {
        return Err(non_uniform());
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_25km() -> Grid {
        let xc: Vec<f64> = (0..4).map(|i| -50_000.0 + 25_000.0 * i as f64).collect();
        let yc: Vec<f64> = (0..3).map(|i| 50_000.0 - 25_000.0 * i as f64).collect();
        Grid::new(xc, yc)
    }

    #[test]
    fn cell_area_from_spacing() {
        let g = grid_25km();
        assert_relative_eq!(g.cell_area_km2().unwrap(), 625.0, epsilon = 1e-9);
        assert_relative_eq!(g.dy().unwrap(), -25_000.0, epsilon = 1e-9);
    }

    #[test]
    fn non_uniform_spacing_rejected() {
        let g = Grid::new(vec![0.0, 1000.0, 2500.0], vec![0.0, 1000.0]);
        let err = g.cell_area_km2().unwrap_err();
        assert!(matches!(err, IoError::NonUniformGrid { ref axis } if axis == "xc"));
    }

    #[test]
    fn single_coordinate_has_no_spacing() {
        let g = Grid::new(vec![0.0], vec![0.0, 1.0]);
        assert!(g.dx().is_err());
    }

    #[test]
    fn lonlat_shape_checked() {
        let g = grid_25km();
        assert!(g.clone().with_lonlat(Array2::zeros((3, 4)), Array2::zeros((3, 4))).is_ok());
        assert!(g.with_lonlat(Array2::zeros((4, 3)), Array2::zeros((3, 4))).is_err());
    }

    #[test]
    fn nearest_cell_lookup() {
        let g = grid_25km();
        assert_eq!(g.nearest_cell(-1_000.0, 26_000.0), Some((1, 2)));
        assert_eq!(g.nearest_cell(1e9, -1e9), Some((2, 3)));
    }

    #[test]
    fn projection_parameters_skip_unset() {
        let mut p = Projection::named("Stereographic");
        p.central_latitude = Some(90.0);
        assert_eq!(p.parameters(), vec![("central_latitude", 90.0)]);
    }
}
