//! Distance from target points to the ice edge.

use icecap_io::{Dim, Field, Grid};
use icecap_stats::haversine_km;
use ndarray::{Array2, ArrayView2, Axis, Ix4};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::cluster::remove_small_clusters;
use crate::edge::detect_edge;
use crate::error::EdgeError;
use crate::projection::MapProjection;

/// Concentration above which a cell counts as ice.
pub const ICE_THRESHOLD: f64 = 0.15;

/// Minimum great-circle distance from a point to the ice edge, per member
/// and time step.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeDistance {
    points: Vec<(f64, f64)>,
    min_cluster_size: Option<usize>,
    threshold: f64,
}

impl EdgeDistance {
    /// Distances to `points` given as `(lon, lat)`: either one point for every
    /// time step or one point per step.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self {
            points,
            min_cluster_size: None,
            threshold: ICE_THRESHOLD,
        }
    }

    /// Ignore ice patches with fewer cells than this.
    pub fn with_min_cluster_size(mut self, min_cluster_size: Option<usize>) -> Self {
        self.min_cluster_size = min_cluster_size;
        self
    }

    /// Override the ice threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Configured target points.
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Distance in km for every member and time step of `field`.
    ///
    /// `field` must have axes `[member?, time, yc, xc]`; a missing member axis
    /// is added. The result has axes `[member, time]`. A point whose nearest
    /// cell is ice has distance 0; a slice without edge cells gives NaN.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::PointCount`] if the points do not match the time
    /// axis, [`EdgeError::MissingGridMetadata`] without grid coordinates or
    /// projection, [`EdgeError::UnsupportedProjection`] for unknown
    /// projections and [`EdgeError::Validation`] for other axes or points
    /// that cannot be projected.
    pub fn compute(&self, field: &Field) -> Result<Field, EdgeError> {
        let field = field.ensure_dim(Dim::Member)?;
        if field.dims() != [Dim::Member, Dim::Time, Dim::Y, Dim::X] {
            return Err(EdgeError::Validation {
                count: 1,
                details: format!("distance needs axes [member, time, yc, xc], got {:?}", field.dims()),
            });
        }
        let (nm, nt) = (field.shape()[0], field.shape()[1]);
        let points = self.points_per_step(nt)?;

        let grid = field.grid().ok_or_else(|| missing("grid"))?;
        let (Some(lon), Some(lat)) = (grid.lon(), grid.lat()) else {
            return Err(missing("longitude/latitude"));
        };
        let targets = target_cells(grid, &points)?;
        info!(members = nm, steps = nt, points = self.points.len(), "computing ice-edge distance");

        let data = field
            .data()
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|e| EdgeError::Validation {
                count: 1,
                details: e.to_string(),
            })?;
        let pairs: Vec<(usize, usize)> = (0..nm).flat_map(|m| (0..nt).map(move |t| (m, t))).collect();
        let values: Vec<f64> = pairs
            .par_iter()
            .map(|&(m, t)| {
                let slice = data.index_axis(Axis(0), m).index_axis_move(Axis(0), t);
                self.slice_distance(slice, targets[t], points[t], lon, lat)
            })
            .collect();

        let out = Array2::from_shape_vec((nm, nt), values).map_err(|e| EdgeError::Validation {
            count: 1,
            details: e.to_string(),
        })?;
        Ok(Field::new(field.name(), vec![Dim::Member, Dim::Time], out.into_dyn())?.with_time(field.time().to_vec())?)
    }

    fn points_per_step(&self, nt: usize) -> Result<Vec<(f64, f64)>, EdgeError> {
        match self.points.as_slice() {
            [single] => Ok(vec![*single; nt]),
            points if points.len() == nt => Ok(points.to_vec()),
            points => Err(EdgeError::PointCount {
                points: points.len(),
                steps: nt,
            }),
        }
    }

    fn slice_distance(
        &self,
        slice: ArrayView2<'_, f64>,
        target: (usize, usize),
        point: (f64, f64),
        lon: &Array2<f64>,
        lat: &Array2<f64>,
    ) -> f64 {
        let mut ice = slice.mapv(|v| if v > self.threshold { 1.0 } else { 0.0 });
        if let Some(min_size) = self.min_cluster_size {
            ice = remove_small_clusters(&ice, min_size);
        }
        if ice[target] == 1.0 {
            return 0.0;
        }
        let (plon, plat) = point;
        let nearest = detect_edge(&ice.view())
            .indexed_iter()
            .filter(|(_, e)| **e)
            .map(|(ix, _)| haversine_km(plat, plon, lat[ix], lon[ix]))
            .fold(f64::INFINITY, f64::min);
        if nearest.is_finite() {
            nearest
        } else {
            debug!(?point, "no ice edge in slice");
            f64::NAN
        }
    }
}

fn missing(what: &str) -> EdgeError {
    EdgeError::MissingGridMetadata { what: what.to_string() }
}

/// Nearest grid cell of every point in the grid's native projection.
fn target_cells(grid: &Grid, points: &[(f64, f64)]) -> Result<Vec<(usize, usize)>, EdgeError> {
    let projection = MapProjection::from_metadata(grid.projection().ok_or_else(|| missing("projection"))?)?;
    points
        .iter()
        .map(|&(lon, lat)| {
            projection
                .forward(lon, lat)
                .and_then(|(x, y)| grid.nearest_cell(x, y))
                .ok_or_else(|| EdgeError::Validation {
                    count: 1,
                    details: format!("point ({lon}, {lat}) cannot be placed on the grid"),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use icecap_io::Projection;
    use ndarray::{ArrayD, IxDyn};
    use std::sync::Arc;

    /// 5x5 plate carrée grid with 1° cells centred on (0..4, 0..4).
    fn grid() -> Arc<Grid> {
        let coords: Vec<f64> = (0..5).map(f64::from).collect();
        let lon = Array2::from_shape_fn((5, 5), |(_, i)| i as f64);
        let lat = Array2::from_shape_fn((5, 5), |(j, _)| j as f64);
        Arc::new(
            Grid::new(coords.clone(), coords)
                .with_lonlat(lon, lat)
                .unwrap()
                .with_projection(Projection::named("PlateCarree")),
        )
    }

    /// Ice in columns `>= first_ice_col` for every member/time.
    fn field(nm: usize, nt: usize, first_ice_col: usize) -> Field {
        let data = ArrayD::from_shape_fn(IxDyn(&[nm, nt, 5, 5]), |ix| if ix[3] >= first_ice_col { 0.9 } else { 0.0 });
        Field::new("sic", vec![Dim::Member, Dim::Time, Dim::Y, Dim::X], data)
            .unwrap()
            .with_grid(grid())
            .unwrap()
    }

    #[test]
    fn point_on_ice_is_zero() {
        let d = EdgeDistance::new(vec![(4.0, 2.0)]).compute(&field(2, 3, 3)).unwrap();
        assert_eq!(d.dims(), &[Dim::Member, Dim::Time]);
        assert!(d.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn distance_to_nearest_edge_cell() {
        let d = EdgeDistance::new(vec![(0.0, 2.0)]).compute(&field(1, 1, 3)).unwrap();
        let expected = haversine_km(2.0, 0.0, 2.0, 3.0);
        approx::assert_relative_eq!(d.data()[[0, 0]], expected, max_relative = 1e-12);
    }

    #[test]
    fn no_edge_is_nan() {
        let d = EdgeDistance::new(vec![(0.0, 2.0)]).compute(&field(1, 1, 5)).unwrap();
        assert!(d.data()[[0, 0]].is_nan());
    }

    #[test]
    fn point_count_must_match() {
        let err = EdgeDistance::new(vec![(0.0, 0.0), (1.0, 1.0)])
            .compute(&field(1, 3, 3))
            .unwrap_err();
        assert!(matches!(err, EdgeError::PointCount { points: 2, steps: 3 }));
    }

    #[test]
    fn member_axis_added() {
        let f = field(1, 2, 3).isel(Dim::Member, 0).unwrap();
        let d = EdgeDistance::new(vec![(0.0, 2.0), (4.0, 2.0)]).compute(&f).unwrap();
        assert_eq!(d.shape(), &[1, 2]);
        assert_eq!(d.data()[[0, 1]], 0.0);
    }
}
