//! Ice-edge detection on gridded concentration fields.
//!
//! An edge cell is an interior cell holding ice with at least one of its four
//! neighbours free of ice. Missing neighbours count as water so the edge
//! follows coastlines as well.

use icecap_io::Field;
use ndarray::{Array2, ArrayView2};
use tracing::info;

use crate::error::EdgeError;

/// Default radius of the extended ice edge in km.
pub const EDGE_EXTENT_KM: f64 = 200.0;

/// Cells on the 4-neighbour ice edge of `ice`.
///
/// Border rows and columns are never edge cells.
pub fn detect_edge(ice: &ArrayView2<'_, f64>) -> Array2<bool> {
    let (ny, nx) = ice.dim();
    let mut edge = Array2::from_elem((ny, nx), false);
    if ny < 3 || nx < 3 {
        return edge;
    }
    for j in 1..ny - 1 {
        for i in 1..nx - 1 {
            let neighbours = [ice[[j, i - 1]], ice[[j, i + 1]], ice[[j - 1, i]], ice[[j + 1, i]]];
            let lowest = if neighbours.iter().any(|v| v.is_nan()) {
                0.0
            } else {
                neighbours.iter().copied().fold(f64::INFINITY, f64::min)
            };
            edge[[j, i]] = lowest == 0.0 && ice[[j, i]] > 0.0;
        }
    }
    edge
}

/// Grow `edge` by every offset within `radius` cells (a disk).
pub fn extend_edge(edge: &Array2<bool>, radius: usize) -> Array2<bool> {
    let (ny, nx) = edge.dim();
    let r = radius as isize;
    let offsets: Vec<(isize, isize)> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (dy, dx)))
        .filter(|(dy, dx)| dy * dy + dx * dx <= r * r)
        .collect();

    let mut out = Array2::from_elem((ny, nx), false);
    for ((j, i), _) in edge.indexed_iter().filter(|(_, e)| **e) {
        for &(dy, dx) in &offsets {
            let (y, x) = (j as isize + dy, i as isize + dx);
            if (0..ny as isize).contains(&y) && (0..nx as isize).contains(&x) {
                out[[y as usize, x as usize]] = true;
            }
        }
    }
    out
}

/// Number of cells covering `extent_km` on a grid with spacing `dx` metres.
pub fn extent_in_cells(extent_km: f64, dx: f64) -> usize {
    (extent_km / (dx / 1000.0).abs()).round() as usize
}

/// The extended ice edge of every slice of `field`: 1 within `extent_km`
/// of an edge cell, 0 elsewhere.
///
/// With a `threshold` the field is first turned into 1 (above) and 0
/// (below or missing); without one it is taken as already thresholded.
///
/// # Errors
///
/// Returns [`EdgeError::MissingGridMetadata`] if the field has no grid and
/// [`EdgeError::Io`] for unevenly spaced grids or missing spatial axes.
pub fn extended_edge(field: &Field, threshold: Option<f64>, extent_km: f64) -> Result<Field, EdgeError> {
    let grid = field.grid().ok_or_else(|| EdgeError::MissingGridMetadata {
        what: "coordinates".to_string(),
    })?;
    let radius = extent_in_cells(extent_km, grid.dx()?);
    info!(field = %field.name(), extent_km, radius, "detecting extended ice edge");

    let ice = match threshold {
        Some(t) => field.map(|v| if v > t { 1.0 } else { 0.0 }),
        None => field.clone(),
    };
    Ok(ice.map_slices(|slice| {
        extend_edge(&detect_edge(&slice), radius).mapv(|e| if e { 1.0 } else { 0.0 })
    })?)
}
