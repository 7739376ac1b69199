//! Combined validity masks.
//!
//! A cell is valid when neither the forecast nor the observation has a
//! missing value there at any time step of the representative slice. Cells
//! that are water in one source and land in the other therefore drop out.

use std::sync::Arc;

use icecap_io::{Dim, Field, Grid};
use ndarray::Array2;
use tracing::{debug, info};

use crate::error::AreaError;

/// Axes reduced to their first index before building a mask.
const SLICE_DIMS: [Dim; 3] = [Dim::Inidate, Dim::Date, Dim::Member];

/// Boolean validity grid with the grid metadata of the fields it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    cells: Array2<bool>,
    grid: Option<Arc<Grid>>,
}

impl Mask {
    /// Wrap a boolean grid.
    pub fn new(cells: Array2<bool>, grid: Option<Arc<Grid>>) -> Self {
        Self { cells, grid }
    }

    /// Valid cells.
    pub fn cells(&self) -> &Array2<bool> {
        &self.cells
    }

    /// Grid metadata, if known.
    pub fn grid(&self) -> Option<&Arc<Grid>> {
        self.grid.as_ref()
    }

    /// Number of valid cells.
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&v| v).count()
    }

    /// Cells valid in both `self` and `other`.
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::Validation`] if the shapes differ.
    pub fn intersect(&self, other: &Array2<bool>) -> Result<Mask, AreaError> {
        if other.dim() != self.cells.dim() {
            return Err(AreaError::Validation {
                count: 1,
                details: format!(
                    "mask of shape {:?} cannot be combined with shape {:?}",
                    other.dim(),
                    self.cells.dim()
                ),
            });
        }
        let mut cells = self.cells.clone();
        cells.zip_mut_with(other, |a, &b| *a = *a && b);
        Ok(Mask::new(cells, self.grid.clone()))
    }

    /// Set `field` to NaN outside the mask.
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::Io`] if the field's grid does not match.
    pub fn apply(&self, field: &Field) -> Result<Field, AreaError> {
        Ok(field.retain_cells(&self.cells)?)
    }

    /// The mask as a 1/NaN field named `name` (`lsm-full` or `lsm`).
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::Io`] if the grid does not match the mask.
    pub fn to_field(&self, name: &str) -> Result<Field, AreaError> {
        let values = self.cells.mapv(|v| if v { 1.0 } else { f64::NAN });
        let field = Field::new(name, vec![Dim::Y, Dim::X], values.into_dyn())?;
        Ok(match &self.grid {
            Some(grid) => field.with_grid(Arc::clone(grid))?,
            None => field,
        })
    }
}

/// The slice a mask is built from: index 0 of `inidate`, `date` and
/// `member`, and the first time step.
///
/// # Errors
///
/// Returns [`AreaError::Io`] if an axis is empty.
pub fn representative_slice(field: &Field) -> Result<Field, AreaError> {
    let slice = field.first_along(&SLICE_DIMS)?;
    if slice.has(Dim::Time) {
        Ok(slice.select(Dim::Time, &[0])?)
    } else {
        Ok(slice)
    }
}

/// Cells where `field` has no NaN along any non-spatial axis.
///
/// # Errors
///
/// Returns [`AreaError::Io`] if the field has no spatial axes.
pub fn valid_cells(field: &Field) -> Result<Array2<bool>, AreaError> {
    let (ny, nx) = field.spatial_shape()?;
    let mut valid = Array2::from_elem((ny, nx), true);
    let data = field.data().as_standard_layout();
    if let Some(values) = data.as_slice() {
        for chunk in values.chunks((ny * nx).max(1)) {
            for (cell, v) in valid.iter_mut().zip(chunk) {
                *cell = *cell && !v.is_nan();
            }
        }
    }
    Ok(valid)
}

/// Build the combined mask of two sources, intersected with an optional
/// additional mask.
///
/// Both inputs are reduced to their [`representative_slice`] first, so
/// full forecast and observation fields can be passed as loaded. The result
/// does not depend on argument order.
///
/// # Errors
///
/// Returns [`AreaError::Validation`] if the grids differ in shape.
pub fn build_mask(
    forecast: &Field,
    observation: &Field,
    additional: Option<&Array2<bool>>,
) -> Result<Mask, AreaError> {
    let fc = valid_cells(&representative_slice(forecast)?)?;
    let obs = valid_cells(&representative_slice(observation)?)?;
    let grid = forecast.grid().or(observation.grid()).cloned();

    let mut mask = Mask::new(fc, grid).intersect(&obs)?;
    if let Some(extra) = additional {
        info!("applying additional mask");
        mask = mask.intersect(extra)?;
    }
    debug!(valid = mask.count(), cells = mask.cells().len(), "built validity mask");
    Ok(mask)
}

/// Apply `mask` to every field.
///
/// # Errors
///
/// Returns [`AreaError::Io`] if a field's grid does not match the mask.
pub fn mask_fields(mask: &Mask, fields: &[Field]) -> Result<Vec<Field>, AreaError> {
    fields.iter().map(|f| mask.apply(f)).collect()
}

/// Apply `mask` to every field and check that the first two end up with the
/// same number of valid cells at the first time step. A cell counts as valid
/// only if it is valid in every member, date and start date, so missing
/// values outside the representative slice are caught too.
///
/// # Errors
///
/// Returns [`AreaError::MaskMismatch`] if the counts differ.
pub fn mask_fields_checked(mask: &Mask, fields: &[Field]) -> Result<Vec<Field>, AreaError> {
    let masked = mask_fields(mask, fields)?;
    if let [first, second, ..] = masked.as_slice() {
        let first = first_step_valid(first)?;
        let second = first_step_valid(second)?;
        if first != second {
            return Err(AreaError::MaskMismatch { first, second });
        }
    }
    Ok(masked)
}

/// Number of cells without missing values at the first time step.
fn first_step_valid(field: &Field) -> Result<usize, AreaError> {
    let first = if field.has(Dim::Time) {
        field.select(Dim::Time, &[0])?
    } else {
        field.clone()
    };
    Ok(valid_cells(&first)?.iter().filter(|&&v| v).count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn, array};

    fn series(values: Vec<f64>) -> Field {
        let nt = values.len() / 4;
        let data = ArrayD::from_shape_vec(IxDyn(&[nt, 2, 2]), values).unwrap();
        Field::new("sic", vec![Dim::Time, Dim::Y, Dim::X], data).unwrap()
    }

    #[test]
    fn nan_anywhere_in_slice_invalidates_cell() {
        let f = series(vec![0.1, f64::NAN, 0.3, 0.4]);
        assert_eq!(valid_cells(&f).unwrap(), array![[true, false], [true, true]]);
    }

    #[test]
    fn mask_uses_first_step_only() {
        let fc = series(vec![0.1, 0.2, 0.3, 0.4, f64::NAN, 0.2, 0.3, 0.4]);
        let obs = series(vec![0.1, 0.2, 0.3, f64::NAN, 0.1, 0.2, 0.3, 0.4]);
        let mask = build_mask(&fc, &obs, None).unwrap();
        assert_eq!(mask.cells(), &array![[true, true], [true, false]]);
    }

    #[test]
    fn additional_mask_is_intersected() {
        let fc = series(vec![0.1; 4]);
        let extra = array![[false, true], [true, true]];
        let mask = build_mask(&fc, &fc, Some(&extra)).unwrap();
        assert_eq!(mask.count(), 3);
    }

    #[test]
    fn serialised_mask_is_one_or_nan() {
        let mask = Mask::new(array![[true, false], [false, true]], None);
        let f = mask.to_field("lsm-full").unwrap();
        assert_eq!(f.name(), "lsm-full");
        assert_eq!(f.data()[[0, 0]], 1.0);
        assert!(f.data()[[0, 1]].is_nan());
    }

    #[test]
    fn checked_masking_detects_mismatch() {
        let fc = series(vec![0.1, 0.2, 0.3, 0.4]);
        let obs = series(vec![0.1, f64::NAN, 0.3, 0.4]);
        let everywhere = Mask::new(Array2::from_elem((2, 2), true), None);
        let err = mask_fields_checked(&everywhere, &[fc.clone(), obs.clone()]).unwrap_err();
        assert!(matches!(err, AreaError::MaskMismatch { first: 4, second: 3 }));

        let mask = build_mask(&fc, &obs, None).unwrap();
        let masked = mask_fields_checked(&mask, &[fc, obs]).unwrap();
        assert!(masked[0].data()[[0, 0, 1]].is_nan());
    }

    #[test]
    fn checked_masking_sees_every_member() {
        // member 0 is complete, member 1 misses one cell
        let mut values = vec![0.5; 4];
        values.extend([0.5, 0.5, f64::NAN, 0.5]);
        let data = ArrayD::from_shape_vec(IxDyn(&[2, 1, 2, 2]), values).unwrap();
        let fc = Field::new("sic", vec![Dim::Member, Dim::Time, Dim::Y, Dim::X], data).unwrap();
        let obs = series(vec![0.3; 4]);

        let mask = build_mask(&fc, &obs, None).unwrap();
        assert_eq!(mask.count(), 4);
        let err = mask_fields_checked(&mask, &[fc, obs]).unwrap_err();
        assert!(matches!(err, AreaError::MaskMismatch { first: 3, second: 4 }));
    }
}
