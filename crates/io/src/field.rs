//! Gridded fields with named axes.
//!
//! A [`Field`] wraps an `ndarray::ArrayD<f64>` whose axes are a subset of
//! [`Dim`] kept in canonical order (`inidate, date, member, time, yc, xc`).
//! Binary operations broadcast by axis name: an axis missing from one
//! operand, or of length 1, is repeated to match the other.

use std::fmt;
use std::sync::Arc;

use icecap_stats::{nanmean, nansum, nanvar};
use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, Axis, IxDyn, Zip};

use crate::error::IoError;
use crate::grid::Grid;

// ---------------------------------------------------------------------------
// Dim
// ---------------------------------------------------------------------------

/// Named axis of a gridded field. The derive order is the canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dim {
    /// Initialisation set (one per configured MMDD, or `all`).
    Inidate,
    /// Start date within an initialisation set.
    Date,
    /// Ensemble member.
    Member,
    /// Lead time (or month index after monthly averaging).
    Time,
    /// Projected y coordinate.
    Y,
    /// Projected x coordinate.
    X,
}

impl Dim {
    /// All axes in canonical order.
    pub const ALL: [Dim; 6] = [
        Dim::Inidate,
        Dim::Date,
        Dim::Member,
        Dim::Time,
        Dim::Y,
        Dim::X,
    ];

    /// Name used in NetCDF output.
    pub fn name(self) -> &'static str {
        match self {
            Dim::Inidate => "inidate",
            Dim::Date => "date",
            Dim::Member => "member",
            Dim::Time => "time",
            Dim::Y => "yc",
            Dim::X => "xc",
        }
    }

    /// Axis with NetCDF dimension name `name`.
    pub fn from_name(name: &str) -> Option<Dim> {
        Dim::ALL.into_iter().find(|d| d.name() == name)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// A named n-dimensional array over canonical axes, with time labels and
/// shared grid metadata.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    dims: Vec<Dim>,
    data: ArrayD<f64>,
    time: Vec<i64>,
    grid: Option<Arc<Grid>>,
}

impl Field {
    /// Create a field. Time labels default to `0..nt`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidAxes`] if the axis count does not match the
    /// array rank or axes are not in strictly canonical order.
    pub fn new(name: impl Into<String>, dims: Vec<Dim>, data: ArrayD<f64>) -> Result<Self, IoError> {
        let name = name.into();
        if dims.len() != data.ndim() {
            return Err(IoError::InvalidAxes {
                field: name,
                reason: format!("{} axes for an array of rank {}", dims.len(), data.ndim()),
            });
        }
        if dims.windows(2).any(|w| w[1] <= w[0]) {
            return Err(IoError::InvalidAxes {
                field: name,
                reason: format!("axes {dims:?} are not in canonical order"),
            });
        }
        let time = match dims.iter().position(|d| *d == Dim::Time) {
            Some(ax) => (0..data.len_of(Axis(ax)) as i64).collect(),
            None => Vec::new(),
        };
        Ok(Self {
            name,
            dims,
            data,
            time,
            grid: None,
        })
    }

    /// Field of the given shape filled with `value`.
    pub fn filled(name: impl Into<String>, dims: Vec<Dim>, shape: &[usize], value: f64) -> Result<Self, IoError> {
        Self::new(name, dims, ArrayD::from_elem(IxDyn(shape), value))
    }

    /// Replace the time labels.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::DimensionMismatch`] if the label count differs from
    /// the time axis length.
    pub fn with_time(mut self, labels: Vec<i64>) -> Result<Self, IoError> {
        let nt = self.len_of(Dim::Time).unwrap_or(0);
        if labels.len() != nt {
            return Err(IoError::DimensionMismatch {
                name: "time".to_string(),
                expected: nt,
                got: labels.len(),
            });
        }
        self.time = labels;
        Ok(self)
    }

    /// Attach grid metadata.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::DimensionMismatch`] if the field has spatial axes
    /// that disagree with the grid shape.
    pub fn with_grid(mut self, grid: Arc<Grid>) -> Result<Self, IoError> {
        let (ny, nx) = grid.shape();
        for (dim, expected) in [(Dim::Y, ny), (Dim::X, nx)] {
            if let Some(got) = self.len_of(dim)
                && got != expected
            {
                return Err(IoError::DimensionMismatch {
                    name: dim.name().to_string(),
                    expected,
                    got,
                });
            }
        }
        self.grid = Some(grid);
        Ok(self)
    }

    /// Same field under a new name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Axes in canonical order.
    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    /// Underlying array.
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Mutable access to the underlying array.
    pub fn data_mut(&mut self) -> &mut ArrayD<f64> {
        &mut self.data
    }

    /// Time labels (empty without a time axis).
    pub fn time(&self) -> &[i64] {
        &self.time
    }

    /// Grid metadata, if attached.
    pub fn grid(&self) -> Option<&Arc<Grid>> {
        self.grid.as_ref()
    }

    /// Array shape.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Position of `dim` among the axes.
    pub fn axis_of(&self, dim: Dim) -> Option<usize> {
        self.dims.iter().position(|d| *d == dim)
    }

    /// True if the field has axis `dim`.
    pub fn has(&self, dim: Dim) -> bool {
        self.axis_of(dim).is_some()
    }

    /// Length of axis `dim`, if present.
    pub fn len_of(&self, dim: Dim) -> Option<usize> {
        self.axis_of(dim).map(|ax| self.data.len_of(Axis(ax)))
    }

    fn require(&self, dim: Dim) -> Result<usize, IoError> {
        self.axis_of(dim).ok_or_else(|| IoError::InvalidAxes {
            field: self.name.clone(),
            reason: format!("no axis '{dim}'"),
        })
    }

    fn rebuilt(&self, dims: Vec<Dim>, data: ArrayD<f64>, time: Vec<i64>) -> Field {
        Field {
            name: self.name.clone(),
            dims,
            data,
            time,
            grid: self.grid.clone(),
        }
    }

    // -- element-wise -------------------------------------------------------

    /// Apply `f` to every value.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Field {
        self.rebuilt(self.dims.clone(), self.data.mapv(f), self.time.clone())
    }

    /// 1 where the value exceeds `threshold`, 0 where it does not, NaN kept.
    pub fn threshold(&self, threshold: f64) -> Field {
        self.map(|v| {
            if v.is_nan() {
                f64::NAN
            } else if v > threshold {
                1.0
            } else {
                0.0
            }
        })
    }

    /// Combine two fields value by value, broadcasting by axis name.
    ///
    /// The result takes its name from `self`; time labels and grid come from
    /// whichever operand carries them (preferring `self`).
    ///
    /// # Errors
    ///
    /// Returns [`IoError::DimensionMismatch`] if a shared axis has different
    /// lengths, neither being 1.
    pub fn zip_with(&self, other: &Field, f: impl Fn(f64, f64) -> f64) -> Result<Field, IoError> {
        let mut dims: Vec<Dim> = self.dims.iter().chain(other.dims.iter()).copied().collect();
        dims.sort();
        dims.dedup();

        let mut shape = Vec::with_capacity(dims.len());
        for &d in &dims {
            let len = match (self.len_of(d), other.len_of(d)) {
                (Some(a), Some(b)) if a == b || b == 1 => a,
                (Some(1), Some(b)) => b,
                (Some(a), Some(b)) => {
                    return Err(IoError::DimensionMismatch {
                        name: d.name().to_string(),
                        expected: a,
                        got: b,
                    });
                }
                (Some(a), None) | (None, Some(a)) => a,
                (None, None) => 1,
            };
            shape.push(len);
        }

        let a = expand_to(self, &dims, &shape)?;
        let b = expand_to(other, &dims, &shape)?;
        let data = Zip::from(&a).and(&b).map_collect(|&x, &y| f(x, y));

        let nt = dims
            .iter()
            .position(|d| *d == Dim::Time)
            .map(|ax| shape[ax]);
        let time = match nt {
            Some(n) if self.time.len() == n => self.time.clone(),
            Some(n) if other.time.len() == n => other.time.clone(),
            Some(n) => (0..n as i64).collect(),
            None => Vec::new(),
        };

        Ok(Field {
            name: self.name.clone(),
            dims,
            data,
            time,
            grid: self.grid.clone().or_else(|| other.grid.clone()),
        })
    }

    /// `self - other`, broadcasting by axis name.
    pub fn sub(&self, other: &Field) -> Result<Field, IoError> {
        self.zip_with(other, |a, b| a - b)
    }

    /// `self + other`, broadcasting by axis name.
    pub fn add(&self, other: &Field) -> Result<Field, IoError> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Keep values where `cond` satisfies `keep`, NaN elsewhere.
    pub fn where_field(&self, cond: &Field, keep: impl Fn(f64) -> bool) -> Result<Field, IoError> {
        self.zip_with(cond, |v, c| if keep(c) { v } else { f64::NAN })
    }

    /// Set every cell outside `mask` to NaN, across all non-spatial axes.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidAxes`] without spatial axes and
    /// [`IoError::DimensionMismatch`] if the mask shape differs.
    pub fn retain_cells(&self, mask: &Array2<bool>) -> Result<Field, IoError> {
        let (ny, nx) = self.spatial_shape()?;
        if mask.dim() != (ny, nx) {
            return Err(IoError::DimensionMismatch {
                name: "mask".to_string(),
                expected: ny * nx,
                got: mask.len(),
            });
        }
        let mut data = self.data.as_standard_layout().into_owned();
        if let Some(slice) = data.as_slice_mut() {
            for chunk in slice.chunks_mut(ny * nx) {
                for (v, &keep) in chunk.iter_mut().zip(mask.iter()) {
                    if !keep {
                        *v = f64::NAN;
                    }
                }
            }
        }
        Ok(self.rebuilt(self.dims.clone(), data, self.time.clone()))
    }

    // -- reductions ---------------------------------------------------------

    /// Reduce along `dim` with `f`. A field without `dim` is returned as is.
    pub fn reduce(&self, dim: Dim, f: impl Fn(&[f64]) -> f64) -> Field {
        let Some(ax) = self.axis_of(dim) else {
            return self.clone();
        };
        let data = self.data.map_axis(Axis(ax), |lane| {
            let values: Vec<f64> = lane.iter().copied().collect();
            f(&values)
        });
        let mut dims = self.dims.clone();
        dims.remove(ax);
        let time = if dim == Dim::Time {
            Vec::new()
        } else {
            self.time.clone()
        };
        self.rebuilt(dims, data, time)
    }

    /// NaN-skipping mean along `dim`.
    pub fn mean_over(&self, dim: Dim) -> Field {
        self.reduce(dim, nanmean)
    }

    /// NaN-skipping mean along each of `dims` in turn.
    pub fn mean_over_all(&self, dims: &[Dim]) -> Field {
        dims.iter().fold(self.clone(), |f, &d| f.mean_over(d))
    }

    /// NaN-skipping population variance along `dim`.
    pub fn var_over(&self, dim: Dim) -> Field {
        self.reduce(dim, nanvar)
    }

    /// NaN-skipping sum along `dim` (NaN where nothing is valid).
    pub fn sum_over(&self, dim: Dim) -> Field {
        self.reduce(dim, nansum)
    }

    /// Reduce over all of `dims` at once with `f`, which receives every value
    /// of those axes for one remaining index. Axes not present are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidAxes`] if the reduced array cannot be shaped.
    pub fn reduce_many(&self, dims: &[Dim], f: impl Fn(&[f64]) -> f64) -> Result<Field, IoError> {
        let reduced: Vec<usize> = (0..self.dims.len()).filter(|&i| dims.contains(&self.dims[i])).collect();
        if reduced.is_empty() {
            return Ok(self.clone());
        }
        let kept: Vec<usize> = (0..self.dims.len()).filter(|i| !reduced.contains(i)).collect();
        let order: Vec<usize> = kept.iter().chain(&reduced).copied().collect();
        let permuted = self.data.view().permuted_axes(IxDyn(&order));
        let standard = permuted.as_standard_layout();

        let shape: Vec<usize> = kept.iter().map(|&i| self.shape()[i]).collect();
        let inner: usize = reduced.iter().map(|&i| self.shape()[i]).product();
        let values: Vec<f64> = match standard.as_slice() {
            Some(slice) if inner > 0 => slice.chunks(inner).map(&f).collect(),
            _ => vec![f(&[]); shape.iter().product()],
        };
        let data = ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|e| IoError::InvalidAxes {
            field: self.name.clone(),
            reason: e.to_string(),
        })?;
        let dims: Vec<Dim> = kept.iter().map(|&i| self.dims[i]).collect();
        let time = if dims.contains(&Dim::Time) {
            self.time.clone()
        } else {
            Vec::new()
        };
        Ok(self.rebuilt(dims, data, time))
    }

    /// Reduce along `dim`, handing `f` each lane together with the matching
    /// value of `other` broadcast to the reduced shape. Used for ensemble
    /// scores where `self` holds members and `other` the observation.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidAxes`] if `dim` is missing or `other` has
    /// axes `self` lacks, and [`IoError::DimensionMismatch`] if shapes do
    /// not broadcast.
    pub fn reduce_paired(&self, dim: Dim, other: &Field, f: impl Fn(&[f64], f64) -> f64) -> Result<Field, IoError> {
        let ax = self.require(dim)?;
        let template = self.reduce(dim, |_| f64::NAN);
        let paired = template.zip_with(other, |_, o| o)?;
        if paired.dims != template.dims || paired.shape() != template.shape() {
            return Err(IoError::InvalidAxes {
                field: other.name.clone(),
                reason: format!("axes {:?} do not fit {:?}", other.dims, template.dims),
            });
        }
        let data = Zip::from(self.data.lanes(Axis(ax)))
            .and(&paired.data)
            .map_collect(|lane, &o| {
                let values: Vec<f64> = lane.iter().copied().collect();
                f(&values, o)
            });
        Ok(template.rebuilt(template.dims.clone(), data, template.time.clone()))
    }

    /// `(ny, nx)` of the spatial axes.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidAxes`] if either spatial axis is missing.
    pub fn spatial_shape(&self) -> Result<(usize, usize), IoError> {
        let ny = self.data.len_of(Axis(self.require(Dim::Y)?));
        let nx = self.data.len_of(Axis(self.require(Dim::X)?));
        Ok((ny, nx))
    }

    /// Reduce over both spatial axes with `f`, which receives the `ny·nx`
    /// cell values of one slice. The grid metadata is kept.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidAxes`] if either spatial axis is missing.
    pub fn spatial_reduce(&self, f: impl Fn(&[f64]) -> f64) -> Result<Field, IoError> {
        let (ny, nx) = self.spatial_shape()?;
        let outer: Vec<usize> = self.shape()[..self.dims.len() - 2].to_vec();
        let standard = self.data.as_standard_layout();
        let values: Vec<f64> = match standard.as_slice() {
            Some(slice) if ny * nx > 0 => slice.chunks(ny * nx).map(&f).collect(),
            _ => vec![f64::NAN; outer.iter().product()],
        };
        let data = ArrayD::from_shape_vec(IxDyn(&outer), values).map_err(|e| IoError::InvalidAxes {
            field: self.name.clone(),
            reason: e.to_string(),
        })?;
        let dims = self.dims[..self.dims.len() - 2].to_vec();
        Ok(self.rebuilt(dims, data, self.time.clone()))
    }

    /// Replace every `(yc, xc)` slice by `f(slice)`, keeping axes, time
    /// labels and grid.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidAxes`] if either spatial axis is missing and
    /// [`IoError::DimensionMismatch`] if `f` changes the slice shape.
    pub fn map_slices(&self, f: impl Fn(ArrayView2<'_, f64>) -> Array2<f64>) -> Result<Field, IoError> {
        let (ny, nx) = self.spatial_shape()?;
        let standard = self.data.as_standard_layout();
        let mut values = Vec::with_capacity(self.data.len());
        if let Some(slice) = standard.as_slice().filter(|_| ny * nx > 0) {
            for chunk in slice.chunks(ny * nx) {
                let view = ArrayView2::from_shape((ny, nx), chunk).map_err(|e| IoError::InvalidAxes {
                    field: self.name.clone(),
                    reason: e.to_string(),
                })?;
                let out = f(view);
                if out.dim() != (ny, nx) {
                    return Err(IoError::DimensionMismatch {
                        name: self.name.clone(),
                        expected: ny * nx,
                        got: out.len(),
                    });
                }
                values.extend(out.iter().copied());
            }
        }
        let data = ArrayD::from_shape_vec(IxDyn(self.shape()), values).map_err(|e| IoError::InvalidAxes {
            field: self.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(self.rebuilt(self.dims.clone(), data, self.time.clone()))
    }

    // -- indexing -----------------------------------------------------------

    /// Select one index along `dim`, dropping the axis.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidAxes`] if the axis is missing and
    /// [`IoError::DimensionMismatch`] if `index` is out of range.
    pub fn isel(&self, dim: Dim, index: usize) -> Result<Field, IoError> {
        let ax = self.require(dim)?;
        let len = self.data.len_of(Axis(ax));
        if index >= len {
            return Err(IoError::DimensionMismatch {
                name: dim.name().to_string(),
                expected: len,
                got: index,
            });
        }
        let data = self.data.index_axis(Axis(ax), index).to_owned();
        let mut dims = self.dims.clone();
        dims.remove(ax);
        let time = if dim == Dim::Time {
            Vec::new()
        } else {
            self.time.clone()
        };
        Ok(self.rebuilt(dims, data, time))
    }

    /// Select index 0 along every listed axis that is present.
    pub fn first_along(&self, dims: &[Dim]) -> Result<Field, IoError> {
        dims.iter().try_fold(self.clone(), |f, &d| {
            if f.has(d) { f.isel(d, 0) } else { Ok(f) }
        })
    }

    /// Keep the given indices along `dim`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidAxes`] if the axis is missing and
    /// [`IoError::DimensionMismatch`] for out-of-range indices.
    pub fn select(&self, dim: Dim, indices: &[usize]) -> Result<Field, IoError> {
        let ax = self.require(dim)?;
        let len = self.data.len_of(Axis(ax));
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(IoError::DimensionMismatch {
                name: dim.name().to_string(),
                expected: len,
                got: bad,
            });
        }
        let data = self.data.select(Axis(ax), indices);
        let time = if dim == Dim::Time {
            indices.iter().map(|&i| self.time[i]).collect()
        } else {
            self.time.clone()
        };
        Ok(self.rebuilt(self.dims.clone(), data, time))
    }

    /// Insert a length-1 axis `dim` at its canonical position.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidAxes`] if the axis already exists.
    pub fn insert_dim(&self, dim: Dim) -> Result<Field, IoError> {
        if self.has(dim) {
            return Err(IoError::InvalidAxes {
                field: self.name.clone(),
                reason: format!("axis '{dim}' already present"),
            });
        }
        let pos = self.dims.iter().filter(|d| **d < dim).count();
        let data = self.data.clone().insert_axis(Axis(pos));
        let mut dims = self.dims.clone();
        dims.insert(pos, dim);
        let time = if dim == Dim::Time {
            vec![0]
        } else {
            self.time.clone()
        };
        Ok(self.rebuilt(dims, data, time))
    }

    /// Insert `dim` if absent.
    pub fn ensure_dim(&self, dim: Dim) -> Result<Field, IoError> {
        if self.has(dim) {
            Ok(self.clone())
        } else {
            self.insert_dim(dim)
        }
    }

    /// Extend axis `dim` to `len` with NaN.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidAxes`] if the axis is missing or already
    /// longer than `len`.
    pub fn pad_nan(&self, dim: Dim, len: usize) -> Result<Field, IoError> {
        let ax = self.require(dim)?;
        let current = self.data.len_of(Axis(ax));
        if current == len {
            return Ok(self.clone());
        }
        if current > len {
            return Err(IoError::InvalidAxes {
                field: self.name.clone(),
                reason: format!("cannot pad '{dim}' of length {current} to {len}"),
            });
        }
        let mut shape = self.shape().to_vec();
        shape[ax] = len - current;
        let pad = ArrayD::from_elem(IxDyn(&shape), f64::NAN);
        let data = ndarray::concatenate(Axis(ax), &[self.data.view(), pad.view()]).map_err(|e| {
            IoError::InvalidAxes {
                field: self.name.clone(),
                reason: e.to_string(),
            }
        })?;
        let mut time = self.time.clone();
        if dim == Dim::Time {
            let next = time.last().map_or(0, |t| t + 1);
            time.extend(next..next + (len - current) as i64);
        }
        Ok(self.rebuilt(self.dims.clone(), data, time))
    }

    /// Stack fields along a new axis `dim`. Metadata comes from the first.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Validation`] for an empty list,
    /// [`IoError::InvalidAxes`] if axes differ or `dim` already exists, and
    /// [`IoError::DimensionMismatch`] if shapes differ.
    pub fn stack(fields: &[Field], dim: Dim) -> Result<Field, IoError> {
        let first = check_compatible(fields)?;
        if first.has(dim) {
            return Err(IoError::InvalidAxes {
                field: first.name.clone(),
                reason: format!("cannot stack along existing axis '{dim}'"),
            });
        }
        let pos = first.dims.iter().filter(|d| **d < dim).count();
        let views: Vec<ArrayViewD<'_, f64>> = fields.iter().map(|f| f.data.view()).collect();
        let data = ndarray::stack(Axis(pos), &views).map_err(|e| IoError::InvalidAxes {
            field: first.name.clone(),
            reason: e.to_string(),
        })?;
        let mut dims = first.dims.clone();
        dims.insert(pos, dim);
        let time = if dim == Dim::Time {
            (0..fields.len() as i64).collect()
        } else {
            first.time.clone()
        };
        Ok(first.rebuilt(dims, data, time))
    }

    /// Concatenate fields along existing axis `dim`.
    ///
    /// # Errors
    ///
    /// As for [`Field::stack`], and [`IoError::InvalidAxes`] if `dim` is missing.
    pub fn concat(fields: &[Field], dim: Dim) -> Result<Field, IoError> {
        let first = fields.first().ok_or_else(|| IoError::Validation {
            count: 1,
            details: "nothing to concatenate".to_string(),
        })?;
        let ax = first.require(dim)?;
        if let Some(bad) = fields.iter().find(|f| f.dims != first.dims) {
            return Err(IoError::InvalidAxes {
                field: bad.name.clone(),
                reason: format!("axes {:?} differ from {:?}", bad.dims, first.dims),
            });
        }
        let views: Vec<ArrayViewD<'_, f64>> = fields.iter().map(|f| f.data.view()).collect();
        let data = ndarray::concatenate(Axis(ax), &views).map_err(|e| IoError::InvalidAxes {
            field: first.name.clone(),
            reason: e.to_string(),
        })?;
        let time = if dim == Dim::Time {
            fields.iter().flat_map(|f| f.time.iter().copied()).collect()
        } else {
            first.time.clone()
        };
        Ok(first.rebuilt(first.dims.clone(), data, time))
    }

    /// Values of a field with exactly the spatial axes, as a 2-D array.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidAxes`] if the field has other axes.
    pub fn to_2d(&self) -> Result<Array2<f64>, IoError> {
        if self.dims != [Dim::Y, Dim::X] {
            return Err(IoError::InvalidAxes {
                field: self.name.clone(),
                reason: format!("expected axes [Y, X], got {:?}", self.dims),
            });
        }
        self.data
            .clone()
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| IoError::InvalidAxes {
                field: self.name.clone(),
                reason: e.to_string(),
            })
    }

    /// Number of non-NaN values.
    pub fn count_valid(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }
}

fn check_compatible(fields: &[Field]) -> Result<&Field, IoError> {
    let first = fields.first().ok_or_else(|| IoError::Validation {
        count: 1,
        details: "nothing to stack".to_string(),
    })?;
    for f in fields {
        if f.dims != first.dims {
            return Err(IoError::InvalidAxes {
                field: f.name.clone(),
                reason: format!("axes {:?} differ from {:?}", f.dims, first.dims),
            });
        }
        if f.shape() != first.shape() {
            return Err(IoError::DimensionMismatch {
                name: f.name.clone(),
                expected: first.data.len(),
                got: f.data.len(),
            });
        }
    }
    Ok(first)
}

/// Insert missing axes and broadcast `field` to `shape` over `dims`.
fn expand_to<'a>(field: &'a Field, dims: &[Dim], shape: &[usize]) -> Result<ArrayViewD<'a, f64>, IoError> {
    let mut view = field.data.view();
    for (pos, d) in dims.iter().enumerate() {
        if !field.has(*d) {
            view = view.insert_axis(Axis(pos));
        }
    }
    view.broadcast(IxDyn(shape))
        .ok_or_else(|| IoError::DimensionMismatch {
            name: field.name.clone(),
            expected: shape.iter().product(),
            got: field.data.len(),
        })
}
