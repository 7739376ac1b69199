//! Read result datasets written by [`crate::write_dataset`].

use std::path::Path;
use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};
use netcdf::AttributeValue;
use tracing::{debug, info};

use crate::dataset::{AttrValue, Dataset};
use crate::error::IoError;
use crate::field::{Dim, Field};
use crate::netcdf_read::{open_file, read_grid, read_values};

const COORDINATES: &[&str] = &["lon", "lat", "longitude", "latitude"];

/// Read every data variable of a result dataset, with its global
/// attributes.
///
/// Variables whose dimensions are not all known axes, and coordinate
/// variables, are skipped. Fields with spatial axes get the file's grid.
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] for a missing file and NetCDF errors
/// otherwise.
pub fn read_dataset(path: &Path) -> Result<Dataset, IoError> {
    let file = open_file(path)?;
    let time: Option<Vec<i64>> = match file.variable("time") {
        Some(var) => Some(var.get_values::<i64, _>(..)?),
        None => None,
    };

    let mut grid = None;
    let mut dataset = Dataset::new();
    for var in file.variables() {
        let name = var.name();
        if Dim::from_name(&name).is_some() || COORDINATES.contains(&name.as_str()) {
            continue;
        }
        let dims: Option<Vec<Dim>> = var.dimensions().iter().map(|d| Dim::from_name(&d.name())).collect();
        let Some(dims) = dims else {
            debug!(variable = %name, "skipping variable with unknown dimensions");
            continue;
        };
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let data = ArrayD::from_shape_vec(IxDyn(&shape), read_values(&var)?).map_err(|e| IoError::DimensionMismatch {
            name: format!("{name} values ({e})"),
            expected: shape.iter().product(),
            got: 0,
        })?;

        let mut field = Field::new(name.as_str(), dims, data)?;
        if let Some(labels) = time.as_ref().filter(|_| field.has(Dim::Time)) {
            field = field.with_time(labels.clone())?;
        }
        if field.has(Dim::Y) && field.has(Dim::X) {
            if grid.is_none() {
                grid = Some(Arc::new(read_grid(&file, &var, path)?));
            }
            if let Some(g) = &grid {
                field = field.with_grid(Arc::clone(g))?;
            }
        }
        dataset.insert(field);
    }

    for attr in file.attributes() {
        match attr.value()? {
            AttributeValue::Str(s) => dataset.set_attr(attr.name(), s),
            AttributeValue::Strs(items) => dataset.set_attr(attr.name(), AttrValue::List(items)),
            _ => {}
        }
    }

    info!(path = %path.display(), variables = dataset.variables().len(), "read dataset");
    Ok(dataset)
}
