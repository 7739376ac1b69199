//! NetCDF writer for result datasets.

use std::collections::BTreeMap;
use std::path::Path;

use netcdf::AttributeValue;
use tracing::info;

use crate::dataset::{AttrValue, Dataset};
use crate::error::IoError;
use crate::field::{Dim, Field};
use crate::grid::Grid;

/// Write `dataset` to `path`, creating parent directories.
///
/// Each axis becomes a dimension with an index coordinate; `time` carries the
/// lead labels and `yc`/`xc` the grid coordinates. `lon`/`lat` are written
/// when known. Projection attributes go on every variable.
///
/// # Errors
///
/// Returns [`IoError::DimensionMismatch`] if two variables disagree on an
/// axis length, [`IoError::FileSystem`] if the directory cannot be created,
/// and NetCDF errors otherwise.
pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<(), IoError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| IoError::FileSystem {
            path: parent.to_path_buf(),
            reason: e.to_string(),
        })?;
    }

    let dims = collect_dims(dataset)?;
    let grid = dataset.variables().iter().find_map(Field::grid).cloned();
    let time = dataset
        .variables()
        .iter()
        .find(|f| f.has(Dim::Time))
        .map(|f| f.time().to_vec());

    let mut file = netcdf::create(path)?;

    for (dim, len) in &dims {
        file.add_dimension(dim.name(), *len)?;
    }

    // -- Coordinates --------------------------------------------------------

    for (dim, len) in &dims {
        match dim {
            Dim::Time => {
                let labels = time.clone().unwrap_or_else(|| (0..*len as i64).collect());
                let mut var = file.add_variable::<i64>("time", &["time"])?;
                var.put_values(&labels, ..)?;
            }
            Dim::X | Dim::Y => {
                let coords = grid
                    .as_deref()
                    .map(|g| if *dim == Dim::X { g.xc() } else { g.yc() })
                    .filter(|c| c.len() == *len)
                    .map_or_else(|| (0..*len).map(|i| i as f64).collect(), <[f64]>::to_vec);
                let mut var = file.add_variable::<f64>(dim.name(), &[dim.name()])?;
                var.put_values(&coords, ..)?;
                var.put_attribute("units", "m")?;
            }
            _ => {
                let index: Vec<i64> = (0..*len as i64).collect();
                let mut var = file.add_variable::<i64>(dim.name(), &[dim.name()])?;
                var.put_values(&index, ..)?;
            }
        }
    }

    if let Some(g) = grid.as_deref()
        && dims.contains_key(&Dim::Y)
        && dims.contains_key(&Dim::X)
        && dims[&Dim::Y] == g.shape().0
        && dims[&Dim::X] == g.shape().1
    {
        write_lonlat(&mut file, g)?;
    }

    // -- Variables ----------------------------------------------------------

    for field in dataset.variables() {
        let names: Vec<&str> = field.dims().iter().map(|d| d.name()).collect();
        let mut var = file.add_variable::<f64>(field.name(), &names)?;
        let values: Vec<f64> = field.data().iter().copied().collect();
        var.put_values(&values, ..)?;
        if let Some(projection) = field.grid().and_then(|g| g.projection()) {
            var.put_attribute("projection", projection.name.as_str())?;
            for (key, value) in projection.parameters() {
                var.put_attribute(key, value)?;
            }
        }
    }

    // -- Global attributes --------------------------------------------------

    for (key, value) in dataset.attrs() {
        match value {
            AttrValue::Text(s) => {
                file.add_attribute(key, s.as_str())?;
            }
            AttrValue::List(items) => {
                file.add_attribute(key, AttributeValue::Strs(items.clone()))?;
            }
        }
    }

    info!(
        path = %path.display(),
        variables = dataset.variables().len(),
        "wrote result dataset"
    );
    Ok(())
}

fn collect_dims(dataset: &Dataset) -> Result<BTreeMap<Dim, usize>, IoError> {
    let mut dims = BTreeMap::new();
    for field in dataset.variables() {
        for (dim, &len) in field.dims().iter().zip(field.shape()) {
            match dims.get(dim) {
                Some(&existing) if existing != len => {
                    return Err(IoError::DimensionMismatch {
                        name: format!("{} in '{}'", dim.name(), field.name()),
                        expected: existing,
                        got: len,
                    });
                }
                Some(_) => {}
                None => {
                    dims.insert(*dim, len);
                }
            }
        }
    }
    Ok(dims)
}

fn write_lonlat(file: &mut netcdf::FileMut, grid: &Grid) -> Result<(), IoError> {
    for (name, values) in [("lon", grid.lon()), ("lat", grid.lat())] {
        let Some(values) = values else { continue };
        let flat: Vec<f64> = values.iter().copied().collect();
        let mut var = file.add_variable::<f64>(name, &["yc", "xc"])?;
        var.put_values(&flat, ..)?;
    }
    Ok(())
}
