//! Low-level NetCDF extraction helpers.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use ndarray::{Array2, Array3};
use netcdf::AttributeValue;

use crate::error::IoError;
use crate::grid::{Grid, Projection};

const LON_ALIASES: &[&str] = &["lon", "longitude"];
const LAT_ALIASES: &[&str] = &["lat", "latitude"];

/// Open a NetCDF file at `path`, returning [`IoError::FileNotFound`] if the
/// path does not exist on disk.
pub(crate) fn open_file(path: &Path) -> Result<netcdf::File, IoError> {
    if !path.exists() {
        return Err(IoError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(netcdf::open(path)?)
}

/// Contents of a per-date cache file.
#[derive(Debug)]
pub(crate) struct GriddedFile {
    pub dates: Vec<NaiveDate>,
    pub values: Array3<f64>,
    pub grid: Grid,
}

/// Read the single `(time, yc, xc)` data variable of a cache file.
pub(crate) fn read_gridded(path: &Path) -> Result<GriddedFile, IoError> {
    let file = open_file(path)?;

    let var = file
        .variables()
        .find(|v| {
            let dims = v.dimensions();
            dims.len() == 3 && dims[0].name() == "time"
        })
        .ok_or_else(|| IoError::MissingVariable {
            name: "(time, yc, xc) data variable".to_string(),
            path: path.to_path_buf(),
        })?;

    let dims = var.dimensions();
    let shape = (dims[0].len(), dims[1].len(), dims[2].len());
    let values = read_values(&var)?;
    let values = Array3::from_shape_vec(shape, values).map_err(|e| IoError::DimensionMismatch {
        name: format!("{} values ({e})", var.name()),
        expected: shape.0 * shape.1 * shape.2,
        got: 0,
    })?;

    let dates = read_time_dates(&file, "time", path)?;
    if dates.len() != shape.0 {
        return Err(IoError::DimensionMismatch {
            name: "time".to_string(),
            expected: shape.0,
            got: dates.len(),
        });
    }

    let grid = read_grid(&file, &var, path)?;
    Ok(GriddedFile {
        dates,
        values,
        grid,
    })
}

/// A 2-D raster with its variable and global attributes.
#[derive(Debug)]
pub(crate) struct Raster {
    pub values: Array2<f64>,
    pub grid: Grid,
    /// Variable attributes first, then global attributes.
    pub attrs: Vec<(String, AttributeValue)>,
}

impl Raster {
    /// First attribute named `key`, variable before global.
    pub fn attr(&self, key: &str) -> Option<&AttributeValue> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// Read a 2-D raster: the first `(yc, xc)` variable, or `name` when given.
pub(crate) fn read_raster(path: &Path, name: Option<&str>) -> Result<Raster, IoError> {
    let file = open_file(path)?;
    let var = match name {
        Some(n) => file.variable(n),
        None => file.variables().find(|v| {
            let dims = v.dimensions();
            dims.len() == 2 && dims[0].name() != "time"
        }),
    }
    .ok_or_else(|| IoError::MissingVariable {
        name: name.unwrap_or("2-D raster variable").to_string(),
        path: path.to_path_buf(),
    })?;

    let dims = var.dimensions();
    if dims.len() != 2 {
        return Err(IoError::DimensionMismatch {
            name: format!("{} dimensions", var.name()),
            expected: 2,
            got: dims.len(),
        });
    }
    let shape = (dims[0].len(), dims[1].len());
    let values = Array2::from_shape_vec(shape, read_values(&var)?).map_err(|e| {
        IoError::DimensionMismatch {
            name: format!("{} values ({e})", var.name()),
            expected: shape.0 * shape.1,
            got: 0,
        }
    })?;
    let grid = read_grid(&file, &var, path)?;

    let mut attrs = Vec::new();
    for attr in var.attributes().chain(file.attributes()) {
        attrs.push((attr.name().to_string(), attr.value()?));
    }
    Ok(Raster {
        values,
        grid,
        attrs,
    })
}

/// Read all values of `var` as `f64`, mapping `_FillValue` and
/// `missing_value` to NaN.
pub(crate) fn read_values(var: &netcdf::Variable<'_>) -> Result<Vec<f64>, IoError> {
    let mut values = var.get_values::<f64, _>(..)?;
    let fills: Vec<f64> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|k| var.attribute_value(k).and_then(Result::ok))
        .filter_map(attr_as_f64)
        .collect();
    if !fills.is_empty() {
        for v in &mut values {
            if fills.contains(v) {
                *v = f64::NAN;
            }
        }
    }
    Ok(values)
}

/// Read a 1-D `f64` variable, trying each alias in order.
pub(crate) fn read_1d_f64(
    file: &netcdf::File,
    aliases: &[&str],
    path: &Path,
) -> Result<Vec<f64>, IoError> {
    for &alias in aliases {
        if let Some(var) = file.variable(alias) {
            return Ok(var.get_values::<f64, _>(..)?);
        }
    }

    let name = aliases.first().copied().unwrap_or("unknown");
    Err(IoError::MissingVariable {
        name: name.to_string(),
        path: path.to_path_buf(),
    })
}

pub(crate) fn read_grid(file: &netcdf::File, var: &netcdf::Variable<'_>, path: &Path) -> Result<Grid, IoError> {
    let xc = read_1d_f64(file, &["xc", "x"], path)?;
    let yc = read_1d_f64(file, &["yc", "y"], path)?;
    let (ny, nx) = (yc.len(), xc.len());
    let mut grid = Grid::new(xc, yc);

    if let (Some(lon), Some(lat)) = (
        read_coordinate_2d(file, LON_ALIASES, ny, nx, Axis2::X)?,
        read_coordinate_2d(file, LAT_ALIASES, ny, nx, Axis2::Y)?,
    ) {
        grid = grid.with_lonlat(lon, lat)?;
    }

    if let Some(projection) = read_projection(file, var) {
        grid = grid.with_projection(projection);
    }
    Ok(grid)
}

#[derive(Clone, Copy)]
enum Axis2 {
    Y,
    X,
}

/// Read a 2-D geographic coordinate, broadcasting 1-D axis arrays.
fn read_coordinate_2d(
    file: &netcdf::File,
    aliases: &[&str],
    ny: usize,
    nx: usize,
    along: Axis2,
) -> Result<Option<Array2<f64>>, IoError> {
    let Some(var) = aliases.iter().find_map(|a| file.variable(a)) else {
        return Ok(None);
    };
    let values = var.get_values::<f64, _>(..)?;
    let grid = if values.len() == ny * nx {
        Array2::from_shape_vec((ny, nx), values).map_err(|e| IoError::DimensionMismatch {
            name: format!("{} ({e})", var.name()),
            expected: ny * nx,
            got: 0,
        })?
    } else {
        // 1-D axis arrays broadcast over the other axis.
        match along {
            Axis2::X if values.len() == nx => Array2::from_shape_fn((ny, nx), |(_, i)| values[i]),
            Axis2::Y if values.len() == ny => Array2::from_shape_fn((ny, nx), |(j, _)| values[j]),
            _ => {
                return Err(IoError::DimensionMismatch {
                    name: var.name(),
                    expected: ny * nx,
                    got: values.len(),
                });
            }
        }
    };
    Ok(Some(grid))
}

/// Projection attributes from the data variable, falling back to globals.
fn read_projection(file: &netcdf::File, var: &netcdf::Variable<'_>) -> Option<Projection> {
    let lookup = |key: &str| -> Option<AttributeValue> {
        var.attribute_value(key)
            .and_then(Result::ok)
            .or_else(|| file.attribute(key).and_then(|a| a.value().ok()))
    };
    let name = match lookup("projection")? {
        AttributeValue::Str(s) => s,
        _ => return None,
    };
    let mut projection = Projection::named(name);
    projection.central_longitude = lookup("central_longitude").and_then(attr_as_f64);
    projection.central_latitude = lookup("central_latitude").and_then(attr_as_f64);
    projection.true_scale_latitude = lookup("true_scale_latitude").and_then(attr_as_f64);
    Some(projection)
}

/// Parse CF units `days|hours|seconds since YYYY-MM-DD[ HH:MM:SS]` and
/// convert the time variable to calendar dates.
pub(crate) fn read_time_dates(
    file: &netcdf::File,
    time_var: &str,
    path: &Path,
) -> Result<Vec<NaiveDate>, IoError> {
    let var = file
        .variable(time_var)
        .ok_or_else(|| IoError::MissingVariable {
            name: time_var.to_string(),
            path: path.to_path_buf(),
        })?;

    let units: String = var
        .attribute_value("units")
        .ok_or_else(|| IoError::InvalidTime {
            reason: format!("time variable '{time_var}' has no 'units' attribute"),
        })?
        .map_err(|e| IoError::InvalidTime {
            reason: format!("failed to read 'units' attribute: {e}"),
        })?
        .try_into()
        .map_err(|e: netcdf::Error| IoError::InvalidTime {
            reason: format!("'units' attribute is not a string: {e}"),
        })?;

    let (seconds_per_unit, base) = parse_time_units(&units)?;
    let offsets = var.get_values::<f64, _>(..)?;
    offsets
        .iter()
        .map(|&offset| {
            let seconds = (offset * seconds_per_unit).round() as i64;
            base.checked_add_signed(TimeDelta::seconds(seconds))
                .map(|t| t.date())
                .ok_or_else(|| IoError::InvalidTime {
                    reason: format!("date overflow adding {offset} to {base}"),
                })
        })
        .collect()
}

fn parse_time_units(units: &str) -> Result<(f64, NaiveDateTime), IoError> {
    let invalid = || IoError::InvalidTime {
        reason: format!("unexpected time units format: '{units}'"),
    };
    let parts: Vec<&str> = units.splitn(3, ' ').collect();
    if parts.len() < 3 || parts[1] != "since" {
        return Err(invalid());
    }
    let seconds_per_unit = match parts[0] {
        "days" | "day" => 86_400.0,
        "hours" | "hour" => 3_600.0,
        "seconds" | "second" => 1.0,
        _ => return Err(invalid()),
    };

    let stamp = parts[2].trim();
    let date_str = stamp.get(..10).unwrap_or(stamp);
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| IoError::InvalidTime {
        reason: format!("failed to parse base date '{date_str}': {e}"),
    })?;
    let time = stamp
        .get(11..19)
        .and_then(|t| chrono::NaiveTime::parse_from_str(t, "%H:%M:%S").ok())
        .unwrap_or_default();
    Ok((seconds_per_unit, date.and_time(time)))
}

/// Numeric scalar attribute value as `f64`.
pub(crate) fn attr_as_f64(value: AttributeValue) -> Option<f64> {
    attr_as_f64s(value).and_then(|v| v.first().copied())
}

/// Numeric attribute values as `f64`s.
pub(crate) fn attr_as_f64s(value: AttributeValue) -> Option<Vec<f64>> {
    Some(match value {
        AttributeValue::Double(v) => vec![v],
        AttributeValue::Doubles(v) => v,
        AttributeValue::Float(v) => vec![f64::from(v)],
        AttributeValue::Floats(v) => v.into_iter().map(f64::from).collect(),
        AttributeValue::Int(v) => vec![f64::from(v)],
        AttributeValue::Ints(v) => v.into_iter().map(f64::from).collect(),
        AttributeValue::Short(v) => vec![f64::from(v)],
        AttributeValue::Shorts(v) => v.into_iter().map(f64::from).collect(),
        AttributeValue::Schar(v) => vec![f64::from(v)],
        AttributeValue::Schars(v) => v.into_iter().map(f64::from).collect(),
        AttributeValue::Uchar(v) => vec![f64::from(v)],
        AttributeValue::Uchars(v) => v.into_iter().map(f64::from).collect(),
        AttributeValue::Longlong(v) => vec![v as f64],
        AttributeValue::Longlongs(v) => v.into_iter().map(|x| x as f64).collect(),
        _ => return None,
    })
}

/// String list attribute: a string array, or one space-separated string.
pub(crate) fn attr_as_strings(value: AttributeValue) -> Option<Vec<String>> {
    match value {
        AttributeValue::Strs(v) => Some(v),
        AttributeValue::Str(s) => Some(s.split_whitespace().map(str::to_string).collect()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_units_days() {
        let (scale, base) = parse_time_units("days since 2000-01-01").unwrap();
        assert_eq!(scale, 86_400.0);
        assert_eq!(base.date(), NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
    }

    #[test]
    fn time_units_hours_with_clock() {
        let (scale, base) = parse_time_units("hours since 1970-01-01 12:00:00").unwrap();
        assert_eq!(scale, 3_600.0);
        assert_eq!(base.format("%H").to_string(), "12");
    }

    #[test]
    fn time_units_rejects_unknown() {
        assert!(parse_time_units("fortnights since 2000-01-01").is_err());
        assert!(parse_time_units("days after 2000-01-01").is_err());
        assert!(parse_time_units("days since yesterday").is_err());
    }

    #[test]
    fn string_list_attributes() {
        let split = attr_as_strings(AttributeValue::Str("A B  C".into())).unwrap();
        assert_eq!(split, vec!["A", "B", "C"]);
        let list = attr_as_strings(AttributeValue::Strs(vec!["Kara Sea".into()])).unwrap();
        assert_eq!(list, vec!["Kara Sea"]);
        assert!(attr_as_strings(AttributeValue::Double(1.0)).is_none());
    }

    #[test]
    fn numeric_attributes() {
        assert_eq!(attr_as_f64(AttributeValue::Int(3)), Some(3.0));
        assert_eq!(
            attr_as_f64s(AttributeValue::Shorts(vec![1, 2])),
            Some(vec![1.0, 2.0])
        );
        assert!(attr_as_f64(AttributeValue::Str("x".into())).is_none());
    }
}
