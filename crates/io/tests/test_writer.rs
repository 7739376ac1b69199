//! Integration tests: writing result datasets to NetCDF.

use std::sync::Arc;

use icecap_io::{AttrValue, Dataset, Dim, Field, Grid, IoError, Projection, read_dataset, write_dataset};
use ndarray::{ArrayD, IxDyn};
use tempfile::tempdir;

fn grid() -> Arc<Grid> {
    let mut projection = Projection::named("Stereographic");
    projection.central_latitude = Some(90.0);
    Arc::new(Grid::new(vec![0.0, 25_000.0, 50_000.0], vec![0.0, -25_000.0]).with_projection(projection))
}

fn map_field(name: &str) -> Field {
    let data = ArrayD::from_shape_fn(IxDyn(&[2, 2, 3]), |ix| (ix[0] * 6 + ix[1] * 3 + ix[2]) as f64);
    Field::new(name, vec![Dim::Time, Dim::Y, Dim::X], data)
        .unwrap()
        .with_time(vec![0, 7])
        .unwrap()
        .with_grid(grid())
        .unwrap()
}

#[test]
fn write_and_read_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rmse").join("rmse.nc");

    let mut ds = Dataset::new().with(map_field("fc_rmse"));
    ds.set_attr("fc_rmse-linestyle", "dashed");
    ds.set_attr(
        "fc_rmse-0",
        AttrValue::List(vec!["color=k".into(), "label=fc".into()]),
    );
    write_dataset(&path, &ds).unwrap();

    let file = netcdf::open(&path).unwrap();
    let var = file.variable("fc_rmse").expect("variable written");
    let values = var.get_values::<f64, _>(..).unwrap();
    assert_eq!(values.len(), 12);
    assert_eq!(values[7], 7.0);

    let projection: String = var
        .attribute_value("projection")
        .unwrap()
        .unwrap()
        .try_into()
        .unwrap();
    assert_eq!(projection, "Stereographic");

    let time = file.variable("time").unwrap().get_values::<i64, _>(..).unwrap();
    assert_eq!(time, vec![0, 7]);
    let xc = file.variable("xc").unwrap().get_values::<f64, _>(..).unwrap();
    assert_eq!(xc, vec![0.0, 25_000.0, 50_000.0]);

    let linestyle: String = file
        .attribute("fc_rmse-linestyle")
        .unwrap()
        .value()
        .unwrap()
        .try_into()
        .unwrap();
    assert_eq!(linestyle, "dashed");
    match file.attribute("fc_rmse-0").unwrap().value().unwrap() {
        netcdf::AttributeValue::Strs(items) => assert_eq!(items, vec!["color=k", "label=fc"]),
        other => panic!("unexpected attribute value: {other:?}"),
    }
}

#[test]
fn scalar_and_series_variables_share_axes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ts.nc");

    let series = Field::new("fc", vec![Dim::Time], ArrayD::from_elem(IxDyn(&[3]), 1.5)).unwrap();
    let other = Field::new("obs", vec![Dim::Time], ArrayD::from_elem(IxDyn(&[3]), 0.5)).unwrap();
    write_dataset(&path, &Dataset::new().with(series).with(other)).unwrap();

    let file = netcdf::open(&path).unwrap();
    assert_eq!(file.variable("obs").unwrap().get_values::<f64, _>(..).unwrap(), vec![0.5; 3]);
}

#[test]
fn conflicting_axis_lengths_rejected() {
    let dir = tempdir().unwrap();
    let a = Field::new("a", vec![Dim::Time], ArrayD::zeros(IxDyn(&[3]))).unwrap();
    let b = Field::new("b", vec![Dim::Time], ArrayD::zeros(IxDyn(&[4]))).unwrap();
    let err = write_dataset(&dir.path().join("bad.nc"), &Dataset::new().with(a).with(b)).unwrap_err();
    assert!(matches!(err, IoError::DimensionMismatch { .. }));
}

#[test]
fn dataset_reads_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calib.nc");

    let mut ds = Dataset::new().with(map_field("upper_q_calib_noplot"));
    ds.set_attr("method", "score");
    write_dataset(&path, &ds).unwrap();

    let back = read_dataset(&path).unwrap();
    assert_eq!(back.names(), vec!["upper_q_calib_noplot"]);
    let field = back.get("upper_q_calib_noplot").unwrap();
    assert_eq!(field.dims(), &[Dim::Time, Dim::Y, Dim::X]);
    assert_eq!(field.time(), &[0, 7]);
    assert_eq!(field.data()[[1, 0, 1]], 7.0);
    let grid = field.grid().expect("grid restored");
    assert_eq!(grid.xc(), &[0.0, 25_000.0, 50_000.0]);
    assert_eq!(grid.projection().map(|p| p.name.as_str()), Some("Stereographic"));
    assert_eq!(back.attr("method"), Some(&AttrValue::Text("score".to_string())));
}
