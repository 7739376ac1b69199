//! Integration tests: edge regions and phenology on gridded fields.

use std::sync::Arc;

use icecap_edge::{EdgeError, PhenologyDate, PhenologyKind, extended_edge, phenology_dates};
use icecap_io::{Dim, Field, Grid};
use ndarray::{ArrayD, IxDyn};

fn grid(n: usize, spacing: f64) -> Arc<Grid> {
    let coords: Vec<f64> = (0..n).map(|i| i as f64 * spacing).collect();
    Arc::new(Grid::new(coords.clone(), coords))
}

#[test]
fn freeze_up_on_day_five() {
    // 2 members, 10 daily steps on a 2x2 grid: cell (0, 0) freezes on
    // day 5 in both members, cell (1, 1) is ice throughout.
    let data = ArrayD::from_shape_fn(IxDyn(&[2, 10, 2, 2]), |ix| match (ix[2], ix[3]) {
        (0, 0) if ix[1] >= 5 => 1.0,
        (1, 1) => 1.0,
        _ => 0.0,
    });
    let ice = Field::new("sic", vec![Dim::Member, Dim::Time, Dim::Y, Dim::X], data).unwrap();

    let out = phenology_dates(&ice, PhenologyKind::FreezeUp).unwrap();
    assert_eq!(out.ordinals.dims(), &[Dim::Member, Dim::Y, Dim::X]);
    for m in 0..2 {
        assert_eq!(out.dates[[m, 0, 0]], PhenologyDate::Day(5));
        assert_eq!(out.ordinals.data()[[m, 0, 0]], 5.0);
        assert_eq!(out.dates[[m, 1, 1]], PhenologyDate::AlwaysIce);
        assert_eq!(out.dates[[m, 0, 1]], PhenologyDate::AlwaysWater);
    }
}

#[test]
fn break_up_uses_trailing_window() {
    let mut series = vec![1.0; 4];
    series.extend([0.0; 10]);
    let data = ArrayD::from_shape_vec(IxDyn(&[14, 1, 1]), series).unwrap();
    let ice = Field::new("sic", vec![Dim::Time, Dim::Y, Dim::X], data).unwrap();
    let out = phenology_dates(&ice, PhenologyKind::BreakUp).unwrap();
    assert_eq!(out.dates[[0, 0]], PhenologyDate::Day(4));
}

#[test]
fn extended_edge_covers_neighbourhood() {
    // Ice in columns >= 5 of a 12x12 grid with 10 km cells; 20 km extent
    // reaches two cells either side of the edge.
    let data = ArrayD::from_shape_fn(IxDyn(&[1, 12, 12]), |ix| if ix[2] >= 5 { 0.8 } else { 0.0 });
    let sic = Field::new("sic", vec![Dim::Time, Dim::Y, Dim::X], data)
        .unwrap()
        .with_grid(grid(12, 10_000.0))
        .unwrap();

    let region = extended_edge(&sic, Some(0.15), 20.0).unwrap();
    assert_eq!(region.dims(), sic.dims());
    let row = 6;
    let flags: Vec<f64> = (0..12).map(|i| region.data()[[0, row, i]]).collect();
    assert_eq!(flags, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn extended_edge_needs_grid() {
    let sic = Field::filled("sic", vec![Dim::Y, Dim::X], &[3, 3], 0.5).unwrap();
    assert!(matches!(
        extended_edge(&sic, Some(0.15), 200.0),
        Err(EdgeError::MissingGridMetadata { .. })
    ));
}
