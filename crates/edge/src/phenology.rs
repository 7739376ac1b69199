//! Freeze-up and break-up dates of thresholded ice series.
//!
//! Inputs are 1 (ice), 0 (water) or NaN (missing) per time step. Each cell
//! and member gets a [`PhenologyDate`]; the numeric ordinal used for terciles
//! and event probabilities depends on the [`PhenologyKind`].

use icecap_io::{Dim, Field};
use icecap_stats::{QuantileMethod, finite};
use ndarray::{ArrayD, Axis};
use tracing::debug;

use crate::error::EdgeError;

/// Trailing steps that must be ice-free for a break-up date to be defined.
pub const BREAK_UP_WINDOW: usize = 7;

/// Outcome of a phenology detection on one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhenologyDate {
    /// No date can be assigned (no data, or ice late in the series).
    Undefined,
    /// Ice from the start (freeze-up) or throughout (break-up).
    AlwaysIce,
    /// Never any ice.
    AlwaysWater,
    /// The event happens at this time step.
    Day(usize),
}

/// Which transition is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhenologyKind {
    /// First ice after open water.
    FreezeUp,
    /// First open water after the last ice.
    BreakUp,
}

impl PhenologyKind {
    /// Detect the date of this transition in `series`.
    pub fn detect(self, series: &[f64]) -> PhenologyDate {
        match self {
            PhenologyKind::FreezeUp => freeze_up(series),
            PhenologyKind::BreakUp => break_up(series),
        }
    }

    /// Numeric value of `date` in a series of `n_time` steps.
    ///
    /// Freeze-up keeps only real dates; everything else is NaN. Break-up
    /// places always-water cells at step 0 and always-ice or undefined cells
    /// at the end of the series.
    pub fn ordinal(self, date: PhenologyDate, n_time: usize) -> f64 {
        match (self, date) {
            (_, PhenologyDate::Day(d)) => d as f64,
            (PhenologyKind::FreezeUp, _) => f64::NAN,
            (PhenologyKind::BreakUp, PhenologyDate::AlwaysWater) => 0.0,
            (PhenologyKind::BreakUp, _) => n_time as f64,
        }
    }

    /// Quantile estimator used for the calibration terciles.
    pub fn tercile_method(self) -> QuantileMethod {
        match self {
            PhenologyKind::FreezeUp => QuantileMethod::ClosestObservation,
            PhenologyKind::BreakUp => QuantileMethod::Linear,
        }
    }
}

fn is_ice(v: f64) -> bool {
    v > 0.0
}

/// First step with ice.
pub fn freeze_up(series: &[f64]) -> PhenologyDate {
    let valid = finite(series);
    if valid.is_empty() {
        return PhenologyDate::Undefined;
    }
    if series.first().is_some_and(|&v| is_ice(v)) {
        return PhenologyDate::AlwaysIce;
    }
    match series.iter().position(|&v| is_ice(v)) {
        Some(day) => PhenologyDate::Day(day),
        None => PhenologyDate::AlwaysWater,
    }
}

/// First water step after the last ice step.
///
/// Undefined when ice or missing data appears within the last
/// [`BREAK_UP_WINDOW`] steps (all steps for shorter series).
pub fn break_up(series: &[f64]) -> PhenologyDate {
    let valid = finite(series);
    if valid.is_empty() {
        return PhenologyDate::Undefined;
    }
    if !valid.iter().any(|&v| is_ice(v)) {
        return PhenologyDate::AlwaysWater;
    }
    if valid.iter().all(|&v| is_ice(v)) {
        return PhenologyDate::AlwaysIce;
    }
    let window = &series[series.len().saturating_sub(BREAK_UP_WINDOW)..];
    if window.iter().any(|&v| v.is_nan() || is_ice(v)) {
        return PhenologyDate::Undefined;
    }
    match series.iter().rposition(|&v| is_ice(v)) {
        Some(last) => PhenologyDate::Day(last + 1),
        None => PhenologyDate::AlwaysWater,
    }
}

/// Dates of a field with the `time` axis reduced away.
#[derive(Debug, Clone)]
pub struct PhenologyField {
    /// One date per remaining index.
    pub dates: ArrayD<PhenologyDate>,
    /// [`PhenologyKind::ordinal`] of every date, with the field's axes and
    /// grid minus `time`.
    pub ordinals: Field,
}

impl PhenologyField {
    /// 1 where `date` equals `which`, 0 elsewhere, as a field shaped like
    /// the ordinals.
    pub fn indicator(&self, which: PhenologyDate) -> Field {
        let mut out = self.ordinals.clone();
        for (v, d) in out.data_mut().iter_mut().zip(self.dates.iter()) {
            *v = if *d == which { 1.0 } else { 0.0 };
        }
        out
    }
}

/// Detect `kind` along the `time` axis of every series in `field`.
///
/// # Errors
///
/// Returns [`EdgeError::Validation`] if the field has no `time` axis.
pub fn phenology_dates(field: &Field, kind: PhenologyKind) -> Result<PhenologyField, EdgeError> {
    let ax = field.axis_of(Dim::Time).ok_or_else(|| EdgeError::Validation {
        count: 1,
        details: format!("field '{}' has no time axis", field.name()),
    })?;
    let n_time = field.shape()[ax];
    let dates = field
        .data()
        .map_axis(Axis(ax), |lane| kind.detect(&lane.to_vec()));
    let mut ordinals = field.reduce(Dim::Time, |_| f64::NAN);
    for (v, d) in ordinals.data_mut().iter_mut().zip(dates.iter()) {
        *v = kind.ordinal(*d, n_time);
    }
    debug!(?kind, n_time, series = dates.len(), "detected phenology dates");
    Ok(PhenologyField { dates, ordinals })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    const N: f64 = f64::NAN;

    #[test]
    fn freeze_up_cases() {
        assert_eq!(freeze_up(&[0.0, 0.0, 1.0, 1.0]), PhenologyDate::Day(2));
        assert_eq!(freeze_up(&[1.0, 0.0, 1.0]), PhenologyDate::AlwaysIce);
        assert_eq!(freeze_up(&[0.0, 0.0, 0.0]), PhenologyDate::AlwaysWater);
        assert_eq!(freeze_up(&[N, N]), PhenologyDate::Undefined);
        assert_eq!(freeze_up(&[N, 0.0, 1.0]), PhenologyDate::Day(2));
    }

    #[test]
    fn break_up_cases() {
        let mut melt = vec![1.0; 5];
        melt.extend([0.0; 8]);
        assert_eq!(break_up(&melt), PhenologyDate::Day(5));
        assert_eq!(break_up(&[0.0; 10]), PhenologyDate::AlwaysWater);
        assert_eq!(break_up(&[1.0; 10]), PhenologyDate::AlwaysIce);

        let mut late_ice = melt.clone();
        late_ice[10] = 1.0;
        assert_eq!(break_up(&late_ice), PhenologyDate::Undefined);

        let mut gap = melt;
        gap[12] = N;
        assert_eq!(break_up(&gap), PhenologyDate::Undefined);
    }

    #[test]
    fn ordinals_by_kind() {
        let fu = PhenologyKind::FreezeUp;
        assert_eq!(fu.ordinal(PhenologyDate::Day(4), 30), 4.0);
        assert!(fu.ordinal(PhenologyDate::AlwaysIce, 30).is_nan());
        let bu = PhenologyKind::BreakUp;
        assert_eq!(bu.ordinal(PhenologyDate::AlwaysWater, 30), 0.0);
        assert_eq!(bu.ordinal(PhenologyDate::AlwaysIce, 30), 30.0);
        assert_eq!(bu.ordinal(PhenologyDate::Undefined, 30), 30.0);
    }

    #[test]
    fn dates_over_time_axis() {
        let data = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![0.0, 1.0, 1.0, 1.0, 1.0, 1.0]).unwrap();
        let f = Field::new("sic", vec![Dim::Member, Dim::Time], data).unwrap();
        let out = phenology_dates(&f, PhenologyKind::FreezeUp).unwrap();
        assert_eq!(out.ordinals.dims(), &[Dim::Member]);
        assert_eq!(out.dates[[0]], PhenologyDate::Day(1));
        assert_eq!(out.dates[[1]], PhenologyDate::AlwaysIce);
        assert!(out.ordinals.data()[[1]].is_nan());
        assert_eq!(out.indicator(PhenologyDate::AlwaysIce).data()[[1]], 1.0);
    }

    #[test]
    fn needs_time_axis() {
        let f = Field::filled("sic", vec![Dim::Y, Dim::X], &[1, 1], 0.0).unwrap();
        assert!(matches!(
            phenology_dates(&f, PhenologyKind::BreakUp),
            Err(EdgeError::Validation { .. })
        ));
    }
}
