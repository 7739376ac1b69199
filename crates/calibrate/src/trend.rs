//! Per-cell linear trends.

use icecap_io::{Dim, Field};
use icecap_stats::{LinearFit, linregress};
use ndarray::Axis;
use rayon::prelude::*;
use tracing::debug;

use crate::error::CalibrationError;

/// Slope, intercept and p-value fields of a per-cell regression.
#[derive(Debug, Clone)]
pub struct TrendFit {
    /// Change per step along the regression axis.
    pub slope: Field,
    /// Fitted value at index 0.
    pub intercept: Field,
    /// Two-sided p-value of a zero slope.
    pub pvalue: Field,
}

/// Regress `series` on the index `0..n` of axis `along`, independently for
/// every other index (cell, time step, ...).
///
/// Constant lanes get slope 0, the constant as intercept and p-value 1;
/// lanes containing NaN give NaN.
///
/// # Errors
///
/// Returns [`CalibrationError::Validation`] if `series` has no `along` axis.
pub fn fit_trend(series: &Field, along: Dim) -> Result<TrendFit, CalibrationError> {
    let ax = series.axis_of(along).ok_or_else(|| CalibrationError::Validation {
        count: 1,
        details: format!("'{}' has no {along} axis to regress along", series.name()),
    })?;

    let lanes: Vec<Vec<f64>> = series
        .data()
        .lanes(Axis(ax))
        .into_iter()
        .map(|lane| lane.to_vec())
        .collect();
    let fits: Vec<LinearFit> = lanes.par_iter().map(|y| linregress(y)).collect();
    debug!(field = %series.name(), lanes = fits.len(), "fitted trends");

    let template = series.reduce(along, |_| f64::NAN);
    let build = |name: &str, pick: fn(&LinearFit) -> f64| {
        let mut field = template.clone().renamed(name);
        for (v, fit) in field.data_mut().iter_mut().zip(&fits) {
            *v = pick(fit);
        }
        field
    };
    Ok(TrendFit {
        slope: build("slope", |f| f.slope),
        intercept: build("intercept", |f| f.intercept),
        pvalue: build("pvalue", |f| f.pvalue),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn trend_per_cell() {
        // 4 dates x 1 x 2 cells: cell 0 rises by 0.1, cell 1 constant.
        let data = ArrayD::from_shape_fn(IxDyn(&[4, 1, 2]), |ix| {
            if ix[2] == 0 { 0.1 * ix[0] as f64 } else { 0.3 }
        });
        let f = Field::new("bias", vec![Dim::Date, Dim::Y, Dim::X], data).unwrap();
        let fit = fit_trend(&f, Dim::Date).unwrap();

        assert_eq!(fit.slope.dims(), &[Dim::Y, Dim::X]);
        assert_relative_eq!(fit.slope.data()[[0, 0]], 0.1, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept.data()[[0, 0]], 0.0, epsilon = 1e-12);
        assert_eq!(fit.slope.data()[[0, 1]], 0.0);
        assert_relative_eq!(fit.intercept.data()[[0, 1]], 0.3, epsilon = 1e-12);
        assert_eq!(fit.pvalue.data()[[0, 1]], 1.0);
    }

    #[test]
    fn missing_axis_is_rejected() {
        let f = Field::new("bias", vec![Dim::Y, Dim::X], ArrayD::zeros(IxDyn(&[1, 1]))).unwrap();
        assert!(fit_trend(&f, Dim::Date).is_err());
    }
}
