//! Apply a calibration method to the verification forecast.

use icecap_io::{Dim, Field};
use ndarray::{ArrayD, IxDyn};
use tracing::info;

use crate::error::CalibrationError;
use crate::method::CalibrationMethod;
use crate::trend::fit_trend;

/// Axes averaged away for `mean` and `anom`.
const MEAN_DIMS: [Dim; 3] = [Dim::Inidate, Dim::Date, Dim::Member];
/// Axes averaged away before fitting the bias trend over `date`.
const TREND_DIMS: [Dim; 2] = [Dim::Inidate, Dim::Member];
/// Years the calibration year axis extends past its last calibration year.
const TREND_EXTRAPOLATION_YEARS: i32 = 99;

/// Years needed for `mean+trend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendYears {
    /// First calibration year.
    pub calib_from: i32,
    /// Last calibration year.
    pub calib_to: i32,
    /// Year of each verification start date, in `date` order.
    pub verif: Vec<i32>,
}

impl TrendYears {
    /// Position of `year` on the calibration year axis
    /// `calib_from ..= calib_to + 99`.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::YearOutsideAxis`] for years off the axis.
    pub fn index_of(&self, year: i32) -> Result<f64, CalibrationError> {
        let last = self.calib_to + TREND_EXTRAPOLATION_YEARS;
        if year < self.calib_from || year > last {
            return Err(CalibrationError::YearOutsideAxis {
                year,
                first: self.calib_from,
                last,
            });
        }
        Ok(f64::from(year - self.calib_from))
    }
}

/// Corrects a verification forecast with a calibration forecast/observation
/// pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibrator {
    method: CalibrationMethod,
    years: Option<TrendYears>,
}

impl Calibrator {
    /// Calibrator for `method`.
    pub fn new(method: CalibrationMethod) -> Self {
        Self { method, years: None }
    }

    /// Set the years used by `mean+trend`.
    pub fn with_trend_years(mut self, years: TrendYears) -> Self {
        self.years = Some(years);
        self
    }

    /// The configured method.
    pub fn method(&self) -> CalibrationMethod {
        self.method
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::Validation`] listing every problem found.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let mut problems = Vec::new();
        if self.method == CalibrationMethod::MeanTrend {
            match &self.years {
                None => problems.push("mean+trend requires calibration and verification years".to_string()),
                Some(y) => {
                    if y.calib_from > y.calib_to {
                        problems.push(format!(
                            "calibration years {}-{} are reversed",
                            y.calib_from, y.calib_to
                        ));
                    }
                    if y.verif.is_empty() {
                        problems.push("no verification years".to_string());
                    }
                }
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(CalibrationError::Validation {
                count: problems.len(),
                details: problems.join("; "),
            })
        }
    }

    /// Calibrate `fc_verif`. The result keeps the name, time labels and grid
    /// of `fc_verif`.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::Validation`] for an invalid configuration
    /// or a verification `date` axis that does not match the verification
    /// years, [`CalibrationError::YearOutsideAxis`] for `mean+trend` years
    /// off the calibration axis, and [`CalibrationError::Io`] when the fields
    /// cannot be broadcast.
    pub fn apply(&self, fc_calib: &Field, obs_calib: &Field, fc_verif: &Field) -> Result<Field, CalibrationError> {
        self.validate()?;
        info!(method = %self.method, "calibrating forecast");
        match self.method {
            CalibrationMethod::Score => Ok(fc_verif.clone()),
            CalibrationMethod::Mean => {
                let bias = fc_calib.mean_over_all(&MEAN_DIMS).sub(&obs_calib.mean_over_all(&MEAN_DIMS))?;
                Ok(fc_verif.sub(&bias)?)
            }
            CalibrationMethod::Anom => Ok(fc_verif.sub(&fc_calib.mean_over_all(&MEAN_DIMS))?),
            CalibrationMethod::MeanTrend => self.apply_trend(fc_calib, obs_calib, fc_verif),
        }
    }

    fn apply_trend(&self, fc_calib: &Field, obs_calib: &Field, fc_verif: &Field) -> Result<Field, CalibrationError> {
        let Some(years) = &self.years else {
            return Err(CalibrationError::Validation {
                count: 1,
                details: "mean+trend requires calibration and verification years".to_string(),
            });
        };
        let bias = fc_calib.mean_over_all(&TREND_DIMS).sub(&obs_calib.mean_over_all(&TREND_DIMS))?;
        let fit = fit_trend(&bias, Dim::Date)?;

        let index = years
            .verif
            .iter()
            .map(|&y| years.index_of(y))
            .collect::<Result<Vec<_>, _>>()?;
        let index_field = match fc_verif.len_of(Dim::Date) {
            Some(n) if n == index.len() => {
                Field::new("year_index", vec![Dim::Date], ArrayD::from_shape_fn(IxDyn(&[n]), |ix| index[ix[0]]))?
            }
            None if index.len() == 1 => Field::new("year_index", Vec::new(), ArrayD::from_elem(IxDyn(&[]), index[0]))?,
            other => {
                return Err(CalibrationError::Validation {
                    count: 1,
                    details: format!(
                        "{} verification years for a date axis of length {}",
                        index.len(),
                        other.unwrap_or(0)
                    ),
                });
            }
        };

        let correction = fit.slope.zip_with(&index_field, |s, i| s * i)?.add(&fit.intercept)?;
        Ok(fc_verif.sub(&correction)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn field(dims: Vec<Dim>, shape: &[usize], f: impl Fn(&IxDyn) -> f64) -> Field {
        Field::new("sic", dims, ArrayD::from_shape_fn(IxDyn(shape), |ix| f(&ix))).unwrap()
    }

    #[test]
    fn score_passes_through() {
        let fc = field(vec![Dim::Time], &[2], |_| 0.5);
        let out = Calibrator::new(CalibrationMethod::Score).apply(&fc, &fc, &fc).unwrap();
        assert_eq!(out.data(), fc.data());
    }

    #[test]
    fn anomaly_subtracts_calibration_mean() {
        let calib = field(vec![Dim::Date, Dim::Member, Dim::Time], &[2, 2, 1], |ix| (ix[0] + ix[1]) as f64);
        let verif = field(vec![Dim::Member, Dim::Time], &[1, 1], |_| 3.0);
        let out = Calibrator::new(CalibrationMethod::Anom).apply(&calib, &calib, &verif).unwrap();
        assert_relative_eq!(out.data()[[0, 0]], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn trend_requires_years() {
        let c = Calibrator::new(CalibrationMethod::MeanTrend);
        assert!(matches!(c.validate(), Err(CalibrationError::Validation { .. })));
    }

    #[test]
    fn trend_is_extrapolated() {
        // Bias grows by 0.01 per year from 0.1 in 2000.
        let fc_calib = field(vec![Dim::Date, Dim::Time], &[5, 1], |ix| 0.5 + 0.1 + 0.01 * ix[0] as f64);
        let obs_calib = field(vec![Dim::Date, Dim::Time], &[5, 1], |_| 0.5);
        let fc_verif = field(vec![Dim::Date, Dim::Time], &[1, 1], |_| 0.9);

        let years = TrendYears {
            calib_from: 2000,
            calib_to: 2004,
            verif: vec![2010],
        };
        let out = Calibrator::new(CalibrationMethod::MeanTrend)
            .with_trend_years(years)
            .apply(&fc_calib, &obs_calib, &fc_verif)
            .unwrap();
        assert_relative_eq!(out.data()[[0, 0]], 0.9 - (0.1 + 0.01 * 10.0), epsilon = 1e-9);
    }

    #[test]
    fn year_before_calibration_raises() {
        let years = TrendYears {
            calib_from: 2000,
            calib_to: 2010,
            verif: vec![1999],
        };
        assert!(matches!(
            years.index_of(1999),
            Err(CalibrationError::YearOutsideAxis { first: 2000, last: 2109, .. })
        ));
        assert_eq!(years.index_of(2109).unwrap(), 109.0);
    }
}
