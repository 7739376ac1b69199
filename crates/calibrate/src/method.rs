//! Calibration methods.

use std::fmt;
use std::str::FromStr;

use crate::error::CalibrationError;

/// How the verification forecast is corrected with the calibration period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationMethod {
    /// Subtract the mean forecast bias of the calibration period.
    Mean,
    /// Subtract the mean calibration forecast.
    Anom,
    /// Subtract a per-cell linear trend of the bias over calibration years.
    MeanTrend,
    /// Leave the forecast unchanged; the metric calibrates its score.
    Score,
}

impl CalibrationMethod {
    /// Configuration name.
    pub fn as_str(self) -> &'static str {
        match self {
            CalibrationMethod::Mean => "mean",
            CalibrationMethod::Anom => "anom",
            CalibrationMethod::MeanTrend => "mean+trend",
            CalibrationMethod::Score => "score",
        }
    }
}

impl fmt::Display for CalibrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalibrationMethod {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(CalibrationMethod::Mean),
            "anom" => Ok(CalibrationMethod::Anom),
            "mean+trend" => Ok(CalibrationMethod::MeanTrend),
            "score" => Ok(CalibrationMethod::Score),
            other => Err(CalibrationError::UnknownMethod {
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for m in [
            CalibrationMethod::Mean,
            CalibrationMethod::Anom,
            CalibrationMethod::MeanTrend,
            CalibrationMethod::Score,
        ] {
            assert_eq!(m.as_str().parse::<CalibrationMethod>().unwrap(), m);
        }
        assert!("trend".parse::<CalibrationMethod>().is_err());
    }
}
