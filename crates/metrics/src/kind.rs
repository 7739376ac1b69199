//! The metric registry and each metric's static display attributes.

use std::fmt;
use std::str::FromStr;

use icecap_io::Dataset;

use crate::error::MetricError;

/// Every supported metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Bias,
    ForecastError,
    BiasCorrectedMap,
    Rmse,
    Brier,
    Crps,
    Iiee,
    Sps,
    Ser,
    Ensmean,
    LinearTrend,
    Plume,
    FreezeUp,
    BreakUp,
    IceDistance,
}

impl MetricKind {
    /// All metrics in registry order.
    pub const ALL: [MetricKind; 15] = [
        MetricKind::Bias,
        MetricKind::ForecastError,
        MetricKind::BiasCorrectedMap,
        MetricKind::Rmse,
        MetricKind::Brier,
        MetricKind::Crps,
        MetricKind::Iiee,
        MetricKind::Sps,
        MetricKind::Ser,
        MetricKind::Ensmean,
        MetricKind::LinearTrend,
        MetricKind::Plume,
        MetricKind::FreezeUp,
        MetricKind::BreakUp,
        MetricKind::IceDistance,
    ];

    /// Name used as `plottype` in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Bias => "bias",
            MetricKind::ForecastError => "forecast_error",
            MetricKind::BiasCorrectedMap => "bias_corrected_map",
            MetricKind::Rmse => "rmse",
            MetricKind::Brier => "brier",
            MetricKind::Crps => "crps",
            MetricKind::Iiee => "iiee",
            MetricKind::Sps => "sps",
            MetricKind::Ser => "ser",
            MetricKind::Ensmean => "ensmean",
            MetricKind::LinearTrend => "linear_trend",
            MetricKind::Plume => "plume",
            MetricKind::FreezeUp => "freeze_up",
            MetricKind::BreakUp => "break_up",
            MetricKind::IceDistance => "ice_distance",
        }
    }

    /// Whether the metric only makes sense with a calibration period.
    pub fn requires_calibration(self) -> bool {
        matches!(
            self,
            MetricKind::BiasCorrectedMap | MetricKind::FreezeUp | MetricKind::BreakUp
        )
    }

    /// Whether the metric rejects a configured calibration period.
    pub fn rejects_calibration(self) -> bool {
        matches!(
            self,
            MetricKind::Crps | MetricKind::Iiee | MetricKind::Sps | MetricKind::Ser
        )
    }

    /// Whether the metric reads a precomputed calibration archive.
    pub fn uses_calibration_archive(self) -> bool {
        matches!(self, MetricKind::FreezeUp | MetricKind::BreakUp)
    }

    /// Static display attributes. `area_statistic` is whether the result is
    /// spatially reduced, which turns off clipping for some maps.
    pub fn presentation(self, area_statistic: Option<&str>) -> Presentation {
        let base = Presentation::default();
        match self {
            MetricKind::Bias => Presentation {
                cmap: Some("RdBu_r"),
                levels: Some(Levels::Range(-0.22, 0.26, 0.04)),
                plottext: Some("bias to {verif}"),
                ..base
            },
            MetricKind::ForecastError => Presentation {
                cmap: Some("RdBu_r"),
                levels: Some(Levels::List(&[-0.25, -0.2, -0.15, -0.1, -0.05, 0.05, 0.1, 0.15, 0.2, 0.25])),
                plottext: Some("bias to {verif}"),
                ylabel: Some("sic"),
                ..base
            },
            MetricKind::BiasCorrectedMap => Presentation {
                levels: Some(Levels::Range(0.0, 1.1, 0.1)),
                clip: true,
                plottext: Some("wrt {verif}"),
                ..base
            },
            MetricKind::Rmse => Presentation {
                cmap: Some("hot_r"),
                levels: Some(Levels::Range(0.05, 1.05, 0.1)),
                ylabel: Some("RMSE"),
                ..base
            },
            MetricKind::Brier => Presentation {
                cmap: Some("bwr"),
                levels: Some(Levels::Range(-1.0, 1.1, 0.1)),
                ylabel: Some("BSS"),
                ..base
            },
            MetricKind::Crps => Presentation {
                cmap: Some("bwr"),
                levels: Some(Levels::Range(-1.05, 1.1, 0.1)),
                ylabel: Some("CRPSS"),
                ..base
            },
            MetricKind::Iiee => Presentation {
                ylabel: Some("IIEE"),
                ..base
            },
            MetricKind::Sps => Presentation {
                ylabel: Some("SPS"),
                ..base
            },
            MetricKind::Ser => Presentation {
                levels: Some(Levels::List(&[
                    0.3, 0.5, 0.6, 0.7, 0.8, 0.9, 0.95, 1.05, 1.1, 1.2, 1.3, 1.4, 1.5, 1.7,
                ])),
                ylabel: Some("SER"),
                ..base
            },
            MetricKind::Ensmean => Presentation {
                levels: Some(Levels::Range(0.0, 1.1, 0.1)),
                clip: matches!(area_statistic, None | Some("mean")),
                ylabel: Some("sic"),
                ..base
            },
            MetricKind::LinearTrend => Presentation {
                cmap: Some("seismic_r"),
                levels: Some(Levels::Range(-31.5, 33.0, 3.0)),
                ylabel: Some("sic"),
                ..base
            },
            MetricKind::Plume => Presentation {
                levels: Some(Levels::Range(0.0, 1.1, 0.1)),
                ylabel: Some("sic"),
                ..base
            },
            MetricKind::FreezeUp | MetricKind::BreakUp => Presentation {
                cmap: Some("coolwarm"),
                levels: Some(Levels::List(PHENOLOGY_LEVELS)),
                ticks: Some(&[-105.0, -85.0, -65.0, -55.0, -45.0, 0.0, 45.0, 55.0, 65.0, 85.0, 105.0]),
                ticklabels: Some(&[
                    "open water", "70-100", "60-70", "50-60", "40-50", "other", "40-50", "50-60", "60-70",
                    "70-100", "ice",
                ]),
                clip: true,
                ylabel: Some("sic"),
                legendtext: Some("percentage of members"),
                ..base
            },
            MetricKind::IceDistance => Presentation {
                levels: Some(Levels::Open(0.0)),
                clip: true,
                ..base
            },
        }
    }
}

const PHENOLOGY_LEVELS: &[f64] = &[
    -110.0, -100.0, -70.0, -60.0, -50.0, -40.0, 40.0, 50.0, 60.0, 70.0, 100.00001, 110.0,
];

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| MetricError::UnknownMetric { value: s.to_string() })
    }
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Contour levels of a map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Levels {
    /// `start, start + step, ...` below `stop`.
    Range(f64, f64, f64),
    /// Explicit levels.
    List(&'static [f64]),
    /// Lower bound only.
    Open(f64),
}

impl Levels {
    /// The levels as numbers. An open upper bound yields just the lower one.
    pub fn values(&self) -> Vec<f64> {
        match *self {
            Levels::Range(start, stop, step) => {
                let n = ((stop - start) / step - 1e-9).ceil().max(0.0) as usize;
                (0..n)
                    .map(|i| round6(start + i as f64 * step))
                    .collect()
            }
            Levels::List(values) => values.to_vec(),
            Levels::Open(lower) => vec![lower],
        }
    }
}

impl fmt::Display for Levels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.values().iter().map(|v| v.to_string()).collect();
        match self {
            Levels::Open(_) => write!(f, "[{}, None]", values.join(", ")),
            _ => write!(f, "[{}]", values.join(", ")),
        }
    }
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

/// Display attributes attached to every result dataset of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Presentation {
    pub cmap: Option<&'static str>,
    pub levels: Option<Levels>,
    pub ticks: Option<&'static [f64]>,
    pub ticklabels: Option<&'static [&'static str]>,
    pub clip: bool,
    /// Subtitle; `{verif}` is replaced by the verification dataset name.
    pub plottext: Option<&'static str>,
    pub ylabel: Option<&'static str>,
    pub legendtext: Option<&'static str>,
}

impl Presentation {
    /// Write the attributes into `dataset`.
    pub fn apply(&self, dataset: &mut Dataset, verif_name: &str) {
        if let Some(cmap) = self.cmap {
            dataset.set_attr("cmap", cmap);
        }
        if let Some(levels) = self.levels {
            dataset.set_attr("levels", levels.to_string());
        }
        if let Some(ticks) = self.ticks {
            let ticks: Vec<String> = ticks.iter().map(|t| t.to_string()).collect();
            dataset.set_attr("ticks", ticks);
        }
        if let Some(labels) = self.ticklabels {
            let labels: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
            dataset.set_attr("ticklabels", labels);
        }
        dataset.set_attr("clip", if self.clip { "true" } else { "false" });
        if let Some(text) = self.plottext {
            dataset.set_attr("plottext", text.replace("{verif}", verif_name));
        }
        if let Some(label) = self.ylabel {
            dataset.set_attr("ylabel", label);
        }
        if let Some(text) = self.legendtext {
            dataset.set_attr("legendtext", text);
        }
    }
}
