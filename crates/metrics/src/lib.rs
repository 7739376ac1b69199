//! # icecap-metrics
//!
//! Verification metrics of sea-ice forecasts: loads forecast and
//! observation fields from the cache, masks and calibrates them, computes
//! one of the [`MetricKind`]s and returns datasets annotated for plotting.
//!
//! ## Architecture
//!
//! ```mermaid
//! graph TD
//!     C["MetricConfig"] -->|"validate()"| E["Evaluator::compute()"]
//!     E --> P["prepare()"]
//!     P -->|"Loader"| L["forecast / observation / persistence"]
//!     L --> M["mask, threshold, edge restriction"]
//!     M -->|"data statistic"| A["area reduction"]
//!     A -->|"Calibrator"| B["calibrated forecast"]
//!     B --> K{"MetricKind"}
//!     K --> S["scores, skill, phenology, distance"]
//!     S -->|"score statistic"| R["MetricResult"]
//!     R -->|"save()"| N["{metric_dir}/{id}/{id}.nc"]
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use icecap_io::NetcdfCache;
//! use icecap_metrics::{Evaluator, MetricConfig, MetricKind};
//!
//! let config = MetricConfig::new("bias-1", MetricKind::Bias, verif, target);
//! let result = Evaluator::new(&config, &NetcdfCache).compute()?;
//! result.save(config.metric_dir(), config.id())?;
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | `MetricConfig` builder and validation |
//! | `kind` | Metric names and plot presentation |
//! | `pipeline` | `Evaluator`: loading, masking, calibration, area statistics |
//! | `skill` | Skill scores against a reference forecast |
//! | `output` | Result datasets, plot commands, phenology encoding |
//! | `bias` | Bias maps and forecast error |
//! | `rmse` | RMSE and spread-error ratio |
//! | `probabilistic` | Brier score, CRPS, spatial probability score |
//! | `iiee` | Integrated ice-edge error |
//! | `ensmean` | Ensemble mean and plumes |
//! | `trend` | Linear trend |
//! | `phenology` | Freeze-up and break-up probabilities |
//! | `distance` | Distance to the ice edge |
//! | `error` | Error types |

mod bias;
mod config;
mod distance;
mod ensmean;
mod error;
mod iiee;
mod kind;
mod output;
mod phenology;
mod pipeline;
mod probabilistic;
mod rmse;
mod skill;
mod trend;

pub use config::{CalibrationSettings, ForecastSelection, MetricConfig, RegionSpec};
pub use error::MetricError;
pub use kind::{Levels, MetricKind, Presentation};
pub use output::{
    ALL_ICE, ALL_WATER, CommandArg, MetricResult, PlotCommand, encode_phenology, mark_phenology_extremes,
    set_plot_commands,
};
pub use pipeline::{Evaluator, FULL_MASK_NAME, PrepareOptions, Prepared};
pub use skill::{SKILL_EPSILON, SkillScore, compute_skill_score};
