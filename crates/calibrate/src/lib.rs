//! # icecap-calibrate
//!
//! Bias correction of a verification forecast using a calibration period,
//! per-cell trend fitting, and the archive of precomputed calibration
//! results.
//!
//! ## Architecture
//!
//! ```mermaid
//! graph LR
//!     A["calibration forecast"] --> C["Calibrator::apply()"]
//!     B["calibration observation"] --> C
//!     V["verification forecast"] --> C
//!     C -->|"mean / anom"| D["fc - bias"]
//!     C -->|"mean+trend"| T["fit_trend() over date"]
//!     T --> D
//!     C -->|"score"| V2["forecast unchanged"]
//!     R["calibration Dataset"] -->|"CalibrationArchive::save()"| F["{metric_dir}/…nc"]
//!     F -->|"CalibrationArchive::load()"| R
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use icecap_calibrate::{CalibrationMethod, Calibrator};
//!
//! let corrected = Calibrator::new(CalibrationMethod::Mean).apply(&fc_calib, &obs_calib, &fc)?;
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `method` | `CalibrationMethod` names |
//! | `engine` | `Calibrator`, `TrendYears` |
//! | `trend` | Per-cell linear regression (parallel over cells) |
//! | `archive` | Calibration file naming, saving and loading |
//! | `error` | Error types |

mod archive;
mod engine;
mod error;
mod method;
mod trend;

pub use archive::{ArchiveKey, CalibrationArchive};
pub use engine::{Calibrator, TrendYears};
pub use error::CalibrationError;
pub use method::CalibrationMethod;
pub use trend::{TrendFit, fit_trend};
