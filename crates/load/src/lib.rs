//! # icecap-load
//!
//! Build forecast sets from a date selection and assemble forecast and
//! observation fields from per-date cache files.
//!
//! ## Architecture
//!
//! ```mermaid
//! graph LR
//!     A["Experiment + DateSelection"] -->|"forecast_sets()"| B["Vec of ForecastSet"]
//!     B -->|"Loader::load_forecast()"| C["Field [inidate, date, member, time, yc, xc]"]
//!     B -->|"Loader::load_observation()"| D["Option of Field"]
//!     E["TemporalAverage"] -.->|"data stage"| C
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use icecap_io::{Dim, NetcdfCache};
//! use icecap_load::{Experiment, Loader, forecast_sets};
//!
//! let sets = forecast_sets(&experiment, &selection, cache_root)?;
//! let loader = Loader::new(&NetcdfCache, "ci", "osi-cdr", obs_dir);
//! let fc = loader.load_forecast(&sets, &target, &[Dim::Member])?;
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `forecast_set` | Experiments, modes and forecast sets with model cycles |
//! | `loader` | Forecast/observation assembly through a `CacheStore` |
//! | `temporal` | Lead-block and monthly temporal averaging |
//! | `error` | Error types |

mod error;
mod forecast_set;
mod loader;
mod temporal;

pub use error::LoadError;
pub use forecast_set::{Experiment, ForecastSet, Mode, forecast_sets};
pub use loader::Loader;
pub use temporal::{
    AverageStage, TemporalAverage, Timescale, average_by_label, average_lead_blocks, select_months,
};
