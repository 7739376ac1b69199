//! Forecast experiments and the forecast sets built from a date selection.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use icecap_calendar::{CycleQuery, DateSelection, model_cycle};
use tracing::{debug, info};

use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Forecast or hindcast (re-forecast) runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Real-time forecasts (`fc`).
    #[default]
    Forecast,
    /// Hindcasts (`hc`); the model cycle follows the reference dates.
    Hindcast,
}

impl Mode {
    /// Parse `fc` or `hc`.
    pub fn parse(value: &str) -> Result<Self, LoadError> {
        match value {
            "fc" => Ok(Mode::Forecast),
            "hc" => Ok(Mode::Hindcast),
            other => Err(LoadError::Validation {
                count: 1,
                details: format!("mode must be 'fc' or 'hc', got '{other}'"),
            }),
        }
    }

    /// Directory and file-name token.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Forecast => "fc",
            Mode::Hindcast => "hc",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Experiment
// ---------------------------------------------------------------------------

/// Identity of a forecasting experiment in the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    source: String,
    fcsystem: String,
    expname: String,
    modelname: Option<String>,
    mode: Mode,
    enssize: usize,
    reference_dates: Vec<NaiveDate>,
}

impl Experiment {
    /// Experiment with one member in forecast mode.
    pub fn new(
        source: impl Into<String>,
        fcsystem: impl Into<String>,
        expname: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            fcsystem: fcsystem.into(),
            expname: expname.into(),
            modelname: None,
            mode: Mode::Forecast,
            enssize: 1,
            reference_dates: Vec::new(),
        }
    }

    /// Set the S2S centre code.
    pub fn with_modelname(mut self, modelname: Option<String>) -> Self {
        self.modelname = modelname;
        self
    }

    /// Set forecast or hindcast mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the ensemble size.
    pub fn with_enssize(mut self, enssize: usize) -> Self {
        self.enssize = enssize;
        self
    }

    /// Set the hindcast reference dates.
    pub fn with_reference_dates(mut self, dates: Vec<NaiveDate>) -> Self {
        self.reference_dates = dates;
        self
    }

    /// Data provider.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Forecast system.
    pub fn fcsystem(&self) -> &str {
        &self.fcsystem
    }

    /// Experiment identifier.
    pub fn expname(&self) -> &str {
        &self.expname
    }

    /// S2S centre code.
    pub fn modelname(&self) -> Option<&str> {
        self.modelname.as_deref()
    }

    /// Forecast or hindcast.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Ensemble size.
    pub fn enssize(&self) -> usize {
        self.enssize
    }

    /// Validate the experiment.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Validation`] listing every problem found.
    pub fn validate(&self) -> Result<(), LoadError> {
        let mut problems = Vec::new();
        for (name, value) in [
            ("source", &self.source),
            ("fcsystem", &self.fcsystem),
            ("expname", &self.expname),
        ] {
            if value.is_empty() {
                problems.push(format!("{name} must not be empty"));
            }
        }
        if self.enssize == 0 {
            problems.push("enssize must be at least 1".to_string());
        }
        if self.mode == Mode::Hindcast && self.reference_dates.is_empty() {
            problems.push("hindcast mode requires reference dates".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(LoadError::Validation {
                count: problems.len(),
                details: problems.join("; "),
            })
        }
    }

    fn cycle_query(&self) -> CycleQuery {
        CycleQuery {
            source: self.source.clone(),
            fcsystem: self.fcsystem.clone(),
            expname: self.expname.clone(),
            modelname: self.modelname.clone(),
            mode: self.mode.as_str().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// ForecastSet
// ---------------------------------------------------------------------------

/// Start dates loaded together from one cache directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSet {
    /// `all` for explicit dates, else the `MMDD`.
    pub label: String,
    /// Start dates in order.
    pub dates: Vec<NaiveDate>,
    /// Directory holding the per-member cache files.
    pub cache_dir: PathBuf,
    /// Ensemble size.
    pub enssize: usize,
    /// Model cycle shared by all dates.
    pub cycle: String,
}

/// Build the forecast sets of `experiment` for `selection`.
///
/// The model cycle of each set is resolved from its start dates (forecast
/// mode) or from the reference dates (hindcast mode) before any file is
/// touched. Sets without any valid date are skipped.
///
/// # Errors
///
/// Returns [`LoadError::Validation`] for an invalid experiment and
/// [`LoadError::MixedCycles`] if the dates of one set resolve to more than one
/// model cycle.
pub fn forecast_sets(
    experiment: &Experiment,
    selection: &DateSelection,
    cache_root: &Path,
) -> Result<Vec<ForecastSet>, LoadError> {
    experiment.validate()?;
    let query = experiment.cycle_query();

    let mut sets = Vec::new();
    for (label, dates) in selection.sets() {
        if dates.is_empty() {
            info!(set = %label, "no forecasts for date");
            continue;
        }
        let cycle_dates = match experiment.mode {
            Mode::Forecast => &dates,
            Mode::Hindcast => &experiment.reference_dates,
        };
        let cycles: BTreeSet<String> = cycle_dates.iter().map(|d| model_cycle(&query, *d)).collect();
        let mut cycles = cycles.into_iter();
        let cycle = match (cycles.next(), cycles.len()) {
            (Some(c), 0) => c,
            (first, _) => {
                return Err(LoadError::MixedCycles {
                    label,
                    cycles: first.into_iter().chain(cycles).collect(),
                });
            }
        };

        let cache_dir = cache_root
            .join(&experiment.source)
            .join(&experiment.fcsystem)
            .join(&experiment.expname)
            .join(&cycle)
            .join(experiment.mode.as_str());
        debug!(set = %label, dates = dates.len(), %cycle, "forecast set");
        sets.push(ForecastSet {
            label,
            dates,
            cache_dir,
            enssize: experiment.enssize,
            cycle,
        });
    }
    Ok(sets)
}
