//! Result datasets and how they are written.

use std::fmt;
use std::path::{Path, PathBuf};

use icecap_io::{Dataset, Field, write_dataset};
use tracing::info;

use crate::error::MetricError;

/// Encoded value of cells where every member stays open water.
pub const ALL_WATER: f64 = -101.0;
/// Encoded value of cells where every member stays ice covered.
pub const ALL_ICE: f64 = 101.0;

/// Output of a metric: one dataset, or several written as numbered files.
#[derive(Debug, Clone)]
pub enum MetricResult {
    Single(Dataset),
    List(Vec<Dataset>),
}

impl MetricResult {
    /// The datasets in output order.
    pub fn datasets(&self) -> Vec<&Dataset> {
        match self {
            MetricResult::Single(ds) => vec![ds],
            MetricResult::List(list) => list.iter().collect(),
        }
    }

    fn datasets_mut(&mut self) -> Vec<&mut Dataset> {
        match self {
            MetricResult::Single(ds) => vec![ds],
            MetricResult::List(list) => list.iter_mut().collect(),
        }
    }

    /// Apply `f` to every dataset.
    pub fn for_each_dataset(&mut self, mut f: impl FnMut(&mut Dataset)) {
        for ds in self.datasets_mut() {
            f(ds);
        }
    }

    /// Output files below `metric_dir`: `{id}/{id}.nc` for a single dataset,
    /// `{id}/{id}_{i}.nc` for a list.
    pub fn paths(&self, metric_dir: &Path, id: &str) -> Vec<PathBuf> {
        let dir = metric_dir.join(id);
        match self {
            MetricResult::Single(_) => vec![dir.join(format!("{id}.nc"))],
            MetricResult::List(list) => (0..list.len()).map(|i| dir.join(format!("{id}_{i}.nc"))).collect(),
        }
    }

    /// Write every dataset and return the files written.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::Io`] if a file cannot be written.
    pub fn save(&self, metric_dir: &Path, id: &str) -> Result<Vec<PathBuf>, MetricError> {
        let paths = self.paths(metric_dir, id);
        for (path, ds) in paths.iter().zip(self.datasets()) {
            info!(path = %path.display(), variables = ds.variables().len(), "saving metric");
            write_dataset(path, ds)?;
        }
        Ok(paths)
    }
}

// ---------------------------------------------------------------------------
// Plot commands
// ---------------------------------------------------------------------------

/// Argument of a plot command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandArg {
    Text(String),
    Number(f64),
}

impl fmt::Display for CommandArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandArg::Text(s) => write!(f, "\"{s}\""),
            CommandArg::Number(v) => write!(f, "{v}"),
        }
    }
}

/// A plotting call stored as `{variable}-{index}` attribute: a list of
/// `key=value` tokens, text values quoted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotCommand {
    args: Vec<(String, CommandArg)>,
}

impl PlotCommand {
    /// Command of type `attr_type`, e.g. `ax.text` or `cb.set_label`.
    pub fn new(attr_type: &str) -> Self {
        Self {
            args: vec![("attr_type".to_string(), CommandArg::Text(attr_type.to_string()))],
        }
    }

    pub fn text(mut self, key: &str, value: impl Into<String>) -> Self {
        self.args.push((key.to_string(), CommandArg::Text(value.into())));
        self
    }

    pub fn number(mut self, key: &str, value: f64) -> Self {
        self.args.push((key.to_string(), CommandArg::Number(value)));
        self
    }

    /// The `key=value` tokens.
    pub fn tokens(&self) -> Vec<String> {
        self.args.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}

/// Attach `commands` to `variable` as attributes `{variable}-0`,
/// `{variable}-1`, ...
pub fn set_plot_commands(dataset: &mut Dataset, variable: &str, commands: &[PlotCommand]) {
    for (i, cmd) in commands.iter().enumerate() {
        dataset.set_attr(format!("{variable}-{i}"), cmd.tokens());
    }
}

// ---------------------------------------------------------------------------
// Phenology encoding
// ---------------------------------------------------------------------------

/// Combine early/late event probabilities (percent) into one signed field:
/// `late` where it exceeds `early`, else `-early`. Cells where all members
/// stay water become [`ALL_WATER`], all ice [`ALL_ICE`], and cells outside
/// `lsm` (NaN) become NaN.
///
/// # Errors
///
/// Returns [`MetricError::Io`] if the fields do not broadcast.
pub fn encode_phenology(
    late: &Field,
    early: &Field,
    all_water: &Field,
    all_ice: &Field,
    lsm: &Field,
) -> Result<Field, MetricError> {
    let combined = late.zip_with(early, |l, e| if l > e { l } else { -e })?;
    mark_phenology_extremes(&combined, all_water, all_ice, lsm)
}

/// Overwrite all-water, all-ice and outside-mask cells as in
/// [`encode_phenology`].
///
/// # Errors
///
/// Returns [`MetricError::Io`] if the fields do not broadcast.
pub fn mark_phenology_extremes(
    field: &Field,
    all_water: &Field,
    all_ice: &Field,
    lsm: &Field,
) -> Result<Field, MetricError> {
    let marked = field
        .zip_with(all_water, |v, w| if w == 1.0 { ALL_WATER } else { v })?
        .zip_with(all_ice, |v, i| if i == 1.0 { ALL_ICE } else { v })?
        .zip_with(lsm, |v, m| if m.is_nan() { f64::NAN } else { v })?;
    Ok(marked)
}
