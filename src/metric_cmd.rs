//! Metric command: compute one configured metric and save it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tracing::{info, info_span};

use icecap_io::NetcdfCache;
use icecap_metrics::{Evaluator, MetricConfig};

use crate::cli::MetricArgs;
use crate::config::{IcecapConfig, PlotToml};
use crate::convert;

/// Run the metric pipeline for `--plot`.
pub fn run(args: MetricArgs) -> Result<()> {
    let _cmd = info_span!("metric", plot = %args.plot).entered();
    let config = IcecapConfig::load(&args.config)?;
    let plots = convert::resolve_plots(&config.plots)?;
    let plot = plots.get(&args.plot).ok_or_else(|| {
        let available: Vec<_> = plots.keys().collect();
        anyhow!("plot '{}' not found in config (available: {available:?})", args.plot)
    })?;

    let mut metric = convert::build_metric_config(&args.plot, plot, &config.paths, &config.data)?;
    if let Some(dir) = args.output_dir {
        metric = metric.with_metric_dir(dir);
    }
    info!(kind = %metric.kind(), "metric configured");

    let result = Evaluator::new(&metric, &NetcdfCache)
        .compute()
        .with_context(|| format!("failed to compute metric '{}'", args.plot))?;
    let files = result
        .save(metric.metric_dir(), metric.id())
        .with_context(|| format!("failed to save metric '{}'", args.plot))?;

    let plot_path = write_plot_config(&metric, plot)?;
    let summary_path = write_summary(&metric, &files)?;
    info!(
        summary = %summary_path.display(),
        plot_config = %plot_path.display(),
        files = files.len(),
        "metric written"
    );
    Ok(())
}

/// Write the resolved plot options to `{metric_dir}/{id}/metric.toml`.
fn write_plot_config(metric: &MetricConfig, plot: &PlotToml) -> Result<PathBuf> {
    let dir = metric.metric_dir().join(metric.id());
    let path = dir.join("metric.toml");
    let toml_str = toml::to_string(plot).context("failed to serialize plot options")?;
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create directory: {}", dir.display()))?;
    std::fs::write(&path, toml_str).with_context(|| format!("failed to write plot options: {}", path.display()))?;
    Ok(path)
}

/// Write `{metric_dir}/{id}/{id}.json` describing the saved files.
fn write_summary(metric: &MetricConfig, files: &[PathBuf]) -> Result<PathBuf> {
    let dir = metric.metric_dir().join(metric.id());
    let path = dir.join(format!("{}.json", metric.id()));
    let json = serde_json::to_string_pretty(&summary(metric, files)).context("failed to serialize summary")?;
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create directory: {}", dir.display()))?;
    std::fs::write(&path, json).with_context(|| format!("failed to write summary: {}", path.display()))?;
    Ok(path)
}

fn summary(metric: &MetricConfig, files: &[PathBuf]) -> serde_json::Value {
    let verif = metric.verif();
    json!({
        "id": metric.id(),
        "metric": metric.kind().as_str(),
        "target": metric.target().as_str(),
        "forecast": metric.forecast_name(),
        "verif_name": metric.verif_name(),
        "dates": verif.date_labels(),
        "area_statistic": metric.area_statistic().map(|s| s.to_string()),
        "calibration": metric.calibration().map(|c| c.method.as_str()),
        "files": files.iter().map(|p| file_name(p)).collect::<Vec<_>>(),
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
