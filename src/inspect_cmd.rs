//! Check and list commands: inspect the configured plots without loading data.

use anyhow::{Result, bail};
use tracing::{info, info_span, warn};

use icecap_io::NetcdfCache;
use icecap_metrics::Evaluator;

use crate::cli::ConfigArgs;
use crate::config::IcecapConfig;
use crate::convert;

/// Validate every plot and print its resolved forecast sets.
pub fn check(args: ConfigArgs) -> Result<()> {
    let _cmd = info_span!("check").entered();
    let config = IcecapConfig::load(&args.config)?;
    let plots = convert::resolve_plots(&config.plots)?;

    let mut failed = Vec::new();
    for (id, plot) in &plots {
        let checked = convert::build_metric_config(id, plot, &config.paths, &config.data).and_then(|metric| {
            metric.validate()?;
            let evaluator = Evaluator::new(&metric, &NetcdfCache);
            let mut lines = vec![format!("{id}: {} {}", metric.kind(), metric.target().as_str())];
            for set in evaluator.verif_sets()? {
                lines.push(format!(
                    "  verif {}: {} dates, cycle {}, {}",
                    set.label,
                    set.dates.len(),
                    set.cycle,
                    set.cache_dir.display()
                ));
            }
            for set in evaluator.calib_sets()?.unwrap_or_default() {
                lines.push(format!(
                    "  calib {}: {} dates, cycle {}, {}",
                    set.label,
                    set.dates.len(),
                    set.cycle,
                    set.cache_dir.display()
                ));
            }
            Ok(lines)
        });
        match checked {
            Ok(lines) => println!("{}", lines.join("\n")),
            Err(e) => {
                warn!(plot = %id, "invalid plot");
                println!("{id}: INVALID: {e:#}");
                failed.push(id.as_str());
            }
        }
    }
    info!(plots = plots.len(), failed = failed.len(), "configuration checked");

    if !failed.is_empty() {
        bail!("{} of {} plots are invalid: {}", failed.len(), plots.len(), failed.join(", "));
    }
    Ok(())
}

/// Print plot ids with their metric kind.
pub fn list(args: ConfigArgs) -> Result<()> {
    let config = IcecapConfig::load(&args.config)?;
    let plots = convert::resolve_plots(&config.plots)?;
    for (id, plot) in &plots {
        println!("{id}\t{}", plot.plottype.as_deref().unwrap_or("-"));
    }
    Ok(())
}
