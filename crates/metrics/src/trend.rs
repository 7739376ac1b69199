//! Linear trend over the start-date years.

use icecap_calibrate::fit_trend;
use icecap_io::{CacheStore, Dim};

use crate::error::MetricError;
use crate::output::MetricResult;
use crate::pipeline::{Evaluator, PrepareOptions};

/// Concentration fraction per year to percent per decade.
const SLOPE_SCALE: f64 = 1000.0;

/// Per-cell regression over `date` of the (calibrated) forecast and, with
/// `add_verdata`, of the observation.
pub(crate) fn linear_trend<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let data = ev.prepare(&PrepareOptions::averaging(&[Dim::Member, Dim::Inidate]))?;

    let mut fields = Vec::new();
    if ev.config().add_verdata() && data.observed {
        let fit = fit_trend(&data.obs_verif, Dim::Date)?;
        fields.push(fit.slope.map(|s| s * SLOPE_SCALE).renamed("verdata-verif-value"));
        fields.push(fit.pvalue.renamed("verdata-verif-pvalue"));
    }
    let fit = fit_trend(data.forecast(), Dim::Date)?;
    fields.push(fit.slope.map(|s| s * SLOPE_SCALE).renamed("fc-verif-value"));
    fields.push(fit.pvalue.renamed("fc-verif-pvalue"));

    Ok(MetricResult::Single(ev.dataset(fields, data.lsm.clone(), &data.lsm_full)))
}
