//! Mean-error maps: bias, fully averaged forecast error and the
//! bias-corrected forecast.

use icecap_io::{CacheStore, Dim, Field};

use crate::error::MetricError;
use crate::output::MetricResult;
use crate::pipeline::{Evaluator, PrepareOptions};

const ALL_ENSEMBLE_DIMS: [Dim; 3] = [Dim::Member, Dim::Date, Dim::Inidate];

/// Forecast minus observation averaged over members and dates, then over
/// initialisation sets. Output variable `sic`.
pub(crate) fn bias<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let data = ev.prepare(&PrepareOptions::averaging(&[Dim::Member, Dim::Date]))?;
    let bias = data
        .forecast()
        .sub(&data.obs_verif)?
        .mean_over(Dim::Inidate)
        .renamed("sic");
    let ds = ev.dataset(vec![bias], data.lsm.clone(), &data.lsm_full);
    Ok(MetricResult::Single(ds))
}

/// Fully averaged forecast minus observation, optionally mean-calibrated.
/// Output variable `{expname}-bias`; any area statistic applies to it.
pub(crate) fn forecast_error<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let data = ev.prepare(&PrepareOptions::averaging(&ALL_ENSEMBLE_DIMS).checked())?;
    let name = format!("{}-bias", ev.config().verif().experiment.expname());
    let error = data.forecast().sub(&data.obs_verif)?.renamed(name);
    let (fields, lsm) = ev.finish_scores(vec![error], &data.mask)?;
    let ds = ev.dataset(fields, lsm.or(data.lsm.clone()), &data.lsm_full);
    Ok(MetricResult::Single(ds))
}

/// Verification forecast minus the calibration-period bias, averaged over
/// members and dates and then over initialisation sets. Output `sic`.
pub(crate) fn bias_corrected_map<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let data = ev.prepare(&PrepareOptions::averaging(&[Dim::Member, Dim::Date]))?;
    let corrected: &Field = data.fc_verif_bc.as_ref().ok_or_else(|| MetricError::Unsupported {
        metric: ev.config().kind().to_string(),
        reason: "running without calibration data".to_string(),
    })?;
    let sic = corrected.mean_over(Dim::Inidate).renamed("sic");
    let ds = ev.dataset(vec![sic], data.lsm.clone(), &data.lsm_full);
    Ok(MetricResult::Single(ds))
}
