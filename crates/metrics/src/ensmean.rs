//! Ensemble-mean maps and member plumes.

use icecap_io::{CacheStore, Dim};

use crate::error::MetricError;
use crate::output::MetricResult;
use crate::pipeline::{Evaluator, PrepareOptions, first_member};

/// Name of the observation variable in ensemble-mean and plume output.
const OBS_NAME: &str = "obs";

/// Fully averaged forecast (named after the experiment) and observation.
/// The observation is kept only with `add_verdata`.
pub(crate) fn ensmean<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let config = ev.config();
    let data = ev.prepare(&PrepareOptions::averaging(&[Dim::Member, Dim::Date, Dim::Inidate]).checked())?;
    let expname = config.verif().experiment.expname();

    let mut fields = vec![data.forecast().clone().renamed(expname)];
    if config.add_verdata() && data.observed {
        fields.push(data.obs_verif.clone().renamed(OBS_NAME));
    }
    let (fields, lsm) = ev.finish_scores(fields, &data.mask)?;
    Ok(MetricResult::Single(ev.dataset(fields, lsm.or(data.lsm.clone()), &data.lsm_full)))
}

/// Area-reduced time series of every member of the first start date,
/// optionally mean-calibrated, with the observation as reference.
pub(crate) fn plume<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let config = ev.config();
    let data = ev.prepare(&PrepareOptions::averaging(&[]).checked())?;
    let expname = config.verif().experiment.expname();

    let fc = data
        .forecast()
        .isel(Dim::Inidate, 0)?
        .isel(Dim::Date, 0)?
        .renamed(expname);
    let obs = first_member(&data.obs_verif.isel(Dim::Inidate, 0)?.isel(Dim::Date, 0)?)?.renamed(OBS_NAME);

    let mut fields = vec![fc];
    let keep_obs = config.add_verdata() && data.observed;
    if keep_obs {
        fields.push(obs);
    }
    let (fields, lsm) = ev.finish_scores(fields, &data.mask)?;
    let mut ds = ev.dataset(fields, lsm.or(data.lsm.clone()), &data.lsm_full);
    if keep_obs {
        ds.set_attr(format!("{OBS_NAME}-linecolor"), "k");
    }
    ds.set_attr(format!("{expname}-linecolor"), "blue");
    Ok(MetricResult::Single(ds))
}
