//! Probabilistic scores of the ensemble: Brier, CRPS and the spatial
//! probability score.

use icecap_io::{CacheStore, Dim, Field};
use icecap_stats::crps_ensemble;

use crate::error::MetricError;
use crate::output::MetricResult;
use crate::pipeline::{Evaluator, PrepareOptions, first_member};
use crate::skill::compute_skill_score;

const SCORE_DIMS: [Dim; 2] = [Dim::Inidate, Dim::Date];

/// Mean over inidate and date of `(a - b)²`.
fn mean_squared(a: &Field, b: &Field) -> Result<Field, MetricError> {
    Ok(a.zip_with(b, |x, y| (x - y).powi(2))?.mean_over_all(&SCORE_DIMS))
}

/// Brier score of the ice probability (member fraction above the
/// threshold) and of persistence, with skill score.
pub(crate) fn brier<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let kind = ev.config().kind();
    let data = ev.prepare(&PrepareOptions::averaging(&[]).with_persistence().thresholded())?;

    let probability = data.forecast().mean_over(Dim::Member);
    let obs = first_member(&data.obs_verif)?;
    let fc_bs = mean_squared(&probability, &obs)?;
    let pers_bs = mean_squared(data.persistence(kind)?, &obs)?;
    let skill = compute_skill_score(&fc_bs, &pers_bs)?;

    let (fields, lsm) = ev.finish_scores(
        vec![
            skill.forecast.renamed("noplot_fc_bs"),
            skill.reference.renamed("noplot_pers_bs"),
            skill.skill.renamed("fc_bss"),
        ],
        &data.mask,
    )?;
    let mut ds = ev.dataset(fields, lsm.or(data.lsm.clone()), &data.lsm_full);
    ds.set_attr("fc_bss-map_plot", "pcolormesh");
    Ok(MetricResult::Single(ds))
}

/// Continuous ranked probability score of the ensemble and of persistence
/// (a one-member ensemble), with skill score.
pub(crate) fn crps<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let kind = ev.config().kind();
    let data = ev.prepare(&PrepareOptions::averaging(&[]).with_persistence().checked())?;

    let obs = first_member(&data.obs_verif)?;
    let fc_crps = data
        .fc_verif
        .reduce_paired(Dim::Member, &obs, crps_ensemble)?
        .mean_over_all(&SCORE_DIMS);
    let pers_crps = data
        .persistence(kind)?
        .zip_with(&obs, |p, o| (p - o).abs())?
        .mean_over_all(&SCORE_DIMS);
    let skill = compute_skill_score(&fc_crps, &pers_crps)?;

    let (fields, lsm) = ev.finish_scores(
        vec![
            skill.forecast.renamed("noplot_fc_crps"),
            skill.reference.renamed("noplot_pers_crps"),
            skill.skill.renamed("fc_crpss"),
        ],
        &data.mask,
    )?;
    Ok(MetricResult::Single(ev.dataset(fields, lsm.or(data.lsm.clone()), &data.lsm_full)))
}

/// Spatial probability score: squared difference of ice probability and
/// observed ice, averaged over start dates and summed over the area.
pub(crate) fn sps<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let data = ev.prepare(&PrepareOptions::averaging(&[]).thresholded().checked())?;

    let probability = data.fc_verif.mean_over(Dim::Member);
    let obs = first_member(&data.obs_verif)?;
    let score = mean_squared(&probability, &obs)?.renamed("fc_sps");

    let (fields, lsm) = ev.finish_scores_summed(vec![score], &data.mask)?;
    Ok(MetricResult::Single(ev.dataset(fields, Some(lsm), &data.lsm_full)))
}
