//! Integrated ice-edge error and its decomposition.
//!
//! With `over` the area where only the forecast has ice and `under` the
//! area where only the observation has ice, `iiee = over + under`,
//! `aee = |over - under|` (absolute extent error) and
//! `me = 2 min(over, under)` (misplacement error).

use icecap_io::{CacheStore, Dim, Field};

use crate::error::MetricError;
use crate::output::MetricResult;
use crate::pipeline::{Evaluator, PrepareOptions, first_member};

const SCORE_DIMS: [Dim; 2] = [Dim::Inidate, Dim::Date];

/// Over- and under-forecast ice areas of `forecast` against `obs`,
/// averaged over start dates.
fn edge_areas(forecast: &Field, obs: &Field) -> Result<(Field, Field), MetricError> {
    let over = forecast
        .zip_with(obs, |f, o| indicator(f == 1.0 && o == 0.0, f, o))?
        .mean_over_all(&SCORE_DIMS);
    let under = forecast
        .zip_with(obs, |f, o| indicator(f == 0.0 && o == 1.0, f, o))?
        .mean_over_all(&SCORE_DIMS);
    Ok((over, under))
}

fn indicator(hit: bool, f: f64, o: f64) -> f64 {
    if f.is_nan() || o.is_nan() {
        f64::NAN
    } else if hit {
        1.0
    } else {
        0.0
    }
}

/// `[iiee, aee, me]` from area-summed over/under fields.
fn decompose(over: &Field, under: &Field) -> Result<[Field; 3], MetricError> {
    Ok([
        over.add(under)?,
        over.zip_with(under, |o, u| (o - u).abs())?,
        over.zip_with(under, |o, u| 2.0 * o.min(u))?,
    ])
}

pub(crate) fn iiee<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let kind = ev.config().kind();
    let opts = PrepareOptions::averaging(&[Dim::Member]).with_persistence().thresholded().checked();
    let data = ev.prepare(&opts)?;
    let obs = first_member(&data.obs_verif)?;

    let (fc_over, fc_under) = edge_areas(&data.fc_verif, &obs)?;
    let (pers_over, pers_under) = edge_areas(data.persistence(kind)?, &obs)?;
    let (summed, lsm) =
        ev.finish_scores_summed(vec![fc_over, fc_under, pers_over, pers_under], &data.mask)?;
    let [fc_over, fc_under, pers_over, pers_under]: [Field; 4] = summed
        .try_into()
        .map_err(|_| MetricError::validation(vec!["edge areas incomplete".to_string()]))?;

    let [fc_iiee, fc_aee, fc_me] = decompose(&fc_over, &fc_under)?;
    let [pers_iiee, pers_aee, pers_me] = decompose(&pers_over, &pers_under)?;
    let fields = vec![
        fc_iiee.renamed("fc_iiee"),
        fc_aee.renamed("fc_aee"),
        fc_me.renamed("fc_me"),
        fc_over.renamed("noplot_fc_over"),
        fc_under.renamed("noplot_fc_under"),
        pers_iiee.renamed("noplot_pers_iiee"),
        pers_aee.renamed("noplot_pers_aee"),
        pers_me.renamed("noplot_pers_me"),
    ];
    Ok(MetricResult::Single(ev.dataset(fields, Some(lsm), &data.lsm_full)))
}
