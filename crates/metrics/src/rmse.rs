//! Root-mean-square error of the ensemble mean and the spread-error ratio.

use icecap_io::{CacheStore, Dataset, Dim, Field};

use crate::error::MetricError;
use crate::output::{MetricResult, PlotCommand, set_plot_commands};
use crate::pipeline::{Evaluator, PrepareOptions, first_member};
use crate::skill::{compute_skill_score, guard_zero, restore_zero};

const SCORE_DIMS: [Dim; 2] = [Dim::Inidate, Dim::Date];

/// `sqrt(mean over inidate and date of (a - b)²)`.
pub(crate) fn root_mean_square(a: &Field, b: &Field) -> Result<Field, MetricError> {
    let squared = a.zip_with(b, |x, y| (x - y).powi(2))?;
    Ok(squared.mean_over_all(&SCORE_DIMS).map(f64::sqrt))
}

/// RMSE of the member-mean forecast and of persistence, with skill score.
pub(crate) fn rmse<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let kind = ev.config().kind();
    let data = ev.prepare(&PrepareOptions::averaging(&[Dim::Member]).with_persistence())?;

    let fc_rmse = root_mean_square(data.forecast(), &data.obs_verif)?;
    let pers_rmse = root_mean_square(data.persistence(kind)?, &data.obs_verif)?;
    let skill = compute_skill_score(&fc_rmse, &pers_rmse)?;

    let (fields, lsm) = ev.finish_scores(
        vec![
            skill.forecast.renamed("fc_rmse"),
            skill.reference.renamed("noplot_pers_rmse"),
            skill.skill.renamed("fc_rmsess"),
        ],
        &data.mask,
    )?;
    let mut ds = ev.dataset(fields, lsm.or(data.lsm.clone()), &data.lsm_full);
    ds.set_attr("obs-linecolor", "k");
    ds.set_attr(format!("{}-linecolor", ev.config().verif().experiment.expname()), "blue");
    Ok(MetricResult::Single(ds))
}

/// Spread-error ratio: ensemble spread over the RMSE of the ensemble mean.
/// The ratio is not clipped. Two datasets: RMSE and spread, and the ratio.
pub(crate) fn ser<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let data = ev.prepare(&PrepareOptions::averaging(&[]).checked())?;
    let obs = first_member(&data.obs_verif)?;
    let fc = data.forecast();

    let rmse = guard_zero(&root_mean_square(&fc.mean_over(Dim::Member), &obs)?);
    let spread = guard_zero(&fc.var_over(Dim::Member).mean_over_all(&SCORE_DIMS).map(f64::sqrt));
    let ratio = spread.zip_with(&rmse, |s, r| s / r)?;

    let (fields, lsm) = ev.finish_scores(
        vec![
            restore_zero(&rmse).renamed("fc_rmse"),
            restore_zero(&spread).renamed("fc_spread"),
            ratio.renamed("fc_ser"),
        ],
        &data.mask,
    )?;
    let lsm = lsm.or(data.lsm.clone());
    let mut fields = fields.into_iter();
    let (Some(rmse), Some(spread), Some(ratio)) = (fields.next(), fields.next(), fields.next()) else {
        return Err(MetricError::validation(vec!["spread-error scores incomplete".to_string()]));
    };

    let mut rest = ev.dataset(vec![rmse, spread], lsm.clone(), &data.lsm_full);
    let mut ratio = ev.dataset(vec![ratio], lsm, &data.lsm_full);
    for ds in [&mut rest, &mut ratio] {
        set_ser_attrs(ds);
    }
    Ok(MetricResult::List(vec![rest, ratio]))
}

fn set_ser_attrs(ds: &mut Dataset) {
    let levels = crate::kind::Levels::Range(0.05, 1.05, 0.1).to_string();
    for var in ["fc_rmse", "fc_spread"] {
        ds.set_attr(format!("{var}-cmap"), "hot_r");
        ds.set_attr(format!("{var}-levels"), levels.as_str());
        ds.set_attr(format!("{var}-norm"), "None");
    }
    for var in ["fc_ser", "fc_rmse", "fc_spread"] {
        ds.set_attr(format!("{var}-linecolor"), "k");
        let label = var.trim_start_matches("fc_").to_uppercase();
        set_plot_commands(ds, var, &[PlotCommand::new("cb.set_label").text("label", label)]);
    }
    ds.set_attr("fc_ser-linestyle", "solid");
    ds.set_attr("fc_rmse-linestyle", "dashed");
    ds.set_attr("fc_spread-linestyle", "dotted");
}
