//! Distance from fixed points to the ice edge along the forecast.

use icecap_edge::EdgeDistance;
use icecap_io::{CacheStore, Dim, Field};
use rayon::prelude::*;
use tracing::debug;

use crate::error::MetricError;
use crate::output::MetricResult;
use crate::pipeline::{Evaluator, PrepareOptions, first_member};

/// First start date of `field` as `[member, time, yc, xc]`.
fn first_start(field: &Field) -> Result<Field, MetricError> {
    Ok(field.isel(Dim::Inidate, 0)?.isel(Dim::Date, 0)?)
}

/// Member-mean distance for every start date of a calibration field, as
/// `[inidate, date, time]`.
fn calibration_distances(edge: &EdgeDistance, field: &Field) -> Result<Field, MetricError> {
    let n_ini = field.len_of(Dim::Inidate).unwrap_or(1);
    let n_date = field.len_of(Dim::Date).unwrap_or(1);
    let starts: Vec<(usize, usize)> = (0..n_ini).flat_map(|i| (0..n_date).map(move |d| (i, d))).collect();
    let distances = starts
        .par_iter()
        .map(|&(i, d)| -> Result<Field, MetricError> {
            let start = field.isel(Dim::Inidate, i)?.isel(Dim::Date, d)?;
            Ok(edge.compute(&start)?.mean_over(Dim::Member))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let per_inidate = distances
        .chunks(n_date)
        .map(|dates| Field::stack(dates, Dim::Date))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Field::stack(&per_inidate, Dim::Inidate)?)
}

/// Distance per member and lead time, bias-corrected with the calibration
/// period when one is configured.
pub(crate) fn ice_distance<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let config = ev.config();
    let data = ev.prepare(&PrepareOptions::averaging(&[]).checked())?;
    let edge = EdgeDistance::new(config.points().to_vec())
        .with_min_cluster_size(config.min_cluster_size())
        .with_threshold(config.threshold());

    let fc_name = config.forecast_name();
    let verif_name = config.verif_name();
    let hc_name = format!("{verif_name}-hc");
    let mut fc = edge.compute(&first_start(&data.fc_verif)?)?;

    let mut fields = Vec::new();
    if config.add_verdata() && data.observed {
        let obs = edge.compute(&first_start(&data.obs_verif)?)?;
        fields.push(first_member(&obs)?.renamed(verif_name));
    }

    let mut has_hindcast = false;
    if let (Some(fc_calib), Some(obs_calib)) = (&data.fc_calib, &data.obs_calib) {
        let fc_hc = calibration_distances(&edge, fc_calib)?;
        let obs_hc = calibration_distances(&edge, obs_calib)?;
        let bias = fc_hc.sub(&obs_hc)?.mean_over(Dim::Date).mean_over(Dim::Inidate);
        debug!(steps = bias.data().len(), "distance bias from calibration period");
        fc = fc.sub(&bias)?;
        fields.push(obs_hc.mean_over(Dim::Date).mean_over(Dim::Inidate).renamed(hc_name.as_str()));
        has_hindcast = true;
    }
    fields.insert(0, fc.renamed(fc_name.as_str()));

    let mut ds = ev.dataset(fields, None, &data.lsm_full);
    if config.add_verdata() && data.observed {
        ds.set_attr(format!("{verif_name}-linecolor"), "k");
    }
    if has_hindcast {
        ds.set_attr(format!("{hc_name}-linecolor"), "red");
    }
    ds.set_attr(format!("{fc_name}-linecolor"), "blue");
    Ok(MetricResult::Single(ds))
}
