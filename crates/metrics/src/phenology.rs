//! Freeze-up and break-up probability maps.
//!
//! The calibration period sets per-cell terciles of the event date. The
//! verification forecast is then expressed as the percentage of members
//! whose date falls before the lower or after the upper tercile, and the
//! two are folded into one signed field by [`encode_phenology`].

use icecap_calibrate::ArchiveKey;
use icecap_edge::{PhenologyDate, PhenologyField, PhenologyKind, phenology_dates};
use icecap_io::{CacheStore, Dataset, Dim, Field};
use icecap_stats::nanquantile;
use tracing::{debug, info};

use crate::error::MetricError;
use crate::kind::MetricKind;
use crate::output::{MetricResult, PlotCommand, encode_phenology, mark_phenology_extremes, set_plot_commands};
use crate::pipeline::{Evaluator, PrepareOptions, Prepared};

const FC_UPPER: &str = "da_fc_calib_metric_upper";
const FC_LOWER: &str = "da_fc_calib_metric_lower";
const OBS_UPPER: &str = "da_verdata_calib_metric_upper";
const OBS_LOWER: &str = "da_verdata_calib_metric_lower";
const EARLY_BSS: &str = "da_fc_calib_early_bss";
const LATE_BSS: &str = "da_fc_calib_late_bss";

/// Climatological probability of either outer tercile.
const TERCILE_PROBABILITY: f64 = 1.0 / 3.0;

/// Tercile bounds and the Brier skill of the early and late categories.
#[derive(Debug, Clone)]
struct Climatology {
    fc_upper: Field,
    fc_lower: Field,
    obs_upper: Field,
    obs_lower: Field,
    early_bss: Field,
    late_bss: Field,
}

impl Climatology {
    fn to_dataset(&self) -> Dataset {
        Dataset::new()
            .with(self.fc_upper.clone().renamed(FC_UPPER))
            .with(self.fc_lower.clone().renamed(FC_LOWER))
            .with(self.obs_upper.clone().renamed(OBS_UPPER))
            .with(self.obs_lower.clone().renamed(OBS_LOWER))
            .with(self.early_bss.clone().renamed(EARLY_BSS))
            .with(self.late_bss.clone().renamed(LATE_BSS))
    }

    fn from_dataset(ds: &Dataset) -> Result<Self, MetricError> {
        let get = |name: &str| {
            ds.get(name).cloned().ok_or_else(|| MetricError::MissingVariable {
                name: name.to_string(),
            })
        };
        Ok(Self {
            fc_upper: get(FC_UPPER)?,
            fc_lower: get(FC_LOWER)?,
            obs_upper: get(OBS_UPPER)?,
            obs_lower: get(OBS_LOWER)?,
            early_bss: get(EARLY_BSS)?,
            late_bss: get(LATE_BSS)?,
        })
    }
}

fn phenology_kind(kind: MetricKind) -> Result<PhenologyKind, MetricError> {
    match kind {
        MetricKind::FreezeUp => Ok(PhenologyKind::FreezeUp),
        MetricKind::BreakUp => Ok(PhenologyKind::BreakUp),
        other => Err(MetricError::Unsupported {
            metric: other.to_string(),
            reason: "phenology dates".to_string(),
        }),
    }
}

/// Fraction of members whose `ordinals` fall in the category set by
/// `bound`. NaN ordinals count as outside the category.
fn category_probability(
    ordinals: &Field,
    bound: &Field,
    in_category: impl Fn(f64, f64) -> bool,
) -> Result<Field, MetricError> {
    let hits = ordinals.zip_with(bound, |o, b| if in_category(o, b) { 1.0 } else { 0.0 })?;
    Ok(hits.mean_over(Dim::Member))
}

fn earlier(o: f64, lower: f64) -> bool {
    o < lower
}

fn later(o: f64, upper: f64) -> bool {
    o > upper
}

/// Brier skill of `prob` against the observed category `obs` over the
/// calibration years, relative to the climatological one third.
fn tercile_bss(prob: &Field, obs: &Field) -> Result<Field, MetricError> {
    let score = prob.zip_with(obs, |p, o| (p - o).powi(2))?.mean_over_all(&CALIBRATION_YEARS);
    let reference = obs.map(|o| (TERCILE_PROBABILITY - o).powi(2)).mean_over_all(&CALIBRATION_YEARS);
    Ok(score.zip_with(&reference, |s, r| 1.0 - s / r)?)
}

/// Axes pooled into the calibration climatology of the observations, which
/// keep their start-date sets.
const CALIBRATION_YEARS: [Dim; 2] = [Dim::Inidate, Dim::Date];

/// Terciles over `dims` of `ordinals` as `(upper, lower)`.
fn terciles(ordinals: &Field, dims: &[Dim], kind: PhenologyKind) -> Result<(Field, Field), MetricError> {
    let method = kind.tercile_method();
    let upper = ordinals.reduce_many(dims, |v| nanquantile(v, 2.0 * TERCILE_PROBABILITY, method))?;
    let lower = ordinals.reduce_many(dims, |v| nanquantile(v, TERCILE_PROBABILITY, method))?;
    Ok((upper, lower))
}

/// Terciles and skill from the calibration pair of `data`.
fn climatology(data: &Prepared, kind: PhenologyKind, metric: MetricKind) -> Result<Climatology, MetricError> {
    let missing = || MetricError::MissingObservations {
        metric: metric.to_string(),
    };
    let fc_calib = data.fc_calib.as_ref().ok_or_else(missing)?;
    let obs_calib = data.obs_calib.as_ref().ok_or_else(missing)?;

    let fc = phenology_dates(fc_calib, kind)?.ordinals;
    let obs = phenology_dates(obs_calib, kind)?.ordinals;
    let (fc_upper, fc_lower) = terciles(&fc, &[Dim::Date, Dim::Member], kind)?;
    let (obs_upper, obs_lower) = terciles(&obs, &CALIBRATION_YEARS, kind)?;

    let fc_early = category_probability(&fc, &fc_lower, earlier)?;
    let fc_late = category_probability(&fc, &fc_upper, later)?;
    let obs_early = category_probability(&obs, &obs_lower, earlier)?;
    let obs_late = category_probability(&obs, &obs_upper, later)?;
    debug!(years = fc.len_of(Dim::Date).unwrap_or(1), "phenology terciles from calibration years");

    Ok(Climatology {
        early_bss: tercile_bss(&fc_early, &obs_early)?,
        late_bss: tercile_bss(&fc_late, &obs_late)?,
        fc_upper,
        fc_lower,
        obs_upper,
        obs_lower,
    })
}

/// Cells where every member is all water, and where every member is all
/// ice. Break-up counts undetermined dates as ice that never melted.
fn extremes(dates: &PhenologyField, kind: PhenologyKind) -> Result<(Field, Field), MetricError> {
    let all = |f: Field| f.mean_over(Dim::Member).map(|v| if v == 1.0 { 1.0 } else { 0.0 });
    let ice = dates.indicator(PhenologyDate::AlwaysIce);
    let ice = match kind {
        PhenologyKind::FreezeUp => ice,
        PhenologyKind::BreakUp => ice.zip_with(&dates.indicator(PhenologyDate::Undefined), f64::max)?,
    };
    Ok((all(dates.indicator(PhenologyDate::AlwaysWater)), all(ice)))
}

fn precomputed(key: &ArchiveKey, ds: &Dataset) -> Result<Climatology, MetricError> {
    info!(file = %key.file_name(), "using precomputed phenology calibration");
    Climatology::from_dataset(ds)
}

/// Probability that the event comes later or earlier than the calibration
/// terciles, from a single start date.
pub(crate) fn phenology<S: CacheStore + ?Sized>(ev: &Evaluator<'_, S>) -> Result<MetricResult, MetricError> {
    let config = ev.config();
    let metric = config.kind();
    let kind = phenology_kind(metric)?;
    let data = ev.prepare(&PrepareOptions::averaging(&[Dim::Inidate]).thresholded())?;

    let key = config.archive_key().ok_or_else(|| MetricError::Unsupported {
        metric: metric.to_string(),
        reason: "verification without a calibration period".to_string(),
    })?;
    let archive = ev.archive();
    let clim = match config.calibration() {
        Some(calib) if calib.exists => precomputed(&key, &archive.load(&key)?)?,
        _ => {
            let clim = climatology(&data, kind, metric)?;
            let path = archive.save(&key, &clim.to_dataset())?;
            info!(path = %path.display(), "saved phenology calibration");
            clim
        }
    };

    // -- verification ---------------------------------------------------------
    let lsm = &data.lsm_full;
    let fc_dates = phenology_dates(&data.fc_verif.mean_over(Dim::Date), kind)?;
    let fc = &fc_dates.ordinals;
    let early = category_probability(fc, &clim.fc_lower, earlier)?.map(|p| p * 100.0);
    let late = category_probability(fc, &clim.fc_upper, later)?.map(|p| p * 100.0);
    let (all_water, all_ice) = extremes(&fc_dates, kind)?;

    let fc_name = config.forecast_name();
    let mut fields = vec![
        encode_phenology(&late, &early, &all_water, &all_ice, lsm)?.renamed(fc_name.as_str()),
        clim.fc_upper.clone().renamed("upper_q_calib_noplot"),
        clim.fc_lower.clone().renamed("lower_q_calib_noplot"),
        mark_phenology_extremes(&clim.early_bss, &all_water, &all_ice, lsm)?.renamed("bss_fc_early_noplot"),
        mark_phenology_extremes(&clim.late_bss, &all_water, &all_ice, lsm)?.renamed("bss_fc_late_noplot"),
        fc.clone().renamed("da_verif_dates_noplot"),
    ];

    if config.add_verdata() && data.observed {
        let obs_dates = phenology_dates(&data.obs_verif.mean_over(Dim::Date).mean_over(Dim::Member), kind)?;
        let obs = &obs_dates.ordinals;
        let early = category_probability(obs, &clim.obs_lower, earlier)?.map(|p| p * 100.0);
        let late = category_probability(obs, &clim.obs_upper, later)?.map(|p| p * 100.0);
        fields.push(encode_phenology(&late, &early, &all_water, &all_ice, lsm)?.renamed(config.verif_name()));
        fields.push(obs.clone().renamed("da_verdata_verif_dates_noplot"));
    }

    let mut ds = ev.dataset(fields, None, &data.lsm_full);
    set_phenology_attrs(&mut ds, &fc_name, kind);
    Ok(MetricResult::Single(ds))
}

fn set_phenology_attrs(ds: &mut Dataset, fc_name: &str, kind: PhenologyKind) {
    let (late_text, early_text) = match kind {
        PhenologyKind::FreezeUp => ("Prob (later than upper tercile)", "Prob (earlier than lower tercile)"),
        PhenologyKind::BreakUp => ("Prob (within upper tercile)", "Prob (within lower tercile)"),
    };
    let side_label = |y: f64, text: &str| {
        PlotCommand::new("ax.text")
            .number("x", 1.3)
            .number("y", y)
            .text("s", text)
            .text("transform", "True")
            .number("fontsize", 12.0)
            .text("verticalalignment", "center")
            .number("rotation", 90.0)
    };
    set_plot_commands(
        ds,
        fc_name,
        &[
            side_label(0.75, late_text),
            side_label(0.25, early_text),
            PlotCommand::new("cb.set_label").text("label", "percentage of members"),
        ],
    );
    ds.set_attr(format!("{fc_name}-map_plot"), "pcolormesh");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn field(dims: Vec<Dim>, shape: &[usize], values: Vec<f64>) -> Field {
        Field::new("f", dims, ArrayD::from_shape_vec(IxDyn(shape), values).unwrap()).unwrap()
    }

    #[test]
    fn category_probability_counts_members() {
        let ordinals = field(vec![Dim::Member, Dim::X], &[4, 1], vec![1.0, 5.0, 9.0, f64::NAN]);
        let bound = field(vec![Dim::X], &[1], vec![6.0]);
        let early = category_probability(&ordinals, &bound, earlier).unwrap();
        assert_eq!(early.data()[[0]], 0.5);
        let late = category_probability(&ordinals, &bound, later).unwrap();
        assert_eq!(late.data()[[0]], 0.25);
    }

    #[test]
    fn perfect_category_forecast_has_full_skill() {
        let obs = field(vec![Dim::Date, Dim::X], &[3, 1], vec![1.0, 0.0, 0.0]);
        let bss = tercile_bss(&obs, &obs).unwrap();
        assert_eq!(bss.data()[[0]], 1.0);
    }

    #[test]
    fn terciles_pool_years_and_members() {
        let ordinals = field(vec![Dim::Date, Dim::Member, Dim::X], &[3, 2, 1], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let (upper, lower) = terciles(&ordinals, &[Dim::Date, Dim::Member], PhenologyKind::BreakUp).unwrap();
        assert_eq!(upper.dims(), [Dim::X]);
        assert!(upper.data()[[0]] > lower.data()[[0]]);
    }

    #[test]
    fn observed_climatology_pools_start_date_sets() {
        let obs = field(vec![Dim::Inidate, Dim::Date, Dim::X], &[2, 3, 1], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let (upper, lower) = terciles(&obs, &CALIBRATION_YEARS, PhenologyKind::BreakUp).unwrap();
        assert_eq!(upper.dims(), [Dim::X]);
        assert_eq!(lower.dims(), [Dim::X]);

        let early = obs.map(|o| if o < 3.0 { 1.0 } else { 0.0 });
        let bss = tercile_bss(&early, &early).unwrap();
        assert_eq!(bss.dims(), [Dim::X]);
        assert_eq!(bss.data()[[0]], 1.0);
    }

    #[test]
    fn break_up_treats_undefined_as_ice() {
        let series = field(
            vec![Dim::Member, Dim::Time, Dim::X],
            &[2, 2, 2],
            vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0],
        );
        let dates = phenology_dates(&series, PhenologyKind::BreakUp).unwrap();
        let (water, ice) = extremes(&dates, PhenologyKind::BreakUp).unwrap();
        assert_eq!(water.data()[[0]], 1.0);
        assert_eq!(ice.data()[[1]], 1.0);
    }
}
