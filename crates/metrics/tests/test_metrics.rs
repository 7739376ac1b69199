//! Integration tests: metrics computed end to end from an in-memory cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use icecap_area::{AreaError, AreaStatistic};
use icecap_calendar::{DateSelection, LeadTimeSpec};
use icecap_calibrate::CalibrationMethod;
use icecap_io::{AttrValue, CacheEntry, Dataset, Dim, Field, Grid, MemoryCache, forecast_file_name, observation_file_name};
use icecap_load::Experiment;
use icecap_metrics::{
    CalibrationSettings, Evaluator, FULL_MASK_NAME, ForecastSelection, MetricConfig, MetricError, MetricKind,
    MetricResult, PrepareOptions, compute_skill_score,
};
use ndarray::{ArrayD, IxDyn};

const CACHE_ROOT: &str = "/cache";
const FC_DIR: &str = "/cache/test/fcsys/exp1/latest/fc";
const OBS_DIR: &str = "/cache/osi-cdr";
const ENSSIZE: usize = 3;
const LEADS: usize = 4;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn starts() -> Vec<NaiveDate> {
    vec![date(2020, 1, 1), date(2021, 1, 1)]
}

/// 2x2 grid with 25 km spacing.
fn grid() -> Arc<Grid> {
    Arc::new(Grid::new(vec![0.0, 25_000.0], vec![0.0, 25_000.0]))
}

/// `nt` daily steps from `start`; cell values `f(step, x)`.
fn entry(start: NaiveDate, nt: usize, f: impl Fn(usize, usize) -> f64) -> CacheEntry {
    let data = ArrayD::from_shape_fn(IxDyn(&[nt, 2, 2]), |ix| f(ix[0], ix[2]));
    CacheEntry {
        dates: (0..nt as u64).map(|i| start + Days::new(i)).collect(),
        field: Field::new("sic", vec![Dim::Time, Dim::Y, Dim::X], data)
            .unwrap()
            .with_grid(grid())
            .unwrap(),
    }
}

/// Forecasts for every start and member with values `f(member, step, x)`,
/// and observations from the day before each start with values `g(x)`.
fn cache(f: impl Fn(usize, usize, usize) -> f64, g: impl Fn(usize) -> f64) -> MemoryCache {
    store(f, g, true)
}

fn store(f: impl Fn(usize, usize, usize) -> f64, g: impl Fn(usize) -> f64, persistence: bool) -> MemoryCache {
    let first = if persistence { 0 } else { 1 };
    let mut cache = MemoryCache::new();
    for start in starts() {
        for member in 0..ENSSIZE {
            let path = Path::new(FC_DIR).join(forecast_file_name(start, member, "ci", "osi-cdr"));
            cache.insert(path, entry(start, LEADS, |t, x| f(member, t, x)));
        }
        for offset in first..=LEADS as u64 {
            let day = start - Days::new(1) + Days::new(offset);
            let path = Path::new(OBS_DIR).join(observation_file_name(day, "ci"));
            cache.insert(path, entry(day, 1, |_, x| g(x)));
        }
    }
    cache
}

/// Replace the forecasts of the last start date with ones missing the
/// second column.
fn with_forecast_gap(mut cache: MemoryCache) -> MemoryCache {
    let start = starts()[1];
    for member in 0..ENSSIZE {
        let path = Path::new(FC_DIR).join(forecast_file_name(start, member, "ci", "osi-cdr"));
        cache.insert(path, entry(start, LEADS, |_, x| if x == 1 { f64::NAN } else { 0.5 }));
    }
    cache
}

fn config(id: &str, kind: MetricKind) -> MetricConfig {
    let experiment = Experiment::new("test", "fcsys", "exp1").with_enssize(ENSSIZE);
    let verif = ForecastSelection::new(experiment, DateSelection::Explicit(starts()));
    MetricConfig::new(id, kind, verif, LeadTimeSpec::parse("i:1,2,3,4").unwrap())
        .with_cache_root(CACHE_ROOT)
        .with_obs_dir(OBS_DIR)
}

fn single(result: MetricResult) -> Dataset {
    match result {
        MetricResult::Single(ds) => ds,
        MetricResult::List(list) => panic!("expected one dataset, got {}", list.len()),
    }
}

fn values(ds: &Dataset, name: &str) -> Vec<f64> {
    let field = ds.get(name).unwrap_or_else(|| panic!("no variable {name}"));
    field.data().iter().copied().collect()
}

#[test]
fn constant_offset_gives_constant_bias() {
    let cache = cache(|_, _, _| 0.5, |_| 0.3);
    let config = config("bias-1", MetricKind::Bias);
    let ds = single(Evaluator::new(&config, &cache).compute().unwrap());

    let bias = ds.get("sic").unwrap();
    assert_eq!(bias.dims(), &[Dim::Time, Dim::Y, Dim::X]);
    for v in bias.data() {
        approx::assert_relative_eq!(*v, 0.2, epsilon = 1e-12);
    }
    assert!(ds.get(FULL_MASK_NAME).is_some());
    assert_eq!(ds.attr("metric"), Some(&AttrValue::Text("bias".to_string())));
}

#[test]
fn rmse_against_persistence() {
    // forecasts are off by 0.2, persistence is perfect
    let cache = cache(|_, _, _| 0.5, |_| 0.3);
    let config = config("rmse-1", MetricKind::Rmse);
    let ds = single(Evaluator::new(&config, &cache).compute().unwrap());

    for v in values(&ds, "fc_rmse") {
        approx::assert_relative_eq!(v, 0.2, epsilon = 1e-12);
    }
    for v in values(&ds, "noplot_pers_rmse") {
        approx::assert_relative_eq!(v, 0.0, epsilon = 1e-12);
    }
    for v in values(&ds, "fc_rmsess") {
        assert_eq!(v, -1.0);
    }
}

#[test]
fn rmse_needs_persistence_observations() {
    let cache = store(|_, _, _| 0.5, |_| 0.3, false);
    let config = config("rmse-2", MetricKind::Rmse);
    let err = Evaluator::new(&config, &cache).compute().unwrap_err();
    assert!(matches!(err, MetricError::MissingObservations { .. }), "unexpected error: {err:?}");
}

#[test]
fn iiee_counts_misplaced_ice() {
    // all cells forecast as ice; the second column is observed open water
    let cache = cache(|_, _, _| 0.5, |x| if x == 0 { 0.3 } else { 0.05 });
    let config = config("iiee-1", MetricKind::Iiee);
    let ds = single(Evaluator::new(&config, &cache).compute().unwrap());

    for v in values(&ds, "fc_iiee") {
        approx::assert_relative_eq!(v, 1250.0, epsilon = 1e-9);
    }
    for v in values(&ds, "noplot_fc_under") {
        approx::assert_relative_eq!(v, 0.0, epsilon = 1e-12);
    }
    for v in values(&ds, "fc_aee") {
        approx::assert_relative_eq!(v, 1250.0, epsilon = 1e-9);
    }
    for v in values(&ds, "noplot_pers_iiee") {
        approx::assert_relative_eq!(v, 0.0, epsilon = 1e-12);
    }
}

#[test]
fn identical_forecast_has_no_ice_edge_error() {
    let cache = cache(|_, _, _| 0.3, |_| 0.3);
    let config = config("iiee-2", MetricKind::Iiee);
    let ds = single(Evaluator::new(&config, &cache).compute().unwrap());
    for v in values(&ds, "fc_iiee") {
        assert_eq!(v, 0.0);
    }
}

#[test]
fn ice_in_both_sources_has_no_ice_edge_error() {
    // 0.5 and 0.3 are both above the 15 % threshold
    let cache = cache(|_, _, _| 0.5, |_| 0.3);
    let config = config("iiee-3", MetricKind::Iiee);
    let ds = single(Evaluator::new(&config, &cache).compute().unwrap());
    for name in ["fc_iiee", "fc_aee", "fc_me", "noplot_pers_iiee"] {
        for v in values(&ds, name) {
            assert_eq!(v, 0.0, "{name}");
        }
    }
}

#[test]
fn iiee_rejects_mismatched_missing_cells() {
    let cache = with_forecast_gap(cache(|_, _, _| 0.5, |_| 0.3));
    let config = config("iiee-4", MetricKind::Iiee);
    let err = Evaluator::new(&config, &cache).compute().unwrap_err();
    assert!(
        matches!(err, MetricError::Area(AreaError::MaskMismatch { first: 2, second: 4 })),
        "unexpected error: {err:?}"
    );
}

#[test]
fn ice_distance_rejects_mismatched_missing_cells() {
    let cache = with_forecast_gap(cache(|_, _, _| 0.5, |_| 0.3));
    let config = config("dist-1", MetricKind::IceDistance).with_points(vec![(0.0, 80.0)]);
    let err = Evaluator::new(&config, &cache).compute().unwrap_err();
    assert!(
        matches!(err, MetricError::Area(AreaError::MaskMismatch { first: 2, second: 4 })),
        "unexpected error: {err:?}"
    );
}

#[test]
fn calibration_observations_keep_their_dates() {
    let cache = cache(|_, _, _| 0.5, |_| 0.3);
    let experiment = Experiment::new("test", "fcsys", "exp1").with_enssize(ENSSIZE);
    let calibration = CalibrationSettings {
        selection: ForecastSelection::new(experiment, DateSelection::Explicit(starts())),
        method: CalibrationMethod::Mean,
        exists: false,
    };
    let config = config("bcm-1", MetricKind::BiasCorrectedMap).with_calibration(Some(calibration));
    let data = Evaluator::new(&config, &cache)
        .prepare(&PrepareOptions::averaging(&[Dim::Member, Dim::Date]))
        .unwrap();

    let obs_calib = data.obs_calib.as_ref().unwrap();
    assert_eq!(obs_calib.len_of(Dim::Date), Some(2));
    assert!(!obs_calib.has(Dim::Member));
    assert!(!data.fc_calib.as_ref().unwrap().has(Dim::Date));
    for v in data.forecast().data() {
        approx::assert_relative_eq!(*v, 0.3, epsilon = 1e-12);
    }
}

#[test]
fn spread_error_ratio_is_a_list() {
    let cache = cache(|m, _, _| 0.4 + 0.1 * m as f64, |_| 0.3);
    let config = config("ser-1", MetricKind::Ser);
    let result = Evaluator::new(&config, &cache).compute().unwrap();

    let MetricResult::List(list) = &result else {
        panic!("expected a list of datasets");
    };
    assert_eq!(list.len(), 2);
    assert!(list[0].get("fc_rmse").is_some() && list[0].get("fc_spread").is_some());
    assert!(list[1].get("fc_ser").is_some());
    for v in values(&list[1], "fc_ser") {
        assert!(v > 0.0 && v.is_finite());
    }
    assert_eq!(
        result.paths(Path::new("/metrics"), "ser-1"),
        vec![PathBuf::from("/metrics/ser-1/ser-1_0.nc"), PathBuf::from("/metrics/ser-1/ser-1_1.nc")]
    );
}

#[test]
fn score_statistic_reduces_area() {
    let cache = cache(|_, _, _| 0.5, |_| 0.3);
    let config = config("fe-1", MetricKind::ForecastError)
        .with_area_statistic(Some(AreaStatistic::parse("score:mean").unwrap()));
    let ds = single(Evaluator::new(&config, &cache).compute().unwrap());

    let error = ds.get("exp1-bias").unwrap();
    assert_eq!(error.dims(), &[Dim::Time]);
    for v in error.data() {
        approx::assert_relative_eq!(*v, 0.2, epsilon = 1e-12);
    }
    assert!(ds.get("lsm").is_some());
}

#[test]
fn plume_needs_an_area_statistic() {
    let cache = cache(|_, _, _| 0.5, |_| 0.3);
    let config = config("plume-1", MetricKind::Plume);
    let err = Evaluator::new(&config, &cache).compute().unwrap_err();
    assert!(matches!(err, MetricError::Validation { .. }), "unexpected error: {err:?}");
}

#[test]
fn skill_of_a_perfect_forecast() {
    let scores = |v: f64| Field::new("s", vec![Dim::X], ArrayD::from_elem(IxDyn(&[2]), v)).unwrap();
    let skill = compute_skill_score(&scores(0.0), &scores(0.4)).unwrap();
    for v in skill.skill.data() {
        approx::assert_relative_eq!(*v, 1.0, epsilon = 1e-9);
    }
    for v in skill.forecast.data() {
        assert_eq!(*v, 0.0);
    }
}

#[test]
fn saved_result_lands_under_the_metric_id() {
    let cache = cache(|_, _, _| 0.5, |_| 0.3);
    let tmp = tempfile::tempdir().unwrap();
    let config = config("bias-2", MetricKind::Bias).with_metric_dir(tmp.path());
    let result = Evaluator::new(&config, &cache).compute().unwrap();

    let files = result.save(config.metric_dir(), config.id()).unwrap();
    assert_eq!(files, vec![tmp.path().join("bias-2").join("bias-2.nc")]);
    assert!(files[0].exists());
}
