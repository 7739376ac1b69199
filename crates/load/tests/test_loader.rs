//! Integration tests: assembling fields from an in-memory cache.

use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};
use icecap_calendar::LeadTimeSpec;
use icecap_io::{CacheEntry, Dim, Field, IoError, MemoryCache, forecast_file_name, observation_file_name};
use icecap_load::{ForecastSet, LoadError, Loader, TemporalAverage};
use ndarray::{ArrayD, IxDyn};

const FC_DIR: &str = "/cache/ecmwf/extended-range/0001/latest/fc";
const OBS_DIR: &str = "/cache/osi-cdr";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `nt` daily steps from `start` on a 1x2 grid; cell values `f(step, x)`.
fn entry(start: NaiveDate, nt: usize, f: impl Fn(usize, usize) -> f64) -> CacheEntry {
    let data = ArrayD::from_shape_fn(IxDyn(&[nt, 1, 2]), |ix| f(ix[0], ix[2]));
    CacheEntry {
        dates: (0..nt as u64).map(|i| start + Days::new(i)).collect(),
        field: Field::new("sic", vec![Dim::Time, Dim::Y, Dim::X], data).unwrap(),
    }
}

fn set(label: &str, dates: Vec<NaiveDate>, enssize: usize) -> ForecastSet {
    ForecastSet {
        label: label.to_string(),
        dates,
        cache_dir: PathBuf::from(FC_DIR),
        enssize,
        cycle: "latest".to_string(),
    }
}

/// Forecast files for every start date and member: value = member + step / 10.
fn add_forecasts(cache: &mut MemoryCache, starts: &[NaiveDate], enssize: usize, nt: usize) {
    for &start in starts {
        for member in 0..enssize {
            let path = Path::new(FC_DIR).join(forecast_file_name(start, member, "ci", "osi-cdr"));
            cache.insert(path, entry(start, nt, |t, _| member as f64 + t as f64 / 10.0));
        }
    }
}

fn add_observation(cache: &mut MemoryCache, day: NaiveDate, value: f64) {
    let path = Path::new(OBS_DIR).join(observation_file_name(day, "ci"));
    cache.insert(path, entry(day, 1, |_, _| value));
}

#[test]
fn forecast_axes_and_lead_labels() {
    let starts = [date(2020, 1, 1), date(2020, 1, 8)];
    let mut cache = MemoryCache::new();
    add_forecasts(&mut cache, &starts, 3, 5);

    let loader = Loader::new(&cache, "ci", "osi-cdr", OBS_DIR);
    let target = LeadTimeSpec::parse("i:1,3").unwrap();
    let fc = loader
        .load_forecast(&[set("all", starts.to_vec(), 3)], &target, &[])
        .unwrap();

    assert_eq!(fc.dims(), &[Dim::Inidate, Dim::Date, Dim::Member, Dim::Time, Dim::Y, Dim::X]);
    assert_eq!(fc.shape(), &[1, 2, 3, 2, 1, 2]);
    assert_eq!(fc.time(), &[0, 2]);
    approx::assert_relative_eq!(fc.data()[[0, 1, 2, 1, 0, 1]], 2.2, epsilon = 1e-12);
}

#[test]
fn averaging_while_loading() {
    let starts = [date(2020, 1, 1), date(2020, 1, 8)];
    let mut cache = MemoryCache::new();
    add_forecasts(&mut cache, &starts, 3, 3);

    let loader = Loader::new(&cache, "ci", "osi-cdr", OBS_DIR);
    let target = LeadTimeSpec::parse("r:0,2").unwrap();
    let fc = loader
        .load_forecast(&[set("all", starts.to_vec(), 3)], &target, &[Dim::Member, Dim::Date, Dim::Inidate])
        .unwrap();

    assert_eq!(fc.dims(), &[Dim::Time, Dim::Y, Dim::X]);
    approx::assert_relative_eq!(fc.data()[[1, 0, 0]], 1.1, epsilon = 1e-12);
}

#[test]
fn missing_timesteps_are_fatal() {
    let starts = [date(2020, 1, 1)];
    let mut cache = MemoryCache::new();
    add_forecasts(&mut cache, &starts, 1, 2);

    let loader = Loader::new(&cache, "ci", "osi-cdr", OBS_DIR);
    let target = LeadTimeSpec::parse("r:0,5").unwrap();
    let err = loader
        .load_forecast(&[set("all", starts.to_vec(), 1)], &target, &[])
        .unwrap_err();
    assert!(
        matches!(err, LoadError::Io(IoError::MissingTimesteps { .. })),
        "unexpected error: {err:?}"
    );
}

#[test]
fn missing_forecast_file_is_fatal() {
    let cache = MemoryCache::new();
    let loader = Loader::new(&cache, "ci", "osi-cdr", OBS_DIR);
    let target = LeadTimeSpec::parse("i:1").unwrap();
    let err = loader
        .load_forecast(&[set("all", vec![date(2020, 1, 1)], 1)], &target, &[])
        .unwrap_err();
    assert!(matches!(err, LoadError::Io(IoError::FileNotFound { .. })));
}

#[test]
fn observation_gaps_filled_with_nan() {
    let mut cache = MemoryCache::new();
    add_observation(&mut cache, date(2020, 1, 1), 0.5);
    add_observation(&mut cache, date(2020, 1, 3), 0.7);

    let loader = Loader::new(&cache, "ci", "osi-cdr", OBS_DIR);
    let target = LeadTimeSpec::parse("r:0,3").unwrap();
    let obs = loader
        .load_observation(&[set("all", vec![date(2020, 1, 1)], 5)], &target, &[])
        .unwrap()
        .expect("observations present");

    assert_eq!(obs.shape(), &[1, 1, 1, 3, 1, 2]);
    assert_eq!(obs.data()[[0, 0, 0, 0, 0, 0]], 0.5);
    assert!(obs.data()[[0, 0, 0, 1, 0, 0]].is_nan());
    assert_eq!(obs.data()[[0, 0, 0, 2, 0, 1]], 0.7);
}

#[test]
fn missing_first_observation_means_no_data() {
    let mut cache = MemoryCache::new();
    add_observation(&mut cache, date(2020, 1, 2), 0.5);

    let loader = Loader::new(&cache, "ci", "osi-cdr", OBS_DIR);
    let target = LeadTimeSpec::parse("r:0,2").unwrap();
    let obs = loader
        .load_observation(&[set("all", vec![date(2020, 1, 1)], 1)], &target, &[])
        .unwrap();
    assert!(obs.is_none());
}

#[test]
fn persistence_loads_day_before_start() {
    let mut cache = MemoryCache::new();
    add_observation(&mut cache, date(2020, 2, 29), 0.9);

    let loader = Loader::new(&cache, "ci", "osi-cdr", OBS_DIR)
        .with_temporal_average(Some(TemporalAverage::parse("data:days:7").unwrap()));
    let obs = loader
        .load_observation(
            &[set("0301", vec![date(2020, 3, 1)], 1)],
            &LeadTimeSpec::persistence(),
            &[Dim::Member],
        )
        .unwrap()
        .unwrap();
    assert_eq!(obs.time(), &[-1]);
    assert_eq!(obs.dims(), &[Dim::Inidate, Dim::Date, Dim::Time, Dim::Y, Dim::X]);
}

#[test]
fn unequal_sets_are_nan_padded() {
    let mut cache = MemoryCache::new();
    add_forecasts(&mut cache, &[date(2020, 2, 29)], 1, 1);
    add_forecasts(&mut cache, &[date(2019, 3, 1), date(2020, 3, 1)], 1, 1);

    let loader = Loader::new(&cache, "ci", "osi-cdr", OBS_DIR);
    let sets = [
        set("0229", vec![date(2020, 2, 29)], 1),
        set("0301", vec![date(2019, 3, 1), date(2020, 3, 1)], 1),
    ];
    let fc = loader
        .load_forecast(&sets, &LeadTimeSpec::parse("i:1").unwrap(), &[])
        .unwrap();
    assert_eq!(fc.shape(), &[2, 2, 1, 1, 1, 2]);
    assert!(fc.data()[[0, 1, 0, 0, 0, 0]].is_nan());
    assert_eq!(fc.data()[[1, 1, 0, 0, 0, 0]], 0.0);
}

#[test]
fn data_stage_day_blocks() {
    let starts = [date(2020, 1, 1)];
    let mut cache = MemoryCache::new();
    add_forecasts(&mut cache, &starts, 1, 6);

    let loader = Loader::new(&cache, "ci", "osi-cdr", OBS_DIR)
        .with_temporal_average(Some(TemporalAverage::parse("data:days:3").unwrap()));
    let fc = loader
        .load_forecast(&[set("all", starts.to_vec(), 1)], &LeadTimeSpec::parse("r:0,6").unwrap(), &[])
        .unwrap();
    assert_eq!(fc.time(), &[2, 5]);
    approx::assert_relative_eq!(fc.data()[[0, 0, 0, 1, 0, 0]], 0.4, epsilon = 1e-12);
}

#[test]
fn temporal_average_needs_range_target() {
    let cache = MemoryCache::new();
    let loader = Loader::new(&cache, "ci", "osi-cdr", OBS_DIR)
        .with_temporal_average(Some(TemporalAverage::parse("data:days:3").unwrap()));
    let err = loader
        .load_forecast(&[set("all", vec![date(2020, 1, 1)], 1)], &LeadTimeSpec::parse("i:1,2").unwrap(), &[])
        .unwrap_err();
    assert!(matches!(err, LoadError::InvalidTemporalAverage { .. }));
}

#[test]
fn placeholder_has_singleton_axes() {
    let mut cache = MemoryCache::new();
    add_observation(&mut cache, date(2017, 11, 30), 0.3);

    let loader = Loader::new(&cache, "ci", "osi-cdr", OBS_DIR);
    let obs = loader.load_placeholder(date(2017, 11, 30), &[Dim::Member]).unwrap();
    assert_eq!(obs.dims(), &[Dim::Inidate, Dim::Date, Dim::Time, Dim::Y, Dim::X]);
    assert_eq!(obs.shape(), &[1, 1, 1, 1, 2]);
}
