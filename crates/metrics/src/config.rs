//! Configuration of a single metric computation.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use icecap_area::{AreaStatistic, BoundingBox};
use icecap_calendar::{DateSelection, LeadTimeSpec, format_date};
use icecap_calibrate::{ArchiveKey, CalibrationMethod, TrendYears};
use icecap_edge::ICE_THRESHOLD;
use icecap_load::{Experiment, TemporalAverage};

use crate::error::MetricError;
use crate::kind::MetricKind;

/// Observation date loaded as a stand-in when no verification data exists.
const DEFAULT_PLACEHOLDER_DATE: (i32, u32, u32) = (2017, 11, 30);

/// An experiment together with the start dates to load from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSelection {
    pub experiment: Experiment,
    pub dates: DateSelection,
}

impl ForecastSelection {
    pub fn new(experiment: Experiment, dates: DateSelection) -> Self {
        Self { experiment, dates }
    }

    /// Dates as configured, `YYYYMMDD` or `MMDD`.
    pub fn date_labels(&self) -> Vec<String> {
        match &self.dates {
            DateSelection::Explicit(dates) => dates.iter().map(|d| format_date(*d)).collect(),
            DateSelection::Recurring(items) => items.iter().map(|r| r.label()).collect(),
        }
    }

    /// Year range of the first recurring date.
    pub fn first_year_range(&self) -> Option<(i32, i32)> {
        match &self.dates {
            DateSelection::Explicit(_) => None,
            DateSelection::Recurring(items) => items.first().map(|r| (r.from_year(), r.to_year())),
        }
    }

    /// True if exactly one start date of one year is selected.
    pub fn is_single_start(&self) -> bool {
        match &self.dates {
            DateSelection::Explicit(dates) => dates.len() == 1,
            DateSelection::Recurring(items) => {
                items.len() == 1 && items.iter().all(|r| r.from_year() == r.to_year())
            }
        }
    }
}

/// Calibration period and method.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSettings {
    pub selection: ForecastSelection,
    pub method: CalibrationMethod,
    /// Read calibration results from the calibration directory instead of
    /// loading calibration forecasts.
    pub exists: bool,
}

/// Spatial region of the area statistics.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionSpec {
    Everywhere,
    Extent(BoundingBox),
    /// NSIDC region by full or short name.
    Nsidc(String),
}

/// Everything needed to compute one metric.
///
/// Create with [`MetricConfig::new`] and adjust with the `with_*` methods.
/// Call [`MetricConfig::validate`] before use.
#[derive(Debug, Clone)]
pub struct MetricConfig {
    id: String,
    kind: MetricKind,
    param: String,
    grid: String,
    verif_name: String,
    cache_root: PathBuf,
    obs_dir: PathBuf,
    metric_dir: PathBuf,
    etc_dir: Option<PathBuf>,
    calibration_dir: Option<PathBuf>,
    placeholder_date: Option<NaiveDate>,
    verif: ForecastSelection,
    calibration: Option<CalibrationSettings>,
    target: LeadTimeSpec,
    area_statistic: Option<AreaStatistic>,
    region: RegionSpec,
    additional_mask: Option<PathBuf>,
    temporal_average: Option<TemporalAverage>,
    points: Vec<(f64, f64)>,
    add_verdata: bool,
    edge_only: bool,
    min_cluster_size: Option<usize>,
    threshold: f64,
}

impl MetricConfig {
    /// Configuration of metric `id` of type `kind` over `verif` at `target`.
    pub fn new(id: impl Into<String>, kind: MetricKind, verif: ForecastSelection, target: LeadTimeSpec) -> Self {
        let (y, m, d) = DEFAULT_PLACEHOLDER_DATE;
        Self {
            id: id.into(),
            kind,
            param: "ci".to_string(),
            grid: "osi-cdr".to_string(),
            verif_name: "osi-cdr".to_string(),
            cache_root: PathBuf::from("cache"),
            obs_dir: PathBuf::from("cache/osi-cdr"),
            metric_dir: PathBuf::from("metrics"),
            etc_dir: None,
            calibration_dir: None,
            placeholder_date: NaiveDate::from_ymd_opt(y, m, d),
            verif,
            calibration: None,
            target,
            area_statistic: None,
            region: RegionSpec::Everywhere,
            additional_mask: None,
            temporal_average: None,
            points: Vec::new(),
            add_verdata: false,
            edge_only: false,
            min_cluster_size: None,
            threshold: ICE_THRESHOLD,
        }
    }

    // -- builder ------------------------------------------------------------

    /// Cached variable name.
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into();
        self
    }

    /// Name of the common grid, part of cache file names.
    pub fn with_grid(mut self, grid: impl Into<String>) -> Self {
        self.grid = grid.into();
        self
    }

    /// Name of the verification dataset.
    pub fn with_verif_name(mut self, name: impl Into<String>) -> Self {
        self.verif_name = name.into();
        self
    }

    /// Root of the forecast cache.
    pub fn with_cache_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_root = dir.into();
        self
    }

    /// Directory of the daily observation files.
    pub fn with_obs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.obs_dir = dir.into();
        self
    }

    /// Directory the results are written below.
    pub fn with_metric_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.metric_dir = dir.into();
        self
    }

    /// Directory holding auxiliary files such as NSIDC region rasters.
    pub fn with_etc_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.etc_dir = dir;
        self
    }

    /// Shared directory of precomputed calibration files.
    pub fn with_calibration_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.calibration_dir = dir;
        self
    }

    /// Observation date used when the verification period has no data.
    pub fn with_placeholder_date(mut self, date: NaiveDate) -> Self {
        self.placeholder_date = Some(date);
        self
    }

    /// Calibration period and method.
    pub fn with_calibration(mut self, calibration: Option<CalibrationSettings>) -> Self {
        self.calibration = calibration;
        self
    }

    /// Spatial reduction of data or scores.
    pub fn with_area_statistic(mut self, statistic: Option<AreaStatistic>) -> Self {
        self.area_statistic = statistic;
        self
    }

    /// Region of the area statistics.
    pub fn with_region(mut self, region: RegionSpec) -> Self {
        self.region = region;
        self
    }

    /// Raster of extra cells to exclude (NaN = excluded).
    pub fn with_additional_mask(mut self, path: Option<PathBuf>) -> Self {
        self.additional_mask = path;
        self
    }

    /// Temporal averaging of data or scores.
    pub fn with_temporal_average(mut self, average: Option<TemporalAverage>) -> Self {
        self.temporal_average = average;
        self
    }

    /// Target points `(lon, lat)` of the ice-edge distance.
    pub fn with_points(mut self, points: Vec<(f64, f64)>) -> Self {
        self.points = points;
        self
    }

    /// Include the observation in the output where the metric supports it.
    pub fn with_add_verdata(mut self, yes: bool) -> Self {
        self.add_verdata = yes;
        self
    }

    /// Restrict scoring to the extended ice edge.
    pub fn with_edge_only(mut self, yes: bool) -> Self {
        self.edge_only = yes;
        self
    }

    /// Drop ice clusters smaller than this before edge distances.
    pub fn with_min_cluster_size(mut self, size: Option<usize>) -> Self {
        self.min_cluster_size = size;
        self
    }

    /// Concentration above which a cell counts as ice.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    // -- getters ------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn grid(&self) -> &str {
        &self.grid
    }

    pub fn verif_name(&self) -> &str {
        &self.verif_name
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn obs_dir(&self) -> &Path {
        &self.obs_dir
    }

    pub fn metric_dir(&self) -> &Path {
        &self.metric_dir
    }

    pub fn etc_dir(&self) -> Option<&Path> {
        self.etc_dir.as_deref()
    }

    pub fn calibration_dir(&self) -> Option<&Path> {
        self.calibration_dir.as_deref()
    }

    pub fn placeholder_date(&self) -> Option<NaiveDate> {
        self.placeholder_date
    }

    pub fn verif(&self) -> &ForecastSelection {
        &self.verif
    }

    pub fn calibration(&self) -> Option<&CalibrationSettings> {
        self.calibration.as_ref()
    }

    pub fn target(&self) -> &LeadTimeSpec {
        &self.target
    }

    pub fn area_statistic(&self) -> Option<&AreaStatistic> {
        self.area_statistic.as_ref()
    }

    pub fn region(&self) -> &RegionSpec {
        &self.region
    }

    pub fn additional_mask(&self) -> Option<&Path> {
        self.additional_mask.as_deref()
    }

    pub fn temporal_average(&self) -> Option<&TemporalAverage> {
        self.temporal_average.as_ref()
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn add_verdata(&self) -> bool {
        self.add_verdata
    }

    pub fn edge_only(&self) -> bool {
        self.edge_only
    }

    pub fn min_cluster_size(&self) -> Option<usize> {
        self.min_cluster_size
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    // -- derived ------------------------------------------------------------

    /// Display name of the verified forecast: `{modelname} {expname}` or
    /// just the experiment name.
    pub fn forecast_name(&self) -> String {
        let exp = &self.verif.experiment;
        match exp.modelname() {
            Some(model) => format!("{model} {}", exp.expname()),
            None => exp.expname().to_string(),
        }
    }

    /// Years for `mean+trend` calibration, if both periods define them.
    pub fn trend_years(&self) -> Option<TrendYears> {
        let calib = self.calibration.as_ref()?;
        let (calib_from, calib_to) = calib.selection.dates.year_span()?;
        Some(TrendYears {
            calib_from,
            calib_to,
            verif: self.verif.dates.date_years(),
        })
    }

    /// Identity of this metric's calibration results.
    pub fn archive_key(&self) -> Option<ArchiveKey> {
        let calib = self.calibration.as_ref()?;
        let exp = &calib.selection.experiment;
        Some(ArchiveKey {
            plottype: self.kind.as_str().to_string(),
            source: exp.source().to_string(),
            modelname: exp.modelname().map(str::to_string),
            expname: exp.expname().to_string(),
            fcsystem: exp.fcsystem().to_string(),
            enssize: exp.enssize(),
            mode: exp.mode().as_str().to_string(),
            method: calib.method,
            target: self.target.as_str().to_string(),
            dates: calib.selection.date_labels(),
            years: calib.selection.first_year_range(),
        })
    }

    /// Check the configuration for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::Validation`] listing every problem found.
    pub fn validate(&self) -> Result<(), MetricError> {
        let mut problems = Vec::new();
        let kind = self.kind;

        if self.id.is_empty() {
            problems.push("metric id must not be empty".to_string());
        }
        if let Err(e) = self.verif.experiment.validate() {
            problems.push(format!("verification experiment: {e}"));
        }
        if self.verif.dates.is_empty() {
            problems.push("no verification dates".to_string());
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            problems.push(format!("sic threshold {} must lie in (0, 1)", self.threshold));
        }
        if let Some(avg) = &self.temporal_average
            && !self.target.is_persistence()
            && let Err(e) = avg.check_target(&self.target)
        {
            problems.push(e.to_string());
        }

        match &self.calibration {
            None if kind.requires_calibration() => {
                problems.push(format!("{kind} requires a calibration period"));
            }
            Some(_) if kind.rejects_calibration() => {
                problems.push(format!("{kind} does not support calibration"));
            }
            Some(calib) => {
                if let Err(e) = calib.selection.experiment.validate() {
                    problems.push(format!("calibration experiment: {e}"));
                }
                if calib.exists && !kind.uses_calibration_archive() {
                    problems.push(format!("{kind} cannot use precomputed calibration files"));
                }
                if calib.exists && self.calibration_dir.is_none() {
                    problems.push("precomputed calibration files need a calibration directory".to_string());
                }
                let mean_only = matches!(
                    kind,
                    MetricKind::ForecastError | MetricKind::Ensmean | MetricKind::Plume | MetricKind::BiasCorrectedMap
                );
                if mean_only && calib.method != CalibrationMethod::Mean {
                    problems.push(format!("{kind} only supports the mean calibration method"));
                }
                if calib.method == CalibrationMethod::MeanTrend && self.trend_years().is_none() {
                    problems.push("mean+trend needs MMDD calibration dates with years".to_string());
                }
            }
            None => {}
        }

        match kind {
            MetricKind::Plume => {
                if self.area_statistic.is_none() {
                    problems.push("plume requires an area statistic".to_string());
                }
                if self.verif.dates.len() != 1 {
                    problems.push("plume requires exactly one verification date".to_string());
                }
            }
            MetricKind::FreezeUp | MetricKind::BreakUp if !self.verif.is_single_start() => {
                problems.push(format!("{kind} requires exactly one verification date and year"));
            }
            MetricKind::IceDistance => {
                if self.points.is_empty() {
                    problems.push("ice_distance requires at least one target point".to_string());
                }
                if let Some((lon, lat)) = self.points.iter().find(|(_, lat)| !(-90.0..=90.0).contains(lat)) {
                    problems.push(format!("target point ({lon}, {lat}) has an invalid latitude"));
                }
            }
            _ => {}
        }

        if matches!(self.region, RegionSpec::Nsidc(_)) && self.etc_dir.is_none() {
            problems.push("NSIDC regions need the etc directory".to_string());
        }
        if !matches!(self.region, RegionSpec::Everywhere) && self.area_statistic.is_none() {
            problems.push("a region only applies together with an area statistic".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(MetricError::validation(problems))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icecap_load::Mode;

    fn selection(spec: &str) -> ForecastSelection {
        ForecastSelection::new(
            Experiment::new("ecmwf", "extended-range", "0001").with_enssize(3),
            DateSelection::parse(spec, &[2000], &[2001]).unwrap(),
        )
    }

    fn config(kind: MetricKind) -> MetricConfig {
        MetricConfig::new("m1", kind, selection("20200101"), LeadTimeSpec::parse("r:0,3").unwrap())
    }

    fn calibration(method: CalibrationMethod) -> CalibrationSettings {
        let experiment = Experiment::new("ecmwf", "extended-range", "0001")
            .with_mode(Mode::Hindcast)
            .with_enssize(11)
            .with_reference_dates(vec![NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()]);
        CalibrationSettings {
            selection: ForecastSelection::new(experiment, DateSelection::parse("0101", &[2000], &[2019]).unwrap()),
            method,
            exists: false,
        }
    }

    #[test]
    fn test_default_values() {
        let c = config(MetricKind::Bias);
        assert_eq!(c.param(), "ci");
        assert_eq!(c.threshold(), ICE_THRESHOLD);
        assert_eq!(c.placeholder_date(), NaiveDate::from_ymd_opt(2017, 11, 30));
        assert!(!c.add_verdata());
        assert_eq!(c.region(), &RegionSpec::Everywhere);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let c = config(MetricKind::IceDistance)
            .with_points(vec![(10.0, 80.0)])
            .with_min_cluster_size(Some(5))
            .with_threshold(0.3)
            .with_add_verdata(true);
        assert_eq!(c.points(), &[(10.0, 80.0)]);
        assert_eq!(c.min_cluster_size(), Some(5));
        assert_eq!(c.threshold(), 0.3);
        assert!(c.add_verdata());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn calibration_requirements() {
        let err = config(MetricKind::FreezeUp).validate().unwrap_err();
        assert!(err.to_string().contains("requires a calibration period"));

        let err = config(MetricKind::Crps)
            .with_calibration(Some(calibration(CalibrationMethod::Mean)))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("does not support calibration"));

        let err = config(MetricKind::Ensmean)
            .with_calibration(Some(calibration(CalibrationMethod::Anom)))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("only supports the mean"));
    }

    #[test]
    fn precomputed_calibration_needs_directory() {
        let mut calib = calibration(CalibrationMethod::Score);
        calib.exists = true;
        let c = config(MetricKind::FreezeUp).with_calibration(Some(calib));
        assert!(c.validate().is_err());
        assert!(c.with_calibration_dir(Some(PathBuf::from("/calib"))).validate().is_ok());
    }

    #[test]
    fn problems_accumulate() {
        let c = config(MetricKind::Plume).with_threshold(1.5);
        match c.validate().unwrap_err() {
            MetricError::Validation { count, .. } => assert_eq!(count, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn archive_key_from_calibration() {
        let c = config(MetricKind::FreezeUp).with_calibration(Some(calibration(CalibrationMethod::Score)));
        let key = c.archive_key().unwrap();
        assert_eq!(key.plottype, "freeze_up");
        assert_eq!(key.mode, "hc");
        assert_eq!(key.dates, vec!["0101".to_string()]);
        assert_eq!(key.years, Some((2000, 2019)));
        assert_eq!(key.target, "r:0,3");
    }

    #[test]
    fn trend_years_use_calibration_span() {
        let c = MetricConfig::new(
            "m1",
            MetricKind::Rmse,
            ForecastSelection::new(
                Experiment::new("ecmwf", "extended-range", "0001"),
                DateSelection::parse("0101", &[2020], &[2021]).unwrap(),
            ),
            LeadTimeSpec::parse("i:1").unwrap(),
        )
        .with_calibration(Some(calibration(CalibrationMethod::MeanTrend)));
        let years = c.trend_years().unwrap();
        assert_eq!((years.calib_from, years.calib_to), (2000, 2019));
        assert_eq!(years.verif, vec![2020, 2021]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn forecast_name_includes_model() {
        let c = config(MetricKind::Bias);
        assert_eq!(c.forecast_name(), "0001");
        let mut c = c;
        c.verif.experiment = c.verif.experiment.clone().with_modelname(Some("ecmf".to_string()));
        assert_eq!(c.forecast_name(), "ecmf 0001");
    }
}
