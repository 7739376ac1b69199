//! Pure conversion functions: TOML config structs -> crate API config types.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result, anyhow, bail};

use crate::config::{DataToml, PathsToml, PlotToml};

use icecap_area::{AreaStatistic, BoundingBox};
use icecap_calendar::{DateSelection, LeadTimeSpec, expand_date_list, parse_date};
use icecap_calibrate::CalibrationMethod;
use icecap_load::{Experiment, Mode, TemporalAverage};
use icecap_metrics::{CalibrationSettings, ForecastSelection, MetricConfig, MetricKind, RegionSpec};

const DEFAULT_SOURCE: &str = "ecmwf";

/// Resolves `inherit` chains so every plot carries its inherited options.
///
/// Fails on a reference to an unknown plot or an inheritance cycle.
pub fn resolve_plots(plots: &BTreeMap<String, PlotToml>) -> Result<BTreeMap<String, PlotToml>> {
    plots
        .iter()
        .map(|(id, plot)| {
            let mut resolved = plot.clone();
            let mut seen = BTreeSet::from([id.as_str()]);
            let mut parent_id = plot.inherit.as_deref();
            while let Some(pid) = parent_id {
                if !seen.insert(pid) {
                    bail!("plot '{id}': inheritance cycle through '{pid}'");
                }
                let parent = plots
                    .get(pid)
                    .ok_or_else(|| anyhow!("plot '{id}' inherits from unknown plot '{pid}'"))?;
                resolved.inherit_from(parent);
                parent_id = parent.inherit.as_deref();
            }
            Ok((id.clone(), resolved))
        })
        .collect()
}

fn required<'a, T>(value: &'a Option<T>, id: &str, option: &str) -> Result<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| anyhow!("plot '{id}': missing option {option}"))
}

/// Parses a comma-separated list of `YYYYMMDD` dates.
pub fn parse_date_list(spec: &str) -> Result<Vec<chrono::NaiveDate>> {
    expand_date_list(spec)?
        .iter()
        .map(|s| parse_date(s).map_err(Into::into))
        .collect()
}

/// Experiment and date options of either the verification or the
/// calibration period.
struct SelectionOptions<'a> {
    source: Option<&'a String>,
    fcsystem: Option<&'a String>,
    expname: Option<&'a String>,
    modelname: Option<&'a String>,
    mode: Option<&'a String>,
    enssize: Option<usize>,
    refdate: Option<&'a String>,
    dates: Option<&'a String>,
    fromyear: Option<&'a Vec<i32>>,
    toyear: Option<&'a Vec<i32>>,
}

impl SelectionOptions<'_> {
    fn build(&self, id: &str, prefix: &str) -> Result<ForecastSelection> {
        let missing = |option: &str| anyhow!("plot '{id}': missing option {prefix}_{option}");
        let source = self.source.map_or(DEFAULT_SOURCE, String::as_str);
        let fcsystem = self.fcsystem.ok_or_else(|| missing("fcsystem"))?;
        let expname = self.expname.ok_or_else(|| missing("expname"))?;
        let dates = self.dates.ok_or_else(|| missing("dates"))?;

        let mode = match self.mode {
            Some(m) => Mode::parse(m)?,
            None => Mode::Forecast,
        };
        let reference_dates = match self.refdate {
            Some(r) => parse_date_list(r).with_context(|| format!("plot '{id}': invalid {prefix}_refdate"))?,
            None => Vec::new(),
        };
        let experiment = Experiment::new(source, fcsystem.as_str(), expname.as_str())
            .with_modelname(self.modelname.cloned())
            .with_mode(mode)
            .with_enssize(self.enssize.unwrap_or(1))
            .with_reference_dates(reference_dates);

        let empty = Vec::new();
        let selection = DateSelection::parse(
            dates,
            self.fromyear.unwrap_or(&empty),
            self.toyear.unwrap_or(&empty),
        )
        .with_context(|| format!("plot '{id}': invalid {prefix}_dates"))?;
        Ok(ForecastSelection::new(experiment, selection))
    }
}

/// Builds the verification selection of `plot`.
pub fn build_verif_selection(id: &str, plot: &PlotToml) -> Result<ForecastSelection> {
    SelectionOptions {
        source: plot.verif_source.as_ref(),
        fcsystem: plot.verif_fcsystem.as_ref(),
        expname: plot.verif_expname.as_ref(),
        modelname: plot.verif_modelname.as_ref(),
        mode: plot.verif_mode.as_ref(),
        enssize: plot.verif_enssize,
        refdate: plot.verif_refdate.as_ref(),
        dates: plot.verif_dates.as_ref(),
        fromyear: plot.verif_fromyear.as_ref(),
        toyear: plot.verif_toyear.as_ref(),
    }
    .build(id, "verif")
}

/// Builds the calibration settings of `plot`, if `calib_dates` is set.
///
/// The calibration experiment defaults to the verification experiment and
/// the method to `mean`.
pub fn build_calibration(id: &str, plot: &PlotToml) -> Result<Option<CalibrationSettings>> {
    if plot.calib_dates.is_none() {
        if plot.calib_method.is_some() {
            bail!("plot '{id}': calib_method needs calib_dates");
        }
        return Ok(None);
    }
    let selection = SelectionOptions {
        source: plot.calib_source.as_ref().or(plot.verif_source.as_ref()),
        fcsystem: plot.calib_fcsystem.as_ref().or(plot.verif_fcsystem.as_ref()),
        expname: plot.calib_expname.as_ref().or(plot.verif_expname.as_ref()),
        modelname: plot.calib_modelname.as_ref().or(plot.verif_modelname.as_ref()),
        mode: plot.calib_mode.as_ref(),
        enssize: plot.calib_enssize.or(plot.verif_enssize),
        refdate: plot.calib_refdate.as_ref(),
        dates: plot.calib_dates.as_ref(),
        fromyear: plot.calib_fromyear.as_ref(),
        toyear: plot.calib_toyear.as_ref(),
    }
    .build(id, "calib")?;
    let method = match &plot.calib_method {
        Some(m) => m.parse::<CalibrationMethod>()?,
        None => CalibrationMethod::Mean,
    };
    Ok(Some(CalibrationSettings {
        selection,
        method,
        exists: plot.calib_exists.unwrap_or(false),
    }))
}

/// Builds the area-statistic region of `plot`.
pub fn build_region(id: &str, plot: &PlotToml) -> Result<RegionSpec> {
    match (&plot.region_extent, &plot.nsidc_region) {
        (Some(_), Some(_)) => bail!("plot '{id}': set either region_extent or nsidc_region, not both"),
        (Some(extent), None) => Ok(RegionSpec::Extent(BoundingBox::parse(extent)?)),
        (None, Some(name)) => Ok(RegionSpec::Nsidc(name.clone())),
        (None, None) => Ok(RegionSpec::Everywhere),
    }
}

/// Builds a [`MetricConfig`] from a resolved plot table and the global
/// path and data settings.
pub fn build_metric_config(id: &str, plot: &PlotToml, paths: &PathsToml, data: &DataToml) -> Result<MetricConfig> {
    let kind: MetricKind = required(&plot.plottype, id, "plottype")?.parse()?;
    let target = LeadTimeSpec::parse(required(&plot.target, id, "target")?)
        .with_context(|| format!("plot '{id}': invalid target"))?;
    let verif = build_verif_selection(id, plot)?;

    let area_statistic = plot
        .area_statistic
        .as_deref()
        .map(AreaStatistic::parse)
        .transpose()?;
    let temporal_average = plot
        .temporal_average
        .as_deref()
        .map(TemporalAverage::parse)
        .transpose()?;
    let placeholder = parse_date(&data.placeholder_date).context("invalid [data] placeholder_date")?;
    let obs_dir = paths
        .obs_cache_dir
        .clone()
        .unwrap_or_else(|| paths.cache_root.join(&data.verif_name));

    let mut config = MetricConfig::new(id, kind, verif, target)
        .with_param(data.params.as_str())
        .with_grid(data.grid.as_str())
        .with_verif_name(data.verif_name.as_str())
        .with_cache_root(paths.cache_root.clone())
        .with_obs_dir(obs_dir)
        .with_metric_dir(paths.metric_dir.clone())
        .with_etc_dir(paths.etc_dir.clone())
        .with_calibration_dir(paths.calibration_dir.clone())
        .with_placeholder_date(placeholder)
        .with_calibration(build_calibration(id, plot)?)
        .with_area_statistic(area_statistic)
        .with_region(build_region(id, plot)?)
        .with_additional_mask(plot.additional_mask.clone())
        .with_temporal_average(temporal_average)
        .with_points(
            plot.points
                .iter()
                .flatten()
                .map(|&[lon, lat]| (lon, lat))
                .collect(),
        )
        .with_add_verdata(plot.add_verdata.unwrap_or(true))
        .with_edge_only(plot.edge_only.unwrap_or(false))
        .with_min_cluster_size(plot.min_cluster_size);
    if let Some(threshold) = plot.sic_threshold {
        config = config.with_threshold(threshold);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plot(toml_str: &str) -> PlotToml {
        toml::from_str(toml_str).unwrap()
    }

    fn base() -> PlotToml {
        plot(
            r#"
            plottype = "bias"
            verif_fcsystem = "extended-range"
            verif_expname = "0001"
            verif_enssize = 51
            verif_dates = "20200101,20200108"
            target = "r:1,7"
            "#,
        )
    }

    #[test]
    fn inheritance_fills_unset_options() {
        let mut plots = BTreeMap::new();
        plots.insert("base".to_string(), base());
        plots.insert(
            "child".to_string(),
            plot(
                r#"
                inherit = "base"
                plottype = "rmse"
                "#,
            ),
        );
        let resolved = resolve_plots(&plots).unwrap();
        let child = &resolved["child"];
        assert_eq!(child.plottype.as_deref(), Some("rmse"));
        assert_eq!(child.verif_expname.as_deref(), Some("0001"));
        assert_eq!(child.verif_enssize, Some(51));
    }

    #[test]
    fn inheritance_cycles_are_rejected() {
        let mut plots = BTreeMap::new();
        plots.insert("a".to_string(), plot(r#"inherit = "b""#));
        plots.insert("b".to_string(), plot(r#"inherit = "a""#));
        let err = resolve_plots(&plots).unwrap_err();
        assert!(err.to_string().contains("cycle"), "{err}");
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut plots = BTreeMap::new();
        plots.insert("a".to_string(), plot(r#"inherit = "missing""#));
        assert!(resolve_plots(&plots).is_err());
    }

    #[test]
    fn metric_config_from_plot() {
        let config = build_metric_config("p1", &base(), &PathsToml::default(), &DataToml::default()).unwrap();
        assert_eq!(config.kind(), MetricKind::Bias);
        assert_eq!(config.verif().experiment.enssize(), 51);
        assert_eq!(config.verif().dates.len(), 2);
        assert_eq!(config.obs_dir(), std::path::Path::new("cache/osi-cdr"));
        assert!(config.calibration().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn calibration_defaults_to_verification_experiment() {
        let mut p = base();
        p.plottype = Some("bias_corrected_map".to_string());
        p.calib_dates = Some("0101".to_string());
        p.calib_fromyear = Some(vec![2000]);
        p.calib_toyear = Some(vec![2010]);
        let calib = build_calibration("p1", &p).unwrap().unwrap();
        assert_eq!(calib.method, CalibrationMethod::Mean);
        assert_eq!(calib.selection.experiment.expname(), "0001");
        assert_eq!(calib.selection.dates.year_span(), Some((2000, 2010)));
    }

    #[test]
    fn region_options_are_exclusive() {
        let mut p = base();
        p.region_extent = Some("-10,30,60,80".to_string());
        assert!(matches!(build_region("p1", &p).unwrap(), RegionSpec::Extent(_)));
        p.nsidc_region = Some("Barents Sea".to_string());
        assert!(build_region("p1", &p).is_err());
    }

    #[test]
    fn missing_target_is_reported() {
        let mut p = base();
        p.target = None;
        let err = build_metric_config("p1", &p, &PathsToml::default(), &DataToml::default()).unwrap_err();
        assert!(err.to_string().contains("target"), "{err}");
    }
}
