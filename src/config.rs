use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level ICECAP configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IcecapConfig {
    /// Directory layout.
    #[serde(default)]
    pub paths: PathsToml,

    /// Verification data settings.
    #[serde(default)]
    pub data: DataToml,

    /// Metric definitions keyed by plot id.
    #[serde(default)]
    pub plots: BTreeMap<String, PlotToml>,
}

impl IcecapConfig {
    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let toml_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&toml_str).context("failed to parse TOML config")
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsToml {
    #[serde(default = "default_cache_root")]
    pub cache_root: PathBuf,
    #[serde(default = "default_metric_dir")]
    pub metric_dir: PathBuf,
    #[serde(default)]
    pub etc_dir: Option<PathBuf>,
    #[serde(default)]
    pub calibration_dir: Option<PathBuf>,
    /// Observation cache; defaults to `{cache_root}/{verif_name}`.
    #[serde(default)]
    pub obs_cache_dir: Option<PathBuf>,
}

impl Default for PathsToml {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            metric_dir: default_metric_dir(),
            etc_dir: None,
            calibration_dir: None,
            obs_cache_dir: None,
        }
    }
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("cache")
}
fn default_metric_dir() -> PathBuf {
    PathBuf::from("metrics")
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataToml {
    #[serde(default = "default_params")]
    pub params: String,
    #[serde(default = "default_verif_name")]
    pub grid: String,
    #[serde(default = "default_verif_name")]
    pub verif_name: String,
    /// `YYYYMMDD` observation used for plotting forecasts without
    /// verification data.
    #[serde(default = "default_placeholder_date")]
    pub placeholder_date: String,
}

impl Default for DataToml {
    fn default() -> Self {
        Self {
            params: default_params(),
            grid: default_verif_name(),
            verif_name: default_verif_name(),
            placeholder_date: default_placeholder_date(),
        }
    }
}

fn default_params() -> String {
    "ci".to_string()
}
fn default_verif_name() -> String {
    "osi-cdr".to_string()
}
fn default_placeholder_date() -> String {
    "20171130".to_string()
}

/// One `[plots.<id>]` table. Unset options are taken from the plot named by
/// `inherit`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlotToml {
    pub plottype: Option<String>,
    pub inherit: Option<String>,

    pub verif_source: Option<String>,
    pub verif_fcsystem: Option<String>,
    pub verif_expname: Option<String>,
    pub verif_modelname: Option<String>,
    pub verif_mode: Option<String>,
    pub verif_enssize: Option<usize>,
    pub verif_refdate: Option<String>,
    pub verif_dates: Option<String>,
    pub verif_fromyear: Option<Vec<i32>>,
    pub verif_toyear: Option<Vec<i32>>,

    pub target: Option<String>,

    pub calib_method: Option<String>,
    pub calib_source: Option<String>,
    pub calib_fcsystem: Option<String>,
    pub calib_expname: Option<String>,
    pub calib_modelname: Option<String>,
    pub calib_mode: Option<String>,
    pub calib_enssize: Option<usize>,
    pub calib_refdate: Option<String>,
    pub calib_dates: Option<String>,
    pub calib_fromyear: Option<Vec<i32>>,
    pub calib_toyear: Option<Vec<i32>>,
    pub calib_exists: Option<bool>,

    pub area_statistic: Option<String>,
    /// `lon1,lon2,lat1,lat2`
    pub region_extent: Option<String>,
    pub nsidc_region: Option<String>,
    pub additional_mask: Option<PathBuf>,
    /// `data|score:days|months:value`
    pub temporal_average: Option<String>,
    /// Target points as `[lon, lat]` pairs.
    pub points: Option<Vec<[f64; 2]>>,
    pub add_verdata: Option<bool>,
    pub edge_only: Option<bool>,
    pub min_cluster_size: Option<usize>,
    pub sic_threshold: Option<f64>,
}

fn fill<T: Clone>(slot: &mut Option<T>, parent: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(parent);
    }
}

impl PlotToml {
    /// Take every unset option from `parent`. `inherit` itself is kept.
    pub fn inherit_from(&mut self, parent: &PlotToml) {
        fill(&mut self.plottype, &parent.plottype);
        fill(&mut self.verif_source, &parent.verif_source);
        fill(&mut self.verif_fcsystem, &parent.verif_fcsystem);
        fill(&mut self.verif_expname, &parent.verif_expname);
        fill(&mut self.verif_modelname, &parent.verif_modelname);
        fill(&mut self.verif_mode, &parent.verif_mode);
        fill(&mut self.verif_enssize, &parent.verif_enssize);
        fill(&mut self.verif_refdate, &parent.verif_refdate);
        fill(&mut self.verif_dates, &parent.verif_dates);
        fill(&mut self.verif_fromyear, &parent.verif_fromyear);
        fill(&mut self.verif_toyear, &parent.verif_toyear);
        fill(&mut self.target, &parent.target);
        fill(&mut self.calib_method, &parent.calib_method);
        fill(&mut self.calib_source, &parent.calib_source);
        fill(&mut self.calib_fcsystem, &parent.calib_fcsystem);
        fill(&mut self.calib_expname, &parent.calib_expname);
        fill(&mut self.calib_modelname, &parent.calib_modelname);
        fill(&mut self.calib_mode, &parent.calib_mode);
        fill(&mut self.calib_enssize, &parent.calib_enssize);
        fill(&mut self.calib_refdate, &parent.calib_refdate);
        fill(&mut self.calib_dates, &parent.calib_dates);
        fill(&mut self.calib_fromyear, &parent.calib_fromyear);
        fill(&mut self.calib_toyear, &parent.calib_toyear);
        fill(&mut self.calib_exists, &parent.calib_exists);
        fill(&mut self.area_statistic, &parent.area_statistic);
        fill(&mut self.region_extent, &parent.region_extent);
        fill(&mut self.nsidc_region, &parent.nsidc_region);
        fill(&mut self.additional_mask, &parent.additional_mask);
        fill(&mut self.temporal_average, &parent.temporal_average);
        fill(&mut self.points, &parent.points);
        fill(&mut self.add_verdata, &parent.add_verdata);
        fill(&mut self.edge_only, &parent.edge_only);
        fill(&mut self.min_cluster_size, &parent.min_cluster_size);
        fill(&mut self.sic_threshold, &parent.sic_threshold);
    }
}
