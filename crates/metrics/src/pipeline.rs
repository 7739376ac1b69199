//! Shared data preparation for all metrics.
//!
//! [`Evaluator::prepare`] loads the verification forecast and observation,
//! the calibration pair and the persistence forecast as requested, builds
//! the common mask, thresholds or keeps raw values, optionally restricts
//! everything to the extended ice edge, applies `data` area statistics and
//! calibrates the forecast. Metrics then score the [`Prepared`] fields.

use icecap_area::{AreaStatistic, Mask, Region, StatisticStage, build_mask, mask_fields, mask_fields_checked, nsidc_raster_path};
use icecap_calendar::LeadTimeSpec;
use icecap_calibrate::{CalibrationArchive, Calibrator};
use icecap_edge::{EDGE_EXTENT_KM, extended_edge};
use icecap_io::{CacheStore, Dataset, Dim, Field, read_mask_raster, read_region_raster};
use icecap_load::{ForecastSet, Loader, forecast_sets};
use tracing::{debug, info, info_span};

use crate::config::{MetricConfig, RegionSpec};
use crate::error::MetricError;
use crate::kind::MetricKind;
use crate::output::MetricResult;
use crate::{bias, distance, ensmean, iiee, phenology, probabilistic, rmse, trend};

/// Name of the unrestricted validity mask in result datasets.
pub const FULL_MASK_NAME: &str = "lsm-full";

/// What [`Evaluator::prepare`] should load and how.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrepareOptions {
    average: Vec<Dim>,
    persistence: bool,
    threshold: bool,
    checked: bool,
}

impl PrepareOptions {
    /// Average over `dims` while loading.
    pub fn averaging(dims: &[Dim]) -> Self {
        Self {
            average: dims.to_vec(),
            ..Self::default()
        }
    }

    /// Also load the persistence forecast.
    pub fn with_persistence(mut self) -> Self {
        self.persistence = true;
        self
    }

    /// Convert concentrations to 1/0 ice indicators.
    pub fn thresholded(mut self) -> Self {
        self.threshold = true;
        self
    }

    /// Fail if forecast and observation end up with different valid cells.
    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }
}

/// Masked, aligned fields ready for scoring.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub fc_verif: Field,
    pub obs_verif: Field,
    pub fc_calib: Option<Field>,
    pub obs_calib: Option<Field>,
    /// Calibrated verification forecast.
    pub fc_verif_bc: Option<Field>,
    /// Observation of the day before each start date.
    pub persistence: Option<Field>,
    pub mask: Mask,
    /// `mask` as a 1/NaN field named `lsm-full`.
    pub lsm_full: Field,
    /// Region mask of a `data` area statistic.
    pub lsm: Option<Field>,
    /// False when the observation is a placeholder.
    pub observed: bool,
}

impl Prepared {
    /// The calibrated forecast if there is one, else the raw forecast.
    pub fn forecast(&self) -> &Field {
        self.fc_verif_bc.as_ref().unwrap_or(&self.fc_verif)
    }

    /// The persistence forecast.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::MissingObservations`] if it was not loaded.
    pub fn persistence(&self, metric: MetricKind) -> Result<&Field, MetricError> {
        self.persistence.as_ref().ok_or_else(|| MetricError::MissingObservations {
            metric: metric.to_string(),
        })
    }
}

/// Select member 0 if the field has a member axis.
pub(crate) fn first_member(field: &Field) -> Result<Field, MetricError> {
    if field.has(Dim::Member) {
        Ok(field.isel(Dim::Member, 0)?)
    } else {
        Ok(field.clone())
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Computes one configured metric from a cache store.
#[derive(Debug)]
pub struct Evaluator<'a, S: CacheStore + ?Sized> {
    config: &'a MetricConfig,
    store: &'a S,
}

impl<'a, S: CacheStore + ?Sized> Evaluator<'a, S> {
    pub fn new(config: &'a MetricConfig, store: &'a S) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &MetricConfig {
        self.config
    }

    /// Validate the configuration and compute the metric.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::Validation`] for an invalid configuration and
    /// any error of loading, masking, calibration or scoring.
    pub fn compute(&self) -> Result<MetricResult, MetricError> {
        self.config.validate()?;
        let kind = self.config.kind();
        let _span = info_span!("metric", id = %self.config.id(), %kind).entered();
        info!("computing metric");

        let mut result = match kind {
            MetricKind::Bias => bias::bias(self)?,
            MetricKind::ForecastError => bias::forecast_error(self)?,
            MetricKind::BiasCorrectedMap => bias::bias_corrected_map(self)?,
            MetricKind::Rmse => rmse::rmse(self)?,
            MetricKind::Ser => rmse::ser(self)?,
            MetricKind::Brier => probabilistic::brier(self)?,
            MetricKind::Crps => probabilistic::crps(self)?,
            MetricKind::Sps => probabilistic::sps(self)?,
            MetricKind::Iiee => iiee::iiee(self)?,
            MetricKind::Ensmean => ensmean::ensmean(self)?,
            MetricKind::Plume => ensmean::plume(self)?,
            MetricKind::LinearTrend => trend::linear_trend(self)?,
            MetricKind::FreezeUp | MetricKind::BreakUp => phenology::phenology(self)?,
            MetricKind::IceDistance => distance::ice_distance(self)?,
        };

        let reduction = self.config.area_statistic().map(|s| match s.reduction() {
            icecap_area::Reduction::Mean => "mean",
            icecap_area::Reduction::Sum => "sum",
            icecap_area::Reduction::Median => "median",
        });
        let presentation = kind.presentation(reduction);
        let verif_name = self.config.verif_name().to_string();
        let statistic = self.config.area_statistic().map(|s| s.to_string());
        result.for_each_dataset(|ds| {
            presentation.apply(ds, &verif_name);
            ds.set_attr("metric", kind.as_str());
            if let Some(stat) = &statistic {
                ds.set_attr("area_statistic", stat.as_str());
            }
        });
        Ok(result)
    }

    // -- loading ------------------------------------------------------------

    pub(crate) fn loader(&self) -> Loader<'a, S> {
        Loader::new(
            self.store,
            self.config.param(),
            self.config.grid(),
            self.config.obs_dir(),
        )
        .with_temporal_average(self.config.temporal_average().cloned())
    }

    /// Forecast sets of the verification period.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::Load`] for mixed model cycles.
    pub fn verif_sets(&self) -> Result<Vec<ForecastSet>, MetricError> {
        let verif = self.config.verif();
        Ok(forecast_sets(&verif.experiment, &verif.dates, self.config.cache_root())?)
    }

    /// Forecast sets of the calibration period, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::Load`] for mixed model cycles.
    pub fn calib_sets(&self) -> Result<Option<Vec<ForecastSet>>, MetricError> {
        let Some(calib) = self.config.calibration() else {
            return Ok(None);
        };
        let sets = forecast_sets(&calib.selection.experiment, &calib.selection.dates, self.config.cache_root())?;
        Ok(Some(sets))
    }

    /// Verification observation, or the placeholder when none exists.
    /// The flag tells whether real observations were found.
    fn load_verif_observation(&self, sets: &[ForecastSet], average: &[Dim]) -> Result<(Field, bool), MetricError> {
        let loader = self.loader();
        if let Some(obs) = loader.load_observation(sets, self.config.target(), average)? {
            return Ok((obs, true));
        }
        let date = self.config.placeholder_date().ok_or_else(|| MetricError::MissingObservations {
            metric: self.config.kind().to_string(),
        })?;
        info!("no verification data, plotting forecast only");
        Ok((loader.load_placeholder(date, average)?, false))
    }

    fn calibrator(&self) -> Option<Calibrator> {
        let calib = self.config.calibration()?;
        let calibrator = Calibrator::new(calib.method);
        Some(match self.config.trend_years() {
            Some(years) => calibrator.with_trend_years(years),
            None => calibrator,
        })
    }

    /// Archive of precomputed calibration results.
    pub(crate) fn archive(&self) -> CalibrationArchive {
        CalibrationArchive::new(self.config.metric_dir().join(self.config.id()))
            .with_calibration_dir(self.config.calibration_dir().map(|p| p.to_path_buf()))
    }

    // -- masks and regions --------------------------------------------------

    /// The region of the area statistics.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::Io`] if an NSIDC raster cannot be read.
    pub fn region(&self) -> Result<Region, MetricError> {
        Ok(match self.config.region() {
            RegionSpec::Everywhere => Region::Everywhere,
            RegionSpec::Extent(bbox) => Region::Extent(*bbox),
            RegionSpec::Nsidc(name) => {
                let etc = self.config.etc_dir().ok_or_else(|| {
                    MetricError::validation(vec!["NSIDC regions need the etc directory".to_string()])
                })?;
                let path = nsidc_raster_path(etc, self.config.verif_name());
                Region::Nsidc {
                    raster: read_region_raster(&path)?,
                    name: name.clone(),
                }
            }
        })
    }

    /// Build the combined mask of `fc` and `obs` with the additional mask.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::Io`] if the additional mask cannot be read and
    /// [`MetricError::Area`] if grids differ.
    pub fn build_mask(&self, fc: &Field, obs: &Field) -> Result<Mask, MetricError> {
        let extra = self
            .config
            .additional_mask()
            .map(read_mask_raster)
            .transpose()?;
        Ok(build_mask(fc, obs, extra.as_ref())?)
    }

    /// Apply `statistic` to `fields` over `mask` and the configured region.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::Area`] for grids without spacing or region errors.
    pub fn reduce_area(
        &self,
        statistic: &AreaStatistic,
        fields: Vec<Field>,
        mask: &Mask,
    ) -> Result<(Vec<Field>, Field), MetricError> {
        let region = self.region()?;
        let reduced = statistic.apply(&fields, mask, &region)?;
        Ok((reduced.fields, reduced.mask))
    }

    /// Apply the configured area statistic if it runs at `stage`.
    fn reduce_at_stage(
        &self,
        stage: StatisticStage,
        fields: Vec<Field>,
        mask: &Mask,
    ) -> Result<(Vec<Field>, Option<Field>), MetricError> {
        match self.config.area_statistic() {
            Some(stat) if stat.stage() == stage => {
                let (fields, lsm) = self.reduce_area(stat, fields, mask)?;
                Ok((fields, Some(lsm)))
            }
            _ => Ok((fields, None)),
        }
    }

    /// Post-process computed scores: score-stage temporal averaging, then a
    /// score-stage area statistic. Returns the region mask when reduced.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::Load`] for incomplete averaging blocks and
    /// [`MetricError::Area`] for area-statistic errors.
    pub fn finish_scores(&self, scores: Vec<Field>, mask: &Mask) -> Result<(Vec<Field>, Option<Field>), MetricError> {
        let scores = self.average_scores(scores)?;
        self.reduce_at_stage(StatisticStage::Score, scores, mask)
    }

    /// As [`Evaluator::finish_scores`] but always summing over the area.
    ///
    /// # Errors
    ///
    /// As for [`Evaluator::finish_scores`].
    pub fn finish_scores_summed(&self, scores: Vec<Field>, mask: &Mask) -> Result<(Vec<Field>, Field), MetricError> {
        let scores = self.average_scores(scores)?;
        self.reduce_area(&AreaStatistic::area_sum(StatisticStage::Score), scores, mask)
    }

    fn average_scores(&self, scores: Vec<Field>) -> Result<Vec<Field>, MetricError> {
        let Some(avg) = self.config.temporal_average() else {
            return Ok(scores);
        };
        scores
            .into_iter()
            .map(|s| {
                if s.has(Dim::Time) {
                    Ok(avg.apply_to_scores(&s)?)
                } else {
                    Ok(s)
                }
            })
            .collect()
    }

    // -- prepare ------------------------------------------------------------

    /// Load, mask, threshold, reduce and calibrate the metric's input data.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::MissingObservations`] when persistence or
    /// calibration observations are absent, and any loading, masking or
    /// calibration error.
    pub fn prepare(&self, opts: &PrepareOptions) -> Result<Prepared, MetricError> {
        let config = self.config;
        let kind = config.kind();
        let loader = self.loader();
        let sets = self.verif_sets()?;

        let fc_verif = loader.load_forecast(&sets, config.target(), &opts.average)?;
        let (obs_verif, observed) = self.load_verif_observation(&sets, &opts.average)?;

        let mut calib_pair = None;
        if let Some(calib) = config.calibration()
            && !calib.exists
            && let Some(calib_sets) = self.calib_sets()?
        {
            info!(method = %calib.method, "loading calibration data");
            let fc = loader.load_forecast(&calib_sets, config.target(), &opts.average)?;
            // calibration observations always keep their date axis
            let obs = loader
                .load_observation(&calib_sets, config.target(), &[Dim::Member])?
                .ok_or_else(|| MetricError::MissingObservations {
                    metric: kind.to_string(),
                })?;
            calib_pair = Some((fc, obs));
        }

        let mut persistence = None;
        if opts.persistence {
            if !observed {
                return Err(MetricError::MissingObservations {
                    metric: kind.to_string(),
                });
            }
            let pers = loader
                .load_observation(&sets, &LeadTimeSpec::persistence(), &opts.average)?
                .ok_or_else(|| MetricError::MissingObservations {
                    metric: kind.to_string(),
                })?;
            let pers = first_member(&pers)?;
            let pers = if pers.has(Dim::Time) { pers.isel(Dim::Time, 0)? } else { pers };
            persistence = Some(pers);
        }

        // -- mask -------------------------------------------------------------
        let mask = self.build_mask(&fc_verif, &obs_verif)?;
        let pair = [fc_verif, obs_verif];
        let masked = if opts.checked {
            mask_fields_checked(&mask, &pair)?
        } else {
            mask_fields(&mask, &pair)?
        };
        let [fc_verif, obs_verif]: [Field; 2] = masked
            .try_into()
            .map_err(|_| MetricError::validation(vec!["masking lost a field".to_string()]))?;
        let calib_pair = match calib_pair {
            Some((fc, obs)) => Some((mask.apply(&fc)?, mask.apply(&obs)?)),
            None => None,
        };
        let persistence = persistence.map(|p| mask.apply(&p)).transpose()?;
        let lsm_full = mask.to_field(FULL_MASK_NAME)?;
        debug!(valid = mask.count(), "masked input data");

        let calibrator = self.calibrator();
        let mut prepared = Prepared {
            fc_verif,
            obs_verif,
            fc_calib: None,
            obs_calib: None,
            fc_verif_bc: None,
            persistence,
            mask,
            lsm_full,
            lsm: None,
            observed,
        };

        if opts.threshold {
            // calibrate on concentrations, then convert everything to ice indicators
            if let (Some(cal), Some((fc_calib, obs_calib))) = (&calibrator, &calib_pair) {
                prepared.fc_verif_bc = Some(cal.apply(fc_calib, obs_calib, &prepared.fc_verif)?);
            }
            let t = config.threshold();
            prepared.fc_verif = prepared.fc_verif.threshold(t);
            prepared.obs_verif = prepared.obs_verif.threshold(t);
            prepared.fc_verif_bc = prepared.fc_verif_bc.map(|f| f.threshold(t));
            prepared.persistence = prepared.persistence.map(|f| f.threshold(t));
            if let Some((fc, obs)) = calib_pair {
                prepared.fc_calib = Some(fc.threshold(t));
                prepared.obs_calib = Some(obs.threshold(t));
            }
            if config.edge_only() {
                let edge = extended_edge(&prepared.obs_verif, None, EDGE_EXTENT_KM)?;
                restrict_to_edge(&mut prepared, &edge)?;
            }
            self.reduce_prepared(&mut prepared, false)?;
        } else {
            if let Some((fc, obs)) = calib_pair {
                prepared.fc_calib = Some(fc);
                prepared.obs_calib = Some(obs);
            }
            if config.edge_only() {
                let edge = extended_edge(&prepared.obs_verif, Some(config.threshold()), EDGE_EXTENT_KM)?;
                restrict_to_edge(&mut prepared, &edge)?;
            }
            self.reduce_prepared(&mut prepared, true)?;
            if let (Some(cal), Some(fc_calib), Some(obs_calib)) = (&calibrator, &prepared.fc_calib, &prepared.obs_calib) {
                prepared.fc_verif_bc = Some(cal.apply(fc_calib, obs_calib, &prepared.fc_verif)?);
            }
        }
        Ok(prepared)
    }

    /// Apply a `data` area statistic to the verification fields, and to the
    /// calibration pair when `with_calib`.
    fn reduce_prepared(&self, prepared: &mut Prepared, with_calib: bool) -> Result<(), MetricError> {
        let Some(stat) = self.config.area_statistic() else {
            return Ok(());
        };
        if stat.stage() != StatisticStage::Data {
            return Ok(());
        }

        let mut fields = vec![prepared.fc_verif.clone(), prepared.obs_verif.clone()];
        let mut slots = Vec::new();
        let optional: [(&Option<Field>, Slot); 4] = [
            (&prepared.fc_verif_bc, Slot::Calibrated),
            (&prepared.persistence, Slot::Persistence),
            (&prepared.fc_calib, Slot::FcCalib),
            (&prepared.obs_calib, Slot::ObsCalib),
        ];
        for (field, slot) in optional {
            let calib_field = matches!(slot, Slot::FcCalib | Slot::ObsCalib);
            if let Some(f) = field
                && (with_calib || !calib_field)
            {
                fields.push(f.clone());
                slots.push(slot);
            }
        }

        let (mut reduced, lsm) = self.reduce_area(stat, fields, &prepared.mask)?;
        let rest = reduced.split_off(2);
        let mut iter = reduced.into_iter();
        if let (Some(fc), Some(obs)) = (iter.next(), iter.next()) {
            prepared.fc_verif = fc;
            prepared.obs_verif = obs;
        }
        for (field, slot) in rest.into_iter().zip(slots) {
            match slot {
                Slot::Calibrated => prepared.fc_verif_bc = Some(field),
                Slot::Persistence => prepared.persistence = Some(field),
                Slot::FcCalib => prepared.fc_calib = Some(field),
                Slot::ObsCalib => prepared.obs_calib = Some(field),
            }
        }
        prepared.lsm = Some(lsm);
        Ok(())
    }

    // -- output -------------------------------------------------------------

    /// Result dataset of `fields` with the region mask (if any) and the
    /// full mask appended.
    pub fn dataset(&self, fields: Vec<Field>, lsm: Option<Field>, lsm_full: &Field) -> Dataset {
        let mut ds = Dataset::new();
        for f in fields {
            ds.insert(f);
        }
        if let Some(lsm) = lsm {
            ds.insert(lsm);
        }
        ds.insert(lsm_full.clone());
        ds
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Calibrated,
    Persistence,
    FcCalib,
    ObsCalib,
}

/// Keep the verification fields only on the extended ice edge.
fn restrict_to_edge(prepared: &mut Prepared, edge: &Field) -> Result<(), MetricError> {
    info!("restricting verification to the extended ice edge");
    let on_edge = |v: f64| v == 1.0;
    prepared.fc_verif = prepared.fc_verif.where_field(edge, on_edge)?;
    prepared.obs_verif = prepared.obs_verif.where_field(edge, on_edge)?;
    if let Some(bc) = &prepared.fc_verif_bc {
        prepared.fc_verif_bc = Some(bc.where_field(edge, on_edge)?);
    }
    if let Some(p) = &prepared.persistence {
        prepared.persistence = Some(p.where_field(edge, on_edge)?);
    }
    Ok(())
}
