//! Assemble forecast and observation fields from per-date cache files.
//!
//! Files are read set by set, start date by start date and member by
//! member. Members are stacked along `member`, start dates along `date` and
//! sets along `inidate`; requested averages are applied right after each
//! stacking step so the full array is never held when it is not needed.

use std::path::PathBuf;

use chrono::NaiveDate;
use icecap_calendar::{LeadTimeSpec, format_date};
use icecap_io::{CacheStore, Dim, Field, forecast_file_name, observation_file_name};
use tracing::{debug, info};

use crate::error::LoadError;
use crate::forecast_set::ForecastSet;
use crate::temporal::{AverageStage, TemporalAverage, Timescale, average_by_label, average_lead_blocks, select_months};

/// Reads forecast and observation fields through a [`CacheStore`].
#[derive(Debug)]
pub struct Loader<'a, S: CacheStore + ?Sized> {
    store: &'a S,
    param: String,
    grid: String,
    obs_dir: PathBuf,
    temporal: Option<TemporalAverage>,
}

impl<'a, S: CacheStore + ?Sized> Loader<'a, S> {
    /// Loader for variable `param` on `grid`, with observations in `obs_dir`.
    pub fn new(store: &'a S, param: impl Into<String>, grid: impl Into<String>, obs_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            param: param.into(),
            grid: grid.into(),
            obs_dir: obs_dir.into(),
            temporal: None,
        }
    }

    /// Apply temporal averaging to every non-persistence load.
    pub fn with_temporal_average(mut self, temporal: Option<TemporalAverage>) -> Self {
        self.temporal = temporal;
        self
    }

    /// Load all members of every set.
    ///
    /// The result has axes `[inidate, date, member, time, yc, xc]` minus the
    /// averaged ones.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Io`] for a missing cache file or missing
    /// timesteps, and [`LoadError::InvalidTemporalAverage`] for a temporal
    /// average on an index target.
    pub fn load_forecast(&self, sets: &[ForecastSet], target: &LeadTimeSpec, average: &[Dim]) -> Result<Field, LoadError> {
        self.check_temporal(target)?;
        info!(param = %self.param, sets = sets.len(), %target, "reading forecast data");

        let mut set_fields = Vec::with_capacity(sets.len());
        for set in sets {
            let mut date_fields = Vec::with_capacity(set.dates.len());
            for &start in &set.dates {
                let wanted = target.dates_from(start)?;
                let mut members = Vec::with_capacity(set.enssize);
                for member in 0..set.enssize {
                    let path = set
                        .cache_dir
                        .join(forecast_file_name(start, member, &self.param, &self.grid));
                    let entry = self.store.read(&path, Some(&wanted))?;
                    members.push(self.label_time(entry.field, &entry.dates, target)?);
                }
                date_fields.push(average_if(Field::stack(&members, Dim::Member)?, Dim::Member, average));
            }
            set_fields.push(average_if(Field::stack(&date_fields, Dim::Date)?, Dim::Date, average));
        }
        stack_sets(set_fields, average)
    }

    /// Load observations matching the start dates of every set.
    ///
    /// Missing per-date files are replaced by NaN fields shaped like the
    /// last file read. Returns `Ok(None)` when the very first requested date
    /// has no file.
    ///
    /// # Errors
    ///
    /// As for [`Loader::load_forecast`].
    pub fn load_observation(
        &self,
        sets: &[ForecastSet],
        target: &LeadTimeSpec,
        average: &[Dim],
    ) -> Result<Option<Field>, LoadError> {
        self.check_temporal(target)?;
        info!(param = %self.param, sets = sets.len(), %target, "reading observation data");

        let mut last: Option<Field> = None;
        let mut set_fields = Vec::with_capacity(sets.len());
        for set in sets {
            let mut date_fields = Vec::with_capacity(set.dates.len());
            for &start in &set.dates {
                let wanted = target.dates_from(start)?;
                let mut steps = Vec::with_capacity(wanted.len());
                let mut missing = Vec::new();
                for &day in &wanted {
                    let path = self.obs_dir.join(observation_file_name(day, &self.param));
                    if self.store.contains(&path) {
                        let entry = self.store.read(&path, Some(&[day]))?;
                        last = Some(entry.field.clone());
                        steps.push(entry.field);
                    } else {
                        let Some(template) = &last else {
                            info!(date = %format_date(day), "no observation data found");
                            return Ok(None);
                        };
                        missing.push(format_date(day));
                        steps.push(template.map(|_| f64::NAN));
                    }
                }
                if !missing.is_empty() {
                    info!(
                        start = %format_date(start),
                        missing = missing.len(),
                        "some observation data missing, filled with NaN"
                    );
                }
                let series = Field::concat(&steps, Dim::Time)?;
                let series = self.label_time(series, &wanted, target)?;
                let member = Field::stack(&[series], Dim::Member)?;
                date_fields.push(average_if(member, Dim::Member, average));
            }
            set_fields.push(average_if(Field::stack(&date_fields, Dim::Date)?, Dim::Date, average));
        }
        stack_sets(set_fields, average).map(Some)
    }

    /// Load the observation file of `date` as a stand-in with length-1
    /// `member`, `date` and `inidate` axes.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Io`] if the file cannot be read.
    pub fn load_placeholder(&self, date: NaiveDate, average: &[Dim]) -> Result<Field, LoadError> {
        let path = self.obs_dir.join(observation_file_name(date, &self.param));
        info!(path = %path.display(), "using placeholder observation");
        let entry = self.store.read(&path, None)?;
        let mut field = entry.field;
        for dim in [Dim::Member, Dim::Date, Dim::Inidate] {
            field = average_if(field.insert_dim(dim)?, dim, average);
        }
        Ok(field)
    }

    fn check_temporal(&self, target: &LeadTimeSpec) -> Result<(), LoadError> {
        match &self.temporal {
            Some(t) if !target.is_persistence() => t.check_target(target),
            _ => Ok(()),
        }
    }

    /// Replace calendar time steps with lead labels, applying temporal
    /// averaging for non-persistence targets.
    fn label_time(&self, field: Field, dates: &[NaiveDate], target: &LeadTimeSpec) -> Result<Field, LoadError> {
        let leads = field.with_time(target.offsets().to_vec())?;
        let Some(temporal) = self.temporal.as_ref().filter(|_| !target.is_persistence()) else {
            return Ok(leads);
        };
        match (temporal.stage(), temporal.timescale()) {
            (AverageStage::Data, Timescale::Days(n)) => average_lead_blocks(&leads, *n),
            (AverageStage::Score, Timescale::Days(_)) => Ok(leads),
            (stage, Timescale::Months(months)) => {
                let (indices, labels) = select_months(dates, months)?;
                let selected = leads.select(Dim::Time, &indices)?.with_time(labels)?;
                debug!(steps = indices.len(), "selected months");
                match stage {
                    AverageStage::Data => average_by_label(&selected),
                    AverageStage::Score => Ok(selected),
                }
            }
        }
    }
}

fn average_if(field: Field, dim: Dim, average: &[Dim]) -> Field {
    if average.contains(&dim) {
        field.mean_over(dim)
    } else {
        field
    }
}

/// Stack set fields along `inidate`, NaN-padding unequal `date` axes.
fn stack_sets(set_fields: Vec<Field>, average: &[Dim]) -> Result<Field, LoadError> {
    let longest = set_fields.iter().filter_map(|f| f.len_of(Dim::Date)).max();
    let padded = match longest {
        Some(len) => set_fields
            .iter()
            .map(|f| f.pad_nan(Dim::Date, len))
            .collect::<Result<Vec<_>, _>>()?,
        None => set_fields,
    };
    Ok(average_if(Field::stack(&padded, Dim::Inidate)?, Dim::Inidate, average))
}
