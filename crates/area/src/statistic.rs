//! Spatial reductions of masked fields.
//!
//! An [`AreaStatistic`] is configured as `kind:function:unit`, e.g.
//! `data:mean:percent` or `score:sum`. `kind` chooses whether the reduction
//! runs on the input data before scoring or on the scores afterwards.

use std::fmt;

use icecap_io::Field;
use icecap_stats::{finite, nanmean, nanmedian, nansum};
use tracing::{debug, info};

use crate::error::AreaError;
use crate::mask::Mask;
use crate::region::Region;

/// Name of the region-restricted mask in result datasets.
pub const REGION_MASK_NAME: &str = "lsm";

/// When the spatial reduction happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticStage {
    /// On forecast and observation before scoring.
    Data,
    /// On the computed scores.
    Score,
}

/// Spatial reduction function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Mean,
    Sum,
    Median,
}

/// Unit of a reduced value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaUnit {
    /// Mean concentration in 0..1.
    Fraction,
    /// Mean concentration in percent.
    Percent,
    /// Area in km².
    Total,
}

/// A parsed `kind:function:unit` area statistic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaStatistic {
    spec: String,
    stage: StatisticStage,
    reduction: Reduction,
    unit: AreaUnit,
}

/// Reduced fields together with the mask they were reduced over.
#[derive(Debug, Clone)]
pub struct AreaReduction {
    /// One reduced field per input field, in order.
    pub fields: Vec<Field>,
    /// The region-restricted mask, named `lsm`.
    pub mask: Field,
}

impl AreaStatistic {
    /// Parse `kind[:function[:unit]]`. Function defaults to `mean` and unit
    /// to `fraction`; `sum` of a fraction is reported as `total`.
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::InvalidStatistic`] for unknown tokens.
    pub fn parse(spec: &str) -> Result<Self, AreaError> {
        let invalid = |reason: String| AreaError::InvalidStatistic {
            value: spec.to_string(),
            reason,
        };
        let mut parts = spec.split(':');
        let stage = match parts.next() {
            Some("data") => StatisticStage::Data,
            Some("score") => StatisticStage::Score,
            other => return Err(invalid(format!("unknown kind '{}'", other.unwrap_or_default()))),
        };
        let reduction = match parts.next().unwrap_or("mean") {
            "mean" => Reduction::Mean,
            "sum" => Reduction::Sum,
            "median" => Reduction::Median,
            other => return Err(invalid(format!("unknown function '{other}'"))),
        };
        let unit = match parts.next().unwrap_or("fraction") {
            "fraction" if reduction == Reduction::Sum => AreaUnit::Total,
            "fraction" => AreaUnit::Fraction,
            "percent" => AreaUnit::Percent,
            "total" => AreaUnit::Total,
            other => return Err(invalid(format!("unknown unit '{other}'"))),
        };
        if let Some(extra) = parts.next() {
            return Err(invalid(format!("unexpected token '{extra}'")));
        }
        Ok(Self {
            spec: spec.to_string(),
            stage,
            reduction,
            unit,
        })
    }

    /// Sum over the whole area in km², the reduction used for IIEE and SPS.
    pub fn area_sum(stage: StatisticStage) -> Self {
        let kind = match stage {
            StatisticStage::Data => "data",
            StatisticStage::Score => "score",
        };
        Self {
            spec: format!("{kind}:sum"),
            stage,
            reduction: Reduction::Sum,
            unit: AreaUnit::Total,
        }
    }

    /// Data or score stage.
    pub fn stage(&self) -> StatisticStage {
        self.stage
    }

    /// Reduction function.
    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    /// Output unit.
    pub fn unit(&self) -> AreaUnit {
        self.unit
    }

    /// Reduce every field over the cells of `mask` restricted to `region`.
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::Io`] for unevenly spaced grids or fields that do
    /// not match the mask, and region errors from [`Region::restrict`].
    pub fn apply(&self, fields: &[Field], mask: &Mask, region: &Region) -> Result<AreaReduction, AreaError> {
        let region_mask = region.restrict(mask)?;
        let grid = region_mask
            .grid()
            .or_else(|| fields.iter().find_map(|f| f.grid()))
            .ok_or_else(|| AreaError::MissingCoordinates {
                field: fields.first().map(|f| f.name().to_string()).unwrap_or_default(),
                what: "grid".to_string(),
            })?;
        let cell_area = grid.cell_area_km2()?;
        info!(statistic = %self, cells = region_mask.count(), cell_area, "computing area statistic");

        let reduced = fields
            .iter()
            .map(|f| {
                let masked = region_mask.apply(f)?;
                let out = masked.spatial_reduce(|cells| self.reduce_cells(cells, cell_area))?;
                debug!(field = %f.name(), "reduced over area");
                Ok(out)
            })
            .collect::<Result<Vec<_>, AreaError>>()?;

        Ok(AreaReduction {
            fields: reduced,
            mask: region_mask.to_field(REGION_MASK_NAME)?,
        })
    }

    fn reduce_cells(&self, cells: &[f64], cell_area: f64) -> f64 {
        match self.reduction {
            Reduction::Mean => {
                let mean = nanmean(cells);
                match self.unit {
                    AreaUnit::Fraction => mean,
                    AreaUnit::Percent => mean * 100.0,
                    AreaUnit::Total => mean * finite(cells).len() as f64 * cell_area,
                }
            }
            Reduction::Sum => nansum(cells) * cell_area,
            Reduction::Median => nanmedian(cells),
        }
    }
}

impl fmt::Display for AreaStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}
