//! # icecap-area
//!
//! Validity masks shared by forecast and observation, region selection, and
//! spatial reductions of masked fields.
//!
//! ## Architecture
//!
//! ```mermaid
//! graph LR
//!     A["forecast Field"] --> C["build_mask()"]
//!     B["observation Field"] --> C
//!     X["additional mask"] -.-> C
//!     C --> D["Mask"]
//!     D -->|"mask_fields_checked()"| E["masked Fields"]
//!     D -->|"Region::restrict()"| F["region Mask (lsm)"]
//!     E --> G["AreaStatistic::apply()"]
//!     F --> G
//!     G --> H["AreaReduction"]
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use icecap_area::{AreaStatistic, Region, build_mask, mask_fields_checked};
//!
//! let mask = build_mask(&fc, &obs, None)?;
//! let masked = mask_fields_checked(&mask, &[fc, obs])?;
//! let stat = AreaStatistic::parse("data:mean:percent")?;
//! let reduced = stat.apply(&masked, &mask, &Region::Everywhere)?;
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `mask` | Combined validity mask and masking |
//! | `region` | Longitude/latitude boxes and NSIDC regions |
//! | `statistic` | `kind:function:unit` area statistics |
//! | `error` | Error types |

mod error;
mod mask;
mod region;
mod statistic;

pub use error::AreaError;
pub use mask::{Mask, build_mask, mask_fields, mask_fields_checked, representative_slice, valid_cells};
pub use region::{BoundingBox, Region, nsidc_raster_path};
pub use statistic::{
    AreaReduction, AreaStatistic, AreaUnit, REGION_MASK_NAME, Reduction, StatisticStage,
};
