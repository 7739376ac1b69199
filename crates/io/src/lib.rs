//! # icecap-io
//!
//! Gridded fields with named axes, the cache store the loader reads
//! through, region and mask rasters, and the NetCDF writer for result
//! datasets.
//!
//! ## Architecture
//!
//! ```mermaid
//! graph LR
//!     A["cache .nc"] -->|"CacheStore::read()"| B["CacheEntry (Field [time, yc, xc])"]
//!     C["nsidc_*.nc"] -->|"read_region_raster()"| D["RegionRaster"]
//!     E["mask .nc"] -->|"read_mask_raster()"| F["Array2 of bool"]
//!     G["Dataset"] -->|"write_dataset()"| H["result .nc"]
//!     H -->|"read_dataset()"| G
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use icecap_io::{CacheStore, Dim, NetcdfCache};
//!
//! let entry = NetcdfCache.read(path, Some(&dates))?;
//! let mean = entry.field.mean_over(Dim::Time);
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `field` | `Field` and `Dim`: broadcasting arithmetic and reductions |
//! | `grid` | Grid coordinates and projection metadata |
//! | `cache` | `CacheStore` trait, NetCDF and in-memory stores, file names |
//! | `region_file` | NSIDC region rasters and additional masks |
//! | `dataset` | Result datasets and global attributes |
//! | `writer` | NetCDF output |
//! | `reader` | Read result datasets back (calibration archives) |
//! | `netcdf_read` | Low-level NetCDF helpers |
//! | `error` | Error types |

mod cache;
mod dataset;
mod error;
mod field;
mod grid;
mod netcdf_read;
mod reader;
mod region_file;
mod writer;

pub use cache::{
    CacheEntry, CacheStore, MemoryCache, NetcdfCache, forecast_file_name, observation_file_name,
};
pub use dataset::{AttrValue, Dataset};
pub use error::IoError;
pub use field::{Dim, Field};
pub use grid::{Grid, Projection};
pub use reader::read_dataset;
pub use region_file::{RegionRaster, read_mask_raster, read_region_raster};
pub use writer::write_dataset;
