//! # icecap-edge
//!
//! Ice-edge detection and the derived diagnostics: extended edge regions,
//! freeze-up and break-up dates, and distances from target points to the
//! ice edge.
//!
//! ## Architecture
//!
//! ```mermaid
//! graph LR
//!     A["concentration Field"] -->|"> 0.15"| B["ice grid"]
//!     B --> C["detect_edge()"]
//!     C --> D["extend_edge()"]
//!     D --> E["extended_edge()"]
//!     B -->|"remove_small_clusters()"| B
//!     C --> F["EdgeDistance::compute()"]
//!     P["MapProjection"] --> F
//!     A -->|"thresholded series"| G["phenology_dates()"]
//!     G --> H["PhenologyField"]
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use icecap_edge::{EdgeDistance, PhenologyKind, phenology_dates};
//!
//! let distance = EdgeDistance::new(vec![(-20.0, 75.0)]).compute(&sic)?;
//! let freeze = phenology_dates(&ice, PhenologyKind::FreezeUp)?;
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `edge` | 4-neighbour edge and disk dilation |
//! | `cluster` | Removal of small 4-connected ice patches |
//! | `phenology` | Freeze-up and break-up dates |
//! | `projection` | Forward map projections on a sphere |
//! | `distance` | Point-to-edge distances |
//! | `error` | Error types |

mod cluster;
mod distance;
mod edge;
mod error;
mod phenology;
mod projection;

pub use cluster::remove_small_clusters;
pub use distance::{EdgeDistance, ICE_THRESHOLD};
pub use edge::{EDGE_EXTENT_KM, detect_edge, extend_edge, extended_edge, extent_in_cells};
pub use error::EdgeError;
pub use phenology::{
    BREAK_UP_WINDOW, PhenologyDate, PhenologyField, PhenologyKind, break_up, freeze_up, phenology_dates,
};
pub use projection::{EARTH_RADIUS_M, MapProjection};
