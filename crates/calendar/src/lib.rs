//! # icecap-calendar
//!
//! Gregorian date handling for forecast verification: start-date selections,
//! lead-time targets and model-cycle lookup.
//!
//! ## Architecture
//!
//! ```mermaid
//! graph LR
//!     A["date string"] -->|"expand_date_list()"| B["Vec of YYYYMMDD / MMDD"]
//!     B -->|"DateSelection::parse()"| C["DateSelection"]
//!     C -->|".sets()"| D["(label, start dates)"]
//!     E["i:a,b / r:a,b"] -->|"LeadTimeSpec::parse()"| F["day offsets"]
//!     D -->|"model_cycle()"| G["cycle name"]
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use icecap_calendar::{DateSelection, LeadTimeSpec};
//!
//! let sel = DateSelection::parse("0101,0201", &[2000], &[2010])?;
//! for (label, dates) in sel.sets() {
//!     println!("{label}: {} start dates", dates.len());
//! }
//!
//! let target = LeadTimeSpec::parse("r:0,30")?;
//! assert_eq!(target.offsets().len(), 30);
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `date` | `YYYYMMDD`/`MMDD` parsing and month lengths |
//! | `selection` | Start-date selections and the range syntax |
//! | `target` | Lead-time target specifications |
//! | `cycle` | Model cycle tables |
//! | `error` | Error types |

mod cycle;
mod date;
mod error;
mod selection;
mod target;

pub use cycle::{CycleQuery, LATEST_CYCLE, model_cycle};
pub use date::{days_in_month, format_date, is_leap_day, parse_date, parse_month_day};
pub use error::CalendarError;
pub use selection::{DateSelection, POOLED_LABEL, RecurringDate, expand_date_list};
pub use target::{LeadTimeSpec, TargetKind};
