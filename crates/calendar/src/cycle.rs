//! Model cycle (version) lookup.
//!
//! Forecasts are cached under a directory named by the model cycle that
//! produced them. The cycle is a step function of the start date: each table
//! entry is valid from its start date until the next entry begins.

use chrono::NaiveDate;

/// Cycle name used when no table applies.
pub const LATEST_CYCLE: &str = "latest";

/// IFS operational cycles and the dates they went live.
const IFS_CYCLES: &[(&str, (i32, u32, u32))] = &[
    ("pre41r1", (1975, 1, 1)),
    ("41r1", (2015, 5, 12)),
    ("41r2", (2016, 3, 8)),
    ("43r1", (2016, 11, 22)),
    ("43r3", (2017, 7, 11)),
    ("45r1", (2018, 6, 5)),
    ("46r1", (2019, 6, 11)),
    ("47r1", (2020, 6, 30)),
    ("47r2", (2021, 5, 11)),
    ("47r3", (2021, 10, 12)),
    ("48r1", (2023, 6, 27)),
];

const BABJ: &[(&str, (i32, u32, u32))] = &[("v1", (2014, 1, 1)), ("v2", (2019, 11, 11))];

const ISAC: &[(&str, (i32, u32, u32))] = &[("v1", (2015, 3, 26)), ("v2", (2017, 6, 8))];

const LFPW_HC: &[(&str, (i32, u32, u32))] = &[("v1", (2014, 12, 1)), ("v2", (2019, 7, 1))];

const LFPW_FC: &[(&str, (i32, u32, u32))] = &[("v1", (2016, 3, 1)), ("v2", (2020, 10, 22))];

const CWAO: &[(&str, (i32, u32, u32))] = &[
    ("v1", (2016, 1, 7)),
    ("v2", (2018, 9, 20)),
    ("v3", (2019, 7, 4)),
    ("v4", (2021, 12, 2)),
];

const RUMS: &[(&str, (i32, u32, u32))] = &[
    ("v1", (2015, 1, 7)),
    ("v2", (2017, 6, 8)),
    ("v3", (2021, 1, 7)),
    ("v4", (2022, 9, 15)),
];

const RJTD_HC: &[(&str, (i32, u32, u32))] = &[
    ("v1", (2014, 3, 4)),
    ("v2", (2017, 1, 31)),
    ("v3", (2020, 3, 31)),
    ("v4", (2021, 3, 31)),
    ("v5", (2022, 3, 31)),
    ("v6", (2022, 9, 30)),
];

const RJTD_FC: &[(&str, (i32, u32, u32))] = &[
    ("v1", (2015, 1, 6)),
    ("v2", (2017, 3, 22)),
    ("v3", (2020, 3, 24)),
    ("v4", (2021, 3, 30)),
    ("v5", (2022, 3, 15)),
    ("v6", (2023, 2, 19)),
];

const RKSL: &[(&str, (i32, u32, u32))] = &[
    ("v1", (2016, 11, 1)),
    ("v2", (2020, 9, 1)),
    ("v3", (2022, 2, 22)),
    ("v4", (2023, 6, 1)),
];

const EGRR: &[(&str, (i32, u32, u32))] = &[
    ("v1", (2015, 12, 1)),
    ("v2", (2016, 1, 1)),
    ("v3", (2016, 4, 17)),
    ("v4", (2017, 3, 25)),
    ("v5", (2018, 9, 1)),
    ("v6", (2019, 4, 3)),
    ("v7", (2021, 2, 2)),
];

/// Identifies a forecasting system for cycle lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CycleQuery {
    /// Data provider, e.g. `ecmwf`.
    pub source: String,
    /// Forecast system, e.g. `extended-range`, `medium-range` or `s2s`.
    pub fcsystem: String,
    /// Experiment identifier; `0001` is the operational suite.
    pub expname: String,
    /// S2S centre code such as `ecmf` or `rjtd`.
    pub modelname: Option<String>,
    /// `fc` (forecast) or `hc` (hindcast).
    pub mode: String,
}

impl CycleQuery {
    fn table(&self) -> Option<&'static [(&'static str, (i32, u32, u32))]> {
        if self.source != "ecmwf" {
            return None;
        }
        let model = self.modelname.as_deref().unwrap_or("");
        let operational = matches!(self.fcsystem.as_str(), "extended-range" | "medium-range")
            && self.expname == "0001";
        if operational || (self.fcsystem == "s2s" && model == "ecmf") {
            return Some(IFS_CYCLES);
        }
        if self.fcsystem != "s2s" {
            return None;
        }
        let hindcast = self.mode == "hc";
        match model {
            "babj" => Some(BABJ),
            "isac" => Some(ISAC),
            "lfpw" if hindcast => Some(LFPW_HC),
            "lfpw" => Some(LFPW_FC),
            "cwao" => Some(CWAO),
            "rums" => Some(RUMS),
            "rjtd" if hindcast => Some(RJTD_HC),
            "rjtd" => Some(RJTD_FC),
            "rksl" => Some(RKSL),
            "egrr" => Some(EGRR),
            _ => None,
        }
    }
}

/// Model cycle valid on `date` for the system described by `query`.
///
/// Dates before the first table entry and systems without a table resolve
/// to [`LATEST_CYCLE`].
pub fn model_cycle(query: &CycleQuery, date: NaiveDate) -> String {
    let Some(table) = query.table() else {
        return LATEST_CYCLE.to_string();
    };
    table
        .iter()
        .rev()
        .find(|(_, (y, m, d))| {
            NaiveDate::from_ymd_opt(*y, *m, *d).is_some_and(|start| date >= start)
        })
        .map_or_else(|| LATEST_CYCLE.to_string(), |(name, _)| (*name).to_string())
}
