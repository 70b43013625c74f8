//! Reference tables the engine reads on every evaluation, and the handle that
//! lets a process swap them without disturbing in-flight evaluations.

use std::sync::{Arc, RwLock};
use tracing::info;

use crate::{
    classifier::CnaeTable,
    error::EngineError,
    model::ExpectedLocationType::{self, *},
    scorers::WeightedScorer,
};

/// Class prefixes of the built-in CNAE mapping. Later entries win on
/// repeated prefixes, which is how the home-office reclassifications of
/// 6201, 6204, 7020, 7319, 7410 and 7420 take effect.
pub const DEFAULT_CNAE_ENTRIES: &[(&str, ExpectedLocationType)] = &[
    // section defaults, overridden by any class entry below
    ("10", Industrial),
    ("47", Commercial),
    ("62", Office),
    // retail
    ("4711", Commercial),
    ("4719", Commercial),
    ("4721", Commercial),
    ("4731", Commercial),
    ("4741", Commercial),
    ("4751", Commercial),
    ("4761", Commercial),
    ("4771", Commercial),
    ("4781", Commercial),
    // IT, consulting, engineering
    ("6201", Office),
    ("6202", Office),
    ("6203", Office),
    ("6204", Office),
    ("6209", Office),
    ("6311", Office),
    ("6319", Office),
    ("7020", Office),
    ("7111", Office),
    ("7112", Office),
    ("7210", Office),
    ("7319", Office),
    ("7410", Office),
    ("7420", Office),
    ("7490", Office),
    // food manufacturing
    ("1011", Industrial),
    ("1012", Industrial),
    ("1020", Industrial),
    ("1031", Industrial),
    ("1041", Industrial),
    ("1051", Industrial),
    ("1061", Industrial),
    ("1071", Industrial),
    ("1081", Industrial),
    ("1091", Industrial),
    // metal, electrical, machinery and vehicles
    ("2511", Industrial),
    ("2521", Industrial),
    ("2539", Industrial),
    ("2591", Industrial),
    ("2599", Industrial),
    ("2610", Industrial),
    ("2621", Industrial),
    ("2631", Industrial),
    ("2640", Industrial),
    ("2711", Industrial),
    ("2721", Industrial),
    ("2731", Industrial),
    ("2740", Industrial),
    ("2751", Industrial),
    ("2790", Industrial),
    ("2811", Industrial),
    ("2821", Industrial),
    ("2829", Industrial),
    ("2910", Industrial),
    ("2920", Industrial),
    ("2930", Industrial),
    ("3011", Industrial),
    ("3012", Industrial),
    ("3021", Industrial),
    ("3031", Industrial),
    ("3032", Industrial),
    ("3091", Industrial),
    ("3092", Industrial),
    ("3099", Industrial),
    // logistics
    ("5211", Industrial),
    ("5221", Industrial),
    ("5222", Industrial),
    ("5223", Industrial),
    ("5224", Industrial),
    ("5229", Industrial),
    // construction
    ("4110", Industrial),
    ("4211", Industrial),
    ("4212", Industrial),
    ("4213", Industrial),
    ("4221", Industrial),
    ("4222", Industrial),
    ("4223", Industrial),
    ("4291", Industrial),
    ("4299", Industrial),
    // activities that can run from home
    ("4791", HomeOfficeOk),
    ("4799", HomeOfficeOk),
    ("6201", HomeOfficeOk),
    ("6204", HomeOfficeOk),
    ("7020", HomeOfficeOk),
    ("7319", HomeOfficeOk),
    ("7410", HomeOfficeOk),
    ("7420", HomeOfficeOk),
];

pub fn default_cnae_table() -> Result<CnaeTable, EngineError> {
    CnaeTable::new(DEFAULT_CNAE_ENTRIES.iter().copied())
}

/// Immutable snapshot of everything table-driven: CNAE mapping, weights, thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskTables {
    pub cnae: CnaeTable,
    pub scorer: WeightedScorer,
}

impl RiskTables {
    pub fn new(cnae: CnaeTable, scorer: WeightedScorer) -> Self {
        Self { cnae, scorer }
    }

    pub fn with_defaults() -> Result<Self, EngineError> {
        Ok(Self::new(default_cnae_table()?, WeightedScorer::default()))
    }
}

/// Shared pointer to the current tables. Readers clone the `Arc`; `replace`
/// swaps the pointer and never mutates a published table.
#[derive(Debug)]
pub struct TableHandle {
    current: RwLock<Arc<RiskTables>>,
}

impl TableHandle {
    pub fn new(tables: RiskTables) -> Self {
        Self {
            current: RwLock::new(Arc::new(tables)),
        }
    }

    pub fn snapshot(&self) -> Arc<RiskTables> {
        // A poisoned lock still guards a fully-published Arc.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Publishes `tables` and returns the ones it replaced.
    pub fn replace(&self, tables: RiskTables) -> Arc<RiskTables> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let previous = std::mem::replace(&mut *guard, Arc::new(tables));
        info!(cnae_entries = guard.cnae.len(), "Risk tables replaced");
        previous
    }
}

impl From<RiskTables> for TableHandle {
    fn from(tables: RiskTables) -> Self {
        Self::new(tables)
    }
}
