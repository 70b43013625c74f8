use thiserror::Error;

/// Validation and plumbing failures of the engine.
///
/// Rule evaluation and scoring never fail; every variant here is either a
/// rejected input, a rejected table/config, or a queue/sink problem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("activity list is empty: the principal activity is mandatory")]
    EmptyActivityList,

    #[error("malformed activity code '{code}'")]
    MalformedActivityCode { code: String },

    #[error("unknown auxiliary signal '{name}'")]
    UnknownAuxiliarySignal { name: String },

    #[error("unknown risk flag '{name}'")]
    UnknownRiskFlag { name: String },

    #[error("unknown location type '{name}'")]
    UnknownLocationType { name: String },

    #[error("unknown expectation scope '{name}'")]
    UnknownExpectationScope { name: String },

    #[error("invalid CNAE prefix '{prefix}': expected 2 to 5 digits")]
    InvalidCnaePrefix { prefix: String },

    #[error("weight {weight} for {flag} is outside [-100, 100]")]
    WeightOutOfRange { flag: String, weight: i32 },

    #[error("invalid tier thresholds: expected 0 < medium < high <= 100, got medium={medium} high={high}")]
    InvalidThresholds { high: i32, medium: i32 },

    #[error("queue error: {0}")]
    Queue(String),

    #[error("sink error: {0}")]
    Sink(String),

    #[error("worker failed: {0}")]
    Worker(String),
}
