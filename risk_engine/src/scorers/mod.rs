pub mod weighted;

pub use weighted::*;

use crate::model::{FlagSet, RiskAssessment};

pub trait Scorer: Send + Sync {
    /// Total function over flag sets; the result depends only on which flags are present.
    fn score(&self, flags: &FlagSet) -> RiskAssessment;
}
