pub mod analyzer;
pub mod classifier;
pub mod error;
pub mod executable_utils;
pub mod model;
pub mod processor;
pub mod queue;
pub mod rules;
pub mod scorers;
pub mod tables;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
