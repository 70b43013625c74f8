//! Shared test helpers for cross-crate use
//!
//! Used by the `risk_engine` and `address_risk` test suites as well as this
//! crate's own unit tests.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// Global counter for unique test identifiers across parallel tests
static GLOBAL_TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate identifiers that won't conflict across parallel tests
///
/// Format: "{prefix}-{timestamp}-{counter}"
pub fn generate_unique_id(prefix: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let counter = GLOBAL_TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}-{}", prefix, timestamp, counter)
}

/// Write `contents` to `<tmp>/<dir_name>/<file_name>`, creating the directory.
///
/// Panics on I/O failure; only meant for test setup.
pub fn write_temp_file(dir_name: &str, file_name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(dir_name);
    fs::create_dir_all(&dir).expect("create temp test directory");
    let path = dir.join(file_name);
    fs::write(&path, contents).expect("write temp test file");
    path
}

/// Unified error type for test failures that should not panic mid-setup
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error("Assertion failed: {message}")]
    AssertionFailure { message: String },

    #[error("Generic test error: {message}")]
    Generic { message: String },
}

impl TestError {
    pub fn assertion_failure(message: impl Into<String>) -> Self {
        Self::AssertionFailure {
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }
}

/// Alias for the standard test result type
pub type TestResult<T = ()> = Result<T, TestError>;

/// Assertion that returns TestError instead of panicking
#[macro_export]
macro_rules! test_assert {
    ($condition:expr) => {
        if !($condition) {
            return Err($crate::test_helpers::TestError::assertion_failure(
                format!("assertion failed: {}", stringify!($condition))
            ));
        }
    };
    ($condition:expr, $message:expr $(, $arg:expr)*) => {
        if !($condition) {
            return Err($crate::test_helpers::TestError::assertion_failure(
                format!($message $(, $arg)*)
            ));
        }
    };
}

/// Equality assertion that returns TestError instead of panicking
#[macro_export]
macro_rules! test_assert_eq {
    ($left:expr, $right:expr) => {
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    return Err($crate::test_helpers::TestError::assertion_failure(
                        format!("assertion failed: `(left == right)`\n  left: `{:?}`,\n right: `{:?}`",
                                left_val, right_val)
                    ));
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_unique_id() {
        let mut ids = HashSet::new();
        for i in 0..1000 {
            let id = generate_unique_id(&format!("TEST-{}", i % 3));
            assert!(ids.insert(id.clone()), "Duplicate ID generated: {}", id);
        }
    }

    #[test]
    fn test_write_temp_file_round_trips_contents() {
        let dir = generate_unique_id("helpers");
        let path = write_temp_file(&dir, "a.txt", "hello");
        assert_eq!(fs::read_to_string(path).unwrap(), "hello");
    }

    fn checked(value: i32) -> TestResult {
        crate::test_assert!(value > 0, "value {} must be positive", value);
        crate::test_assert_eq!(value % 2, 0);
        Ok(())
    }

    #[test]
    fn test_assert_macros_return_errors() {
        assert!(checked(4).is_ok());
        assert!(matches!(checked(-2), Err(TestError::AssertionFailure { .. })));
        assert!(matches!(checked(3), Err(TestError::AssertionFailure { .. })));
    }
}
