//! Shared test utilities for the bbox-load workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Workspace and scenario path helpers
//! - Temporary directories for run logs
//! - Canned query-service response bodies
//! - In-memory and failing writers for exercising the result sink
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../../crates/test-utils" }
//! ```

pub mod fixtures;
pub mod paths;
pub mod writers;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use paths::*;
pub use writers::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64);
    }

    #[test]
    #[should_panic(expected = "left ≈ right")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1_f64, 1.0_f64, 0.001_f64);
    }
}
