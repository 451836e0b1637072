//! Ready-made combine functions.

/// Summing combine functions for `combine_by`.
pub mod sums {
  /// Sums `i64` values.
  pub fn of_i64s() -> impl Fn(i64, i64) -> i64 + Send + Sync + Clone + 'static {
    |a, b| a + b
  }

  /// Sums `u64` values.
  pub fn of_u64s() -> impl Fn(u64, u64) -> u64 + Send + Sync + Clone + 'static {
    |a, b| a + b
  }

  /// Sums `f64` values.
  pub fn of_f64s() -> impl Fn(f64, f64) -> f64 + Send + Sync + Clone + 'static {
    |a, b| a + b
  }
}
