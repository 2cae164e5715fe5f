use std::time::Duration;

/// Wall-clock time in milliseconds.
pub type Millis = f64;

/// Arithmetic mean of `samples` in milliseconds, or `None` without samples.
pub fn mean(samples: &[Duration]) -> Option<Millis> {
  if samples.is_empty() {
    return None;
  }

  let total: Duration = samples.iter().sum();

  Some(total.as_nanos() as f64 / 1_000_000.0 / samples.len() as f64)
}

/// How many times faster the optimized build ran. Undefined unless the
/// optimized mean is strictly positive.
pub fn speedup(optimized: Millis, unoptimized: Millis) -> Option<f64> {
  (optimized > 0.0).then(|| unoptimized / optimized)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mean_of_constant_samples_is_exact() {
    let samples = vec![Duration::from_millis(12); 100];

    assert_eq!(mean(&samples), Some(12.0));
  }

  #[test]
  fn mean_keeps_sub_millisecond_precision() {
    let samples = [Duration::from_micros(500), Duration::from_micros(1500)];

    assert_eq!(mean(&samples), Some(1.0));
  }

  #[test]
  fn mean_is_positive_for_positive_samples() {
    let samples = [Duration::from_nanos(1), Duration::from_nanos(3)];

    assert!(mean(&samples).unwrap() > 0.0);
  }

  #[test]
  fn mean_of_nothing_is_none() {
    assert_eq!(mean(&[]), None);
  }

  #[test]
  fn speedup_is_unoptimized_over_optimized() {
    assert_eq!(speedup(6.0, 12.0), Some(2.0));
    assert_eq!(speedup(4.0, 1.0), Some(0.25));

    for (optimized, unoptimized) in [(0.37, 11.2), (3.3, 3.3), (1e-3, 7.0)] {
      assert_eq!(speedup(optimized, unoptimized), Some(unoptimized / optimized));
    }
  }

  #[test]
  fn speedup_undefined_for_zero_duration() {
    assert_eq!(speedup(0.0, 12.0), None);
  }
}
