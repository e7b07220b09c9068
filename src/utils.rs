/// Stable log-domain addition: `log(exp(a) + exp(b))` without leaving the
/// log domain. `f64::NEG_INFINITY` is the additive identity (log of zero).
///
/// ```
/// let sum = coppice::utils::logaddexp(0.5f64.ln(), 0.25f64.ln());
/// assert!((sum - 0.75f64.ln()).abs() < 1e-12);
///
/// assert_eq!(coppice::utils::logaddexp(f64::NEG_INFINITY, -1.0), -1.0);
/// ```
pub fn logaddexp(a: f64, b: f64) -> f64 {
  if a == f64::NEG_INFINITY {
    return b;
  }
  if b == f64::NEG_INFINITY {
    return a;
  }
  let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
  hi + (lo - hi).exp().ln_1p()
}

/// Log-density of the Beta(a, b) distribution at `x`.
pub fn ln_beta_pdf(x: f64, a: f64, b: f64) -> f64 {
  assert!(
    0.0 < x && x < 1.0,
    "the Beta density is supported on (0, 1), got {}",
    x
  );
  let ln_beta_fn = libm::lgamma(a) + libm::lgamma(b) - libm::lgamma(a + b);
  (a - 1.0) * x.ln() + (b - 1.0) * (-x).ln_1p() - ln_beta_fn
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn logaddexp_is_symmetric_and_stable() {
    let a = 0.1f64.ln();
    let b = 0.000001f64.ln();
    assert!((logaddexp(a, b) - logaddexp(b, a)).abs() < 1e-15);
    assert!((logaddexp(a, b) - 0.100001f64.ln()).abs() < 1e-12);

    // very large magnitudes must not overflow
    let big = logaddexp(1000.0, 1000.0);
    assert!((big - (1000.0 + 2f64.ln())).abs() < 1e-9);
  }

  #[test]
  fn logaddexp_neg_infinity_identity() {
    assert_eq!(logaddexp(f64::NEG_INFINITY, f64::NEG_INFINITY), f64::NEG_INFINITY);
    assert_eq!(logaddexp(f64::NEG_INFINITY, 0.5), 0.5);
    assert_eq!(logaddexp(0.5, f64::NEG_INFINITY), 0.5);
  }

  #[test]
  fn beta_log_density_known_values() {
    // Beta(1, 1) is the uniform distribution: density 1 everywhere
    assert!(ln_beta_pdf(0.3, 1.0, 1.0).abs() < 1e-12);
    // Beta(2, 1) has density 2x
    assert!((ln_beta_pdf(0.5, 2.0, 1.0) - 1.0f64.ln()).abs() < 1e-12);
    assert!((ln_beta_pdf(0.25, 2.0, 1.0) - 0.5f64.ln()).abs() < 1e-12);
  }

  #[test]
  #[should_panic(expected = "supported on (0, 1)")]
  fn beta_log_density_rejects_zero() {
    ln_beta_pdf(0.0, 0.1, 1.0);
  }
}
