//! Standard normal quantile

/// Standard normal quantile (inverse CDF).
///
/// Rational approximation from Abramowitz and Stegun (26.2.23), absolute
/// error below 4.5e-4. Returns the infinities at the closed ends of `[0, 1]`.
pub fn normal_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let p = p.clamp(1e-10, 1.0 - 1e-10);

    let sign = if p < 0.5 { -1.0 } else { 1.0 };
    let tail = if p < 0.5 { p } else { 1.0 - p };

    let t = (-2.0 * tail.ln()).sqrt();

    let c0 = 2.515517;
    let c1 = 0.802853;
    let c2 = 0.010328;
    let d1 = 1.432788;
    let d2 = 0.189269;
    let d3 = 0.001308;

    let x = t - (c0 + c1 * t + c2 * t * t) / (1.0 + d1 * t + d2 * t * t + d3 * t * t * t);

    sign * x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_quantiles() {
        assert!(normal_quantile(0.5).abs() < 1e-3);
        assert!((normal_quantile(0.975) - 1.959964).abs() < 1e-3);
        assert!((normal_quantile(0.99) - 2.326348).abs() < 1e-3);
        assert!((normal_quantile(0.025) + 1.959964).abs() < 1e-3);
    }

    #[test]
    fn test_symmetry() {
        for p in [0.001, 0.01, 0.1, 0.3] {
            assert!((normal_quantile(p) + normal_quantile(1.0 - p)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_closed_ends() {
        assert_eq!(normal_quantile(0.0), f64::NEG_INFINITY);
        assert_eq!(normal_quantile(1.0), f64::INFINITY);
    }
}
