//! Unbiased pass@k estimator (Chen et al., 2021).

/// Probability that at least one of `k` candidates drawn without replacement
/// from `n` samples, `c` of which pass, is a passing one.
///
/// Formula: `1 - C(n - c, k) / C(n, k)`, evaluated as the running product
/// `prod_{i=0..k} (n - c - i) / (n - i)` so no binomial coefficient is ever
/// materialised. The factors are always multiplied in the same order, which
/// keeps the result bit-for-bit reproducible.
///
/// Callers guarantee `c <= n` and `1 <= k <= n`.
///
/// # Example
///
/// ```
/// use scorer::pass_at_k::estimate_pass_at_k;
///
/// // 1 - C(3, 2) / C(5, 2) = 1 - 3 / 10
/// assert!((estimate_pass_at_k(5, 2, 2) - 0.7).abs() < 1e-12);
/// assert_eq!(estimate_pass_at_k(5, 0, 2), 0.0);
/// assert_eq!(estimate_pass_at_k(5, 5, 2), 1.0);
/// ```
pub fn estimate_pass_at_k(n: usize, c: usize, k: usize) -> f64 {
    debug_assert!(c <= n, "more passes ({}) than samples ({})", c, n);
    debug_assert!(k >= 1 && k <= n, "k = {} outside 1..={}", k, n);

    let failures = n.saturating_sub(c);
    if failures < k {
        return 1.0;
    }

    let all_fail = (0..k).fold(1.0_f64, |acc, i| {
        acc * (failures - i) as f64 / (n - i) as f64
    });
    1.0 - all_fail
}
