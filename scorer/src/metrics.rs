//! # Metrics Module
//!
//! Turns a dataset's [`ResultSets`] into the benchmark metrics object.
//! Recomputing from identical inputs yields bit-identical values and
//! byte-identical JSON.

use std::collections::{BTreeMap, BTreeSet};

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::ScorerError;
use crate::pass_at_k::estimate_pass_at_k;
use crate::result_set::ResultSets;

/// Aggregate metrics for a whole dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Fraction of attempted tasks whose first candidate passed.
    pub pass_at_1: f64,
    /// Mean unbiased pass@k over tasks with at least `k` attempts, per
    /// requested `k > 1`. `None` when no task qualifies.
    pub pass_at_k: BTreeMap<usize, Option<f64>>,
    /// Tasks with at least one passing candidate.
    pub resolved: usize,
    /// Every task in the dataset, attempted or not.
    pub total: usize,
}

impl Serialize for Metrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.pass_at_k.len()))?;
        map.serialize_entry("pass@1", &self.pass_at_1)?;
        map.serialize_entry("resolved", &self.resolved)?;
        map.serialize_entry("total", &self.total)?;
        for (k, value) in &self.pass_at_k {
            map.serialize_entry(&format!("pass@{}", k), value)?;
        }
        map.end()
    }
}

/// Computes `pass@1`, `pass@k` for every requested `k > 1`, and the
/// resolved/total counts.
///
/// Tasks without attempts count towards `total` only. Duplicate entries in
/// `ks` are collapsed and `k = 1` is always reported as `pass@1`.
///
/// # Example
///
/// ```
/// use scorer::{ResultSets, aggregate};
///
/// let sets: ResultSets = [
///     ("a", vec![true, false, false, true, false]),
///     ("b", vec![false, false, false, false, false]),
///     ("c", vec![]),
/// ]
/// .into_iter()
/// .collect();
///
/// let metrics = aggregate(&sets, &[1, 2]).unwrap();
/// assert_eq!(metrics.pass_at_1, 0.5);
/// assert_eq!(metrics.resolved, 1);
/// assert_eq!(metrics.total, 3);
/// // (0.7 + 0.0) / 2
/// assert!((metrics.pass_at_k[&2].unwrap() - 0.35).abs() < 1e-12);
/// ```
pub fn aggregate(sets: &ResultSets, ks: &[usize]) -> Result<Metrics, ScorerError> {
    if let Some(&k) = ks.iter().find(|&&k| k == 0) {
        return Err(ScorerError::InvalidK(k));
    }

    let mut first_passed = 0usize;
    let mut attempted = 0usize;
    let mut resolved = 0usize;

    for (_, set) in sets.iter() {
        if let Some(first) = set.first() {
            attempted += 1;
            if first {
                first_passed += 1;
            }
        }
        if set.any_passed() {
            resolved += 1;
        }
    }

    let pass_at_1 = if attempted > 0 {
        first_passed as f64 / attempted as f64
    } else {
        0.0
    };

    let requested: BTreeSet<usize> = ks.iter().copied().filter(|&k| k > 1).collect();
    let pass_at_k = requested
        .into_iter()
        .map(|k| (k, mean_pass_at_k(sets, k)))
        .collect();

    let metrics = Metrics {
        pass_at_1,
        pass_at_k,
        resolved,
        total: sets.len(),
    };

    tracing::debug!(
        pass_at_1 = metrics.pass_at_1,
        resolved = metrics.resolved,
        total = metrics.total,
        "Aggregated metrics"
    );

    Ok(metrics)
}

fn mean_pass_at_k(sets: &ResultSets, k: usize) -> Option<f64> {
    let mut sum = 0.0_f64;
    let mut qualifying = 0usize;

    for (_, set) in sets.iter() {
        let n = set.attempts();
        if n < k {
            continue;
        }
        sum += estimate_pass_at_k(n, set.passes(), k);
        qualifying += 1;
    }

    if qualifying > 0 {
        Some(sum / qualifying as f64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sets(entries: &[(&str, &[bool])]) -> ResultSets {
        entries
            .iter()
            .map(|(id, outcomes)| (*id, outcomes.to_vec()))
            .collect()
    }

    #[test]
    fn test_pass_at_1_uses_first_outcome_only() {
        let s = sets(&[
            ("a", &[true, false]),
            ("b", &[false, true]),
            ("c", &[false, true]),
            ("d", &[true]),
        ]);
        let m = aggregate(&s, &[1]).unwrap();
        assert_eq!(m.pass_at_1, 0.5);
        assert_eq!(m.resolved, 4);
        assert!(m.pass_at_k.is_empty());
    }

    #[test]
    fn test_zero_attempt_tasks_count_only_towards_total() {
        let mut s = ResultSets::with_tasks(["a", "b", "c"]);
        s.record("a", true);
        let m = aggregate(&s, &[1]).unwrap();
        assert_eq!(m.pass_at_1, 1.0);
        assert_eq!(m.resolved, 1);
        assert_eq!(m.total, 3);
    }

    #[test]
    fn test_no_attempts_at_all() {
        let s = ResultSets::with_tasks(["a", "b"]);
        let m = aggregate(&s, &[1, 10]).unwrap();
        assert_eq!(m.pass_at_1, 0.0);
        assert_eq!(m.pass_at_k[&10], None);
        assert_eq!(m.resolved, 0);
        assert_eq!(m.total, 2);
    }

    #[test]
    fn test_pass_at_k_only_averages_tasks_with_enough_samples() {
        let s = sets(&[
            ("a", &[false, true, false, false, true]),
            ("b", &[true]),
            ("c", &[false, false, false, false, false]),
        ]);
        let m = aggregate(&s, &[2]).unwrap();
        let value = m.pass_at_k[&2].unwrap();
        assert!((value - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_pass_at_k_null_when_nobody_qualifies() {
        let s = sets(&[("a", &[true, true])]);
        let m = aggregate(&s, &[1, 10, 100]).unwrap();
        assert_eq!(m.pass_at_k[&10], None);
        assert_eq!(m.pass_at_k[&100], None);

        let value = serde_json::to_value(&m).unwrap();
        assert!(value["pass@10"].is_null());
    }

    #[test]
    fn test_k_zero_is_rejected() {
        let s = sets(&[("a", &[true])]);
        assert_eq!(aggregate(&s, &[0, 1]), Err(ScorerError::InvalidK(0)));
    }

    #[test]
    fn test_serialized_shape_and_key_order() {
        let s = sets(&[("a", &[true, false, true]), ("b", &[false, false, false])]);
        let m = aggregate(&s, &[3, 1, 2, 2]).unwrap();

        let text = serde_json::to_string(&m).unwrap();
        assert!(text.starts_with(r#"{"pass@1":0.5,"resolved":1,"total":2,"pass@2":"#));
        let p2 = text.find("\"pass@2\"").unwrap();
        let p3 = text.find("\"pass@3\"").unwrap();
        assert!(p2 < p3);

        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["pass@3"], json!(0.5));
        assert!(value.get("pass@1").is_some());
        assert_eq!(value.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_recomputation_is_byte_identical() {
        let s: ResultSets = (0..200)
            .map(|t| {
                let outcomes: Vec<bool> = (0..20).map(|i| (t * 7 + i * 3) % 5 == 0).collect();
                (format!("task/{}", t), outcomes)
            })
            .collect();

        let first = serde_json::to_string(&aggregate(&s, &[1, 5, 10]).unwrap()).unwrap();
        let second = serde_json::to_string(&aggregate(&s.clone(), &[10, 5, 1]).unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
