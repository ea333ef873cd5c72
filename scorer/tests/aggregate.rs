use scorer::{ResultCollector, aggregate, estimate_pass_at_k};
use serde_json::json;

#[test]
fn test_worked_examples() {
    assert!((estimate_pass_at_k(5, 2, 2) - 0.7).abs() < 1e-12);
    assert_eq!(estimate_pass_at_k(5, 0, 2), 0.0);
    assert_eq!(estimate_pass_at_k(5, 5, 2), 1.0);
}

#[test]
fn test_collector_to_metrics_json() {
    let collector = ResultCollector::with_tasks(["HumanEval/0", "HumanEval/1", "HumanEval/2"]);

    // Candidates complete out of order; the first candidate of HumanEval/0 fails.
    for (index, passed) in [(4, false), (1, true), (0, false), (3, true), (2, false)] {
        collector.record("HumanEval/0", index, passed).unwrap();
    }
    for index in 0..5 {
        collector.record("HumanEval/1", index, false).unwrap();
    }

    let sets = collector.finish();
    let metrics = aggregate(&sets, &[1, 2, 10]).unwrap();

    assert_eq!(metrics.total, 3);
    assert_eq!(metrics.resolved, 1);
    assert_eq!(metrics.pass_at_1, 0.0);

    let value = serde_json::to_value(&metrics).unwrap();
    assert_eq!(value["pass@1"], json!(0.0));
    assert_eq!(value["resolved"], json!(1));
    assert_eq!(value["total"], json!(3));
    assert!((value["pass@2"].as_f64().unwrap() - 0.35).abs() < 1e-12);
    assert!(value["pass@10"].is_null());
}
