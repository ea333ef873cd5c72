//! # Scorer
//!
//! Reduces per-task pass/fail sequences into benchmark metrics: `pass@1`, the
//! unbiased `pass@k` estimate for any requested `k`, and the resolved/total
//! task counts.
//!
//! ## Key Concepts
//! - **TaskResultSet**: ordered pass/fail values for one task, one per candidate.
//! - **ResultSets**: every task of a dataset, including those never attempted.
//! - **ResultCollector**: thread-safe sink filled while attempts run in parallel.
//! - **Metrics**: pure function of the result sets; serialises deterministically.

pub mod error;
pub mod metrics;
pub mod pass_at_k;
pub mod result_set;

pub use crate::error::ScorerError;
pub use crate::metrics::{Metrics, aggregate};
pub use crate::pass_at_k::estimate_pass_at_k;
pub use crate::result_set::{ResultCollector, ResultSets, TaskResultSet};
