//! Bounded-concurrency attempt manager with an HTTP front end and a batch
//! pass@k evaluator on top.

pub mod api;
pub mod evaluation;
pub mod manager;
