use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::error::ScorerError;

/// Ordered pass/fail values for one task, one per attempted candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskResultSet {
    outcomes: Vec<bool>,
}

impl TaskResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, passed: bool) {
        self.outcomes.push(passed);
    }

    /// Number of attempted candidates (`n`).
    pub fn attempts(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of passing candidates (`c`).
    pub fn passes(&self) -> usize {
        self.outcomes.iter().filter(|&&p| p).count()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcome of the first candidate, if any was attempted.
    pub fn first(&self) -> Option<bool> {
        self.outcomes.first().copied()
    }

    pub fn any_passed(&self) -> bool {
        self.outcomes.iter().any(|&p| p)
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.outcomes
    }
}

impl From<Vec<bool>> for TaskResultSet {
    fn from(outcomes: Vec<bool>) -> Self {
        Self { outcomes }
    }
}

impl FromIterator<bool> for TaskResultSet {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

/// Result sets of every task in a dataset, keyed by task id.
///
/// Backed by a `BTreeMap` so iteration, and therefore every floating-point
/// sum taken over it, always happens in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSets {
    tasks: BTreeMap<String, TaskResultSet>,
}

impl ResultSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every task id with zero attempts, so tasks nobody produced a
    /// candidate for still count towards `total`.
    pub fn with_tasks<I, S>(task_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tasks: task_ids
                .into_iter()
                .map(|id| (id.into(), TaskResultSet::new()))
                .collect(),
        }
    }

    /// Appends one outcome to a task, registering the task if needed.
    pub fn record(&mut self, task_id: &str, passed: bool) {
        self.tasks.entry(task_id.to_string()).or_default().push(passed);
    }

    pub fn insert(&mut self, task_id: impl Into<String>, results: TaskResultSet) {
        self.tasks.insert(task_id.into(), results);
    }

    pub fn get(&self, task_id: &str) -> Option<&TaskResultSet> {
        self.tasks.get(task_id)
    }

    /// Number of tasks, attempted or not.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskResultSet)> {
        self.tasks.iter().map(|(id, set)| (id.as_str(), set))
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<bool>)> for ResultSets {
    fn from_iter<I: IntoIterator<Item = (S, Vec<bool>)>>(iter: I) -> Self {
        Self {
            tasks: iter
                .into_iter()
                .map(|(id, outcomes)| (id.into(), TaskResultSet::from(outcomes)))
                .collect(),
        }
    }
}

/// Thread-safe sink for outcomes arriving from parallel attempts.
///
/// Outcomes are slotted by candidate index, so the finished result set keeps
/// candidate order no matter in which order attempts complete.
#[derive(Debug, Default)]
pub struct ResultCollector {
    slots: Mutex<BTreeMap<String, Vec<Option<bool>>>>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-registers tasks so they appear in the final sets even with zero attempts.
    pub fn with_tasks<I, S>(task_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: Mutex::new(
                task_ids
                    .into_iter()
                    .map(|id| (id.into(), Vec::new()))
                    .collect(),
            ),
        }
    }

    pub fn record(&self, task_id: &str, index: usize, passed: bool) -> Result<(), ScorerError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let task = slots.entry(task_id.to_string()).or_default();

        if task.len() <= index {
            task.resize(index + 1, None);
        }
        if task[index].is_some() {
            return Err(ScorerError::DuplicateCandidate {
                task_id: task_id.to_string(),
                index,
            });
        }
        task[index] = Some(passed);
        Ok(())
    }

    /// Consumes the collector. Candidate indices that were never recorded are
    /// skipped; the remaining outcomes keep their relative order.
    pub fn finish(self) -> ResultSets {
        let slots = self
            .slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        compact(slots)
    }

    /// Like [`finish`](Self::finish), without giving up the collector.
    pub fn snapshot(&self) -> ResultSets {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        compact(slots.clone())
    }
}

fn compact(slots: BTreeMap<String, Vec<Option<bool>>>) -> ResultSets {
    let mut sets = ResultSets::new();
    for (task_id, task) in slots {
        let gaps = task.iter().filter(|slot| slot.is_none()).count();
        if gaps > 0 {
            tracing::warn!("Task {} finished with {} unrecorded candidates", task_id, gaps);
        }
        sets.insert(task_id, task.into_iter().flatten().collect());
    }
    sets
}
