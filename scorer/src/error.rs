/// Represents all error types that can occur while scoring.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScorerError {
    /// `k` must be a positive integer.
    #[error("pass@k requires k >= 1, got {0}")]
    InvalidK(usize),

    /// The same candidate of a task was recorded twice.
    #[error("Candidate {index} of task {task_id} was already recorded")]
    DuplicateCandidate { task_id: String, index: usize },
}
