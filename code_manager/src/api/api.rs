//api/api.rs
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use code_runner::{AttemptRequest, Budgets};
use serde::Deserialize;

use crate::manager::manager::AttemptManager;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: AttemptManager,
    /// Budgets applied when a request does not override them.
    pub budgets: Budgets,
}

impl AppState {
    pub fn new(manager: AttemptManager, budgets: Budgets) -> Self {
        Self { manager, budgets }
    }
}

/// Per-request budget overrides, in whole seconds.
#[derive(Debug, Default, Deserialize)]
pub struct BudgetOverrides {
    pub compile_timeout_secs: Option<u64>,
    pub run_timeout_secs: Option<u64>,
}

impl BudgetOverrides {
    fn apply(&self, base: Budgets) -> Budgets {
        let mut budgets = base;
        if let Some(secs) = self.compile_timeout_secs {
            budgets.compile = std::time::Duration::from_secs(secs);
        }
        if let Some(secs) = self.run_timeout_secs {
            budgets.run = std::time::Duration::from_secs(secs);
        }
        budgets
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/run", post(run_attempt))
        .with_state(state)
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "code_manager is running")
}

/// Executes one attempt and returns its classified response.
///
/// Every classified outcome is a `200`. Only infrastructure faults map to
/// `503 Service Unavailable`.
pub async fn run_attempt(
    State(state): State<AppState>,
    Query(overrides): Query<BudgetOverrides>,
    Json(request): Json<AttemptRequest>,
) -> Response {
    tracing::info!("Received run request for task {}", request.task_id);

    let budgets = overrides.apply(state.budgets);

    match state.manager.run(&request, &budgets).await {
        Ok(outcome) => {
            (StatusCode::OK, Json(outcome.into_response(&request.task_id))).into_response()
        }
        Err(e) => {
            let msg = format!("Error running attempt: {}", e);
            tracing::error!("{}", msg);
            (StatusCode::SERVICE_UNAVAILABLE, msg).into_response()
        }
    }
}
