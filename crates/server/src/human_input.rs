//! Free-form operator input: list open prompts and answer them by request id.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{bad_request, correlation_id, ApiError, ErrorBody};
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InputBody {
    pub decision: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRecorded {
    pub message: String,
    pub request_id: String,
    pub decision: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/human-input/pending", get(pending))
        .route("/api/human-input/{request_id}", post(provide))
}

pub async fn pending(State(state): State<AppState>) -> Json<BTreeMap<String, String>> {
    Json(state.human_input.pending_requests())
}

pub async fn provide(
    Path(request_id): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<InputBody>>,
) -> Result<Json<InputRecorded>, ApiError> {
    let correlation_id = correlation_id();
    let decision = body
        .and_then(|Json(b)| b.decision)
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    let Some(decision) = decision else {
        return Err(bad_request("Decision is required", &correlation_id));
    };

    if state.human_input.provide_input(&request_id, decision.clone()).is_err() {
        tracing::warn!(
            event_name = "human_input.unknown_request",
            request_id = %request_id,
            correlation_id = %correlation_id,
            "no pending input request"
        );
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: format!("No pending request found for: {request_id}"),
                correlation_id,
            }),
        ));
    }

    tracing::info!(
        event_name = "human_input.provided",
        request_id = %request_id,
        correlation_id = %correlation_id,
        "operator input recorded"
    );
    Ok(Json(InputRecorded { message: "Decision recorded".to_string(), request_id, decision }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        extract::{Path, State},
        http::StatusCode,
        Json,
    };

    use carfleet_core::approvals::WaitOutcome;

    use super::{pending, provide, InputBody};
    use crate::routes::test_support;

    #[tokio::test]
    async fn answer_reaches_the_waiting_prompt() {
        let state = test_support::state(Duration::from_secs(1)).await;
        let waiter = state.human_input.request_input(
            "car-7",
            "Approve disposal of car 7?",
            Duration::from_secs(5),
        );

        let listed = pending(State(state.clone())).await.0;
        assert_eq!(listed.get("car-7").map(String::as_str), Some("Approve disposal of car 7?"));

        let body = InputBody { decision: Some(" KEEP_CAR ".to_string()) };
        let recorded = provide(Path("car-7".to_string()), State(state.clone()), Some(Json(body)))
            .await
            .expect("recorded")
            .0;
        assert_eq!(recorded.message, "Decision recorded");
        assert_eq!(recorded.request_id, "car-7");
        assert_eq!(recorded.decision, "KEEP_CAR");

        assert_eq!(waiter.wait().await, WaitOutcome::Resolved("KEEP_CAR".to_string()));
        assert!(pending(State(state)).await.0.is_empty());
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let state = test_support::state(Duration::from_secs(1)).await;
        let body = InputBody { decision: Some("DISPOSE_CAR".to_string()) };
        let (status, body) = provide(Path("car-404".to_string()), State(state), Some(Json(body)))
            .await
            .expect_err("unknown");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "No pending request found for: car-404");
    }

    #[tokio::test]
    async fn missing_decision_is_a_bad_request() {
        let state = test_support::state(Duration::from_secs(1)).await;
        let (status, body) =
            provide(Path("car-1".to_string()), State(state), None).await.expect_err("no decision");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Decision is required");
    }
}
