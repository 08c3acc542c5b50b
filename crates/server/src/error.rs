use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use carfleet_core::errors::ApplicationError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}

pub fn bad_request(message: impl Into<String>, correlation_id: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody { error: message.into(), correlation_id: correlation_id.to_string() }),
    )
}

/// Maps an application error to its HTTP status. `context` prefixes the
/// message of server-side failures.
pub fn application_error(error: ApplicationError, context: &str, correlation_id: &str) -> ApiError {
    let interface = error.into_interface(correlation_id);
    let status =
        StatusCode::from_u16(interface.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(
            event_name = "api.request_failed",
            correlation_id,
            error = %interface,
            "request failed"
        );
        format!("{context}: {}", interface.message())
    } else {
        warn!(
            event_name = "api.request_rejected",
            correlation_id,
            status = status.as_u16(),
            error = %interface,
            "request rejected"
        );
        interface.message().to_string()
    };
    (status, Json(ErrorBody { error: message, correlation_id: correlation_id.to_string() }))
}
