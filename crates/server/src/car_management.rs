//! Car return endpoints. Each call blocks until the processing workflow has
//! finished, including any wait for a human reviewer.
//!
//! - `POST /car-management/rental-return/{car}?rentalFeedback=...`
//! - `POST /car-management/cleaning-return/{car}?cleaningFeedback=...`
//! - `POST /car-management/maintenance-return/{car}?maintenanceFeedback=...`

use axum::{
    extract::{Path, Query, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use carfleet_agent::ReturnOutcome;
use carfleet_core::domain::car::{CarNumber, ReturnSource};

use crate::error::{application_error, correlation_id, ApiError};
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnQuery {
    pub rental_feedback: Option<String>,
    pub cleaning_feedback: Option<String>,
    pub maintenance_feedback: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/car-management/rental-return/{car_number}", post(rental_return))
        .route("/car-management/cleaning-return/{car_number}", post(cleaning_return))
        .route("/car-management/maintenance-return/{car_number}", post(maintenance_return))
}

async fn process(
    state: &AppState,
    car_number: i64,
    source: ReturnSource,
    feedback: Option<String>,
) -> Result<Json<ReturnOutcome>, ApiError> {
    let correlation_id = correlation_id();
    let feedback = feedback.unwrap_or_default();
    state
        .cars
        .process_return(CarNumber(car_number), source, &feedback, &correlation_id)
        .await
        .map(Json)
        .map_err(|e| {
            let context = format!("Error processing {} return", source.as_str());
            application_error(e, &context, &correlation_id)
        })
}

pub async fn rental_return(
    Path(car_number): Path<i64>,
    Query(query): Query<ReturnQuery>,
    State(state): State<AppState>,
) -> Result<Json<ReturnOutcome>, ApiError> {
    process(&state, car_number, ReturnSource::Rental, query.rental_feedback).await
}

pub async fn cleaning_return(
    Path(car_number): Path<i64>,
    Query(query): Query<ReturnQuery>,
    State(state): State<AppState>,
) -> Result<Json<ReturnOutcome>, ApiError> {
    process(&state, car_number, ReturnSource::Cleaning, query.cleaning_feedback).await
}

pub async fn maintenance_return(
    Path(car_number): Path<i64>,
    Query(query): Query<ReturnQuery>,
    State(state): State<AppState>,
) -> Result<Json<ReturnOutcome>, ApiError> {
    process(&state, car_number, ReturnSource::Maintenance, query.maintenance_feedback).await
}
