use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use carfleet_core::domain::car::{CarInfo, CarNumber};

use crate::error::{application_error, correlation_id, ApiError};
use crate::routes::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/cars", get(list_cars)).route("/cars/{car_number}", get(get_car))
}

pub async fn list_cars(State(state): State<AppState>) -> Result<Json<Vec<CarInfo>>, ApiError> {
    let correlation_id = correlation_id();
    state
        .cars
        .list_cars()
        .await
        .map(Json)
        .map_err(|e| application_error(e, "Error listing cars", &correlation_id))
}

pub async fn get_car(
    Path(car_number): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<CarInfo>, ApiError> {
    let correlation_id = correlation_id();
    state
        .cars
        .get_car(CarNumber(car_number))
        .await
        .map(Json)
        .map_err(|e| application_error(e, "Error loading car", &correlation_id))
}
