use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::{
    db::ticketdb::TicketExt,
    dtos::ticketdtos::StatisticsQueryDto,
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::UserRole,
    service::{
        access::TicketScope,
        schedules::room_at,
        statistics::compute_statistics,
    },
    AppState,
};

pub fn dashboard_handler() -> Router {
    Router::new()
        .route("/counts", get(get_counts))
        .route(
            "/statistics",
            get(get_statistics).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Ti, UserRole::Admin])
            })),
        )
}

pub fn schedules_handler() -> Router {
    Router::new()
        .route("/", get(list_rooms))
        .route("/:index", get(get_room))
}

pub async fn get_counts(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let counts = app_state.db_client
        .count_tickets_by_status(TicketScope::for_user(&auth.user))
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "open": counts.open,
            "in_progress": counts.in_progress,
            "resolved": counts.resolved,
            "total": counts.total(),
        }
    })))
}

pub async fn get_statistics(
    Query(query): Query<StatisticsQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let now = Utc::now();
    let since = query.range.start(now);

    let tickets = app_state.db_client
        .get_tickets_created_since(since)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let statistics = compute_statistics(&tickets, query.range, now);

    Ok(Json(json!({
        "status": "success",
        "data": statistics,
    })))
}

pub async fn list_rooms(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(json!({
        "status": "success",
        "data": {
            "rooms": app_state.env.rooms,
        }
    })))
}

pub async fn get_room(
    Path(index): Path<usize>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let view = room_at(&app_state.env.rooms, index)
        .ok_or_else(|| HttpError::not_found(format!("Room {} not found", index)))?;

    Ok(Json(json!({
        "status": "success",
        "data": view,
    })))
}
