use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::ticketdb::TicketExt,
    dtos::ticketdtos::RatingDto,
    error::HttpError,
    handler::tickets::{find_ticket, find_visible_ticket, ticket_path},
    middleware::JWTAuthMiddeware,
    service::{
        access::{self, RatingDenial},
        error::ServiceError,
        realtime::TicketEventKind,
    },
    AppState,
};

pub async fn get_rating(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let ticket = find_visible_ticket(&app_state, &auth.user, ticket_id, "read_rating").await?;
    if !access::can_view_rating(&auth.user, &ticket) {
        return Err(HttpError::permission_denied("read_rating", format!("{}/ratings", ticket_path(ticket_id))));
    }

    let rating = app_state.db_client
        .get_rating(ticket.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "rating": rating,
        }
    })))
}

pub async fn submit_rating(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<RatingDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let ticket = find_ticket(&app_state, ticket_id).await?;

    match access::check_can_rate(&auth.user, &ticket) {
        Ok(()) => {}
        Err(RatingDenial::NotCreator) => {
            return Err(HttpError::permission_denied("rate", format!("{}/ratings", ticket_path(ticket_id))));
        }
        Err(RatingDenial::NotResolved) => return Err(ServiceError::TicketNotResolved.into()),
    }

    let comment = body
        .comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let (rating, created) = app_state.db_client
        .upsert_rating(ticket.id, auth.user.id, body.rating, comment)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    tracing::info!(
        ticket_number = ticket.ticket_number,
        rating = rating.rating,
        created,
        "Ticket rated"
    );

    let mut rated = ticket;
    rated.rating = Some(rating.rating);
    app_state.events.publish(TicketEventKind::Rated, rated);

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };

    Ok((
        status,
        Json(json!({
            "status": "success",
            "data": {
                "rating": rating,
            }
        })),
    ))
}
