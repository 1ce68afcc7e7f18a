use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::ticketdb::TicketExt,
    dtos::ticketdtos::{CreateCommentDto, CreateNoteDto},
    error::HttpError,
    handler::tickets::{find_ticket, find_visible_ticket, ticket_path},
    middleware::JWTAuthMiddeware,
    service::{access, error::ServiceError, realtime::TicketEventKind},
    AppState,
};

pub async fn list_comments(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let ticket = find_visible_ticket(&app_state, &auth.user, ticket_id, "read_comments").await?;

    let comments = app_state.db_client
        .get_comments(ticket.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "comments": comments,
        }
    })))
}

pub async fn add_comment(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateCommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    if body.is_empty() {
        return Err(ServiceError::Validation("A comment needs a message or an attachment".to_string()).into());
    }

    let ticket = find_ticket(&app_state, ticket_id).await?;
    if !access::can_comment(&auth.user, &ticket) {
        return Err(HttpError::permission_denied("comment", ticket_path(ticket_id)));
    }

    let message = body.message.trim().to_string();
    let attachment_count = body.attachments.len();

    let comment = app_state.db_client
        .add_comment(ticket.id, &auth.user, message.clone(), body.attachments)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    app_state.notifier.notify_comment_added(&ticket, &auth.user, &message, attachment_count);
    app_state.events.publish(TicketEventKind::CommentAdded, ticket);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "data": {
                "comment": comment,
            }
        })),
    ))
}

pub async fn list_notes(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    if !access::can_access_internal_notes(&auth.user) {
        return Err(HttpError::permission_denied("read_notes", format!("{}/internal_notes", ticket_path(ticket_id))));
    }

    let ticket = find_ticket(&app_state, ticket_id).await?;

    let notes = app_state.db_client
        .get_internal_notes(ticket.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "notes": notes,
        }
    })))
}

pub async fn add_note(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateNoteDto>,
) -> Result<impl IntoResponse, HttpError> {
    if !access::can_access_internal_notes(&auth.user) {
        return Err(HttpError::permission_denied("add_note", format!("{}/internal_notes", ticket_path(ticket_id))));
    }

    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let message = body.message.trim().to_string();
    if message.is_empty() {
        return Err(ServiceError::Validation("A note cannot be empty".to_string()).into());
    }

    let ticket = find_ticket(&app_state, ticket_id).await?;

    let note = app_state.db_client
        .add_internal_note(ticket.id, &auth.user, message)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    app_state.events.publish(TicketEventKind::NoteAdded, ticket);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "data": {
                "note": note,
            }
        })),
    ))
}
