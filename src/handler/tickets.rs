use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query},
    http::StatusCode,
    middleware,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use futures::{stream, Stream};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{ticketdb::TicketExt, userdb::UserExt},
    dtos::ticketdtos::*,
    error::HttpError,
    handler::{comments, ratings},
    middleware::{role_check, JWTAuthMiddeware},
    models::{
        ticketmodel::{Ticket, TicketQueryParams, TicketStatus},
        usermodel::{User, UserRole},
    },
    service::{
        access::{self, TicketScope},
        error::ServiceError,
        realtime::TicketEventKind,
        storage::UploadFile,
    },
    AppState,
};

/// Interval of the `heartbeat` event that prompts clients to recompute
/// deadline indicators.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

pub fn tickets_handler() -> Router {
    Router::new()
        .route("/", get(list_tickets).post(create_ticket))
        .route("/stream", get(ticket_stream))
        .route(
            "/attachments",
            post(upload_attachments).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/:ticket_id", get(get_ticket))
        .route(
            "/:ticket_id/status",
            put(update_status).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Ti, UserRole::Admin])
            })),
        )
        .route(
            "/:ticket_id/assign",
            put(assign_ticket).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Ti, UserRole::Admin])
            })),
        )
        .route(
            "/:ticket_id/deadline",
            put(set_deadline).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Ti, UserRole::Admin])
            })),
        )
        .route(
            "/:ticket_id/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route(
            "/:ticket_id/notes",
            get(comments::list_notes)
                .post(comments::add_note)
                .layer(middleware::from_fn(|state, req, next| {
                    role_check(state, req, next, vec![UserRole::Ti, UserRole::Admin])
                })),
        )
        .route(
            "/:ticket_id/rating",
            get(ratings::get_rating)
                .put(ratings::submit_rating)
                .post(ratings::submit_rating),
        )
}

pub(crate) fn ticket_path(ticket_id: Uuid) -> String {
    format!("tickets/{}", ticket_id)
}

pub(crate) async fn find_ticket(app_state: &AppState, ticket_id: Uuid) -> Result<Ticket, HttpError> {
    app_state.db_client
        .get_ticket(ticket_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| ServiceError::TicketNotFound(ticket_id).into())
}

/// Loads a ticket the actor is allowed to see.
pub(crate) async fn find_visible_ticket(
    app_state: &AppState,
    user: &User,
    ticket_id: Uuid,
    operation: &str,
) -> Result<Ticket, HttpError> {
    let ticket = find_ticket(app_state, ticket_id).await?;
    if !access::can_view_ticket(user, &ticket) {
        return Err(HttpError::permission_denied(operation, ticket_path(ticket_id)));
    }
    Ok(ticket)
}

fn map_ticket_update_error(ticket_id: Uuid) -> impl Fn(sqlx::Error) -> HttpError {
    move |e| match e {
        sqlx::Error::RowNotFound => ServiceError::TicketNotFound(ticket_id).into(),
        other => HttpError::server_error(other.to_string()),
    }
}

fn ticket_response(ticket: Ticket) -> Json<serde_json::Value> {
    Json(json!({
        "status": "success",
        "data": {
            "ticket": TicketResponse::from_ticket(ticket, Utc::now()),
        }
    }))
}

pub async fn create_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateTicketDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let pending = app_state.db_client
        .get_oldest_unrated_resolved_ticket(auth.user.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    if let Some(pending) = pending {
        return Err(ServiceError::RatingRequired(pending.ticket_number).into());
    }

    let ticket = app_state.db_client
        .create_ticket(&auth.user, body.into_new_ticket())
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    app_state.events.publish(TicketEventKind::Created, ticket.clone());
    app_state.notifier.notify_ticket_created(&ticket);

    Ok((StatusCode::CREATED, ticket_response(ticket)))
}

pub async fn list_tickets(
    Query(params): Query<TicketQueryParams>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| HttpError::bad_request("Page is out of range"))?;

    let scope = TicketScope::for_user(&auth.user);

    let tickets = app_state.db_client
        .get_tickets(scope, params.status, limit, offset)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let counts = app_state.db_client
        .count_tickets_by_status(scope)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(TicketListResponseDto {
        status: "success",
        tickets: TicketResponse::from_tickets(tickets, Utc::now()),
        page,
        limit,
        counts,
    }))
}

pub async fn get_ticket(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let ticket = find_visible_ticket(&app_state, &auth.user, ticket_id, "read").await?;
    Ok(ticket_response(ticket))
}

pub async fn update_status(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<UpdateTicketStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    if !access::can_manage_ticket(&auth.user) {
        return Err(HttpError::permission_denied("update_status", ticket_path(ticket_id)));
    }

    let previous = find_ticket(&app_state, ticket_id).await?;

    let ticket = app_state.db_client
        .update_ticket_status(ticket_id, body.status)
        .await
        .map_err(map_ticket_update_error(ticket_id))?;

    tracing::info!(
        ticket_number = ticket.ticket_number,
        from = previous.status.to_str(),
        to = ticket.status.to_str(),
        by = %auth.user.id,
        "Ticket status changed"
    );

    app_state.events.publish(TicketEventKind::Updated, ticket.clone());
    if ticket.status == TicketStatus::Resolved && previous.status != TicketStatus::Resolved {
        app_state.notifier.notify_ticket_resolved(&ticket);
    }

    Ok(ticket_response(ticket))
}

pub async fn assign_ticket(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<AssignTicketDto>,
) -> Result<impl IntoResponse, HttpError> {
    if !access::can_manage_ticket(&auth.user) {
        return Err(HttpError::permission_denied("assign", ticket_path(ticket_id)));
    }

    let assignee = match body.assigned_to {
        Some(assignee_id) => {
            let assignee = app_state.db_client
                .get_user(Some(assignee_id), None, None)
                .await
                .map_err(|e| HttpError::server_error(e.to_string()))?
                .filter(|u| u.role.is_staff() && !u.is_suspended())
                .ok_or_else(|| HttpError::from(ServiceError::InvalidAssignee(assignee_id)))?;
            Some(assignee)
        }
        None => None,
    };

    let ticket = app_state.db_client
        .assign_ticket(ticket_id, assignee.as_ref())
        .await
        .map_err(map_ticket_update_error(ticket_id))?;

    app_state.events.publish(TicketEventKind::Updated, ticket.clone());

    Ok(ticket_response(ticket))
}

pub async fn set_deadline(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<DeadlineDto>,
) -> Result<impl IntoResponse, HttpError> {
    if !access::can_manage_ticket(&auth.user) {
        return Err(HttpError::permission_denied("set_deadline", ticket_path(ticket_id)));
    }

    let ticket = app_state.db_client
        .set_ticket_deadline(ticket_id, body.deadline)
        .await
        .map_err(map_ticket_update_error(ticket_id))?;

    app_state.events.publish(TicketEventKind::Updated, ticket.clone());

    Ok(ticket_response(ticket))
}

pub async fn upload_attachments(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::bad_request(e.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| HttpError::bad_request(e.to_string()))?;

        files.push(UploadFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let urls = app_state.storage
        .upload_all(auth.user.id, files)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "urls": urls,
        }
    })))
}

/// Live ticket changes for the caller, scoped exactly like the list query,
/// interleaved with a periodic heartbeat.
pub async fn ticket_stream(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = app_state.events.subscribe();
    let user = auth.user;
    tracing::debug!(
        "User {} opened the ticket stream ({} listening)",
        user.id,
        app_state.events.subscriber_count()
    );

    let events = stream::unfold((receiver, user), |(mut receiver, user)| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if !event.visible_to(&user) {
                        continue;
                    }
                    let payload = json!({
                        "kind": event.kind,
                        "ticket": TicketResponse::from_ticket(event.ticket, Utc::now()),
                    });
                    match Event::default().event(event.kind.to_str()).json_data(payload) {
                        Ok(sse_event) => return Some((Ok(sse_event), (receiver, user))),
                        Err(e) => tracing::warn!("Dropping unserializable ticket event: {}", e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Ticket stream for {} skipped {} events", user.id, skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    let heartbeat = stream::unfold(tokio::time::interval(HEARTBEAT_INTERVAL), |mut interval| async move {
        interval.tick().await;
        let event = Event::default()
            .event("heartbeat")
            .data(Utc::now().to_rfc3339());
        Some((Ok(event), interval))
    });

    Sse::new(stream::select(events, heartbeat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{service::access::fixtures, test_state};

    #[tokio::test]
    async fn huge_page_numbers_are_rejected_before_querying() {
        let params = TicketQueryParams {
            page: Some(i64::MAX),
            limit: Some(MAX_PAGE_SIZE),
            status: None,
        };
        let auth = JWTAuthMiddeware { user: fixtures::user(UserRole::User) };

        let err = list_tickets(Query(params), Extension(test_state()), Extension(auth))
            .await
            .err()
            .expect("overflowing page must fail");

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Page is out of range");
    }
}
