use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::userdb::UserExt,
    dtos::userdtos::*,
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::{User, UserRole, UserStatus},
    service::{access, error::ServiceError},
    AppState,
};

const RESET_TOKEN_MINUTES: i64 = 30;

pub fn users_handler() -> Router {
    Router::new()
        .route("/me", get(get_me).put(update_me))
        .route(
            "/staff",
            get(get_staff).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Ti, UserRole::Admin])
            })),
        )
        .route(
            "/admin/users",
            get(get_users).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Admin])
            })),
        )
        .route(
            "/admin/users/:user_id",
            delete(delete_user).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Admin])
            })),
        )
        .route(
            "/admin/users/:user_id/role",
            put(update_user_role).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Admin])
            })),
        )
        .route(
            "/admin/users/:user_id/status",
            put(update_user_status).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Admin])
            })),
        )
        .route(
            "/admin/users/:user_id/password-reset",
            post(send_password_reset).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Admin])
            })),
        )
}

fn user_response(user: &User) -> Json<UserResponseDto> {
    Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(user),
        },
    })
}

fn map_user_update_error(user_id: Uuid) -> impl Fn(sqlx::Error) -> HttpError {
    move |e| match e {
        sqlx::Error::RowNotFound => ServiceError::UserNotFound(user_id).into(),
        other => HttpError::server_error(other.to_string()),
    }
}

pub async fn get_me(
    Extension(_app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(user_response(&user.user))
}

pub async fn update_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<UpdateProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let user = &user.user;

    if body.role.is_some_and(|role| role != user.role) && !access::can_change_role(user) {
        return Err(HttpError::permission_denied("update_role", format!("users/{}", user.id)));
    }

    let mut updated = app_state.db_client
        .update_user_name(user.id, body.name.trim())
        .await
        .map_err(map_user_update_error(user.id))?;

    if let Some(role) = body.role.filter(|role| *role != user.role) {
        updated = app_state.db_client
            .update_user_role(user.id, role)
            .await
            .map_err(map_user_update_error(user.id))?;
    }

    app_state.db_client.invalidate_user(user.id).await;

    Ok(user_response(&updated))
}

pub async fn get_staff(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let staff = app_state.db_client
        .get_staff_users()
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "users": FilterUserDto::filter_users(&staff),
        }
    })))
}

pub async fn get_users(
    Query(query_params): Query<RequestQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query_params.page.unwrap_or(1);
    let limit = query_params.limit.unwrap_or(10);

    let users = app_state.db_client
        .get_users(page as u32, limit)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let user_count = app_state.db_client
        .get_user_count()
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(UserListResponseDto {
        status: "success".to_string(),
        users: FilterUserDto::filter_users(&users),
        results: user_count,
    }))
}

pub async fn update_user_role(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<JWTAuthMiddeware>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<RoleUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    if user_id == admin.user.id && body.role != UserRole::Admin {
        return Err(HttpError::bad_request("Admins cannot remove their own admin role"));
    }

    let user = app_state.db_client
        .update_user_role(user_id, body.role)
        .await
        .map_err(map_user_update_error(user_id))?;

    app_state.db_client.invalidate_user(user_id).await;
    tracing::info!("Admin {} set role of {} to {}", admin.user.id, user_id, body.role.to_str());

    Ok(user_response(&user))
}

pub async fn update_user_status(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<JWTAuthMiddeware>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<StatusUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    if user_id == admin.user.id && body.status == UserStatus::Suspended {
        return Err(HttpError::bad_request("Admins cannot suspend themselves"));
    }

    let user = app_state.db_client
        .update_user_status(user_id, body.status)
        .await
        .map_err(map_user_update_error(user_id))?;

    // The next authenticated request re-reads the profile and signs a
    // suspended user out.
    app_state.db_client.invalidate_user(user_id).await;
    tracing::info!("Admin {} set status of {} to {}", admin.user.id, user_id, body.status.to_str());

    Ok(user_response(&user))
}

pub async fn delete_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<JWTAuthMiddeware>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    if user_id == admin.user.id {
        return Err(HttpError::bad_request("Admins cannot delete their own account"));
    }

    let deleted = match app_state.db_client.delete_user(user_id).await {
        Ok(deleted) => deleted,
        Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
            return Err(ServiceError::UserHasTickets.into());
        }
        Err(e) => return Err(HttpError::server_error(e.to_string())),
    };

    if !deleted {
        return Err(ServiceError::UserNotFound(user_id).into());
    }

    app_state.db_client.invalidate_user(user_id).await;
    tracing::info!("Admin {} deleted user {}", admin.user.id, user_id);

    Ok(Json(Response {
        status: "success",
        message: "User deleted".to_string(),
    }))
}

pub async fn send_password_reset(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state.db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::from(ServiceError::UserNotFound(user_id)))?;

    let reset_token = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_MINUTES);

    app_state.db_client
        .set_reset_token(user.id, &reset_token, expires_at)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let reset_link = format!(
        "{}/reset-password?token={}",
        app_state.env.app_url.trim_end_matches('/'),
        reset_token
    );
    app_state.notifier.notify_password_reset(&user, &reset_link);

    Ok(Json(Response {
        status: "success",
        message: format!("Password reset link sent to {}", user.email),
    }))
}
