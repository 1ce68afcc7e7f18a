use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        auth::auth_handler,
        dashboard::{dashboard_handler, schedules_handler},
        tickets::tickets_handler,
        users::users_handler,
    },
    middleware::auth,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .nest("/auth", auth_handler())
        .nest(
            "/users",
            users_handler()
                .layer(middleware::from_fn(auth))
        )
        .nest(
            "/tickets",
            tickets_handler()
                .layer(middleware::from_fn(auth))
        )
        .nest(
            "/dashboard",
            dashboard_handler()
                .layer(middleware::from_fn(auth))
        )
        .nest(
            "/schedules",
            schedules_handler()
                .layer(middleware::from_fn(auth))
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        db::{db::DBClient, userdb::UserExt},
        models::usermodel::UserStatus,
        test_state, test_state_with,
        utils::token,
    };

    #[tokio::test]
    async fn health_is_public() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ticket_routes_require_a_session() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/api/tickets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn garbage_tokens_are_rejected() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/dashboard/counts")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_expires_the_cookie() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn suspension_signs_the_user_out_on_the_next_request() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for database tests");
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("database connection");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
        let state = test_state_with(DBClient::new(pool));

        let email = format!("{}@example.com", uuid::Uuid::new_v4());
        let user = state
            .db_client
            .save_user("Suspended Person", email.as_str(), "not-a-real-hash")
            .await
            .unwrap();
        let session = token::create_token(
            &user.id.to_string(),
            state.env.jwt_secret.as_bytes(),
            state.env.jwt_maxage,
        )
        .unwrap();

        let request = |session: &str| {
            Request::builder()
                .uri("/api/users/me")
                .header(header::COOKIE, format!("token={}", session))
                .body(Body::empty())
                .unwrap()
        };

        let response = create_router(state.clone()).oneshot(request(&session)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        state.db_client.update_user_status(user.id, UserStatus::Suspended).await.unwrap();
        state.db_client.invalidate_user(user.id).await;

        let response = create_router(state.clone()).oneshot(request(&session)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));

        state.db_client.delete_user(user.id).await.unwrap();
    }
}
