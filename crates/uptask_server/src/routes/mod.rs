//! HTTP routing.

pub mod project;
pub mod task;
pub mod user;

use crate::auth::CONNECTION_HEADER;
use crate::error::ApiError;
use crate::state::AppState;
use crate::ws;
use axum::extract::{FromRequest, Request};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// JSON request body whose decode failures are reported as `{message}`.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `{message, <key>: entity}` success envelope.
pub(crate) fn envelope(message: &str, key: &str, entity: impl Serialize) -> Json<Value> {
    let mut body = json!({ "message": message });
    body[key] = json!(entity);
    Json(body)
}

/// `{message}` success envelope.
pub(crate) fn message(message: &str) -> Json<Value> {
    Json(json!({ "message": message }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": uptask_core::core_version() }))
}

/// Credentialed CORS for the configured browser origins only.
fn cors_layer(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(CONNECTION_HEADER),
        ])
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(state.allowed_origins.clone());
    Router::new()
        .route("/health", get(health))
        .route("/api/sync", get(ws::upgrade))
        .merge(user::router())
        .merge(project::router())
        .merge(task::router())
        .with_state(state)
        .layer(cors)
}
