use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use headstart::identity::{auth_router, AuthService, VerifyRedirect};
use headstart::profiles::{
    photo_router, profile_router, FilesystemPhotoStorage, PhotoStorage, ProfileRepository,
    ProfileService,
};
use serde_json::json;
use std::sync::Arc;

/// Everything the service answers: auth, profiles, stored pictures, and ops probes.
pub(crate) fn with_service_routes<R, S>(
    profiles: Arc<ProfileService<R, S>>,
    auth: Arc<AuthService<R>>,
    redirect: VerifyRedirect,
    photos: Arc<FilesystemPhotoStorage>,
) -> Router
where
    R: ProfileRepository + 'static,
    S: PhotoStorage + 'static,
{
    profile_router(profiles)
        .merge(auth_router(auth, redirect))
        .merge(photo_router(photos))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
