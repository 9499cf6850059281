use std::sync::Arc;

use axum::{
    extract::multipart::MultipartRejection,
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::ProfileId;
use super::reconcile::{ProfileUpdateError, ProfileUpdateForm};
use super::repository::{ProfileRepository, RepositoryError};
use super::service::{ProfileService, ProfileServiceError};
use super::storage::{FilesystemPhotoStorage, PhotoStorage, PhotoUpload, MAX_UPLOAD_BYTES};
use super::views::{OwnProfile, PublicProfile};
use crate::identity::session::{AdminUser, AuthenticatedUser};
use crate::matching::{determine_role, DashboardParams};

/// Multipart bodies carry the picture plus the text fields.
const PROFILE_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

/// Router builder exposing the member-profile endpoints.
pub fn profile_router<R, S>(service: Arc<ProfileService<R, S>>) -> Router
where
    R: ProfileRepository + 'static,
    S: PhotoStorage + 'static,
{
    Router::new()
        .route(
            "/users/profile",
            post(update_handler::<R, S>).layer(DefaultBodyLimit::max(PROFILE_BODY_LIMIT)),
        )
        .route("/users/dashboard", get(dashboard_handler::<R, S>))
        .route("/users/suggest-role", post(suggest_role_handler))
        .route("/users/admin/roster", get(admin_roster_handler::<R, S>))
        .route("/users/:id", get(profile_handler::<R, S>))
        .with_state(service)
}

/// Serves pictures written by [`FilesystemPhotoStorage`].
pub fn photo_router(storage: Arc<FilesystemPhotoStorage>) -> Router {
    Router::new()
        .route("/uploads/profile-pictures/:file", get(photo_handler))
        .with_state(storage)
}

pub(crate) async fn update_handler<R, S>(
    State(service): State<Arc<ProfileService<R, S>>>,
    user: AuthenticatedUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response
where
    R: ProfileRepository + 'static,
    S: PhotoStorage + 'static,
{
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            return bad_request(format!("Invalid form data: {}", rejection.body_text()))
        }
    };
    let mut form = ProfileUpdateForm::default();
    let mut photo = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return bad_request(format!("Invalid form data: {}", err.body_text())),
        };
        let name = field.name().unwrap_or_default().to_string();

        if name == "photo" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            match field.bytes().await {
                // Browsers send an empty part when no file was chosen.
                Ok(bytes) if bytes.is_empty() && file_name.as_deref().unwrap_or("").is_empty() => {}
                Ok(bytes) => {
                    photo = Some(PhotoUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    })
                }
                Err(err) => return bad_request(format!("Invalid photo upload: {}", err.body_text())),
            }
            continue;
        }

        match field.text().await {
            Ok(value) => form.push_text(&name, value),
            Err(err) => return bad_request(format!("Invalid form data: {}", err.body_text())),
        }
    }

    match service.update_profile(&user.subject, form, photo).await {
        Ok(profile) => {
            let payload = json!({ "user": OwnProfile::from(&profile) });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn dashboard_handler<R, S>(
    State(service): State<Arc<ProfileService<R, S>>>,
    user: AuthenticatedUser,
    params: Result<Query<DashboardParams>, QueryRejection>,
) -> Response
where
    R: ProfileRepository + 'static,
    S: PhotoStorage + 'static,
{
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => {
            return bad_request(format!("Invalid query: {}", rejection.body_text()))
        }
    };
    match service.dashboard(&user.subject, &params) {
        Ok(users) => {
            let users: Vec<PublicProfile> = users.iter().map(PublicProfile::from).collect();
            (StatusCode::OK, Json(json!({ "users": users }))).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn profile_handler<R, S>(
    State(service): State<Arc<ProfileService<R, S>>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Response
where
    R: ProfileRepository + 'static,
    S: PhotoStorage + 'static,
{
    match service.get(&ProfileId(id)) {
        Ok(profile) => {
            let payload = json!({ "user": PublicProfile::from(&profile) });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn admin_roster_handler<R, S>(
    State(service): State<Arc<ProfileService<R, S>>>,
    AdminUser(admin): AdminUser,
) -> Response
where
    R: ProfileRepository + 'static,
    S: PhotoStorage + 'static,
{
    match service.roster() {
        Ok(users) => {
            tracing::info!(admin = %admin.subject, count = users.len(), "admin roster served");
            (StatusCode::OK, Json(json!({ "users": users }))).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuggestRoleRequest {
    #[serde(default)]
    pub(crate) skills: Vec<String>,
}

pub(crate) async fn suggest_role_handler(
    request: Result<Json<SuggestRoleRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => {
            return bad_request(format!("Invalid request body: {}", rejection.body_text()))
        }
    };
    let role = determine_role(&request.skills);
    (StatusCode::OK, Json(json!({ "suggestedRole": role }))).into_response()
}

async fn photo_handler(
    State(storage): State<Arc<FilesystemPhotoStorage>>,
    Path(file): Path<String>,
) -> Response {
    match storage.read(&file).await {
        Ok(Some((bytes, mime))) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, mime.to_string())], bytes).into_response()
        }
        Ok(None) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "File not found" }))).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, file = %file, "failed to read profile picture");
            internal_error()
        }
    }
}

fn service_error_response(error: ProfileServiceError) -> Response {
    match error {
        ProfileServiceError::Validation(invalid) => validation_response(&invalid),
        ProfileServiceError::Query(err) => {
            let payload = json!({
                "errors": [{ "field": err.field(), "message": err.to_string() }],
            });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
        ProfileServiceError::Upload(err) => bad_request(err.to_string()),
        ProfileServiceError::NotFound
        | ProfileServiceError::Repository(RepositoryError::NotFound) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "User not found" }))).into_response()
        }
        ProfileServiceError::Repository(err) => {
            tracing::error!(error = %err, "profile repository failure");
            internal_error()
        }
    }
}

/// One failure reads as `{error}`; several as `{errors: [{field, message}]}`.
pub(crate) fn validation_response(invalid: &ProfileUpdateError) -> Response {
    let payload = match invalid.errors.as_slice() {
        [only] => json!({ "error": only.message, "field": only.field }),
        many => json!({ "errors": many }),
    };
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Server error" })),
    )
        .into_response()
}
