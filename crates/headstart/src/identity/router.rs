use std::sync::Arc;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::provider::IdentityError;
use super::service::{AuthService, AuthServiceError};
use super::session::AuthenticatedUser;
use crate::profiles::repository::ProfileRepository;
use crate::profiles::views::OwnProfile;

/// Where `/auth/verify` sends the browser, and how much detail it may carry.
#[derive(Debug, Clone)]
pub struct VerifyRedirect {
    pub frontend_url: String,
    /// Keep upstream detail out of the redirect.
    pub production: bool,
}

impl VerifyRedirect {
    fn location(&self, error: Option<&str>) -> String {
        let base = format!("{}/", self.frontend_url.trim_end_matches('/'));
        let mut params = vec![("verified", if error.is_none() { "true" } else { "false" })];
        if let Some(message) = error {
            params.push(("error", message));
        }
        match reqwest::Url::parse_with_params(&base, &params) {
            Ok(url) => url.to_string(),
            Err(err) => {
                tracing::error!(error = %err, frontend = %self.frontend_url, "invalid frontend url");
                format!("/?verified={}", params[0].1)
            }
        }
    }

    fn client_message(&self, error: &AuthServiceError) -> String {
        match error {
            AuthServiceError::Provider(IdentityError::Service(detail)) if !self.production => {
                detail.clone()
            }
            AuthServiceError::Repository(_) if self.production => "Verification failed".to_string(),
            other => other.to_string(),
        }
    }
}

struct AuthState<R> {
    service: Arc<AuthService<R>>,
    redirect: VerifyRedirect,
}

/// Router builder exposing the `/auth` endpoints.
pub fn auth_router<R>(service: Arc<AuthService<R>>, redirect: VerifyRedirect) -> Router
where
    R: ProfileRepository + 'static,
{
    let state = Arc::new(AuthState { service, redirect });
    Router::new()
        .route("/auth/register", post(register_handler::<R>))
        .route("/auth/verify", get(verify_handler::<R>))
        .route("/auth/resend-code", post(resend_handler::<R>))
        .route("/auth/login", post(login_handler::<R>))
        .route("/auth/forgot-password", post(forgot_handler::<R>))
        .route("/auth/reset-password", post(reset_handler::<R>))
        .route("/auth/me", get(me_handler::<R>))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default, alias = "preferred_username")]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyParams {
    #[serde(default)]
    username: String,
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmailRequest {
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResetRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    new_password: String,
}

async fn register_handler<R>(
    State(state): State<Arc<AuthState<R>>>,
    request: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response
where
    R: ProfileRepository + 'static,
{
    let request = match json_request(request) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state
        .service
        .register(&request.email, &request.password, request.display_name.as_deref())
        .await
    {
        Ok(outcome) => {
            let payload = json!({
                "message": "User registered. Please check your email for verification code.",
                "userSub": outcome.user_sub,
                "userConfirmed": outcome.user_confirmed,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => auth_error_response(error),
    }
}

async fn verify_handler<R>(
    State(state): State<Arc<AuthState<R>>>,
    params: Result<Query<VerifyParams>, QueryRejection>,
) -> Response
where
    R: ProfileRepository + 'static,
{
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return error_body(StatusCode::BAD_REQUEST, &rejection.body_text()),
    };
    match state.service.verify(&params.username, &params.code).await {
        Ok(_) => Redirect::to(&state.redirect.location(None)).into_response(),
        Err(AuthServiceError::Invalid(message)) => error_body(StatusCode::BAD_REQUEST, &message),
        Err(error) => {
            tracing::warn!(email = %params.username, error = ?error, "verification failed");
            let message = state.redirect.client_message(&error);
            Redirect::to(&state.redirect.location(Some(&message))).into_response()
        }
    }
}

async fn resend_handler<R>(
    State(state): State<Arc<AuthState<R>>>,
    request: Result<Json<EmailRequest>, JsonRejection>,
) -> Response
where
    R: ProfileRepository + 'static,
{
    let request = match json_request(request) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.service.resend_code(&request.email).await {
        Ok(()) => message(StatusCode::OK, "Verification code has been resent to your email"),
        Err(error) => auth_error_response(error),
    }
}

async fn login_handler<R>(
    State(state): State<Arc<AuthState<R>>>,
    request: Result<Json<LoginRequest>, JsonRejection>,
) -> Response
where
    R: ProfileRepository + 'static,
{
    let request = match json_request(request) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.service.login(&request.email, &request.password).await {
        Ok(outcome) => {
            let payload = json!({
                "tokens": outcome.tokens,
                "user": OwnProfile::from(&outcome.profile),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => auth_error_response(error),
    }
}

async fn forgot_handler<R>(
    State(state): State<Arc<AuthState<R>>>,
    request: Result<Json<EmailRequest>, JsonRejection>,
) -> Response
where
    R: ProfileRepository + 'static,
{
    let request = match json_request(request) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.service.forgot_password(&request.email).await {
        Ok(()) => message(
            StatusCode::OK,
            "If your email exists in our system, a password reset code has been sent",
        ),
        Err(error) => auth_error_response(error),
    }
}

async fn reset_handler<R>(
    State(state): State<Arc<AuthState<R>>>,
    request: Result<Json<ResetRequest>, JsonRejection>,
) -> Response
where
    R: ProfileRepository + 'static,
{
    let request = match json_request(request) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state
        .service
        .reset_password(&request.email, &request.code, &request.new_password)
        .await
    {
        Ok(()) => message(StatusCode::OK, "Password has been reset successfully"),
        Err(error) => auth_error_response(error),
    }
}

async fn me_handler<R>(State(state): State<Arc<AuthState<R>>>, user: AuthenticatedUser) -> Response
where
    R: ProfileRepository + 'static,
{
    match state.service.me(&user.subject) {
        Ok(profile) => {
            let payload = json!({ "user": OwnProfile::from(&profile) });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => auth_error_response(error),
    }
}

pub(crate) fn auth_error_response(error: AuthServiceError) -> Response {
    match error {
        AuthServiceError::Invalid(text) => error_body(StatusCode::BAD_REQUEST, &text),
        AuthServiceError::Provider(err) => {
            if let IdentityError::Service(detail) = &err {
                tracing::error!(detail = %detail, "identity provider failure");
            }
            error_body(StatusCode::BAD_REQUEST, &err.to_string())
        }
        AuthServiceError::InvalidCredentials => {
            error_body(StatusCode::UNAUTHORIZED, "Invalid credentials")
        }
        AuthServiceError::UserInfo(err) => {
            tracing::error!(error = ?err, "failed to fetch user info after login");
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to retrieve user information",
            )
        }
        AuthServiceError::NotFound => error_body(StatusCode::NOT_FOUND, "User not found"),
        AuthServiceError::Repository(err) => {
            tracing::error!(error = %err, "profile repository failure");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

/// Unreadable bodies answer with the same `{error}` shape as every other failure.
fn json_request<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload.map(|Json(request)| request).map_err(|rejection| {
        error_body(
            StatusCode::BAD_REQUEST,
            &format!("Invalid request body: {}", rejection.body_text()),
        )
    })
}

fn error_body(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "error": text }))).into_response()
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}
