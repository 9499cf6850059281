use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::provider::{AccessClaims, IdentityProvider};
use crate::profiles::domain::IdentitySubject;

/// Request extension carrying the provider used to verify bearer tokens.
#[derive(Clone)]
pub struct SessionVerifier(pub Arc<dyn IdentityProvider>);

impl SessionVerifier {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self(provider)
    }
}

/// Caller identity resolved from `Authorization: Bearer <access token>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub subject: IdentitySubject,
    pub username: Option<String>,
    pub groups: Vec<String>,
    pub access_token: String,
}

impl AuthenticatedUser {
    fn from_claims(claims: AccessClaims, access_token: String) -> Self {
        Self {
            subject: claims.subject,
            username: claims.username,
            groups: claims.groups,
            access_token,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.groups.iter().any(|group| group == "Admins")
    }
}

/// An [`AuthenticatedUser`] that belongs to the `Admins` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser(pub AuthenticatedUser);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRejection {
    MissingToken,
    TokenFailed,
    NotAdmin,
    Misconfigured,
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            SessionRejection::MissingToken => (StatusCode::UNAUTHORIZED, "Not authorized, no token"),
            SessionRejection::TokenFailed => {
                (StatusCode::UNAUTHORIZED, "Not authorized, token failed")
            }
            SessionRejection::NotAdmin => (StatusCode::FORBIDDEN, "Not authorized as an admin"),
            SessionRejection::Misconfigured => (StatusCode::INTERNAL_SERVER_ERROR, "Server error"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = SessionRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(SessionRejection::MissingToken)?;
        let Some(verifier) = parts.extensions.get::<SessionVerifier>().cloned() else {
            tracing::error!("session verifier extension is not installed");
            return Err(SessionRejection::Misconfigured);
        };

        match verifier.0.verify_access_token(&token).await {
            Ok(claims) => Ok(Self::from_claims(claims, token)),
            Err(err) => {
                tracing::warn!(error = %err, "token verification failed");
                Err(SessionRejection::TokenFailed)
            }
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = SessionRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if user.is_admin() {
            Ok(AdminUser(user))
        } else {
            Err(SessionRejection::NotAdmin)
        }
    }
}
