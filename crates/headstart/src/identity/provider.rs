use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::profiles::domain::IdentitySubject;

/// Sign-up request forwarded to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpOutcome {
    pub user_sub: String,
    pub user_confirmed: bool,
}

/// Token triple issued on a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

/// Flat attribute map plus group names, as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityUser {
    pub subject: IdentitySubject,
    pub attributes: BTreeMap<String, String>,
    pub groups: Vec<String>,
}

impl IdentityUser {
    /// Attribute value, with blank values treated as absent.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }
}

/// Claims of a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    pub subject: IdentitySubject,
    pub username: Option<String>,
    pub groups: Vec<String>,
}

impl AccessClaims {
    pub fn is_admin(&self) -> bool {
        self.groups.iter().any(|group| group == "Admins")
    }
}

/// Stable vocabulary for identity-provider failures. Display strings are safe to
/// show to clients; upstream detail only travels inside `Service` for logging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("User already exists")]
    UserExists,
    #[error("Password does not meet requirements")]
    InvalidPassword,
    #[error("Invalid verification code")]
    InvalidCode,
    #[error("Verification code has expired")]
    CodeExpired,
    #[error("User not found")]
    UserNotFound,
    #[error("Incorrect username or password")]
    NotAuthorized,
    #[error("User is not confirmed")]
    UserNotConfirmed,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Operation not supported by the identity provider")]
    Unsupported,
    #[error("An error occurred with the authentication service")]
    Service(String),
}

impl IdentityError {
    /// Map an upstream error type name onto the vocabulary.
    pub fn from_code(code: &str, detail: impl Into<String>) -> Self {
        // Cognito prefixes some codes with a namespace: "ns#UserNotFoundException".
        let code = code.rsplit('#').next().unwrap_or(code);
        match code {
            "UsernameExistsException" => Self::UserExists,
            "InvalidPasswordException" => Self::InvalidPassword,
            "CodeMismatchException" => Self::InvalidCode,
            "ExpiredCodeException" => Self::CodeExpired,
            "UserNotFoundException" => Self::UserNotFound,
            "NotAuthorizedException" => Self::NotAuthorized,
            "UserNotConfirmedException" => Self::UserNotConfirmed,
            _ => Self::Service(format!("{code}: {}", detail.into())),
        }
    }
}

/// External identity provider (Cognito or a local stand-in).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn register(&self, registration: &Registration) -> Result<SignUpOutcome, IdentityError>;
    async fn confirm_registration(&self, username: &str, code: &str) -> Result<(), IdentityError>;
    async fn resend_code(&self, username: &str) -> Result<(), IdentityError>;
    async fn login(&self, username: &str, password: &str) -> Result<AuthTokens, IdentityError>;
    async fn forgot_password(&self, username: &str) -> Result<(), IdentityError>;
    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), IdentityError>;
    async fn user_info(&self, access_token: &str) -> Result<IdentityUser, IdentityError>;
    async fn add_to_group(&self, username: &str, group: &str) -> Result<(), IdentityError>;

    /// Resolve an account without a token. Providers that need admin credentials for
    /// this return `None`.
    async fn lookup_user(&self, _username: &str) -> Result<Option<IdentityUser>, IdentityError> {
        Ok(None)
    }

    async fn verify_access_token(&self, token: &str) -> Result<AccessClaims, IdentityError>;
}
