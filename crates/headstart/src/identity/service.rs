use std::sync::Arc;

use chrono::Utc;

use super::provider::{
    AuthTokens, IdentityError, IdentityProvider, IdentityUser, Registration, SignUpOutcome,
};
use crate::profiles::domain::{
    cap_groups, default_display_name, IdentitySubject, Role, UserProfile, MAX_NAME_CHARS,
    MAX_SKILLS, MAX_SKILL_CHARS,
};
use crate::profiles::repository::{ProfileRepository, RepositoryError};
use crate::profiles::sanitize::{is_valid_email, sanitize_truncated};

/// Group every confirmed member joins.
pub const MEMBER_GROUP: &str = "Users";

const PASSWORD_SPECIALS: &str = "@$!%*?&";
const MIN_PASSWORD_CHARS: usize = 8;

/// Successful login: provider tokens plus the reconciled profile.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: AuthTokens,
    pub profile: UserProfile,
}

/// Sign-up, confirmation, login and profile reconciliation on top of the identity
/// provider.
pub struct AuthService<R> {
    provider: Arc<dyn IdentityProvider>,
    repository: Arc<R>,
}

impl<R> AuthService<R>
where
    R: ProfileRepository + 'static,
{
    pub fn new(provider: Arc<dyn IdentityProvider>, repository: Arc<R>) -> Self {
        Self {
            provider,
            repository,
        }
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<SignUpOutcome, AuthServiceError> {
        validate_registration(email, password)?;

        let registration = Registration {
            email: email.trim().to_string(),
            password: password.to_string(),
            display_name: display_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        };
        let outcome = self.provider.register(&registration).await?;

        if outcome.user_confirmed {
            self.join_member_group(&registration.email).await;
        }
        tracing::info!(
            email = %registration.email,
            confirmed = outcome.user_confirmed,
            "user registered"
        );
        Ok(outcome)
    }

    /// Confirm the account. Returns the profile when the provider can resolve the
    /// account without a token; otherwise the profile is created on first login.
    pub async fn verify(
        &self,
        username: &str,
        code: &str,
    ) -> Result<Option<UserProfile>, AuthServiceError> {
        let username = username.trim();
        if username.is_empty() || code.trim().is_empty() {
            return Err(AuthServiceError::Invalid(
                "Email and verification code are required".to_string(),
            ));
        }

        self.provider.confirm_registration(username, code.trim()).await?;
        self.join_member_group(username).await;

        match self.provider.lookup_user(username).await {
            Ok(Some(user)) => {
                let profile = self.find_or_bind(username, &user, false)?;
                Ok(Some(profile))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                tracing::warn!(email = %username, error = %err, "could not resolve verified user");
                Ok(None)
            }
        }
    }

    pub async fn resend_code(&self, email: &str) -> Result<(), AuthServiceError> {
        let email = require_email(email)?;
        self.provider.resend_code(email).await?;
        Ok(())
    }

    /// Never reveals whether the account exists.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthServiceError> {
        let email = require_email(email)?;
        if let Err(err) = self.provider.forgot_password(email).await {
            tracing::info!(email = %email, error = %err, "password reset request not delivered");
        }
        Ok(())
    }

    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthServiceError> {
        if email.trim().is_empty() || code.trim().is_empty() || new_password.is_empty() {
            return Err(AuthServiceError::Invalid(
                "Email, code, and new password are required".to_string(),
            ));
        }
        self.provider
            .confirm_forgot_password(email.trim(), code.trim(), new_password)
            .await?;
        tracing::info!(email = %email.trim(), "password reset");
        Ok(())
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthServiceError> {
        let email = require_email(email)?;
        if password.is_empty() {
            return Err(AuthServiceError::Invalid("Password is required".to_string()));
        }

        let tokens = match self.provider.login(email, password).await {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::warn!(email = %email, error = %err, "login rejected");
                return Err(AuthServiceError::InvalidCredentials);
            }
        };

        let user = self
            .provider
            .user_info(&tokens.access_token)
            .await
            .map_err(AuthServiceError::UserInfo)?;
        let profile = self.find_or_bind(email, &user, true)?;
        Ok(LoginOutcome { tokens, profile })
    }

    pub fn me(&self, subject: &IdentitySubject) -> Result<UserProfile, AuthServiceError> {
        self.repository
            .find_by_identity(subject)?
            .ok_or(AuthServiceError::NotFound)
    }

    /// Locate the stored profile by identity, then by contact e-mail (rebinding the
    /// identity), else create one. `refresh` overlays provider attributes on a match.
    fn find_or_bind(
        &self,
        email: &str,
        user: &IdentityUser,
        refresh: bool,
    ) -> Result<UserProfile, AuthServiceError> {
        if let Some(mut profile) = self.repository.find_by_identity(&user.subject)? {
            if refresh {
                refresh_from_login(&mut profile, email, user);
                self.repository.update(profile.clone())?;
            }
            return Ok(profile);
        }

        if let Some(mut profile) = self.repository.find_by_contact_email(email)? {
            tracing::warn!(
                email = %email,
                profile_id = %profile.id,
                old_identity = %profile.identity_id,
                new_identity = %user.subject,
                "profile matched by contact email; identity rebound"
            );
            profile.identity_id = user.subject.clone();
            if refresh {
                refresh_from_login(&mut profile, email, user);
            }
            self.repository.update(profile.clone())?;
            return Ok(profile);
        }

        let profile = self.repository.insert(profile_from_identity(email, user))?;
        tracing::info!(email = %email, profile_id = %profile.id, "profile created");
        Ok(profile)
    }

    async fn join_member_group(&self, username: &str) {
        if let Err(err) = self.provider.add_to_group(username, MEMBER_GROUP).await {
            tracing::warn!(email = %username, error = %err, "failed to add user to group");
        }
    }
}

/// First-time profile built from provider attributes.
pub fn profile_from_identity(email: &str, user: &IdentityUser) -> UserProfile {
    let mut profile = UserProfile::new(user.subject.clone(), email);
    profile.name = user
        .attribute("preferred_username")
        .map(display_name)
        .unwrap_or_else(|| default_display_name(email));
    profile.photo_url = user.attribute("picture").map(str::to_string);
    profile.role = user
        .attribute("custom:role")
        .and_then(Role::from_label)
        .unwrap_or(Role::Undecided);
    profile.contact.phone = user.attribute("phone_number").map(str::to_string);
    profile.contact.slack = user.attribute("custom:slack").map(str::to_string);
    profile.skills = user.attribute("custom:skills").map(split_skills).unwrap_or_default();
    profile.groups = cap_groups(&user.groups);
    profile.last_login = Some(Utc::now());
    profile
}

/// Overlay what the provider reports on an existing profile after login.
pub fn refresh_from_login(profile: &mut UserProfile, email: &str, user: &IdentityUser) {
    profile.last_login = Some(Utc::now());
    profile.groups = cap_groups(&user.groups);
    if let Some(name) = user.attribute("name") {
        profile.name = display_name(name);
    }
    if let Some(picture) = user.attribute("picture") {
        profile.photo_url = Some(picture.to_string());
    }
    profile.email = email.to_string();
    profile.contact.email = Some(email.to_string());
    if let Some(phone) = user.attribute("phone_number") {
        profile.contact.phone = Some(phone.to_string());
    }
    if let Some(slack) = user.attribute("custom:slack") {
        profile.contact.slack = Some(slack.to_string());
    }
    if let Some(skills) = user.attribute("custom:skills") {
        profile.skills = split_skills(skills);
    }
}

fn display_name(raw: &str) -> String {
    sanitize_truncated(raw, MAX_NAME_CHARS)
}

fn split_skills(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|skill| sanitize_truncated(skill, MAX_SKILL_CHARS))
        .filter(|skill| !skill.is_empty())
        .take(MAX_SKILLS)
        .collect()
}

fn require_email(email: &str) -> Result<&str, AuthServiceError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthServiceError::Invalid("Email is required".to_string()));
    }
    Ok(email)
}

fn validate_registration(email: &str, password: &str) -> Result<(), AuthServiceError> {
    let email = require_email(email)?;
    if password.is_empty() {
        return Err(AuthServiceError::Invalid("Password is required".to_string()));
    }
    if !is_valid_email(email) {
        return Err(AuthServiceError::Invalid(
            "Please provide a valid email address".to_string(),
        ));
    }
    if !is_strong_password(password) {
        return Err(AuthServiceError::Invalid(
            "Password must be at least 8 characters and include uppercase, lowercase, number, and special character"
                .to_string(),
        ));
    }
    Ok(())
}

/// At least eight characters drawn from letters, digits and `@$!%*?&`, with one of
/// each class present.
pub fn is_strong_password(candidate: &str) -> bool {
    let allowed = |c: char| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c);
    candidate.chars().count() >= MIN_PASSWORD_CHARS
        && candidate.chars().all(allowed)
        && candidate.chars().any(|c| c.is_ascii_lowercase())
        && candidate.chars().any(|c| c.is_ascii_uppercase())
        && candidate.chars().any(|c| c.is_ascii_digit())
        && candidate.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

/// Error raised by the authentication service.
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Provider(#[from] IdentityError),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Failed to retrieve user information")]
    UserInfo(IdentityError),
    #[error("User not found")]
    NotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
