//! In-process identity provider for development and tests.
//!
//! Accounts live in memory and passwords are compared as given, so this provider must
//! never back a production deployment. Confirmation and reset codes are written to the
//! log in place of e-mail delivery.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::provider::{
    AccessClaims, AuthTokens, IdentityError, IdentityProvider, IdentityUser, Registration,
    SignUpOutcome,
};
use crate::profiles::domain::IdentitySubject;

const ISSUER: &str = "headstart-local";
const TOKEN_TTL_SECONDS: i64 = 3600;
const CODE_TTL_HOURS: i64 = 24;
const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Debug, Clone)]
struct IssuedCode {
    code: String,
    expires_at: DateTime<Utc>,
}

impl IssuedCode {
    fn fresh() -> Self {
        let code = format!("{:06}", uuid::Uuid::new_v4().as_u128() % 1_000_000);
        Self {
            code,
            expires_at: Utc::now() + Duration::hours(CODE_TTL_HOURS),
        }
    }

    fn check(&self, candidate: &str) -> Result<(), IdentityError> {
        if self.code != candidate.trim() {
            return Err(IdentityError::InvalidCode);
        }
        if Utc::now() > self.expires_at {
            return Err(IdentityError::CodeExpired);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct LocalAccount {
    subject: IdentitySubject,
    email: String,
    password: String,
    confirmed: bool,
    attributes: BTreeMap<String, String>,
    groups: Vec<String>,
    confirmation: Option<IssuedCode>,
    reset: Option<IssuedCode>,
}

impl LocalAccount {
    fn to_user(&self) -> IdentityUser {
        let mut attributes = self.attributes.clone();
        attributes.insert("sub".to_string(), self.subject.0.clone());
        attributes.insert("email".to_string(), self.email.clone());
        attributes.insert("email_verified".to_string(), self.confirmed.to_string());
        IdentityUser {
            subject: self.subject.clone(),
            attributes,
            groups: self.groups.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LocalClaims {
    sub: String,
    iss: String,
    exp: i64,
    iat: i64,
    token_use: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(rename = "cognito:groups", default)]
    groups: Vec<String>,
}

/// Keeps accounts in memory and signs HS256 tokens shaped like Cognito's.
pub struct LocalIdentityProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    auto_confirm: bool,
    accounts: Mutex<HashMap<String, LocalAccount>>,
}

impl LocalIdentityProvider {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            auto_confirm: false,
            accounts: Mutex::new(HashMap::new()),
        }
    }

    /// Confirm accounts at sign-up instead of waiting for a code.
    pub fn auto_confirm(mut self, enabled: bool) -> Self {
        self.auto_confirm = enabled;
        self
    }

    /// The outstanding confirmation code for an account, if any.
    pub fn pending_confirmation_code(&self, username: &str) -> Option<String> {
        let accounts = self.accounts.lock().expect("account mutex poisoned");
        accounts
            .get(&normalize(username))
            .and_then(|account| account.confirmation.as_ref())
            .map(|issued| issued.code.clone())
    }

    /// The outstanding password-reset code for an account, if any.
    pub fn pending_reset_code(&self, username: &str) -> Option<String> {
        let accounts = self.accounts.lock().expect("account mutex poisoned");
        accounts
            .get(&normalize(username))
            .and_then(|account| account.reset.as_ref())
            .map(|issued| issued.code.clone())
    }

    /// Overwrite provider-side attributes, e.g. `custom:role`.
    pub fn set_attribute(
        &self,
        username: &str,
        name: &str,
        value: &str,
    ) -> Result<(), IdentityError> {
        let mut accounts = self.accounts.lock().expect("account mutex poisoned");
        let account = accounts
            .get_mut(&normalize(username))
            .ok_or(IdentityError::UserNotFound)?;
        account
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn sign(&self, account: &LocalAccount, token_use: &str) -> Result<String, IdentityError> {
        let now = Utc::now().timestamp();
        let claims = LocalClaims {
            sub: account.subject.0.clone(),
            iss: ISSUER.to_string(),
            exp: now + TOKEN_TTL_SECONDS,
            iat: now,
            token_use: token_use.to_string(),
            username: Some(account.email.clone()),
            email: (token_use == "id").then(|| account.email.clone()),
            groups: account.groups.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| IdentityError::Service(format!("token signing failed: {err}")))
    }

    fn decode_access(&self, token: &str) -> Result<LocalClaims, IdentityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        let data = decode::<LocalClaims>(token, &self.decoding, &validation)
            .map_err(|_| IdentityError::InvalidToken)?;
        if data.claims.token_use != "access" {
            return Err(IdentityError::InvalidToken);
        }
        Ok(data.claims)
    }
}

impl std::fmt::Debug for LocalIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIdentityProvider")
            .field("auto_confirm", &self.auto_confirm)
            .finish_non_exhaustive()
    }
}

fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

fn check_password(password: &str) -> Result<(), IdentityError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(IdentityError::InvalidPassword);
    }
    Ok(())
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn register(&self, registration: &Registration) -> Result<SignUpOutcome, IdentityError> {
        check_password(&registration.password)?;
        let key = normalize(&registration.email);

        let mut accounts = self.accounts.lock().expect("account mutex poisoned");
        if accounts.contains_key(&key) {
            return Err(IdentityError::UserExists);
        }

        let mut attributes = BTreeMap::new();
        if let Some(name) = &registration.display_name {
            attributes.insert("preferred_username".to_string(), name.clone());
        }
        let confirmation = (!self.auto_confirm).then(IssuedCode::fresh);
        if let Some(issued) = &confirmation {
            tracing::info!(email = %key, code = %issued.code, "confirmation code issued");
        }

        let account = LocalAccount {
            subject: IdentitySubject(uuid::Uuid::new_v4().to_string()),
            email: key.clone(),
            password: registration.password.clone(),
            confirmed: self.auto_confirm,
            attributes,
            groups: Vec::new(),
            confirmation,
            reset: None,
        };
        let outcome = SignUpOutcome {
            user_sub: account.subject.0.clone(),
            user_confirmed: account.confirmed,
        };
        accounts.insert(key, account);
        Ok(outcome)
    }

    async fn confirm_registration(&self, username: &str, code: &str) -> Result<(), IdentityError> {
        let mut accounts = self.accounts.lock().expect("account mutex poisoned");
        let account = accounts
            .get_mut(&normalize(username))
            .ok_or(IdentityError::UserNotFound)?;
        if account.confirmed {
            return Err(IdentityError::NotAuthorized);
        }
        account
            .confirmation
            .as_ref()
            .ok_or(IdentityError::InvalidCode)?
            .check(code)?;
        account.confirmed = true;
        account.confirmation = None;
        Ok(())
    }

    async fn resend_code(&self, username: &str) -> Result<(), IdentityError> {
        let mut accounts = self.accounts.lock().expect("account mutex poisoned");
        let account = accounts
            .get_mut(&normalize(username))
            .ok_or(IdentityError::UserNotFound)?;
        if account.confirmed {
            return Err(IdentityError::NotAuthorized);
        }
        let issued = IssuedCode::fresh();
        tracing::info!(email = %account.email, code = %issued.code, "confirmation code reissued");
        account.confirmation = Some(issued);
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<AuthTokens, IdentityError> {
        let account = {
            let accounts = self.accounts.lock().expect("account mutex poisoned");
            accounts
                .get(&normalize(username))
                .cloned()
                .ok_or(IdentityError::NotAuthorized)?
        };
        if account.password != password {
            return Err(IdentityError::NotAuthorized);
        }
        if !account.confirmed {
            return Err(IdentityError::UserNotConfirmed);
        }

        Ok(AuthTokens {
            id_token: self.sign(&account, "id")?,
            access_token: self.sign(&account, "access")?,
            refresh_token: uuid::Uuid::new_v4().simple().to_string(),
            expires_in: TOKEN_TTL_SECONDS as u64,
        })
    }

    async fn forgot_password(&self, username: &str) -> Result<(), IdentityError> {
        let mut accounts = self.accounts.lock().expect("account mutex poisoned");
        let account = accounts
            .get_mut(&normalize(username))
            .ok_or(IdentityError::UserNotFound)?;
        let issued = IssuedCode::fresh();
        tracing::info!(email = %account.email, code = %issued.code, "password reset code issued");
        account.reset = Some(issued);
        Ok(())
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        check_password(new_password)?;
        let mut accounts = self.accounts.lock().expect("account mutex poisoned");
        let account = accounts
            .get_mut(&normalize(username))
            .ok_or(IdentityError::UserNotFound)?;
        account
            .reset
            .as_ref()
            .ok_or(IdentityError::InvalidCode)?
            .check(code)?;
        account.password = new_password.to_string();
        account.reset = None;
        Ok(())
    }

    async fn user_info(&self, access_token: &str) -> Result<IdentityUser, IdentityError> {
        let claims = self.decode_access(access_token)?;
        let accounts = self.accounts.lock().expect("account mutex poisoned");
        accounts
            .values()
            .find(|account| account.subject.0 == claims.sub)
            .map(LocalAccount::to_user)
            .ok_or(IdentityError::UserNotFound)
    }

    async fn add_to_group(&self, username: &str, group: &str) -> Result<(), IdentityError> {
        let mut accounts = self.accounts.lock().expect("account mutex poisoned");
        let account = accounts
            .get_mut(&normalize(username))
            .ok_or(IdentityError::UserNotFound)?;
        if !account.groups.iter().any(|existing| existing == group) {
            account.groups.push(group.to_string());
        }
        Ok(())
    }

    async fn lookup_user(&self, username: &str) -> Result<Option<IdentityUser>, IdentityError> {
        let accounts = self.accounts.lock().expect("account mutex poisoned");
        Ok(accounts.get(&normalize(username)).map(LocalAccount::to_user))
    }

    async fn verify_access_token(&self, token: &str) -> Result<AccessClaims, IdentityError> {
        let claims = self.decode_access(token)?;
        Ok(AccessClaims {
            subject: IdentitySubject(claims.sub),
            username: claims.username,
            groups: claims.groups,
        })
    }
}
