//! Cognito user-pool adapter speaking the JSON 1.1 protocol.
//!
//! Client operations are unauthenticated, so the app client must be created without a
//! secret. Admin operations are SigV4-signed with the configured IAM credentials. Access
//! tokens are verified locally against the pool JWKS.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::{header, Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::provider::{
    AccessClaims, AuthTokens, IdentityError, IdentityProvider, IdentityUser, Registration,
    SignUpOutcome,
};
use super::sigv4::{self, SigningRequest};
use crate::config::{AwsCredentials, CognitoConfig};
use crate::profiles::domain::IdentitySubject;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const SIGNING_SERVICE: &str = "cognito-idp";
/// Unknown `kid`s trigger at most one JWKS download per interval.
const JWKS_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Default)]
struct KeyCache {
    keys: Option<JwkSet>,
    fetched_at: Option<Instant>,
}

impl KeyCache {
    fn may_refresh(&self) -> bool {
        self.fetched_at
            .map_or(true, |at| at.elapsed() >= JWKS_REFRESH_INTERVAL)
    }
}

pub struct CognitoIdentityProvider {
    http: Client,
    endpoint: String,
    region: String,
    user_pool_id: String,
    issuer: String,
    jwks_url: String,
    client_id: String,
    credentials: Option<AwsCredentials>,
    keys: RwLock<KeyCache>,
}

impl CognitoIdentityProvider {
    pub fn new(config: &CognitoConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: &CognitoConfig, http: Client) -> Self {
        Self {
            http,
            endpoint: config.endpoint_url(),
            region: config.region.clone(),
            user_pool_id: config.user_pool_id.clone(),
            issuer: config.issuer(),
            jwks_url: config.jwks_url(),
            client_id: config.client_id.clone(),
            credentials: config.credentials.clone(),
            keys: RwLock::new(KeyCache::default()),
        }
    }

    async fn call<T: DeserializeOwned>(&self, action: &str, body: Value) -> Result<T, IdentityError> {
        self.send(action, body, None).await
    }

    /// Admin actions need SigV4; without credentials they are unsupported.
    async fn admin_call<T: DeserializeOwned>(
        &self,
        action: &str,
        body: Value,
    ) -> Result<T, IdentityError> {
        let Some(credentials) = self.credentials.as_ref() else {
            tracing::debug!(action, "no AWS credentials configured for admin call");
            return Err(IdentityError::Unsupported);
        };
        self.send(action, body, Some(credentials)).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        action: &str,
        body: Value,
        credentials: Option<&AwsCredentials>,
    ) -> Result<T, IdentityError> {
        let url = format!("{}/", self.endpoint);
        let target = format!("{TARGET_PREFIX}.{action}");
        let payload = body.to_string();

        let mut request = self
            .http
            .post(&url)
            .header("X-Amz-Target", &target)
            .header(header::CONTENT_TYPE, CONTENT_TYPE);
        if let Some(credentials) = credentials {
            let parsed = Url::parse(&url)
                .map_err(|err| IdentityError::Service(format!("{action}: {err}")))?;
            let host = match (parsed.host_str(), parsed.port()) {
                (Some(host), Some(port)) => format!("{host}:{port}"),
                (Some(host), None) => host.to_string(),
                (None, _) => {
                    return Err(IdentityError::Service(format!("{action}: endpoint has no host")))
                }
            };
            let signed = sigv4::sign(
                &SigningRequest {
                    host: &host,
                    path: parsed.path(),
                    target: &target,
                    content_type: CONTENT_TYPE,
                    body: payload.as_bytes(),
                },
                credentials,
                &self.region,
                SIGNING_SERVICE,
                Utc::now(),
            );
            request = request
                .header("X-Amz-Date", signed.amz_date)
                .header(header::AUTHORIZATION, signed.authorization);
            if let Some(token) = signed.security_token {
                request = request.header("X-Amz-Security-Token", token);
            }
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|err| IdentityError::Service(format!("{action}: {err}")))?;

        let status = response.status();
        let header_code = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(':').next().unwrap_or(value).to_string());
        let text = response
            .text()
            .await
            .map_err(|err| IdentityError::Service(format!("{action}: {err}")))?;

        if !status.is_success() {
            let fault: CognitoFault = serde_json::from_str(&text).unwrap_or_default();
            let code = fault
                .kind
                .or(header_code)
                .unwrap_or_else(|| format!("HTTP {status}"));
            let error = IdentityError::from_code(&code, fault.message.unwrap_or_default());
            tracing::debug!(action, error = ?error, "cognito call rejected");
            return Err(error);
        }

        // Several actions answer with an empty body.
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text)
            .map_err(|err| IdentityError::Service(format!("{action}: malformed response: {err}")))
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey, IdentityError> {
        {
            let cached = self.keys.read().await;
            if let Some(jwk) = cached.keys.as_ref().and_then(|set| set.find(kid)) {
                return DecodingKey::from_jwk(jwk).map_err(|_| IdentityError::InvalidToken);
            }
        }

        // Unknown kid: the pool may have rotated its keys.
        let mut cache = self.keys.write().await;
        if let Some(jwk) = cache.keys.as_ref().and_then(|set| set.find(kid)) {
            return DecodingKey::from_jwk(jwk).map_err(|_| IdentityError::InvalidToken);
        }
        if !cache.may_refresh() {
            tracing::debug!(kid, "unknown signing key; jwks refreshed recently");
            return Err(IdentityError::InvalidToken);
        }
        cache.fetched_at = Some(Instant::now());

        let fresh: JwkSet = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| IdentityError::Service(format!("jwks: {err}")))?
            .json()
            .await
            .map_err(|err| IdentityError::Service(format!("jwks: {err}")))?;

        let key = fresh
            .find(kid)
            .map(DecodingKey::from_jwk)
            .transpose()
            .map_err(|_| IdentityError::InvalidToken)?;
        cache.keys = Some(fresh);
        key.ok_or(IdentityError::InvalidToken)
    }
}

impl std::fmt::Debug for CognitoIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CognitoIdentityProvider")
            .field("endpoint", &self.endpoint)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Deserialize)]
struct CognitoFault {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpResponse {
    user_confirmed: bool,
    user_sub: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    id_token: String,
    #[serde(default)]
    refresh_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserResponse {
    #[serde(default)]
    user_attributes: Vec<AttributeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeEntry {
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct Ignored {}

#[derive(Debug, Deserialize)]
struct CognitoAccessClaims {
    sub: String,
    token_use: String,
    client_id: Option<String>,
    username: Option<String>,
    #[serde(rename = "cognito:groups", default)]
    groups: Vec<String>,
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn register(&self, registration: &Registration) -> Result<SignUpOutcome, IdentityError> {
        let mut attributes = vec![json!({ "Name": "email", "Value": registration.email })];
        if let Some(name) = registration.display_name.as_deref() {
            attributes.push(json!({ "Name": "preferred_username", "Value": name }));
        }
        let response: SignUpResponse = self
            .call(
                "SignUp",
                json!({
                    "ClientId": self.client_id,
                    "Username": registration.email,
                    "Password": registration.password,
                    "UserAttributes": attributes,
                }),
            )
            .await?;
        Ok(SignUpOutcome {
            user_sub: response.user_sub,
            user_confirmed: response.user_confirmed,
        })
    }

    async fn confirm_registration(&self, username: &str, code: &str) -> Result<(), IdentityError> {
        let _: Ignored = self
            .call(
                "ConfirmSignUp",
                json!({
                    "ClientId": self.client_id,
                    "Username": username,
                    "ConfirmationCode": code,
                }),
            )
            .await?;
        Ok(())
    }

    async fn resend_code(&self, username: &str) -> Result<(), IdentityError> {
        let _: Ignored = self
            .call(
                "ResendConfirmationCode",
                json!({ "ClientId": self.client_id, "Username": username }),
            )
            .await?;
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<AuthTokens, IdentityError> {
        let response: InitiateAuthResponse = self
            .call(
                "InitiateAuth",
                json!({
                    "ClientId": self.client_id,
                    "AuthFlow": "USER_PASSWORD_AUTH",
                    "AuthParameters": { "USERNAME": username, "PASSWORD": password },
                }),
            )
            .await?;

        match response.authentication_result {
            Some(result) => Ok(AuthTokens {
                id_token: result.id_token,
                access_token: result.access_token,
                refresh_token: result.refresh_token,
                expires_in: result.expires_in,
            }),
            None => Err(IdentityError::Service(format!(
                "unsupported challenge {}",
                response.challenge_name.unwrap_or_default()
            ))),
        }
    }

    async fn forgot_password(&self, username: &str) -> Result<(), IdentityError> {
        let _: Ignored = self
            .call(
                "ForgotPassword",
                json!({ "ClientId": self.client_id, "Username": username }),
            )
            .await?;
        Ok(())
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        let _: Ignored = self
            .call(
                "ConfirmForgotPassword",
                json!({
                    "ClientId": self.client_id,
                    "Username": username,
                    "ConfirmationCode": code,
                    "Password": new_password,
                }),
            )
            .await?;
        Ok(())
    }

    async fn user_info(&self, access_token: &str) -> Result<IdentityUser, IdentityError> {
        // GetUser carries no groups; they come from the verified token.
        let claims = self.verify_access_token(access_token).await?;
        let response: GetUserResponse = self
            .call("GetUser", json!({ "AccessToken": access_token }))
            .await?;

        let attributes: BTreeMap<String, String> = response
            .user_attributes
            .into_iter()
            .map(|entry| (entry.name, entry.value))
            .collect();
        Ok(IdentityUser {
            subject: claims.subject,
            attributes,
            groups: claims.groups,
        })
    }

    async fn add_to_group(&self, username: &str, group: &str) -> Result<(), IdentityError> {
        let _: Ignored = self
            .admin_call(
                "AdminAddUserToGroup",
                json!({
                    "UserPoolId": self.user_pool_id,
                    "Username": username,
                    "GroupName": group,
                }),
            )
            .await?;
        Ok(())
    }

    async fn verify_access_token(&self, token: &str) -> Result<AccessClaims, IdentityError> {
        let header = decode_header(token).map_err(|_| IdentityError::InvalidToken)?;
        let kid = header.kid.ok_or(IdentityError::InvalidToken)?;
        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.validate_aud = false;

        let claims = decode::<CognitoAccessClaims>(token, &key, &validation)
            .map_err(|_| IdentityError::InvalidToken)?
            .claims;
        if claims.token_use != "access" || claims.client_id.as_deref() != Some(&self.client_id) {
            return Err(IdentityError::InvalidToken);
        }

        Ok(AccessClaims {
            subject: IdentitySubject(claims.sub),
            username: claims.username,
            groups: claims.groups,
        })
    }
}
