use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::matching::EmptySelection;

const DEV_JWT_SECRET: &str = "headstart-development-secret";
const DEFAULT_COGNITO_REGION: &str = "us-east-1";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub identity: IdentityConfig,
    pub photos: PhotoConfig,
    pub dashboard: DashboardConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "7000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        let frontend_url = env::var("APP_FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let default_level = if environment.is_production() {
            "info"
        } else {
            "debug"
        };
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| default_level.to_string());

        let identity = IdentityConfig::load(environment)?;

        let public_url = env::var("APP_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));
        let photo_dir = env::var("APP_PHOTO_DIR").unwrap_or_else(|_| "./uploads".to_string());

        let empty_needs = match env::var("APP_EMPTY_NEEDS_POLICY") {
            Ok(raw) => EmptySelection::parse(&raw).ok_or(ConfigError::InvalidValue {
                name: "APP_EMPTY_NEEDS_POLICY",
                value: raw,
            })?,
            Err(_) => EmptySelection::default(),
        };

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                frontend_url,
            },
            telemetry: TelemetryConfig { log_level },
            identity,
            photos: PhotoConfig {
                directory: PathBuf::from(photo_dir),
                public_url,
            },
            dashboard: DashboardConfig { empty_needs },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Where the verification link sends members afterwards.
    pub frontend_url: String,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Which identity provider backs authentication.
#[derive(Debug, Clone)]
pub enum IdentityConfig {
    Local { jwt_secret: String },
    Cognito(CognitoConfig),
}

impl IdentityConfig {
    fn load(environment: AppEnvironment) -> Result<Self, ConfigError> {
        let provider = env::var("APP_IDENTITY_PROVIDER").unwrap_or_else(|_| "local".to_string());
        match provider.trim().to_ascii_lowercase().as_str() {
            "local" => {
                let jwt_secret = match env::var("APP_JWT_SECRET") {
                    Ok(secret) if !secret.trim().is_empty() => secret,
                    _ if environment.is_production() => {
                        return Err(ConfigError::Missing("APP_JWT_SECRET"))
                    }
                    _ => DEV_JWT_SECRET.to_string(),
                };
                Ok(Self::Local { jwt_secret })
            }
            "cognito" => {
                let region = env::var("COGNITO_REGION")
                    .or_else(|_| env::var("AWS_REGION"))
                    .unwrap_or_else(|_| DEFAULT_COGNITO_REGION.to_string());
                let user_pool_id = required("COGNITO_USER_POOL_ID")?;
                let client_id = required("COGNITO_CLIENT_ID")?;
                let endpoint = env::var("COGNITO_ENDPOINT").ok();
                let credentials = AwsCredentials::load(environment)?;
                Ok(Self::Cognito(CognitoConfig {
                    region,
                    user_pool_id,
                    client_id,
                    endpoint,
                    credentials,
                }))
            }
            _ => Err(ConfigError::InvalidValue {
                name: "APP_IDENTITY_PROVIDER",
                value: provider,
            }),
        }
    }
}

/// User pool coordinates for the Cognito adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CognitoConfig {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    pub endpoint: Option<String>,
    /// Signs the admin calls (group membership). Without it those calls are skipped.
    pub credentials: Option<AwsCredentials>,
}

/// IAM credentials for SigV4-signed admin requests.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    /// Optional outside production; production needs group membership to work.
    fn load(environment: AppEnvironment) -> Result<Option<Self>, ConfigError> {
        let access_key_id = env::var("AWS_ACCESS_KEY_ID").ok().filter(|v| !v.trim().is_empty());
        let Some(access_key_id) = access_key_id else {
            if environment.is_production() {
                return Err(ConfigError::Missing("AWS_ACCESS_KEY_ID"));
            }
            return Ok(None);
        };
        let secret_access_key = required("AWS_SECRET_ACCESS_KEY")?;
        let session_token = env::var("AWS_SESSION_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Ok(Some(Self {
            access_key_id,
            secret_access_key,
            session_token,
        }))
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl CognitoConfig {
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://cognito-idp.{}.amazonaws.com", self.region),
        }
    }

    /// `iss` claim of tokens minted by the pool.
    pub fn issuer(&self) -> String {
        format!("{}/{}", self.endpoint_url(), self.user_pool_id)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.issuer())
    }
}

#[derive(Debug, Clone)]
pub struct PhotoConfig {
    pub directory: PathBuf,
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub empty_needs: EmptySelection,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    Missing(&'static str),
    InvalidValue { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::Missing(name) => write!(f, "{name} must be set"),
            ConfigError::InvalidValue { name, value } => {
                write!(f, "{name} has an unsupported value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::Missing(_)
            | ConfigError::InvalidValue { .. } => None,
        }
    }
}
