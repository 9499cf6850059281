//! Identity provider port, its adapters, and the authentication flows built on it.

pub mod cognito;
pub mod local;
pub mod provider;
pub mod router;
pub mod service;
pub mod session;
mod sigv4;

pub use cognito::CognitoIdentityProvider;
pub use local::LocalIdentityProvider;
pub use provider::{
    AccessClaims, AuthTokens, IdentityError, IdentityProvider, IdentityUser, Registration,
    SignUpOutcome,
};
pub use router::{auth_router, VerifyRedirect};
pub use service::{AuthService, AuthServiceError, LoginOutcome, MEMBER_GROUP};
pub use session::{AdminUser, AuthenticatedUser, SessionRejection, SessionVerifier};

#[cfg(test)]
mod tests;
