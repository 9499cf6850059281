use super::domain::{IdentitySubject, ProfileId, UserProfile};

/// Storage abstraction for member profiles. Every write touches exactly one record.
pub trait ProfileRepository: Send + Sync {
    /// Rejects a record whose id or identity subject is already stored.
    fn insert(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError>;
    fn update(&self, profile: UserProfile) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ProfileId) -> Result<Option<UserProfile>, RepositoryError>;
    fn find_by_identity(
        &self,
        subject: &IdentitySubject,
    ) -> Result<Option<UserProfile>, RepositoryError>;
    /// Case-insensitive match on `contact.email`.
    fn find_by_contact_email(&self, email: &str) -> Result<Option<UserProfile>, RepositoryError>;
    fn list(&self) -> Result<Vec<UserProfile>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("profile already exists")]
    Conflict,
    #[error("profile not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
