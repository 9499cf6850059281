//! Member profiles: the stored record, self-service updates, photo storage, and the
//! `/users` endpoints.

pub mod domain;
pub mod reconcile;
pub mod repository;
pub mod router;
pub mod sanitize;
pub mod service;
pub mod storage;
pub mod views;

#[cfg(test)]
mod tests;

pub use domain::{
    Contact, IdeaStatus, IdentitySubject, NeedFlag, ProfileId, Role, TeamNeeds, UserProfile,
};
pub use reconcile::{
    reconcile, validate, FieldError, ProfileUpdateError, ProfileUpdateForm, ValidatedPatch,
};
pub use repository::{ProfileRepository, RepositoryError};
pub use router::{photo_router, profile_router};
pub use service::{ProfileService, ProfileServiceError};
pub use storage::{FilesystemPhotoStorage, PhotoFormat, PhotoStorage, PhotoUpload, StorageError};
pub use views::{OwnProfile, PublicProfile};
