use std::sync::Arc;

use super::domain::{IdentitySubject, ProfileId, UserProfile};
use super::reconcile::{reconcile, validate, FieldError, ProfileUpdateError, ProfileUpdateForm};
use super::repository::{ProfileRepository, RepositoryError};
use super::storage::{PhotoStorage, PhotoUpload, StorageError};
use crate::matching::{DashboardParams, DashboardQuery, DashboardQueryError, EmptySelection};

/// Service composing profile persistence, photo storage, and dashboard selection.
pub struct ProfileService<R, S> {
    repository: Arc<R>,
    storage: Arc<S>,
    empty_needs: EmptySelection,
}

impl<R, S> ProfileService<R, S>
where
    R: ProfileRepository + 'static,
    S: PhotoStorage + 'static,
{
    pub fn new(repository: Arc<R>, storage: Arc<S>) -> Self {
        Self {
            repository,
            storage,
            empty_needs: EmptySelection::default(),
        }
    }

    /// Policy applied when the dashboard is asked for an empty need selection.
    pub fn with_empty_needs(mut self, policy: EmptySelection) -> Self {
        self.empty_needs = policy;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn get(&self, id: &ProfileId) -> Result<UserProfile, ProfileServiceError> {
        self.repository
            .fetch(id)?
            .ok_or(ProfileServiceError::NotFound)
    }

    pub fn for_identity(
        &self,
        subject: &IdentitySubject,
    ) -> Result<UserProfile, ProfileServiceError> {
        self.repository
            .find_by_identity(subject)?
            .ok_or(ProfileServiceError::NotFound)
    }

    /// Validate the whole form and photo, then store the photo, then persist.
    /// Any failure leaves the stored profile exactly as it was.
    pub async fn update_profile(
        &self,
        subject: &IdentitySubject,
        form: ProfileUpdateForm,
        photo: Option<PhotoUpload>,
    ) -> Result<UserProfile, ProfileServiceError> {
        let existing = self.for_identity(subject)?;

        let patch = validate(&form);
        let photo_check = photo.as_ref().map(PhotoUpload::inspect).transpose();
        let patch = match (patch, photo_check) {
            (Ok(patch), Ok(_)) => patch,
            (Ok(_), Err(err)) => {
                let error = FieldError::new("photo", err.to_string());
                return Err(ProfileUpdateError::single(error).into());
            }
            (Err(mut invalid), photo_check) => {
                if let Err(err) = photo_check {
                    invalid.errors.push(FieldError::new("photo", err.to_string()));
                }
                return Err(invalid.into());
            }
        };

        let photo_url = match photo {
            Some(photo) => match self.store_photo(photo).await {
                Ok(url) => Some(url),
                Err(err) => {
                    tracing::warn!(
                        profile_id = %existing.id,
                        error = %err,
                        "profile picture upload failed"
                    );
                    return Err(ProfileServiceError::Upload(err));
                }
            },
            None => None,
        };

        let updated = reconcile(&existing, patch, photo_url);
        self.repository.update(updated.clone())?;
        tracing::info!(profile_id = %updated.id, "profile updated");
        Ok(updated)
    }

    /// Oversized pictures are shrunk off the async workers before upload.
    async fn store_photo(&self, photo: PhotoUpload) -> Result<String, StorageError> {
        let photo = tokio::task::spawn_blocking(move || photo.shrink_oversized())
            .await
            .map_err(|err| StorageError::Processing(err.to_string()))??;
        self.storage.upload(photo).await
    }

    /// Members visible to `viewer` under the query in `params`.
    pub fn dashboard(
        &self,
        viewer: &IdentitySubject,
        params: &DashboardParams,
    ) -> Result<Vec<UserProfile>, ProfileServiceError> {
        let query = DashboardQuery::from_params(params, self.empty_needs)?;
        let roster = self.repository.list()?;
        let viewer_id = roster
            .iter()
            .find(|profile| &profile.identity_id == viewer)
            .map(|profile| profile.id.clone());

        Ok(query
            .select(&roster, viewer_id.as_ref())
            .into_iter()
            .cloned()
            .collect())
    }

    /// Every stored record, unfiltered.
    pub fn roster(&self) -> Result<Vec<UserProfile>, ProfileServiceError> {
        Ok(self.repository.list()?)
    }
}

/// Error raised by the profile service.
#[derive(Debug, thiserror::Error)]
pub enum ProfileServiceError {
    #[error(transparent)]
    Validation(#[from] ProfileUpdateError),
    #[error(transparent)]
    Query(#[from] DashboardQueryError),
    #[error(transparent)]
    Upload(StorageError),
    #[error("User not found")]
    NotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
