use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use axum::{Extension, Router};
use serde_json::Value;

use crate::identity::{
    auth_router, AuthService, IdentityProvider, LocalIdentityProvider, SessionVerifier,
    VerifyRedirect,
};
use crate::profiles::domain::{IdentitySubject, ProfileId, UserProfile};
use crate::profiles::repository::{ProfileRepository, RepositoryError};

pub(super) const PASSWORD: &str = "P@ssw0rd1";
pub(super) const FRONTEND: &str = "http://localhost:3000";

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    records: Arc<Mutex<HashMap<ProfileId, UserProfile>>>,
}

impl MemoryRepository {
    pub(super) fn all(&self) -> Vec<UserProfile> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        guard.values().cloned().collect()
    }
}

impl ProfileRepository for MemoryRepository {
    fn insert(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard
            .values()
            .any(|existing| existing.identity_id == profile.identity_id)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn update(&self, profile: UserProfile) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        match guard.get_mut(&profile.id) {
            Some(slot) => {
                *slot = profile;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &ProfileId) -> Result<Option<UserProfile>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_by_identity(
        &self,
        subject: &IdentitySubject,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|profile| &profile.identity_id == subject)
            .cloned())
    }

    fn find_by_contact_email(&self, email: &str) -> Result<Option<UserProfile>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|profile| {
                profile
                    .contact
                    .email
                    .as_deref()
                    .is_some_and(|stored| stored.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    fn list(&self) -> Result<Vec<UserProfile>, RepositoryError> {
        Ok(self.all())
    }
}

pub(super) struct Harness {
    pub(super) provider: Arc<LocalIdentityProvider>,
    pub(super) repository: Arc<MemoryRepository>,
    pub(super) service: Arc<AuthService<MemoryRepository>>,
}

/// Local provider that issues confirmation codes, wired to an empty repository.
pub(super) fn harness() -> Harness {
    let provider = Arc::new(LocalIdentityProvider::new("identity-test-secret"));
    let repository = Arc::new(MemoryRepository::default());
    let dynamic: Arc<dyn IdentityProvider> = provider.clone();
    let service = Arc::new(AuthService::new(dynamic, repository.clone()));
    Harness {
        provider,
        repository,
        service,
    }
}

impl Harness {
    /// Register and confirm `email` directly against the provider.
    pub(super) async fn confirmed_account(&self, email: &str) {
        self.service
            .register(email, PASSWORD, None)
            .await
            .expect("register");
        let code = self
            .provider
            .pending_confirmation_code(email)
            .expect("code issued");
        self.provider
            .confirm_registration(email, &code)
            .await
            .expect("confirm");
    }

    pub(super) fn router(&self, production: bool) -> Router {
        let verifier: Arc<dyn IdentityProvider> = self.provider.clone();
        let redirect = VerifyRedirect {
            frontend_url: FRONTEND.to_string(),
            production,
        };
        auth_router(self.service.clone(), redirect)
            .layer(Extension(SessionVerifier::new(verifier)))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
