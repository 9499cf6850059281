use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use axum::{Extension, Router};
use serde_json::Value;

use crate::identity::{IdentityProvider, LocalIdentityProvider, Registration, SessionVerifier};
use crate::matching::EmptySelection;
use crate::profiles::domain::{IdentitySubject, NeedFlag, ProfileId, Role, UserProfile};
use crate::profiles::repository::{ProfileRepository, RepositoryError};
use crate::profiles::storage::{PhotoStorage, PhotoUpload, StorageError};
use crate::profiles::{profile_router, ProfileService};

pub(super) const BOUNDARY: &str = "headstart-test-boundary";
pub(super) const PASSWORD: &str = "P@ssw0rd1";

pub(super) fn member(name: &str, hours: u8, score: f64) -> UserProfile {
    let email = format!("{}@example.com", name.to_lowercase());
    let subject = IdentitySubject(format!("sub-{}", name.to_lowercase()));
    let mut profile = UserProfile::new(subject, email);
    profile.name = name.to_string();
    profile.hours_per_week = Some(hours);
    profile.match_percentage = Some(score);
    profile
}

/// Three members plus the viewer `Quinn`, who wants a developer.
pub(super) fn seeded_repository() -> Arc<MemoryRepository> {
    let repository = Arc::new(MemoryRepository::default());

    let mut viewer = member("Quinn", 40, 50.0);
    viewer.team_needs.set(NeedFlag::NeedsDev, true);
    repository.insert(viewer).expect("seed viewer");

    let mut avery = member("Avery", 25, 82.0);
    avery.skills = vec!["Web Development".to_string(), "API Development".to_string()];
    avery.role = Role::Developer;
    avery.team_needs.set(NeedFlag::NeedsPm, true);
    repository.insert(avery).expect("seed avery");

    let mut blake = member("Blake", 45, 64.0);
    blake.skills = vec!["Finances".to_string()];
    repository.insert(blake).expect("seed blake");

    let mut casey = member("Casey", 55, 91.0);
    casey.team_needs.set(NeedFlag::NeedsDev, true);
    repository.insert(casey).expect("seed casey");

    repository
}

pub(super) fn viewer_subject() -> IdentitySubject {
    IdentitySubject("sub-quinn".to_string())
}

pub(super) fn build_service() -> (
    ProfileService<MemoryRepository, MemoryStorage>,
    Arc<MemoryRepository>,
    Arc<MemoryStorage>,
) {
    let repository = seeded_repository();
    let storage = Arc::new(MemoryStorage::default());
    let service = ProfileService::new(repository.clone(), storage.clone())
        .with_empty_needs(EmptySelection::MatchNone);
    (service, repository, storage)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<ProfileId, UserProfile>>>,
}

impl MemoryRepository {
    pub(super) fn by_name(&self, name: &str) -> UserProfile {
        let guard = self.records.lock().expect("repository mutex poisoned");
        guard
            .values()
            .find(|profile| profile.name == name)
            .cloned()
            .expect("profile is seeded")
    }
}

impl ProfileRepository for MemoryRepository {
    fn insert(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let clash = guard.contains_key(&profile.id)
            || guard
                .values()
                .any(|existing| existing.identity_id == profile.identity_id);
        if clash {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn update(&self, profile: UserProfile) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if !guard.contains_key(&profile.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(profile.id.clone(), profile);
        Ok(())
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
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut profiles: Vec<UserProfile> = guard.values().cloned().collect();
        profiles.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(profiles)
    }
}

pub(super) struct UnavailableRepository;

impl ProfileRepository for UnavailableRepository {
    fn insert(&self, _profile: UserProfile) -> Result<UserProfile, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _profile: UserProfile) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ProfileId) -> Result<Option<UserProfile>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_identity(
        &self,
        _subject: &IdentitySubject,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_contact_email(&self, _email: &str) -> Result<Option<UserProfile>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<UserProfile>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryStorage {
    uploads: Mutex<Vec<String>>,
}

impl MemoryStorage {
    pub(super) fn uploads(&self) -> Vec<String> {
        self.uploads.lock().expect("storage mutex poisoned").clone()
    }
}

#[async_trait]
impl PhotoStorage for MemoryStorage {
    async fn upload(&self, photo: PhotoUpload) -> Result<String, StorageError> {
        let format = photo.inspect()?;
        let mut uploads = self.uploads.lock().expect("storage mutex poisoned");
        let url = format!(
            "https://cdn.test/profile-pictures/{}.{}",
            uploads.len() + 1,
            format.extension()
        );
        uploads.push(url.clone());
        Ok(url)
    }
}

pub(super) struct FailingStorage;

#[async_trait]
impl PhotoStorage for FailingStorage {
    async fn upload(&self, _photo: PhotoUpload) -> Result<String, StorageError> {
        Err(StorageError::Rejected("bucket unavailable".to_string()))
    }
}

pub(super) fn png_upload() -> PhotoUpload {
    PhotoUpload {
        file_name: Some("me.png".to_string()),
        content_type: Some("image/png".to_string()),
        bytes: vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a],
    }
}

/// Local provider with one confirmed account per seeded member name.
pub(super) async fn provider_with_accounts(names: &[&str]) -> Arc<LocalIdentityProvider> {
    let provider = Arc::new(LocalIdentityProvider::new("profile-test-secret").auto_confirm(true));
    for name in names {
        provider
            .register(&Registration {
                email: format!("{}@example.com", name.to_lowercase()),
                password: PASSWORD.to_string(),
                display_name: None,
            })
            .await
            .expect("register test account");
    }
    provider
}

/// Access token for `name`, with the seeded profile rebound to the provider subject.
pub(super) async fn sign_in(
    provider: &LocalIdentityProvider,
    repository: &MemoryRepository,
    name: &str,
) -> String {
    let email = format!("{}@example.com", name.to_lowercase());
    let tokens = provider.login(&email, PASSWORD).await.expect("login");
    let claims = provider
        .verify_access_token(&tokens.access_token)
        .await
        .expect("token verifies");

    let mut profile = repository.by_name(name);
    profile.identity_id = claims.subject;
    repository.update(profile).expect("rebind identity");
    tokens.access_token
}

pub(super) fn router_with<S>(
    service: ProfileService<MemoryRepository, S>,
    provider: Arc<LocalIdentityProvider>,
) -> Router
where
    S: PhotoStorage + 'static,
{
    let verifier: Arc<dyn IdentityProvider> = provider;
    profile_router(Arc::new(service)).layer(Extension(SessionVerifier::new(verifier)))
}

pub(super) fn multipart_body(
    fields: &[(&str, &str)],
    photo: Option<(&str, &str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = photo {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photo\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
