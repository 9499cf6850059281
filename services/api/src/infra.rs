use chrono::NaiveDate;
use headstart::profiles::{
    IdentitySubject, ProfileId, ProfileRepository, RepositoryError, UserProfile,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local profile store; contents are lost on restart.
#[derive(Default, Clone)]
pub(crate) struct InMemoryProfileRepository {
    records: Arc<Mutex<HashMap<ProfileId, UserProfile>>>,
}

impl ProfileRepository for InMemoryProfileRepository {
    fn insert(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let taken = guard.contains_key(&profile.id)
            || guard
                .values()
                .any(|existing| existing.identity_id == profile.identity_id);
        if taken {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn update(&self, profile: UserProfile) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&profile.id) {
            guard.insert(profile.id.clone(), profile);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
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
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut profiles: Vec<UserProfile> = guard.values().cloned().collect();
        profiles.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(profiles)
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
