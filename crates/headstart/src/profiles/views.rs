use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Contact, IdeaStatus, IdentitySubject, ProfileId, Role, TeamNeeds, UserProfile};
use crate::matching::determine_role;

/// What other members see. Identity bindings and group membership stay private.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: ProfileId,
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub intro: String,
    pub background: String,
    pub skills: Vec<String>,
    pub role: Role,
    /// Classifier output for the stored skills; never persisted.
    pub suggested_role: Role,
    pub hours_per_week: Option<u8>,
    pub idea_status: Option<IdeaStatus>,
    pub team_needs: TeamNeeds,
    pub contact: Contact,
    pub match_percentage: Option<f64>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&UserProfile> for PublicProfile {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            email: profile.email.clone(),
            photo_url: profile.photo_url.clone(),
            intro: profile.intro.clone(),
            background: profile.background.clone(),
            skills: profile.skills.clone(),
            role: profile.role,
            suggested_role: determine_role(&profile.skills),
            hours_per_week: profile.hours_per_week,
            idea_status: profile.idea_status,
            team_needs: profile.team_needs.clone(),
            contact: profile.contact.clone(),
            match_percentage: profile.match_percentage,
            last_login: profile.last_login,
        }
    }
}

/// The signed-in member's own record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnProfile {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub identity_id: IdentitySubject,
    pub groups: Vec<String>,
}

impl From<&UserProfile> for OwnProfile {
    fn from(profile: &UserProfile) -> Self {
        Self {
            profile: PublicProfile::from(profile),
            identity_id: profile.identity_id.clone(),
            groups: profile.groups.clone(),
        }
    }
}
