use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_NAME_CHARS: usize = 50;
pub const MAX_INTRO_CHARS: usize = 250;
pub const MAX_BACKGROUND_CHARS: usize = 5000;
pub const MAX_SKILLS: usize = 20;
pub const MAX_SKILL_CHARS: usize = 50;
pub const MIN_HOURS_PER_WEEK: u8 = 15;
pub const MAX_HOURS_PER_WEEK: u8 = 65;
pub const MAX_GROUPS: usize = 10;

/// Stable identifier assigned when a profile is first stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub String);

impl ProfileId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subject claim issued by the identity provider for an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentitySubject(pub String);

impl fmt::Display for IdentitySubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of roles a member can hold on a founding team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Developer")]
    Developer,
    #[serde(rename = "Designer")]
    Designer,
    #[serde(rename = "Project Manager")]
    ProjectManager,
    #[serde(rename = "Technical Project Manager")]
    TechnicalProjectManager,
    #[default]
    #[serde(rename = "Undecided")]
    Undecided,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Developer,
        Role::Designer,
        Role::ProjectManager,
        Role::TechnicalProjectManager,
        Role::Undecided,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Role::Developer => "Developer",
            Role::Designer => "Designer",
            Role::ProjectManager => "Project Manager",
            Role::TechnicalProjectManager => "Technical Project Manager",
            Role::Undecided => "Undecided",
        }
    }

    /// Case-insensitive lookup against the role labels.
    pub fn from_label(raw: &str) -> Option<Self> {
        let wanted = raw.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.label().eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How settled a member is on a startup concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdeaStatus {
    #[serde(rename = "one")]
    SetIdea,
    #[serde(rename = "few")]
    FewIdeas,
    #[serde(rename = "none")]
    OpenToIdeas,
}

/// Every accepted spelling, canonical tokens first, then the historical
/// onboarding answers. Keys are lowercase.
const IDEA_STATUS_TABLE: &[(&str, IdeaStatus)] = &[
    ("one", IdeaStatus::SetIdea),
    ("few", IdeaStatus::FewIdeas),
    ("none", IdeaStatus::OpenToIdeas),
    ("one, set in stone", IdeaStatus::SetIdea),
    ("a few of them", IdeaStatus::FewIdeas),
    ("no, open to ideas", IdeaStatus::OpenToIdeas),
];

impl IdeaStatus {
    pub const ALL: [IdeaStatus; 3] = [
        IdeaStatus::SetIdea,
        IdeaStatus::FewIdeas,
        IdeaStatus::OpenToIdeas,
    ];

    pub const fn token(self) -> &'static str {
        match self {
            IdeaStatus::SetIdea => "one",
            IdeaStatus::FewIdeas => "few",
            IdeaStatus::OpenToIdeas => "none",
        }
    }

    /// Maps canonical tokens and legacy free-text answers; anything else is `None`.
    pub fn lookup(raw: &str) -> Option<Self> {
        let key = raw.trim().to_lowercase();
        IDEA_STATUS_TABLE
            .iter()
            .find(|(accepted, _)| *accepted == key)
            .map(|(_, status)| *status)
    }

    /// Only the canonical tokens, used where legacy answers never appear (filters).
    pub fn from_token(raw: &str) -> Option<Self> {
        let wanted = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.token().eq_ignore_ascii_case(wanted))
    }
}

/// Kinds of teammate a profile owner can be looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NeedFlag {
    #[serde(rename = "needsPM")]
    NeedsPm,
    #[serde(rename = "needsDev")]
    NeedsDev,
    #[serde(rename = "needsDesigner")]
    NeedsDesigner,
    #[serde(rename = "needsMarketing")]
    NeedsMarketing,
}

impl NeedFlag {
    pub const ALL: [NeedFlag; 4] = [
        NeedFlag::NeedsPm,
        NeedFlag::NeedsDev,
        NeedFlag::NeedsDesigner,
        NeedFlag::NeedsMarketing,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            NeedFlag::NeedsPm => "needsPM",
            NeedFlag::NeedsDev => "needsDev",
            NeedFlag::NeedsDesigner => "needsDesigner",
            NeedFlag::NeedsMarketing => "needsMarketing",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        let wanted = raw.trim();
        Self::ALL.into_iter().find(|flag| flag.key() == wanted)
    }
}

/// Need flags keyed by kind. A profile with no `true` flag has a full team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamNeeds(BTreeMap<NeedFlag, bool>);

impl Default for TeamNeeds {
    fn default() -> Self {
        let mut flags = BTreeMap::new();
        flags.insert(NeedFlag::NeedsPm, false);
        flags.insert(NeedFlag::NeedsDev, false);
        Self(flags)
    }
}

impl TeamNeeds {
    pub fn get(&self, flag: NeedFlag) -> bool {
        self.0.get(&flag).copied().unwrap_or(false)
    }

    pub fn set(&mut self, flag: NeedFlag, value: bool) {
        self.0.insert(flag, value);
    }

    pub fn any(&self) -> bool {
        self.0.values().any(|value| *value)
    }

    pub fn flags(&self) -> impl Iterator<Item = (NeedFlag, bool)> + '_ {
        self.0.iter().map(|(flag, value)| (*flag, *value))
    }

    /// Overlay `patch` onto the stored flags; flags absent from the patch keep their value.
    pub fn merge(&mut self, patch: &TeamNeeds) {
        for (flag, value) in patch.flags() {
            self.set(flag, value);
        }
    }

    pub fn empty_patch() -> Self {
        Self(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Contact channels, each optional and updated independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub slack: Option<String>,
}

/// Persisted member profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: ProfileId,
    /// Absent in exported dashboard snapshots.
    #[serde(default)]
    pub identity_id: IdentitySubject,
    #[serde(default)]
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub intro: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub hours_per_week: Option<u8>,
    #[serde(default)]
    pub idea_status: Option<IdeaStatus>,
    #[serde(default)]
    pub team_needs: TeamNeeds,
    #[serde(default)]
    pub contact: Contact,
    #[serde(default)]
    pub match_percentage: Option<f64>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserProfile {
    /// Fresh profile for a first-time member; callers overlay provider attributes.
    pub fn new(identity_id: IdentitySubject, email: impl Into<String>) -> Self {
        let email = email.into();
        let name = default_display_name(&email);
        Self {
            id: ProfileId::generate(),
            identity_id,
            contact: Contact {
                email: Some(email.clone()),
                phone: None,
                slack: None,
            },
            email,
            name,
            photo_url: None,
            intro: String::new(),
            background: String::new(),
            skills: Vec::new(),
            role: Role::Undecided,
            hours_per_week: None,
            idea_status: Some(IdeaStatus::FewIdeas),
            team_needs: TeamNeeds::default(),
            match_percentage: None,
            last_login: None,
            groups: Vec::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.groups.iter().any(|group| group == "Admins")
    }
}

/// Local part of the address, capped to the display-name limit.
pub fn default_display_name(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default().trim();
    local.chars().take(MAX_NAME_CHARS).collect()
}

/// Keep at most [`MAX_GROUPS`] group names, in provider order.
pub fn cap_groups(groups: &[String]) -> Vec<String> {
    groups.iter().take(MAX_GROUPS).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn idea_status_lookup_accepts_legacy_answers() {
        assert_eq!(IdeaStatus::lookup("One, Set In Stone"), Some(IdeaStatus::SetIdea));
        assert_eq!(IdeaStatus::lookup("a few of them"), Some(IdeaStatus::FewIdeas));
        assert_eq!(IdeaStatus::lookup("NONE"), Some(IdeaStatus::OpenToIdeas));
        assert_eq!(IdeaStatus::lookup("maybe"), None);
        assert_eq!(IdeaStatus::from_token("a few of them"), None);
    }

    #[test]
    fn new_profile_uses_member_defaults() {
        let profile = UserProfile::new(IdentitySubject("sub-1".to_string()), "a@x.com");
        let value = serde_json::to_value(&profile).expect("profile serializes");

        assert_eq!(value["name"], json!("a"));
        assert_eq!(value["ideaStatus"], json!("few"));
        assert_eq!(value["teamNeeds"], json!({ "needsPM": false, "needsDev": false }));
        assert_eq!(value["skills"], json!([]));
        assert_eq!(value["role"], json!("Undecided"));
        assert_eq!(value["contact"]["email"], json!("a@x.com"));
    }

    #[test]
    fn team_needs_merge_keeps_unpatched_flags() {
        let mut stored = TeamNeeds::default();
        stored.set(NeedFlag::NeedsPm, true);

        let mut patch = TeamNeeds::empty_patch();
        patch.set(NeedFlag::NeedsDev, true);
        stored.merge(&patch);

        assert!(stored.get(NeedFlag::NeedsPm));
        assert!(stored.get(NeedFlag::NeedsDev));
        assert!(!stored.get(NeedFlag::NeedsDesigner));
    }

    #[test]
    fn role_labels_round_trip_case_insensitively() {
        assert_eq!(
            Role::from_label("technical project manager"),
            Some(Role::TechnicalProjectManager)
        );
        assert_eq!(Role::from_label("Wizard"), None);
    }

    #[test]
    fn group_cap_keeps_first_ten() {
        let groups: Vec<String> = (0..14).map(|n| format!("group-{n}")).collect();
        let capped = cap_groups(&groups);
        assert_eq!(capped.len(), MAX_GROUPS);
        assert_eq!(capped[0], "group-0");
    }
}
