use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::profiles::domain::{IdeaStatus, NeedFlag, UserProfile};

/// One entry of the team-status filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NeedFilter {
    /// The member is looking for this kind of teammate.
    Flag(NeedFlag),
    /// The member is looking for any kind of teammate.
    AnyNeed,
    /// The member's team is full.
    NoNeeds,
}

impl NeedFilter {
    /// Every category; this is the reset state of the dashboard.
    pub fn all() -> BTreeSet<NeedFilter> {
        let mut set: BTreeSet<NeedFilter> = NeedFlag::ALL.into_iter().map(Self::Flag).collect();
        set.insert(Self::AnyNeed);
        set.insert(Self::NoNeeds);
        set
    }

    pub fn token(self) -> &'static str {
        match self {
            NeedFilter::Flag(flag) => flag.key(),
            NeedFilter::AnyNeed => "anyNeeds",
            NeedFilter::NoNeeds => "noNeeds",
        }
    }

    /// Accepts need-flag keys plus the older `looking`/`open`/`closed` status names.
    pub fn parse(raw: &str) -> Option<Self> {
        let token = raw.trim();
        if let Some(flag) = NeedFlag::from_key(token) {
            return Some(Self::Flag(flag));
        }
        match token {
            "anyNeeds" | "looking" | "open" => Some(Self::AnyNeed),
            "noNeeds" | "closed" => Some(Self::NoNeeds),
            _ => None,
        }
    }

    pub fn holds_for(self, user: &UserProfile) -> bool {
        match self {
            NeedFilter::Flag(flag) => user.team_needs.get(flag),
            NeedFilter::AnyNeed => user.team_needs.any(),
            NeedFilter::NoNeeds => !user.team_needs.any(),
        }
    }
}

impl TryFrom<String> for NeedFilter {
    type Error = UnknownToken;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(UnknownToken(value))
    }
}

impl From<NeedFilter> for String {
    fn from(value: NeedFilter) -> Self {
        value.token().to_string()
    }
}

/// Inclusive hours-per-week ranges offered by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HoursBucket {
    TwentyToThirty,
    ThirtyOneToForty,
    FortyOneToFifty,
    OverFifty,
}

impl HoursBucket {
    pub const ALL: [HoursBucket; 4] = [
        HoursBucket::TwentyToThirty,
        HoursBucket::ThirtyOneToForty,
        HoursBucket::FortyOneToFifty,
        HoursBucket::OverFifty,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            HoursBucket::TwentyToThirty => "20-30",
            HoursBucket::ThirtyOneToForty => "31-40",
            HoursBucket::FortyOneToFifty => "41-50",
            HoursBucket::OverFifty => "50+",
        }
    }

    /// `50+` is also accepted as `50` because `+` decodes to a space in query strings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "20-30" => Some(Self::TwentyToThirty),
            "31-40" => Some(Self::ThirtyOneToForty),
            "41-50" => Some(Self::FortyOneToFifty),
            "50+" | "50" | "50plus" => Some(Self::OverFifty),
            _ => None,
        }
    }

    pub fn contains(self, hours: u8) -> bool {
        match self {
            HoursBucket::TwentyToThirty => (20..=30).contains(&hours),
            HoursBucket::ThirtyOneToForty => (31..=40).contains(&hours),
            HoursBucket::FortyOneToFifty => (41..=50).contains(&hours),
            HoursBucket::OverFifty => hours > 50,
        }
    }
}

impl TryFrom<String> for HoursBucket {
    type Error = UnknownToken;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(UnknownToken(value))
    }
}

impl From<HoursBucket> for String {
    fn from(value: HoursBucket) -> Self {
        value.label().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized filter value '{0}'")]
pub struct UnknownToken(pub String);

/// What an empty need-filter selection means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptySelection {
    #[default]
    MatchNone,
    MatchAll,
}

impl EmptySelection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "match_none" | "none" => Some(Self::MatchNone),
            "match_all" | "all" => Some(Self::MatchAll),
            _ => None,
        }
    }
}

/// Filter selection for a roster. Dimensions combine with AND; the values inside a
/// multi-select dimension combine with OR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RosterFilter {
    pub search: String,
    pub needs: BTreeSet<NeedFilter>,
    pub empty_needs: EmptySelection,
    pub hours: BTreeSet<HoursBucket>,
    pub idea_status: BTreeSet<IdeaStatus>,
}

impl Default for RosterFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            needs: NeedFilter::all(),
            empty_needs: EmptySelection::default(),
            hours: BTreeSet::new(),
            idea_status: BTreeSet::new(),
        }
    }
}

impl RosterFilter {
    pub fn matches(&self, user: &UserProfile) -> bool {
        self.matches_search(user)
            && self.matches_needs(user)
            && self.matches_hours(user)
            && self.matches_idea_status(user)
    }

    fn matches_search(&self, user: &UserProfile) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        user.name.to_lowercase().contains(&needle)
            || user.intro.to_lowercase().contains(&needle)
            || user
                .skills
                .iter()
                .any(|skill| skill.to_lowercase().contains(&needle))
    }

    fn matches_needs(&self, user: &UserProfile) -> bool {
        if self.needs.is_empty() {
            return self.empty_needs == EmptySelection::MatchAll;
        }
        self.needs.iter().any(|need| need.holds_for(user))
    }

    fn matches_hours(&self, user: &UserProfile) -> bool {
        if self.hours.is_empty() {
            return true;
        }
        match user.hours_per_week {
            Some(hours) => self.hours.iter().any(|bucket| bucket.contains(hours)),
            None => false,
        }
    }

    fn matches_idea_status(&self, user: &UserProfile) -> bool {
        if self.idea_status.is_empty() {
            return true;
        }
        user.idea_status
            .map(|status| self.idea_status.contains(&status))
            .unwrap_or(false)
    }
}

impl fmt::Display for NeedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
