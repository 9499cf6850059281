use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::profiles::domain::UserProfile;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Match,
    Name,
    Hours,
    Recent,
    /// Keys this build does not know; sorting by one leaves the order untouched.
    #[serde(other)]
    Unrecognized,
}

impl SortKey {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "match" => Self::Match,
            "name" => Self::Name,
            "hours" => Self::Hours,
            "recent" => Self::Recent,
            _ => Self::Unrecognized,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Ordering under `Desc`; `Asc` is its exact reverse.
    ///
    /// Numeric and recency keys put the larger value first. Names read A to Z under
    /// the default direction, matching how the dashboard has always listed them.
    pub fn compare(&self, a: &UserProfile, b: &UserProfile) -> Ordering {
        let base = match self.key {
            SortKey::Match => {
                let a = a.match_percentage.unwrap_or(0.0);
                let b = b.match_percentage.unwrap_or(0.0);
                b.total_cmp(&a)
            }
            SortKey::Name => compare_names(&a.name, &b.name),
            SortKey::Hours => b
                .hours_per_week
                .unwrap_or(0)
                .cmp(&a.hours_per_week.unwrap_or(0)),
            SortKey::Recent => b.last_login.cmp(&a.last_login),
            SortKey::Unrecognized => return Ordering::Equal,
        };

        match self.direction {
            SortDirection::Desc => base,
            SortDirection::Asc => base.reverse(),
        }
    }

    /// Stable in-place sort.
    pub fn sort(&self, roster: &mut [&UserProfile]) {
        roster.sort_by(|a, b| self.compare(a, b));
    }
}

/// Case-folded comparison with a byte-order tiebreak so distinct names never tie.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
