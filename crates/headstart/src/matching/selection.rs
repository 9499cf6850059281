use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::filter::{EmptySelection, HoursBucket, NeedFilter, RosterFilter, UnknownToken};
use super::sort::{SortDirection, SortKey, SortSpec};
use crate::profiles::domain::{IdeaStatus, ProfileId, UserProfile};

/// Complete, serializable dashboard state: what to show and in which order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardQuery {
    pub filter: RosterFilter,
    pub sort: SortSpec,
}

impl DashboardQuery {
    /// Visible roster for `viewer`: self removed, then filtered, then stably sorted.
    /// The roster itself is never modified.
    pub fn select<'a>(
        &self,
        roster: &'a [UserProfile],
        viewer: Option<&ProfileId>,
    ) -> Vec<&'a UserProfile> {
        let mut visible: Vec<&UserProfile> = roster
            .iter()
            .filter(|user| Some(&user.id) != viewer)
            .filter(|user| self.filter.matches(user))
            .collect();
        self.sort.sort(&mut visible);
        visible
    }

    pub fn from_params(
        params: &DashboardParams,
        empty_needs: EmptySelection,
    ) -> Result<Self, DashboardQueryError> {
        let needs = match params.needs.as_deref() {
            None => NeedFilter::all(),
            Some(raw) => parse_list(raw, NeedFilter::parse).map_err(DashboardQueryError::Needs)?,
        };
        let hours = match params.hours.as_deref() {
            None => BTreeSet::new(),
            Some(raw) => parse_list(raw, HoursBucket::parse).map_err(DashboardQueryError::Hours)?,
        };
        let idea_status = match params.idea.as_deref() {
            None => BTreeSet::new(),
            Some(raw) => {
                parse_list(raw, IdeaStatus::from_token).map_err(DashboardQueryError::IdeaStatus)?
            }
        };

        let key = params
            .sort
            .as_deref()
            .map(SortKey::parse)
            .unwrap_or_default();
        let direction = match params.direction.as_deref() {
            None => SortDirection::default(),
            Some(raw) => SortDirection::parse(raw)
                .ok_or_else(|| DashboardQueryError::Direction(raw.to_string()))?,
        };

        Ok(Self {
            filter: RosterFilter {
                search: params.search.clone().unwrap_or_default(),
                needs,
                empty_needs,
                hours,
                idea_status,
            },
            sort: SortSpec::new(key, direction),
        })
    }
}

/// Raw query-string form of [`DashboardQuery`]. List values are comma separated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardParams {
    pub search: Option<String>,
    pub needs: Option<String>,
    pub hours: Option<String>,
    pub idea: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DashboardQueryError {
    #[error("needs: {0}")]
    Needs(UnknownToken),
    #[error("hours: {0}")]
    Hours(UnknownToken),
    #[error("idea: {0}")]
    IdeaStatus(UnknownToken),
    #[error("direction must be 'asc' or 'desc', got '{0}'")]
    Direction(String),
}

impl DashboardQueryError {
    pub fn field(&self) -> &'static str {
        match self {
            DashboardQueryError::Needs(_) => "needs",
            DashboardQueryError::Hours(_) => "hours",
            DashboardQueryError::IdeaStatus(_) => "idea",
            DashboardQueryError::Direction(_) => "direction",
        }
    }
}

fn parse_list<T, F>(raw: &str, parse: F) -> Result<BTreeSet<T>, UnknownToken>
where
    T: Ord,
    F: Fn(&str) -> Option<T>,
{
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| parse(token).ok_or_else(|| UnknownToken(token.to_string())))
        .collect()
}
