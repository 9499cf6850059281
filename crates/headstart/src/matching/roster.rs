use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use crate::profiles::domain::{
    IdeaStatus, IdentitySubject, NeedFlag, ProfileId, Role, UserProfile, MAX_HOURS_PER_WEEK,
    MAX_INTRO_CHARS, MAX_SKILLS, MIN_HOURS_PER_WEEK,
};
use crate::profiles::sanitize::char_len;

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, reason: String },
    /// A JSON roster entry, by zero-based position.
    InvalidEntry { index: usize, reason: String },
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read roster: {}", err),
            RosterImportError::Json(err) => write!(f, "invalid roster JSON: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid roster CSV: {}", err),
            RosterImportError::InvalidRow { line, reason } => {
                write!(f, "roster row {} rejected: {}", line, reason)
            }
            RosterImportError::InvalidEntry { index, reason } => {
                write!(f, "roster entry {} rejected: {}", index, reason)
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Json(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::InvalidRow { .. } | RosterImportError::InvalidEntry { .. } => None,
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for RosterImportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Loads roster snapshots exported from the API (JSON) or a spreadsheet (CSV).
pub struct RosterImporter;

impl RosterImporter {
    /// Format is chosen by extension: `.csv` is CSV, anything else is JSON.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<UserProfile>, RosterImportError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        if is_csv {
            Self::from_csv_reader(reader)
        } else {
            Self::from_json_reader(reader)
        }
    }

    /// Accepts the dashboard payload (`{"users": [...]}`) or a bare array.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Vec<UserProfile>, RosterImportError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RosterDocument {
            Bare(Vec<UserProfile>),
            Wrapped { users: Vec<UserProfile> },
        }

        let document: RosterDocument = serde_json::from_reader(reader)?;
        let users = match document {
            RosterDocument::Wrapped { users } => users,
            RosterDocument::Bare(users) => users,
        };
        for (index, profile) in users.iter().enumerate() {
            check_bounds(profile)
                .map_err(|reason| RosterImportError::InvalidEntry { index, reason })?;
        }
        Ok(users)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Vec<UserProfile>, RosterImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut roster = Vec::new();

        for (index, record) in csv_reader.deserialize::<RosterRow>().enumerate() {
            let row = record?;
            // Header occupies line 1.
            let line = index as u64 + 2;
            roster.push(row.into_profile(line)?);
        }

        Ok(roster)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    id: Option<String>,
    name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    email: Option<String>,
    #[serde(default)]
    intro: String,
    #[serde(default)]
    skills: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    role: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    hours_per_week: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    idea_status: Option<String>,
    #[serde(default, rename = "needsPM", deserialize_with = "empty_string_as_none")]
    needs_pm: Option<String>,
    #[serde(default, rename = "needsDev", deserialize_with = "empty_string_as_none")]
    needs_dev: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    match_percentage: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    last_login: Option<String>,
}

impl RosterRow {
    fn into_profile(self, line: u64) -> Result<UserProfile, RosterImportError> {
        let invalid = |reason: String| RosterImportError::InvalidRow { line, reason };

        let id = self.id.map(ProfileId).unwrap_or_else(ProfileId::generate);
        let email = self
            .email
            .unwrap_or_else(|| format!("{}@roster.invalid", id.0));
        let mut profile = UserProfile::new(IdentitySubject(format!("roster:{}", id.0)), email);
        profile.id = id;
        profile.name = self.name;
        profile.intro = self.intro;
        profile.skills = self
            .skills
            .split(';')
            .map(str::trim)
            .filter(|skill| !skill.is_empty())
            .map(str::to_string)
            .collect();

        if let Some(role) = self.role {
            profile.role =
                Role::from_label(&role).ok_or_else(|| invalid(format!("unknown role '{role}'")))?;
        }
        if let Some(hours) = self.hours_per_week {
            let parsed = hours
                .parse::<u8>()
                .map_err(|_| invalid(format!("hoursPerWeek '{hours}' is not a number")))?;
            profile.hours_per_week = Some(parsed);
        }
        if let Some(status) = self.idea_status {
            profile.idea_status = Some(
                IdeaStatus::lookup(&status)
                    .ok_or_else(|| invalid(format!("unknown ideaStatus '{status}'")))?,
            );
        }
        for (flag, raw) in [
            (NeedFlag::NeedsPm, self.needs_pm),
            (NeedFlag::NeedsDev, self.needs_dev),
        ] {
            if let Some(raw) = raw {
                let value = parse_flag(&raw)
                    .ok_or_else(|| invalid(format!("{} '{raw}' is not a boolean", flag.key())))?;
                profile.team_needs.set(flag, value);
            }
        }
        if let Some(score) = self.match_percentage {
            let parsed = score
                .parse::<f64>()
                .map_err(|_| invalid(format!("matchPercentage '{score}' is not a number")))?;
            profile.match_percentage = Some(parsed.clamp(0.0, 100.0));
        }
        if let Some(raw) = self.last_login {
            profile.last_login = Some(
                parse_timestamp(&raw)
                    .ok_or_else(|| invalid(format!("lastLogin '{raw}' is not a date")))?,
            );
        }

        check_bounds(&profile).map_err(invalid)?;
        Ok(profile)
    }
}

/// The limits profile updates enforce, applied to imported snapshots.
fn check_bounds(profile: &UserProfile) -> Result<(), String> {
    if let Some(hours) = profile.hours_per_week {
        if !(MIN_HOURS_PER_WEEK..=MAX_HOURS_PER_WEEK).contains(&hours) {
            return Err(format!(
                "hoursPerWeek {hours} is outside {MIN_HOURS_PER_WEEK}..={MAX_HOURS_PER_WEEK}"
            ));
        }
    }
    if profile.skills.len() > MAX_SKILLS {
        return Err(format!(
            "{} skills exceed the limit of {MAX_SKILLS}",
            profile.skills.len()
        ));
    }
    if char_len(&profile.intro) > MAX_INTRO_CHARS {
        return Err(format!("intro exceeds {MAX_INTRO_CHARS} characters"));
    }
    if let Some(score) = profile.match_percentage {
        if !(0.0..=100.0).contains(&score) {
            return Err(format!("matchPercentage {score} is outside 0..=100"));
        }
    }
    Ok(())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
