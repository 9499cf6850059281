//! Self-service profile updates.
//!
//! Raw form input is normalized in one pass into a [`ValidatedPatch`]; nothing past
//! [`validate`] sees the "maybe JSON string, maybe object" shapes clients send. A
//! field absent from the form leaves the stored value untouched.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::domain::{
    IdeaStatus, NeedFlag, Role, TeamNeeds, UserProfile, MAX_BACKGROUND_CHARS, MAX_HOURS_PER_WEEK,
    MAX_INTRO_CHARS, MAX_NAME_CHARS, MAX_SKILLS, MAX_SKILL_CHARS, MIN_HOURS_PER_WEEK,
};
use super::sanitize::{char_len, is_valid_email, sanitize_text, sanitize_truncated};

pub const MAX_CONTACT_EMAIL_CHARS: usize = 100;
pub const MAX_CONTACT_PHONE_CHARS: usize = 20;
pub const MAX_CONTACT_SLACK_CHARS: usize = 50;

/// Profile fields as submitted. Structured fields stay loosely typed until validated.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateForm {
    pub name: Option<String>,
    pub intro: Option<String>,
    pub background: Option<String>,
    pub skills: Option<Value>,
    pub role: Option<String>,
    pub hours_per_week: Option<Value>,
    pub idea_status: Option<String>,
    pub team_needs: Option<Value>,
    pub contact: Option<Value>,
    /// Older clients post need flags as individual fields.
    #[serde(rename = "needsPM")]
    pub needs_pm: Option<Value>,
    #[serde(rename = "needsDev")]
    pub needs_dev: Option<Value>,
}

impl ProfileUpdateForm {
    /// Record one text field of a multipart body. `skills` and `skills[]` accumulate
    /// into a list when repeated; other fields keep the last value. Unknown names are
    /// ignored.
    pub fn push_text(&mut self, name: &str, value: String) {
        match name {
            "name" => self.name = Some(value),
            "intro" => self.intro = Some(value),
            "background" => self.background = Some(value),
            "role" => self.role = Some(value),
            "hoursPerWeek" => self.hours_per_week = Some(Value::String(value)),
            "ideaStatus" => self.idea_status = Some(value),
            "teamNeeds" => self.team_needs = Some(Value::String(value)),
            "contact" => self.contact = Some(Value::String(value)),
            "needsPM" => self.needs_pm = Some(Value::String(value)),
            "needsDev" => self.needs_dev = Some(Value::String(value)),
            "skills" => {
                self.skills = Some(match self.skills.take() {
                    // A lone bare skill is a one-item list; a JSON array is decoded later.
                    None if value.trim_start().starts_with('[') => Value::String(value),
                    None => Value::Array(vec![Value::String(value)]),
                    Some(Value::Array(mut items)) => {
                        items.push(Value::String(value));
                        Value::Array(items)
                    }
                    Some(previous) => Value::Array(vec![previous, Value::String(value)]),
                });
            }
            "skills[]" => {
                let mut items = match self.skills.take() {
                    Some(Value::Array(items)) => items,
                    Some(previous) => vec![previous],
                    None => Vec::new(),
                };
                items.push(Value::String(value));
                self.skills = Some(Value::Array(items));
            }
            _ => {}
        }
    }
}

/// Contact channels to overwrite; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactPatch {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub slack: Option<String>,
}

/// Normalized, bounds-checked update. Every `Some` field replaces (or, for team
/// needs and contact, merges into) the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedPatch {
    pub name: Option<String>,
    pub intro: Option<String>,
    pub background: Option<String>,
    pub skills: Option<Vec<String>>,
    pub role: Option<Role>,
    pub hours_per_week: Option<u8>,
    pub idea_status: Option<IdeaStatus>,
    pub team_needs: Option<TeamNeeds>,
    pub contact: Option<ContactPatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every field that failed validation, in form order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", summarize(.errors))]
pub struct ProfileUpdateError {
    pub errors: Vec<FieldError>,
}

impl ProfileUpdateError {
    pub fn single(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate every field present in `form`, collecting all failures.
pub fn validate(form: &ProfileUpdateForm) -> Result<ValidatedPatch, ProfileUpdateError> {
    let mut errors = Vec::new();
    let mut patch = ValidatedPatch::default();

    if let Some(raw) = &form.name {
        patch.name = keep(&mut errors, validate_name(raw));
    }
    if let Some(raw) = &form.intro {
        patch.intro = keep(
            &mut errors,
            validate_bounded_text("intro", "Intro", raw, MAX_INTRO_CHARS),
        );
    }
    if let Some(raw) = &form.background {
        patch.background = keep(
            &mut errors,
            validate_bounded_text("background", "Background", raw, MAX_BACKGROUND_CHARS),
        );
    }
    if let Some(raw) = &form.skills {
        patch.skills = keep(&mut errors, validate_skills(raw)).flatten();
    }
    if let Some(raw) = non_blank(form.role.as_deref()) {
        patch.role = keep(
            &mut errors,
            Role::from_label(raw).ok_or_else(|| FieldError::new("role", "Invalid role")),
        );
    }
    if let Some(raw) = &form.hours_per_week {
        patch.hours_per_week = keep(&mut errors, validate_hours(raw)).flatten();
    }
    if let Some(raw) = non_blank(form.idea_status.as_deref()) {
        patch.idea_status = keep(
            &mut errors,
            IdeaStatus::lookup(raw)
                .ok_or_else(|| FieldError::new("ideaStatus", "Invalid idea status")),
        );
    }
    match &form.team_needs {
        Some(raw) => patch.team_needs = keep(&mut errors, validate_team_needs(raw)).flatten(),
        None => patch.team_needs = keep(&mut errors, legacy_team_needs(form)).flatten(),
    }
    if let Some(raw) = &form.contact {
        patch.contact = keep(&mut errors, validate_contact(raw)).flatten();
    }

    if errors.is_empty() {
        Ok(patch)
    } else {
        Err(ProfileUpdateError { errors })
    }
}

/// Merge a validated patch into `existing`. Identity fields are never touched.
pub fn reconcile(
    existing: &UserProfile,
    patch: ValidatedPatch,
    photo_url: Option<String>,
) -> UserProfile {
    let mut profile = existing.clone();

    if let Some(name) = patch.name {
        profile.name = name;
    }
    if let Some(intro) = patch.intro {
        profile.intro = intro;
    }
    if let Some(background) = patch.background {
        profile.background = background;
    }
    if let Some(skills) = patch.skills {
        profile.skills = skills;
    }
    if let Some(role) = patch.role {
        profile.role = role;
    }
    if let Some(hours) = patch.hours_per_week {
        profile.hours_per_week = Some(hours);
    }
    if let Some(status) = patch.idea_status {
        profile.idea_status = Some(status);
    }
    if let Some(needs) = patch.team_needs {
        profile.team_needs.merge(&needs);
    }
    if let Some(contact) = patch.contact {
        if let Some(email) = contact.email {
            profile.contact.email = Some(email);
        }
        if let Some(phone) = contact.phone {
            profile.contact.phone = Some(phone);
        }
        if let Some(slack) = contact.slack {
            profile.contact.slack = Some(slack);
        }
    }
    if let Some(url) = photo_url {
        profile.photo_url = Some(url);
    }

    profile
}

fn keep<T>(errors: &mut Vec<FieldError>, result: Result<T, FieldError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            errors.push(error);
            None
        }
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

fn validate_name(raw: &str) -> Result<String, FieldError> {
    let cleaned = sanitize_truncated(raw, MAX_NAME_CHARS);
    if cleaned.is_empty() {
        return Err(FieldError::new("name", "Name cannot be empty"));
    }
    Ok(cleaned)
}

fn validate_bounded_text(
    field: &'static str,
    label: &str,
    raw: &str,
    max: usize,
) -> Result<String, FieldError> {
    let cleaned = sanitize_text(raw);
    if char_len(&cleaned) > max {
        return Err(FieldError::new(
            field,
            format!("{label} exceeds {max} characters"),
        ));
    }
    Ok(cleaned)
}

/// Blank text is treated as "not supplied", the way HTML forms submit untouched
/// inputs. A JSON-encoded string is decoded; anything else is taken as-is.
fn decode_structured(field: &'static str, raw: &Value) -> Result<Option<Value>, FieldError> {
    match raw {
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => serde_json::from_str(text)
            .map(Some)
            .map_err(|_| FieldError::new(field, format!("Invalid {field} format"))),
        Value::Null => Ok(None),
        other => Ok(Some(other.clone())),
    }
}

fn validate_skills(raw: &Value) -> Result<Option<Vec<String>>, FieldError> {
    let items = match raw {
        Value::Array(items) => items.clone(),
        other => match decode_structured("skills", other)? {
            None => return Ok(None),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(FieldError::new("skills", "Skills must be an array")),
        },
    };

    let mut skills: Vec<String> = Vec::new();
    for item in items {
        let Value::String(text) = item else {
            return Err(FieldError::new("skills", "Skills must be a list of strings"));
        };
        let cleaned = sanitize_truncated(&text, MAX_SKILL_CHARS);
        if cleaned.is_empty() || skills.contains(&cleaned) {
            continue;
        }
        skills.push(cleaned);
    }
    skills.truncate(MAX_SKILLS);
    Ok(Some(skills))
}

fn validate_hours(raw: &Value) -> Result<Option<u8>, FieldError> {
    let not_a_number = || FieldError::new("hoursPerWeek", "Hours per week must be a whole number");
    let hours = match raw {
        Value::Number(number) => number.as_i64().ok_or_else(not_a_number)?,
        Value::String(text) if text.trim().is_empty() => return Ok(None),
        Value::String(text) => text.trim().parse::<i64>().map_err(|_| not_a_number())?,
        Value::Null => return Ok(None),
        _ => return Err(not_a_number()),
    };

    if hours < i64::from(MIN_HOURS_PER_WEEK) || hours > i64::from(MAX_HOURS_PER_WEEK) {
        return Err(FieldError::new(
            "hoursPerWeek",
            format!(
                "Hours per week must be between {} and {}",
                MIN_HOURS_PER_WEEK, MAX_HOURS_PER_WEEK
            ),
        ));
    }
    // Range check above guarantees the value fits.
    Ok(u8::try_from(hours).ok())
}

fn structured_object(
    field: &'static str,
    raw: &Value,
) -> Result<Option<Map<String, Value>>, FieldError> {
    match decode_structured(field, raw)? {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(FieldError::new(field, format!("Invalid {field} format"))),
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn validate_team_needs(raw: &Value) -> Result<Option<TeamNeeds>, FieldError> {
    let Some(object) = structured_object("teamNeeds", raw)? else {
        return Ok(None);
    };

    let mut patch = TeamNeeds::empty_patch();
    for (key, value) in &object {
        // Keys outside the allow-list are dropped.
        let Some(flag) = NeedFlag::from_key(key) else {
            continue;
        };
        let flag_value = coerce_bool(value).ok_or_else(|| {
            FieldError::new("teamNeeds", format!("{key} must be true or false"))
        })?;
        patch.set(flag, flag_value);
    }

    Ok((!patch.is_empty()).then_some(patch))
}

fn legacy_team_needs(form: &ProfileUpdateForm) -> Result<Option<TeamNeeds>, FieldError> {
    let mut patch = TeamNeeds::empty_patch();
    for (flag, raw) in [
        (NeedFlag::NeedsPm, &form.needs_pm),
        (NeedFlag::NeedsDev, &form.needs_dev),
    ] {
        if let Some(value) = raw {
            let flag_value = coerce_bool(value).ok_or_else(|| {
                FieldError::new("teamNeeds", format!("{} must be true or false", flag.key()))
            })?;
            patch.set(flag, flag_value);
        }
    }
    Ok((!patch.is_empty()).then_some(patch))
}

fn contact_channel(
    object: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, FieldError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(non_blank(Some(text.as_str())).map(str::to_string)),
        Some(_) => Err(FieldError::new("contact", format!("contact.{key} must be a string"))),
    }
}

fn validate_contact(raw: &Value) -> Result<Option<ContactPatch>, FieldError> {
    let Some(object) = structured_object("contact", raw)? else {
        return Ok(None);
    };

    let email = match contact_channel(&object, "email")? {
        Some(email) if !is_valid_email(&email) => {
            return Err(FieldError::new("contact", "Please provide a valid contact email"));
        }
        other => other,
    };
    let phone = contact_channel(&object, "phone")?;
    let slack = contact_channel(&object, "slack")?;

    Ok(Some(ContactPatch {
        email: email.map(|value| sanitize_truncated(&value, MAX_CONTACT_EMAIL_CHARS)),
        phone: phone.map(|value| sanitize_truncated(&value, MAX_CONTACT_PHONE_CHARS)),
        slack: slack.map(|value| sanitize_truncated(&value, MAX_CONTACT_SLACK_CHARS)),
    }))
}
