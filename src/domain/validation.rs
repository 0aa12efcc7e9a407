//! Field-level checks shared by the resource services.
//!
//! Each helper records problems into a [`FieldErrors`] so a payload is reported
//! in one pass instead of failing on the first bad field.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use super::FieldErrors;

pub const REQUIRED: &str = "This field is required.";

/// Checks a required text field: non-blank after trimming, at most `max` chars.
pub fn required_text(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, REQUIRED);
    } else if trimmed.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", max),
        );
    }
}

pub fn optional_text(errors: &mut FieldErrors, field: &str, value: Option<&str>, max: usize) {
    if let Some(v) = value {
        if v.chars().count() > max {
            errors.add(
                field,
                format!("Ensure this field has no more than {} characters.", max),
            );
        }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .filter(|part| !part.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

pub fn email(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
    } else if !is_valid_email(value) {
        errors.add(field, "Enter a valid email address.");
    }
}

pub fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/') && !value.chars().any(char::is_whitespace))
}

/// `10.<4-9 digits>/<suffix without whitespace>`
pub fn is_valid_doi(value: &str) -> bool {
    let Some(rest) = value.strip_prefix("10.") else {
        return false;
    };
    let Some((registrant, suffix)) = rest.split_once('/') else {
        return false;
    };
    (4..=9).contains(&registrant.len())
        && registrant.chars().all(|c| c.is_ascii_digit())
        && !suffix.is_empty()
        && !suffix.chars().any(char::is_whitespace)
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Records an error and returns `None` when the date is missing or malformed.
pub fn required_date(errors: &mut FieldErrors, field: &str, value: &str) -> Option<NaiveDate> {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    let parsed = parse_date(value);
    if parsed.is_none() {
        errors.add(field, "Date has wrong format. Use YYYY-MM-DD.");
    }
    parsed
}

pub fn optional_date(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
) -> Option<NaiveDate> {
    match value {
        Some(v) if !v.trim().is_empty() => required_date(errors, field, v),
        _ => None,
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Records an "invalid choice" error unless `parse` accepts the value.
pub fn choice<T>(
    errors: &mut FieldErrors,
    field: &str,
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
    choices: &str,
) -> Option<T> {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    let parsed = parse(value);
    if parsed.is_none() {
        errors.add(
            field,
            format!("\"{}\" is not a valid choice. Expected one of: {}.", value, choices),
        );
    }
    parsed
}

/// Lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
/// in PATCH payloads. Use with `#[serde(default, deserialize_with = "nullable")]`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
