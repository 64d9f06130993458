//! HTTP boundary: every route lives under `/api/v1`.

pub mod assets;
pub mod evidence;
pub mod geography;
pub mod health;
pub mod reports;
pub mod verifications;

use crate::error::{AtlasError, FieldErrors, NON_FIELD_ERRORS};
use crate::orm::parse_choice;
use crate::provenance::merge_error;
use crate::search::Sort;
use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::{web, HttpRequest};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sea_orm::{ActiveEnum, Iterable};
use uuid::Uuid;

/// Configures the web app by adding services from each web file.
pub fn configure(conf: &mut web::ServiceConfig) {
    conf.app_data(json_config()).app_data(query_config());

    // Within each file static paths are registered before `{id}` paths.
    health::configure(conf);
    geography::configure(conf);
    assets::configure(conf);
    reports::configure(conf);
    evidence::configure(conf);
    verifications::configure(conf);
}

/// Malformed JSON bodies become structured validation errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
        log::debug!("Rejected JSON body: {}", err);
        AtlasError::validation(NON_FIELD_ERRORS, err.to_string()).into()
    })
}

/// Malformed query strings become structured validation errors.
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: QueryPayloadError, _req: &HttpRequest| {
        log::debug!("Rejected query string: {}", err);
        AtlasError::validation(NON_FIELD_ERRORS, err.to_string()).into()
    })
}

/// Parse an optional choice field, recording failures.
pub(crate) fn choice<E>(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<E>
where
    E: ActiveEnum<Value = String> + Iterable,
{
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    match parse_choice(field, raw) {
        Ok(value) => Some(value),
        Err(err) => {
            merge_error(errors, err);
            None
        }
    }
}

/// Parse `?ordering=name` or `?ordering=-name` against a whitelist.
pub(crate) fn ordering<C: Copy>(
    errors: &mut FieldErrors,
    raw: Option<&str>,
    allowed: &[(&str, C)],
) -> Option<Sort<C>> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    let sort = Sort::parse(raw, allowed);
    if sort.is_none() {
        let names: Vec<&str> = allowed.iter().map(|(name, _)| *name).collect();
        errors.add(
            "ordering",
            format!("Cannot order by \"{}\". Choose from: {}.", raw, names.join(", ")),
        );
    }
    sort
}

/// A choice field that must be present.
pub(crate) fn required_choice<E>(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
) -> Option<E>
where
    E: ActiveEnum<Value = String> + Iterable,
{
    if raw.map(str::trim).filter(|r| !r.is_empty()).is_none() {
        errors.add(field, "This field is required.");
        return None;
    }
    choice(errors, field, raw)
}

/// Take a required value, recording its absence.
pub(crate) fn required<T>(errors: &mut FieldErrors, field: &str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        errors.add(field, "This field is required.");
    }
    value
}

/// Parse a query-string boolean the way HTML forms and API clients send it.
pub(crate) fn flag(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<bool> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            errors.add(field, format!("\"{}\" is not a valid boolean.", raw));
            None
        }
    }
}

/// Parse a query-string UUID.
pub(crate) fn uuid_param(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<Uuid> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, format!("\"{}\" is not a valid UUID.", raw));
            None
        }
    }
}

/// Parse a query-string timestamp: RFC 3339, a naive ISO datetime (UTC), or a
/// bare date. A bare date means the start of that day, or its end when
/// `end_of_day` is set.
pub(crate) fn datetime_param(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
    end_of_day: bool,
) -> Option<NaiveDateTime> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc).naive_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = if end_of_day {
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)
        };
        if let Some(time) = time {
            return Some(date.and_time(time));
        }
    }
    errors.add(
        field,
        format!("\"{}\" is not a valid date or datetime (use ISO 8601).", raw),
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::reports::ReportState;

    #[test]
    fn test_flag_parsing() {
        let mut errors = FieldErrors::new();
        assert_eq!(flag(&mut errors, "is_verified", Some("True")), Some(true));
        assert_eq!(flag(&mut errors, "is_verified", Some("0")), Some(false));
        assert_eq!(flag(&mut errors, "is_verified", None), None);
        assert!(errors.is_empty());
        assert_eq!(flag(&mut errors, "is_verified", Some("maybe")), None);
        assert!(errors.contains("is_verified"));
    }

    #[test]
    fn test_required_choice_reports_missing_and_invalid() {
        let mut errors = FieldErrors::new();
        let missing: Option<ReportState> = required_choice(&mut errors, "new_state", None);
        assert!(missing.is_none());
        assert_eq!(
            errors.get("new_state").unwrap(),
            &vec!["This field is required.".to_string()]
        );

        let mut errors = FieldErrors::new();
        let parsed: Option<ReportState> =
            required_choice(&mut errors, "new_state", Some("Under_Review"));
        assert_eq!(parsed, Some(ReportState::UnderReview));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_datetime_param_formats() {
        let mut errors = FieldErrors::new();
        let start = datetime_param(&mut errors, "since", Some("2024-03-01"), false).unwrap();
        assert_eq!(start.to_string(), "2024-03-01 00:00:00");
        let end = datetime_param(&mut errors, "until", Some("2024-03-01"), true).unwrap();
        assert_eq!(end.to_string(), "2024-03-01 23:59:59.999");
        let zoned =
            datetime_param(&mut errors, "since", Some("2024-03-01T12:00:00+01:00"), false).unwrap();
        assert_eq!(zoned.to_string(), "2024-03-01 11:00:00");
        assert!(errors.is_empty());

        assert!(datetime_param(&mut errors, "since", Some("yesterday"), false).is_none());
        assert!(errors.contains("since"));
    }

    #[test]
    fn test_uuid_param() {
        let mut errors = FieldErrors::new();
        assert!(uuid_param(&mut errors, "report", Some("nope")).is_none());
        assert!(errors.contains("report"));
    }
}
