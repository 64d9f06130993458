//! Provenance triple carried by every record: where the data came from.

use crate::error::FieldErrors;
use crate::orm::{parse_choice, DataSource};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Validate)]
pub struct Provenance {
    pub data_source: DataSource,
    #[validate(url(message = "Enter a valid URL."))]
    pub source_url: Option<String>,
    pub source_notes: String,
}

/// Partial update of a provenance triple.
#[derive(Clone, Debug, Default, PartialEq, Eq, Validate)]
pub struct ProvenanceChanges {
    pub data_source: Option<DataSource>,
    #[validate(url(message = "Enter a valid URL."))]
    pub source_url: Option<String>,
    /// `true` clears the stored URL when `source_url` is `None`.
    pub clear_source_url: bool,
    pub source_notes: Option<String>,
}

impl ProvenanceChanges {
    pub fn is_empty(&self) -> bool {
        self.data_source.is_none()
            && self.source_url.is_none()
            && !self.clear_source_url
            && self.source_notes.is_none()
    }
}

/// Provenance fields as they arrive in a request body.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProvenancePayload {
    pub data_source: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub source_url: Option<Option<String>>,
    pub source_notes: Option<String>,
}

impl ProvenancePayload {
    /// Full provenance for a new record; omitted fields take their defaults.
    pub fn into_provenance(self, errors: &mut FieldErrors) -> Provenance {
        let data_source = match self.data_source.as_deref() {
            Some(raw) => match parse_choice("data_source", raw) {
                Ok(source) => source,
                Err(err) => {
                    merge_error(errors, err);
                    DataSource::default()
                }
            },
            None => DataSource::default(),
        };
        Provenance {
            data_source,
            source_url: self.source_url.flatten().filter(|u| !u.is_empty()),
            source_notes: self.source_notes.unwrap_or_default(),
        }
    }

    /// Changes for an existing record; omitted fields stay untouched.
    pub fn into_changes(self, errors: &mut FieldErrors) -> ProvenanceChanges {
        let data_source = self
            .data_source
            .as_deref()
            .and_then(|raw| match parse_choice("data_source", raw) {
                Ok(source) => Some(source),
                Err(err) => {
                    merge_error(errors, err);
                    None
                }
            });
        let (source_url, clear_source_url) = match self.source_url {
            Some(Some(url)) if !url.is_empty() => (Some(url), false),
            Some(_) => (None, true),
            None => (None, false),
        };
        ProvenanceChanges {
            data_source,
            source_url,
            clear_source_url,
            source_notes: self.source_notes,
        }
    }
}

/// Fold an error from a field parser into an accumulating set.
pub(crate) fn merge_error(errors: &mut FieldErrors, err: crate::error::AtlasError) {
    match err {
        crate::error::AtlasError::Validation(fields) => errors.extend(fields),
        other => errors.add(crate::error::NON_FIELD_ERRORS, other.to_string()),
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_source_url_is_field_error() {
        let provenance = Provenance {
            source_url: Some("not a url".to_string()),
            ..Provenance::default()
        };
        let fields: FieldErrors = provenance.validate().unwrap_err().into();
        assert!(fields.contains("source_url"));
    }

    #[test]
    fn test_payload_defaults_to_community() {
        let mut errors = FieldErrors::new();
        let provenance = ProvenancePayload::default().into_provenance(&mut errors);
        assert!(errors.is_empty());
        assert_eq!(provenance.data_source, DataSource::Community);
        assert_eq!(provenance.source_url, None);
    }

    #[test]
    fn test_unknown_data_source_is_reported() {
        let mut errors = FieldErrors::new();
        let payload = ProvenancePayload {
            data_source: Some("rumour".to_string()),
            ..ProvenancePayload::default()
        };
        payload.into_provenance(&mut errors);
        assert!(errors.contains("data_source"));
    }

    #[test]
    fn test_explicit_null_clears_url() {
        let payload: ProvenancePayload =
            serde_json::from_value(serde_json::json!({"source_url": null})).unwrap();
        let changes = payload.into_changes(&mut FieldErrors::new());
        assert!(changes.clear_source_url);
        assert!(!changes.is_empty());
    }
}
