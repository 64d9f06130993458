//! Error taxonomy shared by every atlas component.
//!
//! Every failure is a rejected operation on a single entity. Nothing here is
//! fatal to the process; the web layer renders each variant as a structured
//! JSON body through [`ResponseError`].

use crate::orm::reports::ReportState;
use crate::storage::StorageError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Field name used for errors that are not tied to one input field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Field-addressable validation messages, keyed by input field name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Merge another set of errors into this one.
    pub fn extend(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when no errors were collected, otherwise a validation error.
    pub fn into_result(self) -> Result<(), AtlasError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AtlasError::Validation(self))
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join("; ")))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        collect_validation_errors(&mut out, None, errors);
        out
    }
}

fn collect_validation_errors(
    out: &mut FieldErrors,
    prefix: Option<&str>,
    errors: validator::ValidationErrors,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.into_errors() {
        // Flattened structs (provenance) report their fields at the top level.
        let name = match prefix {
            Some(p) if !p.is_empty() => format!("{}.{}", p, field),
            _ => field.to_string(),
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let message = err
                        .message
                        .map(|m| m.into_owned())
                        .unwrap_or_else(|| format!("Invalid value ({})", err.code));
                    out.add(&name, message);
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                collect_validation_errors(out, Some(""), *nested);
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    let item_prefix = format!("{}[{}]", name, index);
                    collect_validation_errors(out, Some(&item_prefix), *nested);
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    /// The requested workflow state is not reachable from the current one.
    #[error(
        "Invalid state transition from {current} to {requested}. Valid transitions: [{}]",
        .allowed.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
    )]
    InvalidTransition {
        current: ReportState,
        requested: ReportState,
        allowed: Vec<ReportState>,
    },
    #[error("Either file or URL must be provided.")]
    MissingPayload,
    #[error("Provide either file or URL, not both.")]
    ConflictingPayload,
    /// A delete was refused because other records still point at the target.
    #[error("Cannot delete {entity} {id}: still referenced by {dependents}")]
    ReferentialIntegrityViolation {
        entity: &'static str,
        id: Uuid,
        dependents: String,
    },
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    /// Another request changed the record between read and write.
    #[error("{0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AtlasError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        AtlasError::NotFound { entity, id }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AtlasError::Validation(FieldErrors::single(field, message))
    }

    /// Machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AtlasError::InvalidTransition { .. } => "invalid_transition",
            AtlasError::MissingPayload => "missing_payload",
            AtlasError::ConflictingPayload => "conflicting_payload",
            AtlasError::ReferentialIntegrityViolation { .. } => "referential_integrity_violation",
            AtlasError::Validation(_) => "validation_error",
            AtlasError::NotFound { .. } => "not_found",
            AtlasError::Conflict(_) => "conflict",
            AtlasError::Database(_) => "database_error",
            AtlasError::Storage(_) => "storage_error",
        }
    }
}

impl From<validator::ValidationErrors> for AtlasError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AtlasError::Validation(errors.into())
    }
}

impl ResponseError for AtlasError {
    fn status_code(&self) -> StatusCode {
        match self {
            AtlasError::InvalidTransition { .. }
            | AtlasError::MissingPayload
            | AtlasError::ConflictingPayload
            | AtlasError::Validation(_) => StatusCode::BAD_REQUEST,
            AtlasError::NotFound { .. } => StatusCode::NOT_FOUND,
            AtlasError::ReferentialIntegrityViolation { .. } | AtlasError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            AtlasError::Storage(StorageError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            AtlasError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            AtlasError::Database(_) | AtlasError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let body = match self {
            AtlasError::InvalidTransition {
                current,
                requested,
                allowed,
            } => json!({
                "status": "error",
                "code": self.code(),
                "message": self.to_string(),
                "current_state": current,
                "requested_state": requested,
                "allowed_states": allowed,
            }),
            AtlasError::MissingPayload | AtlasError::ConflictingPayload => json!({
                "status": "error",
                "code": self.code(),
                "message": self.to_string(),
                "fields": FieldErrors::single(NON_FIELD_ERRORS, self.to_string()),
            }),
            AtlasError::Validation(fields) => json!({
                "status": "error",
                "code": self.code(),
                "message": "Validation failed",
                "fields": fields,
            }),
            AtlasError::Database(err) => {
                log::error!("database error: {}", err);
                json!({
                    "status": "error",
                    "code": self.code(),
                    "message": "Internal server error",
                })
            }
            AtlasError::Storage(err) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                log::error!("storage error: {}", err);
                json!({
                    "status": "error",
                    "code": self.code(),
                    "message": "Internal server error",
                })
            }
            _ => json!({
                "status": "error",
                "code": self.code(),
                "message": self.to_string(),
            }),
        };

        HttpResponse::build(status).json(body)
    }
}
