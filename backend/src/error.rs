//! # Error Taxonomy
//!
//! Errors raised by the identity, storage and domain layers. Validation
//! problems are reported per field and disable the action that would violate
//! them; auth and store failures always reach the caregiver as a notice.

use shared::{BusyState, FieldError, MeasurementField, UserNotice};
use thiserror::Error;

/// Failure reported by a record store adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("store error: {0}")]
    Unknown(String),
}

/// Failure to obtain an anonymous identity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("anonymous sign-in failed: {0}")]
    SignInFailed(String),
    #[error("identity provider is closed")]
    Closed,
}

/// Identity form field names, as stored on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityField {
    Name,
    AgeMonths,
    Sex,
    MotherName,
}

impl IdentityField {
    pub fn wire_name(&self) -> &'static str {
        match self {
            IdentityField::Name => "nama",
            IdentityField::AgeMonths => "umur",
            IdentityField::Sex => "jk",
            IdentityField::MotherName => "ibu",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IdentityField::Name => "Full name",
            IdentityField::AgeMonths => "Age (months)",
            IdentityField::Sex => "Sex",
            IdentityField::MotherName => "Mother's name",
        }
    }
}

/// A single field that blocks the current action
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{} is required", .0.label())]
    MissingIdentityField(IdentityField),
    #[error("{} is required", .0.label())]
    MissingMeasurement(MeasurementField),
    #[error("{} must be a number, got {input:?}", .field.label())]
    NotANumber { field: MeasurementField, input: String },
    #[error("{} must be greater than zero", .field.label())]
    NotPositive { field: MeasurementField, value: f64 },
    #[error("Age (months) must be a whole number, got {0:?}")]
    InvalidAge(String),
}

impl ValidationError {
    pub fn field_name(&self) -> &'static str {
        match self {
            ValidationError::MissingIdentityField(field) => field.wire_name(),
            ValidationError::InvalidAge(_) => IdentityField::AgeMonths.wire_name(),
            ValidationError::MissingMeasurement(field)
            | ValidationError::NotANumber { field, .. }
            | ValidationError::NotPositive { field, .. } => field.wire_name(),
        }
    }

    pub fn to_field_error(&self) -> FieldError {
        FieldError {
            field: self.field_name().to_string(),
            message: self.to_string(),
        }
    }
}

fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from the measurement session builder
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("validation failed: {}", describe(.0))]
    Validation(Vec<ValidationError>),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid identity handoff: {0}")]
    InvalidHandoff(String),
    #[error("measurement session not found: {0}")]
    SessionNotFound(String),
    #[error("measurement session {0} was closed before the request finished")]
    SessionClosed(String),
    #[error("session already saved as record {0}")]
    AlreadyPersisted(String),
    #[error("measurement session is busy ({0:?})")]
    Busy(BusyState),
}

impl SessionError {
    /// Notice shown to the caregiver for this failure
    pub fn notice(&self) -> UserNotice {
        match self {
            SessionError::Validation(_) => {
                UserNotice::error("Incomplete data", "Please complete all measurement fields with numbers.")
            }
            SessionError::Auth(_) => UserNotice::error(
                "Authentication error",
                "Anonymous sign-in failed. Please check your internet connection.",
            ),
            SessionError::Store(_) => UserNotice::error("Error", "Failed to save data. Please try again."),
            SessionError::AlreadyPersisted(_) => {
                UserNotice::info("Already saved", "This measurement is already in the history.")
            }
            SessionError::Busy(BusyState::Saving) => {
                UserNotice::info("Saving", "Please wait for the current save to finish.")
            }
            SessionError::Busy(_) => UserNotice::info("Loading", "Please wait until the measurement data has loaded."),
            other => UserNotice::error("Error", other.to_string()),
        }
    }

    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            SessionError::Validation(errors) => errors.iter().map(ValidationError::to_field_error).collect(),
            _ => Vec::new(),
        }
    }
}

/// Errors from the history repository
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    #[error("validation failed: {}", describe(.0))]
    Validation(Vec<ValidationError>),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("history record not found: {0}")]
    NotFound(String),
    #[error("delete confirmation is invalid or expired for record {0}")]
    InvalidConfirmation(String),
}

impl HistoryError {
    pub fn notice(&self) -> UserNotice {
        match self {
            HistoryError::Validation(_) => {
                UserNotice::error("Invalid data", "Please fill in every field; measurements must be numbers.")
            }
            HistoryError::Auth(_) => UserNotice::error("Login error", "Failed to sign in anonymously."),
            HistoryError::Store(_) => UserNotice::error("Failed", "An error occurred while talking to the server."),
            HistoryError::NotFound(_) => UserNotice::info("No data", "That record is no longer in the history."),
            HistoryError::InvalidConfirmation(_) => {
                UserNotice::error("Delete not confirmed", "Please confirm the deletion again.")
            }
        }
    }

    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            HistoryError::Validation(errors) => errors.iter().map(ValidationError::to_field_error).collect(),
            _ => Vec::new(),
        }
    }
}
