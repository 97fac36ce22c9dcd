//! Defaulting and validation capabilities for admission-controlled resources.
//!
//! A resource opts into admission control by implementing [`Defaulter`],
//! [`Validator`], or both. Implementations must be pure functions of their
//! inputs: the server calls them concurrently and never shares state between
//! calls.

use thiserror::Error;

/// Reason attached to denials produced by [`AdmissionError::Internal`].
pub const REASON_INTERNAL: &str = "InternalError";

/// Error returned by a validation capability.
///
/// Both variants end in a denied admission response. There is no path from
/// an error to an allowed request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// The request was rejected by a validation rule.
    #[error("{message}")]
    Denied { reason: String, message: String },

    /// The decision could not be made, e.g. the object was malformed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AdmissionError {
    /// Create a denial with a machine-readable reason and a message for the user.
    pub fn denied(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Reason surfaced to the requester.
    pub fn reason(&self) -> &str {
        match self {
            Self::Denied { reason, .. } => reason,
            Self::Internal(_) => REASON_INTERNAL,
        }
    }

    /// Message surfaced to the requester.
    pub fn message(&self) -> String {
        match self {
            Self::Denied { message, .. } => message.clone(),
            Self::Internal(_) => self.to_string(),
        }
    }
}

impl From<serde_json::Error> for AdmissionError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {e}"))
    }
}

/// Result of a validation check
pub type ValidationResult = std::result::Result<(), AdmissionError>;

/// Populates unset optional fields with system-chosen defaults.
///
/// Defaulting is total: a default that cannot be computed leaves the field
/// unset. Applying it twice must give the same object as applying it once.
pub trait Defaulter {
    fn set_defaults(&mut self);
}

/// Decides whether a create, update or delete of the resource is allowed.
pub trait Validator {
    fn validate_create(&self) -> ValidationResult;

    /// `self` is the proposed object, `old` the currently persisted one.
    fn validate_update(&self, old: &Self) -> ValidationResult;

    fn validate_delete(&self) -> ValidationResult;
}
