//! Validation policies for EKSConfigTemplate admission webhooks.
//!
//! Policies are organized into tiers:
//! - Tier 1 (Create): structural checks of the bootstrap payload
//! - Tier 2 (Update): `spec.template` immutability

pub mod immutability;
pub mod structure;

use std::fmt;

use kube::ResourceExt;

use crate::crd::EksConfigTemplate;
use crate::webhooks::admission::{AdmissionError, ValidationResult};

/// Reason used when one or more fields fail validation.
pub const REASON_INVALID: &str = "Invalid";

/// Context for validation
pub struct ValidationContext<'a> {
    /// The resource being validated
    pub resource: &'a EksConfigTemplate,
    /// The old resource (for UPDATE operations)
    pub old_resource: Option<&'a EksConfigTemplate>,
}

impl<'a> ValidationContext<'a> {
    pub fn create(resource: &'a EksConfigTemplate) -> Self {
        Self {
            resource,
            old_resource: None,
        }
    }

    pub fn update(resource: &'a EksConfigTemplate, old: &'a EksConfigTemplate) -> Self {
        Self {
            resource,
            old_resource: Some(old),
        }
    }

    /// Check if this is an UPDATE operation
    pub fn is_update(&self) -> bool {
        self.old_resource.is_some()
    }
}

/// Run all validation policies
pub fn validate_all(ctx: &ValidationContext<'_>) -> ValidationResult {
    // Tier 2: updates are decided by immutability alone
    if ctx.is_update() {
        return immutability::validate(ctx);
    }

    // Tier 1: structural checks on create
    structure::validate(ctx)
}

/// Kind of a single field violation, rendered like apimachinery field errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldErrorKind {
    Required,
    Invalid(String),
    Duplicate(String),
    Forbidden,
}

/// A single field violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub kind: FieldErrorKind,
    pub detail: Option<String>,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.path)?;
        match &self.kind {
            FieldErrorKind::Required => write!(f, "Required value")?,
            FieldErrorKind::Invalid(value) => write!(f, "Invalid value: {:?}", value)?,
            FieldErrorKind::Duplicate(value) => write!(f, "Duplicate value: {:?}", value)?,
            FieldErrorKind::Forbidden => write!(f, "Forbidden")?,
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

/// Collects every field violation of an object so they are reported together.
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(&mut self, path: impl Into<String>) {
        self.push(path.into(), FieldErrorKind::Required, None);
    }

    pub fn invalid(&mut self, path: impl Into<String>, value: &str, detail: impl Into<String>) {
        self.push(
            path.into(),
            FieldErrorKind::Invalid(value.to_string()),
            Some(detail.into()),
        );
    }

    pub fn duplicate(&mut self, path: impl Into<String>, value: &str) {
        self.push(path.into(), FieldErrorKind::Duplicate(value.to_string()), None);
    }

    pub fn forbidden(&mut self, path: impl Into<String>, detail: impl Into<String>) {
        self.push(path.into(), FieldErrorKind::Forbidden, Some(detail.into()));
    }

    fn push(&mut self, path: String, kind: FieldErrorKind, detail: Option<String>) {
        self.errors.push(FieldError { path, kind, detail });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Turn the collected violations into a single denial for `resource`.
    pub fn into_result(self, resource: &EksConfigTemplate) -> ValidationResult {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(AdmissionError::denied(
            REASON_INVALID,
            invalid_message(resource, &self.errors),
        ))
    }
}

/// `EKSConfigTemplate.bootstrap.cluster.x-k8s.io "name" is invalid: ...`
fn invalid_message(resource: &EksConfigTemplate, errors: &[FieldError]) -> String {
    use kube::Resource;

    let qualified_kind = format!(
        "{}.{}",
        EksConfigTemplate::kind(&()),
        EksConfigTemplate::group(&())
    );
    let details = match errors {
        [single] => single.to_string(),
        many => format!(
            "[{}]",
            many.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    format!(
        "{} {:?} is invalid: {}",
        qualified_kind,
        resource.name_any(),
        details
    )
}
