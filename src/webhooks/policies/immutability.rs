//! Immutability validation policy.
//!
//! Tier 2 (Update): Only enforced on UPDATE operations
//!
//! Validates:
//! - `spec.template` is deeply equal to the persisted template
//!
//! Object metadata (labels, annotations, owner references) may change freely.

use super::{ValidationContext, ValidationResult};
use crate::webhooks::admission::AdmissionError;

/// Reason attached to immutability denials
pub const REASON_FIELD_IMMUTABLE: &str = "FieldImmutable";

/// Validate immutability constraints on UPDATE operations
pub fn validate(ctx: &ValidationContext<'_>) -> ValidationResult {
    let old = match ctx.old_resource {
        Some(r) => r,
        None => return Ok(()), // Not an UPDATE
    };

    let new = ctx.resource;

    if new.spec.template != old.spec.template {
        return Err(AdmissionError::denied(
            REASON_FIELD_IMMUTABLE,
            "spec.template: Invalid value: template is immutable",
        ));
    }

    Ok(())
}
