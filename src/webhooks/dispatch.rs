//! Maps admission requests onto the [`Defaulter`] and [`Validator`] capabilities.
//!
//! These functions are transport-agnostic: they take a typed kube-rs
//! `AdmissionRequest` and produce the decision. The HTTP layer lives in
//! `server.rs`.

use kube::Resource;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use serde::Serialize;

use crate::webhooks::admission::{AdmissionError, Defaulter, ValidationResult, Validator};

/// Compute the JSON patch that defaulting applies to the request object.
///
/// Returns `Ok(None)` when there is nothing to default: the operation is not
/// a create, the request carries no object, or every default is already in
/// place. Updates are never defaulted since the patch would change an
/// immutable template persisted without defaults.
pub fn review_mutation<K>(
    request: &AdmissionRequest<K>,
) -> Result<Option<json_patch::Patch>, AdmissionError>
where
    K: Resource + Clone + Serialize + Defaulter,
{
    if !matches!(request.operation, Operation::Create) {
        return Ok(None);
    }
    let Some(object) = &request.object else {
        return Ok(None);
    };

    let original = serde_json::to_value(object)?;
    let mut defaulted = object.clone();
    defaulted.set_defaults();
    let defaulted = serde_json::to_value(&defaulted)?;

    let patch = json_patch::diff(&original, &defaulted);
    if patch.0.is_empty() {
        Ok(None)
    } else {
        Ok(Some(patch))
    }
}

/// Run the validation capability matching the request operation.
pub fn review_validation<K>(request: &AdmissionRequest<K>) -> ValidationResult
where
    K: Resource + Validator,
{
    match request.operation {
        Operation::Create => required(request.object.as_ref(), "object")?.validate_create(),
        Operation::Update => {
            let new = required(request.object.as_ref(), "object")?;
            let old = required(request.old_object.as_ref(), "oldObject")?;
            new.validate_update(old)
        }
        // The API server sends the object being deleted as oldObject. Deletes
        // are allowed even when it is absent.
        Operation::Delete => match &request.old_object {
            Some(old) => old.validate_delete(),
            None => Ok(()),
        },
        Operation::Connect => Ok(()),
    }
}

fn required<'a, K>(object: Option<&'a K>, field: &str) -> Result<&'a K, AdmissionError> {
    object.ok_or_else(|| AdmissionError::Internal(format!("missing {field} in request")))
}

/// Build the admission response for a mutation decision.
pub fn mutation_response<K: Resource>(
    request: &AdmissionRequest<K>,
    decision: Result<Option<json_patch::Patch>, AdmissionError>,
) -> AdmissionResponse {
    match decision {
        Ok(None) => AdmissionResponse::from(request),
        Ok(Some(patch)) => match AdmissionResponse::from(request).with_patch(patch) {
            Ok(response) => response,
            Err(e) => deny(
                request,
                &AdmissionError::Internal(format!("patch serialization failed: {e}")),
            ),
        },
        Err(e) => deny(request, &e),
    }
}

/// Build the admission response for a validation decision.
pub fn validation_response<K: Resource>(
    request: &AdmissionRequest<K>,
    decision: &ValidationResult,
) -> AdmissionResponse {
    match decision {
        Ok(()) => AdmissionResponse::from(request),
        Err(e) => deny(request, e),
    }
}

/// Create a denial response with reason embedded in message.
/// kube-rs deny() only sets status.message, so we format as "[reason] message"
pub fn deny<K: Resource>(request: &AdmissionRequest<K>, error: &AdmissionError) -> AdmissionResponse {
    AdmissionResponse::from(request).deny(format!("[{}] {}", error.reason(), error.message()))
}

/// Default a request and build its response.
pub fn mutate<K>(request: &AdmissionRequest<K>) -> AdmissionResponse
where
    K: Resource + Clone + Serialize + Defaulter,
{
    mutation_response(request, review_mutation(request))
}

/// Validate a request and build its response.
pub fn validate<K>(request: &AdmissionRequest<K>) -> AdmissionResponse
where
    K: Resource + Validator,
{
    validation_response(request, &review_validation(request))
}
