//! Admission capabilities of EKSConfigTemplate.
//!
//! Defaulting fills in file ownership and mode, NTP enablement and password
//! locking. Validation checks the payload structure on create and rejects any
//! change to `spec.template` on update. Deletes are always allowed here;
//! reference checks against MachineDeployments belong to another component.

use crate::crd::{EksConfigSpec, EksConfigTemplate};
use crate::webhooks::admission::{Defaulter, ValidationResult, Validator};
use crate::webhooks::policies::{ValidationContext, validate_all};

/// Default owner of files written to the node
pub const DEFAULT_FILE_OWNER: &str = "root:root";
/// Default mode of files written to the node
pub const DEFAULT_FILE_PERMISSIONS: &str = "0644";

impl Defaulter for EksConfigTemplate {
    fn set_defaults(&mut self) {
        default_spec(&mut self.spec.template.spec);
    }
}

fn default_spec(spec: &mut EksConfigSpec) {
    for file in &mut spec.files {
        file.owner
            .get_or_insert_with(|| DEFAULT_FILE_OWNER.to_string());
        file.permissions
            .get_or_insert_with(|| DEFAULT_FILE_PERMISSIONS.to_string());
    }

    if let Some(ntp) = &mut spec.ntp
        && ntp.enabled.is_none()
        && !ntp.servers.is_empty()
    {
        ntp.enabled = Some(true);
    }

    for user in &mut spec.users {
        user.lock_password.get_or_insert(true);
    }
}

impl Validator for EksConfigTemplate {
    fn validate_create(&self) -> ValidationResult {
        validate_all(&ValidationContext::create(self))
    }

    fn validate_update(&self, old: &Self) -> ValidationResult {
        validate_all(&ValidationContext::update(self, old))
    }

    fn validate_delete(&self) -> ValidationResult {
        Ok(())
    }
}
