// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for eks-config-webhook.
//!
//! Uses proptest to generate random templates and verify the admission
//! invariants: defaulting is idempotent, updates are decided by template
//! equality alone, and deletes are never blocked.

use std::collections::BTreeMap;

use proptest::prelude::*;

use eks_config_webhook::crd::{
    EksConfigSpec, EksConfigTemplate, EksConfigTemplateSpec, File, NtpSpec, User,
};
use eks_config_webhook::webhooks::{Defaulter, Validator};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Strategy for optional short strings, including empty ones.
fn maybe_string() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[a-z0-9:]{0,8}")
}

fn any_file() -> impl Strategy<Value = File> {
    ("/?[a-z]{1,6}(/[a-z]{1,6})?", maybe_string(), maybe_string(), maybe_string()).prop_map(
        |(path, owner, permissions, content)| File {
            path,
            owner,
            permissions,
            content,
            ..Default::default()
        },
    )
}

fn any_user() -> impl Strategy<Value = User> {
    ("[a-z]{0,6}", proptest::option::of(any::<bool>())).prop_map(|(name, lock_password)| User {
        name,
        lock_password,
        ..Default::default()
    })
}

fn any_ntp() -> impl Strategy<Value = Option<NtpSpec>> {
    proptest::option::of(
        (
            proptest::option::of(any::<bool>()),
            prop::collection::vec("[0-9.]{0,15}", 0..3),
        )
            .prop_map(|(enabled, servers)| NtpSpec {
                enabled,
                servers,
                ..Default::default()
            }),
    )
}

/// Strategy for arbitrary, possibly malformed, bootstrap specs.
fn any_spec() -> impl Strategy<Value = EksConfigSpec> {
    (
        prop::collection::btree_map("[a-z-]{0,8}", "[a-z0-9=]{0,8}", 0..3),
        maybe_string(),
        prop::collection::vec(any_file(), 0..4),
        prop::collection::vec(any_user(), 0..3),
        any_ntp(),
        proptest::option::of(-5..10i32),
    )
        .prop_map(
            |(kubelet_extra_args, dns_cluster_ip, files, users, ntp, api_retry_attempts)| {
                EksConfigSpec {
                    kubelet_extra_args,
                    dns_cluster_ip,
                    files,
                    users,
                    ntp,
                    api_retry_attempts,
                    ..Default::default()
                }
            },
        )
}

fn template(spec: EksConfigSpec) -> EksConfigTemplate {
    let mut template_spec = EksConfigTemplateSpec::default();
    template_spec.template.spec = spec;
    EksConfigTemplate {
        metadata: ObjectMeta {
            name: Some("prop".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        spec: template_spec,
    }
}

proptest! {
    /// Defaulting twice is the same as defaulting once.
    #[test]
    fn defaulting_is_idempotent(spec in any_spec()) {
        let mut once = template(spec);
        once.set_defaults();
        let mut twice = once.clone();
        twice.set_defaults();
        prop_assert_eq!(once, twice);
    }

    /// Defaulting never overwrites a value that was already set.
    #[test]
    fn defaulting_preserves_set_fields(spec in any_spec()) {
        let mut defaulted = template(spec.clone());
        defaulted.set_defaults();
        let out = &defaulted.spec.template.spec;

        for (before, after) in spec.files.iter().zip(&out.files) {
            if before.owner.is_some() {
                prop_assert_eq!(&before.owner, &after.owner);
            }
            if before.permissions.is_some() {
                prop_assert_eq!(&before.permissions, &after.permissions);
            }
            prop_assert!(after.owner.is_some() && after.permissions.is_some());
        }
        for (before, after) in spec.users.iter().zip(&out.users) {
            if before.lock_password.is_some() {
                prop_assert_eq!(before.lock_password, after.lock_password);
            }
        }
        prop_assert_eq!(&spec.kubelet_extra_args, &out.kubelet_extra_args);
        prop_assert_eq!(&spec.dns_cluster_ip, &out.dns_cluster_ip);
    }

    /// An update with an unchanged template is allowed regardless of content
    /// or object metadata changes.
    #[test]
    fn unchanged_template_update_allowed(
        spec in any_spec(),
        labels in prop::collection::btree_map("[a-z]{1,6}", "[a-z]{0,6}", 0..3),
    ) {
        let old = template(spec);
        let mut new = old.clone();
        new.metadata.labels = Some(labels);
        prop_assert!(new.validate_update(&old).is_ok());
    }

    /// Any change to the template is denied on update.
    #[test]
    fn changed_template_update_denied(old_spec in any_spec(), new_spec in any_spec()) {
        prop_assume!(old_spec != new_spec);
        let old = template(old_spec);
        let new = template(new_spec);
        let err = new.validate_update(&old).unwrap_err();
        prop_assert_eq!(err.reason(), "FieldImmutable");
    }

    /// Deletes are allowed for every object.
    #[test]
    fn delete_always_allowed(spec in any_spec()) {
        prop_assert!(template(spec).validate_delete().is_ok());
    }

    /// Template metadata is part of the immutable template.
    #[test]
    fn template_label_change_denied(
        spec in any_spec(),
        key in "[a-z]{1,6}",
    ) {
        let old = template(spec);
        let mut new = old.clone();
        new.spec.template.metadata.labels = BTreeMap::from([(key, "changed".to_string())]);
        prop_assume!(new.spec.template != old.spec.template);
        prop_assert!(new.validate_update(&old).is_err());
    }

    /// Bootstrap fields without a typed model are still immutable.
    #[test]
    fn unmodeled_field_change_denied(
        spec in any_spec(),
        key in "[a-z]{1,8}",
        before in "[a-z0-9/]{1,12}",
        after in "[a-z0-9/]{1,12}",
    ) {
        prop_assume!(before != after);
        let mut old = template(spec);
        old.spec.template.spec.unmodeled.insert(key.clone(), serde_json::json!(before));
        let mut new = old.clone();
        new.spec.template.spec.unmodeled.insert(key, serde_json::json!(after));
        let err = new.validate_update(&old).unwrap_err();
        prop_assert_eq!(err.reason(), "FieldImmutable");
    }
}
