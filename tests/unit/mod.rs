// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Unit tests for eks-config-webhook.
//!
//! These tests run without a Kubernetes cluster and exercise the admission
//! hooks through the library's public API.

#[path = "../common/mod.rs"]
#[allow(dead_code)]
mod common;

mod crd_tests {
    use eks_config_webhook::crd::{BOOTSTRAP_GROUP, BOOTSTRAP_VERSION, EksConfigTemplate};
    use kube::{CustomResourceExt, Resource};

    #[test]
    fn test_resource_identity() {
        assert_eq!(EksConfigTemplate::group(&()), BOOTSTRAP_GROUP);
        assert_eq!(EksConfigTemplate::version(&()), BOOTSTRAP_VERSION);
        assert_eq!(EksConfigTemplate::kind(&()), "EKSConfigTemplate");
        assert_eq!(EksConfigTemplate::plural(&()), "eksconfigtemplates");
    }

    #[test]
    fn test_crd_schema_names_wire_fields() {
        let crd = serde_json::to_string(&EksConfigTemplate::crd()).unwrap();
        assert!(crd.contains("kubeletExtraArgs"));
        assert!(crd.contains("dnsClusterIP"));
        assert!(crd.contains("serviceIPV6Cidr"));
        assert!(crd.contains("contentFrom"));
    }
}

mod defaulting_tests {
    use super::common::fixtures::{EksConfigTemplateBuilder, unset_defaults_template};
    use eks_config_webhook::webhooks::{DEFAULT_FILE_OWNER, DEFAULT_FILE_PERMISSIONS, Defaulter};

    #[test]
    fn test_defaults_applied() {
        let mut template = unset_defaults_template("workers");
        template.set_defaults();

        let spec = &template.spec.template.spec;
        assert_eq!(spec.files[0].owner.as_deref(), Some(DEFAULT_FILE_OWNER));
        assert_eq!(
            spec.files[0].permissions.as_deref(),
            Some(DEFAULT_FILE_PERMISSIONS)
        );
        assert_eq!(spec.ntp.as_ref().unwrap().enabled, Some(true));
        assert_eq!(spec.users[0].lock_password, Some(true));
    }

    #[test]
    fn test_defaults_leave_untouched_fields() {
        let mut template = EksConfigTemplateBuilder::new("workers")
            .kubelet_arg("node-labels", "pool=general")
            .build();
        let before = template.clone();
        template.set_defaults();
        assert_eq!(template, before);
    }

    #[test]
    fn test_defaults_every_file() {
        let mut template = EksConfigTemplateBuilder::new("workers")
            .file("/etc/a", "a")
            .file("/etc/b", "b")
            .build();
        template.set_defaults();
        for file in &template.spec.template.spec.files {
            assert_eq!(file.owner.as_deref(), Some(DEFAULT_FILE_OWNER));
        }
    }
}

mod validation_tests {
    use super::common::fixtures::{EksConfigTemplateBuilder, unset_defaults_template};
    use eks_config_webhook::webhooks::policies::REASON_INVALID;
    use eks_config_webhook::webhooks::policies::immutability::REASON_FIELD_IMMUTABLE;
    use eks_config_webhook::webhooks::{Defaulter, Validator};

    #[test]
    fn test_create_valid() {
        let template = unset_defaults_template("workers");
        assert!(template.validate_create().is_ok());
    }

    #[test]
    fn test_create_rejects_each_malformed_field() {
        let cases = [
            (
                EksConfigTemplateBuilder::new("t").dns_cluster_ip("10.100.0").build(),
                "dnsClusterIP",
            ),
            (
                EksConfigTemplateBuilder::new("t").file("etc/motd", "x").build(),
                "files[0].path",
            ),
            (
                EksConfigTemplateBuilder::new("t").user("ops").user("ops").build(),
                "users[1].name",
            ),
            (
                EksConfigTemplateBuilder::new("t").ntp_servers([""]).build(),
                "ntp.servers[0]",
            ),
        ];

        for (template, field) in cases {
            let err = template.validate_create().unwrap_err();
            assert_eq!(err.reason(), REASON_INVALID, "field {field}");
            assert!(
                err.message().contains(field),
                "expected {field} in {}",
                err.message()
            );
        }
    }

    #[test]
    fn test_create_reports_all_errors() {
        let template = EksConfigTemplateBuilder::new("t")
            .dns_cluster_ip("bogus")
            .file("relative", "x")
            .build();
        let message = template.validate_create().unwrap_err().message();
        assert!(message.contains("dnsClusterIP"));
        assert!(message.contains("files[0].path"));
    }

    #[test]
    fn test_update_lifecycle() {
        let mut t1 = unset_defaults_template("t1");
        t1.set_defaults();
        assert!(t1.validate_create().is_ok());

        let mut relabelled = t1.clone();
        relabelled
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert("team".to_string(), "infra".to_string());
        assert!(relabelled.validate_update(&t1).is_ok());

        let mut changed = t1.clone();
        changed.spec.template.spec.files[0].content = Some("changed".to_string());
        let err = changed.validate_update(&t1).unwrap_err();
        assert_eq!(err.reason(), REASON_FIELD_IMMUTABLE);
        assert!(err.message().contains("spec.template"));

        assert!(t1.validate_delete().is_ok());
    }

    #[test]
    fn test_update_with_identical_malformed_template_allowed() {
        // Pre-existing objects that no longer pass structural checks can
        // still be relabelled.
        let old = EksConfigTemplateBuilder::new("t").dns_cluster_ip("bogus").build();
        let mut new = old.clone();
        new.metadata.annotations = Some([("note".to_string(), "x".to_string())].into());
        assert!(new.validate_update(&old).is_ok());
    }
}

mod registration_tests {
    use eks_config_webhook::crd::EksConfigTemplate;
    use eks_config_webhook::webhooks::webhook_paths;

    #[test]
    fn test_paths_follow_controller_runtime_convention() {
        let paths = webhook_paths::<EksConfigTemplate>();
        assert!(paths.mutate.starts_with("/mutate-bootstrap-cluster-x-k8s-io-"));
        assert!(paths.validate.ends_with("-v1beta1-eksconfigtemplate"));
    }
}
