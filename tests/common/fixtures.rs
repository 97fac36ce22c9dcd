//! Test fixtures and builder patterns for EKSConfigTemplate.

use std::collections::BTreeMap;

use eks_config_webhook::crd::{
    EksConfigSpec, EksConfigTemplate, EksConfigTemplateSpec, File, NtpSpec, User,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{Value, json};

/// Builder for creating EKSConfigTemplate test fixtures.
///
/// # Example
/// ```
/// let template = EksConfigTemplateBuilder::new("workers")
///     .namespace("capa-system")
///     .file("/etc/motd", "hello")
///     .user("ops")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct EksConfigTemplateBuilder {
    name: String,
    namespace: String,
    labels: BTreeMap<String, String>,
    spec: EksConfigSpec,
}

impl EksConfigTemplateBuilder {
    /// Create a new builder with the given template name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: "default".to_string(),
            labels: BTreeMap::new(),
            spec: EksConfigSpec::default(),
        }
    }

    /// Set the namespace for the template.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Add a label to the object metadata.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add an inline file with no owner or permissions.
    pub fn file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.spec.files.push(File {
            path: path.into(),
            content: Some(content.into()),
            ..Default::default()
        });
        self
    }

    /// Add a user with only a name.
    pub fn user(mut self, name: impl Into<String>) -> Self {
        self.spec.users.push(User {
            name: name.into(),
            ..Default::default()
        });
        self
    }

    /// Configure NTP servers, leaving `enabled` unset.
    pub fn ntp_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.ntp = Some(NtpSpec {
            enabled: None,
            servers: servers.into_iter().map(Into::into).collect(),
            ..Default::default()
        });
        self
    }

    /// Add a kubelet argument.
    pub fn kubelet_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.kubelet_extra_args.insert(key.into(), value.into());
        self
    }

    /// Set a bootstrap field this crate does not model, e.g. `diskSetup`.
    pub fn unmodeled(mut self, key: impl Into<String>, value: Value) -> Self {
        self.spec.unmodeled.insert(key.into(), value);
        self
    }

    /// Set the cluster DNS address.
    pub fn dns_cluster_ip(mut self, ip: impl Into<String>) -> Self {
        self.spec.dns_cluster_ip = Some(ip.into());
        self
    }

    /// Build the EKSConfigTemplate.
    pub fn build(self) -> EksConfigTemplate {
        let mut spec = EksConfigTemplateSpec::default();
        spec.template.spec = self.spec;
        EksConfigTemplate {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(self.namespace),
                labels: if self.labels.is_empty() {
                    None
                } else {
                    Some(self.labels)
                },
                ..Default::default()
            },
            spec,
        }
    }
}

impl Default for EksConfigTemplateBuilder {
    fn default() -> Self {
        Self::new("test-template")
    }
}

/// A template exercising every defaulted field.
pub fn unset_defaults_template(name: &str) -> EksConfigTemplate {
    EksConfigTemplateBuilder::new(name)
        .file("/etc/motd", "hello")
        .user("ops")
        .ntp_servers(["169.254.169.123"])
        .build()
}

/// Wrap objects in a v1 AdmissionReview for the EKSConfigTemplate resource.
pub fn admission_review(operation: &str, object: Option<Value>, old_object: Option<Value>) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "b2a7d6a5-1f0e-4c77-9a51-6c9b4c1f0a42",
            "kind": {"group": "bootstrap.cluster.x-k8s.io", "version": "v1beta1", "kind": "EKSConfigTemplate"},
            "resource": {"group": "bootstrap.cluster.x-k8s.io", "version": "v1beta1", "resource": "eksconfigtemplates"},
            "name": "test-template",
            "namespace": "default",
            "operation": operation,
            "userInfo": {"username": "kubernetes-admin"},
            "object": object,
            "oldObject": old_object,
            "dryRun": false
        }
    })
}
