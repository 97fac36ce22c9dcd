//! Webhook paths and registration objects for admission-controlled resources.
//!
//! Paths follow the controller-runtime convention so that existing
//! MutatingWebhookConfiguration / ValidatingWebhookConfiguration objects keep
//! working: `/mutate-<group with dots as dashes>-<version>-<lowercase kind>`.

use k8s_openapi::ByteString;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    ValidatingWebhook, ValidatingWebhookConfiguration, WebhookClientConfig,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;

/// Default time the API server waits for a decision
pub const DEFAULT_TIMEOUT_SECONDS: i32 = 10;

/// Admission review versions the server understands
const ADMISSION_REVIEW_VERSIONS: [&str; 2] = ["v1", "v1beta1"];

/// HTTP paths serving one resource type's admission webhooks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookPaths {
    pub mutate: String,
    pub validate: String,
}

/// Derive the mutate and validate paths for `K`.
pub fn webhook_paths<K: Resource<DynamicType = ()>>() -> WebhookPaths {
    let suffix = format!(
        "{}-{}-{}",
        K::group(&()).replace('.', "-"),
        K::version(&()),
        K::kind(&()).to_lowercase()
    );
    WebhookPaths {
        mutate: format!("/mutate-{suffix}"),
        validate: format!("/validate-{suffix}"),
    }
}

/// The in-cluster Service fronting the webhook server
#[derive(Clone, Debug)]
pub struct ServiceTarget {
    pub name: String,
    pub namespace: String,
    pub port: i32,
    /// PEM bundle used by the API server to verify the serving certificate.
    /// Left unset when a CA injector (e.g. cert-manager) fills it in.
    pub ca_bundle: Option<Vec<u8>>,
    pub timeout_seconds: i32,
}

impl ServiceTarget {
    fn client_config(&self, path: &str) -> WebhookClientConfig {
        WebhookClientConfig {
            ca_bundle: self.ca_bundle.clone().map(ByteString),
            service: Some(ServiceReference {
                name: self.name.clone(),
                namespace: self.namespace.clone(),
                path: Some(path.to_string()),
                port: Some(self.port),
            }),
            url: None,
        }
    }
}

fn rule<K: Resource<DynamicType = ()>>(operations: &[&str]) -> RuleWithOperations {
    RuleWithOperations {
        operations: Some(operations.iter().map(ToString::to_string).collect()),
        api_groups: Some(vec![K::group(&()).to_string()]),
        api_versions: Some(vec![K::version(&()).to_string()]),
        resources: Some(vec![K::plural(&()).to_string()]),
        scope: Some("Namespaced".to_string()),
    }
}

fn review_versions() -> Vec<String> {
    ADMISSION_REVIEW_VERSIONS
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// `default.eksconfigtemplates.bootstrap.cluster.x-k8s.io`
fn webhook_name<K: Resource<DynamicType = ()>>(prefix: &str) -> String {
    format!("{}.{}.{}", prefix, K::plural(&()), K::group(&()))
}

/// Build the MutatingWebhookConfiguration registering `K`'s defaulting path.
pub fn mutating_webhook_configuration<K: Resource<DynamicType = ()>>(
    target: &ServiceTarget,
) -> MutatingWebhookConfiguration {
    let paths = webhook_paths::<K>();
    MutatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(format!("{}-defaulting", K::plural(&()))),
            ..Default::default()
        },
        webhooks: Some(vec![MutatingWebhook {
            name: webhook_name::<K>("default"),
            admission_review_versions: review_versions(),
            client_config: target.client_config(&paths.mutate),
            failure_policy: Some("Fail".to_string()),
            match_policy: Some("Equivalent".to_string()),
            side_effects: "None".to_string(),
            rules: Some(vec![rule::<K>(&["CREATE"])]),
            timeout_seconds: Some(target.timeout_seconds),
            ..Default::default()
        }]),
    }
}

/// Build the ValidatingWebhookConfiguration registering `K`'s validation path.
pub fn validating_webhook_configuration<K: Resource<DynamicType = ()>>(
    target: &ServiceTarget,
) -> ValidatingWebhookConfiguration {
    let paths = webhook_paths::<K>();
    ValidatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(format!("{}-validation", K::plural(&()))),
            ..Default::default()
        },
        webhooks: Some(vec![ValidatingWebhook {
            name: webhook_name::<K>("validation"),
            admission_review_versions: review_versions(),
            client_config: target.client_config(&paths.validate),
            failure_policy: Some("Fail".to_string()),
            match_policy: Some("Equivalent".to_string()),
            side_effects: "None".to_string(),
            rules: Some(vec![rule::<K>(&["CREATE", "UPDATE", "DELETE"])]),
            timeout_seconds: Some(target.timeout_seconds),
            ..Default::default()
        }]),
    }
}
