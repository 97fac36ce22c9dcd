//! EKSConfigTemplate Custom Resource Definition.
//!
//! An EKSConfigTemplate describes how worker nodes of an EKS cluster are
//! bootstrapped. MachineDeployments and MachinePools reference the template by
//! name and stamp out one EKSConfig per machine from `spec.template`, so the
//! template body is treated as immutable once created.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of the bootstrap provider.
pub const BOOTSTRAP_GROUP: &str = "bootstrap.cluster.x-k8s.io";

/// API version served by this webhook.
pub const BOOTSTRAP_VERSION: &str = "v1beta1";

/// EKSConfigTemplate is the Schema for the eksconfigtemplates API.
///
/// Example:
/// ```yaml
/// apiVersion: bootstrap.cluster.x-k8s.io/v1beta1
/// kind: EKSConfigTemplate
/// metadata:
///   name: workers
/// spec:
///   template:
///     metadata:
///       labels:
///         pool: general
///     spec:
///       kubeletExtraArgs:
///         node-labels: pool=general
///       files:
///         - path: /etc/motd
///           content: managed by cluster-api
/// ```
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "bootstrap.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "EKSConfigTemplate",
    plural = "eksconfigtemplates",
    shortname = "eksct",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EksConfigTemplateSpec {
    /// The bootstrap configuration stamped out for every machine that
    /// references this template.
    pub template: EksConfigTemplateResource,
}

/// Rust-cased name for the generated `EKSConfigTemplate` resource.
pub type EksConfigTemplate = EKSConfigTemplate;

/// Fields of the upstream API that this crate does not model. They are kept
/// so that they survive re-serialization and take part in template equality.
pub type UnmodeledFields = BTreeMap<String, serde_json::Value>;

/// Template body: metadata applied to generated EKSConfigs plus their spec.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EksConfigTemplateResource {
    /// Labels and annotations copied onto each generated EKSConfig.
    #[serde(default, skip_serializing_if = "TemplateMetadata::is_empty")]
    pub metadata: TemplateMetadata,

    /// Bootstrap configuration for the node.
    #[serde(default)]
    pub spec: EksConfigSpec,

    #[serde(flatten)]
    #[schemars(skip)]
    pub unmodeled: UnmodeledFields,
}

/// The subset of object metadata that a template may carry.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(flatten)]
    #[schemars(skip)]
    pub unmodeled: UnmodeledFields,
}

impl TemplateMetadata {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.annotations.is_empty() && self.unmodeled.is_empty()
    }
}

/// EKSConfigSpec defines the bootstrap configuration of an EKS worker node.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EksConfigSpec {
    /// Extra arguments passed to the kubelet by the bootstrap script.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub kubelet_extra_args: BTreeMap<String, String>,

    /// Container runtime to use (e.g. containerd).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_runtime: Option<String>,

    /// Overrides the IP address used for cluster DNS.
    #[serde(rename = "dnsClusterIP", skip_serializing_if = "Option::is_none")]
    pub dns_cluster_ip: Option<String>,

    /// Docker daemon configuration written as a JSON document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_config_json: Option<String>,

    /// Number of retry attempts for AWS API calls made during bootstrap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_retry_attempts: Option<i32>,

    /// Pause container image to use instead of the regional default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_container: Option<PauseContainer>,

    /// Set max pods based on the instance type's ENI limits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_max_pods: Option<bool>,

    /// IPv6 CIDR block for Kubernetes services.
    #[serde(rename = "serviceIPV6Cidr", skip_serializing_if = "Option::is_none")]
    pub service_ipv6_cidr: Option<String>,

    /// Commands to run before the bootstrap script.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_bootstrap_commands: Vec<String>,

    /// Commands to run after the bootstrap script.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_bootstrap_commands: Vec<String>,

    /// Extra files written to disk on first boot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,

    /// NTP configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ntp: Option<NtpSpec>,

    /// Users to add to the node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<User>,

    #[serde(flatten)]
    #[schemars(skip)]
    pub unmodeled: UnmodeledFields,
}

/// Pause container image override.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PauseContainer {
    /// AWS account number of the ECR registry hosting the image.
    pub account_number: String,

    /// Image tag.
    pub version: String,

    #[serde(flatten)]
    #[schemars(skip)]
    pub unmodeled: UnmodeledFields,
}

/// A file written to disk on first boot.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// Absolute path of the file on the node.
    pub path: String,

    /// Ownership in `user:group` form (default: root:root).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Octal file mode (default: 0644).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,

    /// Encoding of `content`. Plain text when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Encoding>,

    /// Append to an existing file instead of overwriting it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append: Option<bool>,

    /// Inline file content. Mutually exclusive with `contentFrom`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Content sourced from a Secret. Mutually exclusive with `content`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_from: Option<FileSource>,

    #[serde(flatten)]
    #[schemars(skip)]
    pub unmodeled: UnmodeledFields,
}

/// Supported encodings for file content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum Encoding {
    #[serde(rename = "base64")]
    Base64,
    #[serde(rename = "gzip")]
    Gzip,
    #[serde(rename = "gzip+base64")]
    GzipBase64,
}

/// Source for file content.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileSource {
    pub secret: SecretFileSource,

    #[serde(flatten)]
    #[schemars(skip)]
    pub unmodeled: UnmodeledFields,
}

/// Reference to a key in a Secret in the template's namespace.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretFileSource {
    /// Name of the Secret.
    pub name: String,

    /// Key within the Secret holding the file content.
    pub key: String,

    #[serde(flatten)]
    #[schemars(skip)]
    pub unmodeled: UnmodeledFields,
}

/// NTP configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NtpSpec {
    /// Whether NTP should be enabled. Defaults to true when servers are set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// NTP servers to use.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<String>,

    #[serde(flatten)]
    #[schemars(skip)]
    pub unmodeled: UnmodeledFields,
}

/// A user account created on the node.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gecos: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactive: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub passwd: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_group: Option<String>,

    /// Lock the password so the account only accepts key-based login
    /// (default: true).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_password: Option<bool>,

    /// Sudo rule for the user, e.g. `ALL=(ALL) NOPASSWD:ALL`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sudo: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_authorized_keys: Vec<String>,

    #[serde(flatten)]
    #[schemars(skip)]
    pub unmodeled: UnmodeledFields,
}
