//! Structural validation of the bootstrap payload.
//!
//! Tier 1 (Create): enforced when a template is created
//!
//! Validates:
//! - Template metadata label and annotation keys are qualified names
//! - Network settings parse (`dnsClusterIP`, `serviceIPV6Cidr`)
//! - Files have an absolute, unique path and exactly one content source
//! - Users, NTP servers, bootstrap commands and the pause container are complete

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::LazyLock;

use super::{FieldErrors, ValidationContext};
use crate::crd::{EksConfigSpec, File, TemplateMetadata};
use crate::webhooks::admission::ValidationResult;

const TEMPLATE_PATH: &str = "spec.template";
const SPEC_PATH: &str = "spec.template.spec";

/// Maximum length of the name part of a qualified name and of label values
const MAX_NAME_PART_LENGTH: usize = 63;
/// Maximum length of a DNS subdomain prefix
const MAX_PREFIX_LENGTH: usize = 253;

static NAME_PART_RE: LazyLock<Option<regex::Regex>> = LazyLock::new(|| {
    regex::Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$").ok()
});

static DNS_SUBDOMAIN_RE: LazyLock<Option<regex::Regex>> = LazyLock::new(|| {
    regex::Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").ok()
});

static PERMISSIONS_RE: LazyLock<Option<regex::Regex>> =
    LazyLock::new(|| regex::Regex::new(r"^[0-7]{3,4}$").ok());

/// Validate the structure of the template payload
pub fn validate(ctx: &ValidationContext<'_>) -> ValidationResult {
    let mut errs = FieldErrors::new();
    let template = &ctx.resource.spec.template;

    validate_metadata(&template.metadata, &mut errs);
    validate_spec(&template.spec, &mut errs);

    errs.into_result(ctx.resource)
}

fn validate_metadata(metadata: &TemplateMetadata, errs: &mut FieldErrors) {
    let path = format!("{TEMPLATE_PATH}.metadata.labels");
    for (key, value) in &metadata.labels {
        if let Some(detail) = qualified_name_error(key) {
            errs.invalid(&path, key, detail);
        }
        if !is_valid_label_value(value) {
            errs.invalid(
                format!("{path}[{key}]"),
                value,
                format!(
                    "a valid label value must be {MAX_NAME_PART_LENGTH} characters or less, \
                     begin and end with an alphanumeric character, and contain only \
                     alphanumerics, '-', '_' or '.'"
                ),
            );
        }
    }

    let path = format!("{TEMPLATE_PATH}.metadata.annotations");
    for key in metadata.annotations.keys() {
        if let Some(detail) = qualified_name_error(key) {
            errs.invalid(&path, key, detail);
        }
    }
}

fn validate_spec(spec: &EksConfigSpec, errs: &mut FieldErrors) {
    for key in spec.kubelet_extra_args.keys() {
        if key.trim().is_empty() {
            errs.invalid(
                format!("{SPEC_PATH}.kubeletExtraArgs"),
                key,
                "argument name must not be empty",
            );
        }
    }

    if let Some(runtime) = &spec.container_runtime
        && runtime.trim().is_empty()
    {
        errs.invalid(
            format!("{SPEC_PATH}.containerRuntime"),
            runtime,
            "must not be empty when set",
        );
    }

    if let Some(ip) = &spec.dns_cluster_ip
        && ip.parse::<IpAddr>().is_err()
    {
        errs.invalid(
            format!("{SPEC_PATH}.dnsClusterIP"),
            ip,
            "must be a valid IP address",
        );
    }

    if let Some(config) = &spec.docker_config_json
        && !is_json_object(config)
    {
        errs.invalid(
            format!("{SPEC_PATH}.dockerConfigJson"),
            config,
            "must be a JSON object",
        );
    }

    if let Some(attempts) = spec.api_retry_attempts
        && attempts < 0
    {
        errs.invalid(
            format!("{SPEC_PATH}.apiRetryAttempts"),
            &attempts.to_string(),
            "must be greater than or equal to 0",
        );
    }

    if let Some(pause) = &spec.pause_container {
        if pause.account_number.trim().is_empty() {
            errs.required(format!("{SPEC_PATH}.pauseContainer.accountNumber"));
        }
        if pause.version.trim().is_empty() {
            errs.required(format!("{SPEC_PATH}.pauseContainer.version"));
        }
    }

    if let Some(cidr) = &spec.service_ipv6_cidr
        && !is_ipv6_cidr(cidr)
    {
        errs.invalid(
            format!("{SPEC_PATH}.serviceIPV6Cidr"),
            cidr,
            "must be an IPv6 CIDR such as fd00::/108",
        );
    }

    validate_commands("preBootstrapCommands", &spec.pre_bootstrap_commands, errs);
    validate_commands("postBootstrapCommands", &spec.post_bootstrap_commands, errs);
    validate_files(&spec.files, errs);

    if let Some(ntp) = &spec.ntp {
        for (i, server) in ntp.servers.iter().enumerate() {
            if server.trim().is_empty() {
                errs.required(format!("{SPEC_PATH}.ntp.servers[{i}]"));
            }
        }
    }

    let mut user_names = BTreeSet::new();
    for (i, user) in spec.users.iter().enumerate() {
        let path = format!("{SPEC_PATH}.users[{i}].name");
        if user.name.trim().is_empty() {
            errs.required(path);
        } else if !user_names.insert(user.name.as_str()) {
            errs.duplicate(path, &user.name);
        }
    }
}

fn validate_commands(field: &str, commands: &[String], errs: &mut FieldErrors) {
    for (i, command) in commands.iter().enumerate() {
        if command.trim().is_empty() {
            errs.required(format!("{SPEC_PATH}.{field}[{i}]"));
        }
    }
}

fn validate_files(files: &[File], errs: &mut FieldErrors) {
    let mut paths = BTreeSet::new();

    for (i, file) in files.iter().enumerate() {
        let base = format!("{SPEC_PATH}.files[{i}]");

        if file.path.is_empty() {
            errs.required(format!("{base}.path"));
        } else if !file.path.starts_with('/') {
            errs.invalid(format!("{base}.path"), &file.path, "must be an absolute path");
        } else if !paths.insert(file.path.as_str()) {
            errs.duplicate(format!("{base}.path"), &file.path);
        }

        match (&file.content, &file.content_from) {
            (Some(_), Some(_)) => errs.forbidden(
                base.clone(),
                "only one of content or contentFrom may be set",
            ),
            (None, None) => errs.required(format!("{base}.content")),
            (None, Some(source)) => {
                if source.secret.name.trim().is_empty() {
                    errs.required(format!("{base}.contentFrom.secret.name"));
                }
                if source.secret.key.trim().is_empty() {
                    errs.required(format!("{base}.contentFrom.secret.key"));
                }
            }
            (Some(_), None) => {}
        }

        if let Some(permissions) = &file.permissions
            && !is_valid_permissions(permissions)
        {
            errs.invalid(
                format!("{base}.permissions"),
                permissions,
                "must be an octal file mode such as 0644",
            );
        }
    }
}

/// Returns why `key` is not a qualified name (`[prefix/]name`), or `None` if it is.
fn qualified_name_error(key: &str) -> Option<String> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix
        && (prefix.is_empty()
            || prefix.len() > MAX_PREFIX_LENGTH
            || !DNS_SUBDOMAIN_RE.as_ref().is_some_and(|re| re.is_match(prefix)))
    {
        return Some(format!(
            "prefix part must be a lowercase DNS subdomain of at most {MAX_PREFIX_LENGTH} characters"
        ));
    }

    if name.is_empty() || name.len() > MAX_NAME_PART_LENGTH {
        return Some(format!(
            "name part must be non-empty and at most {MAX_NAME_PART_LENGTH} characters"
        ));
    }

    if !NAME_PART_RE.as_ref().is_some_and(|re| re.is_match(name)) {
        return Some(
            "name part must consist of alphanumeric characters, '-', '_' or '.', \
             and must start and end with an alphanumeric character"
                .to_string(),
        );
    }

    None
}

fn is_valid_label_value(value: &str) -> bool {
    value.is_empty()
        || (value.len() <= MAX_NAME_PART_LENGTH
            && NAME_PART_RE.as_ref().is_some_and(|re| re.is_match(value)))
}

fn is_valid_permissions(permissions: &str) -> bool {
    PERMISSIONS_RE
        .as_ref()
        .is_some_and(|re| re.is_match(permissions))
}

fn is_json_object(value: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(value),
        Ok(serde_json::Value::Object(_))
    )
}

fn is_ipv6_cidr(cidr: &str) -> bool {
    let Some((addr, prefix)) = cidr.split_once('/') else {
        return false;
    };
    addr.parse::<Ipv6Addr>().is_ok() && prefix.parse::<u8>().is_ok_and(|p| p <= 128)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::get_unwrap
)]
mod tests {
    use super::*;
    use crate::crd::{
        EksConfigTemplate, EksConfigTemplateSpec, FileSource, NtpSpec, PauseContainer,
        SecretFileSource, User,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn create_resource(spec: EksConfigSpec) -> EksConfigTemplate {
        let mut template_spec = EksConfigTemplateSpec::default();
        template_spec.template.spec = spec;
        EksConfigTemplate {
            metadata: ObjectMeta {
                name: Some("workers".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: template_spec,
        }
    }

    fn inline_file(path: &str) -> File {
        File {
            path: path.to_string(),
            content: Some("data".to_string()),
            ..Default::default()
        }
    }

    fn check(spec: EksConfigSpec) -> ValidationResult {
        let resource = create_resource(spec);
        validate(&ValidationContext::create(&resource))
    }

    fn denial_message(spec: EksConfigSpec) -> String {
        check(spec).unwrap_err().message()
    }

    #[test]
    fn test_empty_spec_is_valid() {
        assert!(check(EksConfigSpec::default()).is_ok());
    }

    #[test]
    fn test_fully_populated_spec_is_valid() {
        let spec = EksConfigSpec {
            kubelet_extra_args: [("max-pods".to_string(), "58".to_string())].into(),
            container_runtime: Some("containerd".to_string()),
            dns_cluster_ip: Some("10.100.0.10".to_string()),
            docker_config_json: Some(r#"{"log-driver":"json-file"}"#.to_string()),
            api_retry_attempts: Some(3),
            pause_container: Some(PauseContainer {
                account_number: "602401143452".to_string(),
                version: "3.9".to_string(),
                ..Default::default()
            }),
            use_max_pods: Some(false),
            service_ipv6_cidr: Some("fd00::/108".to_string()),
            pre_bootstrap_commands: vec!["echo pre".to_string()],
            post_bootstrap_commands: vec!["echo post".to_string()],
            files: vec![
                inline_file("/etc/motd"),
                File {
                    path: "/etc/secret".to_string(),
                    permissions: Some("0600".to_string()),
                    content_from: Some(FileSource {
                        secret: SecretFileSource {
                            name: "node-secret".to_string(),
                            key: "value".to_string(),
                            ..Default::default()
                        },
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ],
            ntp: Some(NtpSpec {
                enabled: Some(true),
                servers: vec!["169.254.169.123".to_string()],
                ..Default::default()
            }),
            users: vec![User {
                name: "ops".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(check(spec).is_ok());
    }

    #[test]
    fn test_invalid_dns_cluster_ip() {
        let spec = EksConfigSpec {
            dns_cluster_ip: Some("10.100.0".to_string()),
            ..Default::default()
        };
        let message = denial_message(spec);
        assert!(message.contains("spec.template.spec.dnsClusterIP"));
        assert!(message.contains("must be a valid IP address"));
    }

    #[test]
    fn test_ipv6_dns_cluster_ip_allowed() {
        let spec = EksConfigSpec {
            dns_cluster_ip: Some("fd00::a".to_string()),
            ..Default::default()
        };
        assert!(check(spec).is_ok());
    }

    #[test]
    fn test_invalid_service_ipv6_cidr() {
        for cidr in ["10.0.0.0/16", "fd00::", "fd00::/129", "fd00::/x"] {
            let spec = EksConfigSpec {
                service_ipv6_cidr: Some(cidr.to_string()),
                ..Default::default()
            };
            assert!(
                denial_message(spec).contains("serviceIPV6Cidr"),
                "expected {cidr} to be rejected"
            );
        }
    }

    #[test]
    fn test_docker_config_must_be_object() {
        let spec = EksConfigSpec {
            docker_config_json: Some("[1, 2]".to_string()),
            ..Default::default()
        };
        assert!(denial_message(spec).contains("dockerConfigJson"));
    }

    #[test]
    fn test_negative_retry_attempts() {
        let spec = EksConfigSpec {
            api_retry_attempts: Some(-1),
            ..Default::default()
        };
        assert!(denial_message(spec).contains("apiRetryAttempts"));
    }

    #[test]
    fn test_pause_container_requires_fields() {
        let spec = EksConfigSpec {
            pause_container: Some(PauseContainer::default()),
            ..Default::default()
        };
        let message = denial_message(spec);
        assert!(message.contains("pauseContainer.accountNumber: Required value"));
        assert!(message.contains("pauseContainer.version: Required value"));
    }

    #[test]
    fn test_file_path_required() {
        let spec = EksConfigSpec {
            files: vec![inline_file("")],
            ..Default::default()
        };
        assert!(denial_message(spec).contains("files[0].path: Required value"));
    }

    #[test]
    fn test_file_path_must_be_absolute() {
        let spec = EksConfigSpec {
            files: vec![inline_file("etc/motd")],
            ..Default::default()
        };
        assert!(denial_message(spec).contains("must be an absolute path"));
    }

    #[test]
    fn test_duplicate_file_paths() {
        let spec = EksConfigSpec {
            files: vec![inline_file("/etc/motd"), inline_file("/etc/motd")],
            ..Default::default()
        };
        assert!(denial_message(spec).contains("files[1].path: Duplicate value: \"/etc/motd\""));
    }

    #[test]
    fn test_file_requires_one_content_source() {
        let missing = EksConfigSpec {
            files: vec![File {
                path: "/etc/a".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(denial_message(missing).contains("files[0].content: Required value"));

        let both = EksConfigSpec {
            files: vec![File {
                path: "/etc/a".to_string(),
                content: Some("x".to_string()),
                content_from: Some(FileSource {
                    secret: SecretFileSource {
                        name: "s".to_string(),
                        key: "k".to_string(),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(denial_message(both).contains("Forbidden"));
    }

    #[test]
    fn test_secret_source_requires_name_and_key() {
        let spec = EksConfigSpec {
            files: vec![File {
                path: "/etc/a".to_string(),
                content_from: Some(FileSource::default()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let message = denial_message(spec);
        assert!(message.contains("contentFrom.secret.name: Required value"));
        assert!(message.contains("contentFrom.secret.key: Required value"));
    }

    #[test]
    fn test_invalid_permissions() {
        for permissions in ["644x", "999", "12", "07777"] {
            let mut file = inline_file("/etc/a");
            file.permissions = Some(permissions.to_string());
            let spec = EksConfigSpec {
                files: vec![file],
                ..Default::default()
            };
            assert!(
                denial_message(spec).contains("permissions"),
                "expected {permissions} to be rejected"
            );
        }
    }

    #[test]
    fn test_duplicate_and_missing_user_names() {
        let spec = EksConfigSpec {
            users: vec![
                User {
                    name: "ops".to_string(),
                    ..Default::default()
                },
                User {
                    name: "ops".to_string(),
                    ..Default::default()
                },
                User::default(),
            ],
            ..Default::default()
        };
        let message = denial_message(spec);
        assert!(message.contains("users[1].name: Duplicate value"));
        assert!(message.contains("users[2].name: Required value"));
    }

    #[test]
    fn test_empty_commands_and_ntp_servers() {
        let spec = EksConfigSpec {
            pre_bootstrap_commands: vec![" ".to_string()],
            post_bootstrap_commands: vec!["ok".to_string(), String::new()],
            ntp: Some(NtpSpec {
                enabled: None,
                servers: vec![String::new()],
                ..Default::default()
            }),
            ..Default::default()
        };
        let message = denial_message(spec);
        assert!(message.contains("preBootstrapCommands[0]"));
        assert!(message.contains("postBootstrapCommands[1]"));
        assert!(message.contains("ntp.servers[0]"));
    }

    #[test]
    fn test_all_errors_reported_together() {
        let spec = EksConfigSpec {
            dns_cluster_ip: Some("nope".to_string()),
            api_retry_attempts: Some(-5),
            files: vec![inline_file("relative")],
            ..Default::default()
        };
        let message = denial_message(spec);
        assert!(message.contains("is invalid: ["));
        assert!(message.contains("dnsClusterIP"));
        assert!(message.contains("apiRetryAttempts"));
        assert!(message.contains("files[0].path"));
    }

    #[test]
    fn test_template_label_keys() {
        let mut resource = create_resource(EksConfigSpec::default());
        let labels = &mut resource.spec.template.metadata.labels;
        labels.insert("pool".to_string(), "general".to_string());
        labels.insert("node.cluster.x-k8s.io/role".to_string(), "worker".to_string());
        assert!(validate(&ValidationContext::create(&resource)).is_ok());

        resource
            .spec
            .template
            .metadata
            .labels
            .insert("Bad Prefix/name".to_string(), "v".to_string());
        let message = validate(&ValidationContext::create(&resource))
            .unwrap_err()
            .message();
        assert!(message.contains("spec.template.metadata.labels"));
        assert!(message.contains("prefix part"));
    }

    #[test]
    fn test_template_label_value() {
        let mut resource = create_resource(EksConfigSpec::default());
        resource
            .spec
            .template
            .metadata
            .labels
            .insert("pool".to_string(), "-general".to_string());
        let message = validate(&ValidationContext::create(&resource))
            .unwrap_err()
            .message();
        assert!(message.contains("spec.template.metadata.labels[pool]"));
    }

    #[test]
    fn test_template_annotation_keys() {
        let mut resource = create_resource(EksConfigSpec::default());
        let annotations = &mut resource.spec.template.metadata.annotations;
        annotations.insert("example.com/owner".to_string(), "any value at all".to_string());
        assert!(validate(&ValidationContext::create(&resource)).is_ok());

        let annotations = &mut resource.spec.template.metadata.annotations;
        annotations.insert("bad key".to_string(), String::new());
        annotations.insert("-leading".to_string(), String::new());
        let message = validate(&ValidationContext::create(&resource))
            .unwrap_err()
            .message();
        assert_eq!(message.matches("spec.template.metadata.annotations").count(), 2);
    }

    #[test]
    fn test_qualified_name_rules() {
        assert!(qualified_name_error("app").is_none());
        assert!(qualified_name_error("example.com/app.v1").is_none());
        assert!(qualified_name_error("").is_some());
        assert!(qualified_name_error("/app").is_some());
        assert!(qualified_name_error("example.com/").is_some());
        assert!(qualified_name_error("-app").is_some());
        assert!(qualified_name_error(&"a".repeat(64)).is_some());
    }
}
