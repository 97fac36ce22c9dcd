//! Custom Resource Definitions (CRDs) for eks-config-webhook.
//!
//! - `EksConfigTemplate`: bootstrap configuration template for EKS worker nodes

mod eks_config_template;

pub use eks_config_template::*;
