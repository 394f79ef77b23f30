//! Stack Configuration
//!
//! A stack is described by a JSON document: the cluster, the workloads to
//! bind and the repositories to federate. A handful of environment
//! variables override file values so one definition can be synthesized per
//! account.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::federation::{Tags, DEFAULT_POLICY_DIR};

/// Environment variable overriding the account id
pub const ENV_ACCOUNT_ID: &str = "AWS_ACCOUNT_ID";
/// Environment variable overriding the policy document directory
pub const ENV_POLICY_DIR: &str = "FEDERATION_POLICY_DIR";
/// Environment variable overriding the stack name
pub const ENV_STACK_NAME: &str = "FEDERATION_STACK_NAME";

fn default_stack_name() -> String {
    "federation".to_string()
}

fn default_policy_dir() -> PathBuf {
    PathBuf::from(DEFAULT_POLICY_DIR)
}

/// Declarative stack definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default = "default_stack_name")]
    pub name: String,

    /// Known account id. When absent the caller identity is read at apply time.
    #[serde(default)]
    pub account_id: Option<String>,

    pub cluster: ClusterConfig,

    /// Directory conventional policy documents are read from
    #[serde(default = "default_policy_dir")]
    pub policy_dir: PathBuf,

    /// Tags applied to every IAM entity
    #[serde(default)]
    pub tags: Tags,

    #[serde(default)]
    pub providers: ProviderAliases,

    #[serde(default)]
    pub workloads: Vec<WorkloadConfig>,

    #[serde(default)]
    pub github_repositories: Vec<GitHubRepositoryConfig>,
}

/// Cluster whose issuer the workloads federate through
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    pub region: String,

    /// Known issuer URL. When absent the cluster is looked up by name.
    #[serde(default)]
    pub issuer_url: Option<String>,

    #[serde(default)]
    pub thumbprints: Vec<String>,

    /// Register the issuer with the cluster under this config name
    #[serde(default)]
    pub identity_provider_config: Option<String>,
}

/// Substrate provider aliases
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderAliases {
    #[serde(default)]
    pub aws: Option<String>,
    #[serde(default)]
    pub kubernetes: Option<String>,
}

/// One workload to bind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    pub name: String,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub policy_name: Option<String>,

    /// Explicit permission document path
    #[serde(default)]
    pub policy_file: Option<PathBuf>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub exclude_role_arn_annotation: bool,

    /// Addresses of prerequisites, e.g. `aws_eks_addon.vpc-cni`
    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub tags: Tags,
}

/// One repository to federate with GitHub Actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepositoryConfig {
    pub owner: String,
    pub name: String,

    #[serde(default)]
    pub policy_file: Option<PathBuf>,

    #[serde(default)]
    pub thumbprints: Vec<String>,
}

impl StackConfig {
    /// Parse a JSON stack definition
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse stack configuration")
    }

    /// Load a JSON stack definition from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read stack configuration {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Invalid stack configuration {}", path.display()))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(account_id) = lookup(ENV_ACCOUNT_ID) {
            debug!(source = ENV_ACCOUNT_ID, "Overriding account id");
            self.account_id = Some(account_id);
        }
        if let Some(dir) = lookup(ENV_POLICY_DIR) {
            debug!(source = ENV_POLICY_DIR, dir = %dir, "Overriding policy directory");
            self.policy_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup(ENV_STACK_NAME) {
            debug!(source = ENV_STACK_NAME, name = %name, "Overriding stack name");
            self.name = name;
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize stack configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"{
        "cluster": { "name": "prod", "region": "us-east-1" },
        "workloads": [{ "name": "external-dns", "namespace": "kube-system" }]
    }"#;

    #[test]
    fn test_defaults() {
        let config = StackConfig::from_json(MINIMAL).unwrap();

        assert_eq!(config.name, "federation");
        assert_eq!(config.policy_dir, PathBuf::from(DEFAULT_POLICY_DIR));
        assert!(config.account_id.is_none());
        assert!(config.cluster.issuer_url.is_none());
        assert!(config.github_repositories.is_empty());

        let workload = &config.workloads[0];
        assert_eq!(workload.namespace.as_deref(), Some("kube-system"));
        assert!(!workload.exclude_role_arn_annotation);
        assert!(workload.depends_on.is_empty());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = StackConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cluster.name, "prod");
    }

    #[test]
    fn test_from_file_errors_carry_path() {
        let err = StackConfig::from_file("/nonexistent/stack.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/stack.json"));

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(StackConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_cluster_rejected() {
        assert!(StackConfig::from_json(r#"{ "workloads": [] }"#).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = StackConfig::from_json(MINIMAL).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_ACCOUNT_ID, "123456789012"),
            (ENV_POLICY_DIR, "/etc/federation/policies"),
            (ENV_STACK_NAME, " "),
        ]);

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.account_id.as_deref(), Some("123456789012"));
        assert_eq!(config.policy_dir, PathBuf::from("/etc/federation/policies"));
        assert_eq!(config.name, "federation");
    }

    #[test]
    fn test_round_trip_preserves_workloads() {
        let config = StackConfig::from_json(MINIMAL).unwrap();
        let again = StackConfig::from_json(&config.to_json_pretty().unwrap()).unwrap();
        assert_eq!(again.workloads[0].name, "external-dns");
    }
}
