//! Composition Root
//!
//! Owns the stack and the provider registry for one synthesis run and
//! drives every binder declared in a [`StackConfig`].

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::config::{GitHubRepositoryConfig, StackConfig, WorkloadConfig};
use crate::federation::{
    Cluster, FederationBinder, GitHubActionsBinder, GitHubActionsBinding, GitHubActionsProps,
    GitHubRepository, PolicyFile, PolicySource, ProviderOptions, ProviderRegistry,
    ServiceAccountManifest, WorkloadBinding, WorkloadBindingProps,
};
use crate::graph::{Plan, ResourceAddress, Stack};
use crate::tools::{AccountResolver, CallerIdentityLookup, FsPolicyLoader, StaticAccount};

/// Result of composing a stack
#[derive(Debug)]
pub struct Composition {
    pub stack: Stack,
    pub registry: ProviderRegistry,
    pub workloads: Vec<WorkloadBinding>,
    pub repositories: Vec<GitHubActionsBinding>,
}

impl Composition {
    pub fn synthesize(&self) -> Result<Plan> {
        self.stack
            .synthesize()
            .with_context(|| format!("Failed to synthesize stack {}", self.stack.name()))
    }
}

fn policy_file(path: &Path) -> Result<PolicyFile> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Policy file path has no file name: {}", path.display()))?;
    let location = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(PolicyFile::new(location, file_name))
}

fn workload_props(config: &StackConfig, workload: &WorkloadConfig) -> Result<WorkloadBindingProps> {
    let depends_on = workload
        .depends_on
        .iter()
        .map(|a| a.parse::<ResourceAddress>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid prerequisite for workload {}", workload.name))?;

    let policy = match &workload.policy_file {
        Some(path) => PolicySource::File(policy_file(path)?),
        None => PolicySource::Conventional,
    };

    let mut tags = config.tags.clone();
    tags.extend(workload.tags.clone());

    Ok(WorkloadBindingProps {
        name: workload.name.clone(),
        namespace: workload.namespace.clone(),
        policy_name: workload.policy_name.clone(),
        policy,
        tags,
        depends_on,
        manifest: ServiceAccountManifest {
            labels: workload.labels.clone(),
            extra_annotations: workload.annotations.clone(),
            exclude_role_arn_annotation: workload.exclude_role_arn_annotation,
        },
        aws_provider: config.providers.aws.clone(),
        kubernetes_provider: config.providers.kubernetes.clone(),
    })
}

fn repository_props(config: &StackConfig, repo: &GitHubRepositoryConfig) -> Result<GitHubActionsProps> {
    Ok(GitHubActionsProps {
        repository: GitHubRepository::new(repo.owner.as_str(), repo.name.as_str()),
        policy: repo.policy_file.as_deref().map(policy_file).transpose()?,
        tags: config.tags.clone(),
        thumbprints: repo.thumbprints.clone(),
        aws_provider: config.providers.aws.clone(),
    })
}

/// Declare everything `config` describes. Relative policy paths resolve
/// against `base_dir`.
pub fn compose(config: &StackConfig, base_dir: &Path) -> Result<Composition> {
    let mut stack = Stack::new(config.name.as_str());
    let mut registry = ProviderRegistry::new();
    let aws_provider = config.providers.aws.as_deref();

    let cluster = match &config.cluster.issuer_url {
        Some(url) => Cluster::existing(config.cluster.name.as_str(), config.cluster.region.as_str(), url.as_str()),
        None => Cluster::lookup(
            &mut stack,
            config.cluster.name.as_str(),
            config.cluster.region.as_str(),
            aws_provider,
        )
        .context("Failed to declare cluster lookup")?,
    };

    let account: Box<dyn AccountResolver> = match &config.account_id {
        Some(id) => Box::new(StaticAccount(id.clone())),
        None => Box::new(CallerIdentityLookup),
    };
    let loader = FsPolicyLoader::new().with_root(base_dir);

    let mut options = ProviderOptions::default()
        .with_thumbprints(config.cluster.thumbprints.clone())
        .with_tags(config.tags.clone())
        .with_aws_provider(config.providers.aws.clone());
    if let Some(name) = &config.cluster.identity_provider_config {
        options = options.with_cluster_identity_config(name.as_str());
    }

    let binder = FederationBinder::new(Box::new(loader.clone()), account)
        .with_provider_options(options)
        .with_policy_dir(config.policy_dir.as_path());

    let mut workloads = Vec::with_capacity(config.workloads.len());
    for workload in &config.workloads {
        let props = workload_props(config, workload)?;
        let binding = binder
            .bind(&mut stack, &mut registry, &cluster, &props)
            .with_context(|| format!("Failed to bind workload {}", workload.name))?;
        workloads.push(binding);
    }

    let github = GitHubActionsBinder::new(Box::new(loader));
    let mut repositories = Vec::with_capacity(config.github_repositories.len());
    for repo in &config.github_repositories {
        let props = repository_props(config, repo)?;
        let binding = github
            .bind(&mut stack, &mut registry, &props)
            .with_context(|| format!("Failed to bind repository {}/{}", repo.owner, repo.name))?;
        repositories.push(binding);
    }

    info!(
        stack = %config.name,
        workloads = workloads.len(),
        repositories = repositories.len(),
        providers = registry.len(),
        "Composed federation stack"
    );

    Ok(Composition {
        stack,
        registry,
        workloads,
        repositories,
    })
}

/// Compose and synthesize in one step
pub fn synthesize(config: &StackConfig, base_dir: &Path) -> Result<Plan> {
    compose(config, base_dir)?.synthesize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::{resource_types, FederationError};
    use tempfile::TempDir;

    const POLICY: &str = r#"{"Version":"2012-10-17","Statement":[]}"#;

    fn workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("iam-policy-docs")).unwrap();
        for name in ["prod-external-dns-policy.json", "prod-cert-manager-policy.json"] {
            std::fs::write(dir.path().join("iam-policy-docs").join(name), POLICY).unwrap();
        }
        std::fs::create_dir(dir.path().join("github")).unwrap();
        std::fs::write(dir.path().join("github/deploy.json"), POLICY).unwrap();
        dir
    }

    fn config() -> StackConfig {
        StackConfig::from_json(
            r#"{
                "name": "prod-federation",
                "cluster": { "name": "prod", "region": "us-east-1" },
                "tags": { "team": "platform" },
                "workloads": [
                    { "name": "external-dns", "namespace": "kube-system" },
                    {
                        "name": "cert-manager",
                        "namespace": "cert-manager",
                        "labels": { "app": "cert-manager" },
                        "tags": { "component": "tls" }
                    }
                ],
                "github_repositories": [
                    { "owner": "Org", "name": "Repo", "policy_file": "github/deploy.json" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_compose_full_stack() {
        let dir = workspace();
        let composition = compose(&config(), dir.path()).unwrap();

        assert_eq!(composition.workloads.len(), 2);
        assert_eq!(composition.repositories.len(), 1);
        // one provider for the cluster, one for GitHub Actions
        assert_eq!(composition.registry.len(), 2);
        assert!(composition.workloads.iter().all(|b| b.is_bound(&composition.stack)));

        let plan = composition.synthesize().unwrap();
        assert_eq!(plan.stack, "prod-federation");
        let roles = &plan.manifest["resource"][resource_types::IAM_ROLE];
        assert_eq!(roles["prod-cert-manager-role"]["tags"]["team"], "platform");
        assert_eq!(roles["prod-cert-manager-role"]["tags"]["component"], "tls");
        assert!(roles["Repo-GitHubActionsOIDCIamRole"].is_object());
        assert!(plan.manifest["output"]["prod-external-dns-role-arn"].is_object());
    }

    #[test]
    fn test_compose_is_deterministic() {
        let dir = workspace();
        let a = synthesize(&config(), dir.path()).unwrap().to_json_pretty().unwrap();
        let b = synthesize(&config(), dir.path()).unwrap().to_json_pretty().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_static_account_and_known_issuer() {
        let dir = workspace();
        let mut config = config();
        config.account_id = Some("123456789012".to_string());
        config.cluster.issuer_url = Some("https://oidc.eks.us-east-1.amazonaws.com/id/ABC".to_string());
        config.github_repositories.clear();

        let composition = compose(&config, dir.path()).unwrap();
        let json = composition.workloads[0].trust_policy.to_json();
        assert_eq!(
            json["Statement"][0]["Principal"]["Federated"],
            "arn:aws:iam::123456789012:oidc-provider/oidc.eks.us-east-1.amazonaws.com/id/ABC"
        );
        assert!(composition
            .stack
            .resources()
            .all(|r| r.address().resource_type != resource_types::CALLER_IDENTITY));
    }

    #[test]
    fn test_missing_policy_document_fails() {
        let dir = TempDir::new().unwrap();
        let err = compose(&config(), dir.path()).unwrap_err();

        assert!(err.to_string().contains("external-dns"));
        assert!(matches!(
            err.downcast_ref::<FederationError>(),
            Some(FederationError::PolicyDocumentNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_prerequisite_address() {
        let dir = workspace();
        let mut config = config();
        config.workloads[0].depends_on = vec!["not-an-address".to_string()];

        let err = compose(&config, dir.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid prerequisite"));
    }

    #[test]
    fn test_policy_file_split() {
        let file = policy_file(Path::new("docs/alb.json")).unwrap();
        assert_eq!(file, PolicyFile::new("docs", "alb.json"));

        let bare = policy_file(Path::new("alb.json")).unwrap();
        assert_eq!(bare.location, Path::new(""));
    }
}
