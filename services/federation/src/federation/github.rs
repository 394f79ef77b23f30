//! GitHub Actions Federation
//!
//! Lets workflow runs of one repository assume an IAM role through the
//! GitHub Actions OIDC issuer. Unlike cluster bindings the subject is a
//! pattern (`repo:<owner>/<repo>:*`), so any ref of the repository matches.

use tracing::info;

use super::binder::PolicyFile;
use super::naming::{logical_name, NameBudgeter};
use super::provider::{FederationProvider, ProviderOptions, ProviderRegistry};
use super::trust_policy::{SubjectBinding, TrustPolicyBuilder, TrustPolicyDocument};
use super::types::{resource_types, FederationError, RoleRef, Tags};
use crate::graph::{Expr, GraphError, Resource, ResourceAddress, Stack};
use crate::tools::{FsPolicyLoader, PolicyDocumentLoader};

/// Issuer of GitHub Actions workflow tokens
pub const GITHUB_ACTIONS_ISSUER: &str = "https://token.actions.githubusercontent.com";

/// Logical name of the shared GitHub Actions provider
pub const GITHUB_ACTIONS_PROVIDER_NAME: &str = "github-actions-oidc-provider";

/// Owner and name of a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepository {
    pub owner: String,
    pub name: String,
}

impl GitHubRepository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

/// Inputs for one repository binding
#[derive(Debug, Clone)]
pub struct GitHubActionsProps {
    pub repository: GitHubRepository,
    /// Inline role policy document. Defaults to allow-all.
    pub policy: Option<PolicyFile>,
    pub tags: Tags,
    /// Issuer certificate thumbprints. Read at apply time when empty.
    pub thumbprints: Vec<String>,
    pub aws_provider: Option<String>,
}

impl GitHubActionsProps {
    pub fn new(repository: GitHubRepository) -> Self {
        Self {
            repository,
            policy: None,
            tags: Tags::new(),
            thumbprints: Vec::new(),
            aws_provider: None,
        }
    }

    pub fn with_policy(mut self, file: PolicyFile) -> Self {
        self.policy = Some(file);
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

/// Entities declared for one repository
#[derive(Debug, Clone)]
pub struct GitHubActionsBinding {
    pub provider: FederationProvider,
    pub role: RoleRef,
    pub role_policy: ResourceAddress,
    pub trust_policy: TrustPolicyDocument,
    pub output: String,
}

impl GitHubActionsBinding {
    pub fn role_arn(&self) -> Expr {
        self.role.arn()
    }
}

/// Allow-all permission document used when none is supplied
pub fn allow_all_document() -> String {
    serde_json::json!({
        "Version": super::trust_policy::POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Action": "*",
            "Resource": "*",
        }],
    })
    .to_string()
}

/// Binds repositories to IAM roles assumable from their workflow runs
pub struct GitHubActionsBinder {
    loader: Box<dyn PolicyDocumentLoader>,
}

impl Default for GitHubActionsBinder {
    fn default() -> Self {
        Self::new(Box::new(FsPolicyLoader::new()))
    }
}

impl GitHubActionsBinder {
    pub fn new(loader: Box<dyn PolicyDocumentLoader>) -> Self {
        Self { loader }
    }

    pub fn bind(
        &self,
        stack: &mut Stack,
        registry: &mut ProviderRegistry,
        props: &GitHubActionsProps,
    ) -> Result<GitHubActionsBinding, FederationError> {
        let repo = &props.repository;
        if repo.owner.trim().is_empty() || repo.name.trim().is_empty() {
            return Err(FederationError::InvalidBinding(
                "repository owner and name must not be empty".to_string(),
            ));
        }

        let document = match &props.policy {
            Some(file) => self.loader.load(&file.location, &file.file_name)?,
            None => allow_all_document(),
        };

        let budget = NameBudgeter::default();
        let role_name = budget.name([repo.name.as_str(), "GitHubActionsOIDCIamRole"]);
        let policy_name = budget.name([repo.name.as_str(), "GitHubActionsOIDCIamRolePolicy"]);
        let role_address = ResourceAddress::managed(resource_types::IAM_ROLE, logical_name([&role_name]));
        let policy_address =
            ResourceAddress::managed(resource_types::IAM_ROLE_POLICY, logical_name([&policy_name]));
        let output = logical_name([repo.owner.as_str(), repo.name.as_str(), "github-actions-role-arn"]);

        for address in [&role_address, &policy_address] {
            if stack.contains(address) {
                return Err(GraphError::DuplicateResource(address.to_string()).into());
            }
        }
        if stack.outputs().contains_key(&output) {
            return Err(GraphError::DuplicateOutput(output).into());
        }

        let options = ProviderOptions::default()
            .with_thumbprints(props.thumbprints.clone())
            .with_tags(props.tags.clone())
            .with_aws_provider(props.aws_provider.clone());
        let aws_provider = options.aws_provider.as_deref();
        let provider = registry.ensure(stack, GITHUB_ACTIONS_PROVIDER_NAME, GITHUB_ACTIONS_ISSUER, &options)?;

        let trust_policy = TrustPolicyBuilder::new(provider.issuer.clone(), options.audience())
            .build(provider.arn(), &SubjectBinding::repository(repo.owner.as_str(), repo.name.as_str()));

        stack.declare(
            Resource::at(role_address.clone())
                .with_attr("name", &role_name)
                .with_attr("assume_role_policy", trust_policy.to_attr())
                .with_opt_attr("tags", (!props.tags.is_empty()).then_some(&props.tags))
                .with_provider(aws_provider)
                .depends_on(provider.dependables().iter())
                .depends_on_references(),
        )?;
        let role = RoleRef {
            address: role_address,
            name: role_name,
        };

        stack.declare(
            Resource::at(policy_address.clone())
                .with_attr("name", &policy_name)
                .with_attr("role", role.name_ref())
                .with_attr("policy", document)
                .with_provider(aws_provider)
                .depends_on_references(),
        )?;

        stack.output(output.as_str(), role.arn(), Some("GitHub Actions OIDC IAM role"))?;

        info!(
            repository = %format!("{}/{}", repo.owner, repo.name),
            role = %role.name,
            "Bound repository to GitHub Actions OIDC role"
        );

        Ok(GitHubActionsBinding {
            provider,
            role,
            role_policy: policy_address,
            trust_policy,
            output,
        })
    }
}
