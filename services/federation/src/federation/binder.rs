//! IAM Federation Binder
//!
//! Binds one workload (a Kubernetes service account) to a freshly minted IAM
//! role. Per binding the stack gains:
//!
//! 1. the cluster's federation provider (shared, via [`ProviderRegistry`])
//! 2. an IAM role trusting that provider for `system:serviceaccount:<ns>:<name>`
//! 3. a managed permission policy loaded from a JSON document
//! 4. the role/policy attachment
//! 5. the service account, annotated with the role ARN
//! 6. a `<cluster>-<workload>-role-arn` output
//!
//! Every cross-entity read carries an explicit dependency edge, and the
//! service account is ordered after both the role and the attachment.

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use super::naming::{logical_name, policy_name, role_name, NameBudgeter};
use super::provider::{FederationProvider, ProviderOptions, ProviderRegistry};
use super::trust_policy::{SubjectBinding, TrustPolicyBuilder, TrustPolicyDocument};
use super::types::{
    resource_types, Cluster, FederationError, PolicyRef, RoleRef, Tags, WorkloadIdentity,
    DEFAULT_NAMESPACE, DEFAULT_POLICY_DIR, ROLE_ARN_ANNOTATION,
};
use crate::graph::{Attr, Expr, GraphError, Resource, ResourceAddress, Stack};
use crate::tools::{AccountResolver, CallerIdentityLookup, FsPolicyLoader, PolicyDocumentLoader};

/// Explicit location of a permission document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyFile {
    pub location: PathBuf,
    pub file_name: String,
}

impl PolicyFile {
    pub fn new(location: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            file_name: file_name.into(),
        }
    }
}

/// Where a binding's permission document comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PolicySource {
    /// `<policy dir>/<policy name>.json`
    #[default]
    Conventional,
    File(PolicyFile),
    /// Document text supplied directly
    Inline(String),
}

/// Shape of the emitted service account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceAccountManifest {
    pub labels: BTreeMap<String, String>,
    /// Merged with the role ARN annotation. They may only set the role ARN
    /// key themselves when the role ARN annotation is excluded.
    pub extra_annotations: BTreeMap<String, String>,
    pub exclude_role_arn_annotation: bool,
}

/// Inputs for one workload binding
#[derive(Debug, Clone, Default)]
pub struct WorkloadBindingProps {
    pub name: String,
    pub namespace: Option<String>,
    pub policy_name: Option<String>,
    pub policy: PolicySource,
    pub tags: Tags,
    /// Caller-supplied prerequisites, ordered before the role and the
    /// service account
    pub depends_on: Vec<ResourceAddress>,
    pub manifest: ServiceAccountManifest,
    pub aws_provider: Option<String>,
    pub kubernetes_provider: Option<String>,
}

impl WorkloadBindingProps {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_policy_name(mut self, name: impl Into<String>) -> Self {
        self.policy_name = Some(name.into());
        self
    }

    pub fn with_policy(mut self, source: PolicySource) -> Self {
        self.policy = source;
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_depends_on(mut self, addresses: Vec<ResourceAddress>) -> Self {
        self.depends_on = addresses;
        self
    }

    pub fn with_manifest(mut self, manifest: ServiceAccountManifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_aws_provider(mut self, alias: impl Into<String>) -> Self {
        self.aws_provider = Some(alias.into());
        self
    }

    pub fn with_kubernetes_provider(mut self, alias: impl Into<String>) -> Self {
        self.kubernetes_provider = Some(alias.into());
        self
    }

    /// Namespace, defaulting to `default`
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }
}

/// Everything one binding declared
#[derive(Debug, Clone)]
pub struct WorkloadBinding {
    pub provider: FederationProvider,
    pub role: RoleRef,
    pub policy: PolicyRef,
    pub attachment: ResourceAddress,
    pub workload_identity: WorkloadIdentity,
    pub trust_policy: TrustPolicyDocument,
    /// Name of the role ARN output
    pub output: String,
    /// Role, policy, attachment and service account, for callers that need
    /// to order their own entities after this binding
    pub dependables: Vec<ResourceAddress>,
}

impl WorkloadBinding {
    pub fn role_arn(&self) -> Expr {
        self.role.arn()
    }

    /// Whether the stack holds every entity of this binding and the service
    /// account is ordered after the role and the attachment
    pub fn is_bound(&self, stack: &Stack) -> bool {
        let declared = self.dependables.iter().all(|a| stack.contains(a));
        let ordered = stack
            .get(&self.workload_identity.address)
            .map(|sa| {
                sa.dependencies().contains(&self.role.address)
                    && sa.dependencies().contains(&self.attachment)
            })
            .unwrap_or(false);
        declared && ordered
    }
}

/// Binds workloads to federated IAM roles
pub struct FederationBinder {
    loader: Box<dyn PolicyDocumentLoader>,
    account: Box<dyn AccountResolver>,
    provider_options: ProviderOptions,
    policy_dir: PathBuf,
}

impl Default for FederationBinder {
    fn default() -> Self {
        Self::new(Box::new(FsPolicyLoader::new()), Box::new(CallerIdentityLookup))
    }
}

impl FederationBinder {
    pub fn new(loader: Box<dyn PolicyDocumentLoader>, account: Box<dyn AccountResolver>) -> Self {
        Self {
            loader,
            account,
            provider_options: ProviderOptions::default(),
            policy_dir: PathBuf::from(DEFAULT_POLICY_DIR),
        }
    }

    pub fn with_provider_options(mut self, options: ProviderOptions) -> Self {
        self.provider_options = options;
        self
    }

    /// Directory conventional policy documents are read from
    pub fn with_policy_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.policy_dir = dir.into();
        self
    }

    pub fn provider_options(&self) -> &ProviderOptions {
        &self.provider_options
    }

    fn load_policy(&self, props: &WorkloadBindingProps, policy_name: &str) -> Result<String, FederationError> {
        match &props.policy {
            PolicySource::Inline(document) => Ok(document.clone()),
            PolicySource::File(file) => self.loader.load(&file.location, &file.file_name),
            PolicySource::Conventional => self
                .loader
                .load(&self.policy_dir, &format!("{}.json", policy_name)),
        }
    }

    fn validate(props: &WorkloadBindingProps) -> Result<(), FederationError> {
        if props.name.trim().is_empty() {
            return Err(FederationError::InvalidBinding(
                "workload name must not be empty".to_string(),
            ));
        }
        if !props.manifest.exclude_role_arn_annotation
            && props.manifest.extra_annotations.contains_key(ROLE_ARN_ANNOTATION)
        {
            return Err(FederationError::InvalidBinding(format!(
                "workload {} sets {} in its extra annotations without excluding the role ARN annotation",
                props.name, ROLE_ARN_ANNOTATION
            )));
        }
        if props.namespace().trim().is_empty() {
            return Err(FederationError::InvalidBinding(format!(
                "namespace for workload {} must not be empty",
                props.name
            )));
        }
        Ok(())
    }

    /// Declare the full binding for one workload.
    ///
    /// The permission document is read before anything is declared, so a
    /// missing document leaves the stack untouched.
    pub fn bind(
        &self,
        stack: &mut Stack,
        registry: &mut ProviderRegistry,
        cluster: &Cluster,
        props: &WorkloadBindingProps,
    ) -> Result<WorkloadBinding, FederationError> {
        Self::validate(props)?;

        let namespace = props.namespace();
        let role_name = role_name(&cluster.name, &props.name);
        let policy_name = match &props.policy_name {
            Some(name) => NameBudgeter::default().name([name]),
            None => policy_name(&cluster.name, &props.name),
        };

        let document = self.load_policy(props, &policy_name)?;

        let role_address = ResourceAddress::managed(resource_types::IAM_ROLE, logical_name([&role_name]));
        let policy_address =
            ResourceAddress::managed(resource_types::IAM_POLICY, logical_name([&policy_name]));
        let attachment_address = ResourceAddress::managed(
            resource_types::IAM_ROLE_POLICY_ATTACHMENT,
            logical_name([cluster.name.as_str(), props.name.as_str(), "policy-attachment"]),
        );
        let sa_address = ResourceAddress::managed(
            resource_types::SERVICE_ACCOUNT,
            logical_name([cluster.name.as_str(), namespace, props.name.as_str()]),
        );
        let output = logical_name([cluster.name.as_str(), props.name.as_str(), "role-arn"]);

        for address in [&role_address, &policy_address, &attachment_address, &sa_address] {
            if stack.contains(address) {
                return Err(GraphError::DuplicateResource(address.to_string()).into());
            }
        }
        if stack.outputs().contains_key(&output) {
            return Err(GraphError::DuplicateOutput(output).into());
        }

        let mut options = self.provider_options.clone();
        if props.aws_provider.is_some() {
            options.aws_provider = props.aws_provider.clone();
        }
        let aws_provider = options.aws_provider.as_deref();

        let account_id = self.account.account_id(stack, aws_provider)?;
        let provider = registry.ensure_for_cluster(stack, cluster, &options)?;

        let trust_policy = TrustPolicyBuilder::new(provider.issuer.clone(), options.audience()).build(
            provider.account_scoped_arn(&account_id),
            &SubjectBinding::service_account(namespace, props.name.as_str()),
        );

        let tags = (!props.tags.is_empty()).then_some(&props.tags);

        stack.declare(
            Resource::at(role_address.clone())
                .with_attr("name", &role_name)
                .with_attr("assume_role_policy", trust_policy.to_attr())
                .with_opt_attr("tags", tags)
                .with_provider(aws_provider)
                .depends_on(provider.dependables().iter())
                .depends_on(props.depends_on.iter())
                .depends_on_references(),
        )?;
        let role = RoleRef {
            address: role_address,
            name: role_name,
        };

        stack.declare(
            Resource::at(policy_address.clone())
                .with_attr("name", &policy_name)
                .with_attr("policy", document)
                .with_opt_attr("tags", tags)
                .with_provider(aws_provider),
        )?;
        let policy = PolicyRef {
            address: policy_address,
            name: policy_name,
        };

        stack.declare(
            Resource::at(attachment_address.clone())
                .with_attr("role", role.name_ref())
                .with_attr("policy_arn", policy.arn())
                .with_provider(aws_provider)
                .depends_on_references(),
        )?;

        let mut annotations: BTreeMap<String, Expr> = BTreeMap::new();
        if !props.manifest.exclude_role_arn_annotation {
            annotations.insert(ROLE_ARN_ANNOTATION.to_string(), role.arn());
        }
        for (key, value) in &props.manifest.extra_annotations {
            annotations.insert(key.clone(), Expr::literal(value.as_str()));
        }

        let mut metadata: BTreeMap<Expr, Attr> = BTreeMap::new();
        metadata.insert("name".into(), Attr::from(&props.name));
        metadata.insert("namespace".into(), Attr::from(namespace));
        if !props.manifest.labels.is_empty() {
            metadata.insert("labels".into(), Attr::from(&props.manifest.labels));
        }
        if !annotations.is_empty() {
            metadata.insert("annotations".into(), Attr::from(&annotations));
        }

        stack.declare(
            Resource::at(sa_address.clone())
                .with_attr("metadata", Attr::Map(metadata))
                .with_provider(props.kubernetes_provider.as_deref())
                .depends_on([&role.address, &attachment_address])
                .depends_on(props.depends_on.iter())
                .depends_on_references(),
        )?;
        let workload_identity = WorkloadIdentity {
            address: sa_address,
            name: props.name.clone(),
            namespace: namespace.to_string(),
            labels: props.manifest.labels.clone(),
            annotations,
        };

        let description = format!("IAM role assumed by {}/{}", namespace, props.name);
        stack.output(output.as_str(), role.arn(), Some(description.as_str()))?;

        debug!(
            role = %role.address,
            policy = %policy.address,
            attachment = %attachment_address,
            "Declared federation entities"
        );
        info!(
            workload = %props.name,
            namespace = %namespace,
            role = %role.name,
            "Bound workload to federated IAM role"
        );

        let dependables = vec![
            role.address.clone(),
            policy.address.clone(),
            attachment_address.clone(),
            workload_identity.address.clone(),
        ];

        Ok(WorkloadBinding {
            provider,
            role,
            policy,
            attachment: attachment_address,
            workload_identity,
            trust_policy,
            output,
            dependables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::trust_policy::ConditionOperator;
    use crate::tools::{InMemoryPolicyLoader, StaticAccount};
    use std::path::Path;

    const DOCUMENT: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"s3:*","Resource":"*"}]}"#;

    fn binder() -> FederationBinder {
        let loader = InMemoryPolicyLoader::new()
            .with_document(DEFAULT_POLICY_DIR, "prod-external-dns-policy.json", DOCUMENT)
            .with_document(DEFAULT_POLICY_DIR, "prod-cert-manager-policy.json", DOCUMENT)
            .with_document("docs", "alb.json", DOCUMENT);
        FederationBinder::new(Box::new(loader), Box::new(CallerIdentityLookup))
    }

    fn setup() -> (Stack, ProviderRegistry, Cluster) {
        let mut stack = Stack::new("test");
        let cluster = Cluster::lookup(&mut stack, "prod", "us-east-1", None).unwrap();
        (stack, ProviderRegistry::new(), cluster)
    }

    #[test]
    fn test_bind_declares_ordered_graph() {
        let (mut stack, mut registry, cluster) = setup();
        let binding = binder()
            .bind(
                &mut stack,
                &mut registry,
                &cluster,
                &WorkloadBindingProps::new("external-dns").with_namespace("kube-system"),
            )
            .unwrap();

        assert!(binding.is_bound(&stack));
        assert_eq!(binding.role.name, "prod-external-dns-role");
        assert_eq!(binding.policy.name, "prod-external-dns-policy");

        let plan = stack.synthesize().unwrap();
        let pos = |a: &ResourceAddress| plan.position(a).unwrap();

        assert!(pos(&binding.provider.address) < pos(&binding.role.address));
        assert!(pos(&binding.role.address) < pos(&binding.attachment));
        assert!(pos(&binding.policy.address) < pos(&binding.attachment));
        assert!(pos(&binding.attachment) < pos(&binding.workload_identity.address));
        assert!(pos(&binding.role.address) < pos(&binding.workload_identity.address));

        assert_eq!(
            plan.manifest["output"]["prod-external-dns-role-arn"]["value"],
            "${aws_iam_role.prod-external-dns-role.arn}"
        );
    }

    #[test]
    fn test_two_bindings_share_one_provider() {
        let (mut stack, mut registry, cluster) = setup();
        let binder = binder();

        let a = binder
            .bind(&mut stack, &mut registry, &cluster, &WorkloadBindingProps::new("external-dns"))
            .unwrap();
        let b = binder
            .bind(&mut stack, &mut registry, &cluster, &WorkloadBindingProps::new("cert-manager"))
            .unwrap();

        assert_eq!(a.provider.address, b.provider.address);
        let providers = stack
            .resources()
            .filter(|r| r.address().resource_type == resource_types::OIDC_PROVIDER)
            .count();
        assert_eq!(providers, 1);
        assert!(stack.synthesize().is_ok());
    }

    #[test]
    fn test_missing_document_leaves_stack_unchanged() {
        let (mut stack, mut registry, cluster) = setup();
        let before = stack.len();

        let err = binder()
            .bind(&mut stack, &mut registry, &cluster, &WorkloadBindingProps::new("unknown"))
            .unwrap_err();

        match err {
            FederationError::PolicyDocumentNotFound(path) => {
                assert_eq!(path, Path::new(DEFAULT_POLICY_DIR).join("prod-unknown-policy.json"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(stack.len(), before);
        assert!(stack.outputs().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_trust_policy_binds_exact_subject() {
        let (mut stack, mut registry, cluster) = setup();
        let binding = binder()
            .bind(
                &mut stack,
                &mut registry,
                &cluster,
                &WorkloadBindingProps::new("alb")
                    .with_namespace("kube-system")
                    .with_policy(PolicySource::File(PolicyFile::new("docs", "alb.json"))),
            )
            .unwrap();

        let issuer = &binding.provider.issuer;
        assert_eq!(
            binding
                .trust_policy
                .condition(ConditionOperator::ExactMatch, &issuer.claim_key("sub")),
            Some(&Expr::literal("system:serviceaccount:kube-system:alb"))
        );

        let role = stack.get(&binding.role.address).unwrap();
        let caller = CallerIdentityLookup::address(None);
        assert!(role.dependencies().contains(&caller));
        assert!(role.dependencies().contains(&binding.provider.address));
    }

    #[test]
    fn test_annotations_and_labels() {
        let (mut stack, mut registry, cluster) = setup();
        let manifest = ServiceAccountManifest {
            labels: BTreeMap::from([("app".to_string(), "alb".to_string())]),
            extra_annotations: BTreeMap::from([("team".to_string(), "platform".to_string())]),
            exclude_role_arn_annotation: false,
        };

        let binding = binder()
            .bind(
                &mut stack,
                &mut registry,
                &cluster,
                &WorkloadBindingProps::new("alb")
                    .with_policy(PolicySource::Inline(DOCUMENT.to_string()))
                    .with_manifest(manifest),
            )
            .unwrap();

        let sa = &binding.workload_identity;
        assert_eq!(sa.namespace, DEFAULT_NAMESPACE);
        assert_eq!(sa.role_arn_annotation(), Some(&binding.role_arn()));
        assert_eq!(sa.annotations.get("team"), Some(&Expr::literal("platform")));

        let plan = stack.synthesize().unwrap();
        let metadata = &plan.manifest["resource"][resource_types::SERVICE_ACCOUNT]
            [sa.address.name.as_str()]["metadata"];
        assert_eq!(metadata["labels"]["app"], "alb");
        assert_eq!(
            metadata["annotations"][ROLE_ARN_ANNOTATION],
            "${aws_iam_role.prod-alb-role.arn}"
        );
    }

    #[test]
    fn test_excluded_role_arn_annotation() {
        let (mut stack, mut registry, cluster) = setup();
        let manifest = ServiceAccountManifest {
            exclude_role_arn_annotation: true,
            ..Default::default()
        };

        let binding = binder()
            .bind(
                &mut stack,
                &mut registry,
                &cluster,
                &WorkloadBindingProps::new("alb")
                    .with_policy(PolicySource::Inline(DOCUMENT.to_string()))
                    .with_manifest(manifest),
            )
            .unwrap();

        assert!(binding.workload_identity.role_arn_annotation().is_none());
        assert!(binding.is_bound(&stack));
        let sa = stack.get(&binding.workload_identity.address).unwrap();
        match sa.get("metadata") {
            Some(Attr::Map(metadata)) => {
                assert!(!metadata.contains_key(&Expr::literal("annotations")))
            }
            other => panic!("unexpected metadata: {other:?}"),
        }
    }

    #[test]
    fn test_prerequisites_order_role_and_service_account() {
        let (mut stack, mut registry, cluster) = setup();
        let addon = stack
            .declare(Resource::managed("aws_eks_addon", "vpc-cni").with_attr("cluster_name", "prod"))
            .unwrap();

        let binding = binder()
            .bind(
                &mut stack,
                &mut registry,
                &cluster,
                &WorkloadBindingProps::new("external-dns").with_depends_on(vec![addon.clone()]),
            )
            .unwrap();

        for address in [&binding.role.address, &binding.workload_identity.address] {
            assert!(stack.get(address).unwrap().dependencies().contains(&addon));
        }
    }

    #[test]
    fn test_policy_name_override_and_budget() {
        let (mut stack, mut registry, _) = setup();
        let long = "c".repeat(130);
        let cluster = Cluster::existing(long.as_str(), "us-east-1", "https://oidc.example/id/1");
        let loader = InMemoryPolicyLoader::new().with_document(DEFAULT_POLICY_DIR, "custom.json", DOCUMENT);
        let binder = FederationBinder::new(
            Box::new(loader),
            Box::new(StaticAccount("123456789012".to_string())),
        );

        let binding = binder
            .bind(
                &mut stack,
                &mut registry,
                &cluster,
                &WorkloadBindingProps::new("app").with_policy_name("custom"),
            )
            .unwrap();

        assert_eq!(binding.policy.name, "custom");
        assert_eq!(binding.role.name.chars().count(), 128);
        assert_eq!(
            binding.trust_policy.to_json()["Statement"][0]["Principal"]["Federated"],
            "arn:aws:iam::123456789012:oidc-provider/oidc.example/id/1"
        );
    }

    #[test]
    fn test_duplicate_binding_rejected_before_declaring() {
        let (mut stack, mut registry, cluster) = setup();
        let binder = binder();
        let props = WorkloadBindingProps::new("external-dns");

        binder.bind(&mut stack, &mut registry, &cluster, &props).unwrap();
        let before = stack.len();

        let err = binder.bind(&mut stack, &mut registry, &cluster, &props).unwrap_err();
        assert!(matches!(err, FederationError::Graph(GraphError::DuplicateResource(_))));
        assert_eq!(stack.len(), before);
    }

    #[test]
    fn test_extra_annotations_cannot_replace_role_arn() {
        let (mut stack, mut registry, cluster) = setup();
        let before = stack.len();
        let manifest = ServiceAccountManifest {
            extra_annotations: BTreeMap::from([(ROLE_ARN_ANNOTATION.to_string(), String::new())]),
            ..Default::default()
        };

        let err = binder()
            .bind(
                &mut stack,
                &mut registry,
                &cluster,
                &WorkloadBindingProps::new("alb")
                    .with_policy(PolicySource::Inline(DOCUMENT.to_string()))
                    .with_manifest(manifest),
            )
            .unwrap_err();

        assert!(matches!(err, FederationError::InvalidBinding(_)));
        assert_eq!(stack.len(), before);
    }

    #[test]
    fn test_excluded_role_arn_annotation_may_be_supplied() {
        let (mut stack, mut registry, cluster) = setup();
        let manifest = ServiceAccountManifest {
            extra_annotations: BTreeMap::from([(
                ROLE_ARN_ANNOTATION.to_string(),
                "arn:aws:iam::123456789012:role/external".to_string(),
            )]),
            exclude_role_arn_annotation: true,
            ..Default::default()
        };

        let binding = binder()
            .bind(
                &mut stack,
                &mut registry,
                &cluster,
                &WorkloadBindingProps::new("alb")
                    .with_policy(PolicySource::Inline(DOCUMENT.to_string()))
                    .with_manifest(manifest),
            )
            .unwrap();

        assert_eq!(
            binding.workload_identity.role_arn_annotation(),
            Some(&Expr::literal("arn:aws:iam::123456789012:role/external"))
        );
    }

    #[test]
    fn test_same_workload_on_two_clusters() {
        let mut stack = Stack::new("test");
        let mut registry = ProviderRegistry::new();
        let prod = Cluster::existing("prod", "us-east-1", "https://oidc.example/id/prod");
        let staging = Cluster::existing("staging", "us-east-1", "https://oidc.example/id/staging");
        let binder = FederationBinder::new(
            Box::new(InMemoryPolicyLoader::new()),
            Box::new(StaticAccount("123456789012".to_string())),
        );
        let props = WorkloadBindingProps::new("app").with_policy(PolicySource::Inline(DOCUMENT.to_string()));

        let a = binder.bind(&mut stack, &mut registry, &prod, &props).unwrap();
        let b = binder.bind(&mut stack, &mut registry, &staging, &props).unwrap();

        assert_eq!(a.output, "prod-app-role-arn");
        assert_eq!(b.output, "staging-app-role-arn");
        assert_ne!(a.provider.address, b.provider.address);
        assert_eq!(registry.len(), 2);

        let plan = stack.synthesize().unwrap();
        assert_eq!(
            plan.manifest["output"]["staging-app-role-arn"]["value"],
            "${aws_iam_role.staging-app-role.arn}"
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        let (mut stack, mut registry, cluster) = setup();
        let err = binder()
            .bind(&mut stack, &mut registry, &cluster, &WorkloadBindingProps::new(" "))
            .unwrap_err();
        assert!(matches!(err, FederationError::InvalidBinding(_)));
    }
}
