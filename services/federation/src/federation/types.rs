//! Identity Federation Types
//!
//! Cluster handle, references to created IAM entities, the emitted workload
//! identity object, and the errors raised while binding.

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::graph::{Expr, GraphError, Resource, ResourceAddress, Stack};

/// Audience every federation token is minted for
pub const DEFAULT_AUDIENCE: &str = "sts.amazonaws.com";

/// Annotation the workload runtime reads the bound role from
pub const ROLE_ARN_ANNOTATION: &str = "eks.amazonaws.com/role-arn";

/// Namespace used when a binding does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Conventional directory permission documents are loaded from
pub const DEFAULT_POLICY_DIR: &str = "iam-policy-docs";

/// Attribute path of a cluster's OIDC issuer URL
pub const CLUSTER_ISSUER_ATTRIBUTE: &str = "identity[0].oidc[0].issuer";

/// Substrate resource types declared by this crate
pub mod resource_types {
    // ============================================================
    // Data sources
    // ============================================================

    pub const EKS_CLUSTER: &str = "aws_eks_cluster";
    pub const CALLER_IDENTITY: &str = "aws_caller_identity";
    pub const TLS_CERTIFICATE: &str = "tls_certificate";

    // ============================================================
    // Managed resources
    // ============================================================

    pub const OIDC_PROVIDER: &str = "aws_iam_openid_connect_provider";
    pub const EKS_IDENTITY_PROVIDER_CONFIG: &str = "aws_eks_identity_provider_config";
    pub const IAM_ROLE: &str = "aws_iam_role";
    pub const IAM_POLICY: &str = "aws_iam_policy";
    pub const IAM_ROLE_POLICY_ATTACHMENT: &str = "aws_iam_role_policy_attachment";
    pub const IAM_ROLE_POLICY: &str = "aws_iam_role_policy";
    pub const SERVICE_ACCOUNT: &str = "kubernetes_service_account";
}

/// Tag set applied to IAM entities
pub type Tags = BTreeMap<String, String>;

/// Handle to a cluster owned by the provisioning root.
///
/// Binders only read the cluster's name and issuer; they never own it.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub name: String,
    pub region: String,
    issuer_url: Expr,
    address: Option<ResourceAddress>,
}

impl Cluster {
    /// A cluster whose issuer URL is already known
    pub fn existing(
        name: impl Into<String>,
        region: impl Into<String>,
        issuer_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            issuer_url: Expr::Literal(issuer_url.into()),
            address: None,
        }
    }

    /// A cluster declared elsewhere in the same stack
    pub fn managed(
        address: ResourceAddress,
        name: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            issuer_url: Expr::Ref(address.attr(CLUSTER_ISSUER_ATTRIBUTE)),
            address: Some(address),
        }
    }

    /// A cluster read through a data source; the issuer stays deferred
    pub fn lookup(
        stack: &mut Stack,
        name: impl Into<String>,
        region: impl Into<String>,
        aws_provider: Option<&str>,
    ) -> Result<Self, GraphError> {
        let name = name.into();
        let address = ResourceAddress::data(resource_types::EKS_CLUSTER, name.as_str());

        if !stack.contains(&address) {
            stack.declare(
                Resource::at(address.clone())
                    .with_attr("name", &name)
                    .with_provider(aws_provider),
            )?;
        }

        Ok(Self::managed(address, name, region))
    }

    pub fn issuer_url(&self) -> &Expr {
        &self.issuer_url
    }

    /// Graph node backing this cluster, if it lives in the stack
    pub fn address(&self) -> Option<&ResourceAddress> {
        self.address.as_ref()
    }
}

/// Reference to a created IAM role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRef {
    pub address: ResourceAddress,
    pub name: String,
}

impl RoleRef {
    pub fn arn(&self) -> Expr {
        Expr::Ref(self.address.attr("arn"))
    }

    /// Name as seen by dependents, deferred to the realized role
    pub fn name_ref(&self) -> Expr {
        Expr::Ref(self.address.attr("name"))
    }
}

/// Reference to a created IAM policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRef {
    pub address: ResourceAddress,
    pub name: String,
}

impl PolicyRef {
    pub fn arn(&self) -> Expr {
        Expr::Ref(self.address.attr("arn"))
    }
}

/// The service account object handed to the workload runtime
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadIdentity {
    pub address: ResourceAddress,
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, Expr>,
}

impl WorkloadIdentity {
    pub fn role_arn_annotation(&self) -> Option<&Expr> {
        self.annotations.get(ROLE_ARN_ANNOTATION)
    }
}

/// Errors that abort graph construction
#[derive(Debug, Error)]
pub enum FederationError {
    /// No permission document at the resolved location
    #[error("Permission policy document not found: {}", .0.display())]
    PolicyDocumentNotFound(PathBuf),

    /// The permission document exists but could not be read
    #[error("Failed to read permission policy document {}: {source}", path.display())]
    PolicyDocumentUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Binding inputs are unusable
    #[error("Invalid binding: {0}")]
    InvalidBinding(String),

    /// Declaring into the stack failed
    #[error(transparent)]
    Graph(#[from] GraphError),
}
