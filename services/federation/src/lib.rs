//! Federation Engine Library
//!
//! Declares OIDC workload identity federation for EKS clusters and GitHub
//! Actions as a provisioning plan: one IAM OIDC provider per issuer, and per
//! workload a role, permission policy, attachment and annotated service
//! account, all ordered through explicit dependency edges.

pub mod compose;
pub mod config;
pub mod federation;
pub mod graph;
pub mod tools;

pub use compose::{compose, synthesize, Composition};
pub use config::StackConfig;
pub use federation::{
    Cluster, FederationBinder, FederationError, GitHubActionsBinder, ProviderRegistry,
    TrustPolicyBuilder, WorkloadBinding, WorkloadBindingProps,
};
pub use graph::{GraphError, Plan, Stack};
