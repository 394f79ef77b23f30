//! Identity Federation
//!
//! Turns an OIDC issuer into an IAM trust anchor and binds workloads to
//! roles that trust it:
//!
//! - [`issuer`] derives the URL and host forms of an issuer
//! - [`trust_policy`] builds `sts:AssumeRoleWithWebIdentity` trust documents
//! - [`naming`] keeps IAM names within their length ceiling
//! - [`provider`] registers one provider per (account, issuer)
//! - [`binder`] declares the role, policy, attachment and service account
//!   for a cluster workload
//! - [`github`] does the same for GitHub Actions workflow runs

pub mod binder;
pub mod github;
pub mod issuer;
pub mod naming;
pub mod provider;
pub mod trust_policy;
mod types;

pub use binder::{
    FederationBinder, PolicyFile, PolicySource, ServiceAccountManifest, WorkloadBinding,
    WorkloadBindingProps,
};
pub use github::{GitHubActionsBinder, GitHubActionsBinding, GitHubActionsProps, GitHubRepository};
pub use issuer::ResolvedIssuer;
pub use naming::NameBudgeter;
pub use provider::{FederationProvider, ProviderOptions, ProviderRegistry};
pub use trust_policy::{SubjectBinding, TrustPolicyBuilder, TrustPolicyDocument};
pub use types::*;
