//! Federation Provider Registry
//!
//! One `aws_iam_openid_connect_provider` per (account, issuer) pair. The
//! registry is owned by the composition root and passed by reference into
//! every binder, so two bindings against the same cluster share a single
//! provider declaration.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::issuer::ResolvedIssuer;
use super::naming::logical_name;
use super::types::{resource_types, Cluster, Tags, DEFAULT_AUDIENCE};
use crate::graph::{Attr, Expr, GraphError, Resource, ResourceAddress, Stack};

/// Attribute of a `tls_certificate` read holding the leaf fingerprint
pub const THUMBPRINT_ATTRIBUTE: &str = "certificates[0].sha1_fingerprint";

/// Registration options for a federation provider
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Accepted token audiences (`client_id_list`)
    pub audiences: Vec<String>,
    /// Certificate thumbprints. When empty, the thumbprint is read from the
    /// issuer's certificate at apply time.
    pub thumbprints: Vec<String>,
    /// Also register the issuer with the cluster under this config name
    pub cluster_identity_config: Option<String>,
    pub tags: Tags,
    /// AWS provider alias, which also scopes the (account, issuer) key
    pub aws_provider: Option<String>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            audiences: vec![DEFAULT_AUDIENCE.to_string()],
            thumbprints: Vec::new(),
            cluster_identity_config: None,
            tags: Tags::new(),
            aws_provider: None,
        }
    }
}

impl ProviderOptions {
    pub fn with_thumbprints(mut self, thumbprints: Vec<String>) -> Self {
        self.thumbprints = thumbprints;
        self
    }

    pub fn with_cluster_identity_config(mut self, name: impl Into<String>) -> Self {
        self.cluster_identity_config = Some(name.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_aws_provider(mut self, alias: Option<String>) -> Self {
        self.aws_provider = alias;
        self
    }

    /// First accepted audience, used as the cluster-side client id
    pub fn audience(&self) -> &str {
        self.audiences
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_AUDIENCE)
    }
}

/// A registered trust anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationProvider {
    pub address: ResourceAddress,
    pub issuer: ResolvedIssuer,
    pub audiences: Vec<String>,
    /// Literal thumbprints; empty when read from the issuer certificate
    pub thumbprints: Vec<String>,
    /// Cluster-side registration, when requested
    pub identity_config: Option<ResourceAddress>,
}

impl FederationProvider {
    /// The provider's own ARN attribute
    pub fn arn(&self) -> Expr {
        Expr::Ref(self.address.attr("arn"))
    }

    /// Provider ARN assembled from the account id and issuer host
    pub fn account_scoped_arn(&self, account_id: &Expr) -> Expr {
        self.issuer.provider_arn(account_id)
    }

    /// Entities a role trusting this provider must be ordered after
    pub fn dependables(&self) -> Vec<ResourceAddress> {
        std::iter::once(self.address.clone())
            .chain(self.identity_config.iter().cloned())
            .collect()
    }
}

/// Explicit (account, issuer) → provider map
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, FederationProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(aws_provider: Option<&str>, issuer: &Expr) -> String {
        format!("{}|{}", aws_provider.unwrap_or_default(), issuer.render())
    }

    /// Provider already registered for an issuer, if any
    pub fn get(&self, aws_provider: Option<&str>, issuer: &Expr) -> Option<&FederationProvider> {
        self.providers.get(&Self::key(aws_provider, issuer))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn reuse(&self, key: &str, opts: &ProviderOptions) -> Option<FederationProvider> {
        let existing = self.providers.get(key)?;
        let mut conflicting = false;
        if existing.audiences != opts.audiences {
            warn!(
                provider = %existing.address,
                requested = ?opts.audiences,
                registered = ?existing.audiences,
                "Federation provider already registered with different audiences, reusing it"
            );
            conflicting = true;
        }
        if existing.thumbprints != opts.thumbprints {
            warn!(
                provider = %existing.address,
                requested = ?opts.thumbprints,
                registered = ?existing.thumbprints,
                "Federation provider already registered with different thumbprints, reusing it"
            );
            conflicting = true;
        }
        if let (Some(config), None) = (&opts.cluster_identity_config, &existing.identity_config) {
            warn!(
                provider = %existing.address,
                requested = %config,
                "Federation provider already registered without a cluster identity config, reusing it"
            );
            conflicting = true;
        }
        if !conflicting {
            debug!(provider = %existing.address, "Reusing federation provider");
        }
        Some(existing.clone())
    }

    /// Register a provider for `issuer_url` unless one exists for the same
    /// account and issuer.
    pub fn ensure(
        &mut self,
        stack: &mut Stack,
        name: &str,
        issuer_url: impl Into<Expr>,
        opts: &ProviderOptions,
    ) -> Result<FederationProvider, GraphError> {
        let issuer = ResolvedIssuer::resolve(issuer_url);
        let key = Self::key(opts.aws_provider.as_deref(), &issuer.url);
        if let Some(existing) = self.reuse(&key, opts) {
            return Ok(existing);
        }

        let logical = logical_name([name]);
        let aws_provider = opts.aws_provider.as_deref();

        let thumbprints = if opts.thumbprints.is_empty() {
            let certificate = ResourceAddress::data(resource_types::TLS_CERTIFICATE, logical.as_str());
            if !stack.contains(&certificate) {
                stack.declare(
                    Resource::at(certificate.clone())
                        .with_attr("url", &issuer.url)
                        .depends_on_references(),
                )?;
            }
            Attr::list([certificate.attr(THUMBPRINT_ATTRIBUTE)])
        } else {
            Attr::list(opts.thumbprints.iter())
        };

        let address = stack.declare(
            Resource::managed(resource_types::OIDC_PROVIDER, logical.as_str())
                .with_attr("url", &issuer.url)
                .with_attr("client_id_list", Attr::list(opts.audiences.iter()))
                .with_attr("thumbprint_list", thumbprints)
                .with_opt_attr("tags", (!opts.tags.is_empty()).then_some(&opts.tags))
                .with_provider(aws_provider)
                .depends_on_references(),
        )?;

        info!(
            provider = %address,
            issuer = %issuer.url.render(),
            "Registered federation provider"
        );

        let provider = FederationProvider {
            address,
            issuer,
            audiences: opts.audiences.clone(),
            thumbprints: opts.thumbprints.clone(),
            identity_config: None,
        };
        self.providers.insert(key, provider.clone());
        Ok(provider)
    }

    /// Register the provider for a cluster's issuer, named
    /// `<cluster>-oidc-provider`, plus the optional cluster-side config.
    pub fn ensure_for_cluster(
        &mut self,
        stack: &mut Stack,
        cluster: &Cluster,
        opts: &ProviderOptions,
    ) -> Result<FederationProvider, GraphError> {
        let key = Self::key(opts.aws_provider.as_deref(), cluster.issuer_url());
        if let Some(existing) = self.reuse(&key, opts) {
            return Ok(existing);
        }

        let name = format!("{}-oidc-provider", cluster.name);
        let mut provider = self.ensure(stack, &name, cluster.issuer_url().clone(), opts)?;

        if let Some(config_name) = &opts.cluster_identity_config {
            let oidc = Attr::map([
                ("client_id", Attr::from(opts.audience())),
                ("identity_provider_config_name", Attr::from(config_name)),
                ("issuer_url", Attr::from(cluster.issuer_url())),
            ]);
            let config = stack.declare(
                Resource::managed(
                    resource_types::EKS_IDENTITY_PROVIDER_CONFIG,
                    logical_name([cluster.name.as_str(), config_name.as_str()]),
                )
                .with_attr("cluster_name", &cluster.name)
                .with_attr("oidc", oidc)
                .with_opt_attr("tags", (!opts.tags.is_empty()).then_some(&opts.tags))
                .with_provider(opts.aws_provider.as_deref())
                .depends_on(cluster.address())
                .depends_on_references(),
            )?;

            provider.identity_config = Some(config);
            self.providers.insert(key, provider.clone());
        }

        Ok(provider)
    }
}
