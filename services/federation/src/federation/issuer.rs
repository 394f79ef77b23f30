//! Issuer Resolution
//!
//! Normalizes a cluster's OIDC issuer URL into the forms trust policies
//! need: the canonical URL (provider registration, `iss` claims) and the
//! scheme-less host used as the condition-key prefix.

use crate::graph::Expr;

/// Scheme removed from issuer URLs to form condition keys
pub const ISSUER_SCHEME: &str = "https://";

/// Canonical issuer URL. Issuers are already canonical; this is the seam
/// where URL validation would go.
pub fn canonical(url: &Expr) -> Expr {
    url.clone()
}

/// Issuer without its `https://` scheme.
///
/// Input without the scheme comes back unchanged, so already stripped
/// hosts can be passed through again.
pub fn host_only(url: &Expr) -> Expr {
    url.strip_prefix(ISSUER_SCHEME)
}

/// Both issuer forms, derived once and shared by provider registration and
/// every trust policy that points at that provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIssuer {
    pub url: Expr,
    pub host: Expr,
}

impl ResolvedIssuer {
    pub fn resolve(url: impl Into<Expr>) -> Self {
        let url = canonical(&url.into());
        let host = host_only(&url);
        Self { url, host }
    }

    /// Condition key for a token claim, e.g. `<host>:sub`
    pub fn claim_key(&self, claim: &str) -> Expr {
        Expr::concat([self.host.clone(), Expr::literal(format!(":{}", claim))])
    }

    /// Issuer URL as carried in the token's `iss` claim
    pub fn issuer_claim(&self) -> Expr {
        Expr::concat([Expr::literal(ISSUER_SCHEME), self.host.clone()])
    }

    /// ARN of this issuer's federation provider within an account
    pub fn provider_arn(&self, account_id: &Expr) -> Expr {
        Expr::concat([
            Expr::literal("arn:aws:iam::"),
            account_id.clone(),
            Expr::literal(":oidc-provider/"),
            self.host.clone(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ResourceAddress;

    const ISSUERS: &[&str] = &[
        "https://oidc.eks.us-east-1.amazonaws.com/id/ABC",
        "https://token.actions.githubusercontent.com",
        "https://",
        "https://https://double.example",
        "https://oidc.eks.eu-west-1.amazonaws.com/id/0123456789ABCDEF",
    ];

    #[test]
    fn test_host_only_strips_scheme() {
        let host = host_only(&Expr::literal("https://oidc.eks.us-east-1.amazonaws.com/id/ABC"));
        assert_eq!(host, Expr::literal("oidc.eks.us-east-1.amazonaws.com/id/ABC"));
    }

    #[test]
    fn test_host_only_is_idempotent() {
        for issuer in ISSUERS {
            let once = host_only(&Expr::literal(*issuer));
            let twice = host_only(&once);
            assert_eq!(once, twice, "not idempotent for {}", issuer);
            assert!(issuer.ends_with(once.render().as_str()));
        }
    }

    #[test]
    fn test_host_only_without_scheme_is_unchanged() {
        let input = Expr::literal("oidc.example/id/1");
        assert_eq!(host_only(&input), input);
    }

    #[test]
    fn test_canonical_is_identity() {
        let url = Expr::literal("https://oidc.example/id/1");
        assert_eq!(canonical(&url), url);
    }

    #[test]
    fn test_deferred_issuer_is_stripped_at_realization() {
        let cluster = ResourceAddress::data("aws_eks_cluster", "prod");
        let deferred = Expr::Ref(
            cluster
                .attr("identity[0].oidc[0].issuer")
                .with_resolved("https://oidc.example/id/1"),
        );

        let resolved = ResolvedIssuer::resolve(deferred);
        assert_eq!(host_only(&resolved.host), resolved.host);
        assert_eq!(resolved.host.resolved().as_deref(), Some("oidc.example/id/1"));
        assert_eq!(
            resolved.claim_key("sub").resolved().as_deref(),
            Some("oidc.example/id/1:sub")
        );
    }

    #[test]
    fn test_provider_arn() {
        let issuer = ResolvedIssuer::resolve("https://oidc.example/id/1");
        let arn = issuer.provider_arn(&Expr::literal("123456789012"));
        assert_eq!(arn.render(), "arn:aws:iam::123456789012:oidc-provider/oidc.example/id/1");
        assert_eq!(issuer.issuer_claim().render(), "https://oidc.example/id/1");
    }
}
