//! Trust Policy Builder
//!
//! Generates the document attached to a federated role: which provider may
//! call `sts:AssumeRoleWithWebIdentity` and which token claims it must
//! present. Output is a pure function of the inputs, so regenerating a
//! binding yields a byte-identical document.

use serde::Serialize;
use std::collections::BTreeMap;

use super::issuer::ResolvedIssuer;
use crate::graph::{Attr, Deferred, Expr};

/// Policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// Action granted by every trust statement
pub const ASSUME_ROLE_ACTION: &str = "sts:AssumeRoleWithWebIdentity";

/// How a condition compares a claim against its expected value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConditionOperator {
    /// The claim equals the value
    ExactMatch,
    /// The claim matches a wildcard pattern
    PrefixMatch,
    /// Every value of a multi-valued claim equals the value
    AllValuesExactMatch,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::ExactMatch => "StringEquals",
            ConditionOperator::PrefixMatch => "StringLike",
            ConditionOperator::AllValuesExactMatch => "ForAllValues:StringEquals",
        }
    }
}

impl std::fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One claim check, e.g. `StringEquals { "<host>:aud": "sts.amazonaws.com" }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub operator: ConditionOperator,
    pub key: Expr,
    pub value: Expr,
}

/// Which workload identity a role trusts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectBinding {
    /// A single Kubernetes service account
    Exact {
        namespace: String,
        service_account: String,
    },
    /// Any ref of a repository, e.g. `repo:Org/Repo:*`
    Pattern {
        owner: String,
        repository: String,
        suffix: String,
    },
}

impl SubjectBinding {
    pub fn service_account(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        SubjectBinding::Exact {
            namespace: namespace.into(),
            service_account: name.into(),
        }
    }

    /// Every ref of `owner/repository`
    pub fn repository(owner: impl Into<String>, repository: impl Into<String>) -> Self {
        SubjectBinding::Pattern {
            owner: owner.into(),
            repository: repository.into(),
            suffix: "*".to_string(),
        }
    }

    /// `sub` claim value, exact or wildcard
    pub fn subject(&self) -> String {
        match self {
            SubjectBinding::Exact {
                namespace,
                service_account,
            } => format!("system:serviceaccount:{}:{}", namespace, service_account),
            SubjectBinding::Pattern {
                owner,
                repository,
                suffix,
            } => format!("repo:{}/{}:{}", owner, repository, suffix),
        }
    }
}

/// A single federation trust statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStatement {
    pub action: String,
    pub federated_principal: Expr,
    pub conditions: Vec<Condition>,
}

impl TrustStatement {
    fn to_attr(&self) -> Attr {
        let mut grouped: BTreeMap<ConditionOperator, BTreeMap<Expr, Attr>> = BTreeMap::new();
        for condition in &self.conditions {
            grouped
                .entry(condition.operator)
                .or_default()
                .insert(condition.key.clone(), Attr::from(&condition.value));
        }

        Attr::map([
            ("Effect", Attr::from("Allow")),
            ("Action", Attr::from(self.action.as_str())),
            (
                "Principal",
                Attr::map([("Federated", Attr::from(&self.federated_principal))]),
            ),
            (
                "Condition",
                Attr::map(
                    grouped
                        .into_iter()
                        .map(|(op, entries)| (op.as_str(), Attr::Map(entries))),
                ),
            ),
        ])
    }
}

/// Trust policy document attached to a federated role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustPolicyDocument {
    pub version: String,
    pub statements: Vec<TrustStatement>,
}

impl TrustPolicyDocument {
    fn tree(&self) -> Attr {
        Attr::map([
            ("Version", Attr::from(self.version.as_str())),
            (
                "Statement",
                Attr::list(self.statements.iter().map(TrustStatement::to_attr)),
            ),
        ])
    }

    /// JSON-encoded attribute value for a role's `assume_role_policy`
    pub fn to_attr(&self) -> Attr {
        Attr::encoded(self.tree())
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.tree().to_json()
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    /// Expected value for `key` under `operator`, across all statements
    pub fn condition(&self, operator: ConditionOperator, key: &Expr) -> Option<&Expr> {
        self.statements
            .iter()
            .flat_map(|s| s.conditions.iter())
            .find(|c| c.operator == operator && &c.key == key)
            .map(|c| &c.value)
    }

    /// Deferred handles the document embeds
    pub fn references(&self) -> Vec<&Deferred> {
        self.statements
            .iter()
            .flat_map(|s| {
                s.federated_principal
                    .references()
                    .into_iter()
                    .chain(s.conditions.iter().flat_map(|c| {
                        c.key.references().into_iter().chain(c.value.references())
                    }))
            })
            .collect()
    }
}

impl Serialize for TrustPolicyDocument {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Builds trust documents for one issuer and audience
#[derive(Debug, Clone)]
pub struct TrustPolicyBuilder {
    issuer: ResolvedIssuer,
    audience: String,
}

impl TrustPolicyBuilder {
    pub fn new(issuer: ResolvedIssuer, audience: impl Into<String>) -> Self {
        Self {
            issuer,
            audience: audience.into(),
        }
    }

    pub fn issuer(&self) -> &ResolvedIssuer {
        &self.issuer
    }

    /// Single-statement document trusting `provider_arn` for `subject`.
    ///
    /// Exact subjects pin `sub` and `aud` with `StringEquals`. Pattern
    /// subjects match `sub` with `StringLike` and require every `aud` and
    /// `iss` value in the token to match.
    pub fn build(&self, provider_arn: impl Into<Expr>, subject: &SubjectBinding) -> TrustPolicyDocument {
        let sub_key = self.issuer.claim_key("sub");
        let aud_key = self.issuer.claim_key("aud");
        let audience = Expr::literal(self.audience.as_str());
        let sub_value = Expr::literal(subject.subject());

        let conditions = match subject {
            SubjectBinding::Exact { .. } => vec![
                Condition {
                    operator: ConditionOperator::ExactMatch,
                    key: aud_key,
                    value: audience,
                },
                Condition {
                    operator: ConditionOperator::ExactMatch,
                    key: sub_key,
                    value: sub_value,
                },
            ],
            SubjectBinding::Pattern { .. } => vec![
                Condition {
                    operator: ConditionOperator::PrefixMatch,
                    key: sub_key,
                    value: sub_value,
                },
                Condition {
                    operator: ConditionOperator::AllValuesExactMatch,
                    key: aud_key,
                    value: audience,
                },
                Condition {
                    operator: ConditionOperator::AllValuesExactMatch,
                    key: self.issuer.claim_key("iss"),
                    value: self.issuer.issuer_claim(),
                },
            ],
        };

        TrustPolicyDocument {
            version: POLICY_VERSION.to_string(),
            statements: vec![TrustStatement {
                action: ASSUME_ROLE_ACTION.to_string(),
                federated_principal: provider_arn.into(),
                conditions,
            }],
        }
    }
}
