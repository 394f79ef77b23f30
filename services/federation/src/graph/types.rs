//! Graph Types
//!
//! Addresses, deferred attribute references, expressions and attribute
//! values for resources declared into a provisioning plan.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Whether an address names a managed resource or a read-only data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Managed,
    Data,
}

/// Address of a declared entity, e.g. `aws_iam_role.external-dns-role`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceAddress {
    pub mode: Mode,
    pub resource_type: String,
    pub name: String,
}

impl ResourceAddress {
    /// Address of a managed resource
    pub fn managed(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: Mode::Managed,
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Address of a data source
    pub fn data(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: Mode::Data,
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Handle to one attribute of this entity
    pub fn attr(&self, attribute: impl Into<String>) -> Deferred {
        Deferred::new(self.clone(), attribute)
    }
}

impl std::fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mode {
            Mode::Managed => write!(f, "{}.{}", self.resource_type, self.name),
            Mode::Data => write!(f, "data.{}.{}", self.resource_type, self.name),
        }
    }
}

impl FromStr for ResourceAddress {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            ["data", ty, name] if !ty.is_empty() && !name.is_empty() => {
                Ok(Self::data(*ty, *name))
            }
            [ty, name] if !ty.is_empty() && !name.is_empty() && *ty != "data" => {
                Ok(Self::managed(*ty, *name))
            }
            _ => Err(GraphError::InvalidAddress(s.to_string())),
        }
    }
}

impl Serialize for ResourceAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Symbolic reference to an attribute that only exists once the
/// provisioning substrate realizes the owning entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeRef {
    pub address: ResourceAddress,
    pub attribute: String,
}

impl std::fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.address, self.attribute)
    }
}

/// A lazily resolved value: a handle plus an optional realized value.
///
/// Equality, ordering and hashing look at the handle only, so two
/// references to `aws_iam_role.x.arn` compare equal whether or not one of
/// them has been resolved.
#[derive(Debug, Clone)]
pub struct Deferred {
    handle: AttributeRef,
    resolved: Option<String>,
}

impl Deferred {
    pub fn new(address: ResourceAddress, attribute: impl Into<String>) -> Self {
        Self {
            handle: AttributeRef {
                address,
                attribute: attribute.into(),
            },
            resolved: None,
        }
    }

    /// Attach the value the substrate realized for this handle
    pub fn with_resolved(mut self, value: impl Into<String>) -> Self {
        self.resolved = Some(value.into());
        self
    }

    pub fn handle(&self) -> &AttributeRef {
        &self.handle
    }

    pub fn address(&self) -> &ResourceAddress {
        &self.handle.address
    }

    pub fn resolved(&self) -> Option<&str> {
        self.resolved.as_deref()
    }
}

impl PartialEq for Deferred {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Deferred {}

impl Hash for Deferred {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl PartialOrd for Deferred {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Deferred {
    fn cmp(&self, other: &Self) -> Ordering {
        self.handle.cmp(&other.handle)
    }
}

/// A string-valued expression that may embed deferred references
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expr {
    Literal(String),
    Ref(Deferred),
    /// `inner` with every leading `prefix` removed, evaluated by the substrate
    StripPrefix { inner: Box<Expr>, prefix: String },
    Concat(Vec<Expr>),
}

impl Expr {
    pub fn literal(value: impl Into<String>) -> Self {
        Expr::Literal(value.into())
    }

    /// Concatenate parts, flattening nested concatenations and merging
    /// adjacent literals so equal strings have one representation.
    pub fn concat(parts: impl IntoIterator<Item = Expr>) -> Self {
        let mut merged: Vec<Expr> = Vec::new();
        for part in parts {
            let pieces = match part {
                Expr::Concat(inner) => inner,
                other => vec![other],
            };
            for piece in pieces {
                if let Expr::Literal(s) = &piece {
                    if s.is_empty() {
                        continue;
                    }
                    if let Some(Expr::Literal(prev)) = merged.last_mut() {
                        prev.push_str(s);
                        continue;
                    }
                }
                merged.push(piece);
            }
        }

        match merged.len() {
            0 => Expr::Literal(String::new()),
            1 => merged.remove(0),
            _ => Expr::Concat(merged),
        }
    }

    /// Remove every leading occurrence of `prefix`.
    ///
    /// Literals are stripped eagerly. Deferred values are wrapped so the
    /// substrate strips them at realization; wrapping an already stripped
    /// expression is a no-op.
    pub fn strip_prefix(&self, prefix: &str) -> Expr {
        match self {
            Expr::Literal(s) => Expr::Literal(s.trim_start_matches(prefix).to_string()),
            Expr::StripPrefix { prefix: p, .. } if p == prefix => self.clone(),
            Expr::Concat(parts) => match parts.split_first() {
                Some((Expr::Literal(head), rest)) => {
                    let stripped = head.trim_start_matches(prefix);
                    if stripped.is_empty() {
                        Expr::StripPrefix {
                            inner: Box::new(self.clone()),
                            prefix: prefix.to_string(),
                        }
                    } else {
                        Expr::concat(
                            std::iter::once(Expr::literal(stripped)).chain(rest.iter().cloned()),
                        )
                    }
                }
                _ => Expr::StripPrefix {
                    inner: Box::new(self.clone()),
                    prefix: prefix.to_string(),
                },
            },
            Expr::Ref(_) | Expr::StripPrefix { .. } => Expr::StripPrefix {
                inner: Box::new(self.clone()),
                prefix: prefix.to_string(),
            },
        }
    }

    /// Render in the substrate's interpolation syntax
    pub fn render(&self) -> String {
        match self {
            Expr::Literal(s) => s.clone(),
            Expr::Ref(d) => format!("${{{}}}", d.handle()),
            Expr::StripPrefix { .. } => format!("${{{}}}", self.render_inner()),
            Expr::Concat(parts) => parts.iter().map(Expr::render).collect(),
        }
    }

    fn render_inner(&self) -> String {
        match self {
            Expr::Literal(s) => quote(s),
            Expr::Ref(d) => d.handle().to_string(),
            Expr::StripPrefix { inner, prefix } => {
                format!("replace({}, {}, \"\")", inner.render_inner(), quote(prefix))
            }
            Expr::Concat(_) => quote(&self.render()),
        }
    }

    /// Concrete value, available once every embedded handle is resolved
    pub fn resolved(&self) -> Option<String> {
        match self {
            Expr::Literal(s) => Some(s.clone()),
            Expr::Ref(d) => d.resolved().map(str::to_string),
            Expr::StripPrefix { inner, prefix } => inner
                .resolved()
                .map(|v| v.trim_start_matches(prefix.as_str()).to_string()),
            Expr::Concat(parts) => parts.iter().map(Expr::resolved).collect(),
        }
    }

    /// Deferred handles embedded in this expression, in order of appearance
    pub fn references(&self) -> Vec<&Deferred> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a Deferred>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Ref(d) => out.push(d),
            Expr::StripPrefix { inner, .. } => inner.collect_refs(out),
            Expr::Concat(parts) => parts.iter().for_each(|p| p.collect_refs(out)),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal(_))
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Literal(value.to_string())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(value)
    }
}

impl From<&String> for Expr {
    fn from(value: &String) -> Self {
        Expr::Literal(value.clone())
    }
}

impl From<Deferred> for Expr {
    fn from(value: Deferred) -> Self {
        Expr::Ref(value)
    }
}

/// Attribute value of a declared entity
#[derive(Debug, Clone, PartialEq)]
pub enum Attr {
    Expr(Expr),
    Bool(bool),
    Number(i64),
    List(Vec<Attr>),
    Map(BTreeMap<Expr, Attr>),
    /// Nested document emitted as a JSON-encoded string
    Encoded(Box<Attr>),
}

impl Attr {
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Expr>,
        V: Into<Attr>,
    {
        Attr::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn list<V: Into<Attr>>(items: impl IntoIterator<Item = V>) -> Self {
        Attr::List(items.into_iter().map(Into::into).collect())
    }

    pub fn encoded(inner: Attr) -> Self {
        Attr::Encoded(Box::new(inner))
    }

    /// Render to the plan's JSON representation
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Attr::Expr(e) => Value::String(e.render()),
            Attr::Bool(b) => Value::Bool(*b),
            Attr::Number(n) => Value::from(*n),
            Attr::List(items) => Value::Array(items.iter().map(Attr::to_json).collect()),
            Attr::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.render(), v.to_json()))
                    .collect(),
            ),
            Attr::Encoded(inner) => Value::String(inner.to_json().to_string()),
        }
    }

    /// Deferred handles embedded anywhere in this value, keys included
    pub fn references(&self) -> Vec<&Deferred> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a Deferred>) {
        match self {
            Attr::Expr(e) => e.collect_refs(out),
            Attr::Bool(_) | Attr::Number(_) => {}
            Attr::List(items) => items.iter().for_each(|i| i.collect_refs(out)),
            Attr::Map(entries) => {
                for (k, v) in entries {
                    k.collect_refs(out);
                    v.collect_refs(out);
                }
            }
            Attr::Encoded(inner) => inner.collect_refs(out),
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Attr::Expr(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Expr> for Attr {
    fn from(value: Expr) -> Self {
        Attr::Expr(value)
    }
}

impl From<&Expr> for Attr {
    fn from(value: &Expr) -> Self {
        Attr::Expr(value.clone())
    }
}

impl From<Deferred> for Attr {
    fn from(value: Deferred) -> Self {
        Attr::Expr(Expr::Ref(value))
    }
}

impl From<&str> for Attr {
    fn from(value: &str) -> Self {
        Attr::Expr(value.into())
    }
}

impl From<String> for Attr {
    fn from(value: String) -> Self {
        Attr::Expr(value.into())
    }
}

impl From<&String> for Attr {
    fn from(value: &String) -> Self {
        Attr::Expr(value.into())
    }
}

impl From<bool> for Attr {
    fn from(value: bool) -> Self {
        Attr::Bool(value)
    }
}

impl From<i64> for Attr {
    fn from(value: i64) -> Self {
        Attr::Number(value)
    }
}

impl From<&BTreeMap<String, String>> for Attr {
    fn from(value: &BTreeMap<String, String>) -> Self {
        Attr::map(value.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

impl From<&BTreeMap<String, Expr>> for Attr {
    fn from(value: &BTreeMap<String, Expr>) -> Self {
        Attr::map(value.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

/// A resource or data source declared into a stack
#[derive(Debug, Clone)]
pub struct Resource {
    address: ResourceAddress,
    provider: Option<String>,
    attributes: BTreeMap<String, Attr>,
    depends_on: Vec<ResourceAddress>,
}

impl Resource {
    pub fn managed(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::at(ResourceAddress::managed(resource_type, name))
    }

    pub fn data(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::at(ResourceAddress::data(resource_type, name))
    }

    pub fn at(address: ResourceAddress) -> Self {
        Self {
            address,
            provider: None,
            attributes: BTreeMap::new(),
            depends_on: Vec::new(),
        }
    }

    /// Set an attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Attr>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set an attribute only when a value is present
    pub fn with_opt_attr<V: Into<Attr>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with_attr(key, v),
            None => self,
        }
    }

    /// Route this entity through an aliased substrate provider
    pub fn with_provider(mut self, provider: Option<&str>) -> Self {
        self.provider = provider.map(str::to_string);
        self
    }

    /// Add explicit ordering edges. Duplicates are ignored.
    pub fn depends_on<'a>(mut self, addresses: impl IntoIterator<Item = &'a ResourceAddress>) -> Self {
        for address in addresses {
            if *address != self.address && !self.depends_on.contains(address) {
                self.depends_on.push(address.clone());
            }
        }
        self
    }

    /// Add an explicit edge for every entity this one reads an attribute of
    pub fn depends_on_references(self) -> Self {
        let referenced = self.referenced_addresses();
        self.depends_on(referenced.iter())
    }

    /// Addresses of every entity whose attributes this one reads
    pub fn referenced_addresses(&self) -> Vec<ResourceAddress> {
        let mut out: Vec<ResourceAddress> = Vec::new();
        for attr in self.attributes.values() {
            for d in attr.references() {
                if *d.address() != self.address && !out.contains(d.address()) {
                    out.push(d.address().clone());
                }
            }
        }
        out
    }

    pub fn address(&self) -> &ResourceAddress {
        &self.address
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&Attr> {
        self.attributes.get(key)
    }

    pub fn dependencies(&self) -> &[ResourceAddress] {
        &self.depends_on
    }

    /// Handle to one of this entity's attributes
    pub fn attr(&self, attribute: impl Into<String>) -> Deferred {
        self.address.attr(attribute)
    }

    /// Render to the plan's JSON representation
    pub fn to_json(&self) -> serde_json::Value {
        let mut body: serde_json::Map<String, serde_json::Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();

        if let Some(provider) = &self.provider {
            body.insert("provider".to_string(), provider.clone().into());
        }
        if !self.depends_on.is_empty() {
            body.insert(
                "depends_on".to_string(),
                self.depends_on
                    .iter()
                    .map(|a| serde_json::Value::String(a.to_string()))
                    .collect(),
            );
        }

        serde_json::Value::Object(body)
    }
}

/// A graph-shape defect found before synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// `resource` reads an attribute of `referenced` without an explicit edge
    MissingDependencyEdge {
        resource: ResourceAddress,
        referenced: ResourceAddress,
    },
    /// `resource` is ordered after an address nothing declared
    UnknownDependency {
        resource: ResourceAddress,
        dependency: ResourceAddress,
    },
    /// `resource` (or an output) reads an attribute of an undeclared address
    UnknownReference {
        resource: String,
        referenced: ResourceAddress,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::MissingDependencyEdge {
                resource,
                referenced,
            } => write!(
                f,
                "{} reads an attribute of {} but does not depend on it",
                resource, referenced
            ),
            Violation::UnknownDependency {
                resource,
                dependency,
            } => write!(f, "{} depends on undeclared {}", resource, dependency),
            Violation::UnknownReference {
                resource,
                referenced,
            } => write!(f, "{} references undeclared {}", resource, referenced),
        }
    }
}

/// Errors raised while building or synthesizing a stack
#[derive(Debug, Error)]
pub enum GraphError {
    /// An entity with this address was already declared
    #[error("Resource already declared: {0}")]
    DuplicateResource(String),

    /// An output with this name was already declared
    #[error("Output already declared: {0}")]
    DuplicateOutput(String),

    /// Address string could not be parsed
    #[error("Invalid resource address: {0}")]
    InvalidAddress(String),

    /// Explicit dependency edges form a cycle
    #[error("Dependency cycle between: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// One or more graph-shape defects
    #[error("Invalid dependency graph ({} violation(s)): {}", .0.len(), .0.first().map(|v| v.to_string()).unwrap_or_default())]
    InvalidGraph(Vec<Violation>),
}
