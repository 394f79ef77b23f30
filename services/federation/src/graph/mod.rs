//! Provisioning Graph
//!
//! Models the provisioning substrate this crate hands its work to: entities
//! are declared into a [`Stack`] together with explicit dependency edges, and
//! the stack is synthesized into a [`Plan`]. Nothing here talks to a cloud
//! API; attributes of declared entities are only available as deferred
//! handles that the substrate resolves at apply time.
//!
//! ## Ordering contract
//!
//! The substrate only guarantees ordering through explicit `depends_on`
//! edges. Any entity that reads an attribute of another entity must list it
//! directly, otherwise it may be realized against an unpopulated attribute.
//! [`Stack::violations`] reports every reference without a matching edge and
//! [`Stack::synthesize`] refuses to emit a plan while any exist.

mod types;

pub use types::*;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// A named plan output
#[derive(Debug, Clone)]
pub struct Output {
    pub value: Expr,
    pub description: Option<String>,
}

/// Declared entities, their explicit dependency edges and outputs
#[derive(Debug, Default)]
pub struct Stack {
    name: String,
    resources: Vec<Resource>,
    index: HashMap<ResourceAddress, usize>,
    outputs: BTreeMap<String, Output>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare an entity. Addresses are unique within a stack.
    pub fn declare(&mut self, resource: Resource) -> Result<ResourceAddress, GraphError> {
        let address = resource.address().clone();
        if self.index.contains_key(&address) {
            return Err(GraphError::DuplicateResource(address.to_string()));
        }

        debug!(
            address = %address,
            depends_on = resource.dependencies().len(),
            "Declared resource"
        );

        self.index.insert(address.clone(), self.resources.len());
        self.resources.push(resource);
        Ok(address)
    }

    /// Declare a named output
    pub fn output(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Expr>,
        description: Option<&str>,
    ) -> Result<(), GraphError> {
        let name = name.into();
        if self.outputs.contains_key(&name) {
            return Err(GraphError::DuplicateOutput(name));
        }
        self.outputs.insert(
            name,
            Output {
                value: value.into(),
                description: description.map(str::to_string),
            },
        );
        Ok(())
    }

    pub fn contains(&self, address: &ResourceAddress) -> bool {
        self.index.contains_key(address)
    }

    pub fn get(&self, address: &ResourceAddress) -> Option<&Resource> {
        self.index.get(address).map(|&i| &self.resources[i])
    }

    /// Declared entities in declaration order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Every graph-shape defect, in declaration order
    pub fn violations(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        for resource in &self.resources {
            for dependency in resource.dependencies() {
                if !self.contains(dependency) {
                    violations.push(Violation::UnknownDependency {
                        resource: resource.address().clone(),
                        dependency: dependency.clone(),
                    });
                }
            }

            for referenced in resource.referenced_addresses() {
                if !self.contains(&referenced) {
                    violations.push(Violation::UnknownReference {
                        resource: resource.address().to_string(),
                        referenced,
                    });
                } else if !resource.dependencies().contains(&referenced) {
                    violations.push(Violation::MissingDependencyEdge {
                        resource: resource.address().clone(),
                        referenced,
                    });
                }
            }
        }

        for (name, output) in &self.outputs {
            for d in output.value.references() {
                if !self.contains(d.address()) {
                    violations.push(Violation::UnknownReference {
                        resource: format!("output.{}", name),
                        referenced: d.address().clone(),
                    });
                }
            }
        }

        violations
    }

    /// Topological order over explicit edges.
    ///
    /// Among entities whose dependencies are all placed, the earliest
    /// declared goes first, so the order is stable across runs.
    pub fn apply_order(&self) -> Result<Vec<ResourceAddress>, GraphError> {
        let mut placed = vec![false; self.resources.len()];
        let mut order = Vec::with_capacity(self.resources.len());

        while order.len() < self.resources.len() {
            let next = self.resources.iter().enumerate().find(|(i, r)| {
                !placed[*i]
                    && r.dependencies().iter().all(|d| match self.index.get(d) {
                        Some(&j) => placed[j],
                        None => true,
                    })
            });

            match next {
                Some((i, r)) => {
                    placed[i] = true;
                    order.push(r.address().clone());
                }
                None => {
                    let stuck = self
                        .resources
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| !placed[*i])
                        .map(|(_, r)| r.address().to_string())
                        .collect();
                    return Err(GraphError::DependencyCycle(stuck));
                }
            }
        }

        Ok(order)
    }

    /// Validate the graph and emit the provisioning plan
    pub fn synthesize(&self) -> Result<Plan, GraphError> {
        let violations = self.violations();
        if !violations.is_empty() {
            return Err(GraphError::InvalidGraph(violations));
        }

        let order = self.apply_order()?;

        let mut managed: BTreeMap<String, BTreeMap<String, serde_json::Value>> = BTreeMap::new();
        let mut data: BTreeMap<String, BTreeMap<String, serde_json::Value>> = BTreeMap::new();

        for resource in &self.resources {
            let address = resource.address();
            let block = match address.mode {
                Mode::Managed => &mut managed,
                Mode::Data => &mut data,
            };
            block
                .entry(address.resource_type.clone())
                .or_default()
                .insert(address.name.clone(), resource.to_json());
        }

        let mut manifest = serde_json::Map::new();
        if !data.is_empty() {
            manifest.insert("data".to_string(), serde_json::json!(data));
        }
        if !self.outputs.is_empty() {
            let outputs: serde_json::Map<String, serde_json::Value> = self
                .outputs
                .iter()
                .map(|(name, output)| {
                    let mut body = serde_json::json!({ "value": output.value.render() });
                    if let Some(description) = &output.description {
                        body["description"] = serde_json::json!(description);
                    }
                    (name.clone(), body)
                })
                .collect();
            manifest.insert("output".to_string(), serde_json::Value::Object(outputs));
        }
        if !managed.is_empty() {
            manifest.insert("resource".to_string(), serde_json::json!(managed));
        }

        info!(
            stack = %self.name,
            resources = self.resources.len(),
            outputs = self.outputs.len(),
            "Synthesized provisioning plan"
        );

        Ok(Plan {
            stack: self.name.clone(),
            apply_order: order,
            manifest: serde_json::Value::Object(manifest),
        })
    }
}

/// Synthesized provisioning plan
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub stack: String,
    /// Realization order honoring every explicit edge
    pub apply_order: Vec<ResourceAddress>,
    /// Substrate manifest (`resource`, `data` and `output` blocks)
    pub manifest: serde_json::Value,
}

impl Plan {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Position of an address in the apply order
    pub fn position(&self, address: &ResourceAddress) -> Option<usize> {
        self.apply_order.iter().position(|a| a == address)
    }
}
