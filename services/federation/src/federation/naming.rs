//! Name Budgeting
//!
//! IAM role and policy names are capped at 128 characters. Names are built
//! by joining components with `-` and cutting the result from the left, so
//! the most significant components survive.
//!
//! The cut is a raw character cut with no awareness of component
//! boundaries. Two long inputs sharing their first 128 characters produce
//! the same name; such collisions are neither detected nor reported.

/// Hard ceiling on generated IAM names
pub const MAX_NAME_LENGTH: usize = 128;

/// Separator placed between name components
pub const NAME_SEPARATOR: &str = "-";

/// Deterministic, length-capped name builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameBudgeter {
    limit: usize,
}

impl NameBudgeter {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Join components and keep at most `limit` characters from the start
    pub fn name<I, S>(&self, components: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = join(components);
        truncate(&joined, self.limit)
    }
}

impl Default for NameBudgeter {
    fn default() -> Self {
        Self::new(MAX_NAME_LENGTH)
    }
}

fn join<I, S>(components: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    components
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(NAME_SEPARATOR)
}

fn truncate(name: &str, limit: usize) -> String {
    name.chars().take(limit).collect()
}

/// `<cluster>-<workload>-role`, capped
pub fn role_name(cluster: &str, workload: &str) -> String {
    NameBudgeter::default().name([cluster, workload, "role"])
}

/// `<cluster>-<workload>-policy`, capped
pub fn policy_name(cluster: &str, workload: &str) -> String {
    NameBudgeter::default().name([cluster, workload, "policy"])
}

/// Identifier for a graph node. Characters the substrate does not accept
/// in addresses are replaced with `-`.
pub fn logical_name<I, S>(components: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    join(components)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
