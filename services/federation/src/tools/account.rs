//! Account Identity
//!
//! Provider ARNs embed the account id. It is either known up front or read
//! from the caller identity at apply time, in which case it stays deferred.

use tracing::debug;

use crate::federation::resource_types;
use crate::graph::{Expr, GraphError, Resource, ResourceAddress, Stack};

/// Resolves the account id used in provider ARNs
pub trait AccountResolver: Send + Sync {
    /// Account id, declaring any lookup it needs into `stack`
    fn account_id(&self, stack: &mut Stack, aws_provider: Option<&str>) -> Result<Expr, GraphError>;
}

/// Reads the account from `data.aws_caller_identity`, declared once per
/// provider alias
#[derive(Debug, Clone, Copy, Default)]
pub struct CallerIdentityLookup;

impl CallerIdentityLookup {
    /// Data source address used for an alias. Aliased lookups are prefixed
    /// so no alias can land on the unaliased `current` read.
    pub fn address(aws_provider: Option<&str>) -> ResourceAddress {
        let name = aws_provider
            .map(|alias| format!("alias_{}", alias.replace('.', "_")))
            .unwrap_or_else(|| "current".to_string());
        ResourceAddress::data(resource_types::CALLER_IDENTITY, name)
    }
}

impl AccountResolver for CallerIdentityLookup {
    fn account_id(&self, stack: &mut Stack, aws_provider: Option<&str>) -> Result<Expr, GraphError> {
        let address = Self::address(aws_provider);
        if !stack.contains(&address) {
            debug!(address = %address, "Declaring caller identity lookup");
            stack.declare(Resource::at(address.clone()).with_provider(aws_provider))?;
        }
        Ok(Expr::Ref(address.attr("account_id")))
    }
}

/// A fixed, known account id
#[derive(Debug, Clone)]
pub struct StaticAccount(pub String);

impl AccountResolver for StaticAccount {
    fn account_id(&self, _stack: &mut Stack, _aws_provider: Option<&str>) -> Result<Expr, GraphError> {
        Ok(Expr::literal(self.0.as_str()))
    }
}
