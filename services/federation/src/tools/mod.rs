//! Collaborators the binders call through narrow interfaces: the permission
//! document source and the account identity resolver.

pub mod account;
pub mod policy_loader;

pub use account::{AccountResolver, CallerIdentityLookup, StaticAccount};
pub use policy_loader::{FsPolicyLoader, InMemoryPolicyLoader, PolicyDocumentLoader};
