//! Permission Document Loading
//!
//! Permission policies are authored as JSON files next to the stack
//! definition. The loader is the seam between the binder and the
//! filesystem; a missing document is a configuration error that aborts
//! graph construction.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::federation::FederationError;

/// Source of permission policy documents
pub trait PolicyDocumentLoader: Send + Sync {
    /// Read `<location>/<file_name>` as text
    fn load(&self, location: &Path, file_name: &str) -> Result<String, FederationError>;
}

/// Reads documents from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FsPolicyLoader {
    root: Option<PathBuf>,
}

impl FsPolicyLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative locations against `root` instead of the working directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn resolve(&self, location: &Path, file_name: &str) -> PathBuf {
        let path = location.join(file_name);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        }
    }
}

impl PolicyDocumentLoader for FsPolicyLoader {
    fn load(&self, location: &Path, file_name: &str) -> Result<String, FederationError> {
        let path = self.resolve(location, file_name);
        debug!(path = %path.display(), "Loading permission policy document");

        std::fs::read_to_string(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => FederationError::PolicyDocumentNotFound(path),
            _ => FederationError::PolicyDocumentUnreadable { path, source },
        })
    }
}

/// Documents held in memory, keyed by `<location>/<file_name>`
#[derive(Debug, Clone, Default)]
pub struct InMemoryPolicyLoader {
    documents: HashMap<PathBuf, String>,
}

impl InMemoryPolicyLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(
        mut self,
        location: impl AsRef<Path>,
        file_name: &str,
        document: impl Into<String>,
    ) -> Self {
        self.documents
            .insert(location.as_ref().join(file_name), document.into());
        self
    }
}

impl PolicyDocumentLoader for InMemoryPolicyLoader {
    fn load(&self, location: &Path, file_name: &str) -> Result<String, FederationError> {
        let path = location.join(file_name);
        self.documents
            .get(&path)
            .cloned()
            .ok_or(FederationError::PolicyDocumentNotFound(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DOCUMENT: &str = r#"{"Version":"2012-10-17","Statement":[]}"#;

    #[test]
    fn test_fs_loader_reads_document() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app-policy.json"), DOCUMENT).unwrap();

        let loaded = FsPolicyLoader::new().load(dir.path(), "app-policy.json").unwrap();
        assert_eq!(loaded, DOCUMENT);
    }

    #[test]
    fn test_fs_loader_resolves_against_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("iam-policy-docs")).unwrap();
        std::fs::write(dir.path().join("iam-policy-docs/app.json"), DOCUMENT).unwrap();

        let loader = FsPolicyLoader::new().with_root(dir.path());
        assert_eq!(loader.load(Path::new("iam-policy-docs"), "app.json").unwrap(), DOCUMENT);
    }

    #[test]
    fn test_fs_loader_missing_document() {
        let dir = TempDir::new().unwrap();
        let err = FsPolicyLoader::new().load(dir.path(), "missing.json").unwrap_err();

        match err {
            FederationError::PolicyDocumentNotFound(path) => {
                assert_eq!(path, dir.path().join("missing.json"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fs_loader_directory_is_unreadable() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let err = FsPolicyLoader::new().load(dir.path(), "nested.json").unwrap_err();
        assert!(matches!(err, FederationError::PolicyDocumentUnreadable { .. }));
    }

    #[test]
    fn test_in_memory_loader() {
        let loader = InMemoryPolicyLoader::new().with_document("docs", "a.json", DOCUMENT);

        assert_eq!(loader.load(Path::new("docs"), "a.json").unwrap(), DOCUMENT);
        assert!(matches!(
            loader.load(Path::new("docs"), "b.json"),
            Err(FederationError::PolicyDocumentNotFound(_))
        ));
    }
}
