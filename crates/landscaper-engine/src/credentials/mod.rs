//! Credential lookup by identifier and category

use std::sync::Arc;

use indexmap::IndexMap;

use landscaper_config::{CredentialSpec, CredentialsConfig};
use landscaper_core::error::{LandscapeError, LandscapeResult};

/// Category name of credentials usable for SSH
pub const SSH_CATEGORY: &str = "ssh";

/// Holds the credentials declared in the credentials document
#[derive(Debug, Default)]
pub struct CredentialManager {
    credentials: IndexMap<String, Arc<CredentialSpec>>,
}

impl CredentialManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manager from a credentials document
    pub fn from_config(config: &CredentialsConfig) -> LandscapeResult<Self> {
        config.validate()?;

        let credentials = config
            .credentials
            .iter()
            .map(|cred| (cred.identifier.clone(), Arc::new(cred.clone())))
            .collect();

        Ok(Self { credentials })
    }

    /// Look up a credential by identifier
    pub fn lookup(&self, identifier: &str) -> LandscapeResult<Arc<CredentialSpec>> {
        self.credentials
            .get(identifier)
            .cloned()
            .ok_or_else(|| LandscapeError::Credential {
                identifier: identifier.to_string(),
            })
    }

    /// All credentials of a category, in declaration order
    pub fn by_category(&self, category: &str) -> Vec<Arc<CredentialSpec>> {
        self.credentials
            .values()
            .filter(|cred| cred.has_category(category))
            .cloned()
            .collect()
    }

    /// The credential marked primary for a category, else the first one
    pub fn primary(&self, category: &str) -> Option<Arc<CredentialSpec>> {
        let candidates = self.by_category(category);
        candidates
            .iter()
            .find(|cred| cred.primary)
            .or_else(|| candidates.first())
            .cloned()
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.credentials.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
