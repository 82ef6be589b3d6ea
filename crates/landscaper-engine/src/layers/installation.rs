//! Installation layer: the couplings known to a landscape

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use landscaper_core::error::{LandscapeError, LandscapeResult};

use crate::coupling::{sort_by_precedence, IntegrationCoupling};

/// Installed couplings keyed by integration key, in startup order
pub struct InstallationLayer {
    couplings: RwLock<IndexMap<String, Arc<dyn IntegrationCoupling>>>,
}

impl InstallationLayer {
    pub fn new(couplings: Vec<Arc<dyn IntegrationCoupling>>) -> LandscapeResult<Self> {
        let layer = Self {
            couplings: RwLock::new(IndexMap::new()),
        };
        for coupling in sort_by_precedence(couplings) {
            layer.install(coupling)?;
        }
        Ok(layer)
    }

    /// Install a coupling; each integration key can only be installed once
    pub fn install(&self, coupling: Arc<dyn IntegrationCoupling>) -> LandscapeResult<()> {
        let key = coupling.integration_key();
        let mut couplings = self.couplings.write();
        if couplings.contains_key(&key) {
            return Err(LandscapeError::semantic(format!(
                "A coupling with integration key '{}' is already installed.",
                key
            )));
        }

        debug!("Installing coupling {}", key);
        couplings.insert(key, coupling);

        // Late installs still honor startup order
        couplings.sort_by(|_, a, _, b| a.declare_precedence().cmp(&b.declare_precedence()));
        Ok(())
    }

    pub fn installed_couplings(&self) -> Vec<Arc<dyn IntegrationCoupling>> {
        self.couplings.read().values().cloned().collect()
    }

    pub fn installed_keys(&self) -> Vec<String> {
        self.couplings.read().keys().cloned().collect()
    }

    pub fn coupling(&self, key: &str) -> Option<Arc<dyn IntegrationCoupling>> {
        self.couplings.read().get(key).cloned()
    }
}

impl std::fmt::Debug for InstallationLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationLayer")
            .field("couplings", &self.installed_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling::{builtin_couplings, ClientCoupling};

    #[test]
    fn test_install_builtins() {
        let layer = InstallationLayer::new(builtin_couplings()).unwrap();
        assert_eq!(layer.installed_couplings().len(), 3);
        assert!(layer.coupling("apod:*:deviceType:network/client").is_some());
        assert!(layer.coupling("apod:*:deviceType:unknown").is_none());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let layer = InstallationLayer::new(builtin_couplings()).unwrap();
        let err = layer.install(Arc::new(ClientCoupling::new())).unwrap_err();
        assert!(matches!(err, LandscapeError::Semantic { .. }));
    }
}
