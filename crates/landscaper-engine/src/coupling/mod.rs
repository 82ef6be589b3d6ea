//! Integration couplings
//!
//! A coupling maps a class of declared items to the coordinator that brings
//! them up. Couplings are keyed by `root:section:leaf:class`, for example
//! `apod:*:deviceType:network/client` matches every device whose
//! `deviceType` is `network/client` in any `apod` device section.

mod builtin;

pub use builtin::{builtin_couplings, ClientCoupling, NodeCoupling, ServiceCoupling};

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use landscaper_core::error::LandscapeResult;
use landscaper_core::types::StartupLevel;

use crate::coordinator::Coordinator;
use crate::landscape::Landscape;

/// Section wildcard matching every section of a root
pub const ANY_SECTION: &str = "*";

/// The four parts of an integration key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CouplingKey {
    pub root: String,
    pub section: String,
    pub leaf: String,
    pub class: String,
}

impl CouplingKey {
    pub fn new(
        root: impl Into<String>,
        section: impl Into<String>,
        leaf: impl Into<String>,
        class: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            section: section.into(),
            leaf: leaf.into(),
            class: class.into(),
        }
    }

    pub fn matches_section(&self, root: &str, section: &str) -> bool {
        self.root == root && (self.section == ANY_SECTION || self.section == section)
    }

    /// Whether a declared item in `root`/`section` belongs to this key
    pub fn matches(&self, root: &str, section: &str, item: &Value) -> bool {
        self.matches_section(root, section)
            && item.get(&self.leaf).and_then(Value::as_str) == Some(self.class.as_str())
    }
}

impl fmt::Display for CouplingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.root, self.section, self.leaf, self.class)
    }
}

/// Declares how a class of landscape items is integrated
pub trait IntegrationCoupling: Send + Sync {
    fn key_parts(&self) -> &CouplingKey;

    fn integration_key(&self) -> String {
        self.key_parts().to_string()
    }

    /// Startup level; lower levels are brought up first
    fn declare_precedence(&self) -> StartupLevel;

    /// Register with the integration layer when the configuration declares
    /// items this coupling handles
    fn attach_to_environment(&self, landscape: &Landscape) -> LandscapeResult<()> {
        if landscape.configuration().declares_items_for(self.key_parts()) {
            landscape
                .integration()
                .register_integration_dependency(landscape, &self.integration_key())?;
        }
        Ok(())
    }

    /// Validate one declared item, returning `(errors, warnings)`
    fn validate_item_configuration(&self, item: &Value) -> (Vec<String>, Vec<String>);

    fn create_coordinator(&self, landscape: &Landscape) -> LandscapeResult<Arc<dyn Coordinator>>;
}

/// Order couplings by startup level, keeping the input order within a level
pub fn sort_by_precedence(
    mut couplings: Vec<Arc<dyn IntegrationCoupling>>,
) -> Vec<Arc<dyn IntegrationCoupling>> {
    couplings.sort_by_key(|coupling| coupling.declare_precedence());
    couplings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed {
        key: CouplingKey,
        level: StartupLevel,
    }

    impl IntegrationCoupling for Fixed {
        fn key_parts(&self) -> &CouplingKey {
            &self.key
        }

        fn declare_precedence(&self) -> StartupLevel {
            self.level
        }

        fn validate_item_configuration(&self, _item: &Value) -> (Vec<String>, Vec<String>) {
            (Vec::new(), Vec::new())
        }

        fn create_coordinator(&self, _landscape: &Landscape) -> LandscapeResult<Arc<dyn Coordinator>> {
            Err(landscaper_core::error::LandscapeError::not_overloaded("fixed"))
        }
    }

    fn fixed(class: &str, level: StartupLevel) -> Arc<dyn IntegrationCoupling> {
        Arc::new(Fixed {
            key: CouplingKey::new("apod", "*", "deviceType", class),
            level,
        })
    }

    #[test]
    fn test_key_display_and_match() {
        let key = CouplingKey::new("apod", ANY_SECTION, "deviceType", "network/client");
        assert_eq!(key.to_string(), "apod:*:deviceType:network/client");
        assert!(key.matches("apod", "devices", &json!({"deviceType": "network/client"})));
        assert!(!key.matches("apod", "devices", &json!({"deviceType": "cluster/node"})));
        assert!(!key.matches("infrastructure", "devices", &json!({"deviceType": "network/client"})));

        let pinned = CouplingKey::new("infrastructure", "services", "serviceType", "x");
        assert!(pinned.matches_section("infrastructure", "services"));
        assert!(!pinned.matches_section("infrastructure", "other"));
    }

    #[test]
    fn test_sort_by_precedence_is_stable() {
        let sorted = sort_by_precedence(vec![
            fixed("a", StartupLevel::PrimaryProtocol),
            fixed("b", StartupLevel::Power),
            fixed("c", StartupLevel::PrimaryProtocol),
            fixed("d", StartupLevel::Serial),
        ]);

        let classes: Vec<String> = sorted.iter().map(|c| c.key_parts().class.clone()).collect();
        assert_eq!(classes, vec!["b", "d", "a", "c"]);
    }
}
