//! Protocol extensions attached to devices and services
//!
//! Coordinators attach extensions to the resources they create. An extension
//! keeps weak references back to its coordinator and to the resource it
//! extends so that no reference cycle keeps either alive.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::{json, Value};

use landscaper_config::CredentialSpec;
use landscaper_core::types::DeviceExtensionType;

use crate::agents::SystemContext;
use crate::coordinator::Coordinator;
use crate::device::LandscapeDevice;
use crate::service::LandscapeService;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// The resource an extension extends
#[derive(Clone)]
pub enum ExtendedTarget {
    Device(Weak<LandscapeDevice>),
    Service(Weak<LandscapeService>),
}

impl ExtendedTarget {
    pub fn device(&self) -> Option<Arc<LandscapeDevice>> {
        match self {
            ExtendedTarget::Device(weak) => weak.upgrade(),
            ExtendedTarget::Service(_) => None,
        }
    }

    pub fn service(&self) -> Option<Arc<LandscapeService>> {
        match self {
            ExtendedTarget::Service(weak) => weak.upgrade(),
            ExtendedTarget::Device(_) => None,
        }
    }
}

impl fmt::Debug for ExtendedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtendedTarget::Device(_) => f.write_str("ExtendedTarget::Device"),
            ExtendedTarget::Service(_) => f.write_str("ExtendedTarget::Service"),
        }
    }
}

/// Links an extension to its coordinator and extended resource
pub struct ExtensionBinding {
    coordinator: Option<Weak<dyn Coordinator>>,
    extends: RwLock<ExtendedTarget>,
    extid: String,
    location: String,
    configuration: Value,
}

impl ExtensionBinding {
    pub fn new(
        coordinator: Option<Weak<dyn Coordinator>>,
        extends: ExtendedTarget,
        extid: impl Into<String>,
        location: impl Into<String>,
        configuration: Value,
    ) -> Self {
        Self {
            coordinator,
            extends: RwLock::new(extends),
            extid: extid.into(),
            location: location.into(),
            configuration,
        }
    }

    /// The coordinator, while it is alive
    pub fn coordinator(&self) -> Option<Arc<dyn Coordinator>> {
        self.coordinator.as_ref().and_then(Weak::upgrade)
    }

    pub fn extends(&self) -> ExtendedTarget {
        self.extends.read().clone()
    }

    /// Point the binding at a different resource
    pub fn update_extends(&self, target: ExtendedTarget) {
        *self.extends.write() = target;
    }

    /// Identifier of the extension within its protocol
    pub fn extid(&self) -> &str {
        &self.extid
    }

    /// Where the extended resource is reached
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Protocol specific configuration
    pub fn configuration(&self) -> &Value {
        &self.configuration
    }
}

impl fmt::Debug for ExtensionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionBinding")
            .field("extid", &self.extid)
            .field("location", &self.location)
            .field("configuration", &self.configuration)
            .finish()
    }
}

/// A protocol capability attached to a device or service
pub trait ProtocolExtension: Send + Sync + fmt::Debug {
    fn ext_type(&self) -> DeviceExtensionType;

    fn binding(&self) -> &ExtensionBinding;

    /// A system context commands can be run through, when the protocol
    /// provides one
    fn system_context(&self) -> Option<Arc<dyn SystemContext>> {
        None
    }

    fn update_extends(&self, target: ExtendedTarget) {
        self.binding().update_extends(target);
    }
}

/// SSH access descriptor for a device or service
pub struct SshExtension {
    binding: ExtensionBinding,
    host: String,
    port: u16,
    users: Option<Value>,
    credential: Arc<CredentialSpec>,
    system_context: RwLock<Option<Arc<dyn SystemContext>>>,
}

impl SshExtension {
    pub fn new(
        coordinator: Option<Weak<dyn Coordinator>>,
        extends: ExtendedTarget,
        host: impl Into<String>,
        port: u16,
        users: Option<Value>,
        credential: Arc<CredentialSpec>,
    ) -> Self {
        let host = host.into();
        let configuration = json!({
            "host": host,
            "port": port,
            "credential": credential.identifier,
            "users": users,
        });
        let binding = ExtensionBinding::new(
            coordinator,
            extends,
            host.clone(),
            format!("{}:{}", host, port),
            configuration,
        );

        Self {
            binding,
            host,
            port,
            users,
            credential,
            system_context: RwLock::new(None),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn users(&self) -> Option<&Value> {
        self.users.as_ref()
    }

    pub fn credential(&self) -> &Arc<CredentialSpec> {
        &self.credential
    }

    /// Provide the context SSH commands are run through
    pub fn set_system_context(&self, context: Arc<dyn SystemContext>) {
        *self.system_context.write() = Some(context);
    }
}

impl ProtocolExtension for SshExtension {
    fn ext_type(&self) -> DeviceExtensionType {
        DeviceExtensionType::Ssh
    }

    fn binding(&self) -> &ExtensionBinding {
        &self.binding
    }

    fn system_context(&self) -> Option<Arc<dyn SystemContext>> {
        self.system_context.read().clone()
    }
}

impl fmt::Debug for SshExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshExtension")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credential", &self.credential.identifier)
            .finish()
    }
}
