//! State shared by devices and services

use std::collections::HashMap;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tracing::debug;

use landscaper_config::CredentialSpec;
use landscaper_core::error::{LandscapeError, LandscapeResult};
use landscaper_core::types::{DeviceExtensionType, FriendlyIdentifier};

use crate::agents::SystemContext;
use crate::coordinator::Coordinator;
use crate::credentials::{CredentialManager, SSH_CATEGORY};
use crate::extension::ProtocolExtension;

/// Callback deciding whether a resource matches a set of parameters
pub type MatchCallback<T> = Arc<dyn Fn(&T, &[Value]) -> bool + Send + Sync>;

/// Callback verifying the status of a resource over one protocol
pub type StatusCallback<T> = Arc<dyn Fn(&T) -> LandscapeResult<()> + Send + Sync>;

pub(crate) struct EndpointCore<T> {
    kind: &'static str,
    type_name: String,
    coordinator: Option<Weak<dyn Coordinator>>,
    friendly_id: RwLock<FriendlyIdentifier>,
    name: Option<String>,
    host: Option<String>,
    configured_ipaddr: Option<String>,
    group: String,
    features: Map<String, Value>,
    credentials: IndexMap<String, Arc<CredentialSpec>>,
    ssh_credential: Option<Arc<CredentialSpec>>,
    state: Mutex<EndpointState<T>>,
}

struct EndpointState<T> {
    resolved_ipaddr: Option<String>,
    contacted_first: Option<DateTime<Utc>>,
    contacted_last: Option<DateTime<Utc>>,
    is_watched: bool,
    is_isolated: bool,
    extensions: IndexMap<DeviceExtensionType, Arc<dyn ProtocolExtension>>,
    match_callbacks: HashMap<String, MatchCallback<T>>,
    status_callbacks: IndexMap<String, StatusCallback<T>>,
}

pub(crate) struct EndpointInit<'a> {
    pub kind: &'static str,
    pub type_name: &'a str,
    pub coordinator: Option<Weak<dyn Coordinator>>,
    pub friendly_id: FriendlyIdentifier,
    pub name: Option<&'a str>,
    pub host: Option<&'a str>,
    pub ipaddr: Option<&'a str>,
    pub group: Option<&'a str>,
    pub features: &'a Map<String, Value>,
    pub credential_ids: &'a [String],
}

impl<T> EndpointCore<T> {
    pub(crate) fn new(init: EndpointInit<'_>, manager: &CredentialManager) -> LandscapeResult<Self> {
        let mut credentials = IndexMap::new();
        for identifier in init.credential_ids {
            credentials.insert(identifier.clone(), manager.lookup(identifier)?);
        }

        let ssh_credential = credentials
            .values()
            .find(|cred| cred.has_category(SSH_CATEGORY))
            .cloned();

        Ok(Self {
            kind: init.kind,
            type_name: init.type_name.to_string(),
            coordinator: init.coordinator,
            friendly_id: RwLock::new(init.friendly_id),
            name: init.name.map(str::to_string),
            host: init.host.map(str::to_string),
            configured_ipaddr: init.ipaddr.map(str::to_string),
            group: init.group.unwrap_or_default().to_string(),
            features: init.features.clone(),
            credentials,
            ssh_credential,
            state: Mutex::new(EndpointState {
                resolved_ipaddr: None,
                contacted_first: None,
                contacted_last: None,
                is_watched: false,
                is_isolated: false,
                extensions: IndexMap::new(),
                match_callbacks: HashMap::new(),
                status_callbacks: IndexMap::new(),
            }),
        })
    }

    pub(crate) fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn coordinator(&self) -> Option<Arc<dyn Coordinator>> {
        self.coordinator.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn friendly_id(&self) -> FriendlyIdentifier {
        self.friendly_id.read().clone()
    }

    pub(crate) fn identity(&self) -> String {
        self.friendly_id.read().identity()
    }

    pub(crate) fn full_identifier(&self) -> String {
        self.friendly_id.read().full_identifier().to_string()
    }

    pub(crate) fn update_full_identifier(&self, full_identifier: &str) {
        self.friendly_id.write().update_full_identifier(full_identifier);
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub(crate) fn configured_ipaddr(&self) -> Option<&str> {
        self.configured_ipaddr.as_deref()
    }

    pub(crate) fn group(&self) -> &str {
        &self.group
    }

    pub(crate) fn features(&self) -> &Map<String, Value> {
        &self.features
    }

    pub(crate) fn credentials(&self) -> &IndexMap<String, Arc<CredentialSpec>> {
        &self.credentials
    }

    pub(crate) fn ssh_credential(&self) -> Option<&Arc<CredentialSpec>> {
        self.ssh_credential.as_ref()
    }

    pub(crate) fn credentials_by_category(&self, category: &str) -> Vec<Arc<CredentialSpec>> {
        self.credentials
            .values()
            .filter(|cred| cred.has_category(category))
            .cloned()
            .collect()
    }

    /// The configured address, the cached lookup or a literal ip host.
    /// Never looks the host up.
    pub(crate) fn known_ipaddr(&self) -> Option<String> {
        if let Some(ipaddr) = &self.configured_ipaddr {
            return Some(ipaddr.clone());
        }

        if let Some(resolved) = self.state.lock().resolved_ipaddr.clone() {
            return Some(resolved);
        }

        self.host
            .as_deref()
            .and_then(|host| host.parse::<IpAddr>().ok())
            .map(|addr| addr.to_string())
    }

    /// The configured address, else the host resolved once and cached.
    /// Blocks on the system resolver; async callers use `resolve_ipaddr`.
    pub(crate) fn ipaddr(&self) -> LandscapeResult<String> {
        if let Some(known) = self.known_ipaddr() {
            return Ok(known);
        }

        let host = self.lookup_host_name()?;
        let addrs: Vec<IpAddr> = match (host, 0).to_socket_addrs() {
            Ok(addrs) => addrs.map(|a| a.ip()).collect(),
            Err(err) => {
                debug!("Unable to resolve '{}': {}", host, err);
                Vec::new()
            }
        };
        self.cache_resolved(&addrs)
    }

    /// Same as `ipaddr` with the lookup done on the tokio resolver
    pub(crate) async fn resolve_ipaddr(&self) -> LandscapeResult<String> {
        if let Some(known) = self.known_ipaddr() {
            return Ok(known);
        }

        let host = self.lookup_host_name()?;
        let addrs: Vec<IpAddr> = match tokio::net::lookup_host((host, 0)).await {
            Ok(addrs) => addrs.map(|a| a.ip()).collect(),
            Err(err) => {
                debug!("Unable to resolve '{}': {}", host, err);
                Vec::new()
            }
        };
        self.cache_resolved(&addrs)
    }

    fn lookup_host_name(&self) -> LandscapeResult<&str> {
        self.host.as_deref().ok_or_else(|| LandscapeError::Resolution {
            identity: self.identity(),
        })
    }

    // IPv4 wins over IPv6
    fn cache_resolved(&self, addrs: &[IpAddr]) -> LandscapeResult<String> {
        let resolved = addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .map(IpAddr::to_string)
            .ok_or_else(|| LandscapeError::Resolution {
                identity: self.identity(),
            })?;

        self.state.lock().resolved_ipaddr = Some(resolved.clone());
        Ok(resolved)
    }

    pub(crate) fn is_configured_for_power(&self) -> bool {
        self.features.contains_key("power")
    }

    pub(crate) fn is_configured_for_serial(&self) -> bool {
        self.features.contains_key("serial")
    }

    pub(crate) fn attach_extension(&self, extension: Arc<dyn ProtocolExtension>) -> LandscapeResult<()> {
        let ext_type = extension.ext_type();
        let mut state = self.state.lock();
        if state.extensions.contains_key(&ext_type) {
            return Err(LandscapeError::semantic(format!(
                "attach_extension: called for pre-existing extension type '{}'.",
                ext_type
            )));
        }
        state.extensions.insert(ext_type, extension);
        Ok(())
    }

    pub(crate) fn has_extension_type(&self, ext_type: DeviceExtensionType) -> bool {
        self.state.lock().extensions.contains_key(&ext_type)
    }

    pub(crate) fn extension(&self, ext_type: DeviceExtensionType) -> Option<Arc<dyn ProtocolExtension>> {
        self.state.lock().extensions.get(&ext_type).cloned()
    }

    pub(crate) fn extensions(&self) -> IndexMap<DeviceExtensionType, Arc<dyn ProtocolExtension>> {
        self.state.lock().extensions.clone()
    }

    pub(crate) fn initialize_features(&self) {
        if let Some(isolation) = self.features.get("isolation").and_then(Value::as_bool) {
            self.state.lock().is_isolated = isolation;
        }
    }

    pub(crate) fn is_isolated(&self) -> bool {
        self.state.lock().is_isolated
    }

    pub(crate) fn is_watched(&self) -> bool {
        self.state.lock().is_watched
    }

    pub(crate) fn set_watched(&self, watched: bool) {
        self.state.lock().is_watched = watched;
    }

    pub(crate) fn mark_contacted(&self) {
        let now = Utc::now();
        let mut state = self.state.lock();
        if state.contacted_first.is_none() {
            state.contacted_first = Some(now);
        }
        state.contacted_last = Some(now);
    }

    pub(crate) fn contacted_first(&self) -> Option<DateTime<Utc>> {
        self.state.lock().contacted_first
    }

    pub(crate) fn contacted_last(&self) -> Option<DateTime<Utc>> {
        self.state.lock().contacted_last
    }

    pub(crate) fn update_match_table(&self, table: HashMap<String, MatchCallback<T>>) {
        self.state.lock().match_callbacks.extend(table);
    }

    pub(crate) fn match_using_params(&self, owner: &T, match_type: &str, params: &[Value]) -> bool {
        // Callbacks run without the lock held
        let callback = self.state.lock().match_callbacks.get(match_type).cloned();
        callback.map(|cb| cb(owner, params)).unwrap_or(false)
    }

    pub(crate) fn update_status_verification_callback(&self, protocol: &str, callback: StatusCallback<T>) {
        self.state
            .lock()
            .status_callbacks
            .insert(protocol.to_string(), callback);
    }

    pub(crate) fn verify_status(&self, owner: &T) -> LandscapeResult<()> {
        let callbacks: Vec<StatusCallback<T>> =
            self.state.lock().status_callbacks.values().cloned().collect();
        for callback in callbacks {
            callback(owner)?;
        }
        Ok(())
    }

    pub(crate) fn default_system_context(&self) -> LandscapeResult<Arc<dyn SystemContext>> {
        self.extension(DeviceExtensionType::Ssh)
            .and_then(|ext| ext.system_context())
            .ok_or_else(|| {
                LandscapeError::not_overloaded(format!(
                    "get_default_system_context: not overloaded for type='{}'",
                    self.kind
                ))
            })
    }

    /// `<Kind type=.. identity=.. ip=..>`
    pub(crate) fn describe(&self) -> String {
        let ipaddr = self.known_ipaddr().unwrap_or_else(|| "unknown".to_string());
        format!(
            "<{} type={} identity={} ip={}>",
            self.kind,
            self.type_name,
            self.identity(),
            ipaddr
        )
    }
}
