//! Constants associated with automation landscaping.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Protocol extension types that can be attached to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceExtensionType {
    #[serde(rename = "extension/ssh")]
    Ssh,
    #[serde(rename = "extension/upnp")]
    Upnp,
    #[serde(rename = "extension/rest")]
    Rest,
}

impl DeviceExtensionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceExtensionType::Ssh => "extension/ssh",
            DeviceExtensionType::Upnp => "extension/upnp",
            DeviceExtensionType::Rest => "extension/rest",
        }
    }
}

impl fmt::Display for DeviceExtensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering levels used to bring up integrations; lower levels start first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StartupLevel {
    Power = 10000,
    Serial = 20000,
    SecondaryProtocol = 30000,
    PrimaryProtocol = 40000,
}

impl StartupLevel {
    pub fn value(self) -> u32 {
        self as u32
    }
}
