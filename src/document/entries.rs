//! Shapes of the named entries kept in `Services` and `Outbounds`.
//!
//! Fields the manager does not know about are carried through untouched
//! via `extra`, so adding an entry never strips proxy options.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::error::{DocumentError, Result};
use super::ops::Section;

/// A listening service of the proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceEntry {
    pub name: String,
    pub listen: u16,
    #[serde(rename = "IPAccess", default = "default_mode")]
    pub ip_access: Value,
    #[serde(default = "default_type")]
    pub outbound: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An upstream target the proxy forwards to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct OutboundEntry {
    pub name: String,
    pub target_address: String,
    pub target_port: u16,
    #[serde(default)]
    pub minecraft: Option<Value>,
    #[serde(default)]
    pub proxy_options: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_mode() -> Value {
    json!({ "Mode": "" })
}

fn default_type() -> Value {
    json!({ "Type": "" })
}

/// Minecraft block written for outbounds that do not bring their own.
pub fn default_minecraft() -> Value {
    json!({
        "EnableHostnameRewrite": true,
        "OnlineCount": { "Max": 20, "Online": -1, "EnableMaxLimit": false },
        "HostnameAccess": { "Mode": "" },
        "NameAccess": { "Mode": "" },
        "PingMode": "",
        "MotdFavicon": "{DEFAULT_MOTD}",
        "MotdDescription": "§d{NAME}§e, provided by §a§o{INFO}§r\n§c§lProxy for §6§n{HOST}:{PORT}§r"
    })
}

impl ServiceEntry {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|source| DocumentError::InvalidEntry {
            section: Section::Services.label(),
            source,
        })
    }

    pub fn into_value(self) -> Result<Value> {
        serde_json::to_value(self).map_err(|source| DocumentError::InvalidEntry {
            section: Section::Services.label(),
            source,
        })
    }
}

impl OutboundEntry {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|source| DocumentError::InvalidEntry {
            section: Section::Outbounds.label(),
            source,
        })
    }

    /// Fill the optional blocks the proxy expects to be present.
    pub fn with_defaults(mut self) -> Self {
        if self.minecraft.as_ref().map_or(true, Value::is_null) {
            self.minecraft = Some(default_minecraft());
        }
        if self.proxy_options.as_ref().map_or(true, Value::is_null) {
            self.proxy_options = Some(default_type());
        }
        self
    }

    pub fn into_value(self) -> Result<Value> {
        serde_json::to_value(self).map_err(|source| DocumentError::InvalidEntry {
            section: Section::Outbounds.label(),
            source,
        })
    }
}
