//! Resource and provider collaborator.
//!
//! Applications request resources (certificates, DNS records, mailboxes...)
//! and provider applications fulfil them. Only the contract the HTTP layer
//! needs is defined here; `memory.rs` is the implementation the daemon ships.

pub mod memory;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{MemoryResourceService, ProviderRegistry, ResourceTypeRegistry};

/// Lifecycle status of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Requested,
    Created,
    Unknown,
}

impl FromStr for ResourceStatus {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(ResourceStatus::Requested),
            "created" => Ok(ResourceStatus::Created),
            "unknown" => Ok(ResourceStatus::Unknown),
            other => Err(ResourceError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceStatus::Requested => "requested",
            ResourceStatus::Created => "created",
            ResourceStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A resource owned by an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: serde_json::Value,
    pub app: String,
    pub status: ResourceStatus,
}

/// Body of a resource creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Errors from resource operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("resource '{0}' not found")]
    NotFound(String),

    #[error("application '{app}' does not own resource '{id}'")]
    NotOwner { app: String, id: String },

    #[error("unknown resource type '{0}'")]
    UnknownType(String),

    #[error("invalid resource status '{0}'")]
    InvalidStatus(String),

    #[error("resource type '{kind}' is already provided by '{app}'")]
    ProviderExists { kind: String, app: String },

    #[error("application '{0}' is not a resource provider")]
    NotProvider(String),

    #[error("resource registry is not initialized")]
    NotInitialized,
}

/// Resource operations exposed through the internal and external route groups.
pub trait ResourceService: Send + Sync {
    fn app_resources(&self, app: &str) -> Vec<Resource>;
    fn all_resources(&self) -> Vec<Resource>;
    fn create(&self, app: &str, request: ResourceRequest) -> Result<Resource, ResourceError>;
    fn get(&self, app: &str, id: &str) -> Result<Resource, ResourceError>;
    fn delete(&self, app: &str, id: &str) -> Result<Resource, ResourceError>;
    fn set_status(&self, app: &str, id: &str, status: ResourceStatus)
        -> Result<Resource, ResourceError>;
    fn register_provider(&self, app: &str, kind: &str) -> Result<(), ResourceError>;
    fn deregister_provider(&self, app: &str, kind: &str) -> Result<(), ResourceError>;
    fn provider_resources(&self, app: &str) -> Result<Vec<Resource>, ResourceError>;
}
