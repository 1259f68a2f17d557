//! Configuration files read by the node daemon.
//!
//! The chassis config is YAML and lists the device nodes to manage:
//!
//! ```yaml
//! nodes:
//!   - node_id: 1
//!     backend: asic
//!     ports:
//!       - name: Ethernet0
//!       - name: Ethernet4
//! ```
//!
//! P4Info schemas and write/read requests are JSON. Device configs are raw
//! program bytes.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use p4rt_driver::BackendKind;
use p4rt_types::{DeviceId, ForwardingPipelineConfig, P4Info, ReadRequest, WriteRequest};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON from {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// A front-panel port provisioned on every pipeline push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub name: String,
}

/// One managed pipeline device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: DeviceId,

    /// Backend flavour driving the device
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

impl NodeConfig {
    pub fn port_names(&self) -> Vec<String> {
        self.ports.iter().map(|p| p.name.clone()).collect()
    }
}

fn default_backend() -> BackendKind {
    BackendKind::Asic
}

/// Every node of the chassis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChassisConfig {
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

impl ChassisConfig {
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let config: ChassisConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Node IDs must be nonzero and unique.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.node_id == 0 {
                return Err(ConfigError::Invalid("node_id must be > 0".to_string()));
            }
            if !seen.insert(node.node_id) {
                return Err(ConfigError::Invalid(format!(
                    "node_id {} listed more than once",
                    node.node_id
                )));
            }
        }
        Ok(())
    }

    pub fn node(&self, node_id: DeviceId) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }
}

fn read_bytes(path: &Path) -> ConfigResult<Vec<u8>> {
    fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds a pipeline config from a JSON P4Info file and a program binary.
pub fn load_pipeline_config(
    p4info: impl AsRef<Path>,
    device_config: impl AsRef<Path>,
) -> ConfigResult<ForwardingPipelineConfig> {
    let p4info: P4Info = read_json(p4info.as_ref())?;
    let program = read_bytes(device_config.as_ref())?;
    Ok(ForwardingPipelineConfig::new(p4info, program))
}

pub fn load_write_request(path: impl AsRef<Path>) -> ConfigResult<WriteRequest> {
    read_json(path.as_ref())
}

pub fn load_read_request(path: impl AsRef<Path>) -> ConfigResult<ReadRequest> {
    read_json(path.as_ref())
}
