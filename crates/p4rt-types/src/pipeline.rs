//! Forwarding pipeline configuration.

use serde::{Deserialize, Serialize};

use crate::p4info::P4Info;

/// A program binary together with the schema describing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardingPipelineConfig {
    /// Schema snapshot of the program.
    pub p4info: Option<P4Info>,
    /// Target-specific program (ASIC binary or eBPF object).
    pub p4_device_config: Vec<u8>,
}

impl ForwardingPipelineConfig {
    pub fn new(p4info: P4Info, p4_device_config: impl Into<Vec<u8>>) -> Self {
        Self {
            p4info: Some(p4info),
            p4_device_config: p4_device_config.into(),
        }
    }
}
