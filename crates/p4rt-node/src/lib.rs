//! P4Runtime Device Node - Table programming translation layer
//!
//! This crate accepts forwarding pipeline configurations and batches of
//! P4Runtime entity writes and reads, and translates them into operations
//! on a packet-processing backend (a switching ASIC or an in-kernel
//! dataplane) through the [`PipelineDriver`](p4rt_driver::PipelineDriver)
//! capability trait.
//!
//! # Architecture
//!
//! ```text
//! [client] ──> [DeviceNode] ──> [TableManager] ──> [Translator] ──> [PipelineDriver]
//!                   │                 │
//!                   └──> [SchemaRegistry] <──┘
//! ```
//!
//! # Key Components
//!
//! - [`node::DeviceNode`]: pipeline push, batch write and read for one device
//! - [`table_manager::TableManager`]: per-entity-kind programming
//! - [`translator::Translator`]: key and data encoding
//! - [`config`]: chassis, pipeline and request files for the daemon

pub mod audit;
pub mod config;
pub mod error;
pub mod node;
pub mod table_manager;
pub mod translator;
pub mod writer;

#[cfg(test)]
mod fixtures;

pub use config::{ChassisConfig, ConfigError, NodeConfig, PortConfig};
pub use error::{BatchOutcome, NodeError, NodeResult, Status, StatusCode};
pub use node::{DeviceNode, NodeStats};
pub use table_manager::TableManager;
pub use translator::Translator;
pub use writer::ReadSink;
