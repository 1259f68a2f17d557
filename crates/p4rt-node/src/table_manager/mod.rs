//! TableManager - Runtime entity programming for one device.
//!
//! The table manager turns protocol entities into sequences of backend
//! driver calls and back. It owns no forwarding state of its own: every
//! operation acquires a fresh programming context, encodes the request into
//! the context's key/data buffers through the [`Translator`], runs one or
//! more entry calls and releases the context.
//!
//! # Architecture
//!
//! ```text
//! DeviceNode ──> TableManager ──┬──> SchemaRegistry (ID lookups)
//!                               ├──> Translator (key/data encoding)
//!                               └──> PipelineDriver (via scoped contexts)
//! ```
//!
//! # Backend profiles
//!
//! Table entries and indirect counters work on every backend. Direct
//! counters, meters, registers and action profiles need the matching
//! [`Capabilities`] flags and fail with Unimplemented otherwise.
//!
//! # Context lifetime
//!
//! Contexts are [`ProgrammingContext`](p4rt_driver::ProgrammingContext)
//! guards. Successful operations release explicitly and report release
//! failures; early returns release through `Drop`. Either way each context
//! is released exactly once.

mod action_profile;
mod counter;
mod meter;
mod register;
mod table_entry;

use std::sync::Arc;

use p4rt_driver::{Capabilities, PipelineDriver};
use p4rt_types::{DeviceId, UpdateType};

use crate::error::{NodeError, NodeResult};
use crate::translator::Translator;

/// Programs runtime entities of one device through a backend driver.
pub struct TableManager<D: PipelineDriver> {
    driver: Arc<D>,
    device: DeviceId,
    translator: Translator,
    capabilities: Capabilities,
}

impl<D: PipelineDriver> std::fmt::Debug for TableManager<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableManager")
            .field("device", &self.device)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl<D: PipelineDriver> TableManager<D> {
    pub fn new(driver: Arc<D>, device: DeviceId) -> Self {
        let capabilities = driver.capabilities();
        Self {
            driver,
            device,
            translator: Translator::new(&capabilities),
            capabilities,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn driver(&self) -> &D {
        &self.driver
    }

    /// Fails with Unimplemented unless the backend supports `feature`.
    fn require(&self, supported: bool, feature: &str) -> NodeResult<()> {
        if supported {
            Ok(())
        } else {
            Err(NodeError::unimplemented(format!(
                "{} not supported on the {} backend",
                feature, self.capabilities.kind
            )))
        }
    }
}

/// Rejects everything but MODIFY, the only update extern arrays accept.
fn require_modify(update_type: UpdateType, kind: &str) -> NodeResult<()> {
    match update_type {
        UpdateType::Modify => Ok(()),
        other => Err(NodeError::invalid_argument(format!(
            "{} supports only MODIFY, got {}",
            kind, other
        ))),
    }
}

/// Validates one index into an array of `size` cells.
fn cell_index(index: i64, size: i64, name: &str) -> NodeResult<u32> {
    if index < 0 {
        return Err(NodeError::invalid_argument(format!(
            "negative index {} for {}",
            index, name
        )));
    }
    if size > 0 && index >= size {
        return Err(NodeError::invalid_argument(format!(
            "index {} out of range for {} of size {}",
            index, name, size
        )));
    }
    to_cell_index(index)
}

/// Resolves the cells addressed by an optional index. No index addresses
/// every cell.
fn cell_indices(index: Option<i64>, size: i64, name: &str) -> NodeResult<Vec<u32>> {
    match index {
        Some(index) => Ok(vec![cell_index(index, size, name)?]),
        None => (0..size.max(0)).map(to_cell_index).collect(),
    }
}

fn to_cell_index(index: i64) -> NodeResult<u32> {
    u32::try_from(index)
        .map_err(|_| NodeError::invalid_argument(format!("index {} out of range", index)))
}
