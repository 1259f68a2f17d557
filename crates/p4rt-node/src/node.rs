//! DeviceNode - One managed pipeline device.
//!
//! A device node owns the active forwarding pipeline configuration of one
//! device and the schema registry built from it. Pushes and batch writes
//! take the node's writer lock for their whole duration; reads take the
//! reader lock. Nodes never share locks with each other.
//!
//! # Push sequence
//!
//! ```text
//! verify ──> build registry ──> commit ──> load pipeline ──> add ports
//! ```
//!
//! Any failing step aborts the push. Steps already taken stay in effect.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use p4rt_driver::{Capabilities, LoadOutcome, PipelineDriver};
use p4rt_schema::SchemaRegistry;
use p4rt_types::{
    Atomicity, DeviceId, Entity, ForwardingPipelineConfig, ReadRequest, UpdateType, WriteRequest,
};
use parking_lot::{Mutex, RwLock};

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::error::{BatchOutcome, NodeError, NodeResult, Status};
use crate::table_manager::TableManager;
use crate::writer::ReadSink;

/// Counters kept by a device node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStats {
    /// Pipeline pushes that completed.
    pub pushes: u64,
    /// Individual updates applied successfully.
    pub updates_ok: u64,
    /// Individual updates that failed.
    pub updates_failed: u64,
    /// Entities read successfully.
    pub reads_ok: u64,
    /// Entities whose read failed.
    pub reads_failed: u64,
}

#[derive(Default)]
struct NodeState {
    config: Option<ForwardingPipelineConfig>,
    registry: Option<SchemaRegistry>,
    provisioned: Vec<String>,
}

/// Controller of one pipeline device.
pub struct DeviceNode<D: PipelineDriver> {
    node_id: DeviceId,
    driver: Arc<D>,
    manager: TableManager<D>,
    ports: Vec<String>,
    state: RwLock<NodeState>,
    stats: Mutex<NodeStats>,
}

impl<D: PipelineDriver> fmt::Debug for DeviceNode<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceNode")
            .field("node_id", &self.node_id)
            .field("ports", &self.ports)
            .field("stats", &*self.stats.lock())
            .finish()
    }
}

impl<D: PipelineDriver> DeviceNode<D> {
    /// Creates a node for device `node_id` that provisions `ports` on every
    /// push.
    pub fn new(node_id: DeviceId, driver: Arc<D>, ports: Vec<String>) -> Self {
        let manager = TableManager::new(Arc::clone(&driver), node_id);
        Self {
            node_id,
            driver,
            manager,
            ports,
            state: RwLock::new(NodeState::default()),
            stats: Mutex::new(NodeStats::default()),
        }
    }

    pub fn node_id(&self) -> DeviceId {
        self.node_id
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.manager.capabilities()
    }

    /// Returns the last pushed configuration, if any.
    pub fn pipeline_config(&self) -> Option<ForwardingPipelineConfig> {
        self.state.read().config.clone()
    }

    pub fn stats(&self) -> NodeStats {
        self.stats.lock().clone()
    }

    /// Checks that a configuration could be pushed, without touching the
    /// device.
    pub fn verify_pipeline_config(&self, config: &ForwardingPipelineConfig) -> NodeResult<()> {
        Self::build_registry(config).map(|_| ())
    }

    fn build_registry(config: &ForwardingPipelineConfig) -> NodeResult<SchemaRegistry> {
        let p4info = config
            .p4info
            .as_ref()
            .ok_or_else(|| NodeError::invalid_argument("pipeline config has no P4Info"))?;
        if config.p4_device_config.is_empty() {
            return Err(NodeError::invalid_argument(
                "pipeline config has an empty device config",
            ));
        }
        SchemaRegistry::new(p4info).map_err(|e| NodeError::invalid_argument(e.to_string()))
    }

    /// Verifies, commits and loads a pipeline, then provisions the node's
    /// ports.
    pub fn push_config(&self, config: ForwardingPipelineConfig) -> NodeResult<()> {
        let mut state = self.state.write();
        let bytes = config.p4_device_config.len();
        let result = self.push_locked(&mut state, config);

        let record = AuditRecord::new(AuditCategory::PipelineChange, "DeviceNode", "push_config")
            .with_object_id(self.node_id.to_string())
            .with_object_type("pipeline")
            .with_details(serde_json::json!({
                "device_config_bytes": bytes,
                "ports": self.ports,
            }));
        match &result {
            Ok(()) => {
                self.stats.lock().pushes += 1;
                audit_log!(record.with_outcome(AuditOutcome::Success));
            }
            Err(e) => {
                audit_log!(record.with_error(e.to_string()));
            }
        }
        result
    }

    fn push_locked(&self, state: &mut NodeState, config: ForwardingPipelineConfig) -> NodeResult<()> {
        let registry = Self::build_registry(&config)?;
        let program = config.p4_device_config.clone();
        state.registry = Some(registry);
        state.config = Some(config);

        match self.driver.load_pipeline(self.node_id, &program)? {
            LoadOutcome::Loaded => info!("Node {}: pipeline loaded", self.node_id),
            LoadOutcome::AlreadyLoaded => {
                info!("Node {}: pipeline already loaded, keeping it", self.node_id)
            }
        }

        for port in &self.ports {
            match self.driver.add_port(self.node_id, port) {
                Ok(id) => debug!("Node {}: port {} added as {}", self.node_id, port, id),
                Err(e) if e.is_already_exists() => {
                    debug!("Node {}: port {} already present", self.node_id, port)
                }
                Err(e) => return Err(e.into()),
            }
            if !state.provisioned.contains(port) {
                state.provisioned.push(port.clone());
            }
        }
        Ok(())
    }

    /// Applies a batch of updates in order, continuing past failures.
    ///
    /// Errors returned directly reject the whole batch before any update
    /// runs. Per-update failures land in the outcome's details.
    pub fn write_batch(&self, request: &WriteRequest) -> NodeResult<BatchOutcome> {
        self.check_device(request.device_id)
            .map_err(|e| self.rejected("write_batch", e))?;
        if request.atomicity != Atomicity::ContinueOnError {
            return Err(self.rejected(
                "write_batch",
                NodeError::invalid_argument(format!(
                    "atomicity {} is not supported",
                    request.atomicity
                )),
            ));
        }
        let state = self.state.write();
        let registry = state.registry.as_ref().ok_or_else(|| {
            self.rejected(
                "write_batch",
                NodeError::invalid_argument("no pipeline has been pushed"),
            )
        })?;

        let details: Vec<Status> = request
            .updates
            .iter()
            .map(|update| {
                let result = self.write_entity(registry, update.update_type, &update.entity);
                if let Err(e) = &result {
                    debug!("Node {}: {} {} failed: {}", self.node_id, update.update_type, update.entity, e);
                }
                Status::from(result)
            })
            .collect();
        let outcome = BatchOutcome::from_details(details);

        let failed = outcome.details.iter().filter(|s| !s.is_ok()).count() as u64;
        let total = outcome.details.len() as u64;
        {
            let mut stats = self.stats.lock();
            stats.updates_ok += total - failed;
            stats.updates_failed += failed;
        }
        let audit_outcome = if failed == 0 {
            AuditOutcome::Success
        } else if failed < total {
            AuditOutcome::Partial
        } else {
            AuditOutcome::Failure
        };
        audit_log!(AuditRecord::new(AuditCategory::EntityWrite, "DeviceNode", "write_batch")
            .with_outcome(audit_outcome)
            .with_object_id(self.node_id.to_string())
            .with_object_type("write_request")
            .with_details(serde_json::json!({
                "updates": total,
                "failed": failed,
            })));
        Ok(outcome)
    }

    fn write_entity(
        &self,
        registry: &SchemaRegistry,
        update_type: UpdateType,
        entity: &Entity,
    ) -> NodeResult<()> {
        let manager = &self.manager;
        match entity {
            Entity::TableEntry(e) => manager.write_table_entry(registry, update_type, e),
            Entity::CounterEntry(e) => manager.write_counter_entry(registry, update_type, e),
            Entity::DirectCounterEntry(e) => {
                manager.write_direct_counter_entry(registry, update_type, e)
            }
            Entity::MeterEntry(e) => manager.write_meter_entry(registry, update_type, e),
            Entity::RegisterEntry(e) => manager.write_register_entry(registry, update_type, e),
            Entity::ActionProfileMember(e) => {
                manager.write_action_profile_member(registry, update_type, e)
            }
            Entity::ActionProfileGroup(e) => {
                manager.write_action_profile_group(registry, update_type, e)
            }
            Entity::DirectMeterEntry(_)
            | Entity::PacketReplicationEngineEntry(_)
            | Entity::ValueSetEntry(_)
            | Entity::DigestEntry(_) => Err(NodeError::unimplemented(format!(
                "writing {} is not supported",
                entity.kind_name()
            ))),
        }
    }

    /// Reads every requested entity into `sink`, recording one outcome per
    /// requested entity.
    pub fn read_entities(
        &self,
        request: &ReadRequest,
        sink: &mut dyn ReadSink,
    ) -> NodeResult<BatchOutcome> {
        self.check_device(request.device_id)?;
        let state = self.state.read();
        let registry = state
            .registry
            .as_ref()
            .ok_or_else(|| NodeError::invalid_argument("no pipeline has been pushed"))?;

        let mut details = Vec::with_capacity(request.entities.len());
        for entity in &request.entities {
            let result = self.read_entity(registry, entity, sink);
            if let Err(e) = &result {
                debug!("Node {}: read of {} failed: {}", self.node_id, entity, e);
            }
            details.push(Status::from(result));
        }
        let outcome = BatchOutcome::from_details(details);

        let failed = outcome.details.iter().filter(|s| !s.is_ok()).count() as u64;
        let mut stats = self.stats.lock();
        stats.reads_ok += outcome.details.len() as u64 - failed;
        stats.reads_failed += failed;
        Ok(outcome)
    }

    fn read_entity(
        &self,
        registry: &SchemaRegistry,
        entity: &Entity,
        sink: &mut dyn ReadSink,
    ) -> NodeResult<()> {
        let manager = &self.manager;
        match entity {
            Entity::TableEntry(e) => manager.read_table_entry(registry, e, sink),
            Entity::CounterEntry(e) => manager.read_counter_entry(registry, e, sink),
            Entity::DirectCounterEntry(e) => manager.read_direct_counter_entry(registry, e, sink),
            Entity::MeterEntry(e) => manager.read_meter_entry(registry, e, sink),
            Entity::RegisterEntry(e) => manager.read_register_entry(registry, e, sink),
            Entity::ActionProfileMember(e) => {
                manager.read_action_profile_member(registry, e, sink)
            }
            Entity::ActionProfileGroup(e) => manager.read_action_profile_group(registry, e, sink),
            Entity::DirectMeterEntry(_)
            | Entity::PacketReplicationEngineEntry(_)
            | Entity::ValueSetEntry(_)
            | Entity::DigestEntry(_) => Err(NodeError::unimplemented(format!(
                "reading {} is not supported",
                entity.kind_name()
            ))),
        }
    }

    /// Removes provisioned ports and unloads the pipeline.
    ///
    /// Every step runs even if an earlier one fails; the first failure is
    /// returned.
    pub fn shutdown(&self) -> NodeResult<()> {
        let mut state = self.state.write();
        let mut first_error: Option<NodeError> = None;

        for port in std::mem::take(&mut state.provisioned) {
            if let Err(e) = self.driver.remove_port(self.node_id, &port) {
                warn!("Node {}: failed to remove port {}: {}", self.node_id, port, e);
                first_error.get_or_insert(e.into());
            }
        }
        if state.config.is_some() {
            if let Err(e) = self.driver.unload_pipeline(self.node_id) {
                warn!("Node {}: failed to unload pipeline: {}", self.node_id, e);
                first_error.get_or_insert(e.into());
            }
        }
        state.config = None;
        state.registry = None;

        let record = AuditRecord::new(AuditCategory::SystemLifecycle, "DeviceNode", "shutdown")
            .with_object_id(self.node_id.to_string())
            .with_object_type("node");
        match &first_error {
            None => {
                info!("Node {} shut down", self.node_id);
                audit_log!(record.with_outcome(AuditOutcome::Success));
            }
            Some(e) => {
                audit_log!(record.with_error(e.to_string()));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Records a write request turned away before any update ran.
    fn rejected(&self, operation: &str, error: NodeError) -> NodeError {
        audit_log!(AuditRecord::new(AuditCategory::ErrorCondition, "DeviceNode", operation)
            .with_object_id(self.node_id.to_string())
            .with_object_type("write_request")
            .with_error(error.to_string()));
        error
    }

    fn check_device(&self, device_id: DeviceId) -> NodeResult<()> {
        if device_id == self.node_id {
            Ok(())
        } else {
            Err(NodeError::invalid_argument(format!(
                "request for device {} sent to node {}",
                device_id, self.node_id
            )))
        }
    }
}
