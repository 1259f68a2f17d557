//! The capability trait every backend implements.

use p4rt_types::DeviceId;

use crate::capabilities::Capabilities;
use crate::error::{DriverError, DriverResult};
use crate::types::{
    ContextHandles, CounterHandles, CounterRecord, CounterValues, DataValue, KeyValue,
    LoadOutcome, TableHandles,
};

/// Synchronous interface to a packet-processing backend.
///
/// Entry operations work on the key/data buffer behind a [`TableHandles`]:
/// callers fill the buffer with the setters, then invoke an entry call.
/// Getters read back whatever the last get or get-next loaded. Calls may
/// block on device or kernel I/O.
pub trait PipelineDriver: Send + Sync {
    /// Describes the backend flavour.
    fn capabilities(&self) -> Capabilities;

    // Pipeline and ports

    /// Loads a program. A device that already runs a pipeline is left alone.
    fn load_pipeline(&self, device: DeviceId, program: &[u8]) -> DriverResult<LoadOutcome>;
    fn unload_pipeline(&self, device: DeviceId) -> DriverResult<()>;
    /// Adds a port and returns its backend port number.
    fn add_port(&self, device: DeviceId, name: &str) -> DriverResult<u32>;
    fn remove_port(&self, device: DeviceId, name: &str) -> DriverResult<()>;

    // Programming contexts

    fn acquire_table_context(&self, device: DeviceId, table: &str) -> DriverResult<TableHandles>;
    fn acquire_counter_context(
        &self,
        device: DeviceId,
        counter: &str,
    ) -> DriverResult<CounterHandles>;
    /// Binds a context to an extern resource table (meter, register, action
    /// profile or selector). Only ASIC backends expose these.
    fn acquire_resource_context(
        &self,
        _device: DeviceId,
        resource: &str,
    ) -> DriverResult<TableHandles> {
        Err(DriverError::not_supported(format!("resource table {}", resource)))
    }
    fn release(&self, handles: &ContextHandles) -> DriverResult<()>;

    // Key buffer

    fn key_field_set(&self, h: &TableHandles, field_id: u32, value: &KeyValue)
        -> DriverResult<()>;
    fn key_fields_get(&self, h: &TableHandles) -> DriverResult<Vec<(u32, KeyValue)>>;
    fn priority_set(&self, h: &TableHandles, priority: u32) -> DriverResult<()>;
    fn priority_get(&self, h: &TableHandles) -> DriverResult<u32>;

    // Data buffer

    /// Resolves a backend action ID from its normalized name.
    fn action_id_by_name(&self, h: &TableHandles, name: &str) -> DriverResult<u32>;
    fn action_set(&self, h: &TableHandles, action_id: u32) -> DriverResult<()>;
    /// Returns the action loaded in the buffer, if any.
    fn action_get(&self, h: &TableHandles) -> DriverResult<Option<u32>>;
    fn action_name(&self, h: &TableHandles, action_id: u32) -> DriverResult<String>;
    fn data_field_set(&self, h: &TableHandles, field_id: u32, value: DataValue)
        -> DriverResult<()>;
    fn data_fields_get(&self, h: &TableHandles) -> DriverResult<Vec<(u32, DataValue)>>;

    // Entries

    fn entry_add(&self, h: &TableHandles) -> DriverResult<()>;
    fn entry_update(&self, h: &TableHandles) -> DriverResult<()>;
    /// Deletes the entry matching the key buffer.
    fn entry_delete(&self, h: &TableHandles) -> DriverResult<()>;
    /// Loads the entry matching the key buffer into the data buffer.
    fn entry_get(&self, h: &TableHandles) -> DriverResult<()>;
    /// Loads the next entry of the bound table into the buffers. The first
    /// call on a context starts from the beginning. Returns false when the
    /// table is exhausted.
    fn entry_get_next(&self, h: &TableHandles) -> DriverResult<bool>;
    fn default_entry_set(&self, h: &TableHandles) -> DriverResult<()>;
    fn default_entry_reset(&self, h: &TableHandles) -> DriverResult<()>;
    fn default_entry_get(&self, h: &TableHandles) -> DriverResult<()>;

    // Counters

    fn counter_get(&self, h: &CounterHandles, index: u32) -> DriverResult<CounterValues>;
    /// Returns the next record of the bound counter array, starting from the
    /// beginning on the first call.
    fn counter_get_next(&self, h: &CounterHandles) -> DriverResult<Option<CounterRecord>>;
    fn counter_set(&self, h: &CounterHandles, index: u32, values: CounterValues)
        -> DriverResult<()>;
}
