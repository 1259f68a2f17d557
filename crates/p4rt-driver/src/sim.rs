//! In-memory backend.
//!
//! [`SimDriver`] implements [`PipelineDriver`] over plain maps so device
//! nodes can run without hardware. It follows the observable behaviour of
//! the real backends (idempotent loads, per-context key/data buffers,
//! iteration cursors, resource tables keyed by index) and keeps a journal of
//! every call. Failures can be injected per operation.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use log::{debug, info};
use parking_lot::Mutex;
use p4rt_types::DeviceId;

use crate::capabilities::Capabilities;
use crate::driver::PipelineDriver;
use crate::error::{DriverError, DriverResult, DriverStatus};
use crate::types::{
    ContextHandles, CounterHandles, CounterRecord, CounterValues, DataValue, Handle, HandleKind,
    KeyValue, LoadOutcome, RawHandle, ReservedField, TableHandles,
};

/// Driver operations recorded in the call journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    LoadPipeline,
    UnloadPipeline,
    AddPort,
    RemovePort,
    AcquireTableContext,
    AcquireCounterContext,
    AcquireResourceContext,
    Release,
    KeyFieldSet,
    PrioritySet,
    ActionSet,
    DataFieldSet,
    EntryAdd,
    EntryUpdate,
    EntryDelete,
    EntryGet,
    EntryGetNext,
    DefaultEntrySet,
    DefaultEntryReset,
    DefaultEntryGet,
    CounterGet,
    CounterGetNext,
    CounterSet,
}

/// One journal record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCall {
    pub op: DriverOp,
    /// Table, counter, port or device the call addressed.
    pub target: String,
}

type EntryKey = (Vec<(u32, KeyValue)>, u32);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EntryData {
    action: Option<u32>,
    data: BTreeMap<u32, DataValue>,
}

impl EntryData {
    /// Applies an update. Writing an action or any non-resource field
    /// replaces the entry; writing only direct resource fields merges.
    fn apply(&mut self, update: EntryData) {
        let replace = update.action.is_some()
            || update
                .data
                .keys()
                .any(|id| !ReservedField::is_direct_resource(*id));
        if replace {
            let kept: Vec<(u32, DataValue)> = self
                .data
                .iter()
                .filter(|(id, _)| {
                    ReservedField::is_direct_resource(**id) && !update.data.contains_key(*id)
                })
                .map(|(id, v)| (*id, v.clone()))
                .collect();
            *self = update;
            self.data.extend(kept);
        } else {
            self.data.extend(update.data);
        }
    }
}

#[derive(Debug, Default)]
struct SimTable {
    entries: BTreeMap<EntryKey, EntryData>,
    default_entry: Option<EntryData>,
}

#[derive(Debug)]
struct EntryBuffer {
    device: DeviceId,
    table: String,
    key: BTreeMap<u32, KeyValue>,
    priority: u32,
    entry: EntryData,
    cursor: Option<EntryKey>,
    started: bool,
}

impl EntryBuffer {
    fn table_key(&self) -> (DeviceId, String) {
        (self.device, self.table.clone())
    }

    fn entry_key(&self) -> EntryKey {
        (
            self.key.iter().map(|(id, v)| (*id, v.clone())).collect(),
            self.priority,
        )
    }

    /// True when the key addresses a cell of an index-keyed resource table.
    fn is_index_key(&self) -> bool {
        !self.key.is_empty() && self.key.keys().all(|id| ReservedField::is_index_key(*id))
    }

    fn load(&mut self, key: &EntryKey, entry: &EntryData) {
        self.key = key.0.iter().cloned().collect();
        self.priority = key.1;
        self.entry = entry.clone();
    }
}

#[derive(Debug)]
struct CounterBuffer {
    device: DeviceId,
    counter: String,
    position: usize,
}

#[derive(Debug, Default)]
struct State {
    next_handle: RawHandle,
    pipelines: HashMap<DeviceId, Vec<u8>>,
    transfers: usize,
    ports: HashMap<DeviceId, BTreeMap<String, u32>>,
    next_port: u32,
    tables: HashMap<(DeviceId, String), SimTable>,
    counters: HashMap<(DeviceId, String), Vec<(u32, CounterValues)>>,
    action_ids: BTreeMap<String, u32>,
    action_names: BTreeMap<u32, String>,
    entry_buffers: HashMap<RawHandle, EntryBuffer>,
    counter_buffers: HashMap<RawHandle, CounterBuffer>,
    open: HashMap<RawHandle, ContextHandles>,
    calls: Vec<DriverCall>,
    failures: HashMap<DriverOp, DriverStatus>,
}

impl State {
    fn alloc<K: HandleKind>(&mut self) -> Handle<K> {
        self.next_handle += 1;
        Handle::from_raw_unchecked(self.next_handle)
    }

    /// Journals a call and returns the injected failure, if any.
    fn enter(&mut self, op: DriverOp, target: impl Into<String>) -> DriverResult<()> {
        self.calls.push(DriverCall {
            op,
            target: target.into(),
        });
        match self.failures.get(&op) {
            Some(status) => status.into_result(),
            None => Ok(()),
        }
    }

    fn require_pipeline(&self, device: DeviceId) -> DriverResult<()> {
        if self.pipelines.contains_key(&device) {
            Ok(())
        } else {
            Err(DriverError::from_status(DriverStatus::Uninitialized))
        }
    }

    fn buffer(&mut self, h: &TableHandles) -> DriverResult<&mut EntryBuffer> {
        self.entry_buffers
            .get_mut(&h.entry.as_raw())
            .ok_or_else(|| DriverError::invalid_handle(h.entry))
    }

    fn counter_buffer(&mut self, h: &CounterHandles) -> DriverResult<&mut CounterBuffer> {
        self.counter_buffers
            .get_mut(&h.counter_entry.as_raw())
            .ok_or_else(|| DriverError::invalid_handle(h.counter_entry))
    }

    fn table_target(&self, h: &TableHandles) -> String {
        self.entry_buffers
            .get(&h.entry.as_raw())
            .map(|b| b.table.clone())
            .unwrap_or_default()
    }

    fn counter_target(&self, h: &CounterHandles) -> String {
        self.counter_buffers
            .get(&h.counter_entry.as_raw())
            .map(|b| b.counter.clone())
            .unwrap_or_default()
    }

    fn open_table(&mut self, device: DeviceId, table: &str) -> TableHandles {
        let handles = TableHandles {
            device_ctx: self.alloc(),
            entry: self.alloc(),
            entry_ctx: self.alloc(),
            action: self.alloc(),
        };
        self.entry_buffers.insert(
            handles.entry.as_raw(),
            EntryBuffer {
                device,
                table: table.to_string(),
                key: BTreeMap::new(),
                priority: 0,
                entry: EntryData::default(),
                cursor: None,
                started: false,
            },
        );
        self.open
            .insert(handles.device_ctx.as_raw(), ContextHandles::Table(handles));
        handles
    }
}

/// In-memory [`PipelineDriver`].
#[derive(Debug)]
pub struct SimDriver {
    capabilities: Capabilities,
    state: Mutex<State>,
}

impl SimDriver {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            state: Mutex::new(State::default()),
        }
    }

    pub fn asic() -> Self {
        Self::new(Capabilities::asic())
    }

    pub fn kernel_dataplane() -> Self {
        Self::new(Capabilities::kernel_dataplane())
    }

    /// Makes every later call of `op` fail with `status`.
    pub fn inject_failure(&self, op: DriverOp, status: DriverStatus) {
        self.state.lock().failures.insert(op, status);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Returns the call journal.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Returns how many times `op` was called.
    pub fn count(&self, op: DriverOp) -> usize {
        self.state.lock().calls.iter().filter(|c| c.op == op).count()
    }

    /// Returns the number of contexts acquired and not yet released.
    pub fn open_contexts(&self) -> usize {
        self.state.lock().open.len()
    }

    /// Returns how many programs were actually transferred to a device.
    pub fn program_transfers(&self) -> usize {
        self.state.lock().transfers
    }

    pub fn loaded_program(&self, device: DeviceId) -> Option<Vec<u8>> {
        self.state.lock().pipelines.get(&device).cloned()
    }

    pub fn ports(&self, device: DeviceId) -> Vec<String> {
        self.state
            .lock()
            .ports
            .get(&device)
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of entries installed in a table.
    pub fn entry_count(&self, device: DeviceId, table: &str) -> usize {
        self.state
            .lock()
            .tables
            .get(&(device, table.to_string()))
            .map_or(0, |t| t.entries.len())
    }

    /// Appends a raw record to a counter array, as the dataplane would when
    /// traffic hits it.
    pub fn seed_counter(&self, device: DeviceId, counter: &str, index: u32, values: CounterValues) {
        self.state
            .lock()
            .counters
            .entry((device, counter.to_string()))
            .or_default()
            .push((index, values));
    }
}

impl PipelineDriver for SimDriver {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn load_pipeline(&self, device: DeviceId, program: &[u8]) -> DriverResult<LoadOutcome> {
        let mut state = self.state.lock();
        state.enter(DriverOp::LoadPipeline, device.to_string())?;
        if state.pipelines.contains_key(&device) {
            debug!("Pipeline already loaded on device {}", device);
            return Ok(LoadOutcome::AlreadyLoaded);
        }
        if program.is_empty() {
            return Err(DriverError::invalid_parameter("empty program"));
        }
        state.pipelines.insert(device, program.to_vec());
        state.transfers += 1;
        info!(
            "Loaded {} byte program on {} device {}",
            program.len(),
            self.capabilities.kind,
            device
        );
        Ok(LoadOutcome::Loaded)
    }

    fn unload_pipeline(&self, device: DeviceId) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.enter(DriverOp::UnloadPipeline, device.to_string())?;
        if state.pipelines.remove(&device).is_none() {
            return Err(DriverError::not_found(format!("pipeline on device {}", device)));
        }
        state.tables.retain(|(d, _), _| *d != device);
        state.counters.retain(|(d, _), _| *d != device);
        info!("Unloaded pipeline from device {}", device);
        Ok(())
    }

    fn add_port(&self, device: DeviceId, name: &str) -> DriverResult<u32> {
        let mut state = self.state.lock();
        state.enter(DriverOp::AddPort, name)?;
        if state
            .ports
            .get(&device)
            .is_some_and(|p| p.contains_key(name))
        {
            return Err(DriverError::already_exists(format!("port {}", name)));
        }
        state.next_port += 1;
        let port = state.next_port;
        state
            .ports
            .entry(device)
            .or_default()
            .insert(name.to_string(), port);
        debug!("Added port {} as {} on device {}", name, port, device);
        Ok(port)
    }

    fn remove_port(&self, device: DeviceId, name: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.enter(DriverOp::RemovePort, name)?;
        match state.ports.get_mut(&device).and_then(|p| p.remove(name)) {
            Some(_) => Ok(()),
            None => Err(DriverError::not_found(format!("port {}", name))),
        }
    }

    fn acquire_table_context(&self, device: DeviceId, table: &str) -> DriverResult<TableHandles> {
        let mut state = self.state.lock();
        state.enter(DriverOp::AcquireTableContext, table)?;
        state.require_pipeline(device)?;
        Ok(state.open_table(device, table))
    }

    fn acquire_counter_context(
        &self,
        device: DeviceId,
        counter: &str,
    ) -> DriverResult<CounterHandles> {
        let mut state = self.state.lock();
        state.enter(DriverOp::AcquireCounterContext, counter)?;
        state.require_pipeline(device)?;
        let handles = CounterHandles {
            device_ctx: state.alloc(),
            counter_ctx: state.alloc(),
            counter_entry: state.alloc(),
        };
        state.counter_buffers.insert(
            handles.counter_entry.as_raw(),
            CounterBuffer {
                device,
                counter: counter.to_string(),
                position: 0,
            },
        );
        state
            .open
            .insert(handles.device_ctx.as_raw(), ContextHandles::Counter(handles));
        Ok(handles)
    }

    fn acquire_resource_context(
        &self,
        device: DeviceId,
        resource: &str,
    ) -> DriverResult<TableHandles> {
        let mut state = self.state.lock();
        state.enter(DriverOp::AcquireResourceContext, resource)?;
        if !self.capabilities.resource_tables() {
            return Err(DriverError::not_supported(format!(
                "resource table {}",
                resource
            )));
        }
        state.require_pipeline(device)?;
        Ok(state.open_table(device, resource))
    }

    fn release(&self, handles: &ContextHandles) -> DriverResult<()> {
        let mut state = self.state.lock();
        let target = match handles {
            ContextHandles::Table(h) => state.table_target(h),
            ContextHandles::Counter(h) => state.counter_target(h),
        };
        // An injected failure is reported after the handles are freed.
        let outcome = state.enter(DriverOp::Release, target);
        let device_ctx = match handles {
            ContextHandles::Table(h) => h.device_ctx,
            ContextHandles::Counter(h) => h.device_ctx,
        };
        if state.open.remove(&device_ctx.as_raw()).is_none() {
            return Err(DriverError::invalid_handle(device_ctx));
        }
        match handles {
            ContextHandles::Table(h) => {
                state.entry_buffers.remove(&h.entry.as_raw());
            }
            ContextHandles::Counter(h) => {
                state.counter_buffers.remove(&h.counter_entry.as_raw());
            }
        }
        outcome
    }

    fn key_field_set(
        &self,
        h: &TableHandles,
        field_id: u32,
        value: &KeyValue,
    ) -> DriverResult<()> {
        let mut state = self.state.lock();
        let target = state.table_target(h);
        state.enter(DriverOp::KeyFieldSet, target)?;
        state.buffer(h)?.key.insert(field_id, value.clone());
        Ok(())
    }

    fn key_fields_get(&self, h: &TableHandles) -> DriverResult<Vec<(u32, KeyValue)>> {
        let mut state = self.state.lock();
        let buffer = state.buffer(h)?;
        Ok(buffer.key.iter().map(|(id, v)| (*id, v.clone())).collect())
    }

    fn priority_set(&self, h: &TableHandles, priority: u32) -> DriverResult<()> {
        let mut state = self.state.lock();
        let target = state.table_target(h);
        state.enter(DriverOp::PrioritySet, target)?;
        state.buffer(h)?.priority = priority;
        Ok(())
    }

    fn priority_get(&self, h: &TableHandles) -> DriverResult<u32> {
        let mut state = self.state.lock();
        Ok(state.buffer(h)?.priority)
    }

    fn action_id_by_name(&self, h: &TableHandles, name: &str) -> DriverResult<u32> {
        let mut state = self.state.lock();
        state.buffer(h)?;
        if let Some(id) = state.action_ids.get(name) {
            return Ok(*id);
        }
        let id = state.action_ids.len() as u32 + 1;
        state.action_ids.insert(name.to_string(), id);
        state.action_names.insert(id, name.to_string());
        Ok(id)
    }

    fn action_set(&self, h: &TableHandles, action_id: u32) -> DriverResult<()> {
        let mut state = self.state.lock();
        let target = state.table_target(h);
        state.enter(DriverOp::ActionSet, target)?;
        if !state.action_names.contains_key(&action_id) {
            return Err(DriverError::not_found(format!("action {}", action_id)));
        }
        state.buffer(h)?.entry.action = Some(action_id);
        Ok(())
    }

    fn action_get(&self, h: &TableHandles) -> DriverResult<Option<u32>> {
        let mut state = self.state.lock();
        Ok(state.buffer(h)?.entry.action)
    }

    fn action_name(&self, h: &TableHandles, action_id: u32) -> DriverResult<String> {
        let mut state = self.state.lock();
        state.buffer(h)?;
        state
            .action_names
            .get(&action_id)
            .cloned()
            .ok_or_else(|| DriverError::not_found(format!("action {}", action_id)))
    }

    fn data_field_set(
        &self,
        h: &TableHandles,
        field_id: u32,
        value: DataValue,
    ) -> DriverResult<()> {
        let mut state = self.state.lock();
        let target = state.table_target(h);
        state.enter(DriverOp::DataFieldSet, target)?;
        if ReservedField::is_reserved(field_id) && !self.capabilities.direct_counters {
            return Err(DriverError::not_supported(format!(
                "data field 0x{:08x}",
                field_id
            )));
        }
        state.buffer(h)?.entry.data.insert(field_id, value);
        Ok(())
    }

    fn data_fields_get(&self, h: &TableHandles) -> DriverResult<Vec<(u32, DataValue)>> {
        let mut state = self.state.lock();
        let buffer = state.buffer(h)?;
        Ok(buffer
            .entry
            .data
            .iter()
            .map(|(id, v)| (*id, v.clone()))
            .collect())
    }

    fn entry_add(&self, h: &TableHandles) -> DriverResult<()> {
        let mut state = self.state.lock();
        let target = state.table_target(h);
        state.enter(DriverOp::EntryAdd, target.clone())?;
        let (table_key, key, entry) = {
            let buffer = state.buffer(h)?;
            (buffer.table_key(), buffer.entry_key(), buffer.entry.clone())
        };
        let table = state.tables.entry(table_key).or_default();
        if table.entries.contains_key(&key) {
            return Err(DriverError::already_exists(format!("entry in {}", target)));
        }
        table.entries.insert(key, entry);
        Ok(())
    }

    fn entry_update(&self, h: &TableHandles) -> DriverResult<()> {
        let mut state = self.state.lock();
        let target = state.table_target(h);
        state.enter(DriverOp::EntryUpdate, target.clone())?;
        let (table_key, key, entry, index_key) = {
            let buffer = state.buffer(h)?;
            (
                buffer.table_key(),
                buffer.entry_key(),
                buffer.entry.clone(),
                buffer.is_index_key(),
            )
        };
        let table = state.tables.entry(table_key).or_default();
        match table.entries.get_mut(&key) {
            Some(existing) => existing.apply(entry),
            None if index_key => {
                table.entries.insert(key, entry);
            }
            None => return Err(DriverError::not_found(format!("entry in {}", target))),
        }
        Ok(())
    }

    fn entry_delete(&self, h: &TableHandles) -> DriverResult<()> {
        let mut state = self.state.lock();
        let target = state.table_target(h);
        state.enter(DriverOp::EntryDelete, target.clone())?;
        let (table_key, key) = {
            let buffer = state.buffer(h)?;
            (buffer.table_key(), buffer.entry_key())
        };
        match state
            .tables
            .get_mut(&table_key)
            .and_then(|t| t.entries.remove(&key))
        {
            Some(_) => Ok(()),
            None => Err(DriverError::not_found(format!("entry in {}", target))),
        }
    }

    fn entry_get(&self, h: &TableHandles) -> DriverResult<()> {
        let mut state = self.state.lock();
        let target = state.table_target(h);
        state.enter(DriverOp::EntryGet, target.clone())?;
        let (table_key, key, index_key) = {
            let buffer = state.buffer(h)?;
            (buffer.table_key(), buffer.entry_key(), buffer.is_index_key())
        };
        let found = state
            .tables
            .get(&table_key)
            .and_then(|t| t.entries.get(&key))
            .cloned();
        let entry = match found {
            Some(entry) => entry,
            // Resource cells exist whether or not they were ever written.
            None if index_key => EntryData::default(),
            None => return Err(DriverError::not_found(format!("entry in {}", target))),
        };
        state.buffer(h)?.entry = entry;
        Ok(())
    }

    fn entry_get_next(&self, h: &TableHandles) -> DriverResult<bool> {
        let mut state = self.state.lock();
        let target = state.table_target(h);
        state.enter(DriverOp::EntryGetNext, target)?;
        let (table_key, cursor, started) = {
            let buffer = state.buffer(h)?;
            (buffer.table_key(), buffer.cursor.clone(), buffer.started)
        };
        let next = state.tables.get(&table_key).and_then(|t| match (started, cursor) {
            (true, Some(cursor)) => t
                .entries
                .range((Bound::Excluded(cursor), Bound::Unbounded))
                .next()
                .map(|(k, v)| (k.clone(), v.clone())),
            (true, None) => None,
            (false, _) => t
                .entries
                .iter()
                .next()
                .map(|(k, v)| (k.clone(), v.clone())),
        });
        let buffer = state.buffer(h)?;
        buffer.started = true;
        match next {
            Some((key, entry)) => {
                buffer.load(&key, &entry);
                buffer.cursor = Some(key);
                Ok(true)
            }
            None => {
                buffer.cursor = None;
                Ok(false)
            }
        }
    }

    fn default_entry_set(&self, h: &TableHandles) -> DriverResult<()> {
        let mut state = self.state.lock();
        let target = state.table_target(h);
        state.enter(DriverOp::DefaultEntrySet, target)?;
        let (table_key, entry) = {
            let buffer = state.buffer(h)?;
            (buffer.table_key(), buffer.entry.clone())
        };
        state.tables.entry(table_key).or_default().default_entry = Some(entry);
        Ok(())
    }

    fn default_entry_reset(&self, h: &TableHandles) -> DriverResult<()> {
        let mut state = self.state.lock();
        let target = state.table_target(h);
        state.enter(DriverOp::DefaultEntryReset, target)?;
        let table_key = state.buffer(h)?.table_key();
        state.tables.entry(table_key).or_default().default_entry = None;
        Ok(())
    }

    fn default_entry_get(&self, h: &TableHandles) -> DriverResult<()> {
        let mut state = self.state.lock();
        let target = state.table_target(h);
        state.enter(DriverOp::DefaultEntryGet, target)?;
        let table_key = state.buffer(h)?.table_key();
        let entry = state
            .tables
            .get(&table_key)
            .and_then(|t| t.default_entry.clone())
            .unwrap_or_default();
        state.buffer(h)?.entry = entry;
        Ok(())
    }

    fn counter_get(&self, h: &CounterHandles, index: u32) -> DriverResult<CounterValues> {
        let mut state = self.state.lock();
        let target = state.counter_target(h);
        state.enter(DriverOp::CounterGet, target)?;
        let buffer = state.counter_buffer(h)?;
        let key = (buffer.device, buffer.counter.clone());
        Ok(state
            .counters
            .get(&key)
            .and_then(|cells| cells.iter().find(|(i, _)| *i == index))
            .map(|(_, values)| *values)
            .unwrap_or_default())
    }

    fn counter_get_next(&self, h: &CounterHandles) -> DriverResult<Option<CounterRecord>> {
        let mut state = self.state.lock();
        let target = state.counter_target(h);
        state.enter(DriverOp::CounterGetNext, target)?;
        let (key, position) = {
            let buffer = state.counter_buffer(h)?;
            ((buffer.device, buffer.counter.clone()), buffer.position)
        };
        let record = state
            .counters
            .get(&key)
            .and_then(|cells| cells.get(position))
            .map(|(index, values)| CounterRecord {
                index: *index,
                values: *values,
            });
        if record.is_some() {
            state.counter_buffer(h)?.position += 1;
        }
        Ok(record)
    }

    fn counter_set(
        &self,
        h: &CounterHandles,
        index: u32,
        values: CounterValues,
    ) -> DriverResult<()> {
        let mut state = self.state.lock();
        let target = state.counter_target(h);
        state.enter(DriverOp::CounterSet, target)?;
        let key = {
            let buffer = state.counter_buffer(h)?;
            (buffer.device, buffer.counter.clone())
        };
        let cells = state.counters.entry(key).or_default();
        match cells.iter_mut().find(|(i, _)| *i == index) {
            Some((_, existing)) => *existing = values,
            None => cells.push((index, values)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loaded(driver: SimDriver) -> SimDriver {
        driver.load_pipeline(1, b"program").unwrap();
        driver
    }

    #[test]
    fn test_load_is_idempotent() {
        let driver = SimDriver::kernel_dataplane();
        assert_eq!(driver.load_pipeline(1, b"first").unwrap(), LoadOutcome::Loaded);
        assert_eq!(
            driver.load_pipeline(1, b"second").unwrap(),
            LoadOutcome::AlreadyLoaded
        );
        assert_eq!(driver.loaded_program(1), Some(b"first".to_vec()));
        assert_eq!(driver.program_transfers(), 1);
        assert_eq!(driver.count(DriverOp::LoadPipeline), 2);
    }

    #[test]
    fn test_ports() {
        let driver = loaded(SimDriver::asic());
        assert_eq!(driver.add_port(1, "eth0").unwrap(), 1);
        assert!(driver.add_port(1, "eth0").unwrap_err().is_already_exists());
        assert_eq!(driver.ports(1), vec!["eth0".to_string()]);
        driver.remove_port(1, "eth0").unwrap();
        assert!(driver.remove_port(1, "eth0").unwrap_err().is_not_found());
    }

    #[test]
    fn test_context_requires_pipeline() {
        let driver = SimDriver::asic();
        let err = driver.acquire_table_context(1, "ingress_tbl").unwrap_err();
        assert_eq!(err.status(), DriverStatus::Uninitialized);
    }

    #[test]
    fn test_entry_lifecycle() {
        let driver = loaded(SimDriver::asic());
        let h = driver.acquire_table_context(1, "ingress_tbl").unwrap();
        driver
            .key_field_set(&h, 1, &KeyValue::Exact(vec![0x0a]))
            .unwrap();
        let action = driver.action_id_by_name(&h, "ingress_fwd").unwrap();
        driver.action_set(&h, action).unwrap();
        driver
            .data_field_set(&h, 1, DataValue::Bytes(vec![0x01]))
            .unwrap();
        driver.entry_add(&h).unwrap();
        assert!(driver.entry_add(&h).unwrap_err().is_already_exists());
        driver.release(&h.into()).unwrap();
        assert_eq!(driver.entry_count(1, "ingress_tbl"), 1);

        let h = driver.acquire_table_context(1, "ingress_tbl").unwrap();
        driver
            .key_field_set(&h, 1, &KeyValue::Exact(vec![0x0a]))
            .unwrap();
        driver.entry_get(&h).unwrap();
        assert_eq!(driver.action_get(&h).unwrap(), Some(action));
        assert_eq!(driver.action_name(&h, action).unwrap(), "ingress_fwd");
        assert_eq!(
            driver.data_fields_get(&h).unwrap(),
            vec![(1, DataValue::Bytes(vec![0x01]))]
        );
        driver.entry_delete(&h).unwrap();
        assert!(driver.entry_get(&h).unwrap_err().is_not_found());
        driver.release(&h.into()).unwrap();
        assert_eq!(driver.open_contexts(), 0);
    }

    #[test]
    fn test_get_next_iterates_all_entries() {
        let driver = loaded(SimDriver::asic());
        for value in [3u8, 1, 2] {
            let h = driver.acquire_table_context(1, "ingress_tbl").unwrap();
            driver
                .key_field_set(&h, 1, &KeyValue::Exact(vec![value]))
                .unwrap();
            driver.entry_add(&h).unwrap();
            driver.release(&h.into()).unwrap();
        }

        let h = driver.acquire_table_context(1, "ingress_tbl").unwrap();
        let mut seen = Vec::new();
        while driver.entry_get_next(&h).unwrap() {
            seen.push(driver.key_fields_get(&h).unwrap());
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], vec![(1, KeyValue::Exact(vec![1]))]);
        assert!(!driver.entry_get_next(&h).unwrap());
    }

    #[test]
    fn test_update_merges_resource_fields() {
        let mut entry = EntryData {
            action: Some(1),
            data: BTreeMap::from([(1, DataValue::Bytes(vec![1]))]),
        };
        entry.apply(EntryData {
            action: None,
            data: BTreeMap::from([(ReservedField::CounterSpecPkts.id(), DataValue::U64(5))]),
        });
        assert_eq!(entry.action, Some(1));
        assert_eq!(entry.data.len(), 2);

        entry.apply(EntryData {
            action: Some(2),
            data: BTreeMap::new(),
        });
        assert_eq!(entry.action, Some(2));
        assert_eq!(
            entry.data.get(&ReservedField::CounterSpecPkts.id()),
            Some(&DataValue::U64(5))
        );
        assert_eq!(entry.data.get(&1), None);
    }

    #[test]
    fn test_resource_cells_upsert() {
        let driver = loaded(SimDriver::asic());
        let h = driver.acquire_resource_context(1, "ingress_meter").unwrap();
        driver
            .key_field_set(&h, ReservedField::MeterIndex.id(), &KeyValue::index(4))
            .unwrap();
        driver.entry_get(&h).unwrap();
        assert!(driver.data_fields_get(&h).unwrap().is_empty());
        driver
            .data_field_set(&h, ReservedField::MeterCir.id(), DataValue::U64(100))
            .unwrap();
        driver.entry_update(&h).unwrap();
        driver.release(&h.into()).unwrap();
        assert_eq!(driver.entry_count(1, "ingress_meter"), 1);
    }

    #[test]
    fn test_kernel_profile_rejects_resources() {
        let driver = loaded(SimDriver::kernel_dataplane());
        let err = driver.acquire_resource_context(1, "ingress_meter").unwrap_err();
        assert_eq!(err.status(), DriverStatus::NotSupported);
        let h = driver.acquire_table_context(1, "ingress_tbl").unwrap();
        let err = driver
            .data_field_set(&h, ReservedField::CounterSpecBytes.id(), DataValue::U64(1))
            .unwrap_err();
        assert_eq!(err.status(), DriverStatus::NotSupported);
    }

    #[test]
    fn test_resource_tables_follow_resource_flags() {
        let caps = Capabilities {
            meters: true,
            ..Capabilities::kernel_dataplane()
        };
        let driver = loaded(SimDriver::new(caps));
        let h = driver.acquire_resource_context(1, "ingress_meter").unwrap();
        driver.release(&h.into()).unwrap();

        let caps = Capabilities {
            meters: false,
            registers: false,
            action_profiles: false,
            ..Capabilities::asic()
        };
        let driver = loaded(SimDriver::new(caps));
        let err = driver.acquire_resource_context(1, "ingress_meter").unwrap_err();
        assert_eq!(err.status(), DriverStatus::NotSupported);
    }

    #[test]
    fn test_counter_iteration_reports_backend_indices() {
        let driver = loaded(SimDriver::kernel_dataplane());
        driver.seed_counter(1, "ingress_in_pkts", 7, CounterValues { bytes: 70, packets: 7 });
        driver.seed_counter(1, "ingress_in_pkts", 3, CounterValues { bytes: 30, packets: 3 });
        let h = driver.acquire_counter_context(1, "ingress_in_pkts").unwrap();
        assert_eq!(driver.counter_get_next(&h).unwrap().map(|r| r.index), Some(7));
        assert_eq!(driver.counter_get_next(&h).unwrap().map(|r| r.index), Some(3));
        assert_eq!(driver.counter_get_next(&h).unwrap(), None);
        assert_eq!(driver.counter_get(&h, 3).unwrap().packets, 3);
        assert_eq!(driver.counter_get(&h, 9).unwrap(), CounterValues::default());
        driver
            .counter_set(&h, 3, CounterValues { bytes: 0, packets: 0 })
            .unwrap();
        assert_eq!(driver.counter_get(&h, 3).unwrap().packets, 0);
    }

    #[test]
    fn test_injected_failure() {
        let driver = loaded(SimDriver::asic());
        driver.inject_failure(DriverOp::EntryAdd, DriverStatus::TableFull);
        let h = driver.acquire_table_context(1, "ingress_tbl").unwrap();
        let err = driver.entry_add(&h).unwrap_err();
        assert_eq!(err.status(), DriverStatus::TableFull);
        driver.clear_failures();
        driver.entry_add(&h).unwrap();
        assert_eq!(
            driver.calls().last(),
            Some(&DriverCall {
                op: DriverOp::EntryAdd,
                target: "ingress_tbl".to_string()
            })
        );
    }

    #[test]
    fn test_release_twice_is_invalid() {
        let driver = loaded(SimDriver::asic());
        let h: ContextHandles = driver.acquire_table_context(1, "ingress_tbl").unwrap().into();
        driver.release(&h).unwrap();
        assert_eq!(
            driver.release(&h).unwrap_err().status(),
            DriverStatus::InvalidHandle
        );
    }
}
