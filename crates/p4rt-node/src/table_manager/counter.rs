//! Indirect and direct counters.

use log::debug;
use p4rt_driver::{CounterContext, CounterValues, PipelineDriver, TableContext, TableHandles};
use p4rt_schema::SchemaRegistry;
use p4rt_types::p4info::Table;
use p4rt_types::{CounterEntry, DirectCounterEntry, Entity, TableEntry, UpdateType};

use super::{cell_index, cell_indices, require_modify, TableManager};
use crate::error::{NodeError, NodeResult};
use crate::translator::{
    direct_counter_from_fields, normalize_name, set_direct_counter, to_counter_data,
    to_counter_values,
};
use crate::writer::ReadSink;

impl<D: PipelineDriver> TableManager<D> {
    /// Sets one counter cell, or every cell when no index is given. Missing
    /// data resets the cells to zero.
    pub fn write_counter_entry(
        &self,
        registry: &SchemaRegistry,
        update_type: UpdateType,
        entry: &CounterEntry,
    ) -> NodeResult<()> {
        require_modify(update_type, "counter entry")?;
        if entry.counter_id == 0 {
            return Err(NodeError::invalid_argument("counter ID must be nonzero"));
        }
        let counter = registry.find_counter_by_id(entry.counter_id)?;
        let name = &counter.preamble.name;
        let indices = cell_indices(entry.index, counter.size, name)?;
        let values = match &entry.data {
            Some(data) => to_counter_values(data)?,
            None => CounterValues::default(),
        };

        let driver = self.driver();
        let ctx = CounterContext::counter(driver, self.device, &normalize_name(name))?;
        for index in &indices {
            driver.counter_set(ctx.handles(), *index, values)?;
        }
        ctx.release()?;
        debug!("Set {} cells of counter {}", indices.len(), name);
        Ok(())
    }

    /// Reads one counter cell, or every cell the backend reports.
    ///
    /// Wildcard reads number the reported cells 0, 1, 2, ... in iteration
    /// order. Backend record indices are not used.
    pub fn read_counter_entry(
        &self,
        registry: &SchemaRegistry,
        entry: &CounterEntry,
        sink: &mut dyn ReadSink,
    ) -> NodeResult<()> {
        if entry.counter_id == 0 {
            return Err(NodeError::invalid_argument("counter ID must be nonzero"));
        }
        let counter = registry.find_counter_by_id(entry.counter_id)?;
        let name = &counter.preamble.name;
        let cell = entry
            .index
            .map(|index| cell_index(index, counter.size, name))
            .transpose()?;

        let driver = self.driver();
        let ctx = CounterContext::counter(driver, self.device, &normalize_name(name))?;
        let h = *ctx.handles();
        match cell {
            Some(cell) => {
                let values = driver.counter_get(&h, cell)?;
                sink.write(Entity::CounterEntry(CounterEntry {
                    counter_id: counter.preamble.id,
                    index: Some(i64::from(cell)),
                    data: Some(to_counter_data(values)?),
                }))?;
            }
            None => {
                let mut index = 0i64;
                while let Some(record) = driver.counter_get_next(&h)? {
                    sink.write(Entity::CounterEntry(CounterEntry {
                        counter_id: counter.preamble.id,
                        index: Some(index),
                        data: Some(to_counter_data(record.values)?),
                    }))?;
                    index += 1;
                }
            }
        }
        ctx.release()?;
        Ok(())
    }

    /// Updates the counter attached to an existing table entry.
    pub fn write_direct_counter_entry(
        &self,
        registry: &SchemaRegistry,
        update_type: UpdateType,
        entry: &DirectCounterEntry,
    ) -> NodeResult<()> {
        self.require(self.capabilities.direct_counters, "direct counter entries")?;
        require_modify(update_type, "direct counter entry")?;
        let table = self.direct_counter_table(registry, &entry.table_entry)?;
        let values = match &entry.data {
            Some(data) => to_counter_values(data)?,
            None => CounterValues::default(),
        };

        let driver = self.driver();
        let ctx = TableContext::table(driver, self.device, &normalize_name(&table.preamble.name))?;
        let h = *ctx.handles();
        self.translator.encode_key(
            driver,
            &h,
            table,
            &entry.table_entry.matches,
            entry.table_entry.priority,
        )?;
        set_direct_counter(driver, &h, values)?;
        driver.entry_update(&h)?;
        ctx.release()?;
        Ok(())
    }

    /// Reads the counter of one table entry, or of every entry when the
    /// table entry has no match fields.
    pub fn read_direct_counter_entry(
        &self,
        registry: &SchemaRegistry,
        entry: &DirectCounterEntry,
        sink: &mut dyn ReadSink,
    ) -> NodeResult<()> {
        self.require(self.capabilities.direct_counters, "direct counter entries")?;
        let table = self.direct_counter_table(registry, &entry.table_entry)?;

        let driver = self.driver();
        let ctx = TableContext::table(driver, self.device, &normalize_name(&table.preamble.name))?;
        let h = *ctx.handles();
        let request = &entry.table_entry;
        if request.matches.is_empty() {
            while driver.entry_get_next(&h)? {
                self.emit_direct_counter(table, &h, sink)?;
            }
        } else {
            self.translator
                .encode_key(driver, &h, table, &request.matches, request.priority)?;
            driver.entry_get(&h)?;
            self.emit_direct_counter(table, &h, sink)?;
        }
        ctx.release()?;
        Ok(())
    }

    fn emit_direct_counter(
        &self,
        table: &Table,
        h: &TableHandles,
        sink: &mut dyn ReadSink,
    ) -> NodeResult<()> {
        let driver = self.driver();
        let (matches, priority) = self.translator.decode_key(driver, h, table)?;
        let fields = driver.data_fields_get(h)?;
        sink.write(Entity::DirectCounterEntry(DirectCounterEntry {
            table_entry: TableEntry {
                table_id: table.preamble.id,
                matches,
                priority,
                ..Default::default()
            },
            data: Some(to_counter_data(direct_counter_from_fields(&fields))?),
        }))
    }

    fn direct_counter_table<'r>(
        &self,
        registry: &'r SchemaRegistry,
        entry: &TableEntry,
    ) -> NodeResult<&'r Table> {
        let table = registry.find_table_by_id(entry.table_id)?;
        if registry.direct_counter_for_table(table.preamble.id).is_none() {
            return Err(NodeError::invalid_argument(format!(
                "table {} has no direct counter",
                table.preamble.name
            )));
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusCode;
    use crate::fixtures::*;
    use p4rt_driver::{Capabilities, DriverOp};
    use p4rt_types::{Action, CounterData, FieldMatch};
    use pretty_assertions::assert_eq;

    fn cell(index: i64, bytes: i64, packets: i64) -> Entity {
        Entity::CounterEntry(CounterEntry {
            counter_id: IN_PKTS,
            index: Some(index),
            data: Some(CounterData {
                byte_count: bytes,
                packet_count: packets,
            }),
        })
    }

    #[test]
    fn test_wildcard_read_numbers_cells() {
        let (driver, manager) = manager(Capabilities::kernel_dataplane());
        for (raw, packets) in [(7u32, 1u64), (42, 2), (3, 3)] {
            driver.seed_counter(
                1,
                "ingress_in_pkts",
                raw,
                CounterValues {
                    bytes: packets * 100,
                    packets,
                },
            );
        }

        let mut entities = Vec::new();
        let request = CounterEntry {
            counter_id: IN_PKTS,
            ..Default::default()
        };
        manager
            .read_counter_entry(&registry(), &request, &mut entities)
            .unwrap();
        assert_eq!(
            entities,
            vec![cell(0, 100, 1), cell(1, 200, 2), cell(2, 300, 3)]
        );
        assert_eq!(driver.open_contexts(), 0);
    }

    #[test]
    fn test_write_and_read_cell() {
        let (_, manager) = manager(Capabilities::asic());
        let registry = registry();
        let entry = CounterEntry {
            counter_id: IN_PKTS,
            index: Some(5),
            data: Some(CounterData {
                byte_count: 64,
                packet_count: 1,
            }),
        };
        manager
            .write_counter_entry(&registry, UpdateType::Modify, &entry)
            .unwrap();

        let mut entities = Vec::new();
        manager
            .read_counter_entry(&registry, &entry, &mut entities)
            .unwrap();
        assert_eq!(entities, vec![cell(5, 64, 1)]);
    }

    #[test]
    fn test_write_without_index_resets_all() {
        let (driver, manager) = manager(Capabilities::kernel_dataplane());
        let entry = CounterEntry {
            counter_id: IN_PKTS,
            index: None,
            data: None,
        };
        manager
            .write_counter_entry(&registry(), UpdateType::Modify, &entry)
            .unwrap();
        assert_eq!(driver.count(DriverOp::CounterSet), 1024);
    }

    #[test]
    fn test_counter_validation() {
        let (driver, manager) = manager(Capabilities::asic());
        let registry = registry();
        let zero_id = CounterEntry::default();
        let err = manager
            .write_counter_entry(&registry, UpdateType::Modify, &zero_id)
            .unwrap_err();
        assert_eq!(err.code, StatusCode::InvalidArgument);

        let negative = CounterEntry {
            counter_id: IN_PKTS,
            index: Some(-1),
            data: None,
        };
        let err = manager
            .read_counter_entry(&registry, &negative, &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.code, StatusCode::InvalidArgument);

        let insert = CounterEntry {
            counter_id: IN_PKTS,
            index: Some(0),
            data: None,
        };
        let err = manager
            .write_counter_entry(&registry, UpdateType::Insert, &insert)
            .unwrap_err();
        assert_eq!(err.code, StatusCode::InvalidArgument);

        let unknown = CounterEntry {
            counter_id: 999,
            index: Some(0),
            data: None,
        };
        let err = manager
            .read_counter_entry(&registry, &unknown, &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.code, StatusCode::NotFound);
        assert_eq!(driver.count(DriverOp::AcquireCounterContext), 0);
    }

    #[test]
    fn test_direct_counter_entry() {
        let (_, manager) = manager(Capabilities::asic());
        let registry = registry();
        let key = FieldMatch::exact(1, vec![0x02, 0, 0, 0, 0, 0x01]);
        let table_entry = TableEntry::new(SWITCHING)
            .with_match(key.clone())
            .with_action(Action::new(DROP));
        manager
            .write_table_entry(&registry, UpdateType::Insert, &table_entry)
            .unwrap();

        let data = CounterData {
            byte_count: 1500,
            packet_count: 1,
        };
        let direct = DirectCounterEntry {
            table_entry: TableEntry::new(SWITCHING).with_match(key.clone()),
            data: Some(data),
        };
        manager
            .write_direct_counter_entry(&registry, UpdateType::Modify, &direct)
            .unwrap();

        let mut entities = Vec::new();
        let request = DirectCounterEntry {
            table_entry: TableEntry::new(SWITCHING),
            data: None,
        };
        manager
            .read_direct_counter_entry(&registry, &request, &mut entities)
            .unwrap();
        assert_eq!(entities, vec![Entity::DirectCounterEntry(direct)]);

        // The counter update leaves the entry's action in place.
        let mut tables = Vec::new();
        manager
            .read_table_entry(&registry, &TableEntry::new(SWITCHING), &mut tables)
            .unwrap();
        assert_eq!(tables, vec![Entity::TableEntry(table_entry)]);
    }

    #[test]
    fn test_direct_counter_unimplemented_on_kernel() {
        let (_, manager) = manager(Capabilities::kernel_dataplane());
        let request = DirectCounterEntry {
            table_entry: TableEntry::new(SWITCHING),
            data: None,
        };
        let err = manager
            .read_direct_counter_entry(&registry(), &request, &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.code, StatusCode::Unimplemented);
    }
}
