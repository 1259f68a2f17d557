//! Indirect meters.

use p4rt_driver::{KeyValue, PipelineDriver, ReservedField, TableContext};
use p4rt_schema::SchemaRegistry;
use p4rt_types::{Entity, MeterEntry, UpdateType};

use super::{cell_indices, require_modify, TableManager};
use crate::error::{NodeError, NodeResult};
use crate::translator::{meter_config_from_fields, normalize_name, set_meter_config};
use crate::writer::ReadSink;

impl<D: PipelineDriver> TableManager<D> {
    /// Configures one meter cell, or every cell when no index is given.
    pub fn write_meter_entry(
        &self,
        registry: &SchemaRegistry,
        update_type: UpdateType,
        entry: &MeterEntry,
    ) -> NodeResult<()> {
        self.require(self.capabilities.meters, "meter entries")?;
        require_modify(update_type, "meter entry")?;
        if entry.meter_id == 0 {
            return Err(NodeError::invalid_argument("meter ID must be nonzero"));
        }
        let meter = registry.find_meter_by_id(entry.meter_id)?;
        let name = &meter.preamble.name;
        let config = entry.config.as_ref().ok_or_else(|| {
            NodeError::invalid_argument(format!("meter entry for {} has no config", name))
        })?;
        let indices = cell_indices(entry.index, meter.size, name)?;

        let driver = self.driver();
        let ctx = TableContext::resource(driver, self.device, &normalize_name(name))?;
        let h = *ctx.handles();
        for index in indices {
            driver.key_field_set(&h, ReservedField::MeterIndex.id(), &KeyValue::index(index))?;
            set_meter_config(driver, &h, config)?;
            driver.entry_update(&h)?;
        }
        ctx.release()?;
        Ok(())
    }

    /// Reads one meter cell, or every cell when no index is given. Cells
    /// never configured come back without a config.
    pub fn read_meter_entry(
        &self,
        registry: &SchemaRegistry,
        entry: &MeterEntry,
        sink: &mut dyn ReadSink,
    ) -> NodeResult<()> {
        self.require(self.capabilities.meters, "meter entries")?;
        if entry.meter_id == 0 {
            return Err(NodeError::invalid_argument("meter ID must be nonzero"));
        }
        let meter = registry.find_meter_by_id(entry.meter_id)?;
        let name = &meter.preamble.name;
        let indices = cell_indices(entry.index, meter.size, name)?;

        let driver = self.driver();
        let ctx = TableContext::resource(driver, self.device, &normalize_name(name))?;
        let h = *ctx.handles();
        for index in indices {
            driver.key_field_set(&h, ReservedField::MeterIndex.id(), &KeyValue::index(index))?;
            driver.entry_get(&h)?;
            let fields = driver.data_fields_get(&h)?;
            sink.write(Entity::MeterEntry(MeterEntry {
                meter_id: meter.preamble.id,
                index: Some(i64::from(index)),
                config: meter_config_from_fields(&fields)?,
            }))?;
        }
        ctx.release()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusCode;
    use crate::fixtures::*;
    use p4rt_driver::Capabilities;
    use p4rt_types::MeterConfig;
    use pretty_assertions::assert_eq;

    const CONFIG: MeterConfig = MeterConfig {
        cir: 1_000_000,
        cburst: 10_000,
        pir: 2_000_000,
        pburst: 20_000,
    };

    #[test]
    fn test_write_and_read_meter() {
        let (driver, manager) = manager(Capabilities::asic());
        let registry = registry();
        let entry = MeterEntry {
            meter_id: PORT_METER,
            index: Some(3),
            config: Some(CONFIG),
        };
        manager
            .write_meter_entry(&registry, UpdateType::Modify, &entry)
            .unwrap();

        let mut entities = Vec::new();
        let request = MeterEntry {
            meter_id: PORT_METER,
            index: Some(3),
            config: None,
        };
        manager
            .read_meter_entry(&registry, &request, &mut entities)
            .unwrap();
        assert_eq!(entities, vec![Entity::MeterEntry(entry)]);

        let mut all = Vec::new();
        let request = MeterEntry {
            meter_id: PORT_METER,
            ..Default::default()
        };
        manager.read_meter_entry(&registry, &request, &mut all).unwrap();
        assert_eq!(all.len(), 64);
        assert_eq!(
            all[0],
            Entity::MeterEntry(MeterEntry {
                meter_id: PORT_METER,
                index: Some(0),
                config: None,
            })
        );
        assert_eq!(driver.open_contexts(), 0);
    }

    #[test]
    fn test_meter_requires_config() {
        let (_, manager) = manager(Capabilities::asic());
        let entry = MeterEntry {
            meter_id: PORT_METER,
            index: Some(0),
            config: None,
        };
        let err = manager
            .write_meter_entry(&registry(), UpdateType::Modify, &entry)
            .unwrap_err();
        assert_eq!(err.code, StatusCode::InvalidArgument);
    }

    #[test]
    fn test_meter_unimplemented_on_kernel() {
        let (_, manager) = manager(Capabilities::kernel_dataplane());
        let entry = MeterEntry {
            meter_id: PORT_METER,
            index: Some(0),
            config: Some(CONFIG),
        };
        let err = manager
            .write_meter_entry(&registry(), UpdateType::Modify, &entry)
            .unwrap_err();
        assert_eq!(err.code, StatusCode::Unimplemented);
    }
}
