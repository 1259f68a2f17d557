//! Register arrays.

use p4rt_driver::{KeyValue, PipelineDriver, ReservedField, TableContext};
use p4rt_schema::SchemaRegistry;
use p4rt_types::{Entity, RegisterEntry, UpdateType};

use super::{cell_indices, require_modify, TableManager};
use crate::error::{NodeError, NodeResult};
use crate::translator::normalize_name;
use crate::writer::ReadSink;

impl<D: PipelineDriver> TableManager<D> {
    pub fn write_register_entry(
        &self,
        registry: &SchemaRegistry,
        update_type: UpdateType,
        entry: &RegisterEntry,
    ) -> NodeResult<()> {
        self.require(self.capabilities.registers, "register entries")?;
        require_modify(update_type, "register entry")?;
        if entry.register_id == 0 {
            return Err(NodeError::invalid_argument("register ID must be nonzero"));
        }
        let register = registry.find_register_by_id(entry.register_id)?;
        let name = &register.preamble.name;
        let data = entry.data.as_ref().ok_or_else(|| {
            NodeError::invalid_argument(format!("register entry for {} has no data", name))
        })?;
        let value = self.translator.encode_register_value(register, data)?;
        let indices = cell_indices(entry.index, register.size, name)?;

        let driver = self.driver();
        let ctx = TableContext::resource(driver, self.device, &normalize_name(name))?;
        let h = *ctx.handles();
        for index in indices {
            driver.key_field_set(&h, ReservedField::RegisterIndex.id(), &KeyValue::index(index))?;
            driver.data_field_set(&h, ReservedField::RegisterData.id(), value.clone())?;
            driver.entry_update(&h)?;
        }
        ctx.release()?;
        Ok(())
    }

    pub fn read_register_entry(
        &self,
        registry: &SchemaRegistry,
        entry: &RegisterEntry,
        sink: &mut dyn ReadSink,
    ) -> NodeResult<()> {
        self.require(self.capabilities.registers, "register entries")?;
        if entry.register_id == 0 {
            return Err(NodeError::invalid_argument("register ID must be nonzero"));
        }
        let register = registry.find_register_by_id(entry.register_id)?;
        let name = &register.preamble.name;
        let indices = cell_indices(entry.index, register.size, name)?;

        let driver = self.driver();
        let ctx = TableContext::resource(driver, self.device, &normalize_name(name))?;
        let h = *ctx.handles();
        for index in indices {
            driver.key_field_set(&h, ReservedField::RegisterIndex.id(), &KeyValue::index(index))?;
            driver.entry_get(&h)?;
            let fields = driver.data_fields_get(&h)?;
            sink.write(Entity::RegisterEntry(RegisterEntry {
                register_id: register.preamble.id,
                index: Some(i64::from(index)),
                data: Some(self.translator.decode_register_value(&fields)),
            }))?;
        }
        ctx.release()?;
        Ok(())
    }
}
