//! Match-action table entries.

use log::debug;
use p4rt_driver::{DataValue, PipelineDriver, ReservedField, TableContext, TableHandles};
use p4rt_schema::SchemaRegistry;
use p4rt_types::p4info::{self, ActionScope, Table};
use p4rt_types::{Action, Entity, TableAction, TableEntry, UpdateType};

use super::TableManager;
use crate::error::{NodeError, NodeResult};
use crate::translator::{
    direct_counter_from_fields, meter_config_from_fields, normalize_name, set_direct_counter,
    set_meter_config, to_counter_data, to_counter_values,
};
use crate::writer::ReadSink;

/// Action of a table entry after schema validation.
enum ResolvedAction<'a> {
    Direct(&'a p4info::Action, &'a Action),
    Member(u32),
    Group(u32),
}

impl<D: PipelineDriver> TableManager<D> {
    /// Inserts, modifies or deletes a table entry, or sets the table's
    /// default action.
    pub fn write_table_entry(
        &self,
        registry: &SchemaRegistry,
        update_type: UpdateType,
        entry: &TableEntry,
    ) -> NodeResult<()> {
        if update_type == UpdateType::Unspecified {
            return Err(NodeError::invalid_argument("unspecified update type"));
        }
        let table = registry.find_table_by_id(entry.table_id)?;
        if entry.is_default_action {
            return self.write_default_entry(registry, table, update_type, entry);
        }
        if table.is_const_table {
            return Err(NodeError::permission_denied(format!(
                "table {} is const",
                table.preamble.name
            )));
        }

        let action = match update_type {
            UpdateType::Delete => None,
            _ => {
                let action = entry.action.as_ref().ok_or_else(|| {
                    NodeError::invalid_argument(format!(
                        "entry for {} has no action",
                        table.preamble.name
                    ))
                })?;
                Some(self.resolve_action(registry, table, action)?)
            }
        };
        if update_type != UpdateType::Delete {
            self.check_direct_resources(registry, table, entry)?;
        }

        let driver = self.driver();
        let ctx = TableContext::table(driver, self.device, &normalize_name(&table.preamble.name))?;
        let h = *ctx.handles();
        self.translator
            .encode_key(driver, &h, table, &entry.matches, entry.priority)?;
        if let Some(action) = &action {
            self.encode_table_action(&h, action)?;
            if let Some(data) = &entry.counter_data {
                set_direct_counter(driver, &h, to_counter_values(data)?)?;
            }
            if let Some(config) = &entry.meter_config {
                set_meter_config(driver, &h, config)?;
            }
        }
        match update_type {
            UpdateType::Insert => driver.entry_add(&h)?,
            UpdateType::Modify => driver.entry_update(&h)?,
            UpdateType::Delete => driver.entry_delete(&h)?,
            UpdateType::Unspecified => {
                return Err(NodeError::invalid_argument("unspecified update type"))
            }
        }
        ctx.release()?;
        debug!("{} entry in {}", update_type, table.preamble.name);
        Ok(())
    }

    /// Reads table entries matching `entry` into `sink`.
    ///
    /// Table ID zero reads every table. An entry without match fields reads
    /// all entries of the table; a default action entry reads only the
    /// default action. Counter data is filled in when the request carries
    /// it.
    pub fn read_table_entry(
        &self,
        registry: &SchemaRegistry,
        entry: &TableEntry,
        sink: &mut dyn ReadSink,
    ) -> NodeResult<()> {
        if entry.counter_data.is_some() {
            self.require(self.capabilities.direct_counters, "direct counter reads")?;
        }
        if entry.table_id == 0 {
            if !entry.matches.is_empty() {
                return Err(NodeError::invalid_argument(
                    "match fields given for a wildcard table read",
                ));
            }
            for table in registry.tables() {
                self.read_table(registry, table, entry, sink)?;
            }
            return Ok(());
        }
        let table = registry.find_table_by_id(entry.table_id)?;
        if entry.counter_data.is_some() && registry.direct_counter_for_table(table.preamble.id).is_none() {
            return Err(NodeError::invalid_argument(format!(
                "table {} has no direct counter",
                table.preamble.name
            )));
        }
        self.read_table(registry, table, entry, sink)
    }

    fn read_table(
        &self,
        registry: &SchemaRegistry,
        table: &Table,
        request: &TableEntry,
        sink: &mut dyn ReadSink,
    ) -> NodeResult<()> {
        let with_counters = request.counter_data.is_some()
            && registry.direct_counter_for_table(table.preamble.id).is_some();
        let driver = self.driver();
        let ctx = TableContext::table(driver, self.device, &normalize_name(&table.preamble.name))?;
        let h = *ctx.handles();

        if request.is_default_action {
            driver.default_entry_get(&h)?;
            let fields = driver.data_fields_get(&h)?;
            let action = self.translator.decode_action(
                driver,
                &h,
                registry,
                table.action_refs.iter().map(|r| r.id),
                &fields,
            )?;
            sink.write(Entity::TableEntry(TableEntry::default_action(
                table.preamble.id,
                action,
            )))?;
        } else if request.matches.is_empty() {
            while driver.entry_get_next(&h)? {
                let entry = self.decode_entry(registry, table, &h, with_counters)?;
                sink.write(Entity::TableEntry(entry))?;
            }
        } else {
            self.translator
                .encode_key(driver, &h, table, &request.matches, request.priority)?;
            driver.entry_get(&h)?;
            let entry = self.decode_entry(registry, table, &h, with_counters)?;
            sink.write(Entity::TableEntry(entry))?;
        }
        ctx.release()?;
        Ok(())
    }

    fn write_default_entry(
        &self,
        registry: &SchemaRegistry,
        table: &Table,
        update_type: UpdateType,
        entry: &TableEntry,
    ) -> NodeResult<()> {
        let name = &table.preamble.name;
        if update_type != UpdateType::Modify {
            return Err(NodeError::invalid_argument(format!(
                "default action of {} supports only MODIFY, got {}",
                name, update_type
            )));
        }
        if !entry.matches.is_empty() || entry.priority != 0 {
            return Err(NodeError::invalid_argument(format!(
                "default action entry for {} must have no match fields and no priority",
                name
            )));
        }
        if table.const_default_action_id != 0 {
            return Err(NodeError::permission_denied(format!(
                "default action of {} is const",
                name
            )));
        }
        let action = match &entry.action {
            None => None,
            Some(TableAction::Action(action)) => {
                let schema = registry.find_action_by_id(action.action_id)?;
                match table.action_ref(action.action_id).map(|r| r.scope) {
                    Some(ActionScope::TableAndDefault | ActionScope::DefaultOnly) => {}
                    Some(ActionScope::TableOnly) => {
                        return Err(NodeError::invalid_argument(format!(
                            "action {} cannot be the default action of {}",
                            schema.preamble.name, name
                        )))
                    }
                    None => {
                        return Err(NodeError::invalid_argument(format!(
                            "action {} is not part of table {}",
                            schema.preamble.name, name
                        )))
                    }
                }
                Some((schema, action))
            }
            Some(_) => {
                return Err(NodeError::invalid_argument(format!(
                    "default action of {} must be a direct action",
                    name
                )))
            }
        };

        let driver = self.driver();
        let ctx = TableContext::table(driver, self.device, &normalize_name(name))?;
        let h = *ctx.handles();
        match action {
            Some((schema, action)) => {
                self.translator.encode_action(driver, &h, schema, action)?;
                driver.default_entry_set(&h)?;
            }
            None => driver.default_entry_reset(&h)?,
        }
        ctx.release()?;
        debug!("Default action of {} updated", name);
        Ok(())
    }

    fn resolve_action<'a>(
        &self,
        registry: &'a SchemaRegistry,
        table: &Table,
        action: &'a TableAction,
    ) -> NodeResult<ResolvedAction<'a>> {
        let name = &table.preamble.name;
        match action {
            TableAction::Action(action) => {
                let schema = registry.find_action_by_id(action.action_id)?;
                if table.implementation_id != 0 {
                    return Err(NodeError::invalid_argument(format!(
                        "table {} takes action profile members or groups",
                        name
                    )));
                }
                match table.action_ref(action.action_id).map(|r| r.scope) {
                    Some(ActionScope::TableAndDefault | ActionScope::TableOnly) => {
                        Ok(ResolvedAction::Direct(schema, action))
                    }
                    Some(ActionScope::DefaultOnly) => Err(NodeError::invalid_argument(format!(
                        "action {} may only be the default action of {}",
                        schema.preamble.name, name
                    ))),
                    None => Err(NodeError::invalid_argument(format!(
                        "action {} is not part of table {}",
                        schema.preamble.name, name
                    ))),
                }
            }
            TableAction::ActionProfileMemberId(member_id) => {
                self.check_indirect(registry, table, false)?;
                Ok(ResolvedAction::Member(*member_id))
            }
            TableAction::ActionProfileGroupId(group_id) => {
                self.check_indirect(registry, table, true)?;
                Ok(ResolvedAction::Group(*group_id))
            }
        }
    }

    fn check_indirect(
        &self,
        registry: &SchemaRegistry,
        table: &Table,
        group: bool,
    ) -> NodeResult<()> {
        self.require(self.capabilities.action_profiles, "action profiles")?;
        if table.implementation_id == 0 {
            return Err(NodeError::invalid_argument(format!(
                "table {} has no action profile",
                table.preamble.name
            )));
        }
        let profile = registry.find_action_profile_by_id(table.implementation_id)?;
        if group && !profile.with_selector {
            return Err(NodeError::invalid_argument(format!(
                "action profile {} has no selector",
                profile.preamble.name
            )));
        }
        Ok(())
    }

    fn check_direct_resources(
        &self,
        registry: &SchemaRegistry,
        table: &Table,
        entry: &TableEntry,
    ) -> NodeResult<()> {
        if entry.counter_data.is_some() {
            self.require(self.capabilities.direct_counters, "direct counters")?;
            if registry.direct_counter_for_table(table.preamble.id).is_none() {
                return Err(NodeError::invalid_argument(format!(
                    "table {} has no direct counter",
                    table.preamble.name
                )));
            }
        }
        if entry.meter_config.is_some() {
            self.require(self.capabilities.meters, "direct meters")?;
            if registry.direct_meter_for_table(table.preamble.id).is_none() {
                return Err(NodeError::invalid_argument(format!(
                    "table {} has no direct meter",
                    table.preamble.name
                )));
            }
        }
        Ok(())
    }

    fn encode_table_action(&self, h: &TableHandles, action: &ResolvedAction<'_>) -> NodeResult<()> {
        let driver = self.driver();
        match action {
            ResolvedAction::Direct(schema, action) => {
                self.translator.encode_action(driver, h, schema, action)
            }
            ResolvedAction::Member(member_id) => Ok(driver.data_field_set(
                h,
                ReservedField::ActionMemberId.id(),
                DataValue::U64(u64::from(*member_id)),
            )?),
            ResolvedAction::Group(group_id) => Ok(driver.data_field_set(
                h,
                ReservedField::SelectorGroupId.id(),
                DataValue::U64(u64::from(*group_id)),
            )?),
        }
    }

    /// Rebuilds the entry loaded in the context's buffers.
    fn decode_entry(
        &self,
        registry: &SchemaRegistry,
        table: &Table,
        h: &TableHandles,
        with_counters: bool,
    ) -> NodeResult<TableEntry> {
        let driver = self.driver();
        let (matches, priority) = self.translator.decode_key(driver, h, table)?;
        let fields = driver.data_fields_get(h)?;

        let action = if table.implementation_id != 0 {
            let reference = |field: ReservedField| {
                fields
                    .iter()
                    .find(|(id, _)| *id == field.id())
                    .and_then(|(_, v)| v.as_u64())
                    .map(|v| {
                        u32::try_from(v)
                            .map_err(|_| NodeError::internal(format!("profile reference {} overflows", v)))
                    })
                    .transpose()
            };
            match (
                reference(ReservedField::ActionMemberId)?,
                reference(ReservedField::SelectorGroupId)?,
            ) {
                (Some(member_id), _) => Some(TableAction::ActionProfileMemberId(member_id)),
                (None, Some(group_id)) => Some(TableAction::ActionProfileGroupId(group_id)),
                (None, None) => None,
            }
        } else {
            self.translator
                .decode_action(
                    driver,
                    h,
                    registry,
                    table.action_refs.iter().map(|r| r.id),
                    &fields,
                )?
                .map(TableAction::Action)
        };

        let counter_data = if with_counters {
            Some(to_counter_data(direct_counter_from_fields(&fields))?)
        } else {
            None
        };
        let meter_config = if self.capabilities.meters
            && registry.direct_meter_for_table(table.preamble.id).is_some()
        {
            meter_config_from_fields(&fields)?
        } else {
            None
        };

        Ok(TableEntry {
            table_id: table.preamble.id,
            matches,
            action,
            priority,
            is_default_action: false,
            counter_data,
            meter_config,
        })
    }
}
