//! Verified, ID-indexed view of a P4Info snapshot.

use std::collections::HashSet;

use log::debug;
use p4rt_types::p4info::{
    Action, ActionProfile, Counter, DirectCounter, DirectMeter, Meter, P4Info, Preamble,
    Register, Table,
};

use crate::error::{SchemaError, SchemaResult};
use crate::id_map::IdMap;

/// Lookup service over one pipeline's schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: IdMap<Table>,
    actions: IdMap<Action>,
    counters: IdMap<Counter>,
    direct_counters: IdMap<DirectCounter>,
    meters: IdMap<Meter>,
    direct_meters: IdMap<DirectMeter>,
    registers: IdMap<Register>,
    action_profiles: IdMap<ActionProfile>,
}

impl SchemaRegistry {
    /// Builds a registry, verifying the snapshot.
    ///
    /// Every object must have a nonzero ID unique across the program and a
    /// non-empty name. References between objects (table actions, default
    /// actions, implementations, direct resources) must resolve.
    pub fn new(p4info: &P4Info) -> SchemaResult<Self> {
        let mut ids = HashSet::new();
        let mut registry = Self::default();

        for table in &p4info.tables {
            check_preamble(&mut ids, &table.preamble)?;
            registry.tables.insert(table.clone())?;
        }
        for action in &p4info.actions {
            check_preamble(&mut ids, &action.preamble)?;
            registry.actions.insert(action.clone())?;
        }
        for counter in &p4info.counters {
            check_preamble(&mut ids, &counter.preamble)?;
            registry.counters.insert(counter.clone())?;
        }
        for counter in &p4info.direct_counters {
            check_preamble(&mut ids, &counter.preamble)?;
            registry.direct_counters.insert(counter.clone())?;
        }
        for meter in &p4info.meters {
            check_preamble(&mut ids, &meter.preamble)?;
            registry.meters.insert(meter.clone())?;
        }
        for meter in &p4info.direct_meters {
            check_preamble(&mut ids, &meter.preamble)?;
            registry.direct_meters.insert(meter.clone())?;
        }
        for register in &p4info.registers {
            check_preamble(&mut ids, &register.preamble)?;
            registry.registers.insert(register.clone())?;
        }
        for profile in &p4info.action_profiles {
            check_preamble(&mut ids, &profile.preamble)?;
            registry.action_profiles.insert(profile.clone())?;
        }

        registry.verify_references()?;
        debug!(
            "Schema registry built: {} tables, {} actions, {} counters",
            registry.tables.len(),
            registry.actions.len(),
            registry.counters.len()
        );
        Ok(registry)
    }

    fn verify_references(&self) -> SchemaResult<()> {
        for action in self.actions.values() {
            let mut param_ids = HashSet::new();
            for param in &action.params {
                if !param_ids.insert(param.id) {
                    return Err(SchemaError::invalid(format!(
                        "action {} declares param ID {} twice",
                        action.preamble.name, param.id
                    )));
                }
            }
        }

        for table in self.tables.values() {
            let name = &table.preamble.name;
            let mut field_ids = HashSet::new();
            for field in &table.match_fields {
                if !field_ids.insert(field.id) {
                    return Err(SchemaError::invalid(format!(
                        "table {} declares match field ID {} twice",
                        name, field.id
                    )));
                }
                if field.bitwidth <= 0 {
                    return Err(SchemaError::invalid(format!(
                        "match field {} of table {} has bitwidth {}",
                        field.name, name, field.bitwidth
                    )));
                }
            }
            for action_ref in &table.action_refs {
                if !self.actions.contains(action_ref.id) {
                    return Err(SchemaError::invalid(format!(
                        "table {} references unknown action {}",
                        name, action_ref.id
                    )));
                }
            }
            if table.const_default_action_id != 0
                && table.action_ref(table.const_default_action_id).is_none()
            {
                return Err(SchemaError::invalid(format!(
                    "table {} has const default action {} outside its action set",
                    name, table.const_default_action_id
                )));
            }
            if table.implementation_id != 0
                && !self.action_profiles.contains(table.implementation_id)
            {
                return Err(SchemaError::invalid(format!(
                    "table {} references unknown implementation {}",
                    name, table.implementation_id
                )));
            }
            for resource_id in &table.direct_resource_ids {
                if !self.direct_counters.contains(*resource_id)
                    && !self.direct_meters.contains(*resource_id)
                {
                    return Err(SchemaError::invalid(format!(
                        "table {} references unknown direct resource {}",
                        name, resource_id
                    )));
                }
            }
        }

        for counter in self.direct_counters.values() {
            self.require_table(&counter.preamble, counter.direct_table_id)?;
        }
        for meter in self.direct_meters.values() {
            self.require_table(&meter.preamble, meter.direct_table_id)?;
        }
        for profile in self.action_profiles.values() {
            for table_id in &profile.table_ids {
                self.require_table(&profile.preamble, *table_id)?;
            }
        }
        Ok(())
    }

    fn require_table(&self, owner: &Preamble, table_id: u32) -> SchemaResult<()> {
        if self.tables.contains(table_id) {
            Ok(())
        } else {
            Err(SchemaError::invalid(format!(
                "{} references unknown table {}",
                owner.name, table_id
            )))
        }
    }

    pub fn find_table_by_id(&self, id: u32) -> SchemaResult<&Table> {
        self.tables.lookup(id)
    }

    pub fn find_action_by_id(&self, id: u32) -> SchemaResult<&Action> {
        self.actions.lookup(id)
    }

    pub fn find_counter_by_id(&self, id: u32) -> SchemaResult<&Counter> {
        self.counters.lookup(id)
    }

    pub fn find_direct_counter_by_id(&self, id: u32) -> SchemaResult<&DirectCounter> {
        self.direct_counters.lookup(id)
    }

    pub fn find_meter_by_id(&self, id: u32) -> SchemaResult<&Meter> {
        self.meters.lookup(id)
    }

    pub fn find_register_by_id(&self, id: u32) -> SchemaResult<&Register> {
        self.registers.lookup(id)
    }

    pub fn find_action_profile_by_id(&self, id: u32) -> SchemaResult<&ActionProfile> {
        self.action_profiles.lookup(id)
    }

    /// Returns the direct counter attached to a table, if any.
    pub fn direct_counter_for_table(&self, table_id: u32) -> Option<&DirectCounter> {
        self.direct_counters
            .values()
            .find(|c| c.direct_table_id == table_id)
    }

    /// Returns the direct meter attached to a table, if any.
    pub fn direct_meter_for_table(&self, table_id: u32) -> Option<&DirectMeter> {
        self.direct_meters
            .values()
            .find(|m| m.direct_table_id == table_id)
    }

    /// Iterates all tables in ascending ID order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }
}

fn check_preamble(ids: &mut HashSet<u32>, preamble: &Preamble) -> SchemaResult<()> {
    if preamble.id == 0 {
        return Err(SchemaError::invalid(format!(
            "object {:?} has ID 0",
            preamble.name
        )));
    }
    if preamble.name.is_empty() {
        return Err(SchemaError::invalid(format!(
            "object {} has an empty name",
            preamble.id
        )));
    }
    if !ids.insert(preamble.id) {
        return Err(SchemaError::invalid(format!(
            "ID {} is used by more than one object",
            preamble.id
        )));
    }
    Ok(())
}
