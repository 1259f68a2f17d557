//! Action profile members and action selector groups.
//!
//! Members live in a resource table named after the profile, keyed by
//! member ID. Groups live in the profile's selector table (`<profile>_sel`),
//! keyed by group ID, and hold their members as a flat list in which a
//! member of weight `w` appears `w` times.

use std::collections::HashSet;

use log::debug;
use p4rt_driver::{DataValue, KeyValue, PipelineDriver, ReservedField, TableContext, TableHandles};
use p4rt_schema::SchemaRegistry;
use p4rt_types::p4info::ActionProfile;
use p4rt_types::{
    ActionProfileGroup, ActionProfileMember, Entity, GroupMember, UpdateType,
};

use super::TableManager;
use crate::error::{NodeError, NodeResult};
use crate::translator::normalize_name;
use crate::writer::ReadSink;

fn selector_table(profile: &ActionProfile) -> String {
    format!("{}_sel", normalize_name(&profile.preamble.name))
}

/// Actions usable by members of `profile`: the union of the action sets of
/// the tables it implements.
fn member_actions(registry: &SchemaRegistry, profile: &ActionProfile) -> NodeResult<Vec<u32>> {
    let mut actions = Vec::new();
    for table_id in &profile.table_ids {
        let table = registry.find_table_by_id(*table_id)?;
        for action_ref in &table.action_refs {
            if !actions.contains(&action_ref.id) {
                actions.push(action_ref.id);
            }
        }
    }
    Ok(actions)
}

/// Slot ceiling for groups when neither the group nor its profile sets a
/// maximum size.
const UNBOUNDED_GROUP_SLOTS: u64 = 1 << 16;

/// Repeats each member ID by its weight.
fn expand_members(members: &[GroupMember]) -> Vec<u64> {
    members
        .iter()
        .flat_map(|m| {
            std::iter::repeat(u64::from(m.member_id)).take(usize::try_from(m.weight).unwrap_or(0))
        })
        .collect()
}

/// Folds repeated member IDs back into weighted members, in order of first
/// appearance.
fn collapse_members(list: &[u64]) -> NodeResult<Vec<GroupMember>> {
    let mut members: Vec<GroupMember> = Vec::new();
    for raw in list {
        let member_id = u32::try_from(*raw)
            .map_err(|_| NodeError::internal(format!("member ID {} overflows", raw)))?;
        match members.iter_mut().find(|m| m.member_id == member_id) {
            Some(member) => member.weight += 1,
            None => members.push(GroupMember {
                member_id,
                weight: 1,
            }),
        }
    }
    Ok(members)
}

fn key_id(driver: &impl PipelineDriver, h: &TableHandles, field: ReservedField) -> NodeResult<u32> {
    driver
        .key_fields_get(h)?
        .iter()
        .find(|(id, _)| *id == field.id())
        .and_then(|(_, v)| v.as_index())
        .ok_or_else(|| NodeError::internal("backend entry lacks its ID key"))
}

impl<D: PipelineDriver> TableManager<D> {
    pub fn write_action_profile_member(
        &self,
        registry: &SchemaRegistry,
        update_type: UpdateType,
        member: &ActionProfileMember,
    ) -> NodeResult<()> {
        self.require(self.capabilities.action_profiles, "action profile members")?;
        if update_type == UpdateType::Unspecified {
            return Err(NodeError::invalid_argument("unspecified update type"));
        }
        let profile = registry.find_action_profile_by_id(member.action_profile_id)?;
        if member.member_id == 0 {
            return Err(NodeError::invalid_argument("member ID must be nonzero"));
        }
        let action = match update_type {
            UpdateType::Delete => None,
            _ => {
                let action = member.action.as_ref().ok_or_else(|| {
                    NodeError::invalid_argument(format!(
                        "member {} of {} has no action",
                        member.member_id, profile.preamble.name
                    ))
                })?;
                let schema = registry.find_action_by_id(action.action_id)?;
                if !member_actions(registry, profile)?.contains(&action.action_id) {
                    return Err(NodeError::invalid_argument(format!(
                        "action {} is not usable in {}",
                        schema.preamble.name, profile.preamble.name
                    )));
                }
                Some((schema, action))
            }
        };

        let driver = self.driver();
        let ctx = TableContext::resource(driver, self.device, &normalize_name(&profile.preamble.name))?;
        let h = *ctx.handles();
        driver.key_field_set(
            &h,
            ReservedField::ActionMemberId.id(),
            &KeyValue::index(member.member_id),
        )?;
        if let Some((schema, action)) = action {
            self.translator.encode_action(driver, &h, schema, action)?;
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
        debug!(
            "{} member {} of {}",
            update_type, member.member_id, profile.preamble.name
        );
        Ok(())
    }

    /// Reads one member, or all members when the member ID is zero.
    pub fn read_action_profile_member(
        &self,
        registry: &SchemaRegistry,
        member: &ActionProfileMember,
        sink: &mut dyn ReadSink,
    ) -> NodeResult<()> {
        self.require(self.capabilities.action_profiles, "action profile members")?;
        let profile = registry.find_action_profile_by_id(member.action_profile_id)?;
        let candidates = member_actions(registry, profile)?;

        let driver = self.driver();
        let ctx = TableContext::resource(driver, self.device, &normalize_name(&profile.preamble.name))?;
        let h = *ctx.handles();
        let emit = |sink: &mut dyn ReadSink| -> NodeResult<()> {
            let member_id = key_id(driver, &h, ReservedField::ActionMemberId)?;
            let fields = driver.data_fields_get(&h)?;
            let action = self.translator.decode_action(
                driver,
                &h,
                registry,
                candidates.iter().copied(),
                &fields,
            )?;
            sink.write(Entity::ActionProfileMember(ActionProfileMember {
                action_profile_id: profile.preamble.id,
                member_id,
                action,
            }))
        };
        if member.member_id == 0 {
            while driver.entry_get_next(&h)? {
                emit(&mut *sink)?;
            }
        } else {
            driver.key_field_set(
                &h,
                ReservedField::ActionMemberId.id(),
                &KeyValue::index(member.member_id),
            )?;
            driver.entry_get(&h)?;
            emit(&mut *sink)?;
        }
        ctx.release()?;
        Ok(())
    }

    pub fn write_action_profile_group(
        &self,
        registry: &SchemaRegistry,
        update_type: UpdateType,
        group: &ActionProfileGroup,
    ) -> NodeResult<()> {
        self.require(self.capabilities.action_profiles, "action profile groups")?;
        if update_type == UpdateType::Unspecified {
            return Err(NodeError::invalid_argument("unspecified update type"));
        }
        let profile = registry.find_action_profile_by_id(group.action_profile_id)?;
        let name = &profile.preamble.name;
        if !profile.with_selector {
            return Err(NodeError::invalid_argument(format!(
                "action profile {} has no selector",
                name
            )));
        }
        if group.group_id == 0 {
            return Err(NodeError::invalid_argument("group ID must be nonzero"));
        }
        let data = match update_type {
            UpdateType::Delete => None,
            _ => Some(Self::group_data(profile, group)?),
        };

        let driver = self.driver();
        let ctx = TableContext::resource(driver, self.device, &selector_table(profile))?;
        let h = *ctx.handles();
        driver.key_field_set(
            &h,
            ReservedField::SelectorGroupId.id(),
            &KeyValue::index(group.group_id),
        )?;
        if let Some((list, max_size)) = data {
            let status = vec![true; list.len()];
            driver.data_field_set(&h, ReservedField::ActionMemberList.id(), DataValue::U64List(list))?;
            driver.data_field_set(
                &h,
                ReservedField::ActionMemberStatus.id(),
                DataValue::BoolList(status),
            )?;
            driver.data_field_set(&h, ReservedField::MaxGroupSize.id(), DataValue::U64(max_size))?;
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
        debug!("{} group {} of {}", update_type, group.group_id, name);
        Ok(())
    }

    /// Reads one group, or all groups when the group ID is zero.
    pub fn read_action_profile_group(
        &self,
        registry: &SchemaRegistry,
        group: &ActionProfileGroup,
        sink: &mut dyn ReadSink,
    ) -> NodeResult<()> {
        self.require(self.capabilities.action_profiles, "action profile groups")?;
        let profile = registry.find_action_profile_by_id(group.action_profile_id)?;
        if !profile.with_selector {
            return Err(NodeError::invalid_argument(format!(
                "action profile {} has no selector",
                profile.preamble.name
            )));
        }

        let driver = self.driver();
        let ctx = TableContext::resource(driver, self.device, &selector_table(profile))?;
        let h = *ctx.handles();
        let emit = |sink: &mut dyn ReadSink| -> NodeResult<()> {
            let group_id = key_id(driver, &h, ReservedField::SelectorGroupId)?;
            let fields = driver.data_fields_get(&h)?;
            let field = |reserved: ReservedField| {
                fields
                    .iter()
                    .find(|(id, _)| *id == reserved.id())
                    .map(|(_, v)| v)
            };
            let members = match field(ReservedField::ActionMemberList) {
                Some(DataValue::U64List(list)) => collapse_members(list)?,
                _ => Vec::new(),
            };
            let max_size = field(ReservedField::MaxGroupSize)
                .and_then(DataValue::as_u64)
                .map(i32::try_from)
                .transpose()
                .map_err(|_| NodeError::internal("max group size overflows"))?
                .unwrap_or(0);
            sink.write(Entity::ActionProfileGroup(ActionProfileGroup {
                action_profile_id: profile.preamble.id,
                group_id,
                members,
                max_size,
            }))
        };
        if group.group_id == 0 {
            while driver.entry_get_next(&h)? {
                emit(&mut *sink)?;
            }
        } else {
            driver.key_field_set(
                &h,
                ReservedField::SelectorGroupId.id(),
                &KeyValue::index(group.group_id),
            )?;
            driver.entry_get(&h)?;
            emit(&mut *sink)?;
        }
        ctx.release()?;
        Ok(())
    }

    /// Validates group membership and returns the expanded member list with
    /// the effective maximum group size.
    fn group_data(
        profile: &ActionProfile,
        group: &ActionProfileGroup,
    ) -> NodeResult<(Vec<u64>, u64)> {
        let name = &profile.preamble.name;
        if group.max_size < 0 {
            return Err(NodeError::invalid_argument(format!(
                "negative max size {} for group {}",
                group.max_size, group.group_id
            )));
        }
        if profile.max_group_size > 0 && group.max_size > profile.max_group_size {
            return Err(NodeError::invalid_argument(format!(
                "max size {} exceeds the limit {} of {}",
                group.max_size, profile.max_group_size, name
            )));
        }
        let mut seen = HashSet::new();
        for member in &group.members {
            if member.member_id == 0 {
                return Err(NodeError::invalid_argument("member ID must be nonzero"));
            }
            if member.weight < 1 {
                return Err(NodeError::invalid_argument(format!(
                    "member {} has weight {}",
                    member.member_id, member.weight
                )));
            }
            if !seen.insert(member.member_id) {
                return Err(NodeError::invalid_argument(format!(
                    "member {} listed twice in group {}",
                    member.member_id, group.group_id
                )));
            }
        }
        let limit = if group.max_size > 0 {
            group.max_size
        } else {
            profile.max_group_size
        };
        let limit = u64::try_from(limit).unwrap_or(0);
        let ceiling = if limit > 0 { limit } else { UNBOUNDED_GROUP_SLOTS };
        let slots = group
            .members
            .iter()
            .try_fold(0u64, |total, m| total.checked_add(u64::from(m.weight.unsigned_abs())))
            .filter(|slots| *slots <= ceiling)
            .ok_or_else(|| {
                NodeError::invalid_argument(format!(
                    "group {} members need more than {} slots",
                    group.group_id, ceiling
                ))
            })?;
        debug!("Group {} expands to {} slots", group.group_id, slots);
        Ok((expand_members(&group.members), limit))
    }
}
