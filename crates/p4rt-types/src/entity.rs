//! Programmable entities carried by write and read requests.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type-tagged value of a single match field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMatchKind {
    /// Full value match.
    Exact { value: Vec<u8> },
    /// Value and mask match.
    Ternary { value: Vec<u8>, mask: Vec<u8> },
    /// Longest prefix match.
    Lpm { value: Vec<u8>, prefix_len: i32 },
    /// Inclusive range match.
    Range { low: Vec<u8>, high: Vec<u8> },
    /// Optional (exact or wildcard) match.
    Optional { value: Vec<u8> },
}

impl FieldMatchKind {
    /// Returns the wire name of this match kind.
    pub fn name(&self) -> &'static str {
        match self {
            FieldMatchKind::Exact { .. } => "exact",
            FieldMatchKind::Ternary { .. } => "ternary",
            FieldMatchKind::Lpm { .. } => "lpm",
            FieldMatchKind::Range { .. } => "range",
            FieldMatchKind::Optional { .. } => "optional",
        }
    }
}

/// One component of a table key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMatch {
    /// Match field ID from the table schema.
    pub field_id: u32,
    /// Typed match value.
    #[serde(flatten)]
    pub kind: FieldMatchKind,
}

impl FieldMatch {
    pub fn exact(field_id: u32, value: impl Into<Vec<u8>>) -> Self {
        Self {
            field_id,
            kind: FieldMatchKind::Exact {
                value: value.into(),
            },
        }
    }

    pub fn ternary(field_id: u32, value: impl Into<Vec<u8>>, mask: impl Into<Vec<u8>>) -> Self {
        Self {
            field_id,
            kind: FieldMatchKind::Ternary {
                value: value.into(),
                mask: mask.into(),
            },
        }
    }

    pub fn lpm(field_id: u32, value: impl Into<Vec<u8>>, prefix_len: i32) -> Self {
        Self {
            field_id,
            kind: FieldMatchKind::Lpm {
                value: value.into(),
                prefix_len,
            },
        }
    }

    pub fn range(field_id: u32, low: impl Into<Vec<u8>>, high: impl Into<Vec<u8>>) -> Self {
        Self {
            field_id,
            kind: FieldMatchKind::Range {
                low: low.into(),
                high: high.into(),
            },
        }
    }

    pub fn optional(field_id: u32, value: impl Into<Vec<u8>>) -> Self {
        Self {
            field_id,
            kind: FieldMatchKind::Optional {
                value: value.into(),
            },
        }
    }
}

/// A single action parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParam {
    pub param_id: u32,
    pub value: Vec<u8>,
}

/// An action invocation: action ID plus parameter values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub action_id: u32,
    #[serde(default)]
    pub params: Vec<ActionParam>,
}

impl Action {
    /// Creates an action without parameters.
    pub fn new(action_id: u32) -> Self {
        Self {
            action_id,
            params: Vec::new(),
        }
    }

    /// Adds a parameter value.
    pub fn with_param(mut self, param_id: u32, value: impl Into<Vec<u8>>) -> Self {
        self.params.push(ActionParam {
            param_id,
            value: value.into(),
        });
        self
    }
}

/// What a table entry executes on a hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableAction {
    /// Direct action with parameters.
    Action(Action),
    /// Indirect action through an action profile member.
    ActionProfileMemberId(u32),
    /// Indirect action through an action selector group.
    ActionProfileGroupId(u32),
}

/// Packet and byte counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterData {
    #[serde(default)]
    pub byte_count: i64,
    #[serde(default)]
    pub packet_count: i64,
}

/// Two-rate three-color meter configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Committed information rate.
    pub cir: i64,
    /// Committed burst size.
    pub cburst: i64,
    /// Peak information rate.
    pub pir: i64,
    /// Peak burst size.
    pub pburst: i64,
}

/// A match-action table entry.
///
/// Match fields omitted from `matches` are don't-care. A default action
/// entry carries no match fields and no priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableEntry {
    pub table_id: u32,
    pub matches: Vec<FieldMatch>,
    pub action: Option<TableAction>,
    pub priority: i32,
    pub is_default_action: bool,
    /// Direct counter data. On reads, presence requests the counter values.
    pub counter_data: Option<CounterData>,
    /// Direct meter configuration.
    pub meter_config: Option<MeterConfig>,
}

impl TableEntry {
    /// Creates an empty entry for a table.
    pub fn new(table_id: u32) -> Self {
        Self {
            table_id,
            ..Default::default()
        }
    }

    /// Creates a default action entry for a table.
    pub fn default_action(table_id: u32, action: Option<Action>) -> Self {
        Self {
            table_id,
            action: action.map(TableAction::Action),
            is_default_action: true,
            ..Default::default()
        }
    }

    pub fn with_match(mut self, field_match: FieldMatch) -> Self {
        self.matches.push(field_match);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(TableAction::Action(action));
        self
    }

    pub fn with_member(mut self, member_id: u32) -> Self {
        self.action = Some(TableAction::ActionProfileMemberId(member_id));
        self
    }

    pub fn with_group(mut self, group_id: u32) -> Self {
        self.action = Some(TableAction::ActionProfileGroupId(group_id));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_counter_data(mut self, data: CounterData) -> Self {
        self.counter_data = Some(data);
        self
    }
}

/// An indirect counter cell, or all cells when `index` is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterEntry {
    pub counter_id: u32,
    pub index: Option<i64>,
    pub data: Option<CounterData>,
}

/// The counter attached directly to a table entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectCounterEntry {
    pub table_entry: TableEntry,
    pub data: Option<CounterData>,
}

/// An indirect meter cell, or all cells when `index` is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterEntry {
    pub meter_id: u32,
    pub index: Option<i64>,
    pub config: Option<MeterConfig>,
}

/// The meter attached directly to a table entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectMeterEntry {
    pub table_entry: TableEntry,
    pub config: Option<MeterConfig>,
}

/// A register cell, or all cells when `index` is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterEntry {
    pub register_id: u32,
    pub index: Option<i64>,
    /// Cell value as a canonical bitstring.
    pub data: Option<Vec<u8>>,
}

/// A member of an action profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionProfileMember {
    pub action_profile_id: u32,
    /// Member ID; zero selects all members on reads.
    pub member_id: u32,
    pub action: Option<Action>,
}

/// A weighted reference to an action profile member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub member_id: u32,
    #[serde(default = "default_weight")]
    pub weight: i32,
}

fn default_weight() -> i32 {
    1
}

/// A group of an action selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionProfileGroup {
    pub action_profile_id: u32,
    /// Group ID; zero selects all groups on reads.
    pub group_id: u32,
    pub members: Vec<GroupMember>,
    pub max_size: i32,
}

/// Multicast/clone configuration of the packet replication engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketReplicationEngineEntry {
    pub multicast_group_id: u32,
}

/// A parser value set member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueSetEntry {
    pub value_set_id: u32,
}

/// Digest stream configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestEntry {
    pub digest_id: u32,
}

/// Every entity kind a request can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    TableEntry(TableEntry),
    CounterEntry(CounterEntry),
    DirectCounterEntry(DirectCounterEntry),
    MeterEntry(MeterEntry),
    DirectMeterEntry(DirectMeterEntry),
    RegisterEntry(RegisterEntry),
    ActionProfileMember(ActionProfileMember),
    ActionProfileGroup(ActionProfileGroup),
    PacketReplicationEngineEntry(PacketReplicationEngineEntry),
    ValueSetEntry(ValueSetEntry),
    DigestEntry(DigestEntry),
}

impl Entity {
    /// Returns the wire name of the entity kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Entity::TableEntry(_) => "table_entry",
            Entity::CounterEntry(_) => "counter_entry",
            Entity::DirectCounterEntry(_) => "direct_counter_entry",
            Entity::MeterEntry(_) => "meter_entry",
            Entity::DirectMeterEntry(_) => "direct_meter_entry",
            Entity::RegisterEntry(_) => "register_entry",
            Entity::ActionProfileMember(_) => "action_profile_member",
            Entity::ActionProfileGroup(_) => "action_profile_group",
            Entity::PacketReplicationEngineEntry(_) => "packet_replication_engine_entry",
            Entity::ValueSetEntry(_) => "value_set_entry",
            Entity::DigestEntry(_) => "digest_entry",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::TableEntry(e) => write!(f, "table_entry(table_id={})", e.table_id),
            Entity::CounterEntry(e) => write!(f, "counter_entry(counter_id={})", e.counter_id),
            Entity::DirectCounterEntry(e) => {
                write!(f, "direct_counter_entry(table_id={})", e.table_entry.table_id)
            }
            Entity::MeterEntry(e) => write!(f, "meter_entry(meter_id={})", e.meter_id),
            Entity::DirectMeterEntry(e) => {
                write!(f, "direct_meter_entry(table_id={})", e.table_entry.table_id)
            }
            Entity::RegisterEntry(e) => write!(f, "register_entry(register_id={})", e.register_id),
            Entity::ActionProfileMember(e) => write!(
                f,
                "action_profile_member(profile_id={}, member_id={})",
                e.action_profile_id, e.member_id
            ),
            Entity::ActionProfileGroup(e) => write!(
                f,
                "action_profile_group(profile_id={}, group_id={})",
                e.action_profile_id, e.group_id
            ),
            other => write!(f, "{}", other.kind_name()),
        }
    }
}

macro_rules! impl_from_entity {
    ($($kind:ident),* $(,)?) => {
        $(
            impl From<$kind> for Entity {
                fn from(entry: $kind) -> Self {
                    Entity::$kind(entry)
                }
            }
        )*
    };
}

impl_from_entity!(
    TableEntry,
    CounterEntry,
    DirectCounterEntry,
    MeterEntry,
    DirectMeterEntry,
    RegisterEntry,
    ActionProfileMember,
    ActionProfileGroup,
    PacketReplicationEngineEntry,
    ValueSetEntry,
    DigestEntry,
);
