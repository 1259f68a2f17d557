//! P4Info schema snapshot.
//!
//! These types mirror the structure a P4 compiler emits for a program:
//! every table, action and extern instance carries a [`Preamble`] with a
//! numeric ID unique across the whole program and a fully qualified name
//! (for example `ingress.tbl_switching`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// ID, name and alias shared by all P4Info objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preamble {
    pub id: u32,
    pub name: String,
    pub alias: String,
}

impl Preamble {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        let name = name.into();
        let alias = name.rsplit('.').next().unwrap_or_default().to_string();
        Self { id, name, alias }
    }
}

/// Schema-declared match kind of a table key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    #[default]
    Unspecified,
    Exact,
    Lpm,
    Ternary,
    Range,
    Optional,
}

impl MatchType {
    /// Returns true if entries of a table using this kind carry a priority.
    pub fn requires_priority(&self) -> bool {
        matches!(self, MatchType::Ternary | MatchType::Range | MatchType::Optional)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchType::Unspecified => "UNSPECIFIED",
            MatchType::Exact => "EXACT",
            MatchType::Lpm => "LPM",
            MatchType::Ternary => "TERNARY",
            MatchType::Range => "RANGE",
            MatchType::Optional => "OPTIONAL",
        };
        write!(f, "{}", s)
    }
}

/// A table key field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchField {
    pub id: u32,
    pub name: String,
    pub bitwidth: i32,
    pub match_type: MatchType,
}

impl MatchField {
    pub fn new(id: u32, name: impl Into<String>, bitwidth: i32, match_type: MatchType) -> Self {
        Self {
            id,
            name: name.into(),
            bitwidth,
            match_type,
        }
    }
}

/// Where an action may be used within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionScope {
    #[default]
    TableAndDefault,
    TableOnly,
    DefaultOnly,
}

/// Reference from a table to one of its permitted actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionRef {
    pub id: u32,
    pub scope: ActionScope,
}

/// A match-action table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Table {
    pub preamble: Preamble,
    pub match_fields: Vec<MatchField>,
    pub action_refs: Vec<ActionRef>,
    pub const_default_action_id: u32,
    /// Action profile/selector implementing this table, zero when direct.
    pub implementation_id: u32,
    pub direct_resource_ids: Vec<u32>,
    pub size: i64,
    pub is_const_table: bool,
}

impl Table {
    /// Returns the schema of a match field by ID.
    pub fn match_field(&self, field_id: u32) -> Option<&MatchField> {
        self.match_fields.iter().find(|f| f.id == field_id)
    }

    /// Returns the action reference for an action ID.
    pub fn action_ref(&self, action_id: u32) -> Option<&ActionRef> {
        self.action_refs.iter().find(|r| r.id == action_id)
    }

    /// Returns true if entries of this table carry a priority.
    pub fn requires_priority(&self) -> bool {
        self.match_fields
            .iter()
            .any(|f| f.match_type.requires_priority())
    }
}

/// An action parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Param {
    pub id: u32,
    pub name: String,
    pub bitwidth: i32,
}

impl Param {
    pub fn new(id: u32, name: impl Into<String>, bitwidth: i32) -> Self {
        Self {
            id,
            name: name.into(),
            bitwidth,
        }
    }
}

/// An action with its parameter list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Action {
    pub preamble: Preamble,
    pub params: Vec<Param>,
}

/// Unit counted by a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CounterUnit {
    #[default]
    Unspecified,
    Bytes,
    Packets,
    Both,
}

/// An indirect counter array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counter {
    pub preamble: Preamble,
    pub unit: CounterUnit,
    pub size: i64,
}

/// A counter attached to the entries of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectCounter {
    pub preamble: Preamble,
    pub unit: CounterUnit,
    pub direct_table_id: u32,
}

/// Unit metered by a meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeterUnit {
    #[default]
    Unspecified,
    Bytes,
    Packets,
}

/// An indirect meter array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meter {
    pub preamble: Preamble,
    pub unit: MeterUnit,
    pub size: i64,
}

/// A meter attached to the entries of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectMeter {
    pub preamble: Preamble,
    pub unit: MeterUnit,
    pub direct_table_id: u32,
}

/// A register array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Register {
    pub preamble: Preamble,
    pub bitwidth: i32,
    pub size: i64,
}

/// An action profile, or action selector when `with_selector` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionProfile {
    pub preamble: Preamble,
    pub table_ids: Vec<u32>,
    pub with_selector: bool,
    pub size: i64,
    pub max_group_size: i32,
}

/// The complete schema of a P4 program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct P4Info {
    pub tables: Vec<Table>,
    pub actions: Vec<Action>,
    pub counters: Vec<Counter>,
    pub direct_counters: Vec<DirectCounter>,
    pub meters: Vec<Meter>,
    pub direct_meters: Vec<DirectMeter>,
    pub registers: Vec<Register>,
    pub action_profiles: Vec<ActionProfile>,
}
