//! P4Runtime types for the table translation layer.
//!
//! This crate provides the protocol-level vocabulary shared by every other
//! crate in the workspace:
//!
//! - [`Entity`]: The closed set of programmable entities (table entries,
//!   counters, meters, registers, action profile members/groups, ...)
//! - [`WriteRequest`] / [`ReadRequest`]: Device-scoped batch requests
//! - [`ForwardingPipelineConfig`]: Program binary plus schema snapshot
//! - [`P4Info`]: The schema snapshot describing tables, actions and externs
//!
//! Byte strings (match values, masks, action parameters) are carried in
//! P4Runtime canonical order: big-endian, most significant byte first.

mod entity;
pub mod p4info;
mod pipeline;
mod update;

pub use entity::{
    Action, ActionParam, ActionProfileGroup, ActionProfileMember, CounterData, CounterEntry,
    DigestEntry, DirectCounterEntry, DirectMeterEntry, Entity, FieldMatch, FieldMatchKind,
    GroupMember, MeterConfig, MeterEntry, PacketReplicationEngineEntry, RegisterEntry,
    TableAction, TableEntry, ValueSetEntry,
};
pub use p4info::{MatchType, P4Info};
pub use pipeline::ForwardingPipelineConfig;
pub use update::{Atomicity, ReadRequest, ReadResponse, Update, UpdateType, WriteRequest};

/// Identifier of a managed pipeline device (P4Runtime `device_id`).
pub type DeviceId = u64;
