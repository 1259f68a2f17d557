//! Batch write and read requests.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entity::Entity;
use crate::DeviceId;

/// Operation applied by a single update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateType {
    #[default]
    Unspecified,
    Insert,
    Modify,
    Delete,
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateType::Unspecified => "UNSPECIFIED",
            UpdateType::Insert => "INSERT",
            UpdateType::Modify => "MODIFY",
            UpdateType::Delete => "DELETE",
        };
        write!(f, "{}", s)
    }
}

/// One (operation, entity) pair of a write batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    #[serde(rename = "type")]
    pub update_type: UpdateType,
    pub entity: Entity,
}

impl Update {
    pub fn insert(entity: impl Into<Entity>) -> Self {
        Self {
            update_type: UpdateType::Insert,
            entity: entity.into(),
        }
    }

    pub fn modify(entity: impl Into<Entity>) -> Self {
        Self {
            update_type: UpdateType::Modify,
            entity: entity.into(),
        }
    }

    pub fn delete(entity: impl Into<Entity>) -> Self {
        Self {
            update_type: UpdateType::Delete,
            entity: entity.into(),
        }
    }
}

/// Batch atomicity requested by the client.
///
/// Only [`Atomicity::ContinueOnError`] is accepted by device nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Atomicity {
    #[default]
    ContinueOnError,
    RollbackOnError,
    DataplaneAtomic,
}

impl fmt::Display for Atomicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Atomicity::ContinueOnError => "CONTINUE_ON_ERROR",
            Atomicity::RollbackOnError => "ROLLBACK_ON_ERROR",
            Atomicity::DataplaneAtomic => "DATAPLANE_ATOMIC",
        };
        write!(f, "{}", s)
    }
}

/// Device-scoped ordered batch of updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub device_id: DeviceId,
    #[serde(default)]
    pub atomicity: Atomicity,
    #[serde(default)]
    pub updates: Vec<Update>,
}

impl WriteRequest {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            ..Default::default()
        }
    }

    pub fn with_update(mut self, update: Update) -> Self {
        self.updates.push(update);
        self
    }
}

/// Device-scoped list of entity selectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub device_id: DeviceId,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl ReadRequest {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            entities: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: impl Into<Entity>) -> Self {
        self.entities.push(entity.into());
        self
    }
}

/// Entities produced by a read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub entities: Vec<Entity>,
}
