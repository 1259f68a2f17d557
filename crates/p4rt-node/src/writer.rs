//! Destinations for entities produced by reads.

use p4rt_types::{Entity, ReadResponse};

use crate::error::NodeResult;

/// Receives decoded entities as a read produces them.
pub trait ReadSink {
    fn write(&mut self, entity: Entity) -> NodeResult<()>;
}

impl ReadSink for Vec<Entity> {
    fn write(&mut self, entity: Entity) -> NodeResult<()> {
        self.push(entity);
        Ok(())
    }
}

impl ReadSink for ReadResponse {
    fn write(&mut self, entity: Entity) -> NodeResult<()> {
        self.entities.push(entity);
        Ok(())
    }
}
