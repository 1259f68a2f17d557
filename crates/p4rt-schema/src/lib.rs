//! Schema registry for P4 pipelines.
//!
//! Device nodes consult this crate for every request: a numeric table,
//! action, counter, meter, register or action profile ID resolves to its
//! definition, and unknown IDs surface as [`SchemaError::NotFound`].
//!
//! - [`SchemaRegistry`]: verified lookup service built from a `P4Info`
//! - [`IdMap`]: ID-keyed map that never creates entries on lookup
//! - [`SchemaError`]: lookup and validation errors

mod error;
mod id_map;
mod registry;

pub use error::{SchemaError, SchemaResult};
pub use id_map::{HasPreamble, IdMap};
pub use registry::SchemaRegistry;
