//! Backend driver interface for P4 pipeline devices.
//!
//! This crate defines the capability seam between the table translation
//! layer and a packet-processing backend. Real backends (an ASIC SDK, an
//! in-kernel eBPF dataplane) implement [`PipelineDriver`]; the translation
//! layer only ever talks to the trait.
//!
//! # Architecture
//!
//! - [`types`]: typed backend handles and native key/data values
//! - [`error`]: status codes and error handling
//! - [`capabilities`]: backend flavours and their differences
//! - [`driver`]: the [`PipelineDriver`] trait
//! - [`context`]: scoped programming contexts that release on drop
//! - `sim`: an in-memory driver (feature `sim`)
//!
//! # Example
//!
//! ```ignore
//! use p4rt_driver::{KeyValue, PipelineDriver, TableContext, DriverResult};
//!
//! fn add_exact(driver: &dyn PipelineDriver, table: &str, key: Vec<u8>) -> DriverResult<()> {
//!     let ctx = TableContext::table(driver, 1, table)?;
//!     driver.key_field_set(ctx.handles(), 1, &KeyValue::Exact(key))?;
//!     driver.entry_add(ctx.handles())?;
//!     ctx.release()
//! }
//! ```

pub mod capabilities;
pub mod context;
pub mod driver;
pub mod error;
#[cfg(feature = "sim")]
pub mod sim;
pub mod types;

pub use capabilities::{BackendKind, Capabilities};
pub use context::{CounterContext, ProgrammingContext, TableContext};
pub use driver::PipelineDriver;
pub use error::{DriverError, DriverResult, DriverStatus, DriverStatusExt};
#[cfg(feature = "sim")]
pub use sim::{DriverCall, DriverOp, SimDriver};
pub use types::{
    ActionDataHandle, ActionDataKind, ContextHandles, CounterContextHandle, CounterContextKind,
    CounterEntryHandle, CounterEntryKind, CounterHandles, CounterRecord, CounterValues, DataValue,
    DeviceContextHandle, DeviceContextKind, EntryContextHandle, EntryContextKind, EntryHandle,
    EntryKind, Handle, HandleKind, KeyValue, LoadOutcome, RawHandle, ReservedField, TableHandles,
};
