//! Scoped programming contexts.
//!
//! A [`ProgrammingContext`] owns the backend handles of one logical
//! operation and releases them exactly once: either through an explicit
//! [`ProgrammingContext::release`] call that reports the outcome, or when the
//! guard is dropped on an early return.

use log::error;
use p4rt_types::DeviceId;

use crate::driver::PipelineDriver;
use crate::error::DriverResult;
use crate::types::{ContextHandles, CounterHandles, TableHandles};

/// Owned set of backend handles bound to one operation.
pub struct ProgrammingContext<'d, D: ?Sized + PipelineDriver, H: Copy + Into<ContextHandles>> {
    driver: &'d D,
    handles: H,
    released: bool,
}

/// Context for table and extern resource operations.
pub type TableContext<'d, D> = ProgrammingContext<'d, D, TableHandles>;

/// Context for indirect counter operations.
pub type CounterContext<'d, D> = ProgrammingContext<'d, D, CounterHandles>;

impl<'d, D: ?Sized + PipelineDriver> ProgrammingContext<'d, D, TableHandles> {
    /// Acquires a context bound to a table.
    pub fn table(driver: &'d D, device: DeviceId, table: &str) -> DriverResult<Self> {
        let handles = driver.acquire_table_context(device, table)?;
        Ok(Self::new(driver, handles))
    }

    /// Acquires a context bound to an extern resource table.
    pub fn resource(driver: &'d D, device: DeviceId, resource: &str) -> DriverResult<Self> {
        let handles = driver.acquire_resource_context(device, resource)?;
        Ok(Self::new(driver, handles))
    }
}

impl<'d, D: ?Sized + PipelineDriver> ProgrammingContext<'d, D, CounterHandles> {
    /// Acquires a context bound to a counter array.
    pub fn counter(driver: &'d D, device: DeviceId, counter: &str) -> DriverResult<Self> {
        let handles = driver.acquire_counter_context(device, counter)?;
        Ok(Self::new(driver, handles))
    }
}

impl<'d, D: ?Sized + PipelineDriver, H: Copy + Into<ContextHandles>> ProgrammingContext<'d, D, H> {
    fn new(driver: &'d D, handles: H) -> Self {
        Self {
            driver,
            handles,
            released: false,
        }
    }

    pub fn handles(&self) -> &H {
        &self.handles
    }

    pub fn driver(&self) -> &'d D {
        self.driver
    }

    /// Releases the handles and reports the backend's answer.
    pub fn release(mut self) -> DriverResult<()> {
        self.released = true;
        self.driver.release(&self.handles.into())
    }
}

impl<D: ?Sized + PipelineDriver, H: Copy + Into<ContextHandles>> Drop
    for ProgrammingContext<'_, D, H>
{
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let handles: ContextHandles = self.handles.into();
        if let Err(e) = self.driver.release(&handles) {
            error!("Failed to release {}: {}", handles, e);
        }
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::error::DriverStatus;
    use crate::sim::{DriverOp, SimDriver};
    use pretty_assertions::assert_eq;

    fn loaded_driver() -> SimDriver {
        let driver = SimDriver::asic();
        driver.load_pipeline(1, b"program").unwrap();
        driver
    }

    #[test]
    fn test_release_on_drop() {
        let driver = loaded_driver();
        {
            let _ctx = TableContext::table(&driver, 1, "ingress_tbl").unwrap();
            assert_eq!(driver.open_contexts(), 1);
        }
        assert_eq!(driver.count(DriverOp::Release), 1);
        assert_eq!(driver.open_contexts(), 0);
    }

    #[test]
    fn test_explicit_release_once() {
        let driver = loaded_driver();
        let ctx = CounterContext::counter(&driver, 1, "ingress_in_pkts").unwrap();
        ctx.release().unwrap();
        assert_eq!(driver.count(DriverOp::Release), 1);
    }

    #[test]
    fn test_release_on_error_path() {
        let driver = loaded_driver();
        let result: DriverResult<()> = (|| {
            let ctx = TableContext::table(&driver, 1, "ingress_tbl")?;
            driver.entry_get(ctx.handles())?;
            ctx.release()
        })();
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(driver.count(DriverOp::Release), 1);
        assert_eq!(driver.open_contexts(), 0);
    }

    #[test]
    fn test_acquire_failure_releases_nothing() {
        let driver = SimDriver::kernel_dataplane();
        assert!(TableContext::table(&driver, 1, "ingress_tbl").is_err());
        assert!(TableContext::resource(&driver, 1, "ingress_meter").is_err());
        assert_eq!(driver.count(DriverOp::Release), 0);
    }

    #[test]
    fn test_failed_release_frees_handles() {
        let driver = loaded_driver();
        driver.inject_failure(DriverOp::Release, DriverStatus::Failure);
        let ctx = TableContext::table(&driver, 1, "ingress_tbl").unwrap();
        assert_eq!(ctx.release().unwrap_err().status(), DriverStatus::Failure);
        assert_eq!(driver.count(DriverOp::Release), 1);
        assert_eq!(driver.open_contexts(), 0);
    }
}
