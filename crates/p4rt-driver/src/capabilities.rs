//! Backend flavours and the behaviour that differs between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Packet-processing backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Tables resident in a switching ASIC.
    Asic,
    /// Tables and counters held by an in-kernel (eBPF) dataplane.
    KernelDataplane,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Asic => write!(f, "asic"),
            BackendKind::KernelDataplane => write!(f, "kernel_dataplane"),
        }
    }
}

/// What a backend supports and how it wants values encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub kind: BackendKind,
    /// Key and data bytes must be reversed before reaching the backend.
    pub reverse_byte_order: bool,
    pub direct_counters: bool,
    pub meters: bool,
    pub registers: bool,
    pub action_profiles: bool,
}

impl Capabilities {
    /// ASIC profile: network byte order, all extern resources.
    pub const fn asic() -> Self {
        Self {
            kind: BackendKind::Asic,
            reverse_byte_order: false,
            direct_counters: true,
            meters: true,
            registers: true,
            action_profiles: true,
        }
    }

    /// Kernel dataplane profile: host byte order, tables and indirect
    /// counters only.
    pub const fn kernel_dataplane() -> Self {
        Self {
            kind: BackendKind::KernelDataplane,
            reverse_byte_order: true,
            direct_counters: false,
            meters: false,
            registers: false,
            action_profiles: false,
        }
    }

    /// True when the backend holds any extern resource table (meters,
    /// registers or action profiles).
    pub const fn resource_tables(&self) -> bool {
        self.meters || self.registers || self.action_profiles
    }

    pub const fn for_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Asic => Self::asic(),
            BackendKind::KernelDataplane => Self::kernel_dataplane(),
        }
    }
}
