//! Type-safe backend handles and the value types exchanged with a driver.
//!
//! Backend libraries hand out opaque integer handles for device contexts,
//! entry buffers, table bindings and counter cursors. [`Handle`] wraps them
//! with a phantom kind so an entry handle can never be passed where a counter
//! context is expected.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw backend handle value.
pub type RawHandle = u64;

/// Marker trait for handle kinds.
pub trait HandleKind: Send + Sync + 'static {
    /// Returns the handle kind name for debugging.
    fn type_name() -> &'static str;
}

/// A typed backend handle.
///
/// The phantom parameter `K` records what the handle refers to. Handles of
/// different kinds are distinct types:
///
/// ```
/// use p4rt_driver::{EntryHandle, CounterContextHandle};
///
/// let entry = EntryHandle::from_raw(1).unwrap();
/// let counter = CounterContextHandle::from_raw(1).unwrap();
/// assert_eq!(entry.as_raw(), counter.as_raw());
/// // fn takes_entry(h: EntryHandle) {}
/// // takes_entry(counter); // Error: expected EntryHandle
/// ```
#[derive(Clone, Copy)]
pub struct Handle<K: HandleKind> {
    raw: RawHandle,
    _marker: PhantomData<K>,
}

impl<K: HandleKind> Handle<K> {
    /// The null handle.
    pub const NULL: Self = Self {
        raw: 0,
        _marker: PhantomData,
    };

    /// Creates a handle from a raw value. Returns `None` for zero.
    pub fn from_raw(raw: RawHandle) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self {
                raw,
                _marker: PhantomData,
            })
        }
    }

    /// Creates a handle from a raw value, including zero.
    pub const fn from_raw_unchecked(raw: RawHandle) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Returns the raw handle value.
    pub const fn as_raw(&self) -> RawHandle {
        self.raw
    }

    /// Returns true if this is the null handle.
    pub const fn is_null(&self) -> bool {
        self.raw == 0
    }
}

impl<K: HandleKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:08x})", K::type_name(), self.raw)
    }
}

impl<K: HandleKind> fmt::Display for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:08x})", K::type_name(), self.raw)
    }
}

impl<K: HandleKind> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K: HandleKind> Eq for Handle<K> {}

impl<K: HandleKind> Hash for Handle<K> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<K: HandleKind> Default for Handle<K> {
    fn default() -> Self {
        Self::NULL
    }
}

macro_rules! define_handle_kind {
    ($name:ident, $type_name:literal, $alias:ident) => {
        #[doc = concat!("Marker type for ", $type_name, " handles.")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl HandleKind for $name {
            fn type_name() -> &'static str {
                $type_name
            }
        }

        #[doc = concat!("Handle to a ", $type_name, ".")]
        pub type $alias = Handle<$name>;
    };
}

define_handle_kind!(DeviceContextKind, "DeviceContext", DeviceContextHandle);
define_handle_kind!(EntryKind, "Entry", EntryHandle);
define_handle_kind!(EntryContextKind, "EntryContext", EntryContextHandle);
define_handle_kind!(ActionDataKind, "ActionData", ActionDataHandle);
define_handle_kind!(CounterContextKind, "CounterContext", CounterContextHandle);
define_handle_kind!(CounterEntryKind, "CounterEntry", CounterEntryHandle);

/// Handles backing one table operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHandles {
    pub device_ctx: DeviceContextHandle,
    /// Key/data buffer of a single entry.
    pub entry: EntryHandle,
    /// Binding of the buffer to a named table.
    pub entry_ctx: EntryContextHandle,
    pub action: ActionDataHandle,
}

/// Handles backing one counter operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterHandles {
    pub device_ctx: DeviceContextHandle,
    pub counter_ctx: CounterContextHandle,
    pub counter_entry: CounterEntryHandle,
}

/// Any set of handles a driver can release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextHandles {
    Table(TableHandles),
    Counter(CounterHandles),
}

impl From<TableHandles> for ContextHandles {
    fn from(handles: TableHandles) -> Self {
        ContextHandles::Table(handles)
    }
}

impl From<CounterHandles> for ContextHandles {
    fn from(handles: CounterHandles) -> Self {
        ContextHandles::Counter(handles)
    }
}

impl fmt::Display for ContextHandles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextHandles::Table(h) => write!(f, "table[{}, {}]", h.entry_ctx, h.entry),
            ContextHandles::Counter(h) => {
                write!(f, "counter[{}, {}]", h.counter_ctx, h.counter_entry)
            }
        }
    }
}

/// Native encoding of one key field, bytes already in backend order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    Exact(Vec<u8>),
    Ternary { value: Vec<u8>, mask: Vec<u8> },
    Lpm { value: Vec<u8>, prefix_len: u32 },
}

impl KeyValue {
    /// Builds an exact key holding a big-endian u32, as used for index keys.
    pub fn index(index: u32) -> Self {
        KeyValue::Exact(index.to_be_bytes().to_vec())
    }

    /// Reads back an index key written with [`KeyValue::index`].
    pub fn as_index(&self) -> Option<u32> {
        match self {
            KeyValue::Exact(bytes) => {
                let raw: [u8; 4] = bytes.as_slice().try_into().ok()?;
                Some(u32::from_be_bytes(raw))
            }
            _ => None,
        }
    }
}

/// Native encoding of one data field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    Bytes(Vec<u8>),
    U64(u64),
    U64List(Vec<u64>),
    BoolList(Vec<bool>),
}

impl DataValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DataValue::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

/// Packet and byte counts as reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterValues {
    pub bytes: u64,
    pub packets: u64,
}

/// One record produced while iterating a counter array.
///
/// `index` is whatever the backend reports and is not guaranteed to be
/// meaningful to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterRecord {
    pub index: u32,
    pub values: CounterValues,
}

/// Result of a pipeline load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The program was transferred to the device.
    Loaded,
    /// A pipeline was already present and nothing was transferred.
    AlreadyLoaded,
}

/// Key and data field IDs the ASIC SDK reserves for extern resources.
///
/// They live above `0x8000_0000`, outside the range used for match field and
/// action parameter IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedField {
    RegisterIndex,
    MeterIndex,
    ActionMemberId,
    SelectorGroupId,
    CounterSpecBytes,
    CounterSpecPkts,
    MeterCir,
    MeterCburst,
    MeterPir,
    MeterPburst,
    RegisterData,
    ActionMemberList,
    ActionMemberStatus,
    MaxGroupSize,
}

impl ReservedField {
    pub const BASE: u32 = 0x8000_0000;

    pub const fn id(self) -> u32 {
        Self::BASE
            + match self {
                ReservedField::RegisterIndex => 1,
                ReservedField::MeterIndex => 2,
                ReservedField::ActionMemberId => 3,
                ReservedField::SelectorGroupId => 4,
                ReservedField::CounterSpecBytes => 5,
                ReservedField::CounterSpecPkts => 6,
                ReservedField::MeterCir => 7,
                ReservedField::MeterCburst => 8,
                ReservedField::MeterPir => 9,
                ReservedField::MeterPburst => 10,
                ReservedField::RegisterData => 11,
                ReservedField::ActionMemberList => 12,
                ReservedField::ActionMemberStatus => 13,
                ReservedField::MaxGroupSize => 14,
            }
    }

    /// Returns true if `id` belongs to the reserved range.
    pub const fn is_reserved(id: u32) -> bool {
        id >= Self::BASE
    }

    /// Returns true for index key fields of extern resource tables.
    pub fn is_index_key(id: u32) -> bool {
        id == ReservedField::RegisterIndex.id() || id == ReservedField::MeterIndex.id()
    }

    /// Returns true for data fields of resources attached directly to an
    /// entry (counters and meters).
    pub fn is_direct_resource(id: u32) -> bool {
        (ReservedField::CounterSpecBytes.id()..=ReservedField::MeterPburst.id()).contains(&id)
    }
}
