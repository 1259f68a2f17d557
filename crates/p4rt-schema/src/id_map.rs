//! ID-keyed map of schema objects that never auto-creates entries.
//!
//! Lookups by an unknown ID are an ordinary, expected outcome for requests
//! coming off the wire, so [`IdMap`] only offers explicit accessors:
//! - `get()` returns `Option<&V>`
//! - `lookup()` returns a typed `NotFound` error
//! - `insert()` refuses to overwrite an existing ID

use std::collections::BTreeMap;

use p4rt_types::p4info::{
    Action, ActionProfile, Counter, DirectCounter, DirectMeter, Meter, Preamble, Register, Table,
};

use crate::error::{SchemaError, SchemaResult};

/// Schema objects that carry a preamble.
pub trait HasPreamble {
    /// Object kind name used in error messages.
    const KIND: &'static str;

    fn preamble(&self) -> &Preamble;
}

macro_rules! impl_has_preamble {
    ($($ty:ty => $kind:literal),* $(,)?) => {
        $(
            impl HasPreamble for $ty {
                const KIND: &'static str = $kind;

                fn preamble(&self) -> &Preamble {
                    &self.preamble
                }
            }
        )*
    };
}

impl_has_preamble!(
    Table => "table",
    Action => "action",
    Counter => "counter",
    DirectCounter => "direct counter",
    Meter => "meter",
    DirectMeter => "direct meter",
    Register => "register",
    ActionProfile => "action profile",
);

/// Schema objects of one kind, ordered by ID.
#[derive(Debug, Clone)]
pub struct IdMap<V> {
    inner: BTreeMap<u32, V>,
}

impl<V: HasPreamble> IdMap<V> {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.inner.contains_key(&id)
    }

    /// Returns the object for `id`, or `None`.
    pub fn get(&self, id: u32) -> Option<&V> {
        self.inner.get(&id)
    }

    /// Returns the object for `id`, or a `NotFound` error naming the kind.
    pub fn lookup(&self, id: u32) -> SchemaResult<&V> {
        self.inner
            .get(&id)
            .ok_or(SchemaError::NotFound { kind: V::KIND, id })
    }

    /// Inserts an object under its preamble ID. Duplicate IDs are rejected.
    pub fn insert(&mut self, value: V) -> SchemaResult<()> {
        let id = value.preamble().id;
        if self.inner.contains_key(&id) {
            return Err(SchemaError::invalid(format!(
                "duplicate {} ID {}",
                V::KIND,
                id
            )));
        }
        self.inner.insert(id, value);
        Ok(())
    }

    /// Iterates objects in ascending ID order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }
}

impl<V: HasPreamble> Default for IdMap<V> {
    fn default() -> Self {
        Self::new()
    }
}
