//! Read-only feed of beds open for allocation.

use crate::error::EngineResult;
use crate::models::UnitRecord;
use crate::store::RecordStore;

/// Snapshot reader over the store's open units.
///
/// Every call to [`UnitCatalog::open_units`] queries the store again; a
/// returned snapshot never changes underneath the caller.
pub struct UnitCatalog<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> UnitCatalog<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Fresh snapshot of open units, soonest available first.
    pub fn open_units(&self) -> EngineResult<UnitSnapshot> {
        let units = self.store.list_open_units()?;
        tracing::debug!(count = units.len(), "Loaded open units");
        Ok(UnitSnapshot { units })
    }
}

/// Finite, ordered set of units as of one read.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSnapshot {
    units: Vec<UnitRecord>,
}

impl UnitSnapshot {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UnitRecord> {
        self.units.iter()
    }

    pub fn find(&self, unit_id: &str) -> Option<&UnitRecord> {
        self.units.iter().find(|unit| unit.unit_id == unit_id)
    }
}

impl IntoIterator for UnitSnapshot {
    type Item = UnitRecord;
    type IntoIter = std::vec::IntoIter<UnitRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.into_iter()
    }
}

impl<'s> IntoIterator for &'s UnitSnapshot {
    type Item = &'s UnitRecord;
    type IntoIter = std::slice::Iter<'s, UnitRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}
