//! Dense storage for all exchange data of one coupling scheme.
//!
//! Records are never removed, so a [`DataIndex`] handed out once stays valid
//! for the lifetime of the arena.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use crate::datum::{DataId, ExchangeDatum};

/// Dense position of a record inside a [`DataArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataIndex(usize);

impl DataIndex {
    pub const fn get(self) -> usize {
        self.0
    }
}

/// Arena of exchange data with an id → index lookup.
#[derive(Debug, Default)]
pub struct DataArena {
    records: Vec<ExchangeDatum>,
    by_id: HashMap<DataId, DataIndex>,
}

impl DataArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the record with `id`, inserting `make()` if it is unknown.
    ///
    /// The second value is `true` when a new record was inserted.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        id: DataId,
        make: impl FnOnce() -> Result<ExchangeDatum, E>,
    ) -> Result<(DataIndex, bool), E> {
        if let Some(&index) = self.by_id.get(&id) {
            return Ok((index, false));
        }
        let datum = make()?;
        debug_assert_eq!(datum.id(), id);
        let index = DataIndex(self.records.len());
        self.records.push(datum);
        self.by_id.insert(id, index);
        Ok((index, true))
    }

    /// Look up the dense index of `id`.
    pub fn index_of(&self, id: DataId) -> Option<DataIndex> {
        self.by_id.get(&id).copied()
    }

    pub fn by_id(&self, id: DataId) -> Option<&ExchangeDatum> {
        self.index_of(id).map(|index| &self.records[index.0])
    }

    pub fn by_id_mut(&mut self, id: DataId) -> Option<&mut ExchangeDatum> {
        let index = self.index_of(id)?;
        Some(&mut self.records[index.0])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExchangeDatum> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ExchangeDatum> {
        self.records.iter_mut()
    }

    /// Mutable iteration over a subset of records, in `members` order.
    ///
    /// Repeated or unknown indices are skipped.
    pub fn select_mut<'a>(
        &'a mut self,
        members: &[DataIndex],
    ) -> impl Iterator<Item = &'a mut ExchangeDatum> + 'a {
        let mut slots: Vec<Option<&'a mut ExchangeDatum>> =
            self.records.iter_mut().map(Some).collect();
        let selected: Vec<&'a mut ExchangeDatum> = members
            .iter()
            .filter_map(|index| slots.get_mut(index.0).and_then(Option::take))
            .collect();
        selected.into_iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot every record's values as its previous iteration.
    pub fn store_iteration(&mut self) {
        self.records.iter_mut().for_each(ExchangeDatum::store_iteration);
    }

    /// Record every record's values as its window's latest values.
    pub fn store_extrapolation_data(&mut self) {
        self.records
            .iter_mut()
            .for_each(ExchangeDatum::store_extrapolation_data);
    }

    /// Reset every record's window history to its current values.
    pub fn initialize_extrapolation(&mut self) {
        self.records
            .iter_mut()
            .for_each(ExchangeDatum::initialize_extrapolation);
    }
}

impl Index<DataIndex> for DataArena {
    type Output = ExchangeDatum;

    fn index(&self, index: DataIndex) -> &Self::Output {
        &self.records[index.0]
    }
}

impl IndexMut<DataIndex> for DataArena {
    fn index_mut(&mut self, index: DataIndex) -> &mut Self::Output {
        &mut self.records[index.0]
    }
}
