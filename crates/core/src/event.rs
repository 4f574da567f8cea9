//! Row events and the indexed, insertion-ordered collection that holds them.

#![forbid(unsafe_code)]

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, DeltaRow, Row};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowEventKind {
    #[default]
    Unchanged,
    Add,
    Update,
    Delete,
    Clear,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowEvent {
    pub kind: RowEventKind,
    pub row: Row,
    /// Render hint only; empty when nothing meaningful changed.
    pub deltas: DeltaRow,
}

impl RowEvent {
    pub fn new(kind: RowEventKind, row: Row) -> Self {
        Self { kind, row, deltas: DeltaRow::default() }
    }

    pub fn with_deltas(row: Row, deltas: DeltaRow) -> Self {
        Self { kind: RowEventKind::Update, row, deltas }
    }

    pub fn id(&self) -> &str {
        &self.row.id
    }

    pub fn customize(&self, cols: &[usize]) -> RowEvent {
        RowEvent { kind: self.kind, row: self.row.customize(cols), deltas: self.deltas.customize(cols) }
    }

    pub fn diff(&self, other: &RowEvent, age_col: Option<usize>) -> bool {
        self.kind != other.kind
            || self.deltas.diff(&other.deltas, age_col)
            || self.row.diff(&other.row, age_col)
    }
}

/// Row events in insertion order plus an id -> position index.
///
/// After every mutating call the index and the sequence agree: each event's id maps to
/// its position and no other ids are indexed.
#[derive(Clone, Debug, Default)]
pub struct RowEvents {
    events: Vec<RowEvent>,
    index: FxHashMap<String, usize>,
}

impl RowEvents {
    pub fn with_capacity(size: usize) -> Self {
        Self {
            events: Vec::with_capacity(size),
            index: FxHashMap::with_capacity_and_hasher(size, Default::default()),
        }
    }

    pub fn len(&self) -> usize { self.events.len() }
    pub fn is_empty(&self) -> bool { self.events.is_empty() }

    pub fn at(&self, i: usize) -> Option<&RowEvent> {
        self.events.get(i)
    }

    pub fn get(&self, id: &str) -> Option<&RowEvent> {
        self.find_index(id).and_then(|i| self.events.get(i))
    }

    pub fn find_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Append a new event. Ids are unique: adding a known id is an error, use [`upsert`](Self::upsert).
    pub fn add(&mut self, re: RowEvent) -> CoreResult<()> {
        if self.index.contains_key(re.id()) {
            return Err(CoreError::DuplicateRow(re.row.id));
        }
        self.push_unchecked(re);
        Ok(())
    }

    /// Replace the event with the same id in place, or append it.
    pub fn upsert(&mut self, re: RowEvent) {
        match self.find_index(re.id()) {
            Some(i) => self.events[i] = re,
            None => self.push_unchecked(re),
        }
    }

    /// Replace the event at position `i`, keeping ids unique.
    pub fn set(&mut self, i: usize, re: RowEvent) -> CoreResult<()> {
        let len = self.events.len();
        let Some(slot) = self.events.get_mut(i) else {
            return Err(CoreError::OutOfBounds { index: i, len });
        };
        if slot.row.id != re.row.id {
            if self.index.contains_key(re.id()) {
                return Err(CoreError::DuplicateRow(re.row.id));
            }
            self.index.remove(&slot.row.id);
            self.index.insert(re.row.id.clone(), i);
        }
        *slot = re;
        Ok(())
    }

    /// Remove the event for `id`, preserving the order of the rest.
    pub fn delete(&mut self, id: &str) -> CoreResult<RowEvent> {
        let victim = self.index.remove(id).ok_or_else(|| CoreError::RowNotFound(id.to_string()))?;
        let removed = self.events.remove(victim);
        self.reindex_from(victim);
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.index.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RowEvent> {
        self.events.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(RowEvent::id)
    }

    /// Reorder events in place; the index is rebuilt afterwards.
    pub fn sort_by<F>(&mut self, cmp: F)
    where
        F: FnMut(&RowEvent, &RowEvent) -> std::cmp::Ordering,
    {
        self.events.sort_by(cmp);
        self.reindex_from(0);
    }

    fn push_unchecked(&mut self, re: RowEvent) {
        self.index.insert(re.row.id.clone(), self.events.len());
        self.events.push(re);
    }

    fn reindex_from(&mut self, start: usize) {
        for (i, e) in self.events.iter().enumerate().skip(start) {
            self.index.insert(e.row.id.clone(), i);
        }
    }
}

impl PartialEq for RowEvents {
    fn eq(&self, other: &Self) -> bool {
        self.events == other.events
    }
}

impl Eq for RowEvents {}

impl<'a> IntoIterator for &'a RowEvents {
    type Item = &'a RowEvent;
    type IntoIter = std::slice::Iter<'a, RowEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl FromIterator<RowEvent> for RowEvents {
    /// Later events win over earlier ones with the same id.
    fn from_iter<I: IntoIterator<Item = RowEvent>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut out = RowEvents::with_capacity(iter.size_hint().0);
        for re in iter {
            out.upsert(re);
        }
        out
    }
}
