use serde::Serialize;
use smol_str::SmolStr;

use crate::types::{FastHashSet, FastMap};

// ─── FieldChange ────────────────────────────────────────────────────────────

/// The two values of one differing field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange<V> {
    pub old: V,
    pub new: V,
}

impl<V> FieldChange<V> {
    #[inline]
    pub fn new(old: V, new: V) -> Self {
        Self { old, new }
    }

    #[inline]
    pub fn into_pair(self) -> (V, V) {
        (self.old, self.new)
    }
}

impl<V> From<(V, V)> for FieldChange<V> {
    fn from((old, new): (V, V)) -> Self {
        Self { old, new }
    }
}

impl<V> From<FieldChange<V>> for (V, V) {
    fn from(change: FieldChange<V>) -> Self {
        change.into_pair()
    }
}

// ─── FieldDiff ──────────────────────────────────────────────────────────────

/// Field name → (old, new) for every field that differs. Unordered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldDiff<V> {
    changes: FastMap<SmolStr, FieldChange<V>>,
}

impl<V> Default for FieldDiff<V> {
    fn default() -> Self {
        Self {
            changes: FastMap::default(),
        }
    }
}

impl<V> FieldDiff<V> {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[inline]
    pub fn get(&self, field: &str) -> Option<&FieldChange<V>> {
        self.changes.get(field)
    }

    #[inline]
    pub fn contains(&self, field: &str) -> bool {
        self.changes.contains_key(field)
    }

    /// Remove and return one field's change.
    pub fn remove(&mut self, field: &str) -> Option<FieldChange<V>> {
        self.changes.remove(field)
    }

    /// The key set.
    pub fn fields(&self) -> FastHashSet<SmolStr> {
        self.changes.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &FieldChange<V>)> {
        self.changes.iter()
    }
}

impl<V> FromIterator<(SmolStr, FieldChange<V>)> for FieldDiff<V> {
    fn from_iter<I: IntoIterator<Item = (SmolStr, FieldChange<V>)>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

impl<V> IntoIterator for FieldDiff<V> {
    type Item = (SmolStr, FieldChange<V>);
    type IntoIter = std::collections::hash_map::IntoIter<SmolStr, FieldChange<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}
