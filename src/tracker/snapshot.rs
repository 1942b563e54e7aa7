use smol_str::SmolStr;

use super::diff::{FieldChange, FieldDiff};
use super::{FieldState, Trackable};
use crate::types::FastMap;

// ─── FieldSnapshot ──────────────────────────────────────────────────────────

/// Owned copies of a record's materialized field values at one instant.
///
/// Deferred fields are never present. A snapshot holds clones, so editing
/// the live record afterwards (including in-place edits of container values)
/// leaves it untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot<V> {
    fields: FastMap<SmolStr, V>,
}

impl<V> Default for FieldSnapshot<V> {
    fn default() -> Self {
        Self {
            fields: FastMap::default(),
        }
    }
}

impl<V> FieldSnapshot<V> {
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[inline]
    pub fn get(&self, field: &str) -> Option<&V> {
        self.fields.get(field)
    }

    #[inline]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &V)> {
        self.fields.iter()
    }
}

impl<V: Clone + PartialEq> FieldSnapshot<V> {
    /// Capture every `Loaded` field of `record`. Host errors are returned as-is.
    pub fn capture<R>(record: &R) -> Result<Self, R::Error>
    where
        R: Trackable<Value = V> + ?Sized,
    {
        let fields = record
            .tracked_fields()?
            .into_iter()
            .filter_map(|(name, state)| match state {
                FieldState::Loaded(value) => Some((name, value.clone())),
                FieldState::Deferred => None,
            })
            .collect();
        Ok(Self { fields })
    }

    /// Fields present in both snapshots whose values differ, as `(self, later)`.
    ///
    /// A key present in only one side is ignored: a field that was deferred or
    /// evicted in either snapshot has no comparable value.
    pub fn diff(&self, later: &Self) -> FieldDiff<V> {
        // Walk the smaller side; the result is the same either way.
        if self.fields.len() <= later.fields.len() {
            self.fields
                .iter()
                .filter_map(|(name, old)| {
                    let new = later.fields.get(name)?;
                    (old != new).then(|| (name.clone(), FieldChange::new(old.clone(), new.clone())))
                })
                .collect()
        } else {
            later
                .fields
                .iter()
                .filter_map(|(name, new)| {
                    let old = self.fields.get(name)?;
                    (old != new).then(|| (name.clone(), FieldChange::new(old.clone(), new.clone())))
                })
                .collect()
        }
    }
}

impl<V> FromIterator<(SmolStr, V)> for FieldSnapshot<V> {
    fn from_iter<I: IntoIterator<Item = (SmolStr, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
