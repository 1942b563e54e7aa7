//! Field-diff tracking for records.
//!
//! A [`ChangeTracker`] keeps two baselines per record instance:
//!
//! - the *current* baseline, captured at the most recent sync point
//!   (construction, persist or reload), and
//! - the *prior* baseline, the current baseline as it stood before the most
//!   recent persist. It is `None` after construction and after a reload.
//!
//! From those it answers two questions: what has been edited in memory since
//! the last sync ([`unsaved_changes`](ChangeTracker::unsaved_changes)), and what
//! the last persist changed ([`recent_updates`](ChangeTracker::recent_updates)),
//! including fields the storage layer rewrote on its own (auto timestamps,
//! counters).
//!
//! The host record system plugs in through two traits. [`Trackable`] enumerates
//! fields. [`ChangeTracked`] hands out the tracker and supplies the whole query
//! surface as default methods. The host reports lifecycle events by calling
//! [`ChangeTracked::sync_changes`] with a [`SyncPoint`] right after the event
//! succeeds.

mod diff;
mod snapshot;

pub use diff::{FieldChange, FieldDiff};
pub use snapshot::FieldSnapshot;

use smol_str::SmolStr;

use crate::spooky_value::SpookyValue;
use crate::types::FastHashSet;

// ─── Host interface ─────────────────────────────────────────────────────────

/// Residency of one field on a record instance.
#[derive(Debug)]
pub enum FieldState<'a, V> {
    /// The field is in memory. The value may itself be null.
    Loaded(&'a V),
    /// The field was not loaded (deferred / lazy) and has no in-memory value.
    Deferred,
}

/// A record whose fields can be enumerated for snapshotting.
pub trait Trackable {
    type Value: Clone + PartialEq;
    type Error;

    /// Every trackable field, by storage-level name, with its residency.
    ///
    /// Names must identify stored columns. A foreign key is reported under
    /// its key attribute (`owner_id`) so that reading it never has to load the
    /// related record.
    fn tracked_fields(&self) -> Result<Vec<(SmolStr, FieldState<'_, Self::Value>)>, Self::Error>;
}

/// Host lifecycle events that move the baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPoint {
    /// The instance finished initializing (new, or loaded from storage).
    Construct,
    /// The instance was written to storage successfully.
    Persist,
    /// The instance was repopulated from storage, discarding edits.
    Reload,
}

// ─── ChangeTracker ──────────────────────────────────────────────────────────

/// Per-instance baseline state. Owned by exactly one record.
#[derive(Debug, Clone)]
pub struct ChangeTracker<V = SpookyValue> {
    current_baseline: FieldSnapshot<V>,
    prior_baseline: Option<FieldSnapshot<V>>,
}

impl<V: Clone + PartialEq> ChangeTracker<V> {
    /// Start tracking `record` as of now (a [`SyncPoint::Construct`]).
    pub fn new<R>(record: &R) -> Result<Self, R::Error>
    where
        R: Trackable<Value = V> + ?Sized,
    {
        Ok(Self::from_baseline(FieldSnapshot::capture(record)?))
    }

    /// Start tracking from an already captured baseline.
    pub fn from_baseline(baseline: FieldSnapshot<V>) -> Self {
        Self {
            current_baseline: baseline,
            prior_baseline: None,
        }
    }

    pub fn current_baseline(&self) -> &FieldSnapshot<V> {
        &self.current_baseline
    }

    pub fn prior_baseline(&self) -> Option<&FieldSnapshot<V>> {
        self.prior_baseline.as_ref()
    }

    /// Install `snapshot` as the new current baseline.
    ///
    /// On [`SyncPoint::Persist`] the outgoing baseline becomes the prior one;
    /// on construct and reload the prior baseline is cleared.
    pub fn sync(&mut self, point: SyncPoint, snapshot: FieldSnapshot<V>) {
        let outgoing = std::mem::replace(&mut self.current_baseline, snapshot);
        self.prior_baseline = match point {
            SyncPoint::Persist => Some(outgoing),
            SyncPoint::Construct | SyncPoint::Reload => None,
        };
        tracing::trace!(
            ?point,
            fields = self.current_baseline.len(),
            "change tracker baseline reset"
        );
    }

    pub fn on_construct<R>(&mut self, record: &R) -> Result<(), R::Error>
    where
        R: Trackable<Value = V> + ?Sized,
    {
        self.sync(SyncPoint::Construct, FieldSnapshot::capture(record)?);
        Ok(())
    }

    /// Call only after the write succeeded. A failed write must leave the
    /// tracker alone.
    pub fn on_persist<R>(&mut self, record: &R) -> Result<(), R::Error>
    where
        R: Trackable<Value = V> + ?Sized,
    {
        self.sync(SyncPoint::Persist, FieldSnapshot::capture(record)?);
        Ok(())
    }

    pub fn on_reload<R>(&mut self, record: &R) -> Result<(), R::Error>
    where
        R: Trackable<Value = V> + ?Sized,
    {
        self.sync(SyncPoint::Reload, FieldSnapshot::capture(record)?);
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════
    // Unsaved changes (in-memory state vs current baseline)
    // ════════════════════════════════════════════════════════════════════════

    pub fn unsaved_changes<R>(&self, record: &R) -> Result<FieldDiff<V>, R::Error>
    where
        R: Trackable<Value = V> + ?Sized,
    {
        let now = FieldSnapshot::capture(record)?;
        Ok(self.current_baseline.diff(&now))
    }

    pub fn has_unsaved_changes<R>(&self, record: &R) -> Result<bool, R::Error>
    where
        R: Trackable<Value = V> + ?Sized,
    {
        Ok(!self.unsaved_changes(record)?.is_empty())
    }

    pub fn unsaved_fields<R>(&self, record: &R) -> Result<FastHashSet<SmolStr>, R::Error>
    where
        R: Trackable<Value = V> + ?Sized,
    {
        Ok(self.unsaved_changes(record)?.fields())
    }

    /// `None` when the field is unchanged, deferred, or not tracked at all.
    pub fn get_unsaved_field_diff<R>(
        &self,
        record: &R,
        field: &str,
    ) -> Result<Option<FieldChange<V>>, R::Error>
    where
        R: Trackable<Value = V> + ?Sized,
    {
        Ok(self.unsaved_changes(record)?.remove(field))
    }

    // ════════════════════════════════════════════════════════════════════════
    // Recent updates (prior baseline vs current baseline)
    // ════════════════════════════════════════════════════════════════════════

    pub fn recent_updates(&self) -> FieldDiff<V> {
        match &self.prior_baseline {
            Some(prior) => prior.diff(&self.current_baseline),
            None => FieldDiff::default(),
        }
    }

    pub fn has_updated_fields(&self) -> bool {
        !self.recent_updates().is_empty()
    }

    pub fn updated_fields(&self) -> FastHashSet<SmolStr> {
        self.recent_updates().fields()
    }
}

// ─── ChangeTracked ──────────────────────────────────────────────────────────

/// Mix-in for record types that own a [`ChangeTracker`].
///
/// Implementors provide access to the tracker; everything else comes for free.
pub trait ChangeTracked: Trackable {
    fn change_tracker(&self) -> &ChangeTracker<Self::Value>;
    fn change_tracker_mut(&mut self) -> &mut ChangeTracker<Self::Value>;

    /// Report a lifecycle event. Call right after the event succeeded.
    fn sync_changes(&mut self, point: SyncPoint) -> Result<(), Self::Error> {
        let snapshot = FieldSnapshot::capture(&*self)?;
        self.change_tracker_mut().sync(point, snapshot);
        Ok(())
    }

    fn unsaved_changes(&self) -> Result<FieldDiff<Self::Value>, Self::Error> {
        self.change_tracker().unsaved_changes(self)
    }

    fn has_unsaved_changes(&self) -> Result<bool, Self::Error> {
        self.change_tracker().has_unsaved_changes(self)
    }

    fn unsaved_fields(&self) -> Result<FastHashSet<SmolStr>, Self::Error> {
        self.change_tracker().unsaved_fields(self)
    }

    fn get_unsaved_field_diff(
        &self,
        field: &str,
    ) -> Result<Option<FieldChange<Self::Value>>, Self::Error> {
        self.change_tracker().get_unsaved_field_diff(self, field)
    }

    fn recent_updates(&self) -> FieldDiff<Self::Value> {
        self.change_tracker().recent_updates()
    }

    fn has_updated_fields(&self) -> bool {
        self.change_tracker().has_updated_fields()
    }

    fn updated_fields(&self) -> FastHashSet<SmolStr> {
        self.change_tracker().updated_fields()
    }
}
