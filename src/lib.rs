//! Change tracking for structured records.
//!
//! [`tracker`] is the behavior itself: attach a [`ChangeTracker`] to any type
//! that implements [`Trackable`], report its lifecycle through
//! [`ChangeTracked::sync_changes`], and ask for
//! [`unsaved_changes`](ChangeTracked::unsaved_changes) or
//! [`recent_updates`](ChangeTracked::recent_updates).
//!
//! [`record`], [`schema`] and [`db`] form a small redb-backed host record
//! system that wires the tracker into construct / save / refresh.

pub mod db;
pub mod error;
pub mod record;
pub mod schema;
pub mod spooky_value;
pub mod tracker;
pub mod types;

pub use db::RecordStore;
pub use error::RecordError;
pub use record::Record;
pub use schema::Schema;
pub use spooky_value::{SpookyNumber, SpookyValue};
pub use tracker::{
    ChangeTracked, ChangeTracker, FieldChange, FieldDiff, FieldSnapshot, FieldState, SyncPoint,
    Trackable,
};

// used by `spooky_fields!`
#[doc(hidden)]
pub use smol_str;
