use rustc_hash::FxHasher;
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasherDefault;

use crate::spooky_value::{ObjectMap, SpookyValue};

pub type FastMap<K, V> = HashMap<K, V, BuildHasherDefault<FxHasher>>;
pub type FastHashSet<T> = HashSet<T, BuildHasherDefault<FxHasher>>;

/// Storage-level field name (`venue_id`, not `venue`).
pub type FieldName = SmolStr;

/// Primary key assigned by [`RecordStore::next_id`](crate::db::RecordStore::next_id).
pub type RecordId = u64;

/// Alias for table names. Must not contain ':'.
pub type TableName = SmolStr;

/// One stored row: every field of the schema, keyed by attname.
pub type Row = ObjectMap<FieldName, SpookyValue>;
