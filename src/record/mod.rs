//! A dynamic, schema-driven record persisted in a [`RecordStore`], with
//! change tracking wired into its lifecycle.
//!
//! | Operation                      | Sync point reported |
//! |--------------------------------|---------------------|
//! | `new` / `load` / `get_or_create` (found) | `Construct` |
//! | `create` / `get_or_create` (created)     | `Construct`, then `Persist` |
//! | `save` (after a successful write)        | `Persist` |
//! | `refresh`                                | `Reload` |

use smol_str::SmolStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::RecordStore;
use crate::error::RecordError;
use crate::schema::{FieldKind, ID_FIELD, Schema};
use crate::spooky_value::SpookyValue;
use crate::tracker::{
    ChangeTracked, ChangeTracker, FieldSnapshot, FieldState, SyncPoint, Trackable,
};
use crate::types::{FastMap, FieldName, RecordId, Row};

// ─── Record ─────────────────────────────────────────────────────────────────

/// One row of a [`Schema`], held in memory.
///
/// Only materialized fields live in `values`. A field loaded with
/// [`Record::load_deferred`] stays absent until it is set or fetched.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<Schema>,
    values: FastMap<FieldName, SpookyValue>,
    tracker: ChangeTracker,
    // a stored row backs this record; `save` updates instead of inserting
    persisted: bool,
}

impl Record {
    // ════════════════════════════════════════════════════════════════════════
    // Construction
    // ════════════════════════════════════════════════════════════════════════

    fn construct(
        schema: Arc<Schema>,
        values: FastMap<FieldName, SpookyValue>,
        persisted: bool,
    ) -> Result<Self, RecordError> {
        let mut record = Record {
            schema,
            values,
            tracker: ChangeTracker::from_baseline(FieldSnapshot::default()),
            persisted,
        };
        record.sync_changes(SyncPoint::Construct)?;
        Ok(record)
    }

    /// A new, unsaved record: schema defaults overlaid with `fields`.
    /// Field names may be declared names or attnames. An `id` given here is
    /// used as-is by the first `save`, which still inserts.
    pub fn new<I>(schema: &Arc<Schema>, fields: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = (SmolStr, SpookyValue)>,
    {
        let mut values: FastMap<FieldName, SpookyValue> =
            schema.initial_row().into_iter().collect();
        for (name, value) in fields {
            let def = schema
                .resolve(&name)
                .ok_or_else(|| schema.unknown_field(&name))?;
            values.insert(def.attname.clone(), value);
        }
        Self::construct(schema.clone(), values, false)
    }

    /// `new` followed by `save`. Always inserts; a taken `id` fails with
    /// `AlreadyExists`.
    pub fn create<I>(store: &RecordStore, schema: &Arc<Schema>, fields: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = (SmolStr, SpookyValue)>,
    {
        let mut record = Self::new(schema, fields)?;
        record.save(store)?;
        Ok(record)
    }

    pub fn load(store: &RecordStore, schema: &Arc<Schema>, id: RecordId) -> Result<Self, RecordError> {
        Self::load_deferred(store, schema, id, &[])
    }

    /// Load a row, leaving the fields named in `deferred` unmaterialized.
    /// The primary key is always loaded.
    pub fn load_deferred(
        store: &RecordStore,
        schema: &Arc<Schema>,
        id: RecordId,
        deferred: &[&str],
    ) -> Result<Self, RecordError> {
        let mut skip = Vec::with_capacity(deferred.len());
        for name in deferred {
            let def = schema
                .resolve(name)
                .ok_or_else(|| schema.unknown_field(name))?;
            if def.kind != FieldKind::PrimaryKey {
                skip.push(def.attname.clone());
            }
        }

        let row = store
            .get_row(schema.table(), id)?
            .ok_or_else(|| RecordError::NotFound {
                table: schema.table().clone(),
                id,
            })?;
        Self::from_row(schema, id, row, &skip)
    }

    fn from_row(
        schema: &Arc<Schema>,
        id: RecordId,
        mut row: Row,
        skip: &[FieldName],
    ) -> Result<Self, RecordError> {
        let values = schema
            .fields()
            .iter()
            .filter(|def| !skip.contains(&def.attname))
            .map(|def| {
                let value = match def.kind {
                    FieldKind::PrimaryKey => SpookyValue::from(id),
                    _ => row
                        .remove(&def.attname)
                        .unwrap_or_else(|| def.initial_value()),
                };
                (def.attname.clone(), value)
            })
            .collect();
        Self::construct(schema.clone(), values, true)
    }

    /// Find the first row whose `field` equals `value`, or create one from
    /// `defaults` plus that field. Returns `(record, created)`.
    pub fn get_or_create<I>(
        store: &RecordStore,
        schema: &Arc<Schema>,
        field: &str,
        value: impl Into<SpookyValue>,
        defaults: I,
    ) -> Result<(Self, bool), RecordError>
    where
        I: IntoIterator<Item = (SmolStr, SpookyValue)>,
    {
        let attname = schema
            .resolve(field)
            .map(|def| def.attname.clone())
            .ok_or_else(|| schema.unknown_field(field))?;
        let value = value.into();

        if let Some((id, row)) = store.find_row(schema.table(), &attname, &value)? {
            return Ok((Self::from_row(schema, id, row, &[])?, false));
        }
        let fields = defaults.into_iter().chain(std::iter::once((attname, value)));
        Ok((Self::create(store, schema, fields)?, true))
    }

    // ════════════════════════════════════════════════════════════════════════
    // Field access
    // ════════════════════════════════════════════════════════════════════════

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// `None` until the first successful save, unless set explicitly.
    pub fn id(&self) -> Option<RecordId> {
        self.values.get(ID_FIELD).and_then(SpookyValue::as_u64)
    }

    fn attname(&self, name: &str) -> Result<FieldName, RecordError> {
        self.schema
            .resolve(name)
            .map(|def| def.attname.clone())
            .ok_or_else(|| self.schema.unknown_field(name))
    }

    /// `None` for deferred or unknown fields.
    pub fn get(&self, name: &str) -> Option<&SpookyValue> {
        let def = self.schema.resolve(name)?;
        self.values.get(&def.attname)
    }

    pub fn is_deferred(&self, name: &str) -> bool {
        self.schema
            .resolve(name)
            .is_some_and(|def| !self.values.contains_key(&def.attname))
    }

    /// Set a field in memory. Setting a deferred field materializes it.
    pub fn set(&mut self, name: &str, value: impl Into<SpookyValue>) -> Result<(), RecordError> {
        let attname = self.attname(name)?;
        self.values.insert(attname, value.into());
        Ok(())
    }

    /// Point the foreign key `name` at `related`, by id.
    pub fn set_related(&mut self, name: &str, related: &Record) -> Result<(), RecordError> {
        let attname = self.foreign_key(name)?;
        let id = related.saved_id()?;
        self.values.insert(attname, SpookyValue::from(id));
        Ok(())
    }

    /// The referenced id. Never loads the related record.
    pub fn related_id(&self, name: &str) -> Result<Option<RecordId>, RecordError> {
        let attname = self.foreign_key(name)?;
        Ok(self.values.get(&attname).and_then(SpookyValue::as_u64))
    }

    fn foreign_key(&self, name: &str) -> Result<FieldName, RecordError> {
        let def = self
            .schema
            .resolve(name)
            .ok_or_else(|| self.schema.unknown_field(name))?;
        match def.kind {
            FieldKind::ForeignKey { .. } => Ok(def.attname.clone()),
            _ => Err(RecordError::NotForeignKey {
                table: self.schema.table().clone(),
                field: SmolStr::new(name),
            }),
        }
    }

    /// Materialize one deferred field from storage.
    ///
    /// Baselines are not touched: the field stays out of every diff until
    /// the next sync point.
    pub fn fetch_deferred(&mut self, store: &RecordStore, name: &str) -> Result<&SpookyValue, RecordError> {
        let attname = self.attname(name)?;
        if !self.values.contains_key(&attname) {
            let id = self.saved_id()?;
            let mut row = self.stored_row(store, id)?;
            let value = match row.remove(&attname) {
                Some(value) => value,
                None => self
                    .schema
                    .get(&attname)
                    .map(|def| def.initial_value())
                    .unwrap_or_default(),
            };
            self.values.insert(attname.clone(), value);
        }
        self.values
            .get(&attname)
            .ok_or_else(|| self.schema.unknown_field(name))
    }

    // ════════════════════════════════════════════════════════════════════════
    // Persistence
    // ════════════════════════════════════════════════════════════════════════

    /// Write the record. A record not yet backed by a row is inserted, taking
    /// the next id unless one was set; auto-now fields are stamped.
    ///
    /// In-memory state and baselines change only once the write has
    /// succeeded. On error both are exactly as before the call.
    pub fn save(&mut self, store: &RecordStore) -> Result<(), RecordError> {
        let table = self.schema.table().clone();
        let is_new = !self.persisted;
        let id = match self.id() {
            Some(id) => id,
            None if is_new => store.next_id(&table)?,
            None => return Err(RecordError::NotSaved { table }),
        };

        let stamp = self.next_stamp();
        let mut pending: Vec<(FieldName, SpookyValue)> = Vec::new();
        if self.id().is_none() {
            pending.push((SmolStr::new(ID_FIELD), SpookyValue::from(id)));
        }
        for attname in self.schema.auto_now_fields() {
            pending.push((attname.clone(), SpookyValue::from(stamp)));
        }

        // deferred fields keep their stored values
        let mut row = if is_new || !self.has_deferred() {
            self.schema.initial_row()
        } else {
            self.stored_row(store, id)?
        };
        for (attname, value) in self.values.iter().chain(pending.iter().map(|(k, v)| (k, v))) {
            row.insert(attname.clone(), value.clone());
        }

        if is_new {
            store.insert_row(&table, id, &row)?;
        } else {
            store.update_row(&table, id, &row)?;
        }

        self.values.extend(pending);
        self.persisted = true;
        self.sync_changes(SyncPoint::Persist)
    }

    /// Re-read every materialized field from storage, discarding edits.
    /// Deferred fields stay deferred.
    pub fn refresh(&mut self, store: &RecordStore) -> Result<(), RecordError> {
        let id = self.saved_id()?;
        let mut row = self.stored_row(store, id)?;
        for (attname, value) in self.values.iter_mut() {
            *value = match row.remove(attname) {
                Some(stored) => stored,
                None => self
                    .schema
                    .get(attname)
                    .map(|def| def.initial_value())
                    .unwrap_or_default(),
            };
        }
        tracing::debug!(table = %self.schema.table(), id, "record refreshed");
        self.sync_changes(SyncPoint::Reload)
    }

    /// Remove the row and clear the id. Returns whether the row existed.
    /// A later `save` inserts under a fresh id.
    pub fn delete(&mut self, store: &RecordStore) -> Result<bool, RecordError> {
        let id = self.saved_id()?;
        let existed = store.delete_row(self.schema.table(), id)?;
        self.values.insert(SmolStr::new(ID_FIELD), SpookyValue::Null);
        self.persisted = false;
        Ok(existed)
    }

    fn saved_id(&self) -> Result<RecordId, RecordError> {
        self.id().filter(|_| self.persisted).ok_or_else(|| RecordError::NotSaved {
            table: self.schema.table().clone(),
        })
    }

    fn stored_row(&self, store: &RecordStore, id: RecordId) -> Result<Row, RecordError> {
        store
            .get_row(self.schema.table(), id)?
            .ok_or_else(|| RecordError::NotFound {
                table: self.schema.table().clone(),
                id,
            })
    }

    fn has_deferred(&self) -> bool {
        self.schema
            .attnames()
            .any(|attname| !self.values.contains_key(attname))
    }

    /// Microseconds since the epoch, strictly after every current auto-now value.
    fn next_stamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        self.schema
            .auto_now_fields()
            .filter_map(|attname| self.values.get(attname)?.as_u64())
            .map(|previous| previous.saturating_add(1))
            .fold(now, u64::max)
    }
}

// ─── Change tracking ────────────────────────────────────────────────────────

impl Trackable for Record {
    type Value = SpookyValue;
    type Error = RecordError;

    fn tracked_fields(&self) -> Result<Vec<(SmolStr, FieldState<'_, SpookyValue>)>, RecordError> {
        Ok(self
            .schema
            .attnames()
            .map(|attname| {
                let state = match self.values.get(attname) {
                    Some(value) => FieldState::Loaded(value),
                    None => FieldState::Deferred,
                };
                (attname.clone(), state)
            })
            .collect())
    }
}

impl ChangeTracked for Record {
    fn change_tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    fn change_tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }
}

#[cfg(test)]
mod tests;
