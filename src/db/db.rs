use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

use crate::error::RecordError;
use crate::spooky_value::SpookyValue;
use crate::types::{RecordId, Row};

// Table definitions
// Key: "{table}:{id:020}" (zero-padded so keys sort by id)
// Value: CBOR-encoded row map
const RECORDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("records");
// Key: table name, Value: last id handed out
const SEQUENCES_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequences");

pub struct RecordStore {
    db: Database,
}

impl RecordStore {
    /// Open or create the database at the specified path.
    /// Also ensures that the required tables exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECORDS_TABLE)?;
            let _ = write_txn.open_table(SEQUENCES_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Hand out the next id for `table`, starting at 1.
    pub fn next_id(&self, table: &str) -> Result<RecordId, RecordError> {
        let write_txn = self.db.begin_write()?;
        let id = {
            let mut seq = write_txn.open_table(SEQUENCES_TABLE)?;
            let last = seq.get(table)?.map(|g| g.value()).unwrap_or(0);
            let id = last + 1;
            seq.insert(table, id)?;
            id
        };
        write_txn.commit()?;
        Ok(id)
    }

    /// Write a new row. `AlreadyExists` (and no write) if the key is taken.
    ///
    /// The table's sequence is moved up to `id`, so an explicitly chosen id is
    /// never handed out again by [`next_id`](Self::next_id).
    pub fn insert_row(&self, table: &str, id: RecordId, row: &Row) -> Result<(), RecordError> {
        let key = row_key(table, id);
        let data = encode_row(row)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut records = write_txn.open_table(RECORDS_TABLE)?;
            if records.get(key.as_str())?.is_some() {
                return Err(RecordError::AlreadyExists {
                    table: table.into(),
                    id,
                });
            }
            records.insert(key.as_str(), data.as_slice())?;

            let mut seq = write_txn.open_table(SEQUENCES_TABLE)?;
            let last = seq.get(table)?.map(|g| g.value()).unwrap_or(0);
            if id > last {
                seq.insert(table, id)?;
            }
        }
        write_txn.commit()?;
        tracing::debug!(table, id, "row inserted");
        Ok(())
    }

    /// Replace an existing row. `NotFound` (and no write) if it is gone.
    pub fn update_row(&self, table: &str, id: RecordId, row: &Row) -> Result<(), RecordError> {
        let key = row_key(table, id);
        let data = encode_row(row)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut records = write_txn.open_table(RECORDS_TABLE)?;
            let exists = records.get(key.as_str())?.is_some();
            if !exists {
                return Err(RecordError::NotFound {
                    table: table.into(),
                    id,
                });
            }
            records.insert(key.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        tracing::debug!(table, id, "row updated");
        Ok(())
    }

    pub fn get_row(&self, table: &str, id: RecordId) -> Result<Option<Row>, RecordError> {
        let key = row_key(table, id);
        let read_txn = self.db.begin_read()?;
        let records = read_txn.open_table(RECORDS_TABLE)?;

        match records.get(key.as_str())? {
            Some(access) => Ok(Some(decode_row(&key, access.value())?)),
            None => Ok(None),
        }
    }

    /// Remove a row. Returns true if it existed.
    pub fn delete_row(&self, table: &str, id: RecordId) -> Result<bool, RecordError> {
        let key = row_key(table, id);
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut records = write_txn.open_table(RECORDS_TABLE)?;
            records.remove(key.as_str())?.is_some()
        };
        write_txn.commit()?;
        tracing::debug!(table, id, existed, "row deleted");
        Ok(existed)
    }

    /// First row of `table` (lowest id) whose `field` equals `value`.
    ///
    /// Full scan of the table's key range. Rows that fail to decode are
    /// skipped with a warning.
    pub fn find_row(
        &self,
        table: &str,
        field: &str,
        value: &SpookyValue,
    ) -> Result<Option<(RecordId, Row)>, RecordError> {
        let start = format!("{table}:");
        // ';' is the byte after ':'
        let end = format!("{table};");
        let read_txn = self.db.begin_read()?;
        let records = read_txn.open_table(RECORDS_TABLE)?;

        for entry in records.range(start.as_str()..end.as_str())? {
            let (key, data) = entry?;
            let key = key.value();
            let row = match decode_row(key, data.value()) {
                Ok(row) => row,
                Err(err) => {
                    tracing::warn!(key, %err, "skipping undecodable row");
                    continue;
                }
            };
            if row.get(field) != Some(value) {
                continue;
            }
            let id = parse_id(key)?;
            return Ok(Some((id, row)));
        }
        Ok(None)
    }
}

// ─── Keys & Encoding ────────────────────────────────────────────────────────

fn row_key(table: &str, id: RecordId) -> String {
    format!("{table}:{id:020}")
}

fn parse_id(key: &str) -> Result<RecordId, RecordError> {
    key.rsplit_once(':')
        .and_then(|(_, id)| id.parse().ok())
        .ok_or_else(|| RecordError::InvalidKey(key.to_string()))
}

fn encode_row(row: &Row) -> Result<Vec<u8>, RecordError> {
    let mut buf = Vec::new();
    cbor4ii::serde::to_writer(&mut buf, row).map_err(|e| RecordError::Cbor(e.to_string()))?;
    Ok(buf)
}

fn decode_row(key: &str, data: &[u8]) -> Result<Row, RecordError> {
    let cbor_val: cbor4ii::core::Value =
        cbor4ii::serde::from_slice(data).map_err(|e| RecordError::Cbor(e.to_string()))?;
    match SpookyValue::from(cbor_val) {
        SpookyValue::Object(row) => Ok(row),
        _ => Err(RecordError::InvalidRow {
            key: key.to_string(),
        }),
    }
}
