use smol_str::SmolStr;

use crate::error::RecordError;
use crate::spooky_value::SpookyValue;
use crate::types::{FieldName, Row, TableName};

/// Attname of the implicit primary key.
pub const ID_FIELD: &str = "id";

// ─── FieldKind ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Assigned from the table's sequence on first save. `Null` until then.
    PrimaryKey,
    /// Ordinary value with a default for new records.
    Plain { default: SpookyValue },
    /// Stamped by the store on every save (microseconds since the epoch).
    AutoNow,
    /// Holds the id of a record in `target`. Tracked under `{name}_id`.
    ForeignKey { target: TableName },
}

// ─── FieldDef ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Declared name (`owner`).
    pub name: SmolStr,
    /// Storage-level name (`owner_id` for foreign keys, `name` otherwise).
    pub attname: FieldName,
    pub kind: FieldKind,
}

impl FieldDef {
    /// Value a freshly constructed record starts with.
    pub fn initial_value(&self) -> SpookyValue {
        match &self.kind {
            FieldKind::Plain { default } => default.clone(),
            FieldKind::PrimaryKey | FieldKind::AutoNow | FieldKind::ForeignKey { .. } => {
                SpookyValue::Null
            }
        }
    }
}

// ─── Schema ─────────────────────────────────────────────────────────────────

/// Field layout of one table. Every schema starts with an `id` primary key.
///
/// ```
/// use spooky_diff::schema::Schema;
///
/// let schema = Schema::new("tracked")?
///     .field("name", "")
///     .field("tags", Vec::<&str>::new())
///     .auto_now("modified_at");
/// assert_eq!(
///     schema.attnames().map(|n| n.as_str()).collect::<Vec<_>>(),
///     ["id", "name", "tags", "modified_at"]
/// );
/// # Ok::<(), spooky_diff::RecordError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    table: TableName,
    fields: Vec<FieldDef>,
}

impl Schema {
    pub fn new(table: impl Into<TableName>) -> Result<Self, RecordError> {
        let table = table.into();
        if table.is_empty() || table.contains(':') {
            return Err(RecordError::InvalidKey(table.to_string()));
        }
        Ok(Self {
            table,
            fields: vec![FieldDef {
                name: SmolStr::new(ID_FIELD),
                attname: SmolStr::new(ID_FIELD),
                kind: FieldKind::PrimaryKey,
            }],
        })
    }

    pub fn field(self, name: &str, default: impl Into<SpookyValue>) -> Self {
        self.push(name, SmolStr::new(name), FieldKind::Plain {
            default: default.into(),
        })
    }

    pub fn auto_now(self, name: &str) -> Self {
        self.push(name, SmolStr::new(name), FieldKind::AutoNow)
    }

    pub fn foreign_key(self, name: &str, target: impl Into<TableName>) -> Self {
        let attname = SmolStr::from(format!("{name}_id"));
        self.push(name, attname, FieldKind::ForeignKey {
            target: target.into(),
        })
    }

    /// Redefining an attname replaces the earlier definition in place.
    fn push(mut self, name: &str, attname: FieldName, kind: FieldKind) -> Self {
        let def = FieldDef {
            name: SmolStr::new(name),
            attname,
            kind,
        };
        match self.fields.iter_mut().find(|f| f.attname == def.attname) {
            Some(existing) => *existing = def,
            None => self.fields.push(def),
        }
        self
    }

    #[inline]
    pub fn table(&self) -> &TableName {
        &self.table
    }

    #[inline]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Storage-level names of every trackable field, in declaration order.
    pub fn attnames(&self) -> impl Iterator<Item = &FieldName> {
        self.fields.iter().map(|f| &f.attname)
    }

    /// Look up by attname.
    pub fn get(&self, attname: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.attname == attname)
    }

    /// Look up by declared name, falling back to attname.
    pub fn resolve(&self, name: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.get(name))
    }

    pub fn auto_now_fields(&self) -> impl Iterator<Item = &FieldName> {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::AutoNow)
            .map(|f| &f.attname)
    }

    /// A row with every field at its initial value.
    pub fn initial_row(&self) -> Row {
        self.fields
            .iter()
            .map(|f| (f.attname.clone(), f.initial_value()))
            .collect()
    }

    pub(crate) fn unknown_field(&self, field: &str) -> RecordError {
        RecordError::UnknownField {
            table: self.table.clone(),
            field: SmolStr::new(field),
        }
    }
}
