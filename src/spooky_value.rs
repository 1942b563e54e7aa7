use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Ordered map used for `Object` values and record rows.
pub type ObjectMap<K, V> = BTreeMap<K, V>;

// ─── SpookyNumber ───────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub enum SpookyNumber {
    I64(i64),
    U64(u64),
    F64(f64),
}

impl std::fmt::Debug for SpookyNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpookyNumber::I64(i) => write!(f, "I64({})", i),
            SpookyNumber::U64(u) => write!(f, "U64({})", u),
            SpookyNumber::F64(v) => write!(f, "F64({})", v),
        }
    }
}

/// Numbers compare by value, not by representation: `I64(7) == U64(7) == F64(7.0)`.
///
/// Storage round trips are free to pick a different integer width, and a field
/// that comes back as `I64` after being written as `U64` has not changed.
///
/// Comparison is exact: a float equals an integer only when it is integral and
/// the integer converts to it without rounding, so equality stays transitive
/// near `2^63`. `NaN` equals `NaN`, which keeps a value equal to its own copy.
impl PartialEq for SpookyNumber {
    fn eq(&self, other: &Self) -> bool {
        use SpookyNumber::*;
        match (*self, *other) {
            (I64(a), I64(b)) => a == b,
            (U64(a), U64(b)) => a == b,
            (F64(a), F64(b)) => a == b || (a.is_nan() && b.is_nan()),
            (I64(i), U64(u)) | (U64(u), I64(i)) => u64::try_from(i).is_ok_and(|i| i == u),
            (F64(f), I64(i)) | (I64(i), F64(f)) => float_to_i64(f) == Some(i),
            (F64(f), U64(u)) | (U64(u), F64(f)) => float_to_u64(f) == Some(u),
        }
    }
}

// 2^63 and 2^64; both bounds are exact in f64, the integer MAX values are not.
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

fn float_to_i64(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= -TWO_POW_63 && f < TWO_POW_63).then(|| f as i64)
}

fn float_to_u64(f: f64) -> Option<u64> {
    (f.fract() == 0.0 && f >= 0.0 && f < TWO_POW_64).then(|| f as u64)
}

impl SpookyNumber {
    pub fn as_f64(self) -> f64 {
        match self {
            SpookyNumber::I64(i) => i as f64,
            SpookyNumber::U64(u) => u as f64,
            SpookyNumber::F64(f) => f,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            SpookyNumber::I64(i) => Some(i),
            SpookyNumber::U64(u) => i64::try_from(u).ok(),
            SpookyNumber::F64(f) => float_to_i64(f),
        }
    }

    pub fn as_u64(self) -> Option<u64> {
        match self {
            SpookyNumber::U64(u) => Some(u),
            SpookyNumber::I64(i) => u64::try_from(i).ok(),
            SpookyNumber::F64(f) => float_to_u64(f),
        }
    }
}

// ─── SpookyValue ────────────────────────────────────────────────────────────

/// A dynamically typed field value.
///
/// `Clone` is deep: a cloned `Array` or `Object` shares nothing with the
/// original, so a snapshot taken by cloning is never affected by later edits
/// to the live value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SpookyValue {
    #[default]
    Null,
    Bool(bool),
    Number(SpookyNumber),
    Str(SmolStr),
    Array(Vec<SpookyValue>),
    Object(ObjectMap<SmolStr, SpookyValue>),
}

impl SpookyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SpookyValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SpookyValue::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SpookyValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SpookyValue::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SpookyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectMap<SmolStr, SpookyValue>> {
        match self {
            SpookyValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<SpookyValue>> {
        match self {
            SpookyValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Mutable access to an array value, for in-place edits.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<SpookyValue>> {
        match self {
            SpookyValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&SpookyValue> {
        self.as_object()?.get(key)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SpookyValue::Null)
    }
}

// ─── Serialize ──────────────────────────────────────────────────────────────

impl Serialize for SpookyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SpookyValue::Null => serializer.serialize_none(),
            SpookyValue::Bool(b) => serializer.serialize_bool(*b),
            SpookyValue::Number(n) => match n {
                SpookyNumber::I64(i) => serializer.serialize_i64(*i),
                SpookyNumber::U64(u) => serializer.serialize_u64(*u),
                SpookyNumber::F64(f) => serializer.serialize_f64(*f),
            },
            SpookyValue::Str(s) => serializer.serialize_str(s.as_str()),
            SpookyValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            SpookyValue::Object(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k.as_str(), v)?;
                }
                m.end()
            }
        }
    }
}

// ─── From impls ─────────────────────────────────────────────────────────────

impl From<f64> for SpookyValue {
    fn from(n: f64) -> Self {
        SpookyValue::Number(SpookyNumber::F64(n))
    }
}

impl From<i64> for SpookyValue {
    fn from(n: i64) -> Self {
        SpookyValue::Number(SpookyNumber::I64(n))
    }
}

impl From<i32> for SpookyValue {
    fn from(n: i32) -> Self {
        SpookyValue::Number(SpookyNumber::I64(n.into()))
    }
}

impl From<u64> for SpookyValue {
    fn from(n: u64) -> Self {
        SpookyValue::Number(SpookyNumber::U64(n))
    }
}

impl From<bool> for SpookyValue {
    fn from(b: bool) -> Self {
        SpookyValue::Bool(b)
    }
}

impl From<&str> for SpookyValue {
    fn from(s: &str) -> Self {
        SpookyValue::Str(SmolStr::from(s))
    }
}

impl From<String> for SpookyValue {
    fn from(s: String) -> Self {
        SpookyValue::Str(SmolStr::from(s))
    }
}

impl From<SmolStr> for SpookyValue {
    fn from(s: SmolStr) -> Self {
        SpookyValue::Str(s)
    }
}

impl<T: Into<SpookyValue>> From<Vec<T>> for SpookyValue {
    fn from(items: Vec<T>) -> Self {
        SpookyValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<SpookyValue>> From<Option<T>> for SpookyValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SpookyValue::Null, Into::into)
    }
}

// ─── From/Into cbor4ii::core::Value ─────────────────────────────────────────

impl From<cbor4ii::core::Value> for SpookyValue {
    fn from(v: cbor4ii::core::Value) -> Self {
        use cbor4ii::core::Value;
        match v {
            Value::Null => SpookyValue::Null,
            Value::Bool(b) => SpookyValue::Bool(b),
            Value::Integer(i) => {
                if let Ok(val) = i64::try_from(i) {
                    SpookyValue::Number(SpookyNumber::I64(val))
                } else if let Ok(val) = u64::try_from(i) {
                    SpookyValue::Number(SpookyNumber::U64(val))
                } else {
                    SpookyValue::Number(SpookyNumber::F64(i as f64))
                }
            }
            Value::Float(f) => SpookyValue::Number(SpookyNumber::F64(f)),
            Value::Text(s) => SpookyValue::Str(SmolStr::from(s)),
            Value::Array(arr) => SpookyValue::Array(arr.into_iter().map(SpookyValue::from).collect()),
            Value::Map(entries) => SpookyValue::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Value::Text(s) => SmolStr::from(s),
                            Value::Integer(i) => SmolStr::from(i.to_string()),
                            other => SmolStr::from(format!("{:?}", other)),
                        };
                        (key, SpookyValue::from(v))
                    })
                    .collect(),
            ),
            Value::Tag(_, inner) => SpookyValue::from(*inner),
            _ => SpookyValue::Null,
        }
    }
}

impl From<SpookyValue> for cbor4ii::core::Value {
    fn from(val: SpookyValue) -> Self {
        use cbor4ii::core::Value;
        match val {
            SpookyValue::Null => Value::Null,
            SpookyValue::Bool(b) => Value::Bool(b),
            SpookyValue::Number(n) => match n {
                SpookyNumber::I64(i) => Value::Integer(i.into()),
                SpookyNumber::U64(u) => Value::Integer(u.into()),
                SpookyNumber::F64(f) => Value::Float(f),
            },
            SpookyValue::Str(s) => Value::Text(s.to_string()),
            SpookyValue::Array(arr) => Value::Array(arr.into_iter().map(Into::into).collect()),
            SpookyValue::Object(obj) => Value::Map(
                obj.into_iter()
                    .map(|(k, v)| (Value::Text(k.to_string()), v.into()))
                    .collect(),
            ),
        }
    }
}

// ─── From/Into serde_json::Value ────────────────────────────────────────────

impl From<serde_json::Value> for SpookyValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => SpookyValue::Null,
            serde_json::Value::Bool(b) => SpookyValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SpookyValue::Number(SpookyNumber::I64(i))
                } else if let Some(u) = n.as_u64() {
                    SpookyValue::Number(SpookyNumber::U64(u))
                } else {
                    SpookyValue::Number(SpookyNumber::F64(n.as_f64().unwrap_or(0.0)))
                }
            }
            serde_json::Value::String(s) => SpookyValue::Str(SmolStr::from(s)),
            serde_json::Value::Array(arr) => {
                SpookyValue::Array(arr.into_iter().map(SpookyValue::from).collect())
            }
            serde_json::Value::Object(obj) => SpookyValue::Object(
                obj.into_iter()
                    .map(|(k, v)| (SmolStr::from(k), SpookyValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<SpookyValue> for serde_json::Value {
    fn from(val: SpookyValue) -> Self {
        match val {
            SpookyValue::Null => serde_json::Value::Null,
            SpookyValue::Bool(b) => serde_json::Value::Bool(b),
            SpookyValue::Number(n) => match n {
                SpookyNumber::I64(i) => serde_json::json!(i),
                SpookyNumber::U64(u) => serde_json::json!(u),
                SpookyNumber::F64(f) => serde_json::json!(f),
            },
            SpookyValue::Str(s) => serde_json::Value::String(s.to_string()),
            SpookyValue::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(|v| v.into()).collect())
            }
            SpookyValue::Object(obj) => serde_json::Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k.to_string(), v.into()))
                    .collect(),
            ),
        }
    }
}

/// Build a `Vec<(SmolStr, SpookyValue)>` of field assignments.
///
/// ```
/// use spooky_diff::spooky_fields;
/// let fields = spooky_fields! { "name" => "hello", "value" => 3i64 };
/// assert_eq!(fields.len(), 2);
/// ```
#[macro_export]
macro_rules! spooky_fields {
    ($($key:expr => $val:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut fields: ::std::vec::Vec<($crate::smol_str::SmolStr, $crate::spooky_value::SpookyValue)> =
            ::std::vec::Vec::new();
        $(
            fields.push((
                $crate::smol_str::SmolStr::new($key),
                $crate::spooky_value::SpookyValue::from($val),
            ));
        )*
        fields
    }};
}
