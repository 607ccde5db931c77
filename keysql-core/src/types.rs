/// Attribute model and the native value codec
///
/// `AttributeValue` is the store's own typed encoding; `Value` is what callers
/// bind as statement parameters and read back from result rows. The two are
/// converted by a pure codec in both directions.

use crate::{Error, Result};
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// DynamoDB-style typed attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String
    S(String),
    /// Number (stored as string for precision)
    N(String),
    /// Binary
    B(Bytes),
    /// Boolean
    Bool(bool),
    /// Null
    Null,
    /// String set
    Ss(Vec<String>),
    /// Number set
    Ns(Vec<String>),
    /// Binary set
    Bs(Vec<Bytes>),
    /// List
    L(Vec<AttributeValue>),
    /// Map
    M(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn string(s: impl Into<String>) -> Self {
        AttributeValue::S(s.into())
    }

    pub fn number(n: impl ToString) -> Self {
        AttributeValue::N(n.to_string())
    }

    pub fn binary(b: impl Into<Bytes>) -> Self {
        AttributeValue::B(b.into())
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// The store's type tag for this attribute (`S`, `N`, `B`, `SS`, `NS`,
    /// `BS`, `BOOL`, `NULL`, `L` or `M`).
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::B(_) => "B",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::Null => "NULL",
            AttributeValue::Ss(_) => "SS",
            AttributeValue::Ns(_) => "NS",
            AttributeValue::Bs(_) => "BS",
            AttributeValue::L(_) => "L",
            AttributeValue::M(_) => "M",
        }
    }

    /// Convert a JSON document into attributes. Numbers keep their textual form.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => AttributeValue::Null,
            serde_json::Value::Bool(b) => AttributeValue::Bool(*b),
            serde_json::Value::Number(n) => AttributeValue::N(n.to_string()),
            serde_json::Value::String(s) => AttributeValue::S(s.clone()),
            serde_json::Value::Array(items) => {
                AttributeValue::L(items.iter().map(AttributeValue::from_json).collect())
            }
            serde_json::Value::Object(map) => AttributeValue::M(
                map.iter()
                    .map(|(k, v)| (k.clone(), AttributeValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Item - a map of attribute names to attributes
pub type Item = HashMap<String, AttributeValue>;

/// Native value as seen by callers
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Bytes),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

/// Kind of a native value, used as the inferred type of a result column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    String,
    Bytes,
    List,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Bytes => "bytes",
            ValueKind::List => "list",
            ValueKind::Map => "map",
        };
        f.write_str(name)
    }
}

impl ValueKind {
    /// Kind an attribute decodes to, without decoding it. Unparsable numbers
    /// report `Float`; the decode itself is what fails for them.
    pub fn of(attr: &AttributeValue) -> Self {
        match attr {
            AttributeValue::S(_) => ValueKind::String,
            AttributeValue::N(n) if n.parse::<i64>().is_ok() => ValueKind::Int,
            AttributeValue::N(_) => ValueKind::Float,
            AttributeValue::B(_) => ValueKind::Bytes,
            AttributeValue::Bool(_) => ValueKind::Bool,
            AttributeValue::Null => ValueKind::Null,
            AttributeValue::Ss(_)
            | AttributeValue::Ns(_)
            | AttributeValue::Bs(_)
            | AttributeValue::L(_) => ValueKind::List,
            AttributeValue::M(_) => ValueKind::Map,
        }
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Encode into the store's attribute form.
    pub fn to_attribute(&self) -> Result<AttributeValue> {
        Ok(match self {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Int(i) => AttributeValue::N(i.to_string()),
            Value::Float(f) => {
                if !f.is_finite() {
                    return Err(Error::Codec(format!("number <{}> cannot be stored", f)));
                }
                AttributeValue::N(f.to_string())
            }
            Value::String(s) => AttributeValue::S(s.clone()),
            Value::Bytes(b) => AttributeValue::B(b.clone()),
            Value::List(items) => AttributeValue::L(
                items
                    .iter()
                    .map(Value::to_attribute)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Map(map) => {
                let mut out = HashMap::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_attribute()?);
                }
                AttributeValue::M(out)
            }
        })
    }

    /// Decode an attribute into its native form. Sets become lists.
    pub fn from_attribute(attr: &AttributeValue) -> Result<Value> {
        Ok(match attr {
            AttributeValue::S(s) => Value::String(s.clone()),
            AttributeValue::N(n) => parse_number(n)?,
            AttributeValue::B(b) => Value::Bytes(b.clone()),
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Null => Value::Null,
            AttributeValue::Ss(items) => {
                Value::List(items.iter().cloned().map(Value::String).collect())
            }
            AttributeValue::Ns(items) => Value::List(
                items
                    .iter()
                    .map(|n| parse_number(n))
                    .collect::<Result<Vec<_>>>()?,
            ),
            AttributeValue::Bs(items) => {
                Value::List(items.iter().cloned().map(Value::Bytes).collect())
            }
            AttributeValue::L(items) => Value::List(
                items
                    .iter()
                    .map(Value::from_attribute)
                    .collect::<Result<Vec<_>>>()?,
            ),
            AttributeValue::M(map) => {
                let mut out = HashMap::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), Value::from_attribute(v)?);
                }
                Value::Map(out)
            }
        })
    }

    /// Render as JSON; binary data is base64-encoded.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(
                base64::engine::general_purpose::STANDARD.encode(b),
            ),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

fn parse_number(n: &str) -> Result<Value> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    match n.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(Value::Float(f)),
        _ => Err(Error::Codec(format!("invalid number <{}>", n))),
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_names() {
        assert_eq!(AttributeValue::string("a").type_name(), "S");
        assert_eq!(AttributeValue::number(1).type_name(), "N");
        assert_eq!(AttributeValue::Ns(vec!["1".into()]).type_name(), "NS");
        assert_eq!(AttributeValue::Null.type_name(), "NULL");
        assert_eq!(AttributeValue::M(HashMap::new()).type_name(), "M");
    }

    #[test]
    fn test_number_decoding() {
        assert_eq!(
            Value::from_attribute(&AttributeValue::number(42)).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            Value::from_attribute(&AttributeValue::N("1.5".into())).unwrap(),
            Value::Float(1.5)
        );
        let err = Value::from_attribute(&AttributeValue::N("abc".into())).unwrap_err();
        assert!(matches!(err, Error::Codec(msg) if msg.contains("abc")));
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        assert!(Value::Float(f64::NAN).to_attribute().is_err());
        assert!(Value::Float(f64::INFINITY).to_attribute().is_err());
        assert_eq!(
            Value::Float(2.25).to_attribute().unwrap(),
            AttributeValue::N("2.25".into())
        );
    }

    #[test]
    fn test_sets_decode_to_lists() {
        let ss = AttributeValue::Ss(vec!["a".into(), "b".into()]);
        assert_eq!(
            Value::from_attribute(&ss).unwrap(),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_nested_map_encoding() {
        let value = Value::from(json!({"name": "Alice", "tags": [1, 2], "ok": true}));
        let attr = value.to_attribute().unwrap();
        let AttributeValue::M(map) = &attr else {
            panic!("expected map, got {:?}", attr);
        };
        assert_eq!(map["name"], AttributeValue::string("Alice"));
        assert_eq!(
            map["tags"],
            AttributeValue::L(vec![AttributeValue::number(1), AttributeValue::number(2)])
        );
        assert_eq!(Value::from_attribute(&attr).unwrap(), value);
    }

    #[test]
    fn test_attribute_from_json() {
        let attr = AttributeValue::from_json(&json!({"TableName": "t", "ItemCount": 3}));
        let AttributeValue::M(map) = attr else {
            panic!("expected map");
        };
        assert_eq!(map["TableName"], AttributeValue::string("t"));
        assert_eq!(map["ItemCount"], AttributeValue::N("3".into()));
    }

    #[test]
    fn test_bytes_render_as_base64() {
        let v = Value::from(b"hi".to_vec());
        assert_eq!(v.to_json(), json!("aGk="));
        assert_eq!(v.kind(), ValueKind::Bytes);
    }

    #[test]
    fn test_kind_of_attribute() {
        assert_eq!(ValueKind::of(&AttributeValue::number(7)), ValueKind::Int);
        assert_eq!(ValueKind::of(&AttributeValue::N("7.5".into())), ValueKind::Float);
        assert_eq!(ValueKind::of(&AttributeValue::Ss(vec![])), ValueKind::List);
        assert_eq!(ValueKind::of(&AttributeValue::Bool(true)), ValueKind::Bool);
    }
}
