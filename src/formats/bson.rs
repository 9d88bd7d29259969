//! BSON format.

use bson::{Bson, Document};
use serde_json::{Map, Number, Value};

use super::ConfigFormat;
use crate::error::ConfigError;

/// BSON documents. Integers are written as int64; int32 values decode to
/// integers. BSON types with no plain-value counterpart are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct BsonFormat;

fn bson_err(e: impl ToString) -> ConfigError {
    ConfigError::format("bson", e)
}

fn to_bson(value: &Value) -> Result<Bson, ConfigError> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Bson::Int64(i)
            } else if n.is_u64() {
                return Err(bson_err(format!("integer {n} does not fit in int64")));
            } else {
                Bson::Double(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(to_bson).collect::<Result<_, _>>()?),
        Value::Object(map) => Bson::Document(to_document(map)?),
    })
}

fn to_document(map: &Map<String, Value>) -> Result<Document, ConfigError> {
    let mut doc = Document::new();
    for (key, value) in map {
        doc.insert(key.clone(), to_bson(value)?);
    }
    Ok(doc)
}

fn from_bson(value: Bson) -> Result<Value, ConfigError> {
    Ok(match value {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(i) => Value::from(i),
        Bson::Int64(i) => Value::from(i),
        Bson::Double(f) => Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| bson_err(format!("non-finite double {f}")))?,
        Bson::String(s) => Value::String(s),
        Bson::Array(items) => Value::Array(items.into_iter().map(from_bson).collect::<Result<_, _>>()?),
        Bson::Document(doc) => from_document(doc)?,
        other => {
            return Err(bson_err(format!(
                "unsupported BSON type {:?}",
                other.element_type()
            )));
        }
    })
}

fn from_document(doc: Document) -> Result<Value, ConfigError> {
    doc.into_iter()
        .map(|(key, value)| Ok((key, from_bson(value)?)))
        .collect::<Result<Map<_, _>, ConfigError>>()
        .map(Value::Object)
}

impl ConfigFormat for BsonFormat {
    fn name(&self) -> &str {
        "bson"
    }

    fn extensions(&self) -> &[&str] {
        &["bson"]
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, ConfigError> {
        let Value::Object(map) = value else {
            return Err(bson_err("document root must be a mapping"));
        };
        let mut bytes = Vec::new();
        to_document(map)?.to_writer(&mut bytes).map_err(bson_err)?;
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, ConfigError> {
        let doc = Document::from_reader(bytes).map_err(bson_err)?;
        from_document(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integers_written_as_int64() {
        let bytes = BsonFormat.encode(&json!({"n": 5})).unwrap();
        let doc = Document::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(doc.get("n"), Some(&Bson::Int64(5)));
    }

    #[test]
    fn test_int32_decodes_to_integer() {
        let mut doc = Document::new();
        doc.insert("n", Bson::Int32(7));
        doc.insert("nested", bson::doc! {"list": [1_i32, "a", null]});
        let mut bytes = Vec::new();
        doc.to_writer(&mut bytes).unwrap();
        assert_eq!(
            BsonFormat.decode(&bytes).unwrap(),
            json!({"n": 7, "nested": {"list": [1, "a", null]}})
        );
    }

    #[test]
    fn test_unsupported_types_rejected() {
        let mut doc = Document::new();
        doc.insert("id", bson::oid::ObjectId::new());
        let mut bytes = Vec::new();
        doc.to_writer(&mut bytes).unwrap();
        assert!(BsonFormat.decode(&bytes).is_err());
    }

    #[test]
    fn test_root_must_be_mapping() {
        assert!(BsonFormat.encode(&json!([1])).is_err());
        assert!(BsonFormat.encode(&json!({"big": u64::MAX})).is_err());
    }
}
