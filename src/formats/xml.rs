//! XML format.
//!
//! The root element is `<config>`. Every element carries a `type`
//! attribute naming its kind (`str`, `bool`, `int`, `float`, `none`,
//! `list`, `dict`). Mapping entries are child elements named by key and
//! sequence entries are `<item>` elements, recursively. Typed text that
//! does not parse decodes as the original string.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde_json::{Map, Number, Value};

use super::ConfigFormat;
use crate::error::ConfigError;
use crate::fields::parse_bool;

const ROOT: &str = "config";
const ITEM: &str = "item";
const TYPE_ATTR: &str = "type";

/// XML documents via `quick-xml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlFormat;

fn xml_err(e: impl ToString) -> ConfigError {
    ConfigError::format("xml", e)
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.to_ascii_lowercase().starts_with("xml")
}

// ============================================================================
// Encoding
// ============================================================================

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "none",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<(), ConfigError> {
    if !is_xml_name(name) {
        return Err(xml_err(format!("key {name:?} is not a valid XML element name")));
    }
    let start = BytesStart::new(name).with_attributes([(TYPE_ATTR, kind_of(value))]);

    match value {
        Value::Array(items) if !items.is_empty() => {
            writer.write_event(Event::Start(start)).map_err(xml_err)?;
            for item in items {
                write_element(writer, ITEM, item)?;
            }
            writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)?;
        }
        Value::Object(map) if !map.is_empty() => {
            writer.write_event(Event::Start(start)).map_err(xml_err)?;
            for (key, item) in map {
                write_element(writer, key, item)?;
            }
            writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)?;
        }
        Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if text.is_empty() {
                writer.write_event(Event::Empty(start)).map_err(xml_err)?;
            } else {
                writer.write_event(Event::Start(start)).map_err(xml_err)?;
                writer
                    .write_event(Event::Text(BytesText::new(&text)))
                    .map_err(xml_err)?;
                writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)?;
            }
        }
        _ => {
            writer.write_event(Event::Empty(start)).map_err(xml_err)?;
        }
    }
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

/// An element being decoded.
struct Frame {
    name: String,
    kind: Option<String>,
    text: String,
    children: Vec<(String, Value)>,
}

impl Frame {
    fn open(start: &BytesStart<'_>, is_root: bool) -> Result<Self, ConfigError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut kind = None;
        for attr in start.attributes() {
            let attr = attr.map_err(xml_err)?;
            if attr.key.as_ref() == TYPE_ATTR.as_bytes() {
                kind = Some(attr.unescape_value().map_err(xml_err)?.into_owned());
            }
        }
        if is_root && kind.is_none() {
            kind = Some("dict".to_string());
        }
        Ok(Self {
            name,
            kind,
            text: String::new(),
            children: Vec::new(),
        })
    }

    fn finish(self) -> Value {
        let fallback = || Value::String(self.text.clone());
        let trimmed = self.text.trim();
        match self.kind.as_deref() {
            Some("dict") => Value::Object(self.children.into_iter().collect::<Map<_, _>>()),
            Some("list") => Value::Array(self.children.into_iter().map(|(_, v)| v).collect()),
            Some("none") => Value::Null,
            Some("bool") => parse_bool(trimmed).map_or_else(fallback, Value::Bool),
            Some("int") => trimmed
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| trimmed.parse::<u64>().map(Value::from))
                .unwrap_or_else(|_| fallback()),
            Some("float") => trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map_or_else(fallback, Value::Number),
            None if !self.children.is_empty() => {
                Value::Object(self.children.into_iter().collect::<Map<_, _>>())
            }
            _ => Value::String(self.text),
        }
    }
}

fn decode_document(text: &str) -> Result<Value, ConfigError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root = None;

    loop {
        let closed = match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => {
                stack.push(Frame::open(&start, stack.is_empty())?);
                None
            }
            Event::Empty(start) => Some(Frame::open(&start, stack.is_empty())?),
            Event::End(_) => stack.pop(),
            Event::Text(t) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&t.unescape().map_err(xml_err)?);
                }
                None
            }
            Event::CData(t) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
                None
            }
            Event::Eof => break,
            _ => None,
        };

        if let Some(frame) = closed {
            let name = frame.name.clone();
            let value = frame.finish();
            match stack.last_mut() {
                Some(parent) => parent.children.push((name, value)),
                None if root.is_none() => root = Some(value),
                None => return Err(xml_err("multiple root elements")),
            }
        }
    }

    if !stack.is_empty() {
        return Err(xml_err("unexpected end of document"));
    }
    root.ok_or_else(|| xml_err("missing root element"))
}

impl ConfigFormat for XmlFormat {
    fn name(&self) -> &str {
        "xml"
    }

    fn extensions(&self) -> &[&str] {
        &["xml"]
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, ConfigError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;
        write_element(&mut writer, ROOT, value)?;
        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, ConfigError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = std::str::from_utf8(bytes).map_err(xml_err)?;
        decode_document(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_str(value: &Value) -> String {
        String::from_utf8(XmlFormat.encode(value).unwrap()).unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let text = encode_str(&json!({"port": 8080, "hosts": ["a"]}));
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("<config type=\"dict\">"));
        assert!(text.contains("<port type=\"int\">8080</port>"));
        assert!(text.contains("<item type=\"str\">a</item>"));
    }

    #[test]
    fn test_nested_lists_and_dicts() {
        let doc = json!({
            "matrix": [[1, 2], [], [{"x": null}]],
            "empty": {},
            "blank": "",
            "ratio": 0.5,
            "on": true
        });
        let decoded = XmlFormat.decode(&XmlFormat.encode(&doc).unwrap()).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn test_escaped_text() {
        let doc = json!({"expr": "a < b && c > \"d\""});
        let decoded = XmlFormat.decode(&XmlFormat.encode(&doc).unwrap()).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn test_unparseable_typed_text_falls_back_to_string() {
        let xml = br#"<config><a type="int">twelve</a><b type="bool">maybe</b><c type="float">x</c></config>"#;
        assert_eq!(
            XmlFormat.decode(xml).unwrap(),
            json!({"a": "twelve", "b": "maybe", "c": "x"})
        );
    }

    #[test]
    fn test_untyped_elements() {
        let xml = b"<config><name>svc</name><db><port type=\"int\">1</port></db></config>";
        assert_eq!(
            XmlFormat.decode(xml).unwrap(),
            json!({"name": "svc", "db": {"port": 1}})
        );
    }

    #[test]
    fn test_invalid_key_rejected() {
        let err = XmlFormat.encode(&json!({"bad key": 1})).unwrap_err();
        assert!(err.to_string().contains("not a valid XML element name"));
        assert!(XmlFormat.encode(&json!({"1abc": 1})).is_err());
    }

    #[test]
    fn test_malformed_document() {
        assert!(XmlFormat.decode(b"<config><a>").is_err());
        assert!(XmlFormat.decode(b"").is_err());
    }
}
