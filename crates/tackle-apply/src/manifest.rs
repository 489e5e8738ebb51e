//! Manifest parsing
//!
//! Splits a buffer on `---` document markers and decodes each document with
//! yaml-rust2 into a [`ManifestObject`]. Decode failures name the document
//! index and buffer line so a broken embedded manifest is easy to find.

use serde_json::{Map, Number, Value};
use tackle_common::{Error, Result};
use yaml_rust2::{Yaml, YamlLoader};

use crate::object::ManifestObject;

/// The ordered objects decoded from one manifest buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestDocument {
    objects: Vec<ManifestObject>,
}

impl ManifestDocument {
    /// Decode a UTF-8 manifest buffer
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            let prefix = &bytes[..e.valid_up_to()];
            let line = prefix.iter().filter(|b| **b == b'\n').count() + 1;
            Error::decode(document_at_end(prefix), line, format!("invalid UTF-8: {}", e))
        })?;
        Self::parse(text)
    }

    /// Decode a manifest containing one or more `---` separated documents
    pub fn parse(text: &str) -> Result<Self> {
        let mut objects = Vec::new();

        for chunk in split_documents(text) {
            let docs = YamlLoader::load_from_str(chunk.text).map_err(|e| {
                let line = chunk.first_line + e.marker().line().saturating_sub(1);
                Error::decode(chunk.index, line, e.to_string())
            })?;

            for doc in docs {
                let value = yaml_to_json(doc)
                    .map_err(|msg| Error::decode(chunk.index, chunk.content_line, msg))?;
                match value {
                    Value::Null => continue,
                    Value::Object(_) => {
                        let object = ManifestObject::from_value(value)
                            .map_err(|msg| Error::decode(chunk.index, chunk.content_line, msg))?;
                        objects.push(object);
                    }
                    other => {
                        return Err(Error::decode(
                            chunk.index,
                            chunk.content_line,
                            format!("document is not a mapping (found {})", json_type(&other)),
                        ))
                    }
                }
            }
        }

        Ok(Self { objects })
    }

    /// Objects in document order
    pub fn objects(&self) -> &[ManifestObject] {
        &self.objects
    }

    /// Consume the document, returning objects in document order
    pub fn into_objects(self) -> Vec<ManifestObject> {
        self.objects
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the document has no objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterate objects in document order
    pub fn iter(&self) -> std::slice::Iter<'_, ManifestObject> {
        self.objects.iter()
    }

    /// Objects in apply order: stably sorted by tier, document order within a tier
    pub fn apply_order(&self) -> Vec<&ManifestObject> {
        let mut ordered: Vec<&ManifestObject> = self.objects.iter().collect();
        ordered.sort_by_key(|obj| obj.tier());
        ordered
    }
}

impl<'a> IntoIterator for &'a ManifestDocument {
    type Item = &'a ManifestObject;
    type IntoIter = std::slice::Iter<'a, ManifestObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

/// One `---` delimited chunk of the buffer
struct Chunk<'a> {
    index: usize,
    /// Line of the chunk's first byte, the base for YAML marker offsets
    first_line: usize,
    /// First line that is neither blank nor a comment
    content_line: usize,
    text: &'a str,
}

/// Whether a line is a document marker (`---`, optionally followed by a comment)
fn is_separator(line: &str) -> bool {
    match line.trim_end().strip_prefix("---") {
        Some(rest) => rest.is_empty() || rest.trim_start().starts_with('#'),
        None => false,
    }
}

/// Whether a line carries YAML content (not blank, not a comment)
fn is_content(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

/// Index of the document that the end of `prefix` falls in.
///
/// Uses the same chunking as [`split_documents`], treating the position right
/// after the prefix as content.
fn document_at_end(prefix: &[u8]) -> usize {
    let mut text = String::from_utf8_lossy(prefix).into_owned();
    text.push('x');
    split_documents(&text)
        .last()
        .map(|chunk| chunk.index)
        .unwrap_or(0)
}

/// Split the buffer into chunks, keeping each chunk's first line number.
///
/// A leading marker does not open an empty document 0.
fn split_documents(text: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut first_line = 1usize;
    let mut offset = 0usize;
    let mut index = 0usize;
    let mut content_line: Option<usize> = None;

    for (line_no, line) in text.split_inclusive('\n').enumerate() {
        let line_no = line_no + 1;
        if is_separator(line) {
            if let Some(content_line) = content_line {
                chunks.push(Chunk {
                    index,
                    first_line,
                    content_line,
                    text: &text[start..offset],
                });
                index += 1;
            }
            content_line = None;
            start = offset + line.len();
            first_line = line_no + 1;
        } else if content_line.is_none() && is_content(line) {
            content_line = Some(line_no);
        }
        offset += line.len();
    }

    if let Some(content_line) = content_line {
        chunks.push(Chunk {
            index,
            first_line,
            content_line,
            text: &text[start..],
        });
    }

    chunks
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// YAML 1.2 spellings of infinity and NaN, which JSON cannot carry
fn is_non_finite(real: &str) -> bool {
    let unsigned = real.strip_prefix(['+', '-']).unwrap_or(real);
    matches!(
        unsigned,
        ".inf" | ".Inf" | ".INF" | ".nan" | ".NaN" | ".NAN"
    )
}

/// Convert a yaml_rust2::Yaml value to serde_json::Value
fn yaml_to_json(yaml: Yaml) -> std::result::Result<Value, String> {
    match yaml {
        Yaml::Null => Ok(Value::Null),
        Yaml::Boolean(b) => Ok(Value::Bool(b)),
        Yaml::Integer(i) => Ok(Value::Number(i.into())),
        Yaml::Real(s) => {
            if is_non_finite(&s) {
                return Err(format!("non-finite float '{}' is not supported", s));
            }
            let f: f64 = s
                .parse()
                .map_err(|e: std::num::ParseFloatError| format!("bad float '{}': {}", s, e))?;
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| format!("non-finite float '{}' is not supported", s))
        }
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Array(arr) => arr
            .into_iter()
            .map(yaml_to_json)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::Array),
        Yaml::Hash(map) => map
            .into_iter()
            .map(|(k, v)| {
                let key = match k {
                    Yaml::String(s) => s,
                    Yaml::Integer(i) => i.to_string(),
                    Yaml::Real(r) => r,
                    Yaml::Boolean(b) => b.to_string(),
                    Yaml::Null => "null".to_string(),
                    _ => return Err("unsupported YAML key type".to_string()),
                };
                yaml_to_json(v).map(|v| (key, v))
            })
            .collect::<std::result::Result<Map<String, Value>, _>>()
            .map(Value::Object),
        Yaml::Alias(_) => Err("YAML aliases not supported".to_string()),
        Yaml::BadValue => Err("bad YAML value".to_string()),
    }
}
