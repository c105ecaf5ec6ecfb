use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// One parsed NDJSON record.
///
/// A thin wrapper over a JSON object. The underlying map is the default
/// BTreeMap-backed `serde_json::Map`, so serializing a record always emits
/// its keys in sorted order, which is the canonical output form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Parse one line of NDJSON into a record.
    ///
    /// Accepts only a top-level JSON object; scalars and arrays are rejected
    /// because downstream stages address records by field name.
    pub fn parse(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("invalid JSON: {}", excerpt(line)))?;

        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(anyhow::anyhow!(
                "expected a JSON object, got {}",
                type_name(&other)
            )),
        }
    }

    /// Serialize to a single canonical NDJSON line, without the trailing
    /// newline. Keys come out sorted by the map ordering.
    pub fn to_json_line(&self) -> Result<String> {
        serde_json::to_string(&self.fields).context("failed to serialize record")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Field value as a string slice, if present and a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Keep only the fields for which the predicate returns true.
    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.fields.retain(|key, _| keep(key));
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Truncate a line for error messages, keeping it one screen-friendly piece.
pub(crate) fn excerpt(line: &str) -> &str {
    const MAX: usize = 120;
    if line.len() <= MAX {
        return line;
    }
    let mut end = MAX;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
