//! INI-style key/value tables carried by the metadata blocks.

use serde::Serialize;

use crate::error::{DecodeError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyValue {
    pub key:   String,
    pub value: String,
}

/// Ordered table; duplicate keys are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyValues(pub Vec<KeyValue>);

impl KeyValues {
    /// Parse newline-separated `key = value` lines. Every line needs a `=`.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(body);
        let mut pairs = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let (key, value) = line
                .split_once('=')
                .ok_or(DecodeError::MalformedKeyValue { line: i + 1 })?;
            pairs.push(KeyValue {
                key:   key.trim().to_owned(),
                value: value.trim().to_owned(),
            });
        }
        Ok(Self(pairs))
    }

    /// Value of the first entry named `key`, or `""`.
    pub fn first(&self, key: &str) -> &str {
        self.0
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
            .unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// One `; key = value` comment line per entry.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for kv in &self.0 {
            let line = format!("; {} = {}", kv.key, kv.value);
            out.push_str(line.trim());
            out.push('\n');
        }
        out
    }
}
