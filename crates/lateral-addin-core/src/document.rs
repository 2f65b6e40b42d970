use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A template or letter record on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Opaque backend identifier (dropdown option value)
    pub id: String,
    /// Display label (dropdown option text)
    pub label: String,
}

/// An insertable placeholder variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    pub label: String,
}

impl Variable {
    /// The token inserted into the document, e.g. `{CaseNumber}`.
    pub fn placeholder(&self) -> String {
        format!("{{{}}}", self.label)
    }
}

impl From<(String, String)> for DocumentRef {
    fn from((id, label): (String, String)) -> Self {
        Self { id, label }
    }
}

impl From<(String, String)> for Variable {
    fn from((id, label): (String, String)) -> Self {
        Self { id, label }
    }
}

/// Flatten a backend `key -> label` map into `(key, label)` pairs.
///
/// Ordering follows a JavaScript property walk, which is how the task pane
/// has always filled its dropdowns: canonical array-index keys ascending
/// numerically, then every other key in response order.
pub fn ordered_entries(map: &Map<String, Value>) -> Vec<(String, String)> {
    let mut indexed: Vec<(u32, String, String)> = Vec::new();
    let mut named: Vec<(String, String)> = Vec::new();

    for (key, value) in map {
        let label = label_text(value);
        match array_index(key) {
            Some(n) => indexed.push((n, key.clone(), label)),
            None => named.push((key.clone(), label)),
        }
    }

    indexed.sort_by_key(|(n, _, _)| *n);
    indexed
        .into_iter()
        .map(|(_, key, label)| (key, label))
        .chain(named)
        .collect()
}

/// Entries of a listing that may arrive as an object or, when the backend
/// encodes it as a list, as an array indexed from `"0"`. `None` for scalars.
pub fn listing_entries(value: &Value) -> Option<Vec<(String, String)>> {
    match value {
        Value::Object(map) => Some(ordered_entries(map)),
        Value::Array(items) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), label_text(item)))
                .collect(),
        ),
        _ => None,
    }
}

fn label_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `Some(n)` if `key` is the canonical decimal form of an array index.
fn array_index(key: &str) -> Option<u32> {
    let n: u32 = key.parse().ok()?;
    if n == u32::MAX || n.to_string() != key {
        return None;
    }
    Some(n)
}
