use std::collections::HashMap;

use super::Value;

/// The fact mapping a rule forest is evaluated against.
///
/// Keys are dot-separated paths (`"query"`, `"user.locale"`). Conditions
/// reach into the mapping through `{"var": "<path>"}` operands.
#[derive(Debug, Clone, Default)]
pub struct Facts {
    data: HashMap<String, Slot>,
}

#[derive(Debug, Clone)]
enum Slot {
    Leaf(Value),
    Nested(HashMap<String, Slot>),
}

impl Facts {
    /// Create an empty fact mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The mapping the retrieval flow builds: `{query: <text>}`.
    #[must_use]
    pub fn query(text: &str) -> Self {
        Self::new().set("query", text)
    }

    /// Build facts from a JSON object. Nested objects become dotted paths;
    /// `null`, arrays and other non-scalar leaves are skipped.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        let mut facts = Self::new();
        if let serde_json::Value::Object(map) = json {
            Self::absorb(&mut facts, "", map);
        }
        facts
    }

    fn absorb(
        facts: &mut Facts,
        prefix: &str,
        map: &serde_json::Map<String, serde_json::Value>,
    ) {
        for (key, json) in map {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match json {
                serde_json::Value::Object(inner) => Self::absorb(facts, &path, inner),
                other => {
                    if let Some(value) = Value::from_json(other) {
                        facts.insert(&path, value);
                    }
                }
            }
        }
    }

    /// Set a value at a dot-separated path, creating intermediate maps.
    #[must_use]
    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.insert(path, value.into());
        self
    }

    /// Insert a value at a dot-separated path.
    pub fn insert(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').collect();
        Self::insert_recursive(&mut self.data, &segments, value);
    }

    /// Look up a value by dot-separated path. Paths naming an intermediate
    /// map resolve to `None`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments: Vec<&str> = path.split('.').collect();
        Self::get_recursive(&self.data, &segments)
    }

    fn insert_recursive(map: &mut HashMap<String, Slot>, segments: &[&str], value: Value) {
        match segments {
            [] => {}
            [last] => {
                map.insert((*last).to_owned(), Slot::Leaf(value));
            }
            [first, rest @ ..] => {
                let entry = map
                    .entry((*first).to_owned())
                    .or_insert_with(|| Slot::Nested(HashMap::new()));
                if let Slot::Leaf(_) = entry {
                    *entry = Slot::Nested(HashMap::new());
                }
                if let Slot::Nested(nested) = entry {
                    Self::insert_recursive(nested, rest, value);
                }
            }
        }
    }

    fn get_recursive<'a>(map: &'a HashMap<String, Slot>, segments: &[&str]) -> Option<&'a Value> {
        match segments {
            [] => None,
            [last] => match map.get(*last)? {
                Slot::Leaf(v) => Some(v),
                Slot::Nested(_) => None,
            },
            [first, rest @ ..] => match map.get(*first)? {
                Slot::Nested(nested) => Self::get_recursive(nested, rest),
                Slot::Leaf(_) => None,
            },
        }
    }
}
