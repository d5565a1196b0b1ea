use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON type names accepted by the `type` keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Array,
    Object,
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl SchemaType {
    /// Whether `value` is an instance of this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Null => value.is_null(),
        }
    }
}

/// Schema for the elements of an array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaItems {
    /// One schema per position, as used for tabular rows.
    Tuple(Vec<Schema>),
    /// Every element shares one schema.
    Single(Box<Schema>),
}

/// The subset of JSON Schema that bodies are validated against.
///
/// Supported keywords: `type`, `items`, `properties`, `required`, `enum`.
/// `title` names a column in tabular schemas. Unknown keywords are ignored
/// on decode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<SchemaItems>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<Value>,
}

impl Schema {
    pub fn of_type(kind: SchemaType) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// A table: an array of rows, each row a tuple of typed, titled columns.
    pub fn tabular<'a>(columns: impl IntoIterator<Item = (&'a str, SchemaType)>) -> Self {
        let columns = columns
            .into_iter()
            .map(|(title, kind)| Self {
                title: Some(title.to_string()),
                ..Self::of_type(kind)
            })
            .collect();
        let row = Self {
            items: Some(SchemaItems::Tuple(columns)),
            ..Self::of_type(SchemaType::Array)
        };
        Self {
            items: Some(SchemaItems::Single(Box::new(row))),
            ..Self::of_type(SchemaType::Array)
        }
    }

    /// Schema that every top-level entry must satisfy, if uniform.
    pub fn entry_schema(&self) -> Option<&Schema> {
        match &self.items {
            Some(SchemaItems::Single(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Column schemas for tabular bodies, in column order.
    pub fn columns(&self) -> &[Schema] {
        match self.entry_schema().and_then(|row| row.items.as_ref()) {
            Some(SchemaItems::Tuple(cols)) => cols,
            _ => &[],
        }
    }

    /// Column titles for tabular bodies; untitled columns are numbered.
    pub fn column_names(&self) -> Vec<String> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(i, col)| col.title.clone().unwrap_or_else(|| format!("field_{}", i + 1)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tabular_schema_shape() {
        let schema = Schema::tabular([("a", SchemaType::Integer), ("b", SchemaType::String)]);
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({
                "type": "array",
                "items": {
                    "type": "array",
                    "items": [
                        { "type": "integer", "title": "a" },
                        { "type": "string", "title": "b" }
                    ]
                }
            })
        );
        assert_eq!(schema.column_names(), ["a", "b"]);
    }

    #[test]
    fn decode_ignores_unknown_keywords() {
        let schema: Schema = serde_json::from_value(json!({
            "type": "object",
            "$schema": "http://json-schema.org/draft-07/schema#",
            "required": ["id"]
        }))
        .unwrap();
        assert_eq!(schema.kind, Some(SchemaType::Object));
        assert_eq!(schema.required, ["id"]);
        assert!(schema.columns().is_empty());
    }

    #[test]
    fn integer_matches_only_whole_numbers() {
        assert!(SchemaType::Integer.matches(&json!(3)));
        assert!(!SchemaType::Integer.matches(&json!(3.5)));
        assert!(SchemaType::Number.matches(&json!(3.5)));
    }
}
