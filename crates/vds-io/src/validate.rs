use serde_json::Value;
use tracing::trace;
use vds_dataset::{Schema, SchemaItems};

use crate::entry::{Entry, EntryReader};
use crate::error::IoResult;

/// One way a value fails its schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer to the offending value, relative to the entry.
    pub pointer: String,
    pub message: String,
}

/// Checks entries against a [`Schema`].
#[derive(Clone, Debug)]
pub struct Validator<'a> {
    schema: &'a Schema,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Schema the entry is held to: the named property for keyed entries,
    /// otherwise the shared element schema.
    fn schema_for(&self, entry: &Entry) -> Option<&'a Schema> {
        entry
            .key
            .as_ref()
            .and_then(|key| self.schema.properties.get(key))
            .or_else(|| self.schema.entry_schema())
    }

    pub fn check_entry(&self, entry: &Entry) -> Vec<Violation> {
        let mut out = Vec::new();
        if let Some(schema) = self.schema_for(entry) {
            check(schema, &entry.value, String::new(), &mut out);
        }
        out
    }

    /// Count entries with at least one violation, draining `reader`.
    ///
    /// Read errors end the count and are returned.
    pub fn count_invalid<R: EntryReader + ?Sized>(&self, reader: &mut R) -> IoResult<usize> {
        let mut invalid = 0;
        while let Some(entry) = reader.read_entry()? {
            let violations = self.check_entry(&entry);
            if !violations.is_empty() {
                trace!(index = entry.index, first = %violations[0].message, "invalid entry");
                invalid += 1;
            }
        }
        Ok(invalid)
    }
}

/// Count the entries of `reader` that fail its structure's schema. A
/// structure without a schema still drains the reader, so malformed bodies
/// are reported.
pub fn count_invalid_entries<R: EntryReader + ?Sized>(reader: &mut R) -> IoResult<usize> {
    match reader.structure().schema.clone() {
        Some(schema) => Validator::new(&schema).count_invalid(reader),
        None => {
            while reader.read_entry()?.is_some() {}
            Ok(0)
        }
    }
}

fn check(schema: &Schema, value: &Value, pointer: String, out: &mut Vec<Violation>) {
    let mut fail = |message: String| {
        out.push(Violation {
            pointer: pointer.clone(),
            message,
        })
    };

    if let Some(kind) = schema.kind {
        if !kind.matches(value) {
            fail(format!("expected {kind:?} value").to_lowercase());
            return;
        }
    }
    if !schema.allowed.is_empty() && !schema.allowed.contains(value) {
        fail(format!("{value} is not one of the allowed values"));
    }

    match value {
        Value::Object(members) => {
            for name in &schema.required {
                if !members.contains_key(name) {
                    fail(format!("missing required property {name:?}"));
                }
            }
            for (name, sub) in &schema.properties {
                if let Some(v) = members.get(name) {
                    check(sub, v, format!("{pointer}/{name}"), out);
                }
            }
        }
        Value::Array(items) => match &schema.items {
            Some(SchemaItems::Single(sub)) => {
                for (i, v) in items.iter().enumerate() {
                    check(sub, v, format!("{pointer}/{i}"), out);
                }
            }
            Some(SchemaItems::Tuple(subs)) => {
                for (i, (sub, v)) in subs.iter().zip(items).enumerate() {
                    check(sub, v, format!("{pointer}/{i}"), out);
                }
            }
            None => {}
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::new_entry_reader;
    use serde_json::json;
    use vds_dataset::{CsvOptions, DataFormat, FormatConfig, SchemaType, Structure};

    fn entry(value: Value) -> Entry {
        Entry {
            index: 0,
            key: None,
            value,
        }
    }

    #[test]
    fn tabular_rows_are_checked_by_column() {
        let schema = Schema::tabular([("a", SchemaType::Integer), ("b", SchemaType::String)]);
        let v = Validator::new(&schema);
        assert!(v.check_entry(&entry(json!([1, "x"]))).is_empty());
        let bad = v.check_entry(&entry(json!(["one", "x"])));
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].pointer, "/0");
    }

    #[test]
    fn object_entries_check_required_and_enum() {
        let mut item = Schema::of_type(SchemaType::Object);
        item.required = vec!["id".into()];
        item.properties.insert(
            "color".into(),
            Schema {
                allowed: vec![json!("red"), json!("blue")],
                ..Schema::default()
            },
        );
        let schema = Schema {
            items: Some(SchemaItems::Single(Box::new(item))),
            ..Schema::of_type(SchemaType::Array)
        };
        let v = Validator::new(&schema);
        assert!(v.check_entry(&entry(json!({"id": 1, "color": "red"}))).is_empty());
        assert_eq!(v.check_entry(&entry(json!({"color": "green"}))).len(), 2);
    }

    #[test]
    fn keyed_entries_use_property_schema() {
        let mut schema = Schema::of_type(SchemaType::Object);
        schema.properties.insert("n".into(), Schema::of_type(SchemaType::Number));
        let v = Validator::new(&schema);
        let keyed = Entry {
            index: 0,
            key: Some("n".into()),
            value: json!("nan"),
        };
        assert_eq!(v.check_entry(&keyed).len(), 1);
    }

    #[test]
    fn counts_each_failing_entry_once() {
        let st = Structure::new(DataFormat::Csv)
            .with_config(FormatConfig::Csv(CsvOptions::with_header()))
            .with_schema(Schema::tabular([("a", SchemaType::Integer), ("b", SchemaType::Integer)]));
        let mut reader = new_entry_reader(&st, &b"a,b\n1,2\nx,y\n3,z\n"[..]).unwrap();
        assert_eq!(count_invalid_entries(reader.as_mut()).unwrap(), 2);
    }

    #[test]
    fn no_schema_means_no_violations() {
        let st = Structure::new(DataFormat::Json);
        let mut reader = new_entry_reader(&st, &b"[1, \"x\", null]"[..]).unwrap();
        assert_eq!(count_invalid_entries(reader.as_mut()).unwrap(), 0);
    }
}
