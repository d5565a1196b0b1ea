use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};
use vds_types::Address;

use crate::component::{check_kind, component_serde, shadow, CanonicalObject, Component};
use crate::dataset::Dataset;
use crate::error::DatasetResult;
use crate::structure::Structure;

/// A record of the process that produced a dataset version.
///
/// `resources` maps short lowercase bind names to the input datasets the
/// script refers to. The script blob itself is stored as its own object and
/// referenced through `script_path`; it never appears in the encoded form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transform {
    pub(crate) path: Option<Address>,
    pub syntax: String,
    pub app_version: String,
    pub config: BTreeMap<String, Value>,
    /// Output structure of the transform.
    pub structure: Option<Structure>,
    pub resources: BTreeMap<String, Dataset>,
    /// Script bytes waiting to be stored.
    pub script: Option<Bytes>,
    pub script_path: Option<Address>,
}

impl Transform {
    pub fn new(syntax: impl Into<String>) -> Self {
        Self {
            syntax: syntax.into(),
            ..Self::default()
        }
    }

    pub fn with_script(mut self, script: impl Into<Bytes>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// Bind names whose dataset has no address yet.
    pub fn unbound_resources(&self) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(_, ds)| ds.path().is_none())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// A bind name is one or more lowercase ASCII letters.
pub fn is_valid_bind_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_lowercase())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransformObject {
    kind: Option<String>,
    #[serde(default)]
    app_version: String,
    #[serde(default)]
    config: BTreeMap<String, Value>,
    #[serde(default)]
    resources: BTreeMap<String, Dataset>,
    script_path: Option<Address>,
    structure: Option<Structure>,
    #[serde(default)]
    syntax: String,
}

impl Component for Transform {
    const NAME: &'static str = "transform";
    const KIND: &'static str = "transform:0";
    const FIELDS: &'static [&'static str] = &[
        "appVersion",
        "config",
        "kind",
        "resources",
        "scriptPath",
        "structure",
        "syntax",
    ];

    fn path(&self) -> Option<&Address> {
        self.path.as_ref()
    }

    fn set_path(&mut self, path: Option<Address>) {
        self.path = path;
    }

    fn is_empty(&self) -> bool {
        self.syntax.is_empty()
            && self.app_version.is_empty()
            && self.config.is_empty()
            && self.structure.is_none()
            && self.resources.is_empty()
            && self.script.is_none()
            && self.script_path.is_none()
    }

    fn assign(&mut self, other: &Self) {
        if other.path.is_some() {
            self.path = other.path.clone();
        }
        if !other.syntax.is_empty() {
            self.syntax = other.syntax.clone();
        }
        if !other.app_version.is_empty() {
            self.app_version = other.app_version.clone();
        }
        for (key, value) in &other.config {
            self.config.insert(key.clone(), value.clone());
        }
        if let Some(st) = &other.structure {
            self.structure.get_or_insert_with(Structure::default).assign(st);
        }
        for (name, ds) in &other.resources {
            self.resources.insert(name.clone(), ds.clone());
        }
        if other.script.is_some() {
            self.script = other.script.clone();
        }
        if other.script_path.is_some() {
            self.script_path = other.script_path.clone();
        }
    }

    fn to_object(&self) -> DatasetResult<CanonicalObject> {
        let mut obj = CanonicalObject::new::<Self>();
        obj.put("appVersion", &self.app_version)?;
        obj.put("config", &self.config)?;
        let mut resources = Map::new();
        for (name, ds) in &self.resources {
            resources.insert(name.clone(), ds.encode()?);
        }
        obj.put_value("resources", Value::Object(resources));
        obj.put("scriptPath", &self.script_path)?;
        obj.put_present(
            "structure",
            self.structure.as_ref().map(|st| st.encode()).transpose()?,
        );
        obj.put("syntax", &self.syntax)?;
        Ok(obj)
    }

    fn from_object(object: Map<String, Value>) -> DatasetResult<Self> {
        let o: TransformObject = shadow::<Self, _>(object)?;
        check_kind::<Self>(o.kind.as_deref())?;
        Ok(Self {
            path: None,
            syntax: o.syntax,
            app_version: o.app_version,
            config: o.config,
            structure: o.structure,
            resources: o.resources,
            script: None,
            script_path: o.script_path,
        })
    }
}

component_serde!(Transform);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vds_types::{ObjectId, DEFAULT_NAMESPACE};

    fn addr(seed: &[u8]) -> Address {
        Address::for_object(DEFAULT_NAMESPACE, &ObjectId::from_bytes(seed))
    }

    #[test]
    fn script_is_not_encoded_but_its_path_is() {
        let mut tf = Transform::new("sql").with_script(&b"select * from a"[..]);
        let encoded = tf.encode().unwrap();
        assert_eq!(encoded, json!({ "kind": "transform:0", "syntax": "sql" }));

        tf.script_path = Some(addr(b"script"));
        let encoded = tf.encode().unwrap();
        assert_eq!(encoded["scriptPath"], json!(addr(b"script").to_string()));
    }

    #[test]
    fn script_alone_makes_transform_non_empty() {
        let tf = Transform::default().with_script(&b"x"[..]);
        assert!(!tf.is_empty());
    }

    #[test]
    fn resources_encode_as_references() {
        let mut tf = Transform::new("sql");
        tf.resources.insert("a".into(), Dataset::new_ref(addr(b"input")));
        let encoded = tf.encode().unwrap();
        assert_eq!(encoded["resources"]["a"], json!(addr(b"input").to_string()));

        let decoded = Transform::decode(encoded).unwrap();
        assert_eq!(decoded.resources["a"].path(), Some(&addr(b"input")));
        assert!(decoded.unbound_resources().is_empty());
    }

    #[test]
    fn unbound_resources_are_listed() {
        let mut tf = Transform::new("sql");
        tf.resources.insert("a".into(), Dataset::new_ref(addr(b"input")));
        tf.resources.insert("b".into(), Dataset::default());
        assert_eq!(tf.unbound_resources(), ["b"]);
    }

    #[test]
    fn assign_merges_maps_and_nested_structure() {
        let mut tf = Transform::new("sql");
        tf.config.insert("limit".into(), json!(10));
        tf.structure = Some(Structure {
            entries: 3,
            ..Structure::default()
        });

        let mut other = Transform::default();
        other.config.insert("offset".into(), json!(5));
        other.structure = Some(Structure {
            encoding: "utf-8".into(),
            ..Structure::default()
        });
        tf.assign(&other);

        assert_eq!(tf.config.len(), 2);
        let st = tf.structure.unwrap();
        assert_eq!(st.entries, 3);
        assert_eq!(st.encoding, "utf-8");
        assert_eq!(tf.syntax, "sql");
    }

    #[test]
    fn bind_names_are_lowercase_letters() {
        assert!(is_valid_bind_name("abc"));
        assert!(!is_valid_bind_name(""));
        assert!(!is_valid_bind_name("a1"));
        assert!(!is_valid_bind_name("A"));
    }

    #[test]
    fn object_roundtrip_without_script() {
        let mut tf = Transform::new("sql");
        tf.app_version = "1.2.0".into();
        tf.config.insert("x".into(), json!({"nested": [1, 2]}));
        tf.script_path = Some(addr(b"script"));
        let decoded = Transform::from_json(&tf.to_canonical_json().unwrap()).unwrap();
        assert_eq!(decoded, tf);
    }
}
