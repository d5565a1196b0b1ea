use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vds_types::Address;

use crate::component::{check_kind, component_serde, shadow, CanonicalObject, Component, KIND_KEY};
use crate::error::{DatasetError, DatasetResult};

/// A license reference.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

/// Someone credited for a dataset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
}

/// Descriptive metadata.
///
/// A handful of well-known keys are typed fields; everything else lives in
/// `extra` and is encoded alongside them. Encoding fails when an extra key
/// names a typed field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Meta {
    pub(crate) path: Option<Address>,
    pub title: String,
    pub description: String,
    pub license: Option<License>,
    pub keywords: Vec<String>,
    pub homepage: String,
    pub identifier: String,
    pub version: String,
    pub contributors: Vec<Person>,
    pub language: Vec<String>,
    pub theme: Vec<String>,
    pub extra: BTreeMap<String, Value>,
}

impl Meta {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// True when `key` names a typed field or the kind tag.
    pub fn is_reserved(key: &str) -> bool {
        key == KIND_KEY || Self::FIELDS.contains(&key)
    }
}

#[derive(Deserialize)]
struct MetaObject {
    kind: Option<String>,
    #[serde(default)]
    contributors: Vec<Person>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    homepage: String,
    #[serde(default)]
    identifier: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    language: Vec<String>,
    license: Option<License>,
    #[serde(default)]
    theme: Vec<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    version: String,
}

impl Component for Meta {
    const NAME: &'static str = "meta";
    const KIND: &'static str = "meta:0";
    const FIELDS: &'static [&'static str] = &[
        "contributors",
        "description",
        "homepage",
        "identifier",
        "keywords",
        "kind",
        "language",
        "license",
        "theme",
        "title",
        "version",
    ];

    fn path(&self) -> Option<&Address> {
        self.path.as_ref()
    }

    fn set_path(&mut self, path: Option<Address>) {
        self.path = path;
    }

    fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.description.is_empty()
            && self.license.is_none()
            && self.keywords.is_empty()
            && self.homepage.is_empty()
            && self.identifier.is_empty()
            && self.version.is_empty()
            && self.contributors.is_empty()
            && self.language.is_empty()
            && self.theme.is_empty()
            && self.extra.is_empty()
    }

    fn assign(&mut self, other: &Self) {
        if other.path.is_some() {
            self.path = other.path.clone();
        }
        if !other.title.is_empty() {
            self.title = other.title.clone();
        }
        if !other.description.is_empty() {
            self.description = other.description.clone();
        }
        if other.license.is_some() {
            self.license = other.license.clone();
        }
        if !other.keywords.is_empty() {
            self.keywords = other.keywords.clone();
        }
        if !other.homepage.is_empty() {
            self.homepage = other.homepage.clone();
        }
        if !other.identifier.is_empty() {
            self.identifier = other.identifier.clone();
        }
        if !other.version.is_empty() {
            self.version = other.version.clone();
        }
        if !other.contributors.is_empty() {
            self.contributors = other.contributors.clone();
        }
        if !other.language.is_empty() {
            self.language = other.language.clone();
        }
        if !other.theme.is_empty() {
            self.theme = other.theme.clone();
        }
        for (key, value) in &other.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    fn to_object(&self) -> DatasetResult<CanonicalObject> {
        let mut obj = CanonicalObject::new::<Self>();
        obj.put("contributors", &self.contributors)?;
        obj.put("description", &self.description)?;
        obj.put("homepage", &self.homepage)?;
        obj.put("identifier", &self.identifier)?;
        obj.put("keywords", &self.keywords)?;
        obj.put("language", &self.language)?;
        obj.put_present(
            "license",
            self.license
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(DatasetError::json(Self::NAME))?,
        );
        obj.put("theme", &self.theme)?;
        obj.put("title", &self.title)?;
        obj.put("version", &self.version)?;
        for (key, value) in &self.extra {
            obj.put_extra(key, value.clone())?;
        }
        Ok(obj)
    }

    fn from_object(mut object: Map<String, Value>) -> DatasetResult<Self> {
        let extra = object
            .iter()
            .filter(|(key, _)| !Self::is_reserved(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        object.retain(|key, _| Self::is_reserved(key));
        let o: MetaObject = shadow::<Self, _>(object)?;
        check_kind::<Self>(o.kind.as_deref())?;
        Ok(Self {
            path: None,
            title: o.title,
            description: o.description,
            license: o.license,
            keywords: o.keywords,
            homepage: o.homepage,
            identifier: o.identifier,
            version: o.version,
            contributors: o.contributors,
            language: o.language,
            theme: o.theme,
            extra,
        })
    }
}

component_serde!(Meta);
