use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};
use vds_types::Address;

use crate::component::{check_kind, component_serde, shadow, CanonicalObject, Component};
use crate::error::DatasetResult;

/// Rendering instructions for a dataset.
///
/// Like [`crate::Transform`], the template script is stored separately and
/// referenced through `script_path`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Viz {
    pub(crate) path: Option<Address>,
    /// Template language, e.g. `html`.
    pub format: String,
    pub script: Option<Bytes>,
    pub script_path: Option<Address>,
}

impl Viz {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..Self::default()
        }
    }

    pub fn with_script(mut self, script: impl Into<Bytes>) -> Self {
        self.script = Some(script.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VizObject {
    kind: Option<String>,
    #[serde(default)]
    format: String,
    script_path: Option<Address>,
}

impl Component for Viz {
    const NAME: &'static str = "viz";
    const KIND: &'static str = "viz:0";
    const FIELDS: &'static [&'static str] = &["format", "kind", "scriptPath"];

    fn path(&self) -> Option<&Address> {
        self.path.as_ref()
    }

    fn set_path(&mut self, path: Option<Address>) {
        self.path = path;
    }

    fn is_empty(&self) -> bool {
        self.format.is_empty() && self.script.is_none() && self.script_path.is_none()
    }

    fn assign(&mut self, other: &Self) {
        if other.path.is_some() {
            self.path = other.path.clone();
        }
        if !other.format.is_empty() {
            self.format = other.format.clone();
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
        obj.put("format", &self.format)?;
        obj.put("scriptPath", &self.script_path)?;
        Ok(obj)
    }

    fn from_object(object: Map<String, Value>) -> DatasetResult<Self> {
        let o: VizObject = shadow::<Self, _>(object)?;
        check_kind::<Self>(o.kind.as_deref())?;
        Ok(Self {
            path: None,
            format: o.format,
            script: None,
            script_path: o.script_path,
        })
    }
}

component_serde!(Viz);
