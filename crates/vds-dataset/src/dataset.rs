use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use vds_types::Address;

use crate::commit::{format_timestamp, Commit};
use crate::component::{check_kind, component_serde, shadow, CanonicalObject, Component};
use crate::error::DatasetResult;
use crate::meta::Meta;
use crate::structure::Structure;
use crate::transform::Transform;
use crate::viz::Viz;

/// One immutable version of a dataset.
///
/// Each component slot holds either a reference (address only) or a
/// hydrated value. `previous_path` links versions into a history; a saved
/// version never changes, so the chain cannot cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    pub(crate) path: Option<Address>,
    pub timestamp: Option<DateTime<Utc>>,
    pub body_path: Option<Address>,
    pub previous_path: Option<Address>,
    pub meta: Option<Meta>,
    pub structure: Option<Structure>,
    pub transform: Option<Transform>,
    pub commit: Option<Commit>,
    pub viz: Option<Viz>,
}

fn merge_slot<C: Component>(slot: &mut Option<C>, other: &Option<C>) {
    if let Some(other) = other {
        slot.get_or_insert_with(C::default).assign(other);
    }
}

impl Dataset {
    /// Signable bytes of the commit, if there is one.
    pub fn signable_bytes(&self) -> Option<Vec<u8>> {
        self.commit.as_ref().map(Commit::signable_bytes)
    }

    /// Commit title, or an empty string.
    pub fn title(&self) -> &str {
        self.commit.as_ref().map(|c| c.title.as_str()).unwrap_or_default()
    }

    pub fn with_structure(mut self, structure: Structure) -> Self {
        self.structure = Some(structure);
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_commit(mut self, commit: Commit) -> Self {
        self.commit = Some(commit);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_viz(mut self, viz: Viz) -> Self {
        self.viz = Some(viz);
        self
    }

    pub fn with_previous(mut self, previous: Address) -> Self {
        self.previous_path = Some(previous);
        self
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetObject {
    kind: Option<String>,
    body_path: Option<Address>,
    commit: Option<Commit>,
    meta: Option<Meta>,
    previous_path: Option<Address>,
    structure: Option<Structure>,
    timestamp: Option<DateTime<Utc>>,
    transform: Option<Transform>,
    viz: Option<Viz>,
}

fn encode_slot<C: Component>(obj: &mut CanonicalObject, key: &str, slot: &Option<C>) -> DatasetResult<()> {
    obj.put_present(key, slot.as_ref().map(C::encode).transpose()?);
    Ok(())
}

impl Component for Dataset {
    const NAME: &'static str = "dataset";
    const KIND: &'static str = "dataset:0";
    const FIELDS: &'static [&'static str] = &[
        "bodyPath",
        "commit",
        "kind",
        "meta",
        "previousPath",
        "structure",
        "timestamp",
        "transform",
        "viz",
    ];

    fn path(&self) -> Option<&Address> {
        self.path.as_ref()
    }

    fn set_path(&mut self, path: Option<Address>) {
        self.path = path;
    }

    fn is_empty(&self) -> bool {
        self.timestamp.is_none()
            && self.body_path.is_none()
            && self.previous_path.is_none()
            && self.meta.is_none()
            && self.structure.is_none()
            && self.transform.is_none()
            && self.commit.is_none()
            && self.viz.is_none()
    }

    fn assign(&mut self, other: &Self) {
        if other.path.is_some() {
            self.path = other.path.clone();
        }
        if other.timestamp.is_some() {
            self.timestamp = other.timestamp;
        }
        if other.body_path.is_some() {
            self.body_path = other.body_path.clone();
        }
        if other.previous_path.is_some() {
            self.previous_path = other.previous_path.clone();
        }
        merge_slot(&mut self.meta, &other.meta);
        merge_slot(&mut self.structure, &other.structure);
        merge_slot(&mut self.transform, &other.transform);
        merge_slot(&mut self.commit, &other.commit);
        merge_slot(&mut self.viz, &other.viz);
    }

    fn to_object(&self) -> DatasetResult<CanonicalObject> {
        let mut obj = CanonicalObject::new::<Self>();
        obj.put("bodyPath", &self.body_path)?;
        encode_slot(&mut obj, "commit", &self.commit)?;
        encode_slot(&mut obj, "meta", &self.meta)?;
        obj.put("previousPath", &self.previous_path)?;
        encode_slot(&mut obj, "structure", &self.structure)?;
        obj.put("timestamp", &self.timestamp.as_ref().map(format_timestamp))?;
        encode_slot(&mut obj, "transform", &self.transform)?;
        encode_slot(&mut obj, "viz", &self.viz)?;
        Ok(obj)
    }

    fn from_object(object: Map<String, Value>) -> DatasetResult<Self> {
        let o: DatasetObject = shadow::<Self, _>(object)?;
        check_kind::<Self>(o.kind.as_deref())?;
        Ok(Self {
            path: None,
            timestamp: o.timestamp,
            body_path: o.body_path,
            previous_path: o.previous_path,
            meta: o.meta,
            structure: o.structure,
            transform: o.transform,
            commit: o.commit,
            viz: o.viz,
        })
    }
}

component_serde!(Dataset);
