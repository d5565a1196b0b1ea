//! The address-bound component contract and its canonical JSON encoding.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use vds_types::Address;

use crate::error::{DatasetError, DatasetResult};

/// Key holding a component's kind tag in its object form.
pub const KIND_KEY: &str = "kind";

/// A dataset component that is either a bare address reference or a
/// hydrated value.
///
/// The encoded form is the wire contract that addresses are derived from:
///
/// - a component with a bound address and nothing else encodes as the
///   address string
/// - any other component encodes as an object with lexicographically
///   ordered keys drawn from [`Component::FIELDS`], zero values omitted, and
///   the address left out
pub trait Component: Clone + Default {
    /// Human-readable name used in errors and logs.
    const NAME: &'static str;
    /// Kind tag written under [`KIND_KEY`].
    const KIND: &'static str;
    /// Every key the object form may carry, sorted.
    const FIELDS: &'static [&'static str];

    /// The address this value was loaded from or bound to.
    fn path(&self) -> Option<&Address>;

    fn set_path(&mut self, path: Option<Address>);

    /// True when every field except the address is at its zero value.
    fn is_empty(&self) -> bool;

    /// Overwrite fields with every non-zero field of `other`.
    fn assign(&mut self, other: &Self);

    /// Build the object form. The address is never included.
    fn to_object(&self) -> DatasetResult<CanonicalObject>;

    /// Decode the object form. The result has no bound address.
    fn from_object(object: Map<String, Value>) -> DatasetResult<Self>;

    /// A reference-only value bound to `path`.
    fn new_ref(path: Address) -> Self {
        let mut value = Self::default();
        value.set_path(Some(path));
        value
    }

    /// True for a value that holds an address and nothing else.
    fn is_ref(&self) -> bool {
        self.is_empty() && self.path().is_some()
    }

    /// Apply [`Component::assign`] for each value in order.
    fn assign_all<'a>(&mut self, others: impl IntoIterator<Item = &'a Self>)
    where
        Self: 'a,
    {
        for other in others {
            self.assign(other);
        }
    }

    /// Encode to a reference string or an object.
    fn encode(&self) -> DatasetResult<Value> {
        match self.path() {
            Some(path) if self.is_empty() => Ok(Value::String(path.to_string())),
            _ => Ok(self.to_object()?.into_value()),
        }
    }

    /// Decode a reference string or an object.
    fn decode(value: Value) -> DatasetResult<Self> {
        match value {
            Value::String(s) => {
                let path = Address::parse(&s).map_err(|e| DatasetError::InvalidReference {
                    component: Self::NAME,
                    reference: s.clone(),
                    reason: e.to_string(),
                })?;
                Ok(Self::new_ref(path))
            }
            Value::Object(object) => Self::from_object(object),
            other => Err(DatasetError::UnexpectedValue {
                component: Self::NAME,
                found: json_type_name(&other),
            }),
        }
    }

    /// Canonical bytes of the encoded form.
    fn to_canonical_json(&self) -> DatasetResult<Vec<u8>> {
        match self.path() {
            Some(path) if self.is_empty() => {
                serde_json::to_vec(path.as_str()).map_err(DatasetError::json(Self::NAME))
            }
            _ => self.to_object()?.to_bytes(),
        }
    }

    /// Canonical bytes of the object form, even for a reference-only value.
    fn to_object_json(&self) -> DatasetResult<Vec<u8>> {
        self.to_object()?.to_bytes()
    }

    fn from_json(bytes: &[u8]) -> DatasetResult<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(DatasetError::json(Self::NAME))?;
        Self::decode(value)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Object form of a component under construction.
///
/// Keys are held in a `BTreeMap`, so iteration and serialization are in
/// lexicographic byte order regardless of insertion order.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalObject {
    component: &'static str,
    allowed: &'static [&'static str],
    fields: BTreeMap<String, Value>,
}

impl CanonicalObject {
    /// Start an object for `C`, tagged with its kind.
    pub fn new<C: Component>() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(KIND_KEY.to_string(), Value::String(C::KIND.to_string()));
        Self {
            component: C::NAME,
            allowed: C::FIELDS,
            fields,
        }
    }

    /// Set `key` unless `value` encodes to a zero value.
    pub fn put<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> DatasetResult<()> {
        let value = serde_json::to_value(value).map_err(DatasetError::json(self.component))?;
        self.put_value(key, value);
        Ok(())
    }

    /// Set `key` unless `value` is a zero value.
    pub fn put_value(&mut self, key: &str, value: Value) {
        debug_assert!(self.allowed.contains(&key), "{key} is not a {} field", self.component);
        if !is_zero(&value) {
            self.fields.insert(key.to_string(), value);
        }
    }

    /// Set `key` to `value` as long as it is present at all.
    pub fn put_present(&mut self, key: &str, value: Option<Value>) {
        debug_assert!(self.allowed.contains(&key), "{key} is not a {} field", self.component);
        if let Some(value) = value {
            self.fields.insert(key.to_string(), value);
        }
    }

    /// Set a key outside the component's fixed field list. The value is
    /// kept even when it is a zero value, so it decodes back unchanged.
    pub fn put_extra(&mut self, key: &str, value: Value) -> DatasetResult<()> {
        if self.allowed.contains(&key) || self.fields.contains_key(key) {
            return Err(DatasetError::ReservedKey {
                component: self.component,
                key: key.to_string(),
            });
        }
        self.fields.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields.into_iter().collect())
    }

    pub fn to_bytes(&self) -> DatasetResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(DatasetError::json(self.component))
    }
}

impl Serialize for CanonicalObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Reject an object tagged with another component's kind. An absent tag is
/// accepted.
pub(crate) fn check_kind<C: Component>(kind: Option<&str>) -> DatasetResult<()> {
    match kind {
        Some(found) if found != C::KIND => Err(DatasetError::KindMismatch {
            component: C::NAME,
            expected: C::KIND,
            found: found.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Decode the object form of `C` into its private shadow struct.
pub(crate) fn shadow<C: Component, T: serde::de::DeserializeOwned>(object: Map<String, Value>) -> DatasetResult<T> {
    serde_json::from_value(Value::Object(object)).map_err(DatasetError::json(C::NAME))
}

/// Route serde through the component's reference-aware encoding.
macro_rules! component_serde {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                use $crate::component::Component;
                match self.path() {
                    Some(path) if self.is_empty() => serializer.serialize_str(path.as_str()),
                    _ => {
                        let object = self.to_object().map_err(serde::ser::Error::custom)?;
                        serde::Serialize::serialize(&object, serializer)
                    }
                }
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = serde_json::Value::deserialize(deserializer)?;
                <$ty as $crate::component::Component>::decode(value).map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use component_serde;
