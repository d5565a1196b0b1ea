use serde::Deserialize;
use serde_json::{Map, Value};
use vds_types::Address;

use crate::component::{check_kind, component_serde, shadow, CanonicalObject, Component};
use crate::error::DatasetResult;
use crate::format::{DataFormat, FormatConfig};
use crate::schema::Schema;

/// How to interpret a dataset body.
///
/// `checksum`, `length`, `entries`, `depth` and `err_count` are derived from
/// the body bytes when a version is saved; callers never need to set them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Structure {
    pub(crate) path: Option<Address>,
    /// Hex BLAKE3 digest of the body bytes.
    pub checksum: String,
    /// Maximum nesting depth across entries, counting the body container.
    pub depth: usize,
    /// Character encoding; UTF-8 when empty.
    pub encoding: String,
    /// Number of top-level entries (rows, for tabular data).
    pub entries: usize,
    /// Number of entries that fail the schema.
    pub err_count: usize,
    pub format: Option<DataFormat>,
    pub format_config: Option<FormatConfig>,
    /// Body length in bytes.
    pub length: u64,
    pub schema: Option<Schema>,
}

impl Structure {
    pub fn new(format: DataFormat) -> Self {
        Self {
            format: Some(format),
            ..Self::default()
        }
    }

    pub fn with_config(mut self, config: FormatConfig) -> Self {
        self.format_config = Some(config);
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Clear the fields computed from body bytes.
    pub fn clear_derived(&mut self) {
        self.checksum.clear();
        self.depth = 0;
        self.entries = 0;
        self.err_count = 0;
        self.length = 0;
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructureObject {
    kind: Option<String>,
    #[serde(default)]
    checksum: String,
    #[serde(default)]
    depth: usize,
    #[serde(default)]
    encoding: String,
    #[serde(default)]
    entries: usize,
    #[serde(default)]
    err_count: usize,
    format: Option<DataFormat>,
    format_config: Option<Value>,
    #[serde(default)]
    length: u64,
    schema: Option<Schema>,
}

impl Component for Structure {
    const NAME: &'static str = "structure";
    const KIND: &'static str = "structure:0";
    const FIELDS: &'static [&'static str] = &[
        "checksum",
        "depth",
        "encoding",
        "entries",
        "errCount",
        "format",
        "formatConfig",
        "kind",
        "length",
        "schema",
    ];

    fn path(&self) -> Option<&Address> {
        self.path.as_ref()
    }

    fn set_path(&mut self, path: Option<Address>) {
        self.path = path;
    }

    fn is_empty(&self) -> bool {
        self.checksum.is_empty()
            && self.depth == 0
            && self.encoding.is_empty()
            && self.entries == 0
            && self.err_count == 0
            && self.format.is_none()
            && self.format_config.is_none()
            && self.length == 0
            && self.schema.is_none()
    }

    fn assign(&mut self, other: &Self) {
        if other.path.is_some() {
            self.path = other.path.clone();
        }
        if !other.checksum.is_empty() {
            self.checksum = other.checksum.clone();
        }
        if other.depth != 0 {
            self.depth = other.depth;
        }
        if !other.encoding.is_empty() {
            self.encoding = other.encoding.clone();
        }
        if other.entries != 0 {
            self.entries = other.entries;
        }
        if other.err_count != 0 {
            self.err_count = other.err_count;
        }
        if other.format.is_some() {
            self.format = other.format;
        }
        if other.format_config.is_some() {
            self.format_config = other.format_config.clone();
        }
        if other.length != 0 {
            self.length = other.length;
        }
        if other.schema.is_some() {
            self.schema = other.schema.clone();
        }
    }

    fn to_object(&self) -> DatasetResult<CanonicalObject> {
        let mut obj = CanonicalObject::new::<Self>();
        obj.put("checksum", &self.checksum)?;
        obj.put("depth", &self.depth)?;
        obj.put("encoding", &self.encoding)?;
        obj.put("entries", &self.entries)?;
        obj.put("errCount", &self.err_count)?;
        obj.put("format", &self.format)?;
        obj.put_present(
            "formatConfig",
            self.format_config.as_ref().map(FormatConfig::to_value).transpose()?,
        );
        obj.put("length", &self.length)?;
        obj.put_present(
            "schema",
            self.schema
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(crate::error::DatasetError::json(Self::NAME))?,
        );
        Ok(obj)
    }

    fn from_object(object: Map<String, Value>) -> DatasetResult<Self> {
        let o: StructureObject = shadow::<Self, _>(object)?;
        check_kind::<Self>(o.kind.as_deref())?;
        let format_config = o
            .format_config
            .map(|cfg| FormatConfig::from_value(o.format, cfg))
            .transpose()?;
        Ok(Self {
            path: None,
            checksum: o.checksum,
            depth: o.depth,
            encoding: o.encoding,
            entries: o.entries,
            err_count: o.err_count,
            format: o.format,
            format_config,
            length: o.length,
            schema: o.schema,
        })
    }
}

component_serde!(Structure);
