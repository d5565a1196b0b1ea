use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{DatasetError, DatasetResult};

/// Encoding of a dataset body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataFormat {
    Csv,
    Json,
    Cdxj,
    Xml,
}

impl DataFormat {
    pub const ALL: [DataFormat; 4] = [Self::Csv, Self::Json, Self::Cdxj, Self::Xml];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Cdxj => "cdxj",
            Self::Xml => "xml",
        }
    }

    /// Guess the format from a file extension, with or without the dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        ext.trim_start_matches('.').parse().ok()
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataFormat {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == lower.trim_start_matches('.'))
            .ok_or_else(|| DatasetError::UnknownFormat(s.to_string()))
    }
}

impl Serialize for DataFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DataFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Options for reading CSV bodies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CsvOptions {
    /// The first row names the columns and is not an entry.
    #[serde(default, skip_serializing_if = "is_false")]
    pub header_row: bool,
    /// Be lenient with stray quotes and rows of uneven length.
    #[serde(default, skip_serializing_if = "is_false")]
    pub lazy_quotes: bool,
    /// Field separator; a comma when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<char>,
}

impl CsvOptions {
    pub fn with_header() -> Self {
        Self {
            header_row: true,
            ..Self::default()
        }
    }

    /// Reject a separator the CSV reader cannot split on.
    pub fn validate(&self) -> DatasetResult<()> {
        match self.separator {
            Some(c) if !c.is_ascii() => Err(DatasetError::InvalidFormatConfig {
                format: DataFormat::Csv.to_string(),
                reason: format!("separator {c:?} is not an ASCII character"),
            }),
            _ => Ok(()),
        }
    }

    /// Separator byte for the reader. Only meaningful once
    /// [`CsvOptions::validate`] has passed.
    pub fn delimiter(&self) -> u8 {
        match self.separator {
            Some(c) if c.is_ascii() => c as u8,
            _ => b',',
        }
    }
}

/// Options for reading JSON bodies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JsonOptions {
    /// Entries are array elements; otherwise the top level is an object
    /// whose values are the entries.
    #[serde(default, skip_serializing_if = "is_false")]
    pub array_entries: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Format-specific configuration, tagged by the structure's format.
///
/// Encodes as the bare options object; decoding needs the sibling format
/// to pick the variant (see [`FormatConfig::from_value`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatConfig {
    Csv(CsvOptions),
    Json(JsonOptions),
}

impl FormatConfig {
    pub fn format(&self) -> DataFormat {
        match self {
            Self::Csv(_) => DataFormat::Csv,
            Self::Json(_) => DataFormat::Json,
        }
    }

    pub fn to_value(&self) -> DatasetResult<Value> {
        let value = match self {
            Self::Csv(opts) => serde_json::to_value(opts),
            Self::Json(opts) => serde_json::to_value(opts),
        };
        value.map_err(DatasetError::json("formatConfig"))
    }

    /// Decode an options object for `format`.
    pub fn from_value(format: Option<DataFormat>, value: Value) -> DatasetResult<Self> {
        let invalid = |format: &str, reason: String| DatasetError::InvalidFormatConfig {
            format: format.to_string(),
            reason,
        };
        match format {
            Some(DataFormat::Csv) => {
                let opts: CsvOptions = serde_json::from_value(value).map_err(|e| invalid("csv", e.to_string()))?;
                opts.validate()?;
                Ok(Self::Csv(opts))
            }
            Some(DataFormat::Json) => serde_json::from_value(value)
                .map(Self::Json)
                .map_err(|e| invalid("json", e.to_string())),
            Some(other) => Err(invalid(other.as_str(), "format takes no configuration".into())),
            None => Err(invalid("unknown", "format config requires a format".into())),
        }
    }

    pub fn csv(&self) -> Option<&CsvOptions> {
        match self {
            Self::Csv(opts) => Some(opts),
            _ => None,
        }
    }

    pub fn json(&self) -> Option<&JsonOptions> {
        match self {
            Self::Json(opts) => Some(opts),
            _ => None,
        }
    }
}
