use std::fmt;
use std::io::Read;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

use serde::de::{self, Deserializer as _, MapAccess, SeqAccess, Visitor};
use serde_json::Value;
use vds_dataset::{DataFormat, Schema, SchemaType, Structure};

use crate::error::{IoError, IoResult};

/// One top-level element of a body.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    /// Position in the body, from zero.
    pub index: usize,
    /// Member name when the body is a JSON object.
    pub key: Option<String>,
    pub value: Value,
}

/// Forward-only reader over the entries of a body.
///
/// `read_entry` returns `Ok(None)` once the body is exhausted; after that it
/// keeps returning `Ok(None)`.
pub trait EntryReader: Send {
    fn structure(&self) -> &Structure;

    fn read_entry(&mut self) -> IoResult<Option<Entry>>;
}

impl<R: EntryReader + ?Sized> EntryReader for Box<R> {
    fn structure(&self) -> &Structure {
        (**self).structure()
    }

    fn read_entry(&mut self) -> IoResult<Option<Entry>> {
        (**self).read_entry()
    }
}

/// Iterate the remaining entries of `reader`.
pub fn entries<R: EntryReader + ?Sized>(reader: &mut R) -> impl Iterator<Item = IoResult<Entry>> + '_ {
    std::iter::from_fn(move || reader.read_entry().transpose())
}

/// Open an entry reader for `data` as described by `structure`.
pub fn new_entry_reader<R: Read + Send + 'static>(
    structure: &Structure,
    data: R,
) -> IoResult<Box<dyn EntryReader>> {
    match structure.format {
        Some(DataFormat::Csv) => Ok(Box::new(CsvEntryReader::new(structure.clone(), data))),
        Some(DataFormat::Json) => Ok(Box::new(JsonEntryReader::new(structure.clone(), data)?)),
        Some(other) => Err(IoError::UnsupportedFormat(other.to_string())),
        None => Err(IoError::MissingFormat),
    }
}

/// Reads CSV rows as JSON arrays.
///
/// Cells are strings unless the structure's schema types the column, in
/// which case cells that parse as that type are converted. Cells that do
/// not parse stay strings so validation can count them.
pub struct CsvEntryReader<R> {
    structure: Structure,
    columns: Vec<Option<SchemaType>>,
    records: csv::StringRecordsIntoIter<R>,
    index: usize,
}

impl<R: Read> CsvEntryReader<R> {
    pub fn new(structure: Structure, data: R) -> Self {
        let opts = structure
            .format_config
            .as_ref()
            .and_then(|cfg| cfg.csv())
            .cloned()
            .unwrap_or_default();
        let columns = structure
            .schema
            .as_ref()
            .map(Schema::columns)
            .unwrap_or_default()
            .iter()
            .map(|col| col.kind)
            .collect();
        let records = csv::ReaderBuilder::new()
            .has_headers(opts.header_row)
            .delimiter(opts.delimiter())
            .flexible(opts.lazy_quotes)
            .from_reader(data)
            .into_records();
        Self {
            structure,
            columns,
            records,
            index: 0,
        }
    }
}

fn convert_cell(cell: &str, kind: Option<SchemaType>) -> Value {
    let parsed = match kind {
        Some(SchemaType::Integer) => cell.trim().parse::<i64>().ok().map(Value::from),
        Some(SchemaType::Number) => cell
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Some(SchemaType::Boolean) => match cell.trim() {
            "true" | "TRUE" | "True" => Some(Value::Bool(true)),
            "false" | "FALSE" | "False" => Some(Value::Bool(false)),
            _ => None,
        },
        Some(SchemaType::Null) if cell.is_empty() => Some(Value::Null),
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::String(cell.to_string()))
}

impl<R: Read + Send> EntryReader for CsvEntryReader<R> {
    fn structure(&self) -> &Structure {
        &self.structure
    }

    fn read_entry(&mut self) -> IoResult<Option<Entry>> {
        let Some(record) = self.records.next() else {
            return Ok(None);
        };
        let index = self.index;
        let record = record.map_err(|source| IoError::Csv { index, source })?;
        let row = record
            .iter()
            .enumerate()
            .map(|(i, cell)| convert_cell(cell, self.columns.get(i).copied().flatten()))
            .collect();
        self.index += 1;
        Ok(Some(Entry {
            index,
            key: None,
            value: Value::Array(row),
        }))
    }
}

/// Entries parsed ahead of the consumer.
const JSON_READ_AHEAD: usize = 64;

type Parsed = IoResult<(Option<String>, Value)>;

/// Reads the elements of a top-level JSON array, or the members of a
/// top-level JSON object.
///
/// Parsing runs on its own thread and hands entries over one at a time, so
/// at most [`JSON_READ_AHEAD`] entries are held in memory. Dropping the
/// reader stops the parser at the next entry.
pub struct JsonEntryReader {
    structure: Structure,
    rx: Option<Receiver<Parsed>>,
    index: usize,
}

impl JsonEntryReader {
    pub fn new<R: Read + Send + 'static>(structure: Structure, data: R) -> IoResult<Self> {
        let array_only = structure
            .format_config
            .as_ref()
            .and_then(|cfg| cfg.json())
            .is_some_and(|opts| opts.array_entries);
        let (tx, rx) = mpsc::sync_channel(JSON_READ_AHEAD);
        thread::Builder::new()
            .name("json-entries".into())
            .spawn(move || parse_entries(data, array_only, tx))?;
        Ok(Self {
            structure,
            rx: Some(rx),
            index: 0,
        })
    }
}

fn parse_entries<R: Read>(data: R, array_only: bool, tx: SyncSender<Parsed>) {
    let mut parser = serde_json::Deserializer::from_reader(data);
    let visitor = EntryVisitor { tx: &tx, array_only };
    if let Err(e) = parser.deserialize_any(visitor).and_then(|()| parser.end()) {
        // Nobody is listening once the reader is dropped or has already
        // seen an error.
        let _ = tx.send(Err(IoError::Json(e)));
    }
}

struct EntryVisitor<'a> {
    tx: &'a SyncSender<Parsed>,
    array_only: bool,
}

impl EntryVisitor<'_> {
    fn emit<E: de::Error>(&self, entry: Parsed) -> Result<(), E> {
        self.tx.send(entry).map_err(|_| E::custom("entry reader dropped"))
    }

    fn reject<E: de::Error>(self, found: &'static str) -> Result<(), E> {
        self.emit(Err(IoError::NotAContainer(found)))?;
        Err(E::custom(format!("body is {found}")))
    }
}

impl<'de> Visitor<'de> for EntryVisitor<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON array or object")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while let Some(value) = seq.next_element::<Value>()? {
            self.emit(Ok((None, value)))?;
        }
        Ok(())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        if self.array_only {
            return self.reject("an object");
        }
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            self.emit(Ok((Some(key), value)))?;
        }
        Ok(())
    }

    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        self.reject("null")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<(), E> {
        self.reject("a boolean")
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<(), E> {
        self.reject("a number")
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<(), E> {
        self.reject("a number")
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<(), E> {
        self.reject("a number")
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<(), E> {
        self.reject("a string")
    }
}

impl EntryReader for JsonEntryReader {
    fn structure(&self) -> &Structure {
        &self.structure
    }

    fn read_entry(&mut self) -> IoResult<Option<Entry>> {
        let Some(rx) = &self.rx else {
            return Ok(None);
        };
        match rx.recv() {
            Ok(Ok((key, value))) => {
                let index = self.index;
                self.index += 1;
                Ok(Some(Entry { index, key, value }))
            }
            Ok(Err(e)) => {
                self.rx = None;
                Err(e)
            }
            Err(_) => {
                self.rx = None;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vds_dataset::{CsvOptions, FormatConfig, JsonOptions};

    fn csv_structure() -> Structure {
        Structure::new(DataFormat::Csv).with_config(FormatConfig::Csv(CsvOptions::with_header()))
    }

    fn read_all(reader: &mut dyn EntryReader) -> Vec<Entry> {
        entries(reader).collect::<IoResult<_>>().unwrap()
    }

    #[test]
    fn csv_header_row_is_skipped() {
        let mut reader = new_entry_reader(&csv_structure(), &b"a,b\n1,2\n3,4\n"[..]).unwrap();
        let rows = read_all(reader.as_mut());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, json!(["1", "2"]));
        assert_eq!(rows[1].index, 1);
        assert!(reader.read_entry().unwrap().is_none());
    }

    #[test]
    fn csv_without_header_counts_every_row() {
        let st = Structure::new(DataFormat::Csv);
        let mut reader = new_entry_reader(&st, &b"a,b\n1,2\n"[..]).unwrap();
        assert_eq!(read_all(reader.as_mut()).len(), 2);
    }

    #[test]
    fn csv_cells_follow_column_types() {
        let st = csv_structure().with_schema(Schema::tabular([
            ("n", SchemaType::Integer),
            ("ok", SchemaType::Boolean),
            ("name", SchemaType::String),
        ]));
        let mut reader = new_entry_reader(&st, &b"n,ok,name\n7,true,x\nseven,maybe,y\n"[..]).unwrap();
        let rows = read_all(reader.as_mut());
        assert_eq!(rows[0].value, json!([7, true, "x"]));
        assert_eq!(rows[1].value, json!(["seven", "maybe", "y"]));
    }

    #[test]
    fn ragged_csv_fails_unless_lenient() {
        let body = &b"a,b\n1,2\n3\n"[..];
        let mut strict = new_entry_reader(&csv_structure(), body).unwrap();
        assert!(entries(strict.as_mut()).any(|e| e.is_err()));

        let lenient = Structure::new(DataFormat::Csv).with_config(FormatConfig::Csv(CsvOptions {
            header_row: true,
            lazy_quotes: true,
            separator: None,
        }));
        let mut reader = new_entry_reader(&lenient, body).unwrap();
        assert_eq!(read_all(reader.as_mut()).len(), 2);
    }

    #[test]
    fn csv_custom_separator() {
        let st = Structure::new(DataFormat::Csv).with_config(FormatConfig::Csv(CsvOptions {
            separator: Some(';'),
            ..CsvOptions::default()
        }));
        let mut reader = new_entry_reader(&st, &b"1;2\n"[..]).unwrap();
        assert_eq!(read_all(reader.as_mut())[0].value, json!(["1", "2"]));
    }

    #[test]
    fn json_array_elements_are_entries() {
        let st = Structure::new(DataFormat::Json);
        let mut reader = new_entry_reader(&st, &br#"[{"a":{"b":1}}, 2]"#[..]).unwrap();
        let rows = read_all(reader.as_mut());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, json!({"a": {"b": 1}}));
    }

    #[test]
    fn json_object_members_are_keyed_entries() {
        let st = Structure::new(DataFormat::Json);
        let mut reader = new_entry_reader(&st, &br#"{"x": 1, "y": [2]}"#[..]).unwrap();
        let rows = read_all(reader.as_mut());
        assert_eq!(rows[0].key.as_deref(), Some("x"));
        assert_eq!(rows[1].value, json!([2]));
    }

    #[test]
    fn json_array_entries_rejects_objects() {
        let st = Structure::new(DataFormat::Json)
            .with_config(FormatConfig::Json(JsonOptions { array_entries: true }));
        let mut reader = new_entry_reader(&st, &br#"{"x": 1}"#[..]).unwrap();
        assert!(matches!(reader.read_entry(), Err(IoError::NotAContainer("an object"))));
        assert!(reader.read_entry().unwrap().is_none());
    }

    #[test]
    fn scalar_body_is_not_a_container() {
        let st = Structure::new(DataFormat::Json);
        let mut reader = new_entry_reader(&st, &b"42"[..]).unwrap();
        assert!(matches!(reader.read_entry(), Err(IoError::NotAContainer("a number"))));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let st = Structure::new(DataFormat::Json);
        let mut reader = new_entry_reader(&st, &b"[1,"[..]).unwrap();
        assert_eq!(reader.read_entry().unwrap().unwrap().value, json!(1));
        assert!(matches!(reader.read_entry(), Err(IoError::Json(_))));
        assert!(reader.read_entry().unwrap().is_none());
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        let st = Structure::new(DataFormat::Json);
        let mut reader = new_entry_reader(&st, &b"[1] [2]"[..]).unwrap();
        assert!(entries(reader.as_mut()).any(|e| matches!(e, Err(IoError::Json(_)))));
    }

    /// An array body that never ends, counting the bytes handed out.
    struct Endless {
        served: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl Read for Endless {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            const ITEM: &[u8] = b"{\"n\":1},";
            if buf.is_empty() {
                return Ok(0);
            }
            let pos = self.served.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            buf[0] = if pos == 0 { b'[' } else { ITEM[(pos - 1) % ITEM.len()] };
            Ok(1)
        }
    }

    #[test]
    fn json_entries_stream_without_reading_whole_body() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let served = Arc::new(AtomicUsize::new(0));
        let body = Endless {
            served: Arc::clone(&served),
        };
        let mut reader = new_entry_reader(&Structure::new(DataFormat::Json), body).unwrap();
        for i in 0..3 {
            let entry = reader.read_entry().unwrap().unwrap();
            assert_eq!(entry.index, i);
            assert_eq!(entry.value, json!({"n": 1}));
        }
        assert!(served.load(Ordering::SeqCst) < 1_000);
        drop(reader);
    }

    #[test]
    fn unsupported_and_missing_formats() {
        assert!(matches!(
            new_entry_reader(&Structure::new(DataFormat::Xml), &b""[..]),
            Err(IoError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            new_entry_reader(&Structure::default(), &b""[..]),
            Err(IoError::MissingFormat)
        ));
    }
}
