//! The create path: analyze the body, describe the change, sign the
//! commit, then hand the version to the write engine.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncRead;
use tracing::{debug, info};
use vds_crypto::SigningKey;
use vds_dataset::{is_valid_bind_name, Commit, Component, Dataset, FormatConfig, Structure};
use vds_diff::diff_datasets;
use vds_store::ContentStore;
use vds_types::Address;

use crate::analyze::analyze_body;
use crate::cancel::Cancellation;
use crate::clock::{Clock, SystemClock};
use crate::commit_msg::clean_title_and_message;
use crate::config::{LoadConfig, SaveConfig};
use crate::deref::deref_dataset;
use crate::error::{FsError, FsResult};
use crate::load::{load_body, load_dataset, load_scripts};
use crate::write::write_dataset;

/// A body stream handed to the save pipeline.
pub type BodyReader = Box<dyn AsyncRead + Unpin + Send>;

/// Wrap in-memory bytes as a [`BodyReader`].
pub fn body_from_bytes(body: impl Into<Bytes>) -> BodyReader {
    Box::new(Cursor::new(body.into()))
}

/// Checksum of the stand-in version diffed against when there is no
/// previous one.
const PLACEHOLDER_CHECKSUM: &str = "placeholder";

/// Output of [`Saver::prepare`].
#[derive(Clone, Debug)]
pub struct Prepared {
    /// The body, buffered during analysis.
    pub body: Bytes,
    /// Change description the commit message was built from.
    pub description: String,
}

/// Check the parts of a dataset the save pipeline relies on.
pub fn validate_dataset(ds: &Dataset) -> FsResult<()> {
    let structure = ds
        .structure
        .as_ref()
        .ok_or_else(|| FsError::Configuration("a structure is required to save a dataset".into()))?;
    if structure.format.is_none() {
        return Err(FsError::Configuration("structure format is required".into()));
    }
    if let Some(opts) = structure.format_config.as_ref().and_then(FormatConfig::csv) {
        opts.validate().map_err(|e| FsError::Configuration(e.to_string()))?;
    }
    if let Some(tf) = &ds.transform {
        if let Some(name) = tf.resources.keys().find(|name| !is_valid_bind_name(name)) {
            return Err(FsError::Configuration(format!(
                "transform resource name {name:?} must be lowercase letters only"
            )));
        }
    }
    Ok(())
}

/// Saves dataset versions into one store.
///
/// ```ignore
/// let key = SigningKey::generate();
/// let address = Saver::new(&store)
///     .with_signing_key(&key)
///     .create(&ds, Some(body_from_bytes("a,b\n1,2\n")))
///     .await?;
/// ```
pub struct Saver<'a, S: ?Sized> {
    store: &'a S,
    key: Option<&'a SigningKey>,
    clock: Arc<dyn Clock>,
    config: SaveConfig,
    load_config: LoadConfig,
    cancel: Cancellation,
}

impl<'a, S: ContentStore + ?Sized> Saver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            key: None,
            clock: Arc::new(SystemClock),
            config: SaveConfig::default(),
            load_config: LoadConfig::default(),
            cancel: Cancellation::new(),
        }
    }

    pub fn with_signing_key(mut self, key: &'a SigningKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_config(mut self, config: SaveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_load_config(mut self, config: LoadConfig) -> Self {
        self.load_config = config;
        self
    }

    /// Abort the save when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    fn signing_key(&self) -> FsResult<&'a SigningKey> {
        self.key
            .ok_or_else(|| FsError::Configuration("a signing key is required to save a dataset".into()))
    }

    async fn load_previous(&self, address: &Address) -> FsResult<Dataset> {
        let mut prev = load_dataset(self.store, address, &self.load_config).await?;
        load_scripts(self.store, &mut prev).await?;
        Ok(prev)
    }

    /// Fill in derived structure fields, the commit message, timestamp and
    /// signature of `ds`.
    ///
    /// Without a body the previous version's body is reused; without
    /// either the save is misconfigured. Fails with [`FsError::NoChanges`]
    /// when nothing differs from the previous version.
    pub async fn prepare(&self, ds: &mut Dataset, body: Option<BodyReader>) -> FsResult<Prepared> {
        let key = self.signing_key()?;
        let prev = match &ds.previous_path {
            Some(address) => Some(self.load_previous(address).await?),
            None => None,
        };
        let body = match (body, &prev) {
            (Some(body), _) => body,
            (None, Some(prev)) => body_from_bytes(load_body(self.store, prev).await?),
            (None, None) => {
                return Err(FsError::Configuration(
                    "a body or a previous version is required".into(),
                ))
            }
        };
        load_scripts(self.store, ds).await?;

        let structure = ds
            .structure
            .as_ref()
            .filter(|st| !st.is_ref())
            .ok_or_else(|| FsError::Configuration("a structure is required to save a dataset".into()))?;
        let stats = analyze_body(structure, body, &self.config, &self.cancel).await?;
        if self.config.reject_invalid && stats.err_count > 0 {
            return Err(FsError::Validation {
                count: stats.err_count,
            });
        }
        let structure = ds.structure.get_or_insert_with(Structure::default);
        stats.apply(structure);

        let placeholder;
        let base = match &prev {
            Some(prev) => prev,
            None => {
                let mut seed = Structure::default();
                seed.checksum = PLACEHOLDER_CHECKSUM.into();
                seed.format = structure.format;
                placeholder = Dataset::default().with_structure(seed);
                &placeholder
            }
        };
        let description = diff_datasets(base, ds)
            .map_err(FsError::serialization("diffing against the previous version"))?
            .summary();
        if description.is_empty() {
            return Err(FsError::NoChanges);
        }
        debug!(changes = %description, "described changes");

        let commit = ds.commit.get_or_insert_with(Commit::default);
        clean_title_and_message(&mut commit.title, &mut commit.message, &description);
        commit.timestamp = Some(self.clock.now());
        commit.sign(key);
        commit
            .verify(&key.verifying_key())
            .map_err(|e| FsError::Signing(e.to_string()))?;

        Ok(Prepared {
            body: stats.body,
            description,
        })
    }

    /// Save `ds` as a new version and return its address.
    ///
    /// `ds` is copied first; the caller's value is never modified.
    pub async fn create(&self, ds: &Dataset, body: Option<BodyReader>) -> FsResult<Address> {
        self.signing_key()?;
        let mut ds = ds.clone();
        deref_dataset(self.store, &mut ds).await?;
        validate_dataset(&ds)?;
        let prepared = self.prepare(&mut ds, body).await?;
        let address = write_dataset(self.store, &ds, prepared.body, &self.config, &self.cancel).await?;
        info!(address = %address, title = %ds.title(), "saved dataset");
        Ok(address)
    }
}

/// Save `ds` with `body` under `config`, signing with `key`.
pub async fn create_dataset<S: ContentStore + ?Sized>(
    store: &S,
    ds: &Dataset,
    body: Option<BodyReader>,
    key: &SigningKey,
    config: &SaveConfig,
) -> FsResult<Address> {
    Saver::new(store)
        .with_signing_key(key)
        .with_config(config.clone())
        .create(ds, body)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use vds_dataset::{CsvOptions, DataFormat, Meta, Transform};
    use vds_store::MemoryStore;

    fn csv_dataset() -> Dataset {
        Dataset::default().with_structure(Structure::new(DataFormat::Csv))
    }

    #[test]
    fn validation_requires_format_and_bind_names() {
        assert!(validate_dataset(&Dataset::default()).is_err());
        assert!(validate_dataset(&Dataset::default().with_structure(Structure::default())).is_err());
        assert!(validate_dataset(&csv_dataset()).is_ok());

        let mut tf = Transform::new("sql");
        tf.resources.insert("Bad1".into(), Dataset::default());
        let err = validate_dataset(&csv_dataset().with_transform(tf)).unwrap_err();
        assert!(err.to_string().contains("Bad1"));
    }

    #[test]
    fn validation_rejects_non_ascii_separator() {
        let opts = CsvOptions {
            separator: Some('→'),
            ..CsvOptions::default()
        };
        let ds = Dataset::default().with_structure(Structure::new(DataFormat::Csv).with_config(FormatConfig::Csv(opts)));
        let err = validate_dataset(&ds).unwrap_err();
        assert!(matches!(err, FsError::Configuration(_)), "{err}");
    }

    #[tokio::test]
    async fn missing_key_is_a_configuration_error() {
        let store = MemoryStore::in_memory();
        let err = Saver::new(&store)
            .create(&csv_dataset(), Some(body_from_bytes("a\n")))
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::Configuration(_)));
    }

    #[tokio::test]
    async fn missing_body_and_previous_is_a_configuration_error() {
        let store = MemoryStore::in_memory();
        let key = SigningKey::generate();
        let mut ds = csv_dataset();
        let err = Saver::new(&store)
            .with_signing_key(&key)
            .prepare(&mut ds, None)
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::Configuration(_)), "{err}");
    }

    #[tokio::test]
    async fn prepare_signs_a_described_commit() {
        let store = MemoryStore::in_memory();
        let key = SigningKey::generate();
        let at = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut ds = csv_dataset().with_meta(Meta::titled("numbers"));
        let prepared = Saver::new(&store)
            .with_signing_key(&key)
            .with_clock(FixedClock(at))
            .prepare(&mut ds, Some(body_from_bytes("a,b\n1,2\n")))
            .await
            .unwrap();

        assert_eq!(&prepared.body[..], b"a,b\n1,2\n");
        assert!(prepared.description.starts_with("Structure: "));
        let commit = ds.commit.as_ref().unwrap();
        assert_eq!(commit.title, prepared.description.lines().next().unwrap());
        assert_eq!(commit.timestamp, Some(at));
        commit.verify(&key.verifying_key()).unwrap();
        assert_eq!(ds.structure.as_ref().unwrap().entries, 2);
    }

    #[tokio::test]
    async fn user_title_is_kept() {
        let store = MemoryStore::in_memory();
        let key = SigningKey::generate();
        let mut ds = csv_dataset().with_commit(Commit::new("initial import", ""));
        Saver::new(&store)
            .with_signing_key(&key)
            .prepare(&mut ds, Some(body_from_bytes("a\n")))
            .await
            .unwrap();
        assert_eq!(ds.title(), "initial import");
    }

    #[tokio::test]
    async fn invalid_entries_can_be_fatal() {
        use vds_dataset::{CsvOptions, FormatConfig, Schema, SchemaType};
        let store = MemoryStore::in_memory();
        let key = SigningKey::generate();
        let st = Structure::new(DataFormat::Csv)
            .with_config(FormatConfig::Csv(CsvOptions::with_header()))
            .with_schema(Schema::tabular([("n", SchemaType::Integer)]));
        let err = Saver::new(&store)
            .with_signing_key(&key)
            .with_config(SaveConfig::default().with_reject_invalid(true))
            .create(&Dataset::default().with_structure(st), Some(body_from_bytes("n\n1\nx\n")))
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::Validation { count: 1 }), "{err}");
    }
}
