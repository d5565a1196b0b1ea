//! Read top-level documents, bodies and scripts back out of the store.

use std::io::Cursor;

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, warn};
use vds_dataset::{Component, Dataset};
use vds_io::new_entry_reader;
use vds_store::{ContentStore, StoreError};
use vds_types::Address;

use crate::config::LoadConfig;
use crate::deref::deref_dataset;
use crate::error::{FsError, FsResult};
use crate::package::package_keypath;

/// Read a top-level document, retrying reads that fail or come back empty.
/// A key that points inside a plain object is never retried.
async fn read_document<S: ContentStore + ?Sized>(
    store: &S,
    key: &Address,
    config: &LoadConfig,
) -> FsResult<Bytes> {
    let attempts = config.empty_read_retries.saturating_add(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let last = attempt >= attempts;
        match store.get(key).await {
            Ok(data) if !data.is_empty() => return Ok(data),
            Ok(_) if last => return Err(FsError::EmptyRead(key.clone())),
            Err(source @ StoreError::NotADirectory(_)) => {
                return Err(FsError::StoreIo {
                    context: format!("reading {key}"),
                    source,
                })
            }
            Err(source) if last => {
                return Err(FsError::StoreIo {
                    context: format!("reading {key}"),
                    source,
                })
            }
            Ok(_) => warn!(address = %key, attempt, "empty read, retrying"),
            Err(err) => warn!(address = %key, attempt, error = %err, "read failed, retrying"),
        }
    }
}

/// Load the top-level document at `address` without dereferencing its
/// components.
///
/// A package directory address resolves to its `dataset.json`. The result
/// is bound to the key it was read from.
pub async fn load_dataset_refs<S: ContentStore + ?Sized>(
    store: &S,
    address: &Address,
    config: &LoadConfig,
) -> FsResult<Dataset> {
    let mut key = package_keypath(address);
    let data = match read_document(store, &key, config).await {
        // An unwrapped save stores the document as a plain object.
        Err(FsError::StoreIo {
            source: StoreError::NotADirectory(_),
            ..
        }) if address.file_name().is_none() => {
            key = address.clone();
            read_document(store, &key, config).await?
        }
        other => other?,
    };
    let mut ds = Dataset::from_json(&data).map_err(FsError::serialization(format!("decoding {key}")))?;
    ds.set_path(Some(key));
    Ok(ds)
}

/// Load the dataset at `address` and dereference every component.
pub async fn load_dataset<S: ContentStore + ?Sized>(
    store: &S,
    address: &Address,
    config: &LoadConfig,
) -> FsResult<Dataset> {
    let mut ds = load_dataset_refs(store, address, config).await?;
    deref_dataset(store, &mut ds).await?;
    debug!(address = %address, "loaded dataset");
    Ok(ds)
}

/// Raw body bytes of `ds`.
pub async fn load_body<S: ContentStore + ?Sized>(store: &S, ds: &Dataset) -> FsResult<Bytes> {
    let path = ds
        .body_path
        .as_ref()
        .ok_or_else(|| FsError::Configuration("dataset has no body address".into()))?;
    store
        .get(path)
        .await
        .map_err(FsError::store(format!("loading body {path}")))
}

/// Fetch script bytes for a transform or viz that only carries the
/// script's address.
pub async fn load_scripts<S: ContentStore + ?Sized>(store: &S, ds: &mut Dataset) -> FsResult<()> {
    if let Some(tf) = ds.transform.as_mut() {
        if let (None, Some(path)) = (&tf.script, &tf.script_path) {
            let script = store
                .get(path)
                .await
                .map_err(FsError::store(format!("loading transform script {path}")))?;
            tf.script = Some(script);
        }
    }
    if let Some(viz) = ds.viz.as_mut() {
        if let (None, Some(path)) = (&viz.script, &viz.script_path) {
            let script = store
                .get(path)
                .await
                .map_err(FsError::store(format!("loading viz script {path}")))?;
            viz.script = Some(script);
        }
    }
    Ok(())
}

/// A window of body entries re-encoded as a JSON array.
///
/// Skips `offset` entries, then takes at most `limit`; a `limit` of zero
/// takes every remaining entry. The structure must already be
/// dereferenced.
pub async fn load_rows<S: ContentStore + ?Sized>(
    store: &S,
    ds: &Dataset,
    limit: usize,
    offset: usize,
) -> FsResult<Vec<u8>> {
    let structure = ds
        .structure
        .as_ref()
        .filter(|st| !st.is_empty())
        .ok_or_else(|| FsError::Configuration("reading rows requires a dereferenced structure".into()))?;
    let body = load_body(store, ds).await?;

    let mut reader =
        new_entry_reader(structure, Cursor::new(body)).map_err(FsError::serialization("opening body"))?;
    let mut rows = Vec::new();
    for entry in vds_io::entries(reader.as_mut()) {
        let entry = entry.map_err(FsError::serialization("reading body entries"))?;
        if entry.index < offset {
            continue;
        }
        if limit > 0 && rows.len() == limit {
            break;
        }
        rows.push(entry.value);
    }
    serde_json::to_vec(&Value::Array(rows)).map_err(FsError::serialization("encoding rows"))
}
