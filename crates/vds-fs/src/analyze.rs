//! Single-pass body analysis.
//!
//! One producer reads the body in chunks and feeds three analyzers over
//! bounded channels:
//!
//! - validation: counts entries that fail the structure's schema
//! - shape: counts entries and measures their nesting depth
//! - checksum: hashes and buffers the raw bytes
//!
//! The parsing analyzers run on blocking threads behind a channel-backed
//! [`Read`]. The first error cancels every other task.

use std::io::{self, Read};

use bytes::{Buf, Bytes, BytesMut};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;
use vds_crypto::ContentHasher;
use vds_dataset::Structure;
use vds_io::{count_invalid_entries, entries, new_entry_reader};
use vds_store::StoreError;
use vds_types::ObjectId;

use crate::cancel::Cancellation;
use crate::config::SaveConfig;
use crate::error::{FsError, FsResult};

/// Everything the analyzers derive from one body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyStats {
    pub err_count: usize,
    pub entries: usize,
    pub depth: usize,
    /// Hex BLAKE3 digest under the body checksum domain.
    pub checksum: String,
    pub length: u64,
    /// The full body, buffered by the checksum analyzer.
    pub body: Bytes,
}

impl BodyStats {
    /// Write the derived fields into `structure`.
    pub fn apply(&self, structure: &mut Structure) {
        structure.err_count = self.err_count;
        structure.entries = self.entries;
        structure.depth = self.depth;
        structure.checksum = self.checksum.clone();
        structure.length = self.length;
    }
}

/// Deepest nesting under `value`, where `value` itself sits at `depth`.
/// Every object or array adds one level.
pub fn value_depth(value: &Value, depth: usize) -> usize {
    match value {
        Value::Object(members) => members
            .values()
            .map(|v| value_depth(v, depth + 1))
            .fold(depth + 1, usize::max),
        Value::Array(items) => items
            .iter()
            .map(|v| value_depth(v, depth + 1))
            .fold(depth + 1, usize::max),
        _ => depth,
    }
}

/// Hex checksum of a complete body.
pub fn body_checksum(body: &[u8]) -> String {
    ContentHasher::CHECKSUM.hash(body).to_hex()
}

enum Outcome {
    Produced(u64),
    Validated(usize),
    Shaped { entries: usize, depth: usize },
    Checksummed { checksum: String, body: Bytes },
}

/// Blocking [`Read`] over chunks arriving on a channel. Ends when every
/// sender is gone; fails once the operation is cancelled.
struct ChannelReader {
    rx: mpsc::Receiver<Bytes>,
    chunk: Bytes,
    cancel: Cancellation,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.chunk.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(io::Error::other("body analysis cancelled"));
            }
            match self.rx.blocking_recv() {
                Some(chunk) => self.chunk = chunk,
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.chunk.len());
        buf[..n].copy_from_slice(&self.chunk[..n]);
        self.chunk.advance(n);
        Ok(n)
    }
}

async fn produce<R>(
    mut body: R,
    chunk_size: usize,
    mut pipes: Vec<Option<mpsc::Sender<Bytes>>>,
    cancel: Cancellation,
) -> FsResult<Outcome>
where
    R: AsyncRead + Unpin,
{
    let mut total = 0u64;
    loop {
        let mut buf = BytesMut::with_capacity(chunk_size);
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FsError::Cancelled),
            read = body.read_buf(&mut buf) => read,
        };
        let n = read.map_err(|e| FsError::StoreIo {
            context: "reading body".into(),
            source: StoreError::Io(e),
        })?;
        if n == 0 {
            break;
        }
        total += n as u64;
        let chunk = buf.freeze();

        for slot in pipes.iter_mut() {
            let Some(pipe) = slot.as_ref() else {
                continue;
            };
            let delivered = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FsError::Cancelled),
                sent = pipe.send(chunk.clone()) => sent.is_ok(),
            };
            // A closed pipe means that analyzer has finished or failed;
            // a failure reaches the caller through its own task.
            if !delivered {
                *slot = None;
            }
        }
        if pipes.iter().all(Option::is_none) {
            break;
        }
    }
    Ok(Outcome::Produced(total))
}

async fn checksum(mut rx: mpsc::Receiver<Bytes>, cancel: Cancellation) -> FsResult<Outcome> {
    let mut hasher = ContentHasher::CHECKSUM.start();
    let mut buf = BytesMut::new();
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FsError::Cancelled),
            chunk = rx.recv() => chunk,
        };
        let Some(chunk) = chunk else {
            break;
        };
        hasher.update(&chunk);
        buf.extend_from_slice(&chunk);
    }
    let checksum = ObjectId::from_hash(*hasher.finalize().as_bytes()).to_hex();
    Ok(Outcome::Checksummed {
        checksum,
        body: buf.freeze(),
    })
}

async fn on_blocking_thread<F>(rx: mpsc::Receiver<Bytes>, cancel: Cancellation, analyze: F) -> FsResult<Outcome>
where
    F: FnOnce(ChannelReader) -> FsResult<Outcome> + Send + 'static,
{
    let reader = ChannelReader {
        rx,
        chunk: Bytes::new(),
        cancel,
    };
    tokio::task::spawn_blocking(move || analyze(reader))
        .await
        .map_err(|e| FsError::StoreIo {
            context: "body analysis".into(),
            source: StoreError::TaskFailed(e.to_string()),
        })?
}

fn validate(structure: &Structure, data: ChannelReader) -> FsResult<Outcome> {
    let mut reader = new_entry_reader(structure, data).map_err(FsError::serialization("validating body"))?;
    let invalid = count_invalid_entries(reader.as_mut()).map_err(FsError::serialization("validating body"))?;
    Ok(Outcome::Validated(invalid))
}

fn shape(structure: &Structure, data: ChannelReader) -> FsResult<Outcome> {
    let mut reader = new_entry_reader(structure, data).map_err(FsError::serialization("reading body entries"))?;
    let mut count = 0;
    // The body container itself.
    let mut depth = 1;
    for entry in entries(reader.as_mut()) {
        let entry = entry.map_err(|e| FsError::Serialization {
            context: format!("reading body entry {count}"),
            message: e.to_string(),
        })?;
        depth = depth.max(value_depth(&entry.value, 1));
        count += 1;
    }
    Ok(Outcome::Shaped { entries: count, depth })
}

/// Read `body` once and derive its statistics under `structure`.
///
/// The returned error is the first one any analyzer reports; the others
/// are cancelled and their partial results discarded.
pub async fn analyze_body<R>(
    structure: &Structure,
    body: R,
    config: &SaveConfig,
    cancel: &Cancellation,
) -> FsResult<BodyStats>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(FsError::Cancelled);
    }
    let cancel = cancel.child();
    let capacity = config.pipe_capacity.max(1);
    let (validate_tx, validate_rx) = mpsc::channel(capacity);
    let (shape_tx, shape_rx) = mpsc::channel(capacity);
    let (checksum_tx, checksum_rx) = mpsc::channel(capacity);

    let mut tasks = JoinSet::new();
    tasks.spawn(produce(
        body,
        config.chunk_size.max(1),
        vec![Some(validate_tx), Some(shape_tx), Some(checksum_tx)],
        cancel.clone(),
    ));
    tasks.spawn(checksum(checksum_rx, cancel.clone()));
    let st = structure.clone();
    tasks.spawn(on_blocking_thread(validate_rx, cancel.clone(), move |data| {
        validate(&st, data)
    }));
    let st = structure.clone();
    tasks.spawn(on_blocking_thread(shape_rx, cancel.clone(), move |data| shape(&st, data)));

    let mut produced = None;
    let mut err_count = None;
    let mut shaped = None;
    let mut summed = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|e| FsError::StoreIo {
                context: "body analysis".into(),
                source: StoreError::TaskFailed(e.to_string()),
            })
            .and_then(|result| result);
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                // Errors seen after an outside cancellation are its symptoms.
                let err = if cancel.is_cancelled() { FsError::Cancelled } else { err };
                debug!(error = %err, "body analysis failed, cancelling");
                cancel.cancel();
                tasks.abort_all();
                return Err(err);
            }
        };
        match outcome {
            Outcome::Produced(n) => produced = Some(n),
            Outcome::Validated(n) => {
                debug!(analyzer = "validation", invalid = n, "analyzer finished");
                err_count = Some(n);
            }
            Outcome::Shaped { entries, depth } => {
                debug!(analyzer = "shape", entries, depth, "analyzer finished");
                shaped = Some((entries, depth));
            }
            Outcome::Checksummed { checksum, body } => {
                debug!(analyzer = "checksum", length = body.len(), "analyzer finished");
                summed = Some((checksum, body));
            }
        }
    }

    let (Some(produced), Some(err_count), Some((entries, depth)), Some((checksum, body))) =
        (produced, err_count, shaped, summed)
    else {
        return Err(FsError::Cancelled);
    };
    let length = body.len() as u64;
    if length != produced {
        return Err(FsError::Checksum(format!(
            "hashed {length} bytes but the body had {produced}"
        )));
    }
    Ok(BodyStats {
        err_count,
        entries,
        depth,
        checksum,
        length,
        body,
    })
}
