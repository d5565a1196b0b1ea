//! Walk a dataset's history through its previous-version links.

use tracing::debug;
use vds_dataset::{Commit, Component};
use vds_store::ContentStore;
use vds_types::Address;

use crate::config::LoadConfig;
use crate::deref::deref_commit;
use crate::error::FsResult;
use crate::load::load_dataset_refs;

/// One version in a dataset's history.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    /// Address the version's top-level document was read from.
    pub address: Address,
    pub commit: Commit,
    pub previous: Option<Address>,
}

/// List versions from `address` back to the first, newest first.
///
/// Stops after `limit` entries; zero means no limit. Versions saved
/// without a commit are listed with an empty one.
pub async fn log<S: ContentStore + ?Sized>(
    store: &S,
    address: &Address,
    limit: usize,
    config: &LoadConfig,
) -> FsResult<Vec<LogEntry>> {
    let mut entries = Vec::new();
    let mut next = Some(address.clone());
    while let Some(address) = next.take() {
        if limit > 0 && entries.len() == limit {
            break;
        }
        let mut ds = load_dataset_refs(store, &address, config).await?;
        deref_commit(store, &mut ds).await?;
        next = ds.previous_path.clone();
        entries.push(LogEntry {
            address: ds.path().cloned().unwrap_or(address),
            commit: ds.commit.take().unwrap_or_default(),
            previous: ds.previous_path,
        });
    }
    debug!(versions = entries.len(), "walked history");
    Ok(entries)
}
