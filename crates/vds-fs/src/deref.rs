//! Resolve reference-only components into hydrated values.
//!
//! Each function is a no-op unless the slot holds a bare reference. A
//! resolved value keeps the address it was referenced by.

use tracing::debug;
use vds_dataset::{Component, Dataset};
use vds_store::ContentStore;
use vds_types::Address;

use crate::error::{FsError, FsResult};

/// Fetch and decode the component stored at `address`.
pub async fn load_component<C, S>(store: &S, address: &Address) -> FsResult<C>
where
    C: Component,
    S: ContentStore + ?Sized,
{
    let data = store
        .get(address)
        .await
        .map_err(FsError::store(format!("loading dataset {}", C::NAME)))?;
    let mut value =
        C::from_json(&data).map_err(FsError::serialization(format!("decoding {} at {address}", C::NAME)))?;
    value.set_path(Some(address.clone()));
    Ok(value)
}

/// Replace a reference in `slot` with the value it points at.
pub async fn deref_component<C, S>(store: &S, slot: &mut Option<C>) -> FsResult<()>
where
    C: Component,
    S: ContentStore + ?Sized,
{
    let Some(current) = slot.as_ref() else {
        return Ok(());
    };
    if !current.is_empty() {
        return Ok(());
    }
    let Some(address) = current.path().cloned() else {
        return Ok(());
    };
    let value = load_component::<C, S>(store, &address).await?;
    debug!(component = C::NAME, address = %address, "dereferenced");
    *slot = Some(value);
    Ok(())
}

pub async fn deref_meta<S: ContentStore + ?Sized>(store: &S, ds: &mut Dataset) -> FsResult<()> {
    deref_component(store, &mut ds.meta).await
}

pub async fn deref_structure<S: ContentStore + ?Sized>(store: &S, ds: &mut Dataset) -> FsResult<()> {
    deref_component(store, &mut ds.structure).await
}

pub async fn deref_transform<S: ContentStore + ?Sized>(store: &S, ds: &mut Dataset) -> FsResult<()> {
    deref_component(store, &mut ds.transform).await
}

pub async fn deref_viz<S: ContentStore + ?Sized>(store: &S, ds: &mut Dataset) -> FsResult<()> {
    deref_component(store, &mut ds.viz).await
}

pub async fn deref_commit<S: ContentStore + ?Sized>(store: &S, ds: &mut Dataset) -> FsResult<()> {
    deref_component(store, &mut ds.commit).await
}

/// Dereference every component, in the order Meta, Structure, Transform,
/// Viz, Commit. The first failure stops the walk.
pub async fn deref_dataset<S: ContentStore + ?Sized>(store: &S, ds: &mut Dataset) -> FsResult<()> {
    deref_meta(store, ds).await?;
    deref_structure(store, ds).await?;
    deref_transform(store, ds).await?;
    deref_viz(store, ds).await?;
    deref_commit(store, ds).await
}
