//! Persist a dataset version to the store.
//!
//! Every hydrated component is written as its own file. A transform or viz
//! that carries a script waits for the script's address before it is
//! encoded, so writes form a small dependency graph:
//!
//! ```text
//! transform_script -> transform.json \
//! viz_script       -> viz.json        \
//! meta.json, structure.json,           -> dataset.json
//! commit.json, body.<format>          /
//! ```
//!
//! `dataset.json` is added only once every other file has landed, so a
//! failed write never leaves a reachable partial version.

use bytes::Bytes;
use tracing::{debug, warn};
use vds_dataset::{Commit, Component, Dataset, Meta, Structure, Transform, Viz};
use vds_store::{Batch, ContentStore, StoreError};
use vds_types::Address;

use crate::cancel::Cancellation;
use crate::config::SaveConfig;
use crate::error::{FsError, FsResult};
use crate::package::{
    body_file_name, COMMIT_FILE, DATASET_FILE, META_FILE, STRUCTURE_FILE, TRANSFORM_FILE,
    TRANSFORM_SCRIPT_FILE, VIZ_FILE, VIZ_SCRIPT_FILE,
};

/// What a written file stands for in the dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Part {
    Body,
    Meta,
    Structure,
    Commit,
    Transform,
    TransformScript,
    Viz,
    VizScript,
    Dataset,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum FileState {
    /// Cannot be encoded until `after` has an address.
    Blocked { after: Part },
    /// Added to the batch, completion outstanding.
    Queued,
    Written(Address),
}

#[derive(Debug, Default)]
struct WritePlan {
    files: Vec<(Part, String, FileState)>,
}

impl WritePlan {
    fn queue(&mut self, part: Part, name: impl Into<String>) {
        self.files.push((part, name.into(), FileState::Queued));
    }

    fn block(&mut self, part: Part, name: impl Into<String>, after: Part) {
        self.files.push((part, name.into(), FileState::Blocked { after }));
    }

    /// Files not yet written, counting blocked ones.
    fn pending(&self) -> usize {
        self.files
            .iter()
            .filter(|(_, _, state)| !matches!(state, FileState::Written(_)))
            .count()
    }

    fn part_named(&self, name: &str) -> Option<Part> {
        self.files.iter().find(|(_, n, _)| n == name).map(|(part, _, _)| *part)
    }

    /// Record `part` as written and move the files waiting on it to
    /// `Queued`. Returns the parts that became ready, with their names.
    fn complete(&mut self, part: Part, address: Address) -> Vec<(Part, String)> {
        let mut ready = Vec::new();
        for (p, name, state) in &mut self.files {
            if *p == part {
                *state = FileState::Written(address.clone());
            } else if *state == (FileState::Blocked { after: part }) {
                *state = FileState::Queued;
                ready.push((*p, name.clone()));
            }
        }
        ready
    }
}

fn encode<C: Component>(value: &C, name: &str) -> FsResult<Bytes> {
    value
        .to_canonical_json()
        .map(Bytes::from)
        .map_err(FsError::serialization(format!("encoding {name}")))
}

/// Replace the component behind `part` with a reference to `address`.
fn bind(ds: &mut Dataset, part: Part, address: &Address) {
    match part {
        Part::Body => ds.body_path = Some(address.clone()),
        Part::Meta => ds.meta = Some(Meta::new_ref(address.clone())),
        Part::Structure => ds.structure = Some(Structure::new_ref(address.clone())),
        Part::Commit => ds.commit = Some(Commit::new_ref(address.clone())),
        Part::Transform => ds.transform = Some(Transform::new_ref(address.clone())),
        Part::Viz => ds.viz = Some(Viz::new_ref(address.clone())),
        Part::TransformScript => {
            if let Some(tf) = ds.transform.as_mut() {
                tf.script_path = Some(address.clone());
                tf.script = None;
            }
        }
        Part::VizScript => {
            if let Some(viz) = ds.viz.as_mut() {
                viz.script_path = Some(address.clone());
                viz.script = None;
            }
        }
        Part::Dataset => {}
    }
}

/// Encode the document for a part whose dependencies are settled.
fn encode_part(ds: &Dataset, part: Part, name: &str) -> FsResult<Bytes> {
    let missing = || FsError::DependencyOrder(format!("{name} has nothing to encode"));
    match part {
        Part::Transform => encode(ds.transform.as_ref().ok_or_else(missing)?, name),
        Part::Viz => encode(ds.viz.as_ref().ok_or_else(missing)?, name),
        Part::Dataset => encode(ds, name),
        _ => Err(missing()),
    }
}

/// Queue a component that needs no other file first. References are
/// already stored and are left as they are.
fn plan_component<C: Component>(
    plan: &mut WritePlan,
    initial: &mut Vec<(String, Bytes)>,
    part: Part,
    name: &str,
    slot: Option<&C>,
) -> FsResult<()> {
    if let Some(value) = slot.filter(|v| !v.is_ref()) {
        initial.push((name.to_string(), encode(value, name)?));
        plan.queue(part, name);
    }
    Ok(())
}

/// Queue a transform or viz, script first when there is one.
fn plan_scripted<C: Component>(
    plan: &mut WritePlan,
    initial: &mut Vec<(String, Bytes)>,
    (part, name): (Part, &str),
    (script_part, script_name): (Part, &str),
    slot: Option<&C>,
    script: Option<&Bytes>,
) -> FsResult<()> {
    let Some(value) = slot.filter(|v| !v.is_ref()) else {
        return Ok(());
    };
    match script {
        Some(script) => {
            initial.push((script_name.to_string(), script.clone()));
            plan.queue(script_part, script_name);
            plan.block(part, name, script_part);
        }
        None => {
            initial.push((name.to_string(), encode(value, name)?));
            plan.queue(part, name);
        }
    }
    Ok(())
}

async fn add(batch: &mut Box<dyn Batch>, name: &str, data: Bytes) -> FsResult<()> {
    batch
        .add_file(name, data)
        .await
        .map_err(FsError::store(format!("adding {name}")))
}

/// Write `ds` and `body` to the store and return the address of the new
/// top-level document.
///
/// `ds` itself is never modified. Every resource of its transform must
/// already have an address; otherwise the write fails with
/// [`FsError::DependencyOrder`] before the store is touched. When the
/// batch wraps its files, the address names `dataset.json` inside the
/// wrapping directory.
pub async fn write_dataset<S: ContentStore + ?Sized>(
    store: &S,
    ds: &Dataset,
    body: Bytes,
    config: &SaveConfig,
    cancel: &Cancellation,
) -> FsResult<Address> {
    let mut ds = ds.clone();
    if ds.is_empty() {
        return Err(FsError::Configuration("cannot save an empty dataset".into()));
    }
    if let Some(tf) = &ds.transform {
        let unbound = tf.unbound_resources();
        if !unbound.is_empty() {
            return Err(FsError::DependencyOrder(format!(
                "transform resource {} requires an address to save",
                unbound.join(", ")
            )));
        }
    }

    let mut plan = WritePlan::default();
    let mut initial = Vec::new();
    let body_name = body_file_name(ds.structure.as_ref().and_then(|st| st.format));
    initial.push((body_name.clone(), body));
    plan.queue(Part::Body, body_name);
    plan_component(&mut plan, &mut initial, Part::Meta, META_FILE, ds.meta.as_ref())?;
    plan_component(&mut plan, &mut initial, Part::Structure, STRUCTURE_FILE, ds.structure.as_ref())?;
    plan_component(&mut plan, &mut initial, Part::Commit, COMMIT_FILE, ds.commit.as_ref())?;
    plan_scripted(
        &mut plan,
        &mut initial,
        (Part::Transform, TRANSFORM_FILE),
        (Part::TransformScript, TRANSFORM_SCRIPT_FILE),
        ds.transform.as_ref(),
        ds.transform.as_ref().and_then(|tf| tf.script.as_ref()),
    )?;
    plan_scripted(
        &mut plan,
        &mut initial,
        (Part::Viz, VIZ_FILE),
        (Part::VizScript, VIZ_SCRIPT_FILE),
        ds.viz.as_ref(),
        ds.viz.as_ref().and_then(|viz| viz.script.as_ref()),
    )?;

    let mut batch = store
        .new_batch(config.batch_options())
        .await
        .map_err(FsError::store("opening write batch"))?;
    for (name, data) in initial {
        add(&mut batch, &name, data).await?;
    }
    debug!(pending = plan.pending(), "write started");

    let mut document = None;
    while plan.pending() > 0 {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FsError::Cancelled),
            event = batch.next_completion() => event,
        };
        let added = match event {
            Some(Ok(added)) => added,
            Some(Err(source)) => {
                return Err(FsError::StoreIo {
                    context: "writing dataset".into(),
                    source,
                })
            }
            None => {
                return Err(FsError::StoreIo {
                    context: "writing dataset".into(),
                    source: StoreError::WriteFailed {
                        name: DATASET_FILE.into(),
                        reason: format!("batch went idle with {} files pending", plan.pending()),
                    },
                })
            }
        };
        let Some(part) = plan.part_named(&added.name) else {
            warn!(file = %added.name, "completion for a file this write did not add");
            continue;
        };
        debug!(file = %added.name, address = %added.address, "file written");

        bind(&mut ds, part, &added.address);
        if part == Part::Dataset {
            document = Some(added.address.clone());
        }
        for (next, name) in plan.complete(part, added.address) {
            let data = encode_part(&ds, next, &name)?;
            add(&mut batch, &name, data).await?;
        }

        if plan.pending() == 0 && document.is_none() && part != Part::Dataset {
            let data = encode(&ds, DATASET_FILE)?;
            plan.queue(Part::Dataset, DATASET_FILE);
            add(&mut batch, DATASET_FILE, data).await?;
        }
    }

    let dir = batch.close().await.map_err(FsError::store("closing write batch"))?;
    match (dir, document) {
        (Some(dir), _) => Ok(dir.join(DATASET_FILE)),
        (None, Some(document)) => Ok(document),
        (None, None) => Err(FsError::DependencyOrder(format!("{DATASET_FILE} was never written"))),
    }
}
