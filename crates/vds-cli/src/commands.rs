use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::{json, Value};
use tracing::debug;
use vds_crypto::SigningKey;
use vds_dataset::{format_timestamp, Commit, Component, CsvOptions, DataFormat, Dataset, FormatConfig, Meta, Schema};
use vds_fs::{
    load_body, load_dataset, load_rows, log, BodyReader, Cancellation, FsError, LogEntry, Saver,
};
use vds_store::DiskStore;
use vds_types::Address;

use crate::cli::*;
use crate::config::CliConfig;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let root = config.store_root(cli.store.as_deref());
    match cli.command {
        Command::Save(args) => cmd_save(args, &config, &root).await,
        Command::Load(args) => cmd_load(args, &config, &root, &cli.format).await,
        Command::Body(args) => cmd_body(args, &config, &root, &cli.format).await,
        Command::Log(args) => cmd_log(args, &config, &root, &cli.format).await,
        Command::Keygen(args) => cmd_keygen(args, &config, &root),
    }
}

fn open_store(root: &Path) -> anyhow::Result<DiskStore> {
    debug!(root = %root.display(), "opening store");
    DiskStore::open(root).with_context(|| format!("opening store at {}", root.display()))
}

fn read_key(path: &Path) -> anyhow::Result<SigningKey> {
    let hex = std::fs::read_to_string(path)
        .with_context(|| format!("reading signing key {} (run `vds keygen`)", path.display()))?;
    SigningKey::from_hex(hex.trim()).with_context(|| format!("decoding signing key {}", path.display()))
}

fn parse_address(s: &str) -> anyhow::Result<Address> {
    Address::parse(s).with_context(|| format!("invalid address {s:?}"))
}

/// Start from the previous version's components with derived fields
/// cleared, so the new body is analyzed fresh.
fn follow_previous(prev: Dataset) -> Dataset {
    let previous = prev.path().cloned();
    let mut structure = prev.structure;
    if let Some(st) = structure.as_mut() {
        st.clear_derived();
    }
    let mut next = Dataset::default();
    next.meta = prev.meta;
    next.structure = structure;
    next.transform = prev.transform;
    next.viz = prev.viz;
    next.previous_path = previous;
    next
}

async fn cmd_save(args: SaveArgs, config: &CliConfig, root: &Path) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let key = read_key(&config.key_path(args.key.as_deref(), root))?;

    let mut ds = match &args.previous {
        Some(prev) => {
            let address = parse_address(prev)?;
            follow_previous(load_dataset(&store, &address, &config.load).await?)
        }
        None => Dataset::default(),
    };

    let format = match (&args.body_format, &args.body) {
        (Some(name), _) => Some(name.parse::<DataFormat>()?),
        (None, Some(path)) => path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(DataFormat::from_extension),
        (None, None) => None,
    };
    if let Some(format) = format {
        if ds.structure.as_ref().and_then(|st| st.format) != Some(format) {
            ds.structure = Some(vds_dataset::Structure::new(format));
        }
    }
    let Some(structure) = ds.structure.as_mut() else {
        bail!("cannot tell the body format; pass --body-format");
    };
    if args.header && structure.format == Some(DataFormat::Csv) {
        structure.format_config = Some(FormatConfig::Csv(CsvOptions::with_header()));
    }
    if let Some(path) = &args.schema {
        let bytes = std::fs::read(path).with_context(|| format!("reading schema {}", path.display()))?;
        let schema: Schema =
            serde_json::from_slice(&bytes).with_context(|| format!("parsing schema {}", path.display()))?;
        structure.schema = Some(schema);
    }
    if let Some(name) = args.name {
        ds.meta.get_or_insert_with(Meta::default).title = name;
    }
    if args.title.is_some() || args.message.is_some() {
        ds.commit = Some(Commit::new(
            args.title.unwrap_or_default(),
            args.message.unwrap_or_default(),
        ));
    }

    let body = match &args.body {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening body {}", path.display()))?;
            Some(Box::new(file) as BodyReader)
        }
        None => None,
    };

    let cancel = Cancellation::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut save_config = config.save.clone();
    if args.strict {
        save_config = save_config.with_reject_invalid(true);
    }
    let saved = Saver::new(&store)
        .with_signing_key(&key)
        .with_config(save_config)
        .with_load_config(config.load.clone())
        .with_cancellation(cancel)
        .create(&ds, body)
        .await;
    let address = match saved {
        Ok(address) => address,
        Err(FsError::NoChanges) => {
            println!("No changes.");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let saved = load_dataset(&store, &address, &config.load).await?;
    println!("{} Saved {}", "✓".green().bold(), address.to_string().yellow());
    println!("  {}", saved.title());
    if let Some(st) = &saved.structure {
        println!(
            "  {} entries, {} bytes, {} invalid",
            st.entries.to_string().bold(),
            st.length,
            if st.err_count == 0 {
                "0".green()
            } else {
                st.err_count.to_string().red()
            }
        );
    }
    Ok(())
}

async fn cmd_load(args: LoadArgs, config: &CliConfig, root: &Path, format: &OutputFormat) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let address = parse_address(&args.address)?;
    let ds = load_dataset(&store, &address, &config.load).await?;

    if let OutputFormat::Json = format {
        let bytes = ds.to_canonical_json()?;
        println!("{}", String::from_utf8_lossy(&bytes));
        return Ok(());
    }

    println!("dataset {}", address.to_string().yellow().bold());
    if let Some(meta) = ds.meta.as_ref().filter(|m| !m.title.is_empty()) {
        println!("Name:      {}", meta.title.bold());
    }
    if let Some(commit) = &ds.commit {
        println!("Title:     {}", commit.title);
        if let Some(ts) = &commit.timestamp {
            println!("Date:      {}", format_timestamp(ts));
        }
    }
    if let Some(st) = &ds.structure {
        let fmt = st.format.map(|f| f.to_string()).unwrap_or_else(|| "unknown".into());
        println!(
            "Structure: {} | {} entries | depth {} | {} bytes | {} invalid",
            fmt.cyan(),
            st.entries,
            st.depth,
            st.length,
            st.err_count
        );
    }
    if let Some(body) = &ds.body_path {
        println!("Body:      {}", body.to_string().dimmed());
    }
    if let Some(prev) = &ds.previous_path {
        println!("Previous:  {}", prev.to_string().dimmed());
    }
    if let Some(path) = &args.key {
        let key = read_key(path)?;
        let verified = ds
            .commit
            .as_ref()
            .is_some_and(|commit| commit.verify(&key.verifying_key()).is_ok());
        if verified {
            println!("Signature: {}", "valid".green());
        } else {
            println!("Signature: {}", "invalid".red().bold());
        }
    }
    Ok(())
}

async fn cmd_body(args: BodyArgs, config: &CliConfig, root: &Path, format: &OutputFormat) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let address = parse_address(&args.address)?;
    let ds = load_dataset(&store, &address, &config.load).await?;

    if args.raw {
        let body = load_body(&store, &ds).await?;
        std::io::stdout().lock().write_all(&body)?;
        return Ok(());
    }
    let rows = load_rows(&store, &ds, args.limit, args.offset).await?;
    let mut out = std::io::stdout().lock();
    match format {
        OutputFormat::Json => out.write_all(&rows)?,
        OutputFormat::Text => {
            let rows: Value = serde_json::from_slice(&rows)?;
            out.write_all(serde_json::to_string_pretty(&rows)?.as_bytes())?;
        }
    }
    writeln!(out)?;
    Ok(())
}

fn log_json(entry: &LogEntry) -> Value {
    json!({
        "address": entry.address.as_str(),
        "title": entry.commit.title,
        "message": entry.commit.message,
        "timestamp": entry.commit.timestamp.as_ref().map(format_timestamp),
        "previous": entry.previous.as_ref().map(Address::as_str),
    })
}

async fn cmd_log(args: LogArgs, config: &CliConfig, root: &Path, format: &OutputFormat) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let address = parse_address(&args.address)?;
    let history = log(&store, &address, args.limit, &config.load).await?;

    if let OutputFormat::Json = format {
        let entries: Vec<Value> = history.iter().map(log_json).collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for entry in &history {
        if args.oneline {
            println!("{} {}", entry.address.short().yellow(), entry.commit.title);
            continue;
        }
        println!("{}", entry.address.to_string().yellow().bold());
        if let Some(ts) = &entry.commit.timestamp {
            println!("Date: {}", format_timestamp(ts).dimmed());
        }
        println!("\n    {}", entry.commit.title);
        for line in entry.commit.message.lines() {
            println!("    {line}");
        }
        println!();
    }
    Ok(())
}

fn cmd_keygen(args: KeygenArgs, config: &CliConfig, root: &Path) -> anyhow::Result<()> {
    let path = config.key_path(args.path.as_deref(), root);
    if path.exists() && !args.force {
        bail!("{} already exists; pass --force to replace it", path.display());
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let key = SigningKey::generate();
    std::fs::write(&path, format!("{}\n", key.to_hex()))
        .with_context(|| format!("writing {}", path.display()))?;
    println!("{} Wrote signing key to {}", "✓".green().bold(), path.display());
    println!("  Public key: {}", key.verifying_key().to_hex().cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vds_dataset::Structure;
    use vds_types::{ObjectId, DEFAULT_NAMESPACE};

    #[test]
    fn following_clears_derived_fields() {
        let mut st = Structure::new(DataFormat::Csv);
        st.entries = 4;
        st.checksum = "abc".into();
        let mut prev = Dataset::default().with_meta(Meta::titled("cities")).with_structure(st);
        let at = Address::for_object(DEFAULT_NAMESPACE, &ObjectId::from_bytes(b"v1")).join("dataset.json");
        prev.set_path(Some(at.clone()));

        let next = follow_previous(prev);
        assert_eq!(next.previous_path, Some(at));
        let st = next.structure.unwrap();
        assert_eq!(st.entries, 0);
        assert!(st.checksum.is_empty());
        assert_eq!(st.format, Some(DataFormat::Csv));
        assert_eq!(next.meta.unwrap().title, "cities");
        assert!(next.commit.is_none());
    }

    #[test]
    fn keygen_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::default();
        let args = |force| KeygenArgs { path: None, force };

        cmd_keygen(args(false), &config, dir.path()).unwrap();
        let path = config.key_path(None, dir.path());
        let first = read_key(&path).unwrap();
        assert!(cmd_keygen(args(false), &config, dir.path()).is_err());

        cmd_keygen(args(true), &config, dir.path()).unwrap();
        assert_ne!(read_key(&path).unwrap().to_hex(), first.to_hex());
    }

    #[tokio::test]
    async fn save_writes_into_the_configured_store() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let config = CliConfig::default();
        cmd_keygen(KeygenArgs { path: None, force: false }, &config, &root).unwrap();

        let body = dir.path().join("cities.csv");
        std::fs::write(&body, "city,pop\ntoronto,40000000\n").unwrap();
        let args = SaveArgs {
            body: Some(body),
            body_format: None,
            header: true,
            schema: None,
            previous: None,
            name: Some("cities".into()),
            title: None,
            message: None,
            key: None,
            strict: false,
        };
        cmd_save(args, &config, &root).await.unwrap();
        assert!(std::fs::read_dir(root.join("objects")).unwrap().count() > 0);
    }
}
