use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use fsblob_crypto::HashAccumulator;
use fsblob_store::{BlobStore, FsBlobStore, StoreConfig};
use fsblob_types::{BlobDescriptor, BlobInfo, BlobKey, BlobName, WriteRequest};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Hash(args) => cmd_hash(&args, cli.format).await,
        Command::Store(command) => {
            let config = load_config(cli.config.as_deref(), cli.root.as_deref())?;
            let store = FsBlobStore::open(config).await?;
            run_store_command(&store, command, cli.format).await
        }
    }
}

async fn run_store_command(store: &FsBlobStore, command: StoreCommand, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        StoreCommand::Put(args) => cmd_put(store, args, format).await,
        StoreCommand::Get(args) => cmd_get(store, args).await,
        StoreCommand::Exists(args) => cmd_exists(store, args, format).await,
        StoreCommand::List => cmd_list(store, format).await,
        StoreCommand::Rm(args) => cmd_rm(store, args, format).await,
    }
}

/// Build the store configuration: the TOML file if given, then `--root`.
pub fn load_config(config: Option<&Path>, root: Option<&Path>) -> anyhow::Result<StoreConfig> {
    let mut loaded = match config {
        Some(path) => StoreConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(root) = root {
        loaded.root = root.to_path_buf();
    }
    Ok(loaded)
}

async fn open_input(file: Option<&Path>) -> anyhow::Result<Box<dyn AsyncRead + Unpin + Send>> {
    Ok(match file {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    })
}

fn descriptor(args: &DescriptorArgs) -> anyhow::Result<BlobDescriptor> {
    Ok(BlobDescriptor::parse(args.name.as_deref(), args.key.as_deref())?)
}

fn print_info(info: &BlobInfo, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(info)?),
        OutputFormat::Text => {
            println!("{} Stored {}", "✓".green().bold(), info.name.to_string().bold());
            println!("  Key:  {}", info.key.to_string().yellow());
            println!("  Size: {} bytes", info.size);
        }
    }
    Ok(())
}

async fn cmd_put(store: &FsBlobStore, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut request = WriteRequest::new(BlobName::parse(args.name)?);
    if let Some(key) = args.expect_key.as_deref() {
        request = request.with_expected_key(BlobKey::parse(key)?);
    }
    let mut input = open_input(args.file.as_deref()).await?;
    let info = store.put_reader(request, &mut input).await?;
    print_info(&info, format)
}

async fn cmd_get(store: &FsBlobStore, args: GetArgs) -> anyhow::Result<()> {
    let descriptor = descriptor(&args.descriptor)?;
    let mut reader = store.create_read_stream(&descriptor).await?;
    match args.output {
        Some(path) => {
            let mut out = tokio::fs::File::create(&path)
                .await
                .with_context(|| format!("creating {}", path.display()))?;
            tokio::io::copy(&mut reader, &mut out).await?;
            out.flush().await?;
            eprintln!("{} Wrote {} bytes to {}", "✓".green().bold(), reader.size(), path.display());
        }
        None => {
            let mut out = tokio::io::stdout();
            tokio::io::copy(&mut reader, &mut out).await?;
            out.flush().await?;
        }
    }
    Ok(())
}

async fn cmd_exists(store: &FsBlobStore, args: DescriptorArgs, format: OutputFormat) -> anyhow::Result<()> {
    let descriptor = descriptor(&args)?;
    let found = store.exists(&descriptor).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "exists": found })),
        OutputFormat::Text if found => println!("{} {}", "✓".green().bold(), descriptor),
        OutputFormat::Text => println!("{} {} not found", "✗".red().bold(), descriptor),
    }
    Ok(())
}

async fn cmd_list(store: &FsBlobStore, format: OutputFormat) -> anyhow::Result<()> {
    let mut names = store.list().await?;
    names.sort();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
        OutputFormat::Text if names.is_empty() => println!("No blobs."),
        OutputFormat::Text => {
            for name in &names {
                println!("{name}");
            }
        }
    }
    Ok(())
}

async fn cmd_rm(store: &FsBlobStore, args: DescriptorArgs, format: OutputFormat) -> anyhow::Result<()> {
    let descriptor = descriptor(&args)?;
    let removed = store.remove(&descriptor).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "removed": removed })),
        OutputFormat::Text if removed => println!("Removed {}", descriptor.to_string().yellow()),
        OutputFormat::Text => println!("Nothing to remove for {}", descriptor),
    }
    Ok(())
}

/// Hash a byte source to end of input.
pub async fn hash_reader(reader: &mut (dyn AsyncRead + Unpin + Send)) -> anyhow::Result<(BlobKey, u64)> {
    let mut acc = HashAccumulator::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        acc.update(&buf[..n]);
    }
    Ok(acc.finalize())
}

async fn cmd_hash(args: &HashArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut input = open_input(args.file.as_deref()).await?;
    let (key, size) = hash_reader(&mut input).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "key": key, "size": size })),
        OutputFormat::Text => println!("{}  {} bytes", key.to_string().yellow(), size),
    }
    Ok(())
}
