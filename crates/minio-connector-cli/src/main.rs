//! minio-connector: command-line access to a MinIO bucket.
//!
//! Reads MINIO_ENDPOINT, MINIO_ROOT_USER, MINIO_ROOT_PASSWORD, MINIO_BUCKET_NAME and the
//! optional MINIO_* settings from the environment (or a .env file).

use anyhow::Context;
use clap::{Parser, Subcommand};
use minio_connector_cli::{
    init_tracing, object_name_for, open_upload, write_to_file, ListingOutput, StatOutput,
};
use minio_connector_core::MinioSettings;
use minio_connector_storage::{create_minio_storage, Storage};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "minio-connector", about = "MinIO object storage CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file
    Save {
        /// Path to the file to upload
        file: PathBuf,
        /// Object name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Download an object
    Open {
        /// Object name
        name: String,
        /// Output path (defaults to the last segment of the object name)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the URL of an object
    Url {
        /// Object name
        name: String,
    },
    /// Check whether an object exists
    Exists {
        /// Object name
        name: String,
    },
    /// Delete an object
    Delete {
        /// Object name
        name: String,
    },
    /// Print the size of an object in bytes
    Size {
        /// Object name
        name: String,
    },
    /// List directories and files under a path
    Ls {
        /// Directory path (defaults to the bucket root)
        #[arg(default_value = "")]
        path: String,
    },
    /// Print object metadata
    Stat {
        /// Object name
        name: String,
    },
    /// Print a free name derived from the given one
    AvailableName {
        /// Desired object name
        name: String,
        /// Maximum name length in bytes
        #[arg(long)]
        max_length: Option<usize>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let settings = MinioSettings::from_env().context(
        "Failed to load MinIO settings. Set MINIO_ENDPOINT, MINIO_ROOT_USER, MINIO_ROOT_PASSWORD and MINIO_BUCKET_NAME",
    )?;
    let storage = create_minio_storage(&settings)
        .await
        .context("Failed to connect to MinIO")?;

    match cli.command {
        Commands::Save { file, name } => {
            let name = object_name_for(&file, name)?;
            let (reader, length) = open_upload(&file).await?;
            let stored = storage.save_stream(&name, reader, length).await?;
            print_json(&serde_json::json!({ "name": stored }))?;
        }
        Commands::Open { name, output } => {
            let output = match output {
                Some(path) => path,
                None => PathBuf::from(object_name_for(&PathBuf::from(&name), None)?),
            };
            let object = storage.open(&name).await?;
            let written = write_to_file(object, &output).await?;
            print_json(&serde_json::json!({
                "name": name,
                "output": output.display().to_string(),
                "size": written,
            }))?;
        }
        Commands::Url { name } => {
            let url = storage.url(&name).await?;
            print_json(&serde_json::json!({ "name": name, "url": url }))?;
        }
        Commands::Exists { name } => {
            let exists = storage.exists(&name).await?;
            print_json(&serde_json::json!({ "name": name, "exists": exists }))?;
        }
        Commands::Delete { name } => {
            storage.delete(&name).await?;
            print_json(&serde_json::json!({ "success": true, "message": format!("{} deleted", name) }))?;
        }
        Commands::Size { name } => {
            let size = storage.size(&name).await?;
            print_json(&serde_json::json!({ "name": name, "size": size }))?;
        }
        Commands::Ls { path } => {
            let listing = storage.listdir(&path).await?;
            print_json(&ListingOutput::new(&path, listing))?;
        }
        Commands::Stat { name } => {
            let stat = storage.stat(&name).await?;
            print_json(&StatOutput::from(stat))?;
        }
        Commands::AvailableName { name, max_length } => {
            let available = storage.get_available_name(&name, max_length).await?;
            print_json(&serde_json::json!({ "requested": name, "available": available }))?;
        }
    }

    Ok(())
}
