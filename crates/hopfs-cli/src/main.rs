//! hopfs command-line driver.
//!
//! Loads a TOML config naming hosts and their login identities, builds a
//! volume over the SFTP transport, and runs one operation against the
//! virtual namespace:
//!
//! ```bash
//! hopfs -c hosts.toml ls /Home/web1/deploy
//! hopfs -c hosts.toml cat /Home/web1/deploy/srv/app.log
//! hopfs -c hosts.toml put /Home/web1/deploy ./notes.txt
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use hopfs_gateway::{GatewayConfig, Volume};
use hopfs_remote::StaticInventory;
use hopfs_remote::sftp::SftpConnector;
use hopfs_types::HostInfo;

/// On-disk config: gateway settings plus the host inventory.
#[derive(Debug, Deserialize)]
struct CliConfig {
    #[serde(default)]
    gateway: GatewayConfig,
    #[serde(default)]
    hosts: Vec<HostInfo>,
}

#[derive(Parser)]
#[command(name = "hopfs", version, about = "Browse remote hosts as one virtual filesystem")]
struct Cli {
    /// TOML config listing hosts and logins.
    #[arg(short, long, default_value = "hopfs.toml")]
    config: PathBuf,

    /// User the volume is created for (defaults to the local username).
    #[arg(long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a virtual directory.
    Ls { path: String },
    /// Show entry metadata as JSON.
    Stat { path: String },
    /// Print a remote file to stdout.
    Cat { path: String },
    /// Upload a local file into a virtual directory.
    Put { dir: String, file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let raw = tokio::fs::read_to_string(&cli.config)
        .await
        .with_context(|| format!("read config {}", cli.config.display()))?;
    let config: CliConfig =
        toml::from_str(&raw).with_context(|| format!("parse config {}", cli.config.display()))?;

    let user = cli.user.unwrap_or_else(whoami::username);
    let inventory = StaticInventory::new(config.hosts);
    let connector = Arc::new(SftpConnector::new());
    let volume = Volume::new(&user, "local", &inventory, connector, config.gateway).await?;

    let outcome = run(&volume, cli.command).await;
    volume.close().await;
    outcome
}

async fn run(volume: &Volume, command: Command) -> Result<()> {
    match command {
        Command::Ls { path } => {
            for entry in volume.list(&path).await {
                let kind = if entry.kind.is_dir() { 'd' } else { '-' };
                let read = if entry.read { 'r' } else { '-' };
                let write = if entry.write { 'w' } else { '-' };
                println!("{kind}{read}{write} {:>12} {}", entry.size, entry.name);
            }
        }
        Command::Stat { path } => {
            let entry = volume.info(&path).await?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Command::Cat { path } => {
            let mut reader = volume.get_file(&path).await?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut reader, &mut stdout).await?;
        }
        Command::Put { dir, file } => {
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("file has no usable name")?
                .to_string();
            let reader = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("open {}", file.display()))?;
            let entry = volume.upload(&dir, &name, reader).await?;
            println!("uploaded {} ({} bytes)", entry.name, entry.size);
        }
    }
    Ok(())
}
