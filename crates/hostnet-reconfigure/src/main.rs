//! interface-reconfigure - one-shot host network reconfiguration.
//!
//! Invoked by the management plane per reconfiguration event. Loads the
//! network cache snapshot, selects the configured datapath backend, and
//! runs one of the up/down/rewrite actions against the selected PIF.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use hostnet_model::{NetworkCache, PifRef};
use hostnet_reconfigure::datapath::NETWORK_BACKEND_PATH;
use hostnet_reconfigure::ifcfg::NETWORK_SCRIPTS_DIR;
use hostnet_reconfigure::reconfigure::{self, CACHE_FILE_PATH};
use hostnet_reconfigure::read_network_backend;

/// Host network interface reconfiguration
#[derive(Parser, Debug)]
#[command(name = "interface-reconfigure")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PIF to operate on, by uuid
    #[arg(long)]
    pif_uuid: Option<String>,

    /// PIF to operate on, by device name
    #[arg(long)]
    device: Option<String>,

    /// Network cache snapshot file
    #[arg(long, default_value = CACHE_FILE_PATH)]
    cache_file: PathBuf,

    /// Network backend selector file
    #[arg(long, default_value = NETWORK_BACKEND_PATH)]
    backend_file: PathBuf,

    /// Directory holding interface configuration files
    #[arg(long, default_value = NETWORK_SCRIPTS_DIR)]
    scripts_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Bring the PIF's datapath and IP configuration up
    Up,
    /// Bring the PIF's datapath down
    Down,
    /// Rewrite configuration files without touching device state
    Rewrite,
}

/// Initializes tracing/logging to standard error.
fn init_logging(level: &str) {
    let level: Level = level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn resolve_pif(cache: &NetworkCache, args: &Args) -> anyhow::Result<PifRef> {
    match (&args.pif_uuid, &args.device) {
        (Some(uuid), None) => Ok(cache.get_pif_by_uuid(uuid)?),
        (None, Some(device)) => {
            let mut matches = cache.get_pifs_by_device(device);
            match matches.len() {
                1 => Ok(matches.remove(0)),
                0 => bail!("no PIF found for device {}", device),
                n => bail!(
                    "device {} is ambiguous ({} PIFs); use --pif-uuid",
                    device,
                    n
                ),
            }
        }
        (Some(_), Some(_)) => bail!("--pif-uuid and --device are mutually exclusive"),
        (None, None) => bail!("one of --pif-uuid or --device is required"),
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let backend = read_network_backend(&args.backend_file)?;
    let cache = NetworkCache::from_cache_file(&args.cache_file).with_context(|| {
        format!("loading network cache from {}", args.cache_file.display())
    })?;
    let pif = resolve_pif(&cache, &args)?;

    match args.action {
        Action::Up => {
            reconfigure::action_up(&cache, backend, &pif, &args.scripts_dir).await?;
        }
        Action::Down => {
            reconfigure::action_down(&cache, backend, &pif, &args.scripts_dir).await?;
        }
        Action::Rewrite => {
            reconfigure::action_rewrite(&cache, backend, &pif, &args.scripts_dir)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting interface-reconfigure ---");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Reconfiguration failed");
            ExitCode::FAILURE
        }
    }
}
