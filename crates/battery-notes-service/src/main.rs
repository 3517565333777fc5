//! Battery notes operator CLI.
//!
//! Inspects and edits the metadata store directly and checks configuration
//! files. Run with: `cargo run -p battery-notes-service -- list`

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use tracing::info;

use battery_notes_service::{Config, default_config_path};
use battery_notes_store::Store;
use battery_notes_types::{MetadataUpdate, parse_date, truncate_to_day};

/// Battery notes - battery metadata for home-automation devices.
#[derive(Parser, Debug)]
#[command(name = "battery-notes")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every device with stored metadata.
    List,

    /// Show the stored metadata of one device.
    Show {
        /// Device identifier.
        device: String,
    },

    /// Change a device's battery metadata.
    Set {
        /// Device identifier.
        device: String,

        /// Battery type (e.g. "CR2032").
        #[arg(long = "type")]
        battery_type: Option<String>,

        /// Number of batteries.
        #[arg(long)]
        quantity: Option<u32>,

        /// Low threshold in percent (0 uses the global default).
        #[arg(long)]
        threshold: Option<u8>,
    },

    /// Record a battery replacement.
    Replaced {
        /// Device identifier.
        device: String,

        /// Replacement day as YYYY-MM-DD (defaults to today, UTC).
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete a device's stored metadata.
    Delete {
        /// Device identifier.
        device: String,
    },

    /// Validate the configuration file.
    CheckConfig,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("battery_notes=info".parse()?),
        )
        .init();

    match args.command {
        Command::CheckConfig => return check_config(args.config),
        Command::List => {
            let store = open_store(args.config, args.database)?;
            let devices = store.list_devices()?;
            println!("{}", serde_json::to_string_pretty(&devices)?);
        }
        Command::Show { device } => {
            let store = open_store(args.config, args.database)?;
            let Some(stored) = store.get_stored(&device)? else {
                bail!("No metadata stored for device {}", device);
            };
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        Command::Set {
            device,
            battery_type,
            quantity,
            threshold,
        } => {
            let store = open_store(args.config, args.database)?;
            let mut update = MetadataUpdate::new();
            if let Some(battery_type) = battery_type {
                update = update.battery_type(battery_type);
            }
            if let Some(quantity) = quantity {
                update = update.battery_quantity(quantity);
            }
            if let Some(threshold) = threshold {
                update = update.battery_low_threshold((threshold > 0).then_some(threshold));
            }
            if update.is_empty() {
                bail!("Nothing to change: pass --type, --quantity or --threshold");
            }

            let metadata = store.update_device(&device, &update)?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Command::Replaced { device, date } => {
            let store = open_store(args.config, args.database)?;
            let date = match date {
                Some(date) => parse_date(&date)?,
                None => truncate_to_day(OffsetDateTime::now_utc()),
            };
            store.set_last_replaced(&device, date)?;
            println!("Recorded battery replacement for {} on {}", device, date);
        }
        Command::Delete { device } => {
            let store = open_store(args.config, args.database)?;
            if store.delete_device(&device)? {
                println!("Deleted metadata for {}", device);
            } else {
                bail!("No metadata stored for device {}", device);
            }
        }
    }

    Ok(())
}

/// Open the store named by `--database`, else by the configuration file.
fn open_store(config: Option<PathBuf>, database: Option<PathBuf>) -> anyhow::Result<Store> {
    let db_path = match database {
        Some(path) => path,
        None => match config {
            Some(path) => Config::load(path)?.storage.path,
            None => Config::load_default().unwrap_or_default().storage.path,
        },
    };

    info!("Opening database at {:?}", db_path);
    Store::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))
}

fn check_config(path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(default_config_path);
    let config = Config::load_validated(&path)?;
    println!(
        "{} is valid: {} entries, database at {}",
        path.display(),
        config.entries.len(),
        config.storage.path.display()
    );
    Ok(())
}
