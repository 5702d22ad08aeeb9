// src/main.rs - fleet-host: load config and manifest, print the fleet snapshot
use clap::Parser;
use print_fleet::{load_config, load_manifest, Config, FleetCoordinator};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Parser, Debug)]
#[command(name = "fleet-host", version, about = "3D printer fleet coordinator")]
struct Args {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// TOML manifest of printers and spools to register at startup.
    #[arg(short, long)]
    manifest: Option<String>,

    /// Print the snapshot as compact JSON.
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path).map_err(|e| {
            eprintln!("Failed to load config from '{}': {}", path, e);
            BoxError::from(e)
        })?,
        None => Config::default(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting fleet-host {}", env!("CARGO_PKG_VERSION"));
    match &config.storage.snapshot_path {
        Some(path) => tracing::info!("Persisting fleet state to {}", path.display()),
        None => tracing::info!("No snapshot path configured, fleet state is memory only"),
    }
    tracing::info!(
        "Failure threshold {:.2}, window {}s, low-inventory threshold {:.0}%",
        config.detection.failure_threshold,
        config.detection.failure_window_seconds,
        config.inventory.alert_threshold * 100.0
    );

    let fleet = open_fleet(&config)?;

    if let Some(path) = &args.manifest {
        tracing::info!("Loading fleet manifest from: {}", path);
        let manifest = load_manifest(path)?;
        fleet.seed(manifest).await?;
    }

    let snapshot = fleet.snapshot().await;
    let json = if args.compact {
        serde_json::to_string(&snapshot)?
    } else {
        serde_json::to_string_pretty(&snapshot)?
    };
    println!("{}", json);
    Ok(())
}

fn open_fleet(config: &Config) -> Result<FleetCoordinator, BoxError> {
    match FleetCoordinator::new(config) {
        Ok(fleet) => Ok(fleet),
        Err(e) => {
            tracing::error!("Failed to open fleet store: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["fleet-host", "--config", "fleet.toml", "-m", "manifest.toml", "--compact"]).unwrap();
        assert_eq!(args.config.as_deref(), Some("fleet.toml"));
        assert_eq!(args.manifest.as_deref(), Some("manifest.toml"));
        assert!(args.compact);
    }

    #[test]
    fn test_open_fleet_reports_corrupt_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let mut config = Config::default();
        config.storage.snapshot_path = Some(file.path().to_path_buf());
        let err = open_fleet(&config).err().unwrap();
        assert!(err.to_string().contains("Snapshot encoding error"));
    }

    #[test]
    fn test_open_fleet_memory_only() {
        assert!(open_fleet(&Config::default()).is_ok());
    }
}
