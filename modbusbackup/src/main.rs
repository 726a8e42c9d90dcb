//! Modbus RTU backup bridge for relay circuits.
//!
//! `server` serves the backup register block and toggles primary relays on
//! coil writes; `client` forwards primary plane events to the backup bus.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modbusbackup::coil::RtuCoilWriter;
use modbusbackup::config::BackupBridgeConfig;
use modbusbackup::inbound::InboundAdapter;
use modbusbackup::outbound::OutboundAdapter;
use modbusbackup::relay::{RelayClient, ToggleCoordinator};
use modbusbackup::serial;
use modbusbackup::store::{self, RegisterService, RegisterStore};
use modbusbackup_bridge_framework::{
    BridgeArgs, BridgeConfig, BridgeError, BridgeRunner, FilterStats,
};
use modbusbackup_common::CircuitDirectory;
use std::sync::Arc;
use tracing::{debug, info};

/// Modbus RTU backup bridge for relay circuits.
#[derive(Parser, Debug)]
#[command(name = "modbusbackup")]
#[command(about = "Bridges relay circuits between a primary plane and a Modbus RTU backup bus")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    bridge: BridgeArgs,

    /// Serial port of the backup bus (overrides config).
    #[arg(long, global = true)]
    port: Option<String>,

    /// Serial baud rate (overrides config).
    #[arg(long, global = true)]
    baudrate: Option<u32>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Serve the backup register block and toggle primary relays on coil writes.
    Server {
        /// Serial timeout in seconds (e.g. 0.005). Accepted for compatibility,
        /// RTU frames are delimited by CRC.
        #[arg(long, allow_negative_numbers = true)]
        timeout: Option<f64>,
    },
    /// Forward primary plane events to coil writes on the backup bus.
    Client {
        /// Primary event bus WebSocket URI.
        #[arg(long)]
        websocket_uri: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration, command line values win over the file
    let mut config = BackupBridgeConfig::read(&cli.bridge.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.bridge.config))?;

    apply_overrides(&mut config, &cli)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {:?}", cli.bridge.config))?;

    let directory = Arc::new(config.directory()?);

    match cli.mode {
        Mode::Server { .. } => run_server(config, directory, &cli.bridge).await?,
        Mode::Client { .. } => run_client(config, directory, &cli.bridge).await?,
    }

    Ok(())
}

fn apply_overrides(config: &mut BackupBridgeConfig, cli: &Cli) -> Result<(), BridgeError> {
    if let Some(port) = &cli.port {
        config.serial.port = port.clone();
    }
    if let Some(baudrate) = cli.baudrate {
        config.serial.baud_rate = baudrate;
    }

    match &cli.mode {
        Mode::Server {
            timeout: Some(secs),
        } => {
            if !secs.is_finite() || *secs <= 0.0 {
                return Err(BridgeError::validation(format!(
                    "timeout must be a positive number of seconds, got {}",
                    secs
                )));
            }
            config.serial.timeout_ms = ((secs * 1000.0).round() as u64).max(1);
        }
        Mode::Client {
            websocket_uri: Some(uri),
        } => {
            config.primary.websocket_uri = uri.clone();
        }
        _ => {}
    }

    Ok(())
}

async fn run_server(
    config: BackupBridgeConfig,
    directory: Arc<CircuitDirectory>,
    args: &BridgeArgs,
) -> Result<()> {
    let mut runner = BridgeRunner::new_with_args("server", config, Some(args))?;

    let serial_config = runner.config().serial.clone();
    let relay_client = RelayClient::from_config(&runner.config().primary)
        .context("Failed to create relay API client")?;
    let filter = runner.config().edge_filter();

    let stats = Arc::new(FilterStats::default());
    let coordinator = Arc::new(ToggleCoordinator::new(relay_client));
    let adapter = Arc::new(OutboundAdapter::new(
        directory.clone(),
        filter,
        coordinator,
        stats.clone(),
    ));

    let stream = serial::open(&serial_config)
        .with_context(|| format!("Failed to open serial port {}", serial_config.port))?;

    info!(
        port = %serial_config.port,
        baud_rate = serial_config.baud_rate,
        relays = directory.outbound_len(),
        "Serving backup register block"
    );
    debug!(
        timeout_ms = serial_config.timeout_ms,
        "Serial timeout not applied, RTU frames are delimited by length and CRC"
    );

    let service = RegisterService::new(Arc::new(RegisterStore::new()), adapter);
    runner.track_stats("outbound", stats);
    runner.spawn_with_error("rtu-server".to_string(), async move {
        store::serve(stream, service)
            .await
            .map_err(|e| BridgeError::worker(format!("RTU server stopped: {}", e)))
    });

    runner.run().await?;
    Ok(())
}

async fn run_client(
    config: BackupBridgeConfig,
    directory: Arc<CircuitDirectory>,
    args: &BridgeArgs,
) -> Result<()> {
    let mut runner = BridgeRunner::new_with_args("client", config, Some(args))?;

    let serial_config = runner.config().serial.clone();
    let primary = runner.config().primary.clone();
    let filter = runner.config().edge_filter();

    info!(
        uri = %primary.websocket_uri,
        port = %serial_config.port,
        circuits = directory.inbound_len(),
        "Forwarding primary plane events to backup bus"
    );

    let stats = Arc::new(FilterStats::default());
    let adapter = InboundAdapter::new(
        directory,
        filter,
        RtuCoilWriter::new(serial_config),
        stats.clone(),
    );

    runner.track_stats("inbound", stats);
    let reconnect_delay = primary.reconnect_delay();
    runner.spawn(adapter.run(primary.websocket_uri, reconnect_delay));

    runner.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackupBridgeConfig {
        BackupBridgeConfig::parse("{ mapping: { circuit_groups: [4, 30, 30] } }").unwrap()
    }

    #[test]
    fn test_server_overrides() {
        let cli = Cli::try_parse_from([
            "modbusbackup",
            "--port",
            "/dev/ttyUSB1",
            "--baudrate",
            "9600",
            "server",
            "--timeout",
            "0.005",
        ])
        .unwrap();

        let mut config = config();
        apply_overrides(&mut config, &cli).unwrap();

        assert_eq!(config.serial.port, "/dev/ttyUSB1");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.timeout_ms, 5);
    }

    #[test]
    fn test_client_overrides() {
        let cli = Cli::try_parse_from([
            "modbusbackup",
            "client",
            "--websocket-uri",
            "ws://unipi.local/ws",
            "--config",
            "site.json5",
        ])
        .unwrap();

        let mut config = config();
        apply_overrides(&mut config, &cli).unwrap();

        assert_eq!(config.primary.websocket_uri, "ws://unipi.local/ws");
        assert_eq!(cli.bridge.config, std::path::PathBuf::from("site.json5"));
    }

    #[test]
    fn test_invalid_timeout() {
        for timeout in ["-1", "0", "NaN"] {
            let cli =
                Cli::try_parse_from(["modbusbackup", "server", "--timeout", timeout]).unwrap();
            assert!(
                apply_overrides(&mut config(), &cli).is_err(),
                "timeout {} should be rejected",
                timeout
            );
        }
    }

    #[test]
    fn test_override_repairs_file_value() {
        let mut config = BackupBridgeConfig::parse_unvalidated(
            r#"{ primary: { websocket_uri: "http://unipi.local/ws" }, mapping: { circuit_groups: [4] } }"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let cli = Cli::try_parse_from([
            "modbusbackup",
            "client",
            "--websocket-uri",
            "ws://unipi.local/ws",
        ])
        .unwrap();
        apply_overrides(&mut config, &cli).unwrap();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mode_required() {
        assert!(Cli::try_parse_from(["modbusbackup"]).is_err());
    }
}
