//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinHandle;

use modbusbackup_common::{FilterStats, LoggingConfig, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};

/// Bridge runner that manages the lifecycle of one bridge mode.
///
/// Handles:
/// - Logging initialization
/// - Task spawning and management
/// - Graceful shutdown on Ctrl+C or SIGTERM
/// - Reporting event counters at shutdown
///
/// # Example
///
/// ```ignore
/// use modbusbackup_bridge_framework::{BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = MyBridgeConfig::load("modbusbackup.json5")?;
///
///     let mut runner = BridgeRunner::new_with_args("client", config, None)?;
///     runner.spawn(async move {
///         // Worker logic here
///     });
///
///     runner.run().await?;
///     Ok(())
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging.
    name: String,
    /// The loaded configuration.
    config: C,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
    /// Event counters reported on shutdown.
    stats: Vec<(String, Arc<FilterStats>)>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a bridge runner and initialize logging from the config.
    ///
    /// A `--log-level` in `args` overrides the configured level.
    pub fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION");

        // CLI level wins over the configured one, the format always comes from config
        let log_config = match args.and_then(|a| a.log_level.as_ref()) {
            Some(level) => LoggingConfig {
                level: level.clone(),
                format: config.logging().format,
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        Ok(Self {
            name,
            config,
            tasks: Vec::new(),
            stats: Vec::new(),
        })
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Register event counters to be logged on shutdown.
    pub fn track_stats(&mut self, label: impl Into<String>, stats: Arc<FilterStats>) {
        self.stats.push((label.into(), stats));
    }

    /// Spawn a worker task.
    ///
    /// The task will be tracked and aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Spawn a worker task that returns a Result.
    ///
    /// Errors are logged automatically.
    pub fn spawn_with_error<F, E>(&mut self, name: String, future: F)
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            if let Err(e) = future.await {
                tracing::error!(worker = %name, error = %e, "Worker failed");
            }
        });
        self.tasks.push(handle);
    }

    /// Run the bridge until a termination signal is received.
    ///
    /// This will:
    /// 1. Wait for Ctrl+C or SIGTERM
    /// 2. Abort all spawned tasks
    /// 3. Log the registered event counters
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        shutdown_signal().await;

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        // Abort all tasks
        for task in &self.tasks {
            task.abort();
        }

        // Wait briefly for tasks to clean up
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        for (label, stats) in &self.stats {
            let snapshot = stats.snapshot();
            tracing::info!(
                bridge = %self.name,
                direction = %label,
                received = snapshot.events_received,
                passed = snapshot.events_passed,
                filtered = snapshot.events_filtered,
                "Event statistics"
            );
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}

/// Resolve on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
