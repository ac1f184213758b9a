//! Main application wiring.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use gridx_core::AnalyticsEngine;
use gridx_devices::{device_routes, ThresholdMonitor};
use gridx_hub::{serve_with, AppState, IngestService};

use crate::config::AppConfig;
use crate::error::AppResult;

/// The assembled service.
pub struct Application {
    config: AppConfig,
    service: IngestService,
    monitor: Option<Arc<ThresholdMonitor>>,
}

impl Application {
    /// Build every component from validated configuration.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let engine = AnalyticsEngine::new(config.analytics.clone());
        let service = IngestService::new(engine);

        let monitor = match &config.devices {
            Some(devices) => Some(Arc::new(ThresholdMonitor::from_config(devices)?)),
            None => {
                info!("Device monitor not configured");
                None
            }
        };

        Ok(Self {
            config,
            service,
            monitor,
        })
    }

    pub fn service(&self) -> &IngestService {
        &self.service
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
            signal.cancel();
        });

        let listener = TcpListener::bind(self.config.hub.listen_addr()).await?;
        self.run_until(listener, shutdown).await
    }

    /// Serve on `listener` until `shutdown` is cancelled.
    pub async fn run_until(self, listener: TcpListener, shutdown: CancellationToken) -> AppResult<()> {
        let monitor_task = self.monitor.clone().map(|monitor| {
            let token = shutdown.clone();
            tokio::spawn(async move { monitor.run(token).await })
        });

        info!(
            addr = %listener.local_addr()?,
            monitor = monitor_task.is_some(),
            "Starting gridx server"
        );

        // Operator device routes exist only when the device backend is configured.
        let device_api = self
            .monitor
            .as_ref()
            .map(|monitor| device_routes(monitor.directory()))
            .unwrap_or_default();

        let state = AppState::new(self.service.clone(), self.config.hub.clone(), shutdown.clone());
        let result = serve_with(listener, state, device_api).await;

        // The server may also stop on its own error; stop the monitor either way.
        shutdown.cancel();
        if let Some(task) = monitor_task {
            if let Err(e) = task.await {
                error!(error = %e, "Device monitor task failed");
            }
        }

        info!("Shutting down");
        result.map_err(Into::into)
    }
}
