//! Pictor Job Daemon - Main Entry Point
//! Scans a photo library through the background scheduler and reports the catalog

mod config;

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pictor_core::application::{
    shutdown_channel, BackgroundJob, Scheduler, SchedulerEvent, SchedulerService,
};
use pictor_core::port::SystemTimeProvider;
use pictor_infra_system::{Catalog, CpuLoadHint, ScanDirectoryJob};

use config::{DaemonConfig, LogFormat, DEFAULT_LOG_FILTER};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = DaemonConfig::from_env()?;

    // 2. Initialize logging (guard flushes the log file on exit)
    let _log_guard = init_logging(&config)?;

    info!("Pictor job daemon v{} starting...", VERSION);
    info!(
        library = %config.library_path.display(),
        priority = %config.scan_priority,
        start_paused = config.start_paused,
        "Configuration loaded"
    );

    // 3. Setup dependencies (DI wiring)
    let load_hint = Arc::new(CpuLoadHint::new());
    let time_provider = Arc::new(SystemTimeProvider);
    let scheduler = Scheduler::new(load_hint, time_provider);
    info!(budget = scheduler.concurrency_budget(), "Scheduler created");

    // 4. Start the scheduler service
    let (service, handle) = SchedulerService::new(scheduler);
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut events = handle.subscribe();

    let service_handle = tokio::spawn(async move {
        if let Err(e) = service.run(shutdown_rx).await {
            tracing::error!(error = ?e, "Scheduler service failed");
        }
    });

    if config.start_paused {
        handle.set_paused(true).await?;
        info!("Background jobs paused");
        if config.scan_held_by_pause() {
            warn!(
                priority = %config.scan_priority,
                "Scan priority is held by the pause and nothing will unpause it; exit with Ctrl+C"
            );
        }
    }

    // 5. Submit the library scan
    let catalog = Catalog::new();
    let scan = ScanDirectoryJob::new(
        &config.library_path,
        handle.clone(),
        catalog.clone(),
        config.scan_priority,
    );
    handle
        .submit(BackgroundJob::new(config.scan_priority, scan))
        .await?;

    info!("Press Ctrl+C to shutdown");

    // 6. Follow scheduler events until idle or interrupted
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SchedulerEvent::Idle) => {
                    info!("All jobs finished");
                    break;
                }
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event log fell behind");
                }
                Err(RecvError::Closed) => {
                    warn!("Scheduler event channel closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received. Exiting gracefully...");
                break;
            }
        }
    }

    // 7. Graceful shutdown
    shutdown_tx.shutdown();
    drop(handle);
    let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, service_handle).await;

    info!(files = catalog.len(), "Shutdown complete.");
    println!("{}", catalog.to_json()?);

    Ok(())
}

fn init_logging(config: &DaemonConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .map_err(|e| anyhow!("Failed to create env filter: {}", e))?;

    // Optional daily rolling file output, always JSON
    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.log_file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    match config.log_format {
        LogFormat::Json => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
        LogFormat::Pretty => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(guard)
}

fn log_event(event: &SchedulerEvent) {
    match event {
        SchedulerEvent::Busy => debug!("Scheduler busy"),
        SchedulerEvent::Idle => debug!("Scheduler idle"),
        SchedulerEvent::JobStarted(job) => info!(
            job_id = %job.id,
            priority = %job.priority,
            title = %job.title,
            details = %job.details,
            "Job started"
        ),
        SchedulerEvent::JobEnded(job) => info!(
            job_id = %job.id,
            title = %job.title,
            details = %job.details,
            elapsed_ms = job.elapsed.map(|d| d.as_millis() as u64),
            "Job ended"
        ),
        SchedulerEvent::PauseChanged { paused } => info!(paused, "Pause changed"),
    }
}
