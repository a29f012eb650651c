use anyhow::Result;
use octagon::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    // Panics on background tasks are logged; the task ends but the process keeps serving.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(panic = %info, "uncaught panic");
        default_hook(info);
    }));

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let app_config = match config::AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return Err(e);
        }
    };
    tracing::info!("Initializing Octagon launcher");

    let state = Arc::new(state::SharedState::new());

    let battery = Arc::new(battery::AcpiBatteryProbe::new(
        app_config.monitoring.battery_command.clone(),
        app_config.monitoring.battery_args.clone(),
        Duration::from_millis(app_config.monitoring.probe_timeout_ms),
    ));
    let collector = Arc::new(collector::TelemetryCollector::new(
        Arc::new(host_repo::HostRepo::new()),
        battery,
        Duration::from_millis(app_config.monitoring.probe_timeout_ms),
    ));

    let directory = Arc::new(registry::PocketBaseClient::new(&app_config.registry)?);
    let synchronizer = Arc::new(registry::RegistrySynchronizer::new(
        directory,
        registry::LocalCache::new(&app_config.registry.cache_path),
        state.clone(),
    ));

    let deps = worker::SchedulerDeps {
        collector,
        synchronizer: synchronizer.clone(),
        state: state.clone(),
    };
    worker::prime(&deps).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = worker::spawn(
        deps,
        worker::SchedulerConfig {
            telemetry_interval: Duration::from_millis(app_config.monitoring.refresh_interval_ms),
            registry_interval: Duration::from_secs(app_config.registry.refresh_interval_secs),
            registry_schedule: app_config.registry.schedule.clone(),
        },
        shutdown_rx,
    );

    let app = routes::app(state.clone(), synchronizer.clone(), app_config.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let registry = state.registry();
    tracing::info!(
        connection = ?registry.connection,
        applications = registry.applications.len(),
        "Listening on http://{}",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Received shutdown signal");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    handles.join().await;
    synchronizer.client().sign_out();
    tracing::info!("Octagon launcher stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
