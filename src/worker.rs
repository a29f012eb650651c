// Scheduler: one priming pass of each pipeline, then two independent periodic tasks.
// Each task runs its cycles inline, so a pipeline never overlaps itself; a slow cycle only
// delays the next tick (missed ticks are skipped, not queued).

use crate::collector::TelemetryCollector;
use crate::registry::RegistrySynchronizer;
use crate::state::SharedState;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, warn};

/// Collector, synchronizer and the state they publish into.
#[derive(Clone)]
pub struct SchedulerDeps {
    pub collector: Arc<TelemetryCollector>,
    pub synchronizer: Arc<RegistrySynchronizer>,
    pub state: Arc<SharedState>,
}

/// Pipeline cadences.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub telemetry_interval: Duration,
    pub registry_interval: Duration,
    /// Cron expression for registry refresh (local time); takes precedence over registry_interval.
    pub registry_schedule: Option<String>,
}

pub struct SchedulerHandles {
    pub telemetry: JoinHandle<()>,
    pub registry: JoinHandle<()>,
}

impl SchedulerHandles {
    /// Waits for both pipeline tasks to stop. A panicked task is logged, not propagated.
    pub async fn join(self) {
        for (name, handle) in [("telemetry", self.telemetry), ("registry", self.registry)] {
            if let Err(e) = handle.await {
                warn!(pipeline = name, error = %e, "pipeline task ended abnormally");
            }
        }
    }
}

/// Runs one telemetry cycle and publishes the snapshot. On failure the previous snapshot stays.
pub async fn run_telemetry_cycle(collector: &TelemetryCollector, state: &SharedState) -> bool {
    match collector.collect().await {
        Ok(snapshot) => {
            state.publish_snapshot(snapshot);
            true
        }
        Err(e) => {
            warn!(
                error = %e,
                operation = "collect",
                "telemetry cycle abandoned; keeping previous snapshot"
            );
            false
        }
    }
}

/// Synchronous priming run of both pipelines, before the process reports ready.
#[instrument(skip(deps), fields(operation = "prime"))]
pub async fn prime(deps: &SchedulerDeps) {
    let outcome = deps.synchronizer.sync().await;
    info!(
        connection = ?outcome.connection,
        applications = outcome.count,
        "registry primed"
    );
    if run_telemetry_cycle(&deps.collector, &deps.state).await {
        info!("telemetry primed");
    }
}

/// Spawns the two periodic pipelines. Both stop when `shutdown_rx` flips to true or its sender
/// drops.
pub fn spawn(
    deps: SchedulerDeps,
    config: SchedulerConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> SchedulerHandles {
    let telemetry = {
        let (collector, state) = (deps.collector.clone(), deps.state.clone());
        let period = config.telemetry_interval;
        tokio::spawn(supervise("telemetry", shutdown_rx.clone(), move |rx| {
            telemetry_loop(collector.clone(), state.clone(), period, rx)
        }))
    };
    let registry = {
        let synchronizer = deps.synchronizer;
        let (period, schedule) = (config.registry_interval, config.registry_schedule);
        tokio::spawn(supervise("registry", shutdown_rx, move |rx| {
            registry_loop(synchronizer.clone(), period, schedule.clone(), rx)
        }))
    };
    SchedulerHandles {
        telemetry,
        registry,
    }
}

/// Runs a pipeline loop until it returns. A panicked loop is logged and restarted unless
/// shutdown has already been requested.
pub(crate) async fn supervise<F, Fut>(
    pipeline: &'static str,
    shutdown_rx: watch::Receiver<bool>,
    run: F,
) where
    F: Fn(watch::Receiver<bool>) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let finished = AssertUnwindSafe(run(shutdown_rx.clone()))
            .catch_unwind()
            .await
            .is_ok();
        if finished || *shutdown_rx.borrow() {
            break;
        }
        error!(pipeline, "pipeline task panicked; restarting");
    }
}

#[instrument(skip_all, fields(pipeline = "telemetry", period_ms = period.as_millis() as u64))]
async fn telemetry_loop(
    collector: Arc<TelemetryCollector>,
    state: Arc<SharedState>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // First periodic tick one period after the priming run.
    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                run_telemetry_cycle(&collector, &state).await;
            }
            _ = wait_for_shutdown(&mut shutdown_rx) => {
                debug!("telemetry pipeline shutting down");
                break;
            }
        }
    }
}

#[instrument(skip_all, fields(pipeline = "registry", period_secs = period.as_secs()))]
async fn registry_loop(
    synchronizer: Arc<RegistrySynchronizer>,
    period: Duration,
    schedule: Option<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let schedule = schedule.and_then(|expr| match cron::Schedule::from_str(&expr) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(cron = %expr, error = %e, "invalid registry schedule; using fixed interval");
            None
        }
    });
    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = next_registry_tick(schedule.as_ref(), &mut tick) => {
                info!("scheduled refresh of applications");
                synchronizer.sync().await;
            }
            _ = wait_for_shutdown(&mut shutdown_rx) => {
                debug!("registry pipeline shutting down");
                break;
            }
        }
    }
}

/// Resolves at the next registry refresh time: cron (local time) when set, else the fixed interval.
async fn next_registry_tick(schedule: Option<&cron::Schedule>, tick: &mut tokio::time::Interval) {
    let Some(schedule) = schedule else {
        tick.tick().await;
        return;
    };
    let now = chrono::Local::now();
    match schedule.after(&now).next() {
        Some(next) => {
            let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
            tokio::time::sleep(delay).await;
        }
        None => {
            // Schedule has no future firings.
            std::future::pending::<()>().await;
        }
    }
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
