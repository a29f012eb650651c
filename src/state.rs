// Process-wide state: latest committed telemetry snapshot and application registry.
// Writers publish whole values (Arc swap); readers clone the Arc and never see a partial write.

use crate::models::{RegistryView, TelemetrySnapshot};
use std::sync::{Arc, RwLock};
use std::time::Instant;

pub struct SharedState {
    snapshot: RwLock<Option<Arc<TelemetrySnapshot>>>,
    registry: RwLock<Arc<RegistryView>>,
    started_at: Instant,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
            registry: RwLock::new(Arc::new(RegistryView::default())),
            started_at: Instant::now(),
        }
    }

    /// Replaces the current snapshot.
    pub fn publish_snapshot(&self, snapshot: TelemetrySnapshot) {
        let next = Arc::new(snapshot);
        match self.snapshot.write() {
            Ok(mut guard) => *guard = Some(next),
            Err(poisoned) => *poisoned.into_inner() = Some(next),
        }
    }

    /// Latest committed snapshot; None until the first successful collection.
    pub fn latest_snapshot(&self) -> Option<Arc<TelemetrySnapshot>> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the current registry.
    pub fn publish_registry(&self, view: RegistryView) {
        let next = Arc::new(view);
        match self.registry.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    pub fn registry(&self) -> Arc<RegistryView> {
        match self.registry.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Seconds since this state holder (the process) started.
    pub fn process_uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
