// Application registry synchronizer.
// Resolves the registry through an ordered fallback chain (remote -> local cache -> empty),
// first success wins, and publishes the result wholesale.

mod cache;
mod remote;

pub use cache::LocalCache;
pub use remote::{DirectoryClient, PocketBaseClient, RemoteRecord};

use crate::error::RegistryError;
use crate::models::{ApplicationRecord, ConnectionState, RegistryView};
use crate::state::SharedState;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// One source in the resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStep {
    /// Authenticate if needed, then fetch the full remote collection.
    Remote,
    /// Last-known list from the local cache file.
    LocalCache,
    /// Nothing usable; the registry becomes an empty list.
    Empty,
}

/// Order in which sources are tried.
pub const RESOLUTION_ORDER: [ResolutionStep; 3] = [
    ResolutionStep::Remote,
    ResolutionStep::LocalCache,
    ResolutionStep::Empty,
];

impl ResolutionStep {
    pub fn connection(self) -> ConnectionState {
        match self {
            ResolutionStep::Remote => ConnectionState::Connected,
            ResolutionStep::LocalCache => ConnectionState::Degraded,
            ResolutionStep::Empty => ConnectionState::Disconnected,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ResolutionStep::Remote => "remote",
            ResolutionStep::LocalCache => "local_cache",
            ResolutionStep::Empty => "empty",
        }
    }
}

/// Result of one `sync()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub connection: ConnectionState,
    pub count: usize,
}

impl SyncOutcome {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }
}

pub struct RegistrySynchronizer {
    client: Arc<dyn DirectoryClient>,
    cache: LocalCache,
    state: Arc<SharedState>,
    /// Serializes timer, manual and read-through syncs.
    in_flight: Mutex<()>,
}

impl RegistrySynchronizer {
    pub fn new(
        client: Arc<dyn DirectoryClient>,
        cache: LocalCache,
        state: Arc<SharedState>,
    ) -> Self {
        Self {
            client,
            cache,
            state,
            in_flight: Mutex::new(()),
        }
    }

    pub fn client(&self) -> &dyn DirectoryClient {
        self.client.as_ref()
    }

    /// Resolves and publishes the registry. Never fails; the registry always ends up defined.
    #[instrument(skip(self), fields(operation = "sync_registry"))]
    pub async fn sync(&self) -> SyncOutcome {
        let _guard = self.in_flight.lock().await;

        let mut resolved = None;
        for step in RESOLUTION_ORDER {
            match self.attempt(step).await {
                Ok(applications) => {
                    resolved = Some((step, applications));
                    break;
                }
                Err(e) => {
                    warn!(
                        step = step.name(),
                        error = %e,
                        "registry source unavailable; falling back"
                    );
                }
            }
        }
        let (step, applications) = resolved.unwrap_or((ResolutionStep::Empty, Vec::new()));

        let outcome = SyncOutcome {
            connection: step.connection(),
            count: applications.len(),
        };
        match step {
            ResolutionStep::Remote => {
                info!(count = outcome.count, "loaded applications from directory")
            }
            ResolutionStep::LocalCache => warn!(
                count = outcome.count,
                path = %self.cache.path().display(),
                "loaded applications from local cache"
            ),
            ResolutionStep::Empty => {
                warn!("no registry source available; using empty application list")
            }
        }
        self.state.publish_registry(RegistryView {
            applications,
            connection: outcome.connection,
            last_sync: Some(chrono::Utc::now()),
        });
        outcome
    }

    async fn attempt(&self, step: ResolutionStep) -> Result<Vec<ApplicationRecord>, RegistryError> {
        match step {
            ResolutionStep::Remote => self.fetch_remote().await,
            ResolutionStep::LocalCache => self.cache.load().await,
            ResolutionStep::Empty => Ok(Vec::new()),
        }
    }

    async fn fetch_remote(&self) -> Result<Vec<ApplicationRecord>, RegistryError> {
        if !self.client.is_authenticated() {
            self.client.authenticate().await?;
        }
        let records = self.client.fetch_applications().await?;
        let fetched = records.len();
        let mut applications: Vec<ApplicationRecord> = records
            .into_iter()
            .filter_map(|r| {
                let id = r.id.clone();
                let app = r.into_application();
                if app.is_none() {
                    warn!(record_id = %id, "skipping application record without url");
                }
                app
            })
            .collect();
        applications.sort_by(|a, b| a.name.cmp(&b.name));
        if applications.len() != fetched {
            info!(fetched, kept = applications.len(), "directory records mapped");
        }
        if let Err(e) = self.cache.store(&applications).await {
            warn!(error = %e, "failed to write application cache");
        }
        Ok(applications)
    }
}
