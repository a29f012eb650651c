// Local JSON cache of the last-known application list.

use crate::error::RegistryError;
use crate::models::ApplicationRecord;
use std::path::{Path, PathBuf};
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }

    /// Reads and parses the cache as a JSON array of application records, in file order.
    #[instrument(skip(self), fields(operation = "cache_load", path = %self.path.display()))]
    pub async fn load(&self) -> Result<Vec<ApplicationRecord>, RegistryError> {
        let data = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| RegistryError::CacheIo {
                path: self.display(),
                source,
            })?;
        serde_json::from_str(&data).map_err(|source| RegistryError::CacheParse {
            path: self.display(),
            source,
        })
    }

    /// Writes the list to a temporary sibling and renames it over the cache file.
    /// Creates the parent directory when missing.
    #[instrument(
        skip(self, applications),
        fields(operation = "cache_store", count = applications.len())
    )]
    pub async fn store(&self, applications: &[ApplicationRecord]) -> Result<(), RegistryError> {
        let io_err = |source| RegistryError::CacheIo {
            path: self.display(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let json = serde_json::to_vec_pretty(applications).map_err(|source| {
            RegistryError::CacheParse {
                path: self.display(),
                source,
            }
        })?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}
