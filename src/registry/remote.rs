// Remote application directory (PocketBase-compatible REST API) over reqwest.

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::models::{ApplicationRecord, DEFAULT_ICON};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Authoritative source of the application list. Remembers its authentication between calls.
pub trait DirectoryClient: Send + Sync {
    fn is_authenticated(&self) -> bool;
    fn authenticate(&self) -> BoxFuture<'_, Result<(), RegistryError>>;
    /// Full collection, sorted by name on the server side.
    fn fetch_applications(&self) -> BoxFuture<'_, Result<Vec<RemoteRecord>, RegistryError>>;
    /// Forget the session; the next fetch re-authenticates.
    fn sign_out(&self);
}

/// Record as stored in the remote collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl RemoteRecord {
    /// Maps into an ApplicationRecord with field defaults; None when the record has no url.
    pub fn into_application(self) -> Option<ApplicationRecord> {
        let url = self.url.filter(|u| !u.trim().is_empty())?;
        Some(ApplicationRecord {
            id: self.id,
            name: self.name,
            description: self.description.unwrap_or_default(),
            url,
            icon: self
                .icon
                .filter(|i| !i.is_empty())
                .unwrap_or_else(|| DEFAULT_ICON.to_string()),
        })
    }
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    identity: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    total_pages: i64,
    #[serde(default)]
    items: Vec<RemoteRecord>,
}

pub struct PocketBaseClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    password: String,
    collection: String,
    page_size: u32,
    token: RwLock<Option<String>>,
}

impl PocketBaseClient {
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            password: config.password.clone(),
            collection: config.collection.clone(),
            page_size: config.page_size,
            token: RwLock::new(None),
        })
    }

    fn token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    #[instrument(skip(self), fields(repo = "directory", operation = "authenticate"))]
    async fn login(&self) -> Result<(), RegistryError> {
        info!(url = %self.base_url, "authenticating with directory service");
        let resp = self
            .http
            .post(format!("{}/api/admins/auth-with-password", self.base_url))
            .json(&AuthRequest {
                identity: &self.email,
                password: &self.password,
            })
            .send()
            .await;
        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                self.set_token(None);
                return Err(e.into());
            }
        };
        if !resp.status().is_success() {
            self.set_token(None);
            return Err(RegistryError::Auth(format!("HTTP {}", resp.status().as_u16())));
        }
        let body: AuthResponse = resp.json().await?;
        self.set_token(Some(body.token));
        info!("directory authentication successful");
        Ok(())
    }

    #[instrument(
        skip(self),
        fields(repo = "directory", operation = "fetch_applications", collection = %self.collection)
    )]
    async fn fetch_all(&self) -> Result<Vec<RemoteRecord>, RegistryError> {
        let token = self.token().ok_or(RegistryError::NotAuthenticated)?;
        let mut records = Vec::new();
        let mut page: i64 = 1;
        loop {
            let url = format!(
                "{}/api/collections/{}/records?page={}&perPage={}&sort=name",
                self.base_url, self.collection, page, self.page_size
            );
            let resp = self
                .http
                .get(url)
                .header(AUTHORIZATION, &token)
                .send()
                .await?;
            let status = resp.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                warn!(
                    status = status.as_u16(),
                    "directory rejected session token; will re-authenticate"
                );
                self.set_token(None);
                return Err(RegistryError::Unauthorized(status.as_u16()));
            }
            if !status.is_success() {
                return Err(RegistryError::Status(status.as_u16()));
            }
            let body: ListPage = resp.json().await?;
            let fetched = body.items.len();
            records.extend(body.items);
            let last_page = if body.total_pages > 0 {
                page >= body.total_pages
            } else {
                fetched < self.page_size as usize
            };
            if fetched == 0 || last_page {
                break;
            }
            page += 1;
        }
        Ok(records)
    }
}

impl DirectoryClient for PocketBaseClient {
    fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    fn authenticate(&self) -> BoxFuture<'_, Result<(), RegistryError>> {
        self.login().boxed()
    }

    fn fetch_applications(&self) -> BoxFuture<'_, Result<Vec<RemoteRecord>, RegistryError>> {
        self.fetch_all().boxed()
    }

    fn sign_out(&self) {
        self.set_token(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_application_applies_defaults() {
        let app = RemoteRecord {
            id: "r1".into(),
            name: "Home Assistant".into(),
            description: None,
            url: Some("http://ha.lan".into()),
            icon: Some(String::new()),
        }
        .into_application()
        .unwrap();
        assert_eq!(app.description, "");
        assert_eq!(app.icon, DEFAULT_ICON);
        assert_eq!(app.url, "http://ha.lan");
    }

    #[test]
    fn into_application_requires_url() {
        let rec = RemoteRecord {
            id: "r2".into(),
            name: "Broken".into(),
            url: Some("  ".into()),
            ..Default::default()
        };
        assert!(rec.into_application().is_none());
        assert!(RemoteRecord::default().into_application().is_none());
    }

    #[test]
    fn remote_record_parses_pocketbase_item() {
        let json = r#"{"id":"abc","collectionId":"c1","collectionName":"applications",
            "name":"Portainer","description":"","url":"https://portainer.lan","icon":"dock",
            "created":"2024-01-01 00:00:00.000Z","updated":"2024-01-01 00:00:00.000Z"}"#;
        let rec: RemoteRecord = serde_json::from_str(json).unwrap();
        let app = rec.into_application().unwrap();
        assert_eq!(app.name, "Portainer");
        assert_eq!(app.icon, "dock");
    }
}
