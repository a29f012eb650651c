use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub monitoring: MonitoringConfig,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 7801,
            host: "0.0.0.0".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bearer token accepted by the session gate on /api routes.
    pub secret: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: "octagon-launcher-secret-key-change-this".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Telemetry collection period.
    pub refresh_interval_ms: u64,
    /// Upper bound for each host probe, including the battery command.
    pub probe_timeout_ms: u64,
    pub battery_command: String,
    pub battery_args: Vec<String>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 5000,
            probe_timeout_ms: 3000,
            battery_command: "acpi".into(),
            battery_args: vec!["-b".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub url: String,
    pub email: String,
    pub password: String,
    pub collection: String,
    pub refresh_interval_secs: u64,
    /// Optional cron expression (e.g. "0 */5 * * * *"). Uses local time.
    /// Overrides refresh_interval_secs.
    pub schedule: Option<String>,
    pub cache_path: String,
    pub request_timeout_ms: u64,
    pub page_size: u32,
    /// GET /api/applications syncs inline before answering.
    pub read_through: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "https://pb.ziistdio.com".into(),
            email: String::new(),
            password: String::new(),
            collection: "applications".into(),
            refresh_interval_secs: 300,
            schedule: None,
            cache_path: "data/applications.json".into(),
            request_timeout_ms: 10_000,
            page_size: 200,
            read_through: true,
        }
    }
}

impl AppConfig {
    /// Loads `CONFIG_FILE` (default `config.toml`, optional when unset), applies environment
    /// overrides and validates.
    pub fn load() -> anyhow::Result<Self> {
        let s = match std::env::var("CONFIG_FILE") {
            Ok(path) => std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("reading config file {}: {}", path, e))?,
            Err(_) => match std::fs::read_to_string("config.toml") {
                Ok(s) => s,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
                Err(e) => return Err(anyhow::anyhow!("reading config.toml: {}", e)),
            },
        };
        Self::load_with(&s, |key| std::env::var(key).ok())
    }

    /// Parse and validate config from a string without environment overrides (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        Self::load_with(s, |_| None)
    }

    /// Parse config from a string, apply overrides from `env`, then validate.
    pub fn load_with<F>(s: &str, env: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: AppConfig = toml::from_str(s)?;
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env("PORT") {
            self.server.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = env("REFRESH_INTERVAL") {
            self.monitoring.refresh_interval_ms = parse_env("REFRESH_INTERVAL", &v)?;
        }
        if let Some(v) = env("SESSION_SECRET") {
            self.session.secret = v;
        }
        if let Some(v) = env("POCKETBASE_URL") {
            self.registry.url = v;
        }
        if let Some(v) = env("POCKETBASE_EMAIL") {
            self.registry.email = v;
        }
        if let Some(v) = env("POCKETBASE_PASSWORD") {
            self.registry.password = v;
        }
        if let Some(v) = env("POCKETBASE_COLLECTION") {
            self.registry.collection = v;
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.registry.email.trim().is_empty() && !self.registry.password.is_empty(),
            "missing registry credentials: set registry.email and registry.password \
             (or POCKETBASE_EMAIL and POCKETBASE_PASSWORD)"
        );
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.server.host.is_empty(), "server.host must be non-empty");
        anyhow::ensure!(
            !self.session.secret.is_empty(),
            "session.secret must be non-empty"
        );
        anyhow::ensure!(
            self.monitoring.refresh_interval_ms > 0,
            "monitoring.refresh_interval_ms must be > 0, got {}",
            self.monitoring.refresh_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.probe_timeout_ms > 0,
            "monitoring.probe_timeout_ms must be > 0, got {}",
            self.monitoring.probe_timeout_ms
        );
        anyhow::ensure!(
            !self.monitoring.battery_command.is_empty(),
            "monitoring.battery_command must be non-empty"
        );
        anyhow::ensure!(!self.registry.url.is_empty(), "registry.url must be non-empty");
        anyhow::ensure!(
            !self.registry.collection.is_empty(),
            "registry.collection must be non-empty"
        );
        anyhow::ensure!(
            self.registry.refresh_interval_secs > 0,
            "registry.refresh_interval_secs must be > 0, got {}",
            self.registry.refresh_interval_secs
        );
        anyhow::ensure!(
            !self.registry.cache_path.is_empty(),
            "registry.cache_path must be non-empty"
        );
        anyhow::ensure!(
            self.registry.request_timeout_ms > 0,
            "registry.request_timeout_ms must be > 0, got {}",
            self.registry.request_timeout_ms
        );
        anyhow::ensure!(
            self.registry.page_size > 0,
            "registry.page_size must be > 0, got {}",
            self.registry.page_size
        );
        if let Some(ref expr) = self.registry.schedule {
            cron::Schedule::from_str(expr).map_err(|e| {
                anyhow::anyhow!(
                    "registry.schedule {:?} is not a valid cron expression: {}",
                    expr,
                    e
                )
            })?;
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("environment variable {}={:?} is invalid: {}", key, value, e))
}
