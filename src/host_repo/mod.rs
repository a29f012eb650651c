// Host facility queries via sysinfo

mod linux;

use crate::error::ProbeError;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use sysinfo::{Components, Disks, System};
use tracing::instrument;

/// Raw CPU load sample (percent, not yet rounded).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuLoad {
    pub usage_percent: f64,
    pub core_count: usize,
}

/// Raw memory reading in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReading {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

/// Raw filesystem reading in bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct FilesystemReading {
    pub filesystem_id: String,
    pub size_bytes: u64,
    pub used_bytes: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsReading {
    pub platform: String,
    pub distro: String,
    pub hostname: String,
}

/// Raw sensor reading: package (main) temperature plus per-core values in sensor order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemperatureReading {
    pub main_celsius: Option<f64>,
    pub core_celsius: Vec<f64>,
}

/// Host facilities the collector samples. Each method is one independently failing probe.
pub trait TelemetrySource: Send + Sync {
    fn cpu_load(&self) -> BoxFuture<'_, Result<CpuLoad, ProbeError>>;
    fn memory(&self) -> BoxFuture<'_, Result<MemoryReading, ProbeError>>;
    fn filesystems(&self) -> BoxFuture<'_, Result<Vec<FilesystemReading>, ProbeError>>;
    fn os_info(&self) -> BoxFuture<'_, Result<OsReading, ProbeError>>;
    fn temperatures(&self) -> BoxFuture<'_, Result<TemperatureReading, ProbeError>>;
    /// Seconds since boot.
    fn uptime_secs(&self) -> u64;
}

pub struct HostRepo {
    sys: Arc<Mutex<System>>,
    disks: Arc<Mutex<Disks>>,
    components: Arc<Mutex<Components>>,
    last_cpu_refresh: Arc<Mutex<Option<(Instant, f64)>>>,
}

impl Default for HostRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRepo {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        let disks = Disks::new_with_refreshed_list();
        let components = Components::new_with_refreshed_list();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            disks: Arc::new(Mutex::new(disks)),
            components: Arc::new(Mutex::new(components)),
            last_cpu_refresh: Arc::new(Mutex::new(Some((Instant::now(), 0.0)))),
        }
    }

    #[instrument(skip(self), fields(repo = "host", operation = "get_cpu_load"))]
    pub async fn get_cpu_load(&self) -> Result<CpuLoad, ProbeError> {
        let sys = self.sys.clone();
        let last_cpu_refresh = self.last_cpu_refresh.clone();
        blocking("cpu", move || {
            let mut sys = sys
                .lock()
                .map_err(|e| ProbeError::query("cpu", format!("sysinfo lock poisoned: {e}")))?;

            let now = Instant::now();
            let usage = match last_cpu_refresh.lock() {
                Ok(mut guard) => match guard.as_ref().copied() {
                    Some((prev_ts, prev_usage))
                        if now.duration_since(prev_ts) < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL =>
                    {
                        // Too soon for a meaningful delta; reuse the previous sample
                        prev_usage
                    }
                    _ => {
                        sys.refresh_cpu_usage();
                        let usage = sys.global_cpu_usage() as f64;
                        *guard = Some((now, usage));
                        usage
                    }
                },
                Err(_) => {
                    sys.refresh_cpu_usage();
                    sys.global_cpu_usage() as f64
                }
            };

            Ok(CpuLoad {
                usage_percent: usage.clamp(0.0, 100.0),
                core_count: sys.cpus().len(),
            })
        })
        .await
    }

    #[instrument(skip(self), fields(repo = "host", operation = "get_memory"))]
    pub async fn get_memory(&self) -> Result<MemoryReading, ProbeError> {
        let sys = self.sys.clone();
        blocking("memory", move || {
            let mut sys = sys
                .lock()
                .map_err(|e| ProbeError::query("memory", format!("sysinfo lock poisoned: {e}")))?;
            sys.refresh_memory();
            let total_bytes = sys.total_memory();
            Ok(MemoryReading {
                total_bytes,
                used_bytes: sys.used_memory().min(total_bytes),
            })
        })
        .await
    }

    #[instrument(skip(self), fields(repo = "host", operation = "get_filesystems"))]
    pub async fn get_filesystems(&self) -> Result<Vec<FilesystemReading>, ProbeError> {
        let disks = self.disks.clone();
        blocking("filesystem", move || {
            let mut disks_guard = disks.lock().map_err(|e| {
                ProbeError::query("filesystem", format!("sysinfo disks lock poisoned: {e}"))
            })?;
            disks_guard.refresh(true);
            Ok(disks_guard
                .list()
                .iter()
                .map(|d| {
                    let size = d.total_space();
                    let used = size.saturating_sub(d.available_space());
                    let usage_percent = if size > 0 {
                        (used as f64 / size as f64) * 100.0
                    } else {
                        0.0
                    };
                    FilesystemReading {
                        filesystem_id: d.name().to_string_lossy().into_owned(),
                        size_bytes: size,
                        used_bytes: used,
                        usage_percent,
                    }
                })
                .collect())
        })
        .await
    }

    #[instrument(skip(self), fields(repo = "host", operation = "get_os_info"))]
    pub async fn get_os_info(&self) -> Result<OsReading, ProbeError> {
        blocking("os", || {
            let distro = linux::read_distro_linux()
                .or_else(System::name)
                .unwrap_or_else(|| "Unknown".into());
            Ok(OsReading {
                platform: std::env::consts::OS.to_string(),
                distro,
                hostname: System::host_name().unwrap_or_default(),
            })
        })
        .await
    }

    #[instrument(skip(self), fields(repo = "host", operation = "get_temperatures"))]
    pub async fn get_temperatures(&self) -> Result<TemperatureReading, ProbeError> {
        let components = self.components.clone();
        blocking("temperature", move || {
            let mut guard = components.lock().map_err(|e| {
                ProbeError::query("temperature", format!("sysinfo components lock poisoned: {e}"))
            })?;
            guard.refresh(false);
            let sensors: Vec<(String, f64)> = guard
                .list()
                .iter()
                .filter_map(|c| {
                    c.temperature()
                        .filter(|t| t.is_finite())
                        .map(|t| (c.label().to_string(), t as f64))
                })
                .collect();
            Ok(classify_sensors(&sensors))
        })
        .await
    }
}

impl TelemetrySource for HostRepo {
    fn cpu_load(&self) -> BoxFuture<'_, Result<CpuLoad, ProbeError>> {
        self.get_cpu_load().boxed()
    }

    fn memory(&self) -> BoxFuture<'_, Result<MemoryReading, ProbeError>> {
        self.get_memory().boxed()
    }

    fn filesystems(&self) -> BoxFuture<'_, Result<Vec<FilesystemReading>, ProbeError>> {
        self.get_filesystems().boxed()
    }

    fn os_info(&self) -> BoxFuture<'_, Result<OsReading, ProbeError>> {
        self.get_os_info().boxed()
    }

    fn temperatures(&self) -> BoxFuture<'_, Result<TemperatureReading, ProbeError>> {
        self.get_temperatures().boxed()
    }

    fn uptime_secs(&self) -> u64 {
        System::uptime()
    }
}

/// Runs a sysinfo query off the async runtime.
async fn blocking<T, F>(probe: &'static str, f: F) -> Result<T, ProbeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProbeError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|source| ProbeError::Join { probe, source })?
}

fn is_package_sensor(label: &str) -> bool {
    let l = label.to_lowercase();
    l.contains("package") || l.contains("tctl") || l.contains("tdie") || l.contains("cpu")
}

fn is_core_sensor(label: &str) -> bool {
    label.to_lowercase().contains("core")
}

/// Split labelled sensor readings into a main CPU temperature and per-core values.
/// Main is the first package-like sensor, else the mean of the cores, else None.
pub fn classify_sensors(sensors: &[(String, f64)]) -> TemperatureReading {
    let core_celsius: Vec<f64> = sensors
        .iter()
        .filter(|(label, _)| is_core_sensor(label))
        .map(|(_, t)| *t)
        .collect();
    let main_celsius = sensors
        .iter()
        .find(|(label, _)| is_package_sensor(label) && !is_core_sensor(label))
        .map(|(_, t)| *t)
        .or_else(|| {
            if core_celsius.is_empty() {
                None
            } else {
                Some(core_celsius.iter().sum::<f64>() / core_celsius.len() as f64)
            }
        });
    TemperatureReading {
        main_celsius,
        core_celsius,
    }
}
