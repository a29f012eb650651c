// Telemetry collector: fans out all host probes concurrently, then assembles one snapshot.
// A failed or timed-out probe degrades its own field group; a crashed probe task abandons
// the cycle.

use crate::battery::BatteryProbe;
use crate::error::ProbeError;
use crate::host_repo::{
    CpuLoad, FilesystemReading, MemoryReading, OsReading, TelemetrySource, TemperatureReading,
};
use crate::models::*;
use crate::power::estimate_power;
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Settled result of every probe in one cycle.
#[derive(Debug)]
pub struct ProbeResults {
    pub cpu: Result<CpuLoad, ProbeError>,
    pub memory: Result<MemoryReading, ProbeError>,
    pub filesystems: Result<Vec<FilesystemReading>, ProbeError>,
    pub os: Result<OsReading, ProbeError>,
    pub temperature: Result<TemperatureReading, ProbeError>,
    pub battery: BatteryInfo,
    pub uptime_secs: u64,
}

pub struct TelemetryCollector {
    source: Arc<dyn TelemetrySource>,
    battery: Arc<dyn BatteryProbe>,
    probe_timeout: Duration,
}

impl TelemetryCollector {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        battery: Arc<dyn BatteryProbe>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            source,
            battery,
            probe_timeout,
        }
    }

    /// Runs one collection cycle. Errors only when a probe task itself dies (panic/cancel);
    /// in that case nothing is assembled and the caller keeps its previous snapshot.
    #[instrument(skip(self), fields(operation = "collect"))]
    pub async fn collect(&self) -> anyhow::Result<TelemetrySnapshot> {
        let cpu = self.spawn_probe("cpu", |s| s.cpu_load());
        let memory = self.spawn_probe("memory", |s| s.memory());
        let filesystems = self.spawn_probe("filesystem", |s| s.filesystems());
        let os = self.spawn_probe("os", |s| s.os_info());
        let temperature = self.spawn_probe("temperature", |s| s.temperatures());
        let battery = self.spawn_battery();

        let (cpu, memory, filesystems, os, temperature, battery) =
            tokio::join!(cpu, memory, filesystems, os, temperature, battery);

        let results = ProbeResults {
            cpu: cpu.context("cpu probe task")?,
            memory: memory.context("memory probe task")?,
            filesystems: filesystems.context("filesystem probe task")?,
            os: os.context("os probe task")?,
            temperature: temperature.context("temperature probe task")?,
            battery: battery.context("battery probe task")?,
            uptime_secs: self.source.uptime_secs(),
        };
        Ok(assemble_snapshot(results, Utc::now()))
    }

    fn spawn_probe<T, F>(&self, probe: &'static str, query: F) -> JoinHandle<Result<T, ProbeError>>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a dyn TelemetrySource) -> BoxFuture<'a, Result<T, ProbeError>>
            + Send
            + 'static,
    {
        let source = self.source.clone();
        let timeout = self.probe_timeout;
        tokio::spawn(async move {
            tokio::time::timeout(timeout, query(source.as_ref()))
                .await
                .unwrap_or(Err(ProbeError::Timeout { probe, timeout }))
        })
    }

    fn spawn_battery(&self) -> JoinHandle<BatteryInfo> {
        let battery = self.battery.clone();
        let timeout = self.probe_timeout;
        tokio::spawn(async move {
            tokio::time::timeout(timeout, battery.probe_battery())
                .await
                .unwrap_or_else(|_| {
                    debug!(operation = "probe_battery", "battery probe timed out");
                    BatteryInfo::unavailable()
                })
        })
    }
}

/// Normalizes settled probe results into a snapshot. Failed probes get their degraded form.
pub fn assemble_snapshot(results: ProbeResults, completed_at: DateTime<Utc>) -> TelemetrySnapshot {
    let power = estimate_power(results.cpu.as_ref());

    let cpu = match results.cpu {
        Ok(load) => CpuInfo {
            usage_percent: round_percent(load.usage_percent),
            core_count: load.core_count as u32,
        },
        Err(e) => degraded("cpu", &e),
    };

    let memory = match results.memory {
        Ok(m) => MemoryInfo {
            total_gib: bytes_to_gib(m.total_bytes),
            used_gib: bytes_to_gib(m.used_bytes),
            usage_percent: usage_percent(m.used_bytes, m.total_bytes),
        },
        Err(e) => degraded("memory", &e),
    };

    let storage = match results.filesystems {
        Ok(list) => list
            .into_iter()
            .map(|fs| FilesystemUsage {
                filesystem_id: fs.filesystem_id,
                size_gib: bytes_to_gib(fs.size_bytes),
                used_gib: bytes_to_gib(fs.used_bytes),
                usage_percent: round_percent(fs.usage_percent),
            })
            .collect(),
        Err(e) => degraded("filesystem", &e),
    };

    let os = match results.os {
        Ok(o) => OsInfo {
            platform: o.platform,
            distro: o.distro,
            hostname: o.hostname,
        },
        Err(e) => degraded("os", &e),
    };

    let temperature = match results.temperature {
        Ok(t) => TemperatureInfo {
            available: t.main_celsius.is_some(),
            cpu_celsius: t.main_celsius.map(round_celsius),
            per_core_celsius: t.core_celsius.into_iter().map(round_celsius).collect(),
        },
        Err(e) => degraded("temperature", &e),
    };

    TelemetrySnapshot {
        cpu,
        memory,
        temperature,
        power,
        storage,
        uptime: Uptime::from_secs(results.uptime_secs),
        battery: results.battery,
        os,
        last_update: completed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

fn degraded<T: Default>(probe: &'static str, e: &ProbeError) -> T {
    debug!(probe, error = %e, "probe failed; reporting defaults");
    T::default()
}

/// Bytes to whole GiB, rounded to nearest.
pub fn bytes_to_gib(bytes: u64) -> u64 {
    (bytes as f64 / BYTES_PER_GIB).round() as u64
}

/// Percentage rounded to nearest integer, clamped to 0..=100.
pub fn round_percent(p: f64) -> u32 {
    if p.is_finite() {
        p.round().clamp(0.0, 100.0) as u32
    } else {
        0
    }
}

/// `used / total` as a rounded percentage; 0 when total is 0.
pub fn usage_percent(used: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    round_percent(used as f64 / total as f64 * 100.0)
}

pub fn round_celsius(c: f64) -> i64 {
    c.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn healthy() -> ProbeResults {
        ProbeResults {
            cpu: Ok(CpuLoad {
                usage_percent: 50.0,
                core_count: 8,
            }),
            memory: Ok(MemoryReading {
                total_bytes: 16 * GIB,
                used_bytes: 4 * GIB,
            }),
            filesystems: Ok(vec![FilesystemReading {
                filesystem_id: "/dev/sda1".into(),
                size_bytes: 500 * GIB,
                used_bytes: 125 * GIB + GIB / 2,
                usage_percent: 25.1,
            }]),
            os: Ok(OsReading {
                platform: "linux".into(),
                distro: "Ubuntu".into(),
                hostname: "octagon".into(),
            }),
            temperature: Ok(TemperatureReading {
                main_celsius: Some(47.6),
                core_celsius: vec![45.4, 49.5],
            }),
            battery: BatteryInfo::unavailable(),
            uptime_secs: 90_061,
        }
    }

    #[test]
    fn bytes_to_gib_rounds_to_nearest() {
        assert_eq!(bytes_to_gib(0), 0);
        assert_eq!(bytes_to_gib(GIB / 2 - 1), 0);
        assert_eq!(bytes_to_gib(GIB / 2), 1);
        assert_eq!(bytes_to_gib(GIB + GIB / 3), 1);
        assert_eq!(bytes_to_gib(16 * GIB), 16);
    }

    #[test]
    fn usage_percent_zero_total_is_zero() {
        assert_eq!(usage_percent(0, 0), 0);
        assert_eq!(usage_percent(12345, 0), 0);
        assert_eq!(usage_percent(1, 3), 33);
        assert_eq!(usage_percent(2, 3), 67);
    }

    #[test]
    fn round_percent_handles_non_finite() {
        assert_eq!(round_percent(f64::NAN), 0);
        assert_eq!(round_percent(49.5), 50);
        assert_eq!(round_percent(100.4), 100);
    }

    #[test]
    fn assemble_normalizes_units() {
        let at = Utc::now();
        let s = assemble_snapshot(healthy(), at);
        assert_eq!(s.cpu, CpuInfo { usage_percent: 50, core_count: 8 });
        assert_eq!(
            s.memory,
            MemoryInfo {
                total_gib: 16,
                used_gib: 4,
                usage_percent: 25
            }
        );
        assert_eq!(s.storage[0].size_gib, 500);
        assert_eq!(s.storage[0].used_gib, 126);
        assert_eq!(s.storage[0].usage_percent, 25);
        assert_eq!(s.temperature.cpu_celsius, Some(48));
        assert_eq!(s.temperature.per_core_celsius, vec![45, 50]);
        assert!(s.temperature.available);
        assert_eq!(s.power.estimated_watts, Some(60));
        assert_eq!(s.uptime, Uptime { days: 1, hours: 1, minutes: 1 });
        assert_eq!(s.last_update, at.to_rfc3339_opts(SecondsFormat::Millis, true));
    }

    #[test]
    fn assemble_degrades_failed_probes_independently() {
        let mut r = healthy();
        r.temperature = Err(ProbeError::query("temperature", "no sensors"));
        r.cpu = Err(ProbeError::Timeout {
            probe: "cpu",
            timeout: Duration::from_secs(3),
        });
        let s = assemble_snapshot(r, Utc::now());
        assert_eq!(s.temperature, TemperatureInfo::default());
        assert!(!s.temperature.available);
        assert_eq!(s.cpu.core_count, 0);
        assert!(!s.power.available);
        // untouched groups still populated
        assert_eq!(s.memory.total_gib, 16);
        assert_eq!(s.os.hostname, "octagon");
    }

    #[test]
    fn assemble_zero_memory_total_does_not_divide() {
        let mut r = healthy();
        r.memory = Ok(MemoryReading {
            total_bytes: 0,
            used_bytes: 0,
        });
        let s = assemble_snapshot(r, Utc::now());
        assert_eq!(s.memory.usage_percent, 0);
    }

    #[test]
    fn uptime_split_truncates() {
        for u in [0u64, 59, 60, 3_599, 3_600, 86_399, 86_400, 90_061, 1_000_000, u32::MAX as u64] {
            let t = Uptime::from_secs(u);
            let floor = t.days * 86_400 + t.hours * 3_600 + t.minutes * 60;
            assert!(floor <= u, "{u}: {t:?}");
            assert!(u < floor + 60, "{u}: {t:?}");
            assert!(t.hours < 24 && t.minutes < 60);
        }
    }
}
