// Shared test helpers: fake host source, fake battery, fake directory service

#![allow(dead_code)]

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use octagon::battery::BatteryProbe;
use octagon::error::{ProbeError, RegistryError};
use octagon::host_repo::*;
use octagon::models::*;
use octagon::registry::{DirectoryClient, RemoteRecord};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const GIB: u64 = 1024 * 1024 * 1024;

/// How a fake probe behaves when queried.
#[derive(Debug, Clone)]
pub enum Behavior<T> {
    Ok(T),
    Fail,
    Panic,
    Hang,
}

impl<T: Clone + Send + 'static> Behavior<T> {
    fn run(&self, probe: &'static str) -> BoxFuture<'static, Result<T, ProbeError>> {
        let behavior = self.clone();
        async move {
            match behavior {
                Behavior::Ok(v) => Ok(v),
                Behavior::Fail => Err(ProbeError::query(probe, "fake failure")),
                Behavior::Panic => panic!("{probe} probe crashed"),
                Behavior::Hang => std::future::pending().await,
            }
        }
        .boxed()
    }
}

pub struct FakeSource {
    pub cpu: Behavior<CpuLoad>,
    pub memory: Behavior<MemoryReading>,
    pub filesystems: Behavior<Vec<FilesystemReading>>,
    pub os: Behavior<OsReading>,
    pub temperature: Behavior<TemperatureReading>,
    pub uptime_secs: u64,
    pub cpu_delay: Duration,
    pub collections: AtomicUsize,
    pub active_collections: AtomicUsize,
    pub max_concurrent_collections: AtomicUsize,
}

/// Decrements the active counter even when the read is cancelled by a timeout.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeSource {
    pub fn healthy() -> Self {
        Self {
            cpu: Behavior::Ok(CpuLoad {
                usage_percent: 50.0,
                core_count: 4,
            }),
            memory: Behavior::Ok(MemoryReading {
                total_bytes: 8 * GIB,
                used_bytes: 2 * GIB,
            }),
            filesystems: Behavior::Ok(vec![FilesystemReading {
                filesystem_id: "/dev/nvme0n1p2".into(),
                size_bytes: 256 * GIB,
                used_bytes: 64 * GIB,
                usage_percent: 25.0,
            }]),
            os: Behavior::Ok(OsReading {
                platform: "linux".into(),
                distro: "Debian GNU/Linux".into(),
                hostname: "octagon-test".into(),
            }),
            temperature: Behavior::Ok(TemperatureReading {
                main_celsius: Some(42.4),
                core_celsius: vec![41.0, 43.6],
            }),
            uptime_secs: 3 * 86_400 + 4 * 3_600 + 5 * 60 + 59,
            cpu_delay: Duration::ZERO,
            collections: AtomicUsize::new(0),
            active_collections: AtomicUsize::new(0),
            max_concurrent_collections: AtomicUsize::new(0),
        }
    }

    /// Every collection reads the CPU once; a slow CPU read makes the whole cycle slow.
    pub fn with_cpu_delay(mut self, delay: Duration) -> Self {
        self.cpu_delay = delay;
        self
    }

    pub fn collections(&self) -> usize {
        self.collections.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_collections(&self) -> usize {
        self.max_concurrent_collections.load(Ordering::SeqCst)
    }
}

impl TelemetrySource for FakeSource {
    fn cpu_load(&self) -> BoxFuture<'_, Result<CpuLoad, ProbeError>> {
        let read = self.cpu.run("cpu");
        async move {
            self.collections.fetch_add(1, Ordering::SeqCst);
            let active = self.active_collections.fetch_add(1, Ordering::SeqCst) + 1;
            let _guard = ActiveGuard(&self.active_collections);
            self.max_concurrent_collections
                .fetch_max(active, Ordering::SeqCst);
            if !self.cpu_delay.is_zero() {
                tokio::time::sleep(self.cpu_delay).await;
            }
            read.await
        }
        .boxed()
    }

    fn memory(&self) -> BoxFuture<'_, Result<MemoryReading, ProbeError>> {
        self.memory.run("memory")
    }

    fn filesystems(&self) -> BoxFuture<'_, Result<Vec<FilesystemReading>, ProbeError>> {
        self.filesystems.run("filesystem")
    }

    fn os_info(&self) -> BoxFuture<'_, Result<OsReading, ProbeError>> {
        self.os.run("os")
    }

    fn temperatures(&self) -> BoxFuture<'_, Result<TemperatureReading, ProbeError>> {
        self.temperature.run("temperature")
    }

    fn uptime_secs(&self) -> u64 {
        self.uptime_secs
    }
}

/// Battery probe returning a fixed answer.
pub struct FixedBattery(pub BatteryInfo);

impl BatteryProbe for FixedBattery {
    fn probe_battery(&self) -> BoxFuture<'_, BatteryInfo> {
        let info = self.0.clone();
        async move { info }.boxed()
    }
}

pub fn record(id: &str, name: &str) -> RemoteRecord {
    RemoteRecord {
        id: id.into(),
        name: name.into(),
        description: Some(format!("{name} app")),
        url: Some(format!("http://{}.lan", name.to_lowercase())),
        icon: None,
    }
}

pub fn application(id: &str, name: &str) -> ApplicationRecord {
    ApplicationRecord {
        id: id.into(),
        name: name.into(),
        description: String::new(),
        url: format!("http://{}.lan", name.to_lowercase()),
        icon: DEFAULT_ICON.into(),
    }
}

/// In-memory directory service with switchable failures and call counters.
pub struct FakeDirectory {
    pub auth_ok: AtomicBool,
    pub fetch_ok: AtomicBool,
    authenticated: AtomicBool,
    pub auth_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub records: Mutex<Vec<RemoteRecord>>,
    pub fetch_delay: Duration,
    active_fetches: AtomicUsize,
    pub max_concurrent_fetches: AtomicUsize,
}

impl FakeDirectory {
    pub fn new(records: Vec<RemoteRecord>) -> Self {
        Self {
            auth_ok: AtomicBool::new(true),
            fetch_ok: AtomicBool::new(true),
            authenticated: AtomicBool::new(false),
            auth_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            records: Mutex::new(records),
            fetch_delay: Duration::ZERO,
            active_fetches: AtomicUsize::new(0),
            max_concurrent_fetches: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        let d = Self::new(vec![]);
        d.auth_ok.store(false, Ordering::SeqCst);
        d
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl DirectoryClient for FakeDirectory {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn authenticate(&self) -> BoxFuture<'_, Result<(), RegistryError>> {
        async move {
            self.auth_calls.fetch_add(1, Ordering::SeqCst);
            if self.auth_ok.load(Ordering::SeqCst) {
                self.authenticated.store(true, Ordering::SeqCst);
                Ok(())
            } else {
                self.authenticated.store(false, Ordering::SeqCst);
                Err(RegistryError::Auth("HTTP 400".into()))
            }
        }
        .boxed()
    }

    fn fetch_applications(&self) -> BoxFuture<'_, Result<Vec<RemoteRecord>, RegistryError>> {
        async move {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if !self.is_authenticated() {
                return Err(RegistryError::NotAuthenticated);
            }
            let active = self.active_fetches.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent_fetches.fetch_max(active, Ordering::SeqCst);
            if !self.fetch_delay.is_zero() {
                tokio::time::sleep(self.fetch_delay).await;
            }
            self.active_fetches.fetch_sub(1, Ordering::SeqCst);
            if !self.fetch_ok.load(Ordering::SeqCst) {
                return Err(RegistryError::Status(500));
            }
            let records = self.records.lock().unwrap().clone();
            Ok(records)
        }
        .boxed()
    }

    fn sign_out(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
    }
}
