// Telemetry snapshot models (JSON shape served by GET /api/system)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuInfo {
    pub usage_percent: u32,
    pub core_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    #[serde(rename = "totalGiB")]
    pub total_gib: u64,
    #[serde(rename = "usedGiB")]
    pub used_gib: u64,
    pub usage_percent: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureInfo {
    pub available: bool,
    pub cpu_celsius: Option<i64>,
    pub per_core_celsius: Vec<i64>,
}

/// Heuristic power draw. The figure is derived from CPU load, not measured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerInfo {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_watts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemUsage {
    pub filesystem_id: String,
    #[serde(rename = "sizeGiB")]
    pub size_gib: u64,
    #[serde(rename = "usedGiB")]
    pub used_gib: u64,
    pub usage_percent: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uptime {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
}

impl Uptime {
    /// Truncating split of seconds-since-boot into days / hours / minutes.
    pub fn from_secs(secs: u64) -> Self {
        Self {
            days: secs / 86_400,
            hours: (secs % 86_400) / 3_600,
            minutes: (secs % 3_600) / 60,
        }
    }
}

/// Battery state as reported by `acpi`; serializes to the text acpi prints (e.g. "Discharging").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryStatus {
    Charging,
    Discharging,
    Full,
    #[serde(rename = "Not charging")]
    NotCharging,
    #[serde(other)]
    Unknown,
}

impl BatteryStatus {
    /// Parse the status field of an acpi battery line (e.g. "Discharging", "Not charging").
    pub fn from_acpi(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "charging" => BatteryStatus::Charging,
            "discharging" => BatteryStatus::Discharging,
            "full" => BatteryStatus::Full,
            "not charging" => BatteryStatus::NotCharging,
            _ => BatteryStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryReading {
    pub percentage: u32,
    pub status: BatteryStatus,
    pub time_remaining: Option<String>,
    pub is_charging: bool,
    pub is_discharging: bool,
}

/// `{available:false}` when no battery is present; otherwise the reading fields sit beside
/// `available`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryInfo {
    pub available: bool,
    #[serde(flatten)]
    pub reading: Option<BatteryReading>,
}

impl BatteryInfo {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn present(reading: BatteryReading) -> Self {
        Self {
            available: true,
            reading: Some(reading),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    pub platform: String,
    pub distro: String,
    pub hostname: String,
}

/// One complete telemetry reading. Replaced wholesale on every collection cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub temperature: TemperatureInfo,
    pub power: PowerInfo,
    pub storage: Vec<FilesystemUsage>,
    pub uptime: Uptime,
    pub battery: BatteryInfo,
    pub os: OsInfo,
    /// RFC 3339 (UTC, millisecond precision) time the cycle completed.
    pub last_update: String,
}
