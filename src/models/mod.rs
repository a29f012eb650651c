// Domain models

mod application;
mod telemetry;

pub use application::{ApplicationRecord, ConnectionState, DEFAULT_ICON, RegistryView};
pub use telemetry::{
    BatteryInfo, BatteryReading, BatteryStatus, CpuInfo, FilesystemUsage, MemoryInfo, OsInfo,
    PowerInfo, TelemetrySnapshot, TemperatureInfo, Uptime,
};
