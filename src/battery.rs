// Battery probe: scrapes `acpi -b` output.
// Any failure (tool missing, no battery, timeout) reports the battery as unavailable.

use crate::error::ProbeError;
use crate::models::{BatteryInfo, BatteryReading, BatteryStatus};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)%").expect("percentage pattern"));
static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Battery [0-9]+: (.*?),").expect("status pattern"));
static HMS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{2}:[0-9]{2}:[0-9]{2}").expect("remaining time pattern"));

/// Narrow battery capability so the platform-specific scraping can be swapped out.
pub trait BatteryProbe: Send + Sync {
    /// Never fails: errors degrade to `BatteryInfo::unavailable()`.
    fn probe_battery(&self) -> BoxFuture<'_, BatteryInfo>;
}

/// Runs an acpi-style command and parses its line-oriented output.
#[derive(Debug, Clone)]
pub struct AcpiBatteryProbe {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl AcpiBatteryProbe {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    async fn run_command(&self) -> Result<String, ProbeError> {
        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.args(&self.args).kill_on_drop(true);
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ProbeError::Timeout {
                probe: "battery",
                timeout: self.timeout,
            })?
            .map_err(|source| ProbeError::Command {
                command: self.command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(ProbeError::CommandStatus {
                command: self.command.clone(),
                status: output.status.to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl BatteryProbe for AcpiBatteryProbe {
    fn probe_battery(&self) -> BoxFuture<'_, BatteryInfo> {
        async move {
            match self.run_command().await {
                Ok(stdout) => parse_acpi_battery(&stdout),
                Err(e) => {
                    debug!(error = %e, operation = "probe_battery", "battery info not available");
                    BatteryInfo::unavailable()
                }
            }
        }
        .boxed()
    }
}

/// Parse `acpi -b` output. Output without the token "Battery" means no battery.
pub fn parse_acpi_battery(output: &str) -> BatteryInfo {
    let text = output.trim();
    if !text.contains("Battery") {
        return BatteryInfo::unavailable();
    }
    let status = parse_status(text)
        .map(BatteryStatus::from_acpi)
        .unwrap_or(BatteryStatus::Unknown);
    BatteryInfo::present(BatteryReading {
        percentage: parse_percentage(text).unwrap_or(0),
        status,
        time_remaining: parse_hms(text).map(str::to_string),
        is_charging: text.contains("Charging"),
        is_discharging: text.contains("Discharging"),
    })
}

fn parse_percentage(text: &str) -> Option<u32> {
    PERCENT_RE.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Text between "Battery <n>: " and the next comma on the same line.
fn parse_status(text: &str) -> Option<&str> {
    Some(STATUS_RE.captures(text)?.get(1)?.as_str())
}

fn parse_hms(text: &str) -> Option<&str> {
    Some(HMS_RE.find(text)?.as_str())
}
