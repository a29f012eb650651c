// Power estimate derived from CPU load.
// Heuristic only: the figure is not a measurement.

use crate::error::ProbeError;
use crate::host_repo::CpuLoad;
use crate::models::PowerInfo;

/// Idle baseline in watts.
pub const BASE_WATTS: f64 = 20.0;
/// Additional watts per percent of CPU load.
pub const WATTS_PER_LOAD_PERCENT: f64 = 0.8;
pub const ESTIMATE_NOTE: &str = "Estimated based on CPU usage";

/// `round(20 + load * 0.8)` watts; unavailable when the CPU load could not be read.
pub fn estimate_power(cpu: Result<&CpuLoad, &ProbeError>) -> PowerInfo {
    match cpu {
        Ok(load) => PowerInfo {
            available: true,
            estimated_watts: Some(
                (BASE_WATTS + load.usage_percent * WATTS_PER_LOAD_PERCENT).round() as i64,
            ),
            note: Some(ESTIMATE_NOTE.to_string()),
        },
        Err(_) => PowerInfo::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(usage_percent: f64) -> CpuLoad {
        CpuLoad {
            usage_percent,
            core_count: 4,
        }
    }

    #[test]
    fn half_load_is_sixty_watts() {
        let p = estimate_power(Ok(&load(50.0)));
        assert!(p.available);
        assert_eq!(p.estimated_watts, Some(60));
        assert_eq!(p.note.as_deref(), Some(ESTIMATE_NOTE));
    }

    #[test]
    fn idle_and_full_load_bounds() {
        assert_eq!(estimate_power(Ok(&load(0.0))).estimated_watts, Some(20));
        assert_eq!(estimate_power(Ok(&load(100.0))).estimated_watts, Some(100));
    }

    #[test]
    fn fractional_load_rounds_to_nearest_watt() {
        // 20 + 12.3 * 0.8 = 29.84
        assert_eq!(estimate_power(Ok(&load(12.3))).estimated_watts, Some(30));
        // 20 + 1.2 * 0.8 = 20.96
        assert_eq!(estimate_power(Ok(&load(1.2))).estimated_watts, Some(21));
    }

    #[test]
    fn failed_cpu_read_is_unavailable() {
        let err = ProbeError::query("cpu", "boom");
        let p = estimate_power(Err(&err));
        assert!(!p.available);
        assert_eq!(p.estimated_watts, None);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json, serde_json::json!({ "available": false }));
    }
}
