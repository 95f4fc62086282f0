//! Response DTOs for the caller-facing API
//!
//! Display-ready views over cache statistics.

use serde::Serialize;

use crate::cache::CacheStats;

/// Coarse health label shown alongside the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Score of 80 or more
    Healthy,
    /// Score from 50 to 79
    Degraded,
    /// Score below 50
    Critical,
}

impl HealthStatus {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => HealthStatus::Healthy,
            50..=79 => HealthStatus::Degraded,
            _ => HealthStatus::Critical,
        }
    }
}

/// Cache health as shown to the user
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Score from 0 to 100
    pub score: u8,
    /// Label derived from the score
    pub status: HealthStatus,
    /// Whether the background sync timer is installed
    pub sync_running: bool,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// The statistics the score was computed from
    pub stats: CacheStats,
}

impl HealthReport {
    /// Creates a report from a statistics snapshot.
    pub fn new(stats: CacheStats, sync_running: bool) -> Self {
        let score = stats.health_score();
        Self {
            score,
            status: HealthStatus::from_score(score),
            sync_running,
            timestamp: chrono::Utc::now().to_rfc3339(),
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_thresholds() {
        assert_eq!(HealthStatus::from_score(100), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_score(80), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_score(79), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_score(50), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_score(0), HealthStatus::Critical);
    }

    #[test]
    fn test_health_report_serialize() {
        let stats = CacheStats {
            total: 10,
            expired: 10,
            ..CacheStats::default()
        };
        let report = HealthReport::new(stats, true);
        let json = serde_json::to_string(&report).unwrap();

        assert_eq!(report.score, 0);
        assert!(json.contains("\"status\":\"critical\""));
        assert!(json.contains("timestamp"));
        assert!(json.contains("\"sync_running\":true"));
    }
}
