//! Liveness report: database reachability plus a memory usage sample.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;

#[async_trait]
pub trait DatabaseProbe: Send + Sync {
    async fn ping(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl MemorySample {
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

pub trait MemoryProbe: Send + Sync {
    fn sample(&self) -> Option<MemorySample>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    pub database: ComponentHealth,
    pub memory: ComponentHealth,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
}

impl HealthReport {
    /// Only a failed database check makes the service unavailable.
    pub fn is_available(&self) -> bool {
        self.checks.database.status == HealthStatus::Healthy
    }
}

#[derive(Clone)]
pub struct HealthService {
    database: Arc<dyn DatabaseProbe>,
    memory: Arc<dyn MemoryProbe>,
    memory_warning_percent: f64,
    started_at: Instant,
}

impl HealthService {
    pub fn new(
        database: Arc<dyn DatabaseProbe>,
        memory: Arc<dyn MemoryProbe>,
        memory_warning_percent: f64,
    ) -> Self {
        Self {
            database,
            memory,
            memory_warning_percent,
            started_at: Instant::now(),
        }
    }

    pub async fn report(&self) -> HealthReport {
        let started = Instant::now();
        let database = match self.database.ping().await {
            Ok(()) => ComponentHealth {
                status: HealthStatus::Healthy,
                latency_ms: Some(started.elapsed().as_millis() as u64),
                used_percent: None,
                error: None,
            },
            Err(err) => {
                warn!(target = "menuqr::health", error = %err, "database health check failed");
                ComponentHealth {
                    status: HealthStatus::Unhealthy,
                    latency_ms: None,
                    used_percent: None,
                    error: Some("database unreachable".to_string()),
                }
            }
        };

        let memory = match self.memory.sample() {
            Some(sample) => {
                let used = sample.used_percent();
                ComponentHealth {
                    status: if used >= self.memory_warning_percent {
                        HealthStatus::Degraded
                    } else {
                        HealthStatus::Healthy
                    },
                    latency_ms: None,
                    used_percent: Some((used * 10.0).round() / 10.0),
                    error: None,
                }
            }
            None => ComponentHealth {
                status: HealthStatus::Degraded,
                latency_ms: None,
                used_percent: None,
                error: Some("memory usage unavailable".to_string()),
            },
        };

        let status = match (database.status, memory.status) {
            (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
            (_, HealthStatus::Healthy) => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        };

        HealthReport {
            status,
            timestamp: OffsetDateTime::now_utc(),
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            checks: HealthChecks { database, memory },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Db(bool);

    #[async_trait]
    impl DatabaseProbe for Db {
        async fn ping(&self) -> Result<(), String> {
            if self.0 {
                Ok(())
            } else {
                Err("connection refused".into())
            }
        }
    }

    struct Memory(u64);

    impl MemoryProbe for Memory {
        fn sample(&self) -> Option<MemorySample> {
            Some(MemorySample {
                used_bytes: self.0,
                total_bytes: 100,
            })
        }
    }

    fn service(db_ok: bool, used: u64) -> HealthService {
        HealthService::new(Arc::new(Db(db_ok)), Arc::new(Memory(used)), 90.0)
    }

    #[tokio::test]
    async fn healthy_when_everything_passes() {
        let report = service(true, 40).report().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.is_available());
    }

    #[tokio::test]
    async fn memory_pressure_only_degrades() {
        let report = service(true, 95).report().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.is_available());
    }

    #[tokio::test]
    async fn database_failure_is_unavailable() {
        let report = service(false, 10).report().await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(!report.is_available());
        assert_eq!(
            report.checks.database.error.as_deref(),
            Some("database unreachable")
        );
    }
}
