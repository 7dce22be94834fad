//! Health reporting for managed store connections.

use crate::manager::ConnectionState;
use crate::metrics::MetricsSnapshot;

/// Health status of a store connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Connected and error-free.
    Healthy,
    /// Usable, but failures have been recorded.
    Degraded { reason: String },
    /// Not currently usable.
    Unhealthy { reason: String },
    /// No store configured for this connection.
    Disabled,
}

impl HealthStatus {
    /// Check if the status is healthy.
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Check if the connection is operational (healthy or degraded).
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded { .. } => "degraded",
            HealthStatus::Unhealthy { .. } => "unhealthy",
            HealthStatus::Disabled => "disabled",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            HealthStatus::Degraded { reason } | HealthStatus::Unhealthy { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Health check result with details.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub connection: String,
    pub status: HealthStatus,
    pub state: ConnectionState,
    pub connect_attempts: u64,
    pub cooldowns: u64,
    pub op_failures: u64,
}

impl HealthCheck {
    /// Derive a health check from the connection state and its metrics.
    pub fn from_state(
        connection: &str,
        configured: bool,
        state: ConnectionState,
        snapshot: MetricsSnapshot,
    ) -> Self {
        let status = if !configured {
            HealthStatus::Disabled
        } else {
            match state {
                ConnectionState::Connected if snapshot.op_failures > 0 => HealthStatus::Degraded {
                    reason: format!("{} command failures recorded", snapshot.op_failures),
                },
                ConnectionState::Connected => HealthStatus::Healthy,
                // Lazily connected: nothing has gone wrong yet.
                ConnectionState::Disconnected if snapshot.connect_failures == 0 => {
                    HealthStatus::Healthy
                }
                ConnectionState::Disconnected => HealthStatus::Degraded {
                    reason: "Disconnected after earlier failures".to_string(),
                },
                ConnectionState::Connecting => HealthStatus::Degraded {
                    reason: "Connection attempt in progress".to_string(),
                },
                ConnectionState::Cooldown => HealthStatus::Unhealthy {
                    reason: "Store unavailable, cooling down".to_string(),
                },
            }
        };

        Self {
            connection: connection.to_string(),
            status,
            state,
            connect_attempts: snapshot.connect_attempts,
            cooldowns: snapshot.cooldowns,
            op_failures: snapshot.op_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_is_disabled() {
        let check = HealthCheck::from_state(
            "cache",
            false,
            ConnectionState::Disconnected,
            MetricsSnapshot::default(),
        );
        assert_eq!(check.status, HealthStatus::Disabled);
        assert!(!check.status.is_operational());
    }

    #[test]
    fn test_cooldown_is_unhealthy() {
        let check = HealthCheck::from_state(
            "tracking",
            true,
            ConnectionState::Cooldown,
            MetricsSnapshot::default(),
        );
        assert_eq!(check.status.label(), "unhealthy");
        assert!(check.status.reason().is_some());
    }

    #[test]
    fn test_connected_with_failures_is_degraded() {
        let snapshot = MetricsSnapshot {
            op_failures: 2,
            ..Default::default()
        };
        let check = HealthCheck::from_state("cache", true, ConnectionState::Connected, snapshot);
        assert!(check.status.is_operational());
        assert!(!check.status.is_healthy());
    }
}
