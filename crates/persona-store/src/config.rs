//! Configuration for store connections.

use std::time::Duration;

/// Tuning for one managed store connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Timeout for a single connect attempt.
    pub connect_timeout: Duration,
    /// Connect attempts made inside one `acquire` before giving up.
    pub connect_attempts: u32,
    /// Delay after the first failed connect attempt; doubles per attempt.
    pub connect_retry_base: Duration,
    /// Upper bound on the delay between connect attempts.
    pub connect_retry_cap: Duration,
    /// How long a failed connection is left alone before the next attempt.
    pub cooldown: Duration,
    /// Timeout applied to every command on an established connection.
    pub op_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            connect_attempts: 3,
            connect_retry_base: Duration::from_millis(100),
            connect_retry_cap: Duration::from_secs(1),
            cooldown: Duration::from_secs(5),
            op_timeout: Duration::from_secs(2),
        }
    }
}

impl StoreConfig {
    /// Set the per-attempt connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the number of connect attempts per acquire.
    pub fn with_connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts;
        self
    }

    /// Set the cooldown window.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the command timeout.
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Set the delay schedule between connect attempts.
    pub fn with_connect_retry(mut self, base: Duration, cap: Duration) -> Self {
        self.connect_retry_base = base;
        self.connect_retry_cap = cap;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = StoreConfig::default()
            .with_connect_attempts(5)
            .with_cooldown(Duration::from_secs(2))
            .with_connect_timeout(Duration::from_millis(500));

        assert_eq!(config.connect_attempts, 5);
        assert_eq!(config.cooldown, Duration::from_secs(2));
        assert_eq!(config.connect_timeout, Duration::from_millis(500));
        assert_eq!(config.op_timeout, Duration::from_secs(2));
    }
}
