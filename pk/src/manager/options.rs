//! Prompt manager options

use std::sync::Arc;
use std::time::Duration;

use crate::error::PromptError;
use crate::local::LocalSource;

/// Shortest allowed background refresh period
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Default background refresh period
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Default timeout for the first fetch and for each refresh
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for a `PromptManager`
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Period between background refreshes
    pub refresh_interval: Duration,

    /// Whether latest/undeployed managers refresh in the background
    pub refresh_enabled: bool,

    /// Timeout for the fetch performed by `start()`
    pub init_timeout: Duration,

    /// Timeout for each background fetch
    pub refresh_timeout: Duration,

    /// Consulted before any network fetch
    pub local_override: Option<Arc<dyn LocalSource>>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            refresh_enabled: true,
            init_timeout: DEFAULT_FETCH_TIMEOUT,
            refresh_timeout: DEFAULT_FETCH_TIMEOUT,
            local_override: None,
        }
    }
}

impl ManagerOptions {
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_refresh_enabled(mut self, enabled: bool) -> Self {
        self.refresh_enabled = enabled;
        self
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn with_local_override(mut self, source: Arc<dyn LocalSource>) -> Self {
        self.local_override = Some(source);
        self
    }

    /// Reject values the manager cannot run with
    pub fn validate(&self) -> Result<(), PromptError> {
        if self.refresh_interval < MIN_REFRESH_INTERVAL {
            return Err(PromptError::InvalidOptions(format!(
                "refresh interval {:?} is below the minimum of {:?}",
                self.refresh_interval, MIN_REFRESH_INTERVAL
            )));
        }
        if self.init_timeout.is_zero() || self.refresh_timeout.is_zero() {
            return Err(PromptError::InvalidOptions("fetch timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::InMemorySource;

    #[test]
    fn test_defaults() {
        let options = ManagerOptions::default();
        assert_eq!(options.refresh_interval, Duration::from_secs(10));
        assert!(options.refresh_enabled);
        assert_eq!(options.init_timeout, Duration::from_secs(30));
        assert_eq!(options.refresh_timeout, Duration::from_secs(30));
        assert!(options.local_override.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_minimum_interval() {
        let options = ManagerOptions::default().with_refresh_interval(Duration::from_millis(999));
        assert!(matches!(options.validate(), Err(PromptError::InvalidOptions(_))));

        let options = ManagerOptions::default().with_refresh_interval(Duration::from_secs(1));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let options = ManagerOptions::default().with_refresh_timeout(Duration::ZERO);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let options = ManagerOptions::default()
            .with_refresh_enabled(false)
            .with_init_timeout(Duration::from_secs(2))
            .with_local_override(Arc::new(InMemorySource::new()));
        assert!(!options.refresh_enabled);
        assert_eq!(options.init_timeout, Duration::from_secs(2));
        assert!(options.local_override.is_some());
    }
}
