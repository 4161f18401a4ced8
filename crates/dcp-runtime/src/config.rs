//! Coordinator configuration

use std::time::Duration;

use dcp_core::{DcpError, DcpResult, Ring};

/// Coordinator configuration
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Number of processes in the system, fixed for its lifetime
    pub max_processes: usize,
    /// Pause before forwarding a token this process does not need.
    /// `None` forwards immediately.
    pub hop_delay: Option<Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            max_processes: 3,
            hop_delay: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_processes(max_processes: usize) -> Self {
        CoordinatorConfig {
            max_processes,
            ..Self::default()
        }
    }

    /// Slow the ring down so an idle token does not spin a core
    pub fn paced(max_processes: usize, hop_delay: Duration) -> Self {
        CoordinatorConfig {
            max_processes,
            hop_delay: Some(hop_delay),
        }
    }

    pub fn validate(&self) -> DcpResult<()> {
        if self.max_processes == 0 {
            return Err(DcpError::InvalidConfig(
                "max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn ring(&self) -> DcpResult<Ring> {
        self.validate()?;
        Ring::new(self.max_processes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.max_processes, 3);
        assert!(config.hop_delay.is_none());
        assert_eq!(config.ring().unwrap().size(), 3);
    }

    #[test]
    fn test_zero_processes_rejected() {
        let config = CoordinatorConfig::with_processes(0);
        assert!(matches!(config.validate(), Err(DcpError::InvalidConfig(_))));
        assert!(config.ring().is_err());
    }

    #[test]
    fn test_paced_config() {
        let config = CoordinatorConfig::paced(5, Duration::from_millis(20));
        assert_eq!(config.max_processes, 5);
        assert_eq!(config.hop_delay, Some(Duration::from_millis(20)));
    }
}
