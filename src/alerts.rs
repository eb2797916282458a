//! Operational alerting.
//!
//! Fire-and-forget: callers never handle an alert failure. The default
//! sink maps severities onto the `log` facade; deployments wanting Slack or
//! pager delivery implement [`Alerter`] and inject it at construction.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub severity: Severity,
    pub title: String,
    pub details: String,
    pub error: Option<String>,
    pub suggested_action: Option<String>,
}

pub trait Alerter: Send + Sync {
    fn send(&self, alert: Alert);
}

/// Alert sink backed by the process log.
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn send(&self, alert: Alert) {
        let error_part = alert
            .error
            .as_deref()
            .map(|e| format!(" error={}", e))
            .unwrap_or_default();
        let action_part = alert
            .suggested_action
            .as_deref()
            .map(|a| format!(" suggested: {}", a))
            .unwrap_or_default();
        match alert.severity {
            Severity::Info => {
                log::info!("[alert] {}: {}{}{}", alert.title, alert.details, error_part, action_part)
            }
            Severity::Warning => {
                log::warn!("[alert] {}: {}{}{}", alert.title, alert.details, error_part, action_part)
            }
            Severity::Critical => {
                log::error!("[alert] {}: {}{}{}", alert.title, alert.details, error_part, action_part)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use std::sync::Mutex;

    /// Captures alerts for assertions.
    pub(crate) struct CapturingAlerter {
        pub sent: Mutex<Vec<Alert>>,
    }

    impl CapturingAlerter {
        pub fn new() -> Self {
            CapturingAlerter {
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn count(&self) -> usize {
            self.sent.lock().map(|g| g.len()).unwrap_or(0)
        }
    }

    impl Alerter for CapturingAlerter {
        fn send(&self, alert: Alert) {
            if let Ok(mut guard) = self.sent.lock() {
                guard.push(alert);
            }
        }
    }
}
