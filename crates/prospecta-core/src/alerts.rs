//! Alert Engine
//!
//! Rules are evaluated against freshly computed statistics. Each rule fires
//! at most once per cooldown period; rules do not affect each other.

use crate::stats::AutomationStats;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use prospecta_common::types::AlertSeverity;
use prospecta_storage::models::PerformanceThresholds;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

type Predicate = fn(&AutomationStats, &PerformanceThresholds) -> bool;
type MessageFn = fn(&AutomationStats, &PerformanceThresholds) -> String;

/// A single alert rule
#[derive(Clone)]
pub struct AlertRule {
    pub id: &'static str,
    pub severity: AlertSeverity,
    pub cooldown: Duration,
    pub predicate: Predicate,
    pub message: MessageFn,
}

impl std::fmt::Debug for AlertRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertRule")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .field("cooldown", &self.cooldown)
            .finish()
    }
}

/// Built-in rule table
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule {
            id: "low_open_rate",
            severity: AlertSeverity::Warning,
            cooldown: Duration::minutes(60),
            predicate: |s, t| s.emails_sent >= 10 && s.open_rate < t.open.good,
            message: |s, t| {
                format!(
                    "Open rate {:.1}% is below the {:.1}% target",
                    s.open_rate, t.open.good
                )
            },
        },
        AlertRule {
            id: "low_response_rate",
            severity: AlertSeverity::Warning,
            cooldown: Duration::minutes(120),
            predicate: |s, t| s.emails_sent >= 20 && s.response_rate < t.response.good,
            message: |s, t| {
                format!(
                    "Response rate {:.1}% is below the {:.1}% target",
                    s.response_rate, t.response.good
                )
            },
        },
        AlertRule {
            id: "open_rate_drop",
            severity: AlertSeverity::Warning,
            cooldown: Duration::minutes(60),
            predicate: |s, _| s.open_rate_trend <= -50.0,
            message: |s, _| {
                format!(
                    "Open rate dropped {:.1}% against the previous period",
                    -s.open_rate_trend
                )
            },
        },
        AlertRule {
            id: "no_emails_sent",
            severity: AlertSeverity::Error,
            cooldown: Duration::minutes(240),
            predicate: |s, _| s.emails_sent == 0 && s.pending_emails > 0,
            message: |s, _| {
                format!(
                    "No emails sent while {} scheduled emails are pending",
                    s.pending_emails
                )
            },
        },
        AlertRule {
            id: "excellent_response_rate",
            severity: AlertSeverity::Info,
            cooldown: Duration::minutes(1440),
            predicate: |s, t| s.emails_sent >= 20 && s.response_rate >= t.response.excellent,
            message: |s, _| format!("Response rate is excellent at {:.1}%", s.response_rate),
        },
    ]
}

/// A fired alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub rule_id: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub fired_at: DateTime<Utc>,
}

/// Alert delivery channel
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: &Alert);

    /// Second channel for `error` severity alerts
    async fn escalate(&self, alert: &Alert);
}

/// Delivers alerts as log events
pub struct TracingNotifier;

#[async_trait]
impl AlertNotifier for TracingNotifier {
    async fn notify(&self, alert: &Alert) {
        match alert.severity {
            AlertSeverity::Info => info!(rule = %alert.rule_id, "{}", alert.message),
            AlertSeverity::Warning => warn!(rule = %alert.rule_id, "{}", alert.message),
            AlertSeverity::Error => error!(rule = %alert.rule_id, "{}", alert.message),
        }
    }

    async fn escalate(&self, alert: &Alert) {
        error!(rule = %alert.rule_id, escalated = true, "{}", alert.message);
    }
}

/// Alert engine
pub struct AlertEngine {
    rules: Vec<AlertRule>,
    notifier: Arc<dyn AlertNotifier>,
    last_fired: Mutex<HashMap<&'static str, DateTime<Utc>>>,
}

impl AlertEngine {
    pub fn new(notifier: Arc<dyn AlertNotifier>) -> Self {
        Self::with_rules(default_rules(), notifier)
    }

    pub fn with_rules(rules: Vec<AlertRule>, notifier: Arc<dyn AlertNotifier>) -> Self {
        Self {
            rules,
            notifier,
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    /// Fire every rule whose predicate holds and whose cooldown has elapsed
    pub async fn evaluate(
        &self,
        stats: &AutomationStats,
        thresholds: &PerformanceThresholds,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let mut fired = Vec::new();

        {
            let mut last_fired = self.last_fired.lock().await;
            for rule in &self.rules {
                if !(rule.predicate)(stats, thresholds) {
                    continue;
                }
                let cooled_down = match last_fired.get(rule.id) {
                    Some(last) => now - *last > rule.cooldown,
                    None => true,
                };
                if !cooled_down {
                    continue;
                }

                last_fired.insert(rule.id, now);
                fired.push(Alert {
                    rule_id: rule.id.to_string(),
                    severity: rule.severity,
                    message: (rule.message)(stats, thresholds),
                    fired_at: now,
                });
            }
        }

        for alert in &fired {
            self.notifier.notify(alert).await;
            if alert.severity == AlertSeverity::Error {
                self.notifier.escalate(alert).await;
            }
        }

        fired
    }
}
