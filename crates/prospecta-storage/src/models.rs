//! Datastore models

use chrono::{DateTime, Utc};
use prospecta_common::types::{
    PerformanceLevel, ProspectId, TemplateCategory, TemplateId, TemplatePriority,
};
use prospecta_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Recorded performance of a template, all rates as fractions in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplatePerformance {
    #[serde(default)]
    pub open_rate: f64,
    #[serde(default)]
    pub click_rate: f64,
    #[serde(default)]
    pub response_rate: f64,
    #[serde(default)]
    pub conversion_rate: f64,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Email template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: TemplateId,
    /// Stable human readable key; A/B variants share a key prefix
    pub key: String,
    pub name: String,
    pub subject: String,
    pub body: String,
    /// Declared placeholder names
    pub variables: Vec<String>,
    pub category: TemplateCategory,
    pub priority: TemplatePriority,
    /// Empty means the template applies to every segment
    pub target_segments: Vec<String>,
    pub variant: Option<String>,
    pub is_active: bool,
    pub performance: Option<TemplatePerformance>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailTemplate {
    /// Whether this template applies to the given segment
    pub fn targets_segment(&self, segment: &str) -> bool {
        self.target_segments.is_empty() || self.target_segments.iter().any(|s| s == segment)
    }

    /// Build a copy under a new identity.
    ///
    /// Performance metrics are carried over unchanged.
    pub fn duplicate(&self, id: TemplateId, now: DateTime<Utc>) -> EmailTemplate {
        let suffix = id.simple().to_string();
        EmailTemplate {
            id,
            key: format!("{}_copy_{}", self.key, &suffix[..8]),
            name: format!("{} (copy)", self.name),
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Input for creating a template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplate {
    pub key: String,
    pub name: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub variables: Vec<String>,
    pub category: TemplateCategory,
    #[serde(default)]
    pub priority: TemplatePriority,
    #[serde(default)]
    pub target_segments: Vec<String>,
    pub variant: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl CreateTemplate {
    /// Materialize the template with a fresh identity
    pub fn into_template(self, id: TemplateId, now: DateTime<Utc>) -> EmailTemplate {
        EmailTemplate {
            id,
            key: self.key,
            name: self.name,
            subject: self.subject,
            body: self.body,
            variables: self.variables,
            category: self.category,
            priority: self.priority,
            target_segments: self.target_segments,
            variant: self.variant,
            is_active: self.is_active,
            performance: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial template update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTemplate {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub variables: Option<Vec<String>>,
    pub category: Option<TemplateCategory>,
    pub priority: Option<TemplatePriority>,
    pub target_segments: Option<Vec<String>>,
    pub variant: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateTemplate {
    /// Apply the present fields onto a template
    pub fn apply_to(self, template: &mut EmailTemplate, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            template.name = name;
        }
        if let Some(subject) = self.subject {
            template.subject = subject;
        }
        if let Some(body) = self.body {
            template.body = body;
        }
        if let Some(variables) = self.variables {
            template.variables = variables;
        }
        if let Some(category) = self.category {
            template.category = category;
        }
        if let Some(priority) = self.priority {
            template.priority = priority;
        }
        if let Some(segments) = self.target_segments {
            template.target_segments = segments;
        }
        if let Some(variant) = self.variant {
            template.variant = Some(variant);
        }
        if let Some(active) = self.is_active {
            template.is_active = active;
        }
        template.updated_at = now;
    }
}

/// Template filtering primitives
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateFilter {
    pub category: Option<TemplateCategory>,
    pub priority: Option<TemplatePriority>,
    pub segment: Option<String>,
    pub active: Option<bool>,
}

impl TemplateFilter {
    /// Only active templates
    pub fn active() -> Self {
        Self {
            active: Some(true),
            ..Self::default()
        }
    }

    /// Check a template against every present criterion
    pub fn matches(&self, template: &EmailTemplate) -> bool {
        if let Some(category) = self.category {
            if template.category != category {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if template.priority != priority {
                return false;
            }
        }
        if let Some(segment) = &self.segment {
            if !template.targets_segment(segment) {
                return false;
            }
        }
        if let Some(active) = self.active {
            if template.is_active != active {
                return false;
            }
        }
        true
    }
}

/// Working hours window, "HH:MM" local time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: String,
    pub end: String,
}

/// Excellent/good cut points for a rate, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricThresholds {
    pub excellent: f64,
    pub good: f64,
}

impl MetricThresholds {
    /// Classify a percentage rate
    pub fn classify(&self, rate: f64) -> PerformanceLevel {
        if rate >= self.excellent {
            PerformanceLevel::Excellent
        } else if rate >= self.good {
            PerformanceLevel::Good
        } else {
            PerformanceLevel::Poor
        }
    }
}

/// Per-metric thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceThresholds {
    pub open: MetricThresholds,
    pub response: MetricThresholds,
}

/// Longest accepted statistics timeframe, ten years
pub const MAX_STATS_TIMEFRAME_DAYS: i64 = 3650;

/// Longest accepted inactivity timeout, one week
pub const MAX_ACTIVITY_TIMEOUT_MINUTES: i64 = 7 * 24 * 60;

/// Longest accepted activity feed window, one year
pub const MAX_RECENT_ACTIVITY_HOURS: i64 = 365 * 24;

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Singleton automation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationConfig {
    pub is_active: bool,
    /// Emails per day
    pub daily_limit: u32,
    pub follow_up_delay_hours: u32,
    pub working_hours: WorkingHours,
    pub working_days: Vec<String>,
    pub activity_timeout_minutes: i64,
    pub stats_timeframe_days: i64,
    pub recent_activity_hours: i64,
    pub performance_thresholds: PerformanceThresholds,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            is_active: false,
            daily_limit: 50,
            follow_up_delay_hours: 72,
            working_hours: WorkingHours {
                start: "09:00".to_string(),
                end: "18:00".to_string(),
            },
            working_days: WEEKDAYS[..5].iter().map(|d| d.to_string()).collect(),
            activity_timeout_minutes: 60,
            stats_timeframe_days: 30,
            recent_activity_hours: 24,
            performance_thresholds: PerformanceThresholds {
                open: MetricThresholds {
                    excellent: 25.0,
                    good: 15.0,
                },
                response: MetricThresholds {
                    excellent: 5.0,
                    good: 2.0,
                },
            },
        }
    }
}

impl AutomationConfig {
    /// Produce the full replacement obtained by laying `patch` over `self`
    pub fn merged(&self, patch: &AutomationConfigPatch) -> AutomationConfig {
        let mut next = self.clone();

        if let Some(v) = patch.is_active {
            next.is_active = v;
        }
        if let Some(v) = patch.daily_limit {
            next.daily_limit = v;
        }
        if let Some(v) = patch.follow_up_delay_hours {
            next.follow_up_delay_hours = v;
        }
        if let Some(hours) = &patch.working_hours {
            if let Some(start) = &hours.start {
                next.working_hours.start = start.clone();
            }
            if let Some(end) = &hours.end {
                next.working_hours.end = end.clone();
            }
        }
        if let Some(days) = &patch.working_days {
            next.working_days = days.iter().map(|d| d.to_lowercase()).collect();
        }
        if let Some(v) = patch.activity_timeout_minutes {
            next.activity_timeout_minutes = v;
        }
        if let Some(v) = patch.stats_timeframe_days {
            next.stats_timeframe_days = v;
        }
        if let Some(v) = patch.recent_activity_hours {
            next.recent_activity_hours = v;
        }
        if let Some(thresholds) = &patch.performance_thresholds {
            if let Some(open) = &thresholds.open {
                open.apply_to(&mut next.performance_thresholds.open);
            }
            if let Some(response) = &thresholds.response {
                response.apply_to(&mut next.performance_thresholds.response);
            }
        }

        next
    }

    /// Check field ranges and formats
    pub fn validate(&self) -> Result<()> {
        if self.daily_limit == 0 {
            return Err(Error::Validation("daily_limit must be positive".to_string()));
        }
        check_range("stats_timeframe_days", self.stats_timeframe_days, MAX_STATS_TIMEFRAME_DAYS)?;
        check_range("recent_activity_hours", self.recent_activity_hours, MAX_RECENT_ACTIVITY_HOURS)?;
        check_range(
            "activity_timeout_minutes",
            self.activity_timeout_minutes,
            MAX_ACTIVITY_TIMEOUT_MINUTES,
        )?;

        let start = parse_hhmm(&self.working_hours.start)?;
        let end = parse_hhmm(&self.working_hours.end)?;
        if start >= end {
            return Err(Error::Validation(
                "working_hours.start must be before working_hours.end".to_string(),
            ));
        }

        if let Some(day) = self
            .working_days
            .iter()
            .find(|d| !WEEKDAYS.contains(&d.as_str()))
        {
            return Err(Error::Validation(format!("Invalid working day: {}", day)));
        }

        for (metric, t) in [
            ("open", self.performance_thresholds.open),
            ("response", self.performance_thresholds.response),
        ] {
            if t.good < 0.0 || t.excellent > 100.0 || t.good > t.excellent {
                return Err(Error::Validation(format!(
                    "{} thresholds must satisfy 0 <= good <= excellent <= 100",
                    metric
                )));
            }
        }

        Ok(())
    }
}

fn check_range(field: &str, value: i64, max: i64) -> Result<()> {
    if (1..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{} must be between 1 and {}, got {}",
            field, max, value
        )))
    }
}

fn parse_hhmm(value: &str) -> Result<u32> {
    let invalid = || Error::Validation(format!("Invalid time of day: {}", value));
    let (h, m) = value.split_once(':').ok_or_else(invalid)?;
    let h: u32 = h.parse().map_err(|_| invalid())?;
    let m: u32 = m.parse().map_err(|_| invalid())?;
    if h > 23 || m > 59 {
        return Err(invalid());
    }
    Ok(h * 60 + m)
}

/// Partial configuration update over known fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationConfigPatch {
    pub is_active: Option<bool>,
    pub daily_limit: Option<u32>,
    pub follow_up_delay_hours: Option<u32>,
    pub working_hours: Option<WorkingHoursPatch>,
    pub working_days: Option<Vec<String>>,
    pub activity_timeout_minutes: Option<i64>,
    pub stats_timeframe_days: Option<i64>,
    pub recent_activity_hours: Option<i64>,
    pub performance_thresholds: Option<PerformanceThresholdsPatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkingHoursPatch {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceThresholdsPatch {
    pub open: Option<MetricThresholdsPatch>,
    pub response: Option<MetricThresholdsPatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricThresholdsPatch {
    pub excellent: Option<f64>,
    pub good: Option<f64>,
}

impl MetricThresholdsPatch {
    fn apply_to(&self, target: &mut MetricThresholds) {
        if let Some(v) = self.excellent {
            target.excellent = v;
        }
        if let Some(v) = self.good {
            target.good = v;
        }
    }
}

/// Prospect row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Prospect {
    pub id: ProspectId,
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub segment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Tracking status marking a converted prospect
pub const TRACKING_STATUS_CONVERTED: &str = "converted";

/// Email tracking row joined with the prospect name
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EmailTrackingRecord {
    pub id: Uuid,
    pub prospect_id: Option<ProspectId>,
    pub prospect_name: Option<String>,
    pub template_id: Option<TemplateId>,
    pub subject: Option<String>,
    pub status: String,
    pub sent_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl EmailTrackingRecord {
    pub fn is_converted(&self) -> bool {
        self.status == TRACKING_STATUS_CONVERTED
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "bounced" | "failed")
    }

    /// Latest lifecycle timestamp of this row
    pub fn last_event_at(&self) -> DateTime<Utc> {
        [Some(self.sent_at), self.opened_at, self.responded_at]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(self.sent_at)
    }
}

/// Input for recording a sent email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmailTracking {
    pub prospect_id: Option<ProspectId>,
    pub template_id: Option<TemplateId>,
    pub subject: Option<String>,
    pub status: String,
    pub sent_at: DateTime<Utc>,
}

/// Input for an API usage log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewApiUsageLog {
    pub service: String,
    pub action: String,
    pub success: bool,
    pub status_code: Option<i32>,
    pub latency_ms: i64,
}

/// API usage log row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApiUsageLog {
    pub id: Uuid,
    pub service: String,
    pub action: String,
    pub success: bool,
    pub status_code: Option<i32>,
    pub latency_ms: i64,
    pub created_at: DateTime<Utc>,
}
