//! Common types for Prospecta

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for email templates
pub type TemplateId = Uuid;

/// Unique identifier for prospects
pub type ProspectId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Logical id of the singleton automation configuration row
pub const AUTOMATION_CONFIG_ID: &str = "main";

/// Email template category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Introduction,
    FollowUp,
    Proposal,
    Nurturing,
    Closing,
    Reactivation,
}

impl std::fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateCategory::Introduction => write!(f, "introduction"),
            TemplateCategory::FollowUp => write!(f, "follow_up"),
            TemplateCategory::Proposal => write!(f, "proposal"),
            TemplateCategory::Nurturing => write!(f, "nurturing"),
            TemplateCategory::Closing => write!(f, "closing"),
            TemplateCategory::Reactivation => write!(f, "reactivation"),
        }
    }
}

impl std::str::FromStr for TemplateCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "introduction" => Ok(TemplateCategory::Introduction),
            "follow_up" => Ok(TemplateCategory::FollowUp),
            "proposal" => Ok(TemplateCategory::Proposal),
            "nurturing" => Ok(TemplateCategory::Nurturing),
            "closing" => Ok(TemplateCategory::Closing),
            "reactivation" => Ok(TemplateCategory::Reactivation),
            _ => Err(format!("Invalid template category: {}", s)),
        }
    }
}

/// Email template priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplatePriority {
    Low,
    Medium,
    High,
}

impl TemplatePriority {
    /// Ordering weight, higher wins
    pub fn rank(self) -> u8 {
        match self {
            TemplatePriority::Low => 1,
            TemplatePriority::Medium => 2,
            TemplatePriority::High => 3,
        }
    }
}

impl Default for TemplatePriority {
    fn default() -> Self {
        TemplatePriority::Medium
    }
}

impl std::fmt::Display for TemplatePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplatePriority::Low => write!(f, "low"),
            TemplatePriority::Medium => write!(f, "medium"),
            TemplatePriority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for TemplatePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TemplatePriority::Low),
            "medium" => Ok(TemplatePriority::Medium),
            "high" => Ok(TemplatePriority::High),
            _ => Err(format!("Invalid template priority: {}", s)),
        }
    }
}

/// Kind of a recent activity event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    ProspectAdded,
    EmailSent,
    EmailOpened,
    EmailReplied,
}

/// Outcome classification of a recent activity event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Success,
    Warning,
    Error,
}

/// Derived automation health state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Active,
    Idle,
    Paused,
    Error,
    Disconnected,
}

impl HealthStatus {
    /// Display color used by the dashboard
    pub fn color(self) -> &'static str {
        match self {
            HealthStatus::Active => "green",
            HealthStatus::Idle => "blue",
            HealthStatus::Paused => "yellow",
            HealthStatus::Error | HealthStatus::Disconnected => "red",
        }
    }

    /// Human readable label
    pub fn label(self) -> &'static str {
        match self {
            HealthStatus::Active => "Automation active",
            HealthStatus::Idle => "Idle - no recent activity",
            HealthStatus::Paused => "Automation paused",
            HealthStatus::Error => "Automation error",
            HealthStatus::Disconnected => "Disconnected",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Active => write!(f, "active"),
            HealthStatus::Idle => write!(f, "idle"),
            HealthStatus::Paused => write!(f, "paused"),
            HealthStatus::Error => write!(f, "error"),
            HealthStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
}

/// Classification of a rate against configured thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Poor,
}

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;
