//! Recent activity feed

use chrono::{DateTime, Duration, Utc};
use prospecta_common::types::{ActivityStatus, ActivityType};
use prospecta_storage::models::{EmailTrackingRecord, Prospect, MAX_RECENT_ACTIVITY_HOURS};
use prospecta_storage::repository::ProspectionRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Maximum number of events returned by the feed
pub const MAX_RECENT_ACTIVITY: usize = 10;

const UNKNOWN_PROSPECT: &str = "prospect";

/// A single feed entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Id of the prospect or tracking row the event was derived from
    pub id: Uuid,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub status: ActivityStatus,
}

fn prospect_event(prospect: &Prospect) -> ActivityEvent {
    let name = prospect.name.as_deref().unwrap_or(UNKNOWN_PROSPECT);
    ActivityEvent {
        id: prospect.id,
        activity_type: ActivityType::ProspectAdded,
        description: format!("New prospect added: {}", name),
        timestamp: prospect.created_at,
        status: ActivityStatus::Success,
    }
}

fn tracking_events(row: &EmailTrackingRecord) -> Vec<ActivityEvent> {
    let name = row.prospect_name.as_deref().unwrap_or(UNKNOWN_PROSPECT);
    let sent_status = if row.is_failed() {
        ActivityStatus::Error
    } else {
        ActivityStatus::Success
    };

    let mut events = vec![ActivityEvent {
        id: row.id,
        activity_type: ActivityType::EmailSent,
        description: format!("Email sent to {}", name),
        timestamp: row.sent_at,
        status: sent_status,
    }];

    if let Some(opened_at) = row.opened_at {
        events.push(ActivityEvent {
            id: row.id,
            activity_type: ActivityType::EmailOpened,
            description: format!("Email opened by {}", name),
            timestamp: opened_at,
            status: ActivityStatus::Success,
        });
    }
    if let Some(responded_at) = row.responded_at {
        events.push(ActivityEvent {
            id: row.id,
            activity_type: ActivityType::EmailReplied,
            description: format!("Reply received from {}", name),
            timestamp: responded_at,
            status: ActivityStatus::Success,
        });
    }

    events
}

/// Merge prospect and tracking events, newest first, at most `limit`
pub fn assemble(
    prospects: &[Prospect],
    rows: &[EmailTrackingRecord],
    limit: usize,
) -> Vec<ActivityEvent> {
    let mut events: Vec<ActivityEvent> = prospects
        .iter()
        .map(prospect_event)
        .chain(rows.iter().flat_map(tracking_events))
        .collect();

    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events.truncate(limit);
    events
}

/// Activity assembler
pub struct ActivityAssembler {
    repo: Arc<dyn ProspectionRepository>,
}

impl ActivityAssembler {
    pub fn new(repo: Arc<dyn ProspectionRepository>) -> Self {
        Self { repo }
    }

    /// Events from the last `hours` hours. Datastore failures yield an empty
    /// feed.
    pub async fn recent(&self, hours: i64, now: DateTime<Utc>) -> Vec<ActivityEvent> {
        let start = now - Duration::hours(hours.clamp(1, MAX_RECENT_ACTIVITY_HOURS));

        let result = tokio::try_join!(
            self.repo.prospects_created(start, now),
            self.repo.email_tracking_sent(start, now),
        );

        match result {
            Ok((prospects, rows)) => assemble(&prospects, &rows, MAX_RECENT_ACTIVITY),
            Err(e) => {
                warn!(error = %e, "Failed to load recent activity");
                Vec::new()
            }
        }
    }
}
