//! Statistics Aggregator
//!
//! Computes window metrics over the prospection datastore. With a timeframe
//! of `T` days the current window is `[now - T, now)` and the previous one is
//! `[now - 2T, now - T)`; trends compare the two.

use chrono::{DateTime, Duration, Utc};
use prospecta_common::Result;
use prospecta_storage::models::{EmailTrackingRecord, MAX_STATS_TIMEFRAME_DAYS};
use prospecta_storage::repository::ProspectionRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// `numerator / sent` as a percentage, 0 when nothing was sent
pub fn rate(numerator: i64, sent: i64) -> f64 {
    if sent > 0 {
        numerator as f64 / sent as f64 * 100.0
    } else {
        0.0
    }
}

/// Percentage change from `previous` to `current`
pub fn trend(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Raw counts for a single window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodMetrics {
    pub prospects_added: i64,
    pub sent: i64,
    pub opened: i64,
    pub responded: i64,
    pub converted: i64,
}

impl PeriodMetrics {
    pub fn from_rows(prospects_added: i64, rows: &[EmailTrackingRecord]) -> Self {
        Self {
            prospects_added,
            sent: rows.len() as i64,
            opened: rows.iter().filter(|r| r.opened_at.is_some()).count() as i64,
            responded: rows.iter().filter(|r| r.responded_at.is_some()).count() as i64,
            converted: rows.iter().filter(|r| r.is_converted()).count() as i64,
        }
    }

    pub fn open_rate(&self) -> f64 {
        rate(self.opened, self.sent)
    }

    pub fn response_rate(&self) -> f64 {
        rate(self.responded, self.sent)
    }

    pub fn conversion_rate(&self) -> f64 {
        rate(self.converted, self.sent)
    }
}

/// Aggregated automation statistics; rates are percentages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationStats {
    pub prospects_added: i64,
    pub emails_sent: i64,
    pub emails_opened: i64,
    pub responses: i64,
    pub conversions: i64,
    pub open_rate: f64,
    pub response_rate: f64,
    pub conversion_rate: f64,
    pub active_sequences: i64,
    pub pending_emails: i64,
    pub prospects_trend: f64,
    pub emails_trend: f64,
    pub open_rate_trend: f64,
    pub response_rate_trend: f64,
    pub timeframe_days: i64,
    pub generated_at: DateTime<Utc>,
}

impl AutomationStats {
    /// All-zero statistics, used when the datastore cannot be read
    pub fn empty(timeframe_days: i64, now: DateTime<Utc>) -> Self {
        Self::from_periods(
            PeriodMetrics::default(),
            PeriodMetrics::default(),
            0,
            0,
            timeframe_days,
            now,
        )
    }

    pub fn from_periods(
        current: PeriodMetrics,
        previous: PeriodMetrics,
        active_sequences: i64,
        pending_emails: i64,
        timeframe_days: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            prospects_added: current.prospects_added,
            emails_sent: current.sent,
            emails_opened: current.opened,
            responses: current.responded,
            conversions: current.converted,
            open_rate: current.open_rate(),
            response_rate: current.response_rate(),
            conversion_rate: current.conversion_rate(),
            active_sequences,
            pending_emails,
            prospects_trend: trend(
                current.prospects_added as f64,
                previous.prospects_added as f64,
            ),
            emails_trend: trend(current.sent as f64, previous.sent as f64),
            open_rate_trend: trend(current.open_rate(), previous.open_rate()),
            response_rate_trend: trend(current.response_rate(), previous.response_rate()),
            timeframe_days,
            generated_at: now,
        }
    }
}

/// Statistics aggregator
pub struct StatsAggregator {
    repo: Arc<dyn ProspectionRepository>,
}

impl StatsAggregator {
    pub fn new(repo: Arc<dyn ProspectionRepository>) -> Self {
        Self { repo }
    }

    async fn period(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<PeriodMetrics> {
        let (prospects, rows) = tokio::try_join!(
            self.repo.count_prospects_created(start, end),
            self.repo.email_tracking_sent(start, end),
        )?;
        Ok(PeriodMetrics::from_rows(prospects, &rows))
    }

    /// Compute statistics for the `timeframe_days` window ending at `now`
    pub async fn compute(&self, timeframe_days: i64, now: DateTime<Utc>) -> Result<AutomationStats> {
        let days = timeframe_days.clamp(1, MAX_STATS_TIMEFRAME_DAYS);
        let current_start = now - Duration::days(days);
        let previous_start = current_start - Duration::days(days);

        let (current, previous, active_sequences, pending_emails) = tokio::try_join!(
            self.period(current_start, now),
            self.period(previous_start, current_start),
            self.repo.count_active_sequences(),
            self.repo.count_pending_scheduled_emails(),
        )?;

        debug!(
            timeframe_days = days,
            sent = current.sent,
            previous_sent = previous.sent,
            "Statistics computed"
        );

        Ok(AutomationStats::from_periods(
            current,
            previous,
            active_sequences,
            pending_emails,
            days,
            now,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use prospecta_storage::InMemoryStore;
    use uuid::Uuid;

    fn row(sent_at: DateTime<Utc>, opened: bool, responded: bool, status: &str) -> EmailTrackingRecord {
        EmailTrackingRecord {
            id: Uuid::new_v4(),
            prospect_id: None,
            prospect_name: None,
            template_id: None,
            subject: None,
            status: status.to_string(),
            sent_at,
            opened_at: opened.then_some(sent_at),
            responded_at: responded.then_some(sent_at),
        }
    }

    #[test]
    fn test_rate_zero_sent() {
        assert_eq!(rate(5, 0), 0.0);
        assert_eq!(rate(1, 4), 25.0);
    }

    #[test]
    fn test_trend_cases() {
        assert_eq!(trend(0.0, 0.0), 0.0);
        assert_eq!(trend(3.0, 0.0), 100.0);
        assert_eq!(trend(10.0, 5.0), 100.0);
        assert_eq!(trend(5.0, 10.0), -50.0);
    }

    #[test]
    fn test_empty_stats() {
        let stats = AutomationStats::empty(30, Utc::now());
        assert_eq!(stats.emails_sent, 0);
        assert_eq!(stats.open_rate, 0.0);
        assert_eq!(stats.emails_trend, 0.0);
        assert_eq!(stats.timeframe_days, 30);
    }

    #[tokio::test]
    async fn test_compute_windows_and_rates() {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        let day = Duration::days(1);

        // current window
        store.add_prospect(Some("Ana"), now - Duration::hours(2)).await;
        store.add_prospect(Some("Bo"), now - day * 7).await;
        store.add_email_tracking(row(now - Duration::hours(1), true, true, "converted")).await;
        store.add_email_tracking(row(now - day, true, false, "sent")).await;
        store.add_email_tracking(row(now - day * 2, false, false, "sent")).await;
        store.add_email_tracking(row(now - day * 3, false, false, "sent")).await;

        // previous window
        store.add_prospect(Some("Cy"), now - day * 40).await;
        store.add_email_tracking(row(now - day * 45, true, false, "sent")).await;
        store.add_email_tracking(row(now - day * 50, false, false, "sent")).await;

        store.set_active_sequences(3).await;
        store.set_pending_emails(7).await;

        let stats = StatsAggregator::new(store).compute(30, now).await.unwrap();

        assert_eq!(stats.prospects_added, 2);
        assert_eq!(stats.emails_sent, 4);
        assert_eq!(stats.emails_opened, 2);
        assert_eq!(stats.responses, 1);
        assert_eq!(stats.conversions, 1);
        assert_eq!(stats.open_rate, 50.0);
        assert_eq!(stats.response_rate, 25.0);
        assert_eq!(stats.conversion_rate, 25.0);
        assert_eq!(stats.active_sequences, 3);
        assert_eq!(stats.pending_emails, 7);
        assert_eq!(stats.prospects_trend, 100.0);
        assert_eq!(stats.emails_trend, 100.0);
        assert_eq!(stats.open_rate_trend, 0.0);
        assert_eq!(stats.response_rate_trend, 100.0);
    }

    #[tokio::test]
    async fn test_window_boundaries() {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        let t = Duration::days(30);

        store.add_email_tracking(row(now - t, false, false, "sent")).await;
        store.add_email_tracking(row(now - t * 2, false, false, "sent")).await;
        store.add_email_tracking(row(now, false, false, "sent")).await;

        let aggregator = StatsAggregator::new(store);
        let stats = aggregator.compute(30, now).await.unwrap();

        // now - T belongs to current only, now - 2T to previous, now to neither
        assert_eq!(stats.emails_sent, 1);
        assert_eq!(stats.emails_trend, 0.0);
    }

    #[tokio::test]
    async fn test_oversized_timeframe_is_clamped() {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        store.add_email_tracking(row(now - Duration::days(3000), false, false, "sent")).await;

        let stats = StatsAggregator::new(store)
            .compute(i64::MAX, now)
            .await
            .unwrap();

        assert_eq!(stats.timeframe_days, MAX_STATS_TIMEFRAME_DAYS);
        assert_eq!(stats.emails_sent, 1);
    }

    #[tokio::test]
    async fn test_compute_propagates_datastore_error() {
        let store = Arc::new(InMemoryStore::new());
        store.set_available(false);
        let result = StatsAggregator::new(store).compute(30, Utc::now()).await;
        assert!(result.is_err());
    }
}
