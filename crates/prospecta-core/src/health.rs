//! System Health Monitor
//!
//! Health is derived on demand from connectivity probes, the reported error
//! flag, and the automation state; it is never persisted. The latest snapshot
//! is published on a `watch` channel and served to readers between polls.

use crate::workflow::WorkflowClient;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use prospecta_common::types::HealthStatus;
use prospecta_storage::models::MAX_ACTIVITY_TIMEOUT_MINUTES;
use prospecta_storage::repository::ProspectionRepository;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Best-effort reachability probe
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn check(&self) -> bool;
}

#[async_trait]
impl ConnectivityProbe for WorkflowClient {
    async fn check(&self) -> bool {
        self.health_check().await
    }
}

/// Inputs to health derivation
#[derive(Debug, Clone, Default)]
pub struct HealthInputs {
    pub datastore_connected: bool,
    pub workflow_connected: bool,
    pub error: Option<String>,
    pub is_active: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub activity_timeout_minutes: i64,
}

/// First matching state wins: disconnected, error, paused, active, idle
pub fn derive_status(inputs: &HealthInputs, now: DateTime<Utc>) -> HealthStatus {
    if !inputs.datastore_connected || !inputs.workflow_connected {
        return HealthStatus::Disconnected;
    }
    if inputs.error.is_some() {
        return HealthStatus::Error;
    }
    if !inputs.is_active {
        return HealthStatus::Paused;
    }
    match inputs.last_activity {
        Some(last) if now - last <= activity_window(inputs.activity_timeout_minutes) => {
            HealthStatus::Active
        }
        _ => HealthStatus::Idle,
    }
}

fn activity_window(timeout_minutes: i64) -> Duration {
    Duration::minutes(timeout_minutes.clamp(0, MAX_ACTIVITY_TIMEOUT_MINUTES))
}

/// Health snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub color: String,
    pub label: String,
    pub last_activity: Option<DateTime<Utc>>,
    pub datastore_connected: bool,
    pub workflow_connected: bool,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl SystemHealth {
    pub fn from_inputs(inputs: HealthInputs, now: DateTime<Utc>) -> Self {
        let status = derive_status(&inputs, now);
        Self {
            status,
            color: status.color().to_string(),
            label: status.label().to_string(),
            last_activity: inputs.last_activity,
            datastore_connected: inputs.datastore_connected,
            workflow_connected: inputs.workflow_connected,
            error: inputs.error,
            checked_at: now,
        }
    }

    /// Snapshot used before the first check completes
    pub fn unknown(now: DateTime<Utc>) -> Self {
        Self::from_inputs(HealthInputs::default(), now)
    }
}

#[derive(Debug, Clone, Copy)]
struct AutomationState {
    is_active: bool,
    activity_timeout_minutes: i64,
}

/// Health monitor
pub struct HealthMonitor {
    datastore: Arc<dyn ProspectionRepository>,
    workflow: Arc<dyn ConnectivityProbe>,
    error: RwLock<Option<String>>,
    automation: RwLock<AutomationState>,
    snapshot: watch::Sender<SystemHealth>,
    checked: AtomicBool,
}

impl HealthMonitor {
    pub fn new(datastore: Arc<dyn ProspectionRepository>, workflow: Arc<dyn ConnectivityProbe>) -> Self {
        let (snapshot, _) = watch::channel(SystemHealth::unknown(Utc::now()));
        Self {
            datastore,
            workflow,
            error: RwLock::new(None),
            automation: RwLock::new(AutomationState {
                is_active: false,
                activity_timeout_minutes: 60,
            }),
            snapshot,
            checked: AtomicBool::new(false),
        }
    }

    /// Update the automation flags used by the next check
    pub async fn set_automation_state(&self, is_active: bool, activity_timeout_minutes: i64) {
        *self.automation.write().await = AutomationState {
            is_active,
            activity_timeout_minutes,
        };
    }

    /// Mark the automation as failed until [`clear_error`](Self::clear_error)
    pub async fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message, "Automation error reported");
        *self.error.write().await = Some(message);
    }

    pub async fn clear_error(&self) {
        let mut error = self.error.write().await;
        if error.take().is_some() {
            info!("Automation error cleared");
        }
    }

    pub async fn current_error(&self) -> Option<String> {
        self.error.read().await.clone()
    }

    /// Probe both dependencies, derive the state, and publish it
    pub async fn check_now(&self) -> SystemHealth {
        let now = Utc::now();

        let (datastore_connected, workflow_connected, last_activity) = tokio::join!(
            async { self.datastore.ping().await.is_ok() },
            self.workflow.check(),
            async { self.datastore.last_activity_at().await.ok().flatten() },
        );

        let automation = *self.automation.read().await;
        let inputs = HealthInputs {
            datastore_connected,
            workflow_connected,
            error: self.current_error().await,
            is_active: automation.is_active,
            last_activity,
            activity_timeout_minutes: automation.activity_timeout_minutes,
        };

        let health = SystemHealth::from_inputs(inputs, now);
        debug!(status = %health.status, "Health checked");
        self.snapshot.send_replace(health.clone());
        self.checked.store(true, Ordering::Release);
        health
    }

    /// Latest snapshot, running a first check if none has completed yet
    pub async fn current(&self) -> SystemHealth {
        if self.checked.load(Ordering::Acquire) {
            self.latest()
        } else {
            self.check_now().await
        }
    }

    /// Latest published snapshot
    pub fn latest(&self) -> SystemHealth {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SystemHealth> {
        self.snapshot.subscribe()
    }

    /// Re-check every `interval` until `cancel` fires
    pub fn spawn_polling(
        self: &Arc<Self>,
        interval: std::time::Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(interval_secs = interval.as_secs(), "Health polling started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Health polling stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        monitor.check_now().await;
                    }
                }
            }
        })
    }
}
