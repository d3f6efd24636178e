//! Admin notification sink (spec §6 AMBIENT), standing in for the
//! out-of-scope Telegram bot: a best-effort seam that the scheduler and
//! ingestion worker pool call into, never propagating a delivery failure
//! back to the triggering operation (spec §7).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminNotification {
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub message: String,
    pub tenant_user_id: Option<i64>,
    pub correlation_id: Option<String>,
}

impl AdminNotification {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        AdminNotification {
            timestamp: Utc::now(),
            category: category.into(),
            message: message.into(),
            tenant_user_id: None,
            correlation_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_user_id: i64) -> Self {
        self.tenant_user_id = Some(tenant_user_id);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify(&self, notification: AdminNotification) -> anyhow::Result<()>;
}

/// Appends one JSON line per notification to a log file the out-of-scope
/// messaging bot would tail in the original system.
pub struct FileAdminNotifier {
    path: PathBuf,
}

impl FileAdminNotifier {
    pub fn new(path: PathBuf) -> Self {
        FileAdminNotifier { path }
    }
}

#[async_trait]
impl AdminNotifier for FileAdminNotifier {
    async fn notify(&self, notification: AdminNotification) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(&notification)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// Calls `notifier.notify`, logging and swallowing any error rather than
/// propagating it — the contract every caller relies on.
pub async fn notify_best_effort(notifier: &dyn AdminNotifier, notification: AdminNotification) {
    if let Err(e) = notifier.notify(notification).await {
        warn!(error = %e, "admin notification delivery failed");
    }
}

/// In-memory fake for tests: records every notification it receives.
pub struct RecordingAdminNotifier {
    pub received: Mutex<Vec<AdminNotification>>,
}

impl RecordingAdminNotifier {
    pub fn new() -> Self {
        RecordingAdminNotifier { received: Mutex::new(Vec::new()) }
    }
}

impl Default for RecordingAdminNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdminNotifier for RecordingAdminNotifier {
    async fn notify(&self, notification: AdminNotification) -> anyhow::Result<()> {
        self.received.lock().unwrap().push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_notifier_appends_json_lines() {
        let dir = std::env::temp_dir().join(format!("wine_service_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("notifications.jsonl");
        let notifier = FileAdminNotifier::new(path.clone());

        notifier.notify(AdminNotification::new("alert", "stage3 failures high")).await.unwrap();
        notifier.notify(AdminNotification::new("report", "daily report sent").with_tenant(1)).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("stage3 failures high"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn recording_notifier_captures_notifications_for_assertions() {
        let notifier = RecordingAdminNotifier::new();
        notify_best_effort(&notifier, AdminNotification::new("alert", "error rate high")).await;
        assert_eq!(notifier.received.lock().unwrap().len(), 1);
    }
}
