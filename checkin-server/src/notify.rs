//! Coach notification on new check-ins
//!
//! Intake hands a [`CheckinNotice`] to the [`NotificationQueue`] and moves
//! on. A single worker task drains the queue into a [`Notifier`]. Delivery
//! failures are logged and dropped; they never reach the submitter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use checkin_common::{CheckinRecord, CheckinStatus};

/// Webhook request timeout
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Summary of one accepted check-in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckinNotice {
    pub athlete: String,
    pub checkin_date: String,
    pub division: String,
    pub status: CheckinStatus,
    pub files_uploaded: usize,
    /// Stored paths relative to the upload root, photos first
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl CheckinNotice {
    pub fn from_record(record: &CheckinRecord) -> Self {
        let mut attachments = record.photos.clone();
        attachments.extend(record.video.iter().cloned());

        Self {
            athlete: record.athlete_name.clone(),
            checkin_date: record.checkin_date.clone(),
            division: record.division.clone(),
            status: record.status,
            files_uploaded: record.attachment_count(),
            attachments,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected notification with status {0}")]
    Rejected(u16),
}

/// Delivers notices to the coach
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &CheckinNotice) -> Result<(), NotifyError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Writes notices to the service log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &CheckinNotice) -> Result<(), NotifyError> {
        info!(
            athlete = %notice.athlete,
            date = %notice.checkin_date,
            status = %notice.status,
            files = notice.files_uploaded,
            "New check-in received"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// POSTs each notice as JSON to a configured URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: &CheckinNotice) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(notice).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        debug!(url = %self.url, athlete = %notice.athlete, "Webhook delivered");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// Sending half of the bounded notification channel
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<CheckinNotice>,
}

impl NotificationQueue {
    /// Create the queue and spawn its worker
    ///
    /// The worker exits once every queue handle has been dropped and the
    /// remaining notices are delivered.
    pub fn start(notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<CheckinNotice>(capacity.max(1));

        let worker = tokio::spawn(async move {
            info!(notifier = notifier.name(), capacity, "Notification worker started");

            while let Some(notice) = rx.recv().await {
                if let Err(e) = notifier.notify(&notice).await {
                    error!(
                        notifier = notifier.name(),
                        athlete = %notice.athlete,
                        "Notification failed: {}",
                        e
                    );
                }
            }

            info!("Notification worker stopped");
        });

        (Self { tx }, worker)
    }

    /// Queue a notice without waiting
    ///
    /// Returns false when the notice was dropped because the queue is full
    /// or the worker has stopped.
    pub fn enqueue(&self, notice: CheckinNotice) -> bool {
        match self.tx.try_send(notice) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(notice)) => {
                warn!(athlete = %notice.athlete, "Notification queue full, dropping notice");
                false
            }
            Err(mpsc::error::TrySendError::Closed(notice)) => {
                warn!(athlete = %notice.athlete, "Notification worker stopped, dropping notice");
                false
            }
        }
    }
}

/// Pick the notifier for the configured delivery target
pub fn notifier_for(webhook_url: Option<&str>) -> Result<Arc<dyn Notifier>, NotifyError> {
    match webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(url)?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}
