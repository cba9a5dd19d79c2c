//! Outbound notifications.
//!
//! Delivery belongs to an external collaborator behind [`NotificationSink`].
//! Notifications are best-effort: a failed send is logged and never fails
//! or rolls back the transition that triggered it.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Transition a notification reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Submitted,
    Approved,
    Rejected,
    Disbursed,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Disbursed => "disbursed",
        }
    }
}

/// One fire-and-forget notification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Application the notification is about
    pub reference_id: i64,
}

impl Notification {
    /// The application was handed in.
    pub fn submitted(user_id: impl Into<String>, application_id: i64) -> Self {
        Self {
            user_id: user_id.into(),
            kind: NotificationKind::Submitted,
            title: "Application submitted".to_string(),
            message: format!("Application #{application_id} was submitted for review."),
            reference_id: application_id,
        }
    }

    /// A review reached a decision.
    pub fn decision(user_id: impl Into<String>, application_id: i64, approved: bool) -> Self {
        let (kind, title, verdict) = if approved {
            (NotificationKind::Approved, "Application approved", "approved")
        } else {
            (NotificationKind::Rejected, "Application not approved", "not approved")
        };
        Self {
            user_id: user_id.into(),
            kind,
            title: title.to_string(),
            message: format!("Application #{application_id} was {verdict}."),
            reference_id: application_id,
        }
    }

    /// Funds were paid out.
    pub fn disbursed(user_id: impl Into<String>, application_id: i64, reference: &str) -> Self {
        Self {
            user_id: user_id.into(),
            kind: NotificationKind::Disbursed,
            title: "Scholarship disbursed".to_string(),
            message: format!(
                "Funds for application #{application_id} were transferred (reference {reference})."
            ),
            reference_id: application_id,
        }
    }
}

/// Notification dispatch failure.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound notification hook (e-mail, SMS or in-app adapters).
pub trait NotificationSink: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Sink that only writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            user_id = %notification.user_id,
            kind = notification.kind.as_str(),
            reference_id = notification.reference_id,
            title = %notification.title,
            "Notification"
        );
        Ok(())
    }
}

/// Sends through `sink`, logging instead of propagating a failure.
pub fn send_best_effort(sink: &dyn NotificationSink, notification: &Notification) {
    if let Err(e) = sink.send(notification) {
        warn!(
            user_id = %notification.user_id,
            kind = notification.kind.as_str(),
            reference_id = notification.reference_id,
            error = %e,
            "Notification dropped"
        );
    }
}

/// In-memory sink that keeps every notification it receives.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    sent: std::sync::Arc<std::sync::Mutex<Vec<Notification>>>,
}

#[cfg(test)]
impl RecordingNotifier {
    #[allow(clippy::expect_used)]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("lock").clone()
    }
}

#[cfg(test)]
impl NotificationSink for RecordingNotifier {
    #[allow(clippy::expect_used)]
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().expect("lock").push(notification.clone());
        Ok(())
    }
}

/// Sink whose transport is always down.
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingNotifier;

#[cfg(test)]
impl NotificationSink for FailingNotifier {
    fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}
