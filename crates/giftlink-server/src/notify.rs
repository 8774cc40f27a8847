//! Best-effort notifications to users through the bot.
//!
//! Delivery can fail for reasons outside our control (the user blocked the
//! bot, the platform is unreachable). Those failures are logged and never
//! reach the caller; core mutations have already been committed when a
//! notification is sent.

use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::{debug, warn};

/// Something worth telling a user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// `invited_name` opened `inviter_id`'s invitation link.
    InvitationAccepted {
        inviter_id: String,
        invited_name: String,
    },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Notification::InvitationAccepted { inviter_id, .. } => inviter_id,
        }
    }

    pub fn text(&self) -> String {
        match self {
            Notification::InvitationAccepted { invited_name, .. } => format!(
                "🎉 {invited_name} joined your close people!\n\n\
                 You can now add their details in the app."
            ),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Deliver `notification`, logging instead of propagating failures.
pub async fn notify_best_effort(notifier: &dyn Notifier, notification: Notification) {
    if let Err(e) = notifier.send(&notification).await {
        warn!(
            recipient = notification.recipient(),
            error = %e,
            "Notification not delivered"
        );
    }
}

/// Sends notifications as bot messages.
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let chat_id: i64 = notification
            .recipient()
            .parse()
            .map_err(|e| anyhow::anyhow!("recipient is not a chat id: {e}"))?;

        self.bot
            .send_message(ChatId(chat_id), notification.text())
            .await?;
        debug!(recipient = chat_id, "Notification delivered");
        Ok(())
    }
}

/// Used when the bot is disabled: notifications are only logged.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        debug!(
            recipient = notification.recipient(),
            "Bot disabled, notification dropped"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records notifications, optionally failing every delivery.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub sent: Mutex<Vec<Notification>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(notification.clone());
            if self.fail {
                anyhow::bail!("blocked by user");
            }
            Ok(())
        }
    }

    #[test]
    fn test_invitation_text() {
        let n = Notification::InvitationAccepted {
            inviter_id: "10".into(),
            invited_name: "bea".into(),
        };
        assert_eq!(n.recipient(), "10");
        assert!(n.text().starts_with("🎉 bea joined"));
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        notify_best_effort(
            &notifier,
            Notification::InvitationAccepted {
                inviter_id: "10".into(),
                invited_name: "bea".into(),
            },
        )
        .await;
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_recipient_is_an_error() {
        let notifier = TelegramNotifier::new(Bot::new("0:test"));
        let result = notifier
            .send(&Notification::InvitationAccepted {
                inviter_id: "not-a-number".into(),
                invited_name: "bea".into(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_everything() {
        LogNotifier
            .send(&Notification::InvitationAccepted {
                inviter_id: "10".into(),
                invited_name: "bea".into(),
            })
            .await
            .unwrap();
    }
}
