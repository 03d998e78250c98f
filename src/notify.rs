//! Notification Dispatcher (C11): persists a notification then fans out to
//! whichever channels were requested and are actually usable for the user.

use uuid::Uuid;

use crate::error::ApiError;
use crate::mail::{MailGateway, OutboundMessage};
use crate::models::{Notification, NotificationChannel, User};
use crate::persistence::NotificationsRepo;

pub struct NotificationDispatcher {
    notifications: NotificationsRepo,
}

impl NotificationDispatcher {
    pub fn new(notifications: NotificationsRepo) -> Self {
        Self { notifications }
    }

    /// `Notify(user, type, title, message, data, channels)`. `in_app` is
    /// satisfied by the row itself; `email` additionally requires a
    /// connected mailbox, the user's own preference, and a gateway the
    /// caller has already constructed for this user's mailbox auth.
    pub async fn notify(
        &self,
        user: &User,
        notification_type: &str,
        title: &str,
        message: &str,
        data: serde_json::Value,
        channels: Vec<NotificationChannel>,
        mail: Option<&dyn MailGateway>,
    ) -> Result<Notification, ApiError> {
        let notification = self
            .notifications
            .create(user.id, notification_type, title, message, data, channels.clone())
            .await?;

        let wants_email = channels.contains(&NotificationChannel::Email)
            && user.gmail_connected()
            && user.notification_preferences.email;

        let mut delivered = channels.contains(&NotificationChannel::InApp);

        if wants_email {
            if let Some(mail) = mail {
                let outbound = OutboundMessage {
                    to: &user.email,
                    subject: title,
                    body_text: message,
                    attachments: &[],
                };
                delivered |= mail.send(outbound).await.is_ok();
            }
        }

        if delivered {
            self.notifications.mark_sent(notification.id).await?;
        }

        Ok(notification)
    }

    pub async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>, ApiError> {
        self.notifications.list_for_user(user_id, limit).await
    }
}
