// src/notifications.rs
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::{find_user, users_with_role, Actor, Role, User};
use crate::error::{ApiError, ApiResult};
use crate::models::{CreateNotificationRequest, Notification};
use crate::store::State;

pub const INVENTORY_COLLECTION: &str = "inventory-collection";
pub const SYSTEM: &str = "system";
/// Recipient value that addresses every field user.
pub const ALL_RECIPIENTS: &str = "all";

/// Roles reached by a notification sent to [`ALL_RECIPIENTS`].
const FIELD_ROLES: [Role; 3] = [Role::Supervisor, Role::TeamLeader, Role::Staff];

pub struct NotificationDraft<'a> {
    pub title: String,
    pub message: String,
    pub kind: &'a str,
    pub project_id: Option<String>,
    pub created_by: &'a str,
}

fn addressed_to<'u>(
    users: impl Iterator<Item = &'u User>,
    draft: &NotificationDraft<'_>,
    now: DateTime<Utc>,
) -> Vec<Notification> {
    users
        .map(|user| Notification {
            id: Uuid::now_v7(),
            recipient: user.username.to_lowercase(),
            recipient_name: user.name.clone(),
            title: draft.title.clone(),
            message: draft.message.clone(),
            kind: draft.kind.to_string(),
            project_id: draft.project_id.clone(),
            created_by: draft.created_by.to_string(),
            created_at: now,
            read_by: Vec::new(),
        })
        .collect()
}

impl State {
    /// Creates one notification per user holding `role`. Returns how many
    /// were created; having no recipients is logged, never an error.
    pub fn notify_role(&mut self, role: Role, draft: NotificationDraft<'_>) -> usize {
        let created = addressed_to(users_with_role(&self.users, role), &draft, Utc::now());

        if created.is_empty() {
            log::warn!("No {} users to notify about '{}'", role, draft.title);
            return 0;
        }

        let count = created.len();
        self.notifications.extend(created);
        log::info!("Notified {} {} user(s): {}", count, role, draft.title);
        count
    }

    /// Admin-authored notification for one user or for every field user.
    /// Returns how many notifications were created.
    pub fn send_notification(&mut self, request: CreateNotificationRequest, actor: &Actor) -> ApiResult<usize> {
        if !actor.role.can_send_notifications() {
            return Err(ApiError::Forbidden(format!("Role '{}' may not send notifications", actor.role)));
        }

        let draft = NotificationDraft {
            title: request.title.trim().to_string(),
            message: request.message,
            kind: request.kind.as_deref().filter(|k| !k.trim().is_empty()).unwrap_or(SYSTEM),
            project_id: request.project_id,
            created_by: &actor.username,
        };
        let now = Utc::now();

        let created = if request.recipient.trim().eq_ignore_ascii_case(ALL_RECIPIENTS) {
            let audience = self.users.values().filter(|u| FIELD_ROLES.contains(&u.role));
            addressed_to(audience, &draft, now)
        } else {
            let user = find_user(&self.users, &request.recipient)
                .ok_or_else(|| ApiError::NotFound(format!("User '{}' not found", request.recipient.trim())))?;
            addressed_to(std::iter::once(user), &draft, now)
        };

        let count = created.len();
        self.notifications.extend(created);
        log::info!("Notification '{}' sent by {} to {} user(s)", draft.title, actor.username, count);
        Ok(count)
    }

    /// Notifications addressed to `username`, newest first.
    pub fn notifications_for(&self, username: &str) -> Vec<&Notification> {
        self.notifications
            .iter()
            .rev()
            .filter(|n| n.recipient.eq_ignore_ascii_case(username))
            .collect()
    }
}
