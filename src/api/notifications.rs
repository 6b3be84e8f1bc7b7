//! Notification intake and status endpoints.
//!
//! Requests arrive already validated and authenticated by the outer API
//! layer, carrying the credential class it resolved. Intake persists the
//! record and enqueues the delivery task; a test credential marks the
//! record delivered immediately and skips dispatch entirely.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::notification::{KeyType, Notification, NotificationStatus, NotificationType};
use crate::queue::{Task, TaskEnvelope};
use crate::server::AppState;

const DEFAULT_POSTAGE: &str = "netherlands";

#[derive(Debug, Deserialize)]
pub struct PostNotificationRequest {
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub personalisation: Option<serde_json::Value>,
    #[serde(default)]
    pub postage: Option<String>,
    /// Resolved by the authenticating layer; defaults to a normal key.
    #[serde(default)]
    pub key_type: KeyType,
}

#[derive(Debug, Serialize)]
pub struct PostNotificationResponse {
    pub id: Uuid,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub uri: String,
}

/// Status view exposed to API callers: canonical vocabulary only, raw
/// provider codes stay internal.
#[derive(Debug, Serialize)]
pub struct NotificationStatusResponse {
    pub id: Uuid,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub async fn post_sms(
    state: State<AppState>,
    request: Json<PostNotificationRequest>,
) -> Result<(StatusCode, Json<PostNotificationResponse>)> {
    create_notification(state, NotificationType::Sms, request).await
}

pub async fn post_email(
    state: State<AppState>,
    request: Json<PostNotificationRequest>,
) -> Result<(StatusCode, Json<PostNotificationResponse>)> {
    create_notification(state, NotificationType::Email, request).await
}

pub async fn post_letter(
    state: State<AppState>,
    request: Json<PostNotificationRequest>,
) -> Result<(StatusCode, Json<PostNotificationResponse>)> {
    create_notification(state, NotificationType::Letter, request).await
}

pub async fn post_messagebox(
    state: State<AppState>,
    request: Json<PostNotificationRequest>,
) -> Result<(StatusCode, Json<PostNotificationResponse>)> {
    create_notification(state, NotificationType::Messagebox, request).await
}

#[tracing::instrument(
    name = "api.post_notification",
    skip(state, request),
    fields(notification_type = %notification_type)
)]
async fn create_notification(
    State(state): State<AppState>,
    notification_type: NotificationType,
    Json(request): Json<PostNotificationRequest>,
) -> Result<(StatusCode, Json<PostNotificationResponse>)> {
    let recipient = request.recipient.unwrap_or_default();
    if recipient.is_empty() && notification_type != NotificationType::Messagebox {
        // Mailbox messages are addressed by the template's audience; every
        // other channel needs an explicit recipient.
        return Err(AppError::Validation(format!(
            "recipient is required for {notification_type} notifications"
        )));
    }

    let mut notification = Notification::new(
        notification_type,
        recipient,
        request.content.unwrap_or_default(),
        request.personalisation,
        request.key_type,
    );

    if notification_type == NotificationType::Letter {
        notification.postage = Some(
            request
                .postage
                .unwrap_or_else(|| DEFAULT_POSTAGE.to_string()),
        );
    }

    let created = state.store.create(notification).await?;

    // Test-key notifications are already delivered and never dispatched.
    if created.status == NotificationStatus::Created {
        state
            .queue
            .enqueue(TaskEnvelope::new(Task::Deliver {
                notification_id: created.id,
            }))
            .await?;
    }

    tracing::info!(
        notification_id = %created.id,
        status = %created.status,
        "Notification accepted"
    );

    let response = PostNotificationResponse {
        id: created.id,
        notification_type: created.notification_type,
        status: created.status,
        created_at: created.created_at,
        uri: format!("/v2/notifications/{}", created.id),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(name = "api.get_notification", skip(state))]
pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationStatusResponse>> {
    let notification = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("notification {id} not found")))?;

    Ok(Json(NotificationStatusResponse {
        id: notification.id,
        notification_type: notification.notification_type,
        status: notification.status,
        sent_at: notification.sent_at,
        created_at: notification.created_at,
        updated_at: notification.updated_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: PostNotificationRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.key_type, KeyType::Normal);
        assert!(request.recipient.is_none());
    }

    #[test]
    fn test_status_response_omits_raw_provider_fields() {
        let n = Notification::new(
            NotificationType::Sms,
            "+31612345678".to_string(),
            "hi".to_string(),
            None,
            KeyType::Normal,
        );
        let response = NotificationStatusResponse {
            id: n.id,
            notification_type: n.notification_type,
            status: n.status,
            sent_at: n.sent_at,
            created_at: n.created_at,
            updated_at: n.updated_at,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "created");
        assert!(json.get("detailed_status_code").is_none());
        assert!(json.get("sent_by").is_none());
    }
}
