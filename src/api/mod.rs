mod health;
mod metrics;
mod notifications;

use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use health::healthz;
use metrics::metrics_handler;
use notifications::{
    get_notification, post_email, post_letter, post_messagebox, post_sms,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & metrics
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        // Notification intake & status
        .nest(
            "/v2",
            Router::new()
                .route("/notifications/sms", post(post_sms))
                .route("/notifications/email", post(post_email))
                .route("/notifications/letter", post(post_letter))
                .route("/notifications/messagebox", post(post_messagebox))
                .route("/notifications/{id}", get(get_notification)),
        )
}
