//! Inbound provider callback endpoints.
//!
//! One route per provider channel, each with its own wire encoding: the SMS
//! aggregator and the mailbox gateway post form-encoded receipts, the print
//! API posts JSON. Validation failures (missing fields, malformed
//! reference) are rejected with a 400 and never enter the async pipeline;
//! everything else is enqueued and acknowledged with the same generic
//! payload regardless of internal outcome, so providers have no reason to
//! retry-storm us.

pub mod service;

pub use service::ServiceCallbackClient;

use axum::extract::State;
use axum::routing::post;
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::metrics::CallbackMetrics;
use crate::providers::CallbackProvider;
use crate::queue::{Task, TaskEnvelope};
use crate::reconcile::parse_reference;
use crate::server::AppState;

pub fn callback_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications/sms/spryng", post(spryng_callback))
        .route("/notifications/messagebox", post(messagebox_callback))
        .route("/notifications/letter/dvla", post(dvla_callback))
}

/// Generic acknowledgement returned for every accepted callback.
#[derive(Debug, Serialize)]
pub struct CallbackAck {
    result: &'static str,
}

impl CallbackAck {
    fn success() -> Self {
        Self { result: "success" }
    }
}

/// Form-encoded receipt posted by the SMS aggregator and mailbox gateway.
#[derive(Debug, Deserialize)]
pub struct ProviderCallbackForm {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

/// JSON receipt posted by the print API.
#[derive(Debug, Deserialize)]
pub struct DvlaCallbackBody {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

async fn spryng_callback(
    State(state): State<AppState>,
    Form(form): Form<ProviderCallbackForm>,
) -> Result<Json<CallbackAck>> {
    accept_callback(&state, CallbackProvider::Spryng, form.status, form.code, form.reference).await
}

async fn messagebox_callback(
    State(state): State<AppState>,
    Form(form): Form<ProviderCallbackForm>,
) -> Result<Json<CallbackAck>> {
    accept_callback(
        &state,
        CallbackProvider::Messagebox,
        form.status,
        form.code,
        form.reference,
    )
    .await
}

async fn dvla_callback(
    State(state): State<AppState>,
    Json(body): Json<DvlaCallbackBody>,
) -> Result<Json<CallbackAck>> {
    accept_callback(
        &state,
        CallbackProvider::Dvla,
        body.status,
        body.detail,
        body.reference,
    )
    .await
}

/// Validate a callback and enqueue its reconciliation unit.
#[tracing::instrument(
    name = "callbacks.accept",
    skip(state, status, detail_code, reference),
    fields(provider = %provider)
)]
async fn accept_callback(
    state: &AppState,
    provider: CallbackProvider,
    status: Option<String>,
    detail_code: Option<String>,
    reference: Option<String>,
) -> Result<Json<CallbackAck>> {
    let (status, reference) = validate_callback_data(provider, status, reference)?;

    // Malformed references are a client error at the boundary; they must
    // never reach the queue.
    if let Err(e) = parse_reference(&reference) {
        tracing::warn!(
            reference = %reference,
            error = %e,
            "{} callback with invalid reference",
            provider.display_name()
        );
        return Err(AppError::Validation(format!(
            "{} callback failed: invalid reference",
            provider.display_name()
        )));
    }

    state
        .queue
        .enqueue(TaskEnvelope::new(Task::Reconcile {
            provider,
            raw_status: status,
            detail_code,
            reference,
        }))
        .await?;

    CallbackMetrics::record_received(provider.as_str());

    Ok(Json(CallbackAck::success()))
}

/// Require the fields a receipt cannot be processed without.
fn validate_callback_data(
    provider: CallbackProvider,
    status: Option<String>,
    reference: Option<String>,
) -> Result<(String, String)> {
    let mut errors = Vec::new();

    let status = status.filter(|s| !s.is_empty());
    let reference = reference.filter(|r| !r.is_empty());

    if status.is_none() {
        errors.push(format!("{} callback failed: status missing", provider.display_name()));
    }
    if reference.is_none() {
        errors.push(format!(
            "{} callback failed: reference missing",
            provider.display_name()
        ));
    }

    if !errors.is_empty() {
        return Err(AppError::Validation(errors.join(", ")));
    }

    Ok((status.unwrap(), reference.unwrap()))
}
