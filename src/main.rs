use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use notify_delivery::callbacks::ServiceCallbackClient;
use notify_delivery::config::Settings;
use notify_delivery::dispatch::DeliveryDispatcher;
use notify_delivery::providers::ProviderRegistry;
use notify_delivery::queue::create_task_queue;
use notify_delivery::reconcile::CallbackReconciler;
use notify_delivery::server::{create_app, AppState};
use notify_delivery::store::create_notification_store;
use notify_delivery::telemetry::init_telemetry;
use notify_delivery::worker::WorkerPool;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing (keep the guard alive for the process lifetime)
    let _telemetry_guard = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    // Durable state and work queue
    let store = create_notification_store(&settings.database).await?;
    let queue = create_task_queue(&settings.queue).await?;

    // Pipeline components
    let registry = ProviderRegistry::from_settings(&settings.providers);
    let dispatcher = Arc::new(DeliveryDispatcher::new(store.clone(), registry));
    let reconciler = Arc::new(CallbackReconciler::new(store.clone(), queue.clone()));
    let service_callbacks = Arc::new(ServiceCallbackClient::new(
        settings.service_callback.clone(),
        store.clone(),
    ));

    // Worker pool
    let (shutdown_tx, _) = broadcast::channel(1);
    let pool = Arc::new(WorkerPool::new(
        queue.clone(),
        dispatcher,
        reconciler,
        service_callbacks,
        settings.worker.clone(),
    ));
    let worker_handles = pool.spawn(&shutdown_tx);
    tracing::info!(workers = settings.worker.count, "Worker pool started");

    // Create Axum app
    let state = AppState::new(settings.clone(), store, queue);
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx.clone()))
        .await?;

    // Wait for workers to finish their current task
    tracing::info!("Waiting for workers to finish...");
    futures::future::join_all(worker_handles).await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop the worker pool
    let _ = shutdown_tx.send(());
}
