// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Domain layer (business logic)
pub mod dispatch;
pub mod notification;
pub mod providers;
pub mod queue;
pub mod reconcile;
pub mod store;

// Application layer
pub mod api;
pub mod callbacks;
pub mod server;
pub mod worker;
