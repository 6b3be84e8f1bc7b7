use std::sync::Arc;

use crate::config::Settings;
use crate::queue::TaskQueueBackend;
use crate::store::NotificationStore;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn NotificationStore>,
    pub queue: Arc<dyn TaskQueueBackend>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn NotificationStore>,
        queue: Arc<dyn TaskQueueBackend>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            store,
            queue,
        }
    }
}
