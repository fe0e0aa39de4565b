use std::sync::Arc;

use crate::application::services::RequestAuditLog;
use crate::infrastructure::counter::CounterStore;

/// State shared by the service's own handlers.
#[derive(Clone)]
pub struct AppState {
    pub counter_store: Arc<dyn CounterStore>,
    pub audit: RequestAuditLog,
}

impl AppState {
    pub fn new(counter_store: Arc<dyn CounterStore>, audit: RequestAuditLog) -> Self {
        Self {
            counter_store,
            audit,
        }
    }
}
