//! Health status registry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use fileferry_protocol::messages::{HealthCheckRequest, HealthCheckResponse, ServingStatus};

/// Tracks the serving status of named services.
///
/// An empty service name in a check request asks for overall process health,
/// which is always `Serving` while the server runs. Named services must be
/// registered with [`set_status`](Self::set_status) to be known.
#[derive(Debug, Default)]
pub struct HealthRegistry {
    table: Mutex<HashMap<String, ServingStatus>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or updates a named service's status.
    pub fn set_status(&self, service: impl Into<String>, status: ServingStatus) {
        self.table().insert(service.into(), status);
    }

    /// Removes a named service; later checks for it report unknown.
    pub fn clear(&self, service: &str) {
        self.table().remove(service);
    }

    /// Answers one health check. Returns `None` when the named service is
    /// unknown.
    pub fn check(&self, req: &HealthCheckRequest) -> Option<HealthCheckResponse> {
        tracing::debug!(
            label = %req.label,
            counter = %req.counter,
            ping_at = %req.ping_at,
            "health check received"
        );

        let status = if req.service.is_empty() {
            ServingStatus::Serving
        } else {
            *self.table().get(&req.service)?
        };

        Some(HealthCheckResponse {
            status,
            received_at: Utc::now().to_rfc3339(),
        })
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, ServingStatus>> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }
}
