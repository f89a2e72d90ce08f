//! Instantiation interceptors.

use std::time::Duration;

use tracing::debug;

use super::descriptor::ServiceInstance;

/// Runs around every service instantiation.
pub trait ServiceInterceptor: Send + Sync {
    /// Called before the factory runs.
    fn before_create(&self, _service: &str) {}

    /// Called after the factory succeeded.
    fn after_create(&self, _service: &str, _instance: &ServiceInstance, _elapsed: Duration) {}
}

/// Logs every instantiation at `debug` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInterceptor;

impl ServiceInterceptor for TracingInterceptor {
    fn before_create(&self, service: &str) {
        debug!(service = %service, "Creating service");
    }

    fn after_create(&self, service: &str, instance: &ServiceInstance, elapsed: Duration) {
        debug!(
            service = %service,
            instance_type = instance.type_name(),
            elapsed_us = elapsed.as_micros() as u64,
            "Service created"
        );
    }
}
