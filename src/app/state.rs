//! Application state management.
//!
//! This module provides the shared application state that is
//! accessible to all request handlers via Axum's State extractor.

use secrecy::SecretString;
use std::sync::Arc;

use crate::domain::{EmailNotifier, ProductRegistry, SupplyChainProgram};
use crate::infra::observability::PrometheusHandle;

use super::service::{AppService, ServiceSettings};

/// Shared application state for the Axum web server.
///
/// All contained types are wrapped in `Arc` and implement `Send + Sync`,
/// making `AppState` safe to share across async tasks.
///
/// # Example
///
/// ```ignore
/// let state = AppState::new(program, registry, notifier, settings, api_key);
/// let router = create_router(Arc::new(state));
/// ```
#[derive(Clone)]
pub struct AppState {
    /// The application service containing business logic.
    pub service: Arc<AppService>,

    /// Client of the on-chain supplychain program.
    pub program: Arc<dyn SupplyChainProgram>,

    /// Local name to address cache.
    pub registry: Arc<dyn ProductRegistry>,

    /// Sends the customer registration email.
    pub notifier: Arc<dyn EmailNotifier>,

    /// Key required in `x-api-key` on every POST.
    pub api_auth_key: Arc<SecretString>,

    /// Renders `/metrics`; absent when another recorder was installed first.
    pub metrics_handle: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Creates the state and wires an `AppService` to the given ports.
    #[must_use]
    pub fn new(
        program: Arc<dyn SupplyChainProgram>,
        registry: Arc<dyn ProductRegistry>,
        notifier: Arc<dyn EmailNotifier>,
        settings: ServiceSettings,
        api_auth_key: SecretString,
    ) -> Self {
        let service = Arc::new(AppService::new(
            Arc::clone(&program),
            Arc::clone(&registry),
            Arc::clone(&notifier),
            settings,
        ));

        Self {
            service,
            program,
            registry,
            notifier,
            api_auth_key: Arc::new(api_auth_key),
            metrics_handle: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, handle: Option<Arc<PrometheusHandle>>) -> Self {
        self.metrics_handle = handle;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockNotifier, MockProgram, MockRegistry};

    fn state() -> AppState {
        AppState::new(
            Arc::new(MockProgram::new()),
            Arc::new(MockRegistry::new()),
            Arc::new(MockNotifier::new()),
            ServiceSettings::default(),
            SecretString::from("test-key"),
        )
    }

    #[test]
    fn test_app_state_creation() {
        let state = state();
        assert!(Arc::strong_count(&state.service) >= 1);
        assert!(state.metrics_handle.is_none());
    }

    #[test]
    fn test_app_state_is_clone() {
        let state = state();
        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.service, &cloned.service));
        assert!(Arc::ptr_eq(&state.program, &cloned.program));
    }
}
