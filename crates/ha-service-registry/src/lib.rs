//! Service registry with async handlers
//!
//! Services are how user writes reach entities: the entity platforms
//! register `number.set_value`, `switch.turn_on` and friends here and
//! dispatch each call to the targeted entities.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use ha_core::{Context, ServiceCall, SupportsResponse};
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub type ServiceResult = Result<Option<serde_json::Value>, ServiceError>;

pub type ServiceFuture = Pin<Box<dyn Future<Output = ServiceResult> + Send>>;

pub type ServiceHandler = Arc<dyn Fn(ServiceCall) -> ServiceFuture + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("service not found: {domain}.{service}")]
    NotFound { domain: String, service: String },

    /// The handler ran and the target refused; the message reaches the user
    #[error("service call failed: {0}")]
    CallFailed(String),

    #[error("invalid service data: {0}")]
    InvalidData(String),

    #[error("service does not support responses")]
    ResponseNotSupported,
}

/// What a registered service is and how it may be called
#[derive(Debug, Clone)]
pub struct ServiceDescription {
    pub domain: String,
    pub service: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Shape of the accepted service data, for display only
    pub schema: Option<serde_json::Value>,
    pub supports_response: SupportsResponse,
}

impl ServiceDescription {
    fn key(&self) -> String {
        service_key(&self.domain, &self.service)
    }
}

struct RegisteredService {
    handler: ServiceHandler,
    description: ServiceDescription,
}

fn service_key(domain: &str, service: &str) -> String {
    format!("{}.{}", domain, service)
}

/// All services known to the host, keyed by `domain.service`
pub struct ServiceRegistry {
    services: DashMap<String, RegisteredService>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    /// Register a service, replacing any previous handler for the same key
    #[instrument(skip(self, description, handler), fields(service = %description.key()))]
    pub fn register_with_description<F, Fut>(&self, description: ServiceDescription, handler: F)
    where
        F: Fn(ServiceCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult> + Send + 'static,
    {
        let handler: ServiceHandler =
            Arc::new(move |call| Box::pin(handler(call)) as ServiceFuture);

        if self
            .services
            .insert(
                description.key(),
                RegisteredService {
                    handler,
                    description,
                },
            )
            .is_some()
        {
            warn!("Service replaced");
        } else {
            debug!("Service registered");
        }
    }

    /// Run the handler of `domain.service`
    ///
    /// The response is returned only when `return_response` is set; asking
    /// for one from a service that never responds is an error.
    #[instrument(skip(self, service_data, context))]
    pub async fn call(
        &self,
        domain: &str,
        service: &str,
        service_data: serde_json::Value,
        context: Context,
        return_response: bool,
    ) -> ServiceResult {
        let handler = {
            let registered = self
                .services
                .get(&service_key(domain, service))
                .ok_or_else(|| {
                    warn!("Service not found");
                    ServiceError::NotFound {
                        domain: domain.to_string(),
                        service: service.to_string(),
                    }
                })?;

            if return_response
                && registered.description.supports_response == SupportsResponse::None
            {
                return Err(ServiceError::ResponseNotSupported);
            }
            registered.handler.clone()
        };

        debug!("Calling service");
        let response = handler(ServiceCall::new(domain, service, service_data, context)).await?;

        Ok(if return_response { response } else { None })
    }

    pub fn has_service(&self, domain: &str, service: &str) -> bool {
        self.services.contains_key(&service_key(domain, service))
    }

    /// Names of the services registered for a domain, sorted
    pub fn domain_services(&self, domain: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .services
            .iter()
            .filter(|s| s.description.domain == domain)
            .map(|s| s.description.service.clone())
            .collect();
        names.sort();
        names
    }

    /// Drop every service of a domain, returning how many were removed
    #[instrument(skip(self))]
    pub fn unregister_domain(&self, domain: &str) -> usize {
        let before = self.services.len();
        self.services.retain(|_, s| s.description.domain != domain);
        let count = before - self.services.len();
        debug!(count, "Unregistered domain services");
        count
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn describe(domain: &str, service: &str, supports_response: SupportsResponse) -> ServiceDescription {
        ServiceDescription {
            domain: domain.to_string(),
            service: service.to_string(),
            name: None,
            description: None,
            schema: None,
            supports_response,
        }
    }

    fn register_noop(registry: &ServiceRegistry, domain: &str, service: &str) {
        registry.register_with_description(
            describe(domain, service, SupportsResponse::None),
            |_: ServiceCall| async { Ok(None) },
        );
    }

    #[tokio::test]
    async fn test_register_and_call() {
        let registry = ServiceRegistry::new();
        registry.register_with_description(
            describe("number", "echo", SupportsResponse::Optional),
            |call: ServiceCall| async move { Ok(Some(call.service_data)) },
        );

        let result = registry
            .call("number", "echo", json!({"value": 55}), Context::new(), true)
            .await
            .unwrap();
        assert_eq!(result, Some(json!({"value": 55})));

        let result = registry
            .call("number", "echo", json!({"value": 55}), Context::new(), false)
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_service_not_found() {
        let registry = ServiceRegistry::new();

        let result = registry
            .call("switch", "explode", json!({}), Context::new(), false)
            .await;

        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_service_without_response() {
        let registry = ServiceRegistry::new();
        register_noop(&registry, "switch", "turn_on");

        let result = registry
            .call("switch", "turn_on", json!({}), Context::new(), false)
            .await;
        assert!(result.is_ok());

        let result = registry
            .call("switch", "turn_on", json!({}), Context::new(), true)
            .await;
        assert!(matches!(result, Err(ServiceError::ResponseNotSupported)));
    }

    #[test]
    fn test_unregister_domain() {
        let registry = ServiceRegistry::new();
        for service in ["turn_on", "turn_off", "toggle"] {
            register_noop(&registry, "switch", service);
        }
        register_noop(&registry, "number", "set_value");

        assert_eq!(
            registry.domain_services("switch"),
            vec!["toggle", "turn_off", "turn_on"]
        );
        assert_eq!(registry.unregister_domain("switch"), 3);
        assert!(!registry.has_service("switch", "turn_on"));
        assert!(registry.has_service("number", "set_value"));
        assert_eq!(registry.unregister_domain("switch"), 0);
    }

    #[tokio::test]
    async fn test_handler_error_is_returned() {
        let registry = ServiceRegistry::new();
        registry.register_with_description(
            describe("switch", "turn_off", SupportsResponse::None),
            |_: ServiceCall| async move {
                Err(ServiceError::CallFailed(
                    "Failed to apply the setting: (SDK.Error.Busy)".to_string(),
                ))
            },
        );

        let result = registry
            .call("switch", "turn_off", json!({}), Context::new(), false)
            .await;

        match result {
            Err(ServiceError::CallFailed(message)) => assert!(message.contains("SDK.Error.Busy")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
