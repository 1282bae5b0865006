//! Startup-time check that every required service can be constructed.

use tracing::{debug, info, instrument};

use super::registry::{Capability, ServiceRegistry, ServiceResolver};
use crate::error::{ErrorCode, IgniteError, Result};

pub struct ServiceRegistryValidator;

impl ServiceRegistryValidator {
    /// Resolve each capability, in order, inside a throwaway validation scope.
    ///
    /// Fails on the first capability that is not registered or whose
    /// construction fails. Nothing built here is cached in the registry.
    #[instrument(skip_all, fields(capabilities = required.len()))]
    pub fn validate(registry: &ServiceRegistry, required: &[Capability]) -> Result<()> {
        let scope = registry.validation_scope();

        for capability in required {
            match scope.resolve_any(capability.type_id(), capability.type_name()) {
                Ok(Some(_)) => {
                    debug!(service = capability.type_name(), "Service resolved");
                }
                Ok(None) => {
                    let error = IgniteError::service_not_registered(capability.type_name());
                    error.log();
                    return Err(error);
                }
                Err(e) => {
                    let error = IgniteError::new(
                        ErrorCode::ServiceResolutionFailed,
                        format!("Required service '{}' could not be resolved", capability.type_name()),
                    )
                    .with_context("service", capability.type_name())
                    .with_source(e);
                    error.log();
                    return Err(error);
                }
            }
        }

        info!(count = required.len(), "Service registry validated");
        Ok(())
    }
}
