//! Service registry and startup validation of required capabilities.

mod registry;
mod validator;

pub use registry::{
    Capability, ServiceInstance, ServiceLifetime, ServiceRegistry, ServiceResolver,
    ServiceResolverExt, ServiceScope,
};
pub use validator::ServiceRegistryValidator;
