//! Type-keyed service registry with singleton, scoped and transient lifetimes.
//!
//! Startup tasks receive a scope through [`StartupContext`](crate::startup::StartupContext)
//! and resolve their collaborators from it:
//!
//! ```rust,ignore
//! let mut registry = ServiceRegistry::new();
//! registry.add_instance(Settings::default());
//! registry.add_scoped(|resolver| {
//!     let settings = resolver.get_required::<Settings>()?;
//!     Ok(UnitOfWork::new(&settings))
//! });
//!
//! let scope = registry.create_scope();
//! let uow = scope.get_required::<UnitOfWork>()?;
//! ```

use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ErrorCode, IgniteError, Result};

/// A resolved service instance.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

type Factory = Arc<dyn Fn(&dyn ServiceResolver) -> Result<ServiceInstance> + Send + Sync>;

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLifetime {
    /// One instance for the whole registry
    Singleton,
    /// One instance per scope
    Scoped,
    /// A new instance on every resolution
    Transient,
}

struct Registration {
    lifetime: ServiceLifetime,
    type_name: &'static str,
    factory: Factory,
}

/// Something that can resolve services by type.
pub trait ServiceResolver: Send + Sync {
    /// `Ok(None)` when nothing is registered for the type.
    fn resolve_any(&self, type_id: TypeId, type_name: &'static str) -> Result<Option<ServiceInstance>>;
}

/// Typed helpers over [`ServiceResolver`].
pub trait ServiceResolverExt {
    fn get_required<T: Any + Send + Sync>(&self) -> Result<Arc<T>>;
    fn get_optional<T: Any + Send + Sync>(&self) -> Result<Option<Arc<T>>>;
}

impl<R: ServiceResolver + ?Sized> ServiceResolverExt for R {
    fn get_required<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let type_name = std::any::type_name::<T>();
        self.get_optional::<T>()?
            .ok_or_else(|| IgniteError::service_not_registered(type_name))
    }

    fn get_optional<T: Any + Send + Sync>(&self) -> Result<Option<Arc<T>>> {
        let type_name = std::any::type_name::<T>();
        match self.resolve_any(TypeId::of::<T>(), type_name)? {
            None => Ok(None),
            Some(instance) => instance.downcast::<T>().map(Some).map_err(|_| {
                IgniteError::new(
                    ErrorCode::ServiceResolutionFailed,
                    format!("Registered instance for '{}' has the wrong type", type_name),
                )
            }),
        }
    }
}

/// A service type the application needs, captured for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    type_id: TypeId,
    type_name: &'static str,
}

impl Capability {
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

struct RegistryInner {
    registrations: HashMap<TypeId, Registration>,
    singletons: DashMap<TypeId, ServiceInstance>,
}

/// Service registrations plus the root singleton cache.
///
/// Registration takes `&mut self` and happens before the registry is shared;
/// resolution goes through the registry itself (singletons and transients)
/// or through a [`ServiceScope`].
#[derive(Clone)]
pub struct ServiceRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                registrations: HashMap::new(),
                singletons: DashMap::new(),
            }),
        }
    }

    fn register<T, F>(&mut self, lifetime: ServiceLifetime, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&dyn ServiceResolver) -> Result<T> + Send + Sync + 'static,
    {
        let registration = Registration {
            lifetime,
            type_name: std::any::type_name::<T>(),
            factory: Arc::new(move |resolver: &dyn ServiceResolver| {
                factory(resolver).map(|value| Arc::new(value) as ServiceInstance)
            }),
        };
        self.insert(TypeId::of::<T>(), registration, None)
    }

    fn insert(
        &mut self,
        type_id: TypeId,
        registration: Registration,
        prebuilt: Option<ServiceInstance>,
    ) -> &mut Self {
        // Registrations only happen before the registry is cloned or scoped.
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => {
                inner.registrations.insert(type_id, registration);
                match prebuilt {
                    Some(instance) => {
                        inner.singletons.insert(type_id, instance);
                    }
                    None => {
                        inner.singletons.remove(&type_id);
                    }
                }
            }
            None => {
                tracing::error!(
                    service = registration.type_name,
                    "Service registered after the registry was shared; ignored"
                );
                #[cfg(debug_assertions)]
                panic!(
                    "service '{}' registered after the registry was shared",
                    registration.type_name
                );
            }
        }
        self
    }

    pub fn add_singleton<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&dyn ServiceResolver) -> Result<T> + Send + Sync + 'static,
    {
        self.register(ServiceLifetime::Singleton, factory)
    }

    pub fn add_scoped<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&dyn ServiceResolver) -> Result<T> + Send + Sync + 'static,
    {
        self.register(ServiceLifetime::Scoped, factory)
    }

    pub fn add_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&dyn ServiceResolver) -> Result<T> + Send + Sync + 'static,
    {
        self.register(ServiceLifetime::Transient, factory)
    }

    /// Register an existing value as a singleton.
    pub fn add_instance<T>(&mut self, value: T) -> &mut Self
    where
        T: Any + Send + Sync,
    {
        let instance: ServiceInstance = Arc::new(value);
        let registration = Registration {
            lifetime: ServiceLifetime::Singleton,
            type_name: std::any::type_name::<T>(),
            factory: {
                let instance = instance.clone();
                Arc::new(move |_: &dyn ServiceResolver| Ok(instance.clone()))
            },
        };
        self.insert(TypeId::of::<T>(), registration, Some(instance))
    }

    pub fn is_registered<T: Any>(&self) -> bool {
        self.inner.registrations.contains_key(&TypeId::of::<T>())
    }

    pub fn lifetime_of<T: Any>(&self) -> Option<ServiceLifetime> {
        self.inner
            .registrations
            .get(&TypeId::of::<T>())
            .map(|r| r.lifetime)
    }

    pub fn len(&self) -> usize {
        self.inner.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registrations.is_empty()
    }

    /// A scope whose singletons are shared with the root.
    pub fn create_scope(&self) -> ServiceScope {
        ServiceScope {
            inner: Arc::clone(&self.inner),
            scoped: DashMap::new(),
            local_singletons: None,
        }
    }

    /// A throwaway scope: singletons it builds are dropped with it and never
    /// cached in the root.
    pub fn validation_scope(&self) -> ServiceScope {
        ServiceScope {
            inner: Arc::clone(&self.inner),
            scoped: DashMap::new(),
            local_singletons: Some(DashMap::new()),
        }
    }
}

impl ServiceResolver for ServiceRegistry {
    fn resolve_any(&self, type_id: TypeId, type_name: &'static str) -> Result<Option<ServiceInstance>> {
        let Some(registration) = self.inner.registrations.get(&type_id) else {
            return Ok(None);
        };
        match registration.lifetime {
            ServiceLifetime::Singleton => {
                get_or_build(&self.inner.singletons, type_id, registration, self).map(Some)
            }
            ServiceLifetime::Transient => build(registration, self).map(Some),
            ServiceLifetime::Scoped => Err(IgniteError::new(
                ErrorCode::ServiceResolutionFailed,
                format!("Scoped service '{}' cannot be resolved from the root registry", type_name),
            )),
        }
    }
}

/// A resolution scope.
pub struct ServiceScope {
    inner: Arc<RegistryInner>,
    scoped: DashMap<TypeId, ServiceInstance>,
    local_singletons: Option<DashMap<TypeId, ServiceInstance>>,
}

impl ServiceScope {
    /// Whether singletons built here stay out of the root cache.
    pub fn is_validation(&self) -> bool {
        self.local_singletons.is_some()
    }
}

impl ServiceResolver for ServiceScope {
    fn resolve_any(&self, type_id: TypeId, _type_name: &'static str) -> Result<Option<ServiceInstance>> {
        let Some(registration) = self.inner.registrations.get(&type_id) else {
            return Ok(None);
        };
        let instance = match registration.lifetime {
            ServiceLifetime::Singleton => match &self.local_singletons {
                Some(local) => match self.inner.singletons.get(&type_id) {
                    Some(existing) => existing.clone(),
                    None => get_or_build(local, type_id, registration, self)?,
                },
                None => get_or_build(&self.inner.singletons, type_id, registration, self)?,
            },
            ServiceLifetime::Scoped => get_or_build(&self.scoped, type_id, registration, self)?,
            ServiceLifetime::Transient => build(registration, self)?,
        };
        Ok(Some(instance))
    }
}

fn build(registration: &Registration, resolver: &dyn ServiceResolver) -> Result<ServiceInstance> {
    (registration.factory)(resolver).map_err(|e| {
        IgniteError::new(
            ErrorCode::ServiceResolutionFailed,
            format!("Failed to construct service '{}'", registration.type_name),
        )
        .with_source(e)
    })
}

/// Build outside the map lock so factories may resolve their own dependencies.
fn get_or_build(
    cache: &DashMap<TypeId, ServiceInstance>,
    type_id: TypeId,
    registration: &Registration,
    resolver: &dyn ServiceResolver,
) -> Result<ServiceInstance> {
    if let Some(existing) = cache.get(&type_id) {
        return Ok(existing.clone());
    }
    let built = build(registration, resolver)?;
    Ok(cache.entry(type_id).or_insert(built).clone())
}
