//! Service registry: a dependency-injection container keyed by name.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use plughub_core::error::KernelError;
use plughub_core::result::KernelResult;

use super::descriptor::{ResolvedDeps, ServiceDescriptor, ServiceFactory, ServiceInstance, ServiceOptions};
use super::interceptor::ServiceInterceptor;
use crate::guard::guarded;

/// Service registry counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Registered descriptors.
    pub registered: usize,
    /// Singletons that have been constructed.
    pub singletons_created: usize,
    /// Total factory invocations that succeeded.
    pub instantiations: u64,
}

/// Named services with dependency resolution.
#[derive(Default)]
pub struct ServiceRegistry {
    /// Service name → descriptor.
    descriptors: DashMap<String, Arc<ServiceDescriptor>>,
    /// Run around every instantiation.
    interceptors: RwLock<Vec<Arc<dyn ServiceInterceptor>>>,
    instantiations: AtomicU64,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service.
    ///
    /// An eager singleton (`!lazy && singleton`) is constructed before this
    /// returns; if that fails the registration is rolled back and the error
    /// returned.
    pub async fn register(
        &self,
        name: &str,
        factory: ServiceFactory,
        options: ServiceOptions,
    ) -> KernelResult<()> {
        let descriptor = Arc::new(ServiceDescriptor::new(name, factory, options));
        let eager = descriptor.singleton && !descriptor.lazy;

        match self.descriptors.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(KernelError::DuplicateService(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(descriptor.clone());
            }
        }

        info!(
            service = %name,
            singleton = descriptor.singleton,
            lazy = descriptor.lazy,
            dependencies = descriptor.dependencies.len(),
            "Service registered"
        );

        if eager {
            if let Err(e) = self.get(name).await {
                self.descriptors
                    .remove_if(name, |_, current| Arc::ptr_eq(current, &descriptor));
                warn!(service = %name, error = %e, "Eager construction failed, registration rolled back");
                return Err(e);
            }
        }

        Ok(())
    }

    /// Resolves a service and its dependencies.
    ///
    /// The declared dependency graph below `name` is checked for cycles
    /// before any singleton is claimed, so concurrent resolutions entering a
    /// cycle from different ends both fail instead of waiting on each other.
    pub async fn get(&self, name: &str) -> KernelResult<ServiceInstance> {
        self.check_cycles(name)?;
        self.resolve(name, Vec::new()).await
    }

    /// Resolves a service and downcasts it to `T`.
    pub async fn get_as<T: std::any::Any + Send + Sync>(&self, name: &str) -> KernelResult<Arc<T>> {
        self.get(name)
            .await?
            .downcast::<T>()
            .ok_or_else(|| KernelError::ServiceTypeMismatch {
                service: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Whether a service is registered.
    pub fn has(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.descriptors.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Removes a service, running its instance's destroy callback if one was
    /// built.
    pub fn unregister(&self, name: &str) -> KernelResult<()> {
        let (_, descriptor) = self
            .descriptors
            .remove(name)
            .ok_or_else(|| KernelError::UnknownService(name.to_string()))?;

        if let Some(instance) = descriptor.instance.get() {
            if let Err(e) = instance.destroy() {
                warn!(service = %name, error = %e, "Service destroy failed");
            }
        }

        info!(service = %name, "Service unregistered");
        Ok(())
    }

    /// Removes every service named `namespace.*`. Returns the count.
    pub fn unregister_namespace(&self, namespace: &str) -> usize {
        let prefix = format!("{namespace}.");
        let names: Vec<String> = self
            .descriptors
            .iter()
            .filter(|e| e.key().starts_with(&prefix))
            .map(|e| e.key().clone())
            .collect();

        names
            .iter()
            .filter(|name| self.unregister(name).is_ok())
            .count()
    }

    /// Adds an interceptor run around every subsequent instantiation.
    pub fn add_interceptor(&self, interceptor: Arc<dyn ServiceInterceptor>) {
        self.interceptors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(interceptor);
    }

    /// Current counters.
    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            registered: self.descriptors.len(),
            singletons_created: self
                .descriptors
                .iter()
                .filter(|e| e.value().instance.initialized())
                .count(),
            instantiations: self.instantiations.load(Ordering::Relaxed),
        }
    }

    /// Depth-first walk of declared dependencies. Unknown names are skipped
    /// here and reported by `resolve`.
    fn check_cycles(&self, root: &str) -> KernelResult<()> {
        fn visit(
            registry: &ServiceRegistry,
            name: &str,
            path: &mut Vec<String>,
            done: &mut HashSet<String>,
        ) -> KernelResult<()> {
            if done.contains(name) {
                return Ok(());
            }
            if let Some(start) = path.iter().position(|s| s == name) {
                let mut cycle = path[start..].to_vec();
                cycle.push(name.to_string());
                return Err(KernelError::CircularDependency { cycle });
            }
            let Some(descriptor) = registry.descriptors.get(name).map(|e| e.value().clone()) else {
                return Ok(());
            };

            path.push(name.to_string());
            for dependency in &descriptor.dependencies {
                visit(registry, &dependency.name, path, done)?;
            }
            path.pop();
            done.insert(name.to_string());
            Ok(())
        }

        visit(self, root, &mut Vec::new(), &mut HashSet::new())
    }

    /// `stack` holds the names currently being resolved, outermost first.
    fn resolve<'a>(
        &'a self,
        name: &'a str,
        mut stack: Vec<String>,
    ) -> BoxFuture<'a, KernelResult<ServiceInstance>> {
        async move {
            if let Some(start) = stack.iter().position(|s| s == name) {
                let mut cycle = stack.split_off(start);
                cycle.push(name.to_string());
                return Err(KernelError::CircularDependency { cycle });
            }

            let descriptor = self
                .descriptors
                .get(name)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| KernelError::UnknownService(name.to_string()))?;

            stack.push(name.to_string());

            if descriptor.singleton {
                descriptor
                    .instance
                    .get_or_try_init(|| self.instantiate(&descriptor, &stack))
                    .await
                    .cloned()
            } else {
                self.instantiate(&descriptor, &stack).await
            }
        }
        .boxed()
    }

    async fn instantiate(
        &self,
        descriptor: &ServiceDescriptor,
        stack: &[String],
    ) -> KernelResult<ServiceInstance> {
        let mut deps = ResolvedDeps::default();
        for dependency in &descriptor.dependencies {
            match self.resolve(&dependency.name, stack.to_vec()).await {
                Ok(instance) => deps.insert(dependency.key(), Some(instance)),
                Err(e) if dependency.optional && !e.is_cycle() => {
                    debug!(
                        service = %descriptor.name,
                        dependency = %dependency.name,
                        error = %e,
                        "Optional dependency unavailable"
                    );
                    deps.insert(dependency.key(), None);
                }
                Err(e) => return Err(e),
            }
        }

        let interceptors = self
            .interceptors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for interceptor in &interceptors {
            interceptor.before_create(&descriptor.name);
        }

        let started = Instant::now();
        let factory = descriptor.factory.clone();
        let instance = guarded(async move { factory.create(deps).await })
            .await
            .map_err(|e| KernelError::service_factory(&descriptor.name, e))?;

        for interceptor in &interceptors {
            interceptor.after_create(&descriptor.name, &instance, started.elapsed());
        }
        self.instantiations.fetch_add(1, Ordering::Relaxed);

        debug!(
            service = %descriptor.name,
            singleton = descriptor.singleton,
            "Service instantiated"
        );
        Ok(instance)
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish_non_exhaustive()
    }
}
