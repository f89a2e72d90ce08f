//! Service descriptors, instances and dependency declarations.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::OnceCell;

/// A type-erased service instance.
///
/// Cloning is cheap and preserves identity: two clones of a singleton
/// compare equal under [`ServiceInstance::ptr_eq`].
#[derive(Clone)]
pub struct ServiceInstance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    destroy: Option<Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>>,
}

impl ServiceInstance {
    /// Wraps a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an already shared value.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            type_name: type_name::<T>(),
            destroy: None,
        }
    }

    /// Attaches a teardown callback run when the service is unregistered.
    pub fn with_destroy<F>(mut self, destroy: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.destroy = Some(Arc::new(destroy));
        self
    }

    /// Returns the value as `T`, or `None` if it is another type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    /// Name of the wrapped type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &ServiceInstance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    pub(crate) fn destroy(&self) -> anyhow::Result<()> {
        match &self.destroy {
            Some(destroy) => destroy(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("type", &self.type_name)
            .field("has_destroy", &self.destroy.is_some())
            .finish()
    }
}

/// A declared dependency of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Service name to resolve.
    pub name: String,
    /// Key under which the factory sees it. Defaults to `name`.
    pub alias: Option<String>,
    /// Resolve to `None` instead of failing.
    pub optional: bool,
}

impl Dependency {
    /// A required dependency.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            optional: false,
        }
    }

    /// An optional dependency.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            optional: true,
            ..Self::new(name)
        }
    }

    /// Exposes the dependency under `alias`.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Key in [`ResolvedDeps`].
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl From<&str> for Dependency {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Dependency {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Registration options for a service.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Cache the first instance.
    pub singleton: bool,
    /// Services resolved before the factory runs.
    pub dependencies: Vec<Dependency>,
    /// Defer construction of a singleton to the first `get`.
    pub lazy: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            singleton: true,
            dependencies: Vec::new(),
            lazy: false,
        }
    }
}

impl ServiceOptions {
    /// A new instance per `get`.
    pub fn transient() -> Self {
        Self {
            singleton: false,
            ..Self::default()
        }
    }

    /// A singleton built on first use.
    pub fn lazy() -> Self {
        Self {
            lazy: true,
            ..Self::default()
        }
    }

    /// Adds a dependency.
    pub fn depends_on(mut self, dependency: impl Into<Dependency>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }
}

/// Dependencies handed to a factory, keyed by alias.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDeps {
    slots: HashMap<String, Option<ServiceInstance>>,
}

impl ResolvedDeps {
    pub(crate) fn insert(&mut self, key: &str, instance: Option<ServiceInstance>) {
        self.slots.insert(key.to_string(), instance);
    }

    /// The instance under `key`; `None` for missing or unresolved optional
    /// dependencies.
    pub fn get(&self, key: &str) -> Option<&ServiceInstance> {
        self.slots.get(key).and_then(Option::as_ref)
    }

    /// The instance under `key` as `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key).and_then(ServiceInstance::downcast::<T>)
    }

    /// Like [`get_as`](Self::get_as) but fails with a descriptive error.
    pub fn require<T: Any + Send + Sync>(&self, key: &str) -> anyhow::Result<Arc<T>> {
        self.get_as::<T>(key).ok_or_else(|| {
            anyhow::anyhow!("dependency '{key}' is missing or not a {}", type_name::<T>())
        })
    }

    /// Whether a slot exists for `key`, resolved or not.
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }
}

type FactoryFn = dyn Fn(ResolvedDeps) -> BoxFuture<'static, anyhow::Result<ServiceInstance>> + Send + Sync;

/// Builds service instances from resolved dependencies.
#[derive(Clone)]
pub struct ServiceFactory(Arc<FactoryFn>);

impl ServiceFactory {
    /// Wraps a synchronous factory.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(ResolvedDeps) -> anyhow::Result<ServiceInstance> + Send + Sync + 'static,
    {
        Self(Arc::new(move |deps| futures::future::ready(f(deps)).boxed()))
    }

    /// Wraps an async factory.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(ResolvedDeps) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ServiceInstance>> + Send + 'static,
    {
        Self(Arc::new(move |deps| f(deps).boxed()))
    }

    /// Factory that hands out clones of one value.
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        let instance = ServiceInstance::new(value);
        Self::sync(move |_| Ok(instance.clone()))
    }

    pub(crate) async fn create(&self, deps: ResolvedDeps) -> anyhow::Result<ServiceInstance> {
        (self.0)(deps).await
    }
}

impl fmt::Debug for ServiceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceFactory")
    }
}

/// A registered service.
#[derive(Debug)]
pub(crate) struct ServiceDescriptor {
    pub name: String,
    pub factory: ServiceFactory,
    pub singleton: bool,
    pub dependencies: Vec<Dependency>,
    pub lazy: bool,
    /// Populated once for singletons.
    pub instance: OnceCell<ServiceInstance>,
}

impl ServiceDescriptor {
    pub fn new(name: &str, factory: ServiceFactory, options: ServiceOptions) -> Self {
        Self {
            name: name.to_string(),
            factory,
            singleton: options.singleton,
            dependencies: options.dependencies,
            lazy: options.lazy,
            instance: OnceCell::new(),
        }
    }
}
