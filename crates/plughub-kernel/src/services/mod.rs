//! Service registry and dependency injection.

pub mod descriptor;
pub mod interceptor;
pub mod registry;

pub use descriptor::{Dependency, ResolvedDeps, ServiceFactory, ServiceInstance, ServiceOptions};
pub use interceptor::{ServiceInterceptor, TracingInterceptor};
pub use registry::{ServiceRegistry, ServiceStats};
