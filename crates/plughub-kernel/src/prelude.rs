//! Prelude for plugin authors.

pub use async_trait::async_trait;

pub use crate::api::context::PluginContext;
pub use crate::events::{EmitOptions, Event, ListenerOptions};
pub use crate::hooks::definitions::{HookArgs, HookKind, TapHandler, TapOptions};
pub use crate::kernel::{Kernel, RegisterOptions};
pub use crate::lazy::{LazyConditions, LoadContext};
pub use crate::lifecycle::{Plugin, PluginState};
pub use crate::services::{Dependency, ServiceFactory, ServiceInstance, ServiceOptions};
pub use crate::storage::SetOptions;

pub use plughub_core::error::KernelError;
pub use plughub_core::result::KernelResult;
