//! Hook system: registry, dispatcher, and typed hook definitions.

pub mod definitions;
pub mod dispatcher;
pub mod registry;

pub use definitions::{
    HookArgs, HookDefinition, HookKind, ParallelReport, Tap, TapHandler, TapOptions, TapOutcome,
    TapResult,
};
pub use dispatcher::HookDispatcher;
pub use registry::HookRegistry;
