//! Hook access for plugins.

use plughub_core::result::KernelResult;

use crate::hooks::{HookDefinition, HookDispatcher, HookKind, TapHandler, TapOptions};

/// Hook view scoped to one plugin.
#[derive(Debug, Clone, Copy)]
pub struct ContextHooks<'a> {
    plugin: &'a str,
    dispatcher: &'a HookDispatcher,
}

impl<'a> ContextHooks<'a> {
    pub(crate) fn new(plugin: &'a str, dispatcher: &'a HookDispatcher) -> Self {
        Self { plugin, dispatcher }
    }

    /// Taps a hook on behalf of the plugin.
    pub fn tap(&self, hook: &str, handler: TapHandler, options: TapOptions) -> KernelResult<()> {
        self.dispatcher
            .registry()
            .tap(hook, self.plugin, handler, options)
    }

    /// Returns a hook's definition.
    pub fn get(&self, hook: &str) -> KernelResult<HookDefinition> {
        self.dispatcher.registry().get_hook(hook)
    }

    /// Creates a hook other plugins can tap.
    pub fn create<I, S>(&self, name: &str, kind: HookKind, param_names: I) -> KernelResult<HookDefinition>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dispatcher.registry().create_hook(name, kind, param_names)
    }

    /// Dispatcher for calling hooks.
    pub fn dispatcher(&self) -> &'a HookDispatcher {
        self.dispatcher
    }
}
