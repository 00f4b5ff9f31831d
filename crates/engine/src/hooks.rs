//! Named hook registry.
//!
//! Scene hook lists (`on_enter { track("x") }`) name host behaviour by
//! string. A flow maps those names to closures registered up front, so an
//! unknown name is a lookup miss rather than a reflection failure.

use crate::error::{HostError, RuntimeError};
use crate::host::UserInfo;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Hook body: receives the session view and the already-templated arguments
/// (empty when the call was written without parentheses).
pub type HookFn = Arc<dyn Fn(&mut HookContext<'_>, &[Value]) -> Result<(), HostError> + Send + Sync>;

/// What a hook may see and change while it runs.
pub struct HookContext<'a> {
    pub scene: &'a str,
    pub event: &'a str,
    pub user: &'a UserInfo,
    pub entry: Option<&'a str>,
    template_context: &'a mut Map<String, Value>,
    remove_timeout: bool,
}

impl<'a> HookContext<'a> {
    pub fn new(
        scene: &'a str,
        event: &'a str,
        user: &'a UserInfo,
        entry: Option<&'a str>,
        template_context: &'a mut Map<String, Value>,
    ) -> Self {
        HookContext {
            scene,
            event,
            user,
            entry,
            template_context,
            remove_timeout: false,
        }
    }

    /// Set a value visible to expression templates for the rest of the session.
    pub fn set_context(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.template_context.insert(key.into(), value.into());
    }

    pub fn context(&self) -> &Map<String, Value> {
        self.template_context
    }

    /// Ask the session to disarm its inactivity timer after this render.
    pub fn remove_timeout(&mut self) {
        self.remove_timeout = true;
    }

    pub fn timeout_removed(&self) -> bool {
        self.remove_timeout
    }
}

#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<String, HookFn>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.hooks.keys().collect();
        names.sort();
        f.debug_struct("HookRegistry").field("hooks", &names).finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn(&mut HookContext<'_>, &[Value]) -> Result<(), HostError> + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }

    /// Invoke `method`. Failures carry the method name and arguments.
    pub fn call(&self, method: &str, ctx: &mut HookContext<'_>, args: &[Value]) -> Result<(), RuntimeError> {
        let hook = self.hooks.get(method).ok_or_else(|| RuntimeError::UnknownHook {
            method: method.to_owned(),
        })?;
        hook(ctx, args).map_err(|e| RuntimeError::HookFailed {
            method: method.to_owned(),
            args: args.to_vec(),
            message: e.0,
        })
    }
}
