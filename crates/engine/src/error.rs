/// Per-event runtime failures. None of these end a session: the render
/// boundary logs the detail, shows a generic failure to the user, and the
/// next event is handled normally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// A hook list names a method that is not in the flow's registry.
    #[error("hook method '{method}' is not registered")]
    UnknownHook { method: String },

    /// A registered hook returned an error.
    #[error("hook '{method}' failed with args {args:?}: {message}")]
    HookFailed {
        method: String,
        args: Vec<serde_json::Value>,
        message: String,
    },

    /// The expression engine rejected a template or its rendering failed.
    #[error("template error: {0}")]
    Template(String),

    /// A transition named a scene the model does not contain.
    #[error("unknown scene '{0}'")]
    UnknownScene(String),

    /// A loaded executable model is structurally inconsistent.
    #[error("invalid executable model: {0}")]
    Model(String),

    /// The host failed to deliver a render, handoff or redirect.
    #[error("host error: {0}")]
    Host(#[from] HostError),
}

/// Failure reported by host code (render sink, transport or a hook body).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        HostError(message.into())
    }
}

/// Failure to turn source text or a stored model into a runnable flow.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Script(#[from] sceneflow_core::ScriptError),
    #[error(transparent)]
    Model(#[from] RuntimeError),
}
