#![allow(clippy::result_large_err)]
//! Sceneflow engine -- runs compiled scene models as per-user sessions.
//!
//! The engine consumes an [`ExecutableModel`](sceneflow_core::ExecutableModel)
//! (compiled from script source or loaded from JSON), and drives one
//! session per user through its scenes: rendering content and keyboards
//! into a host-provided sink, running named hooks, resolving `back` and
//! `next`, handling free-text entries and the inactivity timeout.
//!
//! Host integration points are traits ([`RenderSink`], [`Transport`],
//! [`VariableResolver`], [`TimerService`]) so the same flow can run behind
//! a chat bot, a terminal, or a test recorder.

pub mod error;
pub mod escape;
pub mod hooks;
pub mod host;
pub mod script_data;
pub mod session;
pub mod template;
pub mod timer;
pub mod variables;

pub use error::{HostError, LoadError, RuntimeError};
pub use hooks::{HookContext, HookFn, HookRegistry};
pub use host::{
    ButtonView, Host, MessageRef, RenderSink, StyledText, Transport, UserInfo, VariableResolver,
};
pub use script_data::ScriptData;
pub use session::{Flow, Outcome, SessionHandle, SessionSnapshot, TimeoutPrompt};
pub use template::TemplateEngine;
pub use timer::{NoTimer, TimerCallback, TimerService, TokioTimer};
