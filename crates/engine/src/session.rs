//! Scene sessions.
//!
//! A [`Flow`] is a compiled script plus everything shared by its sessions
//! (hook registry, expression templates, timeout prompt). Starting a flow
//! yields a [`SessionHandle`]: one user's walk through the scenes, driven by
//! button clicks, submitted text and timer firings.
//!
//! Key invariant: the executable model is immutable and shared; all mutable
//! state lives in the session's own [`ScriptData`]. Events for one session
//! are serialized by its mutex and every render runs to completion before
//! the next event is accepted.

use crate::error::{LoadError, RuntimeError};
use crate::hooks::{HookContext, HookRegistry};
use crate::host::{ButtonView, Host, MessageRef, StyledText, UserInfo};
use crate::script_data::{script_data_factory, ScriptData, ScriptDataFactory};
use crate::template::{self, TemplateEngine, VariableScope};
use crate::timer::TimerService;
use crate::variables::{builtin, value_to_text, BUILTIN_NAMES};
use parking_lot::Mutex;
use sceneflow_core::{
    compile, ButtonAction, Content, ExecutableModel, HookCall, ParseMode, Scene, SceneRef,
    TemplateKind,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MESSAGE: &str = "👋 Are you still there?";
pub const DEFAULT_TIMEOUT_LABEL: &str = "Yes, I'm here ✓";
/// Shown to the user whenever an event fails at runtime.
pub const FAILURE_SUMMARY: &str = "🤷 Something went wrong...";

/// Result of delivering one event to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A scene (or the timeout prompt) was rendered and committed.
    Rendered,
    /// Text was passed to the host for re-submission.
    Redirected,
    /// Control moved to another handler; the session is disengaged.
    HandedOff,
    /// The event did not apply (unknown button, no entry listener, stale timer).
    Ignored,
    /// The event failed; the user saw a generic failure and the session continues.
    Failed(RuntimeError),
}

/// Prompt appended to the current message when the inactivity timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutPrompt {
    pub message: String,
    pub label: String,
}

impl Default for TimeoutPrompt {
    fn default() -> Self {
        TimeoutPrompt {
            message: DEFAULT_TIMEOUT_MESSAGE.to_owned(),
            label: DEFAULT_TIMEOUT_LABEL.to_owned(),
        }
    }
}

// ──────────────────────────────────────────────
// Flow
// ──────────────────────────────────────────────

#[derive(Clone)]
pub struct Flow {
    model: Arc<ExecutableModel>,
    factory: ScriptDataFactory,
    hooks: HookRegistry,
    templates: Arc<TemplateEngine>,
    prompt: TimeoutPrompt,
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("scenes", &self.model.order)
            .field("hooks", &self.hooks)
            .field("prompt", &self.prompt)
            .finish()
    }
}

impl Flow {
    /// Compile script source into a flow.
    pub fn compile(source: &str) -> Result<Flow, LoadError> {
        let model = compile(source)?;
        Ok(Flow::from_model(model)?)
    }

    /// Wrap an already built (or deserialized) model after checking it.
    pub fn from_model(model: ExecutableModel) -> Result<Flow, RuntimeError> {
        let model = Arc::new(model);
        let factory = script_data_factory(Arc::clone(&model))?;
        Ok(Flow {
            model,
            factory,
            hooks: HookRegistry::new(),
            templates: Arc::new(TemplateEngine::new()),
            prompt: TimeoutPrompt::default(),
        })
    }

    pub fn with_hook<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut HookContext<'_>, &[Value]) -> Result<(), crate::error::HostError>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.register(name, hook);
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_templates(mut self, templates: TemplateEngine) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    /// Defaults for the timeout prompt; the script's `timeout_message` and
    /// `timeout_label` still take precedence.
    pub fn with_timeout_prompt(mut self, message: impl Into<String>, label: impl Into<String>) -> Self {
        self.prompt = TimeoutPrompt {
            message: message.into(),
            label: label.into(),
        };
        self
    }

    pub fn model(&self) -> &ExecutableModel {
        &self.model
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Start a session and render its first scene. An unknown or missing
    /// `initial_scene` starts at `main`.
    pub fn start(
        &self,
        host: Box<dyn Host>,
        timer: Box<dyn TimerService>,
        user: UserInfo,
        initial_scene: Option<&str>,
    ) -> (SessionHandle, Outcome) {
        let flow = self.clone();
        let inner = Arc::new_cyclic(|this| {
            Mutex::new(Session {
                data: (flow.factory)(),
                flow,
                host,
                timer,
                user,
                template_context: Map::new(),
                actions: Vec::new(),
                generation: 0,
                timer_armed: false,
                timeouts_enabled: true,
                engaged: true,
                last_message: None,
                this: this.clone(),
            })
        });
        let handle = SessionHandle { inner };
        let outcome = handle.inner.lock().start(initial_scene);
        (handle, outcome)
    }
}

// ──────────────────────────────────────────────
// Session
// ──────────────────────────────────────────────

/// What pressing a rendered callback button does.
#[derive(Debug, Clone, PartialEq)]
enum PendingAction {
    Navigate(SceneRef),
    Return(String),
    Suggest { scene: SceneRef, entry: String },
    Redirect(String),
    Handoff(String),
    /// The timeout prompt's button.
    Continue,
}

impl PendingAction {
    fn from_button(action: &ButtonAction) -> Option<Self> {
        match action {
            ButtonAction::Scene(target) => Some(PendingAction::Navigate(target.clone())),
            ButtonAction::Return(target) => Some(PendingAction::Return(target.clone())),
            ButtonAction::Suggest { scene, entry } => Some(PendingAction::Suggest {
                scene: scene.clone(),
                entry: entry.clone(),
            }),
            ButtonAction::Redirect(text) => Some(PendingAction::Redirect(text.clone())),
            ButtonAction::Handoff(handler) => Some(PendingAction::Handoff(handler.clone())),
            ButtonAction::Link(_) => None,
        }
    }
}

pub struct Session {
    flow: Flow,
    data: ScriptData,
    host: Box<dyn Host>,
    timer: Box<dyn TimerService>,
    user: UserInfo,
    template_context: Map<String, Value>,
    /// Callback buttons of the last committed render, by label.
    actions: Vec<(String, PendingAction)>,
    /// Incremented on every arm/disarm; a firing from an older generation is stale.
    generation: u64,
    timer_armed: bool,
    timeouts_enabled: bool,
    /// Cleared by a handoff; a disengaged session ignores further events.
    engaged: bool,
    last_message: Option<MessageRef>,
    this: Weak<Mutex<Session>>,
}

/// Session state an event may change before its render commits; restored
/// when the render fails so the session matches what the user still sees.
struct Checkpoint {
    history: Vec<String>,
    entry: Option<String>,
    actions: Vec<(String, PendingAction)>,
}

/// Read-only view of a session for inspection and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub current_scene: String,
    pub history: Vec<String>,
    pub entry: Option<String>,
    pub buttons: Vec<String>,
    pub executed_once_hooks: Vec<String>,
    pub timer_armed: bool,
    pub timer_generation: u64,
    pub engaged: bool,
}

/// Variable lookups for one template application inside a session.
struct SessionScope<'a> {
    data: &'a mut ScriptData,
    host: &'a dyn Host,
    user: &'a UserInfo,
    context: &'a Map<String, Value>,
}

impl VariableScope for SessionScope<'_> {
    fn lookup(&mut self, name: &str) -> Option<String> {
        if let Some(value) = self.data.static_vars.get(name).filter(|v| !v.is_null()) {
            return Some(value_to_text(value));
        }
        if let Some(value) = self.host.resolve(name) {
            return Some(value);
        }
        builtin(name, self.data, self.user)
    }

    fn context(&mut self) -> Map<String, Value> {
        let mut map = Map::new();
        for name in BUILTIN_NAMES {
            if let Some(value) = builtin(name, self.data, self.user) {
                map.insert(name.to_owned(), Value::String(value));
            }
        }
        for (k, v) in &self.data.static_vars {
            map.insert(k.clone(), v.clone());
        }
        for (k, v) in self.context {
            map.insert(k.clone(), v.clone());
        }
        map
    }
}

impl Session {
    fn start(&mut self, initial_scene: Option<&str>) -> Outcome {
        let target = initial_scene
            .filter(|name| self.data.scene(name).is_some())
            .unwrap_or("main")
            .to_owned();
        tracing::info!(
            user_id = self.user.user_id,
            scene = %target,
            "session started"
        );
        let before = self.checkpoint();
        self.render(SceneRef::Named(target), before)
    }

    fn snapshot(&self) -> SessionSnapshot {
        let mut once: Vec<String> = self.data.executed_once_hooks.iter().cloned().collect();
        once.sort();
        SessionSnapshot {
            current_scene: self.data.current_scene_name().to_owned(),
            history: self.data.history.clone(),
            entry: self.data.entry.clone(),
            buttons: self.actions.iter().map(|(label, _)| label.clone()).collect(),
            executed_once_hooks: once,
            timer_armed: self.timer_armed,
            timer_generation: self.generation,
            engaged: self.engaged,
        }
    }

    // ── Events ───────────────────────────────────────────────────────

    fn click(&mut self, label: &str) -> Outcome {
        if !self.engaged {
            return Outcome::Ignored;
        }
        let Some(action) = self
            .actions
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, a)| a.clone())
        else {
            tracing::debug!(label, "click on unknown button ignored");
            return Outcome::Ignored;
        };

        let before = self.checkpoint();
        match action {
            PendingAction::Navigate(target) => self.render(target, before),
            PendingAction::Return(target) => {
                self.data.rollback_to(&target);
                self.render(SceneRef::Named(target), before)
            }
            PendingAction::Suggest { scene, entry } => {
                self.data.entry = Some(entry);
                self.render(scene, before)
            }
            PendingAction::Redirect(text) => match self.host.redirect(&text) {
                Ok(()) => {
                    tracing::debug!(text = %text, "redirected");
                    Outcome::Redirected
                }
                Err(e) => self.fail(e.into()),
            },
            PendingAction::Handoff(handler) => {
                // a failed handoff leaves the session engaged on its scene
                if let Err(e) = self.host.handoff(&handler, self.last_message.as_ref()) {
                    return self.fail(e.into());
                }
                self.disarm_timer();
                self.engaged = false;
                self.host.set_entry_listener(false);
                tracing::info!(handler = %handler, "session handed off");
                Outcome::HandedOff
            }
            PendingAction::Continue => {
                let target = self.data.history.pop().unwrap_or_else(|| "main".to_owned());
                self.render(SceneRef::Named(target), before)
            }
        }
    }

    fn submit_text(&mut self, text: &str) -> Outcome {
        if !self.engaged {
            return Outcome::Ignored;
        }
        let target = match self.data.scene(self.data.current_scene_name()) {
            Some(scene) => scene
                .entries
                .get(text)
                .or(scene.default_entry_target.as_ref())
                .cloned(),
            None => None,
        };
        let Some(target) = target else {
            return Outcome::Ignored;
        };
        let before = self.checkpoint();
        self.data.entry = Some(text.to_owned());
        self.render(target, before)
    }

    fn fire_timeout(&mut self, generation: u64) -> Outcome {
        if !self.engaged || !self.timer_armed || generation != self.generation {
            tracing::warn!(
                generation,
                current = self.generation,
                "stale timer firing ignored"
            );
            return Outcome::Ignored;
        }
        self.timer_armed = false;
        match self.show_timeout_prompt() {
            Ok(()) => Outcome::Rendered,
            Err(e) => self.fail(e),
        }
    }

    fn remove_timeout(&mut self) {
        self.timeouts_enabled = false;
        self.disarm_timer();
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            history: self.data.history.clone(),
            entry: self.data.entry.clone(),
            actions: self.actions.clone(),
        }
    }

    /// Render `target`; on failure drop the staged parts and fall back to
    /// the state `before` the event.
    fn render(&mut self, target: SceneRef, before: Checkpoint) -> Outcome {
        match self.try_render(target) {
            Ok(()) => Outcome::Rendered,
            Err(e) => {
                self.host.discard();
                self.data.history = before.history;
                self.data.entry = before.entry;
                self.actions = before.actions;
                self.fail(e)
            }
        }
    }

    fn fail(&mut self, error: RuntimeError) -> Outcome {
        tracing::error!(
            scene = %self.data.current_scene_name(),
            error = %error,
            "event failed"
        );
        self.host.show_error(FAILURE_SUMMARY, &error.to_string());
        Outcome::Failed(error)
    }

    fn resolve_target(&mut self, target: SceneRef) -> String {
        match target {
            SceneRef::Back => self
                .data
                .pop_prev_scene_name()
                .unwrap_or_else(|| "main".to_owned()),
            SceneRef::Next => self.data.next_scene_name().unwrap_or("main").to_owned(),
            SceneRef::Named(name) => name,
        }
    }

    fn try_render(&mut self, target: SceneRef) -> Result<(), RuntimeError> {
        let name = self.resolve_target(target);
        let model = Arc::clone(self.data.model());
        let scene = model
            .scene(&name)
            .ok_or_else(|| RuntimeError::UnknownScene(name.clone()))?;

        self.data.history.push(name.clone());
        tracing::debug!(scene = %name, depth = self.data.history.len(), "rendering scene");
        let kind = self.data.template_kind(scene);

        if let Some(hooks) = &scene.on_enter {
            self.run_hooks(&name, "on_enter", hooks, kind)?;
        }
        if let Some(hooks) = &scene.on_enter_once {
            if !self.data.has_run_once(&name, "on_enter_once") {
                self.run_hooks(&name, "on_enter_once", hooks, kind)?;
                self.data.claim_once(&name, "on_enter_once");
            }
        }

        self.host.set_parse_mode(scene.parse_mode);
        self.host.set_italics(scene.use_italics);
        self.host.set_image(scene.image.as_deref());
        self.render_content(scene, kind)?;

        let (rows, actions) = self.keyboard(scene, kind)?;
        self.host.set_buttons(rows);
        self.actions = actions;

        if let Some(hooks) = &scene.on_exit {
            self.run_hooks(&name, "on_exit", hooks, kind)?;
        }

        self.last_message = Some(self.host.commit()?);
        self.host.set_entry_listener(scene.accepts_entries());
        self.data.entry = None;
        if !scene.keep_history {
            self.data.collapse_history(&name);
        }
        self.arm_timer();
        Ok(())
    }

    fn render_content(&mut self, scene: &Scene, kind: TemplateKind) -> Result<(), RuntimeError> {
        let mode = scene.parse_mode;
        // without an explicit parse mode the sink sanitizes the whole text
        let styled = |content: String| StyledText {
            content,
            sanitize: mode.is_none(),
        };
        match &scene.content {
            Content::Titled { title, message } => {
                let title = self.template(kind, title, mode)?;
                let message = self.template(kind, message, mode)?;
                self.host.set_title(styled(title));
                self.host.set_message(styled(message));
            }
            Content::Text { text } => {
                let text = self.template(kind, text, mode)?;
                self.host.set_text(styled(text));
            }
        }
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn keyboard(
        &mut self,
        scene: &Scene,
        kind: TemplateKind,
    ) -> Result<(Vec<Vec<ButtonView>>, Vec<(String, PendingAction)>), RuntimeError> {
        let mut views = Vec::with_capacity(scene.buttons.len());
        let mut actions = Vec::new();
        for button in &scene.buttons {
            let label = self.template(kind, &button.label, None)?;
            match (&button.action, PendingAction::from_button(&button.action)) {
                (ButtonAction::Link(url), _) => views.push(ButtonView::Link {
                    label,
                    url: url.clone(),
                }),
                (_, Some(action)) => {
                    actions.push((label.clone(), action));
                    views.push(ButtonView::Callback { label });
                }
                (_, None) => {}
            }
        }
        let width = scene.row_width.max(1) as usize;
        let rows = views.chunks(width).map(<[ButtonView]>::to_vec).collect();
        Ok((rows, actions))
    }

    fn show_timeout_prompt(&mut self) -> Result<(), RuntimeError> {
        let model = Arc::clone(self.data.model());
        let name = self.data.current_scene_name().to_owned();
        let scene = model
            .scene(&name)
            .ok_or_else(|| RuntimeError::UnknownScene(name.clone()))?;
        let kind = self.data.template_kind(scene);

        if let Some(hooks) = &scene.on_timeout {
            self.run_hooks(&name, "on_timeout", hooks, kind)?;
        }

        let message = model
            .config
            .timeout_message
            .clone()
            .unwrap_or_else(|| self.flow.prompt.message.clone());
        let message = self.template(kind, &message, scene.parse_mode)?;
        let label = model
            .config
            .timeout_label
            .clone()
            .unwrap_or_else(|| self.flow.prompt.label.clone());

        tracing::debug!(scene = %name, "showing timeout prompt");
        self.host.append_notice(
            StyledText::raw(message),
            ButtonView::Callback {
                label: label.clone(),
            },
        )?;
        self.actions = vec![(label, PendingAction::Continue)];
        Ok(())
    }

    fn template(
        &mut self,
        kind: TemplateKind,
        text: &str,
        mode: Option<ParseMode>,
    ) -> Result<String, RuntimeError> {
        let mut scope = SessionScope {
            data: &mut self.data,
            host: self.host.as_ref(),
            user: &self.user,
            context: &self.template_context,
        };
        template::apply(&self.flow.templates, kind, text, mode, &mut scope)
    }

    /// Run a hook list in order, templating string arguments. The first
    /// failure aborts the list.
    fn run_hooks(
        &mut self,
        scene: &str,
        event: &str,
        calls: &[HookCall],
        kind: TemplateKind,
    ) -> Result<(), RuntimeError> {
        for call in calls {
            let args = match &call.args {
                None => Vec::new(),
                Some(raw) => raw
                    .iter()
                    .map(|arg| match arg {
                        Value::String(s) => self.template(kind, s, None).map(Value::String),
                        other => Ok(other.clone()),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            };

            let entry = self.data.entry.clone();
            let mut ctx = HookContext::new(
                scene,
                event,
                &self.user,
                entry.as_deref(),
                &mut self.template_context,
            );
            let result = self.flow.hooks.call(&call.method, &mut ctx, &args);
            if ctx.timeout_removed() {
                self.timeouts_enabled = false;
            }

            if let Err(e) = result {
                tracing::error!(
                    method = %call.method,
                    args = ?args,
                    scene,
                    event,
                    error = %e,
                    "hook failed"
                );
                return Err(e);
            }
            tracing::debug!(method = %call.method, scene, event, "hook executed");
        }
        Ok(())
    }

    // ── Timer ────────────────────────────────────────────────────────

    fn disarm_timer(&mut self) {
        self.timer.disarm();
        self.generation += 1;
        self.timer_armed = false;
    }

    /// Replace any pending timer with a fresh one for the current scene.
    fn arm_timer(&mut self) {
        self.disarm_timer();
        if !self.timeouts_enabled {
            return;
        }
        let Some(seconds) = self.data.timeout_time() else {
            return;
        };
        let generation = self.generation;
        let this = self.this.clone();
        self.timer.arm(
            Duration::from_secs(seconds),
            Box::new(move || {
                if let Some(inner) = this.upgrade() {
                    SessionHandle { inner }.fire_timeout(generation);
                }
            }),
        );
        self.timer_armed = true;
    }
}

// ──────────────────────────────────────────────
// SessionHandle
// ──────────────────────────────────────────────

/// Shared handle to one session. Cloning is cheap; every entry point locks
/// the session for the duration of the event.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    /// Press the callback button labelled `label` in the current render.
    pub fn click(&self, label: &str) -> Outcome {
        self.inner.lock().click(label)
    }

    /// Deliver free text typed by the user.
    pub fn submit_text(&self, text: &str) -> Outcome {
        self.inner.lock().submit_text(text)
    }

    /// Entry point for timer callbacks. Firings from a generation that has
    /// since been disarmed are ignored.
    pub fn fire_timeout(&self, generation: u64) -> Outcome {
        self.inner.lock().fire_timeout(generation)
    }

    /// Disarm the inactivity timer for the rest of the session.
    pub fn remove_timeout(&self) {
        self.inner.lock().remove_timeout();
    }

    /// Replace the host-provided expression template context.
    pub fn set_template_context(&self, context: Map<String, Value>) {
        self.inner.lock().template_context = context;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn flow(&self) -> Flow {
        self.inner.lock().flow.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneflow_core::Button;

    #[test]
    fn link_buttons_have_no_pending_action() {
        let link = ButtonAction::Link("https://e.x".into());
        assert_eq!(PendingAction::from_button(&link), None);
        let back = Button {
            label: "« Back".into(),
            action: ButtonAction::Scene(SceneRef::Back),
        };
        assert_eq!(
            PendingAction::from_button(&back.action),
            Some(PendingAction::Navigate(SceneRef::Back))
        );
    }

    #[test]
    fn default_prompt_strings() {
        let prompt = TimeoutPrompt::default();
        assert_eq!(prompt.message, "👋 Are you still there?");
        assert_eq!(prompt.label, "Yes, I'm here ✓");
    }

    #[test]
    fn compile_errors_surface_as_load_errors() {
        let err = Flow::compile("@ faq { text = \"x\" }").unwrap_err();
        assert!(matches!(err, LoadError::Script(_)));
    }
}
