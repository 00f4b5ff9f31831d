//! `{{name}}` / `{{name:default}}` substitution for the `vars` engine and
//! the built-in variable table.

use crate::escape::escape;
use crate::host::UserInfo;
use crate::script_data::ScriptData;
use regex::{Captures, Regex};
use sceneflow_core::ParseMode;
use serde_json::Value;
use std::sync::LazyLock;

static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)(?::([^}]+))?\}\}").expect("variable pattern is valid"));

pub const BUILTIN_NAMES: [&str; 18] = [
    "first_name",
    "last_name",
    "full_name",
    "chat_id",
    "user_id",
    "username",
    "scene_name",
    "scene_title",
    "scene_message",
    "prev_scene_name",
    "prev_scene_title",
    "prev_scene_message",
    "next_scene_name",
    "next_scene_title",
    "next_scene_message",
    "scene_ref_count",
    "button_ref_count",
    "entry",
];

/// Replace every `{{name[:default]}}` in `template`. A non-empty looked-up
/// value is escaped for `mode`; otherwise the default is used verbatim, and
/// without a default the placeholder stays as written. Substituted text is
/// not scanned again.
pub fn substitute(
    template: &str,
    mode: Option<ParseMode>,
    mut lookup: impl FnMut(&str) -> Option<String>,
) -> String {
    VAR_RE
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match lookup(name).filter(|v| !v.is_empty()) {
                Some(value) => escape(&value, mode),
                None => match caps.get(2) {
                    Some(default) => default.as_str().to_owned(),
                    None => caps[0].to_owned(),
                },
            }
        })
        .into_owned()
}

/// Static variables hold arbitrary config values; render them as text.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Built-in variable value, or `None` if `name` is not built in or has no
/// value for this user/scene.
pub fn builtin(name: &str, data: &mut ScriptData, user: &UserInfo) -> Option<String> {
    let current = data.current_scene_name().to_owned();
    let prev = data.prev_scene_name().to_owned();
    let next = data.next_scene_name().map(str::to_owned);
    let next_or_main = next.clone().unwrap_or_else(|| "main".to_owned());

    let title_of = |data: &ScriptData, scene: &str| {
        data.scene(scene).and_then(|s| s.title()).map(str::to_owned)
    };
    let message_of = |data: &ScriptData, scene: &str| {
        data.scene(scene).and_then(|s| s.message()).map(str::to_owned)
    };

    match name {
        "first_name" => Some(user.first_name.clone()),
        "last_name" => user.last_name.clone(),
        "full_name" => Some(user.full_name()),
        "chat_id" => Some(user.chat_id.to_string()),
        "user_id" => Some(user.user_id.to_string()),
        "username" => user.username.clone(),
        "scene_name" => Some(current),
        "scene_title" => title_of(data, &current),
        "scene_message" => message_of(data, &current),
        "prev_scene_name" => Some(prev),
        "prev_scene_title" => title_of(data, &prev),
        "prev_scene_message" => message_of(data, &prev),
        "next_scene_name" => next,
        "next_scene_title" => title_of(data, &next_or_main),
        "next_scene_message" => message_of(data, &next_or_main),
        "scene_ref_count" => Some(data.scene_ref_count(&current).to_string()),
        "button_ref_count" => Some(data.button_ref_count(&current).to_string()),
        "entry" => data.entry.clone(),
        _ => None,
    }
}
