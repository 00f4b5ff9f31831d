//! Pass 3: Scene analysis -- required content, optional field types,
//! hook lists, entries, and normalization of raw button declarations into
//! typed [`ButtonAction`]s.

use crate::ast::{ButtonLabel, Provenance, RawButton, RawField, RawHookCall, RawValue, Trigger};
use crate::error::ScriptError;
use crate::model::{
    Button, ButtonAction, Content, HookCall, ParseMode, Scene, SceneRef, TemplateKind,
};
use crate::pass2_index::{SceneDecl, SceneIndex};
use std::collections::BTreeMap;

const SCENE_FIELDS: [&str; 13] = [
    "title",
    "message",
    "text",
    "image",
    "use_italics",
    "parse_mode",
    "template",
    "on_enter",
    "on_enter_once",
    "on_exit",
    "on_timeout",
    "buttons",
    "entries",
];

pub fn analyze_scenes(index: &SceneIndex<'_>) -> Result<Vec<Scene>, ScriptError> {
    index
        .decls
        .iter()
        .map(|decl| SceneAnalyzer { decl, index }.analyze())
        .collect()
}

struct SceneAnalyzer<'i, 'a> {
    decl: &'i SceneDecl<'a>,
    index: &'i SceneIndex<'a>,
}

impl<'i, 'a> SceneAnalyzer<'i, 'a> {
    fn name(&self) -> &str {
        &self.decl.name
    }

    fn err(&self, field: Option<&str>, prov: Provenance, msg: impl Into<String>) -> ScriptError {
        ScriptError::build(Some(self.name()), field, prov.line, msg)
    }

    fn field(&self, key: &str) -> Option<&'a RawField> {
        self.decl.fields.get(key)
    }

    fn type_err(&self, key: &str, raw: &RawField, expected: &str) -> ScriptError {
        self.err(
            Some(key),
            raw.prov,
            format!(
                "field '{}' in scene '@{}' must be of type {}, got {}",
                key,
                self.name(),
                expected,
                raw.value.type_name()
            ),
        )
    }

    fn opt_str(&self, key: &str) -> Result<Option<(&'a str, Provenance)>, ScriptError> {
        match self.field(key) {
            None => Ok(None),
            Some(raw) => match raw.value.as_str() {
                Some(s) => Ok(Some((s, raw.prov))),
                None => Err(self.type_err(key, raw, "string")),
            },
        }
    }

    fn non_empty(&self, key: &str) -> Result<Option<String>, ScriptError> {
        match self.opt_str(key)? {
            None => Ok(None),
            Some((s, prov)) if s.trim().is_empty() => Err(self.err(
                Some(key),
                prov,
                format!("scene '@{}' has an empty {}", self.name(), key),
            )),
            Some((s, _)) => Ok(Some(s.to_owned())),
        }
    }

    fn analyze(&self) -> Result<Scene, ScriptError> {
        for (key, raw) in self.decl.fields {
            if !SCENE_FIELDS.contains(&key.as_str()) {
                return Err(self.err(
                    Some(key),
                    raw.prov,
                    format!("unknown field '{}' in scene '@{}'", key, self.name()),
                ));
            }
        }

        let mut scene = Scene::new(self.name(), self.content()?);

        scene.image = self.opt_str("image")?.map(|(s, _)| s.to_owned());

        if let Some(raw) = self.field("use_italics") {
            match raw.value {
                RawValue::Bool(b) => scene.use_italics = b,
                _ => return Err(self.type_err("use_italics", raw, "boolean")),
            }
        }

        if let Some(raw) = self.field("parse_mode") {
            scene.parse_mode = match &raw.value {
                RawValue::None => None,
                value => {
                    let mode = value
                        .as_str()
                        .ok_or_else(|| self.type_err("parse_mode", raw, "string or none"))?;
                    Some(ParseMode::from_name(mode).ok_or_else(|| {
                        self.err(
                            Some("parse_mode"),
                            raw.prov,
                            format!(
                                "scene '@{}' has invalid parse_mode '{}'; use 'markdown' or 'html'",
                                self.name(),
                                mode
                            ),
                        )
                    })?)
                }
            };
        }

        if let Some((name, prov)) = self.opt_str("template")? {
            scene.template = Some(TemplateKind::from_name(name).ok_or_else(|| {
                self.err(
                    Some("template"),
                    prov,
                    format!(
                        "scene '@{}' has invalid template '{}'; use 'plain', 'vars' or 'jinja'",
                        self.name(),
                        name
                    ),
                )
            })?);
        }

        scene.on_enter = self.hooks("on_enter")?;
        scene.on_enter_once = self.hooks("on_enter_once")?;
        scene.on_exit = self.hooks("on_exit")?;
        scene.on_timeout = self.hooks("on_timeout")?;

        self.entries(&mut scene)?;
        self.buttons(&mut scene)?;

        Ok(scene)
    }

    fn content(&self) -> Result<Content, ScriptError> {
        let title = self.non_empty("title")?;
        let message = self.non_empty("message")?;
        let text = self.non_empty("text")?;

        match (title, message, text) {
            (Some(title), Some(message), None) => Ok(Content::Titled { title, message }),
            (None, None, Some(text)) => Ok(Content::Text { text }),
            (None, None, None) => Err(self.err(
                None,
                self.decl.prov,
                format!(
                    "scene '@{name}' must contain 'title' and 'message' fields, or a 'text' field\n\n\
                     Example:\n@ {name} {{\n  title = \"...\";\n  message = \"...\";\n}}",
                    name = self.name()
                ),
            )),
            (_, _, Some(_)) => Err(self.err(
                Some("text"),
                self.decl.prov,
                format!(
                    "scene '@{}' declares 'text' together with 'title'/'message'; use one form",
                    self.name()
                ),
            )),
            (Some(_), None, None) => Err(self.missing("message")),
            (None, Some(_), None) => Err(self.missing("title")),
        }
    }

    fn missing(&self, key: &str) -> ScriptError {
        self.err(
            Some(key),
            self.decl.prov,
            format!("scene '@{}' must contain '{}' field", self.name(), key),
        )
    }

    fn hooks(&self, key: &str) -> Result<Option<Vec<HookCall>>, ScriptError> {
        match self.field(key) {
            None => Ok(None),
            Some(RawField {
                value: RawValue::Hooks(calls),
                ..
            }) => Ok(Some(calls.iter().map(hook_call).collect())),
            Some(raw) => Err(self.type_err(key, raw, "hook block")),
        }
    }

    fn entries(&self, scene: &mut Scene) -> Result<(), ScriptError> {
        let Some(raw) = self.field("entries") else {
            return Ok(());
        };
        let RawValue::Entries(entries) = &raw.value else {
            return Err(self.type_err("entries", raw, "entries block"));
        };

        for entry in entries {
            if entry.target == self.name() {
                return Err(self.err(
                    Some("entries"),
                    entry.prov,
                    format!("entry '{}' in scene '@{}' points to itself", entry.target, self.name()),
                ));
            }
            let target = SceneRef::parse(&entry.target);
            match &entry.trigger {
                Trigger::Any => {
                    if scene.default_entry_target.is_some() {
                        return Err(self.err(
                            Some("entries"),
                            entry.prov,
                            format!("scene '@{}' contains multiple default entries", self.name()),
                        ));
                    }
                    scene.default_entry_target = Some(target);
                }
                Trigger::Text(text) => {
                    if scene.entries.insert(text.clone(), target).is_some() {
                        return Err(self.err(
                            Some("entries"),
                            entry.prov,
                            format!(
                                "scene '@{}' declares the entry trigger '{}' twice",
                                self.name(),
                                text
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn buttons(&self, scene: &mut Scene) -> Result<(), ScriptError> {
        let Some(raw) = self.field("buttons") else {
            return Ok(());
        };
        let RawValue::Buttons(block) = &raw.value else {
            return Err(self.type_err("buttons", raw, "buttons block"));
        };
        if block.width < 1 {
            return Err(self.err(
                Some("buttons"),
                raw.prov,
                format!("scene '@{}' has a non-positive button row width", self.name()),
            ));
        }
        scene.row_width = u32::try_from(block.width).map_err(|_| {
            self.err(
                Some("buttons"),
                raw.prov,
                format!(
                    "scene '@{}' has a button row width of {}, the maximum is {}",
                    self.name(),
                    block.width,
                    u32::MAX
                ),
            )
        })?;

        let mut seen: BTreeMap<String, Provenance> = BTreeMap::new();
        for raw_button in &block.buttons {
            let button = self.button(raw_button, scene)?;
            if let Some(first) = seen.get(&button.label) {
                return Err(self.err(
                    Some("buttons"),
                    raw_button.prov,
                    format!(
                        "duplicate button label '{}' in scene '@{}' (first used at line {})",
                        button.label,
                        self.name(),
                        first.line
                    ),
                ));
            }
            seen.insert(button.label.clone(), raw_button.prov);
            scene.buttons.push(button);
        }
        Ok(())
    }

    /// Label + argument, both required, label non-blank.
    fn labelled(&self, b: &RawButton, example: &str) -> Result<(String, String), ScriptError> {
        let kind = b.target.as_str();
        let label = match &b.label {
            ButtonLabel::Explicit(l) => l,
            ButtonLabel::NoLabel => {
                return Err(self.err(
                    Some("buttons"),
                    b.prov,
                    format!(
                        "scene '@{}' contains a {}-button that needs a label and an argument\n\n- Example: {}",
                        self.name(),
                        kind,
                        example
                    ),
                ));
            }
        };
        if label.trim().is_empty() {
            return Err(self.empty_label(b, kind));
        }
        let argument = b.argument.clone().ok_or_else(|| {
            self.err(
                Some("buttons"),
                b.prov,
                format!(
                    "scene '@{}' contains a {}-button '{}' that is missing its argument\n\n- Example: {}",
                    self.name(),
                    kind,
                    label,
                    example
                ),
            )
        })?;
        Ok((label.clone(), argument))
    }

    fn empty_label(&self, b: &RawButton, kind: &str) -> ScriptError {
        self.err(
            Some("buttons"),
            b.prov,
            format!("scene '@{}' contains a {}-button with an empty label", self.name(), kind),
        )
    }

    fn button(&self, b: &RawButton, scene: &Scene) -> Result<Button, ScriptError> {
        match b.target.as_str() {
            "handoff" => {
                let (label, target) = self.labelled(b, "handoff('Start', StartHandler)")?;
                Ok(Button {
                    label,
                    action: ButtonAction::Handoff(target),
                })
            }
            "redirect" => {
                let (label, target) = self.labelled(b, "redirect('Start', '/start INVITE_CODE')")?;
                Ok(Button {
                    label,
                    action: ButtonAction::Redirect(target),
                })
            }
            "link" => {
                let (label, url) = self.labelled(b, "link('Website', 'https://example.com')")?;
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(self.err(
                        Some("buttons"),
                        b.prov,
                        format!(
                            "scene '@{}' contains a link-button '{}' with an invalid URL: '{}'",
                            self.name(),
                            label,
                            url
                        ),
                    ));
                }
                Ok(Button {
                    label,
                    action: ButtonAction::Link(url),
                })
            }
            "suggest" => self.suggest(b, scene),
            "return" => self.return_button(b),
            target => {
                let label = match &b.label {
                    ButtonLabel::Explicit(l) => l.clone(),
                    ButtonLabel::NoLabel => self.index.labels.get(target).cloned().ok_or_else(|| {
                        self.err(
                            Some("buttons"),
                            b.prov,
                            format!(
                                "scene '@{}' contains a button that points to unknown scene '{}'",
                                self.name(),
                                target
                            ),
                        )
                    })?,
                };
                if label.trim().is_empty() {
                    return Err(self.err(
                        Some("buttons"),
                        b.prov,
                        format!("scene '@{}' contains a button with an empty label", self.name()),
                    ));
                }
                if target == self.name() {
                    return Err(self.err(
                        Some("buttons"),
                        b.prov,
                        format!("button '{}' in scene '@{}' points to itself", label, self.name()),
                    ));
                }
                Ok(Button {
                    label,
                    action: ButtonAction::Scene(SceneRef::parse(target)),
                })
            }
        }
    }

    /// `suggest("Label"[, "entry"])`: the entry defaults to the label and must
    /// match a declared trigger or fall through to the default entry.
    fn suggest(&self, b: &RawButton, scene: &Scene) -> Result<Button, ScriptError> {
        let label = match &b.label {
            ButtonLabel::Explicit(l) => l.clone(),
            ButtonLabel::NoLabel => {
                return Err(self.err(
                    Some("buttons"),
                    b.prov,
                    format!(
                        "scene '@{}' contains a suggest-button that needs a label and a suggestion\n\n\
                         - Example: suggest('Hint', 'mypassword')\n- Example: suggest('mypassword')",
                        self.name()
                    ),
                ));
            }
        };
        if label.trim().is_empty() {
            return Err(self.empty_label(b, "suggest"));
        }
        let entry = b
            .argument
            .clone()
            .unwrap_or_else(|| label.trim().to_owned());

        let target = scene
            .entries
            .get(&entry)
            .or(scene.default_entry_target.as_ref())
            .cloned()
            .ok_or_else(|| {
                self.err(
                    Some("buttons"),
                    b.prov,
                    format!(
                        "scene '@{}' contains a suggest-button '{}' that points to entry '{}', \
                         but no such entry exists and no default entry is defined",
                        self.name(),
                        label,
                        entry
                    ),
                )
            })?;

        Ok(Button {
            label,
            action: ButtonAction::Suggest {
                scene: target,
                entry,
            },
        })
    }

    /// `return("target")` or `return("Label", target)`.
    fn return_button(&self, b: &RawButton) -> Result<Button, ScriptError> {
        let (label, target) = match (&b.label, &b.argument) {
            (ButtonLabel::Explicit(l), Some(t)) => (Some(l.clone()), t.clone()),
            (ButtonLabel::Explicit(t), None) => (None, t.clone()),
            (ButtonLabel::NoLabel, _) => {
                return Err(self.err(
                    Some("buttons"),
                    b.prov,
                    format!(
                        "scene '@{}' contains a return-button without a target scene\n\n\
                         - Example: return('main')\n- Example: return('Home', main)",
                        self.name()
                    ),
                ));
            }
        };
        if !self.index.contains(&target) {
            return Err(self.err(
                Some("buttons"),
                b.prov,
                format!(
                    "scene '@{}' contains a return-button that points to unknown scene '{}'",
                    self.name(),
                    target
                ),
            ));
        }
        let label = match label {
            Some(l) => l,
            None => self
                .index
                .labels
                .get(&target)
                .cloned()
                .unwrap_or_else(|| target.clone()),
        };
        if label.trim().is_empty() {
            return Err(self.empty_label(b, "return"));
        }
        Ok(Button {
            label,
            action: ButtonAction::Return(target),
        })
    }
}

fn hook_call(raw: &RawHookCall) -> HookCall {
    HookCall {
        method: raw.method.clone(),
        args: raw
            .args
            .as_ref()
            .map(|args| args.iter().map(RawValue::to_json).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Config;
    use crate::{lexer, parser, pass2_index};

    fn scenes(src: &str) -> Result<Vec<Scene>, ScriptError> {
        let tokens = lexer::tokenize(src)?;
        let ast = parser::parse(&tokens)?;
        let index = pass2_index::build_index(&ast, &Config::default())?;
        analyze_scenes(&index)
    }

    fn main_scene(body: &str) -> Result<Scene, ScriptError> {
        let src = format!(
            "@ main {{ {} }}\n@ faq {{ title = \"FAQ\" message = \"Questions\" }}",
            body
        );
        scenes(&src).map(|mut s| s.remove(0))
    }

    #[test]
    fn title_message_and_text_are_exclusive() {
        let s = main_scene("title = \"T\" message = \"M\"").unwrap();
        assert_eq!(s.title(), Some("T"));
        let s = main_scene("text = \"Hello\"").unwrap();
        assert_eq!(s.text(), Some("Hello"));

        let err = main_scene("title = \"T\" message = \"M\" text = \"x\"").unwrap_err();
        assert!(err.message.contains("use one form"));
        let err = main_scene("title = \"T\"").unwrap_err();
        assert!(err.message.contains("must contain 'message'"));
        let err = main_scene("image = \"a.png\"").unwrap_err();
        assert!(err.message.contains("or a 'text' field"));
        let err = main_scene("text = \"   \"").unwrap_err();
        assert!(err.message.contains("empty text"));
    }

    #[test]
    fn optional_fields_are_type_checked() {
        let s = main_scene(
            "text = \"x\" image = \"pic.png\" use_italics = true parse_mode = \"HTML\" template = plain",
        )
        .unwrap();
        assert_eq!(s.image.as_deref(), Some("pic.png"));
        assert!(s.use_italics);
        assert_eq!(s.parse_mode, Some(ParseMode::Html));
        assert_eq!(s.template, Some(TemplateKind::Plain));

        let err = main_scene("text = \"x\" use_italics = \"yes\"").unwrap_err();
        assert!(err.message.contains("must be of type boolean"));
        let err = main_scene("text = \"x\" parse_mode = \"rtf\"").unwrap_err();
        assert!(err.message.contains("invalid parse_mode 'rtf'"));
        let err = main_scene("text = \"x\" template = \"mustache\"").unwrap_err();
        assert!(err.message.contains("invalid template"));
        let err = main_scene("text = \"x\" colour = \"red\"").unwrap_err();
        assert!(err.message.contains("unknown field 'colour'"));
    }

    #[test]
    fn parse_mode_none_is_absent() {
        let s = main_scene("text = \"x\" parse_mode = none").unwrap();
        assert!(s.parse_mode.is_none());
    }

    #[test]
    fn hooks_are_copied_verbatim() {
        let s = main_scene("text = \"x\" on_enter { track(\"{{scene_name}}\", 1) } on_exit { done }")
            .unwrap();
        let on_enter = s.on_enter.unwrap();
        assert_eq!(on_enter[0].method, "track");
        assert_eq!(
            on_enter[0].args,
            Some(vec![serde_json::json!("{{scene_name}}"), serde_json::json!(1)])
        );
        assert_eq!(s.on_exit.unwrap()[0].args, None);
    }

    #[test]
    fn unlabelled_button_takes_forward_declared_label() {
        let s = main_scene("text = \"x\" buttons(2) { faq back }").unwrap();
        assert_eq!(s.row_width, 2);
        assert_eq!(s.buttons[0].label, "FAQ");
        assert_eq!(s.buttons[0].action, ButtonAction::Scene(SceneRef::Named("faq".into())));
        assert_eq!(s.buttons[1].label, "« Back");
        assert_eq!(s.buttons[1].action, ButtonAction::Scene(SceneRef::Back));
    }

    #[test]
    fn oversized_row_width_is_rejected() {
        let err = main_scene("text = \"x\" buttons(4294967296) { faq }").unwrap_err();
        assert!(err.message.contains("button row width of 4294967296"));
        let s = main_scene("text = \"x\" buttons(4294967295) { faq }").unwrap();
        assert_eq!(s.row_width, u32::MAX);
    }

    #[test]
    fn button_to_self_is_rejected() {
        let err = main_scene("text = \"x\" buttons { main(\"Again\") }").unwrap_err();
        assert!(err.message.contains("points to itself"));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let err = main_scene("text = \"x\" buttons { faq(\"Go\") back(\"Go\") }").unwrap_err();
        assert!(err.message.contains("duplicate button label 'Go'"));
    }

    #[test]
    fn special_buttons_require_label_and_argument() {
        let err = main_scene("text = \"x\" buttons { handoff }").unwrap_err();
        assert!(err.message.contains("needs a label and an argument"));
        let err = main_scene("text = \"x\" buttons { redirect(\"Go\") }").unwrap_err();
        assert!(err.message.contains("missing its argument"));
        let err = main_scene("text = \"x\" buttons { link(\"Site\", \"ftp://x\") }").unwrap_err();
        assert!(err.message.contains("invalid URL"));

        let s = main_scene(
            "text = \"x\" buttons { handoff(\"Start\", StartHandler) redirect(\"Go\", \"/start\") link(\"Site\", \"https://e.x\") }",
        )
        .unwrap();
        assert_eq!(s.buttons[0].action, ButtonAction::Handoff("StartHandler".into()));
        assert_eq!(s.buttons[1].action, ButtonAction::Redirect("/start".into()));
        assert_eq!(s.buttons[2].action, ButtonAction::Link("https://e.x".into()));
    }

    #[test]
    fn suggest_resolves_through_entries() {
        let s = main_scene(
            "text = \"x\" entries { faq(\"pw\") } buttons { suggest(\"Hint\", \"pw\") }",
        )
        .unwrap();
        assert_eq!(
            s.buttons[0].action,
            ButtonAction::Suggest {
                scene: SceneRef::Named("faq".into()),
                entry: "pw".into()
            }
        );

        let s = main_scene("text = \"x\" entries { faq } buttons { suggest(\"anything\") }").unwrap();
        assert_eq!(
            s.buttons[0].action,
            ButtonAction::Suggest {
                scene: SceneRef::Named("faq".into()),
                entry: "anything".into()
            }
        );
    }

    #[test]
    fn suggest_without_matching_entry_fails() {
        let err = main_scene("text = \"x\" buttons { suggest(\"Hint\", \"pw\") }").unwrap_err();
        assert!(err.message.contains("no such entry exists"));
    }

    #[test]
    fn entries_reject_self_and_multiple_defaults() {
        let err = main_scene("text = \"x\" entries { main }").unwrap_err();
        assert!(err.message.contains("points to itself"));
        let err = main_scene("text = \"x\" entries { faq back }").unwrap_err();
        assert!(err.message.contains("multiple default entries"));
    }

    #[test]
    fn return_buttons() {
        let s = main_scene("text = \"x\" buttons { return(\"faq\") return(\"Home page\", faq) }");
        // same target twice under distinct labels is fine
        let s = s.unwrap();
        assert_eq!(s.buttons[0].label, "FAQ");
        assert_eq!(s.buttons[0].action, ButtonAction::Return("faq".into()));
        assert_eq!(s.buttons[1].label, "Home page");

        let err = main_scene("text = \"x\" buttons { return }").unwrap_err();
        assert!(err.message.contains("without a target scene"));
        let err = main_scene("text = \"x\" buttons { return(\"nowhere\") }").unwrap_err();
        assert!(err.message.contains("unknown scene 'nowhere'"));
    }
}
