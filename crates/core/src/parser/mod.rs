/// Recursive-descent parser over the token stream.
/// Every block carries provenance (line/column of its sigil).
/// No field-name or type checking is done here -- that is the builder's job.
use crate::ast::{Ast, Provenance};
use crate::error::ScriptError;
use crate::lexer::{Spanned, Token};

mod blocks;
mod values;

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn prov(&self) -> Provenance {
        let s = self.cur();
        Provenance {
            line: s.line,
            column: s.column,
        }
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn err(&self, msg: impl Into<String>) -> ScriptError {
        let s = self.cur();
        ScriptError::parse(s.line, s.column, msg)
    }

    fn unexpected(&self, expected: &str) -> ScriptError {
        self.err(format!("expected {}, got {}", expected, self.peek().describe()))
    }

    fn expect(&mut self, token: Token) -> Result<(), ScriptError> {
        if self.peek() == &token {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&token.describe()))
        }
    }

    /// Consume `token` if it is next; report whether it was.
    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn take_word(&mut self) -> Result<String, ScriptError> {
        if let Token::Word(w) = self.peek().clone() {
            self.advance();
            Ok(w)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn take_opt_word(&mut self) -> Option<String> {
        if let Token::Word(w) = self.peek().clone() {
            self.advance();
            Some(w)
        } else {
            None
        }
    }

    fn take_str(&mut self) -> Result<String, ScriptError> {
        if let Token::Str(s) = self.peek().clone() {
            self.advance();
            Ok(s)
        } else {
            Err(self.unexpected("string literal"))
        }
    }

    // -- Top level ----------------------------------------------

    fn parse_ast(&mut self) -> Result<Ast, ScriptError> {
        let mut ast = Ast::default();
        while self.peek() != &Token::Eof {
            let block = match self.peek() {
                Token::Dollar => self.parse_config_block()?,
                Token::At => self.parse_scene_block()?,
                _ => return Err(self.unexpected("'$' or '@' block")),
            };
            ast.body.push(block);
        }
        Ok(ast)
    }
}

/// Parse a complete token stream (as produced by [`crate::lexer::tokenize`]).
pub fn parse(tokens: &[Spanned]) -> Result<Ast, ScriptError> {
    if tokens.is_empty() {
        return Ok(Ast::default());
    }
    Parser::new(tokens).parse_ast()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::lexer;

    fn parse_src(src: &str) -> Result<Ast, ScriptError> {
        let tokens = lexer::tokenize(src)?;
        parse(&tokens)
    }

    fn scene_fields(ast: &Ast, idx: usize) -> &std::collections::BTreeMap<String, RawField> {
        match &ast.body[idx] {
            RawBlock::Scene { fields, .. } => fields,
            other => panic!("expected scene, got {:?}", other),
        }
    }

    #[test]
    fn empty_source_is_empty_ast() {
        assert!(parse_src("  // nothing\n").unwrap().body.is_empty());
    }

    #[test]
    fn config_block_with_name() {
        let ast = parse_src("$ vars { greeting = \"hi\"; count = 3 }").unwrap();
        match &ast.body[0] {
            RawBlock::Config { name, fields, .. } => {
                assert_eq!(name.as_deref(), Some("vars"));
                assert_eq!(fields["greeting"].value, RawValue::Str("hi".into()));
                assert_eq!(fields["count"].value, RawValue::Int(3));
            }
            other => panic!("expected config, got {:?}", other),
        }
    }

    #[test]
    fn anonymous_scene_with_default_label() {
        let ast = parse_src("@ (\"Help\") { text = \"hi\" }").unwrap();
        match &ast.body[0] {
            RawBlock::Scene {
                name,
                default_label,
                ..
            } => {
                assert!(name.is_none());
                assert_eq!(default_label.as_deref(), Some("Help"));
            }
            other => panic!("expected scene, got {:?}", other),
        }
    }

    #[test]
    fn buttons_block_forms() {
        let src = r#"
@ main {
    buttons(2) {
        faq
        about("About us")
        link("Site", "https://example.com");
        handoff("Start", StartHandler)
        back()
    }
}
"#;
        let ast = parse_src(src).unwrap();
        let RawValue::Buttons(block) = &scene_fields(&ast, 0)["buttons"].value else {
            panic!("expected buttons block");
        };
        assert_eq!(block.width, 2);
        let summary: Vec<_> = block
            .buttons
            .iter()
            .map(|b| (b.label.clone(), b.target.as_str(), b.argument.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ButtonLabel::NoLabel, "faq", None),
                (ButtonLabel::Explicit("About us".into()), "about", None),
                (
                    ButtonLabel::Explicit("Site".into()),
                    "link",
                    Some("https://example.com")
                ),
                (
                    ButtonLabel::Explicit("Start".into()),
                    "handoff",
                    Some("StartHandler")
                ),
                (ButtonLabel::NoLabel, "back", None),
            ]
        );
    }

    #[test]
    fn entries_and_hooks() {
        let src = r#"
@ main {
    entries { secret("pw") fallback }
    on_enter { greet("{{first_name}}", 2); reset }
}
"#;
        let ast = parse_src(src).unwrap();
        let fields = scene_fields(&ast, 0);
        let RawValue::Entries(entries) = &fields["entries"].value else {
            panic!("expected entries");
        };
        assert_eq!(entries[0].trigger, Trigger::Text("pw".into()));
        assert_eq!(entries[1].trigger, Trigger::Any);
        assert_eq!(entries[1].target, "fallback");

        let RawValue::Hooks(calls) = &fields["on_enter"].value else {
            panic!("expected hooks");
        };
        assert_eq!(calls[0].method, "greet");
        assert_eq!(
            calls[0].args,
            Some(vec![RawValue::Str("{{first_name}}".into()), RawValue::Int(2)])
        );
        assert_eq!(calls[1].method, "reset");
        assert!(calls[1].args.is_none());
    }

    #[test]
    fn list_values_and_identifiers() {
        let ast = parse_src("$ { next_order = [main, \"faq\",] template = vars }").unwrap();
        let RawBlock::Config { fields, .. } = &ast.body[0] else {
            panic!("expected config");
        };
        assert_eq!(
            fields["next_order"].value,
            RawValue::List(vec![
                RawValue::Ident("main".into()),
                RawValue::Str("faq".into())
            ])
        );
        assert_eq!(fields["template"].value, RawValue::Ident("vars".into()));
    }

    #[test]
    fn missing_equals_reports_expected_and_actual() {
        let err = parse_src("@ main { title \"T\" }").unwrap_err();
        assert_eq!(err.stage, crate::error::Stage::Parse);
        assert!(err.message.contains("expected '='"), "{}", err.message);
        assert!(err.message.contains("string \"T\""), "{}", err.message);
        assert_eq!((err.line, err.column), (1, 16));
    }

    #[test]
    fn stray_top_level_token_is_rejected() {
        let err = parse_src("main { }").unwrap_err();
        assert!(err.message.contains("'$' or '@' block"));
    }

    #[test]
    fn buttons_width_must_be_a_number() {
        let err = parse_src("@ main { buttons(\"2\") { } }").unwrap_err();
        assert!(err.message.contains("expected row width"));
    }

    #[test]
    fn unclosed_scene_is_rejected() {
        let err = parse_src("@ main { title = \"T\"").unwrap_err();
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn duplicate_field_in_block_is_rejected() {
        let err = parse_src("@ main {\n  text = \"a\"\n  text = \"b\"\n}").unwrap_err();
        assert!(err.message.contains("duplicate field 'text'"), "{}", err.message);
        assert_eq!((err.line, err.column), (3, 3));
    }
}
