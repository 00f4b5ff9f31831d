use super::Parser;
use crate::ast::{Provenance, RawBlock, RawField, RawValue};
use crate::error::ScriptError;
use crate::lexer::Token;
use std::collections::BTreeMap;

/// Scene fields that introduce a hook-call block instead of `= value`.
pub(super) const HOOK_FIELDS: [&str; 4] = ["on_enter", "on_enter_once", "on_exit", "on_timeout"];

impl<'a> Parser<'a> {
    pub(super) fn parse_config_block(&mut self) -> Result<RawBlock, ScriptError> {
        let prov = self.prov();
        self.expect(Token::Dollar)?;
        let name = self.take_opt_word();
        self.expect(Token::LBrace)?;

        let mut fields = BTreeMap::new();
        while self.peek() != &Token::RBrace {
            let field_prov = self.prov();
            let key = self.take_word()?;
            self.expect(Token::Eq)?;
            let value = self.parse_value()?;
            self.eat(&Token::Semi);
            reject_duplicate(&fields, &key, field_prov)?;
            fields.insert(
                key,
                RawField {
                    value,
                    prov: field_prov,
                },
            );
        }
        self.expect(Token::RBrace)?;

        Ok(RawBlock::Config { name, fields, prov })
    }

    pub(super) fn parse_scene_block(&mut self) -> Result<RawBlock, ScriptError> {
        let prov = self.prov();
        self.expect(Token::At)?;
        let name = self.take_opt_word();

        let mut default_label = None;
        if self.eat(&Token::LParen) {
            if !matches!(self.peek(), Token::Str(_)) {
                return Err(self.unexpected("string as default label"));
            }
            default_label = Some(self.take_str()?);
            self.expect(Token::RParen)?;
        }

        self.expect(Token::LBrace)?;
        let mut fields = BTreeMap::new();
        while self.peek() != &Token::RBrace {
            let field_prov = self.prov();
            let key = self.take_word()?;
            let value = self.parse_scene_field(&key)?;
            reject_duplicate(&fields, &key, field_prov)?;
            fields.insert(
                key,
                RawField {
                    value,
                    prov: field_prov,
                },
            );
        }
        self.expect(Token::RBrace)?;

        Ok(RawBlock::Scene {
            name,
            default_label,
            fields,
            prov,
        })
    }

    fn parse_scene_field(&mut self, key: &str) -> Result<RawValue, ScriptError> {
        match key {
            "buttons" => Ok(RawValue::Buttons(self.parse_buttons_block()?)),
            "entries" => Ok(RawValue::Entries(self.parse_entries_block()?)),
            k if HOOK_FIELDS.contains(&k) => Ok(RawValue::Hooks(self.parse_hook_block()?)),
            _ => {
                self.expect(Token::Eq)?;
                let value = self.parse_value()?;
                self.eat(&Token::Semi);
                Ok(value)
            }
        }
    }
}

fn reject_duplicate(
    fields: &BTreeMap<String, RawField>,
    key: &str,
    prov: Provenance,
) -> Result<(), ScriptError> {
    match fields.get(key) {
        Some(first) => Err(ScriptError::parse(
            prov.line,
            prov.column,
            format!(
                "duplicate field '{}' (first declared at line {})",
                key, first.prov.line
            ),
        )),
        None => Ok(()),
    }
}
