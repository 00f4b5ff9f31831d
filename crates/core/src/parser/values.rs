use super::Parser;
use crate::ast::{ButtonLabel, RawButton, RawButtons, RawEntry, RawHookCall, RawValue, Trigger};
use crate::error::ScriptError;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    pub(super) fn parse_value(&mut self) -> Result<RawValue, ScriptError> {
        let value = match self.peek().clone() {
            Token::Str(s) => RawValue::Str(s),
            Token::Int(n) => RawValue::Int(n),
            Token::Bool(b) => RawValue::Bool(b),
            Token::None => RawValue::None,
            Token::Word(w) => RawValue::Ident(w),
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while self.peek() != &Token::RBracket {
                    items.push(self.parse_value()?);
                    if !self.eat(&Token::Comma) && self.peek() != &Token::RBracket {
                        return Err(self.unexpected("',' or ']'"));
                    }
                }
                self.expect(Token::RBracket)?;
                return Ok(RawValue::List(items));
            }
            _ => return Err(self.unexpected("value")),
        };
        self.advance();
        Ok(value)
    }

    /// `buttons [(width)] { target[("Label"[, argument])] ... }`
    pub(super) fn parse_buttons_block(&mut self) -> Result<RawButtons, ScriptError> {
        let mut width = 1;
        if self.eat(&Token::LParen) {
            match self.peek() {
                Token::Int(n) => {
                    width = *n;
                    self.advance();
                }
                _ => return Err(self.unexpected("row width number after 'buttons('")),
            }
            self.expect(Token::RParen)?;
        }

        self.expect(Token::LBrace)?;
        let mut buttons = Vec::new();
        while self.peek() != &Token::RBrace {
            if self.eat(&Token::Semi) {
                continue;
            }
            let prov = self.prov();
            let target = self.take_word()?;
            let mut label = ButtonLabel::NoLabel;
            let mut argument = None;

            if self.eat(&Token::LParen) {
                if let Token::Str(s) = self.peek().clone() {
                    self.advance();
                    label = ButtonLabel::Explicit(s);
                    if self.eat(&Token::Comma) {
                        argument = match self.peek().clone() {
                            Token::Str(a) | Token::Word(a) => {
                                self.advance();
                                Some(a)
                            }
                            _ => return Err(self.unexpected("string or identifier as button argument")),
                        };
                    }
                }
                self.expect(Token::RParen)?;
            }

            buttons.push(RawButton {
                label,
                target,
                argument,
                prov,
            });
        }
        self.expect(Token::RBrace)?;

        Ok(RawButtons { width, buttons })
    }

    /// `entries { target[("trigger")] ... }` -- no trigger means "any text".
    pub(super) fn parse_entries_block(&mut self) -> Result<Vec<RawEntry>, ScriptError> {
        self.expect(Token::LBrace)?;
        let mut entries = Vec::new();
        while self.peek() != &Token::RBrace {
            if self.eat(&Token::Semi) {
                continue;
            }
            let prov = self.prov();
            let target = self.take_word()?;
            let mut trigger = Trigger::Any;
            if self.eat(&Token::LParen) {
                if let Token::Str(s) = self.peek().clone() {
                    self.advance();
                    trigger = Trigger::Text(s);
                }
                self.expect(Token::RParen)?;
            }
            entries.push(RawEntry {
                trigger,
                target,
                prov,
            });
        }
        self.expect(Token::RBrace)?;
        Ok(entries)
    }

    /// `on_* { method[(value, ...)] ... }`
    pub(super) fn parse_hook_block(&mut self) -> Result<Vec<RawHookCall>, ScriptError> {
        self.expect(Token::LBrace)?;
        let mut calls = Vec::new();
        while self.peek() != &Token::RBrace {
            if self.eat(&Token::Semi) {
                continue;
            }
            let prov = self.prov();
            let method = self.take_word()?;
            let mut args = None;
            if self.eat(&Token::LParen) {
                let mut list = Vec::new();
                while self.peek() != &Token::RParen {
                    list.push(self.parse_value()?);
                    if !self.eat(&Token::Comma) && self.peek() != &Token::RParen {
                        return Err(self.unexpected("',' or ')'"));
                    }
                }
                self.expect(Token::RParen)?;
                args = Some(list);
            }
            calls.push(RawHookCall { method, args, prov });
        }
        self.expect(Token::RBrace)?;
        Ok(calls)
    }
}
