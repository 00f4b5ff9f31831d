use crate::error::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers: scene, field, method and handler names
    Word(String),
    /// Quoted or backtick string literal (content without delimiters, escapes resolved)
    Str(String),
    /// Integer literal
    Int(i64),
    /// `true` / `false`
    Bool(bool),
    /// `none`
    None,
    // Block sigils
    Dollar,
    At,
    // Punctuation
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Eq,
    // End of input
    Eof,
}

impl Token {
    /// Short human-readable description used in parse diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("identifier '{}'", w),
            Token::Str(s) => format!("string \"{}\"", s),
            Token::Int(n) => format!("number {}", n),
            Token::Bool(b) => format!("'{}'", b),
            Token::None => "'none'".to_owned(),
            Token::Dollar => "'$'".to_owned(),
            Token::At => "'@'".to_owned(),
            Token::LBrace => "'{'".to_owned(),
            Token::RBrace => "'}'".to_owned(),
            Token::LParen => "'('".to_owned(),
            Token::RParen => "')'".to_owned(),
            Token::LBracket => "'['".to_owned(),
            Token::RBracket => "']'".to_owned(),
            Token::Comma => "','".to_owned(),
            Token::Semi => "';'".to_owned(),
            Token::Eq => "'='".to_owned(),
            Token::Eof => "end of input".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
    pub column: u32,
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    line_start: usize,
}

impl Cursor {
    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn column(&self) -> u32 {
        (self.pos - self.line_start + 1) as u32
    }

    /// Advance one char, keeping line/column bookkeeping current.
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.line_start = self.pos;
        }
        Some(c)
    }
}

/// Convert DSL source into a token stream terminated by [`Token::Eof`].
/// Comments and whitespace are skipped.
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, ScriptError> {
    let mut cur = Cursor {
        chars: src.chars().collect(),
        pos: 0,
        line: 1,
        line_start: 0,
    };
    let mut tokens = Vec::new();

    while let Some(c) = cur.peek_at(0) {
        // Line comment
        if c == '/' && cur.peek_at(1) == Some('/') {
            while let Some(nc) = cur.peek_at(0) {
                if nc == '\n' {
                    break;
                }
                cur.bump();
            }
            continue;
        }

        // Block comment
        if c == '/' && cur.peek_at(1) == Some('*') {
            let (line, column) = (cur.line, cur.column());
            cur.bump();
            cur.bump();
            loop {
                match cur.peek_at(0) {
                    None => return Err(ScriptError::lex(line, column, "unterminated block comment")),
                    Some('*') if cur.peek_at(1) == Some('/') => {
                        cur.bump();
                        cur.bump();
                        break;
                    }
                    Some(_) => {
                        cur.bump();
                    }
                }
            }
            continue;
        }

        if c.is_whitespace() {
            cur.bump();
            continue;
        }

        let line = cur.line;
        let column = cur.column();
        let push = |tokens: &mut Vec<Spanned>, token: Token| {
            tokens.push(Spanned { token, line, column });
        };

        if c == '"' || c == '\'' {
            let s = lex_quoted(&mut cur, c, line, column)?;
            push(&mut tokens, Token::Str(s));
            continue;
        }

        if c == '`' {
            let s = lex_backtick(&mut cur, line, column)?;
            push(&mut tokens, Token::Str(s));
            continue;
        }

        if c.is_ascii_digit() || (c == '-' && cur.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
            let mut digits = String::new();
            if c == '-' {
                digits.push('-');
                cur.bump();
            }
            while let Some(d) = cur.peek_at(0) {
                if !d.is_ascii_digit() {
                    break;
                }
                digits.push(d);
                cur.bump();
            }
            let n: i64 = digits
                .parse()
                .map_err(|_| ScriptError::lex(line, column, format!("invalid integer '{}'", digits)))?;
            push(&mut tokens, Token::Int(n));
            continue;
        }

        let punct = match c {
            '$' => Some(Token::Dollar),
            '@' => Some(Token::At),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semi),
            '=' => Some(Token::Eq),
            _ => None,
        };
        if let Some(token) = punct {
            cur.bump();
            push(&mut tokens, token);
            continue;
        }

        // Identifier / keyword
        if c.is_alphabetic() || c == '_' {
            let mut word = String::new();
            while let Some(wc) = cur.peek_at(0) {
                if !(wc.is_alphanumeric() || wc == '_') {
                    break;
                }
                word.push(wc);
                cur.bump();
            }
            let token = match word.to_lowercase().as_str() {
                "true" => Token::Bool(true),
                "false" => Token::Bool(false),
                "none" => Token::None,
                _ => Token::Word(word),
            };
            push(&mut tokens, token);
            continue;
        }

        return Err(ScriptError::lex(line, column, format!("unexpected character '{}'", c)));
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line: cur.line,
        column: cur.column(),
    });
    Ok(tokens)
}

fn lex_quoted(cur: &mut Cursor, quote: char, line: u32, column: u32) -> Result<String, ScriptError> {
    cur.bump();
    let mut s = String::new();
    loop {
        let sc = match cur.peek_at(0) {
            None | Some('\n') => {
                return Err(ScriptError::lex(line, column, "unterminated string literal"));
            }
            Some(sc) => sc,
        };
        cur.bump();
        if sc == quote {
            return Ok(s);
        }
        if sc == '\\' {
            match cur.bump() {
                None => {
                    return Err(ScriptError::lex(line, column, "unterminated escape in string"));
                }
                Some('n') => s.push('\n'),
                Some('t') => s.push('\t'),
                Some('\\') => s.push('\\'),
                Some('"') => s.push('"'),
                Some('\'') => s.push('\''),
                Some(other) => {
                    s.push('\\');
                    s.push(other);
                }
            }
            continue;
        }
        s.push(sc);
    }
}

fn lex_backtick(cur: &mut Cursor, line: u32, column: u32) -> Result<String, ScriptError> {
    cur.bump();
    let mut raw = String::new();
    loop {
        match cur.bump() {
            None => return Err(ScriptError::lex(line, column, "unterminated multi-line string")),
            Some('`') => break,
            Some(c) => raw.push(c),
        }
    }
    Ok(dedent(&raw))
}

/// Normalize a backtick block: drop the newline right after the opening
/// delimiter, a trailing whitespace-only line, and the common indentation.
fn dedent(raw: &str) -> String {
    let body = raw
        .strip_prefix("\r\n")
        .or_else(|| raw.strip_prefix('\n'))
        .unwrap_or(raw);
    let mut lines: Vec<&str> = body.split('\n').collect();
    if lines.len() > 1 && lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn scene_header_tokens() {
        assert_eq!(
            kinds("@ main(\"Home\") { }"),
            vec![
                Token::At,
                Token::Word("main".into()),
                Token::LParen,
                Token::Str("Home".into()),
                Token::RParen,
                Token::LBrace,
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            kinds("True false NONE"),
            vec![Token::Bool(true), Token::Bool(false), Token::None, Token::Eof]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let src = "// heading\n$ { /* inline\n block */ timeout_time = 30; }";
        assert_eq!(
            kinds(src),
            vec![
                Token::Dollar,
                Token::LBrace,
                Token::Word("timeout_time".into()),
                Token::Eq,
                Token::Int(30),
                Token::Semi,
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn single_quoted_strings_and_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\tb""#),
            vec![Token::Str("it's".into()), Token::Str("a\tb".into()), Token::Eof]
        );
    }

    #[test]
    fn backtick_strings_are_dedented() {
        let src = "text = `\n    Line one\n      indented\n    Line two\n    `";
        let toks = kinds(src);
        assert_eq!(toks[2], Token::Str("Line one\n  indented\nLine two".into()));
    }

    #[test]
    fn negative_numbers() {
        assert_eq!(kinds("-12"), vec![Token::Int(-12), Token::Eof]);
    }

    #[test]
    fn positions_are_tracked() {
        let toks = tokenize("@ main {\n  title = \"T\"\n}").unwrap();
        let title = &toks[3];
        assert_eq!(title.token, Token::Word("title".into()));
        assert_eq!((title.line, title.column), (2, 3));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("title = \"oops\n").unwrap_err();
        assert_eq!(err.stage, crate::error::Stage::Lex);
        assert_eq!((err.line, err.column), (1, 9));
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn unknown_character_is_an_error() {
        let err = tokenize("@ main { # }").unwrap_err();
        assert!(err.message.contains("unexpected character '#'"));
        assert_eq!(err.column, 10);
    }
}
