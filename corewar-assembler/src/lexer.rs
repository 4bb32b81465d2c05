//! Lexer for Corewar assembly source.
//!
//! Single-pass character scanner producing typed items with byte position and
//! line number. An error item is terminal: every call after it returns EOF at
//! the recorded position.

use std::fmt;

use corewar_spec::{
    COMMENT_CHARS, DIRECTIVE_CHAR, DIRECT_CHAR, LABEL_CHAR, LABEL_CHARS, RAW_CODE_CHARS,
    SEPARATOR_CHAR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Scan failure; the value is the error text.
    Error,
    Newline,
    Identifier,
    Number,
    /// Raw string, including quotes.
    RawString,
    /// `name:` — the value is the name without the separator.
    LabelDef,
    /// `:name` — the value keeps the leading separator.
    LabelRef,
    Comma,
    Percent,
    Comment,
    /// Directive, value includes the leading dot.
    Directive,
    Eof,
}

impl ItemKind {
    /// Whole-line comments only, so a comment ends the line like a newline.
    pub fn is_eol(self) -> bool {
        matches!(self, ItemKind::Newline | ItemKind::Comment | ItemKind::Eof)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemKind::Error => "<error>",
            ItemKind::Newline => "<newline>",
            ItemKind::Identifier => "<identifier>",
            ItemKind::Number => "<number>",
            ItemKind::RawString => "<raw string>",
            ItemKind::LabelDef => "<label definition>",
            ItemKind::LabelRef => "<label reference>",
            ItemKind::Comma => "<comma>",
            ItemKind::Percent => "<percent>",
            ItemKind::Comment => "<comment>",
            ItemKind::Directive => "<directive>",
            ItemKind::Eof => "<eof>",
        };
        write!(f, "{name}")
    }
}

/// One lexed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub kind: ItemKind,
    pub val: String,
    /// Start position, in characters, in the input.
    pub pos: usize,
    /// Line number at the start of the item.
    pub line: usize,
}

impl Item {
    fn new(kind: ItemKind, val: impl Into<String>, pos: usize, line: usize) -> Self {
        Item {
            kind,
            val: val.into(),
            pos,
            line,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ItemKind::Eof => write!(f, "EOF"),
            ItemKind::Error => write!(f, "{}", self.val),
            ItemKind::Newline => write!(f, "'\\n'"),
            _ => write!(f, "{} {:?}", self.kind, self.val),
        }
    }
}

/// Holds the state of the scanner.
#[derive(Debug, Clone)]
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    /// Set once an error item has been emitted.
    failed: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            failed: false,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn error(&mut self, pos: usize, line: usize, message: String) -> Item {
        self.failed = true;
        Item::new(ItemKind::Error, message, pos, line)
    }

    fn is_ident_char(ch: char) -> bool {
        LABEL_CHARS.contains(ch)
    }

    fn is_raw_code_char(ch: char) -> bool {
        RAW_CODE_CHARS.contains(ch)
    }

    /// Returns the next item from the input.
    pub fn next_item(&mut self) -> Item {
        if self.failed {
            return Item::new(ItemKind::Eof, "EOF", self.pos, self.line);
        }

        // Skip leading blanks.
        while matches!(self.current(), Some(' ' | '\t' | '\r')) {
            self.advance();
        }

        let pos = self.pos;
        let line = self.line;

        let ch = match self.current() {
            None => return Item::new(ItemKind::Eof, "EOF", pos, line),
            Some(ch) => ch,
        };

        match ch {
            '\n' => {
                // A run of blanks containing at least one newline is one item.
                while matches!(self.current(), Some(' ' | '\t' | '\r' | '\n')) {
                    self.advance();
                }
                if self.current().is_none() {
                    return Item::new(ItemKind::Eof, "EOF", self.pos, self.line);
                }
                Item::new(ItemKind::Newline, "\n", pos, line)
            }
            c if COMMENT_CHARS.contains(c) => self.lex_comment(pos, line),
            '"' => self.lex_string(pos, line),
            c if c == SEPARATOR_CHAR => {
                self.advance();
                Item::new(ItemKind::Comma, ",", pos, line)
            }
            c if c == DIRECT_CHAR => {
                self.advance();
                Item::new(ItemKind::Percent, "%", pos, line)
            }
            c if c == DIRECTIVE_CHAR => self.lex_directive(pos, line),
            c if c == LABEL_CHAR => self.lex_label_reference(pos, line),
            '+' | '-' => self.lex_number(pos, line),
            c if c.is_ascii_digit() => self.lex_number(pos, line),
            c if Self::is_ident_char(c) => self.lex_identifier(pos, line),
            // Uppercase raw-code content, checked after the identifier set.
            c if Self::is_raw_code_char(c) => {
                let mut val = String::new();
                while let Some(c) = self.current() {
                    if !Self::is_raw_code_char(c) {
                        break;
                    }
                    val.push(c);
                    self.advance();
                }
                Item::new(ItemKind::Identifier, val, pos, line)
            }
            c => self.error(pos, line, format!("unexpected character {c:?}")),
        }
    }

    fn lex_comment(&mut self, pos: usize, line: usize) -> Item {
        let mut val = String::new();
        while let Some(ch) = self.current() {
            if ch == '\n' {
                break;
            }
            val.push(ch);
            self.advance();
        }
        Item::new(ItemKind::Comment, val.trim(), pos, line)
    }

    fn lex_string(&mut self, pos: usize, line: usize) -> Item {
        let mut val = String::new();
        val.push(self.advance().unwrap()); // Opening quote.
        loop {
            match self.advance() {
                None | Some('\n') => {
                    return self.error(pos, line, "missing closing quote".to_string());
                }
                Some('"') => {
                    val.push('"');
                    return Item::new(ItemKind::RawString, val, pos, line);
                }
                Some('\\') => {
                    val.push('\\');
                    if let Some(escaped) = self.advance() {
                        val.push(escaped);
                    }
                }
                Some(ch) => val.push(ch),
            }
        }
    }

    fn lex_directive(&mut self, pos: usize, line: usize) -> Item {
        let mut val = String::new();
        val.push(self.advance().unwrap()); // The dot.
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                break;
            }
            val.push(ch);
            self.advance();
        }
        if val.len() == 1 {
            return self.error(pos, line, "missing directive name".to_string());
        }
        Item::new(ItemKind::Directive, val, pos, line)
    }

    fn lex_label_reference(&mut self, pos: usize, line: usize) -> Item {
        self.advance(); // The separator.
        let mut name = String::new();
        while let Some(ch) = self.current() {
            if !Self::is_ident_char(ch) {
                break;
            }
            name.push(ch);
            self.advance();
        }
        if name.is_empty() {
            return self.error(pos, line, "missing label name".to_string());
        }
        Item::new(ItemKind::LabelRef, format!("{LABEL_CHAR}{name}"), pos, line)
    }

    /// Lex a numeric literal, falling back to an identifier when the digits
    /// run into identifier characters outside the base (e.g. `3fork`).
    fn lex_number(&mut self, pos: usize, line: usize) -> Item {
        let mut val = String::new();

        if matches!(self.current(), Some('+' | '-')) {
            val.push(self.advance().unwrap());
        }

        // Optional base prefix.
        let mut digit_set: fn(char) -> bool = |c| c.is_ascii_digit();
        if self.current() == Some('0') {
            match self.peek(1) {
                Some('x' | 'X') => {
                    val.push(self.advance().unwrap());
                    val.push(self.advance().unwrap());
                    digit_set = |c| c.is_ascii_hexdigit();
                }
                Some('o' | 'O') => {
                    val.push(self.advance().unwrap());
                    val.push(self.advance().unwrap());
                    digit_set = |c| ('0'..='7').contains(&c);
                }
                Some('b' | 'B') => {
                    val.push(self.advance().unwrap());
                    val.push(self.advance().unwrap());
                    digit_set = |c| c == '0' || c == '1';
                }
                _ => {}
            }
        }

        while let Some(ch) = self.current() {
            if digit_set(ch) || ch == '_' {
                val.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Digits running into identifier characters reclassify the whole
        // lexeme, so labels like `3fork` and raw-code bytes like `0A` still
        // work.
        if matches!(self.current(), Some(c) if Self::is_raw_code_char(c)) {
            while let Some(ch) = self.current() {
                if !Self::is_raw_code_char(ch) {
                    break;
                }
                val.push(ch);
                self.advance();
            }
            return self.finish_word(val, pos, line);
        }

        // A digit-only label definition, e.g. `42:`. A bare sign before the
        // separator stays a number so `-:b` keeps joining expressions.
        if self.current() == Some(LABEL_CHAR) && !val.starts_with(['+', '-']) {
            self.advance();
            return Item::new(ItemKind::LabelDef, val, pos, line);
        }

        // A lone sign or base prefix stays a number item: bare `+`/`-` join
        // additive expressions, and the parser reports malformed literals.
        Item::new(ItemKind::Number, val, pos, line)
    }

    fn lex_identifier(&mut self, pos: usize, line: usize) -> Item {
        let mut val = String::new();
        while let Some(ch) = self.current() {
            if !Self::is_ident_char(ch) {
                break;
            }
            val.push(ch);
            self.advance();
        }
        self.finish_word(val, pos, line)
    }

    /// Emit an identifier, or a label definition when the word is directly
    /// followed by the label separator.
    fn finish_word(&mut self, val: String, pos: usize, line: usize) -> Item {
        if self.current() == Some(LABEL_CHAR) {
            self.advance();
            return Item::new(ItemKind::LabelDef, val, pos, line);
        }
        Item::new(ItemKind::Identifier, val, pos, line)
    }
}
