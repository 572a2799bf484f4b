//! Lexical scanning.
//!
//! The lexer reads whole lines into a buffer and scans tokens out of it,
//! tracking the line number and the `[start, end)` column span of every
//! token for diagnostics. Two token slots (`curr`, `prev`) rotate so one
//! token of lookback is always available. A set of mode flags switches
//! between file scanning and the interactive command prompt.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Write};
use std::path::Path;

use bitflags::bitflags;
use num_bigint::BigInt;

use crate::error::{DiagKind, Diagnostic, Result};
use crate::intern::Interner;
use crate::token::{keyword, Token, TokenKind, TokenValue, OPERATORS};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LexFlags: u32 {
        /// Reading interactive commands: lines arrive one at a time and
        /// end-of-line is a token.
        const CMND = 1 << 0;
        /// Recognize keywords at the command prompt.
        const CMND_KW = 1 << 1;
        /// Scan tokens as filenames.
        const FILENAME = 1 << 2;
        /// Use line editing and history for prompts.
        const READLINE = 1 << 3;
    }
}

const ASCII_BEL: u8 = 0x07;
const ASCII_BS: u8 = 0x08;
const ASCII_TAB: u8 = 0x09;
const ASCII_LF: u8 = 0x0a;
const ASCII_VT: u8 = 0x0b;
const ASCII_FF: u8 = 0x0c;
const ASCII_CR: u8 = 0x0d;
const ASCII_XON: u8 = 0x11;
const ASCII_XOFF: u8 = 0x13;

fn escaped_char(c: u8) -> Option<u8> {
    match c {
        b'n' => Some(ASCII_LF),
        b't' => Some(ASCII_TAB),
        b'v' => Some(ASCII_VT),
        b'b' => Some(ASCII_BS),
        b'r' => Some(ASCII_CR),
        b'f' => Some(ASCII_FF),
        b'a' => Some(ASCII_BEL),
        b'\\' => Some(b'\\'),
        b'\'' => Some(b'\''),
        b'"' => Some(b'"'),
        b'q' => Some(ASCII_XON),
        b's' => Some(ASCII_XOFF),
        _ => None,
    }
}

fn escape_for(c: u8) -> Option<u8> {
    match c {
        ASCII_LF => Some(b'n'),
        ASCII_TAB => Some(b't'),
        ASCII_VT => Some(b'v'),
        ASCII_BS => Some(b'b'),
        ASCII_CR => Some(b'r'),
        ASCII_FF => Some(b'f'),
        ASCII_BEL => Some(b'a'),
        b'\\' => Some(b'\\'),
        ASCII_XON => Some(b'q'),
        ASCII_XOFF => Some(b's'),
        _ => None,
    }
}

/// Render `s` as a double-quoted string literal with escapes.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for &b in s.as_bytes() {
        if b == b'"' {
            out.push_str("\\\"");
        } else if b == b'\\' {
            out.push_str("\\\\");
        } else if b.is_ascii_graphic() || b == b' ' {
            out.push(b as char);
        } else if let Some(e) = escape_for(b) {
            out.push('\\');
            out.push(e as char);
        } else {
            out.push('?');
        }
    }
    out.push('"');
    out
}

/// Render a character constant with escapes.
pub fn quote_char(c: i64) -> String {
    let b = c as u8;
    if b == b'\'' {
        return "'\\''".to_string();
    }
    if b == b'\\' {
        "'\\\\'".to_string()
    } else if b.is_ascii_graphic() || b == b' ' {
        format!("'{}'", b as char)
    } else if let Some(e) = escape_for(b) {
        format!("'\\{}'", e as char)
    } else {
        "'?'".to_string()
    }
}

pub struct Lexer<'i> {
    pub fin_nm: String,
    reader: Option<Box<dyn BufRead>>,
    pub lnr: u32,
    /// Current line, terminated by `'\n'`.
    line: String,
    /// Scan position in `line`.
    pos: usize,
    pub flags: LexFlags,
    /// Refuse the `==`/`?#`/`&&`/`||` fix-ups instead of continuing.
    pub strict: bool,
    pub curr: Token,
    pub prev: Token,
    pub interner: &'i mut Interner,
    editor: Option<rustyline::DefaultEditor>,
}

impl<'i> Lexer<'i> {
    pub fn new(interner: &'i mut Interner) -> Self {
        Lexer {
            fin_nm: String::new(),
            reader: None,
            lnr: 0,
            line: String::new(),
            pos: 0,
            flags: LexFlags::empty(),
            strict: false,
            curr: Token::default(),
            prev: Token::default(),
            interner,
            editor: None,
        }
    }

    /// Begin scanning a file; reads the first token.
    pub fn start_file(&mut self, path: &Path) -> Result<()> {
        let f = File::open(path).map_err(|e| {
            Diagnostic::new(
                DiagKind::Resolve,
                &path.display().to_string(),
                0,
                0,
                format!("Cannot open: {}", e),
            )
        })?;
        self.fin_nm = path.display().to_string();
        self.start_reader(Box::new(BufReader::new(f)))
    }

    /// Begin scanning an in-memory source with the given file name.
    pub fn start_source(&mut self, name: &str, src: &str) -> Result<()> {
        self.fin_nm = name.to_string();
        self.start_reader(Box::new(Cursor::new(src.to_string())))
    }

    fn start_reader(&mut self, r: Box<dyn BufRead>) -> Result<()> {
        self.reader = Some(r);
        self.lnr = 0;
        self.line.clear();
        self.pos = 0;
        self.flags = LexFlags::empty();
        self.curr = Token::default();
        self.prev = Token::default();
        self.next()
    }

    /// Attach a line editor for `READLINE` prompts.
    pub fn use_readline(&mut self) {
        if let Ok(ed) = rustyline::DefaultEditor::new() {
            self.editor = Some(ed);
            self.flags |= LexFlags::READLINE;
        }
    }

    /// Attach standard input, for command prompts without line editing.
    pub fn use_stdin(&mut self) {
        self.reader = Some(Box::new(BufReader::new(std::io::stdin())));
    }

    /// Read the next line. Returns false at end of input. Never reads in
    /// command mode: the prompt owns line acquisition there.
    fn read_line(&mut self) -> Result<bool> {
        if self.flags.contains(LexFlags::CMND) {
            return Ok(false);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };
        self.line.clear();
        let n = reader.read_line(&mut self.line).map_err(|e| {
            Diagnostic::new(
                DiagKind::Lex,
                &self.fin_nm,
                self.lnr,
                0,
                format!("Read error: {}", e),
            )
        })?;
        if n == 0 {
            return Ok(false);
        }
        if !self.line.ends_with('\n') {
            self.line.push('\n');
        }
        self.lnr += 1;
        self.pos = 0;
        Ok(true)
    }

    /// Prompt for a command line and scan its first token. Returns
    /// `TokenKind::Eof` when the user signals end of input.
    pub fn prompt_cmnd(&mut self, prompt: &str) -> Result<TokenKind> {
        if self.flags.contains(LexFlags::READLINE) && self.editor.is_some() {
            let ed = self.editor.as_mut().unwrap();
            match ed.readline(prompt) {
                Ok(input) => {
                    if !input.is_empty() {
                        let _ = ed.add_history_entry(input.as_str());
                    }
                    self.line = input;
                    self.line.push('\n');
                    self.lnr += 1;
                    self.pos = 0;
                }
                Err(_) => {
                    self.line.clear();
                    self.pos = 0;
                    return Ok(TokenKind::Eof);
                }
            }
        } else {
            print!("{}", prompt);
            let _ = io::stdout().flush();
            self.flags &= !LexFlags::CMND;
            if !self.read_line()? {
                return Ok(TokenKind::Eof);
            }
        }
        self.flags |= LexFlags::CMND;
        self.next()?;
        Ok(self.curr.kind)
    }

    fn bytes(&self) -> &[u8] {
        self.line.as_bytes()
    }

    fn at(&self, i: usize) -> u8 {
        *self.bytes().get(i).unwrap_or(&b'\n')
    }

    /// Diagnostic for the current token, with excerpt and caret.
    pub fn err(&self, msg: String) -> Diagnostic {
        self.err_kind(DiagKind::Lex, msg)
    }

    pub fn parse_err(&self, msg: String) -> Diagnostic {
        self.err_kind(DiagKind::Parse, msg)
    }

    fn err_kind(&self, kind: DiagKind, msg: String) -> Diagnostic {
        let start = self.curr.start;
        let end = if self.curr.end > start {
            self.curr.end
        } else {
            self.pos.max(start + 1)
        };
        Diagnostic::new(kind, &self.fin_nm, self.lnr.max(1), start, msg)
            .with_excerpt(&self.line, start, end)
    }

    pub fn warning(&self, msg: &str) {
        eprintln!("{}", self.line.trim_end_matches('\n'));
        eprintln!("{}[{}] Warning: {}", self.fin_nm, self.lnr, msg);
    }

    /// True if the current token is `t`.
    pub fn have(&self, t: TokenKind) -> bool {
        self.curr.kind == t
    }

    /// If the current token is `t`, advance and return true.
    pub fn have_next(&mut self, t: TokenKind) -> Result<bool> {
        if self.curr.kind == t {
            self.next()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Require the current token to be `t`, then advance.
    pub fn must_be(&mut self, t: TokenKind) -> Result<()> {
        if self.curr.kind != t {
            return Err(self.parse_err(format!("Expected {}", t.name())));
        }
        self.next()
    }

    /// Require the current token to be one of `ts`, then advance.
    /// Returns the index of the match.
    pub fn must_be_one_of(&mut self, ts: &[TokenKind]) -> Result<usize> {
        for (i, &t) in ts.iter().enumerate() {
            if self.curr.kind == t {
                self.next()?;
                return Ok(i);
            }
        }
        let names: Vec<&str> = ts.iter().map(|t| t.name()).collect();
        Err(self.parse_err(format!("Expected {}", names.join(" or "))))
    }

    /// Scan the next token.
    pub fn next(&mut self) -> Result<()> {
        std::mem::swap(&mut self.curr, &mut self.prev);
        loop {
            // find the first significant character, reading lines as needed
            loop {
                if self.pos >= self.line.len() {
                    if !self.read_line()? {
                        self.curr = Token {
                            kind: TokenKind::Eof,
                            val: TokenValue::None,
                            lnr: self.lnr,
                            start: 0,
                            end: 0,
                        };
                        return Ok(());
                    }
                    continue;
                }
                let b = self.at(self.pos);
                let keep_nl = self.flags.contains(LexFlags::CMND) && b == b'\n';
                if b.is_ascii_whitespace() && !keep_nl {
                    self.pos += 1;
                    continue;
                }
                break;
            }
            self.curr = Token {
                kind: TokenKind::Nothing,
                val: TokenValue::None,
                lnr: self.lnr,
                start: self.pos,
                end: 0,
            };
            let c = self.at(self.pos);
            if self.flags.contains(LexFlags::FILENAME) {
                if c == b'"' {
                    self.scan_string()?;
                } else if c == b'\n' {
                    self.curr.kind = TokenKind::Newline;
                    self.pos = self.line.len();
                } else {
                    self.scan_filename()?;
                }
            } else if c.is_ascii_alphabetic() || c == b'_' {
                self.scan_id_kw();
            } else if c == b'`' {
                self.scan_symbol_literal()?;
            } else if self.flags.contains(LexFlags::CMND) && c == b'/' {
                self.scan_instance();
            } else if c.is_ascii_digit() {
                self.scan_integer_float()?;
            } else if c == b'.' && self.at(self.pos + 1).is_ascii_digit() {
                self.scan_float()?;
            } else if c == b'\'' {
                self.scan_char()?;
            } else if c == b'"' {
                self.scan_string()?;
            } else if !self.flags.contains(LexFlags::CMND)
                && c == b'/'
                && self.at(self.pos + 1) == b'/'
            {
                self.pos = self.line.len();
                continue;
            } else if !self.flags.contains(LexFlags::CMND)
                && c == b'/'
                && self.at(self.pos + 1) == b'*'
            {
                self.scan_comment()?;
                continue;
            } else if self.flags.contains(LexFlags::CMND) && c == b'\n' {
                self.curr.kind = TokenKind::Newline;
                self.pos = self.line.len();
            } else {
                self.scan_operator()?;
            }
            self.curr.end = self.pos;
            return Ok(());
        }
    }

    /// Re-scan the current token. Useful in command mode after a flag
    /// change (keyword recognition, filename mode).
    pub fn redo(&mut self) -> Result<()> {
        if self.curr.kind == TokenKind::Newline {
            return Ok(());
        }
        self.pos = self.curr.start;
        std::mem::swap(&mut self.curr, &mut self.prev);
        self.next()
    }

    fn scan_id_kw(&mut self) {
        let bytes = self.bytes();
        let start = self.pos;
        let mut i = start;
        let mut letters_only = true;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
            if !bytes[i].is_ascii_alphabetic() {
                letters_only = false;
            }
            i += 1;
        }
        let text = &self.line[start..i];
        let cmnd_no_kw = self.flags.contains(LexFlags::CMND)
            && !self.flags.contains(LexFlags::CMND_KW);
        let mut kind = TokenKind::Id;
        if letters_only && !cmnd_no_kw {
            if let Some(kw) = keyword(&text.to_ascii_lowercase()) {
                kind = kw;
            }
        }
        if kind == TokenKind::Id {
            self.curr.val = TokenValue::Sym(self.interner.intern(text));
        }
        self.curr.kind = kind;
        self.pos = i;
    }

    fn scan_symbol_literal(&mut self) -> Result<()> {
        let start = self.pos + 1;
        let first = self.at(start);
        if !first.is_ascii_alphabetic() && first != b'_' {
            return Err(self.err("Symbol marker '`' must be followed by identifier".into()));
        }
        let bytes = self.bytes();
        let mut i = start;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
            i += 1;
        }
        let text = self.line[start..i].to_string();
        self.curr.kind = TokenKind::SymbolConst;
        self.curr.val = TokenValue::Sym(self.interner.intern(&text));
        self.pos = i;
        Ok(())
    }

    fn scan_instance(&mut self) {
        let bytes = self.bytes();
        let start = self.pos;
        let mut i = start;
        while i < bytes.len()
            && (bytes[i] == b'/'
                || bytes[i].is_ascii_alphanumeric()
                || bytes[i] == b'_'
                || bytes[i] == b'['
                || bytes[i] == b']')
        {
            i += 1;
        }
        let text = self.line[start..i].to_string();
        self.curr.kind = TokenKind::Instance;
        self.curr.val = TokenValue::Sym(self.interner.intern(&text));
        self.pos = i;
    }

    /// Copy decimal digits to `buf`, skipping underscores.
    fn copy_decimal(&mut self, buf: &mut String) -> Result<()> {
        if !self.at(self.pos).is_ascii_digit() {
            return Err(self.err("In float: there should be a digit here.".into()));
        }
        loop {
            while self.at(self.pos) == b'_' {
                self.pos += 1;
            }
            let c = self.at(self.pos);
            if !c.is_ascii_digit() {
                break;
            }
            buf.push(c as char);
            self.pos += 1;
        }
        Ok(())
    }

    fn scan_float(&mut self) -> Result<()> {
        let mut buf = String::new();
        let mut int_part = false;
        let mut fraction = false;
        let mut exponent = false;
        self.curr.kind = TokenKind::FloatConst;
        if self.at(self.pos) != b'.' {
            self.copy_decimal(&mut buf)?;
            int_part = true;
        }
        if self.at(self.pos) == b'.' {
            buf.push('.');
            self.pos += 1;
            self.copy_decimal(&mut buf)?;
            fraction = true;
        }
        if self.at(self.pos) == b'e' || self.at(self.pos) == b'E' {
            buf.push('e');
            self.pos += 1;
            if self.at(self.pos) == b'+' {
                self.pos += 1;
            } else if self.at(self.pos) == b'-' {
                buf.push('-');
                self.pos += 1;
            }
            self.copy_decimal(&mut buf)?;
            exponent = true;
        }
        if !int_part && !fraction {
            return Err(self.err("A float must have an integer part and/or a fraction.".into()));
        }
        if !fraction && !exponent {
            return Err(self.err("A float must have a fraction and/or an exponent.".into()));
        }
        let v: f64 = buf.parse().unwrap_or(0.0);
        self.curr.val = TokenValue::Float(v);
        Ok(())
    }

    /// Scan an integer in `base`. Values that do not fit a machine word
    /// become `BigConst` tokens.
    fn scan_integer(&mut self, base: u32) -> Result<()> {
        let mut digits = String::new();
        let mut n: u64 = 0;
        let mut overflow = false;
        let m = i64::MAX as u64 / base as u64;
        loop {
            while self.at(self.pos) == b'_' {
                self.pos += 1;
            }
            let c = self.at(self.pos);
            let d = if c.is_ascii_digit() {
                (c - b'0') as u32
            } else if c.is_ascii_alphabetic() {
                10 + (c.to_ascii_lowercase() - b'a') as u32
            } else {
                break;
            };
            if d >= base {
                break;
            }
            if n <= m {
                n = n * base as u64 + d as u64;
                if n > i64::MAX as u64 {
                    overflow = true;
                }
            } else {
                overflow = true;
            }
            digits.push(c as char);
            self.pos += 1;
        }
        if digits.is_empty() && !self.at(self.pos).is_ascii_alphanumeric() {
            return Err(self.err("Integer without digits.".into()));
        }
        if overflow {
            self.curr.kind = TokenKind::BigConst;
            let z = BigInt::parse_bytes(digits.as_bytes(), base)
                .ok_or_else(|| self.err("Integer without digits.".into()))?;
            self.curr.val = TokenValue::Big(z);
        } else {
            self.curr.kind = TokenKind::IntConst;
            self.curr.val = TokenValue::Int(n as i64);
        }
        Ok(())
    }

    /// Scan an integer or float starting at a digit. Handles `0x`/`0b`
    /// prefixes and the `base#digits` suffix form.
    fn scan_integer_float(&mut self) -> Result<()> {
        let start = self.pos;
        let mut base = 10;
        self.curr.kind = TokenKind::IntConst;
        let c0 = self.at(self.pos);
        let c1 = self.at(self.pos + 1);
        if c0 == b'0' && (c1 == b'x' || c1 == b'X') {
            self.pos += 2;
            base = 16;
            self.scan_integer(base)?;
        } else if c0 == b'0' && (c1 == b'b' || c1 == b'B') {
            self.pos += 2;
            base = 2;
            self.scan_integer(base)?;
        } else {
            self.scan_integer(base)?;
            if self.at(self.pos) == b'#' {
                self.pos += 1;
                if self.curr.kind == TokenKind::BigConst {
                    return Err(self.err("Illegal base for integer".into()));
                }
                let b = self.curr.val.as_int();
                if !(2..=36).contains(&b) {
                    return Err(self.err(format!("Illegal base for integer: {}", b)));
                }
                base = b as u32;
                self.scan_integer(base)?;
            } else if (self.at(self.pos) == b'.' && self.at(self.pos + 1).is_ascii_digit())
                || self.at(self.pos) == b'e'
                || self.at(self.pos) == b'E'
            {
                self.pos = start;
                return self.scan_float();
            }
        }
        if self.at(self.pos).is_ascii_alphanumeric() {
            return Err(self.err(format!(
                "Character '{}' is illegal in a base-{} number.",
                self.at(self.pos) as char,
                base
            )));
        }
        Ok(())
    }

    /// Scan a backslash escape; returns its value.
    fn scan_escape(&mut self) -> Result<u8> {
        debug_assert_eq!(self.at(self.pos), b'\\');
        self.pos += 1;
        let c = self.at(self.pos);
        if !(c.is_ascii_graphic() || c == b' ') {
            return Err(self.err(format!(
                "Illegal character code 0x{:02X} in character escape",
                c
            )));
        }
        match escaped_char(c) {
            Some(esc) => {
                self.pos += 1;
                Ok(esc)
            }
            None => {
                if c.is_ascii_digit() || (c == b'x' && self.at(self.pos + 1).is_ascii_hexdigit()) {
                    Err(self.err(format!(
                        "Unknown character escape '\\{}'\n\
                         (if you want a number write it without quotes)",
                        c as char
                    )))
                } else {
                    Err(self.err(format!("Unknown character escape '\\{}'", c as char)))
                }
            }
        }
    }

    fn scan_char(&mut self) -> Result<()> {
        debug_assert_eq!(self.at(self.pos), b'\'');
        self.pos += 1;
        self.curr.kind = TokenKind::CharConst;
        let c = self.at(self.pos);
        let v = if c == b'\\' {
            self.scan_escape()?
        } else if c.is_ascii_graphic() || c == b' ' {
            self.pos += 1;
            c
        } else {
            return Err(self.err(format!(
                "Illegal character code 0x{:02X} in character constant",
                c
            )));
        };
        if self.at(self.pos) != b'\'' {
            if v == b'\'' {
                return Err(self.err(
                    "Missing closing quote for char constant\n\
                     (maybe you meant ''', '\\'', or '\\\\'?)"
                        .into(),
                ));
            }
            return Err(self.err("Missing closing quote for char constant".into()));
        }
        self.pos += 1;
        self.curr.val = TokenValue::Int(v as i64);
        Ok(())
    }

    fn scan_string(&mut self) -> Result<()> {
        debug_assert_eq!(self.at(self.pos), b'"');
        self.pos += 1;
        self.curr.kind = TokenKind::StringConst;
        let mut s = String::new();
        loop {
            let c = self.at(self.pos);
            if c == b'\n' || c == b'"' {
                break;
            }
            if c == b'\\' {
                s.push(self.scan_escape()? as char);
            } else {
                s.push(c as char);
                self.pos += 1;
            }
        }
        if self.at(self.pos) != b'"' {
            return Err(self.err("Missing closing quote for string".into()));
        }
        self.pos += 1;
        self.curr.val = TokenValue::Str(s);
        Ok(())
    }

    /// Everything up to the first unescaped space is a filename.
    fn scan_filename(&mut self) -> Result<()> {
        self.curr.kind = TokenKind::StringConst;
        let mut s = String::new();
        loop {
            let c = self.at(self.pos);
            if c == b'\n' || c == b' ' {
                break;
            }
            if c != b'\\' {
                s.push(c as char);
                self.pos += 1;
            } else if self.at(self.pos + 1) == b' ' {
                s.push(' ');
                self.pos += 2;
            } else {
                s.push(self.scan_escape()? as char);
            }
        }
        self.curr.val = TokenValue::Str(s);
        Ok(())
    }

    /// Scan past a `/* ... */` comment, reading lines as needed.
    /// Unterminated comments at end of file close silently.
    fn scan_comment(&mut self) -> Result<()> {
        debug_assert!(self.at(self.pos) == b'/' && self.at(self.pos + 1) == b'*');
        self.pos += 2;
        loop {
            if self.pos >= self.line.len() {
                if !self.read_line()? {
                    return Ok(());
                }
                continue;
            }
            if self.at(self.pos) == b'*' && self.at(self.pos + 1) == b'/' {
                self.pos += 2;
                return Ok(());
            }
            if self.at(self.pos) == b'/' && self.at(self.pos + 1) == b'*' {
                self.warning("'/*' inside a comment");
                self.pos += 1;
            } else if self.at(self.pos) == b'\n' {
                self.pos = self.line.len();
            } else {
                self.pos += 1;
            }
        }
    }

    /// Table-driven scan for operators and punctuation. Several nominally
    /// valid operators are rejected with a fix-up to a related operator;
    /// under `strict` the fix-ups become hard errors.
    fn scan_operator(&mut self) -> Result<()> {
        let c = self.at(self.pos);
        if !c.is_ascii_graphic() {
            return Err(self.err(format!("Illegal character code 0x{:02X} in program", c)));
        }
        let rest = &self.line[self.pos..];
        for &(text, kind) in OPERATORS {
            if rest.starts_with(text) {
                let fixup = match text {
                    "*/" => return Err(self.err("'*/' outside a comment".into())),
                    "==" => Some("There is no '==' symbol; maybe you mean '='?"),
                    "?#" => Some("There is no '?#' symbol; use '#?' for a peek"),
                    "&&" => Some("There is no '&&' symbol; you probably mean '&'"),
                    "||" => Some("There is no '||' symbol; or = '|' and pll = ','"),
                    _ => None,
                };
                if let Some(msg) = fixup {
                    if self.strict {
                        return Err(self.err(msg.into()));
                    }
                    self.warning(msg);
                }
                self.curr.kind = kind;
                self.pos += text.len();
                return Ok(());
            }
        }
        use TokenKind::*;
        let kind = match c {
            b'+' => Plus,
            b'-' => Minus,
            b'*' => Star,
            b'/' => Slash,
            b'%' => Percent,
            b'^' => Caret,
            b'~' => Tilde,
            b'#' => Hash,
            b'&' => Amp,
            b'|' => Or,
            b'(' => Lparen,
            b')' => Rparen,
            b'[' => Lbracket,
            b']' => Rbracket,
            b'{' => Lbrace,
            b'}' => Rbrace,
            b',' => Comma,
            b';' => Semi,
            b':' => Colon,
            b'.' => Dot,
            b'=' => Eq,
            b'<' => Lt,
            b'>' => Gt,
            b'?' => Query,
            b'!' => Bang,
            _ => {
                return Err(self.err(format!("Illegal character '{}' in program", c as char)));
            }
        };
        self.curr.kind = kind;
        self.pos += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str) -> Vec<(TokenKind, TokenValue)> {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        lx.start_source("test.chp", src).unwrap();
        let mut out = Vec::new();
        while lx.curr.kind != TokenKind::Eof {
            out.push((lx.curr.kind, lx.curr.val.clone()));
            lx.next().unwrap();
        }
        out
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex_all(src).into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn integer_bases() {
        let toks = lex_all("10#12 16#FF 2#1010 0xff 0b1010 1_000");
        let vals: Vec<i64> = toks.iter().map(|(_, v)| v.as_int()).collect();
        assert_eq!(vals, vec![12, 255, 10, 255, 10, 1000]);
        assert!(toks.iter().all(|(k, _)| *k == TokenKind::IntConst));
    }

    #[test]
    fn integer_above_machine_word_becomes_big() {
        let toks = lex_all("9223372036854775807 9223372036854775808");
        assert_eq!(toks[0].0, TokenKind::IntConst);
        assert_eq!(toks[0].1.as_int(), i64::MAX);
        assert_eq!(toks[1].0, TokenKind::BigConst);
        match &toks[1].1 {
            TokenValue::Big(z) => {
                assert_eq!(z.to_string(), "9223372036854775808");
            }
            v => panic!("expected big value, got {:?}", v),
        }
    }

    #[test]
    fn illegal_digit_for_base_is_an_error() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        let r = lx.start_source("t.chp", "0b1013");
        assert!(r.is_err());
        let msg = r.unwrap_err().msg;
        assert!(msg.contains("base-2"), "{}", msg);
    }

    #[test]
    fn illegal_base_rejected() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        assert!(lx.start_source("t.chp", "37#11").is_err());
    }

    #[test]
    fn keywords_fold_case_and_need_letters_only() {
        let toks = kinds("PROCESS Process process proce55");
        assert_eq!(
            toks,
            vec![
                TokenKind::KwProcess,
                TokenKind::KwProcess,
                TokenKind::KwProcess,
                TokenKind::Id
            ]
        );
    }

    #[test]
    fn identifiers_are_interned() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        lx.start_source("t.chp", "wire0 wire0").unwrap();
        let a = lx.curr.val.as_sym();
        lx.next().unwrap();
        let b = lx.curr.val.as_sym();
        assert_eq!(a, b);
    }

    #[test]
    fn symbol_literal() {
        let toks = lex_all("`ack");
        assert_eq!(toks[0].0, TokenKind::SymbolConst);
    }

    #[test]
    fn bare_backtick_is_an_error() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        assert!(lx.start_source("t.chp", "` x").is_err());
    }

    #[test]
    fn multi_char_operators() {
        let toks = kinds(":= -> .. *[ << >> [] [:] ++ != <= >= #? ...");
        assert_eq!(
            toks,
            vec![
                TokenKind::Assign,
                TokenKind::Arrow,
                TokenKind::Dots,
                TokenKind::Loop,
                TokenKind::Rep,
                TokenKind::RepEnd,
                TokenKind::Arb,
                TokenKind::Mutex,
                TokenKind::Concat,
                TokenKind::Neq,
                TokenKind::Lte,
                TokenKind::Gte,
                TokenKind::Peek,
                TokenKind::Varargs
            ]
        );
    }

    #[test]
    fn equiv_fixes_up_to_eq() {
        let toks = kinds("x == y");
        assert_eq!(toks, vec![TokenKind::Id, TokenKind::Eq, TokenKind::Id]);
    }

    #[test]
    fn andand_oror_fix_up() {
        let toks = kinds("a && b || c");
        assert_eq!(
            toks,
            vec![
                TokenKind::Id,
                TokenKind::Amp,
                TokenKind::Id,
                TokenKind::Or,
                TokenKind::Id
            ]
        );
    }

    #[test]
    fn strict_mode_refuses_fixups() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        lx.strict = true;
        assert!(lx.start_source("t.chp", "x == y").is_err() || {
            // first token is 'x'; the error comes on advance
            lx.next().is_err()
        });
    }

    #[test]
    fn close_comment_outside_comment_is_error() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        assert!(lx.start_source("t.chp", "*/").is_err());
    }

    #[test]
    fn comments_are_skipped() {
        let toks = kinds("a // c1\n/* c2\n still c2 */ b");
        assert_eq!(toks, vec![TokenKind::Id, TokenKind::Id]);
    }

    #[test]
    fn unterminated_comment_closes_at_eof() {
        let toks = kinds("a /* open");
        assert_eq!(toks, vec![TokenKind::Id]);
    }

    #[test]
    fn char_constants_and_escapes() {
        let toks = lex_all(r"'a' '\n' '\\' '\q'");
        let vals: Vec<i64> = toks.iter().map(|(_, v)| v.as_int()).collect();
        assert_eq!(vals, vec![97, 10, 92, 0x11]);
    }

    #[test]
    fn string_constants() {
        let toks = lex_all(r#""hi there\n""#);
        match &toks[0].1 {
            TokenValue::Str(s) => assert_eq!(s, "hi there\n"),
            v => panic!("expected string, got {:?}", v),
        }
    }

    #[test]
    fn unterminated_string_is_error() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        assert!(lx.start_source("t.chp", "\"oops\n").is_err());
    }

    #[test]
    fn floats() {
        let toks = lex_all("1.5 .25 2e3 1.5e-2");
        let vals: Vec<f64> = toks
            .iter()
            .map(|(_, v)| match v {
                TokenValue::Float(f) => *f,
                _ => panic!("not a float"),
            })
            .collect();
        assert_eq!(vals, vec![1.5, 0.25, 2000.0, 0.015]);
    }

    #[test]
    fn lone_exponent_is_error() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        assert!(lx.start_source("t.chp", "3e").is_err());
    }

    #[test]
    fn token_spans_cover_the_lexeme() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        lx.start_source("t.chp", "  abc := 12").unwrap();
        assert_eq!((lx.curr.start, lx.curr.end), (2, 5));
        lx.next().unwrap();
        assert_eq!((lx.curr.start, lx.curr.end), (6, 8));
        lx.next().unwrap();
        assert_eq!((lx.curr.start, lx.curr.end), (9, 11));
    }

    #[test]
    fn prev_token_rotates() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        lx.start_source("t.chp", "a b").unwrap();
        let first = lx.curr.val.as_sym();
        lx.next().unwrap();
        assert_eq!(lx.prev.val.as_sym(), first);
    }

    #[test]
    fn line_numbers_are_one_based() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        lx.start_source("t.chp", "a\nb\n").unwrap();
        assert_eq!(lx.curr.lnr, 1);
        lx.next().unwrap();
        assert_eq!(lx.curr.lnr, 2);
    }

    #[test]
    fn have_helpers() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        lx.start_source("t.chp", "skip ;").unwrap();
        assert!(lx.have(TokenKind::KwSkip));
        assert!(lx.have_next(TokenKind::KwSkip).unwrap());
        assert!(lx.must_be(TokenKind::Semi).is_ok());
        assert!(lx.have(TokenKind::Eof));
    }

    #[test]
    fn must_be_reports_expected_token() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        lx.start_source("t.chp", "skip").unwrap();
        let e = lx.must_be(TokenKind::Semi).unwrap_err();
        assert!(e.msg.contains("Expected ;"));
    }

    #[test]
    fn must_be_one_of_lists_alternatives() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        lx.start_source("t.chp", "skip").unwrap();
        let e = lx
            .must_be_one_of(&[TokenKind::Semi, TokenKind::Rparen])
            .unwrap_err();
        assert!(e.msg.contains("; or )"), "{}", e.msg);
    }

    #[test]
    fn redo_reinterprets_keywords_after_flag_change() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        lx.start_source("t.chp", "process\n").unwrap();
        assert_eq!(lx.curr.kind, TokenKind::KwProcess);
        // at the command prompt, keywords are off by default
        lx.flags |= LexFlags::CMND;
        lx.redo().unwrap();
        assert_eq!(lx.curr.kind, TokenKind::Id);
        lx.flags |= LexFlags::CMND_KW;
        lx.redo().unwrap();
        assert_eq!(lx.curr.kind, TokenKind::KwProcess);
    }

    #[test]
    fn instance_names_lex_in_command_mode() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        lx.start_source("t.chp", "/top/cell[3]\n").unwrap();
        lx.flags |= LexFlags::CMND;
        lx.redo().unwrap();
        assert_eq!(lx.curr.kind, TokenKind::Instance);
        let s = lx.curr.val.as_sym();
        assert_eq!(lx.interner.resolve(s), "/top/cell[3]");
    }

    #[test]
    fn quote_string_round_trips_escapes() {
        assert_eq!(quote_string("a\tb\n"), "\"a\\tb\\n\"");
        assert_eq!(quote_char(10), "'\\n'");
        assert_eq!(quote_char(b'x' as i64), "'x'");
    }

    #[test]
    fn non_printable_byte_rejected() {
        let mut interner = Interner::new();
        let mut lx = Lexer::new(&mut interner);
        let r = lx.start_source("t.chp", "a \u{1} b");
        let e = match r {
            Err(e) => e,
            Ok(()) => lx.next().unwrap_err(),
        };
        assert!(e.msg.contains("Illegal character code"));
    }
}
