// Lexer
//
// This file is part of Poppy.
// Copyright (C) 2024 The Poppy Authors
//
// Poppy is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published
// by the Free Software Foundation, either version 3 of the License,
// or (at your option) any later version.
//
// Poppy is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See
// the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Poppy.  If not, see <http://www.gnu.org/licenses/>.

//! Single-pass lexer: source text -> token sequence, no lookahead
//! beyond two characters. Never panics; lexical errors become
//! [`TokenKind::Error`] tokens carried in the stream (§4.C).

use crate::message::Kind as DiagKind;
use crate::mnemonics;
use crate::source::{FileId, Location, SourceRegistry};
use crate::token::{Anon, Punct, Token, TokenKind};

pub struct Lexer<'a> {
    file: FileId,
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(sources: &'a SourceRegistry, file: FileId) -> Self {
        let text = sources.text(file);
        Lexer { file, text, bytes: text.as_bytes(), pos: 0 }
    }

    /// Lexes the entire file into a token stream, always terminated by
    /// a single `Eof` token.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token();
            let eof = tok.is_eof();
            out.push(tok);
            if eof {
                break;
            }
        }
        out
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn loc_at(&self, offset: usize) -> Location {
        // Recomputed on demand; SourceRegistry does the actual
        // line/column math so the lexer stays a dumb byte-offset cursor.
        Location::new(self.file, 0, 0, offset as u32)
    }

    fn skip_intertoken_space(&mut self) -> Result<(), (usize, DiagKind)> {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.pos += 1;
                }
                Some(b';') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    let mut depth = 1usize;
                    while depth > 0 {
                        match (self.peek(), self.peek_at(1)) {
                            (Some(b'/'), Some(b'*')) => {
                                depth += 1;
                                self.pos += 2;
                            }
                            (Some(b'*'), Some(b'/')) => {
                                depth -= 1;
                                self.pos += 2;
                            }
                            (Some(_), _) => {
                                self.pos += 1;
                            }
                            (None, _) => {
                                return Err((start, DiagKind::UnterminatedComment));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Token {
        if let Err((start, kind)) = self.skip_intertoken_space() {
            return Token::new(TokenKind::Error(kind), "", self.loc_at(start));
        }

        let start = self.pos;
        let Some(c) = self.peek() else {
            return Token::new(TokenKind::Eof, "", self.loc_at(start));
        };

        match c {
            b'\n' => {
                self.pos += 1;
                Token::new(TokenKind::Newline, "\n", self.loc_at(start))
            }
            b'.' => self.lex_directive(start),
            b'@' => self.lex_local_identifier(start),
            b'$' => self.lex_hex_or_bank(start),
            b'%' => self.lex_binary(start),
            b'0'..=b'9' => self.lex_decimal(start),
            b'"' => self.lex_string(start),
            b'\'' => self.lex_char(start),
            b'+' => self.lex_anon_run(start, b'+'),
            b'-' => self.lex_anon_run(start, b'-'),
            c if is_ident_start(c) => self.lex_word(start),
            _ => self.lex_punct(start, c),
        }
    }

    // -- identifiers, directives, mnemonics -----------------------------

    fn lex_word(&mut self, start: usize) -> Token {
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.pos += 1;
        }
        let base_end = self.pos;
        let base = &self.text[start..base_end];

        // `mnemonic.b` / `.w` / `.l` / `.s` size suffix, only consumed
        // when the base word is itself a known mnemonic.
        if self.peek() == Some(b'.') {
            if let Some(sfx) = self.peek_at(1) {
                let sfx_char = (sfx as char).to_ascii_lowercase();
                let after_ok = !matches!(self.peek_at(2), Some(c) if is_ident_continue(c));
                if matches!(sfx_char, 'b' | 'w' | 'l' | 's')
                    && after_ok
                    && mnemonics::is_mnemonic(&base.to_ascii_lowercase())
                {
                    self.pos += 2;
                    let text = &self.text[start..self.pos];
                    return Token::new(
                        TokenKind::Mnemonic(base.to_ascii_lowercase(), Some(sfx_char)),
                        text,
                        self.loc_at(start),
                    );
                }
            }
        }

        let lower = base.to_ascii_lowercase();
        let kind = if mnemonics::is_mnemonic(&lower) {
            TokenKind::Mnemonic(lower, None)
        } else {
            TokenKind::Identifier(base.to_string())
        };
        Token::new(kind, base, self.loc_at(start))
    }

    fn lex_local_identifier(&mut self, start: usize) -> Token {
        self.pos += 1; // '@'
        let name_start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.pos += 1;
        }
        let name = &self.text[name_start..self.pos];
        let text = &self.text[start..self.pos];
        Token::new(
            TokenKind::LocalIdentifier(name.to_string()),
            text,
            self.loc_at(start),
        )
    }

    fn lex_directive(&mut self, start: usize) -> Token {
        self.pos += 1; // '.'
        let name_start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.pos += 1;
        }
        if self.pos == name_start {
            // Bare '.', not followed by a name: treat as punctuation.
            return Token::new(TokenKind::Punct(Punct::Dot), ".", self.loc_at(start));
        }
        let name = &self.text[name_start..self.pos];
        let text = &self.text[start..self.pos];
        Token::new(
            TokenKind::Directive(name.to_ascii_lowercase()),
            text,
            self.loc_at(start),
        )
    }

    // -- numbers ---------------------------------------------------------

    fn lex_hex_or_bank(&mut self, start: usize) -> Token {
        self.pos += 1; // '$'
        let digits_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit() || c == b'_') {
            self.pos += 1;
        }
        if self.pos == digits_start {
            return self.error_here(start, DiagKind::UnexpectedChar('$'));
        }
        let first = strip_us(&self.text[digits_start..self.pos]);

        // Bank form `$bb:aaaa`.
        if self.peek() == Some(b':') && matches!(self.peek_at(1), Some(c) if c.is_ascii_hexdigit())
        {
            self.pos += 1;
            let addr_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit() || c == b'_') {
                self.pos += 1;
            }
            let addr = strip_us(&self.text[addr_start..self.pos]);
            let bank = match i64::from_str_radix(&first, 16) {
                Ok(v) => v,
                Err(_) => return self.error_here(start, DiagKind::Overflow),
            };
            let addr_val = match i64::from_str_radix(&addr, 16) {
                Ok(v) => v,
                Err(_) => return self.error_here(start, DiagKind::Overflow),
            };
            let value = (bank << 16) | addr_val;
            let text = &self.text[start..self.pos];
            return Token::new(TokenKind::Number(value), text, self.loc_at(start));
        }

        match i64::from_str_radix(&first, 16) {
            Ok(v) => {
                let text = &self.text[start..self.pos];
                Token::new(TokenKind::Number(v), text, self.loc_at(start))
            }
            Err(_) => self.error_here(start, DiagKind::Overflow),
        }
    }

    fn lex_binary(&mut self, start: usize) -> Token {
        self.pos += 1; // '%'
        let digits_start = self.pos;
        while matches!(self.peek(), Some(c) if c == b'0' || c == b'1' || c == b'_') {
            self.pos += 1;
        }
        if self.pos == digits_start {
            return self.error_here(start, DiagKind::UnexpectedChar('%'));
        }
        let digits = strip_us(&self.text[digits_start..self.pos]);
        match i64::from_str_radix(&digits, 2) {
            Ok(v) => {
                let text = &self.text[start..self.pos];
                Token::new(TokenKind::Number(v), text, self.loc_at(start))
            }
            Err(_) => self.error_here(start, DiagKind::Overflow),
        }
    }

    fn lex_decimal(&mut self, start: usize) -> Token {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == b'_') {
            self.pos += 1;
        }
        let digits = strip_us(&self.text[start..self.pos]);
        match digits.parse::<i64>() {
            Ok(v) => {
                let text = &self.text[start..self.pos];
                Token::new(TokenKind::Number(v), text, self.loc_at(start))
            }
            Err(_) => self.error_here(start, DiagKind::Overflow),
        }
    }

    // -- strings & characters ---------------------------------------------

    fn lex_string(&mut self, start: usize) -> Token {
        self.pos += 1; // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => return self.error_here(start, DiagKind::UnterminatedString),
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => match self.lex_escape() {
                    Ok(c) => value.push(c),
                    Err(kind) => return self.error_here(start, kind),
                },
                Some(_) => {
                    let c = self.text[self.pos..].chars().next().unwrap();
                    value.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
        let text = &self.text[start..self.pos];
        Token::new(TokenKind::String(value), text, self.loc_at(start))
    }

    fn lex_char(&mut self, start: usize) -> Token {
        self.pos += 1; // opening quote
        let value = match self.peek() {
            None | Some(b'\n') => return self.error_here(start, DiagKind::UnterminatedChar),
            Some(b'\\') => match self.lex_escape() {
                Ok(c) => c,
                Err(kind) => return self.error_here(start, kind),
            },
            Some(_) => {
                let c = self.text[self.pos..].chars().next().unwrap();
                self.pos += c.len_utf8();
                c
            }
        };
        match self.peek() {
            Some(b'\'') => {
                self.pos += 1;
                let text = &self.text[start..self.pos];
                Token::new(TokenKind::Character(value), text, self.loc_at(start))
            }
            None | Some(b'\n') => self.error_here(start, DiagKind::UnterminatedChar),
            Some(_) => self.error_here(start, DiagKind::CharLength),
        }
    }

    fn lex_escape(&mut self) -> Result<char, DiagKind> {
        self.pos += 1; // backslash
        match self.bump() {
            Some(b'\\') => Ok('\\'),
            Some(b'"') => Ok('"'),
            Some(b'\'') => Ok('\''),
            Some(b'n') => Ok('\n'),
            Some(b't') => Ok('\t'),
            Some(_) | None => Err(DiagKind::InvalidEscape),
        }
    }

    // -- operators ---------------------------------------------------------

    fn lex_anon_run(&mut self, start: usize, c: u8) -> Token {
        let mut count = 0u32;
        while self.peek() == Some(c) {
            self.pos += 1;
            count += 1;
        }
        if matches!(self.peek(), Some(b) if is_ident_start(b)) {
            if count == 1 {
                let name_start = self.pos;
                while matches!(self.peek(), Some(b) if is_ident_continue(b)) {
                    self.pos += 1;
                }
                let name = self.text[name_start..self.pos].to_string();
                let text = &self.text[start..self.pos];
                let anon = if c == b'+' {
                    Anon::ForwardNamed(name)
                } else {
                    Anon::BackwardNamed(name)
                };
                return Token::new(TokenKind::Anonymous(anon), text, self.loc_at(start));
            }
            // A run of 2+ immediately followed by an identifier is not a
            // named form in this dialect; fall through and treat the run
            // as an unnamed anonymous-label reference, leaving the
            // identifier as a separate token.
        }
        let text = &self.text[start..self.pos];
        let anon = if c == b'+' { Anon::Forward(count) } else { Anon::Backward(count) };
        Token::new(TokenKind::Anonymous(anon), text, self.loc_at(start))
    }

    fn lex_punct(&mut self, start: usize, c: u8) -> Token {
        let two = self.peek_at(1);
        macro_rules! two_char {
            ($p:expr) => {{
                self.pos += 2;
                Token::new(TokenKind::Punct($p), &self.text[start..self.pos], self.loc_at(start))
            }};
        }
        macro_rules! one_char {
            ($p:expr) => {{
                self.pos += 1;
                Token::new(TokenKind::Punct($p), &self.text[start..self.pos], self.loc_at(start))
            }};
        }
        match (c, two) {
            (b'<', Some(b'<')) => two_char!(Punct::Shl),
            (b'>', Some(b'>')) => two_char!(Punct::Shr),
            (b'=', Some(b'=')) => two_char!(Punct::EqEq),
            (b'!', Some(b'=')) => two_char!(Punct::Ne),
            (b'<', Some(b'=')) => two_char!(Punct::Le),
            (b'>', Some(b'=')) => two_char!(Punct::Ge),
            (b'&', Some(b'&')) => two_char!(Punct::AmpAmp),
            (b'|', Some(b'|')) => two_char!(Punct::PipePipe),
            (b'(', _) => one_char!(Punct::LParen),
            (b')', _) => one_char!(Punct::RParen),
            (b'[', _) => one_char!(Punct::LBracket),
            (b']', _) => one_char!(Punct::RBracket),
            (b',', _) => one_char!(Punct::Comma),
            (b':', _) => one_char!(Punct::Colon),
            (b'#', _) => one_char!(Punct::Hash),
            (b'*', _) => one_char!(Punct::Star),
            (b'/', _) => one_char!(Punct::Slash),
            (b'%', _) => one_char!(Punct::Percent),
            (b'&', _) => one_char!(Punct::Amp),
            (b'|', _) => one_char!(Punct::Pipe),
            (b'^', _) => one_char!(Punct::Caret),
            (b'~', _) => one_char!(Punct::Tilde),
            (b'!', _) => one_char!(Punct::Bang),
            (b'<', _) => one_char!(Punct::Lt),
            (b'>', _) => one_char!(Punct::Gt),
            (b'=', _) => one_char!(Punct::Eq),
            _ => {
                let ch = self.text[self.pos..].chars().next().unwrap();
                self.pos += ch.len_utf8();
                Token::new(TokenKind::Error(DiagKind::UnexpectedChar(ch)), "", self.loc_at(start))
            }
        }
    }

    fn error_here(&self, start: usize, kind: DiagKind) -> Token {
        Token::new(TokenKind::Error(kind), &self.text[start..self.pos], self.loc_at(start))
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn strip_us(s: &str) -> std::borrow::Cow<'_, str> {
    if s.contains('_') {
        std::borrow::Cow::Owned(s.chars().filter(|&c| c != '_').collect())
    } else {
        std::borrow::Cow::Borrowed(s)
    }
}

/// Resolves every token's placeholder `Location` (file id + byte
/// offset only) against the registry to fill in real line/column
/// numbers. Kept as a separate pass so the lexer itself never borrows
/// the registry mutably.
pub fn resolve_locations(sources: &SourceRegistry, tokens: &mut [Token]) {
    for tok in tokens {
        let (line, column) = sources.line_column(tok.loc.file, tok.loc.offset);
        tok.loc.line = line;
        tok.loc.column = column;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> (SourceRegistry, Vec<Token>) {
        let mut sources = SourceRegistry::new();
        let f = sources.add_text("t.pasm", src.to_string());
        let mut toks = Lexer::new(&sources, f).tokenize();
        resolve_locations(&sources, &mut toks);
        (sources, toks)
    }

    #[test]
    fn lexes_immediate_load() {
        let (_s, toks) = lex("lda #$42\n");
        assert_eq!(toks[0].kind, TokenKind::Mnemonic("lda".into(), None));
        assert_eq!(toks[1].kind, TokenKind::Punct(Punct::Hash));
        assert_eq!(toks[2].kind, TokenKind::Number(0x42));
        assert_eq!(toks[3].kind, TokenKind::Newline);
        assert_eq!(toks[4].kind, TokenKind::Eof);
    }

    #[test]
    fn lexes_bank_number() {
        let (_s, toks) = lex("$7e:2000\n");
        assert_eq!(toks[0].kind, TokenKind::Number((0x7e << 16) | 0x2000));
    }

    #[test]
    fn lexes_binary_with_underscore() {
        let (_s, toks) = lex("%1010_0101\n");
        assert_eq!(toks[0].kind, TokenKind::Number(0xA5));
    }

    #[test]
    fn lexes_directive() {
        let (_s, toks) = lex(".org $8000\n");
        assert_eq!(toks[0].kind, TokenKind::Directive("org".into()));
    }

    #[test]
    fn lexes_local_label() {
        let (_s, toks) = lex("@loop: dex\n");
        assert_eq!(toks[0].kind, TokenKind::LocalIdentifier("loop".into()));
    }

    #[test]
    fn lexes_named_anonymous() {
        let (_s, toks) = lex("beq +skip\n");
        assert_eq!(toks[1].kind, TokenKind::Anonymous(Anon::ForwardNamed("skip".into())));
    }

    #[test]
    fn lexes_unnamed_anonymous_run() {
        let (_s, toks) = lex("beq +\nbne --\n");
        assert_eq!(toks[1].kind, TokenKind::Anonymous(Anon::Forward(1)));
        assert_eq!(toks[4].kind, TokenKind::Anonymous(Anon::Backward(2)));
    }

    #[test]
    fn lexes_mnemonic_with_size_suffix() {
        let (_s, toks) = lex("move.w d0,d1\n");
        assert_eq!(toks[0].kind, TokenKind::Mnemonic("move".into(), Some('w')));
    }

    #[test]
    fn lexes_string_escapes() {
        let (_s, toks) = lex("\"a\\nb\\\"c\"\n");
        assert_eq!(toks[0].kind, TokenKind::String("a\nb\"c".into()));
    }

    #[test]
    fn lexes_char_literal() {
        let (_s, toks) = lex("'x'\n");
        assert_eq!(toks[0].kind, TokenKind::Character('x'));
    }

    #[test]
    fn unterminated_string_is_error_token() {
        let (_s, toks) = lex("\"abc\n");
        assert!(matches!(toks[0].kind, TokenKind::Error(DiagKind::UnterminatedString)));
    }

    #[test]
    fn nested_block_comments() {
        let (_s, toks) = lex("/* outer /* inner */ still outer */ lda\n");
        assert_eq!(toks[0].kind, TokenKind::Mnemonic("lda".into(), None));
    }

    #[test]
    fn compound_operators() {
        let (_s, toks) = lex("a << b >> c == d != e && f\n");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind.clone()).collect();
        assert!(kinds.contains(&TokenKind::Punct(Punct::Shl)));
        assert!(kinds.contains(&TokenKind::Punct(Punct::Shr)));
        assert!(kinds.contains(&TokenKind::Punct(Punct::EqEq)));
        assert!(kinds.contains(&TokenKind::Punct(Punct::Ne)));
        assert!(kinds.contains(&TokenKind::Punct(Punct::AmpAmp)));
    }

    #[test]
    fn identifier_starting_with_at_is_not_an_operator() {
        // Open Question 1: `@` always begins an identifier.
        let (_s, toks) = lex("@x\n");
        assert_eq!(toks[0].kind, TokenKind::LocalIdentifier("x".into()));
    }
}
