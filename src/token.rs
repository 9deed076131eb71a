// Tokens
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

//! The token stream produced by the lexer and consumed by the parser.

use crate::message::Kind as DiagKind;
use crate::source::Location;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Punct {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Hash,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Lt,
    Gt,
    Eq,
    Shl,
    Shr,
    EqEq,
    Ne,
    Le,
    Ge,
    AmpAmp,
    PipePipe,
    Dot,
}

/// Which direction/name an anonymous-label token refers to.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Anon {
    /// `+`, `++`, ... — count is the number of `+` characters.
    Forward(u32),
    /// `-`, `--`, ... — count is the number of `-` characters.
    Backward(u32),
    /// `+tag` — named forward anonymous label.
    ForwardNamed(String),
    /// `-tag` — named backward anonymous label.
    BackwardNamed(String),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TokenKind {
    Number(i64),
    String(String),
    Character(char),
    /// A bare identifier, not recognized as a directive or mnemonic.
    Identifier(String),
    /// A local-label-form identifier: `@name`.
    LocalIdentifier(String),
    /// `mnemonic`, optionally followed by a `.b`/`.w`/`.l`/`.s` suffix
    /// recognized lexically but not yet validated against a target.
    Mnemonic(String, Option<char>),
    /// `.name`
    Directive(String),
    Anonymous(Anon),
    Punct(Punct),
    Newline,
    Comment,
    Eof,
    /// A lex-time failure; the caller is responsible for turning this
    /// into a diagnostic. The lexer itself never panics.
    Error(DiagKind),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub loc: Location,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, loc: Location) -> Self {
        Token { kind, text: text.into(), loc }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    pub fn is_newline(&self) -> bool {
        matches!(self.kind, TokenKind::Newline)
    }

    pub fn as_punct(&self) -> Option<Punct> {
        match self.kind {
            TokenKind::Punct(p) => Some(p),
            _ => None,
        }
    }
}
