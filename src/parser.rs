// Parser
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

//! Recursive-descent parser: token stream -> statement AST (§4.D).
//! On a syntax error it records a diagnostic, drops tokens until the
//! next newline, and continues — error recovery at statement
//! granularity.

use crate::ast::*;
use crate::message::{Diagnostics, Kind};
use crate::source::Location;
use crate::token::{Anon, Punct, Token, TokenKind};

pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    pub diags: Diagnostics,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Parser { tokens, pos: 0, diags: Diagnostics::new() }
    }

    pub fn parse(mut self) -> (Program, Diagnostics) {
        let stmts = self.parse_block(&[]);
        (stmts, self.diags)
    }

    // -- token cursor ------------------------------------------------------

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn cur_kind(&self) -> &TokenKind {
        &self.cur().kind
    }

    fn loc(&self) -> Location {
        self.cur().loc.clone()
    }

    fn at_eof(&self) -> bool {
        matches!(self.cur_kind(), TokenKind::Eof)
    }

    fn at_newline(&self) -> bool {
        matches!(self.cur_kind(), TokenKind::Newline)
    }

    fn bump(&mut self) -> Token {
        let t = self.cur().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn skip_newlines(&mut self) {
        while self.at_newline() {
            self.bump();
        }
    }

    /// True if the current directive name (lower-cased) terminates a
    /// structured block started by one of `terminators`.
    fn at_directive(&self, name: &str) -> bool {
        matches!(self.cur_kind(), TokenKind::Directive(d) if d == name)
    }

    fn error(&mut self, kind: Kind) {
        self.diags.push(self.loc(), kind);
    }

    /// Drops tokens to the next newline/EOF, for statement-granularity
    /// recovery.
    fn recover(&mut self) {
        while !self.at_newline() && !self.at_eof() {
            self.bump();
        }
    }

    // -- top-level / blocks --------------------------------------------------

    /// Parses statements until EOF or until the current token is a
    /// directive whose name is in `terminators` (the terminator itself
    /// is left unconsumed so the caller can recognize it).
    fn parse_block(&mut self, terminators: &[&str]) -> Vec<Stmt> {
        let mut out = Vec::new();
        loop {
            self.skip_newlines();
            if self.at_eof() {
                break;
            }
            if let TokenKind::Directive(name) = self.cur_kind() {
                if terminators.contains(&name.as_str()) {
                    break;
                }
            }
            out.extend(self.parse_line());
        }
        out
    }

    /// Parses every statement on one logical line; a line may contain
    /// several statements because a label does not require a newline
    /// after it (`reset: sei`).
    fn parse_line(&mut self) -> Vec<Stmt> {
        let mut out = Vec::new();
        loop {
            if self.at_newline() || self.at_eof() {
                break;
            }
            match self.parse_one(&mut out) {
                Consumed::MoreOnLine => continue,
                Consumed::EndOfLine => break,
            }
        }
        out
    }

    /// Parses one statement (or a label, which doesn't end the line).
    fn parse_one(&mut self, out: &mut Vec<Stmt>) -> Consumed {
        match self.cur_kind().clone() {
            TokenKind::Identifier(name) if self.peek_is_colon(1) => {
                let loc = self.loc();
                self.bump(); // name
                self.bump(); // ':'
                out.push(Stmt::Label { name, loc });
                Consumed::MoreOnLine
            }
            TokenKind::LocalIdentifier(name) if self.peek_is_colon(1) => {
                let loc = self.loc();
                self.bump();
                self.bump();
                out.push(Stmt::LocalLabel { name, loc });
                Consumed::MoreOnLine
            }
            TokenKind::Anonymous(anon) if self.peek_is_colon(1) => {
                let loc = self.loc();
                self.bump();
                self.bump();
                out.push(Stmt::AnonymousLabel { anon, loc });
                Consumed::MoreOnLine
            }
            TokenKind::LocalIdentifier(name) => {
                // Not a label: statement-initial `@name` is a macro call.
                out.push(self.parse_macro_invocation(name));
                Consumed::EndOfLine
            }
            TokenKind::Identifier(name) if self.peek_is(1, &TokenKind::Punct(Punct::Eq)) => {
                let loc = self.loc();
                self.bump();
                self.bump();
                let value = self.parse_expr();
                out.push(Stmt::Assignment { name, value, kind: DefKind::Define, loc });
                Consumed::EndOfLine
            }
            TokenKind::Mnemonic(_, _) => {
                out.push(self.parse_instruction());
                Consumed::EndOfLine
            }
            TokenKind::Directive(_) => {
                out.push(self.parse_directive());
                Consumed::EndOfLine
            }
            TokenKind::Error(kind) => {
                self.error(kind);
                self.recover();
                Consumed::EndOfLine
            }
            other => {
                self.error(Kind::UnexpectedToken(describe(&other)));
                self.recover();
                Consumed::EndOfLine
            }
        }
    }

    fn peek_is_colon(&self, ahead: usize) -> bool {
        self.peek_is(ahead, &TokenKind::Punct(Punct::Colon))
    }

    fn peek_is(&self, ahead: usize, kind: &TokenKind) -> bool {
        self.tokens
            .get(self.pos + ahead)
            .map(|t| &t.kind == kind)
            .unwrap_or(false)
    }

    fn peek_kind(&self, ahead: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + ahead)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn expect_end_of_statement(&mut self) {
        if !self.at_newline() && !self.at_eof() {
            self.error(Kind::UnexpectedToken(describe(self.cur_kind())));
            self.recover();
        }
    }

    // -- macro invocation ----------------------------------------------------

    fn parse_macro_invocation(&mut self, name: String) -> Stmt {
        let loc = self.loc();
        self.bump(); // @name
        let mut args = Vec::new();
        if !self.at_newline() && !self.at_eof() {
            args.push(self.parse_expr());
            while matches!(self.cur_kind(), TokenKind::Punct(Punct::Comma)) {
                self.bump();
                args.push(self.parse_expr());
            }
        }
        self.expect_end_of_statement();
        Stmt::MacroInvocation { name, args, loc }
    }

    // -- directives -----------------------------------------------------------

    fn parse_directive(&mut self) -> Stmt {
        let loc = self.loc();
        let name = match self.cur_kind().clone() {
            TokenKind::Directive(n) => n,
            _ => unreachable!(),
        };
        self.bump();

        match name.as_str() {
            "macro" => self.parse_macro_def(loc),
            "if" | "ifdef" | "ifndef" | "ifeq" | "ifne" | "ifgt" | "iflt" | "ifge" | "ifle" => {
                self.parse_if(name, loc)
            }
            "rept" => self.parse_rept(loc),
            "enum" => self.parse_enum(loc),
            "scope" => {
                let body = self.parse_block(&["endscope"]);
                self.expect_directive("endscope");
                Stmt::Scope { body, loc }
            }
            "proc" => {
                let pname = self.parse_ident_arg();
                let body = self.parse_block(&["endproc"]);
                self.expect_directive("endproc");
                Stmt::Proc { name: pname, body, loc }
            }
            "org" => {
                let address = self.parse_expr();
                let space = if matches!(self.cur_kind(), TokenKind::Punct(Punct::Comma)) {
                    self.bump();
                    Some(self.parse_ident_arg())
                } else {
                    None
                };
                self.expect_end_of_statement();
                Stmt::Org { address, space, loc }
            }
            "align" => {
                let boundary = self.parse_expr();
                self.expect_end_of_statement();
                Stmt::Align { boundary, loc }
            }
            "pad" => {
                let address = self.parse_expr();
                let fill = self.parse_optional_comma_expr();
                self.expect_end_of_statement();
                Stmt::Pad { address, fill, loc }
            }
            "fill" | "ds" => {
                let count = self.parse_expr();
                let value = self.parse_optional_comma_expr();
                self.expect_end_of_statement();
                Stmt::Fill { count, value, loc }
            }
            "byte" | "db" => self.parse_data(DataWidth::Byte, loc),
            "word" | "dw" => self.parse_data(DataWidth::Word, loc),
            "long" | "dl" => self.parse_data(DataWidth::Long, loc),
            "dword" | "dd" => self.parse_data(DataWidth::DWord, loc),
            "incbin" => self.parse_incbin(loc),
            "equ" | "define" => {
                let n = self.parse_ident_arg();
                self.expect_comma();
                let value = self.parse_expr();
                self.expect_end_of_statement();
                Stmt::Assignment { name: n, value, kind: DefKind::Define, loc }
            }
            "set" => {
                let n = self.parse_ident_arg();
                self.expect_comma();
                let value = self.parse_expr();
                self.expect_end_of_statement();
                Stmt::Assignment { name: n, value, kind: DefKind::Set, loc }
            }
            _ => self.parse_generic_directive(name, loc),
        }
    }

    fn expect_directive(&mut self, name: &'static str) {
        if self.at_directive(name) {
            self.bump();
            self.expect_end_of_statement();
        } else {
            self.error(Kind::StrayDirective(name));
        }
    }

    fn parse_ident_arg(&mut self) -> String {
        match self.cur_kind().clone() {
            TokenKind::Identifier(s) => {
                self.bump();
                s
            }
            other => {
                self.error(Kind::UnexpectedToken(describe(&other)));
                String::new()
            }
        }
    }

    fn expect_comma(&mut self) {
        if matches!(self.cur_kind(), TokenKind::Punct(Punct::Comma)) {
            self.bump();
        } else {
            self.error(Kind::MissingOperand);
        }
    }

    fn parse_optional_comma_expr(&mut self) -> Option<Expr> {
        if matches!(self.cur_kind(), TokenKind::Punct(Punct::Comma)) {
            self.bump();
            Some(self.parse_expr())
        } else {
            None
        }
    }

    fn parse_data(&mut self, width: DataWidth, loc: Location) -> Stmt {
        let mut values = Vec::new();
        values.push(self.parse_data_item());
        while matches!(self.cur_kind(), TokenKind::Punct(Punct::Comma)) {
            self.bump();
            values.push(self.parse_data_item());
        }
        self.expect_end_of_statement();
        Stmt::Data { width, values, loc }
    }

    fn parse_data_item(&mut self) -> DataItem {
        if let TokenKind::String(s) = self.cur_kind().clone() {
            self.bump();
            DataItem::Str(s)
        } else {
            DataItem::Expr(self.parse_expr())
        }
    }

    fn parse_incbin(&mut self, loc: Location) -> Stmt {
        let path = match self.cur_kind().clone() {
            TokenKind::String(s) => {
                self.bump();
                s
            }
            other => {
                self.error(Kind::UnexpectedToken(describe(&other)));
                String::new()
            }
        };
        let offset = self.parse_optional_comma_expr();
        let length = if offset.is_some() && matches!(self.cur_kind(), TokenKind::Punct(Punct::Comma)) {
            self.bump();
            Some(self.parse_expr())
        } else {
            None
        };
        self.expect_end_of_statement();
        Stmt::IncludeBinary { path, offset, length, loc }
    }

    fn parse_generic_directive(&mut self, name: String, loc: Location) -> Stmt {
        let mut args = Vec::new();
        if !self.at_newline() && !self.at_eof() {
            args.push(self.parse_directive_arg());
            while matches!(self.cur_kind(), TokenKind::Punct(Punct::Comma)) {
                self.bump();
                args.push(self.parse_directive_arg());
            }
        }
        self.expect_end_of_statement();
        Stmt::Directive { name, args, loc }
    }

    fn parse_directive_arg(&mut self) -> Expr {
        if let TokenKind::String(s) = self.cur_kind().clone() {
            self.bump();
            Expr::Str(s)
        } else {
            self.parse_expr()
        }
    }

    fn parse_macro_def(&mut self, loc: Location) -> Stmt {
        let name = self.parse_ident_arg();
        let mut params = Vec::new();
        if !self.at_newline() && !self.at_eof() {
            params.push(self.parse_macro_param());
            while matches!(self.cur_kind(), TokenKind::Punct(Punct::Comma)) {
                self.bump();
                params.push(self.parse_macro_param());
            }
        }
        self.expect_end_of_statement();
        let body = self.parse_block(&["endmacro"]);
        self.expect_directive("endmacro");
        Stmt::MacroDefinition(MacroDef { name, params, body, loc })
    }

    fn parse_macro_param(&mut self) -> MacroParam {
        let name = self.parse_ident_arg();
        let default = if matches!(self.cur_kind(), TokenKind::Punct(Punct::Eq)) {
            self.bump();
            Some(self.parse_expr())
        } else {
            None
        };
        MacroParam { name, default }
    }

    fn parse_if(&mut self, first: String, loc: Location) -> Stmt {
        let mut arms = Vec::new();
        let cond = self.parse_condition(&first);
        let body = self.parse_block(&["else", "elseif", "endif"]);
        arms.push((cond, body));

        loop {
            if self.at_directive("elseif") {
                self.bump();
                let kind = self.parse_elseif_kind();
                let cond = self.parse_condition(&kind);
                let body = self.parse_block(&["else", "elseif", "endif"]);
                arms.push((cond, body));
                continue;
            }
            break;
        }

        let else_body = if self.at_directive("else") {
            self.bump();
            self.expect_end_of_statement();
            Some(self.parse_block(&["endif"]))
        } else {
            None
        };
        self.expect_directive("endif");
        Stmt::If { arms, else_body, loc }
    }

    /// `.elseif` may be bare (same semantics as `.if`) in this dialect.
    fn parse_elseif_kind(&mut self) -> String {
        "if".to_string()
    }

    fn parse_condition(&mut self, kind: &str) -> Expr {
        let e = match kind {
            "if" => self.parse_expr(),
            "ifdef" => Expr::Defined(self.parse_ident_arg()),
            "ifndef" => {
                let loc = self.loc();
                Expr::Unary(UnaryOp::Not, Box::new(Expr::Defined(self.parse_ident_arg())), loc)
            }
            "ifeq" | "ifne" | "ifgt" | "iflt" | "ifge" | "ifle" => {
                let op = match kind {
                    "ifeq" => BinaryOp::Eq,
                    "ifne" => BinaryOp::Ne,
                    "ifgt" => BinaryOp::Gt,
                    "iflt" => BinaryOp::Lt,
                    "ifge" => BinaryOp::Ge,
                    _ => BinaryOp::Le,
                };
                let loc = self.loc();
                let a = self.parse_expr();
                self.expect_comma();
                let b = self.parse_expr();
                Expr::Binary(op, Box::new(a), Box::new(b), loc)
            }
            _ => self.parse_expr(),
        };
        self.expect_end_of_statement();
        e
    }

    fn parse_rept(&mut self, loc: Location) -> Stmt {
        let count = self.parse_expr();
        self.expect_end_of_statement();
        let body = self.parse_block(&["endr"]);
        self.expect_directive("endr");
        Stmt::Repeat { count, body, loc }
    }

    fn parse_enum(&mut self, loc: Location) -> Stmt {
        let start = self.parse_expr();
        self.expect_end_of_statement();
        let mut members = Vec::new();
        loop {
            self.skip_newlines();
            if self.at_directive("ende") || self.at_eof() {
                break;
            }
            members.push(self.parse_ident_arg());
            self.expect_end_of_statement();
        }
        self.expect_directive("ende");
        Stmt::Enum { start, members, loc }
    }

    // -- instructions -----------------------------------------------------------

    fn parse_instruction(&mut self) -> Stmt {
        let loc = self.loc();
        let (mnemonic, size_suffix) = match self.cur_kind().clone() {
            TokenKind::Mnemonic(m, s) => (m, s),
            _ => unreachable!(),
        };
        self.bump();

        if self.at_newline() || self.at_eof() {
            return Stmt::Instruction(Instruction {
                mnemonic,
                size_suffix,
                mode: SyntaxMode::Implied,
                mode2: None,
                loc,
            });
        }

        let mode = self.parse_operand();
        let mode2 = if matches!(self.cur_kind(), TokenKind::Punct(Punct::Comma))
            && !matches!(mode, SyntaxMode::Indexed(_, _))
        {
            self.bump();
            Some(self.parse_operand())
        } else {
            None
        };
        self.expect_end_of_statement();
        Stmt::Instruction(Instruction { mnemonic, size_suffix, mode, mode2, loc })
    }

    /// Classifies one operand's syntax. The 65xx forms are classified
    /// exactly per §4.D; everything else falls back to the generic
    /// register-aware grammar used by the two-operand ISAs.
    fn parse_operand(&mut self) -> SyntaxMode {
        match self.cur_kind().clone() {
            TokenKind::Punct(Punct::Hash) => {
                self.bump();
                SyntaxMode::Immediate(self.parse_expr())
            }
            TokenKind::Punct(Punct::LParen) => self.parse_paren_operand(),
            TokenKind::Punct(Punct::LBracket) => self.parse_bracket_operand(),
            TokenKind::Identifier(name) if name.eq_ignore_ascii_case("a") && self.at_bare_register_end() => {
                self.bump();
                SyntaxMode::Accumulator
            }
            TokenKind::Identifier(name) if is_register_name(&name) && self.at_bare_register_end() => {
                self.bump();
                SyntaxMode::Register(name.to_ascii_lowercase())
            }
            _ => {
                let e = self.parse_expr();
                self.parse_index_suffix(e)
            }
        }
    }

    fn at_bare_register_end(&self) -> bool {
        matches!(
            self.peek_kind(1),
            TokenKind::Newline | TokenKind::Eof | TokenKind::Punct(Punct::Comma)
        )
    }

    fn parse_paren_operand(&mut self) -> SyntaxMode {
        self.bump(); // '('
        let inner = self.parse_expr();
        // `(e,x)` indexed-indirect
        if matches!(self.cur_kind(), TokenKind::Punct(Punct::Comma)) {
            self.bump();
            let reg = self.parse_index_reg_name();
            self.expect_rparen();
            if reg.eq_ignore_ascii_case("x") {
                return SyntaxMode::IndexedIndirect(inner);
            }
            return SyntaxMode::RegisterIndirect(reg, Some(inner));
        }
        self.expect_rparen();
        // `(e),y` indirect-indexed
        if matches!(self.cur_kind(), TokenKind::Punct(Punct::Comma)) {
            self.bump();
            let reg = self.parse_index_reg_name();
            if reg.eq_ignore_ascii_case("y") {
                return SyntaxMode::IndirectIndexed(inner);
            }
            return SyntaxMode::RegisterIndirect(reg, Some(inner));
        }
        SyntaxMode::Indirect(inner)
    }

    fn parse_bracket_operand(&mut self) -> SyntaxMode {
        self.bump(); // '['
        let inner = self.parse_expr();
        self.expect_rbracket();
        if matches!(self.cur_kind(), TokenKind::Punct(Punct::Comma)) {
            self.bump();
            let reg = self.parse_index_reg_name();
            if reg.eq_ignore_ascii_case("y") {
                return SyntaxMode::IndirectLongIndexed(inner);
            }
            return SyntaxMode::RegisterIndirect(reg, Some(inner));
        }
        SyntaxMode::IndirectLong(inner)
    }

    fn parse_index_reg_name(&mut self) -> String {
        match self.cur_kind().clone() {
            TokenKind::Identifier(s) => {
                self.bump();
                s
            }
            other => {
                self.error(Kind::UnexpectedToken(describe(&other)));
                String::new()
            }
        }
    }

    fn expect_rparen(&mut self) {
        if matches!(self.cur_kind(), TokenKind::Punct(Punct::RParen)) {
            self.bump();
        } else {
            self.error(Kind::Unclosed("("));
        }
    }

    fn expect_rbracket(&mut self) {
        if matches!(self.cur_kind(), TokenKind::Punct(Punct::RBracket)) {
            self.bump();
        } else {
            self.error(Kind::Unclosed("["));
        }
    }

    /// After a bare expression operand, `,x` / `,y` / `,s` turns
    /// Absolute into an indexed mode (65xx), or is left as a plain
    /// Absolute for the second-comma two-operand ISAs (the caller
    /// only applies this when not already followed by a register that
    /// would instead become `mode2`).
    fn parse_index_suffix(&mut self, e: Expr) -> SyntaxMode {
        if matches!(self.cur_kind(), TokenKind::Punct(Punct::Comma)) {
            if let TokenKind::Identifier(name) = self.peek_kind(1).clone() {
                let reg = match name.to_ascii_lowercase().as_str() {
                    "x" => Some(IndexReg::X),
                    "y" => Some(IndexReg::Y),
                    "s" => Some(IndexReg::S),
                    _ => None,
                };
                if let Some(reg) = reg {
                    // Only consume as an index when nothing follows
                    // (otherwise this comma belongs to a second operand
                    // that merely happens to be a one-letter register).
                    if matches!(
                        self.tokens.get(self.pos + 2).map(|t| &t.kind),
                        Some(TokenKind::Newline) | Some(TokenKind::Eof) | None
                    ) {
                        self.bump(); // ','
                        self.bump(); // reg
                        return SyntaxMode::Indexed(e, reg);
                    }
                }
            }
        }
        SyntaxMode::Absolute(e)
    }

    // -- expressions: precedence climbing, lowest to highest per §4.D ---------

    pub fn parse_expr(&mut self) -> Expr {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Expr {
        let mut lhs = self.parse_logical_and();
        while matches!(self.cur_kind(), TokenKind::Punct(Punct::PipePipe)) {
            let loc = self.loc();
            self.bump();
            let rhs = self.parse_logical_and();
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs), loc);
        }
        lhs
    }

    fn parse_logical_and(&mut self) -> Expr {
        let mut lhs = self.parse_bit_or_xor();
        while matches!(self.cur_kind(), TokenKind::Punct(Punct::AmpAmp)) {
            let loc = self.loc();
            self.bump();
            let rhs = self.parse_bit_or_xor();
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs), loc);
        }
        lhs
    }

    fn parse_bit_or_xor(&mut self) -> Expr {
        let mut lhs = self.parse_bit_and();
        loop {
            let op = match self.cur_kind() {
                TokenKind::Punct(Punct::Pipe) => BinaryOp::BitOr,
                TokenKind::Punct(Punct::Caret) => BinaryOp::BitXor,
                _ => break,
            };
            let loc = self.loc();
            self.bump();
            let rhs = self.parse_bit_and();
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), loc);
        }
        lhs
    }

    fn parse_bit_and(&mut self) -> Expr {
        let mut lhs = self.parse_equality();
        while matches!(self.cur_kind(), TokenKind::Punct(Punct::Amp)) {
            let loc = self.loc();
            self.bump();
            let rhs = self.parse_equality();
            lhs = Expr::Binary(BinaryOp::BitAnd, Box::new(lhs), Box::new(rhs), loc);
        }
        lhs
    }

    fn parse_equality(&mut self) -> Expr {
        let mut lhs = self.parse_relational();
        loop {
            let op = match self.cur_kind() {
                TokenKind::Punct(Punct::EqEq) => BinaryOp::Eq,
                TokenKind::Punct(Punct::Ne) => BinaryOp::Ne,
                _ => break,
            };
            let loc = self.loc();
            self.bump();
            let rhs = self.parse_relational();
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), loc);
        }
        lhs
    }

    fn parse_relational(&mut self) -> Expr {
        let mut lhs = self.parse_shift();
        loop {
            let op = match self.cur_kind() {
                TokenKind::Punct(Punct::Lt) => BinaryOp::Lt,
                TokenKind::Punct(Punct::Le) => BinaryOp::Le,
                TokenKind::Punct(Punct::Gt) => BinaryOp::Gt,
                TokenKind::Punct(Punct::Ge) => BinaryOp::Ge,
                _ => break,
            };
            let loc = self.loc();
            self.bump();
            let rhs = self.parse_shift();
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), loc);
        }
        lhs
    }

    fn parse_shift(&mut self) -> Expr {
        let mut lhs = self.parse_additive();
        loop {
            let op = match self.cur_kind() {
                TokenKind::Punct(Punct::Shl) => BinaryOp::Shl,
                TokenKind::Punct(Punct::Shr) => BinaryOp::Shr,
                _ => break,
            };
            let loc = self.loc();
            self.bump();
            let rhs = self.parse_additive();
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), loc);
        }
        lhs
    }

    fn parse_additive(&mut self) -> Expr {
        let mut lhs = self.parse_multiplicative();
        loop {
            let op = match self.cur_kind() {
                TokenKind::Punct(Punct::Plus) => BinaryOp::Add,
                TokenKind::Punct(Punct::Minus) => BinaryOp::Sub,
                _ => break,
            };
            let loc = self.loc();
            self.bump();
            let rhs = self.parse_multiplicative();
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), loc);
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut lhs = self.parse_unary();
        loop {
            let op = match self.cur_kind() {
                TokenKind::Punct(Punct::Star) => BinaryOp::Mul,
                TokenKind::Punct(Punct::Slash) => BinaryOp::Div,
                _ => break,
            };
            let loc = self.loc();
            self.bump();
            let rhs = self.parse_unary();
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), loc);
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        let loc = self.loc();
        let op = match self.cur_kind() {
            TokenKind::Punct(Punct::Plus) => {
                self.bump();
                return self.parse_unary();
            }
            TokenKind::Punct(Punct::Minus) => Some(UnaryOp::Neg),
            TokenKind::Punct(Punct::Bang) => Some(UnaryOp::Not),
            TokenKind::Punct(Punct::Tilde) => Some(UnaryOp::BitNot),
            TokenKind::Punct(Punct::Lt) => Some(UnaryOp::Low),
            TokenKind::Punct(Punct::Gt) => Some(UnaryOp::High),
            TokenKind::Punct(Punct::Caret) => Some(UnaryOp::Bank),
            _ => None,
        };
        match op {
            Some(op) => {
                self.bump();
                let e = self.parse_unary();
                Expr::Unary(op, Box::new(e), loc)
            }
            None => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Expr {
        match self.cur_kind().clone() {
            TokenKind::Number(n) => {
                self.bump();
                Expr::Integer(n)
            }
            TokenKind::String(s) => {
                self.bump();
                Expr::Str(s)
            }
            TokenKind::Character(c) => {
                self.bump();
                Expr::Char(c)
            }
            TokenKind::Identifier(s) => {
                self.bump();
                Expr::Symbol(s)
            }
            TokenKind::LocalIdentifier(s) => {
                self.bump();
                Expr::Local(s)
            }
            TokenKind::Anonymous(a) => {
                self.bump();
                Expr::Anonymous(a)
            }
            TokenKind::Punct(Punct::Star) => {
                self.bump();
                Expr::Pc
            }
            TokenKind::Punct(Punct::LParen) => {
                self.bump();
                let e = self.parse_expr();
                self.expect_rparen();
                Expr::Grouping(Box::new(e))
            }
            other => {
                self.error(Kind::UnexpectedToken(describe(&other)));
                Expr::Integer(0)
            }
        }
    }
}

enum Consumed {
    MoreOnLine,
    EndOfLine,
}

fn is_register_name(s: &str) -> bool {
    const NAMES: &[&str] = &[
        "a", "b", "c", "d", "e", "h", "l", "af", "bc", "de", "hl", "sp", "ix", "iy", "pc", "f",
        "d0", "d1", "d2", "d3", "d4", "d5", "d6", "d7", "a0", "a1", "a2", "a3", "a4", "a5", "a6",
        "a7", "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12",
        "r13", "r14", "r15", "lr", "ax", "bx", "cx", "dx", "si", "di", "bp", "al", "ah", "bl",
        "bh", "cl", "ch", "dl", "dh", "ya", "x", "y", "s",
    ];
    NAMES.contains(&s.to_ascii_lowercase().as_str())
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Newline => "newline".into(),
        TokenKind::Eof => "end of file".into(),
        TokenKind::Identifier(s) => format!("identifier `{s}`"),
        TokenKind::Mnemonic(m, _) => format!("mnemonic `{m}`"),
        TokenKind::Directive(d) => format!(".{d}"),
        TokenKind::Number(n) => format!("number {n}"),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{resolve_locations, Lexer};
    use crate::source::SourceRegistry;

    fn parse(src: &str) -> (Program, Diagnostics) {
        let mut sources = SourceRegistry::new();
        let f = sources.add_text("t.pasm", src.to_string());
        let mut tokens = Lexer::new(&sources, f).tokenize();
        resolve_locations(&sources, &mut tokens);
        Parser::new(&tokens).parse()
    }

    #[test]
    fn parses_immediate_instruction() {
        let (prog, diags) = parse("lda #$42\n");
        assert!(!diags.has_errors());
        match &prog[0] {
            Stmt::Instruction(i) => {
                assert_eq!(i.mnemonic, "lda");
                assert_eq!(i.mode, SyntaxMode::Immediate(Expr::Integer(0x42)));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn parses_label_then_instruction_same_line() {
        let (prog, diags) = parse("reset: sei\n");
        assert!(!diags.has_errors());
        assert!(matches!(&prog[0], Stmt::Label { name, .. } if name == "reset"));
        assert!(matches!(&prog[1], Stmt::Instruction(i) if i.mnemonic == "sei"));
    }

    #[test]
    fn parses_indexed_absolute() {
        let (prog, _) = parse("lda $10,x\n");
        match &prog[0] {
            Stmt::Instruction(i) => {
                assert_eq!(i.mode, SyntaxMode::Indexed(Expr::Integer(0x10), IndexReg::X));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn parses_indirect_indexed() {
        let (prog, _) = parse("lda ($10),y\n");
        assert!(matches!(&prog[0], Stmt::Instruction(i) if matches!(i.mode, SyntaxMode::IndirectIndexed(_))));
    }

    #[test]
    fn parses_indexed_indirect() {
        let (prog, _) = parse("lda ($10,x)\n");
        assert!(matches!(&prog[0], Stmt::Instruction(i) if matches!(i.mode, SyntaxMode::IndexedIndirect(_))));
    }

    #[test]
    fn parses_precedence() {
        let (prog, _) = parse(".byte 1 + 2 * 3\n");
        match &prog[0] {
            Stmt::Data { values, .. } => match &values[0] {
                DataItem::Expr(Expr::Binary(BinaryOp::Add, l, r, _)) => {
                    assert_eq!(**l, Expr::Integer(1));
                    match &**r {
                        Expr::Binary(BinaryOp::Mul, rl, rr, _) => {
                            assert_eq!(**rl, Expr::Integer(2));
                            assert_eq!(**rr, Expr::Integer(3));
                        }
                        other => panic!("{other:?}"),
                    }
                }
                other => panic!("{other:?}"),
            },
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn parses_macro_definition_and_call() {
        let (prog, diags) = parse(
            ".macro delay n\nldx #n\n@l:\ndex\nbne @l\n.endmacro\n@delay 3\n",
        );
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        assert!(matches!(&prog[0], Stmt::MacroDefinition(_)));
        assert!(matches!(&prog[1], Stmt::MacroInvocation { name, .. } if name == "delay"));
    }

    #[test]
    fn parses_conditional() {
        let (prog, diags) = parse(".if 1\nnop\n.else\nrts\n.endif\n");
        assert!(!diags.has_errors());
        assert!(matches!(&prog[0], Stmt::If { .. }));
    }

    #[test]
    fn recovers_after_syntax_error() {
        let (prog, diags) = parse(")\nnop\n");
        assert!(diags.has_errors());
        assert!(matches!(&prog.last().unwrap(), Stmt::Instruction(i) if i.mnemonic == "nop"));
    }
}
