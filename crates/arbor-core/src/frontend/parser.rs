// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recursive-descent parser for frontend expressions.

use super::ast::{ArrowFn, BinaryOp, Element, Expr, FnBody, LogicalOp, Stmt, UnaryOp};
use super::lexer::{Token, TokenKind};
use super::CompileError;
use std::sync::Arc;

/// Deepest syntax nesting accepted; deeper sources are rejected rather than
/// exhausting the stack while parsing or evaluating.
const MAX_NESTING: usize = 128;

/// Parse a single expression, optionally followed by `;`.
pub(crate) fn parse_program(tokens: Vec<Token>) -> Result<Expr, CompileError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
    };
    let expr = parser.parse_expression()?;
    parser.match_kind(&TokenKind::Semicolon);
    if !parser.check(&TokenKind::Eof) {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind_at(&self, ahead: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + ahead).map(|t| &t.kind)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().kind.clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().kind == *kind
    }

    fn check_ident(&self, name: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(n) if n == name)
    }

    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), CompileError> {
        if self.match_kind(kind) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, CompileError> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(&format!("expected {what}"))),
        }
    }

    /// One level deeper; errors are fatal to the whole parse, so unwinding
    /// never needs to restore the count.
    fn enter(&mut self) -> Result<(), CompileError> {
        if self.nesting >= MAX_NESTING {
            return Err(CompileError::new(
                self.peek().offset,
                "expression nested too deeply",
            ));
        }
        self.nesting += 1;
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.nesting -= levels;
    }

    fn error(&self, message: &str) -> CompileError {
        let token = self.peek();
        CompileError::new(token.offset, format!("{message}, found {:?}", token.kind))
    }

    fn parse_expression(&mut self) -> Result<Expr, CompileError> {
        self.enter()?;
        let expr = self.parse_arrow_or_conditional()?;
        self.leave(1);
        Ok(expr)
    }

    fn parse_arrow_or_conditional(&mut self) -> Result<Expr, CompileError> {
        if self.check_ident("async")
            && matches!(
                self.peek_kind_at(1),
                Some(TokenKind::LeftParen | TokenKind::Ident(_))
            )
        {
            let save = self.pos;
            self.pos += 1;
            if self.at_arrow() {
                return self.parse_arrow();
            }
            self.pos = save;
        }
        if self.at_arrow() {
            return self.parse_arrow();
        }
        self.parse_conditional()
    }

    fn at_arrow(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Ident(_) => self.peek_kind_at(1) == Some(&TokenKind::Arrow),
            TokenKind::LeftParen => {
                let mut depth = 0usize;
                let mut i = self.pos;
                while let Some(token) = self.tokens.get(i) {
                    match token.kind {
                        TokenKind::LeftParen => depth += 1,
                        TokenKind::RightParen => {
                            depth -= 1;
                            if depth == 0 {
                                return self.tokens.get(i + 1).map(|t| &t.kind)
                                    == Some(&TokenKind::Arrow);
                            }
                        }
                        TokenKind::Eof => return false,
                        _ => {}
                    }
                    i += 1;
                }
                false
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> Result<Expr, CompileError> {
        let mut params = Vec::new();
        let mut rest = None;
        if self.match_kind(&TokenKind::LeftParen) {
            while !self.check(&TokenKind::RightParen) {
                if self.match_kind(&TokenKind::Ellipsis) {
                    rest = Some(self.expect_ident("rest parameter name")?);
                    break;
                }
                params.push(self.expect_ident("parameter name")?);
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RightParen, "')' after parameters")?;
        } else {
            params.push(self.expect_ident("parameter name")?);
        }
        self.expect(&TokenKind::Arrow, "'=>'")?;
        let body = if self.match_kind(&TokenKind::LeftBrace) {
            FnBody::Block(self.parse_block_rest()?)
        } else {
            FnBody::Expr(self.parse_expression()?)
        };
        Ok(Expr::Arrow(Arc::new(ArrowFn { params, rest, body })))
    }

    /// Statements up to and including the closing `}`.
    fn parse_block_rest(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = Vec::new();
        while !self.match_kind(&TokenKind::RightBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.error("expected '}'"));
            }
            if self.match_kind(&TokenKind::Semicolon) {
                continue;
            }
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> Result<Stmt, CompileError> {
        self.enter()?;
        let stmt = self.parse_statement_inner()?;
        self.leave(1);
        Ok(stmt)
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt, CompileError> {
        let stmt = if self.check_ident("const") || self.check_ident("let") || self.check_ident("var")
        {
            self.pos += 1;
            let name = self.expect_ident("binding name")?;
            self.expect(&TokenKind::Equals, "'=' in declaration")?;
            Stmt::Let(name, self.parse_expression()?)
        } else if self.check_ident("return") {
            self.pos += 1;
            if self.check(&TokenKind::Semicolon) || self.check(&TokenKind::RightBrace) {
                Stmt::Return(None)
            } else {
                Stmt::Return(Some(self.parse_expression()?))
            }
        } else if self.check_ident("throw") {
            self.pos += 1;
            Stmt::Throw(self.parse_expression()?)
        } else if self.check_ident("if") {
            self.pos += 1;
            self.expect(&TokenKind::LeftParen, "'(' after if")?;
            let cond = self.parse_expression()?;
            self.expect(&TokenKind::RightParen, "')' after condition")?;
            let then = self.parse_branch()?;
            let otherwise = if self.check_ident("else") {
                self.pos += 1;
                Some(self.parse_branch()?)
            } else {
                None
            };
            return Ok(Stmt::If(cond, then, otherwise));
        } else {
            Stmt::Expr(self.parse_expression()?)
        };
        self.match_kind(&TokenKind::Semicolon);
        Ok(stmt)
    }

    fn parse_branch(&mut self) -> Result<Vec<Stmt>, CompileError> {
        if self.match_kind(&TokenKind::LeftBrace) {
            self.parse_block_rest()
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    fn parse_conditional(&mut self) -> Result<Expr, CompileError> {
        let cond = self.parse_nullish()?;
        if self.match_kind(&TokenKind::Question) {
            let then = self.parse_expression()?;
            self.expect(&TokenKind::Colon, "':' in conditional")?;
            let otherwise = self.parse_expression()?;
            return Ok(Expr::Conditional(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(cond)
    }

    fn parse_nullish(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_or()?;
        let mut wraps = 0;
        while self.match_kind(&TokenKind::QuestionQuestion) {
            self.enter()?;
            wraps += 1;
            let right = self.parse_or()?;
            expr = Expr::Logical(LogicalOp::Nullish, Box::new(expr), Box::new(right));
        }
        self.leave(wraps);
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_and()?;
        let mut wraps = 0;
        while self.match_kind(&TokenKind::PipePipe) {
            self.enter()?;
            wraps += 1;
            let right = self.parse_and()?;
            expr = Expr::Logical(LogicalOp::Or, Box::new(expr), Box::new(right));
        }
        self.leave(wraps);
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_equality()?;
        let mut wraps = 0;
        while self.match_kind(&TokenKind::AmpAmp) {
            self.enter()?;
            wraps += 1;
            let right = self.parse_equality()?;
            expr = Expr::Logical(LogicalOp::And, Box::new(expr), Box::new(right));
        }
        self.leave(wraps);
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_comparison()?;
        let mut wraps = 0;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqualEqual => BinaryOp::LooseEq,
                TokenKind::BangEqual => BinaryOp::LooseNe,
                TokenKind::EqualEqualEqual => BinaryOp::StrictEq,
                TokenKind::BangEqualEqual => BinaryOp::StrictNe,
                _ => {
                    self.leave(wraps);
                    return Ok(expr);
                }
            };
            self.pos += 1;
            self.enter()?;
            wraps += 1;
            let right = self.parse_comparison()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(right));
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_term()?;
        let mut wraps = 0;
        loop {
            let op = match self.peek().kind {
                TokenKind::Less => BinaryOp::Lt,
                TokenKind::LessEqual => BinaryOp::Le,
                TokenKind::Greater => BinaryOp::Gt,
                TokenKind::GreaterEqual => BinaryOp::Ge,
                _ => {
                    self.leave(wraps);
                    return Ok(expr);
                }
            };
            self.pos += 1;
            self.enter()?;
            wraps += 1;
            let right = self.parse_term()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(right));
        }
    }

    fn parse_term(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_factor()?;
        let mut wraps = 0;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => {
                    self.leave(wraps);
                    return Ok(expr);
                }
            };
            self.pos += 1;
            self.enter()?;
            wraps += 1;
            let right = self.parse_factor()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(right));
        }
    }

    fn parse_factor(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_unary()?;
        let mut wraps = 0;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => {
                    self.leave(wraps);
                    return Ok(expr);
                }
            };
            self.pos += 1;
            self.enter()?;
            wraps += 1;
            let right = self.parse_unary()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let op = match &self.peek().kind {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Ident(name) if name == "await" => Some(UnaryOp::Await),
            TokenKind::Ident(name) if name == "typeof" => Some(UnaryOp::TypeOf),
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                self.enter()?;
                let operand = self.parse_unary()?;
                self.leave(1);
                Ok(Expr::Unary(op, Box::new(operand)))
            }
            None => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;
        let mut wraps = 0;
        loop {
            if self.check(&TokenKind::Dot)
                || self.check(&TokenKind::LeftBracket)
                || self.check(&TokenKind::LeftParen)
            {
                self.enter()?;
                wraps += 1;
            }
            if self.match_kind(&TokenKind::Dot) {
                let name = self.expect_ident("property name after '.'")?;
                expr = Expr::Member(Box::new(expr), name);
            } else if self.match_kind(&TokenKind::LeftBracket) {
                let index = self.parse_expression()?;
                self.expect(&TokenKind::RightBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.match_kind(&TokenKind::LeftParen) {
                let args = self.parse_elements(&TokenKind::RightParen)?;
                expr = Expr::Call(Box::new(expr), args);
            } else {
                self.leave(wraps);
                return Ok(expr);
            }
        }
    }

    /// Comma-separated items (spread allowed) up to and including `close`.
    fn parse_elements(&mut self, close: &TokenKind) -> Result<Vec<Element>, CompileError> {
        let mut items = Vec::new();
        while !self.check(close) {
            if self.match_kind(&TokenKind::Ellipsis) {
                items.push(Element::Spread(self.parse_expression()?));
            } else {
                items.push(Element::Item(self.parse_expression()?));
            }
            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close, "closing delimiter")?;
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let offset = self.peek().offset;
        match self.advance() {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" => Expr::Null,
                "undefined" => Expr::Undefined,
                _ => Expr::Ident(name),
            }),
            TokenKind::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LeftBracket => Ok(Expr::Array(
                self.parse_elements(&TokenKind::RightBracket)?,
            )),
            TokenKind::LeftBrace => self.parse_object(),
            other => Err(CompileError::new(
                offset,
                format!("expected expression, found {other:?}"),
            )),
        }
    }

    fn parse_object(&mut self) -> Result<Expr, CompileError> {
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            let key = match self.advance() {
                TokenKind::Ident(name) | TokenKind::Str(name) => name,
                TokenKind::Number(n) => super::value::number_to_string(n),
                _ => {
                    self.pos -= 1;
                    return Err(self.error("expected property key"));
                }
            };
            let value = if self.match_kind(&TokenKind::Colon) {
                self.parse_expression()?
            } else {
                Expr::Ident(key.clone())
            };
            fields.push((key, value));
            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace, "'}'")?;
        Ok(Expr::Object(fields))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;
    use crate::frontend::lexer::lex;

    fn parse(src: &str) -> Result<Expr, CompileError> {
        parse_program(lex(src)?)
    }

    #[test]
    fn arrow_with_block_body() {
        let expr = parse("(a, b) => { const s = a + b; return s * 2; }").unwrap();
        let Expr::Arrow(f) = expr else {
            panic!("expected arrow");
        };
        assert_eq!(f.params, vec!["a".to_owned(), "b".to_owned()]);
        assert!(matches!(&f.body, FnBody::Block(stmts) if stmts.len() == 2));
    }

    #[test]
    fn parenthesized_expression_is_not_an_arrow() {
        assert!(matches!(parse("(1 + 2) * 3").unwrap(), Expr::Binary(BinaryOp::Mul, ..)));
    }

    #[test]
    fn async_prefix_and_rest_params() {
        let Expr::Arrow(f) = parse("async (first, ...others) => others").unwrap() else {
            panic!("expected arrow");
        };
        assert_eq!(f.params, vec!["first".to_owned()]);
        assert_eq!(f.rest.as_deref(), Some("others"));
    }

    #[test]
    fn malformed_source_is_a_compile_error() {
        assert!(parse("(x) => ").is_err());
        assert!(parse("x +* 2").is_err());
        assert!(parse("(x) => x )").is_err());
    }
}
