//! Hand-written recursive descent parser.
//!
//! Statements are keyword-dispatched. Expressions use precedence climbing:
//!
//! | Level | Operators | Associativity |
//! |-------|-----------|---------------|
//! | 10 | `\|\|` | left |
//! | 20 | `&&` | left |
//! | 30 | `== != < <= > >=` | left |
//! | 40 | `+ -` | left |
//! | 50 | `* / %` | left |
//! | prefix | `- !` | |
//!
//! Newlines carry no meaning; `;` may separate statements but is never
//! required.

use crate::ast::{
    BinaryOp, ContractDecl, Expr, ExprKind, FieldDecl, FunctionDecl, Item, ParamDecl, Pos,
    SourceUnit, Stmt, UnaryOp,
};
use crate::error::{CompileError, CompileResult};
use crate::lexer::{tokenize, LineIndex, Spanned, Token};
use crate::value::{Value, ValueType};

/// Deepest expression or block nesting accepted
pub const MAX_NESTING: usize = 256;

/// Parse a complete compilation unit.
pub fn parse(source: &str) -> CompileResult<SourceUnit> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        lines: LineIndex::new(source),
        end: source.len(),
    };
    parser.unit()
}

struct Parser<'src> {
    tokens: &'src [Spanned],
    pos: usize,
    depth: usize,
    lines: LineIndex,
    end: usize,
}

impl<'src> Parser<'src> {
    // =========================================================================
    // Token stream
    // =========================================================================

    fn peek(&self) -> Option<&'src Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<&'src Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn current_pos(&self) -> Pos {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.end);
        let (line, column) = self.lines.position(offset);
        Pos { line, column }
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        let pos = self.current_pos();
        CompileError::syntax(pos.line, pos.column, message)
    }

    fn unexpected(&self, wanted: &str) -> CompileError {
        match self.peek() {
            Some(token) => self.error(format!("expected {}, found `{}`", wanted, token)),
            None => self.error(format!("expected {}, found end of input", wanted)),
        }
    }

    fn expect(&mut self, expected: Token) -> CompileResult<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{}`", expected)))
        }
    }

    fn ident(&mut self, wanted: &str) -> CompileResult<(String, Pos)> {
        let pos = self.current_pos();
        match self.peek() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok((name.clone(), pos))
            }
            _ => Err(self.unexpected(wanted)),
        }
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> CompileResult<T>) -> CompileResult<T> {
        self.descend(1)?;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn descend(&mut self, levels: usize) -> CompileResult<()> {
        let depth = self.depth + levels;
        if depth > MAX_NESTING {
            return Err(CompileError::TooLarge {
                what: "expression nesting",
                size: depth,
                limit: MAX_NESTING,
            });
        }
        self.depth = depth;
        Ok(())
    }

    fn value_type(&mut self) -> CompileResult<ValueType> {
        let pos = self.current_pos();
        let (name, _) = self.ident("type name")?;
        ValueType::from_name(&name).ok_or_else(|| {
            CompileError::syntax(pos.line, pos.column, format!("unknown type `{}`", name))
        })
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn unit(&mut self) -> CompileResult<SourceUnit> {
        let mut unit = SourceUnit::default();
        while self.peek().is_some() {
            if self.eat(&Token::Semicolon) {
                continue;
            }
            let item = match self.peek() {
                Some(Token::Contract) => Item::Contract(self.contract()?),
                Some(Token::Func) => Item::Function(self.function()?),
                _ => return Err(self.unexpected("`contract` or `func`")),
            };
            unit.items.push(item);
        }
        Ok(unit)
    }

    fn contract(&mut self) -> CompileResult<ContractDecl> {
        self.expect(Token::Contract)?;
        let (name, pos) = self.ident("contract name")?;
        self.expect(Token::LBrace)?;

        let mut fields = Vec::new();
        let mut functions = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.pos += 1;
                    break;
                }
                Some(Token::Tx) => {
                    self.pos += 1;
                    fields.extend(self.tx_block()?);
                }
                Some(Token::Func) => functions.push(self.function()?),
                Some(Token::Semicolon) => self.pos += 1,
                _ => return Err(self.unexpected("`tx`, `func` or `}`")),
            }
        }

        Ok(ContractDecl {
            name,
            fields,
            functions,
            pos,
        })
    }

    fn tx_block(&mut self) -> CompileResult<Vec<FieldDecl>> {
        self.expect(Token::LBrace)?;
        let mut fields = Vec::new();
        while !self.eat(&Token::RBrace) {
            if self.eat(&Token::Semicolon) {
                continue;
            }
            let (name, pos) = self.ident("field name")?;
            let (ty, _) = self.ident("field type")?;
            let tag = match self.peek() {
                Some(Token::Str(s)) | Some(Token::RawStr(s)) => {
                    self.pos += 1;
                    Some(s.clone())
                }
                _ => None,
            };
            fields.push(FieldDecl { name, ty, tag, pos });
        }
        Ok(fields)
    }

    fn function(&mut self) -> CompileResult<FunctionDecl> {
        self.expect(Token::Func)?;
        let (name, pos) = self.ident("function name")?;

        let mut params = Vec::new();
        if self.eat(&Token::LParen) {
            if !self.eat(&Token::RParen) {
                loop {
                    params.push(self.typed_name()?);
                    if self.eat(&Token::RParen) {
                        break;
                    }
                    self.expect(Token::Comma)?;
                }
            }
        }

        let result = if self.check(&Token::Ident(String::new())) {
            Some(self.value_type()?)
        } else {
            None
        };

        let body = self.block()?;
        Ok(FunctionDecl {
            name,
            params,
            result,
            body,
            pos,
        })
    }

    fn typed_name(&mut self) -> CompileResult<ParamDecl> {
        let (name, pos) = self.ident("name")?;
        let ty = self.value_type()?;
        Ok(ParamDecl { name, ty, pos })
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn block(&mut self) -> CompileResult<Vec<Stmt>> {
        self.nested(Self::block_body)
    }

    fn block_body(&mut self) -> CompileResult<Vec<Stmt>> {
        self.expect(Token::LBrace)?;
        let mut stmts = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                return Ok(stmts);
            }
            if self.eat(&Token::Semicolon) {
                continue;
            }
            if self.peek().is_none() {
                return Err(self.unexpected("`}`"));
            }
            stmts.push(self.statement()?);
        }
    }

    fn statement(&mut self) -> CompileResult<Stmt> {
        match self.peek() {
            Some(Token::Var) => {
                self.pos += 1;
                let mut decls = vec![self.typed_name()?];
                while self.eat(&Token::Comma) {
                    decls.push(self.typed_name()?);
                }
                Ok(Stmt::Var(decls))
            }
            Some(Token::If) => self.if_statement(),
            Some(Token::While) => {
                self.pos += 1;
                let cond = self.expr()?;
                let body = self.block()?;
                Ok(Stmt::While { cond, body })
            }
            Some(Token::Return) => {
                self.pos += 1;
                if matches!(self.peek(), Some(Token::RBrace) | Some(Token::Semicolon) | None) {
                    Ok(Stmt::Return(None))
                } else {
                    Ok(Stmt::Return(Some(self.expr()?)))
                }
            }
            Some(Token::Raise) => {
                self.pos += 1;
                Ok(Stmt::Raise(self.expr()?))
            }
            Some(Token::Extend(name))
                if matches!(self.tokens.get(self.pos + 1), Some((Token::Assign, _))) =>
            {
                self.pos += 2;
                let value = self.expr()?;
                Ok(Stmt::AssignExtend {
                    name: name.clone(),
                    value,
                })
            }
            Some(Token::Ident(name))
                if matches!(self.tokens.get(self.pos + 1), Some((Token::Assign, _))) =>
            {
                let pos = self.current_pos();
                self.pos += 2;
                let value = self.expr()?;
                Ok(Stmt::Assign {
                    name: name.clone(),
                    value,
                    pos,
                })
            }
            _ => Ok(Stmt::Expr(self.expr()?)),
        }
    }

    fn if_statement(&mut self) -> CompileResult<Stmt> {
        self.expect(Token::If)?;
        let cond = self.expr()?;
        let then = self.block()?;
        let otherwise = if self.eat(&Token::Else) {
            if self.check(&Token::If) {
                vec![self.nested(Self::if_statement)?]
            } else {
                self.block()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn expr(&mut self) -> CompileResult<Expr> {
        self.binary(0)
    }

    /// Each operator folded into `left` deepens the tree by one, so a
    /// long chain counts against the nesting limit like parentheses do.
    fn binary(&mut self, min_prec: u8) -> CompileResult<Expr> {
        let mut left = self.prefix()?;
        let mut links = 0;

        let result = loop {
            let Some((prec, op)) = self.peek().and_then(binary_op_info) else {
                break Ok(left);
            };
            if prec < min_prec {
                break Ok(left);
            }
            if let Err(e) = self.descend(1) {
                break Err(e);
            }
            links += 1;
            let pos = left.pos;
            self.pos += 1;
            let right = match self.binary(prec + 1) {
                Ok(right) => right,
                Err(e) => break Err(e),
            };
            left = Expr {
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                pos,
            };
        };

        self.depth -= links;
        result
    }

    fn prefix(&mut self) -> CompileResult<Expr> {
        let pos = self.current_pos();
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Bang) => UnaryOp::Not,
            _ => return self.atom(),
        };
        self.pos += 1;
        let operand = self.nested(Self::prefix)?;
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            pos,
        })
    }

    fn atom(&mut self) -> CompileResult<Expr> {
        let pos = self.current_pos();
        if !matches!(
            self.peek(),
            Some(
                Token::Int(_)
                    | Token::Str(_)
                    | Token::RawStr(_)
                    | Token::True
                    | Token::False
                    | Token::Nil
                    | Token::Extend(_)
                    | Token::Ident(_)
                    | Token::LParen
            )
        ) {
            return Err(self.unexpected("expression"));
        }

        let kind = match self.advance() {
            Some(Token::Int(v)) => ExprKind::Literal(Value::Int(*v)),
            Some(Token::Str(s)) | Some(Token::RawStr(s)) => ExprKind::Literal(Value::Str(s.clone())),
            Some(Token::True) => ExprKind::Literal(Value::Bool(true)),
            Some(Token::False) => ExprKind::Literal(Value::Bool(false)),
            Some(Token::Nil) => ExprKind::Literal(Value::Nil),
            Some(Token::Extend(name)) => ExprKind::Extend(name.clone()),
            Some(Token::Ident(name)) => {
                if self.eat(&Token::LParen) {
                    ExprKind::Call {
                        name: name.clone(),
                        args: self.call_args()?,
                    }
                } else {
                    ExprKind::Name(name.clone())
                }
            }
            Some(Token::LParen) => {
                let inner = self.nested(Self::expr)?;
                self.expect(Token::RParen)?;
                return Ok(inner);
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr { kind, pos })
    }

    fn call_args(&mut self) -> CompileResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.nested(Self::expr)?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(Token::Comma)?;
        }
    }
}

fn binary_op_info(token: &Token) -> Option<(u8, BinaryOp)> {
    match token {
        Token::OrOr => Some((10, BinaryOp::Or)),
        Token::AndAnd => Some((20, BinaryOp::And)),
        Token::EqEq => Some((30, BinaryOp::Eq)),
        Token::NotEq => Some((30, BinaryOp::Ne)),
        Token::Lt => Some((30, BinaryOp::Lt)),
        Token::LtEq => Some((30, BinaryOp::Le)),
        Token::Gt => Some((30, BinaryOp::Gt)),
        Token::GtEq => Some((30, BinaryOp::Ge)),
        Token::Plus => Some((40, BinaryOp::Add)),
        Token::Minus => Some((40, BinaryOp::Sub)),
        Token::Star => Some((50, BinaryOp::Mul)),
        Token::Slash => Some((50, BinaryOp::Div)),
        Token::Percent => Some((50, BinaryOp::Rem)),
        _ => None,
    }
}
