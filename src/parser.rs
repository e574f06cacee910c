use crate::ast::{BinaryOp, Block, Capture, Expr, UnaryOp};
use crate::error::FenError;
use crate::lexer::{Lexer, Token, TokenType};

/// Precedence ladder, lowest binding first. `Assign` parses its right side
/// one level down, which makes `a = b = c` group as `a = (b = c)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Assign,
    Or,
    And,
    Equals,
    Compare,
    Sum,
    Product,
    Prefix,
    Call,
}

type PrefixFn = fn(&mut Parser) -> Result<Expr, FenError>;
type InfixFn = fn(&mut Parser, Expr) -> Result<Expr, FenError>;

fn prefix_fn(kind: &TokenType) -> Option<PrefixFn> {
    match kind {
        TokenType::Int => Some(Parser::parse_integer),
        TokenType::Float => Some(Parser::parse_float),
        TokenType::True | TokenType::False => Some(Parser::parse_boolean),
        TokenType::String => Some(Parser::parse_string),
        TokenType::Nil => Some(Parser::parse_nil),
        TokenType::Ident => Some(Parser::parse_identifier),
        TokenType::Table => Some(Parser::parse_table),
        TokenType::LeftBracket => Some(Parser::parse_pack),
        TokenType::Return => Some(Parser::parse_return),
        TokenType::Break => Some(Parser::parse_break),
        TokenType::LeftParen => Some(Parser::parse_grouped),
        TokenType::LeftBrace => Some(Parser::parse_block_expr),
        TokenType::If => Some(Parser::parse_if),
        TokenType::Func => Some(Parser::parse_func),
        TokenType::For => Some(Parser::parse_for),
        TokenType::Minus | TokenType::Bang => Some(Parser::parse_prefix_op),
        _ => None,
    }
}

fn infix_fn(kind: &TokenType) -> Option<InfixFn> {
    match kind {
        TokenType::ColonEqual => Some(Parser::parse_declaration),
        TokenType::Equal => Some(Parser::parse_assign),
        TokenType::LeftParen => Some(Parser::parse_call),
        TokenType::Dot => Some(Parser::parse_dot),
        TokenType::Plus
        | TokenType::Minus
        | TokenType::Star
        | TokenType::Slash
        | TokenType::EqualEqual
        | TokenType::BangEqual
        | TokenType::Less
        | TokenType::LessEqual
        | TokenType::Greater
        | TokenType::GreaterEqual
        | TokenType::And
        | TokenType::Or => Some(Parser::parse_infix_op),
        _ => None,
    }
}

fn precedence(kind: &TokenType) -> Precedence {
    match kind {
        TokenType::ColonEqual | TokenType::Equal => Precedence::Assign,
        TokenType::Or => Precedence::Or,
        TokenType::And => Precedence::And,
        TokenType::EqualEqual
        | TokenType::BangEqual
        | TokenType::LessEqual
        | TokenType::GreaterEqual => Precedence::Equals,
        TokenType::Less | TokenType::Greater => Precedence::Compare,
        TokenType::Plus | TokenType::Minus => Precedence::Sum,
        TokenType::Star | TokenType::Slash => Precedence::Product,
        // '[' and ':' keep call precedence but have no infix handler yet
        TokenType::LeftParen | TokenType::Dot | TokenType::LeftBracket | TokenType::Colon => {
            Precedence::Call
        }
        _ => Precedence::Lowest,
    }
}

/// Pratt parser with one token of lookahead. Errors accumulate in `errors`
/// and parsing continues with the next expression.
pub struct Parser {
    lexer: Lexer,
    peek: Token,
    pub errors: Vec<FenError>,
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        let mut parser = Self {
            lexer,
            peek: Token::new(TokenType::None, 0, String::new()),
            errors: Vec::new(),
        };
        // Load the first real token into the peek slot
        parser.next_token();
        parser
    }

    /// Returns the peeked token and pulls the next one, skipping illegal
    /// tokens and recording each as a lex error.
    fn next_token(&mut self) -> Token {
        let next = self.lexer.next_token();
        let token = std::mem::replace(&mut self.peek, next);
        while self.peek.kind == TokenType::Illegal {
            let illegal = std::mem::replace(&mut self.peek, self.lexer.next_token());
            self.errors.push(FenError::lex_error(
                illegal.line,
                format!("unrecognized character sequence '{}'", illegal.text),
            ));
        }
        token
    }

    fn consume(&mut self, kind: TokenType, message: &str) -> Result<Token, FenError> {
        if self.peek.kind == kind {
            Ok(self.next_token())
        } else {
            Err(FenError::parse_error(
                self.peek.line,
                format!("{}, found {}", message, self.peek),
            ))
        }
    }

    /// Parses the whole input as one top-level block. Always returns a
    /// block; syntax problems are collected in `self.errors`.
    pub fn parse_program(&mut self) -> Block {
        let line = self.peek.line;
        let mut exprs = Vec::new();
        while self.peek.kind != TokenType::Eof {
            if self.peek.kind == TokenType::Semicolon {
                self.next_token();
                continue;
            }
            match self.parse_entire_expr() {
                Ok(expr) => exprs.push(expr),
                Err(err) => self.errors.push(err),
            }
        }
        Block { exprs, line }
    }

    fn parse_entire_expr(&mut self) -> Result<Expr, FenError> {
        self.parse_expr(Precedence::Lowest)
    }

    fn parse_expr(&mut self, min: Precedence) -> Result<Expr, FenError> {
        let prefix = match prefix_fn(&self.peek.kind) {
            Some(handler) => handler,
            None => {
                let token = self.next_token();
                return Err(FenError::parse_error(
                    token.line,
                    format!("expected an expression, found {}", token),
                ));
            }
        };
        let mut left = prefix(self)?;

        while min < precedence(&self.peek.kind) {
            let infix = match infix_fn(&self.peek.kind) {
                Some(handler) => handler,
                None => return Ok(left),
            };
            left = infix(self, left)?;
        }
        Ok(left)
    }

    // --- prefix handlers ---

    fn parse_integer(&mut self) -> Result<Expr, FenError> {
        let token = self.next_token();
        match token.text.parse::<i64>() {
            Ok(value) => Ok(Expr::Int {
                value,
                line: token.line,
            }),
            Err(_) => Err(FenError::parse_error(
                token.line,
                format!("invalid integer literal '{}'", token.text),
            )),
        }
    }

    fn parse_float(&mut self) -> Result<Expr, FenError> {
        let token = self.next_token();
        match token.text.parse::<f64>() {
            Ok(value) => Ok(Expr::Float {
                value,
                line: token.line,
            }),
            Err(_) => Err(FenError::parse_error(
                token.line,
                format!("invalid float literal '{}'", token.text),
            )),
        }
    }

    fn parse_boolean(&mut self) -> Result<Expr, FenError> {
        let token = self.next_token();
        Ok(Expr::Bool {
            value: token.kind == TokenType::True,
            line: token.line,
        })
    }

    fn parse_string(&mut self) -> Result<Expr, FenError> {
        let token = self.next_token();
        Ok(Expr::String {
            value: token.text,
            line: token.line,
        })
    }

    fn parse_nil(&mut self) -> Result<Expr, FenError> {
        let token = self.next_token();
        Ok(Expr::Nil { line: token.line })
    }

    fn parse_identifier(&mut self) -> Result<Expr, FenError> {
        let token = self.next_token();
        Ok(Expr::Ident {
            name: token.text,
            line: token.line,
        })
    }

    fn parse_return(&mut self) -> Result<Expr, FenError> {
        let token = self.next_token();
        let value = self.parse_entire_expr()?;
        Ok(Expr::Return {
            value: Box::new(value),
            line: token.line,
        })
    }

    fn parse_break(&mut self) -> Result<Expr, FenError> {
        let token = self.next_token();
        let value = self.parse_entire_expr()?;
        Ok(Expr::Break {
            value: Box::new(value),
            line: token.line,
        })
    }

    fn parse_grouped(&mut self) -> Result<Expr, FenError> {
        self.next_token();
        let expr = self.parse_entire_expr()?;
        self.consume(TokenType::RightParen, "expected ')' to close grouping")?;
        Ok(expr)
    }

    fn parse_block_expr(&mut self) -> Result<Expr, FenError> {
        Ok(Expr::Block(self.parse_block()?))
    }

    /// `{ ... }`. Inner errors are recorded and parsing continues with the
    /// next expression; an unclosed brace is reported at end of input.
    fn parse_block(&mut self) -> Result<Block, FenError> {
        let token = self.next_token();
        let mut exprs = Vec::new();
        while self.peek.kind != TokenType::RightBrace && self.peek.kind != TokenType::Eof {
            if self.peek.kind == TokenType::Semicolon {
                self.next_token();
                continue;
            }
            match self.parse_entire_expr() {
                Ok(expr) => exprs.push(expr),
                Err(err) => self.errors.push(err),
            }
        }
        if self.peek.kind == TokenType::Eof {
            return Err(FenError::parse_error_with_help(
                self.peek.line,
                "expected '}' to close block, found end of input".to_string(),
                "every '{' needs a matching '}'".to_string(),
            ));
        }
        self.next_token();
        Ok(Block {
            exprs,
            line: token.line,
        })
    }

    /// Body position after `if`, `else`, `for`, and `func` headers: either
    /// an explicit block or a single expression promoted to one. After a
    /// promoted expression one trailing ';' is consumed.
    fn parse_implicit_block(&mut self) -> Result<Block, FenError> {
        if self.peek.kind == TokenType::LeftBrace {
            self.parse_block()
        } else {
            let line = self.peek.line;
            let expr = self.parse_entire_expr()?;
            if self.peek.kind == TokenType::Semicolon {
                self.next_token();
            }
            Ok(Block {
                exprs: vec![expr],
                line,
            })
        }
    }

    fn parse_if(&mut self) -> Result<Expr, FenError> {
        let token = self.next_token();
        let condition = self.parse_entire_expr()?;
        let consequence = self.parse_implicit_block()?;
        let alternative = if self.peek.kind == TokenType::Else {
            self.next_token();
            Some(self.parse_implicit_block()?)
        } else {
            None
        };
        Ok(Expr::If {
            condition: Box::new(condition),
            consequence,
            alternative,
            line: token.line,
        })
    }

    /// `func ( params ) [ captures ] body`. The capture list is optional;
    /// each element is a bare identifier or a declaration.
    fn parse_func(&mut self) -> Result<Expr, FenError> {
        let token = self.next_token();

        let mut params = Vec::new();
        for param in self.parse_comma_exprs(TokenType::LeftParen, TokenType::RightParen)? {
            match param {
                Expr::Ident { name, .. } => params.push(name),
                other => {
                    return Err(FenError::parse_error_with_help(
                        other.line(),
                        format!("function parameter '{}' is not an identifier", other),
                        "parameters are plain names: func(x, y) { ... }".to_string(),
                    ));
                }
            }
        }

        let mut captures = Vec::new();
        if self.peek.kind == TokenType::LeftBracket {
            for capture in self.parse_comma_exprs(TokenType::LeftBracket, TokenType::RightBracket)?
            {
                match capture {
                    Expr::Ident { name, line } => captures.push(Capture::Name { name, line }),
                    Expr::Declare {
                        target,
                        value,
                        line,
                    } => captures.push(Capture::Declare {
                        target,
                        value,
                        line,
                    }),
                    other => {
                        return Err(FenError::parse_error_with_help(
                            other.line(),
                            format!("invalid capture '{}'", other),
                            "captures are a name to share, like [x], or a declaration to copy, like [x := x]".to_string(),
                        ));
                    }
                }
            }
        }

        let body = self.parse_implicit_block()?;
        Ok(Expr::Func {
            params,
            captures,
            body,
            line: token.line,
        })
    }

    fn parse_for(&mut self) -> Result<Expr, FenError> {
        let token = self.next_token();
        let init = self.parse_entire_expr()?;
        self.consume(TokenType::Semicolon, "expected ';' after loop initializer")?;
        let condition = self.parse_entire_expr()?;
        self.consume(TokenType::Semicolon, "expected ';' after loop condition")?;
        let step = self.parse_entire_expr()?;
        if self.peek.kind == TokenType::Semicolon {
            self.next_token();
        }
        let body = self.parse_implicit_block()?;
        Ok(Expr::For {
            init: Box::new(init),
            condition: Box::new(condition),
            step: Box::new(step),
            body,
            line: token.line,
        })
    }

    /// `table { key = value, ... }`. A bare identifier key is sugar for the
    /// string with that identifier's text.
    fn parse_table(&mut self) -> Result<Expr, FenError> {
        let token = self.next_token();
        self.consume(TokenType::LeftBrace, "expected '{' after 'table'")?;
        let mut pairs = Vec::new();
        while self.peek.kind != TokenType::RightBrace && self.peek.kind != TokenType::Eof {
            let key = self.parse_index_key()?;
            self.consume(TokenType::Equal, "expected '=' after table key")?;
            let value = self.parse_entire_expr()?;
            pairs.push((key, value));
            if self.peek.kind == TokenType::Comma {
                self.next_token();
            } else {
                break;
            }
        }
        self.consume(TokenType::RightBrace, "expected '}' to close table literal")?;
        Ok(Expr::Table {
            pairs,
            line: token.line,
        })
    }

    fn parse_pack(&mut self) -> Result<Expr, FenError> {
        let line = self.peek.line;
        let elements = self.parse_comma_exprs(TokenType::LeftBracket, TokenType::RightBracket)?;
        Ok(Expr::Pack { elements, line })
    }

    fn parse_prefix_op(&mut self) -> Result<Expr, FenError> {
        let token = self.next_token();
        let operator = match token.kind {
            TokenType::Minus => UnaryOp::Negate,
            TokenType::Bang => UnaryOp::Not,
            _ => unreachable!(),
        };
        let operand = self.parse_expr(Precedence::Prefix)?;
        Ok(Expr::Unary {
            operator,
            operand: Box::new(operand),
            line: token.line,
        })
    }

    // --- infix handlers ---

    fn parse_declaration(&mut self, left: Expr) -> Result<Expr, FenError> {
        let token = self.next_token();
        if !left.is_assignable() {
            return Err(FenError::parse_error_with_help(
                token.line,
                format!("cannot declare into '{}'", left),
                "':=' needs an identifier, an index, or a pack of those on its left".to_string(),
            ));
        }
        // One level below Assign keeps chained declarations right-associative
        let value = self.parse_expr(Precedence::Lowest)?;
        Ok(Expr::Declare {
            target: Box::new(left),
            value: Box::new(value),
            line: token.line,
        })
    }

    fn parse_assign(&mut self, left: Expr) -> Result<Expr, FenError> {
        let token = self.next_token();
        if !left.is_assignable() {
            return Err(FenError::parse_error_with_help(
                token.line,
                format!("cannot assign to '{}'", left),
                "'=' needs an identifier, an index, or a pack of those on its left".to_string(),
            ));
        }
        let value = self.parse_expr(Precedence::Lowest)?;
        Ok(Expr::Assign {
            target: Box::new(left),
            value: Box::new(value),
            line: token.line,
        })
    }

    fn parse_call(&mut self, left: Expr) -> Result<Expr, FenError> {
        let line = self.peek.line;
        let args = self.parse_comma_exprs(TokenType::LeftParen, TokenType::RightParen)?;
        Ok(Expr::Call {
            callee: Box::new(left),
            args,
            line,
        })
    }

    fn parse_dot(&mut self, left: Expr) -> Result<Expr, FenError> {
        let token = self.next_token();
        let index = self.parse_index_key()?;
        Ok(Expr::Index {
            table: Box::new(left),
            index: Box::new(index),
            line: token.line,
        })
    }

    /// Key position after '.' and inside table literals: a bare identifier
    /// (string-key sugar) or a bracketed expression.
    fn parse_index_key(&mut self) -> Result<Expr, FenError> {
        if self.peek.kind == TokenType::Ident {
            let token = self.next_token();
            Ok(Expr::String {
                value: token.text,
                line: token.line,
            })
        } else {
            self.consume(
                TokenType::LeftBracket,
                "expected an identifier or '[' in key position",
            )?;
            let index = self.parse_entire_expr()?;
            self.consume(TokenType::RightBracket, "expected ']' to close key")?;
            Ok(index)
        }
    }

    fn parse_infix_op(&mut self, left: Expr) -> Result<Expr, FenError> {
        let token = self.next_token();
        let operator = match token.kind {
            TokenType::Plus => BinaryOp::Add,
            TokenType::Minus => BinaryOp::Subtract,
            TokenType::Star => BinaryOp::Multiply,
            TokenType::Slash => BinaryOp::Divide,
            TokenType::EqualEqual => BinaryOp::Equal,
            TokenType::BangEqual => BinaryOp::NotEqual,
            TokenType::Less => BinaryOp::Less,
            TokenType::LessEqual => BinaryOp::LessEqual,
            TokenType::Greater => BinaryOp::Greater,
            TokenType::GreaterEqual => BinaryOp::GreaterEqual,
            TokenType::And => BinaryOp::And,
            TokenType::Or => BinaryOp::Or,
            _ => unreachable!(),
        };
        let right = self.parse_expr(precedence(&token.kind))?;
        Ok(Expr::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            line: token.line,
        })
    }

    /// `begin e1, e2, ... end` with a trailing comma permitted.
    fn parse_comma_exprs(
        &mut self,
        begin: TokenType,
        end: TokenType,
    ) -> Result<Vec<Expr>, FenError> {
        if self.peek.kind != begin {
            return Err(FenError::parse_error(
                self.peek.line,
                format!("expected {}, found {}", begin, self.peek),
            ));
        }
        self.next_token();
        let mut exprs = Vec::new();
        while self.peek.kind != end && self.peek.kind != TokenType::Eof {
            exprs.push(self.parse_entire_expr()?);
            if self.peek.kind == TokenType::Comma {
                self.next_token();
            } else {
                break;
            }
        }
        if self.peek.kind != end {
            return Err(FenError::parse_error(
                self.peek.line,
                format!("expected {}, found {}", end, self.peek),
            ));
        }
        self.next_token();
        Ok(exprs)
    }
}
