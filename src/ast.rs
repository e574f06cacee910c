use std::fmt;

/// Everything in Fen is an expression; the whole tree is one enum. Each
/// variant carries the line of its originating token for diagnostics.

#[derive(Debug, Clone)]
pub enum Expr {
    Int {
        value: i64,
        line: usize,
    },
    Float {
        value: f64,
        line: usize,
    },
    Bool {
        value: bool,
        line: usize,
    },
    String {
        value: String,
        line: usize,
    },
    Nil {
        line: usize,
    },
    Ident {
        name: String,
        line: usize,
    },
    /// `table{ key = value, ... }`, entries in textual order.
    Table {
        pairs: Vec<(Expr, Expr)>,
        line: usize,
    },
    /// `[a, b, c]` — a tuple value or a destructuring target, depending on
    /// where it appears.
    Pack {
        elements: Vec<Expr>,
        line: usize,
    },
    /// `receiver.key` or `receiver.[key]`.
    Index {
        table: Box<Expr>,
        index: Box<Expr>,
        line: usize,
    },
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
        line: usize,
    },
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
        line: usize,
    },
    /// `target := value` — installs new bindings in the innermost scope.
    Declare {
        target: Box<Expr>,
        value: Box<Expr>,
        line: usize,
    },
    /// `target = value` — overwrites existing bindings.
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        line: usize,
    },
    If {
        condition: Box<Expr>,
        consequence: Block,
        alternative: Option<Block>,
        line: usize,
    },
    Block(Block),
    Func {
        params: Vec<String>,
        captures: Vec<Capture>,
        body: Block,
        line: usize,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: usize,
    },
    Return {
        value: Box<Expr>,
        line: usize,
    },
    Break {
        value: Box<Expr>,
        line: usize,
    },
    /// Parsed but not evaluated.
    For {
        init: Box<Expr>,
        condition: Box<Expr>,
        step: Box<Expr>,
        body: Block,
        line: usize,
    },
}

/// A `{ ... }` sequence. `if` arms and function bodies are always blocks;
/// a bare expression in body position is promoted to a one-element block.
#[derive(Debug, Clone)]
pub struct Block {
    pub exprs: Vec<Expr>,
    pub line: usize,
}

/// One element of a function literal's capture list.
#[derive(Debug, Clone)]
pub enum Capture {
    /// `[x]` — the closure shares the outer binding cell.
    Name { name: String, line: usize },
    /// `[x := expr]` — the closure gets fresh cells holding a snapshot.
    Declare {
        target: Box<Expr>,
        value: Box<Expr>,
        line: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl Expr {
    pub fn line(&self) -> usize {
        match self {
            Expr::Int { line, .. } => *line,
            Expr::Float { line, .. } => *line,
            Expr::Bool { line, .. } => *line,
            Expr::String { line, .. } => *line,
            Expr::Nil { line } => *line,
            Expr::Ident { line, .. } => *line,
            Expr::Table { line, .. } => *line,
            Expr::Pack { line, .. } => *line,
            Expr::Index { line, .. } => *line,
            Expr::Unary { line, .. } => *line,
            Expr::Binary { line, .. } => *line,
            Expr::Declare { line, .. } => *line,
            Expr::Assign { line, .. } => *line,
            Expr::If { line, .. } => *line,
            Expr::Block(block) => block.line,
            Expr::Func { line, .. } => *line,
            Expr::Call { line, .. } => *line,
            Expr::Return { line, .. } => *line,
            Expr::Break { line, .. } => *line,
            Expr::For { line, .. } => *line,
        }
    }

    /// An expression may stand on the left of `=` or `:=` iff it is an
    /// identifier, an index, or a pack of assignables.
    pub fn is_assignable(&self) -> bool {
        match self {
            Expr::Ident { .. } | Expr::Index { .. } => true,
            Expr::Pack { elements, .. } => elements.iter().all(Expr::is_assignable),
            _ => false,
        }
    }
}

fn write_comma_separated(f: &mut fmt::Formatter, exprs: &[Expr]) -> fmt::Result {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", expr)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Int { value, .. } => write!(f, "{}", value),
            Expr::Float { value, .. } => write!(f, "{:?}", value),
            Expr::Bool { value, .. } => write!(f, "{}", value),
            Expr::String { value, .. } => write!(f, "\"{}\"", value),
            Expr::Nil { .. } => write!(f, "nil"),
            Expr::Ident { name, .. } => write!(f, "{}", name),
            Expr::Table { pairs, .. } => {
                write!(f, "table{{ ")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{}] = {}", key, value)?;
                }
                write!(f, " }}")
            }
            Expr::Pack { elements, .. } => {
                write!(f, "[")?;
                write_comma_separated(f, elements)?;
                write!(f, "]")
            }
            Expr::Index { table, index, .. } => write!(f, "{}.[{}]", table, index),
            Expr::Unary {
                operator, operand, ..
            } => write!(f, "{}{}", operator, operand),
            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => write!(f, "({} {} {})", left, operator, right),
            Expr::Declare { target, value, .. } => write!(f, "{} := {}", target, value),
            Expr::Assign { target, value, .. } => write!(f, "{} = {}", target, value),
            Expr::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                write!(f, "if {} {}", condition, consequence)?;
                if let Some(alt) = alternative {
                    write!(f, " else {}", alt)?;
                }
                Ok(())
            }
            Expr::Block(block) => write!(f, "{}", block),
            Expr::Func {
                params,
                captures,
                body,
                ..
            } => {
                write!(f, "func(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")[")?;
                for (i, capture) in captures.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", capture)?;
                }
                write!(f, "] {}", body)
            }
            Expr::Call { callee, args, .. } => {
                write!(f, "{}(", callee)?;
                write_comma_separated(f, args)?;
                write!(f, ")")
            }
            Expr::Return { value, .. } => write!(f, "return {}", value),
            Expr::Break { value, .. } => write!(f, "break {}", value),
            Expr::For {
                init,
                condition,
                step,
                body,
                ..
            } => write!(f, "for {}; {}; {} {}", init, condition, step, body),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{ ")?;
        for (i, expr) in self.exprs.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", expr)?;
        }
        write!(f, " }}")
    }
}

impl fmt::Display for Capture {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Capture::Name { name, .. } => write!(f, "{}", name),
            Capture::Declare { target, value, .. } => write!(f, "{} := {}", target, value),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryOp::Negate => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        };
        write!(f, "{}", op)
    }
}
