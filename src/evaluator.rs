use crate::ast::{BinaryOp, Block, Capture, Expr, UnaryOp};
use crate::error::FenError;
use crate::value::{Function, Key, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A binding cell. Names bind to cells, not values: scopes may share a cell
/// (closure capture by reference), and assignment overwrites the cell's
/// contents so every alias observes the update.
pub type Cell = Rc<RefCell<Value>>;

#[derive(Debug)]
struct Scope {
    vars: HashMap<String, Cell>,
    outer: Option<Environment>,
}

/// A chain of scopes. The handle is reference-counted, so inner scopes,
/// closure environments, and the evaluator can share it freely.
#[derive(Debug, Clone)]
pub struct Environment {
    scope: Rc<RefCell<Scope>>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            scope: Rc::new(RefCell::new(Scope {
                vars: HashMap::new(),
                outer: None,
            })),
        }
    }

    pub fn inner(outer: &Environment) -> Self {
        Self {
            scope: Rc::new(RefCell::new(Scope {
                vars: HashMap::new(),
                outer: Some(outer.clone()),
            })),
        }
    }

    /// Walks from the innermost scope outward; the first hit wins.
    pub fn get(&self, name: &str) -> Option<Cell> {
        let mut current = self.clone();
        loop {
            let next = {
                let scope = current.scope.borrow();
                if let Some(cell) = scope.vars.get(name) {
                    return Some(Rc::clone(cell));
                }
                scope.outer.clone()
            };
            match next {
                Some(outer) => current = outer,
                None => return None,
            }
        }
    }

    /// Installs a fresh cell in this scope, shadowing any outer binding.
    pub fn declare(&self, name: &str, value: Value) {
        self.scope
            .borrow_mut()
            .vars
            .insert(name.to_string(), Rc::new(RefCell::new(value)));
    }

    /// Installs an existing cell under `name`, sharing its storage.
    pub fn capture(&self, name: &str, cell: Cell) {
        self.scope.borrow_mut().vars.insert(name.to_string(), cell);
    }

    /// Drops the outer link. A sealed closure environment resolves only its
    /// own captures.
    pub fn detach(&self) {
        self.scope.borrow_mut().outer = None;
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// How the destructuring driver treats a bare-identifier target.
#[derive(Debug, Clone, Copy)]
enum BindMode {
    /// `:=` — install a fresh cell in the innermost scope.
    Declare,
    /// `=` — overwrite the nearest existing cell; error if unbound.
    Assign,
}

/// Recursive interpreter over the expression tree. Owns the global scope so
/// successive programs (REPL lines) accumulate state.
pub struct Evaluator {
    env: Environment,
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    /// Evaluates a top-level program in the global scope, unwrapping a
    /// trailing `return`.
    pub fn eval_program(&mut self, program: &Block) -> Result<Value, FenError> {
        let env = self.env.clone();
        let result = self.eval_block(program, &env)?;
        match result {
            Value::Return(value) => Ok(*value),
            other => Ok(other),
        }
    }

    fn eval(&self, expr: &Expr, env: &Environment) -> Result<Value, FenError> {
        match expr {
            Expr::Int { value, .. } => Ok(Value::Int(*value)),
            Expr::Float { value, .. } => Ok(Value::Float(*value)),
            Expr::Bool { value, .. } => Ok(Value::Bool(*value)),
            Expr::String { value, .. } => Ok(Value::String(value.clone())),
            Expr::Nil { .. } => Ok(Value::Nil),

            Expr::Table { pairs, .. } => self.eval_table(pairs, env),
            Expr::Pack { elements, .. } => self.eval_pack(elements, env),

            Expr::Unary {
                operator,
                operand,
                line,
            } => self.eval_unary(operator, operand, *line, env),
            Expr::Binary {
                left,
                operator,
                right,
                line,
            } => self.eval_binary(operator, left, right, *line, env),

            Expr::Block(block) => {
                let inner = Environment::inner(env);
                self.eval_block(block, &inner)
            }
            Expr::Index { table, index, line } => self.eval_index(table, index, *line, env),
            Expr::If {
                condition,
                consequence,
                alternative,
                ..
            } => self.eval_if(condition, consequence, alternative.as_ref(), env),
            Expr::Func {
                params,
                captures,
                body,
                ..
            } => self.eval_func(params, captures, body, env),
            Expr::Call { callee, args, line } => self.eval_call(callee, args, *line, env),

            Expr::Ident { name, line } => match env.get(name) {
                Some(cell) => Ok(cell.borrow().clone()),
                None => Err(FenError::eval_error(
                    *line,
                    format!("variable '{}' is not declared", name),
                )),
            },
            Expr::Declare { target, value, .. } => {
                let value = self.eval(value, env)?;
                self.bind_target(target, value.clone(), env, BindMode::Declare)?;
                Ok(value)
            }
            Expr::Assign { target, value, .. } => {
                let value = self.eval(value, env)?;
                self.bind_target(target, value.clone(), env, BindMode::Assign)?;
                Ok(value)
            }

            Expr::Return { value, .. } => {
                let value = self.eval(value, env)?;
                Ok(Value::Return(Box::new(value)))
            }
            Expr::Break { value, .. } => {
                let value = self.eval(value, env)?;
                Ok(Value::Break(Box::new(value)))
            }

            // TODO: evaluate for loops; the parser already accepts them
            Expr::For { line, .. } => Err(FenError::eval_error(
                *line,
                "for loops are not implemented".to_string(),
            )),
        }
    }

    /// Runs a block's expressions in `env`. A `return` wrapper propagates
    /// upward unchanged; a `break` wrapper stops the block and yields its
    /// payload; otherwise the block's value is nil.
    fn eval_block(&self, block: &Block, env: &Environment) -> Result<Value, FenError> {
        for expr in &block.exprs {
            let value = self.eval(expr, env)?;
            match value {
                Value::Return(_) => return Ok(value),
                Value::Break(inner) => return Ok(*inner),
                _ => {}
            }
        }
        Ok(Value::Nil)
    }

    fn eval_table(&self, pairs: &[(Expr, Expr)], env: &Environment) -> Result<Value, FenError> {
        let entries = Rc::new(RefCell::new(HashMap::new()));
        for (key_expr, value_expr) in pairs {
            let key_value = self.eval(key_expr, env)?;
            let key = self.value_to_key(key_value, key_expr.line())?;
            let value = self.eval(value_expr, env)?;
            entries.borrow_mut().insert(key, value);
        }
        Ok(Value::Table(entries))
    }

    fn eval_pack(&self, elements: &[Expr], env: &Environment) -> Result<Value, FenError> {
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            values.push(self.eval(element, env)?);
        }
        Ok(Value::Pack(Rc::new(RefCell::new(values))))
    }

    fn eval_unary(
        &self,
        operator: &UnaryOp,
        operand: &Expr,
        line: usize,
        env: &Environment,
    ) -> Result<Value, FenError> {
        let value = self.eval(operand, env)?;
        match operator {
            UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOp::Negate => match value {
                Value::Int(n) => Ok(Value::Int(-n)),
                Value::Float(n) => Ok(Value::Float(-n)),
                other => Err(FenError::eval_error(
                    line,
                    format!("cannot negate {} value", other.type_name()),
                )),
            },
        }
    }

    /// Both operands are always evaluated before dispatch; `and`/`or` pick
    /// which operand's value to return, they do not skip evaluation.
    fn eval_binary(
        &self,
        operator: &BinaryOp,
        left: &Expr,
        right: &Expr,
        line: usize,
        env: &Environment,
    ) -> Result<Value, FenError> {
        let lhs = self.eval(left, env)?;
        let rhs = self.eval(right, env)?;

        match operator {
            BinaryOp::And => Ok(if lhs.is_truthy() { rhs } else { lhs }),
            BinaryOp::Or => Ok(if lhs.is_truthy() { lhs } else { rhs }),
            BinaryOp::Equal => Ok(Value::Bool(lhs == rhs)),
            BinaryOp::NotEqual => Ok(Value::Bool(lhs != rhs)),
            _ => self.eval_numeric_op(operator, lhs, rhs, line),
        }
    }

    /// Arithmetic and ordering. Matching integer operands use i64 semantics
    /// with truncated division; a float on either side promotes both to f64.
    fn eval_numeric_op(
        &self,
        operator: &BinaryOp,
        left: Value,
        right: Value,
        line: usize,
    ) -> Result<Value, FenError> {
        enum Operands {
            Ints(i64, i64),
            Floats(f64, f64),
        }

        let operands = match (&left, &right) {
            (Value::Int(l), Value::Int(r)) => Operands::Ints(*l, *r),
            (Value::Float(l), Value::Float(r)) => Operands::Floats(*l, *r),
            (Value::Int(l), Value::Float(r)) => Operands::Floats(*l as f64, *r),
            (Value::Float(l), Value::Int(r)) => Operands::Floats(*l, *r as f64),
            _ => {
                return Err(FenError::eval_error(
                    line,
                    format!(
                        "cannot apply '{}' to {} and {}",
                        operator,
                        left.type_name(),
                        right.type_name()
                    ),
                ));
            }
        };

        let result = match (operator, operands) {
            (BinaryOp::Add, Operands::Ints(l, r)) => Value::Int(l + r),
            (BinaryOp::Subtract, Operands::Ints(l, r)) => Value::Int(l - r),
            (BinaryOp::Multiply, Operands::Ints(l, r)) => Value::Int(l * r),
            (BinaryOp::Divide, Operands::Ints(l, r)) => {
                if r == 0 {
                    return Err(FenError::eval_error(line, "division by zero".to_string()));
                }
                Value::Int(l / r)
            }
            (BinaryOp::Less, Operands::Ints(l, r)) => Value::Bool(l < r),
            (BinaryOp::LessEqual, Operands::Ints(l, r)) => Value::Bool(l <= r),
            (BinaryOp::Greater, Operands::Ints(l, r)) => Value::Bool(l > r),
            (BinaryOp::GreaterEqual, Operands::Ints(l, r)) => Value::Bool(l >= r),

            (BinaryOp::Add, Operands::Floats(l, r)) => Value::Float(l + r),
            (BinaryOp::Subtract, Operands::Floats(l, r)) => Value::Float(l - r),
            (BinaryOp::Multiply, Operands::Floats(l, r)) => Value::Float(l * r),
            // IEEE 754 handles float division by zero
            (BinaryOp::Divide, Operands::Floats(l, r)) => Value::Float(l / r),
            (BinaryOp::Less, Operands::Floats(l, r)) => Value::Bool(l < r),
            (BinaryOp::LessEqual, Operands::Floats(l, r)) => Value::Bool(l <= r),
            (BinaryOp::Greater, Operands::Floats(l, r)) => Value::Bool(l > r),
            (BinaryOp::GreaterEqual, Operands::Floats(l, r)) => Value::Bool(l >= r),

            _ => unreachable!(),
        };
        Ok(result)
    }

    /// Index reads require a table; a missing key yields nil rather than an
    /// error.
    fn eval_index(
        &self,
        table: &Expr,
        index: &Expr,
        line: usize,
        env: &Environment,
    ) -> Result<Value, FenError> {
        let target = self.eval(table, env)?;
        match target {
            Value::Table(entries) => {
                let key_value = self.eval(index, env)?;
                let key = self.value_to_key(key_value, line)?;
                let entries = entries.borrow();
                Ok(entries.get(&key).cloned().unwrap_or(Value::Nil))
            }
            other => Err(FenError::eval_error(
                line,
                format!("cannot index {} value", other.type_name()),
            )),
        }
    }

    /// The condition gets its own scope, so a `:=` in the condition is
    /// visible to both arms but not outside the `if`.
    fn eval_if(
        &self,
        condition: &Expr,
        consequence: &Block,
        alternative: Option<&Block>,
        env: &Environment,
    ) -> Result<Value, FenError> {
        let if_env = Environment::inner(env);
        let condition = self.eval(condition, &if_env)?;
        if condition.is_truthy() {
            let arm_env = Environment::inner(&if_env);
            self.eval_block(consequence, &arm_env)
        } else if let Some(alternative) = alternative {
            let arm_env = Environment::inner(&if_env);
            self.eval_block(alternative, &arm_env)
        } else {
            Ok(Value::Nil)
        }
    }

    /// Builds the closure's capture scope: bare names share the outer cell,
    /// declarations evaluate and install fresh cells. Declaration values
    /// evaluate inside the capture scope, so earlier captures are visible.
    /// The scope is then detached from its outer chain.
    fn eval_func(
        &self,
        params: &[String],
        captures: &[Capture],
        body: &Block,
        env: &Environment,
    ) -> Result<Value, FenError> {
        let capture_env = Environment::inner(env);
        for capture in captures {
            match capture {
                Capture::Name { name, line } => match env.get(name) {
                    Some(cell) => capture_env.capture(name, cell),
                    None => {
                        return Err(FenError::eval_error(
                            *line,
                            format!("captured variable '{}' is not declared", name),
                        ));
                    }
                },
                Capture::Declare { target, value, .. } => {
                    let value = self.eval(value, &capture_env)?;
                    self.bind_target(target, value, &capture_env, BindMode::Declare)?;
                }
            }
        }
        capture_env.detach();

        Ok(Value::Func(Rc::new(Function {
            params: params.to_vec(),
            body: body.clone(),
            env: capture_env,
        })))
    }

    /// Arguments evaluate left to right in the caller's environment, each
    /// into a fresh cell in the call scope. Missing arguments bind nil;
    /// extra arguments evaluate for their side effects and are discarded.
    fn eval_call(
        &self,
        callee: &Expr,
        args: &[Expr],
        line: usize,
        env: &Environment,
    ) -> Result<Value, FenError> {
        let callee_value = self.eval(callee, env)?;
        let function = match callee_value {
            Value::Func(function) => function,
            other => {
                return Err(FenError::eval_error(
                    line,
                    format!("cannot call {} value", other.type_name()),
                ));
            }
        };

        let call_env = Environment::inner(&function.env);
        for i in 0..function.params.len().max(args.len()) {
            match (function.params.get(i), args.get(i)) {
                (Some(param), Some(arg)) => {
                    let value = self.eval(arg, env)?;
                    call_env.declare(param, value);
                }
                (Some(param), None) => call_env.declare(param, Value::Nil),
                (None, Some(arg)) => {
                    self.eval(arg, env)?;
                }
                (None, None) => unreachable!(),
            }
        }

        let result = self.eval_block(&function.body, &call_env)?;
        match result {
            Value::Return(value) => Ok(*value),
            other => Ok(other),
        }
    }

    /// Destructuring driver shared by `:=` and `=`. Identifiers go through
    /// `mode`; index targets always write the table storage in place; packs
    /// recurse pairwise, padding missing values with nil. A non-pack value
    /// binds to a pack's first target only.
    fn bind_target(
        &self,
        target: &Expr,
        value: Value,
        env: &Environment,
        mode: BindMode,
    ) -> Result<(), FenError> {
        match target {
            Expr::Ident { name, line } => match mode {
                BindMode::Declare => {
                    env.declare(name, value);
                    Ok(())
                }
                BindMode::Assign => match env.get(name) {
                    Some(cell) => {
                        *cell.borrow_mut() = value;
                        Ok(())
                    }
                    None => Err(FenError::eval_error(
                        *line,
                        format!("cannot assign to undeclared variable '{}'", name),
                    )),
                },
            },
            Expr::Index { table, index, line } => {
                let target_value = self.eval(table, env)?;
                match target_value {
                    Value::Table(entries) => {
                        let key_value = self.eval(index, env)?;
                        let key = self.value_to_key(key_value, *line)?;
                        entries.borrow_mut().insert(key, value);
                        Ok(())
                    }
                    other => Err(FenError::eval_error(
                        *line,
                        format!("cannot index {} value", other.type_name()),
                    )),
                }
            }
            Expr::Pack { elements, .. } => match value {
                Value::Pack(values) => {
                    for (i, element) in elements.iter().enumerate() {
                        let item = values.borrow().get(i).cloned().unwrap_or(Value::Nil);
                        self.bind_target(element, item, env, mode)?;
                    }
                    Ok(())
                }
                single => {
                    if let Some(first) = elements.first() {
                        self.bind_target(first, single, env, mode)?;
                    }
                    Ok(())
                }
            },
            other => Err(FenError::eval_error(
                other.line(),
                format!("internal error: cannot bind to '{}'", other),
            )),
        }
    }

    fn value_to_key(&self, value: Value, line: usize) -> Result<Key, FenError> {
        Key::from_value(&value).ok_or_else(|| {
            FenError::eval_error(
                line,
                format!("{} value cannot be used as a table key", value.type_name()),
            )
        })
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward_and_shadows() {
        let outer = Environment::new();
        let middle = Environment::inner(&outer);
        let inner = Environment::inner(&middle);

        outer.declare("greeting", Value::String("world".to_string()));
        middle.declare("greeting", Value::String("shadowed".to_string()));
        middle.declare("other", Value::Int(2));

        let from_outer = outer.get("greeting").unwrap();
        assert_eq!(*from_outer.borrow(), Value::String("world".to_string()));
        let from_inner = inner.get("greeting").unwrap();
        assert_eq!(*from_inner.borrow(), Value::String("shadowed".to_string()));

        assert!(outer.get("other").is_none());
        assert!(inner.get("other").is_some());
    }

    #[test]
    fn shared_cells_alias_writes() {
        let defining = Environment::new();
        defining.declare("x", Value::Int(1));
        let closure = Environment::new();
        closure.capture("x", defining.get("x").unwrap());

        let cell = closure.get("x").unwrap();
        *cell.borrow_mut() = Value::Int(42);

        let seen = defining.get("x").unwrap();
        assert_eq!(*seen.borrow(), Value::Int(42));
    }

    #[test]
    fn detach_cuts_the_chain() {
        let outer = Environment::new();
        outer.declare("x", Value::Int(1));
        let inner = Environment::inner(&outer);
        assert!(inner.get("x").is_some());
        inner.detach();
        assert!(inner.get("x").is_none());
    }
}
