use crate::ast::{Expr, Stmt};
use crate::env::Environment;
use crate::error::RuntimeError;
use crate::token::{Token, TokenKind};
use crate::value::{Function, Value};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use tracing::{debug, error, trace};

/// The outcome of executing one statement. `Return` is the unwind carrying
/// a `return` statement's value upward; every statement-composing construct
/// propagates it untouched, and the function-call boundary in
/// `call_function` is the single place that consumes it. Keeping this out
/// of the error channel means a real `RuntimeError` can never be mistaken
/// for a returned value.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

/// Walks statements and expressions against a chained environment. Program
/// output goes through the injected sink, one line per `print`.
pub struct Interpreter<'a> {
    out: &'a mut dyn Write,
}

impl<'a> Interpreter<'a> {
    pub fn new(out: &'a mut dyn Write) -> Self {
        Interpreter { out }
    }

    /// Runs a program against the given global environment. The first
    /// runtime error aborts the run. A top-level `return` stops the
    /// program; its value is discarded.
    pub fn interpret(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> Result<(), RuntimeError> {
        debug!(count = statements.len(), "Interpreting program");
        for stmt in statements {
            if let Flow::Return(_) = self.execute(stmt, Rc::clone(&env))? {
                break;
            }
        }
        Ok(())
    }

    pub fn execute(
        &mut self,
        stmt: &Stmt,
        env: Rc<RefCell<Environment>>,
    ) -> Result<Flow, RuntimeError> {
        trace!(stmt = ?stmt, "Executing statement");
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr, env)?;
                writeln!(self.out, "{}", value).map_err(|e| RuntimeError {
                    line: 0,
                    message: format!("could not write program output: {}", e),
                })?;
                Ok(Flow::Normal)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr, Rc::clone(&env))?,
                    None => Value::Nil,
                };
                debug!(name = %name.lexeme, value = ?value, "Declaring variable");
                env.borrow_mut().define(name.lexeme.clone(), value);
                Ok(Flow::Normal)
            }
            Stmt::Block(statements) => {
                let inner = Environment::new_enclosed(env);
                self.execute_block(statements, inner)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, Rc::clone(&env))?.is_truthy() {
                    self.execute(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { condition, body } => {
                // The condition is re-evaluated in the loop's own
                // environment; only the body opens nested scopes.
                while self.evaluate(condition, Rc::clone(&env))?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body, Rc::clone(&env))? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Function { name, params, body } => {
                // The closure is bound here, when the declaration executes,
                // to the environment active at this moment. Defining the
                // name afterwards is what lets the body refer to itself.
                let function = Function {
                    name: name.lexeme.clone(),
                    params: params.clone(),
                    body: Rc::clone(body),
                    closure: Rc::clone(&env),
                };
                debug!(name = %name.lexeme, arity = function.arity(), "Declaring function");
                env.borrow_mut()
                    .define(name.lexeme.clone(), Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }
            Stmt::Return { keyword, value } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Nil,
                };
                trace!(line = keyword.line, value = ?value, "Unwinding with return value");
                Ok(Flow::Return(value))
            }
        }
    }

    /// Executes a statement sequence against an already-created scope,
    /// stopping early when a `return` unwinds through.
    fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> Result<Flow, RuntimeError> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt, Rc::clone(&env))? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    pub fn evaluate(
        &mut self,
        expr: &Expr,
        env: Rc<RefCell<Environment>>,
    ) -> Result<Value, RuntimeError> {
        trace!(expr = ?expr, "Evaluating expression");
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Grouping { inner } => self.evaluate(inner, env),
            Expr::Unary { operator, operand } => {
                let value = self.evaluate(operand, env)?;
                self.unary_op(operator, value)
            }
            Expr::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left, Rc::clone(&env))?;
                let right = self.evaluate(right, env)?;
                self.binary_op(operator, left, right)
            }
            Expr::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left, Rc::clone(&env))?;
                // Short-circuit: the deciding operand is the result.
                let short_circuits = match operator.kind {
                    TokenKind::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right, env)
                }
            }
            Expr::Variable { name } => env.borrow().get(&name.lexeme).ok_or_else(|| {
                error!(name = %name.lexeme, "Undefined variable");
                undefined_variable(name)
            }),
            Expr::Assignment { name, value } => {
                let value = self.evaluate(value, Rc::clone(&env))?;
                if env.borrow_mut().assign(&name.lexeme, value.clone()) {
                    // Assignment is an expression; it yields the assigned
                    // value.
                    Ok(value)
                } else {
                    error!(name = %name.lexeme, "Assignment to undefined variable");
                    Err(undefined_variable(name))
                }
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee, Rc::clone(&env))?;
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument, Rc::clone(&env))?);
                }
                self.call_value(callee, paren, args)
            }
        }
    }

    fn unary_op(&mut self, operator: &Token, value: Value) -> Result<Value, RuntimeError> {
        match operator.kind {
            TokenKind::Minus => match value {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(RuntimeError::new(
                    operator,
                    format!("operand must be a number, got {}", other.kind()),
                )),
            },
            TokenKind::Bang => Ok(Value::Bool(!value.is_truthy())),
            _ => Err(RuntimeError::new(operator, "unsupported unary operator")),
        }
    }

    fn binary_op(
        &mut self,
        operator: &Token,
        left: Value,
        right: Value,
    ) -> Result<Value, RuntimeError> {
        match operator.kind {
            TokenKind::Plus => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
                _ => Err(RuntimeError::new(
                    operator,
                    "operands must be two numbers or two strings",
                )),
            },
            TokenKind::Minus => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Number(a - b))
            }
            TokenKind::Star => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Number(a * b))
            }
            TokenKind::Slash => {
                let (a, b) = number_operands(operator, left, right)?;
                if b == 0.0 {
                    error!(line = operator.line, "Division by zero");
                    return Err(RuntimeError::new(operator, "divide by zero"));
                }
                Ok(Value::Number(a / b))
            }
            TokenKind::Greater => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a > b))
            }
            TokenKind::GreaterEqual => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a >= b))
            }
            TokenKind::Less => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a < b))
            }
            TokenKind::LessEqual => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a <= b))
            }
            // Equality is structural over the whole value union and never
            // coerces.
            TokenKind::EqualEqual => Ok(Value::Bool(left == right)),
            TokenKind::BangEqual => Ok(Value::Bool(left != right)),
            _ => Err(RuntimeError::new(operator, "unsupported binary operator")),
        }
    }

    /// Dispatches a call over the two callable kinds. Everything else is a
    /// runtime error at the call's closing parenthesis.
    fn call_value(
        &mut self,
        callee: Value,
        paren: &Token,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(function) => self.call_function(&function, paren, args),
            Value::NativeFunction(native) => {
                debug!(name = %native.name, "Calling native function");
                check_arity(native.arity, args.len(), paren)?;
                (native.func)(&args).map_err(|message| RuntimeError::new(paren, message))
            }
            other => {
                error!(kind = other.kind(), "Attempted to call a non-callable value");
                Err(RuntimeError::new(
                    paren,
                    "can only call functions and classes",
                ))
            }
        }
    }

    fn call_function(
        &mut self,
        function: &Function,
        paren: &Token,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        debug!(name = %function.name, args = args.len(), "Calling function");
        check_arity(function.arity(), args.len(), paren)?;

        // The activation environment encloses the function's captured
        // closure, not the caller's environment. Lexical scoping lives or
        // dies on this line.
        let activation = Environment::new_enclosed(Rc::clone(&function.closure));
        for (param, arg) in function.params.iter().zip(args) {
            activation.borrow_mut().define(param.lexeme.clone(), arg);
        }

        // This is the single consumer of the return unwind.
        match self.execute_block(&function.body, activation)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

fn check_arity(expected: usize, got: usize, paren: &Token) -> Result<(), RuntimeError> {
    if expected != got {
        error!(expected, got, "Arity mismatch");
        return Err(RuntimeError::new(
            paren,
            format!("expect {} arguments but got {}", expected, got),
        ));
    }
    Ok(())
}

fn undefined_variable(name: &Token) -> RuntimeError {
    RuntimeError::new(name, format!("undefined variable '{}'", name.lexeme))
}

fn number_operands(
    operator: &Token,
    left: Value,
    right: Value,
) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),
        _ => Err(RuntimeError::new(operator, "operands must be numbers")),
    }
}
