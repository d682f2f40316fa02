//! Tree-walking evaluator.
//!
//! Executes the parsed statement list using the resolver's id→distance table
//! for variable binding.  The interpreter owns the global environment
//! (seeded with the native `clock`) and a current-environment cursor that is
//! swapped on entering blocks, calls, and loop bodies and restored on every
//! exit path, including non-local returns.
//!
//! Non-local `return` is modelled as an explicit execution outcome
//! ([`Flow`]) threaded through `execute`, not as an error: the failure
//! channel stays reserved for genuine runtime errors, and the nearest call
//! frame unwinds the `Return` outcome into an ordinary value.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::callable::{Callable, NativeFunction};
use crate::class::LoxClass;
use crate::diagnostics::DiagnosticSink;
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::function::LoxFunction;
use crate::instance::LoxInstance;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Outcome of executing one statement.  `Return` unwinds through enclosing
/// statements until the active call frame (or the top level) absorbs it.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    output: Rc<RefCell<dyn Write>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates a new Interpreter printing to stdout, with native functions
    /// such as `clock` defined in the globals.
    pub fn new() -> Self {
        Self::with_output(Rc::new(RefCell::new(io::stdout())))
    }

    /// Like [`Interpreter::new`], but `print` writes into `output`.
    /// Tests pass a captured buffer here.
    pub fn with_output(output: Rc<RefCell<dyn Write>>) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        globals
            .borrow_mut()
            .define("clock", Value::Native(Rc::new(NativeFunction::clock())));

        Self {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Resolver callback: record that the reference node `id` binds to the
    /// frame exactly `depth` scopes out from its use site.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("Noting local: id={}, depth={}", id, depth);

        self.locals.insert(id, depth);
    }

    /// Interprets a program.  The first runtime failure is reported into
    /// `sink` and halts the remaining statements of this run.
    pub fn interpret(&mut self, statements: &[Stmt], sink: &mut DiagnosticSink) {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                // A top-level `Return` is rejected statically by the
                // resolver, so `Flow` never escapes this loop.
                Ok(_) => {}

                Err(e) => {
                    sink.report(e);
                    return;
                }
            }
        }

        info!("Interpretation completed");
    }

    // ───────────────────────── statements ─────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.output.borrow_mut(), "{}", value)?;
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let environment = Environment::with_enclosing(self.environment.clone());

                self.execute_block(statements, Rc::new(RefCell::new(environment)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal => {}

                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);

                let function =
                    LoxFunction::new(declaration.clone(), self.environment.clone(), false);

                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));

                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Run `statements` with `environment` as the current frame, restoring
    /// the previous frame on every exit path.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Flow> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut result: Result<Flow> = Ok(Flow::Normal);

        for statement in statements {
            match self.execute(statement) {
                Ok(Flow::Normal) => {}

                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<Flow> {
        let superclass_value: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                _ => {
                    let line = match expr {
                        Expr::Variable { name, .. } => name.line,
                        _ => name.line,
                    };

                    return Err(LoxError::runtime(line, "Superclass must be a class."));
                }
            },

            None => None,
        };

        // Two-step declare-then-assign so methods may refer to the class by
        // name while its value is still being built.
        self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

        // Method closures of a subclass capture an extra frame carrying
        // `super`, fixed to the statically known superclass.
        let previous = self.environment.clone();

        if let Some(superclass) = &superclass_value {
            let mut environment = Environment::with_enclosing(self.environment.clone());

            environment.define("super", Value::Class(superclass.clone()));

            self.environment = Rc::new(RefCell::new(environment));
        }

        let mut method_table: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for method in methods {
            let is_initializer = method.name.lexeme == "init";

            let function =
                LoxFunction::new(method.clone(), self.environment.clone(), is_initializer);

            method_table.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let class = Value::Class(Rc::new(LoxClass::new(
            name.lexeme.clone(),
            superclass_value,
            method_table,
        )));

        // Pop the `super` frame (no-op when there was none).
        self.environment = previous;

        let assigned = self
            .environment
            .borrow_mut()
            .assign(&name.lexeme, class);

        if !assigned {
            return Err(LoxError::runtime(
                name.line,
                format!("Undefined variable '{}'.", name.lexeme),
            ));
        }

        Ok(Flow::Normal)
    }

    // ───────────────────────── expressions ────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::Str(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                // Short-circuit: yield the deciding operand's raw value,
                // never a coerced boolean.
                match operator.token_type {
                    TokenType::OR if left.is_truthy() => Ok(left),
                    TokenType::AND if !left.is_truthy() => Ok(left),
                    _ => self.evaluate(right),
                }
            }

            Expr::Variable { name, id } => self.look_up_variable(name, *id),

            Expr::Assign { name, value, id } => {
                let value = self.evaluate(value)?;

                let assigned = match self.locals.get(id) {
                    Some(distance) => self.environment.borrow_mut().assign_at(
                        *distance,
                        &name.lexeme,
                        value.clone(),
                    ),

                    None => self.globals.borrow_mut().assign(&name.lexeme, value.clone()),
                };

                if assigned {
                    Ok(value)
                } else {
                    Err(LoxError::runtime(
                        name.line,
                        format!("Undefined variable '{}'.", name.lexeme),
                    ))
                }
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                self.invoke(callee, paren, args)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),

                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;

                    instance.borrow_mut().set(name, value.clone());

                    Ok(value)
                }

                _ => Err(LoxError::runtime(name.line, "Only instances have fields.")),
            },

            Expr::This { keyword, id } => self.look_up_variable(keyword, *id),

            Expr::Super {
                keyword,
                method,
                id,
            } => self.evaluate_super(keyword, method, *id),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(operator.line, "Operand must be a number.")),
            },

            TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),

            _ => Err(LoxError::runtime(operator.line, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.token_type {
            // `+` sums numbers; with text on either side it concatenates the
            // textual forms.  Nil never silently stringifies.
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::Nil, _) | (_, Value::Nil) => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )),

                (a, b) if matches!(a, Value::Str(_)) || matches!(b, Value::Str(_)) => {
                    Ok(Value::Str(format!("{}{}", a, b)))
                }

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                let (a, b) = number_operands(operator, left, right)?;

                if b == 0.0 {
                    return Err(LoxError::runtime(operator.line, "Cannot divide by zero."));
                }

                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

            _ => Err(LoxError::runtime(operator.line, "Invalid binary operator.")),
        }
    }

    fn evaluate_super(&mut self, keyword: &Token, method: &Token, id: ExprId) -> Result<Value> {
        let distance: usize = *self.locals.get(&id).ok_or_else(|| {
            LoxError::runtime(keyword.line, "Cannot use 'super' outside of a subclass.")
        })?;

        // The `super` frame sits at the resolved distance; `this` lives one
        // frame closer, in the method's own binding frame.
        let superclass = self.environment.borrow().get_at(distance, "super");
        let object = self.environment.borrow().get_at(distance - 1, "this");

        match (superclass, object) {
            (Some(Value::Class(superclass)), Some(Value::Instance(instance))) => {
                let found = superclass.find_method(&method.lexeme).ok_or_else(|| {
                    LoxError::runtime(
                        method.line,
                        format!("Undefined property '{}'.", method.lexeme),
                    )
                })?;

                // Resolution starts at the static superclass, but the method
                // runs against the *current* object.
                Ok(Value::Function(Rc::new(found.bind(&instance))))
            }

            _ => Err(LoxError::runtime(
                keyword.line,
                "Cannot use 'super' outside of a subclass.",
            )),
        }
    }

    // ────────────────────────── helpers ───────────────────────────

    /// Read a variable: a resolved reference targets exactly its recorded
    /// ancestor frame; unresolved references fall back to dynamic global
    /// lookup, which supports forward-referenced globals.
    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value> {
        let value = match self.locals.get(&id) {
            Some(distance) => self.environment.borrow().get_at(*distance, &name.lexeme),
            None => self.globals.borrow().get(&name.lexeme),
        };

        value.ok_or_else(|| {
            LoxError::runtime(
                name.line,
                format!("Undefined variable '{}'.", name.lexeme),
            )
        })
    }

    /// Dispatch a call through the `Callable` capability.
    fn invoke(&mut self, callee: Value, paren: &Token, arguments: Vec<Value>) -> Result<Value> {
        let callable: &dyn Callable = match &callee {
            Value::Native(native) => native.as_ref(),
            Value::Function(function) => function.as_ref(),
            Value::Class(class) => class,

            _ => {
                return Err(LoxError::runtime(
                    paren.line,
                    "Can only call functions and classes.",
                ));
            }
        };

        if arguments.len() != callable.arity() {
            return Err(LoxError::runtime(
                paren.line,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    arguments.len()
                ),
            ));
        }

        callable.call(self, arguments, paren)
    }
}

/// Both operands must be numbers for arithmetic and ordering operators.
fn number_operands(operator: &Token, left: Value, right: Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),

        _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.")),
    }
}
