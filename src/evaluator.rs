use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use chrono::{Duration, NaiveDate, NaiveTime};
use rust_decimal::RoundingStrategy;
use tracing::trace;

use crate::{
    ast::{BinOp, CallArg, Expr, FunctionDecl, InterpolationPart, Program, Stmt, UnaryOp},
    error::{BindError, RuntimeError, ScriptResult},
    memory::Memory,
    path::{PathSegment, PathStep, assign_at_path, extract_path, segment_for, unknown_root},
    registry::{FunctionRegistry, TypeRegistry},
    value::{Closure, Value},
};

/// How a statement finished.
///
/// Non-`Normal` outcomes unwind through enclosing statements until a node that
/// handles them: loops consume `Break`/`Continue`, calls consume `Return`,
/// `try` consumes `Thrown`.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal(Value),
    Break,
    Continue,
    Return(Value),
    Thrown(Value),
}

pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Tree-walking interpreter.
///
/// Borrows the registries read-only and a scope stack mutably for the
/// duration of one evaluation.
pub struct Interpreter<'a> {
    pub(crate) functions: &'a FunctionRegistry,
    pub(crate) types: &'a TypeRegistry,
    pub(crate) memory: &'a mut Memory,
    max_call_depth: usize,
    call_depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        functions: &'a FunctionRegistry,
        types: &'a TypeRegistry,
        memory: &'a mut Memory,
    ) -> Self {
        Interpreter {
            functions,
            types,
            memory,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            call_depth: 0,
        }
    }

    pub fn with_max_call_depth(mut self, limit: usize) -> Self {
        self.max_call_depth = limit;
        self
    }

    /// Run a program's top-level statements in the current scope.
    ///
    /// Returns the value of the last statement, or the operand of a top-level
    /// `return`. A `throw` nobody catches becomes [`RuntimeError::Thrown`].
    ///
    /// # Examples
    ///
    /// ```
    /// use tillscript::{Interpreter, Lexer, Memory, Parser, Value};
    /// use tillscript::registry::{FunctionRegistry, TypeRegistry};
    ///
    /// let tokens = Lexer::new("var i = 0; while (i < 3) { i = i + 1; } result = i").tokenize();
    /// let program = Parser::new(tokens).parse_program().unwrap();
    ///
    /// let (functions, types) = (FunctionRegistry::default(), TypeRegistry::default());
    /// let mut memory = Memory::new();
    /// Interpreter::new(&functions, &types, &mut memory).run(&program).unwrap();
    /// assert_eq!(memory.get("result"), Some(&Value::Integer(3)));
    /// ```
    pub fn run(&mut self, program: &Program) -> ScriptResult<Value> {
        let mut last = Value::Null;
        for stmt in &program.statements {
            match self.exec_stmt(stmt)? {
                Flow::Normal(value) => last = value,
                Flow::Return(value) => return Ok(value),
                Flow::Thrown(value) => return Err(RuntimeError::Thrown(value).into()),
                Flow::Break | Flow::Continue => {}
            }
        }
        Ok(last)
    }

    /// Run `body` inside a fresh scope frame. The frame is popped on every
    /// exit path.
    fn in_scope<T>(&mut self, body: impl FnOnce(&mut Self) -> T) -> T {
        self.memory.push();
        let result = body(self);
        self.memory.pop();
        result
    }

    fn exec_block(&mut self, statements: &[Stmt]) -> ScriptResult<Flow> {
        self.in_scope(|this| this.exec_sequence(statements))
    }

    fn exec_sequence(&mut self, statements: &[Stmt]) -> ScriptResult<Flow> {
        let mut last = Value::Null;
        for stmt in statements {
            match self.exec_stmt(stmt)? {
                Flow::Normal(value) => last = value,
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal(last))
    }

    /// Body of a control-flow statement, always in its own scope.
    fn exec_scoped(&mut self, stmt: &Stmt) -> ScriptResult<Flow> {
        match stmt {
            Stmt::Block(statements) => self.exec_block(statements),
            other => self.in_scope(|this| this.exec_stmt(other)),
        }
    }

    pub fn exec_stmt(&mut self, stmt: &Stmt) -> ScriptResult<Flow> {
        match stmt {
            Stmt::Expr(expr) => Ok(Flow::Normal(self.eval_expr(expr)?)),
            Stmt::Var(declarations) => {
                for (name, init) in declarations {
                    let value = match init {
                        Some(expr) => self.eval_expr(expr)?,
                        None => Value::Null,
                    };
                    self.memory.declare(name, value);
                }
                Ok(Flow::Normal(Value::Null))
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(condition)?.is_truthy() {
                    self.exec_scoped(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_scoped(else_branch)
                } else {
                    Ok(Flow::Normal(Value::Null))
                }
            }
            Stmt::While { condition, body } => {
                while self.eval_expr(condition)?.is_truthy() {
                    match self.exec_scoped(body)? {
                        Flow::Break => break,
                        Flow::Normal(_) | Flow::Continue => {}
                        unwinding => return Ok(unwinding),
                    }
                }
                Ok(Flow::Normal(Value::Null))
            }
            Stmt::For {
                init,
                condition,
                step,
                body,
            } => self.in_scope(|this| {
                if let Some(init) = init {
                    this.exec_stmt(init)?;
                }
                loop {
                    if let Some(condition) = condition
                        && !this.eval_expr(condition)?.is_truthy()
                    {
                        break;
                    }
                    match this.exec_scoped(body)? {
                        Flow::Break => break,
                        Flow::Normal(_) | Flow::Continue => {}
                        unwinding => return Ok(unwinding),
                    }
                    if let Some(step) = step {
                        this.eval_expr(step)?;
                    }
                }
                Ok(Flow::Normal(Value::Null))
            }),
            Stmt::ForEach {
                variable,
                iterable,
                body,
            } => {
                let items = iteration_items(self.eval_expr(iterable)?)?;
                for item in items {
                    let flow = self.in_scope(|this| {
                        this.memory.declare(variable, item);
                        match body.as_ref() {
                            Stmt::Block(statements) => this.exec_sequence(statements),
                            other => this.exec_stmt(other),
                        }
                    })?;
                    match flow {
                        Flow::Break => break,
                        Flow::Normal(_) | Flow::Continue => {}
                        unwinding => return Ok(unwinding),
                    }
                }
                Ok(Flow::Normal(Value::Null))
            }
            Stmt::Function(decl) => {
                let closure = Closure {
                    decl: decl.clone(),
                    captured: None,
                };
                self.memory
                    .set_global(decl.display_name(), Value::Function(Arc::new(closure)));
                Ok(Flow::Normal(Value::Null))
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Throw(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Thrown(value))
            }
            Stmt::Try {
                body,
                catch_variable,
                handler,
            } => {
                let thrown = match self.exec_block(body) {
                    Ok(Flow::Thrown(value)) => value,
                    Err(e) if e.is_catchable() => {
                        trace!(error = %e, "caught by script handler");
                        e.into_thrown_value()
                    }
                    other => return other,
                };
                self.in_scope(|this| {
                    if let Some(name) = catch_variable {
                        this.memory.declare(name, thrown);
                    }
                    this.exec_sequence(handler)
                })
            }
            Stmt::Run(expr) => Ok(Flow::Normal(self.eval_expr(expr)?)),
            Stmt::Block(statements) => self.exec_block(statements),
            Stmt::Empty => Ok(Flow::Normal(Value::Null)),
        }
    }

    pub fn eval_expr(&mut self, expr: &Expr) -> ScriptResult<Value> {
        match expr {
            Expr::Float(n) => Ok(Value::Float(*n)),
            Expr::Integer(n) => Ok(Value::Integer(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Date(d) => Ok(Value::Date(*d)),
            Expr::Time(t) => Ok(Value::Time(*t)),
            Expr::Word { value, .. } => Ok(value.clone()),
            Expr::Interpolated(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        InterpolationPart::Text(s) => text.push_str(s),
                        InterpolationPart::Expr(expr) => {
                            text.push_str(&self.eval_expr(expr)?.as_string())
                        }
                    }
                }
                Ok(Value::String(text))
            }
            Expr::Identifier { name, .. } => self.lookup(name),
            Expr::Member { object, name } => {
                let object = self.eval_expr(object)?;
                self.get_member(&object, name)
            }
            Expr::Index { object, index } => {
                let object = self.eval_expr(object)?;
                let index = self.eval_expr(index)?;
                self.apply_index(&object, &index)
            }
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                apply_unary(*op, &value).map_err(Into::into)
            }
            Expr::BinaryOp { op, left, right } => match op {
                BinOp::And => {
                    let left = self.eval_expr(left)?;
                    if !left.is_truthy() {
                        return Ok(Value::Boolean(false));
                    }
                    Ok(Value::Boolean(self.eval_expr(right)?.is_truthy()))
                }
                BinOp::Or => {
                    let left = self.eval_expr(left)?;
                    if left.is_truthy() {
                        return Ok(Value::Boolean(true));
                    }
                    Ok(Value::Boolean(self.eval_expr(right)?.is_truthy()))
                }
                _ => {
                    let left = self.eval_expr(left)?;
                    let right = self.eval_expr(right)?;
                    apply_binop(*op, &left, &right).map_err(Into::into)
                }
            },
            Expr::Assign { target, op, value } => {
                let mut value = self.eval_expr(value)?;
                let (root, segments) = self.resolve_target(target)?;
                if let Some(bin) = op.binary() {
                    let current = self.read_target(&root, &segments)?;
                    value = apply_binop(bin, &current, &value)?;
                }
                self.write_target(&root, &segments, value.clone())?;
                Ok(value)
            }
            Expr::Step {
                target,
                delta,
                prefix,
            } => {
                let (root, segments) = self.resolve_target(target)?;
                let old = self.read_target(&root, &segments)?;
                let new = apply_binop(BinOp::Add, &old, &Value::Integer(*delta))?;
                self.write_target(&root, &segments, new.clone())?;
                Ok(if *prefix { new } else { old })
            }
            Expr::Call { callee, args, .. } => self.eval_call(callee, args),
            Expr::Suffix {
                value, function, ..
            } => {
                let value = self.eval_expr(value)?;
                let functions = self.functions;
                let registered = functions.get_match(function).ok_or_else(|| {
                    BindError::UnknownFunction {
                        name: function.clone(),
                    }
                })?;
                if !registered.meta.is_suffixable {
                    return Err(BindError::NotSuffixable {
                        function: registered.meta.name.clone(),
                    }
                    .into());
                }
                registered.call(vec![(None, value)])
            }
            Expr::MethodCall {
                object,
                method,
                args,
            } => {
                let object = self.eval_expr(object)?;
                let args = self.eval_args(args)?;
                self.eval_method_call(object, method, args)
            }
            Expr::New {
                type_name, args, ..
            } => {
                let types = self.types;
                let (script_name, ty) =
                    types
                        .get_match(type_name)
                        .ok_or_else(|| BindError::UnknownType {
                            name: type_name.clone(),
                        })?;
                let args = self.eval_args(args)?;
                Ok(Value::Instance(ty.construct(script_name, args)?))
            }
            Expr::Lambda(decl) => Ok(Value::Function(Arc::new(Closure {
                decl: decl.clone(),
                captured: Some(self.memory.capture()),
            }))),
            Expr::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expr(element)?);
                }
                Ok(Value::Array(values))
            }
            Expr::Map(pairs) => {
                let mut map = HashMap::with_capacity(pairs.len());
                for (key, expr) in pairs {
                    let value = self.eval_expr(expr)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
        }
    }

    /// Variable lookup. A name that is not a variable but is a registered
    /// function flagged [`bare`](crate::registry::FunctionMetaData::bare) is
    /// called, so `Today` works without parentheses.
    fn lookup(&mut self, name: &str) -> ScriptResult<Value> {
        if let Some(value) = self.memory.get(name) {
            return Ok(value.clone());
        }
        if let Some(function) = self.functions.get_match(name)
            && function.meta.is_bare
            && function.meta.arguments.iter().all(|arg| !arg.required)
        {
            return function.call(Vec::new());
        }
        Err(BindError::UnknownIdentifier {
            name: name.to_string(),
        }
        .into())
    }

    pub(crate) fn get_member(&self, object: &Value, name: &str) -> ScriptResult<Value> {
        match object {
            Value::Object(map) => Ok(map
                .get(name)
                .or_else(|| {
                    map.iter()
                        .find(|(key, _)| key.eq_ignore_ascii_case(name))
                        .map(|(_, value)| value)
                })
                .cloned()
                .unwrap_or(Value::Null)),
            Value::Instance(instance) => {
                let value = match self.types.get_match(&instance.type_name) {
                    Some((_, ty)) => ty.get(instance, name)?,
                    None => instance.field(name),
                };
                value.ok_or_else(|| {
                    RuntimeError::UnknownMember {
                        type_name: instance.type_name.to_string(),
                        member: name.to_string(),
                    }
                    .into()
                })
            }
            Value::Array(arr) if name.eq_ignore_ascii_case("length") => {
                Ok(Value::Integer(arr.len() as i64))
            }
            Value::String(s) if name.eq_ignore_ascii_case("length") => {
                Ok(Value::Integer(s.chars().count() as i64))
            }
            other => Err(RuntimeError::UnknownMember {
                type_name: other.type_name().to_string(),
                member: name.to_string(),
            }
            .into()),
        }
    }

    fn apply_index(&self, object: &Value, index: &Value) -> ScriptResult<Value> {
        match (object, index) {
            (Value::Array(arr), Value::Integer(n)) => {
                let index = if *n < 0 {
                    // Negative index: count from end (-1 = last)
                    let abs_idx = n.unsigned_abs() as usize;
                    if abs_idx > arr.len() {
                        return Ok(Value::Null);
                    }
                    arr.len() - abs_idx
                } else {
                    *n as usize
                };
                Ok(arr.get(index).cloned().unwrap_or(Value::Null))
            }
            (Value::String(s), Value::Integer(n)) => Ok(usize::try_from(*n)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null)),
            (Value::Object(_) | Value::Instance(_), Value::String(key)) => {
                self.get_member(object, key)
            }
            (Value::Object(map), key @ (Value::Integer(_) | Value::Float(_) | Value::Boolean(_))) => {
                Ok(map.get(&key.to_string()).cloned().unwrap_or(Value::Null))
            }
            (Value::Array(_), Value::String(k)) => Err(RuntimeError::Type(format!(
                "cannot use string key '{}' on array; use integer index instead",
                k
            ))
            .into()),
            _ => Err(RuntimeError::Type(format!(
                "cannot index {} with {}",
                object.type_name(),
                index.type_name()
            ))
            .into()),
        }
    }

    /// Evaluate the index expressions of an assignment target, once, so a
    /// compound assignment reads and writes the same slot.
    fn resolve_target(&mut self, target: &Expr) -> ScriptResult<(String, Vec<PathSegment>)> {
        let (root, steps) = extract_path(target)?;
        let mut segments = Vec::with_capacity(steps.len());
        for step in steps {
            segments.push(match step {
                PathStep::Field(name) => PathSegment::Field(name.to_string()),
                PathStep::Index(expr) => segment_for(self.eval_expr(expr)?)?,
            });
        }
        Ok((root, segments))
    }

    fn read_target(&mut self, root: &str, segments: &[PathSegment]) -> ScriptResult<Value> {
        let mut value = self.lookup(root)?;
        for segment in segments {
            value = match segment {
                PathSegment::Field(name) => self.get_member(&value, name)?,
                PathSegment::Index(n) => self.apply_index(&value, &Value::Integer(*n))?,
            };
        }
        Ok(value)
    }

    fn write_target(&mut self, root: &str, segments: &[PathSegment], value: Value) -> ScriptResult<()> {
        if segments.is_empty() {
            self.memory.set(root, value);
            return Ok(());
        }
        let types = self.types;
        let slot = self.memory.get_mut(root).ok_or_else(|| unknown_root(root))?;
        assign_at_path(slot, segments, value, types)
    }

    pub(crate) fn eval_args(&mut self, args: &[CallArg]) -> ScriptResult<Vec<(Option<String>, Value)>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push((arg.name.clone(), self.eval_expr(&arg.value)?));
        }
        Ok(values)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[CallArg]) -> ScriptResult<Value> {
        if let Expr::Identifier { name, .. } = callee {
            match self.memory.get(name) {
                Some(Value::Function(closure)) => {
                    let closure = closure.clone();
                    let args = self.eval_args(args)?;
                    return self.call_closure(&closure, args);
                }
                Some(_) => {
                    return Err(RuntimeError::NotCallable { name: name.clone() }.into());
                }
                None => {}
            }
            let functions = self.functions;
            let function = functions
                .get_match(name)
                .ok_or_else(|| BindError::UnknownFunction { name: name.clone() })?;
            let args = self.eval_args(args)?;
            trace!(function = %function.meta.name, "calling host function");
            return function.call(args);
        }

        match self.eval_expr(callee)? {
            Value::Function(closure) => {
                let args = self.eval_args(args)?;
                self.call_closure(&closure, args)
            }
            other => Err(RuntimeError::NotCallable {
                name: other.type_name().to_string(),
            }
            .into()),
        }
    }

    /// Call a script function value with positional arguments.
    pub(crate) fn call_value(&mut self, function: &Value, args: Vec<Value>) -> ScriptResult<Value> {
        match function {
            Value::Function(closure) => {
                let args = args.into_iter().map(|v| (None, v)).collect();
                self.call_closure(closure, args)
            }
            other => Err(RuntimeError::NotCallable {
                name: other.type_name().to_string(),
            }
            .into()),
        }
    }

    /// Invoke a script function. Only globals are visible inside the body,
    /// plus whatever a lambda captured where it was created.
    pub(crate) fn call_closure(
        &mut self,
        closure: &Closure,
        args: Vec<(Option<String>, Value)>,
    ) -> ScriptResult<Value> {
        if self.call_depth >= self.max_call_depth {
            return Err(RuntimeError::StackOverflow {
                limit: self.max_call_depth,
            }
            .into());
        }
        let decl: &FunctionDecl = &closure.decl;
        let bound = decl.metadata().bind(args)?;

        let saved = self.memory.isolate();
        if let Some(captured) = &closure.captured {
            self.memory.push_frame(captured.clone());
        }
        self.memory.push();
        self.call_depth += 1;
        let result = self.run_function_body(decl, bound.slots);
        self.call_depth -= 1;
        self.memory.restore(saved);
        result
    }

    fn run_function_body(
        &mut self,
        decl: &FunctionDecl,
        slots: Vec<Option<Value>>,
    ) -> ScriptResult<Value> {
        for (param, slot) in decl.params.iter().zip(slots) {
            let value = match (slot, &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval_expr(default)?,
                (None, None) => Value::Null,
            };
            self.memory.declare(&param.name, value);
        }

        for stmt in &decl.body {
            match self.exec_stmt(stmt)? {
                Flow::Return(value) => return Ok(value),
                Flow::Thrown(value) => return Err(RuntimeError::Thrown(value).into()),
                Flow::Normal(_) | Flow::Break | Flow::Continue => {}
            }
        }
        Ok(Value::Null)
    }
}

/// Values visited by `for (x in ...)`: array elements, map keys in sorted
/// order, or the characters of a string.
fn iteration_items(value: Value) -> ScriptResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => {
            let mut keys: Vec<String> = map.into_keys().collect();
            keys.sort();
            Ok(keys.into_iter().map(Value::String).collect())
        }
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(RuntimeError::Type(format!("cannot iterate over {}", other.type_name())).into()),
    }
}

pub fn apply_unary(op: UnaryOp, value: &Value) -> Result<Value, RuntimeError> {
    match op {
        UnaryOp::Not => Ok(Value::Boolean(!value.is_truthy())),
        UnaryOp::Negate => match value.coerce_number() {
            Some(Value::Integer(n)) => Ok(n
                .checked_neg()
                .map(Value::Integer)
                .unwrap_or(Value::Float(-(n as f64)))),
            Some(Value::Float(n)) => Ok(Value::Float(-n)),
            _ => Err(RuntimeError::Type(format!(
                "cannot negate {}",
                value.type_name()
            ))),
        },
    }
}

/// Apply a non-short-circuiting binary operator.
pub fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinOp::Equal => Ok(Value::Boolean(values_equal(left, right))),
        BinOp::NotEqual => Ok(Value::Boolean(!values_equal(left, right))),
        BinOp::LessThan | BinOp::GreaterThan | BinOp::LessEqual | BinOp::GreaterEqual => {
            let ordering = compare_values(left, right).ok_or_else(|| {
                RuntimeError::Type(format!(
                    "cannot compare {} {} {}",
                    left.type_name(),
                    op.symbol(),
                    right.type_name()
                ))
            })?;
            let result = match op {
                BinOp::LessThan => ordering == Ordering::Less,
                BinOp::GreaterThan => ordering == Ordering::Greater,
                BinOp::LessEqual => ordering != Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Boolean(result))
        }
        BinOp::Add => match (left, right) {
            (Value::Date(d), n) | (n, Value::Date(d)) if n.is_number() => {
                add_days(*d, n.as_int().unwrap_or_default())
            }
            (Value::Time(t), n) | (n, Value::Time(t)) if n.is_number() => {
                Ok(Value::Time(add_minutes(*t, n)))
            }
            (Value::Array(a), Value::Array(b)) => {
                Ok(Value::Array(a.iter().chain(b).cloned().collect()))
            }
            (Value::String(_), _) | (_, Value::String(_)) => {
                match (left.coerce_number(), right.coerce_number()) {
                    (Some(a), Some(b)) => arithmetic(op, &a, &b),
                    _ => Ok(Value::String(format!(
                        "{}{}",
                        left.as_string(),
                        right.as_string()
                    ))),
                }
            }
            _ => numeric(op, left, right),
        },
        BinOp::Subtract => match (left, right) {
            (Value::Date(a), Value::Date(b)) => {
                Ok(Value::Integer(a.signed_duration_since(*b).num_days()))
            }
            (Value::Date(d), n) if n.is_number() => {
                add_days(*d, n.as_int().unwrap_or_default().saturating_neg())
            }
            (Value::Time(a), Value::Time(b)) => {
                Ok(Value::Integer(a.signed_duration_since(*b).num_minutes()))
            }
            (Value::Time(t), n) if n.is_number() => {
                let negated = apply_unary(UnaryOp::Negate, n)?;
                Ok(Value::Time(add_minutes(*t, &negated)))
            }
            _ => numeric(op, left, right),
        },
        BinOp::Multiply | BinOp::Divide | BinOp::Modulo => numeric(op, left, right),
        BinOp::And => Ok(Value::Boolean(left.is_truthy() && right.is_truthy())),
        BinOp::Or => Ok(Value::Boolean(left.is_truthy() || right.is_truthy())),
    }
}

fn add_days(date: NaiveDate, days: i64) -> Result<Value, RuntimeError> {
    Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .map(Value::Date)
        .ok_or_else(|| RuntimeError::Type(format!("date out of range: {} + {} days", date, days)))
}

/// Clock arithmetic: wraps around midnight.
fn add_minutes(time: NaiveTime, minutes: &Value) -> NaiveTime {
    let seconds = (minutes.as_float().unwrap_or_default() * 60.0).round() as i64;
    let seconds = seconds.rem_euclid(86_400);
    let (shifted, _) = time.overflowing_add_signed(Duration::seconds(seconds));
    shifted
}

/// Arithmetic after coercing numeric strings.
fn numeric(op: BinOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match (left.coerce_number(), right.coerce_number()) {
        (Some(a), Some(b)) => arithmetic(op, &a, &b),
        _ => Err(RuntimeError::Type(format!(
            "cannot apply '{}' to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

/// Arithmetic on two numbers. Integer pairs stay integral where exact; any
/// float operand goes through `Decimal` so whole results become integers and
/// decimal fractions do not drift.
fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        let (a, b) = (*a, *b);
        let exact = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Subtract => a.checked_sub(b),
            BinOp::Multiply => a.checked_mul(b),
            BinOp::Divide => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                // Inexact division yields a Float; overflow falls through to Decimal
                match a.checked_rem(b) {
                    Some(0) => a.checked_div(b),
                    Some(_) => return Ok(Value::Float(a as f64 / b as f64)),
                    None => None,
                }
            }
            BinOp::Modulo => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                a.checked_rem(b)
            }
            _ => None,
        };
        if let Some(n) = exact {
            return Ok(Value::Integer(n));
        }
    }

    let (a, b) = match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(RuntimeError::Type(format!(
                "cannot apply '{}' to {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            )));
        }
    };
    if matches!(op, BinOp::Divide | BinOp::Modulo) && b == 0.0 {
        return Err(RuntimeError::DivisionByZero);
    }

    if let (Some(ad), Some(bd)) = (left.as_decimal(), right.as_decimal()) {
        let rd = match op {
            BinOp::Add => ad.checked_add(bd),
            BinOp::Subtract => ad.checked_sub(bd),
            BinOp::Multiply => ad.checked_mul(bd),
            BinOp::Divide => ad.checked_div(bd),
            BinOp::Modulo => ad.checked_rem(bd),
            _ => None,
        };
        if let Some(rd) = rd {
            return Ok(Value::from_decimal(rd.normalize()));
        }
    }

    let res = match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide => a / b,
        _ => a % b,
    };
    Ok(Value::Float(res))
}

/// Equality with numbers compared by value, so `3 == 3.0`.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (a, b) if a.is_number() && b.is_number() => match (a.as_decimal(), b.as_decimal()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_float() == b.as_float(),
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => left == right,
    }
}

/// Ordering for comparisons and sorting; `None` when the values are not
/// comparable.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        _ => {
            let a = left.coerce_number()?;
            let b = right.coerce_number()?;
            match (a.as_decimal(), b.as_decimal()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => a.as_float()?.partial_cmp(&b.as_float()?),
            }
        }
    }
}

/// Round half away from zero to `digits` decimal places.
pub fn round_number(value: &Value, digits: u32) -> Option<Value> {
    let number = value.coerce_number()?;
    if let Value::Integer(_) = number {
        return Some(number);
    }
    let rounded = number
        .as_decimal()?
        .round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
    Some(Value::from_decimal(rounded.normalize()))
}
