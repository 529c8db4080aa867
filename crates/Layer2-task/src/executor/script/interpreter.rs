//! Tree-walking evaluator
//!
//! Every statement costs one step. Every [`YIELD_INTERVAL`] steps the
//! interpreter checks the cancellation token and yields to the runtime, so a
//! busy loop can neither starve other tasks nor outlive its cancellation.

use super::ast::*;
use super::error::ScriptError;
use super::scope::{self, Scope, ScopeRef};
use super::value::{Closure, HostObject, Value};
use futures::future::{BoxFuture, FutureExt};
use mcbot_core::session::ReadySession;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type EvalResult<T> = Result<T, ScriptError>;

/// Steps between cancellation checks / scheduler yields
pub const YIELD_INTERVAL: u64 = 256;

const MAX_CALL_DEPTH: usize = 256;

/// Statements plus expressions being evaluated at once, across all calls
const MAX_EVAL_DEPTH: usize = 512;

/// Statement completion
pub(super) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Call-stack entry, used for error traces
struct Frame {
    name: String,
    pos: Pos,
}

pub struct Interpreter {
    pub(super) session: ReadySession,
    pub(super) cancel: CancellationToken,
    budget: u64,
    steps: u64,
    depth: usize,
    frames: Vec<Frame>,
}

impl Interpreter {
    pub fn new(session: ReadySession, cancel: CancellationToken, budget: u64) -> Self {
        Self {
            session,
            cancel,
            budget,
            steps: 0,
            depth: 0,
            frames: vec![Frame {
                name: "<script>".to_string(),
                pos: Pos::default(),
            }],
        }
    }

    /// Run a whole program; a top-level `return` produces the result
    pub async fn run(&mut self, program: &[Stmt]) -> EvalResult<Value> {
        self.check_cancel()?;
        let globals = self.globals();
        let scope = Scope::function(&globals);
        match self.exec_block(program, &scope).await? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    // ========================================================================
    // Bookkeeping
    // ========================================================================

    pub(super) fn check_cancel(&self) -> EvalResult<()> {
        if self.cancel.is_cancelled() {
            return Err(ScriptError::Cancelled);
        }
        Ok(())
    }

    async fn step(&mut self) -> EvalResult<()> {
        self.steps += 1;
        if self.steps > self.budget {
            return Err(ScriptError::BudgetExceeded(self.budget));
        }
        if self.steps % YIELD_INTERVAL == 0 {
            self.check_cancel()?;
            tokio::task::yield_now().await;
            self.check_cancel()?;
        }
        Ok(())
    }

    fn descend(&mut self) -> EvalResult<()> {
        if self.depth >= MAX_EVAL_DEPTH {
            return self.throw("RangeError", "Maximum call stack size exceeded");
        }
        self.depth += 1;
        Ok(())
    }

    /// Record the current position in the innermost frame
    pub(super) fn mark(&mut self, pos: Pos) {
        if let Some(frame) = self.frames.last_mut() {
            frame.pos = pos;
        }
    }

    pub(super) fn trace(&self) -> String {
        self.frames
            .iter()
            .rev()
            .map(|f| format!("    at {} ({})", f.name, f.pos))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Throw a fresh `name` error object (TypeError, ReferenceError, ...)
    pub(super) fn throw<T>(&self, name: &str, message: impl Into<String>) -> EvalResult<T> {
        Err(ScriptError::Thrown {
            value: Value::error(name, message),
            trace: self.trace(),
        })
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn hoist(&self, stmts: &[Stmt], scope: &ScopeRef) -> EvalResult<()> {
        for stmt in stmts {
            if let Stmt::Function(decl) = stmt {
                if let Some(name) = &decl.name {
                    let closure = Value::Function(Arc::new(Closure {
                        decl: Arc::clone(decl),
                        env: Arc::clone(scope),
                    }));
                    if let Err(message) = scope::declare(scope, name, closure, false) {
                        return self.throw("SyntaxError", message);
                    }
                }
            }
        }
        Ok(())
    }

    pub(super) async fn exec_block(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> EvalResult<Flow> {
        self.hoist(stmts, scope)?;
        for stmt in stmts {
            match self.exec(stmt, scope).await? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec<'a>(&'a mut self, stmt: &'a Stmt, scope: &'a ScopeRef) -> BoxFuture<'a, EvalResult<Flow>> {
        async move {
            self.descend()?;
            let result = self.exec_stmt(stmt, scope).await;
            self.depth -= 1;
            result
        }
        .boxed()
    }

    async fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> EvalResult<Flow> {
        self.step().await?;
        match stmt {
            Stmt::Decl {
                kind,
                name,
                init,
                pos,
            } => {
                let value = match init {
                    Some(init) => self.eval(init, scope).await?,
                    None => Value::Undefined,
                };
                self.mark(*pos);
                self.declare(*kind, scope, name, value)?;
                Ok(Flow::Normal)
            }

            Stmt::Expr(expr) => {
                self.eval(expr, scope).await?;
                Ok(Flow::Normal)
            }

            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, scope).await?.truthy() {
                    self.exec(then, scope).await
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise, scope).await
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { cond, body } => {
                while self.eval(cond, scope).await?.truthy() {
                    match self.exec(body, scope).await? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let loop_scope = Scope::block(scope);
                if let Some(init) = init {
                    self.exec(init, &loop_scope).await?;
                }
                loop {
                    if let Some(cond) = cond {
                        if !self.eval(cond, &loop_scope).await?.truthy() {
                            break;
                        }
                    }
                    match self.exec(body, &loop_scope).await? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &loop_scope).await?;
                    }
                    self.step().await?;
                }
                Ok(Flow::Normal)
            }

            Stmt::ForOf {
                kind,
                name,
                iterable,
                body,
                pos,
            } => {
                let iterable = self.eval(iterable, scope).await?;
                self.mark(*pos);
                for item in self.iterate(&iterable)? {
                    let iter_scope = Scope::block(scope);
                    self.declare(*kind, &iter_scope, name, item)?;
                    match self.exec(body, &iter_scope).await? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Block(stmts) => {
                let inner = Scope::block(scope);
                self.exec_block(stmts, &inner).await
            }

            Stmt::Sequence(stmts) => {
                for stmt in stmts {
                    match self.exec(stmt, scope).await? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),

            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope).await?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }

            Stmt::Throw(expr, pos) => {
                let value = self.eval(expr, scope).await?;
                self.mark(*pos);
                Err(ScriptError::Thrown {
                    value,
                    trace: self.trace(),
                })
            }

            Stmt::Try {
                body,
                param,
                handler,
                finalizer,
            } => self.exec_try(body, param.as_deref(), handler.as_deref(), finalizer.as_deref(), scope).await,

            // hoisted by exec_block
            Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal),
        }
    }

    fn declare(&self, kind: DeclKind, scope: &ScopeRef, name: &str, value: Value) -> EvalResult<()> {
        let declared = match kind {
            DeclKind::Var => scope::declare_var(scope, name, value),
            DeclKind::Let => scope::declare(scope, name, value, false),
            DeclKind::Const => scope::declare(scope, name, value, true),
        };
        match declared {
            Ok(()) => Ok(()),
            Err(message) => self.throw("SyntaxError", message),
        }
    }

    async fn exec_try(
        &mut self,
        body: &[Stmt],
        param: Option<&str>,
        handler: Option<&[Stmt]>,
        finalizer: Option<&[Stmt]>,
        scope: &ScopeRef,
    ) -> EvalResult<Flow> {
        let depth = self.frames.len();
        let inner = Scope::block(scope);
        let mut result = self.exec_block(body, &inner).await;

        if let (Err(ScriptError::Thrown { value, .. }), Some(handler)) = (&result, handler) {
            let value = value.clone();
            self.frames.truncate(depth);
            let catch_scope = Scope::block(scope);
            if let Some(param) = param {
                self.declare(DeclKind::Let, &catch_scope, param, value)?;
            }
            result = self.exec_block(handler, &catch_scope).await;
        }

        // cancellation and budget exhaustion skip `finally`
        if let (Some(finalizer), false) = (
            finalizer,
            matches!(
                result,
                Err(ScriptError::Cancelled) | Err(ScriptError::BudgetExceeded(_))
            ),
        ) {
            let fin_scope = Scope::block(scope);
            match self.exec_block(finalizer, &fin_scope).await? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        result
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(super) fn eval<'a>(&'a mut self, expr: &'a Expr, scope: &'a ScopeRef) -> BoxFuture<'a, EvalResult<Value>> {
        async move {
            self.descend()?;
            let result = self.eval_expr(expr, scope).await;
            self.depth -= 1;
            result
        }
        .boxed()
    }

    async fn eval_expr(&mut self, expr: &Expr, scope: &ScopeRef) -> EvalResult<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),

            Expr::Ident(name, pos) => match scope::lookup(scope, name) {
                Some(value) => Ok(value),
                None => {
                    self.mark(*pos);
                    self.throw("ReferenceError", format!("{} is not defined", name))
                }
            },

            Expr::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item, scope).await?);
                }
                Ok(Value::array(out))
            }

            Expr::Object(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let value = self.eval(value, scope).await?;
                    match out.iter_mut().find(|(k, _): &&mut (String, Value)| k == key) {
                        Some(slot) => slot.1 = value,
                        None => out.push((key.clone(), value)),
                    }
                }
                Ok(Value::object(out))
            }

            Expr::Function(decl) => Ok(Value::Function(Arc::new(Closure {
                decl: Arc::clone(decl),
                env: Arc::clone(scope),
            }))),

            Expr::Member {
                object,
                property,
                pos,
            } => {
                let object = self.eval(object, scope).await?;
                self.mark(*pos);
                self.get_property(object, property).await
            }

            Expr::Index { object, index, pos } => {
                let object = self.eval(object, scope).await?;
                let key = self.eval(index, scope).await?;
                self.mark(*pos);
                self.get_index(object, &key).await
            }

            Expr::Call { callee, args, pos } => self.eval_call(callee, args, *pos, scope).await,

            Expr::Unary { op, expr } => {
                if let (UnaryOp::TypeOf, Expr::Ident(name, _)) = (op, expr.as_ref()) {
                    if scope::lookup(scope, name).is_none() {
                        return Ok(Value::str("undefined"));
                    }
                }
                let value = self.eval(expr, scope).await?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::str(value.type_of()),
                })
            }

            Expr::Binary {
                op,
                left,
                right,
                pos,
            } => {
                let left = self.eval(left, scope).await?;
                let right = self.eval(right, scope).await?;
                self.mark(*pos);
                Ok(binary(*op, &left, &right))
            }

            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope).await?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, scope).await
                }
            }

            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, scope).await?.truthy() {
                    self.eval(then, scope).await
                } else {
                    self.eval(otherwise, scope).await
                }
            }

            Expr::Assign {
                op,
                target,
                value,
                pos,
            } => self.eval_assign(*op, target, value, *pos, scope).await,

            Expr::Update {
                name,
                delta,
                prefix,
                pos,
            } => {
                self.mark(*pos);
                let Some(current) = scope::lookup(scope, name) else {
                    return self.throw("ReferenceError", format!("{} is not defined", name));
                };
                let old = current.to_number();
                let new = old + delta;
                if let Err(message) = scope::assign(scope, name, Value::Number(new)) {
                    return self.throw("TypeError", message);
                }
                Ok(Value::Number(if *prefix { new } else { old }))
            }
        }
    }

    async fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &Expr,
        value: &Expr,
        pos: Pos,
        scope: &ScopeRef,
    ) -> EvalResult<Value> {
        match target {
            Expr::Ident(name, _) => {
                let current = match op.binary() {
                    Some(_) => match scope::lookup(scope, name) {
                        Some(current) => Some(current),
                        None => {
                            self.mark(pos);
                            return self.throw("ReferenceError", format!("{} is not defined", name));
                        }
                    },
                    None => None,
                };
                let rhs = self.eval(value, scope).await?;
                let new = combine(op, current, rhs);
                self.mark(pos);
                if let Err(message) = scope::assign(scope, name, new.clone()) {
                    return self.throw("TypeError", message);
                }
                Ok(new)
            }

            Expr::Member {
                object, property, ..
            } => {
                let object = self.eval(object, scope).await?;
                let current = match op.binary() {
                    Some(_) => Some(self.get_property(object.clone(), property).await?),
                    None => None,
                };
                let rhs = self.eval(value, scope).await?;
                let new = combine(op, current, rhs);
                self.mark(pos);
                self.set_property(&object, property, new.clone())?;
                Ok(new)
            }

            Expr::Index { object, index, .. } => {
                let object = self.eval(object, scope).await?;
                let key = self.eval(index, scope).await?;
                let current = match op.binary() {
                    Some(_) => Some(self.get_index(object.clone(), &key).await?),
                    None => None,
                };
                let rhs = self.eval(value, scope).await?;
                let new = combine(op, current, rhs);
                self.mark(pos);
                self.set_index(&object, &key, new.clone())?;
                Ok(new)
            }

            _ => {
                self.mark(pos);
                self.throw("SyntaxError", "Invalid left-hand side in assignment")
            }
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    async fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        pos: Pos,
        scope: &ScopeRef,
    ) -> EvalResult<Value> {
        let label = expr_label(callee);
        match callee {
            Expr::Member {
                object, property, ..
            } => {
                let bot_path = bot_path(object, scope);
                let this = self.eval(object, scope).await?;
                let args = self.eval_args(args, scope).await?;
                self.mark(pos);

                // `bot.inventory.items()`: methods the local value lacks run on the client
                if let Some(path) = bot_path.filter(|p| !p.is_empty()) {
                    if !self.has_local_method(&this, property) {
                        return self.call_bot(&format!("{}.{}", path, property), args).await;
                    }
                }
                self.call_method(this, property, args, &label).await
            }

            Expr::Index { object, index, .. } => {
                let this = self.eval(object, scope).await?;
                let key = self.eval(index, scope).await?;
                let args = self.eval_args(args, scope).await?;
                self.mark(pos);
                self.call_method(this, &property_key(&key), args, &label).await
            }

            _ => {
                let function = self.eval(callee, scope).await?;
                let args = self.eval_args(args, scope).await?;
                self.mark(pos);
                self.call_value(function, args, &label).await
            }
        }
    }

    async fn eval_args(&mut self, args: &[Expr], scope: &ScopeRef) -> EvalResult<Vec<Value>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            out.push(self.eval(arg, scope).await?);
        }
        Ok(out)
    }

    /// Call any callable value; `label` names it in "is not a function"
    pub(super) fn call_value<'a>(
        &'a mut self,
        callee: Value,
        args: Vec<Value>,
        label: &'a str,
    ) -> BoxFuture<'a, EvalResult<Value>> {
        async move {
            match callee {
                Value::Function(closure) => self.call_closure(closure, args).await,
                Value::Builtin(builtin) => self.call_builtin(builtin, args).await,
                _ => self.throw("TypeError", format!("{} is not a function", label)),
            }
        }
        .boxed()
    }

    async fn call_closure(&mut self, closure: Arc<Closure>, args: Vec<Value>) -> EvalResult<Value> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return self.throw("RangeError", "Maximum call stack size exceeded");
        }

        let decl = Arc::clone(&closure.decl);
        let scope = Scope::function(&closure.env);
        let mut args = args.into_iter();
        for param in &decl.params {
            let value = args.next().unwrap_or(Value::Undefined);
            self.declare(DeclKind::Let, &scope, param, value)?;
        }

        self.frames.push(Frame {
            name: decl.display_name().to_string(),
            pos: decl.pos,
        });
        let result = self.exec_block(&decl.body, &scope).await;
        self.frames.pop();

        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }
}

// ============================================================================
// Operators
// ============================================================================

fn combine(op: AssignOp, current: Option<Value>, rhs: Value) -> Value {
    match (op.binary(), current) {
        (Some(bin), Some(current)) => binary(bin, &current, &rhs),
        _ => rhs,
    }
}

fn is_numeric(value: &Value) -> bool {
    matches!(
        value,
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_)
    )
}

pub(super) fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if is_numeric(left) && is_numeric(right) {
                Value::Number(left.to_number() + right.to_number())
            } else {
                Value::Str(format!("{}{}", left.display(), right.display()))
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(left.strict_eq(right)),
        BinaryOp::NotEq => Value::Bool(!left.strict_eq(right)),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            let Some(ordering) = ordering else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::LtEq => ordering.is_le(),
                _ => ordering.is_ge(),
            })
        }
    }
}

/// Property name for an index key (`obj[1]` reads `"1"`)
pub(super) fn property_key(key: &Value) -> String {
    key.display()
}

/// Source-ish name of a callee for error messages
fn expr_label(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name, _) => name.clone(),
        Expr::Member {
            object, property, ..
        } => format!("{}.{}", expr_label(object), property),
        Expr::Index { object, .. } => format!("{}[...]", expr_label(object)),
        Expr::Call { callee, .. } => format!("{}(...)", expr_label(callee)),
        _ => "expression".to_string(),
    }
}

/// Dotted client path of a member chain rooted at `bot` (`bot.a.b` → `a.b`)
///
/// `None` when the chain is not rooted at the bot or goes through the typed
/// `bot.pathfinder` interface.
fn bot_path(expr: &Expr, scope: &ScopeRef) -> Option<String> {
    let mut parts = Vec::new();
    let mut current = expr;
    loop {
        match current {
            Expr::Member {
                object, property, ..
            } => {
                parts.push(property.as_str());
                current = object;
            }
            Expr::Ident(name, _) => {
                if !matches!(
                    scope::lookup(scope, name),
                    Some(Value::Host(HostObject::Bot))
                ) {
                    return None;
                }
                break;
            }
            _ => return None,
        }
    }
    parts.reverse();
    if parts.first() == Some(&"pathfinder") {
        return None;
    }
    Some(parts.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addition_concatenates_strings() {
        let v = binary(BinaryOp::Add, &Value::str("a"), &Value::Number(1.0));
        assert_eq!(v.display(), "a1");
        let v = binary(BinaryOp::Add, &Value::Number(1.0), &Value::Bool(true));
        assert_eq!(v.display(), "2");
    }

    #[test]
    fn test_comparisons() {
        assert!(binary(BinaryOp::Lt, &Value::str("a"), &Value::str("b")).truthy());
        assert!(!binary(BinaryOp::Lt, &Value::Number(f64::NAN), &Value::Number(1.0)).truthy());
        assert!(binary(BinaryOp::GtEq, &Value::Number(2.0), &Value::str("2")).truthy());
        assert!(!binary(BinaryOp::Eq, &Value::Number(2.0), &Value::str("2")).truthy());
    }
}
