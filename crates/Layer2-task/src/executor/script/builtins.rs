//! Capability set and native methods
//!
//! Everything a script can reach is listed in [`Interpreter::globals`]. Host
//! calls all go through [`Interpreter::host`], which races them against the
//! cancellation token.

use super::error::ScriptError;
use super::interpreter::{property_key, EvalResult, Interpreter};
use super::scope::{Scope, ScopeRef};
use super::value::{Builtin, DataRef, HostObject, LogLevel, MathFn, Shared, Value};
use mcbot_core::session::{Goal, MovementConfig, Vec3};
use mcbot_foundation::Error;
use serde::Serialize;
use serde_json::Value as Json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const STRING_METHODS: &[&str] = &[
    "includes",
    "startsWith",
    "endsWith",
    "indexOf",
    "toUpperCase",
    "toLowerCase",
    "trim",
    "split",
    "slice",
    "replace",
];

const ARRAY_METHODS: &[&str] = &[
    "push", "pop", "includes", "indexOf", "join", "slice", "map", "filter", "forEach", "find",
];

const VEC3_METHODS: &[&str] = &["offset", "plus", "minus", "floored", "distanceTo", "clone"];

/// Largest gap an index assignment may open at the end of an array
const MAX_ARRAY_GROWTH: usize = 1 << 20;

impl Interpreter {
    /// `bot`, `goals`, `Movements`, `mcData`, `Vec3`, `signal` plus language builtins
    pub(super) fn globals(&self) -> ScopeRef {
        Scope::globals([
            ("bot", Value::Host(HostObject::Bot)),
            ("goals", Value::Host(HostObject::Goals)),
            ("Movements", Value::Builtin(Builtin::MovementsCtor)),
            (
                "mcData",
                Value::Data(DataRef::root(Arc::clone(&self.session.game_data))),
            ),
            ("Vec3", Value::Builtin(Builtin::Vec3Ctor)),
            ("signal", Value::Host(HostObject::Signal)),
            ("sleep", Value::Builtin(Builtin::Sleep)),
            ("Math", Value::Host(HostObject::Math)),
            ("JSON", Value::Host(HostObject::Json)),
            ("Object", Value::Host(HostObject::Object)),
            ("console", Value::Host(HostObject::Console)),
            ("Error", Value::Builtin(Builtin::ErrorCtor)),
            ("String", Value::Builtin(Builtin::StringCtor)),
            ("Number", Value::Builtin(Builtin::NumberCtor)),
        ])
    }

    // ========================================================================
    // Host boundary
    // ========================================================================

    /// Await a client call, aborting on cancellation
    pub(super) async fn host<T>(
        &self,
        call: impl Future<Output = mcbot_foundation::Result<T>>,
    ) -> EvalResult<T> {
        self.check_cancel()?;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ScriptError::Cancelled),
            result = call => result.map_err(|e| self.host_error(e)),
        }
    }

    /// Client failures become catchable `Error` objects
    fn host_error(&self, err: Error) -> ScriptError {
        let (message, remote_trace) = match err {
            Error::Cancelled => return ScriptError::Cancelled,
            Error::Execution { message, trace } => (message, trace),
            other => (other.to_string(), String::new()),
        };
        let local = self.trace();
        let trace = if remote_trace.is_empty() {
            local
        } else {
            format!("{}\n{}", remote_trace, local)
        };
        ScriptError::Thrown {
            value: Value::error("Error", message),
            trace,
        }
    }

    fn host_json(&self, value: &Value) -> EvalResult<Json> {
        match value.to_json() {
            Ok(json) => Ok(json.unwrap_or(Json::Null)),
            Err(message) => self.throw("TypeError", message),
        }
    }

    fn to_goal(&self, value: &Value) -> EvalResult<Goal> {
        let json = self.host_json(value)?;
        match serde_json::from_value::<Goal>(json) {
            Ok(goal) => Ok(goal),
            Err(e) => self.throw("TypeError", format!("Invalid goal: {}", e)),
        }
    }

    pub(super) async fn call_bot(&mut self, method: &str, args: Vec<Value>) -> EvalResult<Value> {
        let args = args
            .iter()
            .map(|arg| self.host_json(arg))
            .collect::<EvalResult<Vec<_>>>()?;
        let result = self.host(self.session.handle.call(method, args)).await?;
        Ok(Value::from_json(result))
    }

    async fn call_pathfinder(&mut self, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        let arg0 = args.first().cloned().unwrap_or(Value::Undefined);
        match name {
            "setGoal" => {
                let goal = match arg0 {
                    Value::Undefined | Value::Null => None,
                    goal => Some(self.to_goal(&goal)?),
                };
                let dynamic = args.get(1).is_some_and(Value::truthy);
                self.host(self.session.handle.set_goal(goal, dynamic)).await?;
            }
            "goto" => {
                let goal = self.to_goal(&arg0)?;
                self.host(self.session.handle.goto(goal)).await?;
            }
            "stop" => self.host(self.session.handle.stop_goal()).await?,
            "setMovements" => {
                let json = self.host_json(&arg0)?;
                let movements = match serde_json::from_value::<MovementConfig>(json) {
                    Ok(movements) => movements,
                    Err(e) => return self.throw("TypeError", format!("Invalid movements: {}", e)),
                };
                self.host(self.session.handle.set_movements(movements)).await?;
            }
            "isMoving" => {
                let moving = self.host(self.session.handle.is_moving()).await?;
                return Ok(Value::Bool(moving));
            }
            _ => return self.call_bot(&format!("pathfinder.{}", name), args).await,
        }
        Ok(Value::Undefined)
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub(super) async fn get_property(&mut self, object: Value, name: &str) -> EvalResult<Value> {
        match &object {
            Value::Undefined | Value::Null => self.throw(
                "TypeError",
                format!(
                    "Cannot read properties of {} (reading '{}')",
                    object.display(),
                    name
                ),
            ),
            Value::Host(host) => self.host_property(*host, name).await,
            Value::Str(s) => Ok(match name {
                "length" => Value::Number(s.chars().count() as f64),
                _ => match name.parse::<usize>() {
                    Ok(index) => s
                        .chars()
                        .nth(index)
                        .map(|c| Value::Str(c.to_string()))
                        .unwrap_or(Value::Undefined),
                    Err(_) => Value::Undefined,
                },
            }),
            Value::Array(items) => Ok(array_property(items, name)),
            Value::Data(data) => {
                let len = match data.resolve() {
                    Some(Json::Array(items)) if name == "length" => Some(items.len()),
                    _ => None,
                };
                Ok(match len {
                    Some(len) => Value::Number(len as f64),
                    None => data.child(name),
                })
            }
            _ => Ok(object.get_field(name).unwrap_or(Value::Undefined)),
        }
    }

    pub(super) async fn get_index(&mut self, object: Value, key: &Value) -> EvalResult<Value> {
        self.get_property(object, &property_key(key)).await
    }

    async fn host_property(&mut self, host: HostObject, name: &str) -> EvalResult<Value> {
        let value = match host {
            HostObject::Bot => match name {
                "version" => Value::str(self.session.version.clone()),
                "username" => Value::str(self.session.handle.username()),
                "pathfinder" => Value::Host(HostObject::Pathfinder),
                _ => Value::from_json(self.host(self.session.handle.get(name)).await?),
            },
            HostObject::Pathfinder => {
                let path = format!("pathfinder.{}", name);
                Value::from_json(self.host(self.session.handle.get(&path)).await?)
            }
            HostObject::Goals => Goal::CONSTRUCTORS
                .iter()
                .copied()
                .find(|c| *c == name)
                .map(|c| Value::Builtin(Builtin::Goal(c)))
                .unwrap_or(Value::Undefined),
            HostObject::Math => match name {
                "floor" => Value::Builtin(Builtin::Math(MathFn::Floor)),
                "ceil" => Value::Builtin(Builtin::Math(MathFn::Ceil)),
                "round" => Value::Builtin(Builtin::Math(MathFn::Round)),
                "abs" => Value::Builtin(Builtin::Math(MathFn::Abs)),
                "min" => Value::Builtin(Builtin::Math(MathFn::Min)),
                "max" => Value::Builtin(Builtin::Math(MathFn::Max)),
                "sqrt" => Value::Builtin(Builtin::Math(MathFn::Sqrt)),
                "pow" => Value::Builtin(Builtin::Math(MathFn::Pow)),
                "PI" => Value::Number(std::f64::consts::PI),
                "E" => Value::Number(std::f64::consts::E),
                _ => Value::Undefined,
            },
            HostObject::Json => match name {
                "stringify" => Value::Builtin(Builtin::JsonStringify),
                "parse" => Value::Builtin(Builtin::JsonParse),
                _ => Value::Undefined,
            },
            HostObject::Console => match name {
                "log" | "info" | "debug" => Value::Builtin(Builtin::Console(LogLevel::Log)),
                "warn" => Value::Builtin(Builtin::Console(LogLevel::Warn)),
                "error" => Value::Builtin(Builtin::Console(LogLevel::Error)),
                _ => Value::Undefined,
            },
            HostObject::Signal => match name {
                "aborted" => Value::Bool(self.cancel.is_cancelled()),
                _ => Value::Undefined,
            },
            HostObject::Object => match name {
                "keys" => Value::Builtin(Builtin::ObjectKeys),
                "values" => Value::Builtin(Builtin::ObjectValues),
                "entries" => Value::Builtin(Builtin::ObjectEntries),
                _ => Value::Undefined,
            },
        };
        Ok(value)
    }

    pub(super) fn set_property(&self, object: &Value, name: &str, value: Value) -> EvalResult<()> {
        match object {
            Value::Object(_) => {
                object.set_field(name, value);
                Ok(())
            }
            Value::Array(items) => match name.parse::<usize>() {
                Ok(index) => self.set_element(items, index, value),
                Err(_) => self.throw(
                    "TypeError",
                    format!("Cannot set property '{}' of an array", name),
                ),
            },
            Value::Undefined | Value::Null => self.throw(
                "TypeError",
                format!(
                    "Cannot set properties of {} (setting '{}')",
                    object.display(),
                    name
                ),
            ),
            _ => self.throw(
                "TypeError",
                format!(
                    "Cannot assign to read only property '{}' of {}",
                    name,
                    object.type_of()
                ),
            ),
        }
    }

    pub(super) fn set_index(&self, object: &Value, key: &Value, value: Value) -> EvalResult<()> {
        self.set_property(object, &property_key(key), value)
    }

    fn set_element(&self, items: &Shared<Vec<Value>>, index: usize, value: Value) -> EvalResult<()> {
        let stored = {
            let mut items = items.lock();
            if index < items.len() {
                items[index] = value;
                true
            } else if index - items.len() <= MAX_ARRAY_GROWTH {
                items.resize(index, Value::Undefined);
                items.push(value);
                true
            } else {
                false
            }
        };
        if stored {
            Ok(())
        } else {
            self.throw("RangeError", "Invalid array length")
        }
    }

    /// Items visited by `for (x of value)`
    pub(super) fn iterate(&self, value: &Value) -> EvalResult<Vec<Value>> {
        match value {
            Value::Array(items) => Ok(items.lock().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Data(data) => {
                let len = match data.resolve() {
                    Some(Json::Array(items)) => Some(items.len()),
                    _ => None,
                };
                match len {
                    Some(len) => Ok((0..len).map(|i| data.child(&i.to_string())).collect()),
                    None => self.throw("TypeError", "object is not iterable"),
                }
            }
            other => self.throw("TypeError", format!("{} is not iterable", other.type_of())),
        }
    }

    // ========================================================================
    // Methods
    // ========================================================================

    /// Whether `this.name(...)` resolves without asking the client
    pub(super) fn has_local_method(&self, this: &Value, name: &str) -> bool {
        match this {
            Value::Str(_) => STRING_METHODS.contains(&name),
            Value::Array(_) => ARRAY_METHODS.contains(&name),
            Value::Number(_) => name == "toFixed",
            Value::Object(_) | Value::Data(_) => {
                is_callable(this.get_field(name))
                    || (VEC3_METHODS.contains(&name) && vec3_of(this).is_some())
            }
            _ => false,
        }
    }

    pub(super) async fn call_method(
        &mut self,
        this: Value,
        name: &str,
        args: Vec<Value>,
        label: &str,
    ) -> EvalResult<Value> {
        match &this {
            Value::Host(HostObject::Bot) => return self.call_bot(name, args).await,
            Value::Host(HostObject::Pathfinder) => return self.call_pathfinder(name, args).await,
            Value::Host(HostObject::Signal) if name == "throwIfAborted" => {
                self.check_cancel()?;
                return Ok(Value::Undefined);
            }
            Value::Str(s) if STRING_METHODS.contains(&name) => {
                return Ok(string_method(s, name, &args))
            }
            Value::Number(n) if name == "toFixed" => return Ok(to_fixed(*n, args.first())),
            Value::Array(items) if ARRAY_METHODS.contains(&name) => {
                return self.array_method(Arc::clone(items), name, args).await
            }
            Value::Object(_) | Value::Data(_)
                if VEC3_METHODS.contains(&name) && !is_callable(this.get_field(name)) =>
            {
                if let Some(v) = vec3_of(&this) {
                    return self.vec3_method(v, name, &args);
                }
            }
            _ => {}
        }

        let function = self.get_property(this, name).await?;
        self.call_value(function, args, label).await
    }

    async fn array_method(
        &mut self,
        items: Shared<Vec<Value>>,
        name: &str,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        let arg0 = args.first().cloned().unwrap_or(Value::Undefined);
        match name {
            "push" => {
                let len = {
                    let mut items = items.lock();
                    items.extend(args);
                    items.len()
                };
                Ok(Value::Number(len as f64))
            }
            "pop" => {
                let last = items.lock().pop();
                Ok(last.unwrap_or(Value::Undefined))
            }
            "includes" => {
                let found = items.lock().iter().any(|v| v.strict_eq(&arg0));
                Ok(Value::Bool(found))
            }
            "indexOf" => {
                let index = items.lock().iter().position(|v| v.strict_eq(&arg0));
                Ok(Value::Number(index.map_or(-1.0, |i| i as f64)))
            }
            "join" => {
                let separator = match &arg0 {
                    Value::Undefined => ",".to_string(),
                    other => other.display(),
                };
                let snapshot = items.lock().clone();
                let joined = snapshot
                    .iter()
                    .map(|v| match v {
                        Value::Undefined | Value::Null => String::new(),
                        other => other.display(),
                    })
                    .collect::<Vec<_>>()
                    .join(&separator);
                Ok(Value::Str(joined))
            }
            "slice" => {
                let snapshot = items.lock().clone();
                let end = args.get(1).cloned().unwrap_or(Value::Undefined);
                let (start, end) = slice_range(snapshot.len(), &arg0, &end);
                Ok(Value::array(snapshot[start..end].to_vec()))
            }
            // map / filter / forEach / find
            _ => {
                let snapshot = items.lock().clone();
                let mut collected = Vec::new();
                for (index, item) in snapshot.into_iter().enumerate() {
                    let result = self
                        .call_value(
                            arg0.clone(),
                            vec![item.clone(), Value::Number(index as f64)],
                            "callback",
                        )
                        .await?;
                    match name {
                        "map" => collected.push(result),
                        "filter" if result.truthy() => collected.push(item),
                        "find" if result.truthy() => return Ok(item),
                        _ => {}
                    }
                }
                Ok(match name {
                    "map" | "filter" => Value::array(collected),
                    _ => Value::Undefined,
                })
            }
        }
    }

    fn vec3_method(&self, v: Vec3, name: &str, args: &[Value]) -> EvalResult<Value> {
        let num = |i: usize| args.get(i).map(Value::to_number).unwrap_or(0.0);
        let result = match name {
            "offset" => v.offset(num(0), num(1), num(2)),
            "floored" => v.floored(),
            "clone" => v,
            _ => {
                let Some(other) = args.first().and_then(vec3_of) else {
                    return self.throw("TypeError", format!("{}() expects a Vec3 argument", name));
                };
                match name {
                    "plus" => v.plus(&other),
                    "minus" => v.minus(&other),
                    _ => return Ok(Value::Number(v.distance_to(&other))),
                }
            }
        };
        Ok(vec3_value(result))
    }

    // ========================================================================
    // Builtin functions
    // ========================================================================

    pub(super) async fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> EvalResult<Value> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
        match builtin {
            Builtin::Sleep => {
                let ms = arg(0).to_number();
                let ms = if ms.is_finite() && ms > 0.0 { ms as u64 } else { 0 };
                self.check_cancel()?;
                tokio::select! {
                    _ = self.cancel.cancelled() => Err(ScriptError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(Value::Undefined),
                }
            }

            Builtin::Math(f) => {
                let x = arg(0).to_number();
                let nan_aware = |pick: fn(f64, f64) -> f64| {
                    move |a: f64, b: f64| {
                        if a.is_nan() || b.is_nan() {
                            f64::NAN
                        } else {
                            pick(a, b)
                        }
                    }
                };
                Ok(Value::Number(match f {
                    MathFn::Floor => x.floor(),
                    MathFn::Ceil => x.ceil(),
                    MathFn::Round => (x + 0.5).floor(),
                    MathFn::Abs => x.abs(),
                    MathFn::Sqrt => x.sqrt(),
                    MathFn::Pow => x.powf(arg(1).to_number()),
                    MathFn::Min => args
                        .iter()
                        .map(Value::to_number)
                        .fold(f64::INFINITY, nan_aware(f64::min)),
                    MathFn::Max => args
                        .iter()
                        .map(Value::to_number)
                        .fold(f64::NEG_INFINITY, nan_aware(f64::max)),
                }))
            }

            Builtin::JsonStringify => {
                let json = match arg(0).to_json() {
                    Ok(Some(json)) => json,
                    Ok(None) => return Ok(Value::Undefined),
                    Err(message) => return self.throw("TypeError", message),
                };
                let indent = arg(2).to_number();
                let text = if indent.is_finite() && indent >= 1.0 {
                    pretty_json(&json, indent.min(10.0) as usize)
                } else {
                    json.to_string()
                };
                Ok(Value::Str(text))
            }

            Builtin::JsonParse => match serde_json::from_str::<Json>(&arg(0).display()) {
                Ok(json) => Ok(Value::from_json(json)),
                Err(e) => self.throw("SyntaxError", format!("Unexpected token in JSON: {}", e)),
            },

            Builtin::Console(level) => {
                let text = args.iter().map(console_text).collect::<Vec<_>>().join(" ");
                match level {
                    LogLevel::Log => info!(target: "script", "{}", text),
                    LogLevel::Warn => warn!(target: "script", "{}", text),
                    LogLevel::Error => error!(target: "script", "{}", text),
                }
                Ok(Value::Undefined)
            }

            Builtin::ErrorCtor => {
                let message = match arg(0) {
                    Value::Undefined => String::new(),
                    other => other.display(),
                };
                Ok(Value::error("Error", message))
            }

            Builtin::StringCtor => Ok(Value::Str(if args.is_empty() {
                String::new()
            } else {
                arg(0).display()
            })),

            Builtin::NumberCtor => Ok(Value::Number(if args.is_empty() {
                0.0
            } else {
                arg(0).to_number()
            })),

            Builtin::Vec3Ctor => Ok(vec3_value(Vec3::new(
                arg(0).to_number(),
                arg(1).to_number(),
                arg(2).to_number(),
            ))),

            Builtin::MovementsCtor => match serde_json::to_value(MovementConfig::default()) {
                Ok(json) => Ok(Value::from_json(json)),
                Err(e) => self.throw("Error", e.to_string()),
            },

            Builtin::Goal(kind) => {
                let mut entries = vec![("kind".to_string(), Value::str(kind))];
                for (i, field) in goal_fields(kind).iter().enumerate() {
                    let value = match *field {
                        "entity" => arg(i),
                        _ => Value::Number(arg(i).to_number()),
                    };
                    entries.push((field.to_string(), value));
                }
                Ok(Value::object(entries))
            }

            Builtin::ObjectKeys | Builtin::ObjectValues | Builtin::ObjectEntries => {
                let Some(entries) = own_entries(&arg(0)) else {
                    return self.throw("TypeError", "Cannot convert undefined or null to object");
                };
                let items = entries
                    .into_iter()
                    .map(|(key, value)| match builtin {
                        Builtin::ObjectKeys => Value::Str(key),
                        Builtin::ObjectValues => value,
                        _ => Value::array(vec![Value::Str(key), value]),
                    })
                    .collect();
                Ok(Value::array(items))
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn array_property(items: &Shared<Vec<Value>>, name: &str) -> Value {
    let items = items.lock();
    match name {
        "length" => Value::Number(items.len() as f64),
        _ => name
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index).cloned())
            .unwrap_or(Value::Undefined),
    }
}

fn is_callable(value: Option<Value>) -> bool {
    matches!(value, Some(Value::Function(_)) | Some(Value::Builtin(_)))
}

/// Positional argument names of each goal constructor
fn goal_fields(kind: &str) -> &'static [&'static str] {
    match kind {
        "GoalFollow" => &["entity", "range"],
        "GoalNear" => &["x", "y", "z", "range"],
        "GoalXZ" => &["x", "z"],
        "GoalY" => &["y"],
        // GoalBlock, GoalGetToBlock
        _ => &["x", "y", "z"],
    }
}

fn vec3_of(value: &Value) -> Option<Vec3> {
    let json = value.to_json().ok()??;
    Vec3::from_value(&json)
}

fn vec3_value(v: Vec3) -> Value {
    Value::object(vec![
        ("x".to_string(), Value::Number(v.x)),
        ("y".to_string(), Value::Number(v.y)),
        ("z".to_string(), Value::Number(v.z)),
    ])
}

fn own_entries(value: &Value) -> Option<Vec<(String, Value)>> {
    match value {
        Value::Undefined | Value::Null => None,
        Value::Object(_) => value.entries(),
        Value::Array(items) => Some(
            items
                .lock()
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
        ),
        Value::Data(data) => {
            let keys: Vec<String> = match data.resolve() {
                Some(Json::Object(map)) => map.keys().cloned().collect(),
                Some(Json::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
                _ => Vec::new(),
            };
            Some(
                keys.into_iter()
                    .map(|key| {
                        let child = data.child(&key);
                        (key, child)
                    })
                    .collect(),
            )
        }
        _ => Some(Vec::new()),
    }
}

/// JavaScript `slice` bounds
fn slice_range(len: usize, start: &Value, end: &Value) -> (usize, usize) {
    let resolve = |v: &Value, default: usize| -> usize {
        if matches!(v, Value::Undefined) {
            return default;
        }
        let n = v.to_number();
        if n.is_nan() {
            return 0;
        }
        let n = n.trunc();
        if n < 0.0 {
            (len as f64 + n).max(0.0) as usize
        } else {
            (n as usize).min(len)
        }
    };
    let start = resolve(start, 0);
    let end = resolve(end, len);
    (start, end.max(start))
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Value {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
    let text = |i: usize| arg(i).display();
    match name {
        "includes" => Value::Bool(s.contains(&text(0))),
        "startsWith" => Value::Bool(s.starts_with(&text(0))),
        "endsWith" => Value::Bool(s.ends_with(&text(0))),
        "indexOf" => Value::Number(match s.find(&text(0)) {
            Some(byte) => s[..byte].chars().count() as f64,
            None => -1.0,
        }),
        "toUpperCase" => Value::Str(s.to_uppercase()),
        "toLowerCase" => Value::Str(s.to_lowercase()),
        "trim" => Value::str(s.trim()),
        "split" => match arg(0) {
            Value::Undefined => Value::array(vec![Value::str(s)]),
            separator => {
                let separator = separator.display();
                if separator.is_empty() {
                    Value::array(s.chars().map(|c| Value::Str(c.to_string())).collect())
                } else {
                    Value::array(s.split(separator.as_str()).map(Value::str).collect())
                }
            }
        },
        "slice" => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_range(chars.len(), &arg(0), &arg(1));
            Value::Str(chars[start..end].iter().collect())
        }
        "replace" => Value::Str(s.replacen(&text(0), &text(1), 1)),
        _ => Value::Undefined,
    }
}

fn to_fixed(n: f64, digits: Option<&Value>) -> Value {
    let digits = digits
        .map(Value::to_number)
        .filter(|d| d.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 100.0) as usize;
    Value::Str(format!("{:.*}", digits, n))
}

fn console_text(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Array(_) | Value::Object(_) | Value::Data(_) => match value.to_json() {
            Ok(Some(json)) => json.to_string(),
            _ => value.display(),
        },
        other => other.display(),
    }
}

fn pretty_json(json: &Json, indent: usize) -> String {
    let indent = " ".repeat(indent);
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    match json.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(out).unwrap_or_else(|_| json.to_string()),
        Err(_) => json.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_range() {
        let n = |v: f64| Value::Number(v);
        assert_eq!(slice_range(5, &n(1.0), &Value::Undefined), (1, 5));
        assert_eq!(slice_range(5, &n(-2.0), &Value::Undefined), (3, 5));
        assert_eq!(slice_range(5, &n(4.0), &n(2.0)), (4, 4));
        assert_eq!(slice_range(5, &n(0.0), &n(99.0)), (0, 5));
    }

    #[test]
    fn test_string_methods() {
        let split = string_method("a,b,c", "split", &[Value::str(",")]);
        assert_eq!(split.display(), "a,b,c");
        assert_eq!(
            string_method("héllo", "indexOf", &[Value::str("l")]).display(),
            "2"
        );
        assert_eq!(
            string_method("diamond_ore", "slice", &[Value::Number(-3.0)]).display(),
            "ore"
        );
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(1.23456, Some(&Value::Number(2.0))).display(), "1.23");
        assert_eq!(to_fixed(2.0, None).display(), "2");
    }

    #[test]
    fn test_goal_fields_cover_every_constructor() {
        for kind in Goal::CONSTRUCTORS {
            assert!(!goal_fields(kind).is_empty());
        }
        assert_eq!(goal_fields("GoalNear"), &["x", "y", "z", "range"]);
    }
}
