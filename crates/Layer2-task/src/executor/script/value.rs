//! Script values
//!
//! Arrays and objects are shared references (like in JavaScript), guarded by
//! a `parking_lot` mutex that is never held across an await point.

use super::ast::FunctionDecl;
use super::scope::ScopeRef;
use mcbot_core::session::GameData;
use parking_lot::Mutex;
use serde_json::Value as Json;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

/// Nesting limit for JSON conversion (guards against cycles)
const MAX_JSON_DEPTH: usize = 64;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Shared<Vec<Value>>),
    /// Insertion-ordered properties
    Object(Shared<Vec<(String, Value)>>),
    /// Read-only view into the static game data
    Data(DataRef),
    Function(Arc<Closure>),
    Builtin(Builtin),
    Host(HostObject),
}

/// Capability objects provided by the sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostObject {
    Bot,
    Pathfinder,
    Goals,
    Math,
    Json,
    Console,
    Signal,
    /// `Object.keys/values/entries`
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFn {
    Floor,
    Ceil,
    Round,
    Abs,
    Min,
    Max,
    Sqrt,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Log,
    Warn,
    Error,
}

/// Native callables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Sleep,
    Math(MathFn),
    JsonStringify,
    JsonParse,
    Console(LogLevel),
    ErrorCtor,
    StringCtor,
    NumberCtor,
    Vec3Ctor,
    MovementsCtor,
    Goal(&'static str),
    ObjectKeys,
    ObjectValues,
    ObjectEntries,
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Sleep => "sleep",
            Builtin::Math(f) => match f {
                MathFn::Floor => "floor",
                MathFn::Ceil => "ceil",
                MathFn::Round => "round",
                MathFn::Abs => "abs",
                MathFn::Min => "min",
                MathFn::Max => "max",
                MathFn::Sqrt => "sqrt",
                MathFn::Pow => "pow",
            },
            Builtin::JsonStringify => "stringify",
            Builtin::JsonParse => "parse",
            Builtin::Console(_) => "log",
            Builtin::ErrorCtor => "Error",
            Builtin::StringCtor => "String",
            Builtin::NumberCtor => "Number",
            Builtin::Vec3Ctor => "Vec3",
            Builtin::MovementsCtor => "Movements",
            Builtin::Goal(name) => name,
            Builtin::ObjectKeys => "keys",
            Builtin::ObjectValues => "values",
            Builtin::ObjectEntries => "entries",
        }
    }
}

/// User-defined function with its captured scope
pub struct Closure {
    pub decl: Arc<FunctionDecl>,
    pub env: ScopeRef,
}

/// JSON-pointer view into [`GameData`]
#[derive(Clone)]
pub struct DataRef {
    pub root: Arc<GameData>,
    pub pointer: String,
}

impl DataRef {
    pub fn root(root: Arc<GameData>) -> Self {
        Self {
            root,
            pointer: String::new(),
        }
    }

    pub fn resolve(&self) -> Option<&Json> {
        self.root.data.pointer(&self.pointer)
    }

    /// Child value: nested containers stay views, scalars are copied out
    pub fn child(&self, key: &str) -> Value {
        let escaped = key.replace('~', "~0").replace('/', "~1");
        let child = DataRef {
            root: Arc::clone(&self.root),
            pointer: format!("{}/{}", self.pointer, escaped),
        };
        match child.resolve() {
            Some(Json::Object(_)) | Some(Json::Array(_)) => Value::Data(child),
            Some(scalar) => Value::from_json(scalar.clone()),
            None => Value::Undefined,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            other => f.write_str(&other.display()),
        }
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(Mutex::new(items)))
    }

    pub fn object(entries: Vec<(String, Value)>) -> Self {
        Value::Object(Arc::new(Mutex::new(entries)))
    }

    /// `new Error(message)`
    pub fn error(name: &str, message: impl Into<String>) -> Self {
        Value::object(vec![
            ("name".to_string(), Value::str(name)),
            ("message".to_string(), Value::str(message)),
        ])
    }

    // ========================================================================
    // Conversions
    // ========================================================================

    pub fn from_json(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::array(items.into_iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// JSON form; `None` for values JSON cannot represent (undefined, functions)
    pub fn to_json(&self) -> Result<Option<Json>, String> {
        self.to_json_at(0)
    }

    fn to_json_at(&self, depth: usize) -> Result<Option<Json>, String> {
        if depth > MAX_JSON_DEPTH {
            return Err("Converting circular structure to JSON".to_string());
        }

        Ok(Some(match self {
            Value::Undefined | Value::Function(_) | Value::Builtin(_) | Value::Host(_) => {
                return Ok(None)
            }
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => json_number(*n),
            Value::Str(s) => Json::String(s.clone()),
            Value::Array(items) => {
                let items = items.lock().clone();
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    out.push(item.to_json_at(depth + 1)?.unwrap_or(Json::Null));
                }
                Json::Array(out)
            }
            Value::Object(entries) => {
                let entries = entries.lock().clone();
                let mut map = serde_json::Map::new();
                for (key, value) in &entries {
                    if let Some(json) = value.to_json_at(depth + 1)? {
                        map.insert(key.clone(), json);
                    }
                }
                Json::Object(map)
            }
            Value::Data(data) => data.resolve().cloned().unwrap_or(Json::Null),
        }))
    }

    /// Property list of a plain object, for typed host conversions
    pub fn entries(&self) -> Option<Vec<(String, Value)>> {
        match self {
            Value::Object(entries) => Some(entries.lock().clone()),
            _ => None,
        }
    }

    pub fn get_field(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(entries) => entries
                .lock()
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            Value::Data(data) => Some(data.child(key)),
            _ => None,
        }
    }

    pub fn set_field(&self, key: &str, value: Value) -> bool {
        match self {
            Value::Object(entries) => {
                let mut entries = entries.lock();
                match entries.iter_mut().find(|(k, _)| k == key) {
                    Some(slot) => slot.1 = value,
                    None => entries.push((key.to_string(), value)),
                }
                true
            }
            _ => false,
        }
    }

    // ========================================================================
    // Semantics
    // ========================================================================

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Builtin(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Data(_) | Value::Host(_) => {
                "object"
            }
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => {
                let t = s.trim();
                if t.is_empty() {
                    0.0
                } else {
                    t.parse().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    /// `===`
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Data(a), Value::Data(b)) => {
                Arc::ptr_eq(&a.root, &b.root) && a.pointer == b.pointer
            }
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Host(a), Value::Host(b)) => a == b,
            _ => false,
        }
    }

    /// `String(value)`
    pub fn display(&self) -> String {
        self.display_with(&mut Vec::new())
    }

    /// `seen` holds the arrays being joined; a cycle joins as empty
    fn display_with(&self, seen: &mut Vec<*const Mutex<Vec<Value>>>) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Array(items) => {
                let id = Arc::as_ptr(items);
                if seen.contains(&id) || seen.len() >= MAX_JSON_DEPTH {
                    return String::new();
                }
                seen.push(id);
                let items = items.lock().clone();
                let joined = items
                    .iter()
                    .map(|v| match v {
                        Value::Undefined | Value::Null => String::new(),
                        other => other.display_with(seen),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                seen.pop();
                joined
            }
            Value::Object(_) => match self.error_parts() {
                Some((name, message)) if message.is_empty() => name,
                Some((name, message)) => format!("{}: {}", name, message),
                None => "[object Object]".to_string(),
            },
            Value::Data(data) => match data.resolve() {
                Some(Json::Array(_)) => "[object Array]".to_string(),
                _ => "[object Object]".to_string(),
            },
            Value::Function(f) => format!("[Function: {}]", f.decl.display_name()),
            Value::Builtin(b) => format!("[Function: {}]", b.name()),
            Value::Host(h) => format!("[object {:?}]", h),
        }
    }

    /// `(name, message)` of an Error-shaped object
    fn error_parts(&self) -> Option<(String, String)> {
        let name = match self.get_field("name")? {
            Value::Str(s) if s.ends_with("Error") => s,
            _ => return None,
        };
        let message = match self.get_field("message") {
            Some(Value::Str(s)) => s,
            Some(other) => other.display(),
            None => String::new(),
        };
        Some((name, message))
    }

    /// Message reported when this value escapes the script uncaught
    pub fn error_message(&self) -> String {
        match self.error_parts() {
            Some((name, message)) if name == "Error" => message,
            Some((name, message)) => format!("{}: {}", name, message),
            None => format!("Uncaught {}", self.display()),
        }
    }
}

/// JavaScript-style number formatting
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        // 1e21 -> "1e+21", 1.5e-7 -> "1.5e-7"
        let exp = format!("{:e}", n);
        match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => {
                format!("{}e+{}", mantissa, power)
            }
            _ => exp,
        }
    } else {
        n.to_string()
    }
}

/// Integral values serialize without a fraction
pub fn json_number(n: f64) -> Json {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Json::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Json::Number)
            .unwrap_or(Json::Null)
    }
}

/// Result string returned to the caller
///
/// undefined → `undefined`, null → `null`, containers → pretty JSON (2-space
/// indent, plain string form when JSON fails), everything else → `String()`.
pub fn serialize_result(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) | Value::Data(_) => match value.to_json() {
            Ok(Some(json)) => {
                serde_json::to_string_pretty(&json).unwrap_or_else(|_| value.display())
            }
            _ => value.display(),
        },
        other => other.display(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_format() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn test_number_format_switches_to_exponent() {
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(-2.5e30), "-2.5e+30");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(serialize_result(&Value::Number(1e21)), "1e+21");
    }

    #[test]
    fn test_serialize_result() {
        assert_eq!(serialize_result(&Value::Undefined), "undefined");
        assert_eq!(serialize_result(&Value::Null), "null");
        assert_eq!(serialize_result(&Value::Number(2.0)), "2");
        assert_eq!(serialize_result(&Value::str("done")), "done");

        let obj = Value::from_json(json!({"x": 1, "y": [true]}));
        assert_eq!(
            serialize_result(&obj),
            "{\n  \"x\": 1,\n  \"y\": [\n    true\n  ]\n}"
        );
    }

    #[test]
    fn test_cycle_falls_back_to_plain_string() {
        let obj = Value::object(vec![]);
        obj.set_field("self", obj.clone());
        assert_eq!(serialize_result(&obj), "[object Object]");

        let list = Value::array(vec![Value::Number(1.0)]);
        if let Value::Array(items) = &list {
            items.lock().push(list.clone());
        }
        assert_eq!(list.display(), "1,");
        assert_eq!(serialize_result(&list), "1,");
    }

    #[test]
    fn test_truthiness_and_equality() {
        assert!(!Value::str("").truthy());
        assert!(Value::array(vec![]).truthy());
        assert!(!Value::Number(f64::NAN).strict_eq(&Value::Number(f64::NAN)));
        assert!(!Value::Number(1.0).strict_eq(&Value::str("1")));

        let a = Value::array(vec![]);
        assert!(a.strict_eq(&a.clone()));
        assert!(!a.strict_eq(&Value::array(vec![])));
    }

    #[test]
    fn test_error_values() {
        let err = Value::error("TypeError", "x is not a function");
        assert_eq!(err.display(), "TypeError: x is not a function");
        assert_eq!(err.error_message(), "TypeError: x is not a function");
        assert_eq!(Value::error("Error", "boom").error_message(), "boom");
        assert_eq!(Value::str("oops").error_message(), "Uncaught oops");
    }

    #[test]
    fn test_data_view() {
        let data = Arc::new(GameData {
            version: "1.20.4".into(),
            data: json!({"itemsByName": {"diamond": {"id": 802}}}),
        });
        let root = Value::Data(DataRef::root(data));
        let id = root
            .get_field("itemsByName")
            .and_then(|items| items.get_field("diamond"))
            .and_then(|d| d.get_field("id"))
            .unwrap();
        assert!(id.strict_eq(&Value::Number(802.0)));
    }
}
