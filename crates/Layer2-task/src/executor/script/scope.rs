//! Lexical scopes
//!
//! Each scope is locked only for the duration of a single lookup or write.
//! Walking the chain clones the parent pointer and releases the lock first.

use super::value::Value;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub type ScopeRef = Arc<Mutex<Scope>>;

struct Binding {
    value: Value,
    constant: bool,
}

pub struct Scope {
    vars: HashMap<String, Binding>,
    parent: Option<ScopeRef>,
    /// `var` declarations land in the nearest function scope
    function: bool,
}

impl Scope {
    pub fn root() -> ScopeRef {
        Arc::new(Mutex::new(Scope {
            vars: HashMap::new(),
            parent: None,
            function: true,
        }))
    }

    /// Root scope holding constant bindings
    pub fn globals(entries: impl IntoIterator<Item = (&'static str, Value)>) -> ScopeRef {
        let vars = entries
            .into_iter()
            .map(|(name, value)| {
                let binding = Binding {
                    value,
                    constant: true,
                };
                (name.to_string(), binding)
            })
            .collect();
        Arc::new(Mutex::new(Scope {
            vars,
            parent: None,
            function: true,
        }))
    }

    pub fn block(parent: &ScopeRef) -> ScopeRef {
        Self::child(parent, false)
    }

    pub fn function(parent: &ScopeRef) -> ScopeRef {
        Self::child(parent, true)
    }

    fn child(parent: &ScopeRef, function: bool) -> ScopeRef {
        Arc::new(Mutex::new(Scope {
            vars: HashMap::new(),
            parent: Some(Arc::clone(parent)),
            function,
        }))
    }
}

/// `let` / `const` / function declaration in this exact scope
pub fn declare(scope: &ScopeRef, name: &str, value: Value, constant: bool) -> Result<(), String> {
    let mut guard = scope.lock();
    if guard.vars.get(name).is_some_and(|b| b.constant) {
        return Err(format!("Identifier '{}' has already been declared", name));
    }
    guard
        .vars
        .insert(name.to_string(), Binding { value, constant });
    Ok(())
}

/// `var` declaration: hoisted to the enclosing function scope
pub fn declare_var(scope: &ScopeRef, name: &str, value: Value) -> Result<(), String> {
    let mut current = Arc::clone(scope);
    loop {
        let parent = {
            let guard = current.lock();
            if guard.function {
                None
            } else {
                guard.parent.clone()
            }
        };
        match parent {
            Some(parent) => current = parent,
            None => return declare(&current, name, value, false),
        }
    }
}

pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
    let mut current = Arc::clone(scope);
    loop {
        let parent = {
            let guard = current.lock();
            if let Some(binding) = guard.vars.get(name) {
                return Some(binding.value.clone());
            }
            guard.parent.clone()
        };
        current = parent?;
    }
}

/// Assign to the nearest binding; undeclared names become globals
pub fn assign(scope: &ScopeRef, name: &str, value: Value) -> Result<(), String> {
    let mut current = Arc::clone(scope);
    loop {
        let parent = {
            let mut guard = current.lock();
            if let Some(binding) = guard.vars.get_mut(name) {
                if binding.constant {
                    return Err("Assignment to constant variable.".to_string());
                }
                binding.value = value;
                return Ok(());
            }
            guard.parent.clone()
        };
        match parent {
            Some(parent) => current = parent,
            None => return declare(&current, name, value, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(scope: &ScopeRef, name: &str) -> Option<f64> {
        lookup(scope, name).map(|v| v.to_number())
    }

    #[test]
    fn test_shadowing_and_lookup() {
        let root = Scope::root();
        declare(&root, "x", Value::Number(1.0), false).unwrap();
        let inner = Scope::block(&root);
        declare(&inner, "x", Value::Number(2.0), false).unwrap();

        assert_eq!(number(&inner, "x"), Some(2.0));
        assert_eq!(number(&root, "x"), Some(1.0));
        assert!(lookup(&inner, "missing").is_none());
    }

    #[test]
    fn test_const_cannot_be_reassigned() {
        let root = Scope::root();
        declare(&root, "c", Value::Number(1.0), true).unwrap();
        let err = assign(&root, "c", Value::Number(2.0)).unwrap_err();
        assert_eq!(err, "Assignment to constant variable.");
        assert!(declare(&root, "c", Value::Null, false).is_err());
    }

    #[test]
    fn test_var_hoists_to_function_scope() {
        let root = Scope::root();
        let func = Scope::function(&root);
        let block = Scope::block(&func);
        declare_var(&block, "i", Value::Number(3.0)).unwrap();

        assert_eq!(number(&func, "i"), Some(3.0));
        assert!(lookup(&root, "i").is_none());
    }

    #[test]
    fn test_undeclared_assignment_creates_global() {
        let root = Scope::root();
        let block = Scope::block(&Scope::function(&root));
        assign(&block, "g", Value::Bool(true)).unwrap();
        assert!(lookup(&root, "g").is_some());
    }
}
