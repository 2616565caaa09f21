//! Host builtins
//!
//! Contracts call into the host through named builtins. A node assembles an
//! [`Extension`] and hands it to [`Vm::extend`](crate::Vm::extend); the VM
//! merges it into its [`Builtins`] snapshot.
//!
//! | Kind | Called as | Receives |
//! |------|-----------|----------|
//! | `Value` | `Name` | nothing, evaluates to the value |
//! | `Function` | `Name(args)` | the arguments |
//! | `Contextual` | `Name(args)` | the arguments, the extend map and the running contract |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ExtendError, HostError};
use crate::tree::Object;
use crate::value::{ExtendMap, Value};

/// Number of arguments a builtin accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n`
    Exact(usize),
    /// `n` or more
    AtLeast(usize),
}

impl Arity {
    /// Whether `argc` arguments are accepted.
    pub fn accepts(&self, argc: usize) -> bool {
        match self {
            Arity::Exact(n) => argc == *n,
            Arity::AtLeast(n) => argc >= *n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// State visible to a contextual builtin.
pub struct HostContext<'a> {
    /// Extend map of the running transaction
    pub extend: &'a mut ExtendMap,
    /// Contract whose phase is running, if any
    pub contract: Option<&'a Object>,
}

/// Pure host function
pub type HostFn = Arc<dyn Fn(&[Value]) -> Result<Value, HostError> + Send + Sync>;

/// Host function with access to the execution context
pub type ContextualFn =
    Arc<dyn Fn(&mut HostContext<'_>, &[Value]) -> Result<Value, HostError> + Send + Sync>;

/// A registered builtin.
#[derive(Clone)]
pub enum Builtin {
    /// Constant value
    Value(Value),
    /// Function of its arguments only
    Function {
        /// Accepted argument count
        arity: Arity,
        /// Implementation
        func: HostFn,
    },
    /// Function of its arguments and the execution context
    Contextual {
        /// Accepted argument count
        arity: Arity,
        /// Implementation
        func: ContextualFn,
    },
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Builtin::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Builtin::Function { arity, .. } => {
                f.debug_struct("Function").field("arity", arity).finish()
            }
            Builtin::Contextual { arity, .. } => {
                f.debug_struct("Contextual").field("arity", arity).finish()
            }
        }
    }
}

/// A batch of builtins to register.
#[derive(Debug, Clone, Default)]
pub struct Extension {
    entries: Vec<(String, Builtin)>,
}

impl Extension {
    /// Create an empty extension.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constant value.
    pub fn value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((name.into(), Builtin::Value(value.into())));
        self
    }

    /// Add a pure function.
    pub fn function<F>(mut self, name: impl Into<String>, arity: Arity, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.entries.push((
            name.into(),
            Builtin::Function {
                arity,
                func: Arc::new(func),
            },
        ));
        self
    }

    /// Add a contextual function.
    pub fn contextual<F>(mut self, name: impl Into<String>, arity: Arity, func: F) -> Self
    where
        F: Fn(&mut HostContext<'_>, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.entries.push((
            name.into(),
            Builtin::Contextual {
                arity,
                func: Arc::new(func),
            },
        ));
        self
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Builtin)> {
        self.entries
    }
}

/// Immutable snapshot of registered builtins.
#[derive(Debug, Clone, Default)]
pub struct Builtins {
    entries: HashMap<String, Builtin>,
}

impl Builtins {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builtin registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.entries.get(name)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered builtins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of this registry with `extension` merged in.
    ///
    /// Returns the new registry and the names that replaced earlier entries.
    /// Nothing is merged if any name is invalid.
    pub(crate) fn merged(&self, extension: Extension) -> Result<(Builtins, Vec<String>), ExtendError> {
        let entries = extension.into_entries();
        if let Some((name, _)) = entries.iter().find(|(name, _)| !is_identifier(name)) {
            return Err(ExtendError::InvalidName(name.clone()));
        }

        let mut next = self.clone();
        let mut replaced = Vec::new();
        for (name, builtin) in entries {
            if next.entries.insert(name.clone(), builtin).is_some() {
                replaced.push(name);
            }
        }
        Ok((next, replaced))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(3));
        assert!(Arity::AtLeast(1).accepts(5));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert_eq!(Arity::AtLeast(1).to_string(), "at least 1");
    }

    #[test]
    fn test_invalid_names_rejected() {
        for name in ["", "1abc", "a-b", "$x", "a b"] {
            let ext = Extension::new().value(name, 1i64);
            assert!(matches!(
                Builtins::new().merged(ext),
                Err(ExtendError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn test_last_registration_wins() {
        let (first, replaced) = Builtins::new()
            .merged(Extension::new().value("Fee", 1i64))
            .unwrap();
        assert!(replaced.is_empty());

        let (second, replaced) = first
            .merged(Extension::new().value("Fee", 2i64))
            .unwrap();
        assert_eq!(replaced, vec!["Fee".to_string()]);
        assert!(matches!(second.get("Fee"), Some(Builtin::Value(Value::Int(2)))));
        // the earlier snapshot is untouched
        assert!(matches!(first.get("Fee"), Some(Builtin::Value(Value::Int(1)))));
    }
}
