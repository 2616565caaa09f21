//! Runtime values and declared value types.

use std::collections::HashMap;
use std::fmt;

/// Transaction-scoped key/value map shared by a contract's phases.
///
/// Contracts read it as `$name` and write it as `$name = expr`.
pub type ExtendMap = HashMap<String, Value>;

/// A value manipulated by contract code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    Nil,
    /// Boolean
    Bool(bool),
    /// Signed 64-bit integer
    Int(i64),
    /// UTF-8 string
    Str(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl Value {
    /// Name of the value's type, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
        }
    }

    /// Returns `true` for [`Value::Nil`].
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// The integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The byte payload, if any.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "{}", hex::encode(b)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// Declared type of a variable, parameter or function result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// `int` / `int64`
    Int,
    /// `string`
    Str,
    /// `bytes`
    Bytes,
    /// `bool`
    Bool,
}

impl ValueType {
    /// Parse a type name as written in contract source.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" | "int64" => Some(ValueType::Int),
            "string" => Some(ValueType::Str),
            "bytes" => Some(ValueType::Bytes),
            "bool" => Some(ValueType::Bool),
            _ => None,
        }
    }

    /// Initial value of a freshly declared variable.
    pub fn zero(&self) -> Value {
        match self {
            ValueType::Int => Value::Int(0),
            ValueType::Str => Value::Str(String::new()),
            ValueType::Bytes => Value::Bytes(Vec::new()),
            ValueType::Bool => Value::Bool(false),
        }
    }

    /// Whether `value` is of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ValueType::Int, Value::Int(_))
                | (ValueType::Str, Value::Str(_))
                | (ValueType::Bytes, Value::Bytes(_))
                | (ValueType::Bool, Value::Bool(_))
        )
    }

    /// Type name as written in contract source.
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Str => "string",
            ValueType::Bytes => "bytes",
            ValueType::Bool => "bool",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::Bytes(vec![0xab, 0xcd]).to_string(), "abcd");
        assert_eq!(Value::Nil.to_string(), "nil");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(ValueType::from_name("int64"), Some(ValueType::Int));
        assert_eq!(ValueType::from_name("float"), None);
        assert!(ValueType::Str.accepts(&Value::from("x")));
        assert!(!ValueType::Str.accepts(&Value::Int(1)));
        assert_eq!(ValueType::Bytes.zero(), Value::Bytes(Vec::new()));
    }
}
