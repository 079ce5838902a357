//! Defines an enum of the 3 supported column types and routines for
//! conversion to and from string, mirroring the teacher's `sql_type.rs`.
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The only value types a `Record` attribute can hold.
pub enum Type {
    Int,
    Double,
    String,
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "INT"),
            Type::Double => write!(f, "DOUBLE"),
            Type::String => write!(f, "STRING"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseTypeError;

impl FromStr for Type {
    type Err = ParseTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INT" => Ok(Type::Int),
            "DOUBLE" | "REAL" => Ok(Type::Double),
            "STRING" | "TEXT" => Ok(Type::String),
            _ => Err(ParseTypeError),
        }
    }
}

/// Maximum encoded length of a String value, including the NUL
/// terminator. Bounded so that a single record of all-String attributes
/// is still guaranteed to fit one page alongside the page header.
pub const MAX_STRING_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq)]
/// A typed value, as held in memory before encoding into a `Record` or
/// after decoding out of one.
pub enum Value {
    Int(i32),
    Double(f64),
    String(String),
}

impl Value {
    pub fn type_of(&self) -> Type {
        match self {
            Value::Int(_) => Type::Int,
            Value::Double(_) => Type::Double,
            Value::String(_) => Type::String,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
            Value::String(x) => write!(f, "{}", x),
        }
    }
}

#[test]
fn test_type_roundtrip() {
    for (s, t) in [("INT", Type::Int), ("DOUBLE", Type::Double), ("STRING", Type::String)] {
        assert_eq!(Type::from_str(s).unwrap(), t);
        assert_eq!(Type::from_str(&t.to_string()).unwrap(), t);
    }
}
