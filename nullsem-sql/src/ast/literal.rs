use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use test_strategy::Arbitrary;

use crate::ast::SqlType;

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize, Arbitrary)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    /// A fixed-point or floating-point number, kept in its textual form so literals stay `Eq`
    /// and `Hash`
    Number(#[strategy("-?[0-9]{1,6}\\.[0-9]{1,4}")] String),
    String(String),
    Blob(Vec<u8>),
}

impl Literal {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The type a literal has when nothing else about its context is known
    pub fn sql_type(&self) -> SqlType {
        match self {
            Self::Null => SqlType::Unknown,
            Self::Boolean(_) => SqlType::Bool,
            Self::Integer(_) => SqlType::BigInt,
            Self::Number(_) => SqlType::Decimal,
            Self::String(_) => SqlType::Text,
            Self::Blob(_) => SqlType::Binary,
        }
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Literal {
    fn from(i: i32) -> Self {
        Self::Integer(i.into())
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T> From<Option<T>> for Literal
where
    Literal: From<T>,
{
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Self::from)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(true) => write!(f, "TRUE"),
            Self::Boolean(false) => write!(f, "FALSE"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Blob(bytes) => write!(
                f,
                "X'{}'",
                bytes.iter().map(|b| format!("{b:02X}")).join("")
            ),
        }
    }
}
