//! Runtime values bound to the parameters of a query.
//!
//! Only the nullability rewriter ever looks at these; anything built by the expression factory
//! depends on parameters only through their presence.

use std::collections::{BTreeMap, HashMap};

use nullsem_sql::ast::Literal;
use serde::{Deserialize, Serialize};

/// The value bound to a single parameter
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterValue {
    Scalar(Literal),
    /// A list of values, as bound to the right-hand side of an `IN`
    List(Vec<Literal>),
}

impl ParameterValue {
    /// Returns true for a null scalar. A list is never null, even if it contains nulls.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Literal::Null))
    }

    /// The nullness of each element: one entry for a scalar, one per element for a list
    pub fn null_pattern(&self) -> Vec<bool> {
        match self {
            Self::Scalar(value) => vec![value.is_null()],
            Self::List(values) => values.iter().map(Literal::is_null).collect(),
        }
    }
}

impl From<Literal> for ParameterValue {
    fn from(value: Literal) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<Literal>> for ParameterValue {
    fn from(values: Vec<Literal>) -> Self {
        Self::List(values)
    }
}

/// Parameter values, keyed by parameter name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValues(HashMap<String, ParameterValue>);

impl ParameterValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K, V>(&mut self, name: K, value: V) -> Option<ParameterValue>
    where
        K: Into<String>,
        V: Into<ParameterValue>,
    {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Which parameters (and list elements) are null, ordered by parameter name.
    ///
    /// Two sets of scalar values with the same null pattern rewrite a query to trees of the same
    /// shape. A list parameter under `IN` is inlined, so its values end up in the tree.
    pub fn null_pattern(&self) -> BTreeMap<&str, Vec<bool>> {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.null_pattern()))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterValues
where
    K: Into<String>,
    V: Into<ParameterValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
