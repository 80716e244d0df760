//! Query parameter bindings.

use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::value::Value;

/// Bound parameter values for a query: a positional vector for `?`
/// placeholders and a name map for `:name` placeholders.
#[derive(Debug, Clone, Default)]
pub struct Params {
    positional: Vec<Value>,
    named: HashMap<String, Value>,
}

impl Params {
    /// No parameters.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates positional parameters from values.
    #[must_use]
    pub fn positional<V: Into<Value>>(values: Vec<V>) -> Self {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            named: HashMap::new(),
        }
    }

    /// Adds a named binding.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Appends a positional binding.
    #[must_use]
    pub fn push(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Returns true when no bindings are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// The positional values, in order.
    #[must_use]
    pub fn positional_values(&self) -> &[Value] {
        &self.positional
    }

    /// Resolves a placeholder. Positional placeholders carry a 1-based
    /// position counted over `?` placeholders in lexical order; named
    /// placeholders resolve by name.
    ///
    /// # Errors
    ///
    /// Returns a runtime error for unbound placeholders.
    pub fn resolve(&self, name: Option<&str>, position: usize) -> Result<Value> {
        if let Some(name) = name {
            return self
                .named
                .get(name)
                .cloned()
                .ok_or_else(|| EngineError::runtime(format!("unbound parameter :{name}")));
        }

        self.positional
            .get(position.saturating_sub(1))
            .cloned()
            .ok_or_else(|| {
                EngineError::runtime(format!("unbound parameter ? (position {position})"))
            })
    }
}

impl<V: Into<Value>> From<Vec<V>> for Params {
    fn from(values: Vec<V>) -> Self {
        Self::positional(values)
    }
}
