//! The scope stack names are resolved against

mod frame;

pub use frame::ScopeFrame;

use crate::value::Value;

/// An ordered stack of data objects searched right to left.
///
/// The most recently pushed value is consulted first, so nested scopes shadow
/// outer ones. Sections push each iterated element; partials push the value
/// their name resolves to. A stack belongs to one render and is cloned, not
/// shared, when work moves to another thread.
///
/// # Example
///
/// ```
/// use stache::{Scopes, Value};
///
/// let mut scopes = Scopes::from(Value::map([("name", "outer")]));
/// {
///     let frame = scopes.frame(Value::map([("name", "inner")]));
///     assert_eq!(frame.len(), 2);
/// }
/// assert_eq!(scopes.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Scopes {
    values: Vec<Value>,
}

impl Scopes {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new innermost scope
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Pop the innermost scope
    pub fn pop(&mut self) -> Option<Value> {
        self.values.pop()
    }

    /// The innermost scope
    pub fn top(&self) -> Option<&Value> {
        self.values.last()
    }

    /// The scope at `index`, counted from the outermost
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Number of scopes on the stack
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the stack is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate from the outermost scope to the innermost
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }
}

impl From<Value> for Scopes {
    fn from(value: Value) -> Self {
        Self {
            values: vec![value],
        }
    }
}

impl From<Vec<Value>> for Scopes {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<Value> for Scopes {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
