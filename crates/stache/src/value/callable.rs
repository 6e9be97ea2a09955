//! Callable value types: lambdas and deferred computations

use std::fmt;
use std::sync::Arc;

use super::Value;

/// Type alias for lambda function pointers
pub type LambdaFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Type alias for deferred computations
pub type DeferredFn = Arc<dyn Fn() -> Result<Value, String> + Send + Sync>;

/// How a lambda's output is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LambdaKind {
    /// Receives the rendered section body; output is emitted verbatim
    Text,

    /// Receives the raw section source; output is compiled and rendered
    Template,
}

/// A text transform bound into the data.
///
/// As a section, a [`LambdaKind::Text`] lambda receives the body rendered
/// against the current scopes, while a [`LambdaKind::Template`] lambda
/// receives the unrendered body and returns template source that is compiled
/// with the section's delimiters. As a value, the lambda receives an empty
/// string.
#[derive(Clone)]
pub struct Lambda {
    /// How the output is treated
    pub kind: LambdaKind,

    /// The transform
    pub func: LambdaFn,
}

impl Lambda {
    /// Create a lambda whose output is emitted verbatim
    pub fn text(func: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            kind: LambdaKind::Text,
            func: Arc::new(func),
        }
    }

    /// Create a lambda whose output is compiled as a template
    pub fn template(func: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            kind: LambdaKind::Template,
            func: Arc::new(func),
        }
    }

    /// Apply the transform
    pub fn apply(&self, input: &str) -> String {
        (self.func)(input)
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lambda({:?})", self.kind)
    }
}

/// A value computed on demand, possibly on another thread.
///
/// The computation runs once per render that reaches it. With an executor
/// configured the work is submitted to the executor and its output is
/// spliced into the stream at the position of the tag; otherwise it runs
/// inline.
#[derive(Clone)]
pub struct Deferred {
    func: DeferredFn,
}

impl Deferred {
    /// Create a deferred computation
    pub fn new(func: impl Fn() -> Result<Value, String> + Send + Sync + 'static) -> Self {
        Self {
            func: Arc::new(func),
        }
    }

    /// A deferred computation that immediately yields `value`
    pub fn ready(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::new(move || Ok(value.clone()))
    }

    /// Run the computation
    pub fn resolve(&self) -> Result<Value, String> {
        (self.func)()
    }

    pub(crate) fn ptr_eq(&self, other: &Deferred) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deferred")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lambda_apply() {
        let upper = Lambda::text(|s| s.to_uppercase());
        assert_eq!(upper.kind, LambdaKind::Text);
        assert_eq!(upper.apply("hi"), "HI");
    }

    #[test]
    fn test_deferred_ready() {
        let deferred = Deferred::ready("done");
        assert_eq!(deferred.resolve(), Ok(Value::from("done")));
        // Each resolve runs the computation again
        assert_eq!(deferred.resolve(), Ok(Value::from("done")));
    }

    #[test]
    fn test_deferred_failure() {
        let deferred = Deferred::new(|| Err("boom".to_string()));
        assert_eq!(deferred.resolve(), Err("boom".to_string()));
    }
}
