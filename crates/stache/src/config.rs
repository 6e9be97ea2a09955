//! Engine configuration

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::dispatch::{DefaultObjectHandler, ObjectHandler};
use crate::executor::Executor;

/// Handles a `{{%NAME args}}` pragma.
///
/// Receives the text after the pragma name and may return literal text to
/// splice into the template at that point.
pub type PragmaHandler = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Default bound on nested partial inclusion.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// Configuration for compiling and rendering.
///
/// # Example
///
/// ```
/// use stache::Options;
///
/// let options = Options::new().with_strict(true).with_recursion_limit(10);
/// assert!(options.strict);
/// assert_eq!(options.recursion_limit, 10);
/// ```
#[derive(Clone)]
pub struct Options {
    /// Object resolution policy
    pub handler: Arc<dyn ObjectHandler>,

    /// Executor for deferred values; `None` resolves them inline
    pub executor: Option<Arc<dyn Executor>>,

    /// Log missing names and reject unmatched replacement blocks
    pub strict: bool,

    /// Fail the render when a value or section name resolves in no scope
    pub fail_on_miss: bool,

    /// Maximum partial nesting depth
    pub recursion_limit: usize,

    /// Maximum number of compiled templates kept in the cache
    pub cache_limit: Option<usize>,

    /// Registered pragma handlers, by pragma name
    pub pragmas: HashMap<String, PragmaHandler>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            handler: Arc::new(DefaultObjectHandler::new()),
            executor: None,
            strict: false,
            fail_on_miss: false,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            cache_limit: None,
            pragmas: HashMap::new(),
        }
    }
}

impl Options {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom object handler.
    pub fn with_handler(mut self, handler: impl ObjectHandler + 'static) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    /// Render deferred values on `executor`.
    pub fn with_executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Enable or disable strict diagnostics.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Turn missing names into [`RenderError::Missing`](crate::RenderError::Missing).
    pub fn with_fail_on_miss(mut self, fail_on_miss: bool) -> Self {
        self.fail_on_miss = fail_on_miss;
        self
    }

    /// Set the partial nesting limit.
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Bound the compiled template cache.
    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = Some(limit);
        self
    }

    /// Register a pragma handler.
    pub fn with_pragma(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.pragmas.insert(name.into(), Arc::new(handler));
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pragmas: Vec<&String> = self.pragmas.keys().collect();
        pragmas.sort();
        f.debug_struct("Options")
            .field("executor", &self.executor.is_some())
            .field("strict", &self.strict)
            .field("fail_on_miss", &self.fail_on_miss)
            .field("recursion_limit", &self.recursion_limit)
            .field("cache_limit", &self.cache_limit)
            .field("pragmas", &pragmas)
            .finish()
    }
}
