//! Per-tag compile context and per-render execution context

use std::fmt;
use std::sync::Arc;

use crate::dispatch::ObjectHandler;
use crate::engine::Engine;
use crate::error::{RenderError, Result};
use crate::executor::Executor;

/// The pair of delimiters that open and close a tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Delimiters {
    /// Opening delimiter, `{{` by default
    pub start: Arc<str>,

    /// Closing delimiter, `}}` by default
    pub end: Arc<str>,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

impl Delimiters {
    /// Create a delimiter pair
    pub fn new(start: impl Into<Arc<str>>, end: impl Into<Arc<str>>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Whether these are the standard `{{` `}}` delimiters
    pub fn is_default(&self) -> bool {
        &*self.start == "{{" && &*self.end == "}}"
    }

    /// Whether both delimiters are usable: non-empty, without whitespace or `=`
    pub fn is_valid(&self) -> bool {
        let usable = |d: &str| !d.is_empty() && !d.contains(|c: char| c.is_whitespace() || c == '=');
        usable(&self.start) && usable(&self.end)
    }
}

impl fmt::Display for Delimiters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.start, self.end)
    }
}

/// Where a tag came from and how it was written.
///
/// Created once per tag by the parser and read-only afterwards. Identity
/// output and diagnostics both come from here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateContext {
    /// Delimiters active when the tag was parsed
    pub delimiters: Delimiters,

    /// Logical name of the template the tag is in
    pub file: Arc<str>,

    /// 1-based line of the opening delimiter
    pub line: usize,

    /// Whether only whitespace precedes the tag on its line
    pub start_of_line: bool,
}

impl Default for TemplateContext {
    fn default() -> Self {
        Self {
            delimiters: Delimiters::default(),
            file: Arc::from(""),
            line: 1,
            start_of_line: false,
        }
    }
}

impl TemplateContext {
    /// Create a context for a tag
    pub fn new(delimiters: Delimiters, file: impl Into<Arc<str>>, line: usize, start_of_line: bool) -> Self {
        Self {
            delimiters,
            file: file.into(),
            line,
            start_of_line,
        }
    }
}

/// State carried through one render.
///
/// Cheap to clone: deferred work takes its own copy to the executor.
#[derive(Clone)]
pub struct RenderContext {
    engine: Engine,
    depth: usize,
    inline: bool,
}

impl RenderContext {
    /// Create a context for a top-level render
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            depth: 0,
            inline: false,
        }
    }

    /// A copy of this context that resolves deferred values on the calling
    /// thread.
    ///
    /// Used where the caller blocks on the output anyway. Submitting from
    /// inside an executor job and then waiting would hold a worker that the
    /// submitted work may need.
    pub fn inline(&self) -> RenderContext {
        Self {
            engine: self.engine.clone(),
            depth: self.depth,
            inline: true,
        }
    }

    /// The engine that compiled the template being rendered
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Current partial nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The active object handler
    pub fn handler(&self) -> &dyn ObjectHandler {
        self.engine.options().handler.as_ref()
    }

    /// Whether strict diagnostics are enabled
    pub fn strict(&self) -> bool {
        self.engine.options().strict
    }

    /// Whether a name found in no scope fails the render
    pub fn fail_on_miss(&self) -> bool {
        self.engine.options().fail_on_miss
    }

    /// The executor for deferred values, if one is configured and this
    /// context is not [inline](Self::inline)
    pub fn executor(&self) -> Option<&Arc<dyn Executor>> {
        if self.inline {
            return None;
        }
        self.engine.options().executor.as_ref()
    }

    /// Enter a partial or extend, failing once the recursion limit is hit.
    pub fn enter_partial(&self, name: &str, tc: &TemplateContext) -> Result<RenderContext> {
        let limit = self.engine.options().recursion_limit;
        if self.depth >= limit {
            return Err(RenderError::RecursionLimit {
                name: name.to_string(),
                limit,
                file: tc.file.to_string(),
                line: tc.line,
            }
            .into());
        }
        Ok(Self {
            engine: self.engine.clone(),
            depth: self.depth + 1,
            inline: self.inline,
        })
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("depth", &self.depth)
            .field("inline", &self.inline)
            .finish()
    }
}
