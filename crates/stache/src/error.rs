//! Error types for template compilation, loading and rendering

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Structural errors found while compiling template source.
///
/// Every variant carries the logical file name and the 1-based line and
/// column of the offending tag. A failed compile never yields a partial tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A tag was opened but its closing delimiter never appears
    #[error("{file}:{line}:{column}: unterminated tag, expected `{expected}`")]
    UnterminatedTag {
        /// Logical template name
        file: String,
        /// Line of the opening delimiter
        line: usize,
        /// Column of the opening delimiter
        column: usize,
        /// The closing delimiter that was expected
        expected: String,
    },

    /// A section reached end of input without its close tag
    #[error("{file}:{line}:{column}: section `{name}` is never closed")]
    UnclosedSection {
        /// Logical template name
        file: String,
        /// Line of the open tag
        line: usize,
        /// Column of the open tag
        column: usize,
        /// The section name
        name: String,
    },

    /// A close tag names a different section than the one that is open
    #[error("{file}:{line}:{column}: `{found}` does not close section `{expected}`")]
    MismatchedSection {
        /// Logical template name
        file: String,
        /// Line of the close tag
        line: usize,
        /// Column of the close tag
        column: usize,
        /// Name of the open section
        expected: String,
        /// Name found on the close tag
        found: String,
    },

    /// A close tag appeared with no section open
    #[error("{file}:{line}:{column}: unexpected close tag `{name}`")]
    UnexpectedClose {
        /// Logical template name
        file: String,
        /// Line of the close tag
        line: usize,
        /// Column of the close tag
        column: usize,
        /// Name found on the close tag
        name: String,
    },

    /// A `{{{name}}}` variable is missing its extra closing brace
    #[error("{file}:{line}:{column}: improperly closed variable")]
    ImproperlyClosedVariable {
        /// Logical template name
        file: String,
        /// Line of the tag
        line: usize,
        /// Column of the tag
        column: usize,
    },

    /// A `{{=start end=}}` directive could not be parsed
    #[error("{file}:{line}:{column}: invalid delimiter directive `{directive}`")]
    InvalidDelimiters {
        /// Logical template name
        file: String,
        /// Line of the tag
        line: usize,
        /// Column of the tag
        column: usize,
        /// The directive body as written
        directive: String,
    },

    /// A tag with no name
    #[error("{file}:{line}:{column}: empty tag")]
    EmptyTag {
        /// Logical template name
        file: String,
        /// Line of the tag
        line: usize,
        /// Column of the tag
        column: usize,
    },

    /// An extend body contains something other than blocks and text
    #[error("{file}:{line}:{column}: extend `{name}` may only contain replacement blocks and text")]
    IllegalExtendContent {
        /// Logical template name
        file: String,
        /// Line of the offending node
        line: usize,
        /// Column of the extend tag
        column: usize,
        /// Name of the extended template
        name: String,
    },
}

impl CompileError {
    /// The line the error was reported on.
    pub fn line(&self) -> usize {
        match self {
            CompileError::UnterminatedTag { line, .. }
            | CompileError::UnclosedSection { line, .. }
            | CompileError::MismatchedSection { line, .. }
            | CompileError::UnexpectedClose { line, .. }
            | CompileError::ImproperlyClosedVariable { line, .. }
            | CompileError::InvalidDelimiters { line, .. }
            | CompileError::EmptyTag { line, .. }
            | CompileError::IllegalExtendContent { line, .. } => *line,
        }
    }

    /// The logical file the error was reported in.
    pub fn file(&self) -> &str {
        match self {
            CompileError::UnterminatedTag { file, .. }
            | CompileError::UnclosedSection { file, .. }
            | CompileError::MismatchedSection { file, .. }
            | CompileError::UnexpectedClose { file, .. }
            | CompileError::ImproperlyClosedVariable { file, .. }
            | CompileError::InvalidDelimiters { file, .. }
            | CompileError::EmptyTag { file, .. }
            | CompileError::IllegalExtendContent { file, .. } => file,
        }
    }
}

/// Failures raised while rendering a compiled template.
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    /// A deferred value failed or panicked
    #[error("deferred value `{name}` failed: {message}")]
    DeferredFailure {
        /// Name the deferred value was bound to
        name: String,
        /// Failure message
        message: String,
    },

    /// A child template overrides blocks its parent never declares (strict mode)
    #[error("`{template}` overrides blocks not declared by `{parent}`: {}", .blocks.join(", "))]
    InheritanceMismatch {
        /// The extending template
        template: String,
        /// The extended template
        parent: String,
        /// Replacement blocks that matched nothing
        blocks: Vec<String>,
    },

    /// Partial inclusion went deeper than the configured limit
    #[error("{file}:{line}: including `{name}` exceeds the recursion limit of {limit}")]
    RecursionLimit {
        /// The partial being included
        name: String,
        /// The configured limit
        limit: usize,
        /// File of the including tag
        file: String,
        /// Line of the including tag
        line: usize,
    },

    /// A name resolved in no scope while misses are configured to fail
    #[error("{file}:{line}: `{name}` not found in scopes")]
    Missing {
        /// The name as written in the tag
        name: String,
        /// File of the tag
        file: String,
        /// Line of the tag
        line: usize,
    },

    /// The output writer failed
    #[error("output error: {0}")]
    Io(Arc<io::Error>),
}

/// Failures raised by a template loader.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    /// No template is registered under the name
    #[error("template not found: {0}")]
    NotFound(String),

    /// The template exists but could not be read
    #[error("failed to read template `{name}`: {cause}")]
    Io {
        /// Logical template name
        name: String,
        /// Underlying I/O error
        cause: Arc<io::Error>,
    },
}

/// Main error type for stache operations.
///
/// Cloneable so a failed deferred computation can report the same failure to
/// every writer that observes it.
#[derive(Error, Debug, Clone)]
pub enum MustacheError {
    /// Compile-time structural error
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Render-time failure
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Loader failure
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl From<io::Error> for MustacheError {
    fn from(error: io::Error) -> Self {
        MustacheError::Render(RenderError::Io(Arc::new(error)))
    }
}

/// Result type alias for stache operations
pub type Result<T> = std::result::Result<T, MustacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_display_has_location() {
        let err = CompileError::MismatchedSection {
            file: "page.mustache".to_string(),
            line: 3,
            column: 7,
            expected: "items".to_string(),
            found: "item".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "page.mustache:3:7: `item` does not close section `items`"
        );
        assert_eq!(err.line(), 3);
        assert_eq!(err.file(), "page.mustache");
    }

    #[test]
    fn test_inheritance_mismatch_lists_blocks() {
        let err = RenderError::InheritanceMismatch {
            template: "child".to_string(),
            parent: "parent".to_string(),
            blocks: vec!["title".to_string(), "footer".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "`child` overrides blocks not declared by `parent`: title, footer"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let err: MustacheError = io::Error::new(io::ErrorKind::BrokenPipe, "closed").into();
        assert!(matches!(err, MustacheError::Render(RenderError::Io(_))));
        assert_eq!(err.to_string(), "output error: closed");
    }

    #[test]
    fn test_errors_are_transparent() {
        let err: MustacheError = LoadError::NotFound("missing".to_string()).into();
        assert_eq!(err.to_string(), "template not found: missing");
    }
}
