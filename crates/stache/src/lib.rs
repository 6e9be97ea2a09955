//! # Stache
//!
//! A logic-less template engine in the Mustache family.
//!
//! Templates are compiled once into a tree of typed nodes and rendered many
//! times against heterogeneous data. Three pieces do the heavy lifting:
//!
//! - **Compiler**: a single-pass parser with sections, partials, delimiter
//!   changes, comments, pragmas and template inheritance, reporting
//!   structural errors with file, line and column.
//! - **Guarded dispatch**: each tag caches how it resolved a name against
//!   the scope stack, keyed by cheap guards over the shape of the data, and
//!   falls back to a fresh lookup whenever a guard fails.
//! - **Ordered concurrency**: values may be deferred computations. With an
//!   executor configured they run in parallel, and their output is still
//!   spliced into the stream in document order.
//!
//! ## Example
//!
//! ```
//! use stache::{Engine, Value};
//!
//! let engine = Engine::new();
//! let template = engine
//!     .compile_str("{{#items}}{{name}}: {{price}}\n{{/items}}", "items")
//!     .unwrap();
//! let data = Value::map([(
//!     "items",
//!     Value::list([
//!         Value::map([("name", "Item 1"), ("price", "$19.99")]),
//!         Value::map([("name", "Item 2"), ("price", "$29.99")]),
//!     ]),
//! )]);
//! assert_eq!(
//!     template.render_to_string(data).unwrap(),
//!     "Item 1: $19.99\nItem 2: $29.99\n"
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod code;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod encode;
pub mod engine;
pub mod error;
pub mod executor;
pub mod loader;
pub mod parser;
pub mod scope;
pub mod template;
pub mod value;
pub mod writer;

// Re-export main types
pub use code::Code;
pub use config::{Options, PragmaHandler, DEFAULT_RECURSION_LIMIT};
pub use context::{Delimiters, RenderContext, TemplateContext};
pub use dispatch::{Binding, DefaultObjectHandler, Guard, ObjectHandler, Wrapper};
pub use engine::{Engine, EngineBuilder};
pub use error::{CompileError, LoadError, MustacheError, RenderError, Result};
pub use executor::{thread_pool, Executor, Job, ThreadExecutor};
pub use loader::{FileLoader, MemoryLoader, TemplateLoader};
pub use scope::{ScopeFrame, Scopes};
pub use template::Template;
pub use value::{Deferred, Lambda, LambdaKind, Record, Resolvable, Shape, Value};
pub use writer::{IoSink, Sink, Writer};

/// Stache version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
