//! Compiled templates

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::code::{identity, invert, run, Code};
use crate::context::RenderContext;
use crate::engine::Engine;
use crate::error::Result;
use crate::scope::Scopes;
use crate::value::Value;
use crate::writer::Writer;

/// A compiled code sequence and the source it came from.
#[derive(Debug)]
pub(crate) struct Tree {
    pub(crate) name: Arc<str>,
    pub(crate) source: Arc<str>,
    pub(crate) codes: Arc<[Code]>,
}

impl Tree {
    pub(crate) fn new(name: impl Into<Arc<str>>, source: impl Into<Arc<str>>, codes: Vec<Code>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            codes: Arc::from(codes),
        }
    }

    /// A tree that renders nothing.
    pub(crate) fn empty(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, "", vec![Code::Eof])
    }
}

/// A compiled template, ready to render.
///
/// Cheap to clone and safe to render from many threads at once; lookup
/// caches inside the tree are shared by every render.
///
/// # Example
///
/// ```
/// use stache::{Engine, Value};
///
/// let engine = Engine::new();
/// let template = engine.compile_str("Hello {{name}}!", "greeting").unwrap();
/// let data = Value::map([("name", "world")]);
/// assert_eq!(template.render_to_string(data).unwrap(), "Hello world!");
/// ```
#[derive(Clone)]
pub struct Template {
    tree: Arc<Tree>,
    engine: Engine,
}

impl Template {
    pub(crate) fn new(tree: Arc<Tree>, engine: Engine) -> Self {
        Self { tree, engine }
    }

    /// Logical name the template was compiled under
    pub fn name(&self) -> &str {
        &self.tree.name
    }

    /// The template source
    pub fn source(&self) -> &str {
        &self.tree.source
    }

    /// The compiled code sequence
    pub fn codes(&self) -> &[Code] {
        &self.tree.codes
    }

    /// The engine the template belongs to
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Render against `scopes`, continuing from `writer`.
    ///
    /// `scopes` is either a single root value or an explicit [`Scopes`]
    /// stack. The returned writer may still have deferred work pending;
    /// call [`Writer::finish`] on it to wait for the output to complete.
    pub fn render(&self, writer: Writer, scopes: impl Into<Scopes>) -> Result<Writer> {
        let mut scopes = scopes.into();
        let cx = RenderContext::new(self.engine.clone());
        run(&self.tree.codes, writer, &mut scopes, &cx)
    }

    /// Render into a string, waiting for deferred work.
    pub fn render_to_string(&self, scopes: impl Into<Scopes>) -> Result<String> {
        let (writer, buffer) = Writer::buffer();
        self.render(writer, scopes)?.finish()?;
        let text = std::mem::take(&mut *buffer.lock());
        Ok(text)
    }

    /// Render into `out`, waiting for deferred work.
    pub fn render_to<W: io::Write>(&self, out: &mut W, scopes: impl Into<Scopes>) -> Result<()> {
        let text = self.render_to_string(scopes)?;
        out.write_all(text.as_bytes())?;
        Ok(())
    }

    /// The tag syntax the template was compiled from.
    pub fn identity(&self) -> String {
        identity(&self.tree.codes)
    }

    /// Recover data that renders this template as `text`.
    ///
    /// Interpolated names come back as strings and iterated sections as
    /// lists. Returns `None` when `text` does not fit the template, including
    /// trailing text after the last node and any template that uses
    /// partials or extends.
    ///
    /// # Example
    ///
    /// ```
    /// use stache::{Engine, Value};
    ///
    /// let template = Engine::new().compile_str("test {{value}} test", "t").unwrap();
    /// let data = template.invert("test value test").unwrap();
    /// assert_eq!(data, Value::map([("value", "value")]));
    /// assert_eq!(template.invert("nope"), None);
    /// ```
    pub fn invert(&self, text: &str) -> Option<Value> {
        invert(&self.tree.codes, text)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.tree.name)
            .field("nodes", &self.tree.codes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tree_renders_nothing() {
        let template = Template::new(Arc::new(Tree::empty("none")), Engine::new());
        assert_eq!(template.render_to_string(Value::Null).unwrap(), "");
        assert_eq!(template.name(), "none");
        assert_eq!(template.codes().len(), 1);
    }

    #[test]
    fn test_render_to_io() {
        let engine = Engine::new();
        let template = engine.compile_str("{{a}}-{{b}}", "t").unwrap();
        let mut out = Vec::new();
        template
            .render_to(&mut out, Value::map([("a", 1), ("b", 2)]))
            .unwrap();
        assert_eq!(out, b"1-2");
    }
}
