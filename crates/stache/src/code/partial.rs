//! Partial inclusion: `{{>name}}` and `{{>*name}}`

use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::Mutex;

use super::{defer, run, tag, Code};
use crate::context::{RenderContext, TemplateContext};
use crate::dispatch::Binding;
use crate::error::{LoadError, MustacheError, Result};
use crate::scope::Scopes;
use crate::template::Tree;
use crate::value::Value;
use crate::writer::Writer;

/// A value computed once, on first use, by whichever thread gets there first.
///
/// Initialization runs under a lock and is double-checked, so concurrent
/// first renders compile a target exactly once. A failed initialization
/// leaves the slot empty for the next caller to retry.
pub(crate) struct LazySlot<T> {
    cell: OnceLock<T>,
    init: Mutex<()>,
}

impl<T> LazySlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    pub(crate) fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub(crate) fn get_or_try_init<E>(&self, init: impl FnOnce() -> std::result::Result<T, E>) -> std::result::Result<&T, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let _init = self.init.lock();
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let value = init()?;
        Ok(self.cell.get_or_init(|| value))
    }
}

impl<T> Default for LazySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for LazySlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(value) => f.debug_tuple("LazySlot").field(value).finish(),
            None => f.write_str("LazySlot(<pending>)"),
        }
    }
}

/// Load a partial or extend target through the engine.
///
/// A name the loader does not know renders as nothing unless strict mode is
/// on, in which case the load error is returned.
pub(crate) fn load(cx: &RenderContext, name: &str, tc: &TemplateContext, indent: &str) -> Result<Arc<Tree>> {
    match cx.engine().partial(name, &tc.file, indent) {
        Err(MustacheError::Load(LoadError::NotFound(missing))) if !cx.strict() => {
            tracing::debug!(partial = %name, missing = %missing, file = %tc.file, "template not found, rendering nothing");
            Ok(Arc::new(Tree::empty(name)))
        }
        other => other,
    }
}

/// Render `tree`, with `value` pushed as a scope unless it is null.
fn render_tree(tree: &Tree, writer: Writer, value: Value, scopes: &mut Scopes, cx: &RenderContext) -> Result<Writer> {
    if value.is_null() {
        return run(&tree.codes, writer, scopes, cx);
    }
    let mut frame = scopes.frame(value);
    run(&tree.codes, writer, &mut frame, cx)
}

// ═══════════════════════════════════════════════════════════════════════
// Static partials
// ═══════════════════════════════════════════════════════════════════════

/// `{{>name}}`: include another template.
///
/// The target is resolved relative to the including template and compiled on
/// first render. If `name` also resolves to a value in the current scopes,
/// that value is pushed as a scope while the partial renders. A standalone
/// partial tag carries its line's indentation, which is applied to every line
/// of the included template.
#[derive(Debug)]
pub struct PartialCode {
    name: Arc<str>,
    tc: TemplateContext,
    indent: Arc<str>,
    binding: Binding,
    target: LazySlot<Arc<Tree>>,
}

impl PartialCode {
    /// Create a partial node
    pub fn new(name: impl Into<Arc<str>>, tc: TemplateContext, indent: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        let binding = Binding::for_partial(Arc::clone(&name), &tc);
        Self {
            name,
            tc,
            indent: indent.into(),
            binding,
            target: LazySlot::new(),
        }
    }

    /// The referenced template name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tag context
    pub fn context(&self) -> &TemplateContext {
        &self.tc
    }

    /// Indentation applied to the included lines
    pub fn indent(&self) -> &str {
        &self.indent
    }

    /// Whether the target has been compiled yet
    pub fn is_resolved(&self) -> bool {
        self.target.get().is_some()
    }

    pub(crate) fn execute(&self, writer: Writer, scopes: &mut Scopes, cx: &RenderContext) -> Result<Writer> {
        let cx = cx.enter_partial(&self.name, &self.tc)?;
        let tree = self
            .target
            .get_or_try_init(|| load(&cx, &self.name, &self.tc, &self.indent))?;

        let value = cx.handler().coerce(self.binding.get(scopes, cx.handler(), cx.strict()));
        match value {
            Value::Deferred(deferred) => {
                let tree = Arc::clone(tree);
                defer(writer, &deferred, &self.name, scopes, &cx, move |w, v, s, c| {
                    render_tree(&tree, w, v, s, c)
                })
            }
            value => render_tree(tree, writer, value, scopes, &cx),
        }
    }

    pub(crate) fn identity(&self, out: &mut String) {
        tag(out, &self.tc.delimiters, ">", &self.name);
    }
}

impl From<PartialCode> for Code {
    fn from(code: PartialCode) -> Self {
        Code::Partial(Arc::new(code))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Dynamic partials
// ═══════════════════════════════════════════════════════════════════════

/// `{{>*name}}`: include the template whose name `name` resolves to.
///
/// Each distinct resolved name is compiled once and kept on the node, subject
/// to the engine's cache limit. A name that resolves to nothing renders
/// nothing.
#[derive(Debug)]
pub struct DynamicPartialCode {
    name: Arc<str>,
    tc: TemplateContext,
    indent: Arc<str>,
    binding: Binding,
    targets: DashMap<String, Arc<Tree>>,
}

impl DynamicPartialCode {
    /// Create a dynamic partial node
    pub fn new(name: impl Into<Arc<str>>, tc: TemplateContext, indent: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        let binding = Binding::new(Arc::clone(&name), &tc);
        Self {
            name,
            tc,
            indent: indent.into(),
            binding,
            targets: DashMap::new(),
        }
    }

    /// The name whose value selects the template
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tag context
    pub fn context(&self) -> &TemplateContext {
        &self.tc
    }

    /// Number of distinct templates compiled so far
    pub fn resolved_len(&self) -> usize {
        self.targets.len()
    }

    pub(crate) fn execute(
        self: &Arc<Self>,
        writer: Writer,
        scopes: &mut Scopes,
        cx: &RenderContext,
    ) -> Result<Writer> {
        let cx = cx.enter_partial(&self.name, &self.tc)?;
        let value = self.binding.get(scopes, cx.handler(), cx.strict());
        self.include(writer, value, scopes, &cx)
    }

    fn include(self: &Arc<Self>, writer: Writer, value: Value, scopes: &mut Scopes, cx: &RenderContext) -> Result<Writer> {
        let handler = cx.handler();
        let value = handler.coerce(value);
        if let Value::Deferred(deferred) = &value {
            let this = Arc::clone(self);
            return defer(writer, deferred, &self.name, scopes, cx, move |w, v, s, c| {
                this.include(w, v, s, c)
            });
        }

        let target = handler.stringify(&value);
        if target.is_empty() {
            return Ok(writer);
        }
        let tree = self.target(&target, cx)?;
        run(&tree.codes, writer, scopes, cx)
    }

    fn target(&self, target: &str, cx: &RenderContext) -> Result<Arc<Tree>> {
        if let Some(tree) = self.targets.get(target) {
            return Ok(Arc::clone(tree.value()));
        }
        let tree = load(cx, target, &self.tc, &self.indent)?;
        Ok(cx.engine().insert_bounded(&self.targets, target.to_string(), tree))
    }

    pub(crate) fn identity(&self, out: &mut String) {
        tag(out, &self.tc.delimiters, ">*", &self.name);
    }
}

impl From<DynamicPartialCode> for Code {
    fn from(code: DynamicPartialCode) -> Self {
        Code::DynamicPartial(Arc::new(code))
    }
}
