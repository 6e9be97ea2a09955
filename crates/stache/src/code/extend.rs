//! Template inheritance: `{{<parent}}` and `{{$block}}`

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use super::partial::{load, LazySlot};
use super::{identity, run, tag, Code};
use crate::context::{Delimiters, RenderContext, TemplateContext};
use crate::error::{RenderError, Result};
use crate::scope::Scopes;
use crate::writer::Writer;

/// Replacement blocks supplied by an extending template, by block name.
pub type Replacements = IndexMap<Arc<str>, Arc<BlockCode>>;

// ═══════════════════════════════════════════════════════════════════════
// Blocks
// ═══════════════════════════════════════════════════════════════════════

/// `{{$name}}default{{/name}}`: a named region a child template may replace.
///
/// Rendered on its own, a block renders its default body.
#[derive(Debug)]
pub struct BlockCode {
    name: Arc<str>,
    tc: TemplateContext,
    close: Delimiters,
    body: Arc<[Code]>,
}

impl BlockCode {
    /// Create a block node
    pub fn new(
        name: impl Into<Arc<str>>,
        tc: TemplateContext,
        close: Delimiters,
        body: impl Into<Arc<[Code]>>,
    ) -> Self {
        Self {
            name: name.into(),
            tc,
            close,
            body: body.into(),
        }
    }

    /// The block name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The default body
    pub fn body(&self) -> &[Code] {
        &self.body
    }

    /// The tag context of the open tag
    pub fn context(&self) -> &TemplateContext {
        &self.tc
    }

    fn with_body(&self, body: Arc<[Code]>) -> Self {
        Self {
            name: Arc::clone(&self.name),
            tc: self.tc.clone(),
            close: self.close.clone(),
            body,
        }
    }

    pub(crate) fn execute(&self, writer: Writer, scopes: &mut Scopes, cx: &RenderContext) -> Result<Writer> {
        run(&self.body, writer, scopes, cx)
    }

    pub(crate) fn identity(&self, out: &mut String) {
        tag(out, &self.tc.delimiters, "$", &self.name);
        out.push_str(&identity(&self.body));
        tag(out, &self.close, "/", &self.name);
    }
}

impl From<BlockCode> for Code {
    fn from(code: BlockCode) -> Self {
        Code::Block(Arc::new(code))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Extends
// ═══════════════════════════════════════════════════════════════════════

/// The parent tree with this template's replacements applied.
#[derive(Debug)]
struct Resolved {
    codes: Arc<[Code]>,
    unused: Vec<String>,
}

/// `{{<parent}}...{{/parent}}`: render `parent` with blocks replaced.
///
/// The body may only hold replacement blocks and literal text. The parent is
/// loaded and substituted once, on first render, and the substituted tree is
/// kept on the node. The parent's own tree is never modified; substitution
/// builds new node lists that share every untouched node with it.
#[derive(Debug)]
pub struct ExtendCode {
    name: Arc<str>,
    tc: TemplateContext,
    close: Delimiters,
    body: Arc<[Code]>,
    replacements: Replacements,
    resolved: LazySlot<Resolved>,
}

impl ExtendCode {
    /// Create an extend node, collecting the replacement blocks in `body`.
    pub fn new(
        name: impl Into<Arc<str>>,
        tc: TemplateContext,
        close: Delimiters,
        body: impl Into<Arc<[Code]>>,
    ) -> Self {
        let body: Arc<[Code]> = body.into();
        let mut replacements = Replacements::new();
        for code in body.iter() {
            if let Code::Block(block) = code {
                replacements.insert(Arc::clone(&block.name), Arc::clone(block));
            }
        }
        Self::with_replacements(name.into(), tc, close, body, replacements)
    }

    fn with_replacements(
        name: Arc<str>,
        tc: TemplateContext,
        close: Delimiters,
        body: Arc<[Code]>,
        replacements: Replacements,
    ) -> Self {
        Self {
            name,
            tc,
            close,
            body,
            replacements,
            resolved: LazySlot::new(),
        }
    }

    /// Name of the extended template
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tag context of the open tag
    pub fn context(&self) -> &TemplateContext {
        &self.tc
    }

    /// The replacement blocks this node applies to its parent
    pub fn replacements(&self) -> &Replacements {
        &self.replacements
    }

    pub(crate) fn execute(&self, writer: Writer, scopes: &mut Scopes, cx: &RenderContext) -> Result<Writer> {
        let cx = cx.enter_partial(&self.name, &self.tc)?;
        let resolved = self.resolved.get_or_try_init(|| self.resolve(&cx))?;

        if cx.strict() && !resolved.unused.is_empty() {
            return Err(RenderError::InheritanceMismatch {
                template: self.tc.file.to_string(),
                parent: self.name.to_string(),
                blocks: resolved.unused.clone(),
            }
            .into());
        }

        run(&resolved.codes, writer, scopes, &cx)
    }

    fn resolve(&self, cx: &RenderContext) -> Result<Resolved> {
        let parent = load(cx, &self.name, &self.tc, "")?;
        let mut used = HashSet::new();
        let codes = substitute(&parent.codes, &self.replacements, &mut used)
            .unwrap_or_else(|| Arc::clone(&parent.codes));
        let unused = self
            .replacements
            .keys()
            .filter(|name| !used.contains(*name))
            .map(|name| name.to_string())
            .collect();
        Ok(Resolved { codes, unused })
    }

    /// This extend with `outer` replacements layered over its own.
    ///
    /// Used when the template being extended itself extends another: the
    /// outermost template's blocks win, and its blocks also reach into the
    /// bodies of this node's own replacements.
    fn merge(&self, outer: &Replacements, used: &mut HashSet<Arc<str>>) -> Self {
        let mut replacements = Replacements::new();
        for (name, block) in &self.replacements {
            if outer.contains_key(name) {
                continue;
            }
            let block = match substitute(&block.body, outer, used) {
                Some(body) => Arc::new(block.with_body(body)),
                None => Arc::clone(block),
            };
            replacements.insert(Arc::clone(name), block);
        }
        for (name, block) in outer {
            used.insert(Arc::clone(name));
            replacements.insert(Arc::clone(name), Arc::clone(block));
        }
        Self::with_replacements(
            Arc::clone(&self.name),
            self.tc.clone(),
            self.close.clone(),
            Arc::clone(&self.body),
            replacements,
        )
    }

    pub(crate) fn identity(&self, out: &mut String) {
        tag(out, &self.tc.delimiters, "<", &self.name);
        out.push_str(&identity(&self.body));
        tag(out, &self.close, "/", &self.name);
    }
}

impl From<ExtendCode> for Code {
    fn from(code: ExtendCode) -> Self {
        Code::Extend(Arc::new(code))
    }
}

/// Apply `replacements` to `codes`.
///
/// Returns `None` when nothing changed, so callers can keep sharing the
/// original list. Block names that matched are added to `used`. Partials are
/// left alone: replacements apply to the extended template's own tree only.
pub(crate) fn substitute(
    codes: &[Code],
    replacements: &Replacements,
    used: &mut HashSet<Arc<str>>,
) -> Option<Arc<[Code]>> {
    let mut changed: Option<Vec<Code>> = None;

    for (i, code) in codes.iter().enumerate() {
        let replaced = match code {
            Code::Block(block) => match replacements.get(&block.name) {
                Some(replacement) => {
                    used.insert(Arc::clone(&block.name));
                    Some(Code::Block(Arc::clone(replacement)))
                }
                None => substitute(&block.body, replacements, used)
                    .map(|body| Code::from(block.with_body(body))),
            },
            Code::Section(section) => substitute(section.body(), replacements, used)
                .map(|body| Code::from(section.with_body(body))),
            Code::Extend(extend) => Some(Code::from(extend.merge(replacements, used))),
            _ => None,
        };

        match replaced {
            Some(code) => changed.get_or_insert_with(|| codes[..i].to_vec()).push(code),
            None => {
                if let Some(list) = changed.as_mut() {
                    list.push(code.clone());
                }
            }
        }
    }

    changed.map(Arc::from)
}
