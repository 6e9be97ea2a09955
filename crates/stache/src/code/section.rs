//! Section nodes: iteration, conditionals and lambdas

use std::sync::Arc;

use super::{capture, defer, identity, run, tag, Code};
use crate::context::{Delimiters, RenderContext, TemplateContext};
use crate::dispatch::Binding;
use crate::error::Result;
use crate::scope::Scopes;
use crate::value::{Lambda, LambdaKind, Value};
use crate::writer::Writer;

/// `{{#name}}body{{/name}}` and its negated form `{{^name}}body{{/name}}`.
///
/// A positive section skips falsey values, iterates lists (pushing each
/// element as a scope) and renders once over any other truthy value. A
/// negated section renders its body once, with the scopes unchanged, exactly
/// when the positive section would render nothing.
#[derive(Debug)]
pub struct SectionCode {
    name: Arc<str>,
    negated: bool,
    tc: TemplateContext,
    close: Delimiters,
    raw: Arc<str>,
    body: Arc<[Code]>,
    binding: Binding,
}

impl SectionCode {
    /// Create a section node.
    ///
    /// `raw` is the unrendered source between the open and close tags, handed
    /// to template lambdas; `close` holds the delimiters the close tag was
    /// written with.
    pub fn new(
        name: impl Into<Arc<str>>,
        negated: bool,
        tc: TemplateContext,
        close: Delimiters,
        raw: impl Into<Arc<str>>,
        body: impl Into<Arc<[Code]>>,
    ) -> Self {
        let name = name.into();
        let binding = Binding::new(Arc::clone(&name), &tc);
        Self {
            name,
            negated,
            tc,
            close,
            raw: raw.into(),
            body: body.into(),
            binding,
        }
    }

    /// The section name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is a `{{^name}}` section
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// The compiled body
    pub fn body(&self) -> &[Code] {
        &self.body
    }

    /// The unrendered body source
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The tag context of the open tag
    pub fn context(&self) -> &TemplateContext {
        &self.tc
    }

    /// A copy of this section with a different body and a fresh binding.
    pub(crate) fn with_body(&self, body: Arc<[Code]>) -> Self {
        Self::new(
            Arc::clone(&self.name),
            self.negated,
            self.tc.clone(),
            self.close.clone(),
            Arc::clone(&self.raw),
            body,
        )
    }

    pub(crate) fn execute(
        self: &Arc<Self>,
        writer: Writer,
        scopes: &mut Scopes,
        cx: &RenderContext,
    ) -> Result<Writer> {
        let value = self
            .binding
            .try_get(scopes, cx.handler(), cx.strict(), cx.fail_on_miss())?;
        self.dispatch(writer, value, scopes, cx)
    }

    fn dispatch(
        self: &Arc<Self>,
        writer: Writer,
        value: Value,
        scopes: &mut Scopes,
        cx: &RenderContext,
    ) -> Result<Writer> {
        let handler = cx.handler();
        let value = handler.coerce(value);

        if let Value::Deferred(deferred) = &value {
            let this = Arc::clone(self);
            return defer(writer, deferred, &self.name, scopes, cx, move |w, v, s, c| {
                this.dispatch(w, v, s, c)
            });
        }

        if self.negated {
            return if handler.is_falsey(&value) {
                run(&self.body, writer, scopes, cx)
            } else {
                Ok(writer)
            };
        }

        match value {
            Value::Lambda(lambda) => self.call_lambda(writer, &lambda, scopes, cx),
            value if handler.is_falsey(&value) => Ok(writer),
            value => {
                let mut writer = writer;
                for item in handler.iterate(&value) {
                    let mut frame = scopes.frame(item);
                    writer = run(&self.body, writer, &mut frame, cx)?;
                }
                Ok(writer)
            }
        }
    }

    fn call_lambda(
        &self,
        writer: Writer,
        lambda: &Lambda,
        scopes: &mut Scopes,
        cx: &RenderContext,
    ) -> Result<Writer> {
        match lambda.kind {
            LambdaKind::Text => {
                let body = capture(&self.body, scopes, cx)?;
                writer.write_str(&lambda.apply(&body))?;
                Ok(writer)
            }
            LambdaKind::Template => {
                let source = lambda.apply(&self.raw);
                let tree = cx
                    .engine()
                    .fragment(&source, &self.tc.delimiters, &self.tc.file)?;
                run(&tree.codes, writer, scopes, cx)
            }
        }
    }

    pub(crate) fn identity(&self, out: &mut String) {
        let sigil = if self.negated { "^" } else { "#" };
        tag(out, &self.tc.delimiters, sigil, &self.name);
        out.push_str(&identity(&self.body));
        tag(out, &self.close, "/", &self.name);
    }
}

impl From<SectionCode> for Code {
    fn from(code: SectionCode) -> Self {
        Code::Section(Arc::new(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_round_trips_tags() {
        let body = vec![Code::Write(Arc::from("x"))];
        let section = SectionCode::new(
            "items",
            false,
            TemplateContext::default(),
            Delimiters::default(),
            "x",
            body,
        );
        let mut out = String::new();
        section.identity(&mut out);
        assert_eq!(out, "{{#items}}x{{/items}}");
    }

    #[test]
    fn test_identity_keeps_changed_close_delimiters() {
        let section = SectionCode::new(
            "a",
            true,
            TemplateContext::default(),
            Delimiters::new("<%", "%>"),
            "",
            Vec::<Code>::new(),
        );
        let mut out = String::new();
        section.identity(&mut out);
        assert_eq!(out, "{{^a}}<%/a%>");
    }

    #[test]
    fn test_with_body_keeps_metadata() {
        let section = SectionCode::new(
            "a",
            false,
            TemplateContext::default(),
            Delimiters::default(),
            "raw",
            Vec::<Code>::new(),
        );
        let copy = section.with_body(Arc::from(vec![Code::Eof]));
        assert_eq!(copy.name(), "a");
        assert_eq!(copy.raw(), "raw");
        assert_eq!(copy.body().len(), 1);
    }
}
