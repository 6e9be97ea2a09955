//! Interpolation nodes

use std::sync::Arc;

use super::{capture, defer, tag, Code};
use crate::context::{Delimiters, RenderContext, TemplateContext};
use crate::dispatch::{Binding, ObjectHandler};
use crate::error::Result;
use crate::scope::Scopes;
use crate::value::{LambdaKind, Value};
use crate::writer::Writer;

/// Interpolates a resolved value.
///
/// Null renders nothing. A text lambda is called with an empty string and
/// its result emitted; a template lambda's result is compiled with the
/// default delimiters and rendered against the current scopes first. Escaped
/// values pass through the handler's encoder.
#[derive(Debug)]
pub struct ValueCode {
    name: Arc<str>,
    encoded: bool,
    triple: bool,
    tc: TemplateContext,
    binding: Binding,
}

impl ValueCode {
    /// Create a value node.
    ///
    /// `triple` records that the tag was written `{{{name}}}` rather than
    /// `{{&name}}`.
    pub fn new(name: impl Into<Arc<str>>, encoded: bool, triple: bool, tc: TemplateContext) -> Self {
        let name = name.into();
        let binding = Binding::new(Arc::clone(&name), &tc);
        Self {
            name,
            encoded,
            triple,
            tc,
            binding,
        }
    }

    /// The interpolated name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether output is HTML-encoded
    pub fn is_encoded(&self) -> bool {
        self.encoded
    }

    /// The tag context
    pub fn context(&self) -> &TemplateContext {
        &self.tc
    }

    /// The lookup cache for this tag
    pub fn binding(&self) -> &Binding {
        &self.binding
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
        self.emit(writer, value, scopes, cx)
    }

    fn emit(
        self: &Arc<Self>,
        writer: Writer,
        value: Value,
        scopes: &mut Scopes,
        cx: &RenderContext,
    ) -> Result<Writer> {
        let handler = cx.handler();
        match handler.coerce(value) {
            Value::Null => Ok(writer),
            Value::Deferred(deferred) => {
                let this = Arc::clone(self);
                defer(writer, &deferred, &self.name, scopes, cx, move |w, v, s, c| {
                    this.emit(w, v, s, c)
                })
            }
            Value::Lambda(lambda) => {
                let output = lambda.apply("");
                let text = match lambda.kind {
                    LambdaKind::Text => output,
                    LambdaKind::Template => {
                        let tree = cx
                            .engine()
                            .fragment(&output, &Delimiters::default(), &self.tc.file)?;
                        capture(&tree.codes, scopes, cx)?
                    }
                };
                self.write(writer, &text, handler)
            }
            other => {
                let text = handler.stringify(&other);
                self.write(writer, &text, handler)
            }
        }
    }

    fn write(&self, writer: Writer, text: &str, handler: &dyn ObjectHandler) -> Result<Writer> {
        if text.is_empty() {
            return Ok(writer);
        }
        if self.encoded {
            let mut encoded = String::with_capacity(text.len());
            handler.encode(text, &mut encoded);
            writer.write_str(&encoded)?;
        } else {
            writer.write_str(text)?;
        }
        Ok(writer)
    }

    pub(crate) fn identity(&self, out: &mut String) {
        let delimiters = &self.tc.delimiters;
        if self.encoded {
            tag(out, delimiters, "", &self.name);
        } else if self.triple {
            out.push_str(&delimiters.start);
            out.push('{');
            out.push_str(&self.name);
            out.push('}');
            out.push_str(&delimiters.end);
        } else {
            tag(out, delimiters, "&", &self.name);
        }
    }
}

impl From<ValueCode> for Code {
    fn from(code: ValueCode) -> Self {
        Code::Value(Arc::new(code))
    }
}
