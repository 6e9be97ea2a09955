//! The compiled code tree and its execution
//!
//! A compiled template is a flat sequence of [`Code`] nodes; sections, blocks
//! and extends own nested sequences. Trees are immutable once built and are
//! shared across concurrent renders. Each node writes to the writer it is
//! given and returns the writer the next node continues with, which is how
//! deferred values splice their output back into document order.

mod extend;
mod invert;
mod partial;
mod section;
mod value;

pub use extend::{BlockCode, ExtendCode};
pub(crate) use invert::invert;
pub use partial::{DynamicPartialCode, PartialCode};
pub use section::SectionCode;
pub use value::ValueCode;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::context::{Delimiters, RenderContext, TemplateContext};
use crate::error::{MustacheError, RenderError, Result};
use crate::scope::Scopes;
use crate::value::{Deferred, Value};
use crate::writer::{Latch, Writer};

/// A node of a compiled template.
#[derive(Debug, Clone)]
pub enum Code {
    /// Literal text
    Write(Arc<str>),

    /// `{{name}}`, `{{{name}}}` or `{{&name}}`
    Value(Arc<ValueCode>),

    /// `{{#name}}...{{/name}}` or `{{^name}}...{{/name}}`
    Section(Arc<SectionCode>),

    /// `{{>name}}`
    Partial(Arc<PartialCode>),

    /// `{{>*name}}`
    DynamicPartial(Arc<DynamicPartialCode>),

    /// `{{<name}}...{{/name}}`
    Extend(Arc<ExtendCode>),

    /// `{{$name}}...{{/name}}`
    Block(Arc<BlockCode>),

    /// End of input. Inversion only succeeds when every byte was consumed
    /// by the time it is reached.
    Eof,
}

impl Code {
    /// Render this node.
    pub fn execute(&self, writer: Writer, scopes: &mut Scopes, cx: &RenderContext) -> Result<Writer> {
        match self {
            Code::Write(text) => {
                writer.write_str(text)?;
                Ok(writer)
            }
            Code::Value(code) => code.execute(writer, scopes, cx),
            Code::Section(code) => code.execute(writer, scopes, cx),
            Code::Partial(code) => code.execute(writer, scopes, cx),
            Code::DynamicPartial(code) => code.execute(writer, scopes, cx),
            Code::Extend(code) => code.execute(writer, scopes, cx),
            Code::Block(code) => code.execute(writer, scopes, cx),
            Code::Eof => Ok(writer),
        }
    }

    /// Append the tag syntax this node was parsed from.
    pub fn identity(&self, out: &mut String) {
        match self {
            Code::Write(text) => out.push_str(text),
            Code::Value(code) => code.identity(out),
            Code::Section(code) => code.identity(out),
            Code::Partial(code) => code.identity(out),
            Code::DynamicPartial(code) => code.identity(out),
            Code::Extend(code) => code.identity(out),
            Code::Block(code) => code.identity(out),
            Code::Eof => {}
        }
    }

    /// The name the node refers to, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Code::Value(code) => Some(code.name()),
            Code::Section(code) => Some(code.name()),
            Code::Partial(code) => Some(code.name()),
            Code::DynamicPartial(code) => Some(code.name()),
            Code::Extend(code) => Some(code.name()),
            Code::Block(code) => Some(code.name()),
            Code::Write(_) | Code::Eof => None,
        }
    }

    /// The tag context, for nodes parsed from a tag.
    pub fn context(&self) -> Option<&TemplateContext> {
        match self {
            Code::Value(code) => Some(code.context()),
            Code::Section(code) => Some(code.context()),
            Code::Partial(code) => Some(code.context()),
            Code::DynamicPartial(code) => Some(code.context()),
            Code::Extend(code) => Some(code.context()),
            Code::Block(code) => Some(code.context()),
            Code::Write(_) | Code::Eof => None,
        }
    }
}

/// Render `codes` in order, threading the writer through.
pub fn run(codes: &[Code], mut writer: Writer, scopes: &mut Scopes, cx: &RenderContext) -> Result<Writer> {
    for code in codes {
        writer = code.execute(writer, scopes, cx)?;
    }
    Ok(writer)
}

/// Render `codes` into a string.
///
/// The caller needs the text before it can continue, so deferred values in
/// `codes` resolve inline rather than queueing behind the current job.
pub(crate) fn capture(codes: &[Code], scopes: &mut Scopes, cx: &RenderContext) -> Result<String> {
    let (writer, buffer) = Writer::buffer();
    run(codes, writer, scopes, &cx.inline())?.finish()?;
    let text = std::mem::take(&mut *buffer.lock());
    Ok(text)
}

/// The tag syntax of `codes`.
pub fn identity(codes: &[Code]) -> String {
    let mut out = String::new();
    for code in codes {
        code.identity(&mut out);
    }
    out
}

/// Append `{start}{sigil}{name}{end}`.
pub(crate) fn tag(out: &mut String, delimiters: &Delimiters, sigil: &str, name: &str) {
    out.push_str(&delimiters.start);
    out.push_str(sigil);
    out.push_str(name);
    out.push_str(&delimiters.end);
}

/// Resolve `deferred` and hand the value to `then`.
///
/// Without an executor the value is resolved inline. With one, the work is
/// submitted and a latch is returned in place of `writer`; the job writes
/// into `writer` and then settles the latch with the writer it ended on, so
/// output that follows the tag stays behind the job's own output.
pub(crate) fn defer<F>(
    writer: Writer,
    deferred: &Deferred,
    name: &str,
    scopes: &mut Scopes,
    cx: &RenderContext,
    then: F,
) -> Result<Writer>
where
    F: FnOnce(Writer, Value, &mut Scopes, &RenderContext) -> Result<Writer> + Send + 'static,
{
    let Some(executor) = cx.executor().cloned() else {
        let value = deferred.resolve().map_err(|message| failure(name, message))?;
        return then(writer, value, scopes, cx);
    };

    let latch = Arc::new(Latch::new());
    let settle = Arc::clone(&latch);
    let deferred = deferred.clone();
    let name = name.to_string();
    let mut scopes = scopes.clone();
    let cx = cx.clone();

    executor.execute(Box::new(move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let value = deferred.resolve().map_err(|message| failure(&name, message))?;
            then(writer, value, &mut scopes, &cx)
        }));
        match outcome {
            Ok(Ok(end)) => {
                if let Err(error) = settle.complete(end) {
                    tracing::debug!(name = %name, %error, "failed to flush deferred output");
                }
            }
            Ok(Err(error)) => {
                tracing::debug!(name = %name, %error, "deferred render failed");
                settle.fail(error);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::debug!(name = %name, message = %message, "deferred render panicked");
                settle.fail(failure(&name, message));
            }
        }
    }));

    Ok(Writer::Latched(latch))
}

fn failure(name: &str, message: String) -> MustacheError {
    RenderError::DeferredFailure {
        name: name.to_string(),
        message,
    }
    .into()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(3);
        assert_eq!(panic_message(payload.as_ref()), "panicked");
    }

    #[test]
    fn test_tag_formatting() {
        let mut out = String::new();
        tag(&mut out, &Delimiters::new("<%", "%>"), "#", "items");
        assert_eq!(out, "<%#items%>");
    }

    #[test]
    fn test_write_node_identity() {
        let codes = vec![Code::Write(Arc::from("plain")), Code::Eof];
        assert_eq!(identity(&codes), "plain");
        assert_eq!(codes[0].name(), None);
    }
}
