//! Template compiler
//!
//! A single forward pass over the source. Literal text accumulates in a
//! buffer until a tag is met; opening a section recurses with the section
//! name as the expected terminator and returns when the matching close tag is
//! found. Block tags that sit alone on their line are *standalone*: the
//! line's indentation and its line ending are dropped from the output.

mod tag;

use std::collections::HashMap;
use std::sync::Arc;

use crate::code::{BlockCode, Code, DynamicPartialCode, ExtendCode, PartialCode, SectionCode, ValueCode};
use crate::config::PragmaHandler;
use crate::context::{Delimiters, TemplateContext};
use crate::error::CompileError;

use tag::{Kind, Tag};

/// Compile `source` into a code sequence terminated by [`Code::Eof`].
///
/// `file` is the logical template name used in diagnostics and for resolving
/// partials; `delimiters` are the delimiters in effect at the start.
pub fn parse(
    source: &str,
    file: &str,
    delimiters: Delimiters,
    pragmas: &HashMap<String, PragmaHandler>,
) -> Result<Vec<Code>, CompileError> {
    let mut parser = Parser::new(source, file, delimiters, pragmas);
    let block = parser.parse_block(None)?;
    tracing::trace!(file, nodes = block.codes.len(), "parsed template");
    Ok(block.codes)
}

/// The section a recursive call must find the close tag for.
struct Open {
    name: String,
    line: usize,
    column: usize,
}

/// The result of parsing up to a close tag (or end of input).
struct Block {
    codes: Vec<Code>,
    /// Byte offset where the body ends, before a standalone close tag's indentation
    body_end: usize,
    /// Delimiters the close tag was written with
    close: Delimiters,
}

struct Parser<'a> {
    src: &'a str,
    file: Arc<str>,
    pragmas: &'a HashMap<String, PragmaHandler>,
    delimiters: Delimiters,
    pos: usize,
    line: usize,
    line_start: usize,
}

impl<'a> Parser<'a> {
    fn new(
        src: &'a str,
        file: &str,
        delimiters: Delimiters,
        pragmas: &'a HashMap<String, PragmaHandler>,
    ) -> Self {
        Self {
            src,
            file: Arc::from(file),
            pragmas,
            delimiters,
            pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    /// Move forward `n` bytes, keeping the line counters current.
    fn advance(&mut self, n: usize) {
        let end = self.pos + n;
        for (i, byte) in self.src.as_bytes()[self.pos..end].iter().enumerate() {
            if *byte == b'\n' {
                self.line += 1;
                self.line_start = self.pos + i + 1;
            }
        }
        self.pos = end;
    }

    /// 1-based column of byte offset `at` on the current line.
    fn column(&self, at: usize) -> usize {
        self.src[self.line_start..at].chars().count() + 1
    }

    fn parse_block(&mut self, open: Option<&Open>) -> Result<Block, CompileError> {
        let src = self.src;
        let outer = self.delimiters.clone();
        let mut codes = Vec::new();
        let mut text = String::new();

        loop {
            let rest = &src[self.pos..];
            let Some(offset) = rest.find(&*self.delimiters.start) else {
                text.push_str(rest);
                self.advance(rest.len());
                flush(&mut text, &mut codes);
                return match open {
                    Some(open) => Err(CompileError::UnclosedSection {
                        file: self.file.to_string(),
                        line: open.line,
                        column: open.column,
                        name: open.name.clone(),
                    }),
                    None => {
                        codes.push(Code::Eof);
                        Ok(Block {
                            codes,
                            body_end: self.pos,
                            close: self.delimiters.clone(),
                        })
                    }
                };
            };

            text.push_str(&rest[..offset]);
            self.advance(offset);
            let tag = self.lex()?;

            let mut indent = "";
            if tag.kind.may_stand_alone() {
                if let Some(next_line) = self.standalone(&tag) {
                    indent = &src[tag.line_start..tag.start];
                    text.truncate(text.len().saturating_sub(indent.len()));
                    self.advance(next_line - self.pos);
                }
            }

            let tc = TemplateContext::new(
                tag.delimiters.clone(),
                Arc::clone(&self.file),
                tag.line,
                tag.at_line_start,
            );

            match tag.kind {
                Kind::Comment => {}
                Kind::Delimiters(delimiters) => self.delimiters = delimiters,
                Kind::Pragma => self.pragma(&tag.name, &mut text),
                Kind::Value { encoded, triple } => {
                    flush(&mut text, &mut codes);
                    codes.push(ValueCode::new(tag.name, encoded, triple, tc).into());
                }
                Kind::Partial => {
                    flush(&mut text, &mut codes);
                    match tag.name.strip_prefix('*') {
                        Some(dynamic) => {
                            let dynamic = dynamic.trim();
                            if dynamic.is_empty() {
                                return Err(self.empty_tag(&tag));
                            }
                            codes.push(DynamicPartialCode::new(dynamic, tc, indent).into());
                        }
                        None => codes.push(PartialCode::new(tag.name.as_str(), tc, indent).into()),
                    }
                }
                Kind::Section | Kind::Negated | Kind::Extend | Kind::Block => {
                    flush(&mut text, &mut codes);
                    let body_start = self.pos;
                    let inner = self.parse_block(Some(&Open {
                        name: tag.name.clone(),
                        line: tag.line,
                        column: tag.column,
                    }))?;
                    let raw = &src[body_start..inner.body_end.max(body_start)];
                    let code = match tag.kind {
                        Kind::Section | Kind::Negated => SectionCode::new(
                            tag.name,
                            matches!(tag.kind, Kind::Negated),
                            tc,
                            inner.close,
                            raw,
                            inner.codes,
                        )
                        .into(),
                        Kind::Block => BlockCode::new(tag.name, tc, inner.close, inner.codes).into(),
                        _ => {
                            self.check_extend(&tag, &inner.codes)?;
                            ExtendCode::new(tag.name, tc, inner.close, inner.codes).into()
                        }
                    };
                    codes.push(code);
                }
                Kind::Close => {
                    let Some(open) = open else {
                        return Err(CompileError::UnexpectedClose {
                            file: self.file.to_string(),
                            line: tag.line,
                            column: tag.column,
                            name: tag.name,
                        });
                    };
                    if open.name != tag.name {
                        return Err(CompileError::MismatchedSection {
                            file: self.file.to_string(),
                            line: tag.line,
                            column: tag.column,
                            expected: open.name.clone(),
                            found: tag.name,
                        });
                    }
                    flush(&mut text, &mut codes);
                    let close = std::mem::replace(&mut self.delimiters, outer);
                    return Ok(Block {
                        codes,
                        body_end: tag.start - indent.len(),
                        close,
                    });
                }
            }
        }
    }

    /// If `tag` is alone on its line, the offset just past the line ending.
    fn standalone(&self, tag: &Tag) -> Option<usize> {
        if !tag.at_line_start {
            return None;
        }
        let rest = &self.src[self.pos..];
        let trimmed = rest.trim_start_matches([' ', '\t']);
        let after = self.pos + (rest.len() - trimmed.len());
        if trimmed.is_empty() {
            Some(after)
        } else if trimmed.starts_with("\r\n") {
            Some(after + 2)
        } else if trimmed.starts_with('\n') {
            Some(after + 1)
        } else {
            None
        }
    }

    fn pragma(&self, body: &str, text: &mut String) {
        let (name, args) = body
            .split_once(char::is_whitespace)
            .map(|(name, args)| (name, args.trim()))
            .unwrap_or((body, ""));
        match self.pragmas.get(name) {
            Some(handler) => {
                if let Some(output) = handler(args) {
                    text.push_str(&output);
                }
            }
            None => tracing::warn!(pragma = name, file = %self.file, line = self.line, "unknown pragma"),
        }
    }

    fn check_extend(&self, tag: &Tag, body: &[Code]) -> Result<(), CompileError> {
        let illegal = body
            .iter()
            .find(|code| !matches!(code, Code::Write(_) | Code::Block(_) | Code::Eof));
        match illegal {
            Some(code) => Err(CompileError::IllegalExtendContent {
                file: self.file.to_string(),
                line: code.context().map(|tc| tc.line).unwrap_or(tag.line),
                column: tag.column,
                name: tag.name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn empty_tag(&self, tag: &Tag) -> CompileError {
        CompileError::EmptyTag {
            file: self.file.to_string(),
            line: tag.line,
            column: tag.column,
        }
    }
}

/// Move pending literal text into `codes`, merging with a preceding write.
fn flush(text: &mut String, codes: &mut Vec<Code>) {
    if text.is_empty() {
        return;
    }
    if let Some(Code::Write(previous)) = codes.last_mut() {
        let mut merged = String::with_capacity(previous.len() + text.len());
        merged.push_str(previous);
        merged.push_str(text);
        *previous = Arc::from(merged);
        text.clear();
        return;
    }
    codes.push(Code::Write(Arc::from(std::mem::take(text).as_str())));
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::code::identity;

    fn compile(source: &str) -> Result<Vec<Code>, CompileError> {
        parse(source, "test.mustache", Delimiters::default(), &HashMap::new())
    }

    #[test]
    fn test_plain_text_is_one_write() {
        let codes = compile("hello\nworld").unwrap();
        assert_eq!(codes.len(), 2);
        assert!(matches!(&codes[0], Code::Write(text) if &**text == "hello\nworld"));
        assert!(matches!(codes[1], Code::Eof));
    }

    #[test]
    fn test_comment_text_coalesces() {
        let codes = compile("a{{! note }}b").unwrap();
        assert_eq!(codes.len(), 2);
        assert_eq!(identity(&codes), "ab");
    }

    #[test]
    fn test_value_forms() {
        let codes = compile("{{a}}{{{b}}}{{& c }}").unwrap();
        match (&codes[0], &codes[1], &codes[2]) {
            (Code::Value(a), Code::Value(b), Code::Value(c)) => {
                assert!(a.is_encoded());
                assert!(!b.is_encoded());
                assert!(!c.is_encoded());
                assert_eq!(c.name(), "c");
            }
            other => panic!("unexpected nodes: {:?}", other),
        }
    }

    #[test]
    fn test_nested_sections() {
        let codes = compile("{{#a}}{{#b}}x{{/b}}{{/a}}").unwrap();
        let Code::Section(outer) = &codes[0] else {
            panic!("expected section");
        };
        assert_eq!(outer.name(), "a");
        assert_eq!(outer.raw(), "{{#b}}x{{/b}}");
        assert!(matches!(&outer.body()[0], Code::Section(inner) if inner.name() == "b"));
    }

    #[test]
    fn test_standalone_section_lines_are_removed() {
        let codes = compile("|\n  {{#a}}\nbody\n  {{/a}}\n|").unwrap();
        let Code::Section(section) = &codes[1] else {
            panic!("expected section");
        };
        assert_eq!(identity(section.body()), "body\n");
        assert_eq!(section.raw(), "body\n");
        assert_eq!(identity(&codes), "|\n{{#a}}body\n{{/a}}|");
    }

    #[test]
    fn test_inline_tags_keep_whitespace() {
        let codes = compile(" {{#a}} x {{/a}} \n").unwrap();
        assert_eq!(identity(&codes), " {{#a}} x {{/a}} \n");
    }

    #[test]
    fn test_standalone_crlf() {
        let codes = compile("|\r\n{{! comment }}\r\n|").unwrap();
        assert_eq!(identity(&codes), "|\r\n|");
    }

    #[test]
    fn test_standalone_partial_records_indent() {
        let codes = compile("  {{>item}}\n").unwrap();
        let Code::Partial(partial) = &codes[0] else {
            panic!("expected partial");
        };
        assert_eq!(partial.indent(), "  ");
        assert!(partial.context().start_of_line);
    }

    #[test]
    fn test_dynamic_partial() {
        let codes = compile("{{>*page}}").unwrap();
        assert!(matches!(&codes[0], Code::DynamicPartial(p) if p.name() == "page"));
    }

    #[test]
    fn test_delimiter_change() {
        let codes = compile("{{=<% %>=}}<%name%> {{name}}").unwrap();
        let Code::Value(value) = &codes[0] else {
            panic!("expected value");
        };
        assert_eq!(&*value.context().delimiters.start, "<%");
        assert_eq!(identity(&codes), "<%name%> {{name}}");
    }

    #[test]
    fn test_even_length_delimiter_split() {
        let codes = compile("{{=[[]]=}}[[x]]").unwrap();
        assert!(matches!(&codes[0], Code::Value(v) if v.name() == "x"));
    }

    #[test]
    fn test_delimiters_restored_after_section() {
        let codes = compile("{{#a}}{{=| |=}}|x||/a|{{y}}").unwrap();
        assert!(matches!(&codes[1], Code::Value(v) if v.name() == "y"));
        assert_eq!(identity(&codes), "{{#a}}|x||/a|{{y}}");
    }

    #[test]
    fn test_invalid_delimiters() {
        let err = compile("\n{{=<%%=}}").unwrap_err();
        assert!(matches!(err, CompileError::InvalidDelimiters { line: 2, .. }));
        let err = compile("{{=a b c=}}").unwrap_err();
        assert!(matches!(err, CompileError::InvalidDelimiters { .. }));
    }

    #[test]
    fn test_unterminated_tag() {
        let err = compile("line one\nline {{two").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnterminatedTag {
                file: "test.mustache".to_string(),
                line: 2,
                column: 6,
                expected: "}}".to_string(),
            }
        );
    }

    #[test]
    fn test_improperly_closed_variable() {
        let err = compile("{{{name}}").unwrap_err();
        assert!(matches!(err, CompileError::ImproperlyClosedVariable { line: 1, column: 1, .. }));
    }

    #[test]
    fn test_mismatched_section() {
        let err = compile("{{#a}}\n\n{{/b}}").unwrap_err();
        assert!(matches!(
            err,
            CompileError::MismatchedSection { line: 3, ref expected, ref found, .. }
                if expected == "a" && found == "b"
        ));
    }

    #[test]
    fn test_unclosed_and_unexpected() {
        let err = compile("x\n{{#open}}").unwrap_err();
        assert!(matches!(err, CompileError::UnclosedSection { line: 2, .. }));
        let err = compile("{{/stray}}").unwrap_err();
        assert!(matches!(err, CompileError::UnexpectedClose { .. }));
    }

    #[test]
    fn test_empty_tags() {
        assert!(matches!(compile("{{}}").unwrap_err(), CompileError::EmptyTag { .. }));
        assert!(matches!(compile("{{# }}").unwrap_err(), CompileError::EmptyTag { .. }));
        assert!(matches!(compile("{{>*}}").unwrap_err(), CompileError::EmptyTag { .. }));
    }

    #[test]
    fn test_extend_rejects_values() {
        let err = compile("{{<parent}}\n{{name}}{{/parent}}").unwrap_err();
        assert!(matches!(err, CompileError::IllegalExtendContent { line: 2, .. }));
    }

    #[test]
    fn test_extend_with_blocks() {
        let codes = compile("{{<parent}}\n  {{$title}}Hi{{/title}}\n{{/parent}}").unwrap();
        let Code::Extend(extend) = &codes[0] else {
            panic!("expected extend");
        };
        assert!(extend.replacements().contains_key("title"));
    }

    #[test]
    fn test_pragma_handlers() {
        let mut pragmas: HashMap<String, PragmaHandler> = HashMap::new();
        pragmas.insert("SHOUT".to_string(), Arc::new(|args: &str| Some(args.to_uppercase())));
        let codes = parse("a {{%SHOUT hey}} b{{%UNKNOWN}}", "t", Delimiters::default(), &pragmas).unwrap();
        assert_eq!(identity(&codes), "a HEY b");
    }
}
