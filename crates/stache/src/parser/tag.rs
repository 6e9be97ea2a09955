//! Tag lexing

use super::Parser;
use crate::context::Delimiters;
use crate::error::CompileError;

/// What a tag does, decided by its leading sigil.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Kind {
    /// `{{name}}`, `{{{name}}}` or `{{&name}}`
    Value { encoded: bool, triple: bool },
    /// `{{#name}}`
    Section,
    /// `{{^name}}`
    Negated,
    /// `{{/name}}`
    Close,
    /// `{{>name}}` or `{{>*name}}`
    Partial,
    /// `{{! ... }}`
    Comment,
    /// `{{=start end=}}`
    Delimiters(Delimiters),
    /// `{{%NAME args}}`
    Pragma,
    /// `{{<name}}`
    Extend,
    /// `{{$name}}`
    Block,
}

impl Kind {
    /// Whether the tag is removed together with its line when it stands alone.
    pub(super) fn may_stand_alone(&self) -> bool {
        !matches!(self, Kind::Value { .. })
    }
}

/// One lexed tag.
#[derive(Debug)]
pub(super) struct Tag {
    pub(super) kind: Kind,
    /// The name, or the pragma body for [`Kind::Pragma`]
    pub(super) name: String,
    /// Byte offset of the opening delimiter
    pub(super) start: usize,
    /// Byte offset of the start of the tag's line
    pub(super) line_start: usize,
    pub(super) line: usize,
    pub(super) column: usize,
    /// Only spaces and tabs precede the tag on its line
    pub(super) at_line_start: bool,
    /// Delimiters the tag was written with
    pub(super) delimiters: Delimiters,
}

impl Parser<'_> {
    /// Lex the tag whose opening delimiter is at the current position.
    pub(super) fn lex(&mut self) -> Result<Tag, CompileError> {
        let src = self.src;
        let start = self.pos;
        let line = self.line;
        let line_start = self.line_start;
        let column = self.column(start);
        let at_line_start = src[line_start..start].bytes().all(|b| b == b' ' || b == b'\t');
        let delimiters = self.delimiters.clone();
        let end = &*delimiters.end;
        let inner = start + delimiters.start.len();

        let (content, tag_end, triple) = if src[inner..].starts_with('{') {
            let closer = format!("}}{}", end);
            match src[inner + 1..].find(&closer) {
                Some(i) => (&src[inner + 1..inner + 1 + i], inner + 1 + i + closer.len(), true),
                None if src[inner..].contains(end) => {
                    return Err(CompileError::ImproperlyClosedVariable {
                        file: self.file.to_string(),
                        line,
                        column,
                    })
                }
                None => return Err(self.unterminated(line, column, end)),
            }
        } else {
            match src[inner..].find(end) {
                Some(i) => (&src[inner..inner + i], inner + i + end.len(), false),
                None => return Err(self.unterminated(line, column, end)),
            }
        };

        let (kind, name) = self.classify(content.trim(), triple, line, column)?;
        self.advance(tag_end - start);

        Ok(Tag {
            kind,
            name,
            start,
            line_start,
            line,
            column,
            at_line_start,
            delimiters,
        })
    }

    fn classify(
        &self,
        content: &str,
        triple: bool,
        line: usize,
        column: usize,
    ) -> Result<(Kind, String), CompileError> {
        let empty = || CompileError::EmptyTag {
            file: self.file.to_string(),
            line,
            column,
        };

        if triple {
            if content.is_empty() {
                return Err(empty());
            }
            return Ok((Kind::Value { encoded: false, triple: true }, content.to_string()));
        }

        let Some(sigil) = content.chars().next() else {
            return Err(empty());
        };
        let kind = match sigil {
            '!' => return Ok((Kind::Comment, String::new())),
            '=' => {
                let delimiters = self.delimiters_directive(content, line, column)?;
                return Ok((Kind::Delimiters(delimiters), String::new()));
            }
            '#' => Kind::Section,
            '^' => Kind::Negated,
            '/' => Kind::Close,
            '>' => Kind::Partial,
            '&' => Kind::Value { encoded: false, triple: false },
            '%' => Kind::Pragma,
            '<' => Kind::Extend,
            '$' => Kind::Block,
            _ => return Ok((Kind::Value { encoded: true, triple: false }, content.to_string())),
        };

        let name = content[sigil.len_utf8()..].trim();
        if name.is_empty() {
            return Err(empty());
        }
        Ok((kind, name.to_string()))
    }

    /// Parse `=start end=`, or `=startend=` split in half when no space separates them.
    fn delimiters_directive(&self, content: &str, line: usize, column: usize) -> Result<Delimiters, CompileError> {
        let invalid = || CompileError::InvalidDelimiters {
            file: self.file.to_string(),
            line,
            column,
            directive: content.to_string(),
        };

        let body = content
            .strip_prefix('=')
            .and_then(|rest| rest.strip_suffix('='))
            .ok_or_else(invalid)?
            .trim();
        let parts: Vec<&str> = body.split_whitespace().collect();
        let delimiters = match parts.as_slice() {
            [start, end] => Delimiters::new(*start, *end),
            [both] if both.len() % 2 == 0 && both.is_char_boundary(both.len() / 2) => {
                let (start, end) = both.split_at(both.len() / 2);
                Delimiters::new(start, end)
            }
            _ => return Err(invalid()),
        };

        if !delimiters.is_valid() {
            return Err(invalid());
        }
        Ok(delimiters)
    }

    fn unterminated(&self, line: usize, column: usize, expected: &str) -> CompileError {
        CompileError::UnterminatedTag {
            file: self.file.to_string(),
            line,
            column,
            expected: expected.to_string(),
        }
    }
}
