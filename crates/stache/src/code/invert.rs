//! Recovering data from rendered output
//!
//! Inversion walks a code tree against text the tree rendered and rebuilds a
//! value that renders the same text. Literal text must match exactly. A value
//! tag takes everything up to the next literal that can follow it. A section
//! repeats its body while the body keeps matching. Partials and extends have
//! no inverse, so trees that contain them never invert.

use indexmap::IndexMap;

use super::{Code, SectionCode, ValueCode};
use crate::encode;
use crate::value::Value;

/// Name bound by `{{.}}` inside a section body.
const CURRENT: &str = ".";

/// Recover a value that renders `codes` as `text`.
pub(crate) fn invert(codes: &[Code], text: &str) -> Option<Value> {
    let mut inverter = Inverter { text, pos: 0 };
    let mut bindings = Bindings::default();
    if !inverter.codes(codes, &Follow::end(), &mut bindings) {
        return None;
    }
    bindings.0.shift_remove(CURRENT);
    Some(bindings.into_value())
}

/// What may come after a node: one of several literals, or the end of input.
#[derive(Debug, Clone, Default)]
struct Follow<'c> {
    literals: Vec<&'c str>,
    end: bool,
}

impl<'c> Follow<'c> {
    fn end() -> Self {
        Self {
            literals: Vec::new(),
            end: true,
        }
    }

    /// The follow of `codes[index]`, or `None` when the next node is a tag
    /// and the boundary is ambiguous.
    fn at(codes: &'c [Code], index: usize, outer: &Follow<'c>) -> Option<Follow<'c>> {
        match codes.get(index + 1) {
            None => Some(outer.clone()),
            Some(Code::Write(text)) => Some(Follow {
                literals: vec![&**text],
                end: false,
            }),
            Some(Code::Eof) => Some(Follow::end()),
            Some(Code::Block(block)) => match first_literal(block.body()) {
                Some(text) => Some(Follow {
                    literals: vec![text],
                    end: false,
                }),
                None if block.body().is_empty() => Follow::at(codes, index + 1, outer),
                None => None,
            },
            Some(_) => None,
        }
    }
}

fn first_literal(codes: &[Code]) -> Option<&str> {
    match codes.first() {
        Some(Code::Write(text)) => Some(text),
        _ => None,
    }
}

/// Names recovered so far, nested by dotted path.
#[derive(Debug, Clone, Default)]
struct Bindings(IndexMap<String, Slot>);

#[derive(Debug, Clone)]
enum Slot {
    Value(Value),
    Nested(Bindings),
}

impl Bindings {
    /// Bind `name`, failing when it already holds a different value.
    fn bind(&mut self, name: &str, value: Value) -> bool {
        let (head, tail) = match name.split_once('.') {
            Some((head, tail)) if !head.is_empty() => (head, Some(tail)),
            _ => (name, None),
        };
        match (tail, self.0.get_mut(head)) {
            (None, None) => {
                self.0.insert(head.to_string(), Slot::Value(value));
                true
            }
            (None, Some(Slot::Value(existing))) => *existing == value,
            (None, Some(Slot::Nested(_))) => false,
            (Some(tail), None) => {
                let mut nested = Bindings::default();
                let bound = nested.bind(tail, value);
                self.0.insert(head.to_string(), Slot::Nested(nested));
                bound
            }
            (Some(tail), Some(Slot::Nested(nested))) => nested.bind(tail, value),
            (Some(_), Some(Slot::Value(_))) => false,
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        match (name.split_once('.'), self.0.get(name)) {
            (_, Some(_)) => true,
            (Some((head, tail)), None) => match self.0.get(head) {
                Some(Slot::Nested(nested)) => nested.is_bound(tail),
                _ => false,
            },
            (None, None) => false,
        }
    }

    fn into_value(self) -> Value {
        Value::map(self.0.into_iter().map(|(name, slot)| {
            let value = match slot {
                Slot::Value(value) => value,
                Slot::Nested(nested) => nested.into_value(),
            };
            (name, value)
        }))
    }

    /// One section iteration as a value: the `{{.}}` text when the body
    /// interpolated it, otherwise a map of the names the body bound.
    fn into_item(mut self) -> Value {
        match self.0.shift_remove(CURRENT) {
            Some(Slot::Value(value)) => value,
            _ => self.into_value(),
        }
    }
}

struct Inverter<'t> {
    text: &'t str,
    pos: usize,
}

impl<'t> Inverter<'t> {
    fn rest(&self) -> &'t str {
        &self.text[self.pos..]
    }

    /// Match `codes` in order. On failure the position is restored.
    fn codes(&mut self, codes: &[Code], follow: &Follow<'_>, out: &mut Bindings) -> bool {
        let start = self.pos;
        for (index, code) in codes.iter().enumerate() {
            let matched = match code {
                Code::Write(text) => self.literal(text),
                Code::Eof => self.pos == self.text.len(),
                Code::Block(block) => {
                    let next = Follow::at(codes, index, follow).unwrap_or_default();
                    self.codes(block.body(), &next, out)
                }
                Code::Value(value) => match Follow::at(codes, index, follow) {
                    Some(next) => self.value(value, &next, out),
                    None => false,
                },
                Code::Section(section) => {
                    let next = Follow::at(codes, index, follow);
                    self.section(section, next, out)
                }
                Code::Partial(_) | Code::DynamicPartial(_) | Code::Extend(_) => false,
            };
            if !matched {
                tracing::trace!(pos = self.pos, code = ?code.name(), "inversion stopped");
                self.pos = start;
                return false;
            }
        }
        true
    }

    fn literal(&mut self, text: &str) -> bool {
        if self.rest().starts_with(text) {
            self.pos += text.len();
            true
        } else {
            false
        }
    }

    fn value(&mut self, code: &ValueCode, follow: &Follow<'_>, out: &mut Bindings) -> bool {
        let rest = self.rest();
        let len = follow
            .literals
            .iter()
            .filter_map(|literal| rest.find(literal))
            .min()
            .or(if follow.end { Some(rest.len()) } else { None });
        let Some(len) = len else {
            return false;
        };

        let raw = &rest[..len];
        let text = if code.is_encoded() {
            encode::unescape_html(raw)
        } else {
            raw.to_string()
        };
        if !out.bind(code.name(), Value::from(text)) {
            return false;
        }
        self.pos += len;
        true
    }

    fn section(&mut self, code: &SectionCode, follow: Option<Follow<'_>>, out: &mut Bindings) -> bool {
        let body = code.body();
        if body.is_empty() {
            return true;
        }

        if code.is_negated() {
            // A present body means the name was falsey; an absent one, truthy
            let follow = follow.unwrap_or_default();
            let mut present = out.clone();
            if self.codes(body, &follow, &mut present) {
                *out = present;
                return true;
            }
            return out.is_bound(code.name()) || out.bind(code.name(), Value::Bool(true));
        }

        let mut repeat = follow.unwrap_or_default();
        if let Some(text) = first_literal(body) {
            repeat.literals.push(text);
        }

        let mut items = Vec::new();
        loop {
            let before = self.pos;
            let mut item = Bindings::default();
            if !self.codes(body, &repeat, &mut item) || self.pos == before {
                self.pos = before;
                break;
            }
            items.push(item);
        }

        match items.len() {
            0 => true,
            1 if items[0].0.is_empty() => out.bind(code.name(), Value::Bool(true)),
            _ => {
                let items = items.into_iter().map(Bindings::into_item);
                out.bind(code.name(), Value::list(items))
            }
        }
    }
}
