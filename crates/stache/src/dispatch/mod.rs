//! Guarded dynamic dispatch: resolving names against heterogeneous scopes
//!
//! A lookup walks the scope stack and produces a [`Wrapper`] together with
//! the [`Guard`]s that justify it. Each tag owns a [`Binding`] that caches
//! wrappers by guard set, so repeated renders against the same data shapes
//! skip the search entirely.

mod binding;
mod guard;
mod wrapper;

pub use binding::Binding;
pub use guard::Guard;
pub use wrapper::{Accessor, Target, Wrapper};

use std::sync::Arc;

use crate::encode;
use crate::scope::Scopes;
use crate::value::Value;

/// Policy for resolving and presenting values.
///
/// Only [`find`](ObjectHandler::find) is required; the remaining methods
/// carry the default truthiness, iteration and encoding rules.
pub trait ObjectHandler: Send + Sync {
    /// Look up `name` and record the guards the decision depends on.
    ///
    /// Never fails: a miss yields a missing wrapper.
    fn find(&self, name: &str, scopes: &Scopes) -> Wrapper;

    /// Resolve `name` without going through a binding cache.
    fn resolve(&self, name: &str, scopes: &Scopes) -> Value {
        self.find(name, scopes).call(scopes)
    }

    /// Unwrap container values before they are used.
    fn coerce(&self, value: Value) -> Value {
        value.coerce()
    }

    /// Whether a section over `value` is skipped.
    ///
    /// Null, `false`, the empty string and empty collections are falsey.
    /// Every other value, including zero, is truthy.
    fn is_falsey(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Object(object) => object.items().map_or(false, |items| items.is_empty()),
            Value::Optional(inner) => inner.as_ref().as_ref().map_or(true, |v| self.is_falsey(v)),
            _ => false,
        }
    }

    /// The elements a section iterates over.
    ///
    /// Lists and iterable objects yield their elements; any other value
    /// yields itself once.
    fn iterate(&self, value: &Value) -> Vec<Value> {
        match value {
            Value::List(items) => items.as_ref().clone(),
            Value::Object(object) => object.items().unwrap_or_else(|| vec![value.clone()]),
            Value::Optional(inner) => match inner.as_ref() {
                Some(v) => self.iterate(v),
                None => Vec::new(),
            },
            other => vec![other.clone()],
        }
    }

    /// The text a value interpolates as.
    fn stringify(&self, value: &Value) -> String {
        value.to_string()
    }

    /// Encode interpolated text, appending to `out`.
    fn encode(&self, text: &str, out: &mut String) {
        encode::escape_html_into(text, out);
    }
}

/// Resolves names against maps, records and [`Resolvable`](crate::Resolvable)
/// objects.
///
/// Scopes are searched innermost first. Maps match on the exact key; records
/// and objects match `name`, then `getName`, then `isName`. For a dotted name
/// the first segment is searched this way and the remaining segments are
/// read from that result only. A missing or null intermediate resolves the
/// whole name to null.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultObjectHandler;

impl DefaultObjectHandler {
    /// Create the default handler
    pub fn new() -> Self {
        Self
    }
}

impl ObjectHandler for DefaultObjectHandler {
    fn find(&self, name: &str, scopes: &Scopes) -> Wrapper {
        let mut guards = vec![Guard::Depth(scopes.len())];
        if name == "." {
            return match scopes.len() {
                0 => Wrapper::missing(guards),
                n => Wrapper::found(guards, n - 1, Vec::new()),
            };
        }

        let mut segments = name.split('.');
        let first = segments.next().unwrap_or(name);
        let rest: Vec<&str> = segments.collect();

        for (index, slot) in scopes.iter().enumerate().rev() {
            let slot = slot.clone().coerce();
            guards.push(Guard::Class {
                index,
                shape: slot.shape(),
            });
            let Some(accessor) = accessor_for(&slot, first, index, &[], &mut guards) else {
                continue;
            };

            let mut current = accessor.read(&slot).map_or(Value::Null, Value::coerce);
            let mut path = vec![accessor];
            for segment in &rest {
                guards.push(Guard::Dot {
                    index,
                    path: Arc::from(path.as_slice()),
                    shape: current.shape(),
                });
                match accessor_for(&current, segment, index, &path, &mut guards) {
                    Some(accessor) => {
                        current = accessor.read(&current).map_or(Value::Null, Value::coerce);
                        path.push(accessor);
                    }
                    None => return Wrapper::missing(guards),
                }
            }
            return Wrapper::found(guards, index, path);
        }

        Wrapper::missing(guards)
    }

    fn resolve(&self, name: &str, scopes: &Scopes) -> Value {
        if name == "." {
            return scopes.top().cloned().map_or(Value::Null, Value::coerce);
        }

        let mut segments = name.split('.');
        let first = segments.next().unwrap_or(name);
        let rest: Vec<&str> = segments.collect();

        for slot in scopes.iter().rev() {
            let Some(mut current) = member(&slot.clone().coerce(), first) else {
                continue;
            };
            for segment in &rest {
                match member(&current.coerce(), segment) {
                    Some(value) => current = value,
                    None => return Value::Null,
                }
            }
            return current.coerce();
        }

        Value::Null
    }
}

/// Candidate member names for `name`: itself, then `getName`, then `isName`.
fn accessor_names(name: &str) -> [Arc<str>; 3] {
    let mut chars = name.chars();
    let capitalized: String = match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    [
        Arc::from(name),
        Arc::from(format!("get{}", capitalized)),
        Arc::from(format!("is{}", capitalized)),
    ]
}

/// Find the accessor for `name` on `value`, recording a presence guard for
/// every candidate tried.
fn accessor_for(
    value: &Value,
    name: &str,
    index: usize,
    path: &[Accessor],
    guards: &mut Vec<Guard>,
) -> Option<Accessor> {
    if name.is_empty() {
        return None;
    }
    let candidates: Vec<Accessor> = match value {
        Value::Map(_) => vec![Accessor::Key(Arc::from(name))],
        Value::Record(_) => accessor_names(name).into_iter().map(Accessor::Key).collect(),
        Value::Object(_) => accessor_names(name).into_iter().map(Accessor::Member).collect(),
        _ => return None,
    };

    let path: Arc<[Accessor]> = Arc::from(path);
    for accessor in candidates {
        let present = accessor.present(value);
        guards.push(Guard::Map {
            index,
            path: Arc::clone(&path),
            key: accessor.clone(),
            present,
        });
        if present {
            return Some(accessor);
        }
    }
    None
}

/// Direct member read with the same candidate order as [`accessor_for`].
fn member(value: &Value, name: &str) -> Option<Value> {
    if name.is_empty() {
        return None;
    }
    match value {
        Value::Map(map) => map.get(name).cloned(),
        Value::Record(record) => accessor_names(name)
            .iter()
            .find_map(|candidate| record.get(candidate).cloned()),
        Value::Object(object) => accessor_names(name)
            .iter()
            .find(|candidate| object.has_member(candidate))
            .map(|candidate| object.get(candidate).unwrap_or(Value::Null)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Record, Resolvable};

    struct Account {
        owner: &'static str,
        active: bool,
    }

    impl Resolvable for Account {
        fn get(&self, member: &str) -> Option<Value> {
            match member {
                "getOwner" => Some(Value::from(self.owner)),
                "isActive" => Some(Value::Bool(self.active)),
                _ => None,
            }
        }
    }

    #[test]
    fn test_find_innermost_wins() {
        let handler = DefaultObjectHandler::new();
        let scopes: Scopes = vec![
            Value::map([("name", "outer")]),
            Value::map([("name", "inner")]),
        ]
        .into();
        let wrapper = handler.find("name", &scopes);
        assert_eq!(wrapper.call(&scopes), Value::from("inner"));
        assert_eq!(wrapper.target().map(|t| t.index), Some(1));
    }

    #[test]
    fn test_find_falls_back_to_outer_scope() {
        let handler = DefaultObjectHandler::new();
        let scopes: Scopes = vec![Value::map([("name", "outer")]), Value::Int(3)].into();
        assert_eq!(handler.find("name", &scopes).call(&scopes), Value::from("outer"));
    }

    #[test]
    fn test_find_accessor_style_members() {
        let handler = DefaultObjectHandler::new();
        let scopes = Scopes::from(Value::object(Account {
            owner: "ada",
            active: true,
        }));
        assert_eq!(handler.find("owner", &scopes).call(&scopes), Value::from("ada"));
        assert_eq!(handler.find("active", &scopes).call(&scopes), Value::Bool(true));
        assert!(handler.find("missing", &scopes).is_missing());
    }

    #[test]
    fn test_find_record_prefers_exact_field() {
        let handler = DefaultObjectHandler::new();
        let record = Record::new("Item")
            .with_field("getPrice", 2)
            .with_field("price", 1);
        let scopes = Scopes::from(Value::record(record));
        assert_eq!(handler.find("price", &scopes).call(&scopes), Value::Int(1));
    }

    #[test]
    fn test_find_dot_is_top() {
        let handler = DefaultObjectHandler::new();
        let scopes: Scopes = vec![Value::Int(1), Value::from("top")].into();
        assert_eq!(handler.find(".", &scopes).call(&scopes), Value::from("top"));
        assert!(handler.find(".", &Scopes::new()).is_missing());
    }

    #[test]
    fn test_dotted_name_does_not_fall_back() {
        let handler = DefaultObjectHandler::new();
        // `a` is found in the inner scope, which lacks `b`; the outer `a.b` is ignored
        let scopes: Scopes = vec![
            Value::map([("a", Value::map([("b", "outer")]))]),
            Value::map([("a", Value::map([("c", "inner")]))]),
        ]
        .into();
        let wrapper = handler.find("a.b", &scopes);
        assert!(wrapper.is_missing());
        assert_eq!(handler.resolve("a.b", &scopes), Value::Null);
    }

    #[test]
    fn test_dotted_name_null_intermediate() {
        let handler = DefaultObjectHandler::new();
        let scopes = Scopes::from(Value::map([("a", Value::Null)]));
        let wrapper = handler.find("a.b.c", &scopes);
        assert!(wrapper.is_missing());
        assert_eq!(wrapper.call(&scopes), Value::Null);
    }

    #[test]
    fn test_dotted_name_through_optional() {
        let handler = DefaultObjectHandler::new();
        let scopes = Scopes::from(Value::map([(
            "user",
            Value::some(Value::map([("name", "ada")])),
        )]));
        assert_eq!(handler.find("user.name", &scopes).call(&scopes), Value::from("ada"));
        assert_eq!(handler.resolve("user.name", &scopes), Value::from("ada"));
    }

    #[test]
    fn test_empty_segment_is_a_miss() {
        let handler = DefaultObjectHandler::new();
        let scopes = Scopes::from(Value::map([(
            "a",
            Value::record(Record::new("A").with_field("get", "GOT").with_field("is", true)),
        )]));
        assert!(handler.find("a.", &scopes).is_missing());
        assert_eq!(handler.resolve("a.", &scopes), Value::Null);
        assert!(handler.find(".a", &scopes).is_missing());
    }

    #[test]
    fn test_truthiness_rules() {
        let handler = DefaultObjectHandler::new();
        assert!(handler.is_falsey(&Value::Null));
        assert!(handler.is_falsey(&Value::Bool(false)));
        assert!(handler.is_falsey(&Value::from("")));
        assert!(handler.is_falsey(&Value::list([])));
        assert!(handler.is_falsey(&Value::none()));
        assert!(!handler.is_falsey(&Value::Int(0)));
        assert!(!handler.is_falsey(&Value::from("x")));
        assert!(!handler.is_falsey(&Value::map([("a", 1)])));
        assert!(!handler.is_falsey(&Value::lambda(|s| s.to_string())));
    }

    #[test]
    fn test_iterate_rules() {
        let handler = DefaultObjectHandler::new();
        let list = Value::list([Value::Int(1), Value::Int(2)]);
        assert_eq!(handler.iterate(&list).len(), 2);
        let single = Value::map([("a", 1)]);
        assert_eq!(handler.iterate(&single), vec![single.clone()]);
    }

    #[test]
    fn test_accessor_names() {
        let names = accessor_names("name");
        let names: Vec<&str> = names.iter().map(|n| &**n).collect();
        assert_eq!(names, vec!["name", "getName", "isName"]);
    }
}
