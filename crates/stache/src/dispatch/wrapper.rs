//! Memoized accessors produced by a lookup

use std::sync::Arc;

use super::Guard;
use crate::scope::Scopes;
use crate::value::Value;

/// One step of member access.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Accessor {
    /// Map key or record field
    Key(Arc<str>),

    /// Member of a [`Resolvable`](crate::Resolvable) object
    Member(Arc<str>),
}

impl Accessor {
    /// The member name this accessor reads.
    pub fn name(&self) -> &str {
        match self {
            Accessor::Key(name) | Accessor::Member(name) => name,
        }
    }

    /// Read the member from `value`.
    pub fn read(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Accessor::Key(key), Value::Map(map)) => map.get(&**key).cloned(),
            (Accessor::Key(key), Value::Record(record)) => record.get(key).cloned(),
            (Accessor::Member(member), Value::Object(object)) => object.get(member),
            _ => None,
        }
    }

    /// Whether `value` has the member.
    pub fn present(&self, value: &Value) -> bool {
        match (self, value) {
            (Accessor::Key(key), Value::Map(map)) => map.contains_key(&**key),
            (Accessor::Key(key), Value::Record(record)) => record.contains(key),
            (Accessor::Member(member), Value::Object(object)) => object.has_member(member),
            _ => false,
        }
    }
}

/// Follow `path` from the scope at `index`, coercing every step.
///
/// Returns `None` if the slot does not exist or a step has no such member.
pub(crate) fn walk(scopes: &Scopes, index: usize, path: &[Accessor]) -> Option<Value> {
    let mut current = scopes.get(index)?.clone().coerce();
    for accessor in path {
        current = accessor.read(&current)?.coerce();
    }
    Some(current)
}

/// Where a found name lives: a scope slot and the chain of members below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Scope stack index, counted from the outermost scope
    pub index: usize,

    /// Members to follow from the slot
    pub path: Arc<[Accessor]>,
}

/// A memoized lookup decision.
///
/// A wrapper does not re-validate anything when called; it is only valid for
/// scope stacks on which all of its guards pass. A missing wrapper yields
/// [`Value::Null`] so misses are cached like hits.
#[derive(Debug, Clone)]
pub struct Wrapper {
    guards: Arc<[Guard]>,
    target: Option<Target>,
}

impl Wrapper {
    /// A wrapper that reads `path` from the scope at `index`.
    pub fn found(guards: Vec<Guard>, index: usize, path: Vec<Accessor>) -> Self {
        Self {
            guards: guards.into(),
            target: Some(Target {
                index,
                path: path.into(),
            }),
        }
    }

    /// A wrapper for a name that is not present.
    pub fn missing(guards: Vec<Guard>) -> Self {
        Self {
            guards: guards.into(),
            target: None,
        }
    }

    /// Guards that must pass for this wrapper to apply
    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    /// The resolved location, or `None` for a miss
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// Whether this wrapper records a miss
    pub fn is_missing(&self) -> bool {
        self.target.is_none()
    }

    /// Whether every guard passes against `scopes`.
    pub fn matches(&self, scopes: &Scopes) -> bool {
        self.guards.iter().all(|guard| guard.check(scopes))
    }

    /// Read the value this wrapper points at.
    pub fn call(&self, scopes: &Scopes) -> Value {
        self.target
            .as_ref()
            .and_then(|target| walk(scopes, target.index, &target.path))
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;

    #[test]
    fn test_accessor_reads_maps_and_records() {
        let map = Value::map([("name", "m")]);
        let record = Value::record(Record::new("R").with_field("name", "r"));
        let key = Accessor::Key(Arc::from("name"));

        assert_eq!(key.read(&map), Some(Value::from("m")));
        assert_eq!(key.read(&record), Some(Value::from("r")));
        assert!(key.present(&map));
        assert!(!key.present(&Value::Null));
        assert_eq!(key.name(), "name");
    }

    #[test]
    fn test_walk_follows_path() {
        let scopes = Scopes::from(Value::map([("a", Value::map([("b", Value::some(7))]))]));
        let path = vec![Accessor::Key(Arc::from("a")), Accessor::Key(Arc::from("b"))];
        assert_eq!(walk(&scopes, 0, &path), Some(Value::Int(7)));
        assert_eq!(walk(&scopes, 1, &path), None);
    }

    #[test]
    fn test_missing_wrapper_yields_null() {
        let scopes = Scopes::from(Value::Int(1));
        let wrapper = Wrapper::missing(vec![Guard::Depth(1)]);
        assert!(wrapper.is_missing());
        assert!(wrapper.matches(&scopes));
        assert_eq!(wrapper.call(&scopes), Value::Null);
    }

    #[test]
    fn test_found_wrapper_reads_slot() {
        let scopes: Scopes = vec![Value::Int(1), Value::Int(2)].into();
        let wrapper = Wrapper::found(vec![Guard::Depth(2)], 1, Vec::new());
        assert_eq!(wrapper.call(&scopes), Value::Int(2));
        assert_eq!(wrapper.target().map(|t| t.index), Some(1));
    }
}
