//! Cheap predicates that validate cached lookups

use std::sync::Arc;

use super::wrapper::{walk, Accessor};
use crate::scope::Scopes;
use crate::value::Shape;

/// A side-effect-free check over a scope stack.
///
/// Guards are collected while a name is looked up; a cached wrapper is reused
/// only when every guard it carries still passes. Equal guards hash equally,
/// so wrappers with identical guard sets deduplicate in a binding's cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Guard {
    /// The stack has exactly this many scopes
    Depth(usize),

    /// The slot at `index` has this shape
    Class {
        /// Scope stack index
        index: usize,
        /// Expected shape of the coerced slot
        shape: Shape,
    },

    /// The value reached by `path` from slot `index` does or does not have `key`
    Map {
        /// Scope stack index
        index: usize,
        /// Members followed from the slot before probing
        path: Arc<[Accessor]>,
        /// The member looked up
        key: Accessor,
        /// Whether the member was present
        present: bool,
    },

    /// The value reached by `path` from slot `index` has this shape
    Dot {
        /// Scope stack index
        index: usize,
        /// Members followed from the slot
        path: Arc<[Accessor]>,
        /// Expected shape of the intermediate value
        shape: Shape,
    },
}

impl Guard {
    /// Whether the guard passes against `scopes`.
    pub fn check(&self, scopes: &Scopes) -> bool {
        match self {
            Guard::Depth(depth) => scopes.len() == *depth,
            Guard::Class { index, shape } => scopes
                .get(*index)
                .map_or(false, |slot| slot.shape() == *shape),
            Guard::Map {
                index,
                path,
                key,
                present,
            } => walk(scopes, *index, path).map_or(false, |value| key.present(&value) == *present),
            Guard::Dot { index, path, shape } => {
                walk(scopes, *index, path).map_or(Shape::Null, |value| value.shape()) == *shape
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Record, Value};

    fn key(name: &str) -> Accessor {
        Accessor::Key(Arc::from(name))
    }

    #[test]
    fn test_depth_guard() {
        let scopes: Scopes = vec![Value::Null, Value::Null].into();
        assert!(Guard::Depth(2).check(&scopes));
        assert!(!Guard::Depth(1).check(&scopes));
    }

    #[test]
    fn test_class_guard_pins_record_type() {
        let scopes = Scopes::from(Value::record(Record::new("Item")));
        let item = Guard::Class {
            index: 0,
            shape: Shape::Record(Arc::from("Item")),
        };
        let user = Guard::Class {
            index: 0,
            shape: Shape::Record(Arc::from("User")),
        };
        assert!(item.check(&scopes));
        assert!(!user.check(&scopes));
        // Out of range slots never pass
        let far = Guard::Class {
            index: 3,
            shape: Shape::Null,
        };
        assert!(!far.check(&scopes));
    }

    #[test]
    fn test_map_guard_checks_presence() {
        let scopes = Scopes::from(Value::map([("a", 1)]));
        let present = Guard::Map {
            index: 0,
            path: Arc::from(Vec::new()),
            key: key("a"),
            present: true,
        };
        let absent = Guard::Map {
            index: 0,
            path: Arc::from(Vec::new()),
            key: key("b"),
            present: false,
        };
        assert!(present.check(&scopes));
        assert!(absent.check(&scopes));

        let other = Scopes::from(Value::map([("b", 1)]));
        assert!(!present.check(&other));
        assert!(!absent.check(&other));
    }

    #[test]
    fn test_dot_guard_checks_intermediate_shape() {
        let path: Arc<[Accessor]> = Arc::from(vec![key("a")]);
        let guard = Guard::Dot {
            index: 0,
            path,
            shape: Shape::Null,
        };
        assert!(guard.check(&Scopes::from(Value::map([("a", Value::Null)]))));
        assert!(guard.check(&Scopes::from(Value::map([("a", Value::none())]))));
        assert!(!guard.check(&Scopes::from(Value::map([("a", 1)]))));
    }

    #[test]
    fn test_equal_guards_hash_equal() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(Guard::Depth(1));
        set.insert(Guard::Depth(1));
        set.insert(Guard::Class {
            index: 0,
            shape: Shape::Map,
        });
        assert_eq!(set.len(), 2);
    }
}
