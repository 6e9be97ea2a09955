//! Value representation for template data

mod callable;
mod display;
mod impls;
mod record;

pub use callable::{Deferred, DeferredFn, Lambda, LambdaFn, LambdaKind};
pub use record::Record;

use std::sync::Arc;

use indexmap::IndexMap;

/// Data a template is rendered against.
///
/// Values are organized into three tiers:
/// - Tier 1: Inline primitives (no allocation)
/// - Tier 2: Heap-allocated compound types (Arc-wrapped, cheap to clone)
/// - Tier 3: Callable types (lambdas, deferred computations)
#[derive(Clone)]
pub enum Value {
    // ═══════════════════════════════════════════════════════════════════
    // Tier 1: Inline Primitives
    // ═══════════════════════════════════════════════════════════════════
    /// Absent or null data
    Null,

    /// Boolean: `true` or `false`
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating point
    Float(f64),

    // ═══════════════════════════════════════════════════════════════════
    // Tier 2: Heap-Allocated Compound Types
    // ═══════════════════════════════════════════════════════════════════
    /// Immutable string
    String(Arc<str>),

    /// Ordered list, iterated by sections
    List(Arc<Vec<Value>>),

    /// String-keyed map, preserving insertion order
    Map(Arc<IndexMap<String, Value>>),

    /// Named record with ordered fields
    Record(Arc<Record>),

    /// Arbitrary host object resolved through [`Resolvable`]
    Object(Arc<dyn Resolvable>),

    /// Optional-like container, unwrapped before use
    Optional(Arc<Option<Value>>),

    // ═══════════════════════════════════════════════════════════════════
    // Tier 3: Callable Types
    // ═══════════════════════════════════════════════════════════════════
    /// Text transform applied to a section body or value
    Lambda(Lambda),

    /// Computation whose output is spliced in document order
    Deferred(Deferred),
}

/// Dynamic member access for host objects.
///
/// Implement this to expose a Rust type to templates without converting it
/// into a map. Member lookup tries `name`, then `getName`, then `isName`, so
/// accessor-style names work as well as plain field names.
///
/// # Example
///
/// ```
/// use stache::{Resolvable, Value};
///
/// struct User {
///     name: String,
///     admin: bool,
/// }
///
/// impl Resolvable for User {
///     fn get(&self, member: &str) -> Option<Value> {
///         match member {
///             "name" => Some(Value::from(self.name.as_str())),
///             "isAdmin" => Some(Value::Bool(self.admin)),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Resolvable: Send + Sync {
    /// Read a member by name, or `None` if the object has no such member.
    fn get(&self, member: &str) -> Option<Value>;

    /// Whether the object has a member with this name.
    ///
    /// Guards call this on every cached lookup, so override it when `get`
    /// is expensive.
    fn has_member(&self, member: &str) -> bool {
        self.get(member).is_some()
    }

    /// Elements to iterate when the object drives a section.
    ///
    /// `None` means the object is not a collection and iterates once over
    /// itself.
    fn items(&self) -> Option<Vec<Value>> {
        None
    }

    /// Type identity used to pin cached lookups to this implementation.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Runtime shape of a value, used by guards to pin cached lookups.
///
/// Optional values report the shape of their content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Null or absent
    Null,
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Float
    Float,
    /// String
    String,
    /// List
    List,
    /// Map
    Map,
    /// Record of the given type
    Record(Arc<str>),
    /// Host object of the given type
    Object(&'static str),
    /// Lambda
    Lambda,
    /// Deferred computation
    Deferred,
}

impl Value {
    /// Unwrap optional containers, mapping an empty one to [`Value::Null`].
    pub fn coerce(self) -> Value {
        match self {
            Value::Optional(inner) => match inner.as_ref() {
                Some(value) => value.clone().coerce(),
                None => Value::Null,
            },
            other => other,
        }
    }

    /// Shape of the value after coercion.
    pub fn shape(&self) -> Shape {
        match self {
            Value::Null => Shape::Null,
            Value::Bool(_) => Shape::Bool,
            Value::Int(_) => Shape::Int,
            Value::Float(_) => Shape::Float,
            Value::String(_) => Shape::String,
            Value::List(_) => Shape::List,
            Value::Map(_) => Shape::Map,
            Value::Record(record) => Shape::Record(Arc::clone(&record.type_name)),
            Value::Object(object) => Shape::Object(object.type_name()),
            Value::Optional(inner) => match inner.as_ref() {
                Some(value) => value.shape(),
                None => Shape::Null,
            },
            Value::Lambda(_) => Shape::Lambda,
            Value::Deferred(_) => Shape::Deferred,
        }
    }

    /// Get the type name of this value (for diagnostics).
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(record) => &record.type_name,
            Value::Object(object) => object.type_name(),
            Value::Optional(_) => "optional",
            Value::Lambda(_) => "lambda",
            Value::Deferred(_) => "deferred",
        }
    }
}
