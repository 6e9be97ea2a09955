//! Per-call-site lookup caches

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::{ObjectHandler, Wrapper};
use crate::context::TemplateContext;
use crate::error::{RenderError, Result};
use crate::scope::Scopes;
use crate::value::Value;

/// Upper bound on distinct scope shapes remembered per call site.
const MAX_WRAPPERS: usize = 32;

/// The cache of lookup decisions for one name at one tag.
///
/// Readers load the current wrapper list without locking and try each
/// wrapper whose guards pass. On a miss the binding performs a fresh lookup under a lock,
/// double-checking that another thread has not already added a matching
/// wrapper, and publishes a grown copy of the list. A guard failure always
/// falls through to the next wrapper or to a fresh lookup, so a value found
/// for one shape is never returned for another.
#[derive(Debug)]
pub struct Binding {
    name: Arc<str>,
    file: Arc<str>,
    line: usize,
    partial: bool,
    snapshot: ArcSwap<Vec<Wrapper>>,
    grow: Mutex<()>,
}

impl Binding {
    /// Create a binding for `name` at the tag described by `tc`.
    pub fn new(name: impl Into<Arc<str>>, tc: &TemplateContext) -> Self {
        Self {
            name: name.into(),
            file: Arc::clone(&tc.file),
            line: tc.line,
            partial: false,
            snapshot: ArcSwap::from_pointee(Vec::new()),
            grow: Mutex::new(()),
        }
    }

    /// Create a binding for a partial tag; its misses are expected and never logged.
    pub fn for_partial(name: impl Into<Arc<str>>, tc: &TemplateContext) -> Self {
        Self {
            partial: true,
            ..Self::new(name, tc)
        }
    }

    /// The name being resolved
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of cached wrappers
    pub fn cached_len(&self) -> usize {
        self.snapshot.load().len()
    }

    /// Resolve the name against `scopes`, consulting the cache first.
    ///
    /// A name found in no scope resolves to [`Value::Null`].
    pub fn get(&self, scopes: &Scopes, handler: &dyn ObjectHandler, strict: bool) -> Value {
        self.lookup(scopes, handler, strict).0
    }

    /// Like [`get`](Self::get), but a name found in no scope fails with
    /// [`RenderError::Missing`] when `fail_on_miss` is set.
    pub fn try_get(
        &self,
        scopes: &Scopes,
        handler: &dyn ObjectHandler,
        strict: bool,
        fail_on_miss: bool,
    ) -> Result<Value> {
        let (value, missing) = self.lookup(scopes, handler, strict);
        if missing && fail_on_miss {
            return Err(RenderError::Missing {
                name: self.name.to_string(),
                file: self.file.to_string(),
                line: self.line,
            }
            .into());
        }
        Ok(value)
    }

    /// The resolved value and whether the name was missing.
    fn lookup(&self, scopes: &Scopes, handler: &dyn ObjectHandler, strict: bool) -> (Value, bool) {
        if let Some(hit) = self.cached(scopes) {
            return hit;
        }

        let _grow = self.grow.lock();
        if let Some(hit) = self.cached(scopes) {
            return hit;
        }

        let wrapper = handler.find(&self.name, scopes);
        let missing = wrapper.is_missing();
        if missing && strict && !self.partial {
            tracing::warn!(
                name = %self.name,
                file = %self.file,
                line = self.line,
                "failed to find name in scopes"
            );
        }
        let value = wrapper.call(scopes);
        self.insert(wrapper);
        (value, missing)
    }

    fn cached(&self, scopes: &Scopes) -> Option<(Value, bool)> {
        self.snapshot
            .load()
            .iter()
            .find(|wrapper| wrapper.matches(scopes))
            .map(|wrapper| (wrapper.call(scopes), wrapper.is_missing()))
    }

    /// Publish a grown copy of the wrapper list. Callers hold `grow`.
    fn insert(&self, wrapper: Wrapper) {
        let current = self.snapshot.load_full();
        if current.iter().any(|w| w.guards() == wrapper.guards()) {
            return;
        }
        if current.len() >= MAX_WRAPPERS {
            tracing::trace!(name = %self.name, "binding cache full");
            return;
        }
        let mut grown = Vec::with_capacity(current.len() + 1);
        grown.extend(current.iter().cloned());
        grown.push(wrapper);
        let wrappers = grown.len();
        self.snapshot.store(Arc::new(grown));
        tracing::trace!(name = %self.name, wrappers, "binding cache grew");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DefaultObjectHandler;
    use crate::error::MustacheError;
    use crate::value::Record;

    fn binding(name: &str) -> Binding {
        Binding::new(name, &TemplateContext::default())
    }

    #[test]
    fn test_hit_reuses_wrapper() {
        let handler = DefaultObjectHandler::new();
        let binding = binding("name");
        let scopes = Scopes::from(Value::map([("name", "a")]));

        assert_eq!(binding.get(&scopes, &handler, false), Value::from("a"));
        assert_eq!(binding.get(&scopes, &handler, false), Value::from("a"));
        assert_eq!(binding.cached_len(), 1);
    }

    #[test]
    fn test_same_shape_different_data() {
        let handler = DefaultObjectHandler::new();
        let binding = binding("name");

        let first = Scopes::from(Value::map([("name", "a")]));
        let second = Scopes::from(Value::map([("name", "b")]));
        assert_eq!(binding.get(&first, &handler, false), Value::from("a"));
        assert_eq!(binding.get(&second, &handler, false), Value::from("b"));
        assert_eq!(binding.cached_len(), 1);
    }

    #[test]
    fn test_shape_change_falls_through() {
        let handler = DefaultObjectHandler::new();
        let binding = binding("name");

        let map = Scopes::from(Value::map([("name", "from map")]));
        let record = Scopes::from(Value::record(
            Record::new("User").with_field("getName", "from record"),
        ));
        let empty = Scopes::from(Value::map([("other", 1)]));

        assert_eq!(binding.get(&map, &handler, false), Value::from("from map"));
        assert_eq!(binding.get(&record, &handler, false), Value::from("from record"));
        assert_eq!(binding.get(&empty, &handler, false), Value::Null);
        assert_eq!(binding.get(&map, &handler, false), Value::from("from map"));
        assert_eq!(binding.cached_len(), 3);
    }

    #[test]
    fn test_try_get_reports_misses() {
        let handler = DefaultObjectHandler::new();
        let tc = TemplateContext::new(Default::default(), "page", 4, false);
        let binding = Binding::new("missing", &tc);
        let scopes = Scopes::from(Value::map([("present", Value::Null)]));

        assert_eq!(binding.try_get(&scopes, &handler, false, false).unwrap(), Value::Null);
        // The cached miss must still fail
        match binding.try_get(&scopes, &handler, false, true) {
            Err(MustacheError::Render(RenderError::Missing { name, file, line })) => {
                assert_eq!(name, "missing");
                assert_eq!(file, "page");
                assert_eq!(line, 4);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let present = Binding::new("present", &tc);
        assert_eq!(present.try_get(&scopes, &handler, false, true).unwrap(), Value::Null);
    }

    #[test]
    fn test_concurrent_lookups_share_cache() {
        let handler = DefaultObjectHandler::new();
        let binding = binding("name");
        let shapes = [
            Scopes::from(Value::map([("name", "map")])),
            Scopes::from(Value::record(Record::new("User").with_field("getName", "record"))),
            vec![Value::map([("name", "outer")]), Value::map([("x", 1)])].into(),
            Scopes::from(Value::map([("other", 1)])),
        ];

        std::thread::scope(|s| {
            for t in 0..8 {
                let (binding, handler, shapes) = (&binding, &handler, &shapes);
                s.spawn(move || {
                    for round in 0..200 {
                        let scopes = &shapes[(t + round) % shapes.len()];
                        assert_eq!(binding.get(scopes, handler, false), handler.resolve("name", scopes));
                    }
                });
            }
        });
        assert!(binding.cached_len() <= shapes.len());
    }

    #[test]
    fn test_partial_binding_name() {
        let binding = Binding::for_partial("header", &TemplateContext::default());
        assert_eq!(binding.name(), "header");
        assert!(binding.partial);
    }
}
