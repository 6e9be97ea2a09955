//! Tests for guarded lookup caching across changing data shapes

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use stache::*;

fn binding(name: &str) -> Binding {
    Binding::new(name, &TemplateContext::default())
}

struct Product {
    title: &'static str,
    stocked: bool,
}

impl Resolvable for Product {
    fn get(&self, member: &str) -> Option<Value> {
        match member {
            "getTitle" => Some(Value::from(self.title)),
            "isStocked" => Some(Value::Bool(self.stocked)),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        "Product"
    }
}

/// One of several data shapes that all answer `name`, or do not.
fn shaped(kind: u8, tag: i64) -> Value {
    match kind % 6 {
        0 => Value::map([("name", Value::Int(tag))]),
        1 => Value::record(Record::new("Named").with_field("getName", tag)),
        2 => Value::record(Record::new("Other").with_field("id", tag)),
        3 => Value::map([("other", Value::Int(tag))]),
        4 => Value::some(Value::map([("name", Value::Int(tag))])),
        _ => Value::Int(tag),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Shape Changes
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_template_survives_shape_changes() {
    let template = Engine::new().compile_str("{{name}}", "shapes").unwrap();
    let s1 = Value::map([("name", "map")]);
    let s2 = Value::record(Record::new("User").with_field("getName", "record"));

    assert_eq!(template.render_to_string(s1.clone()).unwrap(), "map");
    assert_eq!(template.render_to_string(s2.clone()).unwrap(), "record");
    assert_eq!(template.render_to_string(s1).unwrap(), "map");
    assert_eq!(template.render_to_string(s2).unwrap(), "record");

    let Some(Code::Value(code)) = template.codes().first() else {
        panic!("expected a value tag");
    };
    assert_eq!(code.binding().cached_len(), 2);
}

#[test]
fn test_binding_tracks_scope_depth() {
    let handler = DefaultObjectHandler::new();
    let binding = binding("name");
    let shallow = Scopes::from(Value::map([("name", "outer")]));
    let deep: Scopes = vec![Value::map([("name", "outer")]), Value::map([("name", "inner")])].into();

    assert_eq!(binding.get(&shallow, &handler, false), Value::from("outer"));
    assert_eq!(binding.get(&deep, &handler, false), Value::from("inner"));
    assert_eq!(binding.get(&shallow, &handler, false), Value::from("outer"));
}

#[test]
fn test_binding_sees_member_appear() {
    let handler = DefaultObjectHandler::new();
    let binding = binding("name");
    let without: Scopes = vec![Value::map([("name", "outer")]), Value::map([("x", 1)])].into();
    let with: Scopes = vec![Value::map([("name", "outer")]), Value::map([("name", "inner")])].into();

    assert_eq!(binding.get(&without, &handler, false), Value::from("outer"));
    assert_eq!(binding.get(&with, &handler, false), Value::from("inner"));
    assert_eq!(binding.get(&without, &handler, false), Value::from("outer"));
}

#[test]
fn test_binding_dotted_shape_change() {
    let handler = DefaultObjectHandler::new();
    let binding = binding("a.b");
    let nested = Scopes::from(Value::map([("a", Value::map([("b", "deep")]))]));
    let scalar = Scopes::from(Value::map([("a", Value::Int(1))]));
    let record = Scopes::from(Value::map([(
        "a",
        Value::record(Record::new("A").with_field("getB", "getter")),
    )]));

    assert_eq!(binding.get(&nested, &handler, false), Value::from("deep"));
    assert_eq!(binding.get(&scalar, &handler, false), Value::Null);
    assert_eq!(binding.get(&record, &handler, false), Value::from("getter"));
    assert_eq!(binding.get(&nested, &handler, false), Value::from("deep"));
}

#[test]
fn test_resolvable_accessors() {
    let handler = DefaultObjectHandler::new();
    let product = Scopes::from(Value::object(Product {
        title: "lamp",
        stocked: false,
    }));
    assert_eq!(binding("title").get(&product, &handler, false), Value::from("lamp"));
    assert_eq!(binding("stocked").get(&product, &handler, false), Value::Bool(false));
    assert_eq!(binding("price").get(&product, &handler, false), Value::Null);

    let template = Engine::new()
        .compile_str("{{title}}{{^stocked}} (sold out){{/stocked}}", "product")
        .unwrap();
    let out = template
        .render_to_string(Value::object(Product {
            title: "lamp",
            stocked: false,
        }))
        .unwrap();
    assert_eq!(out, "lamp (sold out)");
}

#[test]
fn test_optional_scope_values() {
    let handler = DefaultObjectHandler::new();
    let binding = binding("name");
    let present = Scopes::from(Value::some(Value::map([("name", "ada")])));
    let absent: Scopes = vec![Value::map([("name", "outer")]), Value::none()].into();

    assert_eq!(binding.get(&present, &handler, false), Value::from("ada"));
    assert_eq!(binding.get(&absent, &handler, false), Value::from("outer"));
}

#[test]
fn test_strict_miss_still_resolves_null() {
    let handler = DefaultObjectHandler::new();
    let scopes = Scopes::from(Value::map([("a", 1)]));
    assert_eq!(binding("missing").get(&scopes, &handler, true), Value::Null);
}

#[test]
fn test_cache_is_bounded() {
    let handler = DefaultObjectHandler::new();
    let binding = binding("name");
    for depth in 1..64 {
        let scopes: Scopes = (0..depth).map(|i| Value::map([("name", Value::Int(i))])).collect();
        assert_eq!(binding.get(&scopes, &handler, false), Value::Int(depth - 1));
    }
    assert!(binding.cached_len() <= 32);
}

// ═══════════════════════════════════════════════════════════════════════
// Properties
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn test_cached_lookup_matches_fresh_lookup(
        stacks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..4), 1..24),
        name in prop::sample::select(vec!["name", "id", "other", "."]),
    ) {
        let handler = DefaultObjectHandler::new();
        let binding = binding(name);
        for (round, kinds) in stacks.iter().enumerate() {
            let scopes: Scopes = kinds
                .iter()
                .enumerate()
                .map(|(i, kind)| shaped(*kind, (round * 10 + i) as i64))
                .collect();
            let cached = binding.get(&scopes, &handler, false);
            let fresh = handler.resolve(name, &scopes);
            prop_assert_eq!(cached, fresh);
        }
    }
}
