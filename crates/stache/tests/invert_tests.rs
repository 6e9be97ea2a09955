//! Tests for recovering data from rendered output

use pretty_assertions::assert_eq;
use stache::*;

fn compile(source: &str) -> Template {
    Engine::new().compile_str(source, "invert.mustache").expect("compile failed")
}

// ═══════════════════════════════════════════════════════════════════════
// Values and Sections
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_invert_value_between_text() {
    let template = compile("test {{value}} test");
    assert_eq!(
        template.invert("test value test"),
        Some(Value::map([("value", "value")]))
    );
}

#[test]
fn test_invert_repeated_section() {
    let template = compile("{{#values}}\ntest: {{value}}\n{{/values}}");
    let expected = Value::map([(
        "values",
        Value::list([
            Value::map([("value", "sam")]),
            Value::map([("value", "fred")]),
        ]),
    )]);
    assert_eq!(template.invert("test: sam\ntest: fred\n"), Some(expected));
}

#[test]
fn test_invert_value_runs_to_end_of_section() {
    let template = compile("{{#page}}This is a {{test}}{{/page}}");
    let data = template.invert("This is a good day").expect("inverted");
    let expected = Value::map([(
        "page",
        Value::list([Value::map([("test", "good day")])]),
    )]);
    assert_eq!(data, expected);
}

#[test]
fn test_invert_current_item_and_flags() {
    let template = compile("{{#admin}}(admin) {{/admin}}{{#tags}}[{{.}}]{{/tags}}");
    let data = template.invert("(admin) [a][b]").expect("inverted");
    let expected = Value::map([
        ("admin", Value::Bool(true)),
        ("tags", Value::list(["a".into(), "b".into()])),
    ]);
    assert_eq!(data, expected);
}

#[test]
fn test_invert_dotted_names_nest() {
    let template = compile("{{user.name}} <{{user.email}}>");
    let expected = Value::map([(
        "user",
        Value::map([("name", "Ada"), ("email", "ada@example.com")]),
    )]);
    assert_eq!(template.invert("Ada <ada@example.com>"), Some(expected));
}

#[test]
fn test_invert_decodes_escaped_values() {
    let template = compile("{{{html}}}|{{html}}");
    assert_eq!(
        template.invert("<b>|&lt;b&gt;"),
        Some(Value::map([("html", "<b>")]))
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Round Trips
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_render_invert_render() {
    let template = compile(
        "<ul>{{#items}}<li>{{name}}: {{price}}</li>{{/items}}</ul>{{^items}}none{{/items}}",
    );
    let cases = [
        Value::map([(
            "items",
            Value::list([
                Value::map([("name", "Fish & Chips"), ("price", "4")]),
                Value::map([("name", "<Pie>"), ("price", "3.50")]),
            ]),
        )]),
        Value::map([("items", Value::list([]))]),
    ];
    for data in cases {
        let rendered = template.render_to_string(data).unwrap();
        let recovered = template.invert(&rendered).expect("inverted");
        assert_eq!(template.render_to_string(recovered).unwrap(), rendered);
    }
}

#[test]
fn test_inverted_data_matches_original_strings() {
    let template = compile("{{#people}}{{name}} is {{age}};{{/people}}");
    let data = Value::map([(
        "people",
        Value::list([
            Value::map([("name", "ada"), ("age", "36")]),
            Value::map([("name", "alan"), ("age", "41")]),
        ]),
    )]);
    let rendered = template.render_to_string(data.clone()).unwrap();
    assert_eq!(rendered, "ada is 36;alan is 41;");
    assert_eq!(template.invert(&rendered), Some(data));
}

// ═══════════════════════════════════════════════════════════════════════
// Failures
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_invert_rejects_mismatched_text() {
    let template = compile("test {{value}} test");
    assert_eq!(template.invert("best value test"), None);
    assert_eq!(template.invert("test value"), None);
}

#[test]
fn test_invert_rejects_trailing_text() {
    let template = compile("Hi {{name}}!");
    assert_eq!(template.invert("Hi ada!"), Some(Value::map([("name", "ada")])));
    assert_eq!(template.invert("Hi ada!!"), None);
}

#[test]
fn test_invert_rejects_conflicting_values() {
    let template = compile("{{x}}-{{x}}");
    assert_eq!(template.invert("a-a"), Some(Value::map([("x", "a")])));
    assert_eq!(template.invert("a-b"), None);
}

#[test]
fn test_invert_rejects_ambiguous_and_external_nodes() {
    assert_eq!(compile("{{a}}{{b}}").invert("xy"), None);
    assert_eq!(compile("[{{>footer}}]").invert("[]"), None);
}
