//! Template parsing and rendering through the public API

use pretty_assertions::assert_eq;

use stencil_forge::template::{parse, RenderContext, Value};
use stencil_forge::DiagnosticCode;

fn render(template: &str, context: &RenderContext) -> String {
    parse(template).expect("template should parse").render(context)
}

#[test]
fn test_substitution() {
    let template = "Hello {{ name }}!";
    assert_eq!(render(template, &RenderContext::new().with("name", "World")), "Hello World!");
    assert_eq!(render(template, &RenderContext::new()), "Hello !");
}

#[test]
fn test_list_section() {
    let template = "{{#items}}[{{.}}]{{/items}}";
    let items = RenderContext::new().with("items", vec!["a", "b"]);
    assert_eq!(render(template, &items), "[a][b]");
    let empty = RenderContext::new().with("items", Vec::<String>::new());
    assert_eq!(render(template, &empty), "");
}

#[test]
fn test_sections_over_maps() {
    let template = "{{#fields}}{{ Name }}: {{ Type }}; {{/fields}}done";
    let fields = vec![
        Value::Map(RenderContext::new().with("Name", "Id").with("Type", "int")),
        Value::Map(RenderContext::new().with("Name", "Title").with("Type", "string")),
    ];
    let context = RenderContext::new().with("fields", Value::List(fields));
    insta::assert_snapshot!(render(template, &context), @"Id: int; Title: string; done");
}

#[test]
fn test_boolean_sections() {
    let template = "a{{#enabled}}-on{{/enabled}}b";
    assert_eq!(render(template, &RenderContext::new().with("enabled", true)), "a-onb");
    assert_eq!(render(template, &RenderContext::new().with("enabled", false)), "ab");
    assert_eq!(render(template, &RenderContext::new()), "ab");
}

#[test]
fn test_rendering_is_idempotent() {
    let definition = parse("{{ Level }}/{{#tags}}{{.}},{{/tags}}").unwrap();
    let context = RenderContext::new()
        .with("Level", "Debug")
        .with("tags", vec!["x", "y"]);
    let first = definition.render(&context);
    assert_eq!(definition.render(&context), first);
    assert_eq!(first, "Debug/x,y,");
}

#[test]
fn test_top_level_identifiers() {
    let definition = parse("{{ a }}{{#list}}{{ b }}{{/list}}{{ a }}").unwrap();
    assert_eq!(definition.identifiers(), ["a".to_string(), "list".to_string()]);
}

#[test]
fn test_syntax_errors_map_to_codes() {
    let cases = [
        ("{{#open}}text", DiagnosticCode::UnclosedSection),
        ("text{{/close}}", DiagnosticCode::UnmatchedClose),
        ("{{#a}}x{{/b}}", DiagnosticCode::MismatchedClose),
        ("{{ }}", DiagnosticCode::EmptyIdentifier),
        ("{{ bad name }}", DiagnosticCode::MalformedTag),
    ];
    for (template, code) in cases {
        let errors = parse(template).expect_err(template);
        assert_eq!(errors[0].kind.code(), code, "{}", template);
    }
}

#[test]
fn test_syntax_error_diagnostic() {
    let source = "before {{#items}}[{{.}}]";
    let errors = parse(source).unwrap_err();
    let diagnostic = errors[0].to_diagnostic("Body", source);
    assert_eq!(diagnostic.code, DiagnosticCode::UnclosedSection);
    assert_eq!(diagnostic.snippet.as_ref().map(|s| s.span.clone()), Some(7..17));
    assert!(diagnostic.format().contains("GB1001"));
}
