use crate::ast::*;
use crate::parse;

fn first_jsx(source: &str) -> JsxElement {
    let program = parse(source).unwrap_or_else(|e| panic!("Parse error: {:?}", e));
    for stmt in program.body {
        if let Statement::Expression {
            expression: Expression::Jsx(element),
            ..
        } = stmt
        {
            return *element;
        }
        if let Statement::VarDecl { declarators, .. } = stmt {
            if let Some(Expression::Jsx(element)) = declarators.into_iter().next().and_then(|d| d.init) {
                return *element;
            }
        }
    }
    panic!("no JSX element found");
}

#[test]
fn test_nested_elements_and_text() {
    let element = first_jsx(
        r#"
        const view = (
            <section className="hero">
                <h1>Welcome back</h1>
                <p>
                    Glad to
                    see you
                </p>
            </section>
        );
        "#,
    );

    assert_eq!(element.name, JsxName::Intrinsic("section".to_string()));
    assert!(element.has_attribute("className"));
    let elements: Vec<_> = element
        .children
        .iter()
        .filter_map(|c| match c {
            JsxChild::Element(el) => Some(el),
            _ => None,
        })
        .collect();
    assert_eq!(elements.len(), 2);
    assert_eq!(
        elements[1].children,
        vec![JsxChild::Text("Glad to see you".to_string())]
    );
}

#[test]
fn test_text_with_apostrophes_and_entities() {
    let element = first_jsx(r#"<p>Don't stop &mdash; it's fine</p>;"#);
    assert_eq!(
        element.children,
        vec![JsxChild::Text("Don't stop — it's fine".to_string())]
    );
}

#[test]
fn test_expression_children_and_comments() {
    let element = first_jsx(
        r#"
        <ul>
            {/* the list */}
            {items.map((item) => (
                <li key={item.id}>{item.label}</li>
            ))}
        </ul>;
        "#,
    );
    assert_eq!(element.children.len(), 1);
    assert!(matches!(element.children[0], JsxChild::Expression(_)));
}

#[test]
fn test_fragment() {
    let element = first_jsx("<><A /><B /></>;");
    assert_eq!(element.name, JsxName::Fragment);
    assert_eq!(element.children.len(), 2);
}

#[test]
fn test_member_component_and_spread() {
    let element = first_jsx(r#"<Card.Header {...props} title="Hi" disabled />;"#);
    assert_eq!(
        element.name,
        JsxName::Component(vec!["Card".to_string(), "Header".to_string()])
    );
    assert!(matches!(element.attributes[0], JsxAttribute::Spread(_)));
    assert!(matches!(
        &element.attributes[2],
        JsxAttribute::Named { name, value: None } if name == "disabled"
    ));
}

#[test]
fn test_dashed_attribute_names() {
    let element = first_jsx(r#"<button aria-label="Close" data-testid="x" />;"#);
    assert!(element.has_attribute("aria-label"));
    assert!(element.has_attribute("data-testid"));
}

#[test]
fn test_multiline_attribute_string() {
    let element = first_jsx(
        "<div className=\"flex items-center\n    justify-between\">x</div>;",
    );
    match &element.attributes[0] {
        JsxAttribute::Named {
            value: Some(JsxAttrValue::String(value)),
            ..
        } => assert!(value.contains("justify-between")),
        other => panic!("unexpected attribute {:?}", other),
    }
}

#[test]
fn test_conditional_rendering() {
    let program = parse(
        r#"
        function View({ open }) {
            return (
                <div>
                    {open && <Modal />}
                    {open ? <span>yes</span> : null}
                </div>
            );
        }
        "#,
    );
    assert!(program.is_ok(), "Parse error: {:?}", program.err());
}

#[test]
fn test_mismatched_closing_tag() {
    let result = parse("<div><span></div></span>;");
    assert!(result.is_err());
}

#[test]
fn test_unclosed_element() {
    let result = parse("const a = <div>hello");
    assert!(matches!(
        result,
        Err(crate::ParseError::UnexpectedEof { .. })
    ));
}

#[test]
fn test_element_span_points_at_tag() {
    let element = first_jsx("\n\n    <main>x</main>;");
    assert_eq!(element.span.line, 3);
    assert_eq!(element.span.column, 5);
}
