#[cfg(test)]
mod typescript_tests {
    use crate::ast::*;
    use crate::parse;

    #[test]
    fn test_type_declarations_are_erased() {
        let source = r#"
            import type { FC } from "react";
            interface ButtonProps extends Base<string> {
                label: string;
                onClick?: () => void;
            }
            type Variant = "primary" | "ghost";
            declare global {
                interface Window { analytics: any }
            }
            export type { Variant as V };
        "#;

        let program = parse(source).unwrap();
        assert!(program.body.is_empty(), "{:?}", program.body);
    }

    #[test]
    fn test_annotations_are_skipped() {
        let source = r#"
            const count: number = 1;
            function add(a: number, b?: number): number { return a + (b ?? 0); }
            const names = ["a"] as const;
            const el = document.getElementById("root")!;
            const map = new Map<string, Array<number>>();
            const [value, setValue] = useState<string | null>(null);
            const f = async (input: { id: string }): Promise<void> => {};
            const g = <T,>(x: T): T => x;
        "#;

        let result = parse(source);
        assert!(result.is_ok(), "Parse error: {:?}", result.err());
        assert_eq!(result.unwrap().body.len(), 8);
    }

    #[test]
    fn test_generic_call_is_a_call() {
        let program = parse("useState<number>(0);").unwrap();
        match &program.body[0] {
            Statement::Expression {
                expression: Expression::Call { arguments, .. },
                ..
            } => assert_eq!(arguments.len(), 1),
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_less_than_is_not_a_generic_call() {
        let program = parse("for (let i = 0; i < items.length; i++) { total += i }").unwrap();
        assert!(matches!(program.body[0], Statement::For { .. }));
    }

    #[test]
    fn test_enum_becomes_object() {
        let program = parse("export enum Status { Idle, Busy = 5, Done }").unwrap();
        match &program.body[0] {
            Statement::ExportDecl { declaration, .. } => match declaration.as_ref() {
                Statement::VarDecl { declarators, .. } => {
                    assert_eq!(declarators[0].pattern, Pattern::Ident("Status".to_string()));
                    match &declarators[0].init {
                        Some(Expression::Object { properties, .. }) => {
                            assert_eq!(properties.len(), 3);
                            match &properties[2] {
                                ObjectProp::KeyValue {
                                    value:
                                        Expression::Literal {
                                            value: Literal::Number(n),
                                            ..
                                        },
                                    ..
                                } => assert_eq!(*n, 6.0),
                                other => panic!("unexpected {:?}", other),
                            }
                        }
                        other => panic!("unexpected {:?}", other),
                    }
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_import_forms() {
        let source = r#"
            import React, { useState, type FC, useEffect as useMount } from "react";
            import * as Icons from "lucide-react";
            import "./index.css";
        "#;
        let program = parse(source).unwrap();
        assert_eq!(program.body.len(), 3);
        match &program.body[0] {
            Statement::Import(import) => {
                assert_eq!(import.source, "react");
                assert_eq!(
                    import.specifiers,
                    vec![
                        ImportSpecifier::Default {
                            local: "React".to_string()
                        },
                        ImportSpecifier::Named {
                            imported: "useState".to_string(),
                            local: "useState".to_string()
                        },
                        ImportSpecifier::Named {
                            imported: "useEffect".to_string(),
                            local: "useMount".to_string()
                        },
                    ]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            &program.body[1],
            Statement::Import(ImportDecl { specifiers, .. })
                if specifiers == &vec![ImportSpecifier::Namespace { local: "Icons".to_string() }]
        ));
    }

    #[test]
    fn test_export_forms() {
        let source = r#"
            export * from "./a";
            export { default as Button } from "./Button";
            export default App;
        "#;
        let program = parse(source).unwrap();
        assert!(matches!(program.body[0], Statement::ExportAll { .. }));
        assert!(matches!(
            &program.body[1],
            Statement::ExportNamed { source: Some(source), .. } if source == "./Button"
        ));
        assert!(matches!(
            program.body[2],
            Statement::ExportDefault {
                value: ExportDefault::Expression(Expression::Ident { .. }),
                ..
            }
        ));
    }

    #[test]
    fn test_asi_and_return() {
        let source = "const a = 1\nconst b = a + 1\nfunction f() {\n  return\n}\n";
        let program = parse(source).unwrap();
        assert_eq!(program.body.len(), 3);
        match &program.body[2] {
            Statement::FunctionDecl(function) => match &function.body {
                FunctionBody::Block(body) => assert!(matches!(
                    body[0],
                    Statement::Return { argument: None, .. }
                )),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_template_literal() {
        let program = parse("const s = `Hello ${name}, you have ${count + 1} items`;").unwrap();
        match &program.body[0] {
            Statement::VarDecl { declarators, .. } => match &declarators[0].init {
                Some(Expression::Template {
                    quasis,
                    expressions,
                    ..
                }) => {
                    assert_eq!(quasis, &vec!["Hello ", ", you have ", " items"]);
                    assert_eq!(expressions.len(), 2);
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_destructuring_assignment() {
        let result = parse("let a, b; [a, b] = [b, a]; ({ a = 1 } = obj);");
        assert!(result.is_ok(), "Parse error: {:?}", result.err());
    }

    #[test]
    fn test_optional_chaining_and_nullish() {
        let result = parse("const n = user?.profile?.name ?? data?.[0]?.() ?? 'anon';");
        assert!(result.is_ok(), "Parse error: {:?}", result.err());
    }

    #[test]
    fn test_class_is_rejected() {
        let result = parse("class Boundary extends React.Component {}");
        assert!(matches!(
            result,
            Err(crate::ParseError::InvalidSyntax { line: 1, .. })
        ));
    }

    #[test]
    fn test_error_position() {
        let result = parse("const a = 1;\nconst = 2;");
        match result {
            Err(crate::ParseError::UnexpectedToken { line, column, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(column, 7);
            }
            other => panic!("Expected positioned error, got {:?}", other),
        }
    }
}
