pub mod ast;
pub mod error;
pub mod location;
pub mod parser;
pub mod tokenizer;

#[cfg(test)]
mod tests_jsx;
#[cfg(test)]
mod tests_typescript;

pub use error::{format_error, ParseError, ParseResult};
pub use location::LineIndex;
pub use parser::{parse, Parser};
pub use tokenizer::{tokenize, Token};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expression, Statement};

    #[test]
    fn test_tokenizer_basic() {
        let source = "const answer = 42";
        let tokens = tokenize(source);
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn test_declared_exports_in_source_order() {
        let source = r#"
            export const Header = () => null;
            export function Footer() { return null }
            const a = 1, b = 2;
            export { a as Alpha, b };
        "#;
        let program = parse(source).unwrap();
        assert_eq!(
            program.declared_exports(),
            vec!["Header", "Footer", "Alpha", "b"]
        );
    }

    #[test]
    fn test_regex_literal() {
        let program = parse(r#"const slug = name.replace(/[^a-z/]+/gi, "-") / 2;"#).unwrap();
        let Statement::VarDecl { declarators, .. } = &program.body[0] else {
            panic!("expected declaration");
        };
        let Some(Expression::Binary { left, .. }) = &declarators[0].init else {
            panic!("expected division");
        };
        let Expression::Call { arguments, .. } = left.as_ref() else {
            panic!("expected call");
        };
        match &arguments[0] {
            ast::Argument::Item(Expression::Regex { pattern, flags, .. }) => {
                assert_eq!(pattern, "[^a-z/]+");
                assert_eq!(flags, "gi");
            }
            other => panic!("expected regex, got {:?}", other),
        }
    }
}
