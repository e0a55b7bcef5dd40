//! Source transformer: parses a file and tags every JSX element with the
//! place it was written, so inspect events can point back at the source.

use glimpse_bundle::{Bundle, CompileFailure, CompiledModule};
use glimpse_common::{walk_jsx_element_mut, VirtualFileStore, VisitorMut};
use glimpse_parser::ast::{JsxAttrValue, JsxAttribute, JsxElement, JsxName, Program};
use glimpse_parser::parse;
use tracing::{debug, instrument};

pub const SOURCE_PATH_ATTR: &str = "data-source-path";
pub const SOURCE_LOC_ATTR: &str = "data-source-loc";

/// Adds `data-source-path` and `data-source-loc` to non-fragment JSX
pub struct SourceTagger<'a> {
    path: &'a str,
    tagged: usize,
}

impl<'a> SourceTagger<'a> {
    pub fn new(path: &'a str) -> Self {
        Self { path, tagged: 0 }
    }

    pub fn tag(mut self, program: &mut Program) -> usize {
        self.visit_program_mut(program);
        self.tagged
    }
}

impl VisitorMut for SourceTagger<'_> {
    fn visit_jsx_element_mut(&mut self, element: &mut JsxElement) {
        if !matches!(element.name, JsxName::Fragment) && !element.has_attribute(SOURCE_PATH_ATTR) {
            element.attributes.push(JsxAttribute::Named {
                name: SOURCE_PATH_ATTR.to_string(),
                value: Some(JsxAttrValue::String(self.path.to_string())),
            });
            element.attributes.push(JsxAttribute::Named {
                name: SOURCE_LOC_ATTR.to_string(),
                value: Some(JsxAttrValue::String(format!(
                    "{}:{}",
                    element.span.line, element.span.column
                ))),
            });
            self.tagged += 1;
        }
        walk_jsx_element_mut(self, element);
    }
}

/// Compile one code file
#[instrument(skip(source), fields(len = source.len()))]
pub fn compile(path: &str, source: &str) -> Result<CompiledModule, CompileFailure> {
    let mut program = parse(source).map_err(|error| CompileFailure {
        path: path.to_string(),
        source: source.to_string(),
        error,
    })?;
    let tagged = SourceTagger::new(path).tag(&mut program);
    debug!(path, tagged, "compiled module");
    Ok(CompiledModule::new(path, program))
}

/// Compile every code file of the store into `bundle`; returns the failure count
pub fn compile_all(store: &VirtualFileStore, bundle: &mut Bundle) -> usize {
    let mut failures = 0;
    for (path, source) in store.code_files() {
        match compile(path, source) {
            Ok(module) => bundle.add_module(module),
            Err(failure) => {
                failures += 1;
                bundle.add_failure(failure);
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimpse_bundle::{Resolver, VirtualAssetRegistry};
    use glimpse_common::{walk_jsx_element, Visitor};

    #[derive(Default)]
    struct Tags {
        found: Vec<(String, Option<String>)>,
    }

    impl Visitor for Tags {
        fn visit_jsx_element(&mut self, element: &JsxElement) {
            let loc = element.attributes.iter().find_map(|attr| match attr {
                JsxAttribute::Named {
                    name,
                    value: Some(JsxAttrValue::String(value)),
                } if name == SOURCE_LOC_ATTR => Some(value.clone()),
                _ => None,
            });
            let name = match &element.name {
                JsxName::Intrinsic(tag) => tag.clone(),
                JsxName::Component(parts) => parts.join("."),
                JsxName::Fragment => "<>".to_string(),
            };
            self.found.push((name, loc));
            walk_jsx_element(self, element);
        }
    }

    #[test]
    fn test_elements_are_tagged_except_fragments() {
        let source = "export default function App() {\n  return (\n    <>\n      <div className=\"a\">\n        <Card.Title>Hi</Card.Title>\n      </div>\n    </>\n  );\n}\n";
        let module = compile("src/App.tsx", source).unwrap();
        let mut tags = Tags::default();
        tags.visit_program(&module.program);
        assert_eq!(
            tags.found,
            vec![
                ("<>".to_string(), None),
                ("div".to_string(), Some("4:7".to_string())),
                ("Card.Title".to_string(), Some("5:9".to_string())),
            ]
        );
    }

    #[test]
    fn test_syntax_error_becomes_failure() {
        let store = VirtualFileStore::new(vec![
            ("src/App.tsx", "export default function App() { return <div>; }"),
            ("src/ok.ts", "export const ok = 1;"),
            ("src/styles.css", "body {}"),
        ]);
        let mut bundle = Bundle::new(Resolver::default(), VirtualAssetRegistry::new());
        assert_eq!(compile_all(&store, &mut bundle), 1);
        assert!(bundle.get_failure("src/App.tsx").is_some());
        assert!(bundle.get_module("src/ok.ts").is_some());
        assert_eq!(bundle.module_count(), 1);
    }
}
