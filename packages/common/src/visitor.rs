use glimpse_parser::ast::*;
use std::rc::Rc;

/// Visitor pattern for traversing AST nodes immutably
///
/// This trait provides default implementations that walk the entire tree.
/// Override specific visit_* methods to perform custom actions on nodes.
pub trait Visitor: Sized {
    fn visit_program(&mut self, program: &Program) {
        walk_program(self, program);
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        walk_statement(self, stmt);
    }

    fn visit_import(&mut self, _import: &ImportDecl) {
        // Leaf node, no children to walk
    }

    fn visit_function(&mut self, function: &FunctionDef) {
        walk_function(self, function);
    }

    fn visit_pattern(&mut self, pattern: &Pattern) {
        walk_pattern(self, pattern);
    }

    fn visit_expression(&mut self, expr: &Expression) {
        walk_expression(self, expr);
    }

    fn visit_jsx_element(&mut self, element: &JsxElement) {
        walk_jsx_element(self, element);
    }
}

/// Mutable visitor pattern for transforming AST nodes
///
/// Similar to Visitor, but provides mutable access to nodes.
/// Function bodies are shared behind `Rc`; walking them mutably clones any
/// body that is not uniquely owned.
pub trait VisitorMut: Sized {
    fn visit_program_mut(&mut self, program: &mut Program) {
        walk_program_mut(self, program);
    }

    fn visit_statement_mut(&mut self, stmt: &mut Statement) {
        walk_statement_mut(self, stmt);
    }

    fn visit_function_mut(&mut self, function: &mut FunctionDef) {
        walk_function_mut(self, function);
    }

    fn visit_pattern_mut(&mut self, pattern: &mut Pattern) {
        walk_pattern_mut(self, pattern);
    }

    fn visit_expression_mut(&mut self, expr: &mut Expression) {
        walk_expression_mut(self, expr);
    }

    fn visit_jsx_element_mut(&mut self, element: &mut JsxElement) {
        walk_jsx_element_mut(self, element);
    }
}

// Default walk implementations for immutable visitor

pub fn walk_program<V: Visitor>(visitor: &mut V, program: &Program) {
    for stmt in &program.body {
        visitor.visit_statement(stmt);
    }
}

pub fn walk_statement<V: Visitor>(visitor: &mut V, stmt: &Statement) {
    match stmt {
        Statement::VarDecl { declarators, .. } => {
            for declarator in declarators {
                visitor.visit_pattern(&declarator.pattern);
                if let Some(init) = &declarator.init {
                    visitor.visit_expression(init);
                }
            }
        }
        Statement::FunctionDecl(function) => visitor.visit_function(function),
        Statement::Expression { expression, .. } => visitor.visit_expression(expression),
        Statement::Return { argument, .. } => {
            if let Some(argument) = argument {
                visitor.visit_expression(argument);
            }
        }
        Statement::If {
            test,
            consequent,
            alternate,
            ..
        } => {
            visitor.visit_expression(test);
            visitor.visit_statement(consequent);
            if let Some(alternate) = alternate {
                visitor.visit_statement(alternate);
            }
        }
        Statement::Block(body) => {
            for stmt in body {
                visitor.visit_statement(stmt);
            }
        }
        Statement::For {
            init,
            test,
            update,
            body,
            ..
        } => {
            if let Some(init) = init {
                visitor.visit_statement(init);
            }
            if let Some(test) = test {
                visitor.visit_expression(test);
            }
            if let Some(update) = update {
                visitor.visit_expression(update);
            }
            visitor.visit_statement(body);
        }
        Statement::ForOf {
            pattern,
            iterable: target,
            body,
            ..
        }
        | Statement::ForIn {
            pattern,
            object: target,
            body,
            ..
        } => {
            visitor.visit_pattern(pattern);
            visitor.visit_expression(target);
            visitor.visit_statement(body);
        }
        Statement::While { test, body, .. } => {
            visitor.visit_expression(test);
            visitor.visit_statement(body);
        }
        Statement::Switch {
            discriminant,
            cases,
            ..
        } => {
            visitor.visit_expression(discriminant);
            for case in cases {
                if let Some(test) = &case.test {
                    visitor.visit_expression(test);
                }
                for stmt in &case.body {
                    visitor.visit_statement(stmt);
                }
            }
        }
        Statement::Throw { argument, .. } => visitor.visit_expression(argument),
        Statement::Try {
            block,
            param,
            handler,
            finalizer,
            ..
        } => {
            for stmt in block {
                visitor.visit_statement(stmt);
            }
            if let Some(param) = param {
                visitor.visit_pattern(param);
            }
            for stmt in handler.iter().chain(finalizer.iter()).flatten() {
                visitor.visit_statement(stmt);
            }
        }
        Statement::Import(import) => visitor.visit_import(import),
        Statement::ExportDecl { declaration, .. } => visitor.visit_statement(declaration),
        Statement::ExportDefault { value, .. } => match value {
            ExportDefault::Expression(expr) => visitor.visit_expression(expr),
            ExportDefault::Function(function) => visitor.visit_function(function),
        },
        Statement::ExportNamed { .. }
        | Statement::ExportAll { .. }
        | Statement::Break(_)
        | Statement::Continue(_)
        | Statement::Empty => {
            // Leaf nodes
        }
    }
}

pub fn walk_function<V: Visitor>(visitor: &mut V, function: &FunctionDef) {
    for param in &function.params {
        visitor.visit_pattern(&param.pattern);
        if let Some(default) = &param.default {
            visitor.visit_expression(default);
        }
    }
    match &function.body {
        FunctionBody::Block(body) => {
            for stmt in body {
                visitor.visit_statement(stmt);
            }
        }
        FunctionBody::Expression(expr) => visitor.visit_expression(expr),
    }
}

pub fn walk_pattern<V: Visitor>(visitor: &mut V, pattern: &Pattern) {
    match pattern {
        Pattern::Ident(_) => {}
        Pattern::Object { properties, .. } => {
            for prop in properties {
                if let PropertyKey::Computed(key) = &prop.key {
                    visitor.visit_expression(key);
                }
                visitor.visit_pattern(&prop.value);
                if let Some(default) = &prop.default {
                    visitor.visit_expression(default);
                }
            }
        }
        Pattern::Array { elements, rest } => {
            for element in elements.iter().flatten() {
                visitor.visit_pattern(&element.pattern);
                if let Some(default) = &element.default {
                    visitor.visit_expression(default);
                }
            }
            if let Some(rest) = rest {
                visitor.visit_pattern(rest);
            }
        }
    }
}

pub fn walk_expression<V: Visitor>(visitor: &mut V, expr: &Expression) {
    match expr {
        Expression::Literal { .. } | Expression::Ident { .. } | Expression::Regex { .. } => {
            // Leaf nodes
        }
        Expression::Template { expressions, .. } | Expression::Sequence { expressions, .. } => {
            for expr in expressions {
                visitor.visit_expression(expr);
            }
        }
        Expression::Array { items, .. } => {
            for item in items {
                if let ArrayItem::Item(expr) | ArrayItem::Spread(expr) = item {
                    visitor.visit_expression(expr);
                }
            }
        }
        Expression::Object { properties, .. } => {
            for prop in properties {
                match prop {
                    ObjectProp::KeyValue { key, value } => {
                        if let PropertyKey::Computed(key) = key {
                            visitor.visit_expression(key);
                        }
                        visitor.visit_expression(value);
                    }
                    ObjectProp::Spread(expr) => visitor.visit_expression(expr),
                    ObjectProp::Shorthand(_) => {}
                }
            }
        }
        Expression::Function(function) => visitor.visit_function(function),
        Expression::Unary { argument, .. } | Expression::Await { argument, .. } => {
            visitor.visit_expression(argument);
        }
        Expression::Update { target, .. } => visitor.visit_expression(target),
        Expression::Binary { left, right, .. } | Expression::Logical { left, right, .. } => {
            visitor.visit_expression(left);
            visitor.visit_expression(right);
        }
        Expression::Conditional {
            test,
            consequent,
            alternate,
            ..
        } => {
            visitor.visit_expression(test);
            visitor.visit_expression(consequent);
            visitor.visit_expression(alternate);
        }
        Expression::Assign { target, value, .. } => {
            match target.as_ref() {
                AssignTarget::Ident(_) => {}
                AssignTarget::Member { object, property } => {
                    visitor.visit_expression(object);
                    if let MemberProp::Computed(property) = property {
                        visitor.visit_expression(property);
                    }
                }
                AssignTarget::Pattern(pattern) => visitor.visit_pattern(pattern),
            }
            visitor.visit_expression(value);
        }
        Expression::Call {
            callee, arguments, ..
        }
        | Expression::New {
            callee, arguments, ..
        } => {
            visitor.visit_expression(callee);
            for arg in arguments {
                let (Argument::Item(expr) | Argument::Spread(expr)) = arg;
                visitor.visit_expression(expr);
            }
        }
        Expression::Member {
            object, property, ..
        } => {
            visitor.visit_expression(object);
            if let MemberProp::Computed(property) = property {
                visitor.visit_expression(property);
            }
        }
        Expression::Jsx(element) => visitor.visit_jsx_element(element),
    }
}

pub fn walk_jsx_element<V: Visitor>(visitor: &mut V, element: &JsxElement) {
    for attr in &element.attributes {
        match attr {
            JsxAttribute::Named {
                value: Some(JsxAttrValue::Expression(expr)),
                ..
            }
            | JsxAttribute::Spread(expr) => visitor.visit_expression(expr),
            JsxAttribute::Named { .. } => {}
        }
    }
    for child in &element.children {
        match child {
            JsxChild::Text(_) => {}
            JsxChild::Expression(expr) => visitor.visit_expression(expr),
            JsxChild::Element(element) => visitor.visit_jsx_element(element),
        }
    }
}

// Default walk implementations for mutable visitor

pub fn walk_program_mut<V: VisitorMut>(visitor: &mut V, program: &mut Program) {
    for stmt in &mut program.body {
        visitor.visit_statement_mut(stmt);
    }
}

pub fn walk_statement_mut<V: VisitorMut>(visitor: &mut V, stmt: &mut Statement) {
    match stmt {
        Statement::VarDecl { declarators, .. } => {
            for declarator in declarators {
                visitor.visit_pattern_mut(&mut declarator.pattern);
                if let Some(init) = &mut declarator.init {
                    visitor.visit_expression_mut(init);
                }
            }
        }
        Statement::FunctionDecl(function) => visitor.visit_function_mut(Rc::make_mut(function)),
        Statement::Expression { expression, .. } => visitor.visit_expression_mut(expression),
        Statement::Return { argument, .. } => {
            if let Some(argument) = argument {
                visitor.visit_expression_mut(argument);
            }
        }
        Statement::If {
            test,
            consequent,
            alternate,
            ..
        } => {
            visitor.visit_expression_mut(test);
            visitor.visit_statement_mut(consequent);
            if let Some(alternate) = alternate {
                visitor.visit_statement_mut(alternate);
            }
        }
        Statement::Block(body) => {
            for stmt in body {
                visitor.visit_statement_mut(stmt);
            }
        }
        Statement::For {
            init,
            test,
            update,
            body,
            ..
        } => {
            if let Some(init) = init {
                visitor.visit_statement_mut(init);
            }
            if let Some(test) = test {
                visitor.visit_expression_mut(test);
            }
            if let Some(update) = update {
                visitor.visit_expression_mut(update);
            }
            visitor.visit_statement_mut(body);
        }
        Statement::ForOf {
            pattern,
            iterable: target,
            body,
            ..
        }
        | Statement::ForIn {
            pattern,
            object: target,
            body,
            ..
        } => {
            visitor.visit_pattern_mut(pattern);
            visitor.visit_expression_mut(target);
            visitor.visit_statement_mut(body);
        }
        Statement::While { test, body, .. } => {
            visitor.visit_expression_mut(test);
            visitor.visit_statement_mut(body);
        }
        Statement::Switch {
            discriminant,
            cases,
            ..
        } => {
            visitor.visit_expression_mut(discriminant);
            for case in cases {
                if let Some(test) = &mut case.test {
                    visitor.visit_expression_mut(test);
                }
                for stmt in &mut case.body {
                    visitor.visit_statement_mut(stmt);
                }
            }
        }
        Statement::Throw { argument, .. } => visitor.visit_expression_mut(argument),
        Statement::Try {
            block,
            param,
            handler,
            finalizer,
            ..
        } => {
            for stmt in block {
                visitor.visit_statement_mut(stmt);
            }
            if let Some(param) = param {
                visitor.visit_pattern_mut(param);
            }
            for stmt in handler.iter_mut().chain(finalizer.iter_mut()).flatten() {
                visitor.visit_statement_mut(stmt);
            }
        }
        Statement::ExportDecl { declaration, .. } => visitor.visit_statement_mut(declaration),
        Statement::ExportDefault { value, .. } => match value {
            ExportDefault::Expression(expr) => visitor.visit_expression_mut(expr),
            ExportDefault::Function(function) => visitor.visit_function_mut(Rc::make_mut(function)),
        },
        Statement::Import(_)
        | Statement::ExportNamed { .. }
        | Statement::ExportAll { .. }
        | Statement::Break(_)
        | Statement::Continue(_)
        | Statement::Empty => {
            // Leaf nodes
        }
    }
}

pub fn walk_function_mut<V: VisitorMut>(visitor: &mut V, function: &mut FunctionDef) {
    for param in &mut function.params {
        visitor.visit_pattern_mut(&mut param.pattern);
        if let Some(default) = &mut param.default {
            visitor.visit_expression_mut(default);
        }
    }
    match &mut function.body {
        FunctionBody::Block(body) => {
            for stmt in body {
                visitor.visit_statement_mut(stmt);
            }
        }
        FunctionBody::Expression(expr) => visitor.visit_expression_mut(expr),
    }
}

pub fn walk_pattern_mut<V: VisitorMut>(visitor: &mut V, pattern: &mut Pattern) {
    match pattern {
        Pattern::Ident(_) => {}
        Pattern::Object { properties, .. } => {
            for prop in properties {
                if let PropertyKey::Computed(key) = &mut prop.key {
                    visitor.visit_expression_mut(key);
                }
                visitor.visit_pattern_mut(&mut prop.value);
                if let Some(default) = &mut prop.default {
                    visitor.visit_expression_mut(default);
                }
            }
        }
        Pattern::Array { elements, rest } => {
            for element in elements.iter_mut().flatten() {
                visitor.visit_pattern_mut(&mut element.pattern);
                if let Some(default) = &mut element.default {
                    visitor.visit_expression_mut(default);
                }
            }
            if let Some(rest) = rest {
                visitor.visit_pattern_mut(rest);
            }
        }
    }
}

pub fn walk_expression_mut<V: VisitorMut>(visitor: &mut V, expr: &mut Expression) {
    match expr {
        Expression::Literal { .. } | Expression::Ident { .. } | Expression::Regex { .. } => {
            // Leaf nodes
        }
        Expression::Template { expressions, .. } | Expression::Sequence { expressions, .. } => {
            for expr in expressions {
                visitor.visit_expression_mut(expr);
            }
        }
        Expression::Array { items, .. } => {
            for item in items {
                if let ArrayItem::Item(expr) | ArrayItem::Spread(expr) = item {
                    visitor.visit_expression_mut(expr);
                }
            }
        }
        Expression::Object { properties, .. } => {
            for prop in properties {
                match prop {
                    ObjectProp::KeyValue { key, value } => {
                        if let PropertyKey::Computed(key) = key {
                            visitor.visit_expression_mut(key);
                        }
                        visitor.visit_expression_mut(value);
                    }
                    ObjectProp::Spread(expr) => visitor.visit_expression_mut(expr),
                    ObjectProp::Shorthand(_) => {}
                }
            }
        }
        Expression::Function(function) => visitor.visit_function_mut(Rc::make_mut(function)),
        Expression::Unary { argument, .. } | Expression::Await { argument, .. } => {
            visitor.visit_expression_mut(argument);
        }
        Expression::Update { target, .. } => visitor.visit_expression_mut(target),
        Expression::Binary { left, right, .. } | Expression::Logical { left, right, .. } => {
            visitor.visit_expression_mut(left);
            visitor.visit_expression_mut(right);
        }
        Expression::Conditional {
            test,
            consequent,
            alternate,
            ..
        } => {
            visitor.visit_expression_mut(test);
            visitor.visit_expression_mut(consequent);
            visitor.visit_expression_mut(alternate);
        }
        Expression::Assign { target, value, .. } => {
            match target.as_mut() {
                AssignTarget::Ident(_) => {}
                AssignTarget::Member { object, property } => {
                    visitor.visit_expression_mut(object);
                    if let MemberProp::Computed(property) = property {
                        visitor.visit_expression_mut(property);
                    }
                }
                AssignTarget::Pattern(pattern) => visitor.visit_pattern_mut(pattern),
            }
            visitor.visit_expression_mut(value);
        }
        Expression::Call {
            callee, arguments, ..
        }
        | Expression::New {
            callee, arguments, ..
        } => {
            visitor.visit_expression_mut(callee);
            for arg in arguments {
                let (Argument::Item(expr) | Argument::Spread(expr)) = arg;
                visitor.visit_expression_mut(expr);
            }
        }
        Expression::Member {
            object, property, ..
        } => {
            visitor.visit_expression_mut(object);
            if let MemberProp::Computed(property) = property {
                visitor.visit_expression_mut(property);
            }
        }
        Expression::Jsx(element) => visitor.visit_jsx_element_mut(element),
    }
}

pub fn walk_jsx_element_mut<V: VisitorMut>(visitor: &mut V, element: &mut JsxElement) {
    for attr in &mut element.attributes {
        match attr {
            JsxAttribute::Named {
                value: Some(JsxAttrValue::Expression(expr)),
                ..
            }
            | JsxAttribute::Spread(expr) => visitor.visit_expression_mut(expr),
            JsxAttribute::Named { .. } => {}
        }
    }
    for child in &mut element.children {
        match child {
            JsxChild::Text(_) => {}
            JsxChild::Expression(expr) => visitor.visit_expression_mut(expr),
            JsxChild::Element(element) => visitor.visit_jsx_element_mut(element),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimpse_parser::parse;

    #[derive(Default)]
    struct JsxCounter {
        elements: usize,
    }

    impl Visitor for JsxCounter {
        fn visit_jsx_element(&mut self, element: &JsxElement) {
            self.elements += 1;
            walk_jsx_element(self, element);
        }
    }

    #[test]
    fn test_visitor_reaches_nested_jsx() {
        let program = parse(
            r#"
            export default function App() {
                const items = [1, 2].map((n) => <li key={n}>{n}</li>);
                return <ul>{items}<li>{cond ? <b /> : null}</li></ul>;
            }
            "#,
        )
        .unwrap();

        let mut counter = JsxCounter::default();
        counter.visit_program(&program);
        assert_eq!(counter.elements, 4);
    }

    struct Renamer;

    impl VisitorMut for Renamer {
        fn visit_expression_mut(&mut self, expr: &mut Expression) {
            if let Expression::Ident { name, .. } = expr {
                if name == "a" {
                    *name = "b".to_string();
                }
            }
            walk_expression_mut(self, expr);
        }
    }

    #[test]
    fn test_visitor_mut_rewrites_inside_functions() {
        let mut program = parse("const f = () => a + 1;").unwrap();
        Renamer.visit_program_mut(&mut program);

        let mut found = Vec::new();
        struct Collect<'a>(&'a mut Vec<String>);
        impl Visitor for Collect<'_> {
            fn visit_expression(&mut self, expr: &Expression) {
                if let Expression::Ident { name, .. } = expr {
                    self.0.push(name.clone());
                }
                walk_expression(self, expr);
            }
        }
        Collect(&mut found).visit_program(&program);
        assert_eq!(found, vec!["b"]);
    }
}
