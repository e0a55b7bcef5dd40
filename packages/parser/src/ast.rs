use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Span information for source location tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    /// 1-based line of `start`
    pub line: u32,
    /// 1-based column of `start`, counted in characters
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// `line:column`, the format carried by `data-source-loc`
    pub fn loc(&self) -> String {
        format!("{}:{}", self.line, self.column)
    }
}

/// Root node of one source file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Statement>,
}

impl Program {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    /// Names this module exports, in source order
    pub fn declared_exports(&self) -> Vec<String> {
        let mut names = Vec::new();
        for stmt in &self.body {
            match stmt {
                Statement::ExportDecl { declaration, .. } => match declaration.as_ref() {
                    Statement::VarDecl { declarators, .. } => {
                        for declarator in declarators {
                            declarator.pattern.bound_names(&mut names);
                        }
                    }
                    Statement::FunctionDecl(function) => {
                        if let Some(name) = &function.name {
                            names.push(name.clone());
                        }
                    }
                    _ => {}
                },
                Statement::ExportNamed { specifiers, .. } => {
                    for spec in specifiers {
                        names.push(spec.exported.clone());
                    }
                }
                _ => {}
            }
        }
        names
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Const,
    Let,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub pattern: Pattern,
    pub init: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    VarDecl {
        kind: VarKind,
        declarators: Vec<Declarator>,
        span: Span,
    },
    FunctionDecl(Rc<FunctionDef>),
    Expression {
        expression: Expression,
        span: Span,
    },
    Return {
        argument: Option<Expression>,
        span: Span,
    },
    If {
        test: Expression,
        consequent: Box<Statement>,
        alternate: Option<Box<Statement>>,
        span: Span,
    },
    Block(Vec<Statement>),
    For {
        init: Option<Box<Statement>>,
        test: Option<Expression>,
        update: Option<Expression>,
        body: Box<Statement>,
        span: Span,
    },
    ForOf {
        kind: VarKind,
        pattern: Pattern,
        iterable: Expression,
        body: Box<Statement>,
        span: Span,
    },
    ForIn {
        kind: VarKind,
        pattern: Pattern,
        object: Expression,
        body: Box<Statement>,
        span: Span,
    },
    While {
        test: Expression,
        body: Box<Statement>,
        span: Span,
    },
    Switch {
        discriminant: Expression,
        cases: Vec<SwitchCase>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Throw {
        argument: Expression,
        span: Span,
    },
    Try {
        block: Vec<Statement>,
        param: Option<Pattern>,
        handler: Option<Vec<Statement>>,
        finalizer: Option<Vec<Statement>>,
        span: Span,
    },
    Import(ImportDecl),
    /// `export const ...` / `export function ...`
    ExportDecl {
        declaration: Box<Statement>,
        span: Span,
    },
    ExportDefault {
        value: ExportDefault,
        span: Span,
    },
    /// `export { a, b as c }` or `export { a } from "./x"`
    ExportNamed {
        specifiers: Vec<ExportSpecifier>,
        source: Option<String>,
        span: Span,
    },
    /// `export * from "./x"`
    ExportAll {
        source: String,
        span: Span,
    },
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub test: Option<Expression>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub source: String,
    pub specifiers: Vec<ImportSpecifier>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportSpecifier {
    Default { local: String },
    Named { imported: String, local: String },
    Namespace { local: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpecifier {
    pub local: String,
    pub exported: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportDefault {
    Expression(Expression),
    Function(Rc<FunctionDef>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Ident(String),
    Object {
        properties: Vec<ObjectPatternProp>,
        rest: Option<String>,
    },
    Array {
        elements: Vec<Option<PatternElement>>,
        rest: Option<Box<Pattern>>,
    },
}

impl Pattern {
    /// Collect every identifier this pattern binds
    pub fn bound_names(&self, out: &mut Vec<String>) {
        match self {
            Pattern::Ident(name) => out.push(name.clone()),
            Pattern::Object { properties, rest } => {
                for prop in properties {
                    prop.value.bound_names(out);
                }
                if let Some(rest) = rest {
                    out.push(rest.clone());
                }
            }
            Pattern::Array { elements, rest } => {
                for element in elements.iter().flatten() {
                    element.pattern.bound_names(out);
                }
                if let Some(rest) = rest {
                    rest.bound_names(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPatternProp {
    pub key: PropertyKey,
    pub value: Pattern,
    pub default: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternElement {
    pub pattern: Pattern,
    pub default: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub pattern: Pattern,
    pub default: Option<Expression>,
    pub rest: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Statement>),
    /// Concise arrow body
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    pub is_async: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Named(String),
    Computed(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectProp {
    KeyValue { key: PropertyKey, value: Expression },
    Shorthand(String),
    Spread(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayItem {
    Item(Expression),
    Spread(Expression),
    Hole,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Item(Expression),
    Spread(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProp {
    Named(String),
    Computed(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
    TypeOf,
    Void,
    BitNot,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    StrictEq,
    StrictNe,
    LooseEq,
    LooseNe,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    In,
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
    Logical(LogicalOp),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal {
        value: Literal,
        span: Span,
    },
    Template {
        quasis: Vec<String>,
        expressions: Vec<Expression>,
        span: Span,
    },
    Ident {
        name: String,
        span: Span,
    },
    /// `/pattern/flags`
    Regex {
        pattern: String,
        flags: String,
        span: Span,
    },
    Array {
        items: Vec<ArrayItem>,
        span: Span,
    },
    Object {
        properties: Vec<ObjectProp>,
        span: Span,
    },
    Function(Rc<FunctionDef>),
    Unary {
        op: UnaryOp,
        argument: Box<Expression>,
        span: Span,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expression>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
        span: Span,
    },
    Assign {
        op: AssignOp,
        target: Box<AssignTarget>,
        value: Box<Expression>,
        span: Span,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Argument>,
        optional: bool,
        span: Span,
    },
    New {
        callee: Box<Expression>,
        arguments: Vec<Argument>,
        span: Span,
    },
    Member {
        object: Box<Expression>,
        property: MemberProp,
        optional: bool,
        span: Span,
    },
    Sequence {
        expressions: Vec<Expression>,
        span: Span,
    },
    Await {
        argument: Box<Expression>,
        span: Span,
    },
    Jsx(Box<JsxElement>),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Literal { span, .. }
            | Expression::Template { span, .. }
            | Expression::Ident { span, .. }
            | Expression::Regex { span, .. }
            | Expression::Array { span, .. }
            | Expression::Object { span, .. }
            | Expression::Unary { span, .. }
            | Expression::Update { span, .. }
            | Expression::Binary { span, .. }
            | Expression::Logical { span, .. }
            | Expression::Conditional { span, .. }
            | Expression::Assign { span, .. }
            | Expression::Call { span, .. }
            | Expression::New { span, .. }
            | Expression::Member { span, .. }
            | Expression::Sequence { span, .. }
            | Expression::Await { span, .. } => *span,
            Expression::Function(function) => function.span,
            Expression::Jsx(element) => element.span,
        }
    }
}

/// Left-hand side of an assignment
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Ident(String),
    Member {
        object: Expression,
        property: MemberProp,
    },
    Pattern(Pattern),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsxName {
    /// Lower-case host tag such as `div` or `svg`
    Intrinsic(String),
    /// Component reference; `Card.Header` is `["Card", "Header"]`
    Component(Vec<String>),
    Fragment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsxAttrValue {
    String(String),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsxAttribute {
    Named {
        name: String,
        /// `None` for bare boolean attributes like `disabled`
        value: Option<JsxAttrValue>,
    },
    Spread(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsxChild {
    Text(String),
    Expression(Expression),
    Element(JsxElement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsxElement {
    pub name: JsxName,
    pub attributes: Vec<JsxAttribute>,
    pub children: Vec<JsxChild>,
    pub span: Span,
}

impl JsxElement {
    pub fn has_attribute(&self, attr: &str) -> bool {
        self.attributes.iter().any(|a| match a {
            JsxAttribute::Named { name, .. } => name == attr,
            JsxAttribute::Spread(_) => false,
        })
    }
}
