use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::location::LineIndex;
use crate::tokenizer::{lex_at, Lexed, Token};
use std::rc::Rc;

/// Recursive descent parser for the TS/JSX module subset.
///
/// Tokens are lexed on demand from `pos`, so JSX text and template literal
/// bodies can be scanned raw and speculative parses can rewind by resetting
/// a single offset.
pub struct Parser<'src> {
    source: &'src str,
    pos: usize,
    prev_end: usize,
    lines: LineIndex,
    no_in: bool,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            prev_end: 0,
            lines: LineIndex::new(source),
            no_in: false,
        }
    }

    /// Parse a complete module
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut program = Program::new();

        while !self.is_at_end()? {
            let stmt = self.parse_statement()?;
            if stmt != Statement::Empty {
                program.body.push(stmt);
            }
        }

        Ok(program)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let start = self.peek()?.start;
        let token = match self.peek()?.token {
            Some(token) => token,
            None => return Err(self.unexpected_eof("statement")),
        };

        match token {
            Token::Semicolon => {
                self.bump();
                Ok(Statement::Empty)
            }
            Token::LBrace => Ok(Statement::Block(self.parse_block()?)),
            Token::Ident(word) => match word {
                "import" if !matches!(self.peek_nth(1), Some(Token::LParen) | Some(Token::Dot)) => {
                    self.parse_import()
                }
                "export" => self.parse_export(),
                "const" | "let" | "var" => {
                    if word == "const" && self.peek_nth(1).map_or(false, |t| t.is_ident("enum")) {
                        self.bump();
                        return self.parse_enum(start);
                    }
                    let decl = self.parse_var_decl()?;
                    self.consume_semicolon();
                    Ok(decl)
                }
                "function" => Ok(Statement::FunctionDecl(self.parse_function(false)?)),
                "async" if self.peek_nth(1).map_or(false, |t| t.is_ident("function")) => {
                    self.bump();
                    Ok(Statement::FunctionDecl(self.parse_function(true)?))
                }
                "return" => {
                    self.bump();
                    let argument = if self.check(Token::Semicolon)
                        || self.check(Token::RBrace)
                        || self.is_at_end()?
                        || self.newline_before()
                    {
                        None
                    } else {
                        Some(self.parse_expression()?)
                    };
                    self.consume_semicolon();
                    Ok(Statement::Return {
                        argument,
                        span: self.span_from(start),
                    })
                }
                "if" => self.parse_if(),
                "for" => self.parse_for(),
                "while" => {
                    self.bump();
                    self.expect(Token::LParen, "'('")?;
                    let test = self.parse_expression()?;
                    self.expect(Token::RParen, "')'")?;
                    let body = Box::new(self.parse_statement()?);
                    Ok(Statement::While {
                        test,
                        body,
                        span: self.span_from(start),
                    })
                }
                "switch" => self.parse_switch(),
                "break" | "continue" => {
                    self.bump();
                    // Labels are not supported; a label on the same line is skipped
                    if !self.newline_before() {
                        if let Some(Token::Ident(_)) = self.peek_token() {
                            self.bump();
                        }
                    }
                    self.consume_semicolon();
                    let span = self.span_from(start);
                    Ok(if word == "break" {
                        Statement::Break(span)
                    } else {
                        Statement::Continue(span)
                    })
                }
                "throw" => {
                    self.bump();
                    let argument = self.parse_expression()?;
                    self.consume_semicolon();
                    Ok(Statement::Throw {
                        argument,
                        span: self.span_from(start),
                    })
                }
                "try" => self.parse_try(),
                "interface" if matches!(self.peek_nth(1), Some(Token::Ident(_))) => {
                    self.skip_interface()?;
                    Ok(Statement::Empty)
                }
                "type" if matches!(self.peek_nth(1), Some(Token::Ident(_))) => {
                    self.skip_type_alias()?;
                    Ok(Statement::Empty)
                }
                "declare" if matches!(self.peek_nth(1), Some(Token::Ident(_))) => {
                    self.skip_declare()?;
                    Ok(Statement::Empty)
                }
                "enum" if matches!(self.peek_nth(1), Some(Token::Ident(_))) => {
                    self.parse_enum(start)
                }
                "class" | "abstract" if matches!(self.peek_nth(1), Some(Token::Ident(_))) => {
                    Err(self.invalid_syntax(start, "class declarations are not supported"))
                }
                "do" if self.peek_nth(1) == Some(Token::LBrace) => {
                    Err(self.invalid_syntax(start, "do-while loops are not supported"))
                }
                _ => self.parse_expression_statement(),
            },
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Statement> {
        let start = self.peek()?.start;
        let expression = self.parse_expression()?;
        self.consume_semicolon();
        Ok(Statement::Expression {
            expression,
            span: self.span_from(start),
        })
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(Token::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.check(Token::RBrace) {
            if self.is_at_end()? {
                return Err(self.unexpected_eof("'}'"));
            }
            let stmt = self.parse_statement()?;
            if stmt != Statement::Empty {
                body.push(stmt);
            }
        }
        self.bump();
        Ok(body)
    }

    fn parse_var_decl(&mut self) -> ParseResult<Statement> {
        let start = self.peek()?.start;
        let kind = match self.advance()?.token {
            Some(Token::Ident("const")) => VarKind::Const,
            Some(Token::Ident("let")) => VarKind::Let,
            _ => VarKind::Var,
        };

        let mut declarators = Vec::new();
        loop {
            let pattern = self.parse_binding_pattern()?;
            // definite assignment assertion `let x!: T`
            if !self.newline_before() {
                self.match_token(Token::Bang);
            }
            if self.match_token(Token::Colon) {
                self.skip_type()?;
            }
            let init = if self.match_token(Token::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            declarators.push(Declarator { pattern, init });

            if !self.match_token(Token::Comma) {
                break;
            }
        }

        Ok(Statement::VarDecl {
            kind,
            declarators,
            span: self.span_from(start),
        })
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        let start = self.peek()?.start;
        self.bump();
        self.expect(Token::LParen, "'('")?;
        let test = self.parse_expression()?;
        self.expect(Token::RParen, "')'")?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.check_ident("else") {
            self.bump();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            test,
            consequent,
            alternate,
            span: self.span_from(start),
        })
    }

    fn parse_for(&mut self) -> ParseResult<Statement> {
        let start = self.peek()?.start;
        self.bump();
        if self.check_ident("await") {
            self.bump();
        }
        self.expect(Token::LParen, "'('")?;

        let mut init = None;
        if self.check_ident("const") || self.check_ident("let") || self.check_ident("var") {
            let decl_start = self.peek()?.start;
            let kind = match self.advance()?.token {
                Some(Token::Ident("const")) => VarKind::Const,
                Some(Token::Ident("let")) => VarKind::Let,
                _ => VarKind::Var,
            };
            let pattern = self.parse_binding_pattern()?;
            if self.match_token(Token::Colon) {
                self.skip_type()?;
            }

            if self.check_ident("of") || self.check_ident("in") {
                let is_of = self.check_ident("of");
                self.bump();
                let target = if is_of {
                    self.parse_assignment()?
                } else {
                    self.parse_expression()?
                };
                self.expect(Token::RParen, "')'")?;
                let body = Box::new(self.parse_statement()?);
                let span = self.span_from(start);
                return Ok(if is_of {
                    Statement::ForOf {
                        kind,
                        pattern,
                        iterable: target,
                        body,
                        span,
                    }
                } else {
                    Statement::ForIn {
                        kind,
                        pattern,
                        object: target,
                        body,
                        span,
                    }
                });
            }

            let mut declarators = Vec::new();
            let first_init = if self.match_token(Token::Assign) {
                Some(self.parse_assignment_no_in()?)
            } else {
                None
            };
            declarators.push(Declarator {
                pattern,
                init: first_init,
            });
            while self.match_token(Token::Comma) {
                let pattern = self.parse_binding_pattern()?;
                let init = if self.match_token(Token::Assign) {
                    Some(self.parse_assignment_no_in()?)
                } else {
                    None
                };
                declarators.push(Declarator { pattern, init });
            }
            init = Some(Box::new(Statement::VarDecl {
                kind,
                declarators,
                span: self.span_from(decl_start),
            }));
        } else if !self.check(Token::Semicolon) {
            let expr_start = self.peek()?.start;
            let previous = self.no_in;
            self.no_in = true;
            let expression = self.parse_expression();
            self.no_in = previous;
            init = Some(Box::new(Statement::Expression {
                expression: expression?,
                span: self.span_from(expr_start),
            }));
        }

        self.expect(Token::Semicolon, "';'")?;
        let test = if self.check(Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::Semicolon, "';'")?;
        let update = if self.check(Token::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);

        Ok(Statement::For {
            init,
            test,
            update,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_assignment_no_in(&mut self) -> ParseResult<Expression> {
        let previous = self.no_in;
        self.no_in = true;
        let result = self.parse_assignment();
        self.no_in = previous;
        result
    }

    fn parse_switch(&mut self) -> ParseResult<Statement> {
        let start = self.peek()?.start;
        self.bump();
        self.expect(Token::LParen, "'('")?;
        let discriminant = self.parse_expression()?;
        self.expect(Token::RParen, "')'")?;
        self.expect(Token::LBrace, "'{'")?;

        let mut cases = Vec::new();
        while !self.check(Token::RBrace) {
            let test = if self.check_ident("case") {
                self.bump();
                Some(self.parse_expression()?)
            } else if self.check_ident("default") {
                self.bump();
                None
            } else {
                return Err(self.unexpected("'case' or 'default'"));
            };
            self.expect(Token::Colon, "':'")?;

            let mut body = Vec::new();
            while !self.check(Token::RBrace)
                && !self.check_ident("case")
                && !self.check_ident("default")
            {
                if self.is_at_end()? {
                    return Err(self.unexpected_eof("'}'"));
                }
                let stmt = self.parse_statement()?;
                if stmt != Statement::Empty {
                    body.push(stmt);
                }
            }
            cases.push(SwitchCase { test, body });
        }
        self.bump();

        Ok(Statement::Switch {
            discriminant,
            cases,
            span: self.span_from(start),
        })
    }

    fn parse_try(&mut self) -> ParseResult<Statement> {
        let start = self.peek()?.start;
        self.bump();
        let block = self.parse_block()?;

        let mut param = None;
        let mut handler = None;
        if self.check_ident("catch") {
            self.bump();
            if self.match_token(Token::LParen) {
                param = Some(self.parse_binding_pattern()?);
                if self.match_token(Token::Colon) {
                    self.skip_type()?;
                }
                self.expect(Token::RParen, "')'")?;
            }
            handler = Some(self.parse_block()?);
        }

        let finalizer = if self.check_ident("finally") {
            self.bump();
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("'catch' or 'finally'"));
        }

        Ok(Statement::Try {
            block,
            param,
            handler,
            finalizer,
            span: self.span_from(start),
        })
    }

    /// `enum Color { Red, Green = "g" }` becomes a frozen-looking object
    fn parse_enum(&mut self, start: usize) -> ParseResult<Statement> {
        self.bump(); // enum
        let name = self.expect_ident()?;
        self.expect(Token::LBrace, "'{'")?;

        let mut properties = Vec::new();
        let mut next_value = 0.0;
        while !self.check(Token::RBrace) {
            let member_start = self.peek()?.start;
            let key = match self.advance()?.token {
                Some(Token::Ident(ident)) => ident.to_string(),
                Some(Token::String(raw)) => decode_string_literal(raw),
                _ => return Err(self.unexpected_at(member_start, "enum member")),
            };
            let value = if self.match_token(Token::Assign) {
                let value = self.parse_assignment()?;
                if let Expression::Literal {
                    value: Literal::Number(n),
                    ..
                } = &value
                {
                    next_value = n + 1.0;
                }
                value
            } else {
                let value = Expression::Literal {
                    value: Literal::Number(next_value),
                    span: self.span_from(member_start),
                };
                next_value += 1.0;
                value
            };
            properties.push(ObjectProp::KeyValue {
                key: PropertyKey::Named(key),
                value,
            });
            if !self.match_token(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBrace, "'}'")?;

        let span = self.span_from(start);
        Ok(Statement::VarDecl {
            kind: VarKind::Const,
            declarators: vec![Declarator {
                pattern: Pattern::Ident(name),
                init: Some(Expression::Object { properties, span }),
            }],
            span,
        })
    }

    // ------------------------------------------------------------------
    // Modules
    // ------------------------------------------------------------------

    fn parse_import(&mut self) -> ParseResult<Statement> {
        let start = self.peek()?.start;
        self.bump(); // import

        // `import "./styles.css"`
        if let Some(Token::String(raw)) = self.peek_token() {
            self.bump();
            self.skip_import_attributes()?;
            self.consume_semicolon();
            return Ok(Statement::Import(ImportDecl {
                source: decode_string_literal(raw),
                specifiers: Vec::new(),
                span: self.span_from(start),
            }));
        }

        // `import type { X } from "./types"` has no runtime effect
        if self.check_ident("type")
            && !matches!(self.peek_nth(1), Some(Token::Comma))
            && !self.peek_nth(1).map_or(false, |t| t.is_ident("from"))
        {
            while !self.is_at_end()? {
                if let Some(Token::String(_)) = self.advance()?.token {
                    break;
                }
            }
            self.consume_semicolon();
            return Ok(Statement::Empty);
        }

        let mut specifiers = Vec::new();
        if let Some(Token::Ident(local)) = self.peek_token() {
            if local != "from" || self.peek_nth(1) == Some(Token::Comma) {
                self.bump();
                specifiers.push(ImportSpecifier::Default {
                    local: local.to_string(),
                });
                self.match_token(Token::Comma);
            }
        }

        if self.match_token(Token::Star) {
            if !self.check_ident("as") {
                return Err(self.unexpected("'as'"));
            }
            self.bump();
            let local = self.expect_ident()?;
            specifiers.push(ImportSpecifier::Namespace { local });
        } else if self.match_token(Token::LBrace) {
            while !self.check(Token::RBrace) {
                let is_type = self.check_ident("type")
                    && matches!(self.peek_nth(1), Some(Token::Ident(_)) | Some(Token::String(_)))
                    && !self.peek_nth(1).map_or(false, |t| t.is_ident("as"));
                if is_type {
                    self.bump();
                }
                let imported = match self.advance()?.token {
                    Some(Token::Ident(name)) => name.to_string(),
                    Some(Token::String(raw)) => decode_string_literal(raw),
                    _ => return Err(self.unexpected("import specifier")),
                };
                let local = if self.check_ident("as") {
                    self.bump();
                    self.expect_ident()?
                } else {
                    imported.clone()
                };
                if !is_type {
                    specifiers.push(ImportSpecifier::Named { imported, local });
                }
                if !self.match_token(Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RBrace, "'}'")?;
        }

        if !self.check_ident("from") {
            return Err(self.unexpected("'from'"));
        }
        self.bump();
        let source = self.expect_string()?;
        self.skip_import_attributes()?;
        self.consume_semicolon();

        Ok(Statement::Import(ImportDecl {
            source,
            specifiers,
            span: self.span_from(start),
        }))
    }

    fn skip_import_attributes(&mut self) -> ParseResult<()> {
        if (self.check_ident("with") || self.check_ident("assert")) && !self.newline_before() {
            self.bump();
            self.skip_balanced(Token::LBrace, Token::RBrace)?;
        }
        Ok(())
    }

    fn parse_export(&mut self) -> ParseResult<Statement> {
        let start = self.peek()?.start;
        self.bump(); // export

        if self.check_ident("default") {
            self.bump();
            if self.check_ident("function") {
                let function = self.parse_function(false)?;
                return Ok(Statement::ExportDefault {
                    value: ExportDefault::Function(function),
                    span: self.span_from(start),
                });
            }
            if self.check_ident("async") && self.peek_nth(1).map_or(false, |t| t.is_ident("function")) {
                self.bump();
                let function = self.parse_function(true)?;
                return Ok(Statement::ExportDefault {
                    value: ExportDefault::Function(function),
                    span: self.span_from(start),
                });
            }
            if self.check_ident("interface") {
                self.skip_interface()?;
                return Ok(Statement::Empty);
            }
            if self.check_ident("class") {
                return Err(self.invalid_syntax(start, "class declarations are not supported"));
            }
            let expression = self.parse_assignment()?;
            self.consume_semicolon();
            return Ok(Statement::ExportDefault {
                value: ExportDefault::Expression(expression),
                span: self.span_from(start),
            });
        }

        if self.match_token(Token::Star) {
            let alias = if self.check_ident("as") {
                self.bump();
                Some(self.expect_ident()?)
            } else {
                None
            };
            if !self.check_ident("from") {
                return Err(self.unexpected("'from'"));
            }
            self.bump();
            let source = self.expect_string()?;
            self.consume_semicolon();
            let span = self.span_from(start);
            return Ok(match alias {
                Some(exported) => Statement::ExportNamed {
                    specifiers: vec![ExportSpecifier {
                        local: "*".to_string(),
                        exported,
                    }],
                    source: Some(source),
                    span,
                },
                None => Statement::ExportAll { source, span },
            });
        }

        if self.check_ident("type") && self.peek_nth(1) == Some(Token::LBrace) {
            self.bump();
            self.skip_balanced(Token::LBrace, Token::RBrace)?;
            if self.check_ident("from") {
                self.bump();
                self.expect_string()?;
            }
            self.consume_semicolon();
            return Ok(Statement::Empty);
        }

        if self.match_token(Token::LBrace) {
            let mut specifiers = Vec::new();
            while !self.check(Token::RBrace) {
                let is_type = self.check_ident("type")
                    && matches!(self.peek_nth(1), Some(Token::Ident(_)))
                    && !self.peek_nth(1).map_or(false, |t| t.is_ident("as"));
                if is_type {
                    self.bump();
                }
                let local = match self.advance()?.token {
                    Some(Token::Ident(name)) => name.to_string(),
                    Some(Token::String(raw)) => decode_string_literal(raw),
                    _ => return Err(self.unexpected("export specifier")),
                };
                let exported = if self.check_ident("as") {
                    self.bump();
                    match self.advance()?.token {
                        Some(Token::Ident(name)) => name.to_string(),
                        Some(Token::String(raw)) => decode_string_literal(raw),
                        _ => return Err(self.unexpected("export name")),
                    }
                } else {
                    local.clone()
                };
                if !is_type {
                    specifiers.push(ExportSpecifier { local, exported });
                }
                if !self.match_token(Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RBrace, "'}'")?;
            let source = if self.check_ident("from") {
                self.bump();
                Some(self.expect_string()?)
            } else {
                None
            };
            self.consume_semicolon();
            return Ok(Statement::ExportNamed {
                specifiers,
                source,
                span: self.span_from(start),
            });
        }

        // export const / function / enum / type / interface
        let declaration = self.parse_statement()?;
        match declaration {
            Statement::Empty => Ok(Statement::Empty),
            Statement::VarDecl { .. } | Statement::FunctionDecl(_) => Ok(Statement::ExportDecl {
                declaration: Box::new(declaration),
                span: self.span_from(start),
            }),
            _ => Err(self.invalid_syntax(start, "unsupported export declaration")),
        }
    }

    // ------------------------------------------------------------------
    // Functions and patterns
    // ------------------------------------------------------------------

    /// Parse `function name<T>(params): Ret { body }` starting at `function`
    fn parse_function(&mut self, is_async: bool) -> ParseResult<Rc<FunctionDef>> {
        let start = self.peek()?.start;
        self.bump(); // function
        self.match_token(Token::Star);

        let name = match self.peek_token() {
            Some(Token::Ident(name)) => {
                self.bump();
                Some(name.to_string())
            }
            _ => None,
        };

        if self.check(Token::LAngle) {
            self.skip_type_args()?;
        }

        let params = self.parse_params()?;
        if self.match_token(Token::Colon) {
            self.skip_type()?;
        }

        // Overload signatures have no body
        if !self.check(Token::LBrace) {
            self.consume_semicolon();
            return Ok(Rc::new(FunctionDef {
                name,
                params,
                body: FunctionBody::Block(Vec::new()),
                is_arrow: false,
                is_async,
                span: self.span_from(start),
            }));
        }

        let body = self.parse_block()?;
        Ok(Rc::new(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            is_async,
            span: self.span_from(start),
        }))
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        self.expect(Token::LParen, "'('")?;
        let mut params = Vec::new();

        while !self.check(Token::RParen) {
            // parameter properties / decorators are not meaningful here
            while self.check_ident("public")
                || self.check_ident("private")
                || self.check_ident("protected")
                || self.check_ident("readonly")
            {
                if matches!(self.peek_nth(1), Some(Token::Ident(_)) | Some(Token::LBrace) | Some(Token::LBracket)) {
                    self.bump();
                } else {
                    break;
                }
            }

            let rest = self.match_token(Token::Ellipsis);
            let pattern = self.parse_binding_pattern()?;
            self.match_token(Token::Question);
            if self.match_token(Token::Colon) {
                self.skip_type()?;
            }
            let default = if self.match_token(Token::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };

            // `this: Window` parameters only exist in the type system
            if pattern != Pattern::Ident("this".to_string()) {
                params.push(Param {
                    pattern,
                    default,
                    rest,
                });
            }

            if !self.match_token(Token::Comma) {
                break;
            }
        }

        self.expect(Token::RParen, "')'")?;
        Ok(params)
    }

    fn parse_binding_pattern(&mut self) -> ParseResult<Pattern> {
        match self.peek()?.token {
            Some(Token::Ident(name)) => {
                self.bump();
                Ok(Pattern::Ident(name.to_string()))
            }
            Some(Token::LBrace) => self.parse_object_pattern(),
            Some(Token::LBracket) => self.parse_array_pattern(),
            _ => Err(self.unexpected("binding pattern")),
        }
    }

    fn parse_object_pattern(&mut self) -> ParseResult<Pattern> {
        self.expect(Token::LBrace, "'{'")?;
        let mut properties = Vec::new();
        let mut rest = None;

        while !self.check(Token::RBrace) {
            if self.match_token(Token::Ellipsis) {
                rest = Some(self.expect_ident()?);
                self.match_token(Token::Comma);
                continue;
            }

            let key = self.parse_property_key()?;
            let value = if self.match_token(Token::Colon) {
                self.parse_binding_pattern()?
            } else {
                match &key {
                    PropertyKey::Named(name) => Pattern::Ident(name.clone()),
                    PropertyKey::Computed(_) => {
                        return Err(self.unexpected("':' after computed key"));
                    }
                }
            };
            let default = if self.match_token(Token::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            properties.push(ObjectPatternProp {
                key,
                value,
                default,
            });

            if !self.match_token(Token::Comma) {
                break;
            }
        }

        self.expect(Token::RBrace, "'}'")?;
        Ok(Pattern::Object { properties, rest })
    }

    fn parse_array_pattern(&mut self) -> ParseResult<Pattern> {
        self.expect(Token::LBracket, "'['")?;
        let mut elements = Vec::new();
        let mut rest = None;

        while !self.check(Token::RBracket) {
            if self.match_token(Token::Comma) {
                elements.push(None);
                continue;
            }
            if self.match_token(Token::Ellipsis) {
                rest = Some(Box::new(self.parse_binding_pattern()?));
                self.match_token(Token::Comma);
                continue;
            }
            let pattern = self.parse_binding_pattern()?;
            let default = if self.match_token(Token::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            elements.push(Some(PatternElement { pattern, default }));
            if !self.match_token(Token::Comma) {
                break;
            }
        }

        self.expect(Token::RBracket, "']'")?;
        Ok(Pattern::Array { elements, rest })
    }

    fn parse_property_key(&mut self) -> ParseResult<PropertyKey> {
        let start = self.peek()?.start;
        match self.advance()?.token {
            Some(Token::Ident(name)) => Ok(PropertyKey::Named(name.to_string())),
            Some(Token::String(raw)) => Ok(PropertyKey::Named(decode_string_literal(raw))),
            Some(Token::Number(raw)) => Ok(PropertyKey::Named(format_number_key(parse_number(raw)))),
            Some(Token::LBracket) => {
                let expr = self.parse_assignment()?;
                self.expect(Token::RBracket, "']'")?;
                Ok(PropertyKey::Computed(Box::new(expr)))
            }
            _ => Err(self.unexpected_at(start, "property name")),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        let start = self.peek()?.start;
        let first = self.parse_assignment()?;
        if !self.check(Token::Comma) {
            return Ok(first);
        }

        let mut expressions = vec![first];
        while self.match_token(Token::Comma) {
            expressions.push(self.parse_assignment()?);
        }
        Ok(Expression::Sequence {
            expressions,
            span: self.span_from(start),
        })
    }

    fn parse_assignment(&mut self) -> ParseResult<Expression> {
        let start = self.peek()?.start;

        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }

        let left = self.parse_conditional()?;

        let op = match self.peek_token() {
            Some(Token::Assign) => AssignOp::Assign,
            Some(Token::PlusAssign) => AssignOp::Compound(BinaryOp::Add),
            Some(Token::MinusAssign) => AssignOp::Compound(BinaryOp::Sub),
            Some(Token::StarAssign) => AssignOp::Compound(BinaryOp::Mul),
            Some(Token::SlashAssign) => AssignOp::Compound(BinaryOp::Div),
            Some(Token::PercentAssign) => AssignOp::Compound(BinaryOp::Rem),
            Some(Token::AndAssign) => AssignOp::Logical(LogicalOp::And),
            Some(Token::OrAssign) => AssignOp::Logical(LogicalOp::Or),
            Some(Token::NullishAssign) => AssignOp::Logical(LogicalOp::Nullish),
            _ => return Ok(left),
        };

        let target = self.to_assign_target(left, start, op == AssignOp::Assign)?;
        self.bump();
        let value = self.parse_assignment()?;
        Ok(Expression::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
            span: self.span_from(start),
        })
    }

    fn to_assign_target(
        &self,
        expr: Expression,
        start: usize,
        allow_pattern: bool,
    ) -> ParseResult<AssignTarget> {
        match expr {
            Expression::Ident { name, .. } => Ok(AssignTarget::Ident(name)),
            Expression::Member {
                object, property, ..
            } => Ok(AssignTarget::Member {
                object: *object,
                property,
            }),
            other @ (Expression::Object { .. } | Expression::Array { .. }) if allow_pattern => {
                Ok(AssignTarget::Pattern(self.expression_to_pattern(other, start)?))
            }
            _ => Err(self.invalid_syntax(start, "invalid assignment target")),
        }
    }

    fn expression_to_pattern(&self, expr: Expression, start: usize) -> ParseResult<Pattern> {
        match expr {
            Expression::Ident { name, .. } => Ok(Pattern::Ident(name)),
            Expression::Object { properties, .. } => {
                let mut props = Vec::new();
                let mut rest = None;
                for prop in properties {
                    match prop {
                        ObjectProp::Shorthand(name) => props.push(ObjectPatternProp {
                            key: PropertyKey::Named(name.clone()),
                            value: Pattern::Ident(name),
                            default: None,
                        }),
                        ObjectProp::KeyValue { key, value } => {
                            let (value, default) = match value {
                                Expression::Assign {
                                    op: AssignOp::Assign,
                                    target,
                                    value,
                                    ..
                                } => match *target {
                                    AssignTarget::Ident(name) => (Pattern::Ident(name), Some(*value)),
                                    AssignTarget::Pattern(pattern) => (pattern, Some(*value)),
                                    AssignTarget::Member { .. } => {
                                        return Err(self.invalid_syntax(start, "invalid destructuring target"))
                                    }
                                },
                                other => (self.expression_to_pattern(other, start)?, None),
                            };
                            props.push(ObjectPatternProp {
                                key,
                                value,
                                default,
                            });
                        }
                        ObjectProp::Spread(Expression::Ident { name, .. }) => rest = Some(name),
                        ObjectProp::Spread(_) => {
                            return Err(self.invalid_syntax(start, "invalid rest element"))
                        }
                    }
                }
                Ok(Pattern::Object {
                    properties: props,
                    rest,
                })
            }
            Expression::Array { items, .. } => {
                let mut elements = Vec::new();
                let mut rest = None;
                for item in items {
                    match item {
                        ArrayItem::Hole => elements.push(None),
                        ArrayItem::Item(expr) => {
                            let element = match expr {
                                Expression::Assign {
                                    op: AssignOp::Assign,
                                    target,
                                    value,
                                    ..
                                } => match *target {
                                    AssignTarget::Ident(name) => PatternElement {
                                        pattern: Pattern::Ident(name),
                                        default: Some(*value),
                                    },
                                    AssignTarget::Pattern(pattern) => PatternElement {
                                        pattern,
                                        default: Some(*value),
                                    },
                                    AssignTarget::Member { .. } => {
                                        return Err(self.invalid_syntax(start, "invalid destructuring target"))
                                    }
                                },
                                other => PatternElement {
                                    pattern: self.expression_to_pattern(other, start)?,
                                    default: None,
                                },
                            };
                            elements.push(Some(element));
                        }
                        ArrayItem::Spread(expr) => {
                            rest = Some(Box::new(self.expression_to_pattern(expr, start)?));
                        }
                    }
                }
                Ok(Pattern::Array { elements, rest })
            }
            _ => Err(self.invalid_syntax(start, "invalid destructuring target")),
        }
    }

    /// Speculatively parse an arrow function; rewinds and returns `None` when
    /// the upcoming tokens are not one.
    fn try_parse_arrow(&mut self) -> ParseResult<Option<Expression>> {
        let start = self.peek()?.start;
        let mut is_async = false;

        match self.peek_token() {
            Some(Token::Ident("async")) => match self.peek_nth(1) {
                Some(Token::Ident(_)) if self.peek_nth(2) == Some(Token::Arrow) => {
                    self.bump();
                    is_async = true;
                }
                Some(Token::LParen) | Some(Token::LAngle) => {
                    let saved = self.save();
                    self.bump();
                    if self.newline_before() {
                        self.restore(saved);
                        return Ok(None);
                    }
                    match self.try_parse_arrow_after_async(start)? {
                        Some(arrow) => return Ok(Some(arrow)),
                        None => {
                            self.restore(saved);
                            return Ok(None);
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }

        match self.peek_token() {
            Some(Token::Ident(name)) if self.peek_nth(1) == Some(Token::Arrow) && !is_reserved(name) => {
                self.bump();
                self.bump(); // =>
                let body = self.parse_arrow_body()?;
                Ok(Some(Expression::Function(Rc::new(FunctionDef {
                    name: None,
                    params: vec![Param {
                        pattern: Pattern::Ident(name.to_string()),
                        default: None,
                        rest: false,
                    }],
                    body,
                    is_arrow: true,
                    is_async,
                    span: self.span_from(start),
                }))))
            }
            Some(Token::LParen) | Some(Token::LAngle) => {
                let saved = self.save();
                match self.try_arrow_signature() {
                    Ok(Some(params)) => {
                        let body = self.parse_arrow_body()?;
                        Ok(Some(Expression::Function(Rc::new(FunctionDef {
                            name: None,
                            params,
                            body,
                            is_arrow: true,
                            is_async,
                            span: self.span_from(start),
                        }))))
                    }
                    _ => {
                        self.restore(saved);
                        Ok(None)
                    }
                }
            }
            _ => Ok(None),
        }
    }

    fn try_parse_arrow_after_async(&mut self, start: usize) -> ParseResult<Option<Expression>> {
        match self.try_arrow_signature() {
            Ok(Some(params)) => {
                let body = self.parse_arrow_body()?;
                Ok(Some(Expression::Function(Rc::new(FunctionDef {
                    name: None,
                    params,
                    body,
                    is_arrow: true,
                    is_async: true,
                    span: self.span_from(start),
                }))))
            }
            _ => Ok(None),
        }
    }

    /// `<T,>(a: T, b = 1): R =>`; consumes through `=>` on success
    fn try_arrow_signature(&mut self) -> ParseResult<Option<Vec<Param>>> {
        if self.check(Token::LAngle) {
            // `<div>` is JSX, `<T,>` / `<T extends X>` are type parameters
            match (self.peek_nth(1), self.peek_nth(2)) {
                (Some(Token::Ident(_)), Some(Token::Comma))
                | (Some(Token::Ident(_)), Some(Token::Ident("extends"))) => {
                    self.skip_type_args()?;
                }
                _ => return Ok(None),
            }
        }
        if !self.check(Token::LParen) {
            return Ok(None);
        }
        let params = self.parse_params()?;
        if self.check(Token::Colon) {
            self.bump();
            self.skip_type()?;
        }
        if !self.check(Token::Arrow) || self.newline_before() {
            return Ok(None);
        }
        self.bump();
        Ok(Some(params))
    }

    fn parse_arrow_body(&mut self) -> ParseResult<FunctionBody> {
        if self.check(Token::LBrace) {
            Ok(FunctionBody::Block(self.parse_block()?))
        } else {
            Ok(FunctionBody::Expression(self.parse_assignment()?))
        }
    }

    fn parse_conditional(&mut self) -> ParseResult<Expression> {
        let start = self.peek()?.start;
        let test = self.parse_binary(0)?;
        if !self.check(Token::Question) {
            return Ok(test);
        }
        self.bump();
        let previous = self.no_in;
        self.no_in = false;
        let consequent = self.parse_assignment();
        self.no_in = previous;
        let consequent = consequent?;
        self.expect(Token::Colon, "':'")?;
        let alternate = self.parse_assignment()?;
        Ok(Expression::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
            span: self.span_from(start),
        })
    }

    fn binary_operator(&self) -> Option<(u8, BinaryKind)> {
        let token = self.peek_token()?;
        let op = match token {
            Token::Nullish => (1, BinaryKind::Logical(LogicalOp::Nullish)),
            Token::PipePipe => (1, BinaryKind::Logical(LogicalOp::Or)),
            Token::AmpAmp => (2, BinaryKind::Logical(LogicalOp::And)),
            Token::Pipe => (3, BinaryKind::Binary(BinaryOp::BitOr)),
            Token::Caret => (4, BinaryKind::Binary(BinaryOp::BitXor)),
            Token::Amp => (5, BinaryKind::Binary(BinaryOp::BitAnd)),
            Token::StrictEq => (6, BinaryKind::Binary(BinaryOp::StrictEq)),
            Token::StrictNe => (6, BinaryKind::Binary(BinaryOp::StrictNe)),
            Token::LooseEq => (6, BinaryKind::Binary(BinaryOp::LooseEq)),
            Token::LooseNe => (6, BinaryKind::Binary(BinaryOp::LooseNe)),
            Token::LAngle => (7, BinaryKind::Binary(BinaryOp::Lt)),
            Token::RAngle => (7, BinaryKind::Binary(BinaryOp::Gt)),
            Token::LessEq => (7, BinaryKind::Binary(BinaryOp::Le)),
            Token::GreaterEq => (7, BinaryKind::Binary(BinaryOp::Ge)),
            Token::Ident("instanceof") => (7, BinaryKind::Binary(BinaryOp::InstanceOf)),
            Token::Ident("in") if !self.no_in => (7, BinaryKind::Binary(BinaryOp::In)),
            Token::Ident("as") | Token::Ident("satisfies") if !self.newline_before() => {
                (7, BinaryKind::Cast)
            }
            Token::Plus => (8, BinaryKind::Binary(BinaryOp::Add)),
            Token::Minus => (8, BinaryKind::Binary(BinaryOp::Sub)),
            Token::Star => (9, BinaryKind::Binary(BinaryOp::Mul)),
            Token::Slash => (9, BinaryKind::Binary(BinaryOp::Div)),
            Token::Percent => (9, BinaryKind::Binary(BinaryOp::Rem)),
            Token::StarStar => (10, BinaryKind::Binary(BinaryOp::Pow)),
            _ => return None,
        };
        Some(op)
    }

    /// Precedence climbing over binary and logical operators
    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Expression> {
        let start = self.peek()?.start;
        let mut left = self.parse_unary()?;

        while let Some((prec, kind)) = self.binary_operator() {
            if prec <= min_prec {
                break;
            }
            self.bump();

            match kind {
                BinaryKind::Cast => {
                    self.skip_type()?;
                }
                BinaryKind::Logical(op) => {
                    let right = self.parse_binary(prec)?;
                    left = Expression::Logical {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                        span: self.span_from(start),
                    };
                }
                BinaryKind::Binary(op) => {
                    // `**` is right associative
                    let next_min = if op == BinaryOp::Pow { prec - 1 } else { prec };
                    let right = self.parse_binary(next_min)?;
                    left = Expression::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                        span: self.span_from(start),
                    };
                }
            }
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let start = self.peek()?.start;
        let op = match self.peek_token() {
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Minus) => Some(UnaryOp::Minus),
            Some(Token::Plus) => Some(UnaryOp::Plus),
            Some(Token::Tilde) => Some(UnaryOp::BitNot),
            Some(Token::Ident("typeof")) => Some(UnaryOp::TypeOf),
            Some(Token::Ident("void")) => Some(UnaryOp::Void),
            Some(Token::Ident("delete")) => Some(UnaryOp::Delete),
            _ => None,
        };

        if let Some(op) = op {
            self.bump();
            let argument = self.parse_unary()?;
            return Ok(Expression::Unary {
                op,
                argument: Box::new(argument),
                span: self.span_from(start),
            });
        }

        if self.check_ident("await") && self.peek_nth(1).map_or(false, |t| starts_expression(&t)) {
            self.bump();
            let argument = self.parse_unary()?;
            return Ok(Expression::Await {
                argument: Box::new(argument),
                span: self.span_from(start),
            });
        }

        if self.check(Token::PlusPlus) || self.check(Token::MinusMinus) {
            let op = if self.check(Token::PlusPlus) {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            self.bump();
            let target = self.parse_unary()?;
            return Ok(Expression::Update {
                op,
                prefix: true,
                target: Box::new(target),
                span: self.span_from(start),
            });
        }

        let expr = self.parse_postfix()?;
        if (self.check(Token::PlusPlus) || self.check(Token::MinusMinus)) && !self.newline_before() {
            let op = if self.check(Token::PlusPlus) {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            self.bump();
            return Ok(Expression::Update {
                op,
                prefix: false,
                target: Box::new(expr),
                span: self.span_from(start),
            });
        }
        Ok(expr)
    }

    /// Member access, calls, optional chaining and TS non-null assertions
    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let start = self.peek()?.start;
        let mut expr = if self.check_ident("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        loop {
            match self.peek_token() {
                Some(Token::Dot) => {
                    self.bump();
                    self.match_token(Token::Hash);
                    let name = self.expect_property_name()?;
                    expr = Expression::Member {
                        object: Box::new(expr),
                        property: MemberProp::Named(name),
                        optional: false,
                        span: self.span_from(start),
                    };
                }
                Some(Token::QuestionDot) => {
                    self.bump();
                    if self.check(Token::LParen) {
                        let arguments = self.parse_arguments()?;
                        expr = Expression::Call {
                            callee: Box::new(expr),
                            arguments,
                            optional: true,
                            span: self.span_from(start),
                        };
                    } else if self.match_token(Token::LBracket) {
                        let property = self.parse_expression()?;
                        self.expect(Token::RBracket, "']'")?;
                        expr = Expression::Member {
                            object: Box::new(expr),
                            property: MemberProp::Computed(Box::new(property)),
                            optional: true,
                            span: self.span_from(start),
                        };
                    } else {
                        let name = self.expect_property_name()?;
                        expr = Expression::Member {
                            object: Box::new(expr),
                            property: MemberProp::Named(name),
                            optional: true,
                            span: self.span_from(start),
                        };
                    }
                }
                Some(Token::LBracket) => {
                    self.bump();
                    let property = self.parse_expression()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expression::Member {
                        object: Box::new(expr),
                        property: MemberProp::Computed(Box::new(property)),
                        optional: false,
                        span: self.span_from(start),
                    };
                }
                Some(Token::LParen) => {
                    let arguments = self.parse_arguments()?;
                    expr = Expression::Call {
                        callee: Box::new(expr),
                        arguments,
                        optional: false,
                        span: self.span_from(start),
                    };
                }
                Some(Token::Bang) if !self.newline_before() => {
                    self.bump();
                }
                Some(Token::LAngle) if !self.newline_before() => {
                    // `useState<string>("")`
                    let saved = self.save();
                    if self.try_skip_type_args_before_call() {
                        continue;
                    }
                    self.restore(saved);
                    break;
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_new(&mut self) -> ParseResult<Expression> {
        let start = self.peek()?.start;
        self.bump(); // new

        let mut callee = if self.check_ident("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            if self.match_token(Token::Dot) {
                let name = self.expect_property_name()?;
                callee = Expression::Member {
                    object: Box::new(callee),
                    property: MemberProp::Named(name),
                    optional: false,
                    span: self.span_from(start),
                };
            } else if self.check(Token::LAngle) {
                let saved = self.save();
                if !self.try_skip_type_args_before_call() {
                    self.restore(saved);
                }
                break;
            } else {
                break;
            }
        }

        let arguments = if self.check(Token::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };

        Ok(Expression::New {
            callee: Box::new(callee),
            arguments,
            span: self.span_from(start),
        })
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Argument>> {
        self.expect(Token::LParen, "'('")?;
        let mut arguments = Vec::new();
        while !self.check(Token::RParen) {
            if self.match_token(Token::Ellipsis) {
                arguments.push(Argument::Spread(self.parse_assignment()?));
            } else {
                arguments.push(Argument::Item(self.parse_assignment()?));
            }
            if !self.match_token(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen, "')'")?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let lexed = self.peek()?;
        let start = lexed.start;
        let token = match lexed.token {
            Some(token) => token,
            None => return Err(self.unexpected_eof("expression")),
        };

        match token {
            Token::Number(raw) => {
                self.bump();
                Ok(Expression::Literal {
                    value: Literal::Number(parse_number(raw)),
                    span: self.span_from(start),
                })
            }
            Token::String(raw) => {
                self.bump();
                Ok(Expression::Literal {
                    value: Literal::String(decode_string_literal(raw)),
                    span: self.span_from(start),
                })
            }
            Token::Backtick => self.parse_template(),
            Token::Slash | Token::SlashAssign => self.parse_regex(start),
            Token::LParen => {
                self.bump();
                let previous = self.no_in;
                self.no_in = false;
                let expr = self.parse_expression();
                self.no_in = previous;
                let expr = expr?;
                self.expect(Token::RParen, "')'")?;
                Ok(expr)
            }
            Token::LBracket => self.parse_array_literal(),
            Token::LBrace => self.parse_object_literal(),
            Token::LAngle => Ok(Expression::Jsx(Box::new(self.parse_jsx_element()?))),
            Token::Ident(word) => match word {
                "true" | "false" => {
                    self.bump();
                    Ok(Expression::Literal {
                        value: Literal::Boolean(word == "true"),
                        span: self.span_from(start),
                    })
                }
                "null" => {
                    self.bump();
                    Ok(Expression::Literal {
                        value: Literal::Null,
                        span: self.span_from(start),
                    })
                }
                "undefined" => {
                    self.bump();
                    Ok(Expression::Literal {
                        value: Literal::Undefined,
                        span: self.span_from(start),
                    })
                }
                "function" => Ok(Expression::Function(self.parse_function(false)?)),
                "async" if self.peek_nth(1).map_or(false, |t| t.is_ident("function")) => {
                    self.bump();
                    Ok(Expression::Function(self.parse_function(true)?))
                }
                "class" => Err(self.invalid_syntax(start, "class expressions are not supported")),
                _ => {
                    self.bump();
                    Ok(Expression::Ident {
                        name: word.to_string(),
                        span: self.span_from(start),
                    })
                }
            },
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Regex bodies are scanned raw; `/` inside a character class does not terminate
    fn parse_regex(&mut self, start: usize) -> ParseResult<Expression> {
        let body = &self.source[start + 1..];
        let mut in_class = false;
        let mut escaped = false;
        let mut end = None;
        for (i, c) in body.char_indices() {
            match c {
                '\n' => break,
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => {
                    end = Some(i);
                    break;
                }
                _ => {}
            }
        }
        let end = end.ok_or_else(|| self.invalid_syntax(start, "unterminated regular expression"))?;
        let pattern = body[..end].to_string();
        let flags: String = body[end + 1..]
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        self.pos = start + 1 + end + 1 + flags.len();
        self.prev_end = self.pos;
        Ok(Expression::Regex {
            pattern,
            flags,
            span: self.span_from(start),
        })
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expression> {
        let start = self.peek()?.start;
        self.expect(Token::LBracket, "'['")?;
        let mut items = Vec::new();
        while !self.check(Token::RBracket) {
            if self.match_token(Token::Comma) {
                items.push(ArrayItem::Hole);
                continue;
            }
            if self.match_token(Token::Ellipsis) {
                items.push(ArrayItem::Spread(self.parse_assignment()?));
            } else {
                items.push(ArrayItem::Item(self.parse_assignment()?));
            }
            if !self.match_token(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBracket, "']'")?;
        Ok(Expression::Array {
            items,
            span: self.span_from(start),
        })
    }

    fn parse_object_literal(&mut self) -> ParseResult<Expression> {
        let start = self.peek()?.start;
        self.expect(Token::LBrace, "'{'")?;
        let mut properties = Vec::new();

        while !self.check(Token::RBrace) {
            if self.match_token(Token::Ellipsis) {
                properties.push(ObjectProp::Spread(self.parse_assignment()?));
                if !self.match_token(Token::Comma) {
                    break;
                }
                continue;
            }

            let member_start = self.peek()?.start;
            let mut is_async = false;
            if (self.check_ident("async") || self.check_ident("get") || self.check_ident("set"))
                && !matches!(
                    self.peek_nth(1),
                    Some(Token::Colon) | Some(Token::Comma) | Some(Token::RBrace) | Some(Token::LParen) | Some(Token::Assign)
                )
            {
                is_async = self.check_ident("async");
                self.bump();
            }
            self.match_token(Token::Star);

            let key = self.parse_property_key()?;

            if self.check(Token::LParen) || self.check(Token::LAngle) {
                if self.check(Token::LAngle) {
                    self.skip_type_args()?;
                }
                let params = self.parse_params()?;
                if self.match_token(Token::Colon) {
                    self.skip_type()?;
                }
                let body = self.parse_block()?;
                let name = match &key {
                    PropertyKey::Named(name) => Some(name.clone()),
                    PropertyKey::Computed(_) => None,
                };
                properties.push(ObjectProp::KeyValue {
                    key,
                    value: Expression::Function(Rc::new(FunctionDef {
                        name,
                        params,
                        body: FunctionBody::Block(body),
                        is_arrow: false,
                        is_async,
                        span: self.span_from(member_start),
                    })),
                });
            } else if self.match_token(Token::Colon) {
                let value = self.parse_assignment()?;
                properties.push(ObjectProp::KeyValue { key, value });
            } else {
                match key {
                    PropertyKey::Named(name) => {
                        // `{ a = 1 }` only appears as a destructuring target
                        if self.match_token(Token::Assign) {
                            let default = self.parse_assignment()?;
                            let span = self.span_from(member_start);
                            properties.push(ObjectProp::KeyValue {
                                key: PropertyKey::Named(name.clone()),
                                value: Expression::Assign {
                                    op: AssignOp::Assign,
                                    target: Box::new(AssignTarget::Ident(name)),
                                    value: Box::new(default),
                                    span,
                                },
                            });
                        } else {
                            properties.push(ObjectProp::Shorthand(name));
                        }
                    }
                    PropertyKey::Computed(_) => return Err(self.unexpected("':'")),
                }
            }

            if !self.match_token(Token::Comma) {
                break;
            }
        }

        self.expect(Token::RBrace, "'}'")?;
        Ok(Expression::Object {
            properties,
            span: self.span_from(start),
        })
    }

    /// Template literal; `pos` is at the opening backtick
    fn parse_template(&mut self) -> ParseResult<Expression> {
        let start = self.peek()?.start;
        self.bump(); // `

        let mut quasis = Vec::new();
        let mut expressions = Vec::new();
        let mut current = String::new();

        loop {
            let rest = &self.source[self.pos..];
            let mut chars = rest.char_indices();
            let mut consumed = None;
            let mut interpolation = false;

            while let Some((i, c)) = chars.next() {
                match c {
                    '`' => {
                        consumed = Some(i + 1);
                        break;
                    }
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            match escaped {
                                '\n' => {}
                                'u' | 'x' => {
                                    let mut raw = String::from("\\");
                                    raw.push(escaped);
                                    raw.extend(
                                        chars
                                            .clone()
                                            .map(|(_, ch)| ch)
                                            .take_while(|ch| ch.is_ascii_hexdigit() || *ch == '{' || *ch == '}')
                                            .take(if escaped == 'x' { 2 } else { 8 }),
                                    );
                                    let used = escape_length(&raw);
                                    let escape: String = raw.chars().take(used).collect();
                                    current.push_str(&decode_escapes(&escape));
                                    for _ in 0..used.saturating_sub(2) {
                                        chars.next();
                                    }
                                }
                                other => current.push(simple_escape(other)),
                            }
                        }
                    }
                    '$' if rest[i + 1..].starts_with('{') => {
                        consumed = Some(i + 2);
                        interpolation = true;
                        break;
                    }
                    '\r' => {}
                    other => current.push(other),
                }
            }

            let consumed = match consumed {
                Some(consumed) => consumed,
                None => return Err(self.unexpected_eof("'`'")),
            };
            self.pos += consumed;
            self.prev_end = self.pos;
            quasis.push(std::mem::take(&mut current));

            if !interpolation {
                break;
            }

            let previous = self.no_in;
            self.no_in = false;
            let expr = self.parse_expression();
            self.no_in = previous;
            expressions.push(expr?);
            self.expect(Token::RBrace, "'}'")?;
        }

        Ok(Expression::Template {
            quasis,
            expressions,
            span: self.span_from(start),
        })
    }

    // ------------------------------------------------------------------
    // JSX
    // ------------------------------------------------------------------

    fn parse_jsx_element(&mut self) -> ParseResult<JsxElement> {
        let start = self.peek()?.start;
        self.expect(Token::LAngle, "'<'")?;

        if self.check(Token::RAngle) {
            self.bump();
            let children = self.parse_jsx_children(None)?;
            return Ok(JsxElement {
                name: JsxName::Fragment,
                attributes: Vec::new(),
                children,
                span: self.span_from(start),
            });
        }

        let raw_name = self.parse_jsx_name()?;
        let name = classify_jsx_name(&raw_name);

        // Generic components `<Select<Option> ...>` are rare; type args are skipped
        if self.check(Token::LAngle) {
            self.skip_type_args()?;
        }

        let mut attributes = Vec::new();
        loop {
            match self.peek()?.token {
                Some(Token::RAngle) | Some(Token::Slash) => break,
                Some(Token::LBrace) => {
                    self.bump();
                    self.expect(Token::Ellipsis, "'...'")?;
                    let expr = self.parse_assignment()?;
                    self.expect(Token::RBrace, "'}'")?;
                    attributes.push(JsxAttribute::Spread(expr));
                }
                Some(Token::Ident(_)) => {
                    let attr_name = self.parse_jsx_attribute_name()?;
                    let value = if self.match_token(Token::Assign) {
                        Some(self.parse_jsx_attribute_value()?)
                    } else {
                        None
                    };
                    attributes.push(JsxAttribute::Named {
                        name: attr_name,
                        value,
                    });
                }
                None => return Err(self.unexpected_eof("'>'")),
                _ => return Err(self.unexpected("JSX attribute")),
            }
        }

        if self.match_token(Token::Slash) {
            self.expect(Token::RAngle, "'>'")?;
            return Ok(JsxElement {
                name,
                attributes,
                children: Vec::new(),
                span: self.span_from(start),
            });
        }

        self.expect(Token::RAngle, "'>'")?;
        let children = self.parse_jsx_children(Some(raw_name.as_str()))?;

        Ok(JsxElement {
            name,
            attributes,
            children,
            span: self.span_from(start),
        })
    }

    fn parse_jsx_name(&mut self) -> ParseResult<String> {
        let mut name = self.expect_ident()?;
        loop {
            match self.peek_token() {
                Some(Token::Dot) => {
                    self.bump();
                    name.push('.');
                    name.push_str(&self.expect_ident()?);
                }
                Some(Token::Minus) | Some(Token::Colon) if self.is_adjacent() => {
                    let sep = if self.check(Token::Minus) { '-' } else { ':' };
                    self.bump();
                    name.push(sep);
                    name.push_str(&self.expect_ident()?);
                }
                _ => break,
            }
        }
        Ok(name)
    }

    fn parse_jsx_attribute_name(&mut self) -> ParseResult<String> {
        let mut name = self.expect_ident()?;
        while (self.check(Token::Minus) || self.check(Token::Colon)) && self.is_adjacent() {
            let sep = if self.check(Token::Minus) { '-' } else { ':' };
            self.bump();
            name.push(sep);
            match self.advance()?.token {
                Some(Token::Ident(part)) | Some(Token::Number(part)) => name.push_str(part),
                _ => return Err(self.unexpected("attribute name")),
            }
        }
        Ok(name)
    }

    fn parse_jsx_attribute_value(&mut self) -> ParseResult<JsxAttrValue> {
        // JSX strings may span lines and carry no escapes, so scan them raw
        let rest = &self.source[self.pos..];
        let value_start = self.pos + (rest.len() - rest.trim_start().len());
        let quote = self.source[value_start..].chars().next();
        if let Some(quote @ ('"' | '\'')) = quote {
            let body_start = value_start + 1;
            match self.source[body_start..].find(quote) {
                Some(len) => {
                    let raw = &self.source[body_start..body_start + len];
                    self.pos = body_start + len + 1;
                    self.prev_end = self.pos;
                    return Ok(JsxAttrValue::String(decode_entities(raw)));
                }
                None => return Err(self.unexpected_eof("closing quote")),
            }
        }

        match self.peek()?.token {
            Some(Token::LBrace) => {
                self.bump();
                let expr = self.parse_assignment()?;
                self.expect(Token::RBrace, "'}'")?;
                Ok(JsxAttrValue::Expression(expr))
            }
            Some(Token::LAngle) => Ok(JsxAttrValue::Expression(Expression::Jsx(Box::new(
                self.parse_jsx_element()?,
            )))),
            _ => Err(self.unexpected("attribute value")),
        }
    }

    /// Children up to the matching closing tag; `pos` is just past the `>`
    fn parse_jsx_children(&mut self, closing: Option<&str>) -> ParseResult<Vec<JsxChild>> {
        let mut children = Vec::new();

        loop {
            let rest = &self.source[self.pos..];
            let boundary = rest.find(|c| c == '<' || c == '{');
            let text_len = boundary.unwrap_or(rest.len());
            let text = normalize_jsx_text(&rest[..text_len]);
            if !text.is_empty() {
                children.push(JsxChild::Text(text));
            }
            self.pos += text_len;
            self.prev_end = self.pos;

            if boundary.is_none() {
                return Err(self.unexpected_eof(&format!(
                    "closing tag </{}>",
                    closing.unwrap_or("")
                )));
            }

            if self.source[self.pos..].starts_with('{') {
                self.pos += 1;
                self.prev_end = self.pos;
                if self.match_token(Token::RBrace) {
                    continue;
                }
                self.match_token(Token::Ellipsis);
                let expr = self.parse_expression()?;
                self.expect(Token::RBrace, "'}'")?;
                children.push(JsxChild::Expression(expr));
                continue;
            }

            // `<` starts either a closing tag or a nested element
            let tag_start = self.pos;
            let after = lex_at(self.source, tag_start + 1).map_err(|p| self.lexer_error(p))?;
            if after.token == Some(Token::Slash) {
                self.pos = after.end;
                self.prev_end = self.pos;
                let found = if self.check(Token::RAngle) {
                    None
                } else {
                    Some(self.parse_jsx_name()?)
                };
                self.expect(Token::RAngle, "'>'")?;
                if found.as_deref() != closing {
                    return Err(self.invalid_syntax(
                        tag_start,
                        format!(
                            "expected closing tag </{}>, found </{}>",
                            closing.unwrap_or(""),
                            found.unwrap_or_default()
                        ),
                    ));
                }
                return Ok(children);
            }

            children.push(JsxChild::Element(self.parse_jsx_element()?));
        }
    }

    // ------------------------------------------------------------------
    // TypeScript syntax that is discarded
    // ------------------------------------------------------------------

    /// Skip a type expression
    fn skip_type(&mut self) -> ParseResult<()> {
        if self.check(Token::Pipe) || self.check(Token::Amp) {
            self.bump();
        }
        self.skip_type_operand()?;
        while self.check(Token::Pipe) || self.check(Token::Amp) {
            self.bump();
            self.skip_type_operand()?;
        }
        // conditional types `T extends U ? X : Y`
        if self.check_ident("extends") {
            self.bump();
            self.skip_type_operand()?;
            self.expect(Token::Question, "'?'")?;
            self.skip_type()?;
            self.expect(Token::Colon, "':'")?;
            self.skip_type()?;
        }
        Ok(())
    }

    fn skip_type_operand(&mut self) -> ParseResult<()> {
        while self.check_ident("keyof")
            || self.check_ident("typeof")
            || self.check_ident("readonly")
            || self.check_ident("unique")
            || self.check_ident("infer")
            || self.check_ident("asserts")
        {
            if matches!(self.peek_nth(1), Some(Token::Ident(_)) | Some(Token::LParen) | Some(Token::LBracket) | Some(Token::LBrace)) {
                self.bump();
            } else {
                break;
            }
        }

        match self.peek()?.token {
            Some(Token::LParen) => {
                self.skip_balanced(Token::LParen, Token::RParen)?;
                if self.match_token(Token::Arrow) {
                    self.skip_type()?;
                }
            }
            Some(Token::LBrace) => self.skip_balanced(Token::LBrace, Token::RBrace)?,
            Some(Token::LBracket) => self.skip_balanced(Token::LBracket, Token::RBracket)?,
            Some(Token::LAngle) => {
                self.skip_type_args()?;
                self.skip_type_operand()?;
            }
            Some(Token::String(_)) | Some(Token::Number(_)) => self.bump(),
            Some(Token::Backtick) => {
                self.parse_template()?;
            }
            Some(Token::Minus) => {
                self.bump();
                self.bump();
            }
            Some(Token::Ident("new")) => {
                self.bump();
                self.skip_type_operand()?;
            }
            Some(Token::Ident(name)) => {
                self.bump();
                if name == "import" && self.check(Token::LParen) {
                    // `import("./x").Foo`
                    self.skip_balanced(Token::LParen, Token::RParen)?;
                }
                while self.check(Token::Dot) {
                    self.bump();
                    self.expect_ident()?;
                }
                if self.check(Token::LAngle) && !self.newline_before() {
                    self.skip_type_args()?;
                }
            }
            _ => return Err(self.unexpected("type")),
        }

        while self.check(Token::LBracket) && !self.newline_before() {
            self.skip_balanced(Token::LBracket, Token::RBracket)?;
        }

        // type predicates `value is string`
        if self.check_ident("is") && !self.newline_before() {
            self.bump();
            self.skip_type()?;
        }
        Ok(())
    }

    /// Skip `<...>`, tracking nesting
    fn skip_type_args(&mut self) -> ParseResult<()> {
        self.expect(Token::LAngle, "'<'")?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek()?.token {
                Some(Token::LAngle) => {
                    depth += 1;
                    self.bump();
                }
                Some(Token::RAngle) => {
                    depth -= 1;
                    self.bump();
                }
                Some(Token::LParen) => self.skip_balanced(Token::LParen, Token::RParen)?,
                Some(Token::LBrace) => self.skip_balanced(Token::LBrace, Token::RBrace)?,
                Some(Token::LBracket) => self.skip_balanced(Token::LBracket, Token::RBracket)?,
                Some(_) => self.bump(),
                None => return Err(self.unexpected_eof("'>'")),
            }
        }
        Ok(())
    }

    /// Speculative `<T>(` check used for generic calls; never errors
    fn try_skip_type_args_before_call(&mut self) -> bool {
        if !self.check(Token::LAngle) {
            return false;
        }
        self.bump();
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek_token() {
                Some(Token::LAngle) => depth += 1,
                Some(Token::RAngle) => depth -= 1,
                Some(Token::Ident("return" | "if" | "const" | "let" | "var" | "in" | "instanceof")) => {
                    return false
                }
                Some(Token::Ident(_))
                | Some(Token::String(_))
                | Some(Token::Number(_))
                | Some(Token::Dot)
                | Some(Token::Comma)
                | Some(Token::Pipe)
                | Some(Token::Amp)
                | Some(Token::LBracket)
                | Some(Token::RBracket)
                | Some(Token::LBrace)
                | Some(Token::RBrace)
                | Some(Token::LParen)
                | Some(Token::RParen)
                | Some(Token::Colon)
                | Some(Token::Semicolon)
                | Some(Token::Question)
                | Some(Token::Arrow) => {}
                _ => return false,
            }
            self.bump();
        }
        self.check(Token::LParen)
    }

    fn skip_balanced(&mut self, open: Token<'static>, close: Token<'static>) -> ParseResult<()> {
        self.expect(open, "opening bracket")?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek()?.token {
                Some(token) if token == open => depth += 1,
                Some(token) if token == close => depth -= 1,
                Some(Token::Backtick) => {
                    self.parse_template()?;
                    continue;
                }
                Some(_) => {}
                None => return Err(self.unexpected_eof("closing bracket")),
            }
            self.bump();
        }
        Ok(())
    }

    fn skip_interface(&mut self) -> ParseResult<()> {
        self.bump(); // interface
        while !self.check(Token::LBrace) {
            if self.is_at_end()? {
                return Err(self.unexpected_eof("'{'"));
            }
            if self.check(Token::LAngle) {
                self.skip_type_args()?;
            } else {
                self.bump();
            }
        }
        self.skip_balanced(Token::LBrace, Token::RBrace)
    }

    fn skip_type_alias(&mut self) -> ParseResult<()> {
        self.bump(); // type
        self.expect_ident()?;
        if self.check(Token::LAngle) {
            self.skip_type_args()?;
        }
        self.expect(Token::Assign, "'='")?;
        self.skip_type()?;
        self.consume_semicolon();
        Ok(())
    }

    fn skip_declare(&mut self) -> ParseResult<()> {
        self.bump(); // declare
        if self.check_ident("module") || self.check_ident("namespace") || self.check_ident("global") {
            while !self.check(Token::LBrace) {
                if self.is_at_end()? {
                    return Ok(());
                }
                self.bump();
            }
            return self.skip_balanced(Token::LBrace, Token::RBrace);
        }
        self.parse_statement().map(|_| ())
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> ParseResult<Lexed<'src>> {
        lex_at(self.source, self.pos).map_err(|p| self.lexer_error(p))
    }

    fn peek_token(&self) -> Option<Token<'src>> {
        self.peek().ok().and_then(|lexed| lexed.token)
    }

    fn peek_nth(&self, n: usize) -> Option<Token<'src>> {
        let mut offset = self.pos;
        let mut lexed = lex_at(self.source, offset).ok()?;
        for _ in 0..n {
            lexed.token?;
            offset = lexed.end;
            lexed = lex_at(self.source, offset).ok()?;
        }
        lexed.token
    }

    fn advance(&mut self) -> ParseResult<Lexed<'src>> {
        let lexed = self.peek()?;
        if lexed.token.is_some() {
            self.prev_end = lexed.end;
            self.pos = lexed.end;
        }
        Ok(lexed)
    }

    /// Advance past a token already inspected with `check`/`peek_token`
    fn bump(&mut self) {
        let _ = self.advance();
    }

    fn save(&self) -> (usize, usize) {
        (self.pos, self.prev_end)
    }

    fn restore(&mut self, saved: (usize, usize)) {
        self.pos = saved.0;
        self.prev_end = saved.1;
    }

    fn is_at_end(&self) -> ParseResult<bool> {
        Ok(self.peek()?.token.is_none())
    }

    fn check(&self, token: Token) -> bool {
        self.peek_token() == Some(token)
    }

    fn check_ident(&self, name: &str) -> bool {
        self.peek_token().map_or(false, |t| t.is_ident(name))
    }

    fn match_token(&mut self, token: Token) -> bool {
        if self.check(token) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> ParseResult<Lexed<'src>> {
        if self.check(token) {
            self.advance()
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.peek()?.token {
            Some(Token::Ident(name)) => {
                self.bump();
                Ok(name.to_string())
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Identifiers, including reserved words, are valid after `.`
    fn expect_property_name(&mut self) -> ParseResult<String> {
        self.expect_ident()
    }

    fn expect_string(&mut self) -> ParseResult<String> {
        match self.peek()?.token {
            Some(Token::String(raw)) => {
                self.bump();
                Ok(decode_string_literal(raw))
            }
            _ => Err(self.unexpected("string literal")),
        }
    }

    fn consume_semicolon(&mut self) {
        self.match_token(Token::Semicolon);
    }

    fn newline_before(&self) -> bool {
        let next_start = match self.peek() {
            Ok(lexed) => lexed.start,
            Err(_) => return false,
        };
        self.source
            .get(self.prev_end..next_start)
            .map_or(false, |gap| gap.contains('\n'))
    }

    /// True when the next token starts exactly where the previous one ended
    fn is_adjacent(&self) -> bool {
        self.peek().map_or(false, |lexed| lexed.start == self.prev_end)
    }

    fn span_from(&self, start: usize) -> Span {
        let (line, column) = self.lines.line_col(self.source, start);
        Span::new(start, self.prev_end.max(start), line, column)
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Ok(Lexed {
                token: Some(token),
                start,
                ..
            }) => {
                let (line, column) = self.lines.line_col(self.source, start);
                ParseError::UnexpectedToken {
                    pos: start,
                    line,
                    column,
                    expected: expected.to_string(),
                    found: token.to_string(),
                }
            }
            Ok(_) => self.unexpected_eof(expected),
            Err(err) => err,
        }
    }

    fn unexpected_at(&self, pos: usize, expected: &str) -> ParseError {
        let (line, column) = self.lines.line_col(self.source, pos);
        ParseError::UnexpectedToken {
            pos,
            line,
            column,
            expected: expected.to_string(),
            found: self.source[pos..].chars().take(12).collect(),
        }
    }

    fn unexpected_eof(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedEof {
            pos: self.source.len(),
            expected: expected.to_string(),
        }
    }

    fn invalid_syntax(&self, pos: usize, message: impl Into<String>) -> ParseError {
        let (line, column) = self.lines.line_col(self.source, pos);
        ParseError::InvalidSyntax {
            pos,
            line,
            column,
            message: message.into(),
        }
    }

    fn lexer_error(&self, pos: usize) -> ParseError {
        let (line, column) = self.lines.line_col(self.source, pos);
        ParseError::LexerError { pos, line, column }
    }
}

enum BinaryKind {
    Binary(BinaryOp),
    Logical(LogicalOp),
    Cast,
}

fn is_reserved(word: &str) -> bool {
    matches!(
        word,
        "true" | "false" | "null" | "this" | "function" | "return" | "new" | "typeof" | "void"
    )
}

fn starts_expression(token: &Token) -> bool {
    !matches!(
        token,
        Token::RParen
            | Token::RBrace
            | Token::RBracket
            | Token::Semicolon
            | Token::Comma
            | Token::Colon
            | Token::Assign
            | Token::Arrow
            | Token::Dot
    )
}

fn classify_jsx_name(raw: &str) -> JsxName {
    if raw.contains('.') {
        return JsxName::Component(raw.split('.').map(String::from).collect());
    }
    match raw.chars().next() {
        Some(c) if c.is_ascii_lowercase() => JsxName::Intrinsic(raw.to_string()),
        _ => JsxName::Component(vec![raw.to_string()]),
    }
}

/// Apply React's JSX whitespace rules to a raw text run
pub fn normalize_jsx_text(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    let last_non_empty = lines
        .iter()
        .rposition(|line| line.chars().any(|c| c != ' ' && c != '\t' && c != '\r'));

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let mut trimmed: String = line.replace('\t', " ").replace('\r', "");
        if i != 0 {
            trimmed = trimmed.trim_start_matches(' ').to_string();
        }
        if i != lines.len() - 1 {
            trimmed = trimmed.trim_end_matches(' ').to_string();
        }
        if !trimmed.is_empty() {
            if Some(i) != last_non_empty {
                trimmed.push(' ');
            }
            out.push_str(&trimmed);
        }
    }

    decode_entities(&out)
}

/// Decode the HTML entities that commonly appear in JSX text
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                "copy" => Some('©'),
                "reg" => Some('®'),
                "trade" => Some('™'),
                "mdash" => Some('—'),
                "ndash" => Some('–'),
                "hellip" => Some('…'),
                "middot" => Some('·'),
                "bull" => Some('•'),
                "times" => Some('×'),
                "rarr" => Some('→'),
                "larr" => Some('←'),
                "uarr" => Some('↑'),
                "darr" => Some('↓'),
                "laquo" => Some('«'),
                "raquo" => Some('»'),
                "hearts" => Some('♥'),
                "star" => Some('☆'),
                _ => {
                    if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
                    } else if let Some(dec) = entity.strip_prefix('#') {
                        dec.parse::<u32>().ok().and_then(char::from_u32)
                    } else {
                        None
                    }
                }
            };
            ch.map(|c| (c, end + 1))
        });

        match decoded {
            Some((ch, len)) => {
                out.push(ch);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Strip quotes and decode escapes of a lexed string literal
pub fn decode_string_literal(raw: &str) -> String {
    let inner = if raw.len() >= 2 { &raw[1..raw.len() - 1] } else { raw };
    decode_escapes(inner)
}

fn simple_escape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'v' => '\u{b}',
        '0' => '\0',
        other => other,
    }
}

/// Length in chars of the leading escape sequence of `raw` (starting at `\`)
fn escape_length(raw: &str) -> usize {
    let mut chars = raw.chars().skip(1);
    match chars.next() {
        Some('x') => 4.min(raw.chars().count()),
        Some('u') => {
            if raw[2..].starts_with('{') {
                raw.find('}').map(|end| raw[..=end].chars().count()).unwrap_or(raw.chars().count())
            } else {
                6.min(raw.chars().count())
            }
        }
        Some(_) => 2,
        None => 1,
    }
}

fn decode_escapes(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('x') => {
                let hex: String = (0..2).filter_map(|_| chars.next()).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => out.push_str(&hex),
                }
            }
            Some('u') => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    let mut hex = String::new();
                    for ch in chars.by_ref() {
                        if ch == '}' {
                            break;
                        }
                        hex.push(ch);
                    }
                    hex
                } else {
                    (0..4).filter_map(|_| chars.next()).collect()
                };
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => out.push('\u{fffd}'),
                }
            }
            Some('\n') => {}
            Some('\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some(other) => out.push(simple_escape(other)),
            None => out.push('\\'),
        }
    }

    out
}

pub fn parse_number(raw: &str) -> f64 {
    let cleaned = raw.replace('_', "");
    if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    cleaned.parse::<f64>().unwrap_or(f64::NAN)
}

fn format_number_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Parse a module source into a program
pub fn parse(source: &str) -> ParseResult<Program> {
    Parser::new(source).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_component() {
        let source = r#"
            export default function App() {
                return <div className="app">Hello</div>;
            }
        "#;

        let program = parse(source).unwrap();
        assert_eq!(program.body.len(), 1);
        match &program.body[0] {
            Statement::ExportDefault {
                value: ExportDefault::Function(function),
                ..
            } => {
                assert_eq!(function.name.as_deref(), Some("App"));
            }
            other => panic!("Expected default function export, got {:?}", other),
        }
    }

    #[test]
    fn test_jsx_text_whitespace() {
        assert_eq!(normalize_jsx_text("\n    Hello\n    world\n  "), "Hello world");
        assert_eq!(normalize_jsx_text("  a b  "), "  a b  ");
        assert_eq!(normalize_jsx_text("\n   \n"), "");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&copy; 2024"), "© 2024");
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
        assert_eq!(decode_entities("R&D"), "R&D");
    }

    #[test]
    fn test_decode_string_literal() {
        assert_eq!(decode_string_literal(r#""a\nb""#), "a\nb");
        assert_eq!(decode_string_literal(r"'it\'s'"), "it's");
        assert_eq!(decode_string_literal(r#""\u{1F600}""#), "😀");
        assert_eq!(decode_string_literal(r#""A""#), "A");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42"), 42.0);
        assert_eq!(parse_number("1_000"), 1000.0);
        assert_eq!(parse_number("0xff"), 255.0);
        assert_eq!(parse_number(".5"), 0.5);
    }
}
