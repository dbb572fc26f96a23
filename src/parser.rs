//! Front end: parses source with oxc and lowers the result into a [`Tree`].
//!
//! Parenthesized expressions are unwrapped, directives become expression
//! statements carrying a `directive` field, and regular expression and
//! bigint literals keep their source text. TypeScript-only syntax, JSX and
//! `using` declarations are rejected as unsupported.

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};

use crate::tree::{Kind, Node, NodeId, Tree, Value};
use crate::{ObfuscateError, Result};

pub fn parse(source: &str, module: bool) -> Result<Tree> {
    let mut tree = Tree::new(module);
    let body = parse_into(&mut tree, source, module)?;
    let root = tree.root();
    tree.set(root, "body", body);
    Ok(tree)
}

/// Parses `source` and lowers its statements into an existing tree without
/// attaching them anywhere.
pub fn parse_into(tree: &mut Tree, source: &str, module: bool) -> Result<Vec<NodeId>> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs().with_module(module);
    let ret = Parser::new(&allocator, source, source_type).parse();

    if let Some(first) = ret.errors.first() {
        return Err(ObfuscateError::ParseFailed(first.to_string()));
    }

    let mut lower = Lower { tree, source };
    lower.program(&ret.program)
}

struct Lower<'t, 's> {
    tree: &'t mut Tree,
    source: &'s str,
}

impl Lower<'_, '_> {
    fn add(&mut self, node: Node) -> NodeId {
        self.tree.add(node)
    }

    fn unsupported(&self, what: &str, span: Span) -> ObfuscateError {
        ObfuscateError::Unsupported {
            kind: what.to_string(),
            offset: span.start,
        }
    }

    fn slice(&self, span: Span) -> &str {
        &self.source[span.start as usize..span.end as usize]
    }

    fn ident(&mut self, name: &str) -> NodeId {
        self.tree.identifier(name)
    }

    fn program(&mut self, program: &Program<'_>) -> Result<Vec<NodeId>> {
        let mut body = self.directives(&program.directives);
        for stmt in &program.body {
            body.push(self.statement(stmt)?);
        }
        Ok(body)
    }

    fn directives(&mut self, directives: &[Directive<'_>]) -> Vec<NodeId> {
        directives
            .iter()
            .map(|directive| {
                let literal = self.tree.string(directive.expression.value.as_str());
                let stmt = self.tree.expression_statement(literal);
                self.tree
                    .set(stmt, "directive", directive.directive.as_str());
                stmt
            })
            .collect()
    }

    fn statements(&mut self, statements: &[Statement<'_>]) -> Result<Vec<NodeId>> {
        statements.iter().map(|s| self.statement(s)).collect()
    }

    fn block(&mut self, statements: &[Statement<'_>]) -> Result<NodeId> {
        let body = self.statements(statements)?;
        Ok(self.tree.block(body))
    }

    fn opt_expression(&mut self, expr: Option<&Expression<'_>>) -> Result<Option<NodeId>> {
        expr.map(|e| self.expression(e)).transpose()
    }

    fn label(&mut self, label: Option<&LabelIdentifier<'_>>) -> Option<NodeId> {
        label.map(|l| self.ident(l.name.as_str()))
    }

    fn statement(&mut self, stmt: &Statement<'_>) -> Result<NodeId> {
        let node = match stmt {
            Statement::BlockStatement(s) => return self.block(&s.body),
            Statement::BreakStatement(s) => {
                let label = self.label(s.label.as_ref());
                Node::new(Kind::BreakStatement).with("label", label)
            }
            Statement::ContinueStatement(s) => {
                let label = self.label(s.label.as_ref());
                Node::new(Kind::ContinueStatement).with("label", label)
            }
            Statement::DebuggerStatement(_) => Node::new(Kind::DebuggerStatement),
            Statement::EmptyStatement(_) => Node::new(Kind::EmptyStatement),
            Statement::DoWhileStatement(s) => {
                let body = self.statement(&s.body)?;
                let test = self.expression(&s.test)?;
                Node::new(Kind::DoWhileStatement)
                    .with("body", body)
                    .with("test", test)
            }
            Statement::ExpressionStatement(s) => {
                let expression = self.expression(&s.expression)?;
                Node::new(Kind::ExpressionStatement).with("expression", expression)
            }
            Statement::ForInStatement(s) => {
                let left = self.for_left(&s.left)?;
                let right = self.expression(&s.right)?;
                let body = self.statement(&s.body)?;
                Node::new(Kind::ForInStatement)
                    .with("left", left)
                    .with("right", right)
                    .with("body", body)
            }
            Statement::ForOfStatement(s) => {
                let left = self.for_left(&s.left)?;
                let right = self.expression(&s.right)?;
                let body = self.statement(&s.body)?;
                Node::new(Kind::ForOfStatement)
                    .with("await", s.r#await)
                    .with("left", left)
                    .with("right", right)
                    .with("body", body)
            }
            Statement::ForStatement(s) => {
                let init = match &s.init {
                    None => None,
                    Some(ForStatementInit::VariableDeclaration(decl)) => {
                        Some(self.variable_declaration(decl)?)
                    }
                    Some(init) => match init.as_expression() {
                        Some(expr) => Some(self.expression(expr)?),
                        None => return Err(self.unsupported("for initializer", s.span)),
                    },
                };
                let test = self.opt_expression(s.test.as_ref())?;
                let update = self.opt_expression(s.update.as_ref())?;
                let body = self.statement(&s.body)?;
                Node::new(Kind::ForStatement)
                    .with("init", init)
                    .with("test", test)
                    .with("update", update)
                    .with("body", body)
            }
            Statement::IfStatement(s) => {
                let test = self.expression(&s.test)?;
                let consequent = self.statement(&s.consequent)?;
                let alternate = s
                    .alternate
                    .as_ref()
                    .map(|alt| self.statement(alt))
                    .transpose()?;
                Node::new(Kind::IfStatement)
                    .with("test", test)
                    .with("consequent", consequent)
                    .with("alternate", alternate)
            }
            Statement::LabeledStatement(s) => {
                let label = self.ident(s.label.name.as_str());
                let body = self.statement(&s.body)?;
                Node::new(Kind::LabeledStatement)
                    .with("label", label)
                    .with("body", body)
            }
            Statement::ReturnStatement(s) => {
                let argument = self.opt_expression(s.argument.as_ref())?;
                Node::new(Kind::ReturnStatement).with("argument", argument)
            }
            Statement::SwitchStatement(s) => {
                let discriminant = self.expression(&s.discriminant)?;
                let mut cases = Vec::with_capacity(s.cases.len());
                for case in &s.cases {
                    let test = self.opt_expression(case.test.as_ref())?;
                    let consequent = self.statements(&case.consequent)?;
                    cases.push(
                        self.add(
                            Node::new(Kind::SwitchCase)
                                .with("test", test)
                                .with("consequent", consequent),
                        ),
                    );
                }
                Node::new(Kind::SwitchStatement)
                    .with("discriminant", discriminant)
                    .with("cases", cases)
            }
            Statement::ThrowStatement(s) => {
                let argument = self.expression(&s.argument)?;
                Node::new(Kind::ThrowStatement).with("argument", argument)
            }
            Statement::TryStatement(s) => {
                let block = self.block(&s.block.body)?;
                let handler = match &s.handler {
                    Some(clause) => {
                        let param = match &clause.param {
                            Some(param) => Some(self.binding(&param.pattern)?),
                            None => None,
                        };
                        let body = self.block(&clause.body.body)?;
                        Some(
                            self.add(
                                Node::new(Kind::CatchClause)
                                    .with("param", param)
                                    .with("body", body),
                            ),
                        )
                    }
                    None => None,
                };
                let finalizer = match &s.finalizer {
                    Some(block) => Some(self.block(&block.body)?),
                    None => None,
                };
                Node::new(Kind::TryStatement)
                    .with("block", block)
                    .with("handler", handler)
                    .with("finalizer", finalizer)
            }
            Statement::WhileStatement(s) => {
                let test = self.expression(&s.test)?;
                let body = self.statement(&s.body)?;
                Node::new(Kind::WhileStatement)
                    .with("test", test)
                    .with("body", body)
            }
            Statement::WithStatement(s) => {
                let object = self.expression(&s.object)?;
                let body = self.statement(&s.body)?;
                Node::new(Kind::WithStatement)
                    .with("object", object)
                    .with("body", body)
            }
            Statement::VariableDeclaration(decl) => return self.variable_declaration(decl),
            Statement::FunctionDeclaration(func) => {
                return self.function(func, Kind::FunctionDeclaration);
            }
            Statement::ClassDeclaration(class) => return self.class(class, Kind::ClassDeclaration),
            Statement::ImportDeclaration(decl) => return self.import(decl),
            Statement::ExportNamedDeclaration(decl) => {
                let declaration = match &decl.declaration {
                    Some(inner) => Some(self.declaration(inner)?),
                    None => None,
                };
                let mut specifiers = Vec::with_capacity(decl.specifiers.len());
                for spec in &decl.specifiers {
                    let local = self.module_export_name(&spec.local);
                    let exported = self.module_export_name(&spec.exported);
                    specifiers.push(
                        self.add(
                            Node::new(Kind::ExportSpecifier)
                                .with("local", local)
                                .with("exported", exported),
                        ),
                    );
                }
                let source = decl.source.as_ref().map(|s| self.tree.string(s.value.as_str()));
                Node::new(Kind::ExportNamedDeclaration)
                    .with("declaration", declaration)
                    .with("specifiers", specifiers)
                    .with("source", source)
            }
            Statement::ExportDefaultDeclaration(decl) => {
                let declaration = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                        self.function(func, Kind::FunctionDeclaration)?
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                        self.class(class, Kind::ClassDeclaration)?
                    }
                    other => match other.as_expression() {
                        Some(expr) => self.expression(expr)?,
                        None => return Err(self.unsupported("export default", decl.span)),
                    },
                };
                Node::new(Kind::ExportDefaultDeclaration).with("declaration", declaration)
            }
            Statement::ExportAllDeclaration(decl) => {
                let exported = decl
                    .exported
                    .as_ref()
                    .map(|name| self.module_export_name(name));
                let source = self.tree.string(decl.source.value.as_str());
                Node::new(Kind::ExportAllDeclaration)
                    .with("exported", exported)
                    .with("source", source)
            }
            other => return Err(self.unsupported("statement", other.span())),
        };
        Ok(self.add(node))
    }

    fn declaration(&mut self, decl: &Declaration<'_>) -> Result<NodeId> {
        match decl {
            Declaration::VariableDeclaration(decl) => self.variable_declaration(decl),
            Declaration::FunctionDeclaration(func) => {
                self.function(func, Kind::FunctionDeclaration)
            }
            Declaration::ClassDeclaration(class) => self.class(class, Kind::ClassDeclaration),
            other => Err(self.unsupported("declaration", other.span())),
        }
    }

    fn import(&mut self, decl: &ImportDeclaration<'_>) -> Result<NodeId> {
        let mut specifiers = Vec::new();
        if let Some(list) = &decl.specifiers {
            for spec in list {
                let node = match spec {
                    ImportDeclarationSpecifier::ImportSpecifier(s) => {
                        let imported = self.module_export_name(&s.imported);
                        let local = self.ident(s.local.name.as_str());
                        Node::new(Kind::ImportSpecifier)
                            .with("imported", imported)
                            .with("local", local)
                    }
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                        let local = self.ident(s.local.name.as_str());
                        Node::new(Kind::ImportDefaultSpecifier).with("local", local)
                    }
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                        let local = self.ident(s.local.name.as_str());
                        Node::new(Kind::ImportNamespaceSpecifier).with("local", local)
                    }
                };
                specifiers.push(self.add(node));
            }
        }
        let source = self.tree.string(decl.source.value.as_str());
        Ok(self.add(
            Node::new(Kind::ImportDeclaration)
                .with("specifiers", specifiers)
                .with("source", source),
        ))
    }

    fn module_export_name(&mut self, name: &ModuleExportName<'_>) -> NodeId {
        match name {
            ModuleExportName::IdentifierName(id) => self.ident(id.name.as_str()),
            ModuleExportName::IdentifierReference(id) => self.ident(id.name.as_str()),
            ModuleExportName::StringLiteral(s) => self.tree.string(s.value.as_str()),
        }
    }

    fn variable_declaration(&mut self, decl: &VariableDeclaration<'_>) -> Result<NodeId> {
        let kind = match decl.kind {
            VariableDeclarationKind::Var => "var",
            VariableDeclarationKind::Let => "let",
            VariableDeclarationKind::Const => "const",
            _ => return Err(self.unsupported("using declaration", decl.span)),
        };
        let mut declarations = Vec::with_capacity(decl.declarations.len());
        for declarator in &decl.declarations {
            let id = self.binding(&declarator.id)?;
            let init = self.opt_expression(declarator.init.as_ref())?;
            declarations.push(self.tree.declarator(id, init));
        }
        Ok(self.add(
            Node::new(Kind::VariableDeclaration)
                .with("kind", kind)
                .with("declarations", declarations),
        ))
    }

    fn for_left(&mut self, left: &ForStatementLeft<'_>) -> Result<NodeId> {
        match left {
            ForStatementLeft::VariableDeclaration(decl) => self.variable_declaration(decl),
            other => match other.as_assignment_target() {
                Some(target) => self.assignment_target(target),
                None => Err(self.unsupported("for-in/of target", other.span())),
            },
        }
    }

    fn binding(&mut self, pattern: &BindingPattern<'_>) -> Result<NodeId> {
        let node = match pattern {
            BindingPattern::BindingIdentifier(id) => return Ok(self.ident(id.name.as_str())),
            BindingPattern::ObjectPattern(p) => {
                let mut properties = Vec::with_capacity(p.properties.len());
                for prop in &p.properties {
                    let key = self.property_key(&prop.key)?;
                    let value = self.binding(&prop.value)?;
                    let property = self.tree.property(key, value, prop.computed);
                    self.tree.set(property, "shorthand", prop.shorthand);
                    properties.push(property);
                }
                if let Some(rest) = &p.rest {
                    let argument = self.binding(&rest.argument)?;
                    properties.push(self.add(Node::new(Kind::RestElement).with("argument", argument)));
                }
                Node::new(Kind::ObjectPattern).with("properties", properties)
            }
            BindingPattern::ArrayPattern(p) => {
                let mut elements = Vec::with_capacity(p.elements.len());
                for element in &p.elements {
                    elements.push(match element {
                        Some(element) => self.binding(element)?,
                        None => self.add(Node::new(Kind::Elision)),
                    });
                }
                if let Some(rest) = &p.rest {
                    let argument = self.binding(&rest.argument)?;
                    elements.push(self.add(Node::new(Kind::RestElement).with("argument", argument)));
                }
                Node::new(Kind::ArrayPattern).with("elements", elements)
            }
            BindingPattern::AssignmentPattern(p) => {
                let left = self.binding(&p.left)?;
                let right = self.expression(&p.right)?;
                Node::new(Kind::AssignmentPattern)
                    .with("left", left)
                    .with("right", right)
            }
        };
        Ok(self.add(node))
    }

    fn params(&mut self, params: &FormalParameters<'_>) -> Result<Vec<NodeId>> {
        let mut out = Vec::with_capacity(params.items.len() + 1);
        for param in &params.items {
            let mut node = self.binding(&param.pattern)?;
            // A default value may be held beside the pattern rather than in it.
            let pattern_end = param.pattern.span().end;
            if param.span.end > pattern_end {
                let tail = self.source[pattern_end as usize..param.span.end as usize].trim_start();
                if let Some(default) = tail.strip_prefix('=') {
                    let right = self.reparse_expression(default, param.span)?;
                    node = self.add(
                        Node::new(Kind::AssignmentPattern)
                            .with("left", node)
                            .with("right", right),
                    );
                }
            }
            out.push(node);
        }
        if let Some(rest) = &params.rest {
            out.push(self.rest_parameter(rest.span)?);
        }
        Ok(out)
    }

    fn reparse_expression(&mut self, text: &str, span: Span) -> Result<NodeId> {
        let wrapped = format!("({text})");
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, &wrapped, SourceType::mjs()).parse();
        let Some(Statement::ExpressionStatement(stmt)) = ret.program.body.first() else {
            return Err(self.unsupported("parameter default", span));
        };
        if !ret.errors.is_empty() {
            return Err(self.unsupported("parameter default", span));
        }
        let mut nested = Lower {
            tree: &mut *self.tree,
            source: &wrapped,
        };
        nested.expression(&stmt.expression)
    }

    fn rest_parameter(&mut self, span: Span) -> Result<NodeId> {
        let text = self.slice(span).trim_start_matches("...").to_string();
        let wrapped = format!("var [...{text}] = [];");
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, &wrapped, SourceType::mjs()).parse();
        let Some(Statement::VariableDeclaration(decl)) = ret.program.body.first() else {
            return Err(self.unsupported("rest parameter", span));
        };
        let Some(BindingPattern::ArrayPattern(pattern)) = decl.declarations.first().map(|d| &d.id)
        else {
            return Err(self.unsupported("rest parameter", span));
        };
        let Some(rest) = &pattern.rest else {
            return Err(self.unsupported("rest parameter", span));
        };
        let mut nested = Lower {
            tree: &mut *self.tree,
            source: &wrapped,
        };
        let argument = nested.binding(&rest.argument)?;
        Ok(self.add(Node::new(Kind::RestElement).with("argument", argument)))
    }

    fn function_body(&mut self, body: &FunctionBody<'_>) -> Result<NodeId> {
        let mut statements = self.directives(&body.directives);
        for stmt in &body.statements {
            statements.push(self.statement(stmt)?);
        }
        Ok(self.tree.block(statements))
    }

    fn function(&mut self, func: &Function<'_>, kind: Kind) -> Result<NodeId> {
        let id = func.id.as_ref().map(|id| self.ident(id.name.as_str()));
        let params = self.params(&func.params)?;
        let Some(body) = &func.body else {
            return Err(self.unsupported("function without body", func.span));
        };
        let body = self.function_body(body)?;
        Ok(self.add(
            Node::new(kind)
                .with("id", id)
                .with("params", params)
                .with("body", body)
                .with("generator", func.generator)
                .with("async", func.r#async),
        ))
    }

    fn arrow(&mut self, arrow: &ArrowFunctionExpression<'_>) -> Result<NodeId> {
        let params = self.params(&arrow.params)?;
        let body = if arrow.expression {
            match arrow.body.statements.first() {
                Some(Statement::ExpressionStatement(stmt)) => self.expression(&stmt.expression)?,
                _ => return Err(self.unsupported("arrow body", arrow.span)),
            }
        } else {
            self.function_body(&arrow.body)?
        };
        Ok(self.add(
            Node::new(Kind::ArrowFunctionExpression)
                .with("params", params)
                .with("body", body)
                .with("expression", arrow.expression)
                .with("async", arrow.r#async),
        ))
    }

    fn class(&mut self, class: &Class<'_>, kind: Kind) -> Result<NodeId> {
        let id = class.id.as_ref().map(|id| self.ident(id.name.as_str()));
        let super_class = self.opt_expression(class.super_class.as_ref())?;
        let mut members = Vec::with_capacity(class.body.body.len());
        for element in &class.body.body {
            let node = match element {
                ClassElement::StaticBlock(block) => {
                    let body = self.statements(&block.body)?;
                    Node::new(Kind::StaticBlock).with("body", body)
                }
                ClassElement::MethodDefinition(method) => {
                    let key = self.property_key(&method.key)?;
                    let value = self.function(&method.value, Kind::FunctionExpression)?;
                    let method_kind = match method.kind {
                        MethodDefinitionKind::Constructor => "constructor",
                        MethodDefinitionKind::Method => "method",
                        MethodDefinitionKind::Get => "get",
                        MethodDefinitionKind::Set => "set",
                    };
                    Node::new(Kind::MethodDefinition)
                        .with("key", key)
                        .with("value", value)
                        .with("kind", method_kind)
                        .with("computed", method.computed)
                        .with("static", method.r#static)
                }
                ClassElement::PropertyDefinition(prop) => {
                    let key = self.property_key(&prop.key)?;
                    let value = self.opt_expression(prop.value.as_ref())?;
                    Node::new(Kind::PropertyDefinition)
                        .with("key", key)
                        .with("value", value)
                        .with("computed", prop.computed)
                        .with("static", prop.r#static)
                }
                other => return Err(self.unsupported("class member", other.span())),
            };
            members.push(self.add(node));
        }
        let body = self.add(Node::new(Kind::ClassBody).with("body", members));
        Ok(self.add(
            Node::new(kind)
                .with("id", id)
                .with("superClass", super_class)
                .with("body", body),
        ))
    }

    fn property_key(&mut self, key: &PropertyKey<'_>) -> Result<NodeId> {
        match key {
            PropertyKey::StaticIdentifier(id) => Ok(self.ident(id.name.as_str())),
            PropertyKey::PrivateIdentifier(id) => Ok(self.add(
                Node::new(Kind::PrivateIdentifier).with("name", id.name.as_str()),
            )),
            other => match other.as_expression() {
                Some(expr) => self.expression(expr),
                None => Err(self.unsupported("property key", other.span())),
            },
        }
    }

    fn arguments(&mut self, arguments: &[Argument<'_>]) -> Result<Vec<NodeId>> {
        let mut out = Vec::with_capacity(arguments.len());
        for argument in arguments {
            out.push(match argument {
                Argument::SpreadElement(spread) => self.spread(&spread.argument)?,
                other => match other.as_expression() {
                    Some(expr) => self.expression(expr)?,
                    None => return Err(self.unsupported("argument", other.span())),
                },
            });
        }
        Ok(out)
    }

    fn spread(&mut self, argument: &Expression<'_>) -> Result<NodeId> {
        let argument = self.expression(argument)?;
        Ok(self.add(Node::new(Kind::SpreadElement).with("argument", argument)))
    }

    fn call(&mut self, call: &CallExpression<'_>) -> Result<NodeId> {
        let callee = self.expression(&call.callee)?;
        let arguments = self.arguments(&call.arguments)?;
        let node = self.tree.call(callee, arguments);
        self.tree.set(node, "optional", call.optional);
        Ok(node)
    }

    fn computed_member(&mut self, member: &ComputedMemberExpression<'_>) -> Result<NodeId> {
        let object = self.expression(&member.object)?;
        let property = self.expression(&member.expression)?;
        let node = self.tree.computed_member(object, property);
        self.tree.set(node, "optional", member.optional);
        Ok(node)
    }

    fn static_member(&mut self, member: &StaticMemberExpression<'_>) -> Result<NodeId> {
        let object = self.expression(&member.object)?;
        let node = self.tree.member(object, member.property.name.as_str());
        self.tree.set(node, "optional", member.optional);
        Ok(node)
    }

    fn private_member(&mut self, member: &PrivateFieldExpression<'_>) -> Result<NodeId> {
        let object = self.expression(&member.object)?;
        let property = self.add(
            Node::new(Kind::PrivateIdentifier).with("name", member.field.name.as_str()),
        );
        Ok(self.add(
            Node::new(Kind::MemberExpression)
                .with("object", object)
                .with("property", property)
                .with("computed", false)
                .with("optional", member.optional),
        ))
    }

    fn template(&mut self, template: &TemplateLiteral<'_>) -> Result<NodeId> {
        let mut quasis = Vec::with_capacity(template.quasis.len());
        for quasi in &template.quasis {
            let cooked = quasi
                .value
                .cooked
                .as_ref()
                .map_or(Value::Null, |c| Value::Str(c.as_str().to_string()));
            quasis.push(
                self.add(
                    Node::new(Kind::TemplateElement)
                        .with("raw", quasi.value.raw.as_str())
                        .with("cooked", cooked)
                        .with("tail", quasi.tail),
                ),
            );
        }
        let mut expressions = Vec::with_capacity(template.expressions.len());
        for expr in &template.expressions {
            expressions.push(self.expression(expr)?);
        }
        Ok(self.add(
            Node::new(Kind::TemplateLiteral)
                .with("quasis", quasis)
                .with("expressions", expressions),
        ))
    }

    fn assignment_target(&mut self, target: &AssignmentTarget<'_>) -> Result<NodeId> {
        if let Some(simple) = target.as_simple_assignment_target() {
            return self.simple_target(simple);
        }
        let node = match target {
            AssignmentTarget::ArrayAssignmentTarget(array) => {
                let mut elements = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    elements.push(match element {
                        Some(element) => self.target_maybe_default(element)?,
                        None => self.add(Node::new(Kind::Elision)),
                    });
                }
                if let Some(rest) = &array.rest {
                    let argument = self.assignment_target(&rest.target)?;
                    elements.push(self.add(Node::new(Kind::RestElement).with("argument", argument)));
                }
                Node::new(Kind::ArrayPattern).with("elements", elements)
            }
            AssignmentTarget::ObjectAssignmentTarget(object) => {
                let mut properties = Vec::with_capacity(object.properties.len());
                for prop in &object.properties {
                    let property = match prop {
                        AssignmentTargetProperty::AssignmentTargetPropertyIdentifier(p) => {
                            let name = p.binding.name.as_str();
                            let key = self.ident(name);
                            let mut value = self.ident(name);
                            if let Some(init) = &p.init {
                                let right = self.expression(init)?;
                                value = self.add(
                                    Node::new(Kind::AssignmentPattern)
                                        .with("left", value)
                                        .with("right", right),
                                );
                            }
                            let property = self.tree.property(key, value, false);
                            self.tree.set(property, "shorthand", true);
                            property
                        }
                        AssignmentTargetProperty::AssignmentTargetPropertyProperty(p) => {
                            let key = self.property_key(&p.name)?;
                            let value = self.target_maybe_default(&p.binding)?;
                            self.tree.property(key, value, p.computed)
                        }
                    };
                    properties.push(property);
                }
                if let Some(rest) = &object.rest {
                    let argument = self.assignment_target(&rest.target)?;
                    properties.push(self.add(Node::new(Kind::RestElement).with("argument", argument)));
                }
                Node::new(Kind::ObjectPattern).with("properties", properties)
            }
            other => return Err(self.unsupported("assignment target", other.span())),
        };
        Ok(self.add(node))
    }

    fn target_maybe_default(&mut self, target: &AssignmentTargetMaybeDefault<'_>) -> Result<NodeId> {
        match target {
            AssignmentTargetMaybeDefault::AssignmentTargetWithDefault(with_default) => {
                let left = self.assignment_target(&with_default.binding)?;
                let right = self.expression(&with_default.init)?;
                Ok(self.add(
                    Node::new(Kind::AssignmentPattern)
                        .with("left", left)
                        .with("right", right),
                ))
            }
            other => match other.as_assignment_target() {
                Some(inner) => self.assignment_target(inner),
                None => Err(self.unsupported("assignment target", other.span())),
            },
        }
    }

    fn simple_target(&mut self, target: &SimpleAssignmentTarget<'_>) -> Result<NodeId> {
        match target {
            SimpleAssignmentTarget::AssignmentTargetIdentifier(id) => Ok(self.ident(id.name.as_str())),
            SimpleAssignmentTarget::ComputedMemberExpression(member) => self.computed_member(member),
            SimpleAssignmentTarget::StaticMemberExpression(member) => self.static_member(member),
            SimpleAssignmentTarget::PrivateFieldExpression(member) => self.private_member(member),
            other => Err(self.unsupported("assignment target", other.span())),
        }
    }

    fn expression(&mut self, expr: &Expression<'_>) -> Result<NodeId> {
        let node = match expr {
            Expression::BooleanLiteral(lit) => return Ok(self.tree.boolean(lit.value)),
            Expression::NullLiteral(_) => return Ok(self.tree.null()),
            Expression::NumericLiteral(lit) => return Ok(self.tree.number(lit.value)),
            Expression::StringLiteral(lit) => return Ok(self.tree.string(lit.value.as_str())),
            Expression::BigIntLiteral(lit) => {
                Node::new(Kind::BigIntLiteral).with("raw", self.slice(lit.span))
            }
            Expression::RegExpLiteral(lit) => {
                Node::new(Kind::RegExpLiteral).with("raw", self.slice(lit.span))
            }
            Expression::TemplateLiteral(template) => return self.template(template),
            Expression::Identifier(id) => return Ok(self.ident(id.name.as_str())),
            Expression::MetaProperty(meta) => {
                let object = self.ident(meta.meta.name.as_str());
                let property = self.ident(meta.property.name.as_str());
                Node::new(Kind::MetaProperty)
                    .with("meta", object)
                    .with("property", property)
            }
            Expression::Super(_) => Node::new(Kind::Super),
            Expression::ThisExpression(_) => Node::new(Kind::ThisExpression),
            Expression::ArrayExpression(array) => {
                let mut elements = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    elements.push(match element {
                        ArrayExpressionElement::SpreadElement(spread) => {
                            self.spread(&spread.argument)?
                        }
                        ArrayExpressionElement::Elision(_) => self.add(Node::new(Kind::Elision)),
                        other => match other.as_expression() {
                            Some(expr) => self.expression(expr)?,
                            None => return Err(self.unsupported("array element", other.span())),
                        },
                    });
                }
                return Ok(self.tree.array(elements));
            }
            Expression::ObjectExpression(object) => {
                let mut properties = Vec::with_capacity(object.properties.len());
                for prop in &object.properties {
                    properties.push(match prop {
                        ObjectPropertyKind::ObjectProperty(p) => {
                            let key = self.property_key(&p.key)?;
                            let value = self.expression(&p.value)?;
                            let kind = match p.kind {
                                PropertyKind::Init => "init",
                                PropertyKind::Get => "get",
                                PropertyKind::Set => "set",
                            };
                            let property = self.tree.property(key, value, p.computed);
                            self.tree.set(property, "kind", kind);
                            self.tree.set(property, "method", p.method);
                            self.tree.set(property, "shorthand", p.shorthand);
                            property
                        }
                        ObjectPropertyKind::SpreadProperty(spread) => self.spread(&spread.argument)?,
                    });
                }
                return Ok(self.tree.object(properties));
            }
            Expression::ArrowFunctionExpression(arrow) => return self.arrow(arrow),
            Expression::FunctionExpression(func) => {
                return self.function(func, Kind::FunctionExpression);
            }
            Expression::ClassExpression(class) => return self.class(class, Kind::ClassExpression),
            Expression::AssignmentExpression(assign) => {
                let left = self.assignment_target(&assign.left)?;
                let right = self.expression(&assign.right)?;
                return Ok(self.tree.assign(assign.operator.as_str(), left, right));
            }
            Expression::AwaitExpression(await_expr) => {
                let argument = self.expression(&await_expr.argument)?;
                Node::new(Kind::AwaitExpression).with("argument", argument)
            }
            Expression::BinaryExpression(binary) => {
                let left = self.expression(&binary.left)?;
                let right = self.expression(&binary.right)?;
                return Ok(self.tree.binary(binary.operator.as_str(), left, right));
            }
            Expression::LogicalExpression(logical) => {
                let left = self.expression(&logical.left)?;
                let right = self.expression(&logical.right)?;
                return Ok(self.tree.logical(logical.operator.as_str(), left, right));
            }
            Expression::PrivateInExpression(private_in) => {
                let left = self.add(
                    Node::new(Kind::PrivateIdentifier).with("name", private_in.left.name.as_str()),
                );
                let right = self.expression(&private_in.right)?;
                return Ok(self.tree.binary("in", left, right));
            }
            Expression::CallExpression(call) => return self.call(call),
            Expression::ChainExpression(chain) => {
                let inner = match &chain.expression {
                    ChainElement::CallExpression(call) => self.call(call)?,
                    ChainElement::ComputedMemberExpression(member) => self.computed_member(member)?,
                    ChainElement::StaticMemberExpression(member) => self.static_member(member)?,
                    ChainElement::PrivateFieldExpression(member) => self.private_member(member)?,
                    other => return Err(self.unsupported("optional chain", other.span())),
                };
                Node::new(Kind::ChainExpression).with("expression", inner)
            }
            Expression::ConditionalExpression(cond) => {
                let test = self.expression(&cond.test)?;
                let consequent = self.expression(&cond.consequent)?;
                let alternate = self.expression(&cond.alternate)?;
                return Ok(self.tree.conditional(test, consequent, alternate));
            }
            Expression::ImportExpression(import) => {
                let source = self.expression(&import.source)?;
                Node::new(Kind::ImportExpression).with("source", source)
            }
            Expression::NewExpression(new_expr) => {
                let callee = self.expression(&new_expr.callee)?;
                let arguments = self.arguments(&new_expr.arguments)?;
                Node::new(Kind::NewExpression)
                    .with("callee", callee)
                    .with("arguments", arguments)
            }
            Expression::ParenthesizedExpression(paren) => return self.expression(&paren.expression),
            Expression::SequenceExpression(seq) => {
                let mut expressions = Vec::with_capacity(seq.expressions.len());
                for expr in &seq.expressions {
                    expressions.push(self.expression(expr)?);
                }
                return Ok(self.tree.sequence(expressions));
            }
            Expression::TaggedTemplateExpression(tagged) => {
                let tag = self.expression(&tagged.tag)?;
                let quasi = self.template(&tagged.quasi)?;
                Node::new(Kind::TaggedTemplateExpression)
                    .with("tag", tag)
                    .with("quasi", quasi)
            }
            Expression::UnaryExpression(unary) => {
                let argument = self.expression(&unary.argument)?;
                return Ok(self.tree.unary(unary.operator.as_str(), argument));
            }
            Expression::UpdateExpression(update) => {
                let argument = self.simple_target(&update.argument)?;
                Node::new(Kind::UpdateExpression)
                    .with("operator", update.operator.as_str())
                    .with("prefix", update.prefix)
                    .with("argument", argument)
            }
            Expression::YieldExpression(yield_expr) => {
                let argument = self.opt_expression(yield_expr.argument.as_ref())?;
                Node::new(Kind::YieldExpression)
                    .with("delegate", yield_expr.delegate)
                    .with("argument", argument)
            }
            Expression::ComputedMemberExpression(member) => return self.computed_member(member),
            Expression::StaticMemberExpression(member) => return self.static_member(member),
            Expression::PrivateFieldExpression(member) => return self.private_member(member),
            other => return Err(self.unsupported("expression", other.span())),
        };
        Ok(self.add(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_statement(tree: &Tree) -> NodeId {
        tree.list(tree.root(), "body")[0]
    }

    #[test]
    fn test_lowers_function_declaration() {
        let tree = parse("function f(a, b = 2, ...rest) { return a; }", false).unwrap();
        let func = first_statement(&tree);
        assert_eq!(tree.kind(func), Kind::FunctionDeclaration);
        let params = tree.list(func, "params");
        assert_eq!(params.len(), 3);
        assert_eq!(tree.kind(params[0]), Kind::Identifier);
        assert_eq!(tree.kind(params[1]), Kind::AssignmentPattern);
        assert_eq!(tree.kind(params[2]), Kind::RestElement);
        let body = tree.child(func, "body").unwrap();
        assert_eq!(tree.kind(tree.list(body, "body")[0]), Kind::ReturnStatement);
    }

    #[test]
    fn test_directives_and_parentheses() {
        let tree = parse("'use strict'; (a + b) * c;", false).unwrap();
        let body = tree.list(tree.root(), "body");
        assert_eq!(tree.str(body[0], "directive"), Some("use strict"));
        let expr = tree.child(body[1], "expression").unwrap();
        assert_eq!(tree.str(expr, "operator"), Some("*"));
        let left = tree.child(expr, "left").unwrap();
        assert_eq!(tree.kind(left), Kind::BinaryExpression);
    }

    #[test]
    fn test_member_and_literals() {
        let tree = parse("o.p[1] = /x+/g; const big = 10n;", false).unwrap();
        let body = tree.list(tree.root(), "body");
        let assign = tree.child(body[0], "expression").unwrap();
        let left = tree.child(assign, "left").unwrap();
        assert!(tree.flag(left, "computed"));
        let right = tree.child(assign, "right").unwrap();
        assert_eq!(tree.str(right, "raw"), Some("/x+/g"));
        let declarator = tree.list(body[1], "declarations")[0];
        let init = tree.child(declarator, "init").unwrap();
        assert_eq!(tree.str(init, "raw"), Some("10n"));
    }

    #[test]
    fn test_module_syntax() {
        let tree = parse(
            "import def, { a as b } from 'm'; export { b as c }; export default 1;",
            true,
        )
        .unwrap();
        assert!(tree.is_module());
        let body = tree.list(tree.root(), "body");
        assert_eq!(tree.kind(body[0]), Kind::ImportDeclaration);
        assert_eq!(tree.list(body[0], "specifiers").len(), 2);
        assert_eq!(tree.kind(body[1]), Kind::ExportNamedDeclaration);
        assert_eq!(tree.kind(body[2]), Kind::ExportDefaultDeclaration);
    }

    #[test]
    fn test_parse_error() {
        let err = parse("function (", false).unwrap_err();
        assert!(matches!(err, ObfuscateError::ParseFailed(_)));
    }
}
