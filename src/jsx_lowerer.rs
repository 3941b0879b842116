//! JSX lowering: turns a component's returned JSX into `IRNode`s.

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_span::{GetSpan, Span};
use oxc_syntax::operator::LogicalOperator;
use tracing::trace;

use crate::analyzer::{AnalysisContext, JsxSource, ReturnShape};
use crate::diagnostic::{
    Diagnostic, BF_AMBIGUOUS_HANDLER, BF_UNKEYED_LOOP, BF_UNSUPPORTED_RETURN,
};
use crate::ir::{
    AttrValue, ComponentIR, IRAttribute, IRComponent, IRConditional, IRElement, IREvent,
    IRExpression, IRFragment, IRIfStatement, IRLoop, IRMetadata, IRNode, IRProp, IRProvider,
    IRSlot, IRText, PropValue, IR_VERSION,
};
use crate::parse::{
    contains_jsx, is_jsx, is_null, parse_expression, span_text, split_type_annotation,
    unwrap_parens, SourceLocation,
};
use crate::transform::{decompose_handler, event_name, HandlerShape, ReactiveScope};

/// Attributes that need property sync in addition to the attribute.
const DOM_PROPERTIES: [&str; 6] = ["class", "style", "disabled", "value", "checked", "hidden"];

pub fn is_dom_property(name: &str) -> bool {
    DOM_PROPERTIES.contains(&name)
}

fn normalize_attr_name(name: &str) -> String {
    match name {
        "className" => "class".to_string(),
        "htmlFor" => "for".to_string(),
        _ => name.to_string(),
    }
}

/// JSX whitespace rules: lines are trimmed, blank lines dropped, and the
/// remaining lines joined with a single space.
pub fn normalize_jsx_text(raw: &str) -> Option<String> {
    if !raw.contains('\n') {
        return if raw.is_empty() { None } else { Some(raw.to_string()) };
    }
    let lines: Vec<&str> = raw.split('\n').collect();
    let last = lines.len() - 1;
    let parts: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let mut line = line.trim_end_matches('\r');
            if i != 0 {
                line = line.trim_start();
            }
            if i != last {
                line = line.trim_end();
            }
            line
        })
        .filter(|line| !line.trim().is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MARKERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct MarkerCounters {
    element: u32,
    text: u32,
    region: u32,
    list: u32,
    instance: u32,
}

impl MarkerCounters {
    fn element(&mut self) -> String {
        self.element += 1;
        format!("s{}", self.element - 1)
    }

    fn text(&mut self) -> String {
        self.text += 1;
        format!("t{}", self.text - 1)
    }

    fn region(&mut self) -> String {
        self.region += 1;
        format!("c{}", self.region - 1)
    }

    fn list(&mut self) -> String {
        self.list += 1;
        format!("l{}", self.list - 1)
    }

    fn instance(&mut self) -> String {
        self.instance += 1;
        format!("p{}", self.instance - 1)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSX LOWERER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct JsxLowerer<'c> {
    ctx: &'c AnalysisContext,
    scope: ReactiveScope,
    source: &'c str,
    base: SourceLocation,
    markers: MarkerCounters,
    loop_depth: u32,
    awaiting_key: bool,
    captured_key: Option<String>,
    inlining: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

/// Result of lowering one component.
#[derive(Debug)]
pub struct IrBuild {
    pub ir: Option<ComponentIR>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lower the component's JSX return to its root node. `None` when the
/// return shape is unsupported.
pub fn jsx_to_ir(ctx: &AnalysisContext) -> (Option<IRNode>, Vec<Diagnostic>) {
    let mut lowerer = JsxLowerer::new(ctx);
    let root = match &ctx.jsx_return {
        Some(ReturnShape::Jsx(jsx)) => lowerer.lower_source(jsx),
        Some(ReturnShape::Branches { branches, fallback }) => {
            lowerer.lower_branches(branches, 0, fallback)
        }
        None => None,
    };
    if root.is_none() && !lowerer.diagnostics.iter().any(Diagnostic::is_error) {
        lowerer.error(
            BF_UNSUPPORTED_RETURN,
            format!("Component '{}' has no supported JSX return", ctx.name),
            SourceLocation {
                line: ctx.line,
                column: 1,
            },
        );
    }
    (root, lowerer.diagnostics)
}

pub fn build_component_ir(ctx: &AnalysisContext) -> IrBuild {
    if ctx.has_errors() {
        return IrBuild {
            ir: None,
            diagnostics: vec![],
        };
    }
    let (root, diagnostics) = jsx_to_ir(ctx);
    let ir = root.map(|root| ComponentIR {
        version: IR_VERSION.to_string(),
        name: ctx.name.clone(),
        is_default_export: ctx.is_default_export,
        props_type: ctx.props_type.clone(),
        root,
        metadata: IRMetadata::from(ctx),
    });
    trace!(component = %ctx.name, built = ir.is_some(), "lowered JSX");
    IrBuild { ir, diagnostics }
}

impl<'c> JsxLowerer<'c> {
    pub fn new(ctx: &'c AnalysisContext) -> Self {
        JsxLowerer {
            ctx,
            scope: ctx.reactive_scope(),
            source: "",
            base: SourceLocation::default(),
            markers: MarkerCounters::default(),
            loop_depth: 0,
            awaiting_key: false,
            captured_key: None,
            inlining: vec![],
            diagnostics: vec![],
        }
    }

    fn error(&mut self, code: &str, message: String, loc: SourceLocation) {
        self.diagnostics.push(
            Diagnostic::error(code, message, &self.ctx.file_path, loc.line, loc.column)
                .in_component(&self.ctx.name),
        );
    }

    fn warn(&mut self, code: &str, message: String, loc: SourceLocation) {
        self.diagnostics.push(
            Diagnostic::warning(code, message, &self.ctx.file_path, loc.line, loc.column)
                .in_component(&self.ctx.name),
        );
    }

    fn text(&self, span: Span) -> &'c str {
        span_text(self.source, span)
    }

    fn loc(&self, span: Span) -> SourceLocation {
        let before = self.source.get(..span.start as usize).unwrap_or("");
        match before.rfind('\n') {
            Some(nl) => SourceLocation {
                line: self.base.line + before.matches('\n').count() as u32,
                column: (before.len() - nl) as u32,
            },
            None => SourceLocation {
                line: self.base.line,
                column: self.base.column + before.len() as u32,
            },
        }
    }

    fn lower_source(&mut self, jsx: &'c JsxSource) -> Option<IRNode> {
        self.source = &jsx.text;
        self.base = SourceLocation {
            line: jsx.line,
            column: jsx.column,
        };
        let allocator = Allocator::default();
        let expr = parse_expression(&allocator, &jsx.text)?;
        self.lower_root(&expr)
    }

    /// Markup of a `const name = <jsx/>` in scope, lowered in place. Locals
    /// shadow module constants.
    fn inline_jsx_constant(&mut self, name: &str) -> Option<IRNode> {
        if self.inlining.iter().any(|n| n == name) {
            return None;
        }
        let ctx = self.ctx;
        let jsx = ctx
            .local_declarations
            .iter()
            .chain(&ctx.module_declarations)
            .find(|d| d.names.len() == 1 && d.names[0] == name)?
            .jsx
            .as_ref()?;
        let (source, base) = (self.source, self.base);
        self.inlining.push(name.to_string());
        let node = self.lower_source(jsx);
        self.inlining.pop();
        self.source = source;
        self.base = base;
        node
    }

    fn is_markup(&self, expr: &Expression<'_>) -> bool {
        if contains_jsx(expr) {
            return true;
        }
        let Expression::Identifier(id) = unwrap_parens(expr) else {
            return false;
        };
        self.ctx
            .local_declarations
            .iter()
            .chain(&self.ctx.module_declarations)
            .find(|d| d.names.len() == 1 && d.names[0] == id.name.as_str())
            .is_some_and(|d| d.jsx.is_some())
    }

    fn lower_branches(
        &mut self,
        branches: &'c [crate::analyzer::EarlyReturn],
        i: usize,
        fallback: &'c JsxSource,
    ) -> Option<IRNode> {
        let Some(branch) = branches.get(i) else {
            return self.lower_source(fallback);
        };
        let marker = self.markers.region();
        let consequent = self.lower_source(&branch.jsx)?;
        let alternate = self.lower_branches(branches, i + 1, fallback);
        Some(IRNode::IfStatement(IRIfStatement {
            condition: branch.condition.clone(),
            reactive: self.scope.is_reactive(&branch.condition),
            consequent: Box::new(consequent),
            alternate: alternate.filter(|n| !n.is_blank()).map(Box::new),
            marker,
        }))
    }

    fn lower_root(&mut self, expr: &Expression<'_>) -> Option<IRNode> {
        let expr = unwrap_parens(expr);
        match expr {
            Expression::JSXElement(el) => Some(self.lower_element(el)),
            Expression::JSXFragment(frag) => Some(IRNode::Fragment(IRFragment {
                children: self.lower_children(&frag.children),
            })),
            _ if is_null(expr) => Some(IRNode::empty()),
            Expression::ConditionalExpression(_) | Expression::LogicalExpression(_)
                if contains_jsx(expr) =>
            {
                Some(self.lower_child_expression(expr))
            }
            _ => None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ELEMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn lower_element(&mut self, element: &JSXElement<'_>) -> IRNode {
        let opening = &element.opening_element;
        match &opening.name {
            JSXElementName::MemberExpression(member) if member.property.name.as_str() == "Provider" => {
                return self.lower_provider(element, member);
            }
            JSXElementName::MemberExpression(_) | JSXElementName::IdentifierReference(_) => {
                let name = self.text(opening.name.span()).to_string();
                return self.lower_component(element, name);
            }
            _ => {}
        }

        let tag = self.text(opening.name.span()).to_string();
        let loc = self.loc(element.span);
        let mut attrs = Vec::new();
        let mut events = Vec::new();
        let mut ref_callback = None;

        for item in &opening.attributes {
            match item {
                JSXAttributeItem::Attribute(attr) => {
                    let raw_name = self.text(attr.name.span()).to_string();
                    if raw_name == "key" {
                        self.capture_key(attr.value.as_ref());
                        continue;
                    }
                    let expr = attribute_expression(attr.value.as_ref());
                    if raw_name == "ref" {
                        if let Some(expr) = expr {
                            ref_callback = Some(self.text(expr.span()).to_string());
                        }
                        continue;
                    }
                    if let (Some(event), Some(expr)) = (event_name(&raw_name), expr) {
                        let handler = self.text(expr.span()).to_string();
                        let shape = decompose_handler(&handler);
                        if shape == HandlerShape::Ambiguous {
                            self.warn(
                                BF_AMBIGUOUS_HANDLER,
                                format!(
                                    "Handler `{}` uses `&&` with an unsupported condition; it is emitted unchanged",
                                    handler
                                ),
                                self.loc(attr.span),
                            );
                        }
                        events.push(IREvent {
                            name: event,
                            handler,
                            shape,
                        });
                        continue;
                    }
                    if let Some(attr) = self.lower_attribute(&raw_name, attr.value.as_ref()) {
                        attrs.push(attr);
                    }
                }
                JSXAttributeItem::SpreadAttribute(spread) => {
                    let expr = self.text(spread.argument.span()).to_string();
                    attrs.push(IRAttribute {
                        name: "...".to_string(),
                        value: AttrValue::Spread {
                            reactive: self.scope.is_reactive(&expr),
                            expr,
                        },
                        dom_property: false,
                    });
                }
            }
        }

        let needs_marker = attrs.iter().any(|a| a.value.is_reactive())
            || !events.is_empty()
            || ref_callback.is_some();
        let marker = needs_marker.then(|| self.markers.element());
        let children = self.lower_children(&element.children);

        IRNode::Element(IRElement {
            tag,
            attrs,
            events,
            ref_callback,
            children,
            marker,
            loc,
        })
    }

    fn capture_key(&mut self, value: Option<&JSXAttributeValue<'_>>) {
        if !self.awaiting_key {
            return;
        }
        self.awaiting_key = false;
        self.captured_key = match value {
            Some(JSXAttributeValue::StringLiteral(s)) => Some(format!("{:?}", s.value.as_str())),
            Some(JSXAttributeValue::ExpressionContainer(c)) => c
                .expression
                .as_expression()
                .map(|e| self.text(e.span()).to_string()),
            _ => None,
        };
    }

    fn lower_attribute(
        &mut self,
        raw_name: &str,
        value: Option<&JSXAttributeValue<'_>>,
    ) -> Option<IRAttribute> {
        let name = normalize_attr_name(raw_name);
        let dom_property = is_dom_property(&name);
        let value = match value {
            None => AttrValue::Boolean,
            Some(JSXAttributeValue::StringLiteral(s)) => AttrValue::Static {
                value: s.value.to_string(),
            },
            Some(JSXAttributeValue::ExpressionContainer(c)) => {
                let expr = c.expression.as_expression()?;
                match unwrap_parens(expr) {
                    Expression::StringLiteral(s) => AttrValue::Static {
                        value: s.value.to_string(),
                    },
                    Expression::NumericLiteral(_) => AttrValue::Static {
                        value: self.text(expr.span()).to_string(),
                    },
                    Expression::BooleanLiteral(b) if b.value => AttrValue::Boolean,
                    Expression::BooleanLiteral(_) => return None,
                    Expression::TemplateLiteral(t) if t.expressions.is_empty() => {
                        AttrValue::Static {
                            value: t
                                .quasis
                                .iter()
                                .map(|q| q.value.raw.as_str())
                                .collect::<String>(),
                        }
                    }
                    e if is_null(e) => return None,
                    _ => {
                        let text = self.text(expr.span()).to_string();
                        AttrValue::Dynamic {
                            reactive: self.scope.is_reactive(&text),
                            expr: text,
                        }
                    }
                }
            }
            Some(other) => {
                let text = self.text(other.span()).to_string();
                AttrValue::Dynamic {
                    reactive: self.scope.is_reactive(&text),
                    expr: text,
                }
            }
        };
        Some(IRAttribute {
            name,
            value,
            dom_property,
        })
    }

    fn lower_provider(&mut self, element: &JSXElement<'_>, member: &JSXMemberExpression<'_>) -> IRNode {
        let value = element
            .opening_element
            .attributes
            .iter()
            .find_map(|item| match item {
                JSXAttributeItem::Attribute(attr) if self.text(attr.name.span()) == "value" => {
                    attribute_expression(attr.value.as_ref()).map(|e| self.text(e.span()).to_string())
                }
                _ => None,
            })
            .unwrap_or_else(|| "undefined".to_string());
        IRNode::Provider(IRProvider {
            context: self.text(member.object.span()).to_string(),
            value,
            children: self.lower_children(&element.children),
        })
    }

    fn lower_component(&mut self, element: &JSXElement<'_>, name: String) -> IRNode {
        let loc = self.loc(element.span);
        let mut props = Vec::new();
        let mut key = None;
        for item in &element.opening_element.attributes {
            match item {
                JSXAttributeItem::Attribute(attr) => {
                    let prop_name = self.text(attr.name.span()).to_string();
                    if prop_name == "key" {
                        let awaiting = self.awaiting_key;
                        self.capture_key(attr.value.as_ref());
                        if awaiting {
                            key = self.captured_key.clone();
                        }
                        continue;
                    }
                    let value = match &attr.value {
                        None => PropValue::Boolean,
                        Some(JSXAttributeValue::StringLiteral(s)) => PropValue::Static {
                            value: s.value.to_string(),
                        },
                        Some(JSXAttributeValue::ExpressionContainer(c)) => {
                            match c.expression.as_expression() {
                                Some(expr) => {
                                    let text = self.text(expr.span()).to_string();
                                    PropValue::Expression {
                                        reactive: self.scope.is_reactive(&text),
                                        expr: text,
                                    }
                                }
                                None => continue,
                            }
                        }
                        Some(other) => {
                            let text = self.text(other.span()).to_string();
                            PropValue::Expression {
                                reactive: self.scope.is_reactive(&text),
                                expr: text,
                            }
                        }
                    };
                    props.push(IRProp {
                        name: prop_name,
                        value,
                    });
                }
                JSXAttributeItem::SpreadAttribute(spread) => props.push(IRProp {
                    name: "...".to_string(),
                    value: PropValue::Spread {
                        expr: self.text(spread.argument.span()).to_string(),
                    },
                }),
            }
        }
        // a key only belongs to the loop root
        self.awaiting_key = false;
        let marker = self.markers.instance();
        let children: Vec<IRNode> = self
            .lower_children(&element.children)
            .into_iter()
            .filter(|c| !c.is_blank())
            .collect();
        let lazy_children = children.iter().any(IRNode::has_reactive_content);
        IRNode::Component(IRComponent {
            name,
            props,
            children,
            lazy_children,
            key,
            marker,
            loc,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CHILDREN
    // ═══════════════════════════════════════════════════════════════════════════

    fn lower_children(&mut self, children: &[JSXChild<'_>]) -> Vec<IRNode> {
        // keys never reach past the element that owns them
        self.awaiting_key = false;
        let mut nodes = Vec::new();
        for child in children {
            match child {
                JSXChild::Text(t) => {
                    if let Some(value) = normalize_jsx_text(&t.value) {
                        nodes.push(IRNode::Text(IRText { value }));
                    }
                }
                JSXChild::Element(el) => nodes.push(self.lower_element(el)),
                JSXChild::Fragment(frag) => {
                    let children = self.lower_children(&frag.children);
                    if !children.is_empty() {
                        nodes.push(IRNode::Fragment(IRFragment { children }));
                    }
                }
                JSXChild::ExpressionContainer(container) => {
                    if let Some(expr) = container.expression.as_expression() {
                        nodes.push(self.lower_child_expression(expr));
                    }
                }
                JSXChild::Spread(spread) => {
                    let expr = self.text(spread.expression.span()).to_string();
                    nodes.push(self.expression_node(expr, spread.span));
                }
            }
        }
        nodes
    }

    fn expression_node(&mut self, expr: String, span: Span) -> IRNode {
        let reactive = self.scope.is_reactive(&expr);
        IRNode::Expression(IRExpression {
            marker: reactive.then(|| self.markers.text()),
            reactive,
            expr,
            loc: self.loc(span),
        })
    }

    fn lower_child_expression(&mut self, expr: &Expression<'_>) -> IRNode {
        let inner = unwrap_parens(expr);
        match inner {
            Expression::JSXElement(el) => return self.lower_element(el),
            Expression::JSXFragment(frag) => {
                return IRNode::Fragment(IRFragment {
                    children: self.lower_children(&frag.children),
                })
            }
            Expression::ConditionalExpression(cond)
                if self.is_markup(&cond.consequent) || self.is_markup(&cond.alternate) =>
            {
                let condition = self.text(cond.test.span()).to_string();
                let marker = self.markers.region();
                let when_true = self.lower_branch(&cond.consequent);
                let when_false = self.lower_branch(&cond.alternate);
                return IRNode::Conditional(IRConditional {
                    reactive: self.scope.is_reactive(&condition),
                    condition,
                    when_true: Box::new(when_true),
                    when_false: (!when_false.is_blank()).then(|| Box::new(when_false)),
                    marker,
                    loc: self.loc(cond.span),
                });
            }
            Expression::LogicalExpression(logical)
                if logical.operator == LogicalOperator::And && self.is_markup(&logical.right) =>
            {
                let condition = self.text(logical.left.span()).to_string();
                let marker = self.markers.region();
                let when_true = self.lower_branch(&logical.right);
                return IRNode::Conditional(IRConditional {
                    reactive: self.scope.is_reactive(&condition),
                    condition,
                    when_true: Box::new(when_true),
                    when_false: None,
                    marker,
                    loc: self.loc(logical.span),
                });
            }
            Expression::CallExpression(call) => {
                if let Some(node) = self.try_lower_loop(call) {
                    return node;
                }
            }
            Expression::Identifier(id) => {
                if let Some(node) = self.inline_jsx_constant(id.name.as_str()) {
                    return node;
                }
            }
            _ => {}
        }
        if let Some(slot_expr) = self.slot_expression(inner) {
            return IRNode::Slot(IRSlot {
                name: "children".to_string(),
                expr: slot_expr,
                marker: self.markers.text(),
            });
        }
        let text = self.text(expr.span()).to_string();
        self.expression_node(text, expr.span())
    }

    fn lower_branch(&mut self, expr: &Expression<'_>) -> IRNode {
        if is_null(expr) {
            return IRNode::empty();
        }
        if is_jsx(expr) || contains_jsx(expr) {
            return self.lower_child_expression(expr);
        }
        match unwrap_parens(expr) {
            Expression::StringLiteral(s) => IRNode::Text(IRText {
                value: s.value.to_string(),
            }),
            Expression::Identifier(id) => match self.inline_jsx_constant(id.name.as_str()) {
                Some(node) => node,
                None => {
                    let text = self.text(expr.span()).to_string();
                    self.expression_node(text, expr.span())
                }
            },
            _ => {
                let text = self.text(expr.span()).to_string();
                self.expression_node(text, expr.span())
            }
        }
    }

    /// `{children}` or `{props.children}` passthrough.
    fn slot_expression(&self, expr: &Expression<'_>) -> Option<String> {
        let is_children_binding = match expr {
            Expression::Identifier(id) => {
                id.name.as_str() == "children"
                    && self.ctx.props.local_names().iter().any(|n| n == "children")
            }
            Expression::StaticMemberExpression(member) => {
                member.property.name.as_str() == "children"
                    && matches!(&member.object, Expression::Identifier(obj)
                        if Some(obj.name.as_str()) == self.ctx.props.object_name()
                            || Some(obj.name.as_str()) == self.ctx.props.rest_name())
            }
            _ => false,
        };
        is_children_binding.then(|| self.text(expr.span()).to_string())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LOOPS
    // ═══════════════════════════════════════════════════════════════════════════

    fn try_lower_loop(&mut self, call: &CallExpression<'_>) -> Option<IRNode> {
        let Expression::StaticMemberExpression(member) = &call.callee else {
            return None;
        };
        if member.property.name.as_str() != "map" {
            return None;
        }
        let callback = call.arguments.first()?.as_expression()?;
        let (params, body, prelude) = match unwrap_parens(callback) {
            Expression::ArrowFunctionExpression(arrow) => {
                let (body, prelude) = self.callback_result(&arrow.body.statements)?;
                (&arrow.params, body, prelude)
            }
            Expression::FunctionExpression(func) => {
                let (body, prelude) = self.callback_result(&func.body.as_ref()?.statements)?;
                (&func.params, body, prelude)
            }
            _ => return None,
        };
        if !contains_jsx(body) {
            return None;
        }

        let source = self.text(member.object.span()).to_string();
        let item = match params.items.first() {
            Some(p) => split_type_annotation(self.text(p.span)).0.to_string(),
            None => "_".to_string(),
        };
        let index = params.items.get(1).map(|p| {
            split_type_annotation(self.text(p.span)).0.to_string()
        });

        let marker = self.markers.list();
        let depth = self.loop_depth;
        self.loop_depth += 1;
        let outer_key = self.captured_key.take();
        self.awaiting_key = true;
        let template = self.lower_branch(body);
        self.awaiting_key = false;
        let key = std::mem::replace(&mut self.captured_key, outer_key);
        self.loop_depth -= 1;

        let reactive = self.scope.is_reactive(&source) || template.has_reactive_content();
        let loc = self.loc(call.span);
        if reactive && key.is_none() {
            self.warn(
                BF_UNKEYED_LOOP,
                format!(
                    "List over `{}` has no key; items are reconciled by position and reordering does not preserve DOM nodes",
                    source
                ),
                loc,
            );
        }

        Some(IRNode::Loop(IRLoop {
            source,
            item,
            index,
            key,
            template: Box::new(template),
            reactive,
            depth,
            marker,
            prelude,
            loc,
        }))
    }

    /// The expression a `.map` callback returns plus any statements before it.
    fn callback_result<'b, 'a>(
        &self,
        statements: &'b [Statement<'a>],
    ) -> Option<(&'b Expression<'a>, Option<String>)> {
        let (last, before) = statements.split_last()?;
        let result = match last {
            Statement::ExpressionStatement(e) if statements.len() == 1 => &e.expression,
            Statement::ReturnStatement(ret) => ret.argument.as_ref()?,
            _ => return None,
        };
        let prelude = match (before.first(), before.last()) {
            (Some(first), Some(end)) => Some(
                span_text(
                    self.source,
                    Span::new(first.span().start, end.span().end),
                )
                .to_string(),
            ),
            _ => None,
        };
        Some((result, prelude))
    }
}

fn attribute_expression<'b, 'a>(value: Option<&'b JSXAttributeValue<'a>>) -> Option<&'b Expression<'a>> {
    match value {
        Some(JSXAttributeValue::ExpressionContainer(c)) => c.expression.as_expression(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze_component;

    fn lower(src: &str) -> (IRNode, Vec<Diagnostic>) {
        let ctx = analyze_component(src, "Test.tsx", None);
        assert!(!ctx.has_errors(), "{:?}", ctx.diagnostics);
        let (root, diags) = jsx_to_ir(&ctx);
        (root.expect("lowered root"), diags)
    }

    fn element(node: &IRNode) -> &IRElement {
        match node {
            IRNode::Element(el) => el,
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_jsx_text() {
        assert_eq!(normalize_jsx_text("\n    \n  "), None);
        assert_eq!(normalize_jsx_text("  a b "), Some("  a b ".to_string()));
        assert_eq!(
            normalize_jsx_text("\n  Hello\n  world  \n"),
            Some("Hello world".to_string())
        );
    }

    #[test]
    fn test_counter_button() {
        let (root, _) = lower(
            r#""use client"
import { createSignal } from '@barefootjs/dom'
export function Counter() {
  const [count, setCount] = createSignal(0)
  return <button onClick={() => setCount((n) => n + 1)}>{count()}</button>
}"#,
        );
        let button = element(&root);
        assert_eq!(button.tag, "button");
        assert_eq!(button.marker.as_deref(), Some("s0"));
        assert_eq!(button.events[0].name, "click");
        match &button.children[0] {
            IRNode::Expression(e) => {
                assert!(e.reactive);
                assert_eq!(e.marker.as_deref(), Some("t0"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_static_and_dynamic_attributes() {
        let (root, _) = lower(
            r#""use client"
import { createSignal } from '@barefootjs/dom'
export function A({ id }) {
  const [on, setOn] = createSignal(false)
  return <input className="x" id={id} disabled={on()} checked readonly={false} tabIndex={2} />
}"#,
        );
        let input = element(&root);
        let names: Vec<_> = input.attrs.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["class", "id", "disabled", "checked", "tabIndex"]);
        assert_eq!(
            input.attrs[1].value,
            AttrValue::Dynamic {
                expr: "id".to_string(),
                reactive: false
            }
        );
        assert!(input.attrs[2].value.is_reactive());
        assert!(input.attrs[2].dom_property);
        assert_eq!(input.attrs[3].value, AttrValue::Boolean);
        assert_eq!(input.marker.as_deref(), Some("s0"));
    }

    #[test]
    fn test_conditional_and_short_circuit() {
        let (root, _) = lower(
            r#""use client"
import { createSignal } from '@barefootjs/dom'
export function A() {
  const [open] = createSignal(false)
  return <div>{open() ? <p>Open</p> : <p>Closed</p>}{open() && <span>!</span>}</div>
}"#,
        );
        let div = element(&root);
        match (&div.children[0], &div.children[1]) {
            (IRNode::Conditional(a), IRNode::Conditional(b)) => {
                assert!(a.reactive);
                assert_eq!(a.marker, "c0");
                assert!(a.when_false.is_some());
                assert_eq!(b.marker, "c1");
                assert!(b.when_false.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_keyed_nested_loops() {
        let (root, diags) = lower(
            r#""use client"
import { createSignal } from '@barefootjs/dom'
export function Board() {
  const [groups] = createSignal([])
  return <ul>{groups().map((group) => <li key={group.id}><ol>{group.items.map((child) => <li key={child.id}>{child.label}</li>)}</ol></li>)}</ul>
}"#,
        );
        assert!(diags.iter().all(|d| d.code != BF_UNKEYED_LOOP));
        let ul = element(&root);
        let IRNode::Loop(outer) = &ul.children[0] else {
            panic!("expected loop")
        };
        assert_eq!(outer.key.as_deref(), Some("group.id"));
        assert_eq!(outer.depth, 0);
        let li = element(&outer.template);
        let ol = element(&li.children[0]);
        let IRNode::Loop(inner) = &ol.children[0] else {
            panic!("expected inner loop")
        };
        assert_eq!(inner.key.as_deref(), Some("child.id"));
        assert_eq!(inner.depth, 1);
        assert_eq!(inner.index_name(), "__i1");
        assert_ne!(outer.marker, inner.marker);
    }

    #[test]
    fn test_unkeyed_reactive_loop_warns() {
        let (_, diags) = lower(
            r#""use client"
import { createSignal } from '@barefootjs/dom'
export function L() {
  const [items] = createSignal([])
  return <ul>{items().map((item, i) => <li>{item}</li>)}</ul>
}"#,
        );
        let warning = diags.iter().find(|d| d.code == BF_UNKEYED_LOOP).unwrap();
        assert!(!warning.is_error());
    }

    #[test]
    fn test_lazy_children_when_reactive() {
        let (root, _) = lower(
            r#""use client"
import { createSignal } from '@barefootjs/dom'
export function P() {
  const [count] = createSignal(0)
  return <div><Button>{count()}</Button><Button>static</Button></div>
}"#,
        );
        let div = element(&root);
        match (&div.children[0], &div.children[1]) {
            (IRNode::Component(a), IRNode::Component(b)) => {
                assert!(a.lazy_children);
                assert!(!b.lazy_children);
                assert_eq!(a.marker, "p0");
                assert_eq!(b.marker, "p1");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_component_props() {
        let (root, _) = lower(
            r#"export function P({ handleAdd }) {
  return <Child onAdd={handleAdd} label="x" open />
}"#,
        );
        let IRNode::Component(child) = &root else {
            panic!("expected component")
        };
        assert_eq!(
            child.props[0].value,
            PropValue::Expression {
                expr: "handleAdd".to_string(),
                reactive: false
            }
        );
        assert_eq!(child.props[2].value, PropValue::Boolean);
    }

    #[test]
    fn test_guarded_handler_and_ambiguous_warning() {
        let (root, diags) = lower(
            r#""use client"
import { createSignal } from '@barefootjs/dom'
export function F() {
  const [text, setText] = createSignal('')
  return <div>
    <input onKeyDown={(e) => e.key === 'Enter' && setText('')} />
    <input onKeyUp={(e) => (text() ? a : b) && setText('')} />
  </div>
}"#,
        );
        let div = element(&root);
        let first = element(&div.children[0]);
        assert_eq!(first.events[0].name, "keydown");
        assert_eq!(
            first.events[0].emitted_handler(),
            "(e) => { if (e.key === 'Enter') setText('') }"
        );
        assert!(diags.iter().any(|d| d.code == BF_AMBIGUOUS_HANDLER));
    }

    #[test]
    fn test_slot_and_provider() {
        let (root, _) = lower(
            r#"export function Layout({ children }) {
  return <Theme.Provider value={'dark'}><main>{children}</main></Theme.Provider>
}"#,
        );
        let IRNode::Provider(provider) = &root else {
            panic!("expected provider")
        };
        assert_eq!(provider.context, "Theme");
        assert_eq!(provider.value, "'dark'");
        let main = element(&provider.children[0]);
        assert!(matches!(main.children[0], IRNode::Slot(_)));
    }

    #[test]
    fn test_early_return_becomes_if_statement() {
        let (root, _) = lower(
            r#"export function S({ loading }) {
  if (loading) return <p>Loading</p>
  return <div>Ready</div>
}"#,
        );
        let IRNode::IfStatement(stmt) = &root else {
            panic!("expected if-statement")
        };
        assert_eq!(stmt.condition, "loading");
        assert!(!stmt.reactive);
        assert!(stmt.alternate.is_some());
    }

    #[test]
    fn test_unsupported_return_shape() {
        let ctx = analyze_component(
            "export function A() { return cond ? <a/> : <b/> }",
            "A.tsx",
            None,
        );
        let (root, _) = jsx_to_ir(&ctx);
        assert!(matches!(root, Some(IRNode::Conditional(_))));

        let mut bad = ctx.clone();
        bad.jsx_return = Some(ReturnShape::Jsx(JsxSource {
            text: "'text'".to_string(),
            line: 1,
            column: 1,
        }));
        let (root, diags) = jsx_to_ir(&bad);
        assert!(root.is_none());
        assert!(diags.iter().any(|d| d.code == BF_UNSUPPORTED_RETURN));
    }

    #[test]
    fn test_jsx_constant_is_inlined() {
        let (root, _) = lower(
            r#"const badge = <em>new</em>
export function Item({ open }) {
  const icon = <b>i</b>
  return <div>{icon}{open ? badge : null}<span>x</span></div>
}"#,
        );
        let div = element(&root);
        let icon = element(&div.children[0]);
        assert_eq!(icon.tag, "b");
        assert_eq!(icon.children, vec![IRNode::Text(IRText { value: "i".to_string() })]);
        let IRNode::Conditional(cond) = &div.children[1] else {
            panic!("expected conditional, got {:?}", div.children[1])
        };
        assert_eq!(element(&cond.when_true).tag, "em");
        assert!(cond.when_false.is_none());
    }

    #[test]
    fn test_self_referencing_jsx_constant_stays_expression() {
        let ctx = analyze_component(
            "export function A() {\n  const a = <i>{a}</i>\n  return <p>{a}</p>\n}",
            "A.tsx",
            None,
        );
        let (root, _) = jsx_to_ir(&ctx);
        let root = root.expect("lowered root");
        let i = element(&element(&root).children[0]);
        assert!(matches!(&i.children[0], IRNode::Expression(e) if e.expr == "a"));
    }
}
