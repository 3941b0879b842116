//! Marked templates.
//!
//! One walker turns a component's IR into markup carrying the scope and
//! hydration markers. What the dynamic parts look like is delegated to a
//! `TemplateSyntax`: the backend-agnostic marked syntax, JS template
//! literals for client-side render functions, or a static shell used for
//! path verification. Backends plug in through `TemplateAdapter`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analyzer::{DeclKind, PropsShape};
use crate::code_model::Code;
use crate::hydration::{resolve_paths, HydrationPlan, TargetKind};
use crate::ir::{AttrValue, ComponentIR, IRComponent, IRElement, IRLoop, IRNode, PropValue};
use crate::parse::emit_js;
use crate::static_eval::{static_eval, StaticEnv, StaticValue};

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Boolean attributes rendered by presence.
const PRESENCE_ATTRIBUTES: [&str; 3] = ["disabled", "checked", "hidden"];

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes text for the inside of a JS template literal.
pub fn escape_template_literal(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Object key as written in generated JS.
pub fn js_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        format!("{:?}", name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SYNTAX
// ═══════════════════════════════════════════════════════════════════════════════

pub trait TemplateSyntax {
    /// Static markup, already HTML-escaped.
    fn literal(&self, html: &str) -> String;
    /// Escaped interpolation of an expression.
    fn interpolate(&self, expr: &str) -> String;
    /// Interpolation of content that is already markup (slots).
    fn raw(&self, expr: &str) -> String;
    /// A dynamic attribute, including its leading space.
    fn attribute(&self, name: &str, expr: &str) -> String;
    fn spread(&self, expr: &str) -> String;
    fn scope_props(&self) -> String {
        String::new()
    }
    fn branch(&self, condition: &str, yes: Code, no: Code) -> Code;
    fn each(&self, lp: &IRLoop, item: Code) -> Code;
    fn component(&self, component: &IRComponent, children: Option<Code>) -> Code;
}

/// Backend-agnostic marked syntax: `{{ expr }}`, `{{#if}}`, `{{#each}}`,
/// `{{> Child}}`.
pub struct MarkedSyntax {
    pub with_props: bool,
}

impl TemplateSyntax for MarkedSyntax {
    fn literal(&self, html: &str) -> String {
        html.to_string()
    }

    fn interpolate(&self, expr: &str) -> String {
        format!("{{{{ {} }}}}", expr)
    }

    fn raw(&self, expr: &str) -> String {
        format!("{{{{{{ {} }}}}}}", expr)
    }

    fn attribute(&self, name: &str, expr: &str) -> String {
        if PRESENCE_ATTRIBUTES.contains(&name) {
            format!("{{{{#if {}}}}} {}{{{{/if}}}}", expr, name)
        } else {
            format!(" {}=\"{{{{ {} }}}}\"", name, expr)
        }
    }

    fn spread(&self, expr: &str) -> String {
        format!(" {{{{...{}}}}}", expr)
    }

    fn scope_props(&self) -> String {
        if self.with_props {
            " data-bf-props=\"{{ __bfProps }}\"".to_string()
        } else {
            String::new()
        }
    }

    fn branch(&self, condition: &str, yes: Code, no: Code) -> Code {
        let mut out = Code::text(format!("{{{{#if {}}}}}", condition));
        out.push_code(yes);
        if !no.is_empty() {
            out.push_str("{{else}}");
            out.push_code(no);
        }
        out.push_str("{{/if}}");
        out
    }

    fn each(&self, lp: &IRLoop, item: Code) -> Code {
        let mut out = Code::text(format!(
            "{{{{#each {} as {}, {}}}}}",
            lp.source,
            lp.item,
            lp.index_name()
        ));
        match &lp.prelude {
            Some(prelude) => {
                out.push_str(&format!("{{{{#let {}}}}}", prelude));
                out.push_code(item);
                out.push_str("{{/let}}");
            }
            None => out.push_code(item),
        }
        out.push_str("{{/each}}");
        out
    }

    fn component(&self, component: &IRComponent, children: Option<Code>) -> Code {
        let mut props = String::new();
        for prop in &component.props {
            match &prop.value {
                PropValue::Static { value } => {
                    props.push_str(&format!(" {}=\"{}\"", prop.name, escape_html(value)))
                }
                PropValue::Boolean => props.push_str(&format!(" {}=true", prop.name)),
                PropValue::Expression { expr, .. } => {
                    props.push_str(&format!(" {}=({})", prop.name, expr))
                }
                PropValue::Spread { expr } => props.push_str(&format!(" ...({})", expr)),
            }
        }
        match children {
            Some(children) => {
                let mut out = Code::text(format!("{{{{#> {}{}}}}}", component.name, props));
                out.push_code(children);
                out.push_str(&format!("{{{{/{}}}}}", component.name));
                out
            }
            None => Code::text(format!("{{{{> {}{}}}}}", component.name, props)),
        }
    }
}

/// JS template-literal syntax for client render functions. Expressions are
/// emitted with type syntax stripped.
pub struct JsTemplateSyntax;

impl JsTemplateSyntax {
    /// Props object for `render{Child}(...)`; values are read once.
    pub fn render_props(component: &IRComponent, children: Option<Code>) -> Code {
        let mut fields: Vec<Code> = Vec::new();
        for prop in &component.props {
            let field = match &prop.value {
                PropValue::Static { value } => format!("{}: {:?}", js_key(&prop.name), value),
                PropValue::Boolean => format!("{}: true", js_key(&prop.name)),
                PropValue::Expression { expr, .. } => {
                    format!("{}: {}", js_key(&prop.name), emit_js(expr))
                }
                PropValue::Spread { expr } => format!("...({})", emit_js(expr)),
            };
            fields.push(Code::text(field));
        }
        if let Some(children) = children {
            let mut field = Code::text("children: `");
            field.push_code(children);
            field.push_str("`");
            fields.push(field);
        }
        object_literal(fields)
    }
}

/// `{ a, b }` from already rendered fields; `{}` when there are none.
pub fn object_literal(fields: Vec<Code>) -> Code {
    if fields.is_empty() {
        return Code::text("{}");
    }
    let mut out = Code::text("{ ");
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_code(field);
    }
    out.push_str(" }");
    out
}

impl TemplateSyntax for JsTemplateSyntax {
    fn literal(&self, html: &str) -> String {
        escape_template_literal(html)
    }

    fn interpolate(&self, expr: &str) -> String {
        format!("${{__bfEsc({})}}", emit_js(expr))
    }

    fn raw(&self, expr: &str) -> String {
        format!("${{__bfSlot({})}}", emit_js(expr))
    }

    fn attribute(&self, name: &str, expr: &str) -> String {
        if name == "style" {
            format!("${{__bfAttrStr('style', __bfStyle({}))}}", emit_js(expr))
        } else {
            format!("${{__bfAttrStr('{}', {})}}", name, emit_js(expr))
        }
    }

    fn spread(&self, expr: &str) -> String {
        format!("${{__bfSpreadStr({})}}", emit_js(expr))
    }

    fn branch(&self, condition: &str, yes: Code, no: Code) -> Code {
        let mut out = Code::text(format!("${{({}) ? `", emit_js(condition)));
        out.push_code(yes);
        out.push_str("` : `");
        out.push_code(no);
        out.push_str("`}");
        out
    }

    fn each(&self, lp: &IRLoop, item: Code) -> Code {
        let params = format!("{}, {}", emit_js(&lp.item), lp.index_name());
        let mut out = Code::text(format!(
            "${{(({}) || []).map(({}) => ",
            emit_js(&lp.source),
            params
        ));
        match &lp.prelude {
            Some(prelude) => {
                out.push_str(&format!("{{ {}\nreturn `", emit_js(prelude)));
                out.push_code(item);
                out.push_str("` }");
            }
            None => {
                out.push_str("`");
                out.push_code(item);
                out.push_str("`");
            }
        }
        out.push_str(").join('')}");
        out
    }

    fn component(&self, component: &IRComponent, children: Option<Code>) -> Code {
        let mut out = Code::text("${");
        out.push_child_render(&component.name, Self::render_props(component, children));
        out.push_str("}");
        out
    }
}

/// Static shell: markers and static markup only; dynamic values render as
/// their folded value or nothing, loops render no items and child
/// components render as an empty scope element.
pub struct ShellSyntax;

impl TemplateSyntax for ShellSyntax {
    fn literal(&self, html: &str) -> String {
        html.to_string()
    }

    fn interpolate(&self, _expr: &str) -> String {
        String::new()
    }

    fn raw(&self, _expr: &str) -> String {
        String::new()
    }

    fn attribute(&self, _name: &str, _expr: &str) -> String {
        String::new()
    }

    fn spread(&self, _expr: &str) -> String {
        String::new()
    }

    fn branch(&self, _condition: &str, yes: Code, _no: Code) -> Code {
        yes
    }

    fn each(&self, _lp: &IRLoop, _item: Code) -> Code {
        Code::new()
    }

    fn component(&self, component: &IRComponent, _children: Option<Code>) -> Code {
        Code::text(format!("<div data-bf-scope=\"{}\"></div>", component.name))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WALKER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TemplateWalker<'a> {
    syntax: &'a dyn TemplateSyntax,
    plan: &'a HydrationPlan,
    env: Option<&'a StaticEnv>,
}

impl<'a> TemplateWalker<'a> {
    pub fn new(
        syntax: &'a dyn TemplateSyntax,
        plan: &'a HydrationPlan,
        env: Option<&'a StaticEnv>,
    ) -> Self {
        TemplateWalker { syntax, plan, env }
    }

    fn fold(&self, expr: &str) -> Option<StaticValue> {
        self.env.and_then(|env| static_eval(expr, env))
    }

    fn lit(&self, html: &str, out: &mut Code) {
        out.push_str(&self.syntax.literal(html));
    }

    pub fn render_root(&self, ir: &ComponentIR) -> Code {
        let mut scope = Code::new();
        scope.push_str(&self.syntax.literal(&format!(" data-bf-scope=\"{}\"", ir.name)));
        scope.push_str(&self.syntax.scope_props());
        let mut out = Code::new();
        match &ir.root {
            IRNode::Element(el) => self.element(el, scope, &mut out),
            root => {
                self.lit("<div", &mut out);
                out.push_code(scope);
                self.lit(" style=\"display:contents\">", &mut out);
                self.node(root, &mut out);
                self.lit("</div>", &mut out);
            }
        }
        out
    }

    pub fn render_node(&self, node: &IRNode) -> Code {
        let mut out = Code::new();
        self.node(node, &mut out);
        out
    }

    pub fn render_nodes(&self, nodes: &[IRNode]) -> Code {
        let mut out = Code::new();
        for node in nodes {
            self.node(node, &mut out);
        }
        out
    }

    /// One loop item; its root carries `data-key`.
    pub fn render_loop_item(&self, lp: &IRLoop) -> Code {
        let key = lp.key.clone().unwrap_or_else(|| lp.index_name());
        let key_attr = Code::text(self.syntax.attribute("data-key", &key));
        let mut out = Code::new();
        match lp.template.as_ref() {
            IRNode::Element(el) => self.element(el, key_attr, &mut out),
            other => {
                self.lit("<div", &mut out);
                out.push_code(key_attr);
                self.lit(" style=\"display:contents\">", &mut out);
                self.node(other, &mut out);
                self.lit("</div>", &mut out);
            }
        }
        out
    }

    fn open_region(&self, marker: &str, out: &mut Code) {
        self.lit(&format!("<!--bf:{}-->", self.plan.dom_marker(marker)), out);
    }

    fn close_region(&self, marker: &str, out: &mut Code) {
        self.lit(&format!("<!--/bf:{}-->", self.plan.dom_marker(marker)), out);
    }

    fn node(&self, node: &IRNode, out: &mut Code) {
        match node {
            IRNode::Element(el) => self.element(el, Code::new(), out),
            IRNode::Text(t) => self.lit(&escape_html(&t.value), out),
            IRNode::Expression(e) => {
                let text_marker = e.marker.as_deref().filter(|m| {
                    self.plan.target(m).map(|t| t.kind) == Some(TargetKind::TextMarker)
                });
                if let Some(marker) = text_marker {
                    self.open_region(marker, out);
                }
                match self.fold(&e.expr) {
                    Some(value) => self.lit(&escape_html(&value.to_display()), out),
                    None => out.push_str(&self.syntax.interpolate(&e.expr)),
                }
                if let Some(marker) = text_marker {
                    self.close_region(marker, out);
                }
            }
            IRNode::Conditional(c) => {
                self.open_region(&c.marker, out);
                let no = c.when_false.as_deref();
                self.branch(&c.condition, &c.when_true, no, out);
                self.close_region(&c.marker, out);
            }
            IRNode::IfStatement(stmt) => {
                self.open_region(&stmt.marker, out);
                self.branch(&stmt.condition, &stmt.consequent, stmt.alternate.as_deref(), out);
                self.close_region(&stmt.marker, out);
            }
            IRNode::Loop(lp) => {
                self.open_region(&lp.marker, out);
                out.push_code(self.syntax.each(lp, self.render_loop_item(lp)));
                self.close_region(&lp.marker, out);
            }
            IRNode::Component(c) => {
                if self.plan.needs_anchor(&c.marker) {
                    self.lit(&format!("<!--bf:{}-->", self.plan.dom_marker(&c.marker)), out);
                }
                let children = (!c.children.is_empty()).then(|| self.render_nodes(&c.children));
                out.push_code(self.syntax.component(c, children));
            }
            IRNode::Fragment(f) => {
                for child in &f.children {
                    self.node(child, out);
                }
            }
            IRNode::Provider(p) => {
                for child in &p.children {
                    self.node(child, out);
                }
            }
            IRNode::Slot(s) => {
                self.open_region(&s.marker, out);
                out.push_str(&self.syntax.raw(&s.expr));
                self.close_region(&s.marker, out);
            }
        }
    }

    fn branch(&self, condition: &str, yes: &IRNode, no: Option<&IRNode>, out: &mut Code) {
        match self.fold(condition) {
            Some(value) if value.truthy() => self.node(yes, out),
            Some(_) => {
                if let Some(no) = no {
                    self.node(no, out);
                }
            }
            None => {
                let yes = self.render_node(yes);
                let no = no.map(|n| self.render_node(n)).unwrap_or_default();
                out.push_code(self.syntax.branch(condition, yes, no));
            }
        }
    }

    fn element(&self, el: &IRElement, extra: Code, out: &mut Code) {
        self.lit(&format!("<{}", el.tag), out);
        out.push_code(extra);
        for attr in &el.attrs {
            match &attr.value {
                AttrValue::Static { value } => {
                    self.lit(&format!(" {}=\"{}\"", attr.name, escape_html(value)), out)
                }
                AttrValue::Boolean => self.lit(&format!(" {}", attr.name), out),
                AttrValue::Dynamic { expr, .. } => match self.fold(expr) {
                    Some(value) => self.static_attribute(&attr.name, &value, out),
                    None => out.push_str(&self.syntax.attribute(&attr.name, expr)),
                },
                AttrValue::Spread { expr, .. } => out.push_str(&self.syntax.spread(expr)),
            }
        }
        if let Some(marker) = &el.marker {
            self.lit(&format!(" data-bf=\"{}\"", self.plan.dom_marker(marker)), out);
        }
        self.lit(">", out);
        if VOID_ELEMENTS.contains(&el.tag.as_str()) {
            return;
        }
        for child in &el.children {
            self.node(child, out);
        }
        self.lit(&format!("</{}>", el.tag), out);
    }

    fn static_attribute(&self, name: &str, value: &StaticValue, out: &mut Code) {
        match value {
            StaticValue::Bool(false) | StaticValue::Null | StaticValue::Undefined => {}
            StaticValue::Bool(true) => self.lit(&format!(" {}", name), out),
            other => self.lit(
                &format!(" {}=\"{}\"", name, escape_html(&other.to_js_string())),
                out,
            ),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANT ENVIRONMENT
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref CONST_INIT: Regex = Regex::new(
        r"(?s)^\s*(?:export\s+)?const\s+[A-Za-z_$][\w$]*\s*(?::[^=]+)?=\s*(.+?);?\s*$"
    )
    .unwrap();
    static ref ARROW_EXPRESSION_BODY: Regex = Regex::new(r"(?s)^\s*\(\s*\)\s*=>\s*(.+?)\s*$").unwrap();
}

/// Values the marked template may fold: foldable constants, signal initial
/// values and expression-bodied memos, in declaration order.
pub fn constant_env(ir: &ComponentIR) -> StaticEnv {
    let mut env = StaticEnv::default();
    let meta = &ir.metadata;
    for decl in &meta.module_declarations {
        bind_constant(&mut env, decl);
    }

    enum Item<'m> {
        Local(&'m crate::analyzer::LocalDecl),
        Signal(&'m crate::analyzer::SignalDecl),
        Memo(&'m crate::analyzer::MemoDecl),
    }
    let mut items: Vec<(usize, Item)> = Vec::new();
    items.extend(meta.local_declarations.iter().map(|d| (d.order, Item::Local(d))));
    items.extend(meta.signals.iter().map(|s| (s.order, Item::Signal(s))));
    items.extend(meta.memos.iter().map(|m| (m.order, Item::Memo(m))));
    items.sort_by_key(|(order, _)| *order);

    for (_, item) in items {
        match item {
            Item::Local(decl) => bind_constant(&mut env, decl),
            Item::Signal(signal) => {
                if let Some(value) = static_eval(&signal.initial, &env) {
                    env.bind_getter(&signal.getter, value);
                }
            }
            Item::Memo(memo) => {
                let body = ARROW_EXPRESSION_BODY
                    .captures(&memo.body)
                    .map(|c| c[1].to_string())
                    .filter(|b| !b.starts_with('{'));
                if let Some(value) = body.and_then(|b| static_eval(&b, &env)) {
                    env.bind_getter(&memo.name, value);
                }
            }
        }
    }
    env
}

fn bind_constant(env: &mut StaticEnv, decl: &crate::analyzer::LocalDecl) {
    if decl.kind != DeclKind::Constant || decl.names.len() != 1 {
        return;
    }
    let Some(init) = CONST_INIT.captures(&decl.source).map(|c| c[1].to_string()) else {
        return;
    };
    if let Some(value) = static_eval(&init, env) {
        env.bind(decl.names[0].clone(), value);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADAPTERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterOptions {
    pub fold_constants: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterOutput {
    pub template: String,
    pub types: Option<String>,
}

/// A template backend. Backends render the IR shape in their own syntax;
/// reactivity analysis is already done.
pub trait TemplateAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn extension(&self) -> &str;
    fn generate(&self, ir: &ComponentIR, options: &AdapterOptions) -> AdapterOutput;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkedTemplateAdapter;

impl TemplateAdapter for MarkedTemplateAdapter {
    fn name(&self) -> &str {
        "marked"
    }

    fn extension(&self) -> &str {
        ".marked.html"
    }

    fn generate(&self, ir: &ComponentIR, options: &AdapterOptions) -> AdapterOutput {
        let plan = resolve_paths(ir);
        let env = options.fold_constants.then(|| constant_env(ir));
        let syntax = MarkedSyntax {
            with_props: !ir.metadata.props.is_empty(),
        };
        let template = TemplateWalker::new(&syntax, &plan, env.as_ref())
            .render_root(ir)
            .to_plain();
        AdapterOutput {
            template,
            types: Some(props_types(ir)),
        }
    }
}

/// Markup of the static shell, as the path verifier parses it.
pub fn render_shell(ir: &ComponentIR, plan: &HydrationPlan) -> String {
    let env = constant_env(ir);
    TemplateWalker::new(&ShellSyntax, plan, Some(&env))
        .render_root(ir)
        .to_plain()
}

/// `{Name}Props` declaration for the component's props.
pub fn props_types(ir: &ComponentIR) -> String {
    let type_name = format!("{}Props", ir.name);
    if let Some(declared) = ir.props_type.as_deref() {
        if declared != type_name {
            return format!("export type {} = {}\n", type_name, declared);
        }
    }
    let fields: Vec<String> = match &ir.metadata.props {
        PropsShape::Destructured { fields, .. } => fields
            .iter()
            .map(|f| format!("  {}?: unknown", js_key(&f.key)))
            .collect(),
        _ => vec![],
    };
    if fields.is_empty() {
        format!("export interface {} {{}}\n", type_name)
    } else {
        format!("export interface {} {{\n{}\n}}\n", type_name, fields.join("\n"))
    }
}
