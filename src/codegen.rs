//! Client-JS emitter.
//!
//! Builds one `ComponentModule` per component from its IR and hydration
//! plan: an `init` function that claims the scope, rebuilds the reactive
//! declarations and wires every dynamic node, and a `render` function used
//! when a parent renders the component on the client.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::analyzer::{ImportedName, PropsShape};
use crate::code_model::{
    Code, ComponentModule, ImportSet, ImportSpec, ModuleDeclaration, Statement, RUNTIME_EXPORTS,
};
use crate::hydration::{resolve_paths, ElementPath, HydrationPlan, HydrationTarget, TargetKind};
use crate::ir::{
    AttrValue, ComponentIR, IRAttribute, IRComponent, IRElement, IRLoop, IRNode, IRSlot, PropValue,
};
use crate::parse::emit_js;
use crate::template::{js_key, object_literal, JsTemplateSyntax, TemplateWalker};
use crate::transform::{event_name, extract_identifiers};
use crate::visitor::{collect_expressions, walk_loop, IrVisitor};

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Module-local DOM helpers, in emission order.
const HELPERS: [(&str, &str); 16] = [
    (
        "__bfStr",
        r#"function __bfStr(v) {
  return v == null || v === false || v === true ? '' : String(v)
}"#,
    ),
    (
        "__bfEsc",
        r#"function __bfEsc(v) {
  return __bfStr(v).replace(/[&<>"']/g, (c) => ({ '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' })[c])
}"#,
    ),
    (
        "__bfAttr",
        r#"function __bfAttr(el, name, value) {
  if (value == null || value === false) el.removeAttribute(name)
  else el.setAttribute(name, value === true ? '' : String(value))
}"#,
    ),
    (
        "__bfAttrStr",
        r#"function __bfAttrStr(name, value) {
  if (value == null || value === false) return ''
  return value === true ? ` ${name}` : ` ${name}="${__bfEsc(String(value))}"`
}"#,
    ),
    (
        "__bfStyle",
        r#"function __bfStyle(value) {
  if (value == null || typeof value !== 'object') return value
  return Object.entries(value)
    .filter(([, v]) => v != null && v !== false)
    .map(([k, v]) => `${k.replace(/[A-Z]/g, (c) => '-' + c.toLowerCase())}:${v}`)
    .join(';')
}"#,
    ),
    (
        "__bfSpread",
        r#"function __bfSpread(el, props) {
  for (const [k, v] of Object.entries(props ?? {})) {
    if (k === 'children' || k === 'key') continue
    if (/^on[A-Z]/.test(k)) el[k.toLowerCase()] = v
    else __bfAttr(el, k === 'className' ? 'class' : k, k === 'style' ? __bfStyle(v) : v)
  }
}"#,
    ),
    (
        "__bfSpreadStr",
        r#"function __bfSpreadStr(props) {
  let out = ''
  for (const [k, v] of Object.entries(props ?? {})) {
    if (k === 'children' || k === 'key' || /^on[A-Z]/.test(k)) continue
    out += __bfAttrStr(k === 'className' ? 'class' : k, k === 'style' ? __bfStyle(v) : v)
  }
  return out
}"#,
    ),
    (
        "__bfSlot",
        r#"function __bfSlot(v) {
  return __bfStr(typeof v === 'function' ? v() : v)
}"#,
    ),
    (
        "__bfPath",
        r#"function __bfPath(root, path) {
  let el = root
  for (const i of path) el = el ? el.children[i] : null
  return el ?? null
}"#,
    ),
    (
        "__bfFind",
        r#"function __bfFind(scope, root, selector) {
  for (const el of root.querySelectorAll(selector)) {
    if (!scope || el.closest('[data-bf-scope]') === scope) return el
  }
  return null
}"#,
    ),
    (
        "__bfComment",
        r#"function __bfComment(scope, root, text) {
  const walker = document.createTreeWalker(root, NodeFilter.SHOW_COMMENT)
  let node
  while ((node = walker.nextNode())) {
    if (node.data !== text) continue
    if (!scope || node.parentElement?.closest('[data-bf-scope]') === scope) return node
  }
  return null
}"#,
    ),
    (
        "__bfText",
        r#"function __bfText(scope, root, marker) {
  const start = __bfComment(scope, root, 'bf:' + marker)
  if (!start) return null
  let node = start.nextSibling
  if (!node || node.nodeType !== 3) {
    node = document.createTextNode('')
    start.after(node)
  }
  return node
}"#,
    ),
    (
        "__bfAnchor",
        r#"function __bfAnchor(scope, root, marker) {
  let node = __bfComment(scope, root, 'bf:' + marker)
  do node = node && node.nextSibling
  while (node && node.nodeType !== 1)
  return node ?? null
}"#,
    ),
    (
        "__bfRegion",
        r#"function __bfRegion(scope, root, marker) {
  const start = __bfComment(scope, root, 'bf:' + marker)
  let end = start && start.nextSibling
  while (end && !(end.nodeType === 8 && end.data === '/bf:' + marker)) end = end.nextSibling
  return end ? [start, end] : null
}"#,
    ),
    (
        "__bfSwap",
        r#"function __bfSwap(scope, root, marker, html) {
  const region = __bfRegion(scope, root, marker)
  if (!region) return
  const [start, end] = region
  while (start.nextSibling !== end) start.nextSibling.remove()
  const tpl = document.createElement('template')
  tpl.innerHTML = html
  end.before(tpl.content)
}"#,
    ),
    (
        "__bfReconcile",
        r#"function __bfReconcile(scope, root, marker, items, key, render, bind) {
  const region = __bfRegion(scope, root, marker)
  if (!region) return
  const [start, end] = region
  const first = !start.__bfSeen
  start.__bfSeen = true
  const current = []
  for (let n = start.nextSibling; n && n !== end; n = n.nextSibling) {
    if (n.nodeType === 1) current.push(n)
  }
  if (!key && !first) {
    for (const n of current) n.remove()
    current.length = 0
  }
  const byKey = new Map()
  current.forEach((n, i) => byKey.set(key ? n.getAttribute('data-key') : String(i), n))
  const next = []
  Array.from(items ?? []).forEach((item, i) => {
    const k = key ? String(key(item, i)) : String(i)
    let node = byKey.get(k)
    if (node) {
      byKey.delete(k)
      if (first && bind) bind(node, item, i)
    } else {
      const tpl = document.createElement('template')
      tpl.innerHTML = render(item, i).trim()
      node = tpl.content.firstElementChild
      if (!node) return
      if (bind) bind(node, item, i)
    }
    next.push(node)
  })
  for (const n of byKey.values()) n.remove()
  for (const n of next) end.before(n)
}"#,
    ),
];

fn calls(code: &str, name: &str) -> bool {
    code.contains(&format!("{}(", name))
}

/// Helpers the code calls, including the helpers those call.
pub fn helpers_for(code: &str) -> Vec<(&'static str, &'static str)> {
    let mut used: Vec<bool> = HELPERS.iter().map(|(name, _)| calls(code, name)).collect();
    loop {
        let mut changed = false;
        for i in 0..HELPERS.len() {
            if used[i] {
                continue;
            }
            let name = HELPERS[i].0;
            if HELPERS
                .iter()
                .zip(&used)
                .any(|((_, source), on)| *on && calls(source, name))
            {
                used[i] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    HELPERS
        .iter()
        .zip(used)
        .filter(|(_, on)| *on)
        .map(|(helper, _)| *helper)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// EMITTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Where lookups for the nodes being bound start.
#[derive(Clone)]
struct BindContext {
    /// `__scope`, or `__el` inside a loop item.
    root: String,
    /// Inside children a child component re-renders from a thunk; only
    /// events, refs and child inits are bound there.
    lazy: bool,
}

fn scope_arg(target: &HydrationTarget) -> &'static str {
    if target.qualified {
        "null"
    } else {
        "__scope"
    }
}

struct ClientEmitter<'a> {
    ir: &'a ComponentIR,
    plan: HydrationPlan,
}

/// Client module parts for one component. `auto_hydrate` registers the
/// init with the runtime's scope discovery instead of waiting for a parent.
pub fn generate_client(ir: &ComponentIR, auto_hydrate: bool) -> ComponentModule {
    let emitter = ClientEmitter {
        ir,
        plan: resolve_paths(ir),
    };
    let module = emitter.build(auto_hydrate);
    debug!(
        component = %ir.name,
        statements = module.body.len(),
        "generated client module parts"
    );
    module
}

impl<'a> ClientEmitter<'a> {
    fn build(&self, auto_hydrate: bool) -> ComponentModule {
        let meta = &self.ir.metadata;
        let scope = BindContext {
            root: "__scope".to_string(),
            lazy: false,
        };
        let mut body = Vec::new();
        self.node(&self.ir.root, &scope, &mut body);

        let mut hooks: Vec<(usize, String)> = meta
            .effects
            .iter()
            .map(|h| (h.order, format!("createEffect({})", emit_js(&h.body))))
            .chain(
                meta.mounts
                    .iter()
                    .map(|h| (h.order, format!("onMount({})", emit_js(&h.body)))),
            )
            .collect();
        hooks.sort_by_key(|(order, _)| *order);
        body.extend(hooks.into_iter().map(|(_, code)| Statement::line(code)));

        let deps = self.dependencies();
        let mut prologue = vec![
            Statement::line(format!(
                "const __scope = find(__parentScope ?? document, '[data-bf-scope=\"{}\"]', __instanceIndex)",
                self.ir.name
            )),
            Statement::line("if (!__scope || __scope.__bfInit) return"),
            Statement::line("__scope.__bfInit = true"),
        ];
        let mut render_body = Vec::new();
        if let Some(props) = self.props_binding() {
            prologue.push(Statement::line(props.clone()));
            render_body.push(Statement::line(props));
        }
        for decl in &deps.statements {
            prologue.push(Statement::line(decl.clone()));
            render_body.push(Statement::line(decl.clone()));
        }

        let walker = TemplateWalker::new(&JsTemplateSyntax, &self.plan, None);
        let mut ret = Code::text("return `");
        ret.push_code(walker.render_root(self.ir));
        ret.push_str("`");
        render_body.push(Statement::Line(ret));

        ComponentModule {
            name: self.ir.name.clone(),
            prologue,
            body,
            render_body,
            has_state: !meta.signals.is_empty() || !meta.memos.is_empty(),
            auto_hydrate,
            imports: deps.imports,
            declarations: deps.module,
        }
    }

    fn props_binding(&self) -> Option<String> {
        match &self.ir.metadata.props {
            PropsShape::None => None,
            PropsShape::Object { name } => Some(format!("const {} = __props", name)),
            PropsShape::Destructured { fields, rest } => {
                let mut parts: Vec<String> = fields
                    .iter()
                    .map(|f| {
                        let mut part = if f.local == f.key {
                            f.key.clone()
                        } else {
                            format!("{}: {}", js_key(&f.key), emit_js(&f.local))
                        };
                        if let Some(default) = &f.default {
                            part.push_str(&format!(" = {}", emit_js(default)));
                        }
                        part
                    })
                    .collect();
                if let Some(rest) = rest {
                    parts.push(format!("...{}", rest));
                }
                (!parts.is_empty()).then(|| format!("const {{ {} }} = __props", parts.join(", ")))
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // NODES
    // ═══════════════════════════════════════════════════════════════════════════

    fn node(&self, node: &IRNode, cx: &BindContext, out: &mut Vec<Statement>) {
        match node {
            IRNode::Element(el) => self.element(el, cx, out),
            IRNode::Text(_) => {}
            IRNode::Expression(e) => {
                if let (Some(marker), false) = (&e.marker, cx.lazy) {
                    self.text(marker, &e.expr, cx, out);
                }
            }
            IRNode::Conditional(c) => self.conditional(
                &c.marker,
                &c.condition,
                c.reactive,
                &c.when_true,
                c.when_false.as_deref(),
                cx,
                out,
            ),
            IRNode::IfStatement(stmt) => self.conditional(
                &stmt.marker,
                &stmt.condition,
                stmt.reactive,
                &stmt.consequent,
                stmt.alternate.as_deref(),
                cx,
                out,
            ),
            IRNode::Loop(lp) => {
                if !cx.lazy {
                    self.list(lp, cx, out);
                }
            }
            IRNode::Component(c) => self.component(c, cx, out),
            IRNode::Fragment(f) => {
                for child in &f.children {
                    self.node(child, cx, out);
                }
            }
            IRNode::Provider(p) => {
                for child in &p.children {
                    self.node(child, cx, out);
                }
            }
            IRNode::Slot(s) => {
                if !cx.lazy {
                    self.slot(s, cx, out);
                }
            }
        }
    }

    /// Expression that evaluates to the element a target addresses.
    fn lookup(&self, marker: &str, cx: &BindContext) -> Option<String> {
        let target = self.plan.target(marker)?;
        Some(match &target.path {
            ElementPath::Root => cx.root.clone(),
            ElementPath::Children(indices) => format!(
                "__bfPath({}, [{}])",
                cx.root,
                indices
                    .iter()
                    .map(usize::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ElementPath::Scoped => match target.kind {
                TargetKind::Instance => format!(
                    "__bfAnchor({}, {}, '{}')",
                    scope_arg(target),
                    cx.root,
                    self.plan.dom_marker(marker)
                ),
                _ => format!(
                    "__bfFind({}, {}, '[data-bf=\"{}\"]')",
                    scope_arg(target),
                    cx.root,
                    self.plan.dom_marker(marker)
                ),
            },
        })
    }

    fn bind_to(&self, var: &str, lookup: String, binds: Vec<Statement>, out: &mut Vec<Statement>) {
        if binds.is_empty() {
            return;
        }
        out.push(Statement::line(format!("const {} = {}", var, lookup)));
        out.push(Statement::block(format!("if ({}) {{", var), binds, "}"));
    }

    fn element(&self, el: &IRElement, cx: &BindContext, out: &mut Vec<Statement>) {
        if let Some(marker) = &el.marker {
            let var = format!("__{}", marker);
            let mut binds = Vec::new();
            if !cx.lazy {
                binds.extend(el.attrs.iter().filter_map(|a| attribute_binding(&var, a)));
            }
            for event in &el.events {
                binds.push(Statement::line(format!(
                    "{}.on{} = {}",
                    var,
                    event.name,
                    emit_js(&event.emitted_handler())
                )));
            }
            if let Some(callback) = &el.ref_callback {
                binds.push(Statement::line(format!("({})({})", emit_js(callback), var)));
            }
            if let Some(lookup) = self.lookup(marker, cx) {
                self.bind_to(&var, lookup, binds, out);
            }
        }
        for child in &el.children {
            self.node(child, cx, out);
        }
    }

    fn text(&self, marker: &str, expr: &str, cx: &BindContext, out: &mut Vec<Statement>) {
        let Some(target) = self.plan.target(marker) else {
            return;
        };
        let lookup = match target.kind {
            TargetKind::Content => match self.lookup(marker, cx) {
                Some(lookup) => lookup,
                None => return,
            },
            _ => format!(
                "__bfText({}, {}, '{}')",
                scope_arg(target),
                cx.root,
                self.plan.dom_marker(marker)
            ),
        };
        let var = format!("__{}", marker);
        let effect = Statement::line(format!(
            "createEffect(() => {{ {}.textContent = __bfStr({}) }})",
            var,
            emit_js(expr)
        ));
        self.bind_to(&var, lookup, vec![effect], out);
    }

    #[allow(clippy::too_many_arguments)]
    fn conditional(
        &self,
        marker: &str,
        condition: &str,
        reactive: bool,
        when_true: &IRNode,
        when_false: Option<&IRNode>,
        cx: &BindContext,
        out: &mut Vec<Statement>,
    ) {
        let mut yes = Vec::new();
        self.node(when_true, cx, &mut yes);
        let mut no = Vec::new();
        if let Some(node) = when_false {
            self.node(node, cx, &mut no);
        }
        let condition = emit_js(condition);

        if !reactive {
            out.push(Statement::block(format!("if ({}) {{", condition), yes, "}"));
            out.push(Statement::block(format!("if (!({})) {{", condition), no, "}"));
            return;
        }
        if cx.lazy {
            return;
        }
        let Some(target) = self.plan.target(marker) else {
            return;
        };
        trace!(marker, "reactive region");

        let state = format!("__{}", marker);
        let walker = TemplateWalker::new(&JsTemplateSyntax, &self.plan, None);
        let mut swap = Code::text(format!(
            "if ({} !== undefined) __bfSwap({}, {}, '{}', __v ? `",
            state,
            scope_arg(target),
            cx.root,
            self.plan.dom_marker(marker)
        ));
        swap.push_code(walker.render_node(when_true));
        swap.push_str("` : `");
        if let Some(node) = when_false {
            swap.push_code(walker.render_node(node));
        }
        swap.push_str("`)");

        let effect = vec![
            Statement::line(format!("const __v = !!({})", condition)),
            Statement::line(format!("if (__v === {}) return", state)),
            Statement::Line(swap),
            Statement::line(format!("{} = __v", state)),
            Statement::block("if (__v) {", yes, "}"),
            Statement::block("if (!__v) {", no, "}"),
        ];
        out.push(Statement::line(format!("let {}", state)));
        out.push(Statement::block("createEffect(() => {", effect, "})"));
    }

    fn list(&self, lp: &IRLoop, cx: &BindContext, out: &mut Vec<Statement>) {
        let item_cx = BindContext {
            root: "__el".to_string(),
            lazy: false,
        };
        let mut binds = Vec::new();
        self.node(&lp.template, &item_cx, &mut binds);
        if !lp.reactive && binds.is_empty() {
            return;
        }
        let Some(target) = self.plan.target(&lp.marker) else {
            return;
        };

        let marker = &lp.marker;
        let item = emit_js(&lp.item);
        let index = lp.index_name();
        let prelude: Vec<Statement> = lp
            .prelude
            .as_deref()
            .map(|p| Statement::line(emit_js(p)))
            .into_iter()
            .collect();

        let walker = TemplateWalker::new(&JsTemplateSyntax, &self.plan, None);
        let mut ret = Code::text("return `");
        ret.push_code(walker.render_loop_item(lp));
        ret.push_str("`");
        let mut render = prelude.clone();
        render.push(Statement::Line(ret));
        out.push(Statement::Function {
            open: format!("function __render_{}({}, {}) {{", marker, item, index),
            body: render,
        });

        let bind = if binds.is_empty() {
            "null".to_string()
        } else {
            let mut body = prelude;
            body.extend(binds);
            out.push(Statement::Function {
                open: format!("function __bind_{}(__el, {}, {}) {{", marker, item, index),
                body,
            });
            format!("__bind_{}", marker)
        };
        let key = match &lp.key {
            Some(key) => format!("({}, {}) => {}", item, index, emit_js(key)),
            None => "null".to_string(),
        };
        let call = format!(
            "__bfReconcile({}, {}, '{}', {}, {}, __render_{}, {})",
            scope_arg(target),
            cx.root,
            self.plan.dom_marker(marker),
            emit_js(&lp.source),
            key,
            marker,
            bind
        );
        out.push(Statement::line(if lp.reactive {
            format!("createEffect(() => {})", call)
        } else {
            call
        }));
    }

    fn slot(&self, slot: &IRSlot, cx: &BindContext, out: &mut Vec<Statement>) {
        let Some(target) = self.plan.target(&slot.marker) else {
            return;
        };
        let expr = emit_js(&slot.expr);
        let state = format!("__{}", slot.marker);
        let effect = vec![
            Statement::line(format!("const __h = {}()", expr)),
            Statement::line(format!(
                "if ({}) __bfSwap({}, {}, '{}', __bfStr(__h))",
                state,
                scope_arg(target),
                cx.root,
                self.plan.dom_marker(&slot.marker)
            )),
            Statement::line(format!("{} = true", state)),
        ];
        out.push(Statement::block(
            format!("if (typeof {} === 'function') {{", expr),
            vec![
                Statement::line(format!("let {} = false", state)),
                Statement::block("createEffect(() => {", effect, "})"),
            ],
            "}",
        ));
    }

    fn component(&self, c: &IRComponent, cx: &BindContext, out: &mut Vec<Statement>) {
        if let Some(element) = self.lookup(&c.marker, cx) {
            let events = c
                .props
                .iter()
                .filter_map(|prop| match (&prop.value, event_name(&prop.name)) {
                    (PropValue::Expression { expr, .. }, Some(event)) => Some((event, emit_js(expr))),
                    _ => None,
                })
                .collect();
            out.push(Statement::ChildInit {
                component: c.name.clone(),
                props: self.child_props(c),
                element,
                marker: c.marker.clone(),
                events,
            });
        }
        let inner = BindContext {
            root: cx.root.clone(),
            lazy: cx.lazy || c.lazy_children,
        };
        for child in &c.children {
            self.node(child, &inner, out);
        }
    }

    /// Props object for `init{Child}`. Reactive values become getters so a
    /// child reading `props.x` stays live; destructuring children read once.
    fn child_props(&self, c: &IRComponent) -> Code {
        let mut fields: Vec<Code> = c
            .props
            .iter()
            .map(|prop| {
                let key = js_key(&prop.name);
                Code::text(match &prop.value {
                    PropValue::Static { value } => format!("{}: {:?}", key, value),
                    PropValue::Boolean => format!("{}: true", key),
                    PropValue::Expression {
                        expr,
                        reactive: false,
                    } => format!("{}: {}", key, emit_js(expr)),
                    PropValue::Expression {
                        expr,
                        reactive: true,
                    } => format!("get {}() {{ return {} }}", key, emit_js(expr)),
                    PropValue::Spread { expr } => format!("...({})", emit_js(expr)),
                })
            })
            .collect();
        if !c.children.is_empty() {
            let walker = TemplateWalker::new(&JsTemplateSyntax, &self.plan, None);
            let mut field = Code::text(if c.lazy_children {
                "children: () => `"
            } else {
                "children: `"
            });
            field.push_code(walker.render_nodes(&c.children));
            field.push_str("`");
            fields.push(field);
        }
        object_literal(fields)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DECLARATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Declarations, module constants and imports the emitted code reaches,
    /// followed transitively through their own references.
    fn dependencies(&self) -> Dependencies {
        let meta = &self.ir.metadata;
        let mut needed: BTreeSet<String> = BTreeSet::new();
        let mut snippets = collect_expressions(&self.ir.root);
        snippets.extend(collect_preludes(&self.ir.root));
        snippets.extend(meta.signals.iter().map(|s| s.initial.clone()));
        snippets.extend(meta.memos.iter().map(|m| m.body.clone()));
        snippets.extend(meta.effects.iter().chain(&meta.mounts).map(|h| h.body.clone()));
        if let PropsShape::Destructured { fields, .. } = &meta.props {
            snippets.extend(fields.iter().filter_map(|f| f.default.clone()));
        }
        for snippet in &snippets {
            needed.extend(extract_identifiers(snippet));
        }

        let mut local_on = vec![false; meta.local_declarations.len()];
        let mut module_on = vec![false; meta.module_declarations.len()];
        loop {
            let mut changed = false;
            for (decls, on) in [
                (&meta.local_declarations, &mut local_on),
                (&meta.module_declarations, &mut module_on),
            ] {
                for (decl, included) in decls.iter().zip(on.iter_mut()) {
                    // markup constants are inlined into the tree
                    if *included
                        || decl.jsx.is_some()
                        || !decl.names.iter().any(|n| needed.contains(n))
                    {
                        continue;
                    }
                    *included = true;
                    changed = true;
                    needed.extend(decl.references.iter().cloned());
                    needed.extend(extract_identifiers(&decl.source));
                }
            }
            if !changed {
                break;
            }
        }

        let mut ordered: Vec<(usize, String)> = Vec::new();
        for signal in &meta.signals {
            let binding = match &signal.setter {
                Some(setter) => format!("[{}, {}]", signal.getter, setter),
                None => format!("[{}]", signal.getter),
            };
            ordered.push((
                signal.order,
                format!("const {} = createSignal({})", binding, emit_js(&signal.initial)),
            ));
        }
        for memo in &meta.memos {
            ordered.push((
                memo.order,
                format!("const {} = createMemo({})", memo.name, emit_js(&memo.body)),
            ));
        }
        for (decl, included) in meta.local_declarations.iter().zip(&local_on) {
            if *included {
                ordered.push((decl.order, emit_js(&decl.source)));
            }
        }
        ordered.sort_by_key(|(order, _)| *order);

        let module = meta
            .module_declarations
            .iter()
            .zip(&module_on)
            .filter(|(_, on)| **on)
            .map(|(decl, _)| ModuleDeclaration {
                order: decl.order,
                source: emit_js(&decl.source),
            })
            .collect();

        let mut imports = ImportSet::default();
        for binding in &meta.imports {
            if binding.type_only
                || !needed.contains(&binding.local)
                || RUNTIME_EXPORTS.contains(&binding.local.as_str())
            {
                continue;
            }
            let spec = match &binding.imported {
                ImportedName::Default => ImportSpec::Default(binding.local.clone()),
                ImportedName::Namespace => ImportSpec::Namespace(binding.local.clone()),
                ImportedName::Named(name) => ImportSpec::Named {
                    imported: name.clone(),
                    local: binding.local.clone(),
                },
            };
            imports.add(&binding.source, spec);
        }

        Dependencies {
            statements: ordered.into_iter().map(|(_, code)| code).collect(),
            module,
            imports,
        }
    }
}

struct Dependencies {
    statements: Vec<String>,
    module: Vec<ModuleDeclaration>,
    imports: ImportSet,
}

fn attribute_binding(var: &str, attr: &IRAttribute) -> Option<Statement> {
    let code = match &attr.value {
        AttrValue::Dynamic {
            expr,
            reactive: true,
        } => {
            let expr = emit_js(expr);
            match attr.name.as_str() {
                "style" => format!(
                    "createEffect(() => __bfAttr({}, 'style', __bfStyle({})))",
                    var, expr
                ),
                "value" => format!(
                    "createEffect(() => {{ const __v = {expr}; __bfAttr({var}, 'value', __v); {var}.value = __v ?? '' }})"
                ),
                name @ ("checked" | "disabled" | "hidden") => format!(
                    "createEffect(() => {{ const __v = {expr}; __bfAttr({var}, '{name}', __v); {var}.{name} = !!__v }})"
                ),
                name => format!("createEffect(() => __bfAttr({}, '{}', {}))", var, name, expr),
            }
        }
        AttrValue::Spread {
            expr,
            reactive: true,
        } => format!("createEffect(() => __bfSpread({}, {}))", var, emit_js(expr)),
        _ => return None,
    };
    Some(Statement::line(code))
}

fn collect_preludes(node: &IRNode) -> Vec<String> {
    struct Preludes(Vec<String>);
    impl IrVisitor for Preludes {
        fn visit_loop(&mut self, lp: &IRLoop) {
            if let Some(prelude) = &lp.prelude {
                self.0.push(prelude.clone());
            }
            walk_loop(self, lp);
        }
    }
    let mut preludes = Preludes(vec![]);
    preludes.visit_node(node);
    preludes.0
}
