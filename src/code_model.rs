//! Structured client module.
//!
//! Client JS is assembled from imports, declarations, helpers and
//! per-component functions, and serialized once. References to other
//! components stay symbolic until the module is rendered, so the caller can
//! decide per child whether it lives in another hashed module, in the same
//! module, or has no client code at all.

use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeSet;

// ═══════════════════════════════════════════════════════════════════════════════
// CODE FRAGMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// `render{component}(props)`, or `''` when the child has no client module.
    ChildRender { component: String, props: Code },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Code {
    parts: Vec<Part>,
}

impl Code {
    pub fn new() -> Self {
        Code::default()
    }

    pub fn text(s: impl Into<String>) -> Self {
        let mut code = Code::new();
        code.push_str(&s.into());
        code
    }

    pub fn push_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if let Some(Part::Text(last)) = self.parts.last_mut() {
            last.push_str(s);
        } else {
            self.parts.push(Part::Text(s.to_string()));
        }
    }

    pub fn push_code(&mut self, other: Code) {
        for part in other.parts {
            match part {
                Part::Text(t) => self.push_str(&t),
                render => self.parts.push(render),
            }
        }
    }

    pub fn push_child_render(&mut self, component: &str, props: Code) {
        self.parts.push(Part::ChildRender {
            component: component.to_string(),
            props,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Renders with every child assumed present.
    pub fn to_plain(&self) -> String {
        self.render(&|_| ChildLink::Local)
    }

    pub fn render(&self, resolve: &dyn Fn(&str) -> ChildLink) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(t) => out.push_str(t),
                Part::ChildRender { component, props } => match resolve(component) {
                    ChildLink::Absent => out.push_str("''"),
                    _ => {
                        out.push_str(&format!("render{}(", component));
                        out.push_str(&props.render(resolve));
                        out.push(')');
                    }
                },
            }
        }
        out
    }

    fn collect_children(&self, resolve: &dyn Fn(&str) -> ChildLink, out: &mut BTreeSet<String>) {
        for part in &self.parts {
            if let Part::ChildRender { component, props } = part {
                if resolve(component) != ChildLink::Absent {
                    out.insert(component.clone());
                    props.collect_children(resolve, out);
                }
            }
        }
    }
}

/// How a child component is reached from the module being rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildLink {
    /// Exported from another client module as `init{export}`.
    Module { filename: String, export: String },
    /// Defined in the module itself.
    Local,
    /// The child has no client module.
    Absent,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Line(Code),
    Block {
        open: Code,
        body: Vec<Statement>,
        close: String,
    },
    /// Named function; kept even when its body resolves to nothing, since
    /// it is referenced by name.
    Function {
        open: String,
        body: Vec<Statement>,
    },
    /// `init{component}(props, 0, element)` guarded by the element lookup.
    /// When the child has no client module its event props are assigned to
    /// the instance root instead; without event props it is dropped.
    ChildInit {
        component: String,
        props: Code,
        element: String,
        marker: String,
        /// `(dom event, handler)` pairs from the child's `on*` props.
        events: Vec<(String, String)>,
    },
}

impl Statement {
    pub fn line(s: impl Into<String>) -> Self {
        Statement::Line(Code::text(s))
    }

    pub fn block(open: impl Into<String>, body: Vec<Statement>, close: impl Into<String>) -> Self {
        Statement::Block {
            open: Code::text(open),
            body,
            close: close.into(),
        }
    }
}

/// Statements that survive child resolution.
fn resolve_statements(statements: &[Statement], resolve: &dyn Fn(&str) -> ChildLink) -> Vec<Statement> {
    statements
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::ChildInit {
                component, events, ..
            } if events.is_empty() && resolve(component) == ChildLink::Absent => None,
            Statement::Block { open, body, close } => {
                let body = resolve_statements(body, resolve);
                if body.is_empty() {
                    None
                } else {
                    Some(Statement::Block {
                        open: open.clone(),
                        body,
                        close: close.clone(),
                    })
                }
            }
            Statement::Function { open, body } => Some(Statement::Function {
                open: open.clone(),
                body: resolve_statements(body, resolve),
            }),
            other => Some(other.clone()),
        })
        .collect()
}

fn write_statements(
    statements: &[Statement],
    depth: usize,
    resolve: &dyn Fn(&str) -> ChildLink,
    out: &mut String,
) {
    let indent = "  ".repeat(depth);
    for stmt in statements {
        match stmt {
            Statement::Line(code) => {
                // continuation lines are left as written; they may sit inside a template literal
                out.push_str(&indent);
                out.push_str(code.render(resolve).trim_end());
                out.push('\n');
            }
            Statement::Block { open, body, close } => {
                out.push_str(&indent);
                out.push_str(&open.render(resolve));
                out.push('\n');
                write_statements(body, depth + 1, resolve, out);
                out.push_str(&indent);
                out.push_str(close);
                out.push('\n');
            }
            Statement::Function { open, body } => {
                out.push_str(&indent);
                out.push_str(open);
                out.push('\n');
                write_statements(body, depth + 1, resolve, out);
                out.push_str(&indent);
                out.push_str("}\n");
            }
            Statement::ChildInit {
                component,
                props,
                element,
                marker,
                events,
            } => {
                out.push_str(&format!("{}const __{} = {}\n", indent, marker, element));
                if resolve(component) == ChildLink::Absent {
                    // no init will run for the child: the instance root takes its handlers
                    out.push_str(&format!("{}if (__{}) {{\n", indent, marker));
                    for (event, handler) in events {
                        out.push_str(&format!("{}  __{}.on{} = {}\n", indent, marker, event, handler));
                    }
                    out.push_str(&format!("{}}}\n", indent));
                    continue;
                }
                out.push_str(&format!(
                    "{}if (__{}) init{}({}, 0, __{})\n",
                    indent,
                    marker,
                    component,
                    props.render(resolve),
                    marker
                ));
            }
        }
    }
}

fn collect_statement_children(
    statements: &[Statement],
    resolve: &dyn Fn(&str) -> ChildLink,
    out: &mut BTreeSet<String>,
) {
    for stmt in statements {
        match stmt {
            Statement::Line(code) => code.collect_children(resolve, out),
            Statement::Block { open, body, .. } => {
                open.collect_children(resolve, out);
                collect_statement_children(body, resolve, out);
            }
            Statement::Function { body, .. } => collect_statement_children(body, resolve, out),
            Statement::ChildInit {
                component, props, ..
            } => {
                if resolve(component) != ChildLink::Absent {
                    out.insert(component.clone());
                    props.collect_children(resolve, out);
                }
            }
        }
    }
}

fn referenced_children(statements: &[Statement], out: &mut BTreeSet<String>) {
    collect_statement_children(statements, &|_| ChildLink::Local, out);
}

// ═══════════════════════════════════════════════════════════════════════════════
// IMPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImportSpec {
    Default(String),
    Namespace(String),
    /// `imported as local`, or just the name when both match.
    Named { imported: String, local: String },
}

/// Import bindings grouped by source; adding the same binding twice is a
/// no-op, which is what merges imports across components of one module.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportSet {
    sources: IndexMap<String, BTreeSet<ImportSpec>>,
}

impl ImportSet {
    pub fn add(&mut self, source: &str, spec: ImportSpec) {
        self.sources.entry(source.to_string()).or_default().insert(spec);
    }

    pub fn add_named(&mut self, source: &str, name: &str) {
        self.add(
            source,
            ImportSpec::Named {
                imported: name.to_string(),
                local: name.to_string(),
            },
        );
    }

    pub fn merge(&mut self, other: &ImportSet) {
        for (source, specs) in &other.sources {
            for spec in specs {
                self.add(source, spec.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn contains_local(&self, local: &str) -> bool {
        self.sources.values().flatten().any(|spec| match spec {
            ImportSpec::Default(l) | ImportSpec::Namespace(l) => l == local,
            ImportSpec::Named { local: l, .. } => l == local,
        })
    }

    pub fn render(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (source, specs) in &self.sources {
            let mut default = None;
            let mut named = Vec::new();
            for spec in specs {
                match spec {
                    ImportSpec::Default(local) => default = Some(local.clone()),
                    ImportSpec::Namespace(local) => {
                        lines.push(format!("import * as {} from '{}'", local, source))
                    }
                    ImportSpec::Named { imported, local } if imported == local => {
                        named.push(local.clone())
                    }
                    ImportSpec::Named { imported, local } => {
                        named.push(format!("{} as {}", imported, local))
                    }
                }
            }
            let clause = match (default, named.is_empty()) {
                (Some(d), true) => d,
                (Some(d), false) => format!("{}, {{ {} }}", d, named.join(", ")),
                (None, false) => format!("{{ {} }}", named.join(", ")),
                (None, true) => continue,
            };
            lines.push(format!("import {} from '{}'", clause, source));
        }
        lines
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODULE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDeclaration {
    pub order: usize,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentModule {
    pub name: String,
    /// Scope lookup, props binding and declarations.
    pub prologue: Vec<Statement>,
    /// DOM bindings, child inits and user hooks.
    pub body: Vec<Statement>,
    /// Body of `render{name}`, ending in a `return`.
    pub render_body: Vec<Statement>,
    /// Declares signals or memos.
    pub has_state: bool,
    pub auto_hydrate: bool,
    pub imports: ImportSet,
    pub declarations: Vec<ModuleDeclaration>,
}

impl ComponentModule {
    fn children(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        referenced_children(&self.body, &mut out);
        referenced_children(&self.render_body, &mut out);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientModule {
    pub runtime_module: String,
    pub components: Vec<ComponentModule>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderedModule {
    pub code: String,
    /// Components that have an init function in `code`.
    pub emitted: Vec<String>,
}

/// Names the runtime module exports.
pub const RUNTIME_EXPORTS: [&str; 6] = [
    "createSignal",
    "createMemo",
    "createEffect",
    "onMount",
    "find",
    "hydrate",
];

impl ClientModule {
    pub fn new(runtime_module: &str) -> Self {
        ClientModule {
            runtime_module: runtime_module.to_string(),
            components: vec![],
        }
    }

    pub fn push(&mut self, component: ComponentModule) {
        self.components.push(component);
    }

    /// Child components referenced anywhere, before resolution.
    pub fn child_components(&self) -> BTreeSet<String> {
        let local: BTreeSet<&str> = self.components.iter().map(|c| c.name.as_str()).collect();
        self.components
            .iter()
            .flat_map(|c| c.children())
            .filter(|name| !local.contains(name.as_str()))
            .collect()
    }

    pub fn render(&self, resolve: &dyn Fn(&str) -> ChildLink) -> RenderedModule {
        let local: Vec<&str> = self.components.iter().map(|c| c.name.as_str()).collect();

        // emptiness depends on which local siblings survive, so iterate to a fixpoint
        let mut kept: Vec<bool> = vec![true; self.components.len()];
        loop {
            let kept_names: Vec<&str> = local
                .iter()
                .zip(&kept)
                .filter(|(_, k)| **k)
                .map(|(n, _)| *n)
                .collect();
            let link = |name: &str| -> ChildLink {
                if local.contains(&name) {
                    if kept_names.contains(&name) {
                        ChildLink::Local
                    } else {
                        ChildLink::Absent
                    }
                } else {
                    resolve(name)
                }
            };
            let next: Vec<bool> = self
                .components
                .iter()
                .map(|c| c.has_state || !resolve_statements(&c.body, &link).is_empty())
                .collect();
            if next == kept {
                break;
            }
            kept = next;
        }

        let kept_names: Vec<&str> = local
            .iter()
            .zip(&kept)
            .filter(|(_, k)| **k)
            .map(|(n, _)| *n)
            .collect();
        if kept_names.is_empty() {
            return RenderedModule::default();
        }
        let link = |name: &str| -> ChildLink {
            if local.contains(&name) {
                if kept_names.contains(&name) {
                    ChildLink::Local
                } else {
                    ChildLink::Absent
                }
            } else {
                resolve(name)
            }
        };

        let emitted: Vec<&ComponentModule> = self
            .components
            .iter()
            .zip(&kept)
            .filter(|(_, k)| **k)
            .map(|(c, _)| c)
            .collect();

        let mut functions = String::new();
        let mut children = BTreeSet::new();
        let mut user_imports = ImportSet::default();
        let mut declarations: Vec<&ModuleDeclaration> = Vec::new();
        for component in &emitted {
            let prologue = resolve_statements(&component.prologue, &link);
            let body = resolve_statements(&component.body, &link);
            collect_statement_children(&body, &link, &mut children);
            collect_statement_children(&component.render_body, &link, &mut children);

            functions.push_str(&format!(
                "export function init{}(__props = {{}}, __instanceIndex = 0, __parentScope = null) {{\n",
                component.name
            ));
            write_statements(&prologue, 1, &link, &mut functions);
            write_statements(&body, 1, &link, &mut functions);
            functions.push_str("}\n\n");

            functions.push_str(&format!(
                "export function render{}(__props = {{}}) {{\n",
                component.name
            ));
            write_statements(&component.render_body, 1, &link, &mut functions);
            functions.push_str("}\n\n");

            if component.auto_hydrate {
                functions.push_str(&format!(
                    "hydrate('{}', init{})\n\n",
                    component.name, component.name
                ));
            }

            user_imports.merge(&component.imports);
            for decl in &component.declarations {
                if !declarations.iter().any(|d| d.source == decl.source) {
                    declarations.push(decl);
                }
            }
        }
        declarations.sort_by_key(|d| d.order);

        let helpers = crate::codegen::helpers_for(&functions);

        let mut imports = ImportSet::default();
        let scan = format!(
            "{}\n{}",
            functions,
            helpers.iter().map(|(_, src)| *src).collect::<Vec<_>>().join("\n")
        );
        for name in RUNTIME_EXPORTS {
            if scan.contains(&format!("{}(", name)) && !user_imports.contains_local(name) {
                imports.add_named(&self.runtime_module, name);
            }
        }
        imports.merge(&user_imports);
        for child in &children {
            if let ChildLink::Module { filename, export } = link(child) {
                for prefix in ["init", "render"] {
                    imports.add(
                        &filename,
                        ImportSpec::Named {
                            imported: format!("{}{}", prefix, export),
                            local: format!("{}{}", prefix, child),
                        },
                    );
                }
            }
        }

        let mut sections: Vec<String> = Vec::new();
        let import_lines = imports.render();
        if !import_lines.is_empty() {
            sections.push(import_lines.join("\n"));
        }
        let decl_set: IndexSet<&str> = declarations.iter().map(|d| d.source.as_str()).collect();
        if !decl_set.is_empty() {
            sections.push(decl_set.into_iter().collect::<Vec<_>>().join("\n\n"));
        }
        if !helpers.is_empty() {
            sections.push(
                helpers
                    .iter()
                    .map(|(_, src)| src.trim_end())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            );
        }
        sections.push(functions.trim_end().to_string());

        RenderedModule {
            code: format!("{}\n", sections.join("\n\n")),
            emitted: kept_names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str, body: Vec<Statement>, has_state: bool) -> ComponentModule {
        ComponentModule {
            name: name.to_string(),
            prologue: vec![Statement::line(format!(
                "const __scope = find(__parentScope ?? document, '[data-bf-scope=\"{}\"]', __instanceIndex)",
                name
            ))],
            body,
            render_body: vec![Statement::line("return ``")],
            has_state,
            auto_hydrate: true,
            imports: ImportSet::default(),
            declarations: vec![],
        }
    }

    #[test]
    fn test_import_set_merges_duplicates() {
        let mut a = ImportSet::default();
        a.add_named("@barefootjs/dom", "createSignal");
        let mut b = ImportSet::default();
        b.add_named("@barefootjs/dom", "createSignal");
        b.add_named("@barefootjs/dom", "createEffect");
        a.merge(&b);
        assert_eq!(
            a.render(),
            vec!["import { createEffect, createSignal } from '@barefootjs/dom'".to_string()]
        );
    }

    #[test]
    fn test_absent_child_drops_init_and_render() {
        let mut code = Code::text("`<li>${");
        code.push_child_render("Badge", Code::text("{ n: 1 }"));
        code.push_str("}</li>`");
        assert_eq!(code.render(&|_| ChildLink::Absent), "`<li>${''}</li>`");
        assert_eq!(code.to_plain(), "`<li>${renderBadge({ n: 1 })}</li>`");
    }

    #[test]
    fn test_module_resolves_child_imports() {
        let mut module = ClientModule::new("@barefootjs/dom");
        module.push(component(
            "Parent",
            vec![Statement::ChildInit {
                component: "Child".to_string(),
                props: Code::text("{}"),
                element: "__scope".to_string(),
                marker: "p0".to_string(),
                events: vec![],
            }],
            false,
        ));
        assert_eq!(
            module.child_components().into_iter().collect::<Vec<_>>(),
            vec!["Child".to_string()]
        );

        let linked = module.render(&|_| ChildLink::Module {
            filename: "./Child-0badc0de.js".to_string(),
            export: "Child".to_string(),
        });
        assert!(linked
            .code
            .contains("import { initChild, renderChild } from './Child-0badc0de.js'"));
        assert!(linked.code.contains("  const __p0 = __scope\n  if (__p0) initChild({}, 0, __p0)\n"));
        assert!(linked.code.contains("import { find, hydrate } from '@barefootjs/dom'"));

        let absent = module.render(&|_| ChildLink::Absent);
        assert_eq!(absent.code, "");
        assert!(absent.emitted.is_empty());
    }

    #[test]
    fn test_empty_blocks_are_removed() {
        let stmts = vec![Statement::block(
            "if (x) {",
            vec![Statement::ChildInit {
                component: "Gone".to_string(),
                props: Code::text("{}"),
                element: "el".to_string(),
                marker: "p1".to_string(),
                events: vec![],
            }],
            "}",
        )];
        assert!(resolve_statements(&stmts, &|_| ChildLink::Absent).is_empty());

        let function = vec![Statement::Function {
            open: "function __bind_l0(__el, row, __i0) {".to_string(),
            body: vec![],
        }];
        let mut out = String::new();
        write_statements(&resolve_statements(&function, &|_| ChildLink::Absent), 0, &|_| ChildLink::Absent, &mut out);
        assert_eq!(out, "function __bind_l0(__el, row, __i0) {\n}\n");
    }

    #[test]
    fn test_static_child_receives_forwarded_events() {
        let mut module = ClientModule::new("@barefootjs/dom");
        module.push(component(
            "Parent",
            vec![Statement::ChildInit {
                component: "Btn".to_string(),
                props: Code::text("{ label: \"inc\" }"),
                element: "__bfPath(__scope, [1])".to_string(),
                marker: "p0".to_string(),
                events: vec![("click".to_string(), "() => setN(n() + 1)".to_string())],
            }],
            false,
        ));
        let rendered = module.render(&|_| ChildLink::Absent);
        assert_eq!(rendered.emitted, vec!["Parent".to_string()]);
        assert!(rendered.code.contains(
            "  const __p0 = __bfPath(__scope, [1])\n  if (__p0) {\n    __p0.onclick = () => setN(n() + 1)\n  }\n"
        ));
        assert!(!rendered.code.contains("initBtn"));
        assert!(!rendered.code.contains("renderBtn"));
    }
}
