//! Element addressing for client code.
//!
//! Every IR node that client code must reach gets a target: a stable path of
//! element-child indices from its frame root when the markup above it has a
//! fixed shape, or a scoped marker lookup when it does not (after a region,
//! inside a region, or inside another component's children).

use indexmap::IndexMap;
use serde::Serialize;

use crate::ir::{ComponentIR, IRComponent, IRElement, IRNode};
use crate::transform::renders_text;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "indices", rename_all = "kebab-case")]
pub enum ElementPath {
    /// The frame root itself.
    Root,
    /// `root.children[a].children[b]...`
    Children(Vec<usize>),
    /// No static path; looked up by marker at runtime.
    Scoped,
}

impl ElementPath {
    fn from_indices(indices: Option<Vec<usize>>) -> Self {
        match indices {
            Some(v) if v.is_empty() => ElementPath::Root,
            Some(v) => ElementPath::Children(v),
            None => ElementPath::Scoped,
        }
    }

    pub fn is_static(&self) -> bool {
        !matches!(self, ElementPath::Scoped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    /// Element carrying `data-bf="sN"`.
    Element,
    /// Reactive text that is the only content of its element; `path`
    /// addresses that element.
    Content,
    /// Reactive text preceded by `<!--bf:tN-->`.
    TextMarker,
    /// Conditional, loop or slot content between start/end comments.
    Region,
    /// Root element of a child component instance.
    Instance,
}

/// Where a lookup starts: the component scope or the current loop item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "marker", rename_all = "kebab-case")]
pub enum Frame {
    Scope,
    Loop(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationTarget {
    pub marker: String,
    pub kind: TargetKind,
    pub path: ElementPath,
    pub frame: Frame,
    /// Sits inside another component's children; its DOM marker is
    /// qualified with the owning component's name.
    pub qualified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationPlan {
    pub component: String,
    /// Root is not a single element and renders inside a
    /// `display:contents` scope wrapper.
    pub wrapped: bool,
    pub targets: IndexMap<String, HydrationTarget>,
}

impl HydrationPlan {
    pub fn target(&self, marker: &str) -> Option<&HydrationTarget> {
        self.targets.get(marker)
    }

    /// Marker value as it appears in the markup.
    pub fn dom_marker(&self, marker: &str) -> String {
        match self.targets.get(marker) {
            Some(t) if t.qualified => format!("{}:{}", self.component, marker),
            _ => marker.to_string(),
        }
    }

    pub fn is_content(&self, marker: &str) -> bool {
        self.targets
            .get(marker)
            .is_some_and(|t| t.kind == TargetKind::Content)
    }

    /// Instances without a static path get a `<!--bf:pN-->` anchor.
    pub fn needs_anchor(&self, marker: &str) -> bool {
        self.targets
            .get(marker)
            .is_some_and(|t| t.kind == TargetKind::Instance && !t.path.is_static())
    }
}

/// Whether a root (component or loop item) needs a wrapper element.
pub fn needs_wrapper(node: &IRNode) -> bool {
    !node.is_element()
}

pub fn resolve_paths(ir: &ComponentIR) -> HydrationPlan {
    let mut resolver = PathResolver {
        plan: HydrationPlan {
            component: ir.name.clone(),
            wrapped: needs_wrapper(&ir.root),
            targets: IndexMap::new(),
        },
    };
    let scope = Walk {
        frame: Frame::Scope,
        qualified: false,
    };
    match &ir.root {
        IRNode::Element(el) => resolver.element(el, Some(vec![]), &scope),
        root => resolver.children(std::slice::from_ref(root), Some(vec![]), &scope),
    }
    resolver.plan
}

#[derive(Clone)]
struct Walk {
    frame: Frame,
    qualified: bool,
}

struct PathResolver {
    plan: HydrationPlan,
}

/// Children as rendered: fragments and providers contribute their own
/// children in place.
pub fn flatten_children(children: &[IRNode]) -> Vec<&IRNode> {
    let mut out = Vec::new();
    for child in children {
        match child {
            IRNode::Fragment(f) => out.extend(flatten_children(&f.children)),
            IRNode::Provider(p) => out.extend(flatten_children(&p.children)),
            other => out.push(other),
        }
    }
    out
}

/// The reactive expression marker when it is the only rendered content.
pub fn sole_reactive_text(children: &[IRNode]) -> Option<&str> {
    let flat = flatten_children(children);
    let mut visible = flat.iter().filter(|n| !n.is_blank());
    match (visible.next(), visible.next()) {
        (Some(IRNode::Expression(e)), None) => e.marker.as_deref(),
        _ => None,
    }
}

impl PathResolver {
    fn add(&mut self, marker: &str, kind: TargetKind, path: ElementPath, walk: &Walk) {
        self.plan.targets.insert(
            marker.to_string(),
            HydrationTarget {
                marker: marker.to_string(),
                kind,
                path,
                frame: walk.frame.clone(),
                qualified: walk.qualified,
            },
        );
    }

    fn element(&mut self, el: &IRElement, path: Option<Vec<usize>>, walk: &Walk) {
        if let Some(marker) = &el.marker {
            self.add(marker, TargetKind::Element, ElementPath::from_indices(path.clone()), walk);
        }
        self.children(&el.children, path, walk);
    }

    fn children(&mut self, children: &[IRNode], parent: Option<Vec<usize>>, walk: &Walk) {
        let content = match (&parent, walk.qualified) {
            (Some(_), false) => sole_reactive_text(children),
            _ => None,
        };
        let mut stable = parent.is_some();
        let mut index = 0usize;
        let child_path = |stable: bool, index: usize| -> Option<Vec<usize>> {
            match (&parent, stable) {
                (Some(p), true) => {
                    let mut v = p.clone();
                    v.push(index);
                    Some(v)
                }
                _ => None,
            }
        };

        for node in flatten_children(children) {
            match node {
                IRNode::Element(el) => {
                    let path = child_path(stable, index);
                    index += 1;
                    self.element(el, path, walk);
                }
                IRNode::Component(c) => {
                    let path = child_path(stable, index);
                    index += 1;
                    self.component(c, path, walk);
                }
                IRNode::Expression(e) => match &e.marker {
                    Some(marker) if content == Some(marker.as_str()) => {
                        let path = ElementPath::from_indices(parent.clone());
                        self.add(marker, TargetKind::Content, path, walk);
                    }
                    Some(marker) => {
                        self.add(marker, TargetKind::TextMarker, ElementPath::Scoped, walk);
                    }
                    // may render elements of its own
                    None if !renders_text(&e.expr) => stable = false,
                    None => {}
                },
                IRNode::Text(_) => {}
                IRNode::Slot(s) => {
                    self.add(&s.marker, TargetKind::Region, ElementPath::Scoped, walk);
                    stable = false;
                }
                IRNode::Conditional(c) => {
                    self.add(&c.marker, TargetKind::Region, ElementPath::Scoped, walk);
                    stable = false;
                    self.children(std::slice::from_ref(&c.when_true), None, walk);
                    if let Some(alt) = &c.when_false {
                        self.children(std::slice::from_ref(alt), None, walk);
                    }
                }
                IRNode::IfStatement(stmt) => {
                    self.add(&stmt.marker, TargetKind::Region, ElementPath::Scoped, walk);
                    stable = false;
                    self.children(std::slice::from_ref(&stmt.consequent), None, walk);
                    if let Some(alt) = &stmt.alternate {
                        self.children(std::slice::from_ref(alt), None, walk);
                    }
                }
                IRNode::Loop(l) => {
                    self.add(&l.marker, TargetKind::Region, ElementPath::Scoped, walk);
                    stable = false;
                    let item = Walk {
                        frame: Frame::Loop(l.marker.clone()),
                        qualified: walk.qualified,
                    };
                    match l.template.as_ref() {
                        IRNode::Element(el) => self.element(el, Some(vec![]), &item),
                        other => self.children(std::slice::from_ref(other), Some(vec![]), &item),
                    }
                }
                IRNode::Fragment(_) | IRNode::Provider(_) => {}
            }
        }
    }

    fn component(&mut self, c: &IRComponent, path: Option<Vec<usize>>, walk: &Walk) {
        self.add(&c.marker, TargetKind::Instance, ElementPath::from_indices(path), walk);
        let inner = Walk {
            frame: walk.frame.clone(),
            qualified: true,
        };
        self.children(&c.children, None, &inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze_component;
    use crate::jsx_lowerer::build_component_ir;

    fn plan(src: &str) -> HydrationPlan {
        let ctx = analyze_component(src, "Test.tsx", None);
        let ir = build_component_ir(&ctx).ir.expect("ir");
        resolve_paths(&ir)
    }

    const HEADER: &str = "\"use client\"\nimport { createSignal } from '@barefootjs/dom'\n";

    #[test]
    fn test_root_button_is_path_resolved() {
        let p = plan(&format!(
            "{}export function C() {{ const [count, setCount] = createSignal(0)\n return <button onClick={{() => setCount(count() + 1)}}>{{count()}}</button> }}",
            HEADER
        ));
        assert!(!p.wrapped);
        assert_eq!(p.target("s0").unwrap().path, ElementPath::Root);
        let text = p.target("t0").unwrap();
        assert_eq!(text.kind, TargetKind::Content);
        assert_eq!(text.path, ElementPath::Root);
    }

    #[test]
    fn test_paths_ignore_sibling_dynamism() {
        let a = plan(&format!(
            "{}export function C() {{ const [on, setOn] = createSignal(false)\n return <div><p>a</p><span>b</span><i onClick={{() => setOn(true)}}>x</i></div> }}",
            HEADER
        ));
        let b = plan(&format!(
            "{}export function C() {{ const [on, setOn] = createSignal(false)\n return <div><p>a</p><span class={{on() ? 'x' : ''}}>b</span><i onClick={{() => setOn(true)}}>x</i></div> }}",
            HEADER
        ));
        assert_eq!(a.target("s0").unwrap().path, ElementPath::Children(vec![2]));
        assert_eq!(b.target("s1").unwrap().path, ElementPath::Children(vec![2]));
        assert_eq!(b.target("s0").unwrap().path, ElementPath::Children(vec![1]));
    }

    #[test]
    fn test_siblings_after_region_are_scoped() {
        let p = plan(&format!(
            "{}export function C() {{ const [on, setOn] = createSignal(false)\n return <div>{{on() && <b>on</b>}}<button onClick={{() => setOn(!on())}}>t</button></div> }}",
            HEADER
        ));
        assert_eq!(p.target("c0").unwrap().kind, TargetKind::Region);
        assert_eq!(p.target("s0").unwrap().path, ElementPath::Scoped);
    }

    #[test]
    fn test_text_with_siblings_uses_marker() {
        let p = plan(&format!(
            "{}export function C() {{ const [n] = createSignal(0)\n return <p>Count: {{n()}}</p> }}",
            HEADER
        ));
        assert_eq!(p.target("t0").unwrap().kind, TargetKind::TextMarker);
    }

    #[test]
    fn test_component_children_are_qualified() {
        let p = plan(&format!(
            "{}export function C() {{ const [n] = createSignal(0)\n return <div><Card><span>{{n()}}</span></Card><Card /></div> }}",
            HEADER
        ));
        let inner = p.target("t0").unwrap();
        assert!(inner.qualified);
        assert_eq!(p.dom_marker("t0"), "C:t0");
        assert_eq!(p.target("p0").unwrap().path, ElementPath::Children(vec![0]));
        assert_eq!(p.target("p1").unwrap().path, ElementPath::Children(vec![1]));
    }

    #[test]
    fn test_loop_items_are_own_frame() {
        let p = plan(&format!(
            "{}export function C() {{ const [rows, setRows] = createSignal([])\n return <ul>{{rows().map((r) => <li key={{r.id}}><button onClick={{() => setRows([])}}>x</button></li>)}}</ul> }}",
            HEADER
        ));
        let button = p.target("s0").unwrap();
        assert_eq!(button.frame, Frame::Loop("l0".to_string()));
        assert_eq!(button.path, ElementPath::Children(vec![0]));
    }

    #[test]
    fn test_fragment_root_is_wrapped() {
        let p = plan(&format!(
            "{}export function C() {{ const [n] = createSignal(0)\n return <><h1>T</h1><p onClick={{() => n()}}>x</p></> }}",
            HEADER
        ));
        assert!(p.wrapped);
        assert_eq!(p.target("s0").unwrap().path, ElementPath::Children(vec![1]));
    }

    #[test]
    fn test_static_markup_expression_scopes_later_siblings() {
        let p = plan(&format!(
            "{}export function C({{ badge }}) {{ const [n, setN] = createSignal(0)\n return <div><p>{{'a' + 1}}</p>{{badge}}<button onClick={{() => setN(n() + 1)}}>x</button></div> }}",
            HEADER
        ));
        assert_eq!(p.target("s0").unwrap().path, ElementPath::Scoped);

        let text_only = plan(&format!(
            "{}export function C({{ label }}) {{ const [n, setN] = createSignal(0)\n return <div>{{label.length}}<button onClick={{() => setN(n() + 1)}}>x</button></div> }}",
            HEADER
        ));
        assert_eq!(
            text_only.target("s0").unwrap().path,
            ElementPath::Children(vec![0])
        );
    }
}
