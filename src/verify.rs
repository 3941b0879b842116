//! Path verification.
//!
//! Renders the component's static shell, parses it the way a browser
//! would, and checks that every precomputed element path lands on the node
//! it addresses. Parser-driven reshaping (a `<div>` inside a `<p>`, a bare
//! `<tr>`) is the usual cause of a mismatch.

use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tendril::TendrilSink;
use tracing::debug;

use crate::diagnostic::{Diagnostic, BF_PATH_MISMATCH};
use crate::hydration::{ElementPath, Frame, HydrationPlan, TargetKind};
use crate::ir::ComponentIR;
use crate::template::render_shell;

fn attr(handle: &Handle, name: &str) -> Option<String> {
    match &handle.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| a.name.local.as_ref() == name)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

fn element_children(handle: &Handle) -> Vec<Handle> {
    handle
        .children
        .borrow()
        .iter()
        .filter(|c| matches!(c.data, NodeData::Element { .. }))
        .cloned()
        .collect()
}

fn find_scope(handle: &Handle, component: &str) -> Option<Handle> {
    if attr(handle, "data-bf-scope").as_deref() == Some(component) {
        return Some(handle.clone());
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(|child| find_scope(child, component))
}

fn follow(root: &Handle, indices: &[usize]) -> Option<Handle> {
    let mut node = root.clone();
    for &i in indices {
        node = element_children(&node).get(i)?.clone();
    }
    Some(node)
}

/// BF006 warnings for every static path that does not resolve. Targets in
/// loop items are skipped; the shell renders no items.
pub fn verify_paths(ir: &ComponentIR, plan: &HydrationPlan) -> Vec<Diagnostic> {
    let shell = render_shell(ir, plan);
    let file = &ir.metadata.file_path;
    let mismatch = |message: String| {
        Diagnostic::warning(BF_PATH_MISMATCH, message, file, 0, 0).in_component(&ir.name)
    };

    let dom = match html5ever::parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut shell.as_bytes())
    {
        Ok(dom) => dom,
        Err(e) => return vec![mismatch(format!("Static shell could not be parsed: {}", e))],
    };
    let Some(scope) = find_scope(&dom.document, &ir.name) else {
        return vec![mismatch(format!(
            "Rendered markup has no element with data-bf-scope=\"{}\"",
            ir.name
        ))];
    };

    let mut diagnostics = Vec::new();
    for target in plan.targets.values() {
        if target.frame != Frame::Scope {
            continue;
        }
        let indices: &[usize] = match &target.path {
            ElementPath::Root => &[],
            ElementPath::Children(indices) => indices,
            ElementPath::Scoped => continue,
        };
        let found = follow(&scope, indices);
        let ok = match (&found, target.kind) {
            (None, _) => false,
            (Some(node), TargetKind::Element) => {
                attr(node, "data-bf").as_deref() == Some(plan.dom_marker(&target.marker).as_str())
            }
            (Some(node), TargetKind::Instance) => attr(node, "data-bf-scope").is_some(),
            (Some(_), _) => true,
        };
        if !ok {
            diagnostics.push(mismatch(format!(
                "Element path {:?} for `{}` does not resolve in the rendered markup",
                indices, target.marker
            )));
        }
    }
    debug!(component = %ir.name, checked = plan.targets.len(), mismatches = diagnostics.len(), "verified element paths");
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze_component;
    use crate::hydration::resolve_paths;
    use crate::jsx_lowerer::build_component_ir;

    fn verify(src: &str) -> Vec<Diagnostic> {
        let ctx = analyze_component(src, "Test.tsx", None);
        let ir = build_component_ir(&ctx).ir.expect("ir");
        let plan = resolve_paths(&ir);
        verify_paths(&ir, &plan)
    }

    #[test]
    fn test_well_formed_paths_verify() {
        let diagnostics = verify(
            r#""use client"
import { createSignal } from '@barefootjs/dom'
export function C() {
  const [n, setN] = createSignal(0)
  return <div><h1>Title</h1><p>Count: {n()}</p><button onClick={() => setN(n() + 1)}>+</button><Badge /></div>
}"#,
        );
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn test_parser_reshaping_is_reported() {
        // `<div>` closes the open `<p>`, shifting the button
        let diagnostics = verify(
            r#""use client"
import { createSignal } from '@barefootjs/dom'
export function C() {
  const [n, setN] = createSignal(0)
  return <section><p><div>x</div><button onClick={() => setN(n() + 1)}>+</button></p></section>
}"#,
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, BF_PATH_MISMATCH);
        assert!(!diagnostics[0].is_error());
    }
}
