use crate::ir::{
    IRComponent, IRConditional, IRElement, IRExpression, IRFragment, IRIfStatement, IRLoop,
    IRNode, IRProvider, IRSlot, IRText,
};

/// The IrVisitor trait is the single read-only traversal over component IR.
///
/// Rules:
/// 1. Traversal order is fixed: document order, consequent before alternate.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call the matching `walk_*` function to continue into
///    children unless pruning is intended.
pub trait IrVisitor {
    fn visit_node(&mut self, node: &IRNode) {
        walk_node(self, node);
    }

    fn visit_children(&mut self, children: &[IRNode]) {
        walk_children(self, children);
    }

    fn visit_element(&mut self, element: &IRElement) {
        walk_element(self, element);
    }

    fn visit_text(&mut self, _text: &IRText) {}

    fn visit_expression(&mut self, _expression: &IRExpression) {}

    fn visit_conditional(&mut self, conditional: &IRConditional) {
        walk_conditional(self, conditional);
    }

    fn visit_loop(&mut self, lp: &IRLoop) {
        walk_loop(self, lp);
    }

    fn visit_component(&mut self, component: &IRComponent) {
        walk_component(self, component);
    }

    fn visit_fragment(&mut self, fragment: &IRFragment) {
        walk_fragment(self, fragment);
    }

    fn visit_slot(&mut self, _slot: &IRSlot) {}

    fn visit_if_statement(&mut self, stmt: &IRIfStatement) {
        walk_if_statement(self, stmt);
    }

    fn visit_provider(&mut self, provider: &IRProvider) {
        walk_provider(self, provider);
    }
}

pub fn walk_node<V: IrVisitor + ?Sized>(visitor: &mut V, node: &IRNode) {
    match node {
        IRNode::Element(el) => visitor.visit_element(el),
        IRNode::Text(t) => visitor.visit_text(t),
        IRNode::Expression(e) => visitor.visit_expression(e),
        IRNode::Conditional(c) => visitor.visit_conditional(c),
        IRNode::Loop(l) => visitor.visit_loop(l),
        IRNode::Component(c) => visitor.visit_component(c),
        IRNode::Fragment(f) => visitor.visit_fragment(f),
        IRNode::Slot(s) => visitor.visit_slot(s),
        IRNode::IfStatement(i) => visitor.visit_if_statement(i),
        IRNode::Provider(p) => visitor.visit_provider(p),
    }
}

pub fn walk_children<V: IrVisitor + ?Sized>(visitor: &mut V, children: &[IRNode]) {
    for node in children {
        visitor.visit_node(node);
    }
}

pub fn walk_element<V: IrVisitor + ?Sized>(visitor: &mut V, element: &IRElement) {
    visitor.visit_children(&element.children);
}

pub fn walk_conditional<V: IrVisitor + ?Sized>(visitor: &mut V, conditional: &IRConditional) {
    visitor.visit_node(&conditional.when_true);
    if let Some(alt) = &conditional.when_false {
        visitor.visit_node(alt);
    }
}

pub fn walk_loop<V: IrVisitor + ?Sized>(visitor: &mut V, lp: &IRLoop) {
    visitor.visit_node(&lp.template);
}

pub fn walk_component<V: IrVisitor + ?Sized>(visitor: &mut V, component: &IRComponent) {
    visitor.visit_children(&component.children);
}

pub fn walk_fragment<V: IrVisitor + ?Sized>(visitor: &mut V, fragment: &IRFragment) {
    visitor.visit_children(&fragment.children);
}

pub fn walk_if_statement<V: IrVisitor + ?Sized>(visitor: &mut V, stmt: &IRIfStatement) {
    visitor.visit_node(&stmt.consequent);
    if let Some(alt) = &stmt.alternate {
        visitor.visit_node(alt);
    }
}

pub fn walk_provider<V: IrVisitor + ?Sized>(visitor: &mut V, provider: &IRProvider) {
    visitor.visit_children(&provider.children);
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMON QUERIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Every expression string the IR carries, in document order. Used for
/// reference tracking (which declarations and children the tree touches).
pub fn collect_expressions(node: &IRNode) -> Vec<String> {
    let mut collector = ExpressionCollector::default();
    collector.visit_node(node);
    collector.exprs
}

#[derive(Default)]
struct ExpressionCollector {
    exprs: Vec<String>,
}

impl IrVisitor for ExpressionCollector {
    fn visit_element(&mut self, element: &IRElement) {
        for attr in &element.attrs {
            match &attr.value {
                crate::ir::AttrValue::Dynamic { expr, .. }
                | crate::ir::AttrValue::Spread { expr, .. } => self.exprs.push(expr.clone()),
                _ => {}
            }
        }
        for event in &element.events {
            self.exprs.push(event.handler.clone());
        }
        if let Some(r) = &element.ref_callback {
            self.exprs.push(r.clone());
        }
        walk_element(self, element);
    }

    fn visit_expression(&mut self, expression: &IRExpression) {
        self.exprs.push(expression.expr.clone());
    }

    fn visit_conditional(&mut self, conditional: &IRConditional) {
        self.exprs.push(conditional.condition.clone());
        walk_conditional(self, conditional);
    }

    fn visit_loop(&mut self, lp: &IRLoop) {
        self.exprs.push(lp.source.clone());
        if let Some(key) = &lp.key {
            self.exprs.push(key.clone());
        }
        walk_loop(self, lp);
    }

    fn visit_component(&mut self, component: &IRComponent) {
        for prop in &component.props {
            match &prop.value {
                crate::ir::PropValue::Expression { expr, .. }
                | crate::ir::PropValue::Spread { expr } => self.exprs.push(expr.clone()),
                _ => {}
            }
        }
        walk_component(self, component);
    }

    fn visit_slot(&mut self, slot: &IRSlot) {
        self.exprs.push(slot.expr.clone());
    }

    fn visit_if_statement(&mut self, stmt: &IRIfStatement) {
        self.exprs.push(stmt.condition.clone());
        walk_if_statement(self, stmt);
    }

    fn visit_provider(&mut self, provider: &IRProvider) {
        self.exprs.push(provider.value.clone());
        walk_provider(self, provider);
    }
}

/// Component names instantiated anywhere in the tree.
pub fn collect_component_names(node: &IRNode) -> Vec<String> {
    struct Names(Vec<String>);
    impl IrVisitor for Names {
        fn visit_component(&mut self, component: &IRComponent) {
            if !self.0.contains(&component.name) {
                self.0.push(component.name.clone());
            }
            walk_component(self, component);
        }
    }
    let mut names = Names(vec![]);
    names.visit_node(node);
    names.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{PropValue, IRProp};
    use crate::parse::SourceLocation;

    fn comp(name: &str, children: Vec<IRNode>) -> IRNode {
        IRNode::Component(IRComponent {
            name: name.to_string(),
            props: vec![IRProp {
                name: "value".to_string(),
                value: PropValue::Expression {
                    expr: "count()".to_string(),
                    reactive: true,
                },
            }],
            children,
            lazy_children: false,
            key: None,
            marker: "p0".to_string(),
            loc: SourceLocation::default(),
        })
    }

    #[test]
    fn test_collects_nested_component_names_once() {
        let tree = IRNode::Fragment(IRFragment {
            children: vec![comp("Card", vec![comp("Button", vec![])]), comp("Card", vec![])],
        });
        assert_eq!(collect_component_names(&tree), vec!["Card", "Button"]);
    }

    #[test]
    fn test_collects_prop_expressions() {
        let exprs = collect_expressions(&comp("Card", vec![]));
        assert_eq!(exprs, vec!["count()".to_string()]);
    }
}
