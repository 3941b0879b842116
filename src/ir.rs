use serde::{Deserialize, Serialize};

use crate::analyzer::{
    AnalysisContext, HookDecl, ImportBinding, LocalDecl, MemoDecl, PropsShape, SignalDecl,
};
use crate::parse::SourceLocation;
use crate::transform::HandlerShape;

pub const IR_VERSION: &str = "1";

// ═══════════════════════════════════════════════════════════════════════════════
// IR NODES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum IRNode {
    Element(IRElement),
    Text(IRText),
    Expression(IRExpression),
    Conditional(IRConditional),
    Loop(IRLoop),
    Component(IRComponent),
    Fragment(IRFragment),
    Slot(IRSlot),
    IfStatement(IRIfStatement),
    Provider(IRProvider),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRElement {
    pub tag: String,
    pub attrs: Vec<IRAttribute>,
    pub events: Vec<IREvent>,
    pub ref_callback: Option<String>,
    pub children: Vec<IRNode>,
    /// `sN`, set when client code must reach this element.
    pub marker: Option<String>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRAttribute {
    pub name: String,
    pub value: AttrValue,
    /// Needs property sync (`el.value = ...`) in addition to the attribute.
    pub dom_property: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AttrValue {
    Static { value: String },
    /// Present without a value, `<input disabled />`.
    Boolean,
    Dynamic { expr: String, reactive: bool },
    Spread { expr: String, reactive: bool },
}

impl AttrValue {
    pub fn is_reactive(&self) -> bool {
        matches!(
            self,
            AttrValue::Dynamic { reactive: true, .. } | AttrValue::Spread { reactive: true, .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IREvent {
    /// DOM event name, `click`.
    pub name: String,
    /// Handler expression as written.
    pub handler: String,
    pub shape: HandlerShape,
}

impl IREvent {
    /// The handler as it is assigned in client code.
    pub fn emitted_handler(&self) -> String {
        self.shape.render(&self.handler)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRText {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRExpression {
    pub expr: String,
    pub reactive: bool,
    /// `tN` on reactive expressions.
    pub marker: Option<String>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRConditional {
    pub condition: String,
    pub reactive: bool,
    pub when_true: Box<IRNode>,
    pub when_false: Option<Box<IRNode>>,
    pub marker: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRLoop {
    pub source: String,
    /// Item parameter as written, possibly a destructuring pattern.
    pub item: String,
    pub index: Option<String>,
    pub key: Option<String>,
    pub template: Box<IRNode>,
    pub reactive: bool,
    /// Nesting level, 0 for the outermost loop.
    pub depth: u32,
    pub marker: String,
    /// Statements of a block-bodied callback that precede its `return`.
    pub prelude: Option<String>,
    pub loc: SourceLocation,
}

impl IRLoop {
    /// Index binding used by generated code; unnamed indices are scoped per level.
    pub fn index_name(&self) -> String {
        self.index
            .clone()
            .unwrap_or_else(|| format!("__i{}", self.depth))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRComponent {
    pub name: String,
    pub props: Vec<IRProp>,
    pub children: Vec<IRNode>,
    /// Children reference reactive state and are passed as a thunk.
    pub lazy_children: bool,
    pub key: Option<String>,
    /// `pN`, identifies the instance for the parent's init call.
    pub marker: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRProp {
    pub name: String,
    pub value: PropValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PropValue {
    Static { value: String },
    Boolean,
    Expression { expr: String, reactive: bool },
    Spread { expr: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRFragment {
    pub children: Vec<IRNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRSlot {
    pub name: String,
    /// Expression that yields the slot content, `children` or `props.children`.
    pub expr: String,
    pub marker: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRIfStatement {
    pub condition: String,
    pub reactive: bool,
    pub consequent: Box<IRNode>,
    pub alternate: Option<Box<IRNode>>,
    pub marker: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRProvider {
    pub context: String,
    pub value: String,
    pub children: Vec<IRNode>,
}

impl IRNode {
    pub fn empty() -> IRNode {
        IRNode::Fragment(IRFragment { children: vec![] })
    }

    pub fn is_element(&self) -> bool {
        matches!(self, IRNode::Element(_))
    }

    /// Whitespace-only text and empty fragments render nothing.
    pub fn is_blank(&self) -> bool {
        match self {
            IRNode::Text(t) => t.value.trim().is_empty(),
            IRNode::Fragment(f) => f.children.iter().all(IRNode::is_blank),
            _ => false,
        }
    }

    /// Whether the region or subtree reads reactive state anywhere.
    pub fn has_reactive_content(&self) -> bool {
        match self {
            IRNode::Element(el) => {
                el.attrs.iter().any(|a| a.value.is_reactive())
                    || el.children.iter().any(IRNode::has_reactive_content)
            }
            IRNode::Text(_) => false,
            IRNode::Expression(e) => e.reactive,
            IRNode::Conditional(c) => {
                c.reactive
                    || c.when_true.has_reactive_content()
                    || c.when_false.as_ref().is_some_and(|n| n.has_reactive_content())
            }
            IRNode::Loop(l) => l.reactive || l.template.has_reactive_content(),
            IRNode::Component(c) => {
                c.lazy_children
                    || c.props.iter().any(|p| {
                        matches!(p.value, PropValue::Expression { reactive: true, .. })
                    })
            }
            IRNode::Fragment(f) => f.children.iter().any(IRNode::has_reactive_content),
            IRNode::Slot(_) => false,
            IRNode::IfStatement(i) => {
                i.reactive
                    || i.consequent.has_reactive_content()
                    || i.alternate.as_ref().is_some_and(|n| n.has_reactive_content())
            }
            IRNode::Provider(p) => p.children.iter().any(IRNode::has_reactive_content),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT IR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRMetadata {
    pub file_path: String,
    pub has_client_directive: bool,
    pub props: PropsShape,
    pub signals: Vec<SignalDecl>,
    pub memos: Vec<MemoDecl>,
    pub effects: Vec<HookDecl>,
    pub mounts: Vec<HookDecl>,
    pub imports: Vec<ImportBinding>,
    pub local_declarations: Vec<LocalDecl>,
    pub module_declarations: Vec<LocalDecl>,
}

impl From<&AnalysisContext> for IRMetadata {
    fn from(ctx: &AnalysisContext) -> Self {
        IRMetadata {
            file_path: ctx.file_path.clone(),
            has_client_directive: ctx.has_client_directive,
            props: ctx.props.clone(),
            signals: ctx.signals.clone(),
            memos: ctx.memos.clone(),
            effects: ctx.effects.clone(),
            mounts: ctx.mounts.clone(),
            imports: ctx.imports.clone(),
            local_declarations: ctx.local_declarations.clone(),
            module_declarations: ctx.module_declarations.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentIR {
    pub version: String,
    pub name: String,
    pub is_default_export: bool,
    pub props_type: Option<String>,
    pub root: IRNode,
    pub metadata: IRMetadata,
}

impl ComponentIR {
    pub fn prop_names(&self) -> Vec<String> {
        self.metadata.props.declared_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ir_serializes_with_type_tag() {
        let node = IRNode::Expression(IRExpression {
            expr: "count()".to_string(),
            reactive: true,
            marker: Some("t0".to_string()),
            loc: SourceLocation::default(),
        });
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "expression");
        assert_eq!(json["reactive"], true);
        let back: IRNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_if_statement_tag_is_kebab() {
        let node = IRNode::IfStatement(IRIfStatement {
            condition: "x".to_string(),
            reactive: false,
            consequent: Box::new(IRNode::empty()),
            alternate: None,
            marker: "c0".to_string(),
        });
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "if-statement");
    }

    #[test]
    fn test_blank_detection() {
        assert!(IRNode::Text(IRText { value: "  \n".to_string() }).is_blank());
        assert!(IRNode::empty().is_blank());
    }

    #[test]
    fn test_loop_index_name_is_scoped_per_level() {
        let l = IRLoop {
            source: "rows()".to_string(),
            item: "row".to_string(),
            index: None,
            key: None,
            template: Box::new(IRNode::empty()),
            reactive: true,
            depth: 1,
            marker: "l1".to_string(),
            prelude: None,
            loc: SourceLocation::default(),
        };
        assert_eq!(l.index_name(), "__i1");
    }
}
