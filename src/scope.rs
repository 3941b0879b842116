use oxc_allocator::Allocator;
use std::collections::HashSet;

use crate::analyzer::AnalysisContext;
use crate::diagnostic::{Diagnostic, BF_UNRESOLVED_REACTIVE_CALL};
use crate::ir::{AttrValue, ComponentIR, IRComponent, IRConditional, IRElement, IRExpression,
    IRIfStatement, IRLoop, IRSlot, PropValue};
use crate::parse::{parse_expression, scan_calls, SourceLocation};
use crate::transform::extract_identifiers;
use crate::visitor::{walk_conditional, walk_component, walk_element, walk_if_statement, IrVisitor};

lazy_static::lazy_static! {
    pub static ref RUNTIME_GLOBALS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        // Runtime primitives
        s.insert("createSignal");
        s.insert("createMemo");
        s.insert("createEffect");
        s.insert("onMount");
        s.insert("onCleanup");
        s.insert("untrack");

        // Standard JS Globals
        s.insert("Math");
        s.insert("console");
        s.insert("JSON");
        s.insert("Date");
        s.insert("String");
        s.insert("Number");
        s.insert("Boolean");
        s.insert("Array");
        s.insert("Object");
        s.insert("Promise");
        s.insert("Map");
        s.insert("Set");
        s.insert("Symbol");
        s.insert("Error");
        s.insert("undefined");
        s.insert("NaN");
        s.insert("Infinity");
        s.insert("parseInt");
        s.insert("parseFloat");
        s.insert("crypto");
        s.insert("performance");
        s.insert("requestAnimationFrame");
        s.insert("queueMicrotask");
        s.insert("structuredClone");
        s.insert("globalThis");
        s.insert("Intl");
        s.insert("BigInt");
        s.insert("RegExp");
        s.insert("WeakMap");
        s.insert("WeakSet");
        s.insert("Reflect");
        s.insert("Proxy");
        s.insert("isNaN");
        s.insert("isFinite");
        s.insert("encodeURI");
        s.insert("decodeURI");
        s.insert("encodeURIComponent");
        s.insert("decodeURIComponent");

        s.insert("window"); // Browser environment
        s.insert("self");
        s.insert("document");
        s.insert("navigator");
        s.insert("location");
        s.insert("history");
        s.insert("screen");
        s.insert("localStorage");
        s.insert("sessionStorage");
        s.insert("fetch");
        s.insert("setTimeout");
        s.insert("clearTimeout");
        s.insert("setInterval");
        s.insert("clearInterval");
        s.insert("requestIdleCallback");
        s.insert("cancelAnimationFrame");
        s.insert("getComputedStyle");
        s.insert("matchMedia");
        s.insert("alert");
        s.insert("confirm");
        s.insert("prompt");
        s.insert("print");
        s.insert("close");
        s.insert("atob");
        s.insert("btoa");
        s.insert("URL");
        s.insert("URLSearchParams");
        s.insert("AbortController");
        s.insert("FormData");
        s.insert("Headers");
        s.insert("Request");
        s.insert("Response");
        s.insert("TextEncoder");
        s.insert("TextDecoder");
        s.insert("Event");
        s.insert("CustomEvent");
        s.insert("IntersectionObserver");
        s.insert("ResizeObserver");
        s.insert("MutationObserver");
        s
    };
}

/// Flags zero-argument calls whose callee is not declared anywhere the
/// component can see. Such calls are almost always a misspelled signal
/// getter and would otherwise fail only at runtime.
pub struct ScopeValidator {
    pub allowed_locals: HashSet<String>,
    pub file_path: String,
    pub component: String,
}

impl ScopeValidator {
    pub fn new(file_path: String, component: String) -> Self {
        Self {
            allowed_locals: HashSet::new(),
            file_path,
            component,
        }
    }

    pub fn for_component(ctx: &AnalysisContext) -> Self {
        let mut validator = Self::new(ctx.file_path.clone(), ctx.name.clone());
        validator.allowed_locals = ctx.known_names();
        validator
    }

    pub fn add_locals(&mut self, locals: Vec<String>) {
        for local in locals {
            self.allowed_locals.insert(local);
        }
    }

    fn is_known(&self, name: &str, extra_locals: &[String]) -> bool {
        self.allowed_locals.contains(name)
            || RUNTIME_GLOBALS.contains(name)
            || extra_locals.iter().any(|l| l == name)
    }

    /// Check one snippet. Unparseable snippets are skipped; the parser
    /// already reported them on the component source.
    pub fn verify_snippet(
        &self,
        code: &str,
        extra_locals: &[String],
        loc: SourceLocation,
    ) -> Vec<Diagnostic> {
        let allocator = Allocator::default();
        let Some(expr) = parse_expression(&allocator, code) else {
            return vec![];
        };
        let scan = scan_calls(&expr);
        let mut reported: Vec<&str> = Vec::new();
        let mut diagnostics = Vec::new();
        for call in &scan.calls {
            if call.argument_count != 0
                || self.is_known(&call.callee, extra_locals)
                || scan.bindings.contains(&call.callee)
                || reported.contains(&call.callee.as_str())
            {
                continue;
            }
            reported.push(&call.callee);
            diagnostics.push(
                Diagnostic::error(
                    BF_UNRESOLVED_REACTIVE_CALL,
                    format!(
                        "`{}()` is not a signal, memo, or declared function in '{}'",
                        call.callee, self.component
                    ),
                    &self.file_path,
                    loc.line,
                    loc.column,
                )
                .in_component(&self.component)
                .with_hint(format!(
                    "Declare it, e.g. `const [{}, set{}] = createSignal(...)`, or import it",
                    call.callee,
                    capitalize(&call.callee)
                )),
            );
        }
        diagnostics
    }

    /// Check every expression the IR carries, with loop bindings in scope.
    pub fn validate_ir(&self, ir: &ComponentIR) -> Vec<Diagnostic> {
        let mut walker = ScopeWalker {
            validator: self,
            loop_locals: vec![],
            loc: SourceLocation {
                line: 1,
                column: 1,
            },
            diagnostics: vec![],
        };
        walker.visit_node(&ir.root);
        for memo in &ir.metadata.memos {
            let loc = SourceLocation {
                line: memo.line,
                column: 1,
            };
            walker.check(&memo.body, loc);
        }
        for hook in ir.metadata.effects.iter().chain(&ir.metadata.mounts) {
            let loc = SourceLocation {
                line: hook.line,
                column: 1,
            };
            walker.check(&hook.body, loc);
        }
        walker.diagnostics
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

struct ScopeWalker<'v> {
    validator: &'v ScopeValidator,
    loop_locals: Vec<String>,
    loc: SourceLocation,
    diagnostics: Vec<Diagnostic>,
}

impl ScopeWalker<'_> {
    fn check(&mut self, code: &str, loc: SourceLocation) {
        let found = self.validator.verify_snippet(code, &self.loop_locals, loc);
        for diag in found {
            if !self.diagnostics.iter().any(|d| d.message == diag.message) {
                self.diagnostics.push(diag);
            }
        }
    }
}

impl IrVisitor for ScopeWalker<'_> {
    fn visit_element(&mut self, element: &IRElement) {
        self.loc = element.loc;
        for attr in &element.attrs {
            if let AttrValue::Dynamic { expr, .. } | AttrValue::Spread { expr, .. } = &attr.value {
                self.check(expr, element.loc);
            }
        }
        for event in &element.events {
            self.check(&event.handler, element.loc);
        }
        if let Some(r) = &element.ref_callback {
            self.check(r, element.loc);
        }
        walk_element(self, element);
    }

    fn visit_expression(&mut self, expression: &IRExpression) {
        self.check(&expression.expr, expression.loc);
    }

    fn visit_conditional(&mut self, conditional: &IRConditional) {
        self.check(&conditional.condition, conditional.loc);
        walk_conditional(self, conditional);
    }

    fn visit_loop(&mut self, lp: &IRLoop) {
        self.check(&lp.source, lp.loc);
        let before = self.loop_locals.len();
        self.loop_locals.extend(extract_identifiers(&lp.item));
        self.loop_locals.push(lp.index_name());
        if let Some(prelude) = &lp.prelude {
            self.loop_locals.extend(declared_in(prelude));
        }
        if let Some(key) = &lp.key {
            self.check(key, lp.loc);
        }
        self.visit_node(&lp.template);
        self.loop_locals.truncate(before);
    }

    fn visit_component(&mut self, component: &IRComponent) {
        for prop in &component.props {
            if let PropValue::Expression { expr, .. } | PropValue::Spread { expr } = &prop.value {
                self.check(expr, component.loc);
            }
        }
        walk_component(self, component);
    }

    fn visit_slot(&mut self, slot: &IRSlot) {
        let loc = self.loc;
        self.check(&slot.expr, loc);
    }

    fn visit_if_statement(&mut self, stmt: &IRIfStatement) {
        let loc = self.loc;
        self.check(&stmt.condition, loc);
        walk_if_statement(self, stmt);
    }
}

/// Names bound by `const`/`let` statements in a loop callback prelude.
fn declared_in(prelude: &str) -> Vec<String> {
    lazy_static::lazy_static! {
        static ref DECL: regex::Regex =
            regex::Regex::new(r"\b(?:const|let|var|function)\s+([A-Za-z_$][\w$]*)").unwrap();
    }
    DECL.captures_iter(prelude)
        .map(|c| c[1].to_string())
        .collect()
}
