//! Parser/AST adapter.
//!
//! Wraps `oxc_parser` for component sources and code snippets and exposes the
//! small set of queries the analyzer and emitters share: call lookup, function
//! bodies, parameter bindings, identifier usage, and TypeScript stripping for
//! snippets that are copied verbatim into client JS.

use std::collections::{BTreeSet, HashSet};

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE LOCATIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// Byte offset to 1-based line/column.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i as u32 + 1);
            }
        }
        LineIndex { starts }
    }

    pub fn location(&self, offset: u32) -> SourceLocation {
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        SourceLocation {
            line: line as u32 + 1,
            column: offset - self.starts[line] + 1,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

pub fn source_type_for(path: &str) -> SourceType {
    let is_plain_ts = [".ts", ".mts", ".cts"].iter().any(|ext| path.ends_with(ext));
    if is_plain_ts {
        if let Ok(source_type) = SourceType::from_path(path) {
            return source_type.with_module(true);
        }
    }
    snippet_source_type()
}

/// Snippets are always parsed permissively as module TSX.
pub fn snippet_source_type() -> SourceType {
    SourceType::default()
        .with_typescript(true)
        .with_jsx(true)
        .with_module(true)
}

pub struct ParsedModule<'a> {
    pub program: Program<'a>,
    pub errors: Vec<String>,
}

pub fn parse_module<'a>(allocator: &'a Allocator, source: &'a str, path: &str) -> ParsedModule<'a> {
    let ret = Parser::new(allocator, source, source_type_for(path)).parse();
    let mut errors: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
    if ret.panicked && errors.is_empty() {
        errors.push("parser aborted".to_string());
    }
    ParsedModule {
        program: ret.program,
        errors,
    }
}

/// Syntax errors in emitted client JS, parsed as a plain ES module.
pub fn js_syntax_errors(code: &str) -> Vec<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::mjs()).parse();
    let mut errors: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
    if ret.panicked && errors.is_empty() {
        errors.push("parser aborted".to_string());
    }
    errors
}

pub fn parse_expression<'a>(allocator: &'a Allocator, code: &'a str) -> Option<Expression<'a>> {
    Parser::new(allocator, code, snippet_source_type())
        .parse_expression()
        .ok()
}

pub fn span_text(source: &str, span: Span) -> &str {
    source
        .get(span.start as usize..span.end as usize)
        .unwrap_or("")
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUERIES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn unwrap_parens<'b, 'a>(mut expr: &'b Expression<'a>) -> &'b Expression<'a> {
    loop {
        match expr {
            Expression::ParenthesizedExpression(p) => expr = &p.expression,
            Expression::TSAsExpression(e) => expr = &e.expression,
            Expression::TSSatisfiesExpression(e) => expr = &e.expression,
            _ => return expr,
        }
    }
}

pub fn is_jsx(expr: &Expression) -> bool {
    matches!(
        unwrap_parens(expr),
        Expression::JSXElement(_) | Expression::JSXFragment(_)
    )
}

pub fn is_null(expr: &Expression) -> bool {
    match unwrap_parens(expr) {
        Expression::NullLiteral(_) => true,
        Expression::Identifier(id) => id.name.as_str() == "undefined",
        _ => false,
    }
}

/// Whether JSX appears anywhere inside the expression.
pub fn contains_jsx(expr: &Expression) -> bool {
    let mut finder = JsxFinder { found: false };
    finder.visit_expression(expr);
    finder.found
}

struct JsxFinder {
    found: bool,
}

impl<'a> Visit<'a> for JsxFinder {
    fn visit_jsx_element(&mut self, _it: &JSXElement<'a>) {
        self.found = true;
    }

    fn visit_jsx_fragment(&mut self, _it: &JSXFragment<'a>) {
        self.found = true;
    }
}

pub fn callee_name<'b>(call: &'b CallExpression) -> Option<&'b str> {
    match &call.callee {
        Expression::Identifier(id) => Some(id.name.as_str()),
        _ => None,
    }
}

/// `name(...)` as an expression statement or initializer.
pub fn as_named_call<'b, 'a>(expr: &'b Expression<'a>, name: &str) -> Option<&'b CallExpression<'a>> {
    match unwrap_parens(expr) {
        Expression::CallExpression(call) if callee_name(call) == Some(name) => Some(&**call),
        _ => None,
    }
}

pub fn argument_text<'s>(source: &'s str, call: &CallExpression, index: usize) -> Option<&'s str> {
    call.arguments
        .get(index)
        .map(|arg| span_text(source, arg.span()))
}

/// The JSX-bearing expression a function body evaluates to, if it has one
/// top-level `return` (or is an expression-bodied arrow).
pub fn returned_expression<'b, 'a>(body: &'b FunctionBody<'a>) -> Option<&'b Expression<'a>> {
    body.statements.iter().find_map(|stmt| match stmt {
        Statement::ReturnStatement(ret) => ret.argument.as_ref(),
        Statement::ExpressionStatement(e) if body.statements.len() == 1 => Some(&e.expression),
        _ => None,
    })
}

/// Whether the function body produces JSX on any top-level return path.
pub fn body_returns_jsx(body: &FunctionBody) -> bool {
    body.statements.iter().any(|stmt| match stmt {
        Statement::ReturnStatement(ret) => ret.argument.as_ref().is_some_and(contains_jsx),
        Statement::ExpressionStatement(e) => body.statements.len() == 1 && contains_jsx(&e.expression),
        Statement::IfStatement(if_stmt) => statement_returns_jsx(&if_stmt.consequent),
        _ => false,
    })
}

fn statement_returns_jsx(stmt: &Statement) -> bool {
    match stmt {
        Statement::ReturnStatement(ret) => ret.argument.as_ref().is_some_and(contains_jsx),
        Statement::BlockStatement(block) => block.body.iter().any(statement_returns_jsx),
        _ => false,
    }
}

pub fn binding_names(pattern: &BindingPattern) -> Vec<String> {
    let mut names = Vec::new();
    collect_binding_names(pattern, &mut names);
    names
}

fn collect_binding_names(pattern: &BindingPattern, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => names.push(id.name.to_string()),
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_names(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_names(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for elem in arr.elements.iter().flatten() {
                collect_binding_names(elem, names);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_names(&rest.argument, names);
            }
        }
        BindingPattern::AssignmentPattern(assign) => collect_binding_names(&assign.left, names),
    }
}

pub fn property_key_name(key: &PropertyKey) -> Option<String> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.to_string()),
        PropertyKey::StringLiteral(s) => Some(s.value.to_string()),
        _ => None,
    }
}

/// Splits a parameter's source text into the binding and its type
/// annotation at the first top-level `:`; a trailing `= default` is dropped
/// from the annotation.
pub fn split_type_annotation(param_text: &str) -> (&str, Option<&str>) {
    let mut depth = 0i32;
    for (i, c) in param_text.char_indices() {
        match c {
            '{' | '[' | '(' | '<' => depth += 1,
            '}' | ']' | ')' | '>' => depth -= 1,
            ':' if depth == 0 => {
                let binding = param_text[..i].trim_end().trim_end_matches('?');
                let mut annotation = param_text[i + 1..].trim();
                if let Some(eq) = top_level_assignment(annotation) {
                    annotation = annotation[..eq].trim();
                }
                return (binding, Some(annotation));
            }
            _ => {}
        }
    }
    (param_text, None)
}

fn top_level_assignment(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    for i in 0..bytes.len() {
        match bytes[i] {
            b'{' | b'[' | b'(' | b'<' => depth += 1,
            b'}' | b']' | b')' => depth -= 1,
            b'>' if i == 0 || bytes[i - 1] != b'=' => depth -= 1,
            b'=' if depth == 0
                && bytes.get(i + 1) != Some(&b'>')
                && bytes.get(i + 1) != Some(&b'=') =>
            {
                return Some(i)
            }
            _ => {}
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIER USAGE
// ═══════════════════════════════════════════════════════════════════════════════

/// Every identifier read anywhere in the program, including component tags
/// and type references.
pub fn referenced_identifiers(program: &Program) -> HashSet<String> {
    let mut collector = ReferenceCollector::default();
    collector.visit_program(program);
    collector.names
}

#[derive(Default)]
struct ReferenceCollector {
    names: HashSet<String>,
}

impl<'a> Visit<'a> for ReferenceCollector {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.names.insert(ident.name.to_string());
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CALL SITES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub callee: String,
    pub argument_count: usize,
    pub span: Span,
}

/// Calls whose callee is a bare identifier, together with the names the
/// snippet binds itself (parameters, local declarations).
pub struct CallScan {
    pub calls: Vec<CallSite>,
    pub bindings: BTreeSet<String>,
}

pub fn scan_calls(expr: &Expression) -> CallScan {
    let mut scanner = CallScanner {
        calls: Vec::new(),
        bindings: BTreeSet::new(),
    };
    scanner.visit_expression(expr);
    CallScan {
        calls: scanner.calls,
        bindings: scanner.bindings,
    }
}

struct CallScanner {
    calls: Vec<CallSite>,
    bindings: BTreeSet<String>,
}

impl<'a> Visit<'a> for CallScanner {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Some(name) = callee_name(call) {
            self.calls.push(CallSite {
                callee: name.to_string(),
                argument_count: call.arguments.len(),
                span: call.span,
            });
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.bindings.insert(ident.name.to_string());
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPESCRIPT STRIPPING
// ═══════════════════════════════════════════════════════════════════════════════

/// Removes type-only syntax from a snippet that is copied into client JS.
/// Formatting of the remaining code is preserved; input that does not parse
/// or has no type syntax is returned unchanged.
pub fn strip_types(code: &str) -> String {
    let allocator = Allocator::default();
    let trimmed = code.trim();
    let mut stripper = TypeStripper::default();
    match Parser::new(&allocator, trimmed, snippet_source_type()).parse_expression() {
        Ok(expr) => stripper.visit_expression(&expr),
        Err(_) => {
            let ret = Parser::new(&allocator, trimmed, snippet_source_type()).parse();
            if !ret.errors.is_empty() {
                return code.to_string();
            }
            stripper.visit_program(&ret.program);
        }
    }
    if stripper.removals.is_empty() {
        return trimmed.to_string();
    }
    apply_removals(trimmed, stripper.removals)
}

#[derive(Default)]
struct TypeStripper {
    removals: Vec<(u32, u32)>,
}

impl TypeStripper {
    fn remove(&mut self, start: u32, end: u32) {
        if start < end {
            self.removals.push((start, end));
        }
    }
}

impl<'a> Visit<'a> for TypeStripper {
    fn visit_ts_type_annotation(&mut self, it: &TSTypeAnnotation<'a>) {
        // annotation spans may or may not include the colon; the
        // optional-marker and colon are widened in `apply_removals`
        self.remove(it.span.start, it.span.end);
    }

    fn visit_ts_type_parameter_declaration(&mut self, it: &TSTypeParameterDeclaration<'a>) {
        self.remove(it.span.start, it.span.end);
    }

    fn visit_ts_type_parameter_instantiation(&mut self, it: &TSTypeParameterInstantiation<'a>) {
        self.remove(it.span.start, it.span.end);
    }

    fn visit_ts_as_expression(&mut self, it: &TSAsExpression<'a>) {
        self.remove(it.expression.span().end, it.span.end);
        self.visit_expression(&it.expression);
    }

    fn visit_ts_satisfies_expression(&mut self, it: &TSSatisfiesExpression<'a>) {
        self.remove(it.expression.span().end, it.span.end);
        self.visit_expression(&it.expression);
    }

    fn visit_ts_non_null_expression(&mut self, it: &TSNonNullExpression<'a>) {
        self.remove(it.expression.span().end, it.span.end);
        self.visit_expression(&it.expression);
    }

    fn visit_ts_interface_declaration(&mut self, it: &TSInterfaceDeclaration<'a>) {
        self.remove(it.span.start, it.span.end);
    }

    fn visit_ts_type_alias_declaration(&mut self, it: &TSTypeAliasDeclaration<'a>) {
        self.remove(it.span.start, it.span.end);
    }
}

/// A snippet as it is written into client JS: type syntax stripped when the
/// snippet can contain any.
pub fn emit_js(code: &str) -> String {
    let maybe_typed = code.contains(':')
        || code.contains('<')
        || code.contains('!')
        || code.contains(" as ")
        || code.contains("satisfies")
        || code.contains("interface ")
        || code.contains("type ");
    if maybe_typed {
        strip_types(code)
    } else {
        code.trim().to_string()
    }
}

fn apply_removals(code: &str, mut removals: Vec<(u32, u32)>) -> String {
    removals.sort();
    let bytes = code.as_bytes();
    let mut out = String::with_capacity(code.len());
    let mut cursor = 0usize;
    for (start, end) in removals {
        let mut start = start as usize;
        let end = end as usize;
        if start < cursor {
            if end <= cursor {
                continue;
            }
            start = cursor;
        }
        // widen backwards over `?:` / `:` that belong to an annotation
        let mut probe = start;
        while probe > cursor && bytes[probe - 1].is_ascii_whitespace() {
            probe -= 1;
        }
        if bytes.get(start) != Some(&b':') && probe > cursor && bytes[probe - 1] == b':' {
            probe -= 1;
            start = probe;
        }
        while start > cursor && bytes[start - 1].is_ascii_whitespace() && bytes.get(start) == Some(&b':') {
            start -= 1;
        }
        if start > cursor && bytes[start - 1] == b'?' && bytes.get(start).is_some_and(|b| *b == b':' || b.is_ascii_whitespace()) {
            start -= 1;
        }
        out.push_str(&code[cursor..start]);
        cursor = end.min(code.len());
    }
    out.push_str(&code[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("ab\ncd\n\nx");
        assert_eq!(index.location(0), SourceLocation { line: 1, column: 1 });
        assert_eq!(index.location(4), SourceLocation { line: 2, column: 2 });
        assert_eq!(index.location(7), SourceLocation { line: 4, column: 1 });
    }

    #[test]
    fn test_parse_module_reports_errors() {
        let allocator = Allocator::default();
        let parsed = parse_module(&allocator, "export function A( { return <div/> }", "A.tsx");
        assert!(!parsed.errors.is_empty());
    }

    #[test]
    fn test_split_type_annotation() {
        assert_eq!(
            split_type_annotation("{ a, b: c }: Props"),
            ("{ a, b: c }", Some("Props"))
        );
        assert_eq!(split_type_annotation("props"), ("props", None));
        assert_eq!(
            split_type_annotation("props: { a: number } = {}"),
            ("props", Some("{ a: number }"))
        );
    }

    #[test]
    fn test_scan_calls_collects_bindings() {
        let allocator = Allocator::default();
        let expr = parse_expression(&allocator, "(x) => count() + f(x)").unwrap();
        let scan = scan_calls(&expr);
        let names: Vec<_> = scan.calls.iter().map(|c| c.callee.as_str()).collect();
        assert_eq!(names, vec!["count", "f"]);
        assert!(scan.bindings.contains("x"));
    }

    #[test]
    fn test_strip_types_expression() {
        assert_eq!(strip_types("(n: number) => n + 1"), "(n) => n + 1");
        assert_eq!(strip_types("value as string"), "value");
        assert_eq!(strip_types("el!.focus()"), "el.focus()");
        assert_eq!(strip_types("count() + 1"), "count() + 1");
    }

    #[test]
    fn test_strip_types_statement() {
        assert_eq!(
            strip_types("function add(a: number, b?: number): number { return a + (b ?? 0) }"),
            "function add(a, b) { return a + (b ?? 0) }"
        );
    }

    #[test]
    fn test_contains_jsx() {
        let allocator = Allocator::default();
        let expr = parse_expression(&allocator, "ok ? <a/> : null").unwrap();
        assert!(contains_jsx(&expr));
        assert!(!is_jsx(&expr));
    }

    #[test]
    fn test_js_syntax_errors() {
        assert!(js_syntax_errors("import { a } from './a.js'\nexport function f() { return a }\n").is_empty());
        assert!(!js_syntax_errors("const icon = <b>i</b>").is_empty());
        assert!(!js_syntax_errors("const x: number = 1").is_empty());
    }
}
