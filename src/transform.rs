use std::collections::{BTreeSet, HashSet};

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_span::GetSpan;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::parse::{parse_expression, span_text, unwrap_parens};

// ═══════════════════════════════════════════════════════════════════════════════
// STRING MASKING
// ═══════════════════════════════════════════════════════════════════════════════

/// Replaces the contents of string and template literals with spaces so that
/// textual scans only see code. `${...}` placeholders inside templates stay
/// visible. Byte offsets are preserved.
pub fn mask_strings(code: &str) -> String {
    let bytes = code.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    // template nesting: brace depth at which each open `${` returns to the template
    let mut template_stack: Vec<i32> = Vec::new();
    let mut depth = 0i32;
    let mut in_template = false;

    while i < bytes.len() {
        let c = bytes[i];
        if in_template {
            if c == b'\\' {
                mask(&mut out, i, 2);
                i += 2;
                continue;
            }
            if c == b'`' {
                in_template = false;
                i += 1;
                continue;
            }
            if c == b'$' && bytes.get(i + 1) == Some(&b'{') {
                template_stack.push(depth);
                depth += 1;
                in_template = false;
                i += 2;
                continue;
            }
            if c.is_ascii() {
                out[i] = b' ';
            }
            i += 1;
            continue;
        }
        match c {
            b'"' | b'\'' => {
                let quote = c;
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        mask(&mut out, i, 2);
                        i += 2;
                        continue;
                    }
                    if bytes[i].is_ascii() {
                        out[i] = b' ';
                    }
                    i += 1;
                }
                i += 1;
            }
            b'`' => {
                in_template = true;
                i += 1;
            }
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                if template_stack.last() == Some(&depth) {
                    template_stack.pop();
                    in_template = true;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| code.to_string())
}

fn mask(out: &mut [u8], start: usize, len: usize) {
    for b in out.iter_mut().skip(start).take(len) {
        if b.is_ascii() {
            *b = b' ';
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEPENDENCY EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref IDENT_RE: Regex = Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").unwrap();
    static ref ZERO_ARG_CALL_RE: Regex =
        Regex::new(r"([A-Za-z_$][A-Za-z0-9_$]*)\s*\(\s*\)").unwrap();
    static ref JS_KEYWORDS: HashSet<&'static str> = [
        "await", "break", "case", "catch", "class", "const", "continue", "default", "delete",
        "do", "else", "export", "extends", "false", "finally", "for", "function", "if",
        "import", "in", "instanceof", "let", "new", "null", "of", "return", "static", "super",
        "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void",
        "while", "yield", "async",
    ]
    .into_iter()
    .collect();
}

fn is_property_position(code: &[u8], start: usize) -> bool {
    let mut i = start;
    while i > 0 && code[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    // `a.b` and `a?.b` are properties, `...spread` is not
    i > 0 && code[i - 1] == b'.' && !(i >= 3 && &code[i - 3..i] == b"...")
}

/// Free-standing identifiers in `code`, ignoring string contents,
/// keywords, and property names after `.`.
pub fn extract_identifiers(code: &str) -> BTreeSet<String> {
    let masked = mask_strings(code);
    let bytes = masked.as_bytes();
    IDENT_RE
        .find_iter(&masked)
        .filter(|m| m.start() == 0 || !is_ident_byte(bytes[m.start() - 1]))
        .filter(|m| !bytes[m.start()].is_ascii_digit())
        .filter(|m| !is_property_position(bytes, m.start()))
        .map(|m| m.as_str())
        .filter(|name| !JS_KEYWORDS.contains(name))
        .map(str::to_string)
        .collect()
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Names called with zero arguments (`name()`), not counting method calls.
pub fn zero_arg_callees(code: &str) -> BTreeSet<String> {
    let masked = mask_strings(code);
    let bytes = masked.as_bytes();
    ZERO_ARG_CALL_RE
        .captures_iter(&masked)
        .filter_map(|cap| cap.get(1))
        .filter(|m| m.start() == 0 || !is_ident_byte(bytes[m.start() - 1]))
        .filter(|m| !is_property_position(bytes, m.start()))
        .map(|m| m.as_str().to_string())
        .filter(|name| !JS_KEYWORDS.contains(name.as_str()))
        .collect()
}

/// Inputs to reactivity classification for one component.
#[derive(Debug, Clone, Default)]
pub struct ReactiveScope {
    /// Signal getters and memo names.
    pub getters: HashSet<String>,
    /// Whole-props-object parameter; its member reads stay live.
    pub props_object: Option<String>,
}

impl ReactiveScope {
    pub fn is_reactive(&self, code: &str) -> bool {
        if zero_arg_callees(code)
            .iter()
            .any(|name| self.getters.contains(name))
        {
            return true;
        }
        match &self.props_object {
            Some(props) => reads_member_of(code, props),
            None => false,
        }
    }

    pub fn dependencies(&self, code: &str) -> Vec<String> {
        zero_arg_callees(code)
            .into_iter()
            .filter(|name| self.getters.contains(name))
            .collect()
    }
}

/// `object.x`, `object?.x` or `object[...]` outside string literals.
pub fn reads_member_of(code: &str, object: &str) -> bool {
    let masked = mask_strings(code);
    let bytes = masked.as_bytes();
    IDENT_RE
        .find_iter(&masked)
        .filter(|m| m.as_str() == object)
        .filter(|m| m.start() == 0 || !is_ident_byte(bytes[m.start() - 1]))
        .filter(|m| !is_property_position(bytes, m.start()))
        .any(|m| {
            let rest = masked[m.end()..].trim_start();
            (rest.starts_with('.') && !rest.starts_with("..."))
                || rest.starts_with("?.")
                || rest.starts_with('[')
        })
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

/// `onClick` -> `click`, `onDoubleClick` -> `dblclick`.
pub fn event_name(prop: &str) -> Option<String> {
    let rest = prop.strip_prefix("on")?;
    if !rest.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    let lower = rest.to_ascii_lowercase();
    Some(match lower.as_str() {
        "doubleclick" => "dblclick".to_string(),
        _ => lower,
    })
}

pub fn is_event_prop(name: &str) -> bool {
    event_name(name).is_some()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HandlerShape {
    /// Re-emitted as written.
    Plain,
    /// `(params) => cond && action()` rewritten to an `if` guard.
    Guarded {
        params: String,
        condition: String,
        action: String,
    },
    /// A `&&` body whose condition falls outside the supported grammar.
    Ambiguous,
}

impl HandlerShape {
    pub fn render(&self, handler: &str) -> String {
        match self {
            HandlerShape::Guarded {
                params,
                condition,
                action,
            } => format!("{} => {{ if ({}) {} }}", params, condition, action),
            _ => handler.to_string(),
        }
    }
}

pub fn decompose_handler(handler: &str) -> HandlerShape {
    let allocator = Allocator::default();
    let Some(expr) = parse_expression(&allocator, handler) else {
        return HandlerShape::Plain;
    };
    let arrow = match unwrap_parens(&expr) {
        Expression::ArrowFunctionExpression(arrow) => arrow,
        Expression::LogicalExpression(logical) if logical.operator == LogicalOperator::And => {
            // `cond && fn` evaluated at bind time is never a valid handler
            return HandlerShape::Ambiguous;
        }
        _ => return HandlerShape::Plain,
    };
    let body = match arrow.body.statements.as_slice() {
        [Statement::ExpressionStatement(stmt)] => &stmt.expression,
        _ => return HandlerShape::Plain,
    };
    let Expression::LogicalExpression(logical) = unwrap_parens(body) else {
        return HandlerShape::Plain;
    };
    if logical.operator != LogicalOperator::And {
        return HandlerShape::Plain;
    }
    let action = unwrap_parens(&logical.right);
    if !matches!(action, Expression::CallExpression(_)) || !is_supported_condition(&logical.left) {
        return HandlerShape::Ambiguous;
    }
    let params = span_text(handler, arrow.params.span);
    let params = if params.starts_with('(') {
        params.to_string()
    } else {
        format!("({})", params)
    };
    let params = if arrow.r#async {
        format!("async {}", params)
    } else {
        params
    };
    HandlerShape::Guarded {
        params,
        condition: span_text(handler, logical.left.span()).to_string(),
        action: span_text(handler, action.span()).to_string(),
    }
}

/// Comparisons, negation, `&&`/`||`, identifiers, member reads, calls, literals.
fn is_supported_condition(expr: &Expression) -> bool {
    match unwrap_parens(expr) {
        Expression::Identifier(_)
        | Expression::StaticMemberExpression(_)
        | Expression::ComputedMemberExpression(_)
        | Expression::CallExpression(_)
        | Expression::BooleanLiteral(_)
        | Expression::NumericLiteral(_)
        | Expression::StringLiteral(_)
        | Expression::NullLiteral(_) => true,
        Expression::UnaryExpression(unary) => {
            unary.operator == UnaryOperator::LogicalNot && is_supported_condition(&unary.argument)
        }
        Expression::LogicalExpression(logical) => {
            matches!(logical.operator, LogicalOperator::And | LogicalOperator::Or)
                && is_supported_condition(&logical.left)
                && is_supported_condition(&logical.right)
        }
        Expression::BinaryExpression(binary) => {
            matches!(
                binary.operator,
                BinaryOperator::Equality
                    | BinaryOperator::Inequality
                    | BinaryOperator::StrictEquality
                    | BinaryOperator::StrictInequality
                    | BinaryOperator::LessThan
                    | BinaryOperator::LessEqualThan
                    | BinaryOperator::GreaterThan
                    | BinaryOperator::GreaterEqualThan
            ) && is_supported_condition(&binary.left)
                && is_supported_condition(&binary.right)
        }
        _ => false,
    }
}

const TEXT_METHODS: &[&str] = &[
    "toString",
    "toFixed",
    "toPrecision",
    "toLocaleString",
    "join",
    "toUpperCase",
    "toLowerCase",
    "trim",
    "padStart",
    "padEnd",
];

/// Whether an expression child can only render as a text node (or nothing),
/// so the elements after it keep their child index.
pub fn renders_text(code: &str) -> bool {
    let allocator = Allocator::default();
    parse_expression(&allocator, code).is_some_and(|expr| is_text_expression(&expr))
}

fn is_text_expression(expr: &Expression) -> bool {
    match unwrap_parens(expr) {
        Expression::StringLiteral(_)
        | Expression::NumericLiteral(_)
        | Expression::BigIntLiteral(_)
        | Expression::BooleanLiteral(_)
        | Expression::NullLiteral(_)
        | Expression::TemplateLiteral(_)
        | Expression::BinaryExpression(_)
        | Expression::UnaryExpression(_)
        | Expression::UpdateExpression(_) => true,
        Expression::StaticMemberExpression(member) => member.property.name.as_str() == "length",
        Expression::ConditionalExpression(cond) => {
            is_text_expression(&cond.consequent) && is_text_expression(&cond.alternate)
        }
        Expression::CallExpression(call) => match &call.callee {
            Expression::Identifier(id) => matches!(id.name.as_str(), "String" | "Number"),
            Expression::StaticMemberExpression(member) => {
                TEXT_METHODS.contains(&member.property.name.as_str())
            }
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(getters: &[&str], props: Option<&str>) -> ReactiveScope {
        ReactiveScope {
            getters: getters.iter().map(|s| s.to_string()).collect(),
            props_object: props.map(str::to_string),
        }
    }

    #[test]
    fn test_mask_strings_keeps_template_placeholders() {
        let masked = mask_strings("'count()' + `a ${count()} b`");
        assert!(!masked.starts_with("'count()"));
        assert!(masked.contains("${count()}"));
        assert_eq!(masked.len(), "'count()' + `a ${count()} b`".len());
    }

    #[test]
    fn test_zero_arg_callees_skips_methods_and_strings() {
        let callees = zero_arg_callees("count() + item.get() + f(x) + \"doubled()\"");
        assert!(callees.contains("count"));
        assert!(!callees.contains("get"));
        assert!(!callees.contains("f"));
        assert!(!callees.contains("doubled"));
    }

    #[test]
    fn test_reactive_iff_getter_called_without_args() {
        let s = scope(&["count", "doubled"], None);
        assert!(s.is_reactive("count() + 1"));
        assert!(s.is_reactive("`${doubled()}`"));
        assert!(!s.is_reactive("count"));
        assert!(!s.is_reactive("count(1)"));
        assert!(!s.is_reactive("label.toUpperCase()"));
    }

    #[test]
    fn test_destructured_field_is_not_reactive() {
        let s = scope(&["count"], None);
        assert!(!s.is_reactive("label"));
        assert!(!s.is_reactive("props.label"));
    }

    #[test]
    fn test_props_object_access_is_reactive() {
        let s = scope(&[], Some("props"));
        assert!(s.is_reactive("props.label"));
        assert!(s.is_reactive("props?.label"));
        assert!(!s.is_reactive("other.props"));
        assert!(!s.is_reactive("{ ...props }"));
    }

    #[test]
    fn test_extract_identifiers() {
        let ids = extract_identifiers("const x = fmt(code, 'title') + obj.prop");
        assert!(ids.contains("fmt"));
        assert!(ids.contains("code"));
        assert!(ids.contains("obj"));
        assert!(!ids.contains("prop"));
        assert!(!ids.contains("title"));
        assert!(!ids.contains("const"));
    }

    #[test]
    fn test_event_name() {
        assert_eq!(event_name("onClick").as_deref(), Some("click"));
        assert_eq!(event_name("onDoubleClick").as_deref(), Some("dblclick"));
        assert_eq!(event_name("online"), None);
        assert_eq!(event_name("class"), None);
    }

    #[test]
    fn test_decompose_guarded_handler() {
        let shape = decompose_handler("(e) => e.key === 'Enter' && submit()");
        assert_eq!(
            shape,
            HandlerShape::Guarded {
                params: "(e)".to_string(),
                condition: "e.key === 'Enter'".to_string(),
                action: "submit()".to_string(),
            }
        );
        assert_eq!(
            shape.render("ignored"),
            "(e) => { if (e.key === 'Enter') submit() }"
        );
    }

    #[test]
    fn test_decompose_negation_and_combination() {
        let shape = decompose_handler("() => !busy() && (ready() || force) && run(1)");
        match shape {
            HandlerShape::Guarded { condition, action, .. } => {
                assert_eq!(condition, "!busy() && (ready() || force)");
                assert_eq!(action, "run(1)");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decompose_unsupported_condition_is_ambiguous() {
        assert_eq!(
            decompose_handler("() => (n = next()) && run()"),
            HandlerShape::Ambiguous
        );
        assert_eq!(decompose_handler("() => ok && (x = 1)"), HandlerShape::Ambiguous);
        assert_eq!(decompose_handler("enabled && handle"), HandlerShape::Ambiguous);
    }

    #[test]
    fn test_plain_handler() {
        assert_eq!(
            decompose_handler("() => setCount((n) => n + 1)"),
            HandlerShape::Plain
        );
        assert_eq!(decompose_handler("handleAdd"), HandlerShape::Plain);
    }

    #[test]
    fn test_guarded_async_handler_stays_async() {
        let shape = decompose_handler("async () => ready && submit()");
        assert_eq!(
            shape.render("ignored"),
            "async () => { if (ready) submit() }"
        );
        match decompose_handler("async (e) => e.ok && save(e)") {
            HandlerShape::Guarded { params, .. } => assert_eq!(params, "async (e)"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_renders_text() {
        assert!(renders_text("'a'"));
        assert!(renders_text("n + 1"));
        assert!(renders_text("`${a} b`"));
        assert!(renders_text("items.length"));
        assert!(renders_text("price.toFixed(2)"));
        assert!(renders_text("ok ? 'yes' : 'no'"));
        assert!(!renders_text("icon"));
        assert!(!renders_text("props.badge"));
        assert!(!renders_text("ok ? 'yes' : icon"));
        assert!(!renders_text("render()"));
    }
}
