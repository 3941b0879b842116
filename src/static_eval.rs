//! Static expression evaluator.
//!
//! Evaluates a narrow, explicit subset of expressions at compile time so the
//! marked template can carry server-rendered defaults: literals, arrays of
//! primitives, template literals, `+`, `!`, unary `-`, ternaries, `.length`
//! and `.join()`. Anything else is not static.

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_syntax::operator::{BinaryOperator, UnaryOperator};
use std::collections::HashMap;

use crate::parse::{parse_expression, unwrap_parens};

#[derive(Debug, Clone, PartialEq)]
pub enum StaticValue {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Undefined,
    Array(Vec<StaticValue>),
}

impl StaticValue {
    pub fn truthy(&self) -> bool {
        match self {
            StaticValue::Str(s) => !s.is_empty(),
            StaticValue::Num(n) => *n != 0.0 && !n.is_nan(),
            StaticValue::Bool(b) => *b,
            StaticValue::Null | StaticValue::Undefined => false,
            StaticValue::Array(_) => true,
        }
    }

    /// `String(value)` semantics.
    pub fn to_js_string(&self) -> String {
        match self {
            StaticValue::Str(s) => s.clone(),
            StaticValue::Num(n) => format_number(*n),
            StaticValue::Bool(b) => b.to_string(),
            StaticValue::Null => "null".to_string(),
            StaticValue::Undefined => "undefined".to_string(),
            StaticValue::Array(items) => join(items, ","),
        }
    }

    /// Text a JSX interpolation renders: `null`, `undefined` and booleans
    /// render nothing.
    pub fn to_display(&self) -> String {
        match self {
            StaticValue::Null | StaticValue::Undefined | StaticValue::Bool(_) => String::new(),
            StaticValue::Array(items) => items.iter().map(StaticValue::to_display).collect(),
            other => other.to_js_string(),
        }
    }
}

fn join(items: &[StaticValue], sep: &str) -> String {
    items
        .iter()
        .map(|item| match item {
            StaticValue::Null | StaticValue::Undefined => String::new(),
            other => other.to_js_string(),
        })
        .collect::<Vec<_>>()
        .join(sep)
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Values known at compile time, by binding name. Signal getters are bound
/// separately because they are read through a zero-argument call.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    values: HashMap<String, StaticValue>,
    getters: HashMap<String, StaticValue>,
}

impl StaticEnv {
    pub fn bind(&mut self, name: impl Into<String>, value: StaticValue) {
        self.values.insert(name.into(), value);
    }

    pub fn bind_getter(&mut self, name: impl Into<String>, value: StaticValue) {
        self.getters.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&StaticValue> {
        self.values.get(name)
    }
}

/// Try to evaluate an expression. Returns None if any part of it cannot be
/// statically resolved.
pub fn static_eval(expr: &str, env: &StaticEnv) -> Option<StaticValue> {
    let trimmed = expr.trim().trim_end_matches(';');
    if trimmed.is_empty() {
        return None;
    }
    let allocator = Allocator::default();
    let parsed = parse_expression(&allocator, trimmed)?;
    eval(&parsed, env)
}

/// Evaluate and render as interpolated text.
pub fn static_text(expr: &str, env: &StaticEnv) -> Option<String> {
    static_eval(expr, env).map(|v| v.to_display())
}

fn eval(expr: &Expression, env: &StaticEnv) -> Option<StaticValue> {
    match unwrap_parens(expr) {
        Expression::StringLiteral(s) => Some(StaticValue::Str(s.value.to_string())),
        Expression::NumericLiteral(n) => Some(StaticValue::Num(n.value)),
        Expression::BooleanLiteral(b) => Some(StaticValue::Bool(b.value)),
        Expression::NullLiteral(_) => Some(StaticValue::Null),
        Expression::Identifier(id) => match id.name.as_str() {
            "undefined" => Some(StaticValue::Undefined),
            name => env.values.get(name).cloned(),
        },
        Expression::TemplateLiteral(tpl) => {
            let mut out = String::new();
            for (i, quasi) in tpl.quasis.iter().enumerate() {
                let text = quasi.value.cooked.as_ref().unwrap_or(&quasi.value.raw);
                out.push_str(text.as_str());
                if let Some(e) = tpl.expressions.get(i) {
                    out.push_str(&eval(e, env)?.to_js_string());
                }
            }
            Some(StaticValue::Str(out))
        }
        Expression::ArrayExpression(arr) => arr
            .elements
            .iter()
            .map(|el| match el {
                ArrayExpressionElement::SpreadElement(_) => None,
                ArrayExpressionElement::Elision(_) => Some(StaticValue::Undefined),
                other => eval(other.as_expression()?, env),
            })
            .collect::<Option<Vec<_>>>()
            .map(StaticValue::Array),
        Expression::BinaryExpression(bin) if bin.operator == BinaryOperator::Addition => {
            let left = eval(&bin.left, env)?;
            let right = eval(&bin.right, env)?;
            Some(add(left, right))
        }
        Expression::UnaryExpression(unary) => {
            let arg = eval(&unary.argument, env)?;
            match unary.operator {
                UnaryOperator::LogicalNot => Some(StaticValue::Bool(!arg.truthy())),
                UnaryOperator::UnaryNegation => match arg {
                    StaticValue::Num(n) => Some(StaticValue::Num(-n)),
                    _ => None,
                },
                _ => None,
            }
        }
        Expression::ConditionalExpression(cond) => {
            if eval(&cond.test, env)?.truthy() {
                eval(&cond.consequent, env)
            } else {
                eval(&cond.alternate, env)
            }
        }
        Expression::StaticMemberExpression(member) if member.property.name.as_str() == "length" => {
            match eval(&member.object, env)? {
                StaticValue::Str(s) => Some(StaticValue::Num(s.encode_utf16().count() as f64)),
                StaticValue::Array(items) => Some(StaticValue::Num(items.len() as f64)),
                _ => None,
            }
        }
        Expression::CallExpression(call) => eval_call(call, env),
        _ => None,
    }
}

fn eval_call(call: &CallExpression, env: &StaticEnv) -> Option<StaticValue> {
    match &call.callee {
        Expression::Identifier(id) if call.arguments.is_empty() => {
            env.getters.get(id.name.as_str()).cloned()
        }
        Expression::StaticMemberExpression(member) if member.property.name.as_str() == "join" => {
            let StaticValue::Array(items) = eval(&member.object, env)? else {
                return None;
            };
            let sep = match call.arguments.first() {
                None => ",".to_string(),
                Some(arg) => eval(arg.as_expression()?, env)?.to_js_string(),
            };
            Some(StaticValue::Str(join(&items, &sep)))
        }
        _ => None,
    }
}

fn add(left: StaticValue, right: StaticValue) -> StaticValue {
    match (&left, &right) {
        (StaticValue::Num(a), StaticValue::Num(b)) => StaticValue::Num(a + b),
        (StaticValue::Str(_), _)
        | (_, StaticValue::Str(_))
        | (StaticValue::Array(_), _)
        | (_, StaticValue::Array(_)) => {
            StaticValue::Str(left.to_js_string() + &right.to_js_string())
        }
        _ => StaticValue::Num(to_number(&left) + to_number(&right)),
    }
}

fn to_number(value: &StaticValue) -> f64 {
    match value {
        StaticValue::Num(n) => *n,
        StaticValue::Bool(true) => 1.0,
        StaticValue::Bool(false) | StaticValue::Null => 0.0,
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_literals() {
        let env = StaticEnv::default();
        assert_eq!(static_text("\"Hello\"", &env), Some("Hello".to_string()));
        assert_eq!(static_text("'World'", &env), Some("World".to_string()));
    }

    #[test]
    fn test_binding_resolution() {
        let mut env = StaticEnv::default();
        env.bind("title", StaticValue::Str("Home".into()));
        env.bind_getter("count", StaticValue::Num(0.0));

        assert_eq!(static_text("title", &env), Some("Home".to_string()));
        assert_eq!(static_text("count()", &env), Some("0".to_string()));
        assert_eq!(static_text("count() + 1", &env), Some("1".to_string()));
        assert_eq!(static_text("other()", &env), None);
    }

    #[test]
    fn test_concatenation() {
        let mut env = StaticEnv::default();
        env.bind("title", StaticValue::Str("Home".into()));
        assert_eq!(
            static_text("\"Docs | \" + title", &env),
            Some("Docs | Home".to_string())
        );
    }

    #[test]
    fn test_template_literal() {
        let mut env = StaticEnv::default();
        env.bind("title", StaticValue::Str("Home".into()));
        assert_eq!(
            static_text("`Docs | ${title}`", &env),
            Some("Docs | Home".to_string())
        );
    }

    #[test]
    fn test_ternary_and_negation() {
        let env = StaticEnv::default();
        assert_eq!(static_text("true ? 'Yes' : 'No'", &env), Some("Yes".into()));
        assert_eq!(static_text("!'' ? 'Yes' : 'No'", &env), Some("Yes".into()));
        assert_eq!(static_eval("-2", &env), Some(StaticValue::Num(-2.0)));
    }

    #[test]
    fn test_arrays_join_and_length() {
        let env = StaticEnv::default();
        assert_eq!(static_text("['a', 'b'].join(' ')", &env), Some("a b".into()));
        assert_eq!(static_text("[1, 2, 3].length", &env), Some("3".into()));
        assert_eq!(static_text("[1, 2].join()", &env), Some("1,2".into()));
    }

    #[test]
    fn test_unsupported_forms_are_not_static() {
        let env = StaticEnv::default();
        assert_eq!(static_eval("fetch('/x')", &env), None);
        assert_eq!(static_eval("a.b", &env), None);
        assert_eq!(static_eval("1 * 2", &env), None);
    }

    #[test]
    fn test_display_of_nullish() {
        assert_eq!(StaticValue::Null.to_display(), "");
        assert_eq!(StaticValue::Num(1.5).to_display(), "1.5");
    }
}
