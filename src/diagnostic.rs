//! Stable diagnostic codes and the per-component diagnostic record.
//!
//! Diagnostics never abort a compile on their own. An `Error` aborts
//! generation for the component it is attached to; a `Warning` is
//! informational unless the caller runs in strict mode.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const BF_MISSING_CLIENT_DIRECTIVE: &str = "BF001";
pub const BF_UNSUPPORTED_RETURN: &str = "BF002";
pub const BF_UNRESOLVED_REACTIVE_CALL: &str = "BF003";
pub const BF_PARSE_ERROR: &str = "BF004";
pub const BF_COMPONENT_NOT_FOUND: &str = "BF005";
pub const BF_PATH_MISMATCH: &str = "BF006";
pub const BF_INVALID_CLIENT_JS: &str = "BF007";
pub const BF_UNUSED_IMPORT: &str = "BF101";
pub const BF_AMBIGUOUS_HANDLER: &str = "BF102";
pub const BF_UNKEYED_LOOP: &str = "BF103";
pub const BF_UNREACHABLE_CODE: &str = "BF104";
pub const BF_IMPORT_CYCLE: &str = "BF105";
pub const BF_UNRESOLVED_IMPORT: &str = "BF106";

// ═══════════════════════════════════════════════════════════════════════════════
// GUARANTEES
// ═══════════════════════════════════════════════════════════════════════════════

/// The invariant each code protects, shown next to the message.
pub fn get_guarantee(code: &str) -> &'static str {
    match code {
        BF_MISSING_CLIENT_DIRECTIVE => {
            "Client behavior is only emitted for files that opt in with the client directive."
        }
        BF_UNSUPPORTED_RETURN => "Every component returns JSX, a fragment, or null.",
        BF_UNRESOLVED_REACTIVE_CALL => {
            "Every zero-argument call in generated code resolves to a declared binding."
        }
        BF_PARSE_ERROR => "Component sources are syntactically valid TSX/JSX.",
        BF_COMPONENT_NOT_FOUND => "The requested component exists in the file.",
        BF_PATH_MISMATCH => "Precomputed element paths land on the node they address.",
        BF_INVALID_CLIENT_JS => "Emitted client modules parse as plain JavaScript.",
        BF_UNUSED_IMPORT => "Imports are used by the module that declares them.",
        BF_AMBIGUOUS_HANDLER => {
            "Guarded handlers only split conditions from the supported grammar."
        }
        BF_UNKEYED_LOOP => "Keyed loops preserve node identity when items are reordered.",
        BF_UNREACHABLE_CODE => "Statements after the rendered return are never executed.",
        BF_IMPORT_CYCLE => {
            "Modules in an import cycle are hashed together, so their filenames change as a group."
        }
        BF_UNRESOLVED_IMPORT => "Relative component imports resolve to readable files.",
        _ => "Unknown diagnostic.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn error(code: &str, message: impl Into<String>, file: &str, line: u32, column: u32) -> Self {
        Self::new(code, Severity::Error, message.into(), file, line, column)
    }

    pub fn warning(
        code: &str,
        message: impl Into<String>,
        file: &str,
        line: u32,
        column: u32,
    ) -> Self {
        Self::new(code, Severity::Warning, message.into(), file, line, column)
    }

    fn new(
        code: &str,
        severity: Severity,
        message: String,
        file: &str,
        line: u32,
        column: u32,
    ) -> Self {
        Diagnostic {
            code: code.to_string(),
            severity,
            message,
            file: file.to_string(),
            line,
            column,
            component: None,
            hint: None,
        }
    }

    pub fn in_component(mut self, component: &str) -> Self {
        self.component = Some(component.to_string());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn guarantee(&self) -> &'static str {
        get_guarantee(&self.code)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{}[{}]: {} ({}:{}:{})",
            level, self.code, self.message, self.file, self.line, self.column
        )
    }
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Stable file-then-position order for reproducible output.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| {
        (a.file.as_str(), a.line, a.column, a.code.as_str())
            .cmp(&(b.file.as_str(), b.line, b.column, b.code.as_str()))
    });
}

/// Strict mode: every warning is reported as an error.
pub fn promote_warnings(diagnostics: &mut [Diagnostic]) {
    for diagnostic in diagnostics.iter_mut() {
        diagnostic.severity = Severity::Error;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT SHAPE
// ═══════════════════════════════════════════════════════════════════════════════

/// The slim record carried on `ComponentOutput.errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct ReportedError {
    pub code: String,
    pub message: String,
    pub severity: String,
    pub line: u32,
}

impl From<&Diagnostic> for ReportedError {
    fn from(d: &Diagnostic) -> Self {
        let severity = match d.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        ReportedError {
            code: d.code.clone(),
            message: d.message.clone(),
            severity: severity.to_string(),
            line: d.line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_serializes_lowercase() {
        let d = Diagnostic::warning(BF_UNUSED_IMPORT, "unused", "a.tsx", 1, 0);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["code"], "BF101");
        assert!(json.get("component").is_none());
    }

    #[test]
    fn test_sort_is_file_then_position() {
        let mut list = vec![
            Diagnostic::error(BF_PARSE_ERROR, "b", "b.tsx", 1, 0),
            Diagnostic::error(BF_PARSE_ERROR, "a2", "a.tsx", 9, 0),
            Diagnostic::error(BF_PARSE_ERROR, "a1", "a.tsx", 2, 4),
        ];
        sort_diagnostics(&mut list);
        let order: Vec<_> = list.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(order, vec!["a1", "a2", "b"]);
    }

    #[test]
    fn test_promote_warnings() {
        let mut list = vec![Diagnostic::warning(BF_UNKEYED_LOOP, "w", "a.tsx", 1, 0)];
        assert!(!has_errors(&list));
        promote_warnings(&mut list);
        assert!(has_errors(&list));
    }

    #[test]
    fn test_reported_error_shape() {
        let d = Diagnostic::error(BF_MISSING_CLIENT_DIRECTIVE, "m", "c.tsx", 3, 1).in_component("C");
        let r = ReportedError::from(&d);
        assert_eq!(r.severity, "error");
        assert_eq!(r.line, 3);
        assert!(d.guarantee().contains("client directive"));
    }
}
