//! Component Analyzer.
//!
//! Scans a component file once and describes every function-like component
//! in it: the client directive, the props parameter shape, reactive
//! declarations, local declarations the body depends on, imports, and the
//! JSX the component returns. Nothing here emits code.

use std::collections::{BTreeSet, HashSet};

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_span::{GetSpan, Span};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::diagnostic::{
    Diagnostic, BF_COMPONENT_NOT_FOUND, BF_MISSING_CLIENT_DIRECTIVE, BF_PARSE_ERROR,
    BF_UNREACHABLE_CODE, BF_UNSUPPORTED_RETURN, BF_UNUSED_IMPORT,
};
use crate::options::DEFAULT_CLIENT_DIRECTIVE;
use crate::parse::{
    argument_text, as_named_call, binding_names, body_returns_jsx, contains_jsx, is_jsx, is_null,
    parse_module, property_key_name, referenced_identifiers, span_text, split_type_annotation,
    unwrap_parens, LineIndex,
};
use crate::transform::{extract_identifiers, is_event_prop, ReactiveScope};

pub const CREATE_SIGNAL: &str = "createSignal";
pub const CREATE_MEMO: &str = "createMemo";
pub const CREATE_EFFECT: &str = "createEffect";
pub const ON_MOUNT: &str = "onMount";

// ═══════════════════════════════════════════════════════════════════════════════
// ANALYSIS TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PropsShape {
    None,
    /// `({ a, b = 1, ...rest })`: every field is captured once at call time.
    Destructured {
        fields: Vec<PropField>,
        rest: Option<String>,
    },
    /// `(props)`: member reads are evaluated lazily.
    Object { name: String },
}

impl PropsShape {
    pub fn object_name(&self) -> Option<&str> {
        match self {
            PropsShape::Object { name } => Some(name),
            _ => None,
        }
    }

    pub fn rest_name(&self) -> Option<&str> {
        match self {
            PropsShape::Destructured { rest, .. } => rest.as_deref(),
            _ => None,
        }
    }

    /// Every local name the parameter binds.
    pub fn local_names(&self) -> Vec<String> {
        match self {
            PropsShape::None => vec![],
            PropsShape::Object { name } => vec![name.clone()],
            PropsShape::Destructured { fields, rest } => fields
                .iter()
                .map(|f| f.local.clone())
                .chain(rest.iter().cloned())
                .collect(),
        }
    }

    pub fn declared_names(&self) -> Vec<String> {
        match self {
            PropsShape::Destructured { fields, .. } => fields.iter().map(|f| f.key.clone()).collect(),
            _ => vec![],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PropsShape::None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropField {
    pub key: String,
    /// Binding text; equals `key` unless renamed or nested.
    pub local: String,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalDecl {
    pub getter: String,
    pub setter: Option<String>,
    pub initial: String,
    pub order: usize,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoDecl {
    pub name: String,
    pub body: String,
    pub deps: Vec<String>,
    pub order: usize,
    pub line: u32,
}

/// An effect or mount hook body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookDecl {
    pub body: String,
    pub deps: Vec<String>,
    pub order: usize,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Function,
    Constant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDecl {
    pub names: Vec<String>,
    pub kind: DeclKind,
    /// Complete declaration statement, as written.
    pub source: String,
    pub references: BTreeSet<String>,
    pub order: usize,
    pub line: u32,
    /// Initializer of a single-name `const x = <jsx/>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsx: Option<JsxSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "kebab-case")]
pub enum ImportedName {
    Default,
    Named(String),
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBinding {
    pub local: String,
    pub imported: ImportedName,
    pub source: String,
    pub type_only: bool,
    pub line: u32,
}

impl ImportBinding {
    pub fn is_relative(&self) -> bool {
        self.source.starts_with("./") || self.source.starts_with("../")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsxSource {
    pub text: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarlyReturn {
    pub condition: String,
    pub jsx: JsxSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ReturnShape {
    Jsx(JsxSource),
    /// `if (c) return <A/>; ... return <B/>`
    Branches {
        branches: Vec<EarlyReturn>,
        fallback: JsxSource,
    },
}

/// Client behaviour found in the component, used for the directive check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUsage {
    pub inline_handlers: Vec<String>,
    pub forwarded_handlers: Vec<String>,
    pub refs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    pub name: String,
    pub file_path: String,
    pub has_client_directive: bool,
    pub is_default_export: bool,
    pub is_exported: bool,
    pub props: PropsShape,
    pub props_type: Option<String>,
    pub signals: Vec<SignalDecl>,
    pub memos: Vec<MemoDecl>,
    pub effects: Vec<HookDecl>,
    pub mounts: Vec<HookDecl>,
    pub local_declarations: Vec<LocalDecl>,
    pub module_declarations: Vec<LocalDecl>,
    pub imports: Vec<ImportBinding>,
    pub jsx_return: Option<ReturnShape>,
    pub client_usage: ClientUsage,
    pub line: u32,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisContext {
    fn missing(name: &str, file_path: &str) -> Self {
        AnalysisContext {
            name: name.to_string(),
            file_path: file_path.to_string(),
            has_client_directive: false,
            is_default_export: false,
            is_exported: false,
            props: PropsShape::None,
            props_type: None,
            signals: vec![],
            memos: vec![],
            effects: vec![],
            mounts: vec![],
            local_declarations: vec![],
            module_declarations: vec![],
            imports: vec![],
            jsx_return: None,
            client_usage: ClientUsage::default(),
            line: 1,
            diagnostics: vec![],
        }
    }

    pub fn has_reactive_state(&self) -> bool {
        !self.signals.is_empty()
            || !self.memos.is_empty()
            || !self.effects.is_empty()
            || !self.mounts.is_empty()
    }

    /// Whether the component cannot be rendered correctly without client JS.
    pub fn requires_client(&self) -> bool {
        self.has_reactive_state()
            || !self.client_usage.inline_handlers.is_empty()
            || self.client_usage.refs > 0
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn reactive_scope(&self) -> ReactiveScope {
        ReactiveScope {
            getters: self
                .signals
                .iter()
                .map(|s| s.getter.clone())
                .chain(self.memos.iter().map(|m| m.name.clone()))
                .collect(),
            props_object: self.props.object_name().map(str::to_string),
        }
    }

    /// Names declared by the component itself or its module.
    pub fn known_names(&self) -> HashSet<String> {
        let mut names: HashSet<String> = self.props.local_names().into_iter().collect();
        for s in &self.signals {
            names.insert(s.getter.clone());
            if let Some(setter) = &s.setter {
                names.insert(setter.clone());
            }
        }
        names.extend(self.memos.iter().map(|m| m.name.clone()));
        for decl in self.local_declarations.iter().chain(&self.module_declarations) {
            names.extend(decl.names.iter().cloned());
        }
        names.extend(self.imports.iter().map(|i| i.local.clone()));
        names
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysis {
    pub file_path: String,
    pub has_client_directive: bool,
    pub components: Vec<AnalysisContext>,
    pub imports: Vec<ImportBinding>,
    pub module_declarations: Vec<LocalDecl>,
    /// PascalCase tags rendered anywhere in the file.
    pub jsx_tags: BTreeSet<String>,
    pub default_export: Option<String>,
    /// File-level findings (parse errors, unused imports).
    pub diagnostics: Vec<Diagnostic>,
}

impl FileAnalysis {
    pub fn component(&self, name: &str) -> Option<&AnalysisContext> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn default_component(&self) -> Option<&AnalysisContext> {
        self.components.iter().find(|c| c.is_default_export)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Analyze exactly one component: the one named `hint`, else the default
/// export, else the first component in the file.
pub fn analyze_component(source: &str, file_path: &str, hint: Option<&str>) -> AnalysisContext {
    let file = analyze_file(source, file_path, DEFAULT_CLIENT_DIRECTIVE);
    let picked = match hint {
        Some(name) => file.component(name),
        None => file.default_component().or_else(|| file.components.first()),
    };
    match picked {
        Some(ctx) => {
            let mut ctx = ctx.clone();
            ctx.diagnostics.extend(file.diagnostics.iter().cloned());
            ctx
        }
        None => {
            let name = hint.unwrap_or("default");
            let mut ctx = AnalysisContext::missing(name, file_path);
            ctx.diagnostics.extend(file.diagnostics);
            ctx.diagnostics.push(Diagnostic::error(
                BF_COMPONENT_NOT_FOUND,
                format!("Component '{}' not found in {}", name, file_path),
                file_path,
                1,
                1,
            ));
            ctx
        }
    }
}

pub fn analyze_file(source: &str, file_path: &str, client_directive: &str) -> FileAnalysis {
    let allocator = Allocator::default();
    let parsed = parse_module(&allocator, source, file_path);
    let index = LineIndex::new(source);

    let mut file = FileAnalysis {
        file_path: file_path.to_string(),
        has_client_directive: false,
        components: vec![],
        imports: vec![],
        module_declarations: vec![],
        jsx_tags: BTreeSet::new(),
        default_export: None,
        diagnostics: vec![],
    };

    if !parsed.errors.is_empty() {
        for error in &parsed.errors {
            file.diagnostics.push(Diagnostic::error(
                BF_PARSE_ERROR,
                format!("Parse error: {}", error),
                file_path,
                1,
                1,
            ));
        }
        return file;
    }

    let program = &parsed.program;
    file.has_client_directive = program
        .directives
        .iter()
        .any(|d| d.expression.value.as_str() == client_directive);

    let scanner = FileScanner {
        source,
        file_path,
        index: &index,
    };
    let candidates = scanner.scan_top_level(program, &mut file);

    let mut tags = TagCollector::default();
    tags.visit_program(program);
    file.jsx_tags = tags.tags;

    let used = referenced_identifiers(program);
    for import in &file.imports {
        if !used.contains(&import.local) {
            file.diagnostics.push(Diagnostic::warning(
                BF_UNUSED_IMPORT,
                format!("'{}' is imported from '{}' but never used", import.local, import.source),
                file_path,
                import.line,
                1,
            ));
        }
    }

    for candidate in candidates {
        let is_default = file.default_export.as_deref() == Some(candidate.name.as_str());
        let ctx = scanner.analyze_candidate(&candidate, is_default, &file);
        trace!(component = %ctx.name, signals = ctx.signals.len(), "analyzed component");
        file.components.push(ctx);
    }

    debug!(
        file = file_path,
        components = file.components.len(),
        client = file.has_client_directive,
        "analyzed file"
    );
    file
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOP-LEVEL SCAN
// ═══════════════════════════════════════════════════════════════════════════════

enum ComponentFn<'b, 'a> {
    Function(&'b Function<'a>),
    Arrow(&'b ArrowFunctionExpression<'a>),
}

impl<'b, 'a> ComponentFn<'b, 'a> {
    fn params(&self) -> &'b FormalParameters<'a> {
        match self {
            ComponentFn::Function(f) => &f.params,
            ComponentFn::Arrow(a) => &a.params,
        }
    }

    fn body(&self) -> Option<&'b FunctionBody<'a>> {
        match self {
            ComponentFn::Function(f) => f.body.as_deref(),
            ComponentFn::Arrow(a) => Some(&a.body),
        }
    }

    fn is_expression_arrow(&self) -> bool {
        matches!(self, ComponentFn::Arrow(a) if a.expression)
    }
}

struct Candidate<'b, 'a> {
    name: String,
    func: ComponentFn<'b, 'a>,
    exported: bool,
    span: Span,
}

struct FileScanner<'s> {
    source: &'s str,
    file_path: &'s str,
    index: &'s LineIndex,
}

fn is_component_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_uppercase())
}

/// `my-button.tsx` -> `MyButton`
pub fn component_name_from_path(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    let stem = file.split('.').next().unwrap_or(file);
    stem.split(|c: char| c == '-' || c == '_' || c == ' ')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

impl<'s> FileScanner<'s> {
    fn line(&self, span: Span) -> u32 {
        self.index.location(span.start).line
    }

    fn text(&self, span: Span) -> &'s str {
        span_text(self.source, span)
    }

    fn scan_top_level<'b, 'a>(
        &self,
        program: &'b Program<'a>,
        file: &mut FileAnalysis,
    ) -> Vec<Candidate<'b, 'a>> {
        let mut candidates = Vec::new();
        let mut exported_names: HashSet<String> = HashSet::new();

        for (order, stmt) in program.body.iter().enumerate() {
            match stmt {
                Statement::ImportDeclaration(import) => self.collect_import(import, file),
                Statement::FunctionDeclaration(func) => {
                    self.collect_function(func, false, order, &mut candidates, file)
                }
                Statement::VariableDeclaration(decl) => {
                    self.collect_variables(decl, false, order, &mut candidates, file)
                }
                Statement::ExportNamedDeclaration(export) => {
                    match &export.declaration {
                        Some(Declaration::FunctionDeclaration(func)) => {
                            self.collect_function(func, true, order, &mut candidates, file)
                        }
                        Some(Declaration::VariableDeclaration(decl)) => {
                            self.collect_variables(decl, true, order, &mut candidates, file)
                        }
                        _ => {}
                    }
                    for spec in &export.specifiers {
                        let local = module_export_name(&spec.local);
                        if module_export_name(&spec.exported) == "default" {
                            file.default_export = Some(local.clone());
                        }
                        exported_names.insert(local);
                    }
                }
                Statement::ExportDefaultDeclaration(export) => match &export.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                        let name = func
                            .id
                            .as_ref()
                            .map(|id| id.name.to_string())
                            .unwrap_or_else(|| component_name_from_path(self.file_path));
                        if func.body.as_ref().is_some_and(|b| body_returns_jsx(b)) {
                            file.default_export = Some(name.clone());
                            candidates.push(Candidate {
                                name,
                                func: ComponentFn::Function(func),
                                exported: true,
                                span: func.span,
                            });
                        }
                    }
                    ExportDefaultDeclarationKind::ArrowFunctionExpression(arrow) => {
                        if body_returns_jsx(&arrow.body) {
                            let name = component_name_from_path(self.file_path);
                            file.default_export = Some(name.clone());
                            candidates.push(Candidate {
                                name,
                                func: ComponentFn::Arrow(arrow),
                                exported: true,
                                span: arrow.span,
                            });
                        }
                    }
                    ExportDefaultDeclarationKind::Identifier(id) => {
                        file.default_export = Some(id.name.to_string());
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        for candidate in candidates.iter_mut() {
            if exported_names.contains(&candidate.name) {
                candidate.exported = true;
            }
        }
        candidates
    }

    fn collect_import(&self, import: &ImportDeclaration, file: &mut FileAnalysis) {
        let Some(specifiers) = &import.specifiers else {
            return;
        };
        let source = import.source.value.to_string();
        let line = self.line(import.span);
        for specifier in specifiers {
            let (local, imported, type_only) = match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(s) => (
                    s.local.name.to_string(),
                    ImportedName::Named(module_export_name(&s.imported)),
                    s.import_kind.is_type(),
                ),
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    (s.local.name.to_string(), ImportedName::Default, false)
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    (s.local.name.to_string(), ImportedName::Namespace, false)
                }
            };
            file.imports.push(ImportBinding {
                local,
                imported,
                source: source.clone(),
                type_only: type_only || import.import_kind.is_type(),
                line,
            });
        }
    }

    fn collect_function<'b, 'a>(
        &self,
        func: &'b Function<'a>,
        exported: bool,
        order: usize,
        candidates: &mut Vec<Candidate<'b, 'a>>,
        file: &mut FileAnalysis,
    ) {
        let Some(id) = &func.id else {
            return;
        };
        let name = id.name.to_string();
        if is_component_name(&name) && func.body.as_ref().is_some_and(|b| body_returns_jsx(b)) {
            candidates.push(Candidate {
                name,
                func: ComponentFn::Function(func),
                exported,
                span: func.span,
            });
            return;
        }
        let source = self.text(func.span);
        file.module_declarations.push(LocalDecl {
            names: vec![name],
            kind: DeclKind::Function,
            source: source.to_string(),
            references: extract_identifiers(source),
            order,
            line: self.line(func.span),
            jsx: None,
        });
    }

    fn collect_variables<'b, 'a>(
        &self,
        decl: &'b VariableDeclaration<'a>,
        exported: bool,
        order: usize,
        candidates: &mut Vec<Candidate<'b, 'a>>,
        file: &mut FileAnalysis,
    ) {
        for declarator in &decl.declarations {
            if let (BindingPattern::BindingIdentifier(id), Some(init)) =
                (&declarator.id, &declarator.init)
            {
                let name = id.name.to_string();
                if is_component_name(&name) {
                    let func = match unwrap_parens(init) {
                        Expression::ArrowFunctionExpression(arrow) if body_returns_jsx(&arrow.body) => {
                            Some(ComponentFn::Arrow(arrow))
                        }
                        Expression::FunctionExpression(f)
                            if f.body.as_ref().is_some_and(|b| body_returns_jsx(b)) =>
                        {
                            Some(ComponentFn::Function(f))
                        }
                        _ => None,
                    };
                    if let Some(func) = func {
                        candidates.push(Candidate {
                            name,
                            func,
                            exported,
                            span: declarator.span,
                        });
                        continue;
                    }
                }
            }
            file.module_declarations
                .push(self.declarator_decl(decl, declarator, order));
        }
    }

    fn declarator_decl(
        &self,
        decl: &VariableDeclaration,
        declarator: &VariableDeclarator,
        order: usize,
    ) -> LocalDecl {
        let source = if decl.declarations.len() == 1 {
            self.text(decl.span).trim_end().to_string()
        } else {
            format!("{} {};", decl.kind.as_str(), self.text(declarator.span))
        };
        let kind = match declarator.init.as_ref().map(unwrap_parens) {
            Some(Expression::ArrowFunctionExpression(_)) | Some(Expression::FunctionExpression(_)) => {
                DeclKind::Function
            }
            _ => DeclKind::Constant,
        };
        let init_refs = declarator
            .init
            .as_ref()
            .map(|init| extract_identifiers(self.text(init.span())))
            .unwrap_or_default();
        let names = binding_names(&declarator.id);
        let jsx = match declarator.init.as_ref() {
            Some(init) if names.len() == 1 && is_jsx(init) => Some(self.jsx_source(init)),
            _ => None,
        };
        LocalDecl {
            names,
            kind,
            source,
            references: init_refs,
            order,
            line: self.line(declarator.span),
            jsx,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COMPONENT BODY
    // ═══════════════════════════════════════════════════════════════════════════

    fn analyze_candidate(
        &self,
        candidate: &Candidate,
        is_default_export: bool,
        file: &FileAnalysis,
    ) -> AnalysisContext {
        let mut ctx = AnalysisContext::missing(&candidate.name, self.file_path);
        ctx.has_client_directive = file.has_client_directive;
        ctx.is_default_export = is_default_export;
        ctx.is_exported = candidate.exported || is_default_export;
        ctx.imports = file.imports.clone();
        ctx.module_declarations = file.module_declarations.clone();
        ctx.line = self.line(candidate.span);

        let params = candidate.func.params();
        if let Some(param) = params.items.first() {
            let (props, props_type) = self.props_shape(param);
            ctx.props = props;
            ctx.props_type = props_type;
        }

        let Some(body) = candidate.func.body() else {
            return ctx;
        };

        if candidate.func.is_expression_arrow() {
            if let Some(Statement::ExpressionStatement(stmt)) = body.statements.first() {
                ctx.jsx_return = Some(ReturnShape::Jsx(self.jsx_source(&stmt.expression)));
            }
        } else {
            self.scan_body(body, &mut ctx);
        }

        let mut usage = ClientUsageScanner::new(&ctx.props);
        usage.visit_function_body(body);
        ctx.client_usage = usage.usage;

        let scope = ctx.reactive_scope();
        for memo in ctx.memos.iter_mut() {
            memo.deps = scope.dependencies(&memo.body);
        }
        for hook in ctx.effects.iter_mut().chain(ctx.mounts.iter_mut()) {
            hook.deps = scope.dependencies(&hook.body);
        }

        if ctx.jsx_return.is_none() && !ctx.has_errors() {
            ctx.diagnostics.push(
                Diagnostic::error(
                    BF_UNSUPPORTED_RETURN,
                    format!("Component '{}' does not return JSX", ctx.name),
                    self.file_path,
                    ctx.line,
                    1,
                )
                .in_component(&ctx.name),
            );
        }

        if ctx.requires_client() && !ctx.has_client_directive {
            let mut reasons: Vec<String> = Vec::new();
            if !ctx.signals.is_empty() {
                reasons.push(CREATE_SIGNAL.to_string());
            }
            if !ctx.memos.is_empty() {
                reasons.push(CREATE_MEMO.to_string());
            }
            if !ctx.effects.is_empty() {
                reasons.push(CREATE_EFFECT.to_string());
            }
            if !ctx.mounts.is_empty() {
                reasons.push(ON_MOUNT.to_string());
            }
            for handler in &ctx.client_usage.inline_handlers {
                reasons.push(format!("inline handler `{}`", handler));
            }
            if ctx.client_usage.refs > 0 {
                reasons.push("ref callback".to_string());
            }
            ctx.diagnostics.push(
                Diagnostic::error(
                    BF_MISSING_CLIENT_DIRECTIVE,
                    format!(
                        "Component '{}' uses {} but the file has no \"use client\" directive",
                        ctx.name,
                        reasons.join(", ")
                    ),
                    self.file_path,
                    ctx.line,
                    1,
                )
                .in_component(&ctx.name)
                .with_hint("Add \"use client\" as the first statement of the file"),
            );
        }

        ctx
    }

    fn props_shape(&self, param: &FormalParameter) -> (PropsShape, Option<String>) {
        let (_, annotation) = split_type_annotation(self.text(param.span));
        let props_type = annotation.map(str::to_string);
        (self.pattern_shape(&param.pattern), props_type)
    }

    fn pattern_shape(&self, pattern: &BindingPattern) -> PropsShape {
        match pattern {
            BindingPattern::BindingIdentifier(id) => PropsShape::Object {
                name: id.name.to_string(),
            },
            BindingPattern::AssignmentPattern(assign) => self.pattern_shape(&assign.left),
            BindingPattern::ObjectPattern(obj) => {
                let fields = obj
                    .properties
                    .iter()
                    .filter_map(|prop| {
                        let key = property_key_name(&prop.key)?;
                        let (local, default) = match &prop.value {
                            BindingPattern::BindingIdentifier(id) => (id.name.to_string(), None),
                            BindingPattern::AssignmentPattern(assign) => (
                                split_type_annotation(self.text(assign.left.span())).0.to_string(),
                                Some(self.text(assign.right.span()).to_string()),
                            ),
                            other => (self.text(other.span()).to_string(), None),
                        };
                        Some(PropField { key, local, default })
                    })
                    .collect();
                let rest = obj.rest.as_ref().and_then(|rest| match &rest.argument {
                    BindingPattern::BindingIdentifier(id) => Some(id.name.to_string()),
                    _ => None,
                });
                PropsShape::Destructured { fields, rest }
            }
            BindingPattern::ArrayPattern(_) => PropsShape::None,
        }
    }

    fn jsx_source(&self, expr: &Expression) -> JsxSource {
        let span = unwrap_parens(expr).span();
        let location = self.index.location(span.start);
        JsxSource {
            text: self.text(span).to_string(),
            line: location.line,
            column: location.column,
        }
    }

    fn scan_body(&self, body: &FunctionBody, ctx: &mut AnalysisContext) {
        let mut branches: Vec<EarlyReturn> = Vec::new();
        let mut returned = false;

        for (order, stmt) in body.statements.iter().enumerate() {
            if returned {
                if !matches!(stmt, Statement::FunctionDeclaration(_)) {
                    ctx.diagnostics.push(
                        Diagnostic::warning(
                            BF_UNREACHABLE_CODE,
                            "Statement after return is never executed",
                            self.file_path,
                            self.line(stmt.span()),
                            1,
                        )
                        .in_component(&ctx.name),
                    );
                    break;
                }
            }
            match stmt {
                Statement::VariableDeclaration(decl) => self.scan_variables(decl, order, ctx),
                Statement::FunctionDeclaration(func) => {
                    let source = self.text(func.span);
                    ctx.local_declarations.push(LocalDecl {
                        names: func.id.iter().map(|id| id.name.to_string()).collect(),
                        kind: DeclKind::Function,
                        source: source.to_string(),
                        references: extract_identifiers(source),
                        order,
                        line: self.line(func.span),
                        jsx: None,
                    });
                }
                Statement::ExpressionStatement(stmt) => {
                    self.scan_hook(&stmt.expression, order, ctx);
                }
                Statement::IfStatement(if_stmt) if !returned => {
                    self.scan_early_return(if_stmt, &mut branches, &mut returned, ctx);
                }
                Statement::ReturnStatement(ret) if !returned => {
                    returned = true;
                    let Some(arg) = &ret.argument else {
                        continue;
                    };
                    if !contains_jsx(arg) && !is_null(arg) {
                        ctx.diagnostics.push(
                            Diagnostic::error(
                                BF_UNSUPPORTED_RETURN,
                                format!(
                                    "Component '{}' returns `{}`, expected JSX",
                                    ctx.name,
                                    self.text(arg.span())
                                ),
                                self.file_path,
                                self.line(ret.span),
                                1,
                            )
                            .in_component(&ctx.name),
                        );
                        continue;
                    }
                    let fallback = self.jsx_source(arg);
                    ctx.jsx_return = Some(if branches.is_empty() {
                        ReturnShape::Jsx(fallback)
                    } else {
                        ReturnShape::Branches {
                            branches: std::mem::take(&mut branches),
                            fallback,
                        }
                    });
                }
                _ => {}
            }
        }

        if ctx.jsx_return.is_none() && !branches.is_empty() {
            ctx.jsx_return = Some(ReturnShape::Branches {
                branches,
                fallback: JsxSource {
                    text: "null".to_string(),
                    line: ctx.line,
                    column: 1,
                },
            });
        }
    }

    fn scan_early_return(
        &self,
        if_stmt: &IfStatement,
        branches: &mut Vec<EarlyReturn>,
        returned: &mut bool,
        ctx: &mut AnalysisContext,
    ) {
        let Some(consequent) = returned_jsx(&if_stmt.consequent) else {
            return;
        };
        if matches!(unwrap_parens(&if_stmt.test), Expression::BooleanLiteral(b) if !b.value) {
            ctx.diagnostics.push(
                Diagnostic::warning(
                    BF_UNREACHABLE_CODE,
                    "Branch guarded by a constant `false` is never rendered",
                    self.file_path,
                    self.line(if_stmt.span),
                    1,
                )
                .in_component(&ctx.name),
            );
            return;
        }
        branches.push(EarlyReturn {
            condition: self.text(if_stmt.test.span()).to_string(),
            jsx: self.jsx_source(consequent),
        });
        if let Some(alternate) = if_stmt.alternate.as_ref().and_then(returned_jsx) {
            *returned = true;
            ctx.jsx_return = Some(ReturnShape::Branches {
                branches: std::mem::take(branches),
                fallback: self.jsx_source(alternate),
            });
        }
    }

    fn scan_variables(&self, decl: &VariableDeclaration, order: usize, ctx: &mut AnalysisContext) {
        for declarator in &decl.declarations {
            let line = self.line(declarator.span);
            let init = declarator.init.as_ref();

            if let (BindingPattern::ArrayPattern(arr), Some(call)) = (
                &declarator.id,
                init.and_then(|e| as_named_call(e, CREATE_SIGNAL)),
            ) {
                let names: Vec<Option<String>> = arr
                    .elements
                    .iter()
                    .map(|el| match el {
                        Some(BindingPattern::BindingIdentifier(id)) => Some(id.name.to_string()),
                        _ => None,
                    })
                    .collect();
                if let Some(Some(getter)) = names.first() {
                    ctx.signals.push(SignalDecl {
                        getter: getter.clone(),
                        setter: names.get(1).cloned().flatten(),
                        initial: argument_text(self.source, call, 0)
                            .unwrap_or("undefined")
                            .to_string(),
                        order,
                        line,
                    });
                    continue;
                }
            }

            if let (BindingPattern::BindingIdentifier(id), Some(call)) = (
                &declarator.id,
                init.and_then(|e| as_named_call(e, CREATE_MEMO)),
            ) {
                ctx.memos.push(MemoDecl {
                    name: id.name.to_string(),
                    body: argument_text(self.source, call, 0)
                        .unwrap_or("() => undefined")
                        .to_string(),
                    deps: vec![],
                    order,
                    line,
                });
                continue;
            }

            ctx.local_declarations
                .push(self.declarator_decl(decl, declarator, order));
        }
    }

    fn scan_hook(&self, expr: &Expression, order: usize, ctx: &mut AnalysisContext) {
        for (name, target) in [(CREATE_EFFECT, true), (ON_MOUNT, false)] {
            if let Some(call) = as_named_call(expr, name) {
                let hook = HookDecl {
                    body: argument_text(self.source, call, 0)
                        .unwrap_or("() => {}")
                        .to_string(),
                    deps: vec![],
                    order,
                    line: self.line(call.span),
                };
                if target {
                    ctx.effects.push(hook);
                } else {
                    ctx.mounts.push(hook);
                }
                return;
            }
        }
    }
}

fn returned_jsx<'b, 'a>(stmt: &'b Statement<'a>) -> Option<&'b Expression<'a>> {
    match stmt {
        Statement::ReturnStatement(ret) => ret
            .argument
            .as_ref()
            .filter(|arg| contains_jsx(arg) || is_null(arg)),
        Statement::BlockStatement(block) => match block.body.last() {
            Some(last) => returned_jsx(last),
            None => None,
        },
        _ => None,
    }
}

fn module_export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSX SCANS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct TagCollector {
    tags: BTreeSet<String>,
}

impl<'a> Visit<'a> for TagCollector {
    fn visit_jsx_opening_element(&mut self, it: &JSXOpeningElement<'a>) {
        match &it.name {
            JSXElementName::IdentifierReference(id) if is_component_name(&id.name) => {
                self.tags.insert(id.name.to_string());
            }
            JSXElementName::MemberExpression(member) => {
                if let JSXMemberExpressionObject::IdentifierReference(id) = &member.object {
                    self.tags.insert(id.name.to_string());
                }
            }
            _ => {}
        }
        walk::walk_jsx_opening_element(self, it);
    }
}

/// Event handlers and refs on DOM elements.
struct ClientUsageScanner {
    props_locals: HashSet<String>,
    props_object: Option<String>,
    usage: ClientUsage,
}

impl ClientUsageScanner {
    fn new(props: &PropsShape) -> Self {
        ClientUsageScanner {
            props_locals: props.local_names().into_iter().collect(),
            props_object: props
                .object_name()
                .or(props.rest_name())
                .map(str::to_string),
            usage: ClientUsage::default(),
        }
    }

    fn is_forwarded(&self, expr: &Expression) -> bool {
        match unwrap_parens(expr) {
            Expression::Identifier(id) => self.props_locals.contains(id.name.as_str()),
            Expression::StaticMemberExpression(member) => match &member.object {
                Expression::Identifier(obj) => {
                    self.props_object.as_deref() == Some(obj.name.as_str())
                }
                _ => false,
            },
            _ => false,
        }
    }
}

impl<'a> Visit<'a> for ClientUsageScanner {
    fn visit_jsx_opening_element(&mut self, it: &JSXOpeningElement<'a>) {
        if matches!(it.name, JSXElementName::Identifier(_)) {
            for item in &it.attributes {
                let JSXAttributeItem::Attribute(attr) = item else {
                    continue;
                };
                let JSXAttributeName::Identifier(name) = &attr.name else {
                    continue;
                };
                let value = match &attr.value {
                    Some(JSXAttributeValue::ExpressionContainer(c)) => c.expression.as_expression(),
                    _ => None,
                };
                if name.name.as_str() == "ref" {
                    self.usage.refs += 1;
                } else if is_event_prop(&name.name) {
                    match value {
                        Some(expr) if self.is_forwarded(expr) => {
                            self.usage.forwarded_handlers.push(name.name.to_string())
                        }
                        _ => self.usage.inline_handlers.push(name.name.to_string()),
                    }
                }
            }
        }
        walk::walk_jsx_opening_element(self, it);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::BF_MISSING_CLIENT_DIRECTIVE;

    const COUNTER: &str = r#""use client"
import { createSignal, createMemo, createEffect } from '@barefootjs/dom'

export function Counter({ initial = 0, label }: CounterProps) {
  const [count, setCount] = createSignal(initial)
  const doubled = createMemo(() => count() * 2)
  const reset = () => setCount(0)
  createEffect(() => { console.log(doubled()) })
  return <button onClick={() => setCount((n) => n + 1)}>{label}: {count()}</button>
}
"#;

    #[test]
    fn test_detects_signals_memos_effects() {
        let ctx = analyze_component(COUNTER, "Counter.tsx", Some("Counter"));
        assert!(ctx.has_client_directive);
        assert_eq!(ctx.signals.len(), 1);
        assert_eq!(ctx.signals[0].getter, "count");
        assert_eq!(ctx.signals[0].setter.as_deref(), Some("setCount"));
        assert_eq!(ctx.signals[0].initial, "initial");
        assert_eq!(ctx.memos[0].name, "doubled");
        assert_eq!(ctx.memos[0].deps, vec!["count".to_string()]);
        assert_eq!(ctx.effects[0].deps, vec!["doubled".to_string()]);
        assert_eq!(ctx.local_declarations[0].names, vec!["reset".to_string()]);
        assert_eq!(ctx.local_declarations[0].kind, DeclKind::Function);
        assert!(!ctx.has_errors());
    }

    #[test]
    fn test_destructured_props_shape() {
        let ctx = analyze_component(COUNTER, "Counter.tsx", None);
        match &ctx.props {
            PropsShape::Destructured { fields, rest } => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].key, "initial");
                assert_eq!(fields[0].default.as_deref(), Some("0"));
                assert_eq!(fields[1].local, "label");
                assert!(rest.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ctx.props_type.as_deref(), Some("CounterProps"));
    }

    #[test]
    fn test_props_object_shape() {
        let src = "export default function Card(props) { return <div>{props.title}</div> }";
        let ctx = analyze_component(src, "Card.tsx", None);
        assert_eq!(
            ctx.props,
            PropsShape::Object {
                name: "props".to_string()
            }
        );
        assert!(ctx.is_default_export);
        assert!(ctx.reactive_scope().is_reactive("props.title"));
    }

    #[test]
    fn test_missing_directive_is_fatal() {
        let src = r#"import { createSignal } from '@barefootjs/dom'
export function Counter({ initial }) {
  const [count] = createSignal(initial)
  return <span>{count()}</span>
}"#;
        let ctx = analyze_component(src, "Counter.tsx", Some("Counter"));
        let diag = ctx
            .diagnostics
            .iter()
            .find(|d| d.code == BF_MISSING_CLIENT_DIRECTIVE)
            .unwrap();
        assert!(diag.is_error());
        assert_eq!(diag.component.as_deref(), Some("Counter"));
    }

    #[test]
    fn test_forwarded_handler_needs_no_directive() {
        let src = "export function Btn({ onClick, children }) { return <button onClick={onClick}>{children}</button> }";
        let ctx = analyze_component(src, "Btn.tsx", None);
        assert!(!ctx.requires_client());
        assert!(!ctx.has_errors());
        assert_eq!(ctx.client_usage.forwarded_handlers, vec!["onClick".to_string()]);
    }

    #[test]
    fn test_inline_handler_needs_directive() {
        let src = "export function Btn() { return <button onClick={() => alert(1)}>x</button> }";
        let ctx = analyze_component(src, "Btn.tsx", None);
        assert!(ctx.has_errors());
    }

    #[test]
    fn test_unused_import_is_warning() {
        let src = "import { format } from './fmt'\nexport function A() { return <p>hi</p> }";
        let ctx = analyze_component(src, "A.tsx", None);
        let diag = ctx.diagnostics.iter().find(|d| d.code == BF_UNUSED_IMPORT).unwrap();
        assert!(!diag.is_error());
        assert_eq!(diag.line, 1);
    }

    #[test]
    fn test_multiple_components_and_module_constants() {
        let src = r#"const code = `let x = 1`
const unused = 42
export function A() { return <pre>{code}</pre> }
export const B = ({ n }) => <i>{n}</i>
"#;
        let file = analyze_file(src, "multi.tsx", "use client");
        let names: Vec<_> = file.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(file.module_declarations.len(), 2);
        assert_eq!(file.module_declarations[0].source, "const code = `let x = 1`");
    }

    #[test]
    fn test_early_return_branches() {
        let src = r#"export function Status({ loading }) {
  if (loading) return <p>Loading</p>
  return <div>Ready</div>
}"#;
        let ctx = analyze_component(src, "Status.tsx", None);
        match ctx.jsx_return.unwrap() {
            ReturnShape::Branches { branches, fallback } => {
                assert_eq!(branches[0].condition, "loading");
                assert_eq!(branches[0].jsx.text, "<p>Loading</p>");
                assert_eq!(fallback.text, "<div>Ready</div>");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_after_return() {
        let src = "export function A() { return <p/>; console.log('x') }";
        let ctx = analyze_component(src, "A.tsx", None);
        assert!(ctx.diagnostics.iter().any(|d| d.code == BF_UNREACHABLE_CODE));
        assert!(!ctx.has_errors());
    }

    #[test]
    fn test_missing_component() {
        let ctx = analyze_component("export const x = 1", "x.ts", Some("Nope"));
        assert!(ctx.diagnostics.iter().any(|d| d.code == BF_COMPONENT_NOT_FOUND));
    }

    #[test]
    fn test_component_name_from_path() {
        assert_eq!(component_name_from_path("src/todo-item.tsx"), "TodoItem");
        assert_eq!(component_name_from_path("Button.jsx"), "Button");
    }

    #[test]
    fn test_jsx_tags_collected() {
        let src = "import { Child } from './Child'\nexport function P() { return <Ctx.Provider value={1}><Child/></Ctx.Provider> }";
        let file = analyze_file(src, "P.tsx", "use client");
        assert!(file.jsx_tags.contains("Child"));
        assert!(file.jsx_tags.contains("Ctx"));
    }
}
