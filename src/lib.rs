//! # Barefoot JSX Compiler
//!
//! Compiles JSX components that use fine-grained reactive primitives into
//! marked templates for server rendering plus minimal client scripts that
//! hydrate that markup. No virtual DOM is shipped.
//!
//! ## Pipeline
//!
//! 1. **Analysis** (`analyzer`): one pass over the oxc AST per file finds the
//!    components, their props shape, signals, memos, effects, mount hooks,
//!    local and module declarations, and imports.
//! 2. **Lowering** (`jsx_lowerer`): the JSX return becomes an `IRNode` tree;
//!    every expression is classified reactive or static.
//! 3. **Addressing** (`hydration`): every node client code must reach gets a
//!    static child-index path, or a scoped marker lookup where no static path
//!    can exist.
//! 4. **Emission** (`template`, `codegen`): a backend adapter renders the
//!    marked template; the client emitter builds a structured module
//!    (`code_model`) that is serialized once.
//! 5. **Assembly** (`compiler`, `finalize`): transitive discovery, per-file
//!    generation, child placeholder resolution and content hashing.
//!
//! ## Semantics the pipeline preserves
//!
//! 1. **Destructured props are snapshots**: `({ value }) => ...` captures
//!    `value` once; `props.value` is read live. Only zero-argument calls of
//!    signal getters and memos make an expression reactive.
//! 2. **Re-hydration is idempotent**: events are assigned as `on{event}`
//!    properties and every scope is claimed once.
//! 3. **Failures are per component**: an error aborts generation of the
//!    component that raised it; siblings and other files still compile.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod analyzer;
pub mod cache;
pub mod code_model;
pub mod codegen;
pub mod compiler;
pub mod diagnostic;
pub mod discovery;
pub mod error;
pub mod finalize;
pub mod hydration;
pub mod ir;
pub mod jsx_lowerer;
pub mod options;
pub mod parse;
pub mod scope;
pub mod static_eval;
pub mod template;
pub mod transform;
pub mod verify;
pub mod visitor;

#[cfg(test)]
mod scenario_tests;

pub use analyzer::{analyze_component, analyze_file, AnalysisContext, FileAnalysis};
pub use cache::CompileCache;
pub use compiler::{compile_jsx, CompileOutput, Compiler};
pub use diagnostic::{Diagnostic, ReportedError, Severity};
pub use discovery::{FsReader, MemoryReader, SourceReader};
pub use error::{CompileError, Result};
pub use finalize::ComponentOutput;
pub use ir::{ComponentIR, IRNode};
pub use jsx_lowerer::build_component_ir;
pub use options::CompileOptions;
pub use template::{AdapterOptions, AdapterOutput, MarkedTemplateAdapter, TemplateAdapter};

#[cfg(feature = "napi")]
pub use compiler::compile_jsx_native;

#[cfg(feature = "napi")]
#[napi]
pub fn compiler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
