//! The compile entry points.
//!
//! A compile discovers the entry's component imports, lowers every
//! component of every file on the read pool, decides which components hydrate
//! themselves, and hands the per-file results to [`crate::finalize`] for the
//! single-writer assembly step.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::analyzer::AnalysisContext;
use crate::cache::CompileCache;
use crate::code_model::ClientModule;
use crate::codegen::generate_client;
use crate::diagnostic::{has_errors, promote_warnings, Diagnostic, BF_UNSUPPORTED_RETURN};
use crate::discovery::{discover_with, find_component_files, DiscoveredFile, FsReader, SourceReader};
use crate::error::{CompileError, Result};
use crate::finalize::{finalize, ComponentOutput, FileUnit, PropInfo};
use crate::hydration::resolve_paths;
use crate::ir::ComponentIR;
use crate::jsx_lowerer::build_component_ir;
use crate::options::CompileOptions;
use crate::scope::ScopeValidator;
use crate::template::{AdapterOptions, AdapterOutput, MarkedTemplateAdapter, TemplateAdapter};
use crate::verify::verify_paths;
use crate::visitor::collect_component_names;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    /// One record per discovered file, entry first.
    pub files: Vec<ComponentOutput>,
    /// Every diagnostic of the compile, sorted by file and position.
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    pub fn file(&self, path: &str) -> Option<&ComponentOutput> {
        self.files.iter().find(|f| f.file_path == path)
    }

    /// The record whose file defines `component`.
    pub fn component(&self, component: &str) -> Option<&ComponentOutput> {
        self.files
            .iter()
            .find(|f| f.component_names.iter().any(|n| n == component))
    }

    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }
}

struct BuiltComponent {
    ir: ComponentIR,
    template: AdapterOutput,
}

/// A lowered file, before client generation.
struct BuiltFile<'d> {
    file: &'d DiscoveredFile,
    components: Vec<BuiltComponent>,
    failed: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

pub struct Compiler {
    options: CompileOptions,
    cache: CompileCache,
    adapter: Box<dyn TemplateAdapter>,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Compiler {
            options,
            cache: CompileCache::new(),
            adapter: Box::new(MarkedTemplateAdapter),
        }
    }

    pub fn with_adapter(mut self, adapter: Box<dyn TemplateAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn cache(&self) -> &CompileCache {
        &self.cache
    }

    pub fn adapter(&self) -> &dyn TemplateAdapter {
        self.adapter.as_ref()
    }

    /// Compile `entry` and every component file it transitively imports.
    #[instrument(skip(self, reader), fields(adapter = self.adapter.name()))]
    pub fn compile_jsx(&self, entry: &str, reader: &dyn SourceReader) -> Result<CompileOutput> {
        let output = self.compile_roots(&[entry.to_string()], reader)?;
        if let Some(first) = output.files.first() {
            if first.component_names.is_empty() && first.errors.is_empty() {
                return Err(CompileError::EntryWithoutComponents(entry.to_string()));
            }
        }
        Ok(output)
    }

    /// Compile every component file under `dir`, each as an entry. Files
    /// without components are left out of the result.
    #[instrument(skip(self))]
    pub fn compile_directory(&self, dir: &Path) -> Result<CompileOutput> {
        let entries = find_component_files(dir, &self.options.extensions)?;
        let mut output = self.compile_roots(&entries, &FsReader)?;
        output
            .files
            .retain(|f| !f.component_names.is_empty() || !f.errors.is_empty());
        Ok(output)
    }

    fn compile_roots(&self, entries: &[String], reader: &dyn SourceReader) -> Result<CompileOutput> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.max_parallel_reads.max(1))
            .build()?;
        let discovery = discover_with(&pool, entries, reader, &self.options, &self.cache)?;

        let files: Vec<&DiscoveredFile> = discovery.files.values().collect();
        let built: Vec<BuiltFile> =
            pool.install(|| files.par_iter().map(|file| self.build_file(*file)).collect());

        let instantiated = instantiated_components(&built, &discovery.files);
        let mut units: Vec<FileUnit> = built
            .into_iter()
            .map(|b| self.file_unit(b, &instantiated, &discovery.files))
            .collect();
        for diagnostic in discovery.diagnostics {
            if let Some(unit) = units.iter_mut().find(|u| u.path == diagnostic.file) {
                let mut diagnostic = vec![diagnostic];
                if self.options.strict {
                    promote_warnings(&mut diagnostic);
                }
                unit.diagnostics.extend(diagnostic);
            }
        }

        let (files, diagnostics) = finalize(units, self.options.strict);
        info!(
            files = files.len(),
            components = files.iter().map(|f| f.component_names.len()).sum::<usize>(),
            client_modules = files.iter().filter(|f| !f.client_js.is_empty()).count(),
            diagnostics = diagnostics.len(),
            "compile finished"
        );
        Ok(CompileOutput { files, diagnostics })
    }

    fn build_file<'d>(&self, file: &'d DiscoveredFile) -> BuiltFile<'d> {
        let analysis = &file.analysis;
        let mut built = BuiltFile {
            file,
            components: vec![],
            failed: vec![],
            diagnostics: analysis.diagnostics.clone(),
        };
        for ctx in &analysis.components {
            built.diagnostics.extend(ctx.diagnostics.iter().cloned());
            match self.build_component(ctx, &mut built.diagnostics) {
                Some(component) => built.components.push(component),
                None => {
                    debug!(component = %ctx.name, file = %file.path, "component aborted");
                    built.failed.push(ctx.name.clone());
                }
            }
        }
        built
    }

    /// `None` when an error aborts this component; its siblings carry on.
    fn build_component(
        &self,
        ctx: &AnalysisContext,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<BuiltComponent> {
        if ctx.has_errors() {
            return None;
        }
        let build = build_component_ir(ctx);
        let aborted = has_errors(&build.diagnostics);
        diagnostics.extend(build.diagnostics);
        let ir = match build.ir {
            Some(ir) if !aborted => ir,
            Some(_) => return None,
            None => {
                if !aborted {
                    diagnostics.push(
                        Diagnostic::error(
                            BF_UNSUPPORTED_RETURN,
                            format!("Component '{}' does not return JSX", ctx.name),
                            &ctx.file_path,
                            ctx.line,
                            1,
                        )
                        .in_component(&ctx.name),
                    );
                }
                return None;
            }
        };

        let unresolved = ScopeValidator::for_component(ctx).validate_ir(&ir);
        let aborted = has_errors(&unresolved);
        diagnostics.extend(unresolved);
        if aborted {
            return None;
        }
        if self.options.verify_paths {
            diagnostics.extend(verify_paths(&ir, &resolve_paths(&ir)));
        }

        let template = self.adapter.generate(
            &ir,
            &AdapterOptions {
                fold_constants: self.options.fold_constants,
            },
        );
        Some(BuiltComponent { ir, template })
    }

    fn file_unit(
        &self,
        built: BuiltFile,
        instantiated: &HashSet<(String, String)>,
        files: &indexmap::IndexMap<String, DiscoveredFile>,
    ) -> FileUnit {
        let file = built.file;
        let analysis = &file.analysis;
        let mut unit = FileUnit::new(&file.path, analysis.default_export.as_deref());
        unit.component_names = analysis.components.iter().map(|c| c.name.clone()).collect();
        unit.has_default_export = analysis.default_export.is_some();
        unit.component_props = analysis
            .components
            .iter()
            .map(|c| {
                let props = c
                    .props
                    .declared_names()
                    .into_iter()
                    .map(|name| PropInfo { name })
                    .collect();
                (c.name.clone(), props)
            })
            .collect::<BTreeMap<_, _>>();
        unit.failed_components = built.failed;

        let templates: Vec<&str> = built
            .components
            .iter()
            .map(|c| c.template.template.as_str())
            .collect();
        unit.marked_template = templates.join("\n");
        let types: Vec<&str> = built
            .components
            .iter()
            .filter_map(|c| c.template.types.as_deref())
            .collect();
        if !types.is_empty() {
            unit.types = Some(types.join("\n"));
        }

        if analysis.has_client_directive {
            let mut client = ClientModule::new(&self.options.runtime_module);
            for component in &built.components {
                let key = (file.path.clone(), component.ir.name.clone());
                client.push(generate_client(&component.ir, !instantiated.contains(&key)));
            }
            unit.client = client;
        }

        for import in &file.component_imports {
            let Some(target) = files.get(&import.path) else {
                continue;
            };
            if let Some(export) = import.exported_name(&target.analysis) {
                unit.children
                    .insert(import.local.clone(), (import.path.clone(), export));
            }
        }

        unit.diagnostics = built.diagnostics;
        if self.options.strict {
            promote_warnings(&mut unit.diagnostics);
        }
        unit
    }
}

/// `(file, component)` pairs some client-emitting component initializes;
/// everything else registers itself with `hydrate`.
fn instantiated_components(
    built: &[BuiltFile],
    files: &indexmap::IndexMap<String, DiscoveredFile>,
) -> HashSet<(String, String)> {
    let mut out = HashSet::new();
    for b in built {
        if !b.file.analysis.has_client_directive {
            continue;
        }
        let local: HashSet<&str> = b.components.iter().map(|c| c.ir.name.as_str()).collect();
        for component in &b.components {
            for tag in collect_component_names(&component.ir.root) {
                if local.contains(tag.as_str()) {
                    out.insert((b.file.path.clone(), tag));
                    continue;
                }
                let target = b
                    .file
                    .component_imports
                    .iter()
                    .find(|i| i.local == tag)
                    .and_then(|i| {
                        let target = files.get(&i.path)?;
                        Some((i.path.clone(), i.exported_name(&target.analysis)?))
                    });
                if let Some(target) = target {
                    out.insert(target);
                }
            }
        }
    }
    out
}

/// Compile with a fresh [`Compiler`].
pub fn compile_jsx(
    entry: &str,
    reader: &dyn SourceReader,
    options: CompileOptions,
) -> Result<CompileOutput> {
    Compiler::new(options).compile_jsx(entry, reader)
}

#[cfg(feature = "napi")]
mod bridge {
    use napi_derive::napi;
    use std::collections::HashMap;

    use super::Compiler;
    use crate::discovery::MemoryReader;
    use crate::options::CompileOptions;

    /// Compile in-memory sources; `files` maps paths to source text.
    #[napi]
    pub fn compile_jsx_native(
        entry: String,
        files: HashMap<String, String>,
        options_json: Option<String>,
    ) -> napi::Result<serde_json::Value> {
        let options = match options_json {
            Some(json) => CompileOptions::from_json(&json)
                .map_err(|e| napi::Error::from_reason(e.to_string()))?,
            None => CompileOptions::default(),
        };
        let mut reader = MemoryReader::new();
        for (path, source) in &files {
            reader.insert(path, source);
        }
        let output = Compiler::new(options)
            .compile_jsx(&entry, &reader)
            .map_err(|e| napi::Error::from_reason(e.to_string()))?;
        serde_json::to_value(output).map_err(|e| napi::Error::from_reason(e.to_string()))
    }
}

#[cfg(feature = "napi")]
pub use bridge::compile_jsx_native;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{BF_MISSING_CLIENT_DIRECTIVE, BF_PATH_MISMATCH, BF_UNRESOLVED_REACTIVE_CALL};
    use crate::discovery::MemoryReader;

    const COUNTER: &str = r#""use client"
import { createSignal } from '@barefootjs/dom'

export function Counter() {
  const [count, setCount] = createSignal(0)
  return <button onClick={() => setCount(count() + 1)}>{count()}</button>
}
"#;

    fn compile(reader: &MemoryReader, entry: &str, options: CompileOptions) -> CompileOutput {
        Compiler::new(options).compile_jsx(entry, reader).expect("compile")
    }

    #[test]
    fn test_single_component_output_record() {
        let reader = MemoryReader::new().with_file("/app/Counter.tsx", COUNTER);
        let out = compile(&reader, "/app/Counter.tsx", CompileOptions::default());
        assert_eq!(out.files.len(), 1);
        let file = &out.files[0];
        assert_eq!(file.component_names, vec!["Counter".to_string()]);
        assert_eq!(file.client_js_filename, format!("Counter-{}.js", file.hash));
        assert!(file.client_js.contains("hydrate('Counter', initCounter)"));
        assert!(file.marked_template.contains("data-bf-scope=\"Counter\""));
        assert!(file.types.as_deref().unwrap_or("").contains("CounterProps"));
        assert!(!out.has_errors());
    }

    #[test]
    fn test_sibling_component_survives_error() {
        let src = r#""use client"
import { createSignal } from '@barefootjs/dom'

export function Good() {
  const [on, setOn] = createSignal(false)
  return <button onClick={() => setOn(!on())}>{on() ? 'on' : 'off'}</button>
}

export function Bad() {
  return <p>{missing()}</p>
}
"#;
        let reader = MemoryReader::new().with_file("/app/Pair.tsx", src);
        let out = compile(&reader, "/app/Pair.tsx", CompileOptions::default());
        let file = &out.files[0];
        assert_eq!(file.failed_components, vec!["Bad".to_string()]);
        assert!(file.client_js.contains("export function initGood"));
        assert!(!file.client_js.contains("initBad"));
        assert!(file
            .errors
            .iter()
            .any(|e| e.code == BF_UNRESOLVED_REACTIVE_CALL && e.severity == "error"));
    }

    #[test]
    fn test_missing_directive_aborts_component() {
        let src = "import { createSignal } from '@barefootjs/dom'\nexport function Counter({ initial }) {\n  const [n, setN] = createSignal(initial)\n  return <p>{n()}</p>\n}\n";
        let reader = MemoryReader::new().with_file("/app/Counter.tsx", src);
        let out = compile(&reader, "/app/Counter.tsx", CompileOptions::default());
        let file = &out.files[0];
        assert_eq!(file.client_js, "");
        assert_eq!(file.client_js_filename, "");
        assert!(file.errors.iter().any(|e| e.code == BF_MISSING_CLIENT_DIRECTIVE));
        assert_eq!(file.failed_components, vec!["Counter".to_string()]);
    }

    #[test]
    fn test_entry_without_components_is_error() {
        let reader = MemoryReader::new().with_file("/app/util.ts", "export const x = 1\n");
        let err = Compiler::new(CompileOptions::default())
            .compile_jsx("/app/util.ts", &reader)
            .unwrap_err();
        assert!(matches!(err, CompileError::EntryWithoutComponents(_)));
    }

    #[test]
    fn test_child_instantiated_by_parent_is_not_auto_hydrated() {
        let parent = r#""use client"
import { createSignal } from '@barefootjs/dom'
import { Counter } from './Counter'

export default function Page() {
  const [title] = createSignal('Hi')
  return <main><h1>{title()}</h1><Counter /></main>
}
"#;
        let reader = MemoryReader::new()
            .with_file("/app/Page.tsx", parent)
            .with_file("/app/Counter.tsx", COUNTER);
        let out = compile(&reader, "/app/Page.tsx", CompileOptions::default());
        let page = out.file("/app/Page.tsx").unwrap();
        let counter = out.component("Counter").unwrap();
        assert!(page.client_js.contains(&format!(
            "import {{ initCounter, renderCounter }} from './{}'",
            counter.client_js_filename
        )));
        assert!(page.client_js.contains("hydrate('Page', initPage)"));
        assert!(!counter.client_js.contains("hydrate("));
        assert_eq!(page.client_js_filename, format!("Page-{}.js", page.hash));
    }

    #[test]
    fn test_strict_promotes_warnings() {
        let src = "\"use client\"\nimport { unused } from './x'\nexport function A() { return <div>a</div> }\n";
        let reader = MemoryReader::new().with_file("/app/A.tsx", src);
        let lax = compile(&reader, "/app/A.tsx", CompileOptions::default());
        assert!(!lax.has_errors());
        assert!(!lax.diagnostics.is_empty());
        let strict = compile(
            &reader,
            "/app/A.tsx",
            CompileOptions {
                strict: true,
                ..CompileOptions::default()
            },
        );
        assert!(strict.has_errors());
        // generation is not retracted
        assert_eq!(strict.files[0].marked_template, lax.files[0].marked_template);
    }

    #[test]
    fn test_cache_reuses_unchanged_analysis() {
        let reader = MemoryReader::new().with_file("/app/Counter.tsx", COUNTER);
        let compiler = Compiler::new(CompileOptions::default());
        let first = compiler.compile_jsx("/app/Counter.tsx", &reader).unwrap();
        assert_eq!(compiler.cache().len(), 1);
        let second = compiler.compile_jsx("/app/Counter.tsx", &reader).unwrap();
        assert_eq!(first, second);
        compiler.cache().reset();
        assert!(compiler.cache().is_empty());
    }

    #[test]
    fn test_verify_paths_reports_reshaped_markup() {
        let src = r#""use client"
import { createSignal } from '@barefootjs/dom'
export function C() {
  const [n, setN] = createSignal(0)
  return <section><p><div>x</div><button onClick={() => setN(n() + 1)}>+</button></p></section>
}
"#;
        let reader = MemoryReader::new().with_file("/app/C.tsx", src);
        let options = CompileOptions {
            verify_paths: true,
            ..CompileOptions::default()
        };
        let out = compile(&reader, "/app/C.tsx", options);
        assert!(out.diagnostics.iter().any(|d| d.code == BF_PATH_MISMATCH));
        assert!(!out.has_errors());
        assert!(!out.files[0].client_js.is_empty());
    }

    #[test]
    fn test_compile_directory() {
        let dir = std::env::temp_dir().join(format!("bf-compile-dir-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Counter.tsx"), COUNTER).unwrap();
        std::fs::write(dir.join("util.ts"), "export const x = 1\n").unwrap();
        let out = Compiler::new(CompileOptions::default())
            .compile_directory(&dir)
            .unwrap();
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(out.files.len(), 1);
        assert_eq!(out.files[0].component_names, vec!["Counter".to_string()]);
    }
}
