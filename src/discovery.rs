//! Source discovery.
//!
//! Starting from an entry file, follows relative imports of rendered
//! components until no new file turns up. Reads go through a
//! [`SourceReader`] so tests and the Node bridge can compile in-memory
//! sources; each breadth-first layer is read and analyzed on a bounded
//! rayon pool.

use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::analyzer::{analyze_file, FileAnalysis, ImportedName};
use crate::cache::CompileCache;
use crate::diagnostic::{Diagnostic, BF_UNRESOLVED_IMPORT};
use crate::error::{CompileError, Result};
use crate::options::CompileOptions;

// ═══════════════════════════════════════════════════════════════════════════════
// READERS
// ═══════════════════════════════════════════════════════════════════════════════

pub trait SourceReader: Send + Sync {
    fn read(&self, path: &str) -> io::Result<String>;

    fn exists(&self, path: &str) -> bool {
        self.read(path).is_ok()
    }
}

/// Sources held in memory, keyed by normalized path.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    files: HashMap<String, String>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, source: &str) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: &str, source: &str) {
        self.files.insert(normalize_path(path), source.to_string());
    }
}

impl SourceReader for MemoryReader {
    fn read(&self, path: &str) -> io::Result<String> {
        self.files
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no source for {}", path)))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_path(path))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl SourceReader for FsReader {
    fn read(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATH ALGEBRA
// ═══════════════════════════════════════════════════════════════════════════════

/// Collapse `.` and `..` segments and duplicate separators. Leading `..`
/// segments of a relative path are kept.
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split(|c| c == '/' || c == '\\') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "",
    }
}

/// `specifier` (`./x`, `../y/z`) relative to the file `importer`.
pub fn join_relative(importer: &str, specifier: &str) -> String {
    let base = dirname(importer);
    if base.is_empty() {
        normalize_path(specifier)
    } else {
        normalize_path(&format!("{}/{}", base, specifier))
    }
}

/// Resolve a relative import to an existing file: the exact path, then the
/// path with each extension, then an `index` file in that directory.
pub fn resolve_import(
    importer: &str,
    specifier: &str,
    extensions: &[String],
    reader: &dyn SourceReader,
) -> Option<String> {
    let target = join_relative(importer, specifier);
    let has_extension = extensions.iter().any(|ext| target.ends_with(ext.as_str()));
    if has_extension && reader.exists(&target) {
        return Some(target);
    }
    extensions
        .iter()
        .map(|ext| format!("{}{}", target, ext))
        .chain(extensions.iter().map(|ext| format!("{}/index{}", target, ext)))
        .find(|candidate| reader.exists(candidate))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSITIVE DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

/// A rendered component imported from another discovered file.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentImport {
    /// Tag name used in the importing file.
    pub local: String,
    pub imported: ImportedName,
    pub path: String,
}

impl ComponentImport {
    /// Component name the import refers to inside `target`.
    pub fn exported_name(&self, target: &FileAnalysis) -> Option<String> {
        match &self.imported {
            ImportedName::Named(name) => Some(name.clone()),
            ImportedName::Default => target.default_export.clone(),
            ImportedName::Namespace => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: String,
    pub analysis: Arc<FileAnalysis>,
    pub component_imports: Vec<ComponentImport>,
}

#[derive(Debug, Default)]
pub struct Discovery {
    /// Discovery order, entry first.
    pub files: IndexMap<String, DiscoveredFile>,
    pub diagnostics: Vec<Diagnostic>,
}

fn load(
    path: &str,
    reader: &dyn SourceReader,
    options: &CompileOptions,
    cache: &CompileCache,
) -> io::Result<Arc<FileAnalysis>> {
    let source = reader.read(path)?;
    if let Some(hit) = cache.get(path, &source) {
        return Ok(hit);
    }
    let analysis = Arc::new(analyze_file(&source, path, &options.client_directive));
    cache.insert(path, &source, Arc::clone(&analysis));
    Ok(analysis)
}

pub fn discover(
    entry: &str,
    reader: &dyn SourceReader,
    options: &CompileOptions,
    cache: &CompileCache,
) -> Result<Discovery> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.max_parallel_reads.max(1))
        .build()?;
    discover_with(&pool, &[entry.to_string()], reader, options, cache)
}

/// Discovery from several roots on an existing pool. Every root must be
/// readable; imports that are not become BF106 warnings.
pub fn discover_with(
    pool: &rayon::ThreadPool,
    entries: &[String],
    reader: &dyn SourceReader,
    options: &CompileOptions,
    cache: &CompileCache,
) -> Result<Discovery> {
    let mut roots: Vec<String> = Vec::new();
    for entry in entries {
        let entry = normalize_path(entry);
        if !roots.contains(&entry) {
            roots.push(entry);
        }
    }
    let mut discovery = Discovery::default();
    let mut seen: HashSet<String> = roots.iter().cloned().collect();
    let mut frontier = roots.clone();
    let mut depth = 0usize;

    while !frontier.is_empty() {
        let loaded: Vec<(String, io::Result<Arc<FileAnalysis>>)> = pool.install(|| {
            frontier
                .par_iter()
                .map(|path| (path.clone(), load(path, reader, options, cache)))
                .collect()
        });
        debug!(depth, files = loaded.len(), "discovery layer loaded");

        let mut next = Vec::new();
        for (path, result) in loaded {
            let analysis = match result {
                Ok(analysis) => analysis,
                Err(e) if roots.contains(&path) => return Err(CompileError::read(&path, e)),
                // imports are only queued once they resolve, so this is a racing read
                Err(e) => {
                    warn!(file = %path, error = %e, "import became unreadable");
                    continue;
                }
            };

            let mut component_imports = Vec::new();
            for import in &analysis.imports {
                if import.type_only || !import.is_relative() || !analysis.jsx_tags.contains(&import.local) {
                    continue;
                }
                match resolve_import(&path, &import.source, &options.extensions, reader) {
                    Some(resolved) => {
                        if seen.insert(resolved.clone()) {
                            next.push(resolved.clone());
                        }
                        component_imports.push(ComponentImport {
                            local: import.local.clone(),
                            imported: import.imported.clone(),
                            path: resolved,
                        });
                    }
                    None => {
                        warn!(file = %path, import = %import.source, "component import did not resolve");
                        discovery.diagnostics.push(
                            Diagnostic::warning(
                                BF_UNRESOLVED_IMPORT,
                                format!(
                                    "Cannot resolve '{}' imported as <{}>",
                                    import.source, import.local
                                ),
                                &path,
                                import.line,
                                1,
                            )
                            .with_hint("The component is rendered without client JS"),
                        );
                    }
                }
            }

            discovery.files.insert(
                path.clone(),
                DiscoveredFile {
                    path,
                    analysis,
                    component_imports,
                },
            );
        }
        frontier = next;
        depth += 1;
    }

    debug!(roots = roots.len(), files = discovery.files.len(), "discovery complete");
    Ok(discovery)
}

/// Every file under `dir` with one of `extensions`, sorted.
pub fn find_component_files(dir: &Path, extensions: &[String]) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_string_lossy().replace('\\', "/");
        if extensions.iter().any(|ext| path.ends_with(ext.as_str())) && !path.ends_with(".d.ts") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        CompileOptions::default().extensions
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a/./b/../c"), "/a/c");
        assert_eq!(normalize_path("a//b/"), "a/b");
        assert_eq!(normalize_path("../x/y"), "../x/y");
        assert_eq!(normalize_path("/../x"), "/x");
    }

    #[test]
    fn test_join_relative() {
        assert_eq!(join_relative("/src/app/Page.tsx", "./Button"), "/src/app/Button");
        assert_eq!(join_relative("/src/app/Page.tsx", "../ui/Card"), "/src/ui/Card");
        assert_eq!(join_relative("Page.tsx", "./Card"), "Card");
    }

    #[test]
    fn test_resolve_import_probes_extensions() {
        let reader = MemoryReader::new()
            .with_file("/src/Button.tsx", "")
            .with_file("/src/ui/index.jsx", "")
            .with_file("/src/util.ts", "");
        let r = |spec: &str| resolve_import("/src/Page.tsx", spec, &exts(), &reader);
        assert_eq!(r("./Button").as_deref(), Some("/src/Button.tsx"));
        assert_eq!(r("./Button.tsx").as_deref(), Some("/src/Button.tsx"));
        assert_eq!(r("./ui").as_deref(), Some("/src/ui/index.jsx"));
        assert_eq!(r("./Missing"), None);
    }

    #[test]
    fn test_discovery_follows_rendered_component_imports() {
        let reader = MemoryReader::new()
            .with_file(
                "/src/Page.tsx",
                "import { Card } from './Card'\nimport { format } from './format'\nexport default function Page() { return <main><Card title={format('x')} /></main> }",
            )
            .with_file(
                "/src/Card.tsx",
                "import { Badge } from './Badge'\nexport function Card({ title }) { return <div>{title}<Badge /></div> }",
            )
            .with_file("/src/Badge.tsx", "export function Badge() { return <i>b</i> }")
            .with_file("/src/format.ts", "export const format = (s) => s");
        let cache = CompileCache::new();
        let found = discover("/src/Page.tsx", &reader, &CompileOptions::default(), &cache).unwrap();
        let paths: Vec<&str> = found.files.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["/src/Page.tsx", "/src/Card.tsx", "/src/Badge.tsx"]);
        assert!(found.diagnostics.is_empty());
        assert_eq!(found.files["/src/Page.tsx"].component_imports[0].path, "/src/Card.tsx");
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_unresolved_import_is_warning() {
        let reader = MemoryReader::new().with_file(
            "/src/Page.tsx",
            "import { Gone } from './Gone'\nexport function Page() { return <Gone /> }",
        );
        let found = discover("/src/Page.tsx", &reader, &CompileOptions::default(), &CompileCache::new()).unwrap();
        assert_eq!(found.files.len(), 1);
        assert_eq!(found.diagnostics.len(), 1);
        assert_eq!(found.diagnostics[0].code, BF_UNRESOLVED_IMPORT);
        assert!(!found.diagnostics[0].is_error());
    }

    #[test]
    fn test_missing_entry_is_hard_error() {
        let err = discover("/nope.tsx", &MemoryReader::new(), &CompileOptions::default(), &CompileCache::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::SourceRead { .. }));
    }

    #[test]
    fn test_cycles_terminate() {
        let reader = MemoryReader::new()
            .with_file("/a/A.tsx", "import { B } from './B'\nexport function A() { return <B /> }")
            .with_file("/a/B.tsx", "import { A } from './A'\nexport function B() { return <A /> }");
        let found = discover("/a/A.tsx", &reader, &CompileOptions::default(), &CompileCache::new()).unwrap();
        assert_eq!(found.files.len(), 2);
    }

    #[test]
    fn test_find_component_files_walks_directory() {
        let dir = std::env::temp_dir().join(format!("bf-discovery-{}", std::process::id()));
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("A.tsx"), "").unwrap();
        fs::write(dir.join("nested/B.jsx"), "").unwrap();
        fs::write(dir.join("notes.md"), "").unwrap();
        fs::write(dir.join("types.d.ts"), "").unwrap();
        let files = find_component_files(&dir, &exts()).unwrap();
        fs::remove_dir_all(&dir).ok();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("A.tsx"));
        assert!(files[1].ends_with("nested/B.jsx"));
    }
}
