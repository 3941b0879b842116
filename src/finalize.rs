//! Output assembly.
//!
//! Runs once every file has been generated. Client modules are rendered in
//! dependency order so a parent's child imports can name the child's
//! hash-bearing file; placeholders whose child produced no client JS are
//! dropped. Files that import each other are hashed as one group and then
//! rendered again with each other's final filenames.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::analyzer::component_name_from_path;
use crate::code_model::{ChildLink, ClientModule, RenderedModule};
use crate::diagnostic::{
    promote_warnings, sort_diagnostics, Diagnostic, ReportedError, BF_IMPORT_CYCLE,
    BF_INVALID_CLIENT_JS,
};
use crate::parse::js_syntax_errors;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropInfo {
    pub name: String,
}

/// Everything generated for one source file, before child placeholders are
/// resolved.
#[derive(Debug, Clone)]
pub struct FileUnit {
    pub path: String,
    /// Base of the client JS filename.
    pub output_name: String,
    pub component_names: Vec<String>,
    pub marked_template: String,
    pub types: Option<String>,
    pub client: ClientModule,
    pub component_props: BTreeMap<String, Vec<PropInfo>>,
    pub has_default_export: bool,
    pub failed_components: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// Tag name in this file -> (defining file, exported component name).
    pub children: HashMap<String, (String, String)>,
}

impl FileUnit {
    pub fn new(path: &str, output_name: Option<&str>) -> Self {
        FileUnit {
            path: path.to_string(),
            output_name: output_name
                .map(str::to_string)
                .unwrap_or_else(|| component_name_from_path(path)),
            component_names: vec![],
            marked_template: String::new(),
            types: None,
            client: ClientModule::default(),
            component_props: BTreeMap::new(),
            has_default_export: false,
            failed_components: vec![],
            diagnostics: vec![],
            children: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentOutput {
    pub file_path: String,
    pub component_names: Vec<String>,
    pub marked_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
    pub client_js: String,
    pub hash: String,
    pub client_js_filename: String,
    pub component_props: BTreeMap<String, Vec<PropInfo>>,
    pub has_default_export: bool,
    pub errors: Vec<ReportedError>,
    pub failed_components: Vec<String>,
}

/// First 8 hex digits of the SHA-256 of `code`, ignoring trailing
/// whitespace and line-ending style.
pub fn content_hash(code: &str) -> String {
    let normalized: Vec<&str> = code.lines().map(str::trim_end).collect();
    let normalized = normalized.join("\n");
    let normalized = normalized.trim_end();
    let digest = Sha256::digest(normalized.as_bytes());
    digest.iter().take(4).map(|b| format!("{:02x}", b)).collect()
}

pub fn client_filename(name: &str, hash: &str) -> String {
    format!("{}-{}.js", name, hash)
}

/// Component import graph: for each unit, the units its child tags resolve to.
fn import_edges(units: &[FileUnit]) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = units
        .iter()
        .enumerate()
        .map(|(i, u)| (u.path.as_str(), i))
        .collect();
    units
        .iter()
        .enumerate()
        .map(|(i, u)| {
            let mut deps: Vec<usize> = u
                .children
                .values()
                .filter_map(|(path, _)| index.get(path.as_str()).copied())
                .filter(|&d| d != i)
                .collect();
            deps.sort_unstable();
            deps.dedup();
            deps
        })
        .collect()
}

struct Tarjan<'e> {
    edges: &'e [Vec<usize>],
    index: Vec<Option<usize>>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next: usize,
    groups: Vec<Vec<usize>>,
}

impl Tarjan<'_> {
    fn connect(&mut self, v: usize) {
        self.index[v] = Some(self.next);
        self.low[v] = self.next;
        self.next += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
        for k in 0..self.edges[v].len() {
            let w = self.edges[v][k];
            match self.index[w] {
                None => {
                    self.connect(w);
                    self.low[v] = self.low[v].min(self.low[w]);
                }
                Some(wi) if self.on_stack[w] => self.low[v] = self.low[v].min(wi),
                Some(_) => {}
            }
        }
        if self.index[v] == Some(self.low[v]) {
            let mut group = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                group.push(w);
                if w == v {
                    break;
                }
            }
            group.sort_unstable();
            self.groups.push(group);
        }
    }
}

/// Strongly connected groups of the import graph, children first: a group
/// is listed after every group it imports from.
fn dependency_groups(units: &[FileUnit]) -> Vec<Vec<usize>> {
    let edges = import_edges(units);
    let n = units.len();
    let mut tarjan = Tarjan {
        edges: &edges,
        index: vec![None; n],
        low: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        next: 0,
        groups: Vec::new(),
    };
    for v in 0..n {
        if tarjan.index[v].is_none() {
            tarjan.connect(v);
        }
    }
    let mut groups = tarjan.groups;
    for group in &mut groups {
        group.sort_by(|&a, &b| units[a].path.cmp(&units[b].path));
    }
    groups
}

/// How a parent reaches an already placed child module.
#[derive(Debug, Clone)]
struct Placed {
    filename: String,
    emitted: Vec<String>,
}

fn child_link(
    units: &[FileUnit],
    index: &HashMap<&str, usize>,
    placed: &[Option<Placed>],
    unit: &FileUnit,
    tag: &str,
) -> ChildLink {
    let Some((path, export)) = unit.children.get(tag) else {
        return ChildLink::Absent;
    };
    let Some(&target) = index.get(path.as_str()) else {
        return ChildLink::Absent;
    };
    match &placed[target] {
        Some(p) if p.emitted.iter().any(|n| n == export) => ChildLink::Module {
            filename: p.filename.clone(),
            export: export.clone(),
        },
        _ => {
            if placed[target].is_none() {
                debug!(file = %unit.path, child = %units[target].path, "child module not placed");
            }
            ChildLink::Absent
        }
    }
}

/// Hash of a module in an import cycle: its own code with the cycle's
/// imports unhashed, salted with the digest of every member's code.
fn group_hash(code: &str, digest: &str) -> String {
    if code.is_empty() {
        content_hash("")
    } else {
        content_hash(&format!("{}\n{}", code, digest))
    }
}

/// Resolve child placeholders, hash every client module and build the
/// output records, in the order `units` were given. Also returns every
/// diagnostic of every unit, sorted.
pub fn finalize(units: Vec<FileUnit>, strict: bool) -> (Vec<ComponentOutput>, Vec<Diagnostic>) {
    let groups = dependency_groups(&units);
    let mut extra: Vec<Vec<Diagnostic>> = vec![vec![]; units.len()];
    let index: HashMap<&str, usize> = units
        .iter()
        .enumerate()
        .map(|(i, u)| (u.path.as_str(), i))
        .collect();
    let mut placed: Vec<Option<Placed>> = vec![None; units.len()];
    let mut rendered: Vec<Option<(RenderedModule, String)>> = vec![None; units.len()];

    for group in &groups {
        if let [i] = group.as_slice() {
            let unit = &units[*i];
            let module = unit
                .client
                .render(&|tag: &str| child_link(&units, &index, &placed, unit, tag));
            let hash = content_hash(&module.code);
            debug!(file = %unit.path, hash = %hash, emitted = module.emitted.len(), "rendered client module");
            placed[*i] = Some(Placed {
                filename: format!("./{}", client_filename(&unit.output_name, &hash)),
                emitted: module.emitted.clone(),
            });
            rendered[*i] = Some((module, hash));
            continue;
        }

        let files: Vec<&str> = group.iter().map(|&i| units[i].path.as_str()).collect();
        warn!(files = ?files, "component import cycle");
        let first = &units[group[0]];
        let mut cycle = vec![Diagnostic::warning(
            BF_IMPORT_CYCLE,
            format!("Import cycle between {}", files.join(", ")),
            &first.path,
            1,
            1,
        )
        .with_hint("Every file in the cycle is hashed together; a change to one renames all of them")];
        if strict {
            promote_warnings(&mut cycle);
        }
        extra[group[0]].extend(cycle);

        // unhashed names until the emitted sets settle
        for &i in group {
            placed[i] = Some(Placed {
                filename: format!("./{}.js", units[i].output_name),
                emitted: units[i].component_names.clone(),
            });
        }
        let mut drafts: Vec<RenderedModule> = Vec::new();
        for _ in 0..=group.len() {
            drafts = group
                .iter()
                .map(|&i| {
                    let unit = &units[i];
                    unit.client
                        .render(&|tag: &str| child_link(&units, &index, &placed, unit, tag))
                })
                .collect();
            let mut settled = true;
            for (&i, draft) in group.iter().zip(&drafts) {
                if let Some(p) = placed[i].as_mut() {
                    if p.emitted != draft.emitted {
                        p.emitted = draft.emitted.clone();
                        settled = false;
                    }
                }
            }
            if settled {
                break;
            }
        }

        let joined: Vec<&str> = drafts.iter().map(|d| d.code.as_str()).collect();
        let digest = content_hash(&joined.join("\n"));
        let hashes: Vec<String> = drafts.iter().map(|d| group_hash(&d.code, &digest)).collect();
        for (&i, hash) in group.iter().zip(&hashes) {
            if let Some(p) = placed[i].as_mut() {
                p.filename = format!("./{}", client_filename(&units[i].output_name, hash));
            }
        }
        for (&i, hash) in group.iter().zip(hashes) {
            let unit = &units[i];
            let module = unit
                .client
                .render(&|tag: &str| child_link(&units, &index, &placed, unit, tag));
            debug!(file = %unit.path, hash = %hash, emitted = module.emitted.len(), "rendered cyclic client module");
            rendered[i] = Some((module, hash));
        }
    }

    for (i, entry) in rendered.iter().enumerate() {
        let Some((module, _)) = entry else { continue };
        if module.code.is_empty() {
            continue;
        }
        let errors = js_syntax_errors(&module.code);
        if let Some(first) = errors.first() {
            warn!(file = %units[i].path, errors = errors.len(), "emitted client module does not parse");
            extra[i].push(Diagnostic::error(
                BF_INVALID_CLIENT_JS,
                format!("Generated client JS is not valid JavaScript: {}", first),
                &units[i].path,
                1,
                1,
            ));
        }
    }

    let mut all = Vec::new();
    let outputs = units
        .into_iter()
        .zip(rendered)
        .zip(extra)
        .map(|((unit, rendered), extra)| {
            let (module, hash) = rendered.unwrap_or_else(|| (RenderedModule::default(), content_hash("")));
            let mut diagnostics = unit.diagnostics;
            diagnostics.extend(extra);
            sort_diagnostics(&mut diagnostics);
            all.extend(diagnostics.iter().cloned());
            let client_js_filename = if module.code.is_empty() {
                String::new()
            } else {
                client_filename(&unit.output_name, &hash)
            };
            ComponentOutput {
                file_path: unit.path,
                component_names: unit.component_names,
                marked_template: unit.marked_template,
                types: unit.types,
                client_js: module.code,
                hash,
                client_js_filename,
                component_props: unit.component_props,
                has_default_export: unit.has_default_export,
                errors: diagnostics.iter().map(ReportedError::from).collect(),
                failed_components: unit.failed_components,
            }
        })
        .collect();
    sort_diagnostics(&mut all);
    (outputs, all)
}
