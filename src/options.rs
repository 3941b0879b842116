use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_RUNTIME_MODULE: &str = "@barefootjs/dom";
pub const DEFAULT_CLIENT_DIRECTIVE: &str = "use client";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// Module the generated client JS imports its primitives from.
    pub runtime_module: String,
    pub client_directive: String,
    /// Report every warning as an error.
    pub strict: bool,
    /// Render a static shell and check element paths against it.
    pub verify_paths: bool,
    pub max_parallel_reads: usize,
    /// Probed in order for extension-less relative imports.
    pub extensions: Vec<String>,
    pub fold_constants: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            runtime_module: DEFAULT_RUNTIME_MODULE.to_string(),
            client_directive: DEFAULT_CLIENT_DIRECTIVE.to_string(),
            strict: false,
            verify_paths: false,
            max_parallel_reads: 8,
            extensions: [".tsx", ".jsx", ".ts", ".js"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fold_constants: true,
        }
    }
}

impl CompileOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        let options: CompileOptions = serde_json::from_str(json)?;
        Ok(options.normalized())
    }

    fn normalized(mut self) -> Self {
        if self.max_parallel_reads == 0 {
            self.max_parallel_reads = 1;
        }
        self
    }
}
