//! Module resolver: maps import paths to files, loads them eagerly and
//! transitively, and fixes the analysis order.
//!
//! Search order for `import A/B/C`: standard library root, then project
//! root, then external package roots. A file's `namespace X/Y`
//! declaration overrides its folder-derived path in the namespace
//! registry; later imports resolve through the registry first. Loading is
//! depth-first so dependencies land before their importers; a module
//! cache keyed by canonical import path makes re-imports idempotent.
//! Cycles report `circular import` with the in-progress chain.

use crate::ast::{DeclarationKind, NodeIdGen, Program};
use crate::config::CompilerConfig;
use crate::diagnostics::{Diagnostics, SourceMap};
use crate::lexer;
use crate::parser;
use crate::token::{Dialect, SourceLocation};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A parsed compilation unit in analysis order.
#[derive(Debug)]
pub struct LoadedModule {
    pub path: PathBuf,
    pub file_id: u32,
    /// Declared (`namespace A/B`) or folder-derived module path.
    pub namespace: Vec<String>,
    pub dialect: Dialect,
    pub program: Program,
}

/// Everything the pipeline needs after module loading.
pub struct ResolveOutput {
    /// Dependencies first, entry file last.
    pub modules: Vec<LoadedModule>,
    pub sources: SourceMap,
    pub diagnostics: Diagnostics,
    pub ids: NodeIdGen,
}

/// The namespace the prelude loads from; its symbols enter global scope
/// without an explicit import.
pub const CORE_NAMESPACE: &str = "core";

pub struct ModuleResolver<'a> {
    config: &'a CompilerConfig,
    /// Canonical import path → index into `modules`.
    cache: HashMap<String, usize>,
    /// Declared-namespace path → index into `modules`.
    namespace_registry: HashMap<String, usize>,
    /// In-progress loads, for cycle reporting.
    loading: Vec<String>,
    modules: Vec<LoadedModule>,
    sources: SourceMap,
    diagnostics: Diagnostics,
    ids: NodeIdGen,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(config: &'a CompilerConfig) -> Self {
        ModuleResolver {
            config,
            cache: HashMap::new(),
            namespace_registry: HashMap::new(),
            loading: Vec::new(),
            modules: Vec::new(),
            sources: SourceMap::new(),
            diagnostics: Diagnostics::new(),
            ids: NodeIdGen::new(),
        }
    }

    /// Load the prelude, the entry file, and the transitive closure of
    /// its imports.
    pub fn resolve_entry(mut self, entry: &Path, dialect: Dialect) -> ResolveOutput {
        self.load_prelude(dialect);

        match fs::read_to_string(entry) {
            Ok(source) => {
                let import_path = entry
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "main".to_string());
                self.load_source(&source, entry.to_path_buf(), import_path, dialect);
            }
            Err(e) => {
                self.diagnostics.error(
                    format!("cannot read '{}': {}", entry.display(), e),
                    SourceLocation::synthetic(0),
                );
            }
        }

        ResolveOutput {
            modules: self.modules,
            sources: self.sources,
            diagnostics: self.diagnostics,
            ids: self.ids,
        }
    }

    /// Entry point for in-memory sources (tests, `emit-ir` on stdin).
    pub fn resolve_source(mut self, source: &str, name: &Path, dialect: Dialect) -> ResolveOutput {
        self.load_prelude(dialect);
        let import_path = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string());
        self.load_source(source, name.to_path_buf(), import_path, dialect);
        ResolveOutput {
            modules: self.modules,
            sources: self.sources,
            diagnostics: self.diagnostics,
            ids: self.ids,
        }
    }

    /// The core prelude ships with the standard library; absent stdlib
    /// (unit tests, freestanding use) is fine because the primitive types
    /// are pre-populated in the registry.
    fn load_prelude(&mut self, dialect: Dialect) {
        let Some(stdlib) = &self.config.stdlib_root else {
            return;
        };
        let core_dir = stdlib.join(CORE_NAMESPACE);
        let Ok(entries) = fs::read_dir(&core_dir) else {
            return;
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension().and_then(|e| e.to_str())
                    == Some(if dialect == Dialect::RazorForge { "rf" } else { "sf" })
            })
            .collect();
        // Deterministic prelude order.
        files.sort();
        for file in files {
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let import_path = format!("{}/{}", CORE_NAMESPACE, stem);
            self.load_module(&import_path, SourceLocation::synthetic(0), dialect);
        }
    }

    /// Resolve and load one import path. Returns the module index, or
    /// `None` after a diagnostic.
    fn load_module(
        &mut self,
        import_path: &str,
        requested_at: SourceLocation,
        dialect: Dialect,
    ) -> Option<usize> {
        if let Some(&idx) = self.cache.get(import_path) {
            return Some(idx);
        }
        if let Some(&idx) = self.namespace_registry.get(import_path) {
            return Some(idx);
        }
        if self.loading.iter().any(|p| p == import_path) {
            let mut chain = self.loading.join(" -> ");
            chain.push_str(" -> ");
            chain.push_str(import_path);
            self.diagnostics
                .error(format!("circular import: {}", chain), requested_at);
            return None;
        }

        let Some(file) = self.find_module_file(import_path, dialect) else {
            self.diagnostics.error(
                format!("module not found: '{}'", import_path),
                requested_at,
            );
            return None;
        };
        let source = match fs::read_to_string(&file) {
            Ok(s) => s,
            Err(e) => {
                self.diagnostics.error(
                    format!("cannot read '{}': {}", file.display(), e),
                    requested_at,
                );
                return None;
            }
        };
        Some(self.load_source(&source, file, import_path.to_string(), dialect))
    }

    /// Lex + parse one unit, then eagerly load its imports before
    /// registering it, so the module list stays dependency-first.
    fn load_source(
        &mut self,
        source: &str,
        path: PathBuf,
        import_path: String,
        dialect: Dialect,
    ) -> usize {
        let file_id = self.sources.add_file(path.clone());
        self.loading.push(import_path.clone());

        let (tokens, lex_diags) = lexer::lex(source, dialect, file_id);
        self.diagnostics.extend(lex_diags);

        let ids = std::mem::take(&mut self.ids);
        let parsed = parser::parse_program(tokens, dialect, ids);
        self.ids = parsed.ids;
        self.diagnostics.extend(parsed.diagnostics);
        let program = parsed.program;

        for decl in &program.declarations {
            if let DeclarationKind::Import { path: segments, .. } = &decl.kind {
                let child = segments.join("/");
                self.load_module(&child, decl.location, dialect);
            }
        }

        self.loading.pop();

        let namespace = program
            .namespace()
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| import_path.split('/').map(str::to_string).collect());

        let idx = self.modules.len();
        self.modules.push(LoadedModule {
            path,
            file_id,
            namespace: namespace.clone(),
            dialect,
            program,
        });
        self.cache.insert(import_path, idx);
        self.namespace_registry.entry(namespace.join("/")).or_insert(idx);
        idx
    }

    /// Search order: stdlib, project, external packages.
    fn find_module_file(&self, import_path: &str, dialect: Dialect) -> Option<PathBuf> {
        let ext = if dialect == Dialect::RazorForge { "rf" } else { "sf" };
        let relative = PathBuf::from(import_path).with_extension(ext);
        let mut roots: Vec<&PathBuf> = Vec::new();
        if let Some(stdlib) = &self.config.stdlib_root {
            roots.push(stdlib);
        }
        if let Some(project) = &self.config.project_root {
            roots.push(project);
        }
        roots.extend(self.config.package_roots.iter());
        roots
            .into_iter()
            .map(|root| root.join(&relative))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn config_for(project: &Path) -> CompilerConfig {
        CompilerConfig {
            project_root: Some(project.to_path_buf()),
            ..CompilerConfig::default()
        }
    }

    #[test]
    fn loads_dependencies_before_importers() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "util.rf", "routine helper() { return }\n");
        let main = write(dir.path(), "main.rf", "import util\nroutine start() { }\n");

        let config = config_for(dir.path());
        let out = ModuleResolver::new(&config).resolve_entry(&main, Dialect::RazorForge);
        assert!(!out.diagnostics.had_error(), "{:?}", out.diagnostics);
        assert_eq!(out.modules.len(), 2);
        assert_eq!(out.modules[0].namespace, vec!["util"]);
        assert_eq!(out.modules[1].namespace, vec!["main"]);
    }

    #[test]
    fn namespace_declaration_overrides_folder_path() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "lib/inner.rf",
            "namespace custom/space\nroutine helper() { return }\n",
        );
        let main = write(dir.path(), "main.rf", "import lib/inner\nroutine start() { }\n");

        let config = config_for(dir.path());
        let out = ModuleResolver::new(&config).resolve_entry(&main, Dialect::RazorForge);
        assert!(!out.diagnostics.had_error(), "{:?}", out.diagnostics);
        assert_eq!(out.modules[0].namespace, vec!["custom", "space"]);
    }

    #[test]
    fn repeated_imports_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "shared.rf", "routine thing() { return }\n");
        write(dir.path(), "a.rf", "import shared\nroutine a() { return }\n");
        write(dir.path(), "b.rf", "import shared\nroutine b() { return }\n");
        let main = write(dir.path(), "main.rf", "import a\nimport b\nroutine start() { }\n");

        let config = config_for(dir.path());
        let out = ModuleResolver::new(&config).resolve_entry(&main, Dialect::RazorForge);
        assert!(!out.diagnostics.had_error(), "{:?}", out.diagnostics);
        let shared_count = out
            .modules
            .iter()
            .filter(|m| m.namespace == vec!["shared".to_string()])
            .count();
        assert_eq!(shared_count, 1);
        assert_eq!(out.modules.len(), 4);
    }

    #[test]
    fn circular_imports_are_reported_with_chain() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "x.rf", "import y\nroutine fx() { return }\n");
        write(dir.path(), "y.rf", "import x\nroutine fy() { return }\n");
        let main = write(dir.path(), "main.rf", "import x\nroutine start() { }\n");

        let config = config_for(dir.path());
        let out = ModuleResolver::new(&config).resolve_entry(&main, Dialect::RazorForge);
        assert!(out.diagnostics.had_error());
        assert!(out
            .diagnostics
            .iter()
            .any(|d| d.message.contains("circular import") && d.message.contains("x -> y -> x")));
    }

    #[test]
    fn stdlib_searched_before_project() {
        let dir = tempfile::tempdir().unwrap();
        let stdlib = dir.path().join("stdlib");
        let project = dir.path().join("project");
        write(&stdlib, "text.rf", "routine stdlib_version() { return }\n");
        write(&project, "text.rf", "routine project_version() { return }\n");
        let main = write(&project, "main.rf", "import text\nroutine start() { }\n");

        let config = CompilerConfig {
            stdlib_root: Some(stdlib),
            project_root: Some(project),
            ..CompilerConfig::default()
        };
        let out = ModuleResolver::new(&config).resolve_entry(&main, Dialect::RazorForge);
        assert!(!out.diagnostics.had_error(), "{:?}", out.diagnostics);
        let text = out
            .modules
            .iter()
            .find(|m| m.namespace == vec!["text".to_string()])
            .unwrap();
        assert!(text.path.starts_with(dir.path().join("stdlib")));
    }

    #[test]
    fn missing_module_is_a_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(dir.path(), "main.rf", "import nowhere/to/be/found\n");
        let config = config_for(dir.path());
        let out = ModuleResolver::new(&config).resolve_entry(&main, Dialect::RazorForge);
        assert!(out
            .diagnostics
            .iter()
            .any(|d| d.message.contains("module not found")));
    }

    #[test]
    fn prelude_core_files_load_first() {
        let dir = tempfile::tempdir().unwrap();
        let stdlib = dir.path().join("stdlib");
        write(&stdlib, "core/primitives.rf", "routine core_thing() { return }\n");
        let project = dir.path().join("project");
        let main = write(&project, "main.rf", "routine start() { }\n");

        let config = CompilerConfig {
            stdlib_root: Some(stdlib),
            project_root: Some(project),
            ..CompilerConfig::default()
        };
        let out = ModuleResolver::new(&config).resolve_entry(&main, Dialect::RazorForge);
        assert!(!out.diagnostics.had_error(), "{:?}", out.diagnostics);
        assert_eq!(out.modules[0].namespace, vec!["core", "primitives"]);
        assert_eq!(out.modules.last().unwrap().namespace, vec!["main"]);
    }
}
