//! Compiler configuration.
//!
//! The CLI layers its flags over an optional `forge.toml` project file:
//!
//! ```toml
//! stdlib_root = "vendor/stdlib"
//! package_roots = ["vendor/packages"]
//! target = "x86_64-pc-linux-gnu"
//! ```
//!
//! Relative paths in the file resolve against the file's directory.
//! Unknown keys are rejected so typos surface instead of silently doing
//! nothing.

use crate::platform::TargetPlatform;
use crate::token::Dialect;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Roots and target selection for one compiler invocation.
#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    pub stdlib_root: Option<PathBuf>,
    pub project_root: Option<PathBuf>,
    pub package_roots: Vec<PathBuf>,
    /// LLVM triple; `None` compiles for the host.
    pub target: Option<String>,
    /// Forced dialect; `None` picks by file extension.
    pub dialect: Option<Dialect>,
}

/// On-disk shape of `forge.toml`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    stdlib_root: Option<PathBuf>,
    project_root: Option<PathBuf>,
    #[serde(default)]
    package_roots: Vec<PathBuf>,
    target: Option<String>,
    dialect: Option<String>,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_stdlib_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.stdlib_root = Some(root.into());
        self
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn with_target(mut self, triple: impl Into<String>) -> Self {
        self.target = Some(triple.into());
        self
    }

    /// Load and validate a `forge.toml`. Relative paths resolve against
    /// the file's directory.
    pub fn from_toml_file(path: &Path) -> Result<CompilerConfig, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        let file: ConfigFile = toml::from_str(&text)
            .map_err(|e| format!("invalid configuration in '{}': {}", path.display(), e))?;
        let base = path.parent().unwrap_or(Path::new("."));
        let anchor = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

        let dialect = match file.dialect.as_deref() {
            None => None,
            Some("razorforge") => Some(Dialect::RazorForge),
            Some("suflae") => Some(Dialect::Suflae),
            Some(other) => {
                return Err(format!(
                    "unknown dialect '{}' in '{}' (expected 'razorforge' or 'suflae')",
                    other,
                    path.display()
                ));
            }
        };

        Ok(CompilerConfig {
            stdlib_root: file.stdlib_root.map(anchor),
            project_root: file.project_root.map(anchor),
            package_roots: file.package_roots.into_iter().map(anchor).collect(),
            target: file.target,
            dialect,
        })
    }

    /// Resolve the target platform, defaulting to the host.
    pub fn platform(&self) -> Result<TargetPlatform, String> {
        match &self.target {
            None => Ok(TargetPlatform::host()),
            Some(triple) => TargetPlatform::from_triple(triple).ok_or_else(|| {
                let supported: Vec<&str> = TargetPlatform::supported_triples().collect();
                format!(
                    "unsupported target '{}'; supported: {}",
                    triple,
                    supported.join(", ")
                )
            }),
        }
    }

    /// Dialect for a source file: the forced dialect if set, otherwise
    /// by extension.
    pub fn dialect_for(&self, path: &Path) -> Option<Dialect> {
        self.dialect.or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(Dialect::from_extension)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_toml_and_anchors_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("forge.toml");
        fs::write(
            &file,
            "stdlib_root = \"vendor/stdlib\"\ntarget = \"x86_64-pc-linux-gnu\"\ndialect = \"razorforge\"\n",
        )
        .unwrap();
        let config = CompilerConfig::from_toml_file(&file).unwrap();
        assert_eq!(
            config.stdlib_root.clone().unwrap(),
            dir.path().join("vendor/stdlib")
        );
        assert_eq!(config.dialect, Some(Dialect::RazorForge));
        assert_eq!(config.platform().unwrap().triple, "x86_64-pc-linux-gnu");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("forge.toml");
        fs::write(&file, "no_such_key = true\n").unwrap();
        assert!(CompilerConfig::from_toml_file(&file).is_err());
    }

    #[test]
    fn unknown_target_is_an_error() {
        let config = CompilerConfig::new().with_target("pdp11-unknown-unknown");
        assert!(config.platform().is_err());
    }

    #[test]
    fn dialect_follows_extension_unless_forced() {
        let config = CompilerConfig::new();
        assert_eq!(
            config.dialect_for(Path::new("a.rf")),
            Some(Dialect::RazorForge)
        );
        assert_eq!(config.dialect_for(Path::new("a.sf")), Some(Dialect::Suflae));
        assert_eq!(config.dialect_for(Path::new("a.txt")), None);

        let forced = CompilerConfig { dialect: Some(Dialect::Suflae), ..CompilerConfig::new() };
        assert_eq!(forced.dialect_for(Path::new("a.rf")), Some(Dialect::Suflae));
    }
}
