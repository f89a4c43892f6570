//! Schema root and output directory resolution.
//!
//! Expected layout:
//! ```text
//! <repo_root>/
//!   protobuf/                   repository schema tree (preferred)
//!   <project>/
//!     Plugins/<plugin>/         plugin root
//!       Protobuf/               bundled schema tree (fallback)
//!       Source/<module>/
//!         ThirdParty/ProtoGen   generated output
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CodegenError, Result};

/// Name of the schema directory at the repository root.
pub const REPOSITORY_SCHEMA_DIR: &str = "protobuf";

/// Name of the schema directory bundled inside the plugin.
pub const BUNDLED_SCHEMA_DIR: &str = "Protobuf";

/// Output location relative to the module directory.
pub const OUTPUT_SUBDIR: [&str; 2] = ["ThirdParty", "ProtoGen"];

/// A resolved schema source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaRoot {
    /// Schema tree found beside the project at the repository root.
    Repository(PathBuf),
    /// Schema tree shipped inside the plugin.
    Bundled(PathBuf),
}

impl SchemaRoot {
    pub fn path(&self) -> &Path {
        match self {
            SchemaRoot::Repository(path) | SchemaRoot::Bundled(path) => path,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            SchemaRoot::Repository(path) | SchemaRoot::Bundled(path) => path,
        }
    }
}

/// Neither schema root exists.
///
/// Not a build failure: callers keep whatever bindings are already on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRootNotFound {
    /// Locations checked, in lookup order.
    pub searched: Vec<PathBuf>,
}

impl SchemaRootNotFound {
    /// The last location checked (the bundled fallback).
    pub fn fallback(&self) -> Option<&Path> {
        self.searched.last().map(PathBuf::as_path)
    }
}

impl fmt::Display for SchemaRootNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema directory not found (searched")?;
        for path in &self.searched {
            write!(f, " {}", path.display())?;
        }
        write!(f, ")")
    }
}

/// Candidate repository schema directory for a plugin root.
///
/// The project directory sits two levels above the plugin root; the
/// repository schema tree is its sibling.
pub fn repository_schema_candidate(plugin_root: &Path) -> Option<PathBuf> {
    let plugin_root = normalize(plugin_root);
    let project_dir = plugin_root.ancestors().nth(2)?;
    let repo_root = project_dir.parent()?;
    Some(repo_root.join(REPOSITORY_SCHEMA_DIR))
}

/// Locate the schema source root for a plugin.
pub fn resolve_schema_root(
    plugin_root: &Path,
) -> std::result::Result<SchemaRoot, SchemaRootNotFound> {
    let mut searched = Vec::with_capacity(2);

    if let Some(candidate) = repository_schema_candidate(plugin_root) {
        if candidate.is_dir() {
            return Ok(SchemaRoot::Repository(candidate));
        }
        searched.push(candidate);
    }

    let bundled = normalize(plugin_root).join(BUNDLED_SCHEMA_DIR);
    if bundled.is_dir() {
        return Ok(SchemaRoot::Bundled(bundled));
    }
    searched.push(bundled);

    Err(SchemaRootNotFound { searched })
}

/// Resolve (and create) the generated-output directory for a module.
pub fn resolve_output_dir(module_dir: &Path) -> Result<PathBuf> {
    let mut dir = normalize(module_dir);
    dir.extend(OUTPUT_SUBDIR);
    ensure_dir(&dir)?;
    Ok(dir)
}

/// Create a directory and its parents if missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| CodegenError::io(dir, e))
}

/// Make a path absolute without requiring it to exist.
fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin_in_repo(repo: &Path) -> PathBuf {
        let plugin = repo.join("unreal").join("Plugins").join("Grpc");
        fs::create_dir_all(&plugin).unwrap();
        plugin
    }

    #[test]
    fn prefers_repository_schemas() {
        let repo = tempfile::tempdir().unwrap();
        let plugin = plugin_in_repo(repo.path());
        fs::create_dir(repo.path().join("protobuf")).unwrap();
        fs::create_dir(plugin.join("Protobuf")).unwrap();

        let root = resolve_schema_root(&plugin).unwrap();
        assert!(matches!(root, SchemaRoot::Repository(_)));
        assert_eq!(
            root.path(),
            fs::canonicalize(repo.path()).unwrap().join("protobuf")
        );
    }

    #[test]
    fn falls_back_to_bundled_schemas() {
        let repo = tempfile::tempdir().unwrap();
        let plugin = plugin_in_repo(repo.path());
        fs::create_dir(plugin.join("Protobuf")).unwrap();

        let root = resolve_schema_root(&plugin).unwrap();
        assert!(matches!(root, SchemaRoot::Bundled(_)));
        assert!(root.path().ends_with("Grpc/Protobuf"));
    }

    #[test]
    fn not_found_lists_both_candidates() {
        let repo = tempfile::tempdir().unwrap();
        let plugin = plugin_in_repo(repo.path());

        let err = resolve_schema_root(&plugin).unwrap_err();
        assert_eq!(err.searched.len(), 2);
        assert!(err.searched[0].ends_with("protobuf"));
        assert!(err.fallback().unwrap().ends_with("Protobuf"));
        assert!(err.to_string().contains("schema directory not found"));
    }

    #[test]
    fn output_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("Source").join("Proto");
        fs::create_dir_all(&module).unwrap();

        let out = resolve_output_dir(&module).unwrap();
        assert!(out.is_dir());
        assert!(out.ends_with("ThirdParty/ProtoGen"));

        // Second call is a no-op
        assert_eq!(resolve_output_dir(&module).unwrap(), out);
    }
}
