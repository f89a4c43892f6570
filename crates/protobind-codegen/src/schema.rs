//! Schema discovery and the generated files each schema maps to.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{CodegenError, Result};

/// File extension of schema definition files.
pub const SCHEMA_EXTENSION: &str = "proto";

/// A schema definition file found under the schema root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaFile {
    // Field order gives the lexicographic ordering by relative path.
    relative: PathBuf,
    path: PathBuf,
}

/// The implementation/header pair generated for one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPair {
    pub implementation: PathBuf,
    pub header: PathBuf,
}

impl BindingPair {
    /// Whether both files are present on disk.
    pub fn exists(&self) -> bool {
        self.implementation.is_file() && self.header.is_file()
    }

    pub fn files(&self) -> [&Path; 2] {
        [&self.implementation, &self.header]
    }
}

impl SchemaFile {
    /// Construct from an absolute path and the schema root it lives under.
    pub fn new(root: &Path, path: PathBuf) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?.to_path_buf();
        Some(Self { relative, path })
    }

    /// Absolute path, as passed to the compiler.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the schema root.
    pub fn relative_path(&self) -> &Path {
        &self.relative
    }

    /// Relative path with `/` separators, stable across hosts.
    pub fn key(&self) -> String {
        self.relative.to_string_lossy().replace('\\', "/")
    }

    /// Message bindings (`<name>.pb.cc` / `<name>.pb.h`).
    pub fn binding_pair(&self, out_dir: &Path) -> BindingPair {
        BindingPair {
            implementation: out_dir.join(self.relative.with_extension("pb.cc")),
            header: out_dir.join(self.relative.with_extension("pb.h")),
        }
    }

    /// Service stubs (`<name>.grpc.pb.cc` / `<name>.grpc.pb.h`).
    pub fn service_pair(&self, out_dir: &Path) -> BindingPair {
        BindingPair {
            implementation: out_dir.join(self.relative.with_extension("grpc.pb.cc")),
            header: out_dir.join(self.relative.with_extension("grpc.pb.h")),
        }
    }

    /// Every generated file currently present for this schema.
    pub fn generated_files(&self, out_dir: &Path) -> Vec<PathBuf> {
        let bindings = self.binding_pair(out_dir);
        let services = self.service_pair(out_dir);
        [
            bindings.implementation,
            bindings.header,
            services.implementation,
            services.header,
        ]
        .into_iter()
        .filter(|p| p.is_file())
        .collect()
    }
}

/// Find every schema file under `root`, recursively, sorted by relative path.
///
/// The sort makes compiler invocation order, descriptor contents, and
/// diagnostics independent of directory enumeration order.
pub fn discover_schemas(root: &Path) -> Result<Vec<SchemaFile>> {
    let mut schemas = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            CodegenError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_schema = entry
            .path()
            .extension()
            .is_some_and(|ext| ext == SCHEMA_EXTENSION);
        if is_schema {
            if let Some(schema) = SchemaFile::new(root, entry.into_path()) {
                schemas.push(schema);
            }
        }
    }
    schemas.sort();
    Ok(schemas)
}
