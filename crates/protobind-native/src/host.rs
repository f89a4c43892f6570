//! Everything the host build consumes, in one record.

use std::path::{Path, PathBuf};

use protobind_targets::{Platform, PragmaDialect};
use serde::Serialize;

use crate::bundle::{gather_header_paths, gather_platform_libraries, NativeLayout, RuntimeArtifact};
use crate::definitions::{host_definitions, Definition};
use crate::error::Result;
use crate::renames::RenameTable;

/// Include paths, link inputs, runtime artifacts and definitions for one
/// platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostBuildConfig {
    pub platform: Platform,
    pub include_paths: Vec<PathBuf>,
    pub link_libraries: Vec<PathBuf>,
    pub runtime_artifacts: Vec<RuntimeArtifact>,
    pub runtime_library_paths: Vec<PathBuf>,
    pub delay_load: Vec<String>,
    pub definitions: Vec<Definition>,
    /// Files whose change must invalidate the host build.
    pub external_dependencies: Vec<PathBuf>,
}

impl HostBuildConfig {
    pub fn resolve(
        platform: Platform,
        layout: &NativeLayout,
        renames: &RenameTable,
    ) -> Result<Self> {
        let definitions = host_definitions(platform, renames)?;
        let bundle = gather_platform_libraries(platform, layout)?;
        Ok(Self {
            platform,
            include_paths: gather_header_paths(layout),
            link_libraries: bundle.link_libraries,
            runtime_artifacts: bundle.runtime_artifacts,
            runtime_library_paths: vec![bundle.library_dir],
            delay_load: bundle.delay_load,
            definitions,
            external_dependencies: Vec::new(),
        })
    }

    pub fn with_external_dependencies<P: AsRef<Path>>(
        mut self,
        deps: impl IntoIterator<Item = P>,
    ) -> Self {
        self.external_dependencies
            .extend(deps.into_iter().map(|p| p.as_ref().to_path_buf()));
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build-script directives for a Cargo host.
    pub fn cargo_directives(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for dir in &self.runtime_library_paths {
            lines.push(format!("cargo:rustc-link-search=native={}", dir.display()));
        }
        for lib in &self.link_libraries {
            lines.push(format!("cargo:rustc-link-arg={}", lib.display()));
        }
        for dll in &self.delay_load {
            lines.push(format!("cargo:rustc-link-arg=/DELAYLOAD:{dll}"));
        }
        for dir in &self.include_paths {
            lines.push(format!("cargo:include={}", dir.display()));
        }
        for dep in &self.external_dependencies {
            lines.push(format!("cargo:rerun-if-changed={}", dep.display()));
        }
        lines
    }

    /// Compiler command-line flags for units including the runtime headers.
    pub fn compiler_flags(&self, dialect: PragmaDialect) -> Vec<String> {
        let (include, define) = match dialect {
            PragmaDialect::Msvc => ("/I", "/D"),
            PragmaDialect::Gnu | PragmaDialect::Portable => ("-I", "-D"),
        };
        let includes = self
            .include_paths
            .iter()
            .map(|dir| format!("{include}{}", dir.display()));
        let defines = self.definitions.iter().map(|def| format!("{define}{def}"));
        includes.chain(defines).collect()
    }
}
