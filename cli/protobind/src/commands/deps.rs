//! `protobind deps`: render the native dependency feed for the host build.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use protobind_codegen::{discover_schemas, resolve_schema_root};
use protobind_native::{HostBuildConfig, NativeLayout};
use protobind_targets::Platform;

use crate::manifest::Project;

/// Output format of `protobind deps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Cargo,
    Flags,
}

impl Format {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "json" => Ok(Format::Json),
            "cargo" => Ok(Format::Cargo),
            "flags" => Ok(Format::Flags),
            other => bail!("unknown format '{other}' (expected json, cargo or flags)"),
        }
    }
}

/// Schema files the host build must track, if a schema root exists.
fn schema_dependencies(project: &Project) -> Result<Vec<PathBuf>> {
    let root = match project.schema_root() {
        Some(root) => root,
        None => match resolve_schema_root(&project.plugin_root()) {
            Ok(root) => root.into_path(),
            Err(_) => return Ok(Vec::new()),
        },
    };
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let schemas = discover_schemas(&root)?;
    Ok(schemas.iter().map(|s| s.path().to_path_buf()).collect())
}

pub fn resolve(project: &Project, platform: Platform) -> Result<HostBuildConfig> {
    let layout = NativeLayout::new(project.plugin_root());
    let renames = project.rename_table()?;
    let config = HostBuildConfig::resolve(platform, &layout, &renames)
        .with_context(|| format!("resolving native dependencies for {platform}"))?;
    Ok(config.with_external_dependencies(schema_dependencies(project)?))
}

/// Render the host build configuration in `format`.
pub fn render(project: &Project, platform: Platform, format: Format) -> Result<String> {
    let config = resolve(project, platform)?;
    Ok(match format {
        Format::Json => config.to_json()?,
        Format::Cargo => config.cargo_directives().join("\n"),
        Format::Flags => {
            let dialect = match project.dialect(None)? {
                Some(dialect) => dialect,
                None => platform.require_family()?.default_dialect(),
            };
            config.compiler_flags(dialect).join(" ")
        }
    })
}

pub fn run(project: &Project, target: Option<&str>, format: Option<&str>) -> Result<()> {
    let platform = project.platform(target)?;
    let format = Format::parse(format.unwrap_or("json"))?;
    println!("{}", render(project, platform, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn plugin() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let libs = dir.path().join("GrpcLibraries").join("Linux");
        fs::create_dir_all(&libs).unwrap();
        fs::write(libs.join("libgrpc++.so"), b"").unwrap();
        let schemas = dir.path().join("Protobuf");
        fs::create_dir_all(&schemas).unwrap();
        fs::write(schemas.join("pose.proto"), "").unwrap();
        dir
    }

    #[test]
    fn json_lists_schemas_as_dependencies() {
        let dir = plugin();
        let project = Project::at(dir.path(), None);
        let json = render(&project, Platform::Linux, Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let deps = value["external_dependencies"].as_array().unwrap();
        assert_eq!(deps.len(), 1);
        assert!(deps[0].as_str().unwrap().ends_with("pose.proto"));
    }

    #[test]
    fn cargo_format() {
        let dir = plugin();
        let project = Project::at(dir.path(), None);
        let out = render(&project, Platform::Linux, Format::Cargo).unwrap();
        assert!(out.contains("cargo:rustc-link-search=native="));
        assert!(out.lines().last().unwrap().starts_with("cargo:rerun-if-changed="));
    }

    #[test]
    fn flags_use_the_family_dialect() {
        let dir = plugin();
        let project = Project::at(dir.path(), None);
        let out = render(&project, Platform::Win64, Format::Flags).unwrap();
        assert!(out.contains("/Dabsl=absl_tong"));
        assert!(out.contains("/DgRPCXX_DLL_IMPORTS"));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Format::parse("yaml").is_err());
    }

    #[test]
    fn unported_target_is_rejected() {
        let dir = plugin();
        let project = Project::at(dir.path(), None);
        assert!(render(&project, Platform::Android, Format::Json).is_err());
    }
}
