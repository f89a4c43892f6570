//! `protobind wrap`: add warning-suppression wrappers to generated sources.

use std::path::Path;

use anyhow::{bail, Context, Result};
use protobind_codegen::{wrap_generated_sources, WrapReport};
use protobind_targets::PragmaDialect;

use crate::manifest::Project;

pub fn run(
    project: &Project,
    dir: &Path,
    dialect: Option<&str>,
    target: Option<&str>,
) -> Result<WrapReport> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let dialect = match project.dialect(dialect)? {
        Some(dialect) => dialect,
        None => match project.platform(target)?.family() {
            Some(family) => family.default_dialect(),
            None => PragmaDialect::Portable,
        },
    };

    let report = wrap_generated_sources(dir, dialect)
        .with_context(|| format!("wrapping sources in {}", dir.display()))?;
    println!(
        "Wrapped {} files with {dialect} pragmas ({} rewrapped, {} already wrapped)",
        report.wrapped.len(),
        report.rewrapped.len(),
        report.already_wrapped.len()
    );
    Ok(report)
}
