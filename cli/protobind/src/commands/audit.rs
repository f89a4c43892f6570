//! `protobind audit`: find translation units missing symbol renames.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use protobind_native::{audit_file, host_definitions, AuditFinding, Definition};

use crate::manifest::Project;

/// Definitions a unit will be compiled with.
pub fn definitions(
    project: &Project,
    target: Option<&str>,
    defines: &[String],
    host: bool,
) -> Result<Vec<Definition>> {
    let mut defs = Vec::new();
    if host {
        let platform = project.platform(target)?;
        defs.extend(host_definitions(platform, &project.rename_table()?)?);
    }
    for raw in defines {
        defs.push(raw.parse().with_context(|| format!("invalid --define '{raw}'"))?);
    }
    Ok(defs)
}

/// Audit each file; fails when any canonical symbol is left unrenamed.
pub fn run(
    project: &Project,
    files: &[PathBuf],
    target: Option<&str>,
    defines: &[String],
    host: bool,
) -> Result<Vec<(PathBuf, Vec<AuditFinding>)>> {
    let table = project.rename_table()?;
    let defs = definitions(project, target, defines, host)?;

    let mut results = Vec::new();
    let mut total = 0;
    for file in files {
        let findings = audit_file(file, &table, &defs)?;
        if findings.is_empty() {
            println!("ok    {}", file.display());
        } else {
            println!("FAIL  {}", file.display());
            for finding in &findings {
                println!("      {finding}");
            }
            total += findings.len();
        }
        results.push((file.clone(), findings));
    }

    if total > 0 {
        let units = results.iter().filter(|(_, f)| !f.is_empty()).count();
        bail!("{total} unrenamed symbols in {units} of {} units", files.len());
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn unit(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("client.cc");
        fs::write(&path, "#include <absl/status/status.h>\nabsl::Status s;\n").unwrap();
        path
    }

    #[test]
    fn bare_unit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::at(dir.path(), None);
        let err = run(&project, &[unit(dir.path())], Some("linux"), &[], false).unwrap_err();
        assert!(err.to_string().contains("1 unrenamed symbols in 1 of 1 units"));
    }

    #[test]
    fn host_definitions_make_it_pass() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::at(dir.path(), None);
        let results = run(&project, &[unit(dir.path())], Some("linux"), &[], true).unwrap();
        assert!(results[0].1.is_empty());
    }

    #[test]
    fn explicit_defines_count() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::at(dir.path(), None);
        let defines = vec!["absl=absl_tong".to_string()];
        assert!(run(&project, &[unit(dir.path())], None, &defines, false).is_ok());
    }

    #[test]
    fn bad_define_is_reported_as_a_definition() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::at(dir.path(), None);
        let err = definitions(&project, None, &["9lives=1".to_string()], false).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("invalid --define '9lives=1'"));
        assert!(message.contains("not a C identifier"));
        assert!(!message.contains("rename"));
    }

    #[test]
    fn manifest_renames_are_audited() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.cc");
        fs::write(&path, "grpc_custom();\n").unwrap();
        let manifest = crate::manifest::ProtobindManifest::from_str(
            "[renames]\ngrpc_custom = \"grpc_tong_custom\"\n",
        )
        .unwrap();
        let project = Project::at(dir.path(), Some(manifest));
        assert!(run(&project, &[path.clone()], Some("linux"), &[], false).is_err());
        assert!(run(&project, &[path], Some("linux"), &[], true).is_ok());
    }
}
