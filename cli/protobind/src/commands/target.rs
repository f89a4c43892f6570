//! `protobind target`: platform listing.

use anyhow::Result;
use protobind_codegen::compiler::compiler_relative_path;
use protobind_targets::Platform;

/// One row per known platform.
pub fn rows() -> Vec<String> {
    Platform::ALL
        .iter()
        .map(|&platform| {
            let detail = match (platform.family(), compiler_relative_path(platform)) {
                (Some(family), Ok(compiler)) => format!(
                    "{:?}, {:?} linkage, compiler {}",
                    family,
                    family.linkage(),
                    compiler.display()
                ),
                _ => "unported".to_string(),
            };
            format!("  {:<12} {detail}", platform.folder_name())
        })
        .collect()
}

pub fn list() -> Result<()> {
    println!("Platforms:");
    println!();
    for row in rows() {
        println!("{row}");
    }
    if let Some(host) = Platform::host() {
        println!();
        println!("Host: {host}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_platform() {
        let rows = rows();
        assert_eq!(rows.len(), Platform::ALL.len());
        assert!(rows.iter().any(|r| r.contains("Win64") && r.contains("protoc.exe")));
        assert!(rows.iter().any(|r| r.contains("IOS") && r.contains("unported")));
    }

    #[test]
    fn list_runs() {
        list().unwrap();
    }
}
