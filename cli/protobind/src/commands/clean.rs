//! `protobind clean`: remove generated output.

use std::fs;

use anyhow::{Context, Result};

use crate::manifest::Project;

/// Remove the output directory, completion manifest included.
pub fn run(project: &Project) -> Result<()> {
    let out_dir = project.output_dir();
    if out_dir.exists() {
        fs::remove_dir_all(&out_dir).with_context(|| format!("removing {}", out_dir.display()))?;
        println!("Removed {}", out_dir.display());
    } else {
        println!("Already clean: {} does not exist", out_dir.display());
    }
    Ok(())
}
