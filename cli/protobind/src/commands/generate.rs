//! `protobind generate`: compile schemas into bindings.

use anyhow::{Context, Result};
use protobind_codegen::{generate, GenerateConfig, GenerationOutcome};

use crate::manifest::Project;

/// Build the pipeline configuration from flags and the manifest.
pub fn config(
    project: &Project,
    target: Option<&str>,
    force: bool,
    timeout_secs: Option<u64>,
) -> Result<GenerateConfig> {
    let platform = project.platform(target)?;
    let mut config = GenerateConfig::new(platform, project.plugin_root(), project.module_dir());
    config.schema_root = project.schema_root();
    config.output_dir = project.output_dir_override();
    config.dialect = project.dialect(None)?;
    config.timeout = project.timeout(timeout_secs);
    config.force = force;
    Ok(config)
}

pub fn run(
    project: &Project,
    target: Option<&str>,
    force: bool,
    timeout_secs: Option<u64>,
) -> Result<GenerationOutcome> {
    let config = config(project, target, force, timeout_secs)?;
    let outcome = generate(&config)
        .with_context(|| format!("generating bindings for {}", config.platform))?;

    match &outcome {
        GenerationOutcome::Generated(report) => println!("{report}"),
        GenerationOutcome::Skipped { reason, output_dir, .. } => {
            println!("Skipped: {reason}");
            println!("Keeping existing output in {}", output_dir.display());
        }
    }
    let deps = outcome.external_dependencies();
    if !deps.is_empty() {
        println!("  Dependencies:  {} schema files", deps.len());
    }
    Ok(outcome)
}
