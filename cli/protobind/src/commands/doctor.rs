//! `protobind doctor`: environment diagnostics.

use std::path::Path;
use std::process::Command;

use anyhow::Result;
use protobind_codegen::state::STATE_FILE_NAME;
use protobind_codegen::{
    discover_schemas, locate_compiler, resolve_schema_root, DESCRIPTOR_FILE_NAME,
};
use protobind_native::{gather_platform_libraries, NativeLayout};

use crate::manifest::{Project, MANIFEST_FILE};

/// Print what a generation run for `target` would find.
pub fn run(project: &Project, target: Option<&str>) -> Result<()> {
    println!("=== protobind doctor ===");
    println!();
    println!("protobind version: {}", env!("CARGO_PKG_VERSION"));
    match protobind_targets::Platform::host() {
        Some(host) => println!("Host platform:     {host}"),
        None => println!("Host platform:     unrecognized"),
    }
    println!();

    println!("--- System Tools ---");
    print_tool_status("cc", &["--version"]);
    println!();

    println!("--- Project ---");
    match &project.manifest {
        Some(manifest) => {
            println!("  {MANIFEST_FILE}: found in {}", project.dir.display());
            if let Some(name) = &manifest.plugin.name {
                println!("  Plugin:      {name}");
            }
        }
        None => println!("  {MANIFEST_FILE}: not found (using {})", project.dir.display()),
    }
    let plugin_root = project.plugin_root();
    println!("  Plugin root: {}", plugin_root.display());
    println!("  Module:      {}", project.module_dir().display());
    println!();

    let platform = match project.platform(target) {
        Ok(platform) => platform,
        Err(e) => {
            println!("Target: {e:#}");
            return Ok(());
        }
    };
    println!("--- Target: {platform} ---");

    match locate_compiler(&plugin_root, platform) {
        Ok(compiler) => println!("  Compiler:    {}", presence(&compiler)),
        Err(e) => {
            println!("  {e}");
            return Ok(());
        }
    }

    let schema_root = match project.schema_root() {
        Some(root) => Some(root),
        None => resolve_schema_root(&plugin_root).ok().map(|r| r.into_path()),
    };
    match schema_root {
        Some(root) if root.is_dir() => {
            let count = discover_schemas(&root).map(|s| s.len()).unwrap_or(0);
            println!("  Schemas:     {count} under {}", root.display());
        }
        Some(root) => println!("  Schemas:     {} (missing)", root.display()),
        None => println!("  Schemas:     no schema directory found"),
    }

    let out_dir = project.output_dir();
    println!("  Output:      {}", presence(&out_dir));
    println!("  Descriptor:  {}", presence(&out_dir.join(DESCRIPTOR_FILE_NAME)));
    println!("  State:       {}", presence(&out_dir.join(STATE_FILE_NAME)));

    match gather_platform_libraries(platform, &NativeLayout::new(&plugin_root)) {
        Ok(bundle) => println!(
            "  Libraries:   {} link, {} runtime in {}",
            bundle.link_libraries.len(),
            bundle.runtime_artifacts.len(),
            bundle.library_dir.display()
        ),
        Err(e) => println!("  Libraries:   {e}"),
    }
    Ok(())
}

fn presence(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (missing)", path.display())
    }
}

fn print_tool_status(name: &str, args: &[&str]) {
    match Command::new(name).args(args).output() {
        Ok(output) => {
            let version = String::from_utf8_lossy(&output.stdout);
            let first_line = version.lines().next().unwrap_or("(unknown version)");
            println!("  {name}: {first_line}");
        }
        Err(_) => {
            println!("  {name}: not found");
        }
    }
}
