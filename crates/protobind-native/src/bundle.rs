//! Platform library bundle resolution.
//!
//! Layout under the plugin root:
//! ```text
//! GrpcIncludes/include/          headers, shared by every platform
//! GrpcLibraries/
//!   Win64/*.lib, *.dll
//!   Linux/*.so
//!   lib64/libc.a                 forced archive for Unix links
//! DynamicLibraries/Win64/zlib.dll
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use protobind_targets::{Platform, PlatformFamily};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{NativeError, Result};

const INCLUDE_SUBDIR: [&str; 2] = ["GrpcIncludes", "include"];
const LIBRARY_DIR: &str = "GrpcLibraries";
const DELAY_LOAD_SUBDIR: [&str; 2] = ["DynamicLibraries", "Win64"];
const FORCED_ARCHIVE: [&str; 2] = ["lib64", "libc.a"];

/// Library loaded on first use instead of at process start (Windows only).
pub const DELAY_LOADED_LIBRARY: &str = "zlib.dll";

/// Well-known directories of a plugin's native bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeLayout {
    plugin_root: PathBuf,
}

impl NativeLayout {
    pub fn new(plugin_root: impl Into<PathBuf>) -> Self {
        Self {
            plugin_root: plugin_root.into(),
        }
    }

    pub fn plugin_root(&self) -> &Path {
        &self.plugin_root
    }

    pub fn include_root(&self) -> PathBuf {
        let mut dir = self.plugin_root.clone();
        dir.extend(INCLUDE_SUBDIR);
        dir
    }

    /// Root of the per-platform library folders.
    pub fn library_root(&self) -> PathBuf {
        self.plugin_root.join(LIBRARY_DIR)
    }

    pub fn delay_load_dir(&self) -> PathBuf {
        let mut dir = self.plugin_root.clone();
        dir.extend(DELAY_LOAD_SUBDIR);
        dir
    }
}

/// A library that must sit next to the produced binary at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeArtifact {
    pub source: PathBuf,
    /// Bare file name the binary loads it by, when it is copied beside it.
    pub deploy_name: Option<String>,
}

/// Link and runtime inputs of one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeBundle {
    pub platform: Platform,
    pub library_dir: PathBuf,
    pub link_libraries: Vec<PathBuf>,
    pub runtime_artifacts: Vec<RuntimeArtifact>,
    /// Libraries the binary loads lazily, by bare name.
    pub delay_load: Vec<String>,
}

/// Header search paths for the bundle.
pub fn gather_header_paths(layout: &NativeLayout) -> Vec<PathBuf> {
    vec![layout.include_root()]
}

/// Collect the link inputs and runtime artifacts of `platform`.
///
/// Only `<library_root>/<Platform>` is read, non-recursively, so one
/// platform's bundle never leaks into another's build. A missing folder
/// yields an empty bundle, apart from the forced Unix archive.
pub fn gather_platform_libraries(
    platform: Platform,
    layout: &NativeLayout,
) -> Result<NativeBundle> {
    let family = platform.require_family()?;
    let lib_root = layout.library_root();
    let library_dir = lib_root.join(platform.folder_name());

    let mut bundle = NativeBundle {
        platform,
        library_dir: library_dir.clone(),
        link_libraries: Vec::new(),
        runtime_artifacts: Vec::new(),
        delay_load: Vec::new(),
    };

    if !library_dir.is_dir() {
        warn!(dir = %library_dir.display(), "native library folder not found; bundle is empty");
        if family == PlatformFamily::Unix {
            bundle.link_libraries.push(forced_archive(&lib_root));
        }
        return Ok(bundle);
    }

    match family {
        PlatformFamily::Windows => {
            bundle.link_libraries = files_with_extension(&library_dir, family.link_extension())?;
            for dll in files_with_extension(&library_dir, family.runtime_extension())? {
                let deploy_name = bare_name(&dll);
                bundle.runtime_artifacts.push(RuntimeArtifact {
                    source: dll,
                    deploy_name,
                });
            }
            let delay_loaded = layout.delay_load_dir().join(DELAY_LOADED_LIBRARY);
            if delay_loaded.is_file() {
                bundle.delay_load.push(DELAY_LOADED_LIBRARY.to_string());
                bundle.runtime_artifacts.push(RuntimeArtifact {
                    source: delay_loaded,
                    deploy_name: None,
                });
            } else {
                debug!(path = %delay_loaded.display(), "delay-loaded library not present");
            }
        }
        PlatformFamily::Unix => {
            let shared = files_with_extension(&library_dir, family.link_extension())?;
            bundle.runtime_artifacts = shared
                .iter()
                .map(|so| RuntimeArtifact {
                    source: so.clone(),
                    deploy_name: None,
                })
                .collect();
            bundle.link_libraries = shared;
            bundle.link_libraries.push(forced_archive(&lib_root));
        }
    }

    info!(
        platform = %platform,
        link = bundle.link_libraries.len(),
        runtime = bundle.runtime_artifacts.len(),
        "gathered native libraries"
    );
    Ok(bundle)
}

/// Unix links always take this archive, whatever the platform folder holds.
fn forced_archive(lib_root: &Path) -> PathBuf {
    let mut archive = lib_root.to_path_buf();
    archive.extend(FORCED_ARCHIVE);
    archive
}

/// Files directly inside `dir` whose extension is exactly `ext`, sorted.
fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| NativeError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| NativeError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|e| e == ext) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn bare_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use protobind_targets::TargetError;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    /// A plugin carrying both platforms' libraries.
    fn plugin() -> (tempfile::TempDir, NativeLayout) {
        let dir = tempfile::tempdir().unwrap();
        let libs = dir.path().join("GrpcLibraries");
        let names = [
            "grpc++.lib",
            "libprotobuf.lib",
            "grpc++.dll",
            "libprotobuf.dll",
            "readme.txt",
        ];
        for name in names {
            touch(&libs.join("Win64").join(name));
        }
        touch(&libs.join("Win64").join("nested").join("extra.lib"));
        for name in ["libgrpc++.so", "libprotobuf.so", "libgrpc.a", "libgrpc.so.1"] {
            touch(&libs.join("Linux").join(name));
        }
        touch(&libs.join("lib64").join("libc.a"));
        touch(&dir.path().join("DynamicLibraries/Win64/zlib.dll"));
        let layout = NativeLayout::new(dir.path());
        (dir, layout)
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn windows_splits_import_libraries_from_dlls() {
        let (_dir, layout) = plugin();
        let bundle = gather_platform_libraries(Platform::Win64, &layout).unwrap();
        assert_eq!(names(&bundle.link_libraries), vec!["grpc++.lib", "libprotobuf.lib"]);

        let deployed: Vec<_> = bundle
            .runtime_artifacts
            .iter()
            .filter_map(|a| a.deploy_name.clone())
            .collect();
        assert_eq!(deployed, vec!["grpc++.dll", "libprotobuf.dll"]);
        assert_eq!(bundle.delay_load, vec![DELAY_LOADED_LIBRARY]);
        assert!(bundle
            .runtime_artifacts
            .iter()
            .any(|a| a.source.ends_with("DynamicLibraries/Win64/zlib.dll")));
    }

    #[test]
    fn unix_links_and_deploys_shared_objects() {
        let (_dir, layout) = plugin();
        let bundle = gather_platform_libraries(Platform::Linux, &layout).unwrap();
        assert_eq!(
            names(&bundle.link_libraries),
            vec!["libgrpc++.so", "libprotobuf.so", "libc.a"]
        );
        assert!(bundle.link_libraries[2].ends_with("GrpcLibraries/lib64/libc.a"));
        let runtime: Vec<_> = bundle.runtime_artifacts.iter().map(|a| a.source.clone()).collect();
        assert_eq!(names(&runtime), vec!["libgrpc++.so", "libprotobuf.so"]);
        assert!(bundle.delay_load.is_empty());
    }

    #[test]
    fn platforms_never_share_files() {
        let (_dir, layout) = plugin();
        let win_dir = layout.library_root().join("Win64");
        let linux_dir = layout.library_root().join("Linux");

        let linux = gather_platform_libraries(Platform::Linux, &layout).unwrap();
        let linux_files = linux
            .link_libraries
            .iter()
            .chain(linux.runtime_artifacts.iter().map(|a| &a.source));
        for file in linux_files {
            assert!(!file.starts_with(&win_dir), "{} leaked into Linux", file.display());
            assert!(file.extension().is_some_and(|e| e == "so" || e == "a"));
        }

        let win = gather_platform_libraries(Platform::Win64, &layout).unwrap();
        let win_files = win
            .link_libraries
            .iter()
            .chain(win.runtime_artifacts.iter().map(|a| &a.source));
        for file in win_files {
            assert!(!file.starts_with(&linux_dir), "{} leaked into Win64", file.display());
            assert!(file.extension().is_some_and(|e| e == "lib" || e == "dll"));
        }
    }

    #[tracing_test::traced_test]
    #[test]
    fn missing_folder_is_an_empty_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let layout = NativeLayout::new(dir.path());
        let bundle = gather_platform_libraries(Platform::Win64, &layout).unwrap();
        assert!(bundle.link_libraries.is_empty());
        assert!(bundle.runtime_artifacts.is_empty());
        assert!(logs_contain("native library folder not found"));
    }

    #[test]
    fn unix_forces_the_archive_even_without_a_folder() {
        let dir = tempfile::tempdir().unwrap();
        let layout = NativeLayout::new(dir.path());
        let bundle = gather_platform_libraries(Platform::Linux, &layout).unwrap();
        assert_eq!(
            bundle.link_libraries,
            vec![dir.path().join("GrpcLibraries").join("lib64").join("libc.a")]
        );
        assert!(bundle.runtime_artifacts.is_empty());
    }

    #[test]
    fn unported_platform_is_rejected() {
        let (_dir, layout) = plugin();
        let err = gather_platform_libraries(Platform::Android, &layout).unwrap_err();
        assert!(matches!(
            err,
            NativeError::Target(TargetError::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn headers_come_from_one_fixed_directory() {
        let layout = NativeLayout::new("/plugin");
        assert_eq!(
            gather_header_paths(&layout),
            vec![PathBuf::from("/plugin/GrpcIncludes/include")]
        );
    }
}
