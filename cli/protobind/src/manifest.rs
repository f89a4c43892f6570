//! `protobind.toml` parsing and project resolution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use protobind_codegen::task::DEFAULT_TIMEOUT;
use protobind_native::RenameTable;
use protobind_targets::{Platform, PragmaDialect};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MANIFEST_FILE: &str = "protobind.toml";

/// The top-level manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtobindManifest {
    #[serde(default)]
    pub plugin: PluginConfig,
    #[serde(default)]
    pub generate: GenerateSection,
    #[serde(default)]
    pub target: TargetSection,
    /// Extra canonical-to-alias renames on top of the built-in table.
    #[serde(default)]
    pub renames: BTreeMap<String, String>,
}

/// Plugin location, relative to the manifest directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Plugin directory. Defaults to the manifest directory.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Module directory the generated output lives under.
    #[serde(default)]
    pub module: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GenerateSection {
    #[serde(default)]
    pub schema_root: Option<PathBuf>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub dialect: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetSection {
    #[serde(default)]
    pub default: Option<String>,
}

impl ProtobindManifest {
    /// Search upward from `start_dir` for a `protobind.toml`, returning it
    /// along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: ProtobindManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing protobind.toml")
    }

    pub fn default_target(&self) -> Option<&str> {
        self.target.default.as_deref()
    }
}

/// A plugin directory plus its optional manifest.
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory holding the manifest, or the working directory without one.
    pub dir: PathBuf,
    pub manifest: Option<ProtobindManifest>,
}

impl Project {
    /// Find the manifest above `cwd`; without one, `cwd` is the plugin root.
    pub fn discover(cwd: &Path) -> Result<Self> {
        Ok(match ProtobindManifest::find_and_load(cwd)? {
            Some((manifest, dir)) => {
                debug!(dir = %dir.display(), "loaded {MANIFEST_FILE}");
                Project {
                    dir,
                    manifest: Some(manifest),
                }
            }
            None => {
                debug!(dir = %cwd.display(), "no {MANIFEST_FILE} found; using defaults");
                Project {
                    dir: cwd.to_path_buf(),
                    manifest: None,
                }
            }
        })
    }

    #[cfg(test)]
    pub fn at(dir: &Path, manifest: Option<ProtobindManifest>) -> Self {
        Project {
            dir: dir.to_path_buf(),
            manifest,
        }
    }

    fn resolve(&self, path: Option<&PathBuf>) -> Option<PathBuf> {
        path.map(|p| self.dir.join(p))
    }

    pub fn plugin_root(&self) -> PathBuf {
        self.manifest
            .as_ref()
            .and_then(|m| self.resolve(m.plugin.root.as_ref()))
            .unwrap_or_else(|| self.dir.clone())
    }

    /// Module directory; defaults to the plugin root.
    pub fn module_dir(&self) -> PathBuf {
        self.manifest
            .as_ref()
            .and_then(|m| self.resolve(m.plugin.module.as_ref()))
            .unwrap_or_else(|| self.plugin_root())
    }

    pub fn schema_root(&self) -> Option<PathBuf> {
        self.manifest
            .as_ref()
            .and_then(|m| self.resolve(m.generate.schema_root.as_ref()))
    }

    pub fn output_dir_override(&self) -> Option<PathBuf> {
        self.manifest
            .as_ref()
            .and_then(|m| self.resolve(m.generate.output_dir.as_ref()))
    }

    /// The output directory without creating it.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir_override().unwrap_or_else(|| {
            let mut dir = self.module_dir();
            dir.extend(protobind_codegen::paths::OUTPUT_SUBDIR);
            dir
        })
    }

    pub fn timeout(&self, flag: Option<u64>) -> Duration {
        flag.or_else(|| self.manifest.as_ref().and_then(|m| m.generate.timeout_secs))
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn dialect(&self, flag: Option<&str>) -> Result<Option<PragmaDialect>> {
        let name = flag.or_else(|| {
            self.manifest
                .as_ref()
                .and_then(|m| m.generate.dialect.as_deref())
        });
        name.map(|n| n.parse::<PragmaDialect>().map_err(Into::into))
            .transpose()
    }

    /// The flag, else the manifest default, else the host platform.
    pub fn platform(&self, flag: Option<&str>) -> Result<Platform> {
        let name = flag.or_else(|| self.manifest.as_ref().and_then(|m| m.default_target()));
        match name {
            Some(name) => Ok(name.parse()?),
            None => match Platform::host() {
                Some(platform) => Ok(platform),
                None => bail!("cannot infer a target for this host; pass --target"),
            },
        }
    }

    /// The built-in renames plus the manifest's.
    pub fn rename_table(&self) -> Result<RenameTable> {
        let extra = self
            .manifest
            .iter()
            .flat_map(|m| m.renames.iter())
            .map(|(canonical, renamed)| (canonical.as_str(), renamed.as_str()));
        RenameTable::with_extra(extra).context("invalid [renames] entry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[plugin]
name = "TongSimGrpc"
root = "."
module = "Source/TongSimProto"

[generate]
schema-root = "../../../protobuf"
output-dir = "gen"
timeout-secs = 30
dialect = "portable"

[target]
default = "linux"

[renames]
grpc_custom = "grpc_tong_custom"
"#;

    #[test]
    fn parse_full_manifest() {
        let manifest = ProtobindManifest::from_str(FULL).unwrap();
        assert_eq!(manifest.plugin.name.as_deref(), Some("TongSimGrpc"));
        assert_eq!(manifest.generate.timeout_secs, Some(30));
        assert_eq!(manifest.default_target(), Some("linux"));
        assert_eq!(manifest.renames["grpc_custom"], "grpc_tong_custom");
    }

    #[test]
    fn parse_empty_manifest() {
        let manifest = ProtobindManifest::from_str("").unwrap();
        assert!(manifest.plugin.root.is_none());
        assert!(manifest.renames.is_empty());
    }

    #[test]
    fn reject_invalid_toml() {
        assert!(ProtobindManifest::from_str("[plugin\nroot = ").is_err());
    }

    #[test]
    fn project_paths_are_relative_to_the_manifest() {
        let manifest = ProtobindManifest::from_str(FULL).unwrap();
        let project = Project::at(Path::new("/p"), Some(manifest));
        assert_eq!(project.plugin_root(), Path::new("/p/."));
        assert_eq!(project.module_dir(), Path::new("/p/Source/TongSimProto"));
        assert_eq!(project.schema_root(), Some(PathBuf::from("/p/../../../protobuf")));
        assert_eq!(project.output_dir(), Path::new("/p/gen"));
        assert_eq!(project.timeout(None), Duration::from_secs(30));
        assert_eq!(project.timeout(Some(5)), Duration::from_secs(5));
        assert_eq!(project.dialect(None).unwrap(), Some(PragmaDialect::Portable));
        assert_eq!(project.dialect(Some("msvc")).unwrap(), Some(PragmaDialect::Msvc));
        assert_eq!(project.platform(None).unwrap(), Platform::Linux);
        assert_eq!(project.platform(Some("win64")).unwrap(), Platform::Win64);
        assert_eq!(project.rename_table().unwrap().get("grpc_custom"), Some("grpc_tong_custom"));
    }

    #[test]
    fn defaults_without_manifest() {
        let project = Project::at(Path::new("/plugin"), None);
        assert_eq!(project.plugin_root(), Path::new("/plugin"));
        assert_eq!(project.module_dir(), Path::new("/plugin"));
        assert_eq!(project.output_dir(), Path::new("/plugin/ThirdParty/ProtoGen"));
        assert_eq!(project.timeout(None), DEFAULT_TIMEOUT);
        assert!(project.dialect(None).unwrap().is_none());
        assert_eq!(project.rename_table().unwrap().len(), 12);
    }

    #[test]
    fn bad_values_are_reported() {
        let project = Project::at(Path::new("/p"), None);
        assert!(project.platform(Some("amiga")).is_err());
        assert!(project.dialect(Some("borland")).is_err());

        let text = "[renames]\n\"absl\" = \"absl_again\"\n";
        let manifest = ProtobindManifest::from_str(text).unwrap();
        let project = Project::at(Path::new("/p"), Some(manifest));
        assert!(project.rename_table().is_err());
    }

    #[test]
    fn find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "[target]\ndefault = \"win64\"\n").unwrap();
        let nested = dir.path().join("Source").join("TongSimProto");
        std::fs::create_dir_all(&nested).unwrap();

        let project = Project::discover(&nested).unwrap();
        assert_eq!(project.dir, dir.path());
        assert_eq!(project.platform(None).unwrap(), Platform::Win64);
    }
}
