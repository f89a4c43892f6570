//! Completion manifest for incremental generation.
//!
//! Records, per schema, the hash of its source and of every file generated
//! from it (after wrapping). A schema whose source and outputs still match
//! is skipped on the next run; anything else is regenerated. Interrupted
//! runs never save, so their partial output is regenerated.
//!
//! Layout:
//! ```text
//! <output_dir>/
//!   .protobind-state.json
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{CodegenError, Result};
use crate::schema::SchemaFile;
use crate::wrap::replace_file;

/// File name of the persisted state record.
pub const STATE_FILE_NAME: &str = ".protobind-state.json";

const STATE_VERSION: u32 = 1;

/// A content hash (SHA-256 hex digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        ContentHash(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Hash a file's contents.
    pub fn of_file(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| CodegenError::io(path, e))?;
        Ok(Self::compute(&data))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What one schema produced on its last successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRecord {
    pub schema_hash: ContentHash,
    /// Output path (relative to the output dir, `/`-separated) to hash.
    pub outputs: BTreeMap<String, ContentHash>,
    /// Seconds since the Unix epoch.
    pub generated_at: u64,
}

/// The last descriptor-set generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorRecord {
    pub inputs_hash: ContentHash,
    pub output_hash: ContentHash,
    pub generated_at: u64,
}

/// Persisted generation state for one output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationState {
    pub version: u32,
    #[serde(default)]
    pub schemas: BTreeMap<String, SchemaRecord>,
    #[serde(default)]
    pub descriptor: Option<DescriptorRecord>,
}

impl Default for GenerationState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            schemas: BTreeMap::new(),
            descriptor: None,
        }
    }
}

impl GenerationState {
    /// Load the state for `out_dir`.
    ///
    /// A missing, unreadable, or foreign-version record is treated as empty.
    pub fn load(out_dir: &Path) -> Self {
        let path = out_dir.join(STATE_FILE_NAME);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), "ignoring unreadable state file: {e}");
                return Self::default();
            }
        };
        match serde_json::from_str::<GenerationState>(&text) {
            Ok(state) if state.version == STATE_VERSION => state,
            Ok(state) => {
                warn!(
                    path = %path.display(),
                    version = state.version,
                    "ignoring state file from another version"
                );
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), "ignoring corrupt state file: {e}");
                Self::default()
            }
        }
    }

    /// Persist atomically to `out_dir`.
    pub fn save(&self, out_dir: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        replace_file(&out_dir.join(STATE_FILE_NAME), &json)
    }

    /// Whether `schema`'s recorded outputs are current.
    pub fn is_fresh(&self, schema: &SchemaFile, out_dir: &Path) -> bool {
        let Some(record) = self.schemas.get(&schema.key()) else {
            return false;
        };
        if record.outputs.is_empty() || !schema.binding_pair(out_dir).exists() {
            return false;
        }
        if !matches_hash(schema.path(), &record.schema_hash) {
            return false;
        }
        record
            .outputs
            .iter()
            .all(|(rel, hash)| matches_hash(&out_dir.join(rel), hash))
    }

    /// Record `schema`'s current source and outputs.
    pub fn record_schema(&mut self, schema: &SchemaFile, out_dir: &Path) -> Result<()> {
        let schema_hash = ContentHash::of_file(schema.path())?;
        let mut outputs = BTreeMap::new();
        for file in schema.generated_files(out_dir) {
            let hash = ContentHash::of_file(&file)?;
            if let Ok(rel) = file.strip_prefix(out_dir) {
                outputs.insert(rel.to_string_lossy().replace('\\', "/"), hash);
            }
        }
        self.schemas.insert(
            schema.key(),
            SchemaRecord {
                schema_hash,
                outputs,
                generated_at: unix_now(),
            },
        );
        Ok(())
    }

    /// Drop records for schemas that no longer exist.
    pub fn retain_schemas(&mut self, schemas: &[SchemaFile]) {
        let live: std::collections::BTreeSet<String> =
            schemas.iter().map(SchemaFile::key).collect();
        self.schemas.retain(|key, _| live.contains(key));
    }

    /// Whether the descriptor artifact is current for `inputs_hash`.
    pub fn descriptor_is_fresh(&self, inputs_hash: &ContentHash, artifact: &Path) -> bool {
        match &self.descriptor {
            Some(record) => {
                record.inputs_hash == *inputs_hash && matches_hash(artifact, &record.output_hash)
            }
            None => false,
        }
    }

    pub fn record_descriptor(&mut self, inputs_hash: ContentHash, artifact: &Path) -> Result<()> {
        self.descriptor = Some(DescriptorRecord {
            inputs_hash,
            output_hash: ContentHash::of_file(artifact)?,
            generated_at: unix_now(),
        });
        Ok(())
    }
}

/// Combined hash of every schema's relative path and content.
pub fn inputs_hash(schemas: &[SchemaFile]) -> Result<ContentHash> {
    let mut hasher = Sha256::new();
    for schema in schemas {
        let content = ContentHash::of_file(schema.path())?;
        hasher.update(schema.key().as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_str().as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    Ok(ContentHash(digest.iter().map(|b| format!("{b:02x}")).collect()))
}

fn matches_hash(path: &Path, expected: &ContentHash) -> bool {
    ContentHash::of_file(path).is_ok_and(|actual| actual == *expected)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, SchemaFile, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("schemas");
        let out = dir.path().join("out");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&out).unwrap();
        fs::write(root.join("pose.proto"), "message Pose {}").unwrap();
        fs::write(out.join("pose.pb.cc"), "impl").unwrap();
        fs::write(out.join("pose.pb.h"), "header").unwrap();
        let schema = SchemaFile::new(&root, root.join("pose.proto")).unwrap();
        (dir, schema, out)
    }

    #[test]
    fn hash_format() {
        let hash = ContentHash::compute(b"");
        assert_eq!(
            hash.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn recorded_schema_is_fresh() {
        let (_dir, schema, out) = fixture();
        let mut state = GenerationState::default();
        assert!(!state.is_fresh(&schema, &out));

        state.record_schema(&schema, &out).unwrap();
        assert!(state.is_fresh(&schema, &out));
        assert_eq!(state.schemas["pose.proto"].outputs.len(), 2);
    }

    #[test]
    fn edited_schema_is_stale() {
        let (_dir, schema, out) = fixture();
        let mut state = GenerationState::default();
        state.record_schema(&schema, &out).unwrap();

        fs::write(schema.path(), "message Pose { int32 x = 1; }").unwrap();
        assert!(!state.is_fresh(&schema, &out));
    }

    #[test]
    fn deleted_or_altered_output_is_stale() {
        let (_dir, schema, out) = fixture();
        let mut state = GenerationState::default();
        state.record_schema(&schema, &out).unwrap();

        fs::write(out.join("pose.pb.cc"), "half written").unwrap();
        assert!(!state.is_fresh(&schema, &out));

        state.record_schema(&schema, &out).unwrap();
        fs::remove_file(out.join("pose.pb.h")).unwrap();
        assert!(!state.is_fresh(&schema, &out));
    }

    #[test]
    fn save_and_load() {
        let (_dir, schema, out) = fixture();
        let mut state = GenerationState::default();
        state.record_schema(&schema, &out).unwrap();
        state.save(&out).unwrap();

        let loaded = GenerationState::load(&out);
        assert_eq!(loaded, state);
        assert!(loaded.is_fresh(&schema, &out));
    }

    #[test]
    fn corrupt_state_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STATE_FILE_NAME), "{ not json").unwrap();
        assert_eq!(GenerationState::load(dir.path()), GenerationState::default());
    }

    #[test]
    fn descriptor_freshness_tracks_inputs_and_artifact() {
        let (_dir, schema, out) = fixture();
        let artifact = out.join("all.proto.desc");
        fs::write(&artifact, b"descriptor").unwrap();
        let schemas = vec![schema.clone()];

        let mut state = GenerationState::default();
        let inputs = inputs_hash(&schemas).unwrap();
        assert!(!state.descriptor_is_fresh(&inputs, &artifact));

        state.record_descriptor(inputs.clone(), &artifact).unwrap();
        assert!(state.descriptor_is_fresh(&inputs, &artifact));

        fs::write(schema.path(), "message Pose { int32 y = 1; }").unwrap();
        let changed = inputs_hash(&schemas).unwrap();
        assert_ne!(changed, inputs);
        assert!(!state.descriptor_is_fresh(&changed, &artifact));
    }

    #[test]
    fn retain_drops_removed_schemas() {
        let (_dir, schema, out) = fixture();
        let mut state = GenerationState::default();
        state.record_schema(&schema, &out).unwrap();
        state.retain_schemas(&[]);
        assert!(state.schemas.is_empty());
    }
}
