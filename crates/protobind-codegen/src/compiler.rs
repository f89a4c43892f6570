//! Schema compiler location and invocation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use protobind_targets::{Platform, TargetError};
use tracing::info;

use crate::error::Result;
use crate::schema::SchemaFile;
use crate::task::{CancelToken, CompilerTask, TaskOutput, DEFAULT_TIMEOUT};

/// File name of the combined descriptor-set artifact.
pub const DESCRIPTOR_FILE_NAME: &str = "all.proto.desc";

/// Compiler executable location relative to the plugin root.
///
/// Unported platforms are a configuration error, never a fallback.
pub fn compiler_relative_path(platform: Platform) -> std::result::Result<PathBuf, TargetError> {
    match platform {
        Platform::Win64 => Ok(["GrpcLibraries", "Win64", "protoc.exe"].iter().collect()),
        Platform::Linux => Ok(["GrpcPrograms", "Linux", "protoc"].iter().collect()),
        other => Err(TargetError::UnsupportedPlatform {
            platform: other.to_string(),
        }),
    }
}

/// Absolute compiler path for a platform. Does not check existence.
pub fn locate_compiler(plugin_root: &Path, platform: Platform) -> Result<PathBuf> {
    Ok(plugin_root.join(compiler_relative_path(platform)?))
}

/// Arguments for generating one schema's bindings.
pub fn binding_args(schema: &SchemaFile, root: &Path, out_dir: &Path) -> Vec<OsString> {
    vec![
        flag("--proto_path=", root),
        flag("--cpp_out=", out_dir),
        flag("--grpc_cpp_out=", out_dir),
        schema.path().as_os_str().to_os_string(),
    ]
}

/// Arguments for generating the descriptor set over every schema.
pub fn descriptor_args(schemas: &[SchemaFile], root: &Path, artifact: &Path) -> Vec<OsString> {
    let mut args = vec![
        flag("--proto_path=", root),
        flag("--descriptor_set_out=", artifact),
        OsString::from("--include_imports"),
    ];
    args.extend(schemas.iter().map(|s| s.path().as_os_str().to_os_string()));
    args
}

fn flag(name: &str, value: &Path) -> OsString {
    let mut arg = OsString::from(name);
    arg.push(value);
    arg
}

/// A located schema compiler executable.
#[derive(Debug, Clone)]
pub struct SchemaCompiler {
    executable: PathBuf,
    timeout: Duration,
    cancel: CancelToken,
}

impl SchemaCompiler {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout: DEFAULT_TIMEOUT,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn exists(&self) -> bool {
        self.executable.is_file()
    }

    /// Generate the binding pair (and service stubs) for one schema.
    pub fn generate_bindings(
        &self,
        schema: &SchemaFile,
        root: &Path,
        out_dir: &Path,
    ) -> Result<TaskOutput> {
        let output = self.run(binding_args(schema, root, out_dir))?;
        info!(schema = %schema.key(), "generated bindings");
        Ok(output)
    }

    /// Generate one descriptor set covering every schema and its imports.
    ///
    /// Returns the artifact path.
    pub fn generate_descriptor_set(
        &self,
        schemas: &[SchemaFile],
        root: &Path,
        out_dir: &Path,
    ) -> Result<PathBuf> {
        let artifact = out_dir.join(DESCRIPTOR_FILE_NAME);
        self.run(descriptor_args(schemas, root, &artifact))?;
        info!(artifact = %artifact.display(), schemas = schemas.len(), "generated descriptor set");
        Ok(artifact)
    }

    fn run(&self, args: Vec<OsString>) -> Result<TaskOutput> {
        let mut task = CompilerTask::new(&self.executable)
            .args(args)
            .timeout(self.timeout)
            .cancel_token(self.cancel.clone());
        if let Some(dir) = self.executable.parent() {
            task = task.search_path_prefix(dir);
        }
        let output = task.run()?;
        output.log_streams();
        output.require_success()
    }
}
