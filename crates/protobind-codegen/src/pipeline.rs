//! Generation pipeline orchestrator.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use protobind_targets::{Platform, PragmaDialect};
use tracing::{debug, info, warn};

use crate::compiler::{locate_compiler, SchemaCompiler, DESCRIPTOR_FILE_NAME};
use crate::error::{CodegenError, Result};
use crate::paths::{ensure_dir, resolve_output_dir, resolve_schema_root};
use crate::schema::{discover_schemas, SchemaFile};
use crate::state::{inputs_hash, GenerationState};
use crate::task::{CancelToken, DEFAULT_TIMEOUT};
use crate::wrap::{wrap_generated_sources, WrapReport};

/// Configuration for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Target platform; selects the compiler and the default pragma dialect.
    pub platform: Platform,
    /// Plugin directory holding the compiler and the bundled schemas.
    pub plugin_root: PathBuf,
    /// Module directory; output goes under `ThirdParty/ProtoGen`.
    pub module_dir: PathBuf,
    /// Explicit schema root, bypassing the repository/bundled lookup.
    pub schema_root: Option<PathBuf>,
    /// Explicit output directory.
    pub output_dir: Option<PathBuf>,
    /// Pragma dialect; defaults to the platform family's.
    pub dialect: Option<PragmaDialect>,
    /// Per-invocation compiler timeout.
    pub timeout: Duration,
    /// Ignore the completion manifest and regenerate everything.
    pub force: bool,
    pub cancel: CancelToken,
}

impl GenerateConfig {
    pub fn new(
        platform: Platform,
        plugin_root: impl Into<PathBuf>,
        module_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            platform,
            plugin_root: plugin_root.into(),
            module_dir: module_dir.into(),
            schema_root: None,
            output_dir: None,
            dialect: None,
            timeout: DEFAULT_TIMEOUT,
            force: false,
            cancel: CancelToken::new(),
        }
    }
}

/// Why a run left the existing output untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No schema directory was found; `path` is the last location checked.
    SchemaRootMissing { path: PathBuf },
    /// The schema root holds no schema files.
    NoSchemas { root: PathBuf },
    /// The compiler executable is absent.
    CompilerMissing { path: PathBuf },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SchemaRootMissing { path } => {
                write!(f, "schema directory not found at {}", path.display())
            }
            SkipReason::NoSchemas { root } => {
                write!(f, "no schema files under {}", root.display())
            }
            SkipReason::CompilerMissing { path } => {
                write!(f, "schema compiler not found at {}", path.display())
            }
        }
    }
}

/// Statistics of a completed run.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub platform: Platform,
    pub schema_root: PathBuf,
    pub output_dir: PathBuf,
    pub schemas: Vec<SchemaFile>,
    /// Schemas the compiler ran for.
    pub regenerated: Vec<String>,
    /// Schemas whose recorded outputs were still current.
    pub up_to_date: Vec<String>,
    pub descriptor: PathBuf,
    pub descriptor_regenerated: bool,
    pub wrap: WrapReport,
    pub duration_ms: u64,
}

impl fmt::Display for GenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Generated bindings for {}", self.platform)?;
        writeln!(f, "  Schema root:   {}", self.schema_root.display())?;
        writeln!(f, "  Output:        {}", self.output_dir.display())?;
        writeln!(
            f,
            "  Schemas:       {} ({} regenerated, {} up to date)",
            self.schemas.len(),
            self.regenerated.len(),
            self.up_to_date.len()
        )?;
        writeln!(
            f,
            "  Descriptor:    {}{}",
            self.descriptor.display(),
            if self.descriptor_regenerated { "" } else { " (up to date)" }
        )?;
        writeln!(
            f,
            "  Wrapped:       {} ({} rewrapped, {} already wrapped)",
            self.wrap.wrapped.len(),
            self.wrap.rewrapped.len(),
            self.wrap.already_wrapped.len()
        )?;
        write!(f, "  Time:          {}ms", self.duration_ms)
    }
}

/// Result of a run that did not abort.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// A missing input; previously generated output stays as it is.
    Skipped {
        reason: SkipReason,
        output_dir: PathBuf,
        schemas: Vec<SchemaFile>,
    },
    Generated(GenerationReport),
}

impl GenerationOutcome {
    /// Schema files the host build should track for invalidation.
    pub fn external_dependencies(&self) -> Vec<&Path> {
        let schemas = match self {
            GenerationOutcome::Skipped { schemas, .. } => schemas,
            GenerationOutcome::Generated(report) => &report.schemas,
        };
        schemas.iter().map(SchemaFile::path).collect()
    }

    pub fn output_dir(&self) -> &Path {
        match self {
            GenerationOutcome::Skipped { output_dir, .. } => output_dir,
            GenerationOutcome::Generated(report) => &report.output_dir,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, GenerationOutcome::Skipped { .. })
    }
}

/// Run the full pipeline:
/// compiler location -> schema root -> discovery -> bindings -> descriptor set -> wrap -> state.
///
/// An unsupported platform aborts before any filesystem work. Missing
/// inputs end the run with [`GenerationOutcome::Skipped`] after a single
/// warning. A compiler failure aborts; outputs of earlier invocations stay
/// on disk and the state file is not updated, so the next run redoes them.
pub fn generate(config: &GenerateConfig) -> Result<GenerationOutcome> {
    let start = Instant::now();

    // Stage 1: configuration
    let compiler_path = locate_compiler(&config.plugin_root, config.platform)?;
    let family = config.platform.require_family()?;
    let dialect = config.dialect.unwrap_or_else(|| family.default_dialect());

    let output_dir = match &config.output_dir {
        Some(dir) => {
            ensure_dir(dir)?;
            dir.clone()
        }
        None => resolve_output_dir(&config.module_dir)?,
    };

    // Stage 2: inputs
    let schema_root = match &config.schema_root {
        Some(root) if root.is_dir() => root.clone(),
        Some(root) => {
            let reason = SkipReason::SchemaRootMissing { path: root.clone() };
            return Ok(skip(reason, output_dir, Vec::new()));
        }
        None => match resolve_schema_root(&config.plugin_root) {
            Ok(root) => root.into_path(),
            Err(not_found) => {
                let path = not_found.fallback().map(Path::to_path_buf).unwrap_or_default();
                return Ok(skip(SkipReason::SchemaRootMissing { path }, output_dir, Vec::new()));
            }
        },
    };

    let schemas = discover_schemas(&schema_root)?;
    if schemas.is_empty() {
        return Ok(skip(SkipReason::NoSchemas { root: schema_root }, output_dir, schemas));
    }

    let compiler = SchemaCompiler::new(&compiler_path)
        .with_timeout(config.timeout)
        .with_cancel(config.cancel.clone());
    if !compiler.exists() {
        return Ok(skip(SkipReason::CompilerMissing { path: compiler_path }, output_dir, schemas));
    }

    info!(
        platform = %config.platform,
        root = %schema_root.display(),
        schemas = schemas.len(),
        "generating bindings"
    );

    let mut state = if config.force {
        GenerationState::default()
    } else {
        GenerationState::load(&output_dir)
    };

    // Stage 3: bindings, one invocation per stale schema
    let mut regenerated = Vec::new();
    let mut up_to_date = Vec::new();
    for schema in &schemas {
        if state.is_fresh(schema, &output_dir) {
            debug!(schema = %schema.key(), "bindings up to date");
            up_to_date.push(schema.key());
            continue;
        }
        check_cancelled(config, &compiler_path)?;
        compiler.generate_bindings(schema, &schema_root, &output_dir)?;
        regenerated.push(schema.key());
    }

    // Stage 4: descriptor set, after every binding call
    let inputs = inputs_hash(&schemas)?;
    let mut descriptor = output_dir.join(DESCRIPTOR_FILE_NAME);
    let descriptor_regenerated = !state.descriptor_is_fresh(&inputs, &descriptor);
    if descriptor_regenerated {
        check_cancelled(config, &compiler_path)?;
        descriptor = compiler.generate_descriptor_set(&schemas, &schema_root, &output_dir)?;
    } else {
        debug!(artifact = %descriptor.display(), "descriptor set up to date");
    }

    // Stage 5: post-processing
    let wrap = wrap_generated_sources(&output_dir, dialect)?;

    // Stage 6: completion manifest
    // A dialect switch rewraps fresh outputs, which changes their hashes.
    for schema in &schemas {
        if regenerated.contains(&schema.key()) || !state.is_fresh(schema, &output_dir) {
            state.record_schema(schema, &output_dir)?;
        }
    }
    if descriptor_regenerated {
        state.record_descriptor(inputs, &descriptor)?;
    }
    state.retain_schemas(&schemas);
    state.save(&output_dir)?;

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        regenerated = regenerated.len(),
        up_to_date = up_to_date.len(),
        duration_ms,
        "generation complete"
    );

    Ok(GenerationOutcome::Generated(GenerationReport {
        platform: config.platform,
        schema_root,
        output_dir,
        schemas,
        regenerated,
        up_to_date,
        descriptor,
        descriptor_regenerated,
        wrap,
        duration_ms,
    }))
}

fn skip(reason: SkipReason, output_dir: PathBuf, schemas: Vec<SchemaFile>) -> GenerationOutcome {
    warn!("{reason}; keeping existing generated output");
    GenerationOutcome::Skipped {
        reason,
        output_dir,
        schemas,
    }
}

fn check_cancelled(config: &GenerateConfig, program: &Path) -> Result<()> {
    if config.cancel.is_cancelled() {
        return Err(CodegenError::Cancelled {
            program: program.to_path_buf(),
        });
    }
    Ok(())
}
