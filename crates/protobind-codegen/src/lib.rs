//! Binding generation for protobind.
//!
//! Turns a tree of schema files into compiled bindings through a
//! multi-stage pipeline: schema-root resolution, deterministic discovery,
//! per-schema binding generation, descriptor-set generation, and
//! warning-suppression wrapping of the generated implementation files.
//!
//! Missing inputs (no schema root, no schemas, no compiler) skip the
//! pipeline and leave previously generated output in place. Configuration
//! errors and compiler failures abort it.

pub mod compiler;
pub mod descriptor;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod schema;
pub mod state;
pub mod task;
pub mod wrap;

#[cfg(test)]
pub(crate) mod test_support;

pub use compiler::{locate_compiler, SchemaCompiler, DESCRIPTOR_FILE_NAME};
pub use descriptor::DescriptorSet;
pub use error::{CodegenError, Result};
pub use paths::{resolve_output_dir, resolve_schema_root, SchemaRoot, SchemaRootNotFound};
pub use pipeline::{generate, GenerateConfig, GenerationOutcome, GenerationReport, SkipReason};
pub use schema::{discover_schemas, BindingPair, SchemaFile};
pub use state::{ContentHash, GenerationState};
pub use task::{CancelToken, CompilerTask, TaskOutput, TaskStatus};
pub use wrap::{
    wrap_generated_sources, wrap_source, SourceRole, WrapAction, WrapReport, WrapStatus,
};
