//! Native dependency feed for hosts linking the RPC runtime.
//!
//! Resolves the platform's header and library bundle, the preprocessor
//! definitions the headers must be compiled with, and the symbol-rename
//! table that keeps the bundled runtime from colliding with another build
//! of the same libraries loaded by the host. Everything is rendered into a
//! [`HostBuildConfig`] for the host build to consume.
//!
//! An unapplied rename compiles cleanly and only fails at link or load
//! time; [`audit_translation_unit`] finds such units ahead of that.

pub mod audit;
pub mod bundle;
pub mod definitions;
pub mod error;
pub mod host;
pub mod lexer;
pub mod renames;

pub use audit::{audit_file, audit_translation_unit, AuditFinding};
pub use bundle::{
    gather_header_paths, gather_platform_libraries, NativeBundle, NativeLayout, RuntimeArtifact,
};
pub use definitions::{host_definitions, linkage_definitions, runtime_definitions, Definition};
pub use error::{NativeError, Result};
pub use host::HostBuildConfig;
pub use renames::{RenameRule, RenameTable};
