//! Target platform model for protobind.
//!
//! Every per-platform decision in the generation and native-dependency
//! pipelines is derived from a single [`Platform`]:
//! - **Family:** which library layout and file extensions apply
//! - **Linkage:** import/export-declared or neutral linkage definitions
//! - **Dialect:** which warning-suppression pragmas wrap generated sources

pub mod error;
pub mod platform;

pub use error::{Result, TargetError};
pub use platform::{LinkageMode, Platform, PlatformFamily, PragmaDialect};
