//! Preprocessor definitions for units that include the runtime headers.

use std::fmt;
use std::str::FromStr;

use protobind_targets::{LinkageMode, Platform};
use serde::{Deserialize, Serialize};

use crate::error::{NativeError, Result};
use crate::lexer::is_identifier;
use crate::renames::RenameTable;

/// Runtime configuration the bundled libraries were built with.
const RUNTIME_DEFINES: &[&str] = &[
    "GOOGLE_PROTOBUF_INTERNAL_DONATE_STEAL_INLINE=0",
    "GOOGLE_PROTOBUF_NO_RTTI",
    "GPR_FORBID_UNREACHABLE_CODE=0",
    "GRPC_ALLOW_EXCEPTIONS=0",
    "PROTOBUF_ENABLE_DEBUG_LOGGING_MAY_LEAK_PII=0",
    // Silences a type-trait deprecation warning raised inside protobuf headers.
    "__NVCC__",
];

/// A `NAME` or `NAME=VALUE` definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Definition {
    pub name: String,
    /// `Some("")` is `NAME=`, which defines the macro as empty.
    pub value: Option<String>,
}

impl Definition {
    pub fn flag(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
        }
    }

    pub fn with_value(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for Definition {
    type Err = NativeError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, value) = match s.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (s, None),
        };
        if !is_identifier(name) {
            return Err(NativeError::InvalidDefinition {
                text: s.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            value,
        })
    }
}

impl TryFrom<String> for Definition {
    type Error = NativeError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Definition> for String {
    fn from(def: Definition) -> String {
        def.to_string()
    }
}

pub fn runtime_definitions() -> Vec<Definition> {
    RUNTIME_DEFINES
        .iter()
        .map(|raw| match raw.split_once('=') {
            Some((name, value)) => Definition::with_value(name, value),
            None => Definition::flag(raw),
        })
        .collect()
}

/// Definitions selecting how the runtime headers declare their exports.
///
/// Import declarations against the static Unix build fail to resolve, and
/// neutral declarations against the Windows DLLs duplicate definitions.
pub fn linkage_definitions(mode: LinkageMode) -> Vec<Definition> {
    let mut defs = vec![Definition::flag("PROTOBUF_USE_DLLS")];
    match mode {
        LinkageMode::DllImport => {
            defs.push(Definition::flag("gRPCXX_DLL_IMPORTS"));
            defs.push(Definition::flag("ABSL_CONSUME_DLL"));
        }
        LinkageMode::Neutral => defs.push(Definition::with_value("GRPCXX_DLL", "")),
    }
    defs
}

/// Every definition for `platform`: runtime, then linkage, then renames.
pub fn host_definitions(platform: Platform, renames: &RenameTable) -> Result<Vec<Definition>> {
    let family = platform.require_family()?;
    let mut defs = runtime_definitions();
    defs.extend(linkage_definitions(family.linkage()));
    defs.extend(renames.definitions());
    Ok(defs)
}
