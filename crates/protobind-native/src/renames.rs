//! The symbol-rename table.
//!
//! The bundled runtime is built with its namespaces and internal hooks
//! renamed. Every translation unit that includes its headers must see the
//! same renames as preprocessor definitions, or references resolve against
//! the canonical names and fail at link or load time.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use serde::Serialize;

use crate::definitions::Definition;
use crate::error::{NativeError, Result};
use crate::lexer::{identifiers, is_identifier};

/// Canonical symbol to project-prefixed alias.
const BUILTIN_RENAMES: &[(&str, &str)] = &[
    ("absl", "absl_tong"),
    ("grpc_error_to_absl_status", "grpc_error_to_absl_tong_status"),
    ("absl_random_internal_seed_material", "absl_tong_random_internal_seed_material"),
    ("AbslContainerInternalSampleEverything", "AbslTongContainerInternalSampleEverything"),
    ("AbslInternalGetFileMappingHint", "AbslTongInternalGetFileMappingHint"),
    ("AbslInternalMutexYield", "AbslTongInternalMutexYield"),
    ("AbslInternalPerThreadSemPost", "AbslTongInternalPerThreadSemPost"),
    ("AbslInternalPerThreadSemWait", "AbslTongInternalPerThreadSemWait"),
    ("AbslInternalReportFatalUsageError", "AbslTongInternalReportFatalUsageError"),
    ("AbslInternalSleepFor", "AbslTongInternalSleepFor"),
    ("AbslInternalSpinLockDelay", "AbslTongInternalSpinLockDelay"),
    ("AbslInternalSpinLockWake", "AbslTongInternalSpinLockWake"),
];

/// One rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameRule {
    pub canonical: String,
    pub renamed: String,
}

impl RenameRule {
    pub fn definition(&self) -> Definition {
        Definition::with_value(&self.canonical, &self.renamed)
    }
}

/// An ordered set of renames, at most one per canonical symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RenameTable {
    rules: Vec<RenameRule>,
}

impl RenameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The renames the bundled runtime was built with.
    pub fn builtin() -> &'static RenameTable {
        static BUILTIN: OnceLock<RenameTable> = OnceLock::new();
        BUILTIN.get_or_init(|| RenameTable {
            rules: BUILTIN_RENAMES
                .iter()
                .map(|(canonical, renamed)| RenameRule {
                    canonical: canonical.to_string(),
                    renamed: renamed.to_string(),
                })
                .collect(),
        })
    }

    /// Add a rule, rejecting invalid names and duplicate canonical symbols.
    pub fn insert(&mut self, canonical: &str, renamed: &str) -> Result<()> {
        for name in [canonical, renamed] {
            if !is_identifier(name) {
                return Err(NativeError::InvalidRename {
                    name: name.to_string(),
                    detail: "not a C identifier".to_string(),
                });
            }
        }
        if canonical == renamed {
            return Err(NativeError::InvalidRename {
                name: canonical.to_string(),
                detail: "renames to itself".to_string(),
            });
        }
        if self.get(canonical).is_some() {
            return Err(NativeError::DuplicateRename {
                canonical: canonical.to_string(),
            });
        }
        self.rules.push(RenameRule {
            canonical: canonical.to_string(),
            renamed: renamed.to_string(),
        });
        Ok(())
    }

    /// The built-in table plus `extra` rules.
    pub fn with_extra<'a>(extra: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut table = Self::builtin().clone();
        for (canonical, renamed) in extra {
            table.insert(canonical, renamed)?;
        }
        Ok(table)
    }

    pub fn get(&self, canonical: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.canonical == canonical)
            .map(|rule| rule.renamed.as_str())
    }

    pub fn rules(&self) -> &[RenameRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn canonical_names(&self) -> BTreeSet<&str> {
        self.rules.iter().map(|rule| rule.canonical.as_str()).collect()
    }

    /// One `canonical=renamed` definition per rule, in table order.
    pub fn definitions(&self) -> Vec<Definition> {
        self.rules.iter().map(RenameRule::definition).collect()
    }

    /// Substitute whole identifiers the way the preprocessor would.
    ///
    /// Comments and literals are left alone. A single pass, so an alias
    /// that is itself canonical is not renamed again.
    pub fn apply(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut last = 0;
        for id in identifiers(source) {
            if let Some(renamed) = self.get(id.text) {
                out.push_str(&source[last..id.span.start]);
                out.push_str(renamed);
                last = id.span.end;
            }
        }
        out.push_str(&source[last..]);
        out
    }
}
