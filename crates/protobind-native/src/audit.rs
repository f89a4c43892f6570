//! Rename-completeness audit of translation units.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::definitions::Definition;
use crate::error::{NativeError, Result};
use crate::lexer::identifiers;
use crate::renames::RenameTable;

/// A canonical symbol referenced without its rename in effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditFinding {
    pub symbol: String,
    /// The alias the unit must be compiled with.
    pub expected: String,
    /// First line referencing the symbol.
    pub line: usize,
    /// Number of references in the unit.
    pub occurrences: usize,
}

impl fmt::Display for AuditFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: '{}' is not renamed to '{}' ({} reference{})",
            self.line,
            self.symbol,
            self.expected,
            self.occurrences,
            if self.occurrences == 1 { "" } else { "s" }
        )
    }
}

/// Report every canonical symbol in `source` whose rename is missing from
/// `definitions`.
///
/// A definition of the canonical name to any other alias counts as a
/// mismatch too, since the unit would then link against neither build.
pub fn audit_translation_unit(
    source: &str,
    table: &RenameTable,
    definitions: &[Definition],
) -> Vec<AuditFinding> {
    let defined: HashMap<&str, Option<&str>> = definitions
        .iter()
        .map(|d| (d.name.as_str(), d.value.as_deref()))
        .collect();

    let mut findings: Vec<AuditFinding> = Vec::new();
    for id in identifiers(source) {
        let Some(expected) = table.get(id.text) else {
            continue;
        };
        if defined.get(id.text) == Some(&Some(expected)) {
            continue;
        }
        match findings.iter_mut().find(|f| f.symbol == id.text) {
            Some(finding) => finding.occurrences += 1,
            None => findings.push(AuditFinding {
                symbol: id.text.to_string(),
                expected: expected.to_string(),
                line: id.line,
                occurrences: 1,
            }),
        }
    }
    findings
}

/// [`audit_translation_unit`] over a file on disk.
pub fn audit_file(
    path: &Path,
    table: &RenameTable,
    definitions: &[Definition],
) -> Result<Vec<AuditFinding>> {
    let bytes = fs::read(path).map_err(|e| NativeError::io(path, e))?;
    let source = String::from_utf8_lossy(&bytes);
    Ok(audit_translation_unit(&source, table, definitions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn x_to_y() -> RenameTable {
        let mut table = RenameTable::new();
        table.insert("X", "Y").unwrap();
        table
    }

    const UNIT: &str = "int X(void);\nint main(void) { return X() - 1; }\n";

    #[test]
    fn unit_is_flagged_without_the_table() {
        let table = x_to_y();
        let findings = audit_translation_unit(UNIT, &table, &[]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].symbol, "X");
        assert_eq!(findings[0].expected, "Y");
        assert_eq!(findings[0].line, 1);
        assert_eq!(findings[0].occurrences, 2);
    }

    #[test]
    fn unit_is_clean_with_the_table() {
        let table = x_to_y();
        assert!(audit_translation_unit(UNIT, &table, &table.definitions()).is_empty());
        // Pre-renamed source needs no definitions.
        assert!(audit_translation_unit(&table.apply(UNIT), &table, &[]).is_empty());
    }

    #[test]
    fn wrong_alias_is_flagged() {
        let table = x_to_y();
        let defs = vec![Definition::with_value("X", "Z")];
        assert_eq!(audit_translation_unit(UNIT, &table, &defs).len(), 1);
    }

    #[test]
    fn comments_and_strings_are_ignored() {
        let source = "// uses absl\nconst char* s = \"absl::Mutex\";\n";
        assert!(audit_translation_unit(source, RenameTable::builtin(), &[]).is_empty());
    }

    #[test]
    fn digit_separator_does_not_hide_symbols() {
        let source = "constexpr int kMax = 1'000;\nabsl::Mutex mu;\nchar c = 'x';\n";
        let findings = audit_translation_unit(source, RenameTable::builtin(), &[]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].symbol, "absl");
        assert_eq!(findings[0].line, 2);
    }

    #[test]
    fn audits_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pose.pb.cc");
        fs::write(&path, "#include \"absl/strings/str_cat.h\"\nabsl::StrCat(a, b);\n").unwrap();
        let findings = audit_file(&path, RenameTable::builtin(), &[]).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 2);
        assert!(findings[0].to_string().contains("absl_tong"));
    }

    /// With a C compiler available, an unrenamed reference fails to link
    /// against a library that only provides the alias.
    #[test]
    fn unapplied_rename_fails_at_link_time() {
        if Command::new("cc").arg("--version").output().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("lib.c");
        let main = dir.path().join("main.c");
        fs::write(&lib, "int Y(void) { return 1; }\n").unwrap();
        fs::write(&main, UNIT).unwrap();

        let link = |defines: &[String]| {
            Command::new("cc")
                .args(defines)
                .arg(&main)
                .arg(&lib)
                .arg("-o")
                .arg(dir.path().join("unit"))
                .output()
                .unwrap()
                .status
                .success()
        };

        assert!(!link(&[]));
        let defines: Vec<String> = x_to_y()
            .definitions()
            .iter()
            .map(|d| format!("-D{d}"))
            .collect();
        assert!(link(&defines));
    }
}
