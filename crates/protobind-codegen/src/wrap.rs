//! Warning-suppression wrapping of generated implementation files.
//!
//! Generated sources trip warnings that the host build may treat as
//! errors. Each implementation file is bracketed by a push/pop pragma pair
//! for the selected compiler dialect. A marker line naming the dialect
//! heads every wrapped file: rewrapping with the same dialect is a no-op,
//! and a different dialect replaces the old wrapper.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use protobind_targets::PragmaDialect;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{CodegenError, Result};

/// First line of every wrapped file, followed by ` (<dialect>)`.
pub const WRAP_MARKER: &str = "// protobind: warning suppression wrapper";

/// Suffix of generated implementation files.
pub const IMPLEMENTATION_SUFFIX: &str = ".pb.cc";

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Role of a generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRole {
    Implementation,
    Header,
}

impl SourceRole {
    /// Classify a generated file by name.
    pub fn of(path: &Path) -> Option<SourceRole> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(IMPLEMENTATION_SUFFIX) {
            Some(SourceRole::Implementation)
        } else if name.ends_with(".pb.h") {
            Some(SourceRole::Header)
        } else {
            None
        }
    }
}

/// Post-processing status of a generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapStatus {
    Unwrapped,
    /// Wrapped for this dialect; `None` if the marker names none we know.
    Wrapped(Option<PragmaDialect>),
}

impl WrapStatus {
    pub fn of(content: &[u8]) -> WrapStatus {
        let Some(rest) = content.strip_prefix(WRAP_MARKER.as_bytes()) else {
            return WrapStatus::Unwrapped;
        };
        let line = rest.split(|b| *b == b'\n').next().unwrap_or_default();
        let dialect = std::str::from_utf8(line)
            .ok()
            .and_then(|l| l.trim().strip_prefix('(')?.strip_suffix(')')?.parse().ok());
        WrapStatus::Wrapped(dialect)
    }
}

/// What [`wrap_file`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapAction {
    Wrapped,
    /// The wrapper of another dialect was replaced.
    Rewrapped,
    Unchanged,
}

/// Outcome of wrapping an output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrapReport {
    /// Files wrapped by this run.
    pub wrapped: Vec<PathBuf>,
    /// Files whose wrapper was for another dialect.
    pub rewrapped: Vec<PathBuf>,
    /// Files already wrapped for the requested dialect.
    pub already_wrapped: Vec<PathBuf>,
}

fn prologue(dialect: PragmaDialect) -> String {
    let body = match dialect {
        PragmaDialect::Msvc => concat!(
            "#pragma warning(push)\n",
            "#pragma warning(disable : 4800) // uint64_t -> bool\n",
        ),
        PragmaDialect::Gnu => concat!(
            "#pragma GCC diagnostic push\n",
            "#pragma GCC diagnostic ignored \"-Wint-conversion\"\n",
        ),
        PragmaDialect::Portable => concat!(
            "#if defined(_MSC_VER)\n",
            "\t#pragma warning(push)\n",
            "\t#pragma warning(disable : 4800) // uint64_t -> bool\n",
            "#elif defined(__clang__) || defined(__GNUC__)\n",
            "\t#pragma GCC diagnostic push\n",
            "\t#pragma GCC diagnostic ignored \"-Wint-conversion\"\n",
            "#endif\n",
        ),
    };
    format!("{WRAP_MARKER} ({dialect})\n{body}\n")
}

fn epilogue(dialect: PragmaDialect) -> &'static str {
    match dialect {
        PragmaDialect::Msvc => "\n#pragma warning(pop)\n",
        PragmaDialect::Gnu => "\n#pragma GCC diagnostic pop\n",
        PragmaDialect::Portable => concat!(
            "\n#if defined(_MSC_VER)\n",
            "\t#pragma warning(pop)\n",
            "#elif defined(__clang__) || defined(__GNUC__)\n",
            "\t#pragma GCC diagnostic pop\n",
            "#endif\n",
        ),
    }
}

/// The wrapped body, if `content` carries exactly `dialect`'s wrapper.
fn strip_wrapper(content: &[u8], dialect: PragmaDialect) -> Option<&[u8]> {
    content
        .strip_prefix(prologue(dialect).as_bytes())?
        .strip_suffix(epilogue(dialect).as_bytes())
}

/// Wrap source text for `dialect`.
///
/// Input already wrapped for `dialect` is returned unchanged; another
/// dialect's wrapper is replaced. A marker whose wrapper cannot be
/// matched is left alone rather than wrapped twice.
pub fn wrap_source(content: &[u8], dialect: PragmaDialect) -> Vec<u8> {
    let body = match WrapStatus::of(content) {
        WrapStatus::Unwrapped => content,
        WrapStatus::Wrapped(Some(current)) if current == dialect => return content.to_vec(),
        WrapStatus::Wrapped(Some(previous)) => match strip_wrapper(content, previous) {
            Some(body) => body,
            None => return content.to_vec(),
        },
        WrapStatus::Wrapped(None) => return content.to_vec(),
    };
    let mut wrapped = prologue(dialect).into_bytes();
    wrapped.extend_from_slice(body);
    wrapped.extend_from_slice(epilogue(dialect).as_bytes());
    wrapped
}

/// Wrap a single file in place for `dialect`.
pub fn wrap_file(path: &Path, dialect: PragmaDialect) -> Result<WrapAction> {
    let content = fs::read(path).map_err(|e| CodegenError::io(path, e))?;
    let status = WrapStatus::of(&content);
    let wrapped = wrap_source(&content, dialect);
    if wrapped == content {
        if status != WrapStatus::Wrapped(Some(dialect)) {
            warn!(file = %path.display(), %dialect, "unrecognized wrapper left in place");
        }
        return Ok(WrapAction::Unchanged);
    }
    replace_file(path, &wrapped)?;
    Ok(match status {
        WrapStatus::Unwrapped => WrapAction::Wrapped,
        WrapStatus::Wrapped(_) => WrapAction::Rewrapped,
    })
}

/// Wrap every generated implementation file under `out_dir`.
pub fn wrap_generated_sources(out_dir: &Path, dialect: PragmaDialect) -> Result<WrapReport> {
    let mut files = Vec::new();
    for entry in WalkDir::new(out_dir) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(out_dir).to_path_buf();
            CodegenError::io(path, e.into())
        })?;
        if entry.file_type().is_file()
            && SourceRole::of(entry.path()) == Some(SourceRole::Implementation)
        {
            files.push(entry.into_path());
        }
    }
    files.sort();

    let mut report = WrapReport::default();
    for file in files {
        match wrap_file(&file, dialect)? {
            WrapAction::Wrapped => {
                info!(file = %file.display(), %dialect, "wrapped warnings");
                report.wrapped.push(file);
            }
            WrapAction::Rewrapped => {
                info!(file = %file.display(), %dialect, "replaced wrapper of another dialect");
                report.rewrapped.push(file);
            }
            WrapAction::Unchanged => {
                debug!(file = %file.display(), "already wrapped");
                report.already_wrapped.push(file);
            }
        }
    }
    Ok(report)
}

/// Replace `path` with `contents` via a temporary sibling.
///
/// Write temp, remove original, rename temp into place. The final name
/// never holds partial content. Each step is retried for transient locks.
pub(crate) fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    retry(&tmp, || fs::write(&tmp, contents))?;
    retry(path, || match fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    })?;
    retry(path, || fs::rename(&tmp, path))
}

fn retry<T>(path: &Path, mut op: impl FnMut() -> std::io::Result<T>) -> Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(source) if attempt >= MAX_ATTEMPTS => {
                return Err(CodegenError::PostProcess {
                    path: path.to_path_buf(),
                    attempts: attempt,
                    source,
                });
            }
            Err(e) => {
                debug!(path = %path.display(), attempt, "retrying after {e}");
                thread::sleep(RETRY_BACKOFF * attempt);
                attempt += 1;
            }
        }
    }
}
