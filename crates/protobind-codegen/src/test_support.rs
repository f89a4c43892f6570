//! Fixtures shared by the process-spawning tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

static PROCESS_LOCK: Mutex<()> = Mutex::new(());

/// Serialize script creation and process spawning within this test binary.
///
/// A script written while another thread forks can be inherited open for
/// writing by that child, which makes executing it fail with ETXTBSY.
pub(crate) fn lock_processes() -> MutexGuard<'static, ()> {
    PROCESS_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Write an executable `/bin/sh` script.
#[cfg(unix)]
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A stand-in for the schema compiler.
///
/// Binding calls write `<rel>.pb.cc`/`<rel>.pb.h` (and service stubs for
/// schemas whose name contains `service`); descriptor calls write the
/// artifact. Every invocation appends its arguments to `invocations.log`
/// beside the script.
pub(crate) const FAKE_COMPILER: &str = r##"
log="$(dirname "$0")/invocations.log"
echo "$*" >> "$log"
root=""
out=""
desc=""
for arg in "$@"; do
  case "$arg" in
    --proto_path=*) root="${arg#--proto_path=}" ;;
  esac
done
for arg in "$@"; do
  case "$arg" in
    --proto_path=*|--grpc_cpp_out=*|--include_imports) ;;
    --cpp_out=*) out="${arg#--cpp_out=}" ;;
    --descriptor_set_out=*) desc="${arg#--descriptor_set_out=}" ;;
    *)
      if [ -n "$out" ]; then
        rel="${arg#"$root"/}"
        base="${rel%.proto}"
        mkdir -p "$(dirname "$out/$base")"
        printf '// generated from %s\nint impl;\n' "$rel" > "$out/$base.pb.cc"
        printf '// generated from %s\n' "$rel" > "$out/$base.pb.h"
        case "$base" in
          *service*)
            printf '// stubs for %s\n' "$rel" > "$out/$base.grpc.pb.cc"
            printf '// stubs for %s\n' "$rel" > "$out/$base.grpc.pb.h"
            ;;
        esac
      fi
      ;;
  esac
done
if [ -n "$desc" ]; then
  printf 'descriptor' > "$desc"
fi
echo "fake compiler ok"
"##;

/// Install the fake compiler where the Linux layout expects it.
#[cfg(unix)]
pub(crate) fn install_fake_compiler(plugin_root: &Path) -> PathBuf {
    write_script(
        &plugin_root.join("GrpcPrograms").join("Linux"),
        "protoc",
        FAKE_COMPILER,
    )
}

/// Arguments of every recorded invocation, one entry per call.
pub(crate) fn invocations(compiler: &Path) -> Vec<String> {
    let log = compiler.with_file_name("invocations.log");
    fs::read_to_string(log)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
