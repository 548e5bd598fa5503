//! Shell quoting and executable lookup for emitted commands.
//!
//! Command strings end up passed verbatim to a POSIX shell by the build
//! executor, so every executable and argument goes through [`escape`]. The
//! quoting discipline matches what that toolchain expects byte for byte.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

/// Prefix marking tools implemented inside the planner rather than on disk.
pub const BUILTIN_PREFIX: &str = "builtin-";

/// Quote `value` for a POSIX shell command line.
///
/// Strings made entirely of safe characters pass through verbatim; anything
/// else is wrapped in single quotes, with each embedded single quote
/// rendered as `'"'"'`.
#[must_use]
pub fn escape(value: &str) -> String {
    if value.chars().all(is_safe) {
        return value.to_owned();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\"'\"'");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

fn is_safe(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(ch, '@' | '%' | '_' | '-' | '+' | '=' | ':' | ',' | '.' | '/')
}

/// Locate the executable for an invocation.
///
/// Returns `None` for `builtin-` tools, which callers treat as "skip this
/// invocation", and for bare or relative names not found on the search
/// path. Absolute paths are returned unchanged without touching the
/// filesystem.
#[must_use]
pub fn resolve_executable(executable: &str, search_paths: &[Utf8PathBuf]) -> Option<Utf8PathBuf> {
    if executable.starts_with(BUILTIN_PREFIX) {
        return None;
    }
    let path = Utf8Path::new(executable);
    if path.is_absolute() {
        return Some(path.to_path_buf());
    }
    search_paths
        .iter()
        .map(|directory| directory.join(executable))
        .find(|candidate| is_executable(candidate))
}

/// Check whether `path` points to an executable file.
///
/// On Unix this requires at least one execute bit; elsewhere any regular
/// file qualifies.
fn is_executable(path: &Utf8Path) -> bool {
    fs::metadata(path.as_std_path())
        .is_ok_and(|metadata| metadata.is_file() && has_execute_permission(&metadata))
}

#[cfg(unix)]
fn has_execute_permission(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_execute_permission(metadata: &fs::Metadata) -> bool {
    metadata.is_file()
}
