//! File utility functions

use std::path::PathBuf;

/// Expand a user-supplied path to an absolute path.
///
/// `~` and `~/...` resolve against the home directory. Relative paths are
/// joined onto the current working directory. An empty string yields the
/// current directory.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();
    let cwd = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if path.is_empty() {
        return cwd();
    }

    let expanded = match (path, dirs::home_dir()) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    };

    if expanded.is_relative() {
        cwd().join(expanded)
    } else {
        expanded
    }
}
