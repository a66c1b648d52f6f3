use crate::env::Environment;
use nix::unistd::{AccessFlags, access};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Outcome of looking a command name up on disk.
///
/// `NotExecutable` is a classification, not a failure: the caller reports
/// "command not found" and moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Executable(PathBuf),
    NotExecutable,
}

/// Resolve a command name the way the shell runs it.
///
/// - Empty name: nothing.
/// - A name with a separator (`/bin/ls`, `./a.out`, `bin/tool`): that path,
///   relative names taken from the shell's working directory.
/// - A bare name: each `$PATH` entry in order, then the working directory.
///
/// Only regular files with execute permission qualify.
pub fn resolve(name: &str, env: &Environment) -> Resolution {
    let path = Path::new(name);
    let mut components = path.components();
    let found = match (components.next(), components.next()) {
        (None, _) => None,
        (Some(_), None) if !name.contains('/') => {
            find_in_path(&env.search_path(), path.as_os_str())
                .or_else(|| executable(env.current_dir.join(path)))
        }
        _ if path.is_absolute() => executable(path.to_path_buf()),
        _ => executable(env.current_dir.join(path)),
    };
    match found {
        Some(path) => Resolution::Executable(path),
        None => {
            debug!(name, "not executable");
            Resolution::NotExecutable
        }
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .find_map(|dir| executable(dir.join(cmd)))
}

fn executable(path: PathBuf) -> Option<PathBuf> {
    is_executable(&path).then_some(path)
}

/// Regular file that this process may execute.
pub fn is_executable(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
        && access(path, AccessFlags::X_OK).is_ok()
}
