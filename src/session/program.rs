//! Launch preflight: resolve the program under test before anything runs.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::core::errors::{Result, SuvError};

/// Resolve `program` to an existing executable file.
///
/// Paths with a separator are checked as given; a bare name is searched on
/// `PATH`.
pub fn resolve_program(program: &Path) -> Result<PathBuf> {
    resolve_program_in(program, env::var_os("PATH").as_deref())
}

fn resolve_program_in(program: &Path, search_path: Option<&OsStr>) -> Result<PathBuf> {
    if program.as_os_str().is_empty() {
        return Err(SuvError::ProgramNotFound {
            path: program.to_path_buf(),
        });
    }

    if program.components().count() > 1 || program.is_absolute() {
        return check_executable(program);
    }

    let candidates = search_path
        .map(|paths| env::split_paths(paths).collect::<Vec<_>>())
        .unwrap_or_default();
    let mut first_non_executable = None;
    for dir in candidates {
        let candidate = dir.join(program);
        match check_executable(&candidate) {
            Ok(found) => return Ok(found),
            Err(err @ SuvError::ProgramNotExecutable { .. }) => {
                first_non_executable.get_or_insert(err);
            }
            Err(_) => {}
        }
    }
    Err(first_non_executable.unwrap_or_else(|| SuvError::ProgramNotFound {
        path: program.to_path_buf(),
    }))
}

fn check_executable(path: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        return Err(SuvError::ProgramNotFound {
            path: path.to_path_buf(),
        });
    }
    if !is_executable(path) {
        return Err(SuvError::ProgramNotExecutable {
            path: path.to_path_buf(),
        });
    }
    Ok(path.to_path_buf())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use nix::unistd::{AccessFlags, access};
    access(path, AccessFlags::X_OK).is_ok()
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
