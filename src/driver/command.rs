//! Command building for the child process

use std::env;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{HarnessError, Result};
use crate::types::RunRequest;

/// Command builder for a [`RunRequest`]
pub(super) struct CommandBuilder<'a> {
    request: &'a RunRequest,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    pub(super) const fn new(request: &'a RunRequest) -> Self {
        Self { request }
    }

    /// Build the command with all three stdio streams piped
    ///
    /// # Errors
    /// Returns error if argv is empty or the program cannot be found
    pub(super) fn build(&self) -> Result<Command> {
        let program = self.request.program();
        if program.is_empty() {
            return Err(HarnessError::invalid_request("argv must name a program"));
        }

        let path_var = self
            .request
            .env
            .get("PATH")
            .map(OsString::from)
            .or_else(|| env::var_os("PATH"));
        let resolved = resolve_program(program, path_var, self.request.cwd.as_deref())?;

        let mut cmd = Command::new(resolved);
        cmd.args(self.request.args());

        if let Some(ref cwd) = self.request.cwd {
            cmd.current_dir(cwd);
        }
        cmd.envs(&self.request.env);

        // The child must never see our terminal; its stderr is collected, not inherited
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        Ok(cmd)
    }
}

/// Resolve argv[0] to an executable path
///
/// Names containing a path separator are used as given. Bare names are
/// looked up in `path_var` (falling back to the process `PATH`).
///
/// # Errors
/// Returns [`HarnessError::Spawn`] with [`io::ErrorKind::NotFound`] if a bare
/// name cannot be found
fn resolve_program(
    program: &str,
    path_var: Option<OsString>,
    cwd: Option<&Path>,
) -> Result<PathBuf> {
    if program.contains('/') || program.contains(std::path::MAIN_SEPARATOR) {
        return Ok(PathBuf::from(program));
    }

    let cwd = match cwd {
        Some(dir) => dir.to_path_buf(),
        None => env::current_dir()?,
    };

    which::which_in(program, path_var, cwd).map_err(|e| {
        HarnessError::spawn(
            program,
            io::Error::new(io::ErrorKind::NotFound, format!("{program}: {e}")),
        )
    })
}
