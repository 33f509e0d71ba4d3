use crate::core::models::GameRecord;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

#[derive(Debug)]
pub enum LaunchError {
    NoExecutable(PathBuf),
    Io(PathBuf, io::Error),
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::NoExecutable(game) => {
                write!(f, "No executable is set for {game:?}")
            }
            LaunchError::Io(exe, e) => write!(f, "Failed to start {exe:?}: {e}"),
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::NoExecutable(_) => None,
            LaunchError::Io(_, e) => Some(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;

pub trait GameLauncherOperations: Send + Sync {
    /*
     * Starts the record's launch executable with its containing directory as the working
     * directory and returns the process id. The process is left running and is reaped in the
     * background once it exits.
     */
    fn launch(&self, game: &GameRecord) -> Result<u32>;
}

pub struct CoreGameLauncher {}

impl CoreGameLauncher {
    pub fn new() -> Self {
        CoreGameLauncher {}
    }
}

impl Default for CoreGameLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl GameLauncherOperations for CoreGameLauncher {
    fn launch(&self, game: &GameRecord) -> Result<u32> {
        if !game.has_launch_executable() {
            return Err(LaunchError::NoExecutable(game.file_path.clone()));
        }
        let executable = Path::new(&game.launch_executable_path);
        let mut command = Command::new(executable);
        command.stdin(Stdio::null());
        if let Some(dir) = executable.parent().filter(|p| !p.as_os_str().is_empty()) {
            command.current_dir(dir);
        }
        let child = command
            .spawn()
            .map_err(|e| LaunchError::Io(executable.to_path_buf(), e))?;
        let pid = child.id();
        log::info!(
            "GameLauncher: Started {executable:?} for {:?} (pid {pid}).",
            game.file_path
        );
        if let Err(e) = reap_in_background(child) {
            log::warn!("GameLauncher: Could not start a waiter for pid {pid}: {e}");
        }
        Ok(pid)
    }
}

// Waits for `child` on a helper thread so it does not linger as a zombie after it exits.
fn reap_in_background(mut child: Child) -> io::Result<JoinHandle<Option<ExitStatus>>> {
    thread::Builder::new()
        .name("gamedb-launch-waiter".to_string())
        .spawn(move || {
            let pid = child.id();
            match child.wait() {
                Ok(status) => {
                    log::debug!("GameLauncher: pid {pid} exited with {status}.");
                    Some(status)
                }
                Err(e) => {
                    log::warn!("GameLauncher: Waiting for pid {pid} failed: {e}");
                    None
                }
            }
        })
}
