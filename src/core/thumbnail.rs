/*
 * Boundary to the thumbnail capture service. A capture launches the game, waits for it to show a
 * window, grabs an image of that window into the thumbnails directory and shuts the game down
 * again. Callers get a receiver that yields exactly one outcome; the capture itself runs on a
 * helper thread so the interactive thread never waits on it.
 *
 * Grabbing pixels from another process's window is platform specific and lives behind
 * `WindowGrabberOperations`.
 */
use crate::core::clock::ClockOperations;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const PROCESS_EXITED_MESSAGE: &str = "Process exited before capture.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Finished(PathBuf),
    Failed(String),
}

pub trait ThumbnailCaptureOperations: Send + Sync {
    fn start_capture(&self, executable: &Path, delay: Duration) -> Receiver<CaptureOutcome>;
}

pub trait WindowGrabberOperations: Send + Sync {
    // Writes an image of the main window of `process_id` to `destination`.
    fn grab_window(&self, process_id: u32, destination: &Path) -> Result<(), String>;
}

pub struct UnsupportedWindowGrabber {}

impl UnsupportedWindowGrabber {
    pub fn new() -> Self {
        UnsupportedWindowGrabber {}
    }
}

impl Default for UnsupportedWindowGrabber {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowGrabberOperations for UnsupportedWindowGrabber {
    fn grab_window(&self, process_id: u32, _destination: &Path) -> Result<(), String> {
        log::warn!("WindowGrabber: No window capture backend available for process {process_id}.");
        Err("Window capture is not supported on this platform.".to_string())
    }
}

pub struct ProcessThumbnailCapture {
    thumbnails_dir: PathBuf,
    grabber: Arc<dyn WindowGrabberOperations>,
    clock: Arc<dyn ClockOperations>,
}

impl ProcessThumbnailCapture {
    pub fn new(
        thumbnails_dir: PathBuf,
        grabber: Arc<dyn WindowGrabberOperations>,
        clock: Arc<dyn ClockOperations>,
    ) -> Self {
        ProcessThumbnailCapture {
            thumbnails_dir,
            grabber,
            clock,
        }
    }

    // `thumb_<unix-millis>.png` inside the thumbnails directory.
    pub fn next_thumbnail_path(&self) -> PathBuf {
        let millis = self.clock.now().unix_timestamp_nanos() / 1_000_000;
        self.thumbnails_dir.join(format!("thumb_{millis}.png"))
    }

    fn fail(outcome_tx: &Sender<CaptureOutcome>, reason: String) {
        log::warn!("ThumbnailCapture: {reason}");
        // The caller may have stopped listening; nothing else to do then.
        let _ = outcome_tx.send(CaptureOutcome::Failed(reason));
    }
}

impl ThumbnailCaptureOperations for ProcessThumbnailCapture {
    fn start_capture(&self, executable: &Path, delay: Duration) -> Receiver<CaptureOutcome> {
        let (outcome_tx, outcome_rx) = mpsc::channel();

        if executable.as_os_str().is_empty() {
            Self::fail(&outcome_tx, "No executable set for this game.".to_string());
            return outcome_rx;
        }

        let mut command = Command::new(executable);
        command.stdin(Stdio::null());
        if let Some(dir) = executable.parent().filter(|p| !p.as_os_str().is_empty()) {
            command.current_dir(dir);
        }
        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                Self::fail(&outcome_tx, format!("Failed to start {executable:?}: {e}"));
                return outcome_rx;
            }
        };
        log::info!(
            "ThumbnailCapture: Started {executable:?} (pid {}); capturing in {delay:?}.",
            child.id()
        );

        let destination = self.next_thumbnail_path();
        let grabber = Arc::clone(&self.grabber);
        let worker_tx = outcome_tx.clone();
        let spawn_result = thread::Builder::new()
            .name("gamedb-capture".to_string())
            .spawn(move || {
                let mut child = child;
                thread::sleep(delay);
                let outcome = capture_running_process(&mut child, &destination, grabber.as_ref());
                match &outcome {
                    CaptureOutcome::Finished(path) => {
                        log::info!("ThumbnailCapture: Saved thumbnail {path:?}.")
                    }
                    CaptureOutcome::Failed(reason) => log::warn!("ThumbnailCapture: {reason}"),
                }
                let _ = worker_tx.send(outcome);
            });
        if let Err(e) = spawn_result {
            Self::fail(&outcome_tx, format!("Failed to start capture thread: {e}"));
        }
        outcome_rx
    }
}

/*
 * Grabs the window of a process that has had time to start up, then terminates it. A process
 * that has already exited cannot be captured.
 */
fn capture_running_process(
    child: &mut Child,
    destination: &Path,
    grabber: &dyn WindowGrabberOperations,
) -> CaptureOutcome {
    match child.try_wait() {
        Ok(Some(_status)) => return CaptureOutcome::Failed(PROCESS_EXITED_MESSAGE.to_string()),
        Ok(None) => {}
        Err(e) => return CaptureOutcome::Failed(format!("Failed to query process state: {e}")),
    }

    let outcome = match destination.parent().map(fs::create_dir_all).transpose() {
        Err(e) => CaptureOutcome::Failed(format!(
            "Failed to create thumbnail directory for {destination:?}: {e}"
        )),
        Ok(_) => match grabber.grab_window(child.id(), destination) {
            Ok(()) => CaptureOutcome::Finished(destination.to_path_buf()),
            Err(reason) => CaptureOutcome::Failed(reason),
        },
    };

    if let Err(e) = child.kill() {
        log::debug!("ThumbnailCapture: Could not terminate pid {}: {e}", child.id());
    }
    let _ = child.wait();
    outcome
}
