/*
 * Runs a `ScannerOperations` implementation on a dedicated background thread so directory I/O
 * never blocks the interactive thread. Requests are queued over a channel and handled strictly
 * one at a time, in the order they were made; there is no preemption or cancellation of a scan
 * in flight. Results travel back over a second channel and are drained by the owning thread,
 * which is the only place they may be handed to the library or the browse session.
 */
use crate::core::events::ScanEvent;
use crate::core::scanner::ScannerOperations;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const WORKER_THREAD_NAME: &str = "gamedb-scanner";

pub struct ScanWorker {
    request_tx: Option<Sender<PathBuf>>,
    event_rx: Receiver<ScanEvent>,
    handle: Option<JoinHandle<()>>,
}

impl ScanWorker {
    pub fn spawn(scanner: Arc<dyn ScannerOperations>) -> io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<PathBuf>();
        let (event_tx, event_rx) = mpsc::channel::<ScanEvent>();

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(scanner, request_rx, event_tx))?;
        log::debug!("ScanWorker: Started worker thread '{WORKER_THREAD_NAME}'.");

        Ok(ScanWorker {
            request_tx: Some(request_tx),
            event_rx,
            handle: Some(handle),
        })
    }

    /*
     * Queues a scan of `directory` and returns immediately. Returns false if the worker has
     * already been shut down, in which case nothing will be reported for this request.
     */
    pub fn request_scan(&self, directory: PathBuf) -> bool {
        let Some(request_tx) = &self.request_tx else {
            log::warn!("ScanWorker: Scan of {directory:?} requested after shutdown; ignored.");
            return false;
        };
        log::trace!("ScanWorker: Queueing scan of {directory:?}.");
        match request_tx.send(directory) {
            Ok(()) => true,
            Err(e) => {
                log::error!("ScanWorker: Worker thread is gone; scan of {:?} dropped.", e.0);
                false
            }
        }
    }

    // Drains every event that has arrived so far without blocking.
    pub fn try_recv_events(&self) -> Vec<ScanEvent> {
        self.event_rx.try_iter().collect()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ScanEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /*
     * Stops accepting requests and waits for the worker to finish whatever is already queued.
     */
    pub fn shutdown(&mut self) {
        self.request_tx = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("ScanWorker: Worker thread panicked.");
            } else {
                log::debug!("ScanWorker: Worker thread stopped.");
            }
        }
    }
}

impl Drop for ScanWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    scanner: Arc<dyn ScannerOperations>,
    request_rx: Receiver<PathBuf>,
    event_tx: Sender<ScanEvent>,
) {
    for directory in request_rx {
        let mut receiver_gone = false;
        scanner.scan_directory(&directory, &mut |entry| {
            if !receiver_gone && event_tx.send(ScanEvent::EntryFound(entry)).is_err() {
                receiver_gone = true;
            }
        });
        if receiver_gone || event_tx.send(ScanEvent::Finished { directory }).is_err() {
            log::debug!("ScanWorker: Event receiver dropped; stopping worker.");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{GameType, ScanEntry};
    use std::path::Path;

    // Emits two folders per request, slowly, so queued requests overlap with running ones.
    struct SlowScanner;

    impl ScannerOperations for SlowScanner {
        fn scan_directory(&self, directory: &Path, on_entry: &mut dyn FnMut(ScanEntry)) {
            for name in ["one", "two"] {
                thread::sleep(Duration::from_millis(20));
                on_entry(ScanEntry {
                    absolute_path: directory.join(name),
                    original_name: name.to_string(),
                    display_name: name.to_string(),
                    kind: GameType::Folder,
                });
            }
        }
    }

    fn collect_until_finished(worker: &ScanWorker, expected_finishes: usize) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        let mut finishes = 0;
        while finishes < expected_finishes {
            let Some(event) = worker.recv_timeout(Duration::from_secs(5)) else {
                panic!("Timed out waiting for scan events; got {events:?}");
            };
            if matches!(event, ScanEvent::Finished { .. }) {
                finishes += 1;
            }
            events.push(event);
        }
        events
    }

    #[test]
    fn test_requests_are_processed_in_order_one_at_a_time() {
        // Arrange
        let worker = ScanWorker::spawn(Arc::new(SlowScanner)).unwrap();

        // Act
        assert!(worker.request_scan(PathBuf::from("/a")));
        assert!(worker.request_scan(PathBuf::from("/b")));
        let events = collect_until_finished(&worker, 2);

        // Assert
        let paths: Vec<String> = events
            .iter()
            .map(|event| match event {
                ScanEvent::EntryFound(entry) => entry.absolute_path.display().to_string(),
                ScanEvent::Finished { directory } => format!("done:{}", directory.display()),
            })
            .collect();
        assert_eq!(
            paths,
            vec!["/a/one", "/a/two", "done:/a", "/b/one", "/b/two", "done:/b"]
        );
    }

    #[test]
    fn test_missing_directory_still_reports_finished() {
        let worker = ScanWorker::spawn(Arc::new(crate::core::scanner::CoreScanner::new())).unwrap();
        let missing = std::env::temp_dir().join(format!("gamedb-missing-{}", rand::random::<u64>()));

        worker.request_scan(missing.clone());
        let events = collect_until_finished(&worker, 1);

        assert_eq!(events, vec![ScanEvent::Finished { directory: missing }]);
    }

    #[test]
    fn test_request_after_shutdown_is_rejected() {
        let mut worker = ScanWorker::spawn(Arc::new(SlowScanner)).unwrap();
        worker.request_scan(PathBuf::from("/queued"));

        worker.shutdown();

        assert!(!worker.request_scan(PathBuf::from("/late")));
        let drained = worker.try_recv_events();
        assert_eq!(drained.len(), 3, "queued scan completes before shutdown returns");
    }
}
