mod app_logic;
mod core;

use crate::app_logic::{AppNotice, LibraryController, LibraryServices};
use crate::core::{
    AppPaths, CoreConfigManager, CoreFileStore, CoreGameLauncher, CoreScanner, DirectoryIndex,
    GameRecord, ProcessThumbnailCapture, SystemClock, UnsupportedWindowGrabber,
};
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;

const APP_NAME: &str = "GameDb";
const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/*
 * Terminal logging at Info plus a Debug-level log file in the data directory. Falls back to
 * terminal logging alone when the log file cannot be created.
 */
fn initialize_logging(log_file: Option<&Path>) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    let mut file_error = None;
    if let Some(path) = log_file {
        match File::create(path) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file)),
            Err(e) => file_error = Some((path.to_path_buf(), e)),
        }
    }
    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Failed to initialize logging: {e}");
        return;
    }
    if let Some((path, e)) = file_error {
        log::warn!("Main: Could not create log file {path:?}: {e}. Logging to terminal only.");
    }
}

fn print_notices(notices: &[AppNotice]) {
    for notice in notices {
        match notice {
            AppNotice::Info(message) => println!("{message}"),
            AppNotice::Warning(message) => eprintln!("warning: {message}"),
        }
    }
}

fn print_browse_tree(controller: &LibraryController) {
    let browse: &DirectoryIndex = controller.browse();
    let Some(root) = browse.root() else {
        return;
    };
    println!("Browsing {}", root.display());
    for id in browse.top_level() {
        if let Some(node) = browse.node(*id) {
            let marker = if controller.is_in_library(&node.entry.absolute_path) {
                '*'
            } else {
                ' '
            };
            println!(
                " {marker} {:<40} {:<8} {}",
                node.entry.display_name,
                node.entry.kind.label(),
                node.entry.original_name
            );
        }
    }
    println!();
}

fn last_played_text(game: &GameRecord) -> String {
    game.last_played_at
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_default()
}

fn print_library_table(controller: &LibraryController) {
    let view = controller.view().borrow();
    println!(
        "{:<32} {:<24} {:<8} {:<6} {:<30} {}",
        "Name", "Folder", "Type", "Korean", "Tags", "Last played"
    );
    for game in view.rows().iter() {
        println!(
            "{:<32} {:<24} {:<8} {:<6} {:<30} {}",
            game.clean_name,
            game.folder_name,
            game.game_type.label(),
            if game.korean_support { "yes" } else { "" },
            game.tags_joined(),
            last_played_text(game)
        );
    }
    println!("{} of {} games shown.", view.len(), view.source_len());
}

fn main() -> ExitCode {
    let Some(paths) = AppPaths::for_current_user(APP_NAME) else {
        initialize_logging(None);
        log::error!("Main: Could not determine a per-user data directory.");
        return ExitCode::FAILURE;
    };
    initialize_logging(Some(&paths.log_file));
    log::info!("Main: Using data directory {:?}.", paths.base_dir);

    let clock = Arc::new(SystemClock::new());
    let services = LibraryServices {
        storage: Arc::new(CoreFileStore::new()),
        clock: clock.clone(),
        scanner: Arc::new(CoreScanner::new()),
        config_manager: Arc::new(CoreConfigManager::new()),
        launcher: Arc::new(CoreGameLauncher::new()),
        thumbnail_capture: Arc::new(ProcessThumbnailCapture::new(
            paths.thumbnails_dir.clone(),
            Arc::new(UnsupportedWindowGrabber::new()),
            clock,
        )),
    };
    let mut controller = match LibraryController::new(&paths, services) {
        Ok(controller) => controller,
        Err(e) => {
            log::error!("Main: Failed to start the scan worker: {e}");
            return ExitCode::FAILURE;
        }
    };

    let notices = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(root) => controller.open_root(&root),
        None => controller.on_startup(),
    };
    print_notices(&notices);
    if !controller.wait_for_scans(SCAN_TIMEOUT) {
        eprintln!("warning: directory scan did not finish in time.");
    }

    print_browse_tree(&controller);
    print_library_table(&controller);
    ExitCode::SUCCESS
}
