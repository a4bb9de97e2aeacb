//! File system watcher for incremental extraction.
//!
//! Watches the source root and, when it lives elsewhere, the fragments
//! directory. Events are handled one at a time on this thread, in arrival
//! order, with no debounce and no queue beyond the notify channel.
//!
//! ```text
//! ┌───────────┐    ┌──────────────────┐    ┌────────────────────────────┐
//! │  notify   │───▶│ categorize_path  │───▶│ Controller::handle_change  │
//! │  events   │    │ (skip Unknown)   │    │ (fatal error ends the loop)│
//! └───────────┘    └──────────────────┘    └────────────────────────────┘
//! ```

use crate::{
    config::ProjectConfig,
    controller::Controller,
    engine::QueryEngine,
    log,
    pages::PageRegistry,
    utils::{
        category::{FileCategory, categorize_path},
        files::is_temp_file,
    },
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::RecvTimeoutError,
    },
    time::Duration,
};

/// How often the loop checks for Ctrl+C while idle.
const STOP_POLL: Duration = Duration::from_millis(200);

const WATCH_CATEGORIES: &[FileCategory] = &[FileCategory::Source, FileCategory::Fragments];

/// Format path as relative to root for log display.
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

const fn is_relevant(event: &Event) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
}

/// Paths of one event, in order, without duplicates or editor artifacts.
fn event_paths(event: Event) -> Vec<PathBuf> {
    let mut seen = FxHashSet::default();
    event
        .paths
        .into_iter()
        .filter(|path| !is_temp_file(path) && seen.insert(path.clone()))
        .collect()
}

/// Directories to watch; a fragments dir inside the source root is already covered.
fn watch_roots(config: &ProjectConfig) -> Vec<(FileCategory, PathBuf)> {
    let src = &config.build.src;
    WATCH_CATEGORIES
        .iter()
        .filter_map(|&cat| cat.path(config).map(|path| (cat, path)))
        .filter(|(cat, path)| *cat == FileCategory::Source || !path.starts_with(src))
        .filter(|(_, path)| path.exists())
        .collect()
}

fn setup_watchers(watcher: &mut impl Watcher, config: &ProjectConfig) -> Result<()> {
    let root = config.get_root();
    for (cat, path) in watch_roots(config) {
        watcher
            .watch(&path, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}: {}", cat.name(), path.display()))?;
        log!("watch"; "{}: {}/", cat.name(), rel_path(&path, root));
    }
    Ok(())
}

/// Handle every path of one event. Returns an error only for fatal failures.
fn handle_event<E: QueryEngine, R: PageRegistry>(
    event: Event,
    config: &ProjectConfig,
    controller: &mut Controller<E, R>,
) -> Result<()> {
    let root = config.get_root();
    for path in event_paths(event) {
        if categorize_path(&path, config) == FileCategory::Unknown {
            continue;
        }
        match controller.handle_change(&path) {
            Ok(_) => {}
            Err(e) if e.is_fatal() => {
                return Err(e).with_context(|| format!("watch stopped at {}", rel_path(&path, root)));
            }
            Err(e) => log!("error"; "{}: {e}", rel_path(&path, root)),
        }
    }
    Ok(())
}

/// Block on file events until Ctrl+C or a fatal error.
pub fn watch_for_changes_blocking<E: QueryEngine, R: PageRegistry>(
    config: &ProjectConfig,
    controller: &mut Controller<E, R>,
) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("Failed to set Ctrl+C handler")?;
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    setup_watchers(&mut watcher, config)?;
    log!("watch"; "waiting for changes, press Ctrl+C to stop");

    while !stop.load(Ordering::SeqCst) {
        match rx.recv_timeout(STOP_POLL) {
            Ok(Ok(event)) if is_relevant(&event) => handle_event(event, config, controller)?,
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(RecvTimeoutError::Disconnected) => break,
            // Irrelevant events and idle timeouts
            _ => {}
        }
    }

    log!("watch"; "stopped");
    Ok(())
}
