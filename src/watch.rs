//! File system watcher.
//!
//! Maps changed paths to the tasks they affect and re-runs them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Event Loop                              │
//! │                                                              │
//! │  ┌──────────┐    ┌────────────┐    ┌──────────────────────┐  │
//! │  │ notify   │───▶│ categorize │───▶│      Scheduler       │  │
//! │  │ events   │    │  (path →   │    │  per-task deadline   │  │
//! │  └──────────┘    │   tasks)   │    │  + in-flight guard   │  │
//! │       ▲          └────────────┘    └──────────┬───────────┘  │
//! │       │                                       │ due()        │
//! │  ┌────┴─────┐                                 ▼              │
//! │  │  Done    │◀────────────────────── worker thread per run   │
//! │  └──────────┘                                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A task never starts while its previous run is in flight. Events that
//! arrive meanwhile re-arm it, so it runs once more after finishing.

use crate::{config::SitePaths, context::BuildContext, log, stages::Task, vfs::has_ext};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    collections::BTreeMap,
    path::Path,
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

/// Wait between wakeups when nothing is armed.
const IDLE_WAIT: Duration = Duration::from_secs(60);

// =============================================================================
// Path Classification
// =============================================================================

/// Role of a changed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Stylesheet,
    Script,
    PageData,
    Template,
    /// Rendered page in the working directory.
    Page,
    Ignored,
}

impl Category {
    /// Tasks to re-run when a path of this category changes.
    pub const fn tasks(self) -> &'static [Task] {
        match self {
            Self::Stylesheet => &[Task::Style],
            Self::Script => &[Task::Script],
            Self::PageData | Self::Template => &[Task::Markup],
            Self::Page => &[Task::Reload],
            Self::Ignored => &[],
        }
    }
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp" | "partial")
        || name.ends_with('~')
        || name.starts_with('.')
        // vim's write probe
        || name == "4913"
}

pub fn categorize(path: &Path, paths: &SitePaths) -> Category {
    if is_temp_file(path) {
        return Category::Ignored;
    }
    // Stage outputs must not retrigger their own stage.
    if path == paths.aggregate || path == paths.style_output || path == paths.script_output {
        return Category::Ignored;
    }

    if path.starts_with(&paths.style_watch) && has_ext(path, &["sass", "scss", "css"]) {
        Category::Stylesheet
    } else if path.starts_with(&paths.script_watch) && has_ext(path, &["js", "mjs"]) {
        Category::Script
    } else if path.starts_with(&paths.data_pages) && has_ext(path, &["json"]) {
        Category::PageData
    } else if path.parent() == Some(paths.dev.as_path()) && has_ext(path, &["html"]) {
        Category::Page
    } else if path.starts_with(&paths.markup_root) && path != paths.markup_root {
        Category::Template
    } else {
        Category::Ignored
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Per-task debounce deadlines plus an in-flight guard.
///
/// Time is passed in, so the schedule is deterministic under test.
#[derive(Debug)]
pub struct Scheduler {
    debounce: Duration,
    armed: BTreeMap<Task, Instant>,
    in_flight: FxHashSet<Task>,
}

impl Scheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            armed: BTreeMap::new(),
            in_flight: FxHashSet::default(),
        }
    }

    /// Request `task`; repeated requests push the deadline back.
    pub fn arm(&mut self, task: Task, now: Instant) {
        self.armed.insert(task, now + self.debounce);
    }

    /// Tasks whose deadline passed and that are not running. They are
    /// marked in flight.
    pub fn due(&mut self, now: Instant) -> Vec<Task> {
        let ready: Vec<Task> = self
            .armed
            .iter()
            .filter(|(task, deadline)| **deadline <= now && !self.in_flight.contains(*task))
            .map(|(task, _)| *task)
            .collect();
        for task in &ready {
            self.armed.remove(task);
            self.in_flight.insert(*task);
        }
        ready
    }

    /// Mark a run finished. A re-arm that arrived meanwhile stays pending.
    pub fn finish(&mut self, task: Task) {
        self.in_flight.remove(&task);
    }

    pub fn is_running(&self, task: Task) -> bool {
        self.in_flight.contains(&task)
    }

    /// How long the loop may sleep before something becomes due.
    pub fn next_wakeup(&self, now: Instant) -> Option<Duration> {
        self.armed
            .iter()
            .filter(|(task, _)| !self.in_flight.contains(*task))
            .map(|(_, deadline)| deadline.saturating_duration_since(now))
            .min()
    }
}

// =============================================================================
// Event Loop
// =============================================================================

enum Message {
    Fs(notify::Result<Event>),
    Done(Task),
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

/// Watch the working directory and re-run affected tasks until the
/// watcher disconnects.
pub fn watch_blocking(ctx: &BuildContext) -> Result<()> {
    let paths = &ctx.paths;
    if !ctx.fs().exists(&paths.dev) {
        anyhow::bail!("Working directory {} does not exist", paths.dev.display());
    }
    let (tx, rx) = mpsc::channel();

    let fs_tx = tx.clone();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
        fs_tx.send(Message::Fs(event)).ok();
    })
    .context("Failed to create file watcher")?;
    watcher
        .watch(&paths.dev, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", paths.dev.display()))?;

    log!("watch"; "stylesheets: {}/, scripts: {}/, data: {}/, templates: {}/",
        paths.dev_relative(&paths.style_watch).display(),
        paths.dev_relative(&paths.script_watch).display(),
        paths.dev_relative(&paths.data_pages).display(),
        paths.dev_relative(&paths.markup_root).display());

    let mut scheduler = Scheduler::new(Duration::from_millis(ctx.config.serve.debounce_ms));

    loop {
        let timeout = scheduler.next_wakeup(Instant::now()).unwrap_or(IDLE_WAIT);
        match rx.recv_timeout(timeout) {
            Ok(Message::Fs(Ok(event))) if is_relevant(&event) => {
                let now = Instant::now();
                for path in &event.paths {
                    for task in categorize(path, paths).tasks() {
                        scheduler.arm(*task, now);
                    }
                }
            }
            Ok(Message::Fs(Err(e))) => log!("watch"; "error: {e}"),
            Ok(Message::Done(task)) => scheduler.finish(task),
            Err(RecvTimeoutError::Disconnected) => break,
            // Irrelevant events, timeouts
            _ => {}
        }

        for task in scheduler.due(Instant::now()) {
            spawn_run(ctx, task, tx.clone());
        }
    }

    Ok(())
}

fn spawn_run(ctx: &BuildContext, task: Task, done: mpsc::Sender<Message>) {
    let ctx = ctx.clone();
    thread::spawn(move || {
        log!("watch"; "running {task}");
        if let Err(e) = task.run(&ctx) {
            log!("error"; "{task} failed: {e:#}");
        }
        done.send(Message::Done(task)).ok();
    });
}
