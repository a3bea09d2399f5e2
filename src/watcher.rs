//! File change notifications for the followed path.

use crate::error::{Error, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::any::Any;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// A change reported for the followed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    Create,
    Write,
    Rename,
    Remove,
}

impl WatchEvent {
    /// Returns `true` if the path may now name a different file.
    pub fn is_disruptive(self) -> bool {
        !matches!(self, WatchEvent::Write)
    }
}

/// One item received from a [`Subscription`].
#[derive(Debug)]
pub enum Notification {
    Event(WatchEvent),
    /// A transport-level problem; watching continues.
    Error(Error),
}

/// A live watch on one path.
///
/// Dropping or cancelling the subscription stops the underlying watch and
/// discards any notifications still queued.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<WatchEvent>,
    errors: mpsc::UnboundedReceiver<Error>,
    _handle: Box<dyn Any + Send>,
}

impl Subscription {
    /// Builds a subscription from its two channels and whatever keeps the
    /// watch alive.
    pub fn new(
        events: mpsc::UnboundedReceiver<WatchEvent>,
        errors: mpsc::UnboundedReceiver<Error>,
        handle: impl Any + Send,
    ) -> Self {
        Self {
            events,
            errors,
            _handle: Box::new(handle),
        }
    }

    /// Waits for the next notification.
    ///
    /// Returns `None` once either channel has closed.
    pub async fn next(&mut self) -> Option<Notification> {
        tokio::select! {
            event = self.events.recv() => event.map(Notification::Event),
            error = self.errors.recv() => error.map(Notification::Error),
        }
    }

    /// Releases the watch.
    pub fn cancel(self) {
        drop(self);
    }
}

/// Produces subscriptions to change events for a single path.
pub trait WatchSource: Send + Sync {
    fn subscribe(&self, path: &Path) -> Result<Subscription>;
}

/// [`WatchSource`] backed by the notify crate's recommended watcher.
///
/// The parent directory is watched so that creation of the path is seen.
/// When the path is a symlink, the directory of the resolved file is watched
/// too, since writes through the link are reported there.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySource;

impl WatchSource for NotifySource {
    fn subscribe(&self, path: &Path) -> Result<Subscription> {
        let targets = WatchTargets::resolve(path)?;
        let file_names = targets.file_names.clone();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Some(kind) = classify_event(&event, &file_names) {
                        let _ = event_tx.send(kind);
                    }
                }
                Err(e) => {
                    let _ = error_tx.send(Error::Watcher(e));
                }
            },
            Config::default(),
        )?;
        for dir in &targets.dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
        }

        Ok(Subscription::new(event_rx, error_rx, watcher))
    }
}

/// Directories to watch and the file names within them that stand for the path.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct WatchTargets {
    pub(crate) dirs: Vec<PathBuf>,
    pub(crate) file_names: Vec<OsString>,
}

impl WatchTargets {
    pub(crate) fn resolve(path: &Path) -> Result<Self> {
        let link_dir = watch_dir(path).to_path_buf();
        let mut targets = WatchTargets {
            dirs: vec![link_dir.clone()],
            file_names: vec![target_file_name(path)?],
        };

        let is_symlink = fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink());
        if !is_symlink {
            return Ok(targets);
        }

        // A dangling link has nothing to resolve yet; the link itself is still watched.
        let Ok(resolved) = fs::canonicalize(path) else {
            return Ok(targets);
        };
        let target_dir = watch_dir(&resolved).to_path_buf();
        if fs::canonicalize(&link_dir).ok().as_ref() != Some(&target_dir) {
            targets.dirs.push(target_dir);
        }
        let resolved_name = target_file_name(&resolved)?;
        if !targets.file_names.contains(&resolved_name) {
            targets.file_names.push(resolved_name);
        }
        Ok(targets)
    }
}

/// The last component of `path`, which events are matched against.
pub(crate) fn target_file_name(path: &Path) -> Result<OsString> {
    path.file_name()
        .map(OsStr::to_os_string)
        .ok_or_else(|| Error::InvalidPath {
            message: format!("no file name in '{}'", path.display()),
        })
}

fn watch_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Translates a directory-level notify event into an event for the target file.
pub(crate) fn classify_event(event: &Event, file_names: &[OsString]) -> Option<WatchEvent> {
    match event.kind {
        // Both ends of a rename arrive in one event as [from, to].
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if event
                .paths
                .get(1)
                .is_some_and(|p| has_file_name(p, file_names))
            {
                Some(WatchEvent::Create)
            } else if event
                .paths
                .first()
                .is_some_and(|p| has_file_name(p, file_names))
            {
                Some(WatchEvent::Rename)
            } else {
                None
            }
        }
        _ if !is_event_relevant_to_file(event, file_names) => None,
        EventKind::Create(_) => Some(WatchEvent::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(WatchEvent::Create),
        EventKind::Modify(ModifyKind::Name(_)) => Some(WatchEvent::Rename),
        EventKind::Modify(_) => Some(WatchEvent::Write),
        EventKind::Remove(_) => Some(WatchEvent::Remove),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// Check if a notify event is relevant to a specific file
fn is_event_relevant_to_file(event: &Event, file_names: &[OsString]) -> bool {
    event.paths.iter().any(|path| has_file_name(path, file_names))
}

fn has_file_name(path: &Path, file_names: &[OsString]) -> bool {
    path.file_name()
        .is_some_and(|name| file_names.iter().any(|target| target == name))
}
