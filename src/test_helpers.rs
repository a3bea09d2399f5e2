//! Test utilities: temporary log files and a scripted watch source.

use crate::error::{Error, Result};
use crate::watcher::{Subscription, WatchEvent, WatchSource};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub struct TempLogFile {
    pub path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TempLogFile {
    /// Create a new, empty temporary log file
    pub fn new() -> std::io::Result<Self> {
        let temp_file = Self::missing()?;
        File::create(&temp_file.path)?;
        Ok(temp_file)
    }

    /// A path inside a fresh temporary directory that does not exist yet
    pub fn missing() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("test.log");
        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Create a temporary log file with one initial line
    pub fn with_content(content: &str) -> std::io::Result<Self> {
        let temp_file = Self::new()?;
        temp_file.append_content(content)?;
        Ok(temp_file)
    }

    /// Append a line to the log file
    pub fn append_content(&self, content: &str) -> std::io::Result<()> {
        self.write_raw(&format!("{content}\n"))
    }

    /// Append bytes exactly as given, in a single write
    pub fn write_raw(&self, content: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Create (or replace) the file with the given content
    pub fn create(&self, content: &str) -> std::io::Result<()> {
        fs::write(&self.path, content)
    }

    /// Truncate the file in place
    pub fn truncate(&self) -> std::io::Result<()> {
        File::create(&self.path)?;
        Ok(())
    }

    /// Move the file aside, as a rotating logger would
    pub fn rotate(&self) -> std::io::Result<PathBuf> {
        let rotated = self.path.with_extension("log.1");
        fs::rename(&self.path, &rotated)?;
        Ok(rotated)
    }

    pub fn remove(&self) -> std::io::Result<()> {
        fs::remove_file(&self.path)
    }

    /// Get the path to the temporary file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

type Senders = (
    mpsc::UnboundedSender<WatchEvent>,
    mpsc::UnboundedSender<Error>,
);

/// In-memory [`WatchSource`] driven by the test.
///
/// Events are pushed into the most recent subscription. The first
/// `failures` subscribe calls fail.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    state: Arc<Mutex<ScriptedState>>,
}

#[derive(Default)]
struct ScriptedState {
    current: Option<Senders>,
    subscriptions: usize,
    failures: usize,
}

impl ScriptedSource {
    pub fn failing(failures: usize) -> Self {
        let source = Self::default();
        source.state.lock().unwrap().failures = failures;
        source
    }

    /// Deliver an event to the live subscription; `false` if none is listening.
    pub fn emit(&self, event: WatchEvent) -> bool {
        let state = self.state.lock().unwrap();
        state
            .current
            .as_ref()
            .is_some_and(|(events, _)| events.send(event).is_ok())
    }

    pub fn emit_error(&self, message: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.current.as_ref().is_some_and(|(_, errors)| {
            errors
                .send(Error::Watcher(notify::Error::generic(message)))
                .is_ok()
        })
    }

    /// Close the live subscription's channels from the source side.
    pub fn close(&self) {
        self.state.lock().unwrap().current = None;
    }

    /// Number of successful subscribe calls so far.
    pub fn subscriptions(&self) -> usize {
        self.state.lock().unwrap().subscriptions
    }

    /// Whether the live subscription has been dropped by its owner.
    pub fn is_released(&self) -> bool {
        let state = self.state.lock().unwrap();
        state
            .current
            .as_ref()
            .is_none_or(|(events, _)| events.is_closed())
    }
}

impl WatchSource for ScriptedSource {
    fn subscribe(&self, _path: &Path) -> Result<Subscription> {
        let mut state = self.state.lock().unwrap();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(Error::Watcher(notify::Error::generic("scripted failure")));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        state.current = Some((event_tx, error_tx));
        state.subscriptions += 1;

        Ok(Subscription::new(event_rx, error_rx, ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_log_file_creation() {
        let temp_file = TempLogFile::new().unwrap();
        assert!(temp_file.path().exists());
    }

    #[test]
    fn test_missing_temp_log_file() {
        let temp_file = TempLogFile::missing().unwrap();
        assert!(!temp_file.path().exists());

        temp_file.create("first\n").unwrap();
        assert_eq!(fs::read_to_string(temp_file.path()).unwrap(), "first\n");
    }

    #[test]
    fn test_append_content() {
        let temp_file = TempLogFile::new().unwrap();
        temp_file.append_content("line 1").unwrap();
        temp_file.append_content("line 2").unwrap();

        let content = fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "line 1\nline 2\n");
    }

    #[test]
    fn test_truncate() {
        let temp_file = TempLogFile::with_content("initial content").unwrap();
        temp_file.truncate().unwrap();

        let content = fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_rotate() {
        let temp_file = TempLogFile::with_content("old").unwrap();
        let rotated = temp_file.rotate().unwrap();

        assert!(!temp_file.path().exists());
        assert_eq!(fs::read_to_string(rotated).unwrap(), "old\n");
    }

    #[tokio::test]
    async fn test_scripted_source_failures_then_success() {
        let source = ScriptedSource::failing(1);
        assert!(source.subscribe(Path::new("x.log")).is_err());

        let mut subscription = source.subscribe(Path::new("x.log")).unwrap();
        assert_eq!(source.subscriptions(), 1);
        assert!(source.emit(WatchEvent::Write));
        assert!(subscription.next().await.is_some());

        subscription.cancel();
        assert!(source.is_released());
        assert!(!source.emit(WatchEvent::Write));
    }
}
