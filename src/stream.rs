//! The follower: opens, watches and re-opens a file, streaming its new lines.

use crate::config::FollowConfig;
use crate::error::{Error, Result};
use crate::opener::{PathOpener, SharedReadOpener};
use crate::reader::{LineReader, StartPosition};
use crate::watcher::{
    NotifySource, Notification, Subscription, WatchSource, target_file_name,
};
use futures::Stream;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Lines waiting for the consumer. One slot keeps reading in lockstep with delivery.
const LINE_CHANNEL_CAPACITY: usize = 1;

/// Follows a file like `tail -f`, yielding each appended line once.
///
/// Items are `Ok(line)` with the newline stripped. If the file cannot be
/// recovered after a rotation, a single `Err` is yielded and the stream ends.
pub struct Follower {
    path: PathBuf,
    receiver: mpsc::Receiver<Result<String>>,
    shutdown: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl Follower {
    /// Starts following `path` with the platform opener and notify watcher.
    ///
    /// Resolves once the file is open and watched, or fails with the last
    /// startup error (see [`FollowConfig::startup_timeout`]).
    pub async fn new<P: AsRef<Path>>(path: P, config: FollowConfig) -> Result<Self> {
        Self::with_collaborators(path, config, SharedReadOpener, NotifySource).await
    }

    /// Starts following `path` with a custom opener and watch source.
    pub async fn with_collaborators<P, O, W>(
        path: P,
        config: FollowConfig,
        opener: O,
        source: W,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        O: PathOpener + 'static,
        W: WatchSource + 'static,
    {
        let path = path.as_ref().to_path_buf();
        target_file_name(&path)?;

        let mut tail = Tail {
            path: path.clone(),
            config,
            opener: Arc::new(opener),
            source: Arc::new(source),
            reader: None,
            subscription: None,
            fresh: false,
        };
        tail.open_and_watch().await?;

        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();
        let task_handle = tokio::spawn(tail.run(tx, shutdown.clone()));

        Ok(Follower {
            path,
            receiver: rx,
            shutdown,
            task_handle: Some(task_handle),
        })
    }

    /// The followed path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for the next line. `None` once following has stopped.
    pub async fn next_line(&mut self) -> Option<Result<String>> {
        self.receiver.recv().await
    }

    /// Stops following and releases the file handle and watch.
    ///
    /// Waits for the background task to finish, including when it is blocked
    /// handing a line to a consumer that is no longer reading.
    pub async fn close(mut self) {
        self.shutdown.cancel();
        if let Some(task_handle) = self.task_handle.take() {
            if let Err(e) = task_handle.await {
                warn!(path = %self.path.display(), error = %e, "follower task did not exit cleanly");
            }
        }
    }
}

impl std::fmt::Debug for Follower {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Follower")
            .field("path", &self.path)
            .field("is_running", &self.task_handle.as_ref().is_some_and(|h| !h.is_finished()))
            .finish_non_exhaustive()
    }
}

impl Drop for Follower {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Stream for Follower {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// What the watch loop wants to happen next.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Reopen,
    Stop,
}

/// The open/watch state owned by the background task.
struct Tail {
    path: PathBuf,
    config: FollowConfig,
    opener: Arc<dyn PathOpener>,
    source: Arc<dyn WatchSource>,
    reader: Option<LineReader>,
    subscription: Option<Subscription>,
    /// The file at `path` postdates what we have read; start it from offset 0.
    fresh: bool,
}

impl Tail {
    /// Opens and watches the file, retrying within the startup window.
    async fn open_and_watch(&mut self) -> Result<()> {
        let mut last_error = match self.attempt().await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if !self.config.retries() {
            return Err(last_error);
        }

        let startup_timeout = self.config.startup_timeout;
        let retry_interval = self.config.retry_interval;
        let retry = async {
            loop {
                trace!(path = %self.path.display(), error = %last_error, "open attempt failed");
                tokio::time::sleep(retry_interval).await;
                match self.attempt().await {
                    Ok(()) => return,
                    Err(e) => last_error = e,
                }
            }
        };

        let outcome = tokio::time::timeout(startup_timeout, retry).await;
        outcome.map_err(|_| last_error)
    }

    /// One open+watch attempt. Any previous handle and watch are released first.
    async fn attempt(&mut self) -> Result<()> {
        self.release();

        let start = if self.fresh {
            StartPosition::Beginning
        } else {
            StartPosition::End
        };
        let opener = Arc::clone(&self.opener);
        let source = Arc::clone(&self.source);
        let path = self.path.clone();
        let opened = tokio::task::spawn_blocking(move || {
            open_watched(opener.as_ref(), source.as_ref(), &path, start)
        })
        .await?;

        match opened {
            Ok((reader, subscription)) => {
                debug!(path = %self.path.display(), ?start, "watching file");
                self.reader = Some(reader);
                self.subscription = Some(subscription);
                self.fresh = false;
                Ok(())
            }
            Err(e) => {
                if matches!(e, Error::FileNotFound { .. }) {
                    self.fresh = true;
                }
                Err(e)
            }
        }
    }

    fn release(&mut self) {
        self.reader = None;
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }

    async fn run(mut self, tx: mpsc::Sender<Result<String>>, shutdown: CancellationToken) {
        loop {
            let flow = match self.follow(&tx, &shutdown).await {
                Ok(flow) => flow,
                Err(e) => {
                    error!(path = %self.path.display(), error = %e, "reading followed file failed");
                    deliver(&tx, &shutdown, Err(e)).await;
                    break;
                }
            };
            if flow == Flow::Stop {
                break;
            }

            // The writer may still hold the old file; take what it wrote before letting go.
            match self.drain(&tx, &shutdown).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "final read of replaced file failed");
                }
            }

            debug!(path = %self.path.display(), "file replaced, reopening");
            self.fresh = true;
            let reopened = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                reopened = self.open_and_watch() => reopened,
            };
            if let Err(e) = reopened {
                error!(path = %self.path.display(), error = %e, "reopen failed");
                deliver(&tx, &shutdown, Err(Error::reopen(&self.path, e))).await;
                break;
            }
        }

        self.release();
        debug!(path = %self.path.display(), "follower stopped");
    }

    /// Drains the current handle, then reacts to watch events until the file
    /// is replaced or following stops.
    async fn follow(
        &mut self,
        tx: &mpsc::Sender<Result<String>>,
        shutdown: &CancellationToken,
    ) -> Result<Flow> {
        if !self.drain(tx, shutdown).await? {
            return Ok(Flow::Stop);
        }

        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                return Ok(Flow::Stop);
            };
            let notification = tokio::select! {
                biased;
                () = shutdown.cancelled() => return Ok(Flow::Stop),
                notification = subscription.next() => notification,
            };

            match notification {
                None => return Ok(Flow::Stop),
                Some(Notification::Error(e)) => {
                    warn!(path = %self.path.display(), error = %e, "watcher error");
                }
                Some(Notification::Event(event)) if event.is_disruptive() => {
                    debug!(path = %self.path.display(), ?event, "disruptive event");
                    return Ok(Flow::Reopen);
                }
                Some(Notification::Event(_)) => {
                    if !self.drain(tx, shutdown).await? {
                        return Ok(Flow::Stop);
                    }
                }
            }
        }
    }

    /// Sends every complete line currently available.
    ///
    /// Returns `false` if the consumer is gone or shutdown was requested.
    async fn drain(
        &mut self,
        tx: &mpsc::Sender<Result<String>>,
        shutdown: &CancellationToken,
    ) -> Result<bool> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(true);
        };

        if reader.rewind_if_truncated().await? {
            warn!(path = %self.path.display(), "file truncated, reading from the start");
        }

        while let Some(line) = reader.read_line().await? {
            trace!(path = %self.path.display(), %line, "line");
            if !deliver(tx, shutdown, Ok(line)).await {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Opens `path` at `start` and subscribes to its changes. Runs on the blocking pool.
fn open_watched(
    opener: &dyn PathOpener,
    source: &dyn WatchSource,
    path: &Path,
    start: StartPosition,
) -> Result<(LineReader, Subscription)> {
    let file = opener.open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::file_not_found(path),
        _ => Error::Io(e),
    })?;
    let reader = LineReader::open_at(file, start)?;
    let subscription = source.subscribe(path)?;
    Ok((reader, subscription))
}

/// Hands one item to the consumer unless shutdown wins first.
async fn deliver(
    tx: &mpsc::Sender<Result<String>>,
    shutdown: &CancellationToken,
    item: Result<String>,
) -> bool {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}
