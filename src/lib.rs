//! Follow a growing file the way `tail -f` does.
//!
//! A [`Follower`] delivers every line appended to a file after following
//! started, exactly once and in order. It keeps following across rotation:
//! when the file is renamed away, deleted, or replaced, the new file at the
//! same path is opened and read from its beginning.
//!
//! # Example
//!
//! ```rust,no_run
//! use log_tail::{FollowConfig, follow};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut lines = follow("app.log", FollowConfig::new(10)).await?;
//!
//!     while let Some(line) = lines.next().await {
//!         println!("{}", line?);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! Opening the file and receiving change notifications are pluggable through
//! [`PathOpener`] and [`WatchSource`]; see [`Follower::with_collaborators`].

mod config;
mod error;
mod opener;
mod reader;
mod stream;
mod watcher;

#[cfg(test)]
mod test_helpers;

pub use config::{DEFAULT_RETRY_INTERVAL, FollowConfig};
pub use error::{Error, Result};
pub use opener::{PathOpener, SharedReadOpener};
pub use reader::{LineReader, StartPosition};
pub use stream::Follower;
pub use watcher::{Notification, NotifySource, Subscription, WatchEvent, WatchSource};

use std::path::Path;

/// Starts following a file.
///
/// Fails with a not-found error if the file does not appear within
/// `config.startup_timeout` (immediately when the timeout is zero).
///
/// # Example
///
/// ```rust,no_run
/// use log_tail::{FollowConfig, follow};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut follower = follow("app.log", FollowConfig::default()).await?;
///
///     if let Some(line) = follower.next_line().await {
///         println!("first new line: {}", line?);
///     }
///
///     follower.close().await;
///     Ok(())
/// }
/// ```
pub async fn follow<P: AsRef<Path>>(path: P, config: FollowConfig) -> Result<Follower> {
    Follower::new(path, config).await
}
