//! Opening the followed file for reading.

use std::fs::File;
use std::io;
use std::path::Path;

/// Opens a path for reading without preventing other processes from
/// writing, renaming or deleting it.
///
/// A missing path must be reported as an error of kind
/// [`io::ErrorKind::NotFound`].
pub trait PathOpener: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<File>;
}

/// The platform's tolerant read open.
#[derive(Debug, Default, Clone, Copy)]
pub struct SharedReadOpener;

impl PathOpener for SharedReadOpener {
    fn open(&self, path: &Path) -> io::Result<File> {
        open_shared(path)
    }
}

#[cfg(windows)]
fn open_shared(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_SHARE_READ: u32 = 0x0000_0001;
    const FILE_SHARE_WRITE: u32 = 0x0000_0002;
    const FILE_SHARE_DELETE: u32 = 0x0000_0004;

    std::fs::OpenOptions::new()
        .read(true)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE)
        .open(path)
}

// Unix never locks a file against unlink or rename.
#[cfg(not(windows))]
fn open_shared(path: &Path) -> io::Result<File> {
    File::open(path)
}
