//! Idle-closing file handles
//!
//! A partitioned file keeps one OS handle to its backing file. Every access
//! pushes a close deadline forward; a background thread closes the handle
//! once the deadline passes without further access, and the next access
//! reopens it. Handles opened for writing are synced before closing.

use parking_lot::{Condvar, Mutex};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct HandleState {
    file: Option<File>,
    writable: bool,
    deadline: Option<Instant>,
    shutdown: bool,
}

#[derive(Debug)]
struct Shared {
    path: PathBuf,
    idle: Duration,
    state: Mutex<HandleState>,
    wake: Condvar,
}

/// Lazily opened handle to one file that closes itself when idle
#[derive(Debug)]
pub struct FileHandles {
    shared: Arc<Shared>,
    closer: Option<JoinHandle<()>>,
}

impl FileHandles {
    /// Manage handles for `path`, closing them after `idle` without access
    pub fn new(path: impl Into<PathBuf>, idle: Duration) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            path: path.into(),
            idle,
            state: Mutex::new(HandleState::default()),
            wake: Condvar::new(),
        });
        let closer = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("codeseam-handle-closer".into())
                .spawn(move || run_closer(&shared))?
        };
        Ok(Self {
            shared,
            closer: Some(closer),
        })
    }

    /// Path of the managed file
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    fn with_file<T, F>(&self, writable: bool, f: F) -> io::Result<T>
    where
        F: FnOnce(&mut File) -> io::Result<T>,
    {
        let mut state = self.shared.state.lock();
        if state.file.is_none() || (writable && !state.writable) {
            let file = if writable {
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&self.shared.path)?
            } else {
                File::open(&self.shared.path)?
            };
            log_debug!(
                "opened {} ({})",
                self.shared.path.display(),
                if writable { "read-write" } else { "read" }
            );
            state.file = Some(file);
            state.writable = writable;
        }

        state.deadline = Some(Instant::now() + self.shared.idle);
        self.shared.wake.notify_one();

        match state.file.as_mut() {
            Some(file) => f(file),
            None => Err(io::Error::other("file handle unavailable")),
        }
    }

    /// Read up to `len` bytes at `offset`
    ///
    /// A missing file reads as empty.
    pub fn read_at(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let read = self.with_file(false, |file| {
            file.seek(SeekFrom::Start(offset))?;
            let mut buf = Vec::with_capacity(len);
            Read::by_ref(file).take(len as u64).read_to_end(&mut buf)?;
            Ok(buf)
        });
        match read {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            other => other,
        }
    }

    /// Write `bytes` at `offset`, creating the file if needed
    pub fn write_at(&self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        self.with_file(true, |file| {
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(bytes)
        })
    }

    /// Truncate or extend the file
    pub fn set_len(&self, len: u64) -> io::Result<()> {
        self.with_file(true, |file| file.set_len(len))
    }

    /// Current file length; a missing file has length zero
    pub fn len(&self) -> io::Result<u64> {
        match fs::metadata(&self.shared.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Whether the file is empty or missing
    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Close the handle now
    pub fn close(&self) {
        close_locked(&mut self.shared.state.lock(), &self.shared.path);
    }

    /// Whether an OS handle is currently open
    pub fn is_open(&self) -> bool {
        self.shared.state.lock().file.is_some()
    }
}

impl Drop for FileHandles {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.wake.notify_one();
        if let Some(closer) = self.closer.take() {
            let _ = closer.join();
        }
    }
}

fn close_locked(state: &mut HandleState, path: &Path) {
    state.deadline = None;
    if let Some(file) = state.file.take() {
        if state.writable {
            if let Err(e) = file.sync_all() {
                log_error!("failed to sync {}: {}", path.display(), e);
            }
        }
        log_debug!("closed {}", path.display());
    }
}

fn run_closer(shared: &Shared) {
    let mut state = shared.state.lock();
    while !state.shutdown {
        match state.deadline {
            None => shared.wake.wait(&mut state),
            Some(deadline) if Instant::now() >= deadline => close_locked(&mut state, &shared.path),
            Some(deadline) => {
                shared.wake.wait_until(&mut state, deadline);
            }
        }
    }
    close_locked(&mut state, &shared.path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let handles = FileHandles::new(dir.path().join("none"), Duration::from_secs(5)).unwrap();
        assert!(handles.read_at(0, 10).unwrap().is_empty());
        assert_eq!(handles.len().unwrap(), 0);
        assert!(!handles.is_open());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        let handles = FileHandles::new(&path, Duration::from_secs(5)).unwrap();
        handles.write_at(0, b"hello world").unwrap();
        handles.write_at(6, b"there").unwrap();
        assert_eq!(handles.read_at(0, 100).unwrap(), b"hello there");
        assert_eq!(handles.read_at(6, 3).unwrap(), b"the");

        handles.set_len(5).unwrap();
        assert_eq!(handles.len().unwrap(), 5);
        handles.close();
        assert!(!handles.is_open());
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn test_idle_close_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"abc").unwrap();

        let handles = FileHandles::new(&path, Duration::from_millis(20)).unwrap();
        assert_eq!(handles.read_at(0, 3).unwrap(), b"abc");
        assert!(handles.is_open());

        let deadline = Instant::now() + Duration::from_secs(5);
        while handles.is_open() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!handles.is_open());

        assert_eq!(handles.read_at(1, 2).unwrap(), b"bc");
        assert!(handles.is_open());
    }
}
