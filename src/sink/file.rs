//! # Asynchronous File Sink
//!
//! Append-only file output with batched background writes. Each sink owns
//! one dedicated worker thread draining a bounded queue; the worker flushes
//! its byte buffer when it fills, when the 250 ms idle timer fires, or on
//! shutdown. Enqueueing blocks when the queue is full, so callers never
//! observe reordering relative to their own emissions.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;

use crate::config::{FileOpt, Options, SinkFormat};
use crate::entry::Entry;
use crate::hooks;
use crate::level::Level;
use crate::sink::{render, Hook, SinkFlags, SinkState};
use crate::utils::error::{Error, Result};

/// Idle interval after which the worker flushes a partial buffer.
const FLUSH_IDLE: Duration = Duration::from_millis(250);

/// Rough record size used to derive the queue bound from `buffer_size`.
const RECORD_ESTIMATE: usize = 128;

/// File sink with one background writer.
pub struct FileSink {
    levels: Vec<Level>,
    flags: SinkFlags,
    format: SinkFormat,
    filepath: String,
    buffer_size: usize,
    state: AtomicU8,
    pending: Mutex<Option<File>>,
    tx: Mutex<Option<Sender<Vec<u8>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FileSink {
    /// Open the target file from a validated options fragment.
    ///
    /// The file is opened append-only, created when `create` is set, with
    /// missing parents created first when `create_path` is set. Failure to
    /// open is fatal for this sink and reported as `FilepathUnavailable`.
    ///
    /// The sink starts in `Created`; call `start` to spawn the worker.
    pub fn open(opt: &FileOpt) -> Result<Self> {
        let file = open_append(opt)?;
        Ok(FileSink {
            levels: Options::expand_levels(&opt.levels),
            flags: SinkFlags::from(opt),
            format: opt.format,
            filepath: opt.filepath.clone(),
            buffer_size: opt.buffer_size,
            state: AtomicU8::new(SinkState::Created as u8),
            pending: Mutex::new(Some(file)),
            tx: Mutex::new(None),
            worker: Mutex::new(None),
        })
    }

    /// Spawn the background writer and transition to `Running`.
    pub fn start(&self) {
        let created = SinkState::Created as u8;
        let running = SinkState::Running as u8;
        if self
            .state
            .compare_exchange(created, running, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let Some(file) = self.pending.lock().take() else {
            return;
        };
        let capacity = (self.buffer_size / RECORD_ESTIMATE).max(8);
        let (tx, rx) = bounded::<Vec<u8>>(capacity);
        let buffer_size = self.buffer_size;
        let filepath = self.filepath.clone();
        let spawned = std::thread::Builder::new()
            .name("fanlog-file".to_string())
            .spawn(move || worker_loop(file, rx, buffer_size, filepath));
        match spawned {
            Ok(handle) => {
                *self.tx.lock() = Some(tx);
                *self.worker.lock() = Some(handle);
            }
            Err(e) => {
                self.state.store(SinkState::Closed as u8, Ordering::Release);
                hooks::report_error(&Error::SinkConstructFailed(format!(
                    "file writer thread: {}",
                    e
                )));
            }
        }
    }

    /// The target path this sink appends to.
    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SinkState {
        SinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn sender(&self) -> Option<Sender<Vec<u8>>> {
        self.tx.lock().clone()
    }
}

impl Hook for FileSink {
    fn levels(&self) -> &[Level] {
        &self.levels
    }

    fn fire(&self, entry: &Entry) -> Result<()> {
        match render(entry, &self.flags, self.format, None)? {
            Some(payload) => self.write(&payload),
            None => Ok(()),
        }
    }

    fn write(&self, payload: &[u8]) -> Result<()> {
        match self.state() {
            SinkState::Running => match self.sender() {
                // A full queue blocks the caller here: back-pressure instead
                // of record loss.
                Some(tx) => tx.send(payload.to_vec()).map_err(|_| Error::SinkClosed),
                None => Err(Error::SinkClosing),
            },
            SinkState::Created | SinkState::Draining => match self.sender() {
                Some(tx) => match tx.try_send(payload.to_vec()) {
                    Ok(()) => Ok(()),
                    Err(TrySendError::Full(_)) => Err(Error::SinkClosing),
                    Err(TrySendError::Disconnected(_)) => Err(Error::SinkClosed),
                },
                None => Err(Error::SinkClosing),
            },
            SinkState::Closed => Err(Error::SinkClosed),
        }
    }

    fn close(&self) -> Result<()> {
        let prev = self.state.swap(SinkState::Draining as u8, Ordering::AcqRel);
        if SinkState::from_u8(prev) == SinkState::Closed {
            self.state.store(SinkState::Closed as u8, Ordering::Release);
            return Ok(());
        }
        // Dropping the sender lets the worker drain the queue, flush and
        // release the file before exiting.
        self.tx.lock().take();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        self.state.store(SinkState::Closed as u8, Ordering::Release);
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn open_append(opt: &FileOpt) -> Result<File> {
    let path = Path::new(&opt.filepath);
    if opt.create_path {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                let mut builder = fs::DirBuilder::new();
                builder.recursive(true);
                #[cfg(unix)]
                {
                    use std::os::unix::fs::DirBuilderExt;
                    builder.mode(opt.path_mode);
                }
                builder.create(parent).map_err(|e| {
                    Error::FilepathUnavailable(format!("{}: {}", parent.display(), e))
                })?;
            }
        }
    }
    let mut options = fs::OpenOptions::new();
    options.append(true).create(opt.create);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(opt.file_mode);
    }
    options
        .open(path)
        .map_err(|e| Error::FilepathUnavailable(format!("{}: {}", opt.filepath, e)))
}

fn worker_loop(mut file: File, rx: Receiver<Vec<u8>>, buffer_size: usize, filepath: String) {
    let mut buf: Vec<u8> = Vec::with_capacity(buffer_size);
    loop {
        match rx.recv_timeout(FLUSH_IDLE) {
            Ok(bytes) => {
                if !buf.is_empty() && buf.len() + bytes.len() >= buffer_size {
                    flush_buffer(&mut buf, &mut file, &filepath);
                }
                buf.extend_from_slice(&bytes);
                if buf.len() >= buffer_size {
                    flush_buffer(&mut buf, &mut file, &filepath);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                flush_buffer(&mut buf, &mut file, &filepath);
            }
            Err(RecvTimeoutError::Disconnected) => {
                // All senders gone: the queue is already drained, write the
                // remainder and release the file.
                flush_buffer(&mut buf, &mut file, &filepath);
                let _ = file.flush();
                break;
            }
        }
    }
}

fn flush_buffer(buf: &mut Vec<u8>, file: &mut File, filepath: &str) {
    if buf.is_empty() {
        return;
    }
    if let Err(e) = file.write_all(buf) {
        hooks::report_error(&Error::FilepathUnavailable(format!("{}: {}", filepath, e)));
    }
    let _ = file.flush();
    buf.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BUFFER_SIZE;

    fn opt_for(path: &Path) -> FileOpt {
        FileOpt {
            filepath: path.to_string_lossy().into_owned(),
            create: true,
            create_path: true,
            file_mode: 0o644,
            path_mode: 0o755,
            buffer_size: DEFAULT_BUFFER_SIZE,
            ..FileOpt::default()
        }
    }

    #[test]
    fn test_open_missing_without_create_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let opt = FileOpt {
            filepath: dir.path().join("absent.log").to_string_lossy().into_owned(),
            create: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            ..FileOpt::default()
        };
        assert!(matches!(
            FileSink::open(&opt),
            Err(Error::FilepathUnavailable(_))
        ));
    }

    #[test]
    fn test_write_drain_on_close() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs").join("app.log");
        let sink = FileSink::open(&opt_for(&path)).expect("open");
        sink.start();
        assert_eq!(sink.state(), SinkState::Running);

        for i in 0..100 {
            sink.write(format!("record {}\n", i).as_bytes()).expect("write");
        }
        sink.close().expect("close");
        assert_eq!(sink.state(), SinkState::Closed);

        let contents = fs::read_to_string(&path).expect("read back");
        assert_eq!(contents.lines().count(), 100);
        assert!(contents.starts_with("record 0\n"));
        assert!(contents.ends_with("record 99\n"));
    }

    #[test]
    fn test_write_after_close_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.log");
        let sink = FileSink::open(&opt_for(&path)).expect("open");
        sink.start();
        sink.close().expect("close");
        assert_eq!(sink.write(b"late\n"), Err(Error::SinkClosed));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.log");
        let sink = FileSink::open(&opt_for(&path)).expect("open");
        sink.start();
        sink.close().expect("first close");
        sink.close().expect("second close");
        assert_eq!(sink.state(), SinkState::Closed);
    }

    #[test]
    fn test_fire_respects_level_filter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.log");
        let mut opt = opt_for(&path);
        opt.levels = vec![Level::Error];
        let sink = FileSink::open(&opt).expect("open");
        sink.start();

        assert!(sink.accepts(Level::Error));
        assert!(!sink.accepts(Level::Info));
        sink.close().expect("close");
    }
}
