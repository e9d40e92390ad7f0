use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use fs2::FileExt;

const ROTATION_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_ARCHIVES: u32 = 5;
const ROTATION_CHECK_INTERVAL: u32 = 200;

/// Size-based rotating log file: `<path>`, `<path>.1`, … `<path>.5`. The
/// active file's size is only checked every [`ROTATION_CHECK_INTERVAL`]
/// writes to keep the hot path cheap; an advisory lock on a sibling `.lock`
/// file keeps two writers (or a hot-reload re-init racing the old handle)
/// from rotating the same file at once.
///
/// `tracing-appender` only rotates on a time schedule, not by size, so this
/// is a purpose-built writer rather than that crate's `RollingFileAppender`.
pub struct RotatingFileWriter {
    path: PathBuf,
    lock_path: PathBuf,
    write_count: AtomicU32,
}

impl RotatingFileWriter {
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Arc<Self>> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let lock_path = {
            let mut p = path.clone();
            p.set_extension("lock");
            p
        };
        Ok(Arc::new(Self {
            path,
            lock_path,
            write_count: AtomicU32::new(0),
        }))
    }

    fn needs_rotation(&self) -> bool {
        fs::metadata(&self.path)
            .map(|m| m.len() >= ROTATION_SIZE_BYTES)
            .unwrap_or(false)
    }

    fn rotate_if_needed(&self) -> io::Result<()> {
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)?;
        lock_file.lock_exclusive()?;
        // Re-check after acquiring the lock: another writer may have already
        // rotated while we were waiting.
        if self.needs_rotation() {
            self.perform_rotation()?;
        }
        FileExt::unlock(&lock_file)?;
        Ok(())
    }

    fn perform_rotation(&self) -> io::Result<()> {
        let oldest = self.archive_path(MAX_ARCHIVES);
        let _ = fs::remove_file(&oldest);

        let mut n = MAX_ARCHIVES - 1;
        loop {
            let from = self.archive_path(n);
            let to = self.archive_path(n + 1);
            if from.exists() {
                fs::rename(&from, &to)?;
            }
            if n == 0 {
                break;
            }
            n -= 1;
        }
        fs::rename(&self.path, self.archive_path(1))?;
        Ok(())
    }

    fn archive_path(&self, n: u32) -> PathBuf {
        if n == 0 {
            self.path.clone()
        } else {
            let mut s = self.path.as_os_str().to_os_string();
            s.push(format!(".{n}"));
            PathBuf::from(s)
        }
    }

    fn open_append(&self) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(&self.path)
    }
}

impl Write for &RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let count = self.write_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % ROTATION_CHECK_INTERVAL == 0 && self.needs_rotation() {
            self.rotate_if_needed()?;
        }
        let mut file = self.open_append()?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Adapter so `Arc<RotatingFileWriter>` can be used as a `tracing_subscriber`
/// `MakeWriter`.
#[derive(Clone)]
pub struct SharedRotatingWriter(pub Arc<RotatingFileWriter>);

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedRotatingWriter {
    type Writer = RotatingWriterHandle;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriterHandle(self.0.clone())
    }
}

pub struct RotatingWriterHandle(Arc<RotatingFileWriter>);

impl Write for RotatingWriterHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self.0).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_accumulate_in_target_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let writer = RotatingFileWriter::new(&path).unwrap();
        {
            let mut w: &RotatingFileWriter = &writer;
            w.write_all(b"line one\n").unwrap();
            w.write_all(b"line two\n").unwrap();
        }
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("line one"));
        assert!(contents.contains("line two"));
    }

    #[test]
    fn rotation_shifts_archives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, vec![0u8; 1]).unwrap();
        let writer = RotatingFileWriter::new(&path).unwrap();
        fs::write(writer.archive_path(1), b"old-1").unwrap();
        writer.perform_rotation().unwrap();
        assert!(fs::read(writer.archive_path(2)).unwrap() == b"old-1");
        assert!(!path.exists());
    }
}
