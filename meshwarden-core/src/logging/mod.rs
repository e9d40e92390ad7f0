pub mod rotation;
pub mod sanitizer;

use std::io;
use std::path::Path;

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::reload;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use rotation::{RotatingFileWriter, SharedRotatingWriter};
use sanitizer::sanitize;

/// Wraps any writer, sanitizing each write's bytes as a UTF-8 line before
/// passing it through. Lossy on non-UTF-8 input, which `tracing`'s fmt
/// layer never produces.
struct SanitizingWriter<W>(W);

impl<W: io::Write> io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let sanitized = sanitize(&text);
        self.0.write_all(sanitized.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

#[derive(Clone)]
struct SanitizingMakeWriter<M>(M);

impl<'a, M: MakeWriter<'a>> MakeWriter<'a> for SanitizingMakeWriter<M> {
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter(self.0.make_writer())
    }
}

/// Handle returned by [`init_logging`] that lets a hot-reload path swap the
/// active level filter without re-opening the log file or reinstalling the
/// subscriber. Only the level is reloadable: `log_file` itself is not in
/// the set of whitelisted hot-reload fields, so the file layer is fixed for
/// the life of the process.
#[derive(Clone)]
pub struct LoggingHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl LoggingHandle {
    pub fn set_level(&self, level: tracing::Level) -> anyhow::Result<()> {
        let new_filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();
        self.filter.reload(new_filter)?;
        Ok(())
    }
}

/// Installs the global `tracing` subscriber: a compact stderr layer always
/// on, plus an optional size-rotated, sanitized file layer when `log_file`
/// is set. Returns a handle so a hot-reload path can swap the level filter
/// without re-opening the file.
pub fn init_logging(level: tracing::Level, log_file: Option<&Path>) -> anyhow::Result<LoggingHandle> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let (filter_layer, filter_handle) = reload::Layer::new(env_filter);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(SanitizingMakeWriter(io::stderr))
        .with_target(true)
        .compact();

    let registry = tracing_subscriber::registry().with(filter_layer);

    match log_file {
        Some(path) => {
            let writer = RotatingFileWriter::new(path)?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(SanitizingMakeWriter(SharedRotatingWriter(writer)))
                .with_ansi(false)
                .with_target(true);
            registry.with(stderr_layer).with(file_layer).try_init()?;
        }
        None => {
            registry.with(stderr_layer).try_init()?;
        }
    }
    Ok(LoggingHandle {
        filter: filter_handle,
    })
}
