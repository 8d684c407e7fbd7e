//! Console logging

use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::Level;
use tracing_subscriber::fmt::writer::{MakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static RAW_MODE: AtomicBool = AtomicBool::new(false);

/// Tell the console writer whether the terminal is in raw mode
pub fn set_raw_mode(raw: bool) {
    RAW_MODE.store(raw, Ordering::SeqCst);
}

/// Install the global subscriber. Warnings and errors go to stderr, the rest to stdout.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(split_by_level(
            || ConsoleWriter::new(io::stdout()),
            || ConsoleWriter::new(io::stderr()),
        )))
        .init();
}

fn split_by_level<O, E>(out: O, err: E) -> impl for<'w> MakeWriter<'w> + Send + Sync + 'static
where
    O: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    E: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    err.with_max_level(Level::WARN).or_else(out)
}

/// Writer that keeps lines aligned while the terminal is raw
struct ConsoleWriter<W: Write> {
    inner: W,
}

impl<W: Write> ConsoleWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for ConsoleWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if RAW_MODE.load(Ordering::SeqCst) {
            self.inner.write_all(&crlf(buf))?;
        } else {
            self.inner.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Expand bare `\n` into `\r\n`
fn crlf(buf: &[u8]) -> Cow<'_, [u8]> {
    if !buf.contains(&b'\n') {
        return Cow::Borrowed(buf);
    }

    let mut out = Vec::with_capacity(buf.len() + 8);
    let mut previous = 0u8;
    for &byte in buf {
        if byte == b'\n' && previous != b'\r' {
            out.push(b'\r');
        }
        out.push(byte);
        previous = byte;
    }
    Cow::Owned(out)
}
